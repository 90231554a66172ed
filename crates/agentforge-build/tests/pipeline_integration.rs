//! End-to-end builds over temporary project trees with a fake probe.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use agentforge_build::{
    write_manifest, BuildConfig, BuildPipeline, EndpointProbe, PipelineResult, SkillBundle,
};
use agentforge_core::{Access, FsManifestStore, IssueKind, ManifestStore, Severity, SkillTool};

/// Every URL is reachable unless listed as down.
struct FakeProbe {
    down: BTreeSet<String>,
}

impl FakeProbe {
    fn all_up() -> Arc<Self> {
        Arc::new(Self {
            down: BTreeSet::new(),
        })
    }

    fn with_down(urls: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            down: urls.iter().map(|u| u.to_string()).collect(),
        })
    }
}

#[async_trait]
impl EndpointProbe for FakeProbe {
    async fn probe(&self, url: &str) -> Result<(), String> {
        if self.down.contains(url) {
            Err("connection refused".to_string())
        } else {
            Ok(())
        }
    }
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

const PROJECT: &str = "\
name: acme-agents
service_accounts:
  - name: nightly-bot
tool_grants:
  - tool: https://mcp.example.com/github
    grants:
      - principal: group:eng
        access: write
";

fn agent(name: &str, model: &str, extra_tools: &str) -> String {
    format!(
        "name: {name}\nmodel: {model}\ndescription: {name} agent\ntools:\n  - server: https://mcp.example.com/github\n    access: read\n{extra_tools}acl:\n  - principal: user:alice\n    role: execute\n"
    )
}

const NIGHTLY: &str = "\
name: nightly
schedule: 0 3 * * *
agent: triage
run_as: nightly-bot
instruction: Triage everything opened today.
acl:
  - principal: group:eng
    role: read
";

fn clean_project(root: &Path) {
    write(root, "project.yaml", PROJECT);
    write(root, "agents/triage.yaml", &agent("triage", "claude-sonnet-4", ""));
    write(root, "loops/nightly.yaml", NIGHTLY);
}

async fn build(root: &Path, probe: Arc<dyn EndpointProbe>) -> PipelineResult {
    build_with(root, probe, BuildConfig::default()).await
}

async fn build_with(
    root: &Path,
    probe: Arc<dyn EndpointProbe>,
    config: BuildConfig,
) -> PipelineResult {
    BuildPipeline::new(config)
        .unwrap()
        .with_probe(probe)
        .run(root)
        .await
        .unwrap()
}

fn errors(result: &PipelineResult) -> Vec<&agentforge_core::ValidationIssue> {
    result.issues.iter().filter(|i| i.is_error()).collect()
}

#[tokio::test]
async fn clean_project_builds_a_sealed_manifest() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());

    let result = build(dir.path(), FakeProbe::all_up()).await;
    assert!(result.success, "{:#?}", result.issues);
    assert!(result.issues.is_empty(), "{:#?}", result.issues);
    assert_eq!(result.stages.len(), 6);

    let manifest = result.manifest.unwrap();
    manifest.verify().unwrap();
    assert_eq!(manifest.project, "acme-agents");
    assert_eq!(manifest.agents[0].instruction, "triage agent");
    assert_eq!(manifest.service_accounts, vec!["nightly-bot".to_string()]);
}

#[tokio::test]
async fn unsupported_model_is_one_schema_error_on_its_line() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    write(dir.path(), "agents/triage.yaml", &agent("triage", "gpt-5", ""));

    let result = build(dir.path(), FakeProbe::all_up()).await;
    assert!(!result.success);
    assert!(result.manifest.is_none());

    let found = errors(&result);
    assert_eq!(found.len(), 1, "{found:#?}");
    let issue = found[0];
    assert_eq!(issue.kind, IssueKind::SchemaError);
    assert_eq!(issue.location.file, Path::new("agents/triage.yaml"));
    assert_eq!(issue.location.line, 2);
    assert!(issue.message.contains("gpt-5"));
    assert!(issue.suggestion.as_deref().unwrap().contains("claude-sonnet-4"));
}

#[tokio::test]
async fn agent_call_cycle_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    write(
        dir.path(),
        "agents/x.yaml",
        &agent("x", "o3", "  - server: agent:y\n    access: read\n"),
    );
    write(
        dir.path(),
        "agents/y.yaml",
        &agent("y", "o3", "  - server: agent:x\n    access: read\n"),
    );

    let result = build(dir.path(), FakeProbe::all_up()).await;
    let cycles: Vec<_> = result
        .issues
        .iter()
        .filter(|i| i.kind == IssueKind::CycleError)
        .collect();
    assert_eq!(cycles.len(), 1, "{:#?}", result.issues);
    assert!(cycles[0].message.contains("x → y → x"));
    assert_eq!(cycles[0].location.file, Path::new("agents/x.yaml"));
    assert!(!result.success);
}

fn calls(targets: &[&str]) -> String {
    targets
        .iter()
        .map(|t| format!("  - server: agent:{t}\n    access: read\n"))
        .collect()
}

fn issues_of(result: &PipelineResult, kind: IssueKind) -> Vec<&agentforge_core::ValidationIssue> {
    result.issues.iter().filter(|i| i.kind == kind).collect()
}

#[tokio::test]
async fn overlapping_cycles_are_each_reported() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    write(dir.path(), "agents/a.yaml", &agent("a", "o3", &calls(&["b", "c"])));
    write(dir.path(), "agents/b.yaml", &agent("b", "o3", &calls(&["c"])));
    write(dir.path(), "agents/c.yaml", &agent("c", "o3", &calls(&["a"])));

    let result = build(dir.path(), FakeProbe::all_up()).await;
    let messages: Vec<&str> = issues_of(&result, IssueKind::CycleError)
        .iter()
        .map(|i| i.message.as_str())
        .collect();
    assert_eq!(
        messages,
        vec!["agent call cycle: a → b → c → a", "agent call cycle: a → c → a"],
        "{:#?}",
        result.issues
    );
    assert!(!result.success);
}

#[tokio::test]
async fn loop_run_as_must_be_a_declared_service_account() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    write(
        dir.path(),
        "loops/nightly.yaml",
        &NIGHTLY.replace("run_as: nightly-bot", "run_as: nightly-bt"),
    );

    let result = build(dir.path(), FakeProbe::all_up()).await;
    let found = errors(&result);
    assert_eq!(found.len(), 1, "{found:#?}");
    assert_eq!(found[0].kind, IssueKind::AclConsistencyError);
    assert_eq!(found[0].location.file, Path::new("loops/nightly.yaml"));
    assert_eq!(found[0].location.line, 4);
    assert!(found[0]
        .message
        .contains("runs as undeclared service account 'nightly-bt'"));
    assert!(found[0].suggestion.as_deref().unwrap().contains("nightly-bot"));
    assert!(result.manifest.is_none());
}

#[tokio::test]
async fn undeclared_service_account_principal_in_acl_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    write(
        dir.path(),
        "agents/triage.yaml",
        &agent("triage", "o3", "").replace("user:alice", "service-account:deploy-bot"),
    );

    let result = build(dir.path(), FakeProbe::all_up()).await;
    let found = errors(&result);
    assert_eq!(found.len(), 1, "{found:#?}");
    assert_eq!(found[0].kind, IssueKind::AclConsistencyError);
    assert_eq!(found[0].location.file, Path::new("agents/triage.yaml"));
    assert!(found[0].message.contains("'deploy-bot' is not declared"));
}

#[tokio::test]
async fn undeclared_service_account_in_tool_grant_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    write(
        dir.path(),
        "project.yaml",
        &PROJECT.replace("group:eng", "service-account:ghost-bot"),
    );

    let result = build(dir.path(), FakeProbe::all_up()).await;
    let found = errors(&result);
    assert_eq!(found.len(), 1, "{found:#?}");
    assert_eq!(found[0].kind, IssueKind::AclConsistencyError);
    assert_eq!(found[0].location.file, Path::new("project.yaml"));
    assert!(found[0].message.contains("'ghost-bot' is not declared"));
}

#[tokio::test]
async fn duplicate_names_are_schema_errors() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    write(dir.path(), "agents/triage-copy.yaml", &agent("triage", "o3", ""));
    write(dir.path(), "loops/nightly-copy.yaml", NIGHTLY);
    write(
        dir.path(),
        "project.yaml",
        &PROJECT.replace(
            "  - name: nightly-bot\n",
            "  - name: nightly-bot\n  - name: nightly-bot\n",
        ),
    );

    let result = build(dir.path(), FakeProbe::all_up()).await;
    let mut duplicates: Vec<String> = issues_of(&result, IssueKind::SchemaError)
        .iter()
        .filter(|i| i.message.starts_with("duplicate"))
        .map(|i| format!("{}: {}", i.location.file.display(), i.message))
        .collect();
    duplicates.sort();
    assert_eq!(duplicates.len(), 3, "{:#?}", result.issues);
    assert!(duplicates[0].starts_with("agents/triage.yaml: duplicate agent name 'triage'"));
    assert!(duplicates[1].starts_with("loops/nightly.yaml: duplicate loop name 'nightly'"));
    assert!(duplicates[2]
        .starts_with("project.yaml: duplicate service account name 'nightly-bot'"));
    assert!(!result.success);
}

#[tokio::test]
async fn entity_without_acl_warns_but_builds() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    let without_acl = agent("triage", "o3", "");
    let without_acl = &without_acl[..without_acl.find("acl:").unwrap()];
    write(dir.path(), "agents/triage.yaml", without_acl);

    let result = build(dir.path(), FakeProbe::all_up()).await;
    assert!(result.success, "{:#?}", result.issues);
    assert_eq!(result.warning_count(), 1);
    let warning = &result.issues[0];
    assert_eq!(warning.kind, IssueKind::AclConsistencyError);
    assert_eq!(warning.location.file, Path::new("agents/triage.yaml"));
    assert!(warning.message.contains("agent 'triage' has no acl"));
    assert!(result.manifest.unwrap().agents[0].acl.is_empty());
}

#[tokio::test]
async fn dangling_loop_agent_names_file_and_agent() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    write(
        dir.path(),
        "loops/nightly.yaml",
        &NIGHTLY.replace("agent: triage", "agent: triag"),
    );

    let result = build(dir.path(), FakeProbe::all_up()).await;
    let found = errors(&result);
    assert_eq!(found.len(), 1, "{found:#?}");
    assert_eq!(found[0].kind, IssueKind::ReferenceError);
    assert_eq!(found[0].location.file, Path::new("loops/nightly.yaml"));
    assert_eq!(found[0].location.line, 3);
    assert!(found[0].message.contains("triag"));
    assert!(found[0].suggestion.as_deref().unwrap().contains("triage"));
}

#[tokio::test]
async fn orphan_grant_warns_but_builds() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    write(
        dir.path(),
        "project.yaml",
        &format!(
            "{PROJECT}  - tool: https://mcp.example.com/jira\n    grants:\n      - principal: user:bob\n        access: read\n"
        ),
    );

    let result = build(dir.path(), FakeProbe::all_up()).await;
    assert!(result.success, "{:#?}", result.issues);
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.warning_count(), 1);
    let warning = &result.issues[0];
    assert_eq!(warning.severity, Severity::Warning);
    assert_eq!(warning.kind, IssueKind::AclConsistencyError);
    assert!(warning.message.contains("https://mcp.example.com/jira"));
    assert!(result.manifest.is_some());
}

#[tokio::test]
async fn malformed_principal_is_acl_format_error() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    write(
        dir.path(),
        "agents/triage.yaml",
        &agent("triage", "o3", "").replace("user:alice", "alice"),
    );

    let result = build(dir.path(), FakeProbe::all_up()).await;
    let found = errors(&result);
    assert_eq!(found.len(), 1, "{found:#?}");
    assert_eq!(found[0].kind, IssueKind::AclFormatError);
}

#[tokio::test]
async fn manifest_hash_is_stable_and_tracks_content() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    write(dir.path(), "agents/reviewer.yaml", &agent("reviewer", "gpt-4o", ""));

    let first = build(dir.path(), FakeProbe::all_up()).await.manifest.unwrap();
    let again = build(dir.path(), FakeProbe::all_up()).await.manifest.unwrap();
    assert_eq!(first.hash, again.hash);

    write(
        dir.path(),
        "agents/reviewer.yaml",
        &agent("reviewer", "gpt-4o", "").replace("reviewer agent", "reviews pull requests"),
    );
    let changed = build(dir.path(), FakeProbe::all_up()).await.manifest.unwrap();
    assert_ne!(first.hash, changed.hash);

    write(dir.path(), "agents/reviewer.yaml", &agent("reviewer", "gpt-4o", ""));
    let reverted = build(dir.path(), FakeProbe::all_up()).await.manifest.unwrap();
    assert_eq!(first.hash, reverted.hash);
}

#[tokio::test]
async fn unreachable_server_is_reachability_error() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());

    let result = build(
        dir.path(),
        FakeProbe::with_down(&["https://mcp.example.com/github"]),
    )
    .await;
    let found = errors(&result);
    assert_eq!(found.len(), 1, "{found:#?}");
    assert_eq!(found[0].kind, IssueKind::ReachabilityError);
    assert_eq!(found[0].location.line, 5);
}

#[tokio::test]
async fn offline_build_warns_instead_of_probing() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());

    let result = build_with(
        dir.path(),
        FakeProbe::with_down(&["https://mcp.example.com/github"]),
        BuildConfig::default().with_offline(true),
    )
    .await;
    assert!(result.success, "{:#?}", result.issues);
    assert_eq!(result.warning_count(), 1);
    assert_eq!(result.issues[0].kind, IssueKind::ReachabilityError);
}

#[tokio::test]
async fn local_tool_is_bundled_into_the_manifest() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    write(
        dir.path(),
        "tools/label.js",
        "exports.handler = async (input) => ({ labels: [] });\n",
    );
    write(
        dir.path(),
        "agents/triage.yaml",
        &agent(
            "triage",
            "claude-sonnet-4",
            "  - name: tools/label.js\n    access: write\n",
        ),
    );

    let result = build(dir.path(), FakeProbe::all_up()).await;
    assert!(result.success, "{:#?}", result.issues);
    let manifest = result.manifest.unwrap();
    assert_eq!(manifest.bundles.len(), 1);
    assert_eq!(manifest.bundles[0].path, "tools/label.js");
    assert!(manifest.bundles[0].source.contains("exports.handler"));
}

fn publish_skill(root: &Path, bundle: &SkillBundle, pinned_integrity: &str) {
    write(
        root,
        &format!(".skills/{}/{}.json", bundle.name, bundle.version),
        &serde_json::to_string_pretty(bundle).unwrap(),
    );
    write(
        root,
        "skills.lock",
        &format!(
            "[[skill]]\nname = \"{}\"\nversion = \"{}\"\nintegrity = \"{pinned_integrity}\"\n",
            bundle.name, bundle.version
        ),
    );
}

fn triage_with_skill(root: &Path) {
    write(
        root,
        "agents/triage.yaml",
        &agent("triage", "claude-sonnet-4", "").replace(
            "acl:",
            "skills:\n  - name: acme/summarize\n    version: 1.2.0\nacl:",
        ),
    );
}

fn summarize_skill(access: Access) -> SkillBundle {
    SkillBundle {
        name: "acme/summarize".into(),
        version: "1.2.0".into(),
        tools: vec![SkillTool {
            tool: "https://mcp.example.com/github".into(),
            access,
        }],
        prompts: vec!["Summarize in three bullet points.".into()],
    }
}

#[tokio::test]
async fn pinned_skill_is_resolved_and_prompts_compose() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    triage_with_skill(dir.path());
    let bundle = summarize_skill(Access::Read);
    let integrity = bundle.integrity().unwrap();
    publish_skill(dir.path(), &bundle, &integrity);

    let result = build(dir.path(), FakeProbe::all_up()).await;
    assert!(result.success, "{:#?}", result.issues);
    let manifest = result.manifest.unwrap();
    let triage = manifest.agent("triage").unwrap();
    assert_eq!(triage.skills[0].integrity, integrity);
    assert_eq!(
        triage.instruction,
        "triage agent\n\nSummarize in three bullet points."
    );
}

#[tokio::test]
async fn skill_integrity_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    triage_with_skill(dir.path());
    let bundle = summarize_skill(Access::Read);
    publish_skill(dir.path(), &bundle, &format!("sha256-{}", "0".repeat(64)));

    let result = build(dir.path(), FakeProbe::all_up()).await;
    let found = errors(&result);
    assert_eq!(found.len(), 1, "{found:#?}");
    assert_eq!(found[0].kind, IssueKind::IntegrityError);
    assert_eq!(found[0].location.file, Path::new("agents/triage.yaml"));
    assert!(result.manifest.is_none());
}

#[tokio::test]
async fn skill_cannot_widen_the_allowlist() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    triage_with_skill(dir.path());
    let bundle = summarize_skill(Access::Write);
    let integrity = bundle.integrity().unwrap();
    publish_skill(dir.path(), &bundle, &integrity);

    let result = build(dir.path(), FakeProbe::all_up()).await;
    let found = errors(&result);
    assert_eq!(found.len(), 1, "{found:#?}");
    assert_eq!(found[0].kind, IssueKind::ReferenceError);
    assert!(found[0].message.contains("write"));
}

#[tokio::test]
async fn manifest_is_written_once_per_hash() {
    let dir = tempfile::tempdir().unwrap();
    clean_project(dir.path());
    let config = BuildConfig::default();

    let manifest = build(dir.path(), FakeProbe::all_up()).await.manifest.unwrap();
    let first = write_manifest(dir.path(), &config, &manifest).unwrap();
    assert!(first.written);
    let second = write_manifest(dir.path(), &config, &manifest).unwrap();
    assert!(!second.written);
    assert_eq!(first.path, second.path);

    let store = FsManifestStore::new(dir.path().join(".agentforge/manifests")).unwrap();
    assert_eq!(store.list().unwrap(), vec![manifest.hash.clone()]);
    assert_eq!(store.get(&manifest.hash).unwrap(), manifest);
}
