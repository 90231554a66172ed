//! agentforge CLI
//!
//! The `agentforge` command compiles a project of agent, loop and project
//! specs into a content-addressed manifest, and answers authorization
//! questions against a built manifest.
//!
//! ## Commands
//!
//! - `build`: validate a project and write its manifest
//! - `check`: validate without writing anything
//! - `authorize`: decide a tool, agent or loop request against a manifest
//! - `manifest`: list, show or verify stored manifests

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing::debug;

use agentforge_authz::{
    AuditOutcome, AuditRecord, AuditSink, AuthorizationModel, Decision, StaticGroupDirectory,
    TracingAuditSink,
};
use agentforge_build::{
    manifest_dir, render_text, write_manifest, BuildConfig, BuildPipeline, BuildReport,
};
use agentforge_core::telemetry;
use agentforge_core::{Access, BuildManifest, FsManifestStore, ManifestStore, Principal, Role};

#[derive(Parser)]
#[command(name = "agentforge")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile declarative agent specs into content-addressed manifests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON log lines on stderr and JSON results on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project and write its manifest
    Build {
        /// Project root (default: current directory)
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Manifest directory, relative to the root unless absolute
        #[arg(long, env = "AGENTFORGE_OUT_DIR")]
        out: Option<PathBuf>,

        /// Skip remote reachability probes
        #[arg(long)]
        offline: bool,
    },

    /// Validate a project without writing a manifest
    Check {
        #[arg(default_value = ".")]
        root: PathBuf,

        #[arg(long)]
        offline: bool,
    },

    /// Decide a request against a built manifest
    Authorize(AuthorizeArgs),

    /// Inspect stored manifests
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .args(["agent", "invoke_agent", "loop_name"]),
))]
struct AuthorizeArgs {
    /// Manifest hash (looked up in the store) or path to a manifest file
    #[arg(long)]
    manifest: String,

    /// Calling principal: user:<id>, group:<name> or service-account:<name>
    #[arg(long, value_parser = parse_principal)]
    principal: Principal,

    /// Acting agent for a tool request
    #[arg(long, requires_all = ["tool", "access"])]
    agent: Option<String>,

    /// Tool reference as declared by the agent
    #[arg(long, requires = "agent")]
    tool: Option<String>,

    /// Requested access: read or write
    #[arg(long, requires = "agent", value_parser = parse_access)]
    access: Option<Access>,

    /// Agent the principal wants to invoke
    #[arg(long)]
    invoke_agent: Option<String>,

    /// Loop the principal wants to trigger or inspect
    #[arg(long = "loop")]
    loop_name: Option<String>,

    /// Role required for --invoke-agent / --loop
    #[arg(long, value_parser = parse_role, default_value = "execute")]
    role: Role,

    /// Group the principal belongs to (repeatable)
    #[arg(long = "group")]
    groups: Vec<String>,

    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args, Clone)]
struct StoreArgs {
    /// Project root the manifest store lives under
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Manifest directory, relative to the root unless absolute
    #[arg(long, env = "AGENTFORGE_OUT_DIR")]
    out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ManifestAction {
    /// List stored manifest hashes
    List {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print a manifest
    Show {
        /// Manifest hash or path
        reference: String,

        #[command(flatten)]
        store: StoreArgs,
    },
    /// Recompute a manifest's hash and compare it with the recorded one
    Verify {
        reference: String,

        #[command(flatten)]
        store: StoreArgs,
    },
}

fn parse_principal(s: &str) -> std::result::Result<Principal, String> {
    Principal::parse(s).map_err(|e| e.to_string())
}

fn parse_access(s: &str) -> std::result::Result<Access, String> {
    s.parse().map_err(|e: agentforge_core::ParseError| e.to_string())
}

fn parse_role(s: &str) -> std::result::Result<Role, String> {
    s.parse().map_err(|e: agentforge_core::ParseError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = telemetry::level_for(cli.verbose);
    telemetry::init_tracing(cli.json, level);

    let ok = match cli.command {
        Commands::Build { root, out, offline } => {
            cmd_build(&root, out, offline, true, cli.json).await?
        }
        Commands::Check { root, offline } => {
            cmd_build(&root, None, offline, false, cli.json).await?
        }
        Commands::Authorize(args) => cmd_authorize(&args, &TracingAuditSink, cli.json).await?,
        Commands::Manifest { action } => match action {
            ManifestAction::List { store } => cmd_manifest_list(&store, cli.json)?,
            ManifestAction::Show { reference, store } => cmd_manifest_show(&reference, &store)?,
            ManifestAction::Verify { reference, store } => {
                cmd_manifest_verify(&reference, &store, cli.json)?
            }
        },
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn build_config(out: Option<PathBuf>, offline: bool) -> Result<BuildConfig> {
    let mut config = BuildConfig::from_env().context("invalid AGENTFORGE_* environment")?;
    if offline {
        config = config.with_offline(true);
    }
    if let Some(out) = out {
        config = config.with_out_dir(out);
    }
    Ok(config)
}

async fn cmd_build(
    root: &Path,
    out: Option<PathBuf>,
    offline: bool,
    write: bool,
    json: bool,
) -> Result<bool> {
    let config = build_config(out, offline)?;
    let pipeline = BuildPipeline::new(config)?;
    let result = pipeline
        .run(root)
        .await
        .with_context(|| format!("cannot build {}", root.display()))?;

    let stored = match (&result.manifest, write) {
        (Some(manifest), true) => Some(write_manifest(root, pipeline.config(), manifest)?),
        _ => None,
    };

    let mut report = BuildReport::new(&result);
    if let Some(stored) = &stored {
        report = report.with_manifest_path(stored.path.display().to_string());
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&report));
    }
    Ok(result.success)
}

/// Resolve a manifest by file path, falling back to a hash in the store.
fn load_manifest(reference: &str, store: &StoreArgs) -> Result<BuildManifest> {
    let path = Path::new(reference);
    if path.is_file() {
        debug!(path = %path.display(), "reading manifest file");
        let bytes =
            std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        let manifest: BuildManifest = serde_json::from_slice(&bytes)
            .with_context(|| format!("{} is not a manifest", path.display()))?;
        return Ok(manifest);
    }
    let store = open_store(store)?;
    store
        .get(reference)
        .with_context(|| format!("cannot load manifest {reference}"))
}

fn open_store(store: &StoreArgs) -> Result<FsManifestStore> {
    let config = build_config(store.out.clone(), false)?;
    let dir = manifest_dir(&store.root, &config);
    FsManifestStore::new(&dir).with_context(|| format!("cannot open store {}", dir.display()))
}

async fn cmd_authorize(args: &AuthorizeArgs, audit: &dyn AuditSink, json: bool) -> Result<bool> {
    let manifest = load_manifest(&args.manifest, &args.store)?;
    manifest
        .verify()
        .context("manifest content does not match its hash")?;

    let mut groups = StaticGroupDirectory::new();
    for group in &args.groups {
        groups.add(args.principal.clone(), group.clone());
    }
    let model = AuthorizationModel::new(Arc::new(manifest), Arc::new(groups));

    let (resource, entity, tool, decision) =
        match (&args.agent, &args.invoke_agent, &args.loop_name) {
            (Some(agent), _, _) => {
                let tool = args.tool.as_deref().unwrap_or_default();
                let access = args.access.unwrap_or(Access::Read);
                (
                    format!("{agent} → {tool} ({access})"),
                    agent,
                    Some((tool, access)),
                    model.authorize_tool(&args.principal, agent, tool, access),
                )
            }
            (None, Some(agent), _) => (
                format!("agent {agent} ({})", args.role),
                agent,
                None,
                model.authorize_agent(&args.principal, agent, args.role),
            ),
            (None, None, Some(name)) => (
                format!("loop {name} ({})", args.role),
                name,
                None,
                model.authorize_loop(&args.principal, name, args.role),
            ),
            (None, None, None) => {
                anyhow::bail!("one of --agent, --invoke-agent or --loop is required")
            }
        };

    let mut record = AuditRecord::new(
        args.principal.to_string(),
        vec![entity.clone()],
        AuditOutcome::decided(&decision),
    );
    if let Some((tool, access)) = tool {
        record = record.with_tool(tool, access);
    }
    audit.record(record).await;

    if json {
        let value = serde_json::json!({
            "principal": args.principal.to_string(),
            "resource": resource,
            "result": decision,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{} {resource}: {decision}", args.principal);
    }
    Ok(matches!(decision, Decision::Allow))
}

fn cmd_manifest_list(store: &StoreArgs, json: bool) -> Result<bool> {
    let store = open_store(store)?;
    let hashes = store.list()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&hashes)?);
    } else if hashes.is_empty() {
        println!("No manifests in {}", store.root().display());
    } else {
        for hash in hashes {
            println!("{hash}");
        }
    }
    Ok(true)
}

fn cmd_manifest_show(reference: &str, store: &StoreArgs) -> Result<bool> {
    let manifest = load_manifest(reference, store)?;
    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(true)
}

fn cmd_manifest_verify(reference: &str, store: &StoreArgs, json: bool) -> Result<bool> {
    let manifest = load_manifest(reference, store)?;
    let verdict = manifest.verify();
    if json {
        let value = serde_json::json!({
            "hash": manifest.hash,
            "valid": verdict.is_ok(),
            "error": verdict.as_ref().err().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        match &verdict {
            Ok(()) => println!("✓ {} verified", manifest.hash),
            Err(e) => println!("✗ {}: {e}", manifest.hash),
        }
    }
    Ok(verdict.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentforge_authz::{Check, MemoryAuditSink};
    use agentforge_core::MANIFEST_FORMAT_VERSION;

    fn manifest() -> BuildManifest {
        BuildManifest {
            format_version: MANIFEST_FORMAT_VERSION,
            project: "acme".into(),
            agents: vec![],
            loops: vec![],
            service_accounts: vec![],
            tool_grants: vec![],
            bundles: vec![],
            skills: vec![],
            hash: String::new(),
        }
        .seal()
        .unwrap()
    }

    #[test]
    fn test_authorize_requires_a_target() {
        let parsed = Cli::try_parse_from([
            "agentforge",
            "authorize",
            "--manifest",
            "x",
            "--principal",
            "user:alice",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_authorize_tool_form_parses() {
        let cli = Cli::try_parse_from([
            "agentforge",
            "authorize",
            "--manifest",
            "x",
            "--principal",
            "user:alice",
            "--agent",
            "triage",
            "--tool",
            "tools/label.js",
            "--access",
            "write",
            "--group",
            "eng",
        ])
        .unwrap();
        let Commands::Authorize(args) = cli.command else {
            panic!("expected authorize");
        };
        assert_eq!(args.access, Some(Access::Write));
        assert_eq!(args.groups, vec!["eng"]);
    }

    #[test]
    fn test_bad_principal_rejected_at_parse() {
        let parsed = Cli::try_parse_from([
            "agentforge",
            "authorize",
            "--manifest",
            "x",
            "--principal",
            "alice",
            "--invoke-agent",
            "triage",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_load_manifest_by_path_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store_args = StoreArgs {
            root: dir.path().to_path_buf(),
            out: Some(PathBuf::from("manifests")),
        };
        let m = manifest();
        let stored = open_store(&store_args).unwrap().put(&m).unwrap();

        let by_hash = load_manifest(&m.hash, &store_args).unwrap();
        assert_eq!(by_hash, m);
        let by_path = load_manifest(stored.path.to_str().unwrap(), &store_args).unwrap();
        assert_eq!(by_path.hash, m.hash);
    }

    #[tokio::test]
    async fn test_authorize_records_the_decision() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let m = manifest();
        let store_args = StoreArgs {
            root: dir.path().to_path_buf(),
            out: Some(PathBuf::from("manifests")),
        };
        open_store(&store_args).unwrap().put(&m).unwrap();

        let cli = Cli::try_parse_from([
            "agentforge",
            "authorize",
            "--manifest",
            m.hash.as_str(),
            "--principal",
            "user:alice",
            "--invoke-agent",
            "ghost",
            "--root",
            root,
            "--out",
            "manifests",
        ])
        .unwrap();
        let Commands::Authorize(args) = cli.command else {
            panic!("expected authorize");
        };

        let sink = MemoryAuditSink::new();
        let allowed = cmd_authorize(&args, &sink, true).await.unwrap();
        assert!(!allowed);

        let records = sink.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].principal, "user:alice");
        assert_eq!(records[0].chain, vec!["ghost"]);
        assert!(matches!(
            records[0].outcome,
            AuditOutcome::Denied { check: Check::UnknownResource, .. }
        ));
    }
}
