//! Cross-document reference graph.
//!
//! Nodes are agents, loops, service accounts and tools, addressed by stable
//! name. Edges are "agent declares tool", "loop invokes agent", "loop runs
//! as service account" and "agent-tool targets agent".
//!
//! Construction is total: an edge whose target is missing is recorded as
//! dangling and left for the validation stages to report. The graph is
//! never mutated after [`ReferenceGraph::build`] returns.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::domain::agent::AgentSpec;
use crate::domain::issue::Location;
use crate::domain::project::{LoopSpec, ProjectConfig, ServiceAccount};
use crate::domain::tool::ToolEntry;
use crate::loader::ProjectSnapshot;

/// Entity kinds that share a per-project namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Agent,
    Loop,
    ServiceAccount,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Loop => "loop",
            Self::ServiceAccount => "service account",
        }
    }
}

/// A graph node, addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum NodeRef {
    Agent(String),
    Loop(String),
    ServiceAccount(String),
    /// A tool, by its reference string.
    Tool(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    DeclaresTool,
    InvokesAgent,
    RunsAs,
    TargetsAgent,
}

/// A directed edge with the location that declared it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeRef,
    pub to: NodeRef,
    pub kind: EdgeKind,
    pub location: Location,
}

/// An edge whose target does not exist in the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingEdge {
    pub kind: EdgeKind,
    pub from: String,
    pub target: String,
    pub location: Location,
}

/// A second declaration of a name already taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub kind: EntityKind,
    pub name: String,
    pub first: Location,
    pub duplicate: Location,
}

/// A cycle in the agent-call subgraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    /// Agent names, first and last equal.
    pub path: Vec<String>,
    /// The tool entry of `path[0]` that starts the cycle.
    pub location: Location,
}

impl Cycle {
    /// `x → y → x`.
    pub fn display_path(&self) -> String {
        self.path.join(" → ")
    }
}

/// Immutable, name-indexed view over every loaded entity.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    project: Option<ProjectConfig>,
    agents: Vec<AgentSpec>,
    agent_index: BTreeMap<String, usize>,
    loops: Vec<LoopSpec>,
    loop_index: BTreeMap<String, usize>,
    service_accounts: BTreeMap<String, ServiceAccount>,
    tools: BTreeSet<String>,
    edges: Vec<Edge>,
    dangling: Vec<DanglingEdge>,
    duplicates: Vec<Duplicate>,
}

impl ReferenceGraph {
    /// Build the graph from whatever loaded. Never fails.
    pub fn build(snapshot: &ProjectSnapshot) -> Self {
        let mut graph = Self {
            project: snapshot.project.clone(),
            ..Self::default()
        };

        let mut agents = snapshot.agents.clone();
        agents.sort_by(|a, b| a.name.cmp(&b.name).then(a.source.path.cmp(&b.source.path)));
        for agent in agents {
            graph.add_agent(agent);
        }

        let mut loops = snapshot.loops.clone();
        loops.sort_by(|a, b| a.name.cmp(&b.name).then(a.source.path.cmp(&b.source.path)));
        for spec in loops {
            graph.add_loop(spec);
        }

        if let Some(project) = &snapshot.project {
            for sa in &project.service_accounts {
                match graph.service_accounts.get(&sa.name) {
                    Some(first) => graph.duplicates.push(Duplicate {
                        kind: EntityKind::ServiceAccount,
                        name: sa.name.clone(),
                        first: first.location.clone(),
                        duplicate: sa.location.clone(),
                    }),
                    None => {
                        graph.service_accounts.insert(sa.name.clone(), sa.clone());
                    }
                }
            }
        }

        graph.link();
        graph
    }

    fn add_agent(&mut self, agent: AgentSpec) {
        if let Some(&first) = self.agent_index.get(&agent.name) {
            self.duplicates.push(Duplicate {
                kind: EntityKind::Agent,
                name: agent.name.clone(),
                first: self.agents[first].source.key("name"),
                duplicate: agent.source.key("name"),
            });
        } else {
            self.agent_index.insert(agent.name.clone(), self.agents.len());
        }
        self.agents.push(agent);
    }

    fn add_loop(&mut self, spec: LoopSpec) {
        if let Some(&first) = self.loop_index.get(&spec.name) {
            self.duplicates.push(Duplicate {
                kind: EntityKind::Loop,
                name: spec.name.clone(),
                first: self.loops[first].source.key("name"),
                duplicate: spec.source.key("name"),
            });
        } else {
            self.loop_index.insert(spec.name.clone(), self.loops.len());
        }
        self.loops.push(spec);
    }

    /// Derive tool nodes and every edge once all nodes are registered.
    fn link(&mut self) {
        let mut edges = Vec::new();
        let mut dangling = Vec::new();

        for agent in &self.agents {
            for (i, tool) in agent.tools.iter().enumerate() {
                let reference = tool.reference();
                let location = agent.source.item("tools", i);
                self.tools.insert(reference.clone());
                edges.push(Edge {
                    from: NodeRef::Agent(agent.name.clone()),
                    to: NodeRef::Tool(reference),
                    kind: EdgeKind::DeclaresTool,
                    location: location.clone(),
                });
                if let ToolEntry::Agent { agent: target, .. } = tool {
                    if self.agent_index.contains_key(target) {
                        edges.push(Edge {
                            from: NodeRef::Agent(agent.name.clone()),
                            to: NodeRef::Agent(target.clone()),
                            kind: EdgeKind::TargetsAgent,
                            location,
                        });
                    } else {
                        dangling.push(DanglingEdge {
                            kind: EdgeKind::TargetsAgent,
                            from: agent.name.clone(),
                            target: target.clone(),
                            location,
                        });
                    }
                }
            }
        }

        for spec in &self.loops {
            let checks = [
                (EdgeKind::InvokesAgent, "agent", &spec.agent),
                (EdgeKind::RunsAs, "run_as", &spec.run_as),
            ];
            for (kind, key, target) in checks {
                let location = spec.source.key(key);
                let (exists, to) = match kind {
                    EdgeKind::InvokesAgent => (
                        self.agent_index.contains_key(target),
                        NodeRef::Agent(target.clone()),
                    ),
                    _ => (
                        self.service_accounts.contains_key(target),
                        NodeRef::ServiceAccount(target.clone()),
                    ),
                };
                if exists {
                    edges.push(Edge {
                        from: NodeRef::Loop(spec.name.clone()),
                        to,
                        kind,
                        location,
                    });
                } else {
                    dangling.push(DanglingEdge {
                        kind,
                        from: spec.name.clone(),
                        target: target.clone(),
                        location,
                    });
                }
            }
        }

        self.edges = edges;
        self.dangling = dangling;
    }

    pub fn project(&self) -> Option<&ProjectConfig> {
        self.project.as_ref()
    }

    /// Every loaded agent, duplicates included, sorted by name.
    pub fn agents(&self) -> &[AgentSpec] {
        &self.agents
    }

    /// Every loaded loop, duplicates included, sorted by name.
    pub fn loops(&self) -> &[LoopSpec] {
        &self.loops
    }

    /// The first agent declared under `name`.
    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agent_index.get(name).map(|&i| &self.agents[i])
    }

    pub fn has_agent(&self, name: &str) -> bool {
        self.agent_index.contains_key(name)
    }

    pub fn has_service_account(&self, name: &str) -> bool {
        self.service_accounts.contains_key(name)
    }

    /// Declared service accounts, sorted.
    pub fn service_accounts(&self) -> impl Iterator<Item = &ServiceAccount> {
        self.service_accounts.values()
    }

    /// Whether any agent declares `reference`.
    pub fn is_declared_tool(&self, reference: &str) -> bool {
        self.tools.contains(reference)
    }

    pub fn declared_tool_references(&self) -> BTreeSet<&str> {
        self.tools.iter().map(String::as_str).collect()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn dangling(&self, kind: EdgeKind) -> impl Iterator<Item = &DanglingEdge> {
        self.dangling.iter().filter(move |d| d.kind == kind)
    }

    pub fn duplicates(&self) -> &[Duplicate] {
        &self.duplicates
    }

    /// Resolved agent-call edges out of `agent`, deduplicated and sorted by
    /// target, each with the first declaring location.
    fn calls_from(&self, agent: &str) -> Vec<(&str, &Location)> {
        let mut seen: BTreeMap<&str, &Location> = BTreeMap::new();
        for edge in &self.edges {
            if edge.kind != EdgeKind::TargetsAgent {
                continue;
            }
            if let (NodeRef::Agent(from), NodeRef::Agent(to)) = (&edge.from, &edge.to) {
                if from == agent {
                    seen.entry(to.as_str()).or_insert(&edge.location);
                }
            }
        }
        seen.into_iter().collect()
    }

    /// Every elementary cycle in the agent-call subgraph.
    ///
    /// Each cycle is rooted at its smallest agent name and found by a DFS
    /// from that root over names no smaller than it, so every cycle is
    /// reported exactly once. Roots and targets are visited in sorted order,
    /// which keeps the result deterministic.
    pub fn find_cycles(&self) -> Vec<Cycle> {
        let adjacency: HashMap<&str, Vec<(&str, &Location)>> = self
            .agent_index
            .keys()
            .map(|name| (name.as_str(), self.calls_from(name)))
            .collect();

        let mut cycles = Vec::new();
        for root in self.agent_index.keys() {
            let mut search = CycleSearch {
                root,
                adjacency: &adjacency,
                path: Vec::new(),
                on_path: HashSet::new(),
                cycles: &mut cycles,
            };
            search.walk(root);
        }
        cycles
    }
}

/// Cycles through one root, restricted to agents named `>= root`.
struct CycleSearch<'g, 'c> {
    root: &'g str,
    adjacency: &'c HashMap<&'g str, Vec<(&'g str, &'g Location)>>,
    /// Agents on the current walk, each with the edge that reached the next.
    path: Vec<(&'g str, Option<&'g Location>)>,
    on_path: HashSet<&'g str>,
    cycles: &'c mut Vec<Cycle>,
}

impl<'g, 'c> CycleSearch<'g, 'c> {
    fn walk(&mut self, node: &'g str) {
        self.path.push((node, None));
        self.on_path.insert(node);

        let adjacency = self.adjacency;
        for &(next, location) in adjacency.get(node).into_iter().flatten() {
            if let Some(last) = self.path.last_mut() {
                last.1 = Some(location);
            }
            if next == self.root {
                self.close(location);
            } else if next > self.root && !self.on_path.contains(next) {
                self.walk(next);
            }
        }

        self.on_path.remove(node);
        self.path.pop();
    }

    fn close(&mut self, last_hop: &'g Location) {
        let first_hop = self.path.first().and_then(|(_, l)| *l).unwrap_or(last_hop);
        let mut path: Vec<String> = self.path.iter().map(|(n, _)| n.to_string()).collect();
        path.push(self.root.to_string());
        self.cycles.push(Cycle {
            path,
            location: first_hop.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access::Access;
    use crate::domain::source::SpecSource;
    use crate::loader::source_map::SourceMap;

    fn agent(name: &str, calls: &[&str]) -> AgentSpec {
        let mut text = format!("name: {name}\nmodel: gpt-4o\ndescription: x\ntools:\n");
        let mut tools = Vec::new();
        for target in calls {
            text.push_str(&format!("  - server: agent:{target}\n    access: read\n"));
            tools.push(ToolEntry::Agent {
                agent: target.to_string(),
                access: Access::Read,
            });
        }
        AgentSpec {
            name: name.into(),
            model: "gpt-4o".into(),
            description: "x".into(),
            tools,
            skills: vec![],
            acl: vec![],
            source: SpecSource::new(
                format!("agents/{name}.yaml"),
                SourceMap::from_yaml(&text),
            ),
        }
    }

    fn graph(agents: Vec<AgentSpec>) -> ReferenceGraph {
        ReferenceGraph::build(&ProjectSnapshot {
            agents,
            ..ProjectSnapshot::default()
        })
    }

    #[test]
    fn test_two_agent_cycle_named_once() {
        let g = graph(vec![agent("y", &["x"]), agent("x", &["y"])]);
        let cycles = g.find_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].display_path(), "x → y → x");
        assert_eq!(cycles[0].location.file.to_str(), Some("agents/x.yaml"));
        assert_eq!(cycles[0].location.line, 5);
    }

    #[test]
    fn test_self_call_is_cycle() {
        let g = graph(vec![agent("solo", &["solo"])]);
        let cycles = g.find_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].path, vec!["solo", "solo"]);
    }

    #[test]
    fn test_transitive_cycle_reported_from_entry() {
        let g = graph(vec![
            agent("a", &["b"]),
            agent("b", &["c"]),
            agent("c", &["b"]),
        ]);
        let cycles = g.find_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].display_path(), "b → c → b");
        assert_eq!(cycles[0].location.file.to_str(), Some("agents/b.yaml"));
    }

    #[test]
    fn test_overlapping_cycles_all_reported() {
        let g = graph(vec![
            agent("a", &["b", "c"]),
            agent("b", &["c"]),
            agent("c", &["a"]),
        ]);
        let paths: Vec<String> = g.find_cycles().iter().map(Cycle::display_path).collect();
        assert_eq!(paths, vec!["a → b → c → a", "a → c → a"]);
    }

    #[test]
    fn test_cycles_sharing_an_agent_reported_separately() {
        let g = graph(vec![
            agent("hub", &["left", "right"]),
            agent("left", &["hub"]),
            agent("right", &["hub"]),
        ]);
        let cycles = g.find_cycles();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].display_path(), "hub → left → hub");
        assert_eq!(cycles[1].display_path(), "hub → right → hub");
        assert_eq!(cycles[1].location.line, 7);
    }

    #[test]
    fn test_dag_has_no_cycles() {
        let g = graph(vec![
            agent("a", &["b", "c"]),
            agent("b", &["c"]),
            agent("c", &[]),
        ]);
        assert!(g.find_cycles().is_empty());
    }

    #[test]
    fn test_dangling_agent_tool_recorded() {
        let g = graph(vec![agent("a", &["ghost"])]);
        let dangling: Vec<_> = g.dangling(EdgeKind::TargetsAgent).collect();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].target, "ghost");
        assert!(g.find_cycles().is_empty());
    }

    #[test]
    fn test_duplicate_agents_recorded_first_wins() {
        let mut second = agent("a", &[]);
        second.source = SpecSource::new("agents/z-copy.yaml", SourceMap::default());
        let g = graph(vec![second, agent("a", &["b"]), agent("b", &[])]);
        assert_eq!(g.duplicates().len(), 1);
        assert_eq!(g.agent("a").map(|a| a.tools.len()), Some(1));
        assert_eq!(g.agents().len(), 3);
    }

    #[test]
    fn test_tool_nodes_are_distinct_references() {
        let g = graph(vec![agent("a", &["b", "b"]), agent("b", &[])]);
        assert_eq!(g.declared_tool_references().len(), 1);
        assert!(g.is_declared_tool("agent:b"));
    }
}
