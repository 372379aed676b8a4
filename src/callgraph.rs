//! Derives weighted call graphs from a profiling sample: rooting, pruning,
//! cost coloring, and DOT serialization of the intermediate form.

use serde::{Deserialize, Serialize};

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::time::Duration;

use crate::{HotpathResult, ProfileSample, PruneVariant};

/// Which cost a node's color is normalized against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMetric {
    Cumulative,
    Internal,
}

/// Thresholds and color wiring for one pruning variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PruningPolicy {
    /// Nodes below this fraction of total cumulative cost are dropped.
    pub node_ratio: f64,
    /// Edges below this fraction of total edge weight are dropped.
    pub edge_ratio: f64,
    pub color_metric: ColorMetric,
}

impl PruneVariant {
    pub fn policy(self) -> PruningPolicy {
        match self {
            Self::PrunedCumulative => PruningPolicy {
                node_ratio: 0.005,
                edge_ratio: 0.001,
                color_metric: ColorMetric::Cumulative,
            },
            Self::PrunedInternal => PruningPolicy {
                node_ratio: 0.005,
                edge_ratio: 0.001,
                color_metric: ColorMetric::Internal,
            },
            Self::NonPruned => PruningPolicy {
                node_ratio: 0.0,
                edge_ratio: 0.0,
                color_metric: ColorMetric::Cumulative,
            },
        }
    }
}

/// RGB color for a rendered node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

// Fixed two-point temperature gradient in HSL space: dark blue at zero cost,
// saturated red at maximum cost, linear gamma.
const MIN_COLOR: (f64, f64, f64) = (2.0 / 3.0, 0.80, 0.25);
const MAX_COLOR: (f64, f64, f64) = (0.0, 1.0, 0.5);

/// Map a normalized cost in `[0, 1]` onto the gradient.
pub fn temperature_color(ratio: f64) -> Color {
    let t = ratio.clamp(0.0, 1.0);
    let h = MIN_COLOR.0 + (MAX_COLOR.0 - MIN_COLOR.0) * t;
    let s = MIN_COLOR.1 + (MAX_COLOR.1 - MIN_COLOR.1) * t;
    let l = MIN_COLOR.2 + (MAX_COLOR.2 - MIN_COLOR.2) * t;
    hsl_to_rgb(h, s, l)
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Color {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = (h.rem_euclid(1.0)) * 6.0;
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());
    let (r1, g1, b1) = match hp {
        v if v < 1.0 => (c, x, 0.0),
        v if v < 2.0 => (x, c, 0.0),
        v if v < 3.0 => (0.0, c, x),
        v if v < 4.0 => (0.0, x, c),
        v if v < 5.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to_byte = |v: f64| ((v + m).clamp(0.0, 1.0) * 255.0).round() as u8;
    Color {
        r: to_byte(r1),
        g: to_byte(g1),
        b: to_byte(b1),
    }
}

/// One function in the graph IR, with its cost-derived color.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub name: String,
    pub call_count: u64,
    pub internal: Duration,
    pub cumulative: Duration,
    /// Normalized color metric in `[0, 1]`.
    pub ratio: f64,
    pub color: Color,
}

/// Caller -> callee edge by node index, weighted by call count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: usize,
    pub to: usize,
    pub weight: u64,
}

/// Directed-graph intermediate form, ready for layout.
///
/// Always derived from exactly one sample and one pruning variant; never
/// mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraph {
    pub test_id: String,
    pub variant: PruneVariant,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Builds a [`CallGraph`] from a sample under one pruning variant.
#[derive(Debug)]
pub struct CallGraphBuilder<'a> {
    sample: &'a ProfileSample,
}

impl<'a> CallGraphBuilder<'a> {
    pub fn new(sample: &'a ProfileSample) -> Self {
        Self { sample }
    }

    pub fn build(&self, variant: PruneVariant) -> CallGraph {
        let policy = variant.policy();
        let mut nodes: Vec<GraphNode> = self
            .sample
            .functions
            .iter()
            .map(|f| GraphNode {
                name: f.name.clone(),
                call_count: f.call_count,
                internal: f.internal,
                cumulative: f.cumulative,
                ratio: 0.0,
                color: temperature_color(0.0),
            })
            .collect();
        let index: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.as_str(), i))
            .collect();
        let mut edges: Vec<GraphEdge> = self
            .sample
            .edges
            .iter()
            .filter_map(|e| {
                let from = *index.get(e.caller.as_str())?;
                let to = *index.get(e.callee.as_str())?;
                Some(GraphEdge {
                    from,
                    to,
                    weight: e.call_count,
                })
            })
            .collect();

        if let Some(root) = self.unique_root(&nodes) {
            let keep = reachable_from(root, nodes.len(), &edges);
            retain(&mut nodes, &mut edges, &keep);
        }

        if policy.node_ratio > 0.0 {
            let total_cost = nodes
                .iter()
                .map(|n| n.cumulative.as_secs_f64())
                .fold(0.0_f64, f64::max);
            let node_floor = total_cost * policy.node_ratio;
            let keep: HashSet<usize> = nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| n.cumulative.as_secs_f64() >= node_floor)
                .map(|(i, _)| i)
                .collect();
            retain(&mut nodes, &mut edges, &keep);

            let total_weight: u64 = edges.iter().map(|e| e.weight).sum();
            let edge_floor = total_weight as f64 * policy.edge_ratio;
            edges.retain(|e| e.weight as f64 >= edge_floor);
        }

        colorize(&mut nodes, policy.color_metric);

        CallGraph {
            test_id: self.sample.test_id.clone(),
            variant,
            nodes,
            edges,
        }
    }

    /// Root function lookup: the single node whose qualified name ends with
    /// the test id. Zero or multiple matches leave the graph unrooted.
    fn unique_root(&self, nodes: &[GraphNode]) -> Option<usize> {
        let mut matches = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.name.ends_with(&self.sample.test_id))
            .map(|(i, _)| i);
        let first = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(first)
    }
}

fn reachable_from(root: usize, node_count: usize, edges: &[GraphEdge]) -> HashSet<usize> {
    let mut adjacency = vec![Vec::new(); node_count];
    for e in edges {
        adjacency[e.from].push(e.to);
    }
    let mut seen = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        for &next in &adjacency[node] {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}

/// Keep only the given node indices, remapping edges to the new indices.
fn retain(nodes: &mut Vec<GraphNode>, edges: &mut Vec<GraphEdge>, keep: &HashSet<usize>) {
    let mut remap = HashMap::new();
    let mut kept = Vec::with_capacity(keep.len());
    for (old, node) in nodes.drain(..).enumerate() {
        if keep.contains(&old) {
            remap.insert(old, kept.len());
            kept.push(node);
        }
    }
    *nodes = kept;
    *edges = edges
        .iter()
        .filter_map(|e| {
            Some(GraphEdge {
                from: *remap.get(&e.from)?,
                to: *remap.get(&e.to)?,
                weight: e.weight,
            })
        })
        .collect();
}

fn colorize(nodes: &mut [GraphNode], metric: ColorMetric) {
    let value = |n: &GraphNode| match metric {
        ColorMetric::Cumulative => n.cumulative.as_secs_f64(),
        ColorMetric::Internal => n.internal.as_secs_f64(),
    };
    let max = nodes.iter().map(&value).fold(0.0_f64, f64::max);
    for node in nodes.iter_mut() {
        node.ratio = if max > 0.0 { value(node) / max } else { 0.0 };
        node.color = temperature_color(node.ratio);
    }
}

impl CallGraph {
    /// Render the IR as a Graphviz DOT description for inspection.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        out.push_str("digraph callgraph {\n");
        out.push_str("  rankdir=TB;\n");
        out.push_str("  node [shape=box, style=filled, fontname=\"Helvetica\", fontsize=10];\n");
        out.push_str("  edge [fontname=\"Helvetica\", fontsize=8];\n\n");
        for (i, node) in self.nodes.iter().enumerate() {
            out.push_str(&format!(
                "  n{i} [label=\"{}\\n{:.3}s cumulative ({:.1}%)\\n{:.3}s internal, {} calls\" fillcolor=\"{}\"];\n",
                escape_dot(&node.name),
                node.cumulative.as_secs_f64(),
                node.ratio * 100.0,
                node.internal.as_secs_f64(),
                node.call_count,
                node.color.hex(),
            ));
        }
        out.push('\n');
        for edge in &self.edges {
            out.push_str(&format!(
                "  n{} -> n{} [label=\"{}\"];\n",
                edge.from, edge.to, edge.weight
            ));
        }
        out.push_str("}\n");
        out
    }

    pub fn write_dot(&self, path: &Path) -> HotpathResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_dot())?;
        Ok(())
    }
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CallEdge, FunctionRecord};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn record(name: &str, calls: u64, internal: u64, cumulative: u64) -> FunctionRecord {
        FunctionRecord {
            name: name.to_string(),
            call_count: calls,
            internal: ms(internal),
            cumulative: ms(cumulative),
        }
    }

    fn edge(caller: &str, callee: &str, calls: u64) -> CallEdge {
        CallEdge {
            caller: caller.to_string(),
            callee: callee.to_string(),
            call_count: calls,
        }
    }

    fn loop_sample() -> ProfileSample {
        ProfileSample::new(
            "test_loop",
            vec![
                record("tests::test_loop", 1, 0, 100),
                record("helpers::do_work", 100, 100, 100),
            ],
            vec![edge("tests::test_loop", "helpers::do_work", 100)],
        )
    }

    fn wide_sample() -> ProfileSample {
        // Root at 10s total; `tiny` sits well below 0.5% of it.
        ProfileSample::new(
            "test_wide",
            vec![
                record("tests::test_wide", 1, 0, 10_000),
                record("work::heavy", 10, 9_959, 9_959),
                record("work::tiny", 3, 1, 1),
                record("unrelated::orphan", 5, 40, 40),
            ],
            vec![
                edge("tests::test_wide", "work::heavy", 10),
                edge("tests::test_wide", "work::tiny", 3),
            ],
        )
    }

    #[test]
    fn rooting_keeps_root_and_transitive_descendants() {
        let sample = wide_sample();
        let graph = CallGraphBuilder::new(&sample).build(PruneVariant::NonPruned);
        let names: Vec<&str> = graph.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["tests::test_wide", "work::heavy", "work::tiny"]);
    }

    #[test]
    fn ambiguous_root_is_a_silent_no_op() {
        // Two functions end with the test id, so no rooting happens and the
        // orphan stays.
        let sample = ProfileSample::new(
            "work",
            vec![
                record("a::work", 1, 10, 10),
                record("b::work", 1, 10, 10),
                record("orphan", 1, 10, 10),
            ],
            vec![],
        );
        let graph = CallGraphBuilder::new(&sample).build(PruneVariant::NonPruned);
        assert_eq!(graph.nodes.len(), 3);
    }

    #[test]
    fn zero_matches_leaves_graph_unrooted() {
        let sample = ProfileSample::new(
            "test_absent",
            vec![record("x", 1, 1, 1), record("y", 1, 1, 1)],
            vec![],
        );
        let graph = CallGraphBuilder::new(&sample).build(PruneVariant::NonPruned);
        assert_eq!(graph.nodes.len(), 2);
    }

    #[test]
    fn pruning_drops_nodes_below_cumulative_threshold() {
        let sample = wide_sample();
        let graph = CallGraphBuilder::new(&sample).build(PruneVariant::PrunedCumulative);
        let total = 10.0;
        for node in &graph.nodes {
            assert!(node.cumulative.as_secs_f64() >= total * 0.005);
        }
        assert!(!graph.nodes.iter().any(|n| n.name == "work::tiny"));
    }

    #[test]
    fn non_pruned_retains_every_rooted_node() {
        let sample = wide_sample();
        let graph = CallGraphBuilder::new(&sample).build(PruneVariant::NonPruned);
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn loop_scenario_has_two_nodes_and_one_weighted_edge() {
        let sample = loop_sample();
        let graph = CallGraphBuilder::new(&sample).build(PruneVariant::NonPruned);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].weight, 100);
        // Both exceed the 0.5% threshold, so the pruned variant keeps both.
        let pruned = CallGraphBuilder::new(&sample).build(PruneVariant::PrunedCumulative);
        assert_eq!(pruned.nodes.len(), 2);
    }

    #[test]
    fn color_metric_differs_between_pruned_variants() {
        let sample = loop_sample();
        let by_cumulative = CallGraphBuilder::new(&sample).build(PruneVariant::PrunedCumulative);
        let by_internal = CallGraphBuilder::new(&sample).build(PruneVariant::PrunedInternal);
        // Equal cumulative puts both nodes at the hot end; by internal time
        // the test function itself is cold.
        assert_eq!(by_cumulative.nodes[0].ratio, 1.0);
        assert_eq!(by_internal.nodes[0].ratio, 0.0);
        assert_eq!(by_internal.nodes[1].ratio, 1.0);
    }

    #[test]
    fn gradient_endpoints_are_dark_blue_and_saturated_red() {
        let cold = temperature_color(0.0);
        let hot = temperature_color(1.0);
        assert_eq!(hot.hex(), "#ff0000");
        assert!(cold.b > cold.r);
        assert_eq!(cold.r, cold.g);
    }

    #[test]
    fn dot_output_names_nodes_and_edge_weights() {
        let sample = loop_sample();
        let graph = CallGraphBuilder::new(&sample).build(PruneVariant::NonPruned);
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph callgraph {"));
        assert!(dot.contains("tests::test_loop"));
        assert!(dot.contains("label=\"100\""));
    }
}
