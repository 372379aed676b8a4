//! Hierarchical top-down layout for the call-graph IR.

use crate::CallGraph;

const NODE_HEIGHT: f64 = 54.0;
const H_GAP: f64 = 30.0;
const V_GAP: f64 = 60.0;
const MARGIN: f64 = 24.0;
const CHAR_WIDTH: f64 = 7.5;

/// Placed node: indexes into the graph's node list.
#[derive(Debug, Clone, Copy)]
pub struct PlacedNode {
    pub node: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Computed positions for every node plus the canvas extent.
#[derive(Debug, Clone)]
pub struct GraphLayout {
    pub nodes: Vec<PlacedNode>,
    pub width: f64,
    pub height: f64,
}

impl GraphLayout {
    pub fn placed(&self, node: usize) -> &PlacedNode {
        self.nodes
            .iter()
            .find(|p| p.node == node)
            .unwrap_or_else(|| &self.nodes[0])
    }
}

/// Layer nodes by call depth, order each layer by the barycenter of its
/// neighbors to reduce edge crossings, then assign centered coordinates.
pub fn layout(graph: &CallGraph) -> GraphLayout {
    let n = graph.nodes.len();
    if n == 0 {
        return GraphLayout {
            nodes: Vec::new(),
            width: 2.0 * MARGIN,
            height: 2.0 * MARGIN,
        };
    }

    // Longest-path layering. Relaxation is capped at n passes so call cycles
    // cannot loop forever.
    let mut layer = vec![0_usize; n];
    for _ in 0..n {
        let mut changed = false;
        for e in &graph.edges {
            if e.from != e.to && layer[e.to] < layer[e.from] + 1 && layer[e.from] + 1 < n {
                layer[e.to] = layer[e.from] + 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let layer_count = layer.iter().copied().max().unwrap_or(0) + 1;
    let mut rows: Vec<Vec<usize>> = vec![Vec::new(); layer_count];
    for (node, &l) in layer.iter().enumerate() {
        rows[l].push(node);
    }

    order_by_barycenter(&mut rows, graph, &layer);

    let widths: Vec<f64> = graph
        .nodes
        .iter()
        .map(|node| (node.name.chars().count() as f64 * CHAR_WIDTH + 24.0).max(90.0))
        .collect();

    let row_width = |row: &[usize]| -> f64 {
        let total: f64 = row.iter().map(|&i| widths[i]).sum();
        total + H_GAP * (row.len().saturating_sub(1)) as f64
    };
    let canvas_width = rows
        .iter()
        .map(|row| row_width(row))
        .fold(0.0_f64, f64::max)
        + 2.0 * MARGIN;

    let mut placed = Vec::with_capacity(n);
    for (l, row) in rows.iter().enumerate() {
        let mut x = (canvas_width - row_width(row)) / 2.0;
        let y = MARGIN + l as f64 * (NODE_HEIGHT + V_GAP);
        for &node in row {
            placed.push(PlacedNode {
                node,
                x,
                y,
                width: widths[node],
                height: NODE_HEIGHT,
            });
            x += widths[node] + H_GAP;
        }
    }

    GraphLayout {
        nodes: placed,
        width: canvas_width,
        height: MARGIN * 2.0 + layer_count as f64 * NODE_HEIGHT + (layer_count - 1) as f64 * V_GAP,
    }
}

/// Two barycenter sweeps: order children under the mean position of their
/// callers, then callers over the mean position of their callees.
fn order_by_barycenter(rows: &mut [Vec<usize>], graph: &CallGraph, layer: &[usize]) {
    let position = |rows: &[Vec<usize>], node: usize| -> f64 {
        rows[layer[node]]
            .iter()
            .position(|&x| x == node)
            .unwrap_or(0) as f64
    };

    for pass in 0..2 {
        let snapshot: Vec<Vec<usize>> = rows.to_vec();
        for row in rows.iter_mut() {
            let mut keyed: Vec<(f64, usize)> = row
                .iter()
                .map(|&node| {
                    let neighbors: Vec<usize> = graph
                        .edges
                        .iter()
                        .filter_map(|e| {
                            if pass == 0 && e.to == node {
                                Some(e.from)
                            } else if pass == 1 && e.from == node {
                                Some(e.to)
                            } else {
                                None
                            }
                        })
                        .collect();
                    let key = if neighbors.is_empty() {
                        position(&snapshot, node)
                    } else {
                        neighbors
                            .iter()
                            .map(|&m| position(&snapshot, m))
                            .sum::<f64>()
                            / neighbors.len() as f64
                    };
                    (key, node)
                })
                .collect();
            keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            *row = keyed.into_iter().map(|(_, node)| node).collect();
        }
    }
}
