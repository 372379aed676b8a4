//! Rasterizes a call-graph IR to a PNG via an SVG intermediate.

use std::path::PathBuf;

use crate::layout::{GraphLayout, layout};
use crate::{CallGraph, HotpathError, HotpathResult, NamingScheme, escape_html};

/// Lays out and rasterizes call graphs to the paths given by the naming
/// scheme.
///
/// No timeout exists for any stage; laying out a very large graph blocks the
/// caller until it completes.
#[derive(Debug)]
pub struct GraphRenderer<'a> {
    naming: &'a NamingScheme,
}

impl<'a> GraphRenderer<'a> {
    pub fn new(naming: &'a NamingScheme) -> Self {
        Self { naming }
    }

    /// Render `graph` and write the image; returns the image path.
    pub fn render(&self, graph: &CallGraph) -> HotpathResult<PathBuf> {
        let placed = layout(graph);
        let svg = graph_svg(graph, &placed);
        let width = placed.width.ceil().clamp(1.0, 4096.0) as u32;
        let height = placed.height.ceil().clamp(1.0, 4096.0) as u32;
        let bytes = rasterize(&svg, width, height)?;
        let path = self.naming.graph_path(&graph.test_id, graph.variant);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

fn graph_svg(graph: &CallGraph, placed: &GraphLayout) -> String {
    use std::fmt::Write as _;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        "<svg xmlns='http://www.w3.org/2000/svg' width='{:.0}' height='{:.0}' \
         viewBox='0 0 {:.0} {:.0}'>",
        placed.width, placed.height, placed.width, placed.height
    );
    let _ = writeln!(svg, "  <defs>");
    let _ = writeln!(
        svg,
        "    <marker id='arrow' viewBox='0 0 10 10' refX='9' refY='5' \
         markerWidth='7' markerHeight='7' orient='auto-start-reverse'>"
    );
    let _ = writeln!(svg, "      <path d='M 0 0 L 10 5 L 0 10 z' fill='#555555'/>");
    let _ = writeln!(svg, "    </marker>");
    let _ = writeln!(svg, "  </defs>");
    let _ = writeln!(
        svg,
        "  <rect width='100%' height='100%' fill='#ffffff'/>"
    );

    if graph.nodes.is_empty() {
        let _ = writeln!(
            svg,
            "  <text x='{:.0}' y='{:.0}' font-family='Helvetica, sans-serif' \
             font-size='13' fill='#333333'>empty call graph</text>",
            12.0, 24.0
        );
        svg.push_str("</svg>\n");
        return svg;
    }

    let max_weight = graph.edges.iter().map(|e| e.weight).max().unwrap_or(1).max(1);
    for edge in &graph.edges {
        let from = placed.placed(edge.from);
        let to = placed.placed(edge.to);
        let stroke = 1.0 + 2.0 * edge.weight as f64 / max_weight as f64;
        let x1 = from.x + from.width / 2.0;
        let y1 = from.y + from.height;
        let x2 = to.x + to.width / 2.0;
        let y2 = to.y;
        let _ = writeln!(
            svg,
            "  <line x1='{x1:.1}' y1='{y1:.1}' x2='{x2:.1}' y2='{y2:.1}' \
             stroke='#555555' stroke-width='{stroke:.2}' marker-end='url(#arrow)'/>"
        );
        let _ = writeln!(
            svg,
            "  <text x='{:.1}' y='{:.1}' font-family='Helvetica, sans-serif' \
             font-size='10' fill='#555555'>{}</text>",
            (x1 + x2) / 2.0 + 4.0,
            (y1 + y2) / 2.0,
            edge.weight
        );
    }

    for p in &placed.nodes {
        let node = &graph.nodes[p.node];
        let _ = writeln!(
            svg,
            "  <rect x='{:.1}' y='{:.1}' width='{:.1}' height='{:.1}' rx='6' \
             fill='{}' stroke='#333333'/>",
            p.x,
            p.y,
            p.width,
            p.height,
            node.color.hex()
        );
        let cx = p.x + p.width / 2.0;
        let _ = writeln!(
            svg,
            "  <text x='{cx:.1}' y='{:.1}' text-anchor='middle' \
             font-family='Helvetica, sans-serif' font-size='12' fill='#ffffff'>{}</text>",
            p.y + 20.0,
            escape_html(&node.name)
        );
        let _ = writeln!(
            svg,
            "  <text x='{cx:.1}' y='{:.1}' text-anchor='middle' \
             font-family='Helvetica, sans-serif' font-size='10' fill='#ffffff'>\
             {:.3}s cum ({:.1}%)</text>",
            p.y + 34.0,
            node.cumulative.as_secs_f64(),
            node.ratio * 100.0
        );
        let _ = writeln!(
            svg,
            "  <text x='{cx:.1}' y='{:.1}' text-anchor='middle' \
             font-family='Helvetica, sans-serif' font-size='10' fill='#ffffff'>\
             {:.3}s self, {} calls</text>",
            p.y + 46.0,
            node.internal.as_secs_f64(),
            node.call_count
        );
    }

    svg.push_str("</svg>\n");
    svg
}

fn rasterize(svg: &str, width: u32, height: u32) -> HotpathResult<Vec<u8>> {
    use png::{BitDepth, ColorType, Encoder};
    use tiny_skia::{Pixmap, Transform};
    use usvg::{Options, Tree};

    let mut options = Options::default();
    options.fontdb_mut().load_system_fonts();

    let tree: Tree = Tree::from_data(svg.as_bytes(), &options)
        .map_err(|err| HotpathError::Render(format!("svg parse failed: {err}")))?;

    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| HotpathError::Render(format!("pixmap allocation failed ({width}x{height})")))?;
    resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

    let mut out = Vec::new();
    let mut encoder = Encoder::new(&mut out, width, height);
    encoder.set_color(ColorType::Rgba);
    encoder.set_depth(BitDepth::Eight);
    encoder
        .write_header()
        .map_err(|err| HotpathError::Render(err.to_string()))?
        .write_image_data(pixmap.data())
        .map_err(|err| HotpathError::Render(err.to_string()))?;
    Ok(out)
}
