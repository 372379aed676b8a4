//! Hotpath core library: per-test profiling capture and HTML report assembly.
//!
//! Brackets a test's call phase with sampling instrumentation, turns the raw
//! sample into sorted statistics views and pruned call-graph renderings, and
//! packages the results as report fragments keyed to that test.

mod callgraph;
mod capture;
mod engine;
mod error;
mod html;
mod layout;
mod naming;
mod options;
mod render;
mod report;
mod sample;
mod stats;

pub use callgraph::*;
pub use capture::*;
pub use engine::*;
pub use error::*;
pub use html::*;
pub use layout::*;
pub use naming::*;
pub use options::*;
pub use render::*;
pub use report::*;
pub use sample::*;
pub use stats::*;
