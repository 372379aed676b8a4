//! Raw profiling sample: per-function costs plus caller/callee edges.

use serde::{Deserialize, Serialize};

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use crate::{HotpathResult, PROFILE_FOOTER, StatKind};

pub const CURRENT_SAMPLE_VERSION: u32 = 1;

/// Cost record for one function observed during a capture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionRecord {
    pub name: String,
    pub call_count: u64,
    /// Time spent in the function's own code.
    pub internal: Duration,
    /// Time attributed to the function including its callees.
    pub cumulative: Duration,
}

/// One caller -> callee relationship with its call count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallEdge {
    pub caller: String,
    pub callee: String,
    pub call_count: u64,
}

/// Finalized capture output for exactly one test execution.
///
/// Function order is the sampler's native first-call order; the stats
/// printer's descending sorts break ties by that order. Immutable once
/// finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSample {
    pub format: String,
    pub version: u32,
    pub test_id: String,
    pub functions: Vec<FunctionRecord>,
    pub edges: Vec<CallEdge>,
}

impl ProfileSample {
    pub fn new(test_id: &str, functions: Vec<FunctionRecord>, edges: Vec<CallEdge>) -> Self {
        Self {
            format: "hotpath-sample".to_string(),
            version: CURRENT_SAMPLE_VERSION,
            test_id: test_id.to_string(),
            functions,
            edges,
        }
    }

    pub fn write_json(&self, path: &Path) -> HotpathResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> HotpathResult<Self> {
        let bytes = std::fs::read(path)?;
        let s: Self = serde_json::from_slice(&bytes)?;
        Ok(s)
    }

    fn metric(record: &FunctionRecord, kind: StatKind) -> Duration {
        match kind {
            StatKind::Cumulative => record.cumulative,
            StatKind::Internal => record.internal,
        }
    }

    /// Function records sorted descending by the given metric.
    ///
    /// The sort is stable, so equal costs keep native order.
    pub fn sorted_by(&self, kind: StatKind) -> Vec<&FunctionRecord> {
        let mut rows: Vec<&FunctionRecord> = self.functions.iter().collect();
        rows.sort_by(|a, b| Self::metric(b, kind).cmp(&Self::metric(a, kind)));
        rows
    }

    /// The sample's native stats pretty-printer.
    ///
    /// Writes the header for the sort mode, every function row descending by
    /// that metric, and the footer sentinel into the given sink.
    pub fn print_stats(&self, sink: &mut String, kind: StatKind) -> HotpathResult<()> {
        writeln!(sink, "{}", kind.header())?;
        writeln!(
            sink,
            "{:>10}  {:>10}  {:>10}  function",
            "calls", "internal", "cumulative"
        )?;
        for row in self.sorted_by(kind) {
            writeln!(
                sink,
                "{:>10}  {:>10.3}  {:>10.3}  {}",
                row.call_count,
                row.internal.as_secs_f64(),
                row.cumulative.as_secs_f64(),
                row.name
            )?;
        }
        writeln!(sink, "{PROFILE_FOOTER}")?;
        Ok(())
    }
}
