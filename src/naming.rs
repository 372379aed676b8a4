//! Deterministic artifact naming for per-test profiling output.

use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::macros::format_description;

use crate::HotpathResult;

pub const SAMPLE_FILENAME: &str = "test.cprof";
pub const DOT_SUFFIX: &str = "dot";
pub const GRAPH_SUFFIX: &str = "png";

/// Which metric a statistics view is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Cumulative,
    Internal,
}

impl StatKind {
    pub fn all() -> [Self; 2] {
        [Self::Cumulative, Self::Internal]
    }

    /// Stable label used in artifact anchors.
    pub fn label(self) -> &'static str {
        match self {
            Self::Cumulative => "cumulative",
            Self::Internal => "time",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            Self::Cumulative => "--- PROFILE (SORTED BY CUMULATIVE TIME) ---",
            Self::Internal => "--- PROFILE (SORTED BY INTERNAL TIME) ---",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Cumulative => "Profiling report (cumulative time)",
            Self::Internal => "Profiling report (internal time)",
        }
    }
}

pub const PROFILE_FOOTER: &str = "--- END PROFILE ---";

/// The three fixed call-graph pruning variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneVariant {
    PrunedCumulative,
    PrunedInternal,
    NonPruned,
}

impl PruneVariant {
    /// Fixed report order for graph artifacts.
    pub fn all() -> [Self; 3] {
        [Self::PrunedCumulative, Self::PrunedInternal, Self::NonPruned]
    }

    /// File stem shared by the `.dot` and `.png` artifacts.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::PrunedCumulative => "call_graph_pruned_cumulative",
            Self::PrunedInternal => "call_graph_pruned_internal",
            Self::NonPruned => "call_graph_non_pruned",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::PrunedCumulative => "Call-graph (pruned, colored by cumulative time)",
            Self::PrunedInternal => "Call-graph (pruned, colored by internal time)",
            Self::NonPruned => "Call-graph (not pruned, colored by cumulative time)",
        }
    }
}

/// Maps test identifiers to filesystem-safe artifact paths for one run.
///
/// The session stamp is fixed at construction, so every lookup for a given
/// test id yields the same paths for the lifetime of the scheme. Two distinct
/// test ids that sanitize to the same segment share a directory; the last
/// writer wins.
#[derive(Debug, Clone)]
pub struct NamingScheme {
    run_root: PathBuf,
}

impl NamingScheme {
    pub fn new(profile_root: &Path, session_start: OffsetDateTime) -> HotpathResult<Self> {
        let stamp = session_start.format(format_description!(
            "[year]_[month]_[day]_[hour]_[minute]_[second]"
        ))?;
        Ok(Self {
            run_root: profile_root.join(stamp),
        })
    }

    /// Replace filesystem-hostile characters with underscores.
    pub fn sanitize(test_id: &str) -> String {
        test_id
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.' => c,
                _ => '_',
            })
            .collect()
    }

    pub fn run_root(&self) -> &Path {
        &self.run_root
    }

    pub fn test_dir(&self, test_id: &str) -> PathBuf {
        self.run_root.join(Self::sanitize(test_id))
    }

    pub fn sample_path(&self, test_id: &str) -> PathBuf {
        self.test_dir(test_id).join(SAMPLE_FILENAME)
    }

    pub fn dot_path(&self, test_id: &str, variant: PruneVariant) -> PathBuf {
        self.test_dir(test_id)
            .join(format!("{}.{DOT_SUFFIX}", variant.file_stem()))
    }

    pub fn graph_path(&self, test_id: &str, variant: PruneVariant) -> PathBuf {
        self.test_dir(test_id)
            .join(format!("{}.{GRAPH_SUFFIX}", variant.file_stem()))
    }
}
