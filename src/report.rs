//! Packages per-test artifacts into HTML report fragments.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

use crate::html::{collapsible_fragment, img_block, omission_banner, pre_block};

/// Kind of report content an artifact carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    StatsText,
    GraphImage,
}

/// Body of an artifact: inline HTML-safe text or a file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactBody {
    Inline(String),
    File(PathBuf),
}

/// One labeled unit of report content belonging to a single test.
///
/// `label` is unique per artifact kind within a test, making the derived
/// anchor `<test-id>.<label>` unique within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub kind: ArtifactKind,
    pub label: String,
    pub title: String,
    pub body: ArtifactBody,
}

/// All profiling output collected for one test, owned explicitly rather than
/// held in ambient per-run dictionaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestProfileRecord {
    pub test_id: String,
    /// Stats artifacts in report order: cumulative, then internal.
    pub stats: Vec<ReportArtifact>,
    /// Graph artifacts in report order: pruned-cumulative, pruned-internal,
    /// non-pruned.
    pub graphs: Vec<ReportArtifact>,
    /// Artifacts skipped for this test, surfaced in a banner fragment.
    pub omissions: Vec<String>,
}

impl TestProfileRecord {
    pub fn new(test_id: &str) -> Self {
        Self {
            test_id: test_id.to_string(),
            ..Self::default()
        }
    }
}

/// Assembles a test's record into the "extra" fragments the base report
/// appends to that test's row.
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    report_path: PathBuf,
}

impl ReportAssembler {
    /// `report_path` is the base report's own output file; image links are
    /// computed relative to its directory.
    pub fn new(report_path: &Path) -> Self {
        Self {
            report_path: report_path.to_path_buf(),
        }
    }

    /// Fragments for one finalized test, in the fixed order
    /// [cumulative stats, internal stats, pruned-cumulative graph,
    /// pruned-internal graph, non-pruned graph], followed by a degradation
    /// banner when anything was skipped.
    pub fn extras(&self, record: &TestProfileRecord) -> Vec<String> {
        let mut out = Vec::new();
        for artifact in record.stats.iter().chain(record.graphs.iter()) {
            out.push(self.fragment(&record.test_id, artifact));
        }
        if !record.omissions.is_empty() {
            out.push(omission_banner(&record.omissions));
        }
        out
    }

    fn fragment(&self, test_id: &str, artifact: &ReportArtifact) -> String {
        let anchor = format!("{test_id}.{}", artifact.label);
        let body = match &artifact.body {
            ArtifactBody::Inline(text) => pre_block(text),
            ArtifactBody::File(path) => img_block(&self.relative_to_report(path)),
        };
        collapsible_fragment(&anchor, &artifact.title, &body)
    }

    fn relative_to_report(&self, target: &Path) -> String {
        let report_dir = self.report_path.parent().unwrap_or(Path::new("."));
        relative_path(report_dir, target)
            .to_string_lossy()
            .into_owned()
    }
}

/// Path from `base` (a directory) to `target`, via the deepest common prefix.
fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base_parts: Vec<_> = base.components().collect();
    let target_parts: Vec<_> = target.components().collect();
    let common = base_parts
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut out = PathBuf::new();
    for _ in common..base_parts.len() {
        out.push("..");
    }
    for part in &target_parts[common..] {
        out.push(part);
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_artifact(label: &str) -> ReportArtifact {
        ReportArtifact {
            kind: ArtifactKind::StatsText,
            label: label.to_string(),
            title: format!("Profiling report ({label})"),
            body: ArtifactBody::Inline("escaped stats".to_string()),
        }
    }

    fn graph_artifact(stem: &str, path: &str) -> ReportArtifact {
        ReportArtifact {
            kind: ArtifactKind::GraphImage,
            label: stem.to_string(),
            title: format!("Call-graph ({stem})"),
            body: ArtifactBody::File(PathBuf::from(path)),
        }
    }

    #[test]
    fn extras_follow_fixed_artifact_order() {
        let assembler = ReportAssembler::new(Path::new("out/report.html"));
        let mut record = TestProfileRecord::new("test_a");
        record.stats = vec![stats_artifact("cumulative"), stats_artifact("time")];
        record.graphs = vec![
            graph_artifact("call_graph_pruned_cumulative", "out/p/a/x.png"),
            graph_artifact("call_graph_pruned_internal", "out/p/a/y.png"),
            graph_artifact("call_graph_non_pruned", "out/p/a/z.png"),
        ];
        let extras = assembler.extras(&record);
        assert_eq!(extras.len(), 5);
        assert!(extras[0].contains("test_a.cumulative"));
        assert!(extras[1].contains("test_a.time"));
        assert!(extras[2].contains("test_a.call_graph_pruned_cumulative"));
        assert!(extras[4].contains("test_a.call_graph_non_pruned"));
    }

    #[test]
    fn graph_fragments_link_relative_to_report_dir() {
        let assembler = ReportAssembler::new(Path::new("out/report.html"));
        let mut record = TestProfileRecord::new("test_a");
        record.graphs = vec![graph_artifact(
            "call_graph_non_pruned",
            "profiles/2026_01_01_00_00_00/test_a/call_graph_non_pruned.png",
        )];
        let extras = assembler.extras(&record);
        assert!(extras[0].contains(
            "src=\"../profiles/2026_01_01_00_00_00/test_a/call_graph_non_pruned.png\""
        ));
    }

    #[test]
    fn omissions_append_a_banner_fragment() {
        let assembler = ReportAssembler::new(Path::new("report.html"));
        let mut record = TestProfileRecord::new("test_a");
        record.omissions.push("call_graph_non_pruned: oom".to_string());
        let extras = assembler.extras(&record);
        assert_eq!(extras.len(), 1);
        assert!(extras[0].contains("profiling-omissions"));
    }

    #[test]
    fn relative_path_walks_up_from_report_dir() {
        assert_eq!(
            relative_path(Path::new("a/b"), Path::new("a/c/x.png")),
            PathBuf::from("../c/x.png")
        );
        assert_eq!(
            relative_path(Path::new("a"), Path::new("a/x.png")),
            PathBuf::from("x.png")
        );
        assert_eq!(relative_path(Path::new("a"), Path::new("a")), PathBuf::from("."));
    }
}
