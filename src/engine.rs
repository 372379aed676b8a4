//! Orchestrates profiling around the host runner's test hooks.

use std::collections::HashMap;
use std::path::PathBuf;

use time::OffsetDateTime;

use crate::{
    ArtifactBody, ArtifactKind, CallGraphBuilder, GraphRenderer, HotpathError, HotpathResult,
    NamingScheme, Options, ProfileCapture, ProfileSample, PruneVariant, Recorder, ReportArtifact,
    ReportAssembler, StatKind, StatsReporter, TestProfileRecord,
};

/// Per-run profiling engine.
///
/// The host runner calls [`ProfilingEngine::profile_call`] around each test's
/// call phase and [`ProfilingEngine::finalize_test`] when that test's report
/// row is assembled; no other invocation order is assumed. Setup and teardown
/// phases are not instrumented. Single-threaded: one capture session is
/// active at any moment.
#[derive(Debug)]
pub struct ProfilingEngine {
    options: Options,
    naming: NamingScheme,
    records: HashMap<String, TestProfileRecord>,
}

impl ProfilingEngine {
    pub fn new(options: Options) -> HotpathResult<Self> {
        Self::with_session_start(options, OffsetDateTime::now_utc())
    }

    /// Engine with an explicit session stamp, for deterministic paths.
    pub fn with_session_start(
        options: Options,
        session_start: OffsetDateTime,
    ) -> HotpathResult<Self> {
        if options.profiling {
            std::fs::create_dir_all(&options.profile_dir)?;
        }
        let naming = NamingScheme::new(&options.profile_dir, session_start)?;
        Ok(Self {
            options,
            naming,
            records: HashMap::new(),
        })
    }

    pub fn naming(&self) -> &NamingScheme {
        &self.naming
    }

    /// Run one test body under instrumentation and collect its artifacts.
    ///
    /// Panics from the body are re-raised after the sample is finalized and
    /// artifacts are generated, so a failing test still gets its row data.
    pub fn profile_call<T>(
        &mut self,
        test_id: &str,
        body: impl FnOnce(&Recorder) -> T,
    ) -> HotpathResult<T> {
        if !self.options.profiling {
            let recorder = Recorder::new();
            return Ok(body(&recorder));
        }

        let outcome = ProfileCapture::new(&self.naming).run(test_id, body)?;
        let mut record = TestProfileRecord::new(test_id);
        match &outcome.sample_path {
            Some(_) => self.generate_artifacts(&outcome.sample, &mut record)?,
            None => record.omissions.push(
                "artifact path exceeded filesystem name limits; profiling skipped".to_string(),
            ),
        }
        self.records.insert(test_id.to_string(), record);

        match outcome.result {
            Ok(value) => Ok(value),
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }

    fn generate_artifacts(
        &self,
        sample: &ProfileSample,
        record: &mut TestProfileRecord,
    ) -> HotpathResult<()> {
        for kind in StatKind::all() {
            record.stats.push(StatsReporter::artifact(sample, kind)?);
        }
        if !self.options.call_graph {
            return Ok(());
        }
        let renderer = GraphRenderer::new(&self.naming);
        for variant in PruneVariant::all() {
            let graph = CallGraphBuilder::new(sample).build(variant);
            graph.write_dot(&self.naming.dot_path(&sample.test_id, variant))?;
            match renderer.render(&graph) {
                Ok(path) => record.graphs.push(graph_artifact(variant, path)),
                Err(HotpathError::Render(err)) => {
                    // Skip-and-record: one unrenderable graph must not take
                    // down the test's remaining artifacts.
                    tracing::warn!(
                        "skipping {} for {:?}: {err}",
                        variant.file_stem(),
                        sample.test_id
                    );
                    record
                        .omissions
                        .push(format!("{}: {err}", variant.file_stem()));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Extra HTML fragments for a finalized test's report row.
    ///
    /// Unknown test ids yield no fragments; the row simply has no profiling
    /// section.
    pub fn finalize_test(&self, test_id: &str, assembler: &ReportAssembler) -> Vec<String> {
        match self.records.get(test_id) {
            Some(record) => assembler.extras(record),
            None => Vec::new(),
        }
    }

    pub fn record(&self, test_id: &str) -> Option<&TestProfileRecord> {
        self.records.get(test_id)
    }
}

fn graph_artifact(variant: PruneVariant, path: PathBuf) -> ReportArtifact {
    ReportArtifact {
        kind: ArtifactKind::GraphImage,
        label: variant.file_stem().to_string(),
        title: variant.title().to_string(),
        body: ArtifactBody::File(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use time::macros::datetime;
    use uuid::Uuid;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hotpath-engine-{name}-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    fn engine(root: &Path, call_graph: bool) -> ProfilingEngine {
        ProfilingEngine::with_session_start(
            Options {
                profiling: true,
                call_graph,
                profile_dir: root.to_path_buf(),
            },
            datetime!(2026-03-01 10:00:00 UTC),
        )
        .expect("engine")
    }

    fn run_loop_test(engine: &mut ProfilingEngine) {
        engine
            .profile_call("test_loop", |rec| {
                for _ in 0..100 {
                    let _guard = rec.span("helpers::do_work");
                }
            })
            .expect("profile call");
    }

    #[test]
    fn profiled_test_produces_stats_and_graph_artifacts() {
        let root = temp_dir("full");
        let mut engine = engine(&root, true);
        run_loop_test(&mut engine);

        let record = engine.record("test_loop").expect("record");
        assert_eq!(record.stats.len(), 2);
        assert_eq!(record.graphs.len(), 3);
        assert!(record.omissions.is_empty());

        let test_dir = engine.naming().test_dir("test_loop");
        assert!(test_dir.join("test.cprof").exists());
        for variant in PruneVariant::all() {
            assert!(test_dir.join(format!("{}.dot", variant.file_stem())).exists());
            assert!(test_dir.join(format!("{}.png", variant.file_stem())).exists());
        }
    }

    #[test]
    fn finalize_emits_five_fragments_in_fixed_order() {
        let root = temp_dir("finalize");
        let mut engine = engine(&root, true);
        run_loop_test(&mut engine);

        let assembler = ReportAssembler::new(&root.join("report.html"));
        let extras = engine.finalize_test("test_loop", &assembler);
        assert_eq!(extras.len(), 5);
        assert!(extras[0].contains("test_loop.cumulative"));
        assert!(extras[1].contains("test_loop.time"));
        assert!(extras[2].contains("test_loop.call_graph_pruned_cumulative"));
        assert!(extras[3].contains("test_loop.call_graph_pruned_internal"));
        assert!(extras[4].contains("test_loop.call_graph_non_pruned"));
        // Image links are relative to the report's directory.
        assert!(extras[4].contains("src=\"2026_03_01_10_00_00/test_loop/call_graph_non_pruned.png\""));
    }

    #[test]
    fn stats_only_when_call_graphs_disabled() {
        let root = temp_dir("stats-only");
        let mut engine = engine(&root, false);
        run_loop_test(&mut engine);
        let record = engine.record("test_loop").expect("record");
        assert_eq!(record.stats.len(), 2);
        assert!(record.graphs.is_empty());
    }

    #[test]
    fn panicking_test_still_gets_artifacts_and_repanics() {
        let root = temp_dir("panic");
        let engine_cell = std::cell::RefCell::new(engine(&root, false));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine_cell
                .borrow_mut()
                .profile_call("test_fail", |rec| {
                    let _guard = rec.span("helpers::broken");
                    panic!("expected failure");
                })
                .expect("capture itself succeeds");
        }));
        assert!(result.is_err());
        let engine = engine_cell.borrow();
        let record = engine.record("test_fail").expect("record survives panic");
        assert_eq!(record.stats.len(), 2);
    }

    #[test]
    fn name_too_long_leaves_row_without_profiling_section() {
        let root = temp_dir("degrade");
        let mut engine = engine(&root, true);
        let long_id = "t".repeat(300);
        engine.profile_call(&long_id, |_rec| ()).expect("degrades");
        let record = engine.record(&long_id).expect("record");
        assert!(record.stats.is_empty());
        assert!(record.graphs.is_empty());
        assert_eq!(record.omissions.len(), 1);
        let assembler = ReportAssembler::new(&root.join("report.html"));
        let extras = engine.finalize_test(&long_id, &assembler);
        // Only the degradation banner remains.
        assert_eq!(extras.len(), 1);
        assert!(extras[0].contains("profiling-omissions"));
    }

    #[test]
    fn unknown_test_finalizes_to_no_fragments() {
        let root = temp_dir("unknown");
        let engine = engine(&root, false);
        let assembler = ReportAssembler::new(&root.join("report.html"));
        assert!(engine.finalize_test("never_ran", &assembler).is_empty());
    }

    #[test]
    fn colliding_sanitized_ids_overwrite_same_sample_path() {
        let root = temp_dir("collide");
        let mut engine = engine(&root, false);
        // "t a" and "t:a" both sanitize to "t_a"; last writer wins.
        engine.profile_call("t a", |_rec| ()).expect("first");
        engine.profile_call("t:a", |_rec| ()).expect("second");
        assert_eq!(
            engine.naming().sample_path("t a"),
            engine.naming().sample_path("t:a")
        );
        let sample =
            ProfileSample::read_json(&engine.naming().sample_path("t a")).expect("read sample");
        assert_eq!(sample.test_id, "t:a");
    }

    #[test]
    fn disabled_profiling_runs_body_without_records() {
        let root = temp_dir("disabled");
        let mut engine = ProfilingEngine::with_session_start(
            Options {
                profiling: false,
                call_graph: true,
                profile_dir: root.join("never-created"),
            },
            datetime!(2026-03-01 10:00:00 UTC),
        )
        .expect("engine");
        let out = engine.profile_call("test_off", |_rec| 41 + 1).expect("runs");
        assert_eq!(out, 42);
        assert!(engine.record("test_off").is_none());
        assert!(!root.join("never-created").exists());
    }
}
