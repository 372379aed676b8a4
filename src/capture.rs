//! Scoped instrumentation around a single test body.

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::{CallEdge, FunctionRecord, HotpathError, HotpathResult, NamingScheme, ProfileSample};

/// Call-recording sampler handed to a profiled test body.
///
/// Test code opens a [`SpanGuard`] per function call; the guard records the
/// call on drop, so timing closes on every exit path including unwinding.
/// Single-threaded by design: one recorder serves one capture session.
#[derive(Debug, Default)]
pub struct Recorder {
    state: RefCell<RecorderState>,
}

#[derive(Debug, Default)]
struct RecorderState {
    names: Vec<String>,
    index: HashMap<String, usize>,
    totals: Vec<FnTotals>,
    edge_order: Vec<(usize, usize)>,
    edge_counts: HashMap<(usize, usize), u64>,
    stack: Vec<Frame>,
}

#[derive(Debug, Default, Clone, Copy)]
struct FnTotals {
    calls: u64,
    internal: Duration,
    cumulative: Duration,
}

#[derive(Debug)]
struct Frame {
    func: usize,
    started: Instant,
    child: Duration,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a function. The returned guard closes the frame on drop.
    pub fn span(&self, name: &str) -> SpanGuard<'_> {
        let mut state = self.state.borrow_mut();
        let func = state.intern(name);
        state.totals[func].calls += 1;
        if let Some(parent) = state.stack.last() {
            let key = (parent.func, func);
            if !state.edge_counts.contains_key(&key) {
                state.edge_order.push(key);
            }
            *state.edge_counts.entry(key).or_insert(0) += 1;
        }
        state.stack.push(Frame {
            func,
            started: Instant::now(),
            child: Duration::ZERO,
        });
        SpanGuard { recorder: self }
    }

    fn exit(&self) {
        let mut state = self.state.borrow_mut();
        let Some(frame) = state.stack.pop() else {
            return;
        };
        let elapsed = frame.started.elapsed();
        let own = elapsed.checked_sub(frame.child).unwrap_or(Duration::ZERO);
        state.totals[frame.func].cumulative += elapsed;
        state.totals[frame.func].internal += own;
        if let Some(parent) = state.stack.last_mut() {
            parent.child += elapsed;
        }
    }

    /// Finalize the session into an immutable sample.
    ///
    /// Function and edge order is first-observation order, which the stats
    /// printer uses as its stable tie-break.
    pub fn finish(self, test_id: &str) -> ProfileSample {
        let state = self.state.into_inner();
        let functions = state
            .names
            .iter()
            .zip(state.totals.iter())
            .map(|(name, totals)| FunctionRecord {
                name: name.clone(),
                call_count: totals.calls,
                internal: totals.internal,
                cumulative: totals.cumulative,
            })
            .collect();
        let edges = state
            .edge_order
            .iter()
            .map(|key| CallEdge {
                caller: state.names[key.0].clone(),
                callee: state.names[key.1].clone(),
                call_count: state.edge_counts[key],
            })
            .collect();
        ProfileSample::new(test_id, functions, edges)
    }
}

impl RecorderState {
    fn intern(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        self.totals.push(FnTotals::default());
        idx
    }
}

/// Open frame on the recorder stack; closes itself on drop.
#[derive(Debug)]
pub struct SpanGuard<'a> {
    recorder: &'a Recorder,
}

impl Drop for SpanGuard<'_> {
    fn drop(&mut self) {
        self.recorder.exit();
    }
}

/// Result of bracketing one test body with instrumentation.
#[derive(Debug)]
pub struct CaptureOutcome<T> {
    /// The body's return value, or the panic payload if it unwound.
    pub result: std::thread::Result<T>,
    pub sample: ProfileSample,
    /// Where the sample was persisted; `None` when the artifact path was too
    /// long for the filesystem and profiling degraded for this test.
    pub sample_path: Option<PathBuf>,
}

/// Brackets a test's call phase with sampling instrumentation.
#[derive(Debug)]
pub struct ProfileCapture<'a> {
    naming: &'a NamingScheme,
}

impl<'a> ProfileCapture<'a> {
    pub fn new(naming: &'a NamingScheme) -> Self {
        Self { naming }
    }

    /// Run `body` under instrumentation and finalize a sample regardless of
    /// whether the body panicked. The test itself appears in the sample as a
    /// root frame named by `test_id`.
    pub fn run<T>(
        &self,
        test_id: &str,
        body: impl FnOnce(&Recorder) -> T,
    ) -> HotpathResult<CaptureOutcome<T>> {
        let recorder = Recorder::new();
        let result = {
            let root = recorder.span(test_id);
            let r = catch_unwind(AssertUnwindSafe(|| body(&recorder)));
            drop(root);
            r
        };
        let sample = recorder.finish(test_id);
        let sample_path = self.persist(test_id, &sample)?;
        Ok(CaptureOutcome {
            result,
            sample,
            sample_path,
        })
    }

    fn persist(&self, test_id: &str, sample: &ProfileSample) -> HotpathResult<Option<PathBuf>> {
        let path = self.naming.sample_path(test_id);
        match sample.write_json(&path) {
            Ok(()) => Ok(Some(path)),
            Err(HotpathError::Io(err)) if name_too_long(&err) => {
                tracing::warn!(
                    "sample path too long, profiling degrades for {test_id:?}: {}",
                    path.display()
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

fn name_too_long(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::InvalidFilename || err.raw_os_error() == Some(36)
}
