//! Test doubles for the external tools.

use crate::error::TaskFailure;
use crate::progress::ProgressSink;
use crate::task::TaskOutcome;
use crate::tools::{Invocation, ToolRunner};
use flate2::write::GzEncoder;
use flate2::Compression;
use neuroprep_files::{gz_sibling_path, is_gzip_path};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) fn write_gz(path: &Path, payload: &[u8]) {
    let file = File::create(path).expect("create gz output");
    let mut encoder = GzEncoder::new(file, Compression::fast());
    encoder.write_all(payload).expect("write gz output");
    encoder.finish().expect("finish gz output");
}

/// Stand-in for N4/bet/flirt that writes a fixed payload to the requested output.
///
/// Behaviour is keyed on the input file name so one runner can serve a whole batch.
pub(crate) struct FakeTool {
    fail_on: Vec<String>,
    panic_on: Vec<String>,
    payload: Option<Vec<u8>>,
    raw: bool,
    uncompressed: bool,
    partial_on_failure: bool,
    calls: AtomicUsize,
}

impl FakeTool {
    pub(crate) const PAYLOAD: &'static [u8] = b"processed volume";

    pub(crate) fn succeeding() -> Self {
        Self {
            fail_on: Vec::new(),
            panic_on: Vec::new(),
            payload: Some(Self::PAYLOAD.to_vec()),
            raw: false,
            uncompressed: false,
            partial_on_failure: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_on(names: &[&str]) -> Self {
        Self {
            fail_on: names.iter().map(|n| n.to_string()).collect(),
            ..Self::succeeding()
        }
    }

    pub(crate) fn panicking_on(names: &[&str]) -> Self {
        Self {
            panic_on: names.iter().map(|n| n.to_string()).collect(),
            ..Self::succeeding()
        }
    }

    /// Reports success and writes `payload` (gzip-encoded for `.gz` outputs).
    pub(crate) fn writing(payload: &[u8]) -> Self {
        Self {
            payload: Some(payload.to_vec()),
            ..Self::succeeding()
        }
    }

    /// Reports success without writing anything.
    pub(crate) fn silent() -> Self {
        Self {
            payload: None,
            ..Self::succeeding()
        }
    }

    /// Writes `bytes` verbatim, even where gzip is expected.
    pub(crate) fn writing_raw(self, bytes: &[u8]) -> Self {
        Self {
            payload: Some(bytes.to_vec()),
            raw: true,
            ..self
        }
    }

    /// Writes the derivative itself instead of the requested `.gz`, like FSL tools run with
    /// `FSLOUTPUTTYPE=NIFTI`.
    pub(crate) fn writing_uncompressed(self) -> Self {
        Self {
            uncompressed: true,
            ..self
        }
    }

    /// Failing invocations leave a truncated output behind, like a crashed tool would.
    pub(crate) fn leaving_partial_output(self) -> Self {
        Self {
            partial_on_failure: true,
            ..self
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ToolRunner for FakeTool {
    fn run(&self, invocation: &Invocation) -> Result<(), TaskFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let name = invocation
            .input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        if self.panic_on.contains(&name) {
            panic!("simulated crash on {name}");
        }

        if self.fail_on.contains(&name) {
            if self.partial_on_failure {
                let target = if self.uncompressed && is_gzip_path(&invocation.output) {
                    gz_sibling_path(&invocation.output).expect("gz output path")
                } else {
                    invocation.output.clone()
                };
                fs::write(target, b"\x1f\x8b partial").expect("write partial output");
            }
            return Err(TaskFailure::ToolExit {
                program: invocation.program.clone(),
                status: "exit status: 1".into(),
                stderr: format!("simulated failure on {name}"),
            });
        }

        if let Some(payload) = &self.payload {
            if self.uncompressed && is_gzip_path(&invocation.output) {
                let plain = gz_sibling_path(&invocation.output).expect("gz output path");
                fs::write(plain, payload).expect("write uncompressed output");
            } else if is_gzip_path(&invocation.output) && !self.raw {
                write_gz(&invocation.output, payload);
            } else {
                fs::write(&invocation.output, payload).expect("write fake output");
            }
        }

        Ok(())
    }
}

/// Progress sink that records every signal it receives.
#[derive(Default)]
pub(crate) struct RecordingProgress {
    pub(crate) total: Option<usize>,
    pub(crate) advanced: usize,
    pub(crate) failures_seen: usize,
    pub(crate) finished: bool,
}

impl ProgressSink for RecordingProgress {
    fn start(&mut self, total: usize) {
        self.total = Some(total);
    }

    fn advance(&mut self, outcome: &TaskOutcome) {
        self.advanced += 1;
        if !outcome.is_success() {
            self.failures_seen += 1;
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}
