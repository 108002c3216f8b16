//! The opaque engine boundary: construction, evaluation, and teardown.

#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;
use phpad_session::VersionTriple;

use crate::error::EngineError;

/// Size of the reusable engine memory arena.
pub const ARENA_BYTES: usize = 128 * 1024 * 1024;

/// The fixed memory region every engine instance is constructed over. It is
/// zero-filled between uses; isolation does not depend on that (each sandbox
/// is also discarded outright), it guards engine-internal reuse paths.
pub struct MemoryArena {
    bytes: Mutex<Vec<u8>>,
}

impl MemoryArena {
    #[must_use]
    pub fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            bytes: Mutex::new(vec![0; size]),
        })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn zero_fill(&self) {
        self.bytes.lock().fill(0);
    }

    /// Run `f` over the raw arena contents (engine adapters use this to map
    /// the region into their instance).
    pub fn with_bytes<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.bytes.lock())
    }
}

impl std::fmt::Debug for MemoryArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryArena")
            .field("size", &self.size())
            .finish()
    }
}

/// Per-execution accumulator for the engine's two output channels. A fresh
/// collector is handed to every sandbox and explicitly drained after the
/// call returns; nothing accumulates across runs.
#[derive(Default)]
pub struct OutputCollector {
    stdout: Mutex<String>,
    stderr: Mutex<String>,
}

impl OutputCollector {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_stdout(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut buffer = self.stdout.lock();
        buffer.push_str(text);
        buffer.push('\n');
    }

    pub fn push_stderr(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut buffer = self.stderr.lock();
        buffer.push_str(text);
        buffer.push('\n');
    }

    /// Take both buffers, leaving the collector empty.
    #[must_use]
    pub fn drain(&self) -> (String, String) {
        (
            std::mem::take(&mut *self.stdout.lock()),
            std::mem::take(&mut *self.stderr.lock()),
        )
    }

    pub fn clear(&self) {
        self.stdout.lock().clear();
        self.stderr.lock().clear();
    }
}

impl std::fmt::Debug for OutputCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputCollector")
            .field("stdout_len", &self.stdout.lock().len())
            .field("stderr_len", &self.stderr.lock().len())
            .finish()
    }
}

/// A fetched, matched set of build artifacts ready to instantiate.
#[derive(Clone)]
pub struct EngineBuild {
    pub triple: VersionTriple,
    pub loader_script: Vec<u8>,
    pub wasm_binary: Vec<u8>,
}

impl std::fmt::Debug for EngineBuild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuild")
            .field("triple", &self.triple)
            .field("loader_script_len", &self.loader_script.len())
            .field("wasm_binary_len", &self.wasm_binary.len())
            .finish()
    }
}

/// Outcome of forced engine termination. Engines exit by raising their own
/// exit signal, so a raised-but-expected exception is a distinct success
/// variant rather than something swallowed in a blanket catch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The engine shut down without raising.
    Clean,
    /// The engine raised its ordinary exit signal.
    ExpectedExit,
    /// Termination itself failed; logged, never silently ignored.
    Failed(String),
}

/// One live engine instance. All program output arrives exclusively through
/// the collector registered at construction time.
pub trait Engine {
    /// The single exported call: evaluate the fully composed source and
    /// return the engine's integer status. A trap surfaces as
    /// [`EngineError::Aborted`].
    fn eval(&mut self, source: &str) -> Result<i32, EngineError>;

    /// Write a file into the instance's virtual filesystem.
    fn write_file(&mut self, name: &str, bytes: &[u8]) -> Result<(), EngineError>;

    /// Forcibly exit the engine.
    fn force_exit(&mut self) -> Termination;
}

/// Constructs engine instances from a fetched build. Output hooks and the
/// memory arena are bound here, at construction time.
pub trait EngineFactory: Send {
    fn instantiate(
        &self,
        build: &EngineBuild,
        arena: &Arc<MemoryArena>,
        output: &Arc<OutputCollector>,
    ) -> Result<Box<dyn Engine>, EngineError>;
}

/// Network boundary for fetching build artifacts and analyzer archives.
pub trait BuildSource: Send {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_drains_to_empty() {
        let collector = OutputCollector::new();
        collector.push_stdout("hello");
        collector.push_stderr("warning");
        collector.push_stdout("");
        let (out, err) = collector.drain();
        assert_eq!(out, "hello\n");
        assert_eq!(err, "warning\n");
        let (out, err) = collector.drain();
        assert!(out.is_empty() && err.is_empty());
    }

    #[test]
    fn arena_zero_fill_clears_residue() {
        let arena = MemoryArena::new(16);
        arena.with_bytes(|bytes| bytes[3] = 0xAB);
        arena.zero_fill();
        arena.with_bytes(|bytes| assert!(bytes.iter().all(|b| *b == 0)));
    }
}
