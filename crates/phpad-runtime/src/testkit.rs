//! Scripted engine doubles for lifecycle and orchestrator tests.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use phpad_session::VersionTriple;

use crate::engine::{
    BuildSource, Engine, EngineBuild, EngineFactory, MemoryArena, OutputCollector, Termination,
};
use crate::error::EngineError;
use crate::harness::RunMode;
use crate::orchestrator::{Notice, OutputRenderer};
use crate::sandbox::ExecutionResult;

/// One scripted engine call outcome.
#[derive(Debug, Clone)]
pub enum ScriptedEval {
    Succeed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    Abort(String),
}

impl ScriptedEval {
    #[must_use]
    pub fn ok(stdout: &str) -> Self {
        Self::Succeed {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }
}

#[derive(Default)]
struct ScriptedState {
    outcomes: Mutex<VecDeque<ScriptedEval>>,
    eval_calls: AtomicUsize,
    instantiate_calls: AtomicUsize,
    fail_instantiations: AtomicUsize,
    staged_files: Mutex<Vec<String>>,
    sources: Mutex<Vec<String>>,
}

/// Factory producing scripted engines; clone it to keep a handle for
/// assertions after boxing one copy into the manager.
#[derive(Clone, Default)]
pub struct ScriptedEngineFactory {
    state: Arc<ScriptedState>,
}

impl ScriptedEngineFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next engine call; unqueued calls succeed
    /// with exit code 0 and empty output.
    pub fn push_outcome(&self, outcome: ScriptedEval) {
        self.state.outcomes.lock().push_back(outcome);
    }

    /// Make the next `count` instantiations fail (spare pre-warm failures).
    pub fn fail_next_instantiations(&self, count: usize) {
        self.state
            .fail_instantiations
            .store(count, Ordering::SeqCst);
    }

    #[must_use]
    pub fn eval_calls(&self) -> usize {
        self.state.eval_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn instantiate_calls(&self) -> usize {
        self.state.instantiate_calls.load(Ordering::SeqCst)
    }

    /// Names of files staged into sandbox virtual filesystems, in order.
    #[must_use]
    pub fn staged_files(&self) -> Vec<String> {
        self.state.staged_files.lock().clone()
    }

    /// Composed sources handed to the engine, in call order.
    #[must_use]
    pub fn sources(&self) -> Vec<String> {
        self.state.sources.lock().clone()
    }
}

impl EngineFactory for ScriptedEngineFactory {
    fn instantiate(
        &self,
        _build: &EngineBuild,
        _arena: &Arc<MemoryArena>,
        output: &Arc<OutputCollector>,
    ) -> Result<Box<dyn Engine>, EngineError> {
        self.state.instantiate_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.state.fail_instantiations.load(Ordering::SeqCst);
        if remaining > 0 {
            self.state
                .fail_instantiations
                .store(remaining - 1, Ordering::SeqCst);
            return Err(EngineError::Init("scripted instantiation failure".to_string()));
        }
        Ok(Box::new(ScriptedEngine {
            state: Arc::clone(&self.state),
            output: Arc::clone(output),
        }))
    }
}

struct ScriptedEngine {
    state: Arc<ScriptedState>,
    output: Arc<OutputCollector>,
}

impl Engine for ScriptedEngine {
    fn eval(&mut self, source: &str) -> Result<i32, EngineError> {
        self.state.eval_calls.fetch_add(1, Ordering::SeqCst);
        self.state.sources.lock().push(source.to_string());
        let outcome = self
            .state
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| ScriptedEval::ok(""));
        match outcome {
            ScriptedEval::Succeed {
                exit_code,
                stdout,
                stderr,
            } => {
                self.output.push_stdout(&stdout);
                self.output.push_stderr(&stderr);
                Ok(exit_code)
            }
            ScriptedEval::Abort(reason) => Err(EngineError::Aborted(reason)),
        }
    }

    fn write_file(&mut self, name: &str, _bytes: &[u8]) -> Result<(), EngineError> {
        self.state.staged_files.lock().push(name.to_string());
        Ok(())
    }

    fn force_exit(&mut self) -> Termination {
        Termination::ExpectedExit
    }
}

/// Serves build artifacts from memory; unknown paths answer 404.
#[derive(Clone, Default)]
pub struct StaticBuildSource {
    entries: Arc<Mutex<FxHashMap<String, Vec<u8>>>>,
    failing: Arc<Mutex<Vec<String>>>,
    fetch_log: Arc<Mutex<Vec<String>>>,
}

impl StaticBuildSource {
    /// A source stocked with the loader script and binary for a triple.
    #[must_use]
    pub fn for_triple(triple: VersionTriple) -> Self {
        let source = Self::default();
        source.insert(&triple.loader_script_path(), b"// loader".to_vec());
        source.insert(&triple.wasm_binary_path(), b"\0asm".to_vec());
        source
    }

    pub fn insert(&self, path: &str, bytes: Vec<u8>) {
        self.entries.lock().insert(path.to_string(), bytes);
    }

    /// Make fetches of this exact path fail with a network error.
    pub fn fail_path(&self, path: &str) {
        self.failing.lock().push(path.to_string());
    }

    #[must_use]
    pub fn fetch_log(&self) -> Vec<String> {
        self.fetch_log.lock().clone()
    }
}

impl BuildSource for StaticBuildSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, EngineError> {
        self.fetch_log.lock().push(path.to_string());
        if self.failing.lock().iter().any(|failing| failing == path) {
            return Err(EngineError::Network {
                path: path.to_string(),
                reason: "scripted network failure".to_string(),
            });
        }
        self.entries
            .lock()
            .get(path)
            .cloned()
            .ok_or(EngineError::HttpStatus {
                status: 404,
                path: path.to_string(),
            })
    }
}

/// Renderer double recording everything it is handed.
#[derive(Debug, Default)]
pub struct CollectingRenderer {
    pub begun: Vec<RunMode>,
    pub rendered: Vec<(RunMode, ExecutionResult)>,
    pub notices: Vec<Notice>,
}

impl OutputRenderer for CollectingRenderer {
    fn begin(&mut self, mode: RunMode) {
        self.begun.push(mode);
    }

    fn render(&mut self, mode: RunMode, result: &ExecutionResult) {
        self.rendered.push((mode, result.clone()));
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}
