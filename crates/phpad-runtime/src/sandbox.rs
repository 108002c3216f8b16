//! One disposable execution context.

#![allow(missing_docs)]

use std::sync::Arc;

use crate::engine::{Engine, OutputCollector, Termination};
use crate::error::EngineError;

/// What one engine call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// A single-use execution context: one engine instance plus its scoped
/// output collector. After [`Sandbox::execute`] the sandbox is spent and the
/// lifecycle manager discards it.
pub struct Sandbox {
    engine: Box<dyn Engine>,
    output: Arc<OutputCollector>,
    spent: bool,
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("spent", &self.spent)
            .finish()
    }
}

impl Sandbox {
    #[must_use]
    pub fn new(engine: Box<dyn Engine>, output: Arc<OutputCollector>) -> Self {
        Self {
            engine,
            output,
            spent: false,
        }
    }

    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.spent
    }

    /// Stage a file into the virtual filesystem before execution.
    pub fn write_file(&mut self, name: &str, bytes: &[u8]) -> Result<(), EngineError> {
        self.engine.write_file(name, bytes)
    }

    /// The one logical engine call this sandbox exists for. Output is drained
    /// from the collector regardless of the exit code.
    pub fn execute(&mut self, source: &str) -> Result<ExecutionResult, EngineError> {
        if self.spent {
            return Err(EngineError::Unusable);
        }
        self.spent = true;
        let status = self.engine.eval(source);
        let (stdout, stderr) = self.output.drain();
        match status {
            Ok(exit_code) => Ok(ExecutionResult {
                exit_code,
                stdout,
                stderr,
            }),
            Err(err) => Err(err),
        }
    }

    /// Forcibly exit the engine and clear any leftover output.
    pub fn terminate(mut self) -> Termination {
        let outcome = self.engine.force_exit();
        self.output.clear();
        outcome
    }
}
