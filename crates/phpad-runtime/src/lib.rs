//! `phpad-runtime` - sandbox lifecycle management and run orchestration for
//! the phpad playground.
//!
//! The interpreter/analyzer engine is opaque: it enters through the
//! [`engine::Engine`] and [`engine::EngineFactory`] traits and all of its
//! output arrives through a per-execution collector. This crate owns the
//! part with actual state-machine complexity: build loading, single-flight
//! execution, forced teardown with arena zero-fill, and the trigger glue.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Engine boundary traits, memory arena, output collection.
pub mod engine;
/// Engine and lifecycle errors.
pub mod error;
/// Harness templates and source composition.
pub mod harness;
/// HTTP build artifact fetching.
pub mod http;
/// Sandbox lifecycle manager.
pub mod lifecycle;
/// Archive mtime manifest.
pub mod manifest;
/// Run orchestrator and playground context.
pub mod orchestrator;
/// One disposable execution context.
pub mod sandbox;
/// Scripted engine doubles for tests.
pub mod testkit;

pub use engine::{
    BuildSource, Engine, EngineBuild, EngineFactory, MemoryArena, OutputCollector, Termination,
};
pub use error::EngineError;
pub use harness::{compose, escape_source, ComposedSource, RunMode};
pub use lifecycle::{LifecycleState, LoadPhase, SandboxManager};
pub use orchestrator::{
    Notice, NoticeLevel, OutputRenderer, Playground, PlaygroundDeps, ShareOutcome,
};
pub use sandbox::{ExecutionResult, Sandbox};
