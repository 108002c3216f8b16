//! Sandbox lifecycle: build loading, single-flight execution, teardown.

#![allow(missing_docs)]

use std::sync::Arc;

use rustc_hash::FxHashMap;

use phpad_session::VersionTriple;

use crate::engine::{
    BuildSource, EngineBuild, EngineFactory, MemoryArena, OutputCollector, Termination,
    ARENA_BYTES,
};
use crate::error::EngineError;
use crate::manifest::ArchiveManifest;
use crate::sandbox::{ExecutionResult, Sandbox};

/// Which fetch/initialization step a load is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    FetchingScript,
    FetchingBinary,
    InitializingEngine,
}

/// The manager's externally observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing loaded yet.
    Idle,
    /// A build or spare sandbox is being prepared.
    Loading(LoadPhase),
    /// A spare sandbox is standing by.
    Ready,
    /// Terminal: an initialization failure or engine abort poisoned the
    /// session. Only a reload (page refresh or version change) recovers.
    Unusable,
}

/// Creates, memory-resets, and tears down one isolated execution environment
/// per run, enforcing single-flight execution.
pub struct SandboxManager {
    factory: Box<dyn EngineFactory>,
    source: Box<dyn BuildSource>,
    arena: Arc<MemoryArena>,
    state: LifecycleState,
    busy: bool,
    triple: VersionTriple,
    build: Option<EngineBuild>,
    spare: Option<Sandbox>,
    archives: FxHashMap<String, Arc<Vec<u8>>>,
    manifest: Option<ArchiveManifest>,
}

impl std::fmt::Debug for SandboxManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxManager")
            .field("state", &self.state)
            .field("busy", &self.busy)
            .field("triple", &self.triple)
            .field("has_build", &self.build.is_some())
            .field("has_spare", &self.spare.is_some())
            .finish()
    }
}

impl SandboxManager {
    #[must_use]
    pub fn new(
        factory: Box<dyn EngineFactory>,
        source: Box<dyn BuildSource>,
        triple: VersionTriple,
    ) -> Self {
        Self {
            factory,
            source,
            arena: MemoryArena::new(ARENA_BYTES),
            state: LifecycleState::Idle,
            busy: false,
            triple,
            build: None,
            spare: None,
            archives: FxHashMap::default(),
            manifest: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Runs are possible unless the session is poisoned or nothing was ever
    /// loaded.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.busy
            && self.build.is_some()
            && matches!(
                self.state,
                LifecycleState::Ready | LifecycleState::Loading(_)
            )
    }

    #[must_use]
    pub fn loaded_triple(&self) -> VersionTriple {
        self.triple
    }

    #[must_use]
    pub fn arena(&self) -> &Arc<MemoryArena> {
        &self.arena
    }

    /// Fetch the build for the current triple and pre-warm the first spare.
    /// Fetch or initialization failure is fatal for the session.
    pub fn load(&mut self) -> Result<(), EngineError> {
        self.state = LifecycleState::Loading(LoadPhase::FetchingScript);
        let script_path = self.triple.loader_script_path();
        let loader_script = match self.source.fetch(&script_path) {
            Ok(bytes) => bytes,
            Err(err) => return self.fail_load(err),
        };

        self.state = LifecycleState::Loading(LoadPhase::FetchingBinary);
        let binary_path = self.triple.wasm_binary_path();
        let wasm_binary = match self.source.fetch(&binary_path) {
            Ok(bytes) => bytes,
            Err(err) => return self.fail_load(err),
        };

        tracing::info!(
            script = %script_path,
            binary_bytes = wasm_binary.len(),
            "downloaded engine build"
        );
        self.build = Some(EngineBuild {
            triple: self.triple,
            loader_script,
            wasm_binary,
        });

        self.state = LifecycleState::Loading(LoadPhase::InitializingEngine);
        match self.instantiate() {
            Ok(sandbox) => {
                self.spare = Some(sandbox);
                self.state = LifecycleState::Ready;
                Ok(())
            }
            Err(err) => self.fail_load(err),
        }
    }

    /// Switch to a new triple and load its build. Rejected while a run is in
    /// flight; permitted from the unusable state (it is the documented
    /// recovery path).
    pub fn reload(&mut self, triple: VersionTriple) -> Result<(), EngineError> {
        if self.busy {
            tracing::warn!("reload requested while an execution is in flight, ignoring");
            return Err(EngineError::Busy);
        }
        if let Some(spare) = self.spare.take() {
            log_termination(spare.terminate());
        }
        self.build = None;
        self.archives.clear();
        self.arena.zero_fill();
        self.triple = triple;
        self.load()
    }

    /// Acquire a sandbox for one run: the pre-warmed spare when present,
    /// otherwise a fresh instantiation (retrying a spare that failed to
    /// pre-warm earlier).
    pub fn acquire(&mut self) -> Result<Sandbox, EngineError> {
        match self.state {
            LifecycleState::Unusable => return Err(EngineError::Unusable),
            LifecycleState::Idle => return Err(EngineError::NoBuild),
            LifecycleState::Ready | LifecycleState::Loading(_) => {}
        }
        if let Some(sandbox) = self.spare.take() {
            return Ok(sandbox);
        }
        let sandbox = self.instantiate()?;
        self.state = LifecycleState::Ready;
        Ok(sandbox)
    }

    /// Release a used sandbox: unconditional forced termination, arena
    /// zero-fill, then queue a replacement spare. A failed pre-warm leaves
    /// the manager in `Loading` until the next user-triggered attempt.
    pub fn release(&mut self, sandbox: Sandbox) {
        log_termination(sandbox.terminate());
        self.arena.zero_fill();
        if self.state == LifecycleState::Unusable {
            return;
        }
        match self.instantiate() {
            Ok(spare) => {
                self.spare = Some(spare);
                self.state = LifecycleState::Ready;
            }
            Err(err) => {
                tracing::warn!(%err, "failed to pre-warm spare sandbox");
                self.state = LifecycleState::Loading(LoadPhase::InitializingEngine);
            }
        }
    }

    /// Run one composed source through a fresh sandbox, enforcing
    /// single-flight. Returns `None` when the trigger must be ignored (busy
    /// or unusable): the call is a no-op, not queued.
    pub fn run(&mut self, source: &str) -> Option<Result<ExecutionResult, EngineError>> {
        self.run_with(source, |_| Ok(()))
    }

    /// Like [`Self::run`], with a staging hook that runs between acquire and
    /// execute (archive loading, extra VFS files).
    pub fn run_with(
        &mut self,
        source: &str,
        stage: impl FnOnce(&mut Sandbox) -> Result<(), EngineError>,
    ) -> Option<Result<ExecutionResult, EngineError>> {
        if self.busy {
            tracing::debug!("run requested while busy, ignoring");
            return None;
        }
        if !self.is_usable() {
            tracing::debug!(state = ?self.state, "run requested while not usable, ignoring");
            return None;
        }

        self.busy = true;
        let result = match self.acquire() {
            Ok(mut sandbox) => {
                let outcome = match stage(&mut sandbox) {
                    Ok(()) => sandbox.execute(source),
                    Err(err) => Err(err),
                };
                if let Err(err) = &outcome {
                    if err.is_fatal() {
                        tracing::error!(%err, "engine failure, session unusable until reload");
                        self.state = LifecycleState::Unusable;
                    }
                }
                // termination and arena reset happen regardless of outcome
                self.release(sandbox);
                outcome
            }
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            if err.is_fatal() && self.state != LifecycleState::Unusable {
                tracing::error!(%err, "engine failure, session unusable until reload");
                self.state = LifecycleState::Unusable;
            }
        }
        if self.state == LifecycleState::Unusable {
            self.spare = None;
        }
        self.busy = false;
        Some(result)
    }

    /// Fetch an analyzer archive, or serve it from the byte cache. Cached
    /// bytes survive sandbox teardown; each fresh virtual filesystem is
    /// staged with its own copy at run time.
    pub fn ensure_archive(&mut self, name: &str) -> Result<Arc<Vec<u8>>, EngineError> {
        if let Some(bytes) = self.archives.get(name) {
            return Ok(Arc::clone(bytes));
        }
        let path = self.manifest_path(name);
        let bytes = Arc::new(self.source.fetch(&path)?);
        tracing::debug!(archive = name, bytes = bytes.len(), "fetched analyzer archive");
        self.archives.insert(name.to_string(), Arc::clone(&bytes));
        Ok(bytes)
    }

    /// Load the archive mtime manifest once; absence only disables
    /// cache-busting.
    pub fn ensure_manifest(&mut self) {
        if self.manifest.is_some() {
            return;
        }
        match self.source.fetch(ArchiveManifest::PATH) {
            Ok(bytes) => match ArchiveManifest::parse(&bytes) {
                Ok(manifest) => self.manifest = Some(manifest),
                Err(err) => {
                    tracing::warn!(%err, "invalid archive manifest, cache-busting disabled");
                    self.manifest = Some(ArchiveManifest::default());
                }
            },
            Err(err) => {
                tracing::warn!(%err, "archive manifest unavailable, cache-busting disabled");
                self.manifest = Some(ArchiveManifest::default());
            }
        }
    }

    fn manifest_path(&self, name: &str) -> String {
        self.manifest
            .as_ref()
            .map_or_else(|| name.to_string(), |manifest| manifest.busted_path(name))
    }

    fn instantiate(&mut self) -> Result<Sandbox, EngineError> {
        let build = self.build.as_ref().ok_or(EngineError::NoBuild)?;
        self.arena.zero_fill();
        let output = OutputCollector::new();
        let engine = self.factory.instantiate(build, &self.arena, &output)?;
        Ok(Sandbox::new(engine, output))
    }

    fn fail_load(&mut self, err: EngineError) -> Result<(), EngineError> {
        tracing::error!(%err, "engine load failed");
        self.state = LifecycleState::Unusable;
        self.build = None;
        self.spare = None;
        Err(err)
    }
}

fn log_termination(outcome: Termination) {
    match outcome {
        Termination::Clean => {}
        Termination::ExpectedExit => {
            tracing::trace!("engine raised its expected exit signal");
        }
        Termination::Failed(reason) => {
            tracing::warn!(%reason, "forced engine termination failed");
        }
    }
}
