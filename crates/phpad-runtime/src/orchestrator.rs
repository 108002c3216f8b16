//! The run orchestrator: one context object binding session, sandbox
//! lifecycle, persistence, and the remote snippet client behind the
//! playground's triggers.

#![allow(missing_docs)]

use phpad_gist::{plan_save, GistClient, Identity, RemoteError, SavePlan, SnippetPayload};
use phpad_session::codec;
use phpad_session::{
    ConstraintReport, PlaygroundConfig, PluginSet, RemoteSnippetRef, Session, SessionStore,
    StateStore, Theme, VersionTriple, METADATA_FILE_NAME,
};

use crate::engine::{BuildSource, EngineFactory};
use crate::error::EngineError;
use crate::harness::{compose, RunMode};
use crate::lifecycle::SandboxManager;
use crate::sandbox::ExecutionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible notification produced at the orchestrator boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Out-of-scope presentation layer the orchestrator calls into.
pub trait OutputRenderer {
    /// Called before the long synchronous engine call; the renderer clears
    /// prior output and paints its progress state here.
    fn begin(&mut self, mode: RunMode);

    /// Hand over the finished execution result.
    fn render(&mut self, mode: RunMode, result: &ExecutionResult);

    /// Surface a notification.
    fn notify(&mut self, notice: Notice);
}

/// Result of a share request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    /// Not authenticated: the session is encoded into this query string.
    Url(String),
    /// Saved (created or revised) as a remote snippet.
    SnippetSaved {
        reference: RemoteSnippetRef,
        query: String,
    },
    /// No changes since the bound snippet was saved; same link again.
    SnippetRelinked {
        reference: RemoteSnippetRef,
        query: String,
    },
}

/// Everything the orchestrator needs injected at bootstrap.
pub struct PlaygroundDeps {
    pub factory: Box<dyn EngineFactory>,
    pub build_source: Box<dyn BuildSource>,
    pub state_store: Box<dyn StateStore>,
    pub config: PlaygroundConfig,
}

/// The playground context object. All trigger handlers go through here;
/// there is no ambient global state.
pub struct Playground {
    session: Session,
    manager: SandboxManager,
    store: SessionStore,
    config: PlaygroundConfig,
    gist: GistClient,
}

impl Playground {
    /// Build the initial session from the page query string, falling back to
    /// local persisted state and then the built-in default. Engine load
    /// failures surface as notices and leave the triggers unusable.
    #[must_use]
    pub fn bootstrap(query: &str, deps: PlaygroundDeps) -> (Self, Vec<Notice>) {
        let mut notices = Vec::new();
        let store = SessionStore::new(deps.state_store);
        let mut gist = GistClient::new(&deps.config.api_base, METADATA_FILE_NAME);
        if let Some(credential) = store.credential() {
            gist.set_credential(credential.token);
        }

        let url_state = codec::decode_query(query);
        let from_snippet = url_state.snippet.is_some();
        let url_versions = url_state.versions;
        let url_plugins = url_state.plugins;

        let session = if let Some(reference) = url_state.snippet {
            match gist
                .fetch(&reference.id, reference.revision.as_deref())
                .and_then(|fetched| {
                    fetched
                        .payload
                        .into_session(fetched.reference)
                        .map_err(|err| RemoteError::MalformedResponse(err.to_string()))
                }) {
                Ok(session) => Some(session),
                Err(err) => {
                    notices.push(Notice::error(format!("failed to load snippet: {err}")));
                    None
                }
            }
        } else {
            None
        };

        let mut session = session
            .or_else(|| codec::decode(query))
            .or_else(|| store.load_session())
            .unwrap_or_default();
        if !from_snippet {
            // version/plugin query parameters also apply to sessions restored
            // from local state
            session.set_versions(url_versions);
            if let Some(plugins) = url_plugins {
                session.set_plugins(plugins);
            }
            session.mark_clean();
        }

        let mut manager =
            SandboxManager::new(deps.factory, deps.build_source, session.versions());
        if let Err(err) = manager.load() {
            notices.push(Notice::error(format!(
                "failed to initialize the engine: {err}"
            )));
        }

        (
            Self {
                session,
                manager,
                store,
                config: deps.config,
                gist,
            },
            notices,
        )
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn manager(&self) -> &SandboxManager {
        &self.manager
    }

    /// Query string the host should write to the address bar; empty means
    /// clear the parameters.
    #[must_use]
    pub fn address_query(&self) -> String {
        codec::encode(&self.session)
    }

    /// Handle a run/analyze/inspect trigger. Returns true when an engine
    /// call actually happened; while busy or unusable the trigger is a
    /// no-op (never queued).
    pub fn trigger(&mut self, mode: RunMode, renderer: &mut dyn OutputRenderer) -> bool {
        if self.manager.is_busy() || !self.manager.is_usable() {
            tracing::debug!(mode = mode.label(), "trigger ignored, engine not available");
            return false;
        }

        self.persist(renderer);

        if self.manager.loaded_triple() != self.session.versions() {
            if let Err(err) = self.manager.reload(self.session.versions()) {
                renderer.notify(Notice::error(format!("failed to load new build: {err}")));
                return false;
            }
        }

        let composed = match compose(
            mode,
            self.session.files(),
            self.session.current_index(),
            self.session.versions(),
            self.session.plugins(),
        ) {
            Ok(composed) => composed,
            Err(err) => {
                renderer.notify(Notice::error(format!("failed to compose source: {err}")));
                return false;
            }
        };

        let archive = match &composed.archive {
            Some(name) => {
                self.manager.ensure_manifest();
                match self.manager.ensure_archive(name) {
                    Ok(bytes) => Some((name.clone(), bytes)),
                    Err(err) => {
                        renderer.notify(Notice::warning(format!(
                            "failed to fetch the analyzer archive: {err}"
                        )));
                        return false;
                    }
                }
            }
            None => None,
        };

        renderer.begin(mode);

        let outcome = self.manager.run_with(&composed.text, |sandbox| {
            if let Some((name, bytes)) = &archive {
                sandbox.write_file(name, bytes)
            } else {
                Ok(())
            }
        });
        let outcome = match outcome {
            Some(outcome) => outcome,
            None => return false,
        };

        match outcome {
            Ok(result) => {
                renderer.render(mode, &result);
                true
            }
            Err(err) if err.is_fatal() => {
                renderer.notify(Notice::error(format!(
                    "the engine aborted and is disabled until a reload: {err}"
                )));
                false
            }
            Err(err) => {
                renderer.notify(Notice::warning(err.to_string()));
                false
            }
        }
    }

    /// Replace the current file's content (editor change handler).
    pub fn edit_current(&mut self, content: &str, renderer: &mut dyn OutputRenderer) {
        self.session.update_current_content(content);
        self.persist(renderer);
    }

    pub fn add_file(&mut self, renderer: &mut dyn OutputRenderer) -> Option<usize> {
        match self.session.add_file() {
            Ok(index) => {
                self.persist(renderer);
                Some(index)
            }
            Err(err) => {
                renderer.notify(Notice::warning(err.to_string()));
                None
            }
        }
    }

    pub fn remove_file(&mut self, index: usize, renderer: &mut dyn OutputRenderer) -> bool {
        match self.session.remove_file(index) {
            Ok(()) => {
                self.persist(renderer);
                true
            }
            Err(err) => {
                renderer.notify(Notice::warning(err.to_string()));
                false
            }
        }
    }

    /// Rename a file; on rejection the original name is retained and the
    /// renderer is notified.
    pub fn rename_file(
        &mut self,
        index: usize,
        new_name: &str,
        renderer: &mut dyn OutputRenderer,
    ) -> bool {
        match self.session.rename_file(index, new_name) {
            Ok(()) => {
                self.persist(renderer);
                true
            }
            Err(err) => {
                renderer.notify(Notice::warning(err.to_string()));
                false
            }
        }
    }

    pub fn switch_file(&mut self, index: usize, renderer: &mut dyn OutputRenderer) -> bool {
        match self.session.switch_to(index) {
            Ok(()) => {
                self.persist(renderer);
                true
            }
            Err(err) => {
                renderer.notify(Notice::warning(err.to_string()));
                false
            }
        }
    }

    /// Pin a new version triple and reload the engine build for it. The
    /// constraint rules run first; a reload during an in-flight run is
    /// rejected.
    pub fn set_versions(
        &mut self,
        triple: VersionTriple,
    ) -> Result<ConstraintReport, EngineError> {
        if self.manager.is_busy() {
            return Err(EngineError::Busy);
        }
        let report = phpad_session::enforce_constraints(triple);
        self.session.set_versions(report.triple);
        if self.manager.loaded_triple() != report.triple {
            self.manager.reload(report.triple)?;
        }
        Ok(report)
    }

    pub fn set_plugins(&mut self, plugins: PluginSet, renderer: &mut dyn OutputRenderer) {
        self.session.set_plugins(plugins);
        self.persist(renderer);
    }

    /// Start over with a single blank file, clearing persisted state and the
    /// snippet binding.
    pub fn reset(&mut self, renderer: &mut dyn OutputRenderer) {
        self.session.reset();
        if let Err(err) = self.store.clear_session() {
            renderer.notify(Notice::warning(err.to_string()));
        }
    }

    /// Validate a user-supplied credential, persist it, and cache the
    /// identity it authorizes. On failure nothing is stored and the caller
    /// falls back to URL sharing.
    pub fn authenticate(&mut self, token: &str) -> Result<Identity, RemoteError> {
        let identity = self.gist.authenticate(token)?;
        if let Err(err) = self.store.store_credential(token) {
            tracing::warn!(%err, "failed to persist credential");
        }
        if let Ok(json) = serde_json::to_string(&identity) {
            let _ = self.store.store_identity(&json);
        }
        Ok(identity)
    }

    pub fn logout(&mut self) {
        self.gist.clear_credential();
        if let Err(err) = self.store.clear_credential() {
            tracing::warn!(%err, "failed to clear stored credential");
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.gist.is_authenticated()
    }

    /// The smart share action: snippet save when authenticated, URL encoding
    /// otherwise.
    pub fn share(&mut self) -> Result<ShareOutcome, RemoteError> {
        if !self.gist.is_authenticated() {
            return Ok(ShareOutcome::Url(codec::encode(&self.session)));
        }

        let payload = SnippetPayload::from_session(
            &self.session,
            &self.config.snippet_description,
            self.config.public_snippets,
        );
        match plan_save(self.session.remote(), self.session.is_dirty()) {
            SavePlan::Relink => {
                let reference = self
                    .session
                    .remote()
                    .cloned()
                    .ok_or(RemoteError::NotAuthenticated)?;
                let query = codec::encode_snippet_link(&reference);
                Ok(ShareOutcome::SnippetRelinked { reference, query })
            }
            SavePlan::Update => {
                let current = self
                    .session
                    .remote()
                    .cloned()
                    .ok_or(RemoteError::NotAuthenticated)?;
                let reference = self.gist.update(&current, &payload)?;
                self.session.bind_remote(reference.clone());
                let query = codec::encode_snippet_link(&reference);
                Ok(ShareOutcome::SnippetSaved { reference, query })
            }
            SavePlan::Create => {
                let reference = self.gist.create(&payload)?;
                self.session.bind_remote(reference.clone());
                let query = codec::encode_snippet_link(&reference);
                Ok(ShareOutcome::SnippetSaved { reference, query })
            }
        }
    }

    /// Load a snippet over the current session (snippet browser pick).
    pub fn load_snippet(
        &mut self,
        id: &str,
        revision: Option<&str>,
        renderer: &mut dyn OutputRenderer,
    ) -> Result<(), RemoteError> {
        let fetched = self.gist.fetch(id, revision)?;
        let session = fetched
            .payload
            .into_session(fetched.reference)
            .map_err(|err| RemoteError::MalformedResponse(err.to_string()))?;
        let versions = session.versions();
        self.session = session;
        self.persist(renderer);
        if self.manager.loaded_triple() != versions {
            if let Err(err) = self.manager.reload(versions) {
                renderer.notify(Notice::error(format!("failed to load new build: {err}")));
            }
        }
        renderer.notify(Notice::info("snippet loaded".to_string()));
        Ok(())
    }

    /// The caller's snippet listing for the browser modal.
    pub fn list_snippets(&self) -> Result<Vec<phpad_gist::SnippetSummary>, RemoteError> {
        self.gist.list()
    }

    #[must_use]
    pub fn theme(&self) -> Theme {
        self.store.theme()
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if let Err(err) = self.store.set_theme(theme) {
            tracing::warn!(%err, "failed to persist theme preference");
        }
    }

    fn persist(&mut self, renderer: &mut dyn OutputRenderer) {
        if let Err(err) = self.store.save_session(&self.session) {
            renderer.notify(Notice::warning(format!(
                "failed to persist session locally: {err}"
            )));
        }
    }
}
