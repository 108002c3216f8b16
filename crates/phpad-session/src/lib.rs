//! `phpad-session` - session state, version pins, and shareable-link codec
//! for the phpad browser playground.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Shareable-link codec (URL query parameters).
pub mod codec;
/// Playground configuration.
pub mod config;
/// Session errors.
pub mod error;
/// Analysis rule catalog, presets, and bitset encoding.
pub mod plugins;
/// Editable session state and invariants.
pub mod session;
/// Local persisted state (files, theme, credential).
pub mod store;
/// Build version selection and compatibility rules.
pub mod versions;

pub use config::PlaygroundConfig;
pub use error::SessionError;
pub use plugins::{PluginSet, PresetLevel, PLUGIN_CATALOG};
pub use session::{
    RemoteSnippetRef, Session, SourceFile, DEFAULT_FILE_CONTENT, MAX_FILES, METADATA_FILE_NAME,
};
pub use store::{SessionStore, StateStore, StoredCredential, Theme};
pub use versions::{
    enforce_constraints, AnalyzerVersion, ConstraintReport, GrammarVersion, RuntimeVersion,
    VersionTriple,
};
