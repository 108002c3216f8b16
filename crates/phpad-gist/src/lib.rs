//! `phpad-gist` - remote snippet persistence for the phpad playground.
//!
//! Sessions are saved as host-side snippets: an ordered file collection plus
//! one reserved metadata file carrying version pins, the plugin bitset, and
//! the display order of files.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Snippet host HTTP client.
pub mod client;
/// Remote snippet errors.
pub mod error;
/// Payload format and save planning.
pub mod payload;

pub use client::{FetchedSnippet, GistClient, Identity, SnippetSummary};
pub use error::RemoteError;
pub use payload::{plan_save, SavePlan, SnippetMetadata, SnippetPayload};
