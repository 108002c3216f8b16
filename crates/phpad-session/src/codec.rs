//! Shareable-link codec for the editable session.
//!
//! Decoding priority (first match wins): remote snippet reference, multi-file
//! compressed payload, compressed legacy single file, plain legacy single
//! file. Multi-file sessions always use the multi-file slot; the legacy slot
//! is intentionally lossy for them and is only ever written for single-file
//! sessions.

#![allow(missing_docs)]

use std::io::{Read, Write};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use smol_str::SmolStr;

use crate::error::SessionError;
use crate::plugins::PluginSet;
use crate::session::{RemoteSnippetRef, Session, SourceFile, DEFAULT_FILE_NAME};
use crate::versions::{
    enforce_constraints, AnalyzerVersion, GrammarVersion, RuntimeVersion, VersionTriple,
};

pub const PARAM_SNIPPET: &str = "gist";
pub const PARAM_REVISION: &str = "rev";
pub const PARAM_FILES: &str = "files";
pub const PARAM_COMPRESSED: &str = "c";
pub const PARAM_LEGACY_CODE: &str = "code";
pub const PARAM_RUNTIME: &str = "php";
pub const PARAM_ANALYZER: &str = "phan";
pub const PARAM_GRAMMAR: &str = "ast";
pub const PARAM_PLUGINS: &str = "plugins";

/// Everything a query string can carry, decoded without consulting any store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlState {
    /// Remote snippet reference; when present all inline file content in the
    /// query is ignored.
    pub snippet: Option<RemoteSnippetRef>,
    /// Inline files decoded from `files`, `c`, or `code`.
    pub files: Option<Vec<SourceFile>>,
    /// Version pins with out-of-enum values ignored, constraint-corrected.
    pub versions: VersionTriple,
    /// Plugin selection; `None` keeps the default preset (absent parameter,
    /// malformed bitset, or empty set).
    pub plugins: Option<PluginSet>,
}

/// Decode a raw query string (with or without the leading `?`).
#[must_use]
pub fn decode_query(query: &str) -> UrlState {
    let pairs = parse_pairs(query);
    let get = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };

    let snippet = get(PARAM_SNIPPET).filter(|id| !id.is_empty()).map(|id| {
        RemoteSnippetRef::new(
            id,
            get(PARAM_REVISION)
                .filter(|rev| !rev.is_empty())
                .map(SmolStr::new),
        )
    });

    let files = if snippet.is_some() {
        None
    } else if let Some(encoded) = get(PARAM_FILES) {
        decode_multi_file(encoded)
    } else if let Some(encoded) = get(PARAM_COMPRESSED) {
        match decompress_fragment(encoded) {
            Ok(content) if !content.is_empty() => {
                Some(vec![SourceFile::new(DEFAULT_FILE_NAME, content)])
            }
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(%err, "failed to decompress single-file payload");
                None
            }
        }
    } else {
        get(PARAM_LEGACY_CODE)
            .filter(|code| !code.is_empty())
            .map(|code| vec![SourceFile::new(DEFAULT_FILE_NAME, code.to_string())])
    };

    let mut versions = VersionTriple::default();
    if let Some(value) = get(PARAM_RUNTIME).and_then(RuntimeVersion::parse) {
        versions.runtime = value;
    }
    if let Some(value) = get(PARAM_ANALYZER).and_then(AnalyzerVersion::parse) {
        versions.analyzer = value;
    }
    if let Some(value) = get(PARAM_GRAMMAR).and_then(GrammarVersion::parse) {
        versions.grammar = value;
    }
    let versions = enforce_constraints(versions).triple;

    let plugins = get(PARAM_PLUGINS).and_then(|text| match PluginSet::decode_bitset(text) {
        Ok(set) if set.is_empty() => None,
        Ok(set) => Some(set),
        Err(err) => {
            tracing::warn!(%err, "ignoring malformed plugins parameter");
            None
        }
    });

    UrlState {
        snippet,
        files,
        versions,
        plugins,
    }
}

/// Decode a query string into a full session, or `None` when the query
/// carries no inline content (empty, or a remote snippet reference that the
/// caller must fetch).
#[must_use]
pub fn decode(query: &str) -> Option<Session> {
    let state = decode_query(query);
    if state.snippet.is_some() {
        return None;
    }
    let files = state.files?;
    let mut session = match Session::from_files(files) {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(%err, "rejecting invalid shared file list");
            return None;
        }
    };
    session.set_versions(state.versions);
    if let Some(plugins) = state.plugins {
        session.set_plugins(plugins);
    }
    session.mark_clean();
    Some(session)
}

/// Encode a session into a query string (no leading `?`). The pristine
/// default session encodes to the empty string so the address bar is cleared
/// rather than polluted.
#[must_use]
pub fn encode(session: &Session) -> String {
    if session.is_default() {
        return String::new();
    }

    let mut pairs: Vec<(&str, String)> = Vec::new();
    if session.files().len() > 1 {
        match serde_json::to_string(session.files()) {
            Ok(json) => pairs.push((PARAM_FILES, compress_fragment(&json))),
            Err(err) => {
                tracing::error!(%err, "failed to serialize session files");
                return String::new();
            }
        }
    } else {
        pairs.push((
            PARAM_COMPRESSED,
            compress_fragment(&session.files()[0].content),
        ));
    }

    let versions = session.versions();
    pairs.push((PARAM_RUNTIME, versions.runtime.as_str().to_string()));
    pairs.push((PARAM_ANALYZER, versions.analyzer.as_str().to_string()));
    pairs.push((PARAM_GRAMMAR, versions.grammar.as_str().to_string()));
    pairs.push((PARAM_PLUGINS, session.plugins().encode_bitset()));

    build_query(&pairs)
}

/// Encode a query string pointing at a saved remote snippet.
#[must_use]
pub fn encode_snippet_link(reference: &RemoteSnippetRef) -> String {
    let mut pairs = vec![(PARAM_SNIPPET, reference.id.to_string())];
    if let Some(revision) = &reference.revision {
        pairs.push((PARAM_REVISION, revision.to_string()));
    }
    build_query(&pairs)
}

fn decode_multi_file(encoded: &str) -> Option<Vec<SourceFile>> {
    let json = match decompress_fragment(encoded) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!(%err, "failed to decompress multi-file payload");
            return None;
        }
    };
    // Strict element validation: every entry must carry a string name and a
    // string content, anything else falls back to the default session.
    match serde_json::from_str::<Vec<SourceFile>>(&json) {
        Ok(files) if !files.is_empty() => Some(files),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(%err, "rejecting malformed multi-file payload");
            None
        }
    }
}

/// Reversible text-compression transform used for the `files` and `c`
/// parameters: DEFLATE, then URL-safe unpadded base64.
#[must_use]
pub fn compress_fragment(text: &str) -> String {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(text.as_bytes()).is_err() {
        return String::new();
    }
    match encoder.finish() {
        Ok(bytes) => URL_SAFE_NO_PAD.encode(bytes),
        Err(err) => {
            tracing::error!(%err, "deflate compression failed");
            String::new()
        }
    }
}

pub fn decompress_fragment(encoded: &str) -> Result<String, SessionError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim())
        .map_err(|_| SessionError::MalformedState(SmolStr::new("invalid base64 fragment")))?;
    let mut decoder = DeflateDecoder::new(bytes.as_slice());
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|_| SessionError::MalformedState(SmolStr::new("invalid deflate fragment")))?;
    Ok(text)
}

fn parse_pairs(query: &str) -> Vec<(String, String)> {
    let query = query.strip_prefix('?').unwrap_or(query);
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(text: &str) -> String {
    let spaced = text.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or(spaced)
}

fn build_query(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_transform_round_trips() {
        let text = "<?php\necho \"héllo 'world'\";\n";
        let compressed = compress_fragment(text);
        assert!(!compressed.contains('='));
        assert_eq!(decompress_fragment(&compressed).expect("decompress"), text);
    }

    #[test]
    fn snippet_reference_wins_over_inline_content() {
        let query = format!(
            "gist=abc123&rev=deadbeef&c={}",
            compress_fragment("<?php echo 1;")
        );
        let state = decode_query(&query);
        let snippet = state.snippet.expect("snippet reference");
        assert_eq!(snippet.id, "abc123");
        assert_eq!(snippet.revision.as_deref(), Some("deadbeef"));
        assert!(state.files.is_none());
    }
}
