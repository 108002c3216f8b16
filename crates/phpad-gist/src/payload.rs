//! Snippet payload format: an ordered file map plus one reserved metadata
//! file that round-trips file order and session settings through a host
//! whose native file collection is unordered.

#![allow(missing_docs)]

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use phpad_session::{
    AnalyzerVersion, GrammarVersion, PluginSet, RemoteSnippetRef, RuntimeVersion, Session,
    SessionError, SourceFile, VersionTriple, METADATA_FILE_NAME,
};

/// Session settings carried in the reserved metadata file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnippetMetadata {
    pub php_version: Option<String>,
    pub phan_version: Option<String>,
    pub ast_version: Option<String>,
    /// Decimal big-integer bitset, same encoding as the `plugins` URL
    /// parameter.
    pub plugins: Option<String>,
    /// File names in display order; the host's file collection loses it.
    pub file_order: Vec<String>,
}

/// A snippet as sent to or fetched from the host. Insertion order of `files`
/// is significant: the first file determines the display title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetPayload {
    pub description: String,
    pub public: bool,
    pub files: IndexMap<SmolStr, String>,
}

impl SnippetPayload {
    /// Build the upload payload for a session: user files in order, then the
    /// metadata file last.
    #[must_use]
    pub fn from_session(session: &Session, description: &str, public: bool) -> Self {
        let mut files: IndexMap<SmolStr, String> = IndexMap::new();
        for file in session.files() {
            files.insert(file.name.clone(), file.content.clone());
        }

        let versions = session.versions();
        let metadata = SnippetMetadata {
            php_version: Some(versions.runtime.as_str().to_string()),
            phan_version: Some(versions.analyzer.as_str().to_string()),
            ast_version: Some(versions.grammar.as_str().to_string()),
            plugins: Some(session.plugins().encode_bitset()),
            file_order: session
                .files()
                .iter()
                .map(|file| file.name.to_string())
                .collect(),
        };
        let metadata_json =
            serde_json::to_string_pretty(&metadata).unwrap_or_else(|_| "{}".to_string());
        files.insert(SmolStr::new(METADATA_FILE_NAME), metadata_json);

        Self {
            description: description.to_string(),
            public,
            files,
        }
    }

    /// Parse the reserved metadata file, if present and well formed.
    #[must_use]
    pub fn metadata(&self) -> Option<SnippetMetadata> {
        let raw = self.files.get(METADATA_FILE_NAME)?;
        match serde_json::from_str(raw) {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                tracing::warn!(%err, "ignoring malformed snippet metadata file");
                None
            }
        }
    }

    /// Rebuild a session from a fetched payload.
    ///
    /// With metadata, files load in the recorded order and version/plugin
    /// settings are applied. Without it (a plain third-party snippet), all
    /// non-reserved files load in key order and defaults are retained.
    pub fn into_session(self, reference: RemoteSnippetRef) -> Result<Session, SessionError> {
        let metadata = self.metadata();

        let mut ordered: Vec<SourceFile> = Vec::new();
        if let Some(meta) = &metadata {
            if !meta.file_order.is_empty() {
                for name in &meta.file_order {
                    if let Some(content) = self.files.get(name.as_str()) {
                        ordered.push(SourceFile::new(name.as_str(), content.clone()));
                    }
                }
            }
        }
        if ordered.is_empty() {
            ordered = self
                .files
                .iter()
                .filter(|(name, _)| name.as_str() != METADATA_FILE_NAME)
                .map(|(name, content)| SourceFile::new(name.clone(), content.clone()))
                .collect();
        }

        let mut session = Session::from_files(ordered)?;
        if let Some(meta) = metadata {
            let mut versions = VersionTriple::default();
            if let Some(value) = meta.php_version.as_deref().and_then(RuntimeVersion::parse) {
                versions.runtime = value;
            }
            if let Some(value) = meta
                .phan_version
                .as_deref()
                .and_then(AnalyzerVersion::parse)
            {
                versions.analyzer = value;
            }
            if let Some(value) = meta.ast_version.as_deref().and_then(GrammarVersion::parse) {
                versions.grammar = value;
            }
            session.set_versions(versions);

            if let Some(bits) = meta.plugins.as_deref() {
                match PluginSet::decode_bitset(bits) {
                    Ok(set) => session.set_plugins(set),
                    Err(err) => {
                        tracing::warn!(%err, "ignoring malformed plugins in snippet metadata");
                    }
                }
            }
        }
        session.bind_remote(reference);
        Ok(session)
    }
}

/// What a user-initiated save should do for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePlan {
    /// Bound to a snippet with no local changes: copy the existing link.
    Relink,
    /// Bound to a snippet with changes: create a new revision in place.
    Update,
    /// Not bound to any snippet: create a new one.
    Create,
}

/// Decide between update-in-place, create-new, and no-changes-relink.
#[must_use]
pub fn plan_save(current: Option<&RemoteSnippetRef>, dirty: bool) -> SavePlan {
    match (current, dirty) {
        (Some(_), false) => SavePlan::Relink,
        (Some(_), true) => SavePlan::Update,
        (None, _) => SavePlan::Create,
    }
}
