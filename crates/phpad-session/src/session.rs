//! Editable session state: named source files, version pins, rule selection.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::SessionError;
use crate::plugins::PluginSet;
use crate::versions::{enforce_constraints, VersionTriple};

/// Hard cap on files per session.
pub const MAX_FILES: usize = 5;

/// Reserved name of the snippet metadata file; never a valid user file name.
pub const METADATA_FILE_NAME: &str = "phpad.json";

pub const DEFAULT_FILE_NAME: &str = "file1.php";

/// The example shown on first load.
pub const DEFAULT_FILE_CONTENT: &str =
    "<?php\n\nfunction demo(): ?int {\n    return 42;\n}\n\necho demo(), PHP_EOL;\n";

/// Content of a freshly added or reset file.
pub const BLANK_FILE_CONTENT: &str = "<?php\n\n";

/// One named editor buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: SmolStr,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<SmolStr>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Reference to a previously saved remote snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnippetRef {
    pub id: SmolStr,
    pub revision: Option<SmolStr>,
}

impl RemoteSnippetRef {
    pub fn new(id: impl Into<SmolStr>, revision: Option<SmolStr>) -> Self {
        Self {
            id: id.into(),
            revision,
        }
    }
}

/// The whole editable session.
///
/// Mutating methods uphold the invariants (unique non-empty names, at least
/// one and at most [`MAX_FILES`] files, constraint-satisfying version
/// triple) and flip the `dirty` flag used by the snippet save planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    files: Vec<SourceFile>,
    current: usize,
    versions: VersionTriple,
    plugins: PluginSet,
    remote: Option<RemoteSnippetRef>,
    dirty: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            files: vec![SourceFile::new(DEFAULT_FILE_NAME, DEFAULT_FILE_CONTENT)],
            current: 0,
            versions: VersionTriple::default(),
            plugins: PluginSet::default(),
            remote: None,
            dirty: false,
        }
    }
}

impl Session {
    /// Build a session from decoded files, validating every invariant.
    pub fn from_files(files: Vec<SourceFile>) -> Result<Self, SessionError> {
        if files.is_empty() {
            return Ok(Self::default());
        }
        if files.len() > MAX_FILES {
            return Err(SessionError::FileLimit(MAX_FILES));
        }
        for (index, file) in files.iter().enumerate() {
            validate_name(&file.name)?;
            if files[..index].iter().any(|other| other.name == file.name) {
                return Err(SessionError::DuplicateFileName(file.name.clone()));
            }
        }
        Ok(Self {
            files,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_file(&self) -> &SourceFile {
        &self.files[self.current]
    }

    #[must_use]
    pub fn versions(&self) -> VersionTriple {
        self.versions
    }

    #[must_use]
    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    #[must_use]
    pub fn remote(&self) -> Option<&RemoteSnippetRef> {
        self.remote.as_ref()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// True for the pristine first-load session, which shares as a bare URL.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.files.len() == 1 && self.files[0].content == DEFAULT_FILE_CONTENT
    }

    pub fn update_current_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        if self.files[self.current].content != content {
            self.files[self.current].content = content;
            self.dirty = true;
        }
    }

    /// Add a blank file named after the next free slot and switch to it.
    pub fn add_file(&mut self) -> Result<usize, SessionError> {
        if self.files.len() >= MAX_FILES {
            return Err(SessionError::FileLimit(MAX_FILES));
        }
        let mut slot = self.files.len() + 1;
        let name = loop {
            let candidate = SmolStr::new(format!("file{slot}.php"));
            if self.files.iter().all(|file| file.name != candidate) {
                break candidate;
            }
            slot += 1;
        };
        self.files.push(SourceFile::new(name, BLANK_FILE_CONTENT));
        self.current = self.files.len() - 1;
        self.dirty = true;
        Ok(self.current)
    }

    pub fn remove_file(&mut self, index: usize) -> Result<(), SessionError> {
        if index >= self.files.len() {
            return Err(SessionError::InvalidIndex(index));
        }
        if self.files.len() == 1 {
            return Err(SessionError::LastFile);
        }
        self.files.remove(index);
        if self.current >= self.files.len() {
            self.current = self.files.len() - 1;
        }
        self.dirty = true;
        Ok(())
    }

    /// Rename a file. Duplicate or invalid names are rejected and the
    /// original name is retained.
    pub fn rename_file(&mut self, index: usize, new_name: &str) -> Result<(), SessionError> {
        let new_name = new_name.trim();
        if index >= self.files.len() {
            return Err(SessionError::InvalidIndex(index));
        }
        validate_name(new_name)?;
        if self.files[index].name == new_name {
            return Ok(());
        }
        if self
            .files
            .iter()
            .enumerate()
            .any(|(other, file)| other != index && file.name == new_name)
        {
            return Err(SessionError::DuplicateFileName(SmolStr::new(new_name)));
        }
        self.files[index].name = SmolStr::new(new_name);
        self.dirty = true;
        Ok(())
    }

    pub fn switch_to(&mut self, index: usize) -> Result<(), SessionError> {
        if index >= self.files.len() {
            return Err(SessionError::InvalidIndex(index));
        }
        self.current = index;
        Ok(())
    }

    /// Pin a new version triple; the compatibility rules are applied first.
    /// Returns the triple actually stored.
    pub fn set_versions(&mut self, triple: VersionTriple) -> VersionTriple {
        let report = enforce_constraints(triple);
        if self.versions != report.triple {
            self.versions = report.triple;
            self.dirty = true;
        }
        self.versions
    }

    pub fn set_plugins(&mut self, plugins: PluginSet) {
        if self.plugins != plugins {
            self.plugins = plugins;
            self.dirty = true;
        }
    }

    pub fn bind_remote(&mut self, reference: RemoteSnippetRef) {
        self.remote = Some(reference);
        self.dirty = false;
    }

    pub fn clear_remote(&mut self) {
        self.remote = None;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Reset to a single blank file, dropping the remote binding.
    pub fn reset(&mut self) {
        self.files = vec![SourceFile::new(DEFAULT_FILE_NAME, BLANK_FILE_CONTENT)];
        self.current = 0;
        self.remote = None;
        self.dirty = false;
    }

    /// Restore files and cursor from persisted state, clamping the index.
    pub(crate) fn restore(files: Vec<SourceFile>, current: usize) -> Result<Self, SessionError> {
        let mut session = Self::from_files(files)?;
        session.current = if current < session.files.len() {
            current
        } else {
            0
        };
        Ok(session)
    }
}

fn validate_name(name: &str) -> Result<(), SessionError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SessionError::EmptyFileName);
    }
    if trimmed == METADATA_FILE_NAME {
        return Err(SessionError::ReservedFileName(SmolStr::new(trimmed)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_is_default() {
        let session = Session::default();
        assert!(session.is_default());
        assert!(!session.is_dirty());
    }

    #[test]
    fn add_file_names_skip_taken_slots() {
        let mut session = Session::default();
        session.add_file().expect("add second file");
        assert_eq!(session.files()[1].name, "file2.php");
        session
            .rename_file(1, "file3.php")
            .expect("rename second file");
        session.add_file().expect("add third file");
        assert_eq!(session.files()[2].name, "file4.php");
    }

    #[test]
    fn reserved_name_is_rejected() {
        let mut session = Session::default();
        let err = session.rename_file(0, METADATA_FILE_NAME).unwrap_err();
        assert_eq!(
            err,
            SessionError::ReservedFileName(SmolStr::new(METADATA_FILE_NAME))
        );
        assert_eq!(session.files()[0].name, DEFAULT_FILE_NAME);
    }
}
