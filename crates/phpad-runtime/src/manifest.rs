//! Archive mtime manifest for cache-busting.

#![allow(missing_docs)]

use rustc_hash::FxHashMap;

use crate::error::EngineError;

/// Maps archive names to their last-modified stamps so fetch URLs can carry
/// a `?v=` marker: browsers keep their cache across page loads but still see
/// rebuilt archives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveManifest {
    entries: FxHashMap<String, u64>,
}

impl ArchiveManifest {
    /// Where the manifest lives next to the page.
    pub const PATH: &'static str = "manifest.json";

    pub fn parse(bytes: &[u8]) -> Result<Self, EngineError> {
        let entries: FxHashMap<String, u64> = serde_json::from_slice(bytes)
            .map_err(|err| EngineError::Vfs(format!("invalid manifest: {err}")))?;
        Ok(Self { entries })
    }

    #[must_use]
    pub fn stamp(&self, name: &str) -> Option<u64> {
        self.entries.get(name).copied()
    }

    /// The fetch path for an archive, cache-busted when its stamp is known.
    #[must_use]
    pub fn busted_path(&self, name: &str) -> String {
        match self.stamp(name) {
            Some(stamp) => format!("{name}?v={stamp}"),
            None => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_archives_get_a_version_marker() {
        let manifest =
            ArchiveManifest::parse(b"{\"phan-5.5.2.phar\": 1712345678}").expect("parse manifest");
        assert_eq!(
            manifest.busted_path("phan-5.5.2.phar"),
            "phan-5.5.2.phar?v=1712345678"
        );
        assert_eq!(manifest.busted_path("phan-v6-dev.phar"), "phan-v6-dev.phar");
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        assert!(ArchiveManifest::parse(b"[1,2,3]").is_err());
    }
}
