//! Browser adapter for the phpad session codec.
//!
//! The page shell keeps DOM wiring and engine loading on the JS side and
//! calls into this adapter for everything with real decoding rules: the
//! shareable-link codec, version compatibility, and the plugin bitset.
//! Values cross the boundary as JSON strings.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use phpad_session::codec;
use phpad_session::{
    enforce_constraints, AnalyzerVersion, GrammarVersion, PluginSet, PresetLevel, RuntimeVersion,
    Session, SourceFile, VersionTriple, PLUGIN_CATALOG,
};

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
use wasm_bindgen::prelude::wasm_bindgen;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTripleItem {
    pub php: String,
    pub phan: String,
    pub ast: String,
}

impl VersionTripleItem {
    fn from_triple(triple: VersionTriple) -> Self {
        Self {
            php: triple.runtime.as_str().to_string(),
            phan: triple.analyzer.as_str().to_string(),
            ast: triple.grammar.as_str().to_string(),
        }
    }

    /// Out-of-enum values fall back to the defaults, matching the URL rules.
    fn to_triple(&self) -> VersionTriple {
        let mut triple = VersionTriple::default();
        if let Some(value) = RuntimeVersion::parse(&self.php) {
            triple.runtime = value;
        }
        if let Some(value) = AnalyzerVersion::parse(&self.phan) {
            triple.analyzer = value;
        }
        if let Some(value) = GrammarVersion::parse(&self.ast) {
            triple.grammar = value;
        }
        triple
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetRefItem {
    pub id: String,
    pub revision: Option<String>,
}

/// Decoded query state handed to the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareStateItem {
    pub snippet: Option<SnippetRefItem>,
    pub files: Option<Vec<FileItem>>,
    pub versions: VersionTripleItem,
    /// Selected rule names in catalog order; `None` keeps the default preset.
    pub plugins: Option<Vec<String>>,
}

/// Session snapshot the shell submits for encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionItem {
    pub files: Vec<FileItem>,
    pub versions: VersionTripleItem,
    pub plugins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintItem {
    pub versions: VersionTripleItem,
    pub disabled_grammars: Vec<String>,
    pub coerced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginStateItem {
    pub selected: Vec<String>,
    pub bitset: String,
    /// Preset number whose member list equals the selection, if any.
    pub preset: Option<u8>,
}

/// Decode a page query string.
#[must_use]
pub fn decode_share_query(query: &str) -> ShareStateItem {
    let state = codec::decode_query(query);
    ShareStateItem {
        snippet: state.snippet.map(|reference| SnippetRefItem {
            id: reference.id.to_string(),
            revision: reference.revision.map(|rev| rev.to_string()),
        }),
        files: state.files.map(|files| {
            files
                .into_iter()
                .map(|file| FileItem {
                    name: file.name.to_string(),
                    content: file.content,
                })
                .collect()
        }),
        versions: VersionTripleItem::from_triple(state.versions),
        plugins: state.plugins.map(|set| string_names(&set)),
    }
}

/// Encode a session snapshot into the query string for the address bar; an
/// empty result means the parameters should be cleared.
pub fn encode_share_query(item: &SessionItem) -> Result<String, String> {
    let files = item
        .files
        .iter()
        .map(|file| SourceFile::new(file.name.as_str(), file.content.clone()))
        .collect();
    let mut session = Session::from_files(files).map_err(|err| err.to_string())?;
    session.set_versions(item.versions.to_triple());
    session.set_plugins(PluginSet::from_names(item.plugins.iter()));
    Ok(codec::encode(&session))
}

/// Apply the version compatibility rules.
#[must_use]
pub fn enforce_versions(item: &VersionTripleItem) -> ConstraintItem {
    let report = enforce_constraints(item.to_triple());
    ConstraintItem {
        versions: VersionTripleItem::from_triple(report.triple),
        disabled_grammars: report
            .disabled_grammars
            .iter()
            .map(|grammar| grammar.as_str().to_string())
            .collect(),
        coerced: report.coerced,
    }
}

/// The full rule catalog in bit order.
#[must_use]
pub fn plugin_catalog() -> Vec<String> {
    PLUGIN_CATALOG.iter().map(|name| (*name).to_string()).collect()
}

/// Members of a preset level (1-5).
pub fn preset_members(level: u8) -> Result<Vec<String>, String> {
    let level = PresetLevel::ALL
        .into_iter()
        .find(|preset| preset.number() == level)
        .ok_or_else(|| format!("unknown preset level {level}"))?;
    Ok(PluginSet::preset(level)
        .names()
        .iter()
        .map(|name| name.to_string())
        .collect())
}

/// Resolve a selection of rule names to its bitset and matching preset.
#[must_use]
pub fn plugin_state(names: &[String]) -> PluginStateItem {
    let set = PluginSet::from_names(names.iter());
    plugin_state_of(&set)
}

/// Decode a decimal bitset into rule names and the matching preset.
pub fn decode_plugin_bits(text: &str) -> Result<PluginStateItem, String> {
    let set = PluginSet::decode_bitset(text).map_err(|err| err.to_string())?;
    Ok(plugin_state_of(&set))
}

fn plugin_state_of(set: &PluginSet) -> PluginStateItem {
    PluginStateItem {
        selected: string_names(set),
        bitset: set.encode_bitset(),
        preset: set.matching_preset().map(PresetLevel::number),
    }
}

fn string_names(set: &PluginSet) -> Vec<String> {
    set.names().iter().map(|name| name.to_string()).collect()
}

/// JSON-string facade exported to the page shell.
#[cfg_attr(all(target_arch = "wasm32", feature = "wasm"), wasm_bindgen)]
#[derive(Debug, Default)]
pub struct ShareCodec {}

#[cfg_attr(all(target_arch = "wasm32", feature = "wasm"), wasm_bindgen)]
impl ShareCodec {
    #[cfg_attr(
        all(target_arch = "wasm32", feature = "wasm"),
        wasm_bindgen(constructor)
    )]
    #[must_use]
    pub fn new() -> Self {
        Self {}
    }

    #[cfg_attr(
        all(target_arch = "wasm32", feature = "wasm"),
        wasm_bindgen(js_name = decodeQueryJson)
    )]
    pub fn decode_query_json(&self, query: &str) -> Result<String, String> {
        serde_json::to_string(&decode_share_query(query)).map_err(|err| err.to_string())
    }

    #[cfg_attr(
        all(target_arch = "wasm32", feature = "wasm"),
        wasm_bindgen(js_name = encodeQueryJson)
    )]
    pub fn encode_query_json(&self, session_json: &str) -> Result<String, String> {
        let item: SessionItem =
            serde_json::from_str(session_json).map_err(|err| err.to_string())?;
        encode_share_query(&item)
    }

    #[cfg_attr(
        all(target_arch = "wasm32", feature = "wasm"),
        wasm_bindgen(js_name = enforceVersionsJson)
    )]
    pub fn enforce_versions_json(&self, triple_json: &str) -> Result<String, String> {
        let item: VersionTripleItem =
            serde_json::from_str(triple_json).map_err(|err| err.to_string())?;
        serde_json::to_string(&enforce_versions(&item)).map_err(|err| err.to_string())
    }

    #[cfg_attr(
        all(target_arch = "wasm32", feature = "wasm"),
        wasm_bindgen(js_name = pluginStateJson)
    )]
    pub fn plugin_state_json(&self, names_json: &str) -> Result<String, String> {
        let names: Vec<String> =
            serde_json::from_str(names_json).map_err(|err| err.to_string())?;
        serde_json::to_string(&plugin_state(&names)).map_err(|err| err.to_string())
    }

    #[cfg_attr(
        all(target_arch = "wasm32", feature = "wasm"),
        wasm_bindgen(js_name = decodePluginBitsJson)
    )]
    pub fn decode_plugin_bits_json(&self, bits: &str) -> Result<String, String> {
        serde_json::to_string(&decode_plugin_bits(bits)?).map_err(|err| err.to_string())
    }
}
