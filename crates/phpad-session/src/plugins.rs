//! Analysis rule catalog, presets, and the shareable bitset encoding.

#![allow(missing_docs)]

use num_bigint::BigUint;
use once_cell::sync::Lazy;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::error::SessionError;

/// Fixed, alphabetically ordered rule catalog. Position is the bit index of
/// the shared-link encoding, so entries are append/reorder-frozen: new rules
/// grow the tail in a catalog revision, existing indexes never move.
///
/// Rules needing a host php binary or a test framework still appear here so
/// that links shared from full installations decode losslessly; the harness
/// simply passes the names through to the analyzer.
pub const PLUGIN_CATALOG: &[&str] = &[
    "AddNeverReturnTypePlugin",
    "AlwaysReturnPlugin",
    "AsymmetricVisibilityPlugin",
    "AvoidableGetterPlugin",
    "ConstantVariablePlugin",
    "DeprecateAliasPlugin",
    "DeprecatedClassConstantPlugin",
    "DollarDollarPlugin",
    "DuplicateArrayKeyPlugin",
    "DuplicateCatchPlugin",
    "DuplicateConstantPlugin",
    "DuplicateExpressionPlugin",
    "EmptyMethodAndFunctionPlugin",
    "EmptyStatementListPlugin",
    "FFIAnalysisPlugin",
    "GlobalVariableWritePlugin",
    "HasPHPDocPlugin",
    "ImplicitNullablePlugin",
    "InlineHTMLPlugin",
    "InvalidVariableIssetPlugin",
    "InvokePHPNativeSyntaxCheckPlugin",
    "LoopVariableReusePlugin",
    "MixedTypeInferencePlugin",
    "MoreSpecificElementTypePlugin",
    "NoAssertPlugin",
    "NonBoolBranchPlugin",
    "NonBoolInLogicalArithPlugin",
    "NotFullyQualifiedUsagePlugin",
    "NumericalComparisonPlugin",
    "PHPDocInWrongCommentPlugin",
    "PHPDocRedundantPlugin",
    "PHPDocToRealTypesPlugin",
    "PHPUnitAssertionPlugin",
    "PHPUnitNotDeadCodePlugin",
    "PhanSelfCheckPlugin",
    "PossiblyStaticMethodPlugin",
    "PregRegexCheckerPlugin",
    "PrintfCheckerPlugin",
    "RedundantAssignmentPlugin",
    "RemoveDebugStatementPlugin",
    "ShortArrayPlugin",
    "SimplifyExpressionPlugin",
    "SleepCheckerPlugin",
    "StaticVariableMisusePlugin",
    "StrictComparisonPlugin",
    "StrictLiteralComparisonPlugin",
    "SuspiciousParamOrderPlugin",
    "ThrowAnalyzerPlugin",
    "UnknownClassElementAccessPlugin",
    "UnknownElementTypePlugin",
    "UnreachableCodePlugin",
    "UnsafeArrayAccessPlugin",
    "UnsafeCodePlugin",
    "UnusedSuppressionPlugin",
    "UseReturnValuePlugin",
    "WhitespacePlugin",
];

static CATALOG_INDEX: Lazy<FxHashMap<&'static str, usize>> = Lazy::new(|| {
    PLUGIN_CATALOG
        .iter()
        .enumerate()
        .map(|(index, name)| (*name, index))
        .collect()
});

/// Named preset severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresetLevel {
    Level1,
    Level2,
    Level3,
    Level4,
    Level5,
}

impl PresetLevel {
    pub const ALL: [Self; 5] = [
        Self::Level1,
        Self::Level2,
        Self::Level3,
        Self::Level4,
        Self::Level5,
    ];

    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::Level1 => 1,
            Self::Level2 => 2,
            Self::Level3 => 3,
            Self::Level4 => 4,
            Self::Level5 => 5,
        }
    }

    /// Member rule names of this preset.
    #[must_use]
    pub fn members(self) -> &'static [&'static str] {
        const LEVEL2: &[&str] = &[
            "AlwaysReturnPlugin",
            "DollarDollarPlugin",
            "DuplicateArrayKeyPlugin",
            "DuplicateExpressionPlugin",
            "PregRegexCheckerPlugin",
            "PrintfCheckerPlugin",
            "SleepCheckerPlugin",
            "UnreachableCodePlugin",
            "UseReturnValuePlugin",
            "EmptyStatementListPlugin",
            "StrictComparisonPlugin",
            "LoopVariableReusePlugin",
        ];
        const LEVEL3: &[&str] = &[
            "AlwaysReturnPlugin",
            "DollarDollarPlugin",
            "DuplicateArrayKeyPlugin",
            "DuplicateExpressionPlugin",
            "PregRegexCheckerPlugin",
            "PrintfCheckerPlugin",
            "SleepCheckerPlugin",
            "UnreachableCodePlugin",
            "UseReturnValuePlugin",
            "EmptyStatementListPlugin",
            "InvalidVariableIssetPlugin",
            "NonBoolBranchPlugin",
            "NonBoolInLogicalArithPlugin",
            "NumericalComparisonPlugin",
        ];
        const LEVEL4: &[&str] = &[
            "AlwaysReturnPlugin",
            "DollarDollarPlugin",
            "DuplicateArrayKeyPlugin",
            "DuplicateExpressionPlugin",
            "PregRegexCheckerPlugin",
            "PrintfCheckerPlugin",
            "SleepCheckerPlugin",
            "UnreachableCodePlugin",
            "UseReturnValuePlugin",
            "EmptyStatementListPlugin",
            "InvalidVariableIssetPlugin",
            "NonBoolBranchPlugin",
            "NonBoolInLogicalArithPlugin",
            "NumericalComparisonPlugin",
            "RedundantAssignmentPlugin",
            "UnknownElementTypePlugin",
        ];
        match self {
            Self::Level1 => &[],
            Self::Level2 => LEVEL2,
            Self::Level3 => LEVEL3,
            Self::Level4 => LEVEL4,
            Self::Level5 => PLUGIN_CATALOG,
        }
    }
}

/// A set of selected analysis rules drawn from [`PLUGIN_CATALOG`].
///
/// Unknown names are never admitted, so equality against preset member lists
/// is always well defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSet {
    selected: FxHashSet<SmolStr>,
}

impl Default for PluginSet {
    /// The playground defaults to the level 2 preset.
    fn default() -> Self {
        Self::preset(PresetLevel::Level2)
    }
}

impl PluginSet {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            selected: FxHashSet::default(),
        }
    }

    /// Build a set from names, silently dropping anything not in the catalog.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::empty();
        for name in names {
            set.insert(name.as_ref());
        }
        set
    }

    #[must_use]
    pub fn preset(level: PresetLevel) -> Self {
        Self::from_names(level.members().iter().copied())
    }

    /// Insert a catalog rule; returns false for unknown names.
    pub fn insert(&mut self, name: &str) -> bool {
        if CATALOG_INDEX.contains_key(name) {
            self.selected.insert(SmolStr::new(name));
            true
        } else {
            tracing::debug!(name, "ignoring unknown plugin name");
            false
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.selected.remove(name)
    }

    pub fn toggle(&mut self, name: &str) -> bool {
        if self.selected.contains(name) {
            self.selected.remove(name);
            false
        } else {
            self.insert(name)
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.selected.contains(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected names in catalog order (deterministic for encoding into the
    /// analysis harness).
    #[must_use]
    pub fn names(&self) -> Vec<SmolStr> {
        PLUGIN_CATALOG
            .iter()
            .filter(|name| self.selected.contains(**name))
            .map(|name| SmolStr::new(*name))
            .collect()
    }

    /// Encode as a decimal big-integer bitset keyed by catalog index.
    ///
    /// The catalog outgrew native integer widths long ago, so this stays an
    /// arbitrary-precision value end to end.
    #[must_use]
    pub fn encode_bitset(&self) -> String {
        let mut bits = BigUint::from(0u8);
        for name in &self.selected {
            if let Some(index) = CATALOG_INDEX.get(name.as_str()) {
                bits.set_bit(*index as u64, true);
            }
        }
        bits.to_str_radix(10)
    }

    /// Decode a decimal big-integer bitset. Bits beyond the current catalog
    /// are ignored so links from a larger future catalog still load.
    pub fn decode_bitset(text: &str) -> Result<Self, SessionError> {
        let trimmed = text.trim();
        let bits = BigUint::parse_bytes(trimmed.as_bytes(), 10)
            .ok_or_else(|| SessionError::MalformedBitset(SmolStr::new(trimmed)))?;
        let mut set = Self::empty();
        for (index, name) in PLUGIN_CATALOG.iter().enumerate() {
            if bits.bit(index as u64) {
                set.selected.insert(SmolStr::new(*name));
            }
        }
        Ok(set)
    }

    /// The preset whose member list is exactly this set, if any; `None` means
    /// the selection is custom.
    #[must_use]
    pub fn matching_preset(&self) -> Option<PresetLevel> {
        PresetLevel::ALL.into_iter().find(|level| {
            let members = level.members();
            members.len() == self.selected.len()
                && members.iter().all(|name| self.selected.contains(*name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_sorted_and_wide() {
        assert!(PLUGIN_CATALOG.len() > 53);
        let mut sorted = PLUGIN_CATALOG.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, PLUGIN_CATALOG);
    }

    #[test]
    fn presets_only_name_catalog_rules() {
        for level in PresetLevel::ALL {
            for name in level.members() {
                assert!(
                    CATALOG_INDEX.contains_key(name),
                    "preset {level:?} names unknown rule {name}"
                );
            }
        }
    }

    #[test]
    fn unknown_names_are_dropped() {
        let mut set = PluginSet::empty();
        assert!(!set.insert("NotARealPlugin"));
        assert!(set.is_empty());
    }
}
