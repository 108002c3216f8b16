//! Interpreter/analyzer/grammar build selection and compatibility rules.

#![allow(missing_docs)]

use smol_str::SmolStr;

/// PHP runtime build line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RuntimeVersion {
    Php81,
    Php82,
    Php83,
    #[default]
    Php84,
    Php85,
}

impl RuntimeVersion {
    pub const ALL: [Self; 5] = [
        Self::Php81,
        Self::Php82,
        Self::Php83,
        Self::Php84,
        Self::Php85,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Php81 => "81",
            Self::Php82 => "82",
            Self::Php83 => "83",
            Self::Php84 => "84",
            Self::Php85 => "85",
        }
    }

    /// Parse an enumerated value; anything else yields `None` so the caller
    /// retains its current selection.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == text.trim())
    }
}

/// Static analyzer build line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnalyzerVersion {
    #[default]
    V5_5_2,
    V6Dev,
}

impl AnalyzerVersion {
    pub const ALL: [Self; 2] = [Self::V5_5_2, Self::V6Dev];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V5_5_2 => "5.5.2",
            Self::V6Dev => "v6-dev",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == text.trim())
    }

    /// Development tags ship a sidecar info file describing the exact build.
    #[must_use]
    pub fn is_dev(self) -> bool {
        matches!(self, Self::V6Dev)
    }

    /// Name of the analyzer archive for this version.
    #[must_use]
    pub fn archive_name(self) -> String {
        format!("phan-{}.phar", self.as_str())
    }

    /// Path of the sidecar build-info file, if this version carries one.
    #[must_use]
    pub fn info_path(self) -> Option<String> {
        self.is_dev().then(|| format!("{}.info", self.archive_name()))
    }
}

/// AST grammar extension line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GrammarVersion {
    V1_1_2,
    #[default]
    V1_1_3,
}

impl GrammarVersion {
    pub const ALL: [Self; 2] = [Self::V1_1_2, Self::V1_1_3];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_1_2 => "1.1.2",
            Self::V1_1_3 => "1.1.3",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == text.trim())
    }
}

/// The three build components fetched as a matched set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VersionTriple {
    pub runtime: RuntimeVersion,
    pub analyzer: AnalyzerVersion,
    pub grammar: GrammarVersion,
}

impl VersionTriple {
    #[must_use]
    pub fn new(
        runtime: RuntimeVersion,
        analyzer: AnalyzerVersion,
        grammar: GrammarVersion,
    ) -> Self {
        Self {
            runtime,
            analyzer,
            grammar,
        }
    }

    /// Directory holding the loader script and engine binary for this triple.
    #[must_use]
    pub fn build_dir(&self) -> String {
        format!(
            "builds/php-{}/ast-{}/",
            self.runtime.as_str(),
            self.grammar.as_str()
        )
    }

    #[must_use]
    pub fn loader_script_path(&self) -> String {
        format!("{}php.js", self.build_dir())
    }

    #[must_use]
    pub fn wasm_binary_path(&self) -> String {
        format!("{}php.wasm", self.build_dir())
    }

    /// Analyzer archives live beside the page, not under the build dir.
    #[must_use]
    pub fn analyzer_archive_name(&self) -> String {
        self.analyzer.archive_name()
    }
}

/// Result of applying the compatibility rules to a triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintReport {
    /// The corrected triple, always satisfying the constraint function.
    pub triple: VersionTriple,
    /// Grammar choices the UI must mark unavailable.
    pub disabled_grammars: Vec<GrammarVersion>,
    /// True when the grammar selection was changed to satisfy the rules.
    pub coerced: bool,
}

/// Apply the compatibility rules: newer runtimes and the analyzer dev tag
/// require grammar 1.1.3. Idempotent; must run after every runtime or
/// analyzer change before a sandbox is (re)built.
#[must_use]
pub fn enforce_constraints(triple: VersionTriple) -> ConstraintReport {
    let requires_newer_grammar = matches!(
        triple.runtime,
        RuntimeVersion::Php84 | RuntimeVersion::Php85
    ) || triple.analyzer == AnalyzerVersion::V6Dev;

    if !requires_newer_grammar {
        return ConstraintReport {
            triple,
            disabled_grammars: Vec::new(),
            coerced: false,
        };
    }

    let coerced = triple.grammar == GrammarVersion::V1_1_2;
    if coerced {
        tracing::debug!(
            runtime = triple.runtime.as_str(),
            analyzer = triple.analyzer.as_str(),
            "grammar 1.1.2 unavailable for selection, coercing to 1.1.3"
        );
    }
    ConstraintReport {
        triple: VersionTriple {
            grammar: GrammarVersion::V1_1_3,
            ..triple
        },
        disabled_grammars: vec![GrammarVersion::V1_1_2],
        coerced,
    }
}

/// Extract the commit hash from a dev-build info blurb
/// (`"... commit 0a1b2c3d ..."`).
#[must_use]
pub fn parse_build_info(text: &str) -> Option<SmolStr> {
    let rest = text.split("commit ").nth(1)?;
    let hash: String = rest
        .chars()
        .take_while(|c| matches!(c, '0'..='9' | 'a'..='f'))
        .collect();
    if hash.is_empty() {
        None
    } else {
        Some(SmolStr::new(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_enforcement_is_idempotent() {
        for runtime in RuntimeVersion::ALL {
            for analyzer in AnalyzerVersion::ALL {
                for grammar in GrammarVersion::ALL {
                    let triple = VersionTriple::new(runtime, analyzer, grammar);
                    let once = enforce_constraints(triple);
                    let twice = enforce_constraints(once.triple);
                    assert_eq!(once.triple, twice.triple);
                    assert!(!twice.coerced);
                    assert_eq!(once.disabled_grammars, twice.disabled_grammars);
                }
            }
        }
    }

    #[test]
    fn build_info_commit_hash() {
        let text = "Phan v6-dev built from commit 9f3ab21c on 2025-06-01";
        assert_eq!(parse_build_info(text).as_deref(), Some("9f3ab21c"));
        assert_eq!(parse_build_info("no hash here"), None);
    }
}
