//! Harness templates and the escape-and-substitute step.
//!
//! User source never lands in a template verbatim: the content placeholder is
//! filled with a `rawurldecode("...")` expression over a percent-encoded copy
//! of the source. Percent encoding round-trips single quotes, double quotes,
//! and non-ASCII through the substitution boundary.

#![allow(missing_docs)]

use phpad_session::{PluginSet, SourceFile, VersionTriple};

use crate::error::EngineError;

pub const CONTENT_PLACEHOLDER: &str = "$CONTENTS_TO_ANALYZE";
pub const ARCHIVE_PLACEHOLDER: &str = "$PHAN_PHAR_PATH";
pub const PLUGINS_PLACEHOLDER: &str = "$ACTIVE_PLUGINS_PLACEHOLDER";

/// Line replaced wholesale when composing a multi-file analysis.
const SINGLE_INPUT_WRITE: &str = "file_put_contents('input', $CONTENTS_TO_ANALYZE);";
const SINGLE_INPUT_LIST: &str = "Config::setValue('file_list', ['input']);";

/// Wrapper for plain execution. The substituted fragment is a PHP expression
/// or statement block; `eval` of a `?>`-prefixed string emits the raw file.
const EVAL_WRAPPER: &str = r#"<?php
error_reporting(E_ALL);
ini_set('display_errors', 'stderr');
eval($CONTENTS_TO_ANALYZE);
echo PHP_EOL;
"#;

/// Wrapper for static analysis via the bundled analyzer archive.
const ANALYZE_WRAPPER: &str = r#"<?php
error_reporting(E_ALL & ~E_DEPRECATED);
require_once 'phar:///$PHAN_PHAR_PATH/src/__phan.php';
use Phan\Config;
use Phan\Phan;
file_put_contents('input', $CONTENTS_TO_ANALYZE);
Config::setValue('file_list', ['input']);
Config::setValue('allow_missing_properties', false);
Config::setValue('unused_variable_detection', true);
$ACTIVE_PLUGINS_PLACEHOLDER
Phan::analyzeFileList();
"#;

/// Wrapper for structure inspection: parse and dump the tree as JSON for the
/// out-of-scope visualizer. The grammar extension pins its API version, so
/// the literal here follows the loaded build.
const INSPECT_WRAPPER: &str = r#"<?php
error_reporting(0);
$ast = ast\parse_code($CONTENTS_TO_ANALYZE, $AST_API_VERSION);
echo json_encode(ast_dump_json($ast)), PHP_EOL;
"#;

const GRAMMAR_PLACEHOLDER: &str = "$AST_API_VERSION";

/// What a trigger wants from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run the program.
    Execute,
    /// Statically analyze every file.
    Analyze,
    /// Dump the parse structure of the current file.
    Inspect,
}

impl RunMode {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Execute => "run",
            Self::Analyze => "analyze",
            Self::Inspect => "inspect",
        }
    }
}

/// A fully composed source plus the archive it needs staged, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedSource {
    pub text: String,
    pub archive: Option<String>,
}

/// Percent-encode source and wrap it in the decoding expression substituted
/// for the content placeholder.
#[must_use]
pub fn escape_source(source: &str) -> String {
    format!("rawurldecode(\"{}\")", urlencoding::encode(source))
}

/// Compose the source handed to the engine for one trigger.
///
/// Multi-file execution stages every file into the virtual filesystem, then
/// requires all non-primary files before the primary file.
pub fn compose(
    mode: RunMode,
    files: &[SourceFile],
    current: usize,
    triple: VersionTriple,
    plugins: &PluginSet,
) -> Result<ComposedSource, EngineError> {
    if files.is_empty() {
        return Err(EngineError::Vfs("no files to compose".to_string()));
    }
    match mode {
        RunMode::Execute => Ok(ComposedSource {
            text: compose_execute(files),
            archive: None,
        }),
        RunMode::Analyze => Ok(ComposedSource {
            text: compose_analyze(files, triple, plugins)?,
            archive: Some(triple.analyzer_archive_name()),
        }),
        RunMode::Inspect => {
            let file = files.get(current).unwrap_or(&files[0]);
            Ok(ComposedSource {
                text: compose_inspect(file),
                archive: None,
            })
        }
    }
}

fn compose_execute(files: &[SourceFile]) -> String {
    if files.len() == 1 {
        // single file: emit the raw file through eval's close-tag trick
        let prefixed = format!("?>{}", files[0].content);
        return EVAL_WRAPPER.replacen(CONTENT_PLACEHOLDER, &escape_source(&prefixed), 1);
    }
    let mut staged = String::new();
    for file in files {
        staged.push_str(&vfs_write_statement(file));
    }
    for file in &files[1..] {
        staged.push_str(&format!("require_once \"{}\";\n", file.name));
    }
    staged.push_str(&format!("require_once \"{}\";", files[0].name));
    EVAL_WRAPPER.replacen(CONTENT_PLACEHOLDER, &escape_source(&staged), 1)
}

fn compose_analyze(
    files: &[SourceFile],
    triple: VersionTriple,
    plugins: &PluginSet,
) -> Result<String, EngineError> {
    let plugin_names: Vec<String> = plugins
        .names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let plugins_statement = format!(
        "Config::setValue('plugins', {});",
        serde_json::to_string(&plugin_names)
            .map_err(|err| EngineError::Vfs(format!("encode plugin list: {err}")))?
    );

    let wrapper = ANALYZE_WRAPPER
        .replacen(ARCHIVE_PLACEHOLDER, &triple.analyzer_archive_name(), 1)
        .replacen(PLUGINS_PLACEHOLDER, &plugins_statement, 1);

    if files.len() == 1 {
        return Ok(wrapper.replacen(CONTENT_PLACEHOLDER, &escape_source(&files[0].content), 1));
    }

    // multi-file: swap the single 'input' write for per-file writes and the
    // real file list
    let mut writes = String::new();
    for file in files {
        writes.push_str(&vfs_write_statement(file));
    }
    let names: Vec<String> = files.iter().map(|file| file.name.to_string()).collect();
    let list_statement = format!(
        "Config::setValue('file_list', {});",
        serde_json::to_string(&names)
            .map_err(|err| EngineError::Vfs(format!("encode file list: {err}")))?
    );
    Ok(wrapper
        .replacen(SINGLE_INPUT_WRITE, writes.trim_end(), 1)
        .replacen(SINGLE_INPUT_LIST, &list_statement, 1))
}

fn compose_inspect(file: &SourceFile) -> String {
    let prefixed = format!("?>{}", file.content);
    INSPECT_WRAPPER
        .replacen(CONTENT_PLACEHOLDER, &escape_source(&prefixed), 1)
        .replacen(GRAMMAR_PLACEHOLDER, "110", 1)
}

fn vfs_write_statement(file: &SourceFile) -> String {
    format!(
        "file_put_contents(\"{}\", {});\n",
        file.name,
        escape_source(&file.content)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use phpad_session::PluginSet;

    #[test]
    fn escaping_round_trips_quotes() {
        let escaped = escape_source("echo 'a' . \"b\";");
        assert!(escaped.starts_with("rawurldecode(\""));
        assert!(!escaped.contains('\''));
        // the only double quotes are the delimiters of the decode expression
        assert_eq!(escaped.matches('"').count(), 2);
    }

    #[test]
    fn analyze_wrapper_names_the_selected_archive() {
        let files = [SourceFile::new("file1.php", "<?php echo 1;")];
        let composed = compose(
            RunMode::Analyze,
            &files,
            0,
            VersionTriple::default(),
            &PluginSet::default(),
        )
        .expect("compose analyze");
        assert!(composed.text.contains("phan-5.5.2.phar"));
        assert_eq!(composed.archive.as_deref(), Some("phan-5.5.2.phar"));
        assert!(!composed.text.contains(PLUGINS_PLACEHOLDER));
    }
}
