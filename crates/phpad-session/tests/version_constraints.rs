use phpad_session::{
    enforce_constraints, AnalyzerVersion, GrammarVersion, RuntimeVersion, VersionTriple,
};

#[test]
fn php_84_disables_and_coerces_old_grammar() {
    let triple = VersionTriple::new(
        RuntimeVersion::Php84,
        AnalyzerVersion::V5_5_2,
        GrammarVersion::V1_1_2,
    );
    let report = enforce_constraints(triple);
    assert_eq!(report.triple.grammar, GrammarVersion::V1_1_3);
    assert!(report.coerced);
    assert_eq!(report.disabled_grammars, vec![GrammarVersion::V1_1_2]);

    // already-satisfying selection is left alone but stays disabled
    let again = enforce_constraints(report.triple);
    assert!(!again.coerced);
    assert_eq!(again.disabled_grammars, vec![GrammarVersion::V1_1_2]);
}

#[test]
fn analyzer_dev_tag_forces_new_grammar() {
    let triple = VersionTriple::new(
        RuntimeVersion::Php81,
        AnalyzerVersion::V6Dev,
        GrammarVersion::V1_1_2,
    );
    let report = enforce_constraints(triple);
    assert_eq!(report.triple.grammar, GrammarVersion::V1_1_3);
    assert!(report.coerced);
}

#[test]
fn older_runtimes_allow_all_grammars() {
    for runtime in [
        RuntimeVersion::Php81,
        RuntimeVersion::Php82,
        RuntimeVersion::Php83,
    ] {
        let triple = VersionTriple::new(
            runtime,
            AnalyzerVersion::V5_5_2,
            GrammarVersion::V1_1_2,
        );
        let report = enforce_constraints(triple);
        assert_eq!(report.triple, triple);
        assert!(report.disabled_grammars.is_empty());
        assert!(!report.coerced);
    }
}

#[test]
fn build_paths_compose_from_triple() {
    let triple = VersionTriple::new(
        RuntimeVersion::Php82,
        AnalyzerVersion::V5_5_2,
        GrammarVersion::V1_1_2,
    );
    assert_eq!(triple.build_dir(), "builds/php-82/ast-1.1.2/");
    assert_eq!(triple.loader_script_path(), "builds/php-82/ast-1.1.2/php.js");
    assert_eq!(
        triple.wasm_binary_path(),
        "builds/php-82/ast-1.1.2/php.wasm"
    );
    assert_eq!(triple.analyzer_archive_name(), "phan-5.5.2.phar");
}

#[test]
fn dev_analyzer_has_info_sidecar() {
    assert_eq!(
        AnalyzerVersion::V6Dev.info_path().as_deref(),
        Some("phan-v6-dev.phar.info")
    );
    assert_eq!(AnalyzerVersion::V5_5_2.info_path(), None);
}
