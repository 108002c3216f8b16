use phpad_runtime::testkit::{ScriptedEngineFactory, ScriptedEval, StaticBuildSource};
use phpad_runtime::{EngineError, LifecycleState, LoadPhase, SandboxManager};
use phpad_session::{GrammarVersion, RuntimeVersion, VersionTriple};

fn manager_with(
    factory: &ScriptedEngineFactory,
    source: &StaticBuildSource,
) -> SandboxManager {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    SandboxManager::new(
        Box::new(factory.clone()),
        Box::new(source.clone()),
        VersionTriple::default(),
    )
}

#[test]
fn load_prewarms_one_spare() {
    let factory = ScriptedEngineFactory::new();
    let source = StaticBuildSource::for_triple(VersionTriple::default());
    let mut manager = manager_with(&factory, &source);

    manager.load().expect("load build");
    assert_eq!(manager.state(), LifecycleState::Ready);
    assert!(manager.is_usable());
    assert_eq!(factory.instantiate_calls(), 1);
    assert_eq!(factory.eval_calls(), 0);
}

#[test]
fn each_run_consumes_one_sandbox_and_queues_a_spare() {
    let factory = ScriptedEngineFactory::new();
    let source = StaticBuildSource::for_triple(VersionTriple::default());
    let mut manager = manager_with(&factory, &source);
    manager.load().expect("load build");

    factory.push_outcome(ScriptedEval::ok("first"));
    let result = manager
        .run("<?php echo 1;")
        .expect("not busy")
        .expect("first run succeeds");
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "first\n");

    factory.push_outcome(ScriptedEval::ok("second"));
    let result = manager
        .run("<?php echo 2;")
        .expect("not busy")
        .expect("second run succeeds");
    assert_eq!(result.stdout, "second\n");

    assert_eq!(factory.eval_calls(), 2);
    // one spare from load, plus one replacement after each release
    assert_eq!(factory.instantiate_calls(), 3);
    assert_eq!(manager.state(), LifecycleState::Ready);
}

#[test]
fn output_does_not_leak_between_runs() {
    let factory = ScriptedEngineFactory::new();
    let source = StaticBuildSource::for_triple(VersionTriple::default());
    let mut manager = manager_with(&factory, &source);
    manager.load().expect("load build");

    factory.push_outcome(ScriptedEval::Succeed {
        exit_code: 1,
        stdout: "partial".to_string(),
        stderr: "boom".to_string(),
    });
    let first = manager
        .run("<?php bad();")
        .expect("not busy")
        .expect("engine call completes");
    assert_eq!(first.exit_code, 1);
    assert_eq!(first.stderr, "boom\n");

    factory.push_outcome(ScriptedEval::ok("clean"));
    let second = manager
        .run("<?php ok();")
        .expect("not busy")
        .expect("second run succeeds");
    assert_eq!(second.stdout, "clean\n");
    assert!(second.stderr.is_empty());
}

#[test]
fn fetch_failure_during_load_is_fatal_until_reload() {
    let factory = ScriptedEngineFactory::new();
    let source = StaticBuildSource::for_triple(VersionTriple::default());
    source.fail_path(&VersionTriple::default().wasm_binary_path());
    let mut manager = manager_with(&factory, &source);

    let err = manager.load().unwrap_err();
    assert!(matches!(err, EngineError::Network { .. }));
    assert_eq!(manager.state(), LifecycleState::Unusable);
    assert!(manager.run("<?php echo 1;").is_none());
    assert_eq!(factory.eval_calls(), 0);
}

#[test]
fn engine_abort_poisons_the_session_until_version_reload() {
    let factory = ScriptedEngineFactory::new();
    let source = StaticBuildSource::for_triple(VersionTriple::default());
    let mut manager = manager_with(&factory, &source);
    manager.load().expect("load build");

    factory.push_outcome(ScriptedEval::Abort("wasm trap".to_string()));
    let err = manager
        .run("<?php analyze();")
        .expect("not busy")
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(manager.state(), LifecycleState::Unusable);

    // subsequent triggers are no-ops: exactly zero additional engine calls
    let evals_before = factory.eval_calls();
    assert!(manager.run("<?php echo 1;").is_none());
    assert!(manager.run("<?php echo 2;").is_none());
    assert_eq!(factory.eval_calls(), evals_before);

    // a version-change reload is the documented recovery path
    let new_triple = VersionTriple {
        runtime: RuntimeVersion::Php83,
        grammar: GrammarVersion::V1_1_2,
        ..VersionTriple::default()
    };
    source.insert(&new_triple.loader_script_path(), b"// loader".to_vec());
    source.insert(&new_triple.wasm_binary_path(), b"\0asm".to_vec());
    manager.reload(new_triple).expect("reload recovers");
    assert_eq!(manager.state(), LifecycleState::Ready);

    factory.push_outcome(ScriptedEval::ok("recovered"));
    let result = manager
        .run("<?php echo 3;")
        .expect("not busy")
        .expect("run after recovery");
    assert_eq!(result.stdout, "recovered\n");
}

#[test]
fn failed_spare_prewarm_leaves_loading_and_retries_on_next_run() {
    let factory = ScriptedEngineFactory::new();
    let source = StaticBuildSource::for_triple(VersionTriple::default());
    let mut manager = manager_with(&factory, &source);
    manager.load().expect("load build");

    // the replacement spare after this run fails to come up
    factory.fail_next_instantiations(1);
    factory.push_outcome(ScriptedEval::ok("run output"));
    manager
        .run("<?php echo 1;")
        .expect("not busy")
        .expect("run succeeds despite prewarm failure");
    assert_eq!(
        manager.state(),
        LifecycleState::Loading(LoadPhase::InitializingEngine)
    );
    assert!(manager.is_usable());

    // the next user-triggered attempt instantiates lazily and proceeds
    factory.push_outcome(ScriptedEval::ok("lazy"));
    let result = manager
        .run("<?php echo 2;")
        .expect("not busy")
        .expect("lazy instantiation succeeds");
    assert_eq!(result.stdout, "lazy\n");
    assert_eq!(manager.state(), LifecycleState::Ready);
}

#[test]
fn archives_are_fetched_once_and_cache_busted_via_manifest() {
    let factory = ScriptedEngineFactory::new();
    let source = StaticBuildSource::for_triple(VersionTriple::default());
    source.insert(
        "manifest.json",
        b"{\"phan-5.5.2.phar\": 42}".to_vec(),
    );
    source.insert("phan-5.5.2.phar?v=42", b"phar bytes".to_vec());
    let mut manager = manager_with(&factory, &source);
    manager.load().expect("load build");
    manager.ensure_manifest();

    let first = manager
        .ensure_archive("phan-5.5.2.phar")
        .expect("fetch archive");
    let second = manager
        .ensure_archive("phan-5.5.2.phar")
        .expect("cached archive");
    assert_eq!(first, second);

    let log = source.fetch_log();
    let archive_fetches = log
        .iter()
        .filter(|path| path.starts_with("phan-5.5.2.phar"))
        .count();
    assert_eq!(archive_fetches, 1);
    assert!(log.contains(&"phan-5.5.2.phar?v=42".to_string()));
}

#[test]
fn reload_tears_down_the_archive_cache() {
    let factory = ScriptedEngineFactory::new();
    let source = StaticBuildSource::for_triple(VersionTriple::default());
    source.insert("phan-5.5.2.phar", b"phar bytes".to_vec());
    let mut manager = manager_with(&factory, &source);
    manager.load().expect("load build");
    manager
        .ensure_archive("phan-5.5.2.phar")
        .expect("fetch archive");

    manager.reload(VersionTriple::default()).expect("reload");
    manager
        .ensure_archive("phan-5.5.2.phar")
        .expect("refetch archive");

    let archive_fetches = source
        .fetch_log()
        .iter()
        .filter(|path| path.as_str() == "phan-5.5.2.phar")
        .count();
    assert_eq!(archive_fetches, 2);
}
