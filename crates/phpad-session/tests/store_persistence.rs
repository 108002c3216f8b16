use phpad_session::store::{
    DirStateStore, MemoryStateStore, StateStore, CURRENT_INDEX_KEY, FILES_KEY,
};
use phpad_session::{Session, SessionStore, Theme};

fn memory_store() -> SessionStore {
    SessionStore::new(Box::new(MemoryStateStore::default()))
}

#[test]
fn session_round_trips_through_store() {
    let store = memory_store();
    let mut session = Session::default();
    session.update_current_content("<?php echo 'persisted';");
    session.add_file().expect("add file");

    store.save_session(&session).expect("save session");
    let loaded = store.load_session().expect("load session");
    assert_eq!(loaded.files(), session.files());
    assert_eq!(loaded.current_index(), session.current_index());
}

#[test]
fn malformed_persisted_files_fall_back_to_default() {
    let backing = MemoryStateStore::default();
    backing.set(FILES_KEY, "{not json").expect("seed store");
    let store = SessionStore::new(Box::new(backing));
    assert!(store.load_session().is_none());
}

#[test]
fn schema_mismatch_falls_back_to_default() {
    let backing = MemoryStateStore::default();
    backing
        .set(FILES_KEY, "[{\"name\": 3, \"content\": \"x\"}]")
        .expect("seed store");
    let store = SessionStore::new(Box::new(backing));
    assert!(store.load_session().is_none());
}

#[test]
fn out_of_range_index_is_clamped() {
    let backing = MemoryStateStore::default();
    backing
        .set(FILES_KEY, "[{\"name\":\"a.php\",\"content\":\"<?php\"}]")
        .expect("seed files");
    backing
        .set(CURRENT_INDEX_KEY, "7")
        .expect("seed bogus cursor");
    let store = SessionStore::new(Box::new(backing));
    let loaded = store.load_session().expect("load session");
    assert_eq!(loaded.current_index(), 0);
}

#[test]
fn theme_preference_round_trips() {
    let store = memory_store();
    assert_eq!(store.theme(), Theme::Light);
    store.set_theme(Theme::Dark).expect("save theme");
    assert_eq!(store.theme(), Theme::Dark);
}

#[test]
fn credential_blob_round_trips_and_clears() {
    let store = memory_store();
    assert!(store.credential().is_none());

    store.store_credential("ghp_testtoken").expect("save token");
    let blob = store.credential().expect("load credential");
    assert_eq!(blob.token, "ghp_testtoken");
    assert!(blob.timestamp > 0);

    store
        .store_identity("{\"login\":\"octocat\"}")
        .expect("save identity");
    assert!(store.cached_identity().is_some());

    store.clear_credential().expect("clear credential");
    assert!(store.credential().is_none());
    assert!(store.cached_identity().is_none());
}

#[test]
fn dir_store_persists_across_instances() {
    let dir = tempfile::tempdir().expect("create temp dir");
    {
        let store = SessionStore::new(Box::new(DirStateStore::new(dir.path())));
        let mut session = Session::default();
        session.update_current_content("<?php echo 'disk';");
        store.save_session(&session).expect("save session");
    }
    let store = SessionStore::new(Box::new(DirStateStore::new(dir.path())));
    let loaded = store.load_session().expect("load session");
    assert_eq!(loaded.files()[0].content, "<?php echo 'disk';");
}
