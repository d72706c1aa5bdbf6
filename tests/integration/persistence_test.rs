//! Persistence across sessions: history, state stores, aliases, plugins.

use std::sync::Arc;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

use termcore::io::CaptureSink;
use termcore::persistence::{FileBackend, PersistenceBackend, Plugin};
use termcore::{EngineSession, ProcessorDescriptor, StateConfiguration};

async fn file_session(backend: Arc<FileBackend>) -> (EngineSession, CaptureSink) {
    let sink = CaptureSink::new();
    let (session, _handle) = EngineSession::builder()
        .output(sink.clone())
        .backend(backend)
        .build()
        .await
        .unwrap();
    (session, sink)
}

#[tokio::test]
async fn test_history_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("storage.json");

    {
        let (mut session, _) = file_session(Arc::new(FileBackend::new(&path))).await;
        session.execute("echo one").await;
        session.execute("echo one").await;
        session.execute("  ").await;
        session.execute("echo two").await;
    }
    assert!(path.exists());

    let (session, _) = file_session(Arc::new(FileBackend::new(&path))).await;
    assert_eq!(session.history().get_history(), vec!["echo one", "echo two"]);
    assert_eq!(session.history().get_last_index(), 2);
}

#[tokio::test]
async fn test_history_clear_is_persisted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("storage.json");

    {
        let (mut session, _) = file_session(Arc::new(FileBackend::new(&path))).await;
        session.execute("echo one").await;
        session.execute("history clear").await;
    }

    let (session, _) = file_session(Arc::new(FileBackend::new(&path))).await;
    assert!(session.history().get_history().is_empty());
}

#[tokio::test]
async fn test_aliases_survive_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("storage.json");

    {
        let (mut session, _) = file_session(Arc::new(FileBackend::new(&path))).await;
        assert!(session.execute("alias hi echo hello").await.is_success());
    }

    let (mut session, sink) = file_session(Arc::new(FileBackend::new(&path))).await;
    let result = session.execute("hi there").await;
    assert_eq!(result.output, Some(json!("hello there")));
    assert_eq!(sink.lines(), vec!["hello there"]);
}

#[tokio::test]
async fn test_state_store_merges_persisted_over_initial() {
    let dir = tempdir().unwrap();
    let backend = Arc::new(FileBackend::new(dir.path().join("storage.json")));
    backend
        .set("store:prefs", json!({"theme": "dark"}))
        .await
        .unwrap();

    let (mut session, _) = file_session(Arc::clone(&backend)).await;
    let config = StateConfiguration::new("prefs", json!({"theme": "light", "size": 12}));
    let store = session.store(&config).await.unwrap();
    assert_eq!(store.state(), &json!({"theme": "dark", "size": 12}));

    store.update_state(json!({"size": 14}));
    store.persist().await.unwrap();
    assert_eq!(
        backend.get("store:prefs").await.unwrap(),
        Some(json!({"theme": "dark", "size": 14}))
    );
}

#[tokio::test]
async fn test_state_store_select_streams_updates() {
    let dir = tempdir().unwrap();
    let (mut session, _) =
        file_session(Arc::new(FileBackend::new(dir.path().join("storage.json")))).await;
    let config = StateConfiguration::new("counter", json!({"n": 0}));
    let store = session.store(&config).await.unwrap();

    let mut values = store.select(|state| state["n"].as_i64().unwrap_or(-1));
    store.update_state(json!({"n": 1}));
    store.update_state(json!({"n": 2}));

    assert_eq!(values.next().await, Some(1));
    assert_eq!(values.next().await, Some(2));
}

#[tokio::test]
async fn test_corrupt_storage_starts_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("storage.json");
    std::fs::write(&path, "{ not json").unwrap();

    let (mut session, _) = file_session(Arc::new(FileBackend::new(&path))).await;
    assert!(session.history().get_history().is_empty());
    assert!(dir.path().join("storage.json.bak").exists());

    session.execute("echo fresh").await;
    let (session, _) = file_session(Arc::new(FileBackend::new(&path))).await;
    assert_eq!(session.history().get_history(), vec!["echo fresh"]);
}

#[tokio::test]
async fn test_installed_plugins_are_recorded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("storage.json");

    {
        let (mut session, _) = file_session(Arc::new(FileBackend::new(&path))).await;
        session
            .install_plugin(
                Plugin::new("tools", "0.3.1")
                    .with_processor(ProcessorDescriptor::new("fmt", "Format"))
                    .with_processor(ProcessorDescriptor::new("lint", "Lint")),
            )
            .await
            .unwrap();
    }

    let (mut session, _) = file_session(Arc::new(FileBackend::new(&path))).await;
    let installed = session.installed_plugins().await.unwrap();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].name, "tools");
    assert_eq!(installed[0].commands, vec!["fmt", "lint"]);

    // Processors themselves are code; a new session starts without them.
    assert!(session.registry().find_processor::<&str>("fmt", &[]).is_none());
    session.uninstall_plugin("tools").await.unwrap();
    assert!(session.installed_plugins().await.unwrap().is_empty());
}
