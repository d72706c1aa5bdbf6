//! Named state stores.
//!
//! A store holds one JSON object per name. Updates merge shallowly into the
//! in-memory copy and notify subscribers immediately; writing to the backend
//! only happens on an explicit [`StateStore::persist`].

use std::collections::HashMap;
use std::sync::Arc;

use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::PersistenceBackend;
use crate::commands::descriptor::StateConfiguration;
use crate::error::{EngineError, Result};

/// Backend key for a named store.
pub fn store_key(name: &str) -> String {
    format!("store:{name}")
}

/// A named, persisted JSON object with change notification.
pub struct StateStore {
    name: String,
    state: Value,
    subscribers: Vec<UnboundedSender<Value>>,
    backend: Arc<dyn PersistenceBackend>,
}

impl StateStore {
    fn new(name: String, state: Value, backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            name,
            state,
            subscribers: Vec::new(),
            backend,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current contents.
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Current contents deserialized into `T`.
    pub fn get_state<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.state.clone()).map_err(|e| {
            EngineError::internal(format!("State '{}' has an unexpected shape: {e}", self.name))
        })
    }

    /// Returns one top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Merges the fields of `patch` over the current state and notifies
    /// subscribers. A patch that is not an object replaces the state.
    pub fn update_state(&mut self, patch: Value) {
        match (&mut self.state, patch) {
            (Value::Object(current), Value::Object(fields)) => {
                for (key, value) in fields {
                    current.insert(key, value);
                }
            }
            (_, replacement) => self.state = replacement,
        }
        self.notify();
    }

    /// Removes a top-level field, notifying subscribers if it existed.
    pub fn remove_key(&mut self, key: &str) -> Option<Value> {
        let removed = self.state.as_object_mut().and_then(|map| map.remove(key));
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// Subscribes to future updates, projected through `projector`.
    ///
    /// The stream yields once per update made after this call; earlier
    /// updates are not replayed. It ends when the store is dropped.
    pub fn select<T, F>(&mut self, projector: F) -> impl Stream<Item = T>
    where
        F: FnMut(Value) -> T,
    {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx.map(projector)
    }

    /// Writes the current state to the backend.
    pub async fn persist(&self) -> Result<()> {
        debug!(store = %self.name, "Persisting state store");
        self.backend
            .set(&store_key(&self.name), self.state.clone())
            .await
    }

    fn notify(&mut self) {
        let state = &self.state;
        self.subscribers
            .retain(|tx| tx.unbounded_send(state.clone()).is_ok());
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Owns every state store of a session, loading each on first use.
pub struct StateStoreManager {
    stores: HashMap<String, StateStore>,
    backend: Arc<dyn PersistenceBackend>,
}

impl StateStoreManager {
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            stores: HashMap::new(),
            backend,
        }
    }

    /// Returns the store described by `config`, creating it on first access.
    ///
    /// A new store starts from `initial_state` with any persisted fields
    /// merged over it. Unreadable persisted data is logged and ignored.
    pub async fn get_or_load(&mut self, config: &StateConfiguration) -> Result<&mut StateStore> {
        let name = config.store_name.clone();
        if !self.stores.contains_key(&name) {
            let mut state = config.initial_state.clone();
            match self.backend.get(&store_key(&name)).await {
                Ok(Some(Value::Object(saved))) => {
                    if let Value::Object(current) = &mut state {
                        current.extend(saved);
                    } else {
                        state = Value::Object(saved);
                    }
                }
                Ok(Some(other)) => warn!(store = %name, "Ignoring non-object stored state: {other}"),
                Ok(None) => {}
                Err(e) => warn!(store = %name, "Failed to load stored state: {e}"),
            }
            debug!(store = %name, "State store loaded");
            let store = StateStore::new(name.clone(), state, Arc::clone(&self.backend));
            self.stores.insert(name.clone(), store);
        }

        self.stores
            .get_mut(&name)
            .ok_or_else(|| EngineError::internal(format!("State store '{name}' vanished")))
    }

    /// Returns an already-loaded store.
    pub fn get(&mut self, name: &str) -> Option<&mut StateStore> {
        self.stores.get_mut(name)
    }

    /// Names of the loaded stores.
    pub fn names(&self) -> Vec<&str> {
        self.stores.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for StateStoreManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStoreManager")
            .field("stores", &self.stores)
            .finish_non_exhaustive()
    }
}
