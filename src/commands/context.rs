//! Execution context handed to running commands.
//!
//! An [`ExecutionContext`] borrows the session for the duration of one
//! `process_command` call and exposes the pieces a command may touch: output,
//! interactive input, its state store, the process controls, services, the
//! clipboard, history, and the dispatcher itself for nested execution.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::descriptor::ProcessorDescriptor;
use super::dispatcher::{self, CommandResult};
use super::help;
use super::registry::ProcessorRegistry;
use crate::error::{EngineError, Result};
use crate::input::Reader;
use crate::io::{Clipboard, Writer};
use crate::persistence::{CommandHistory, StateStore};
use crate::session::EngineSession;

/// Shared services keyed by type, for plugins that need common helpers.
#[derive(Default)]
pub struct Services {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service, replacing any previous one of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, service: T) {
        self.entries.insert(TypeId::of::<T>(), Arc::new(service));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|service| service.downcast::<T>().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("count", &self.entries.len())
            .finish()
    }
}

/// What a command emitted through [`Process`].
#[derive(Debug, Default)]
pub(crate) struct ProcessState {
    pub(crate) output: Option<Value>,
}

/// Process controls: emit output for the next pipeline stage, or exit.
pub struct Process<'p> {
    state: &'p mut ProcessState,
}

impl Process<'_> {
    /// Sets the value passed as `data` to the next pipeline stage.
    pub fn output(&mut self, value: impl Into<Value>) {
        self.state.output = Some(value.into());
    }

    /// Ends the command with `code`. Return the result from `process_command`.
    ///
    /// Code 0 finishes successfully; anything else marks the command failed.
    pub fn exit(&mut self, code: i32) -> Result<()> {
        Err(EngineError::ProcessExited(code))
    }
}

/// Everything a running command can reach.
pub struct ExecutionContext<'a> {
    session: &'a mut EngineSession,
    descriptor: Arc<ProcessorDescriptor>,
    process: ProcessState,
    abort: CancellationToken,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(
        session: &'a mut EngineSession,
        descriptor: Arc<ProcessorDescriptor>,
        abort: CancellationToken,
    ) -> Self {
        Self {
            session,
            descriptor,
            process: ProcessState::default(),
            abort,
        }
    }

    pub(crate) fn into_output(self) -> Option<Value> {
        self.process.output
    }

    /// The descriptor of the running command.
    pub fn descriptor(&self) -> &Arc<ProcessorDescriptor> {
        &self.descriptor
    }

    pub fn writer(&mut self) -> Writer<'_> {
        Writer::new(self.session.output.as_mut())
    }

    pub fn reader(&mut self) -> Reader<'_> {
        Reader::new(&mut self.session.input, self.session.output.as_mut())
    }

    pub fn process(&mut self) -> Process<'_> {
        Process {
            state: &mut self.process,
        }
    }

    /// The state store declared by the running command.
    pub fn state(&mut self) -> Result<&mut StateStore> {
        let config = self.descriptor.state_configuration.as_ref().ok_or_else(|| {
            EngineError::internal(format!(
                "'{}' does not declare a state store",
                self.descriptor.command
            ))
        })?;
        self.session.stores.get(&config.store_name).ok_or_else(|| {
            EngineError::internal(format!("State store '{}' is not loaded", config.store_name))
        })
    }

    pub fn services(&self) -> &Services {
        &self.session.services
    }

    pub fn clipboard(&self) -> Arc<dyn Clipboard> {
        Arc::clone(&self.session.clipboard)
    }

    pub fn history(&mut self) -> &mut CommandHistory {
        &mut self.session.history
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.session.registry
    }

    /// Fires when the user cancels (Ctrl+C, Escape, or a host interrupt).
    pub fn abort_signal(&self) -> CancellationToken {
        self.abort.clone()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// Runs another command line through the dispatcher.
    ///
    /// The nested line is not recorded in history. Its stages get their own
    /// abort signals; this command's signal is current again afterwards.
    pub fn execute<'c>(&'c mut self, line: &'c str) -> BoxFuture<'c, CommandResult> {
        async move {
            let result = dispatcher::run_line(self.session, line).await;
            self.session.input.restore_abort(self.abort.clone());
            result
        }
        .boxed()
    }

    /// Writes help for the command at `path` (all commands when empty).
    pub fn show_help(&mut self, path: &[String]) -> Result<()> {
        let session = &mut *self.session;
        let mut writer = Writer::new(session.output.as_mut());
        help::write_help(&session.registry, path, &mut writer)
    }

    /// Mutable access to the session, for commands that manage the engine
    /// itself (installing processors, clearing the screen).
    pub fn session(&mut self) -> &mut EngineSession {
        self.session
    }
}
