//! Engine sessions.
//!
//! An [`EngineSession`] is one terminal's worth of engine state: the
//! processor registry, command history, state stores, and the handles to the
//! host's output, input, persistence and clipboard. Sessions share nothing,
//! so one process can host any number of independent terminals.

use std::sync::{Arc, Weak};

use tracing::{debug, info, warn};

use crate::commands::builtins;
use crate::commands::context::Services;
use crate::commands::descriptor::{ProcessorDescriptor, StateConfiguration};
use crate::commands::dispatcher::{self, CommandResult, ALIASES_STORE};
use crate::commands::registry::{HostVersions, ProcessorRegistry};
use crate::error::{EngineError, Result};
use crate::input::editor::HistoryCursor;
use crate::input::{self, InputHandle, InputReader, Reader};
use crate::io::{Clipboard, MemoryClipboard, OutputSink, StdoutSink};
use crate::persistence::{
    load_installed, save_installed, CommandHistory, InstalledPlugin, MemoryBackend,
    PersistenceBackend, Plugin, StateStore, StateStoreManager,
};

/// Default command prompt.
pub const DEFAULT_PROMPT: &str = "$ ";

/// Builder for [`EngineSession`].
pub struct SessionBuilder {
    backend: Option<Arc<dyn PersistenceBackend>>,
    output: Option<Box<dyn OutputSink>>,
    clipboard: Option<Arc<dyn Clipboard>>,
    versions: HostVersions,
    services: Services,
    prompt: String,
    echo: bool,
    builtins: bool,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            backend: None,
            output: None,
            clipboard: None,
            versions: HostVersions::default(),
            services: Services::new(),
            prompt: DEFAULT_PROMPT.to_string(),
            echo: true,
            builtins: true,
        }
    }
}

impl SessionBuilder {
    /// Persistence backend (in-memory when not set).
    pub fn backend(mut self, backend: Arc<dyn PersistenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Output sink (stdout when not set).
    pub fn output(mut self, output: impl OutputSink + 'static) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    /// Clipboard (in-memory when not set).
    pub fn clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    pub fn versions(mut self, versions: HostVersions) -> Self {
        self.versions = versions;
        self
    }

    pub fn service<T: std::any::Any + Send + Sync>(mut self, service: T) -> Self {
        self.services.insert(service);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Whether typed characters are echoed back to the output.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Whether the built-in commands are registered.
    pub fn builtins(mut self, builtins: bool) -> Self {
        self.builtins = builtins;
        self
    }

    /// Creates the session and the handle the host feeds input through.
    pub async fn build(self) -> Result<(EngineSession, InputHandle)> {
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));
        let history = CommandHistory::load(Arc::clone(&backend)).await?;

        let mut registry = ProcessorRegistry::new(self.versions);
        if self.builtins {
            builtins::register_all(&mut registry)?;
        }

        let (handle, mut input) = input::channel();
        input.set_echo(self.echo);

        let session = EngineSession {
            registry,
            history,
            stores: StateStoreManager::new(Arc::clone(&backend)),
            backend,
            output: self.output.unwrap_or_else(|| Box::new(StdoutSink)),
            input,
            clipboard: self
                .clipboard
                .unwrap_or_else(|| Arc::new(MemoryClipboard::new())),
            services: self.services,
            initialized: Vec::new(),
            prompt: self.prompt,
        };
        info!(
            processors = session.registry.len(),
            history = session.history.get_last_index(),
            "Engine session ready"
        );
        Ok((session, handle))
    }
}

/// One terminal's engine state.
pub struct EngineSession {
    pub(crate) registry: ProcessorRegistry,
    pub(crate) history: CommandHistory,
    pub(crate) stores: StateStoreManager,
    pub(crate) backend: Arc<dyn PersistenceBackend>,
    pub(crate) output: Box<dyn OutputSink>,
    pub(crate) input: InputReader,
    pub(crate) clipboard: Arc<dyn Clipboard>,
    pub(crate) services: Services,
    /// Descriptors whose `initialize` already ran in this session.
    initialized: Vec<Weak<ProcessorDescriptor>>,
    prompt: String,
}

impl EngineSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Executes one input line and reports how it ended.
    pub async fn execute(&mut self, line: &str) -> CommandResult {
        dispatcher::execute(self, line).await
    }

    /// Prompts for a command line with history navigation and completion.
    ///
    /// Returns None when the user cancels the line or the input closes.
    pub async fn read_command_line(&mut self) -> Option<String> {
        self.input.renew_abort();
        let mut cursor = HistoryCursor::new(self.history.get_history());
        let registry = &self.registry;
        let complete = |prefix: &str| registry.complete(prefix);
        Reader::new(&mut self.input, self.output.as_mut())
            .read_command_line(&self.prompt, &mut cursor, Some(&complete))
            .await
    }

    /// Runs the read/execute loop until the input closes.
    ///
    /// Returns the exit code of the last executed command.
    pub async fn run(&mut self) -> i32 {
        let mut last = 0;
        loop {
            match self.read_command_line().await {
                Some(line) => last = self.execute(&line).await.exit_code(),
                None if self.input.is_closed() => break,
                None => continue,
            }
        }
        debug!(exit_code = last, "Input closed, leaving session loop");
        last
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProcessorRegistry {
        &mut self.registry
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut CommandHistory {
        &mut self.history
    }

    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    pub fn output_mut(&mut self) -> &mut dyn OutputSink {
        self.output.as_mut()
    }

    pub fn backend(&self) -> &Arc<dyn PersistenceBackend> {
        &self.backend
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Returns a state store, loading it on first access.
    pub async fn store(&mut self, config: &StateConfiguration) -> Result<&mut StateStore> {
        self.stores.get_or_load(config).await
    }

    pub(crate) async fn alias_store(&mut self) -> Result<&mut StateStore> {
        let config = StateConfiguration::new(ALIASES_STORE, serde_json::json!({}));
        self.stores.get_or_load(&config).await
    }

    pub fn register_processor(
        &mut self,
        descriptor: ProcessorDescriptor,
    ) -> Result<Arc<ProcessorDescriptor>> {
        self.registry.register_processor(descriptor)
    }

    pub fn unregister_processor(&mut self, command: &str) -> Result<Arc<ProcessorDescriptor>> {
        self.registry.unregister_processor(command)
    }

    /// Registers every processor of `plugin` and records it as installed.
    ///
    /// Registration is all-or-nothing: if any processor is refused, the
    /// registry is restored as it was, including processors the plugin
    /// had already replaced.
    pub async fn install_plugin(&mut self, plugin: Plugin) -> Result<InstalledPlugin> {
        let snapshot = self.registry.clone();
        let mut commands: Vec<String> = Vec::new();
        for descriptor in plugin.processors {
            let command = descriptor.command.clone();
            if let Err(e) = self.registry.register_processor(descriptor) {
                warn!(plugin = %plugin.name, command, "Plugin installation failed: {e}");
                self.registry = snapshot;
                return Err(e);
            }
            commands.push(command);
        }

        let record = InstalledPlugin {
            name: plugin.name,
            version: plugin.version,
            commands,
        };
        let mut installed = load_installed(self.backend.as_ref()).await?;
        installed.retain(|p| p.name != record.name);
        installed.push(record.clone());
        save_installed(self.backend.as_ref(), &installed).await?;

        info!(plugin = %record.name, version = %record.version, "Plugin installed");
        Ok(record)
    }

    /// Unregisters a plugin's processors and drops its record.
    pub async fn uninstall_plugin(&mut self, name: &str) -> Result<InstalledPlugin> {
        let mut installed = load_installed(self.backend.as_ref()).await?;
        let index = installed
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| EngineError::command(format!("Plugin '{name}' is not installed")))?;

        for command in &installed[index].commands {
            match self.registry.unregister_processor(command) {
                Ok(_) | Err(EngineError::UnknownCommand(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let record = installed.remove(index);
        save_installed(self.backend.as_ref(), &installed).await?;
        info!(plugin = %record.name, "Plugin uninstalled");
        Ok(record)
    }

    pub async fn installed_plugins(&self) -> Result<Vec<InstalledPlugin>> {
        load_installed(self.backend.as_ref()).await
    }

    /// Fires the abort signal of whatever is running.
    pub fn abort(&self) {
        self.input.abort_signal().cancel();
    }

    pub(crate) fn is_initialized(&self, descriptor: &Arc<ProcessorDescriptor>) -> bool {
        self.initialized
            .iter()
            .any(|marker| marker.as_ptr() == Arc::as_ptr(descriptor))
    }

    pub(crate) fn mark_initialized(&mut self, descriptor: &Arc<ProcessorDescriptor>) {
        self.initialized.retain(|marker| marker.strong_count() > 0);
        self.initialized.push(Arc::downgrade(descriptor));
    }
}

impl std::fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSession")
            .field("registry", &self.registry)
            .field("history", &self.history)
            .field("stores", &self.stores)
            .field("services", &self.services)
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}
