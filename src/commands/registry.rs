//! Processor registry.
//!
//! Owns the tree of registered processors as an arena of nodes. Each tree
//! level indexes its children by canonical command key, with aliases kept as
//! a secondary index into the same arena slots. Replacing or removing a node
//! is therefore a map operation, and sealed nodes are checked before any
//! mutation happens.

use std::collections::HashMap;
use std::sync::Arc;

use semver::{Version, VersionReq};
use tracing::{debug, info, warn};

use super::descriptor::ProcessorDescriptor;
use crate::error::{EngineError, Result};

/// Index of a node in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessorId(usize);

/// Versions of the running host, checked against processor requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostVersions {
    pub core: Version,
    pub cli: Version,
}

impl Default for HostVersions {
    fn default() -> Self {
        let core = Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or(Version::new(0, 0, 0));
        Self {
            cli: core.clone(),
            core,
        }
    }
}

/// A successful lookup: the deepest matching processor and how it was reached.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub id: ProcessorId,
    pub descriptor: Arc<ProcessorDescriptor>,
    /// Canonical command keys from the root to the matched node.
    pub path: Vec<String>,
    /// How many of the trailing tokens were consumed as subcommands.
    pub consumed: usize,
}

/// Children of one tree node (or the roots).
#[derive(Debug, Clone, Default)]
struct Level {
    commands: HashMap<String, ProcessorId>,
    aliases: HashMap<String, ProcessorId>,
    /// Registration order, for help listings.
    order: Vec<ProcessorId>,
}

impl Level {
    fn lookup(&self, key: &str) -> Option<ProcessorId> {
        let key = key.to_lowercase();
        self.commands
            .get(&key)
            .or_else(|| self.aliases.get(&key))
            .copied()
    }

    fn insert(&mut self, id: ProcessorId, descriptor: &ProcessorDescriptor) {
        self.commands.insert(descriptor.command.to_lowercase(), id);
        for alias in &descriptor.aliases {
            self.aliases.insert(alias.to_lowercase(), id);
        }
        self.order.push(id);
    }

    fn remove(&mut self, id: ProcessorId) {
        self.commands.retain(|_, v| *v != id);
        self.aliases.retain(|_, v| *v != id);
        self.order.retain(|v| *v != id);
    }

    /// Existing siblings that share the command or any alias with `descriptor`.
    fn conflicts(&self, descriptor: &ProcessorDescriptor) -> Vec<ProcessorId> {
        let mut found = Vec::new();
        for key in descriptor.keys() {
            if let Some(id) = self.lookup(key) {
                if !found.contains(&id) {
                    found.push(id);
                }
            }
        }
        found
    }
}

#[derive(Debug, Clone)]
struct Node {
    descriptor: Arc<ProcessorDescriptor>,
    children: Level,
}

/// Runtime-mutable tree of command processors.
///
/// Cloning copies the arena but shares the descriptors.
#[derive(Debug, Clone, Default)]
pub struct ProcessorRegistry {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    roots: Level,
    versions: HostVersions,
}

impl ProcessorRegistry {
    /// Creates an empty registry for the given host versions.
    pub fn new(versions: HostVersions) -> Self {
        Self {
            versions,
            ..Self::default()
        }
    }

    /// Returns the host versions used for requirement checks.
    pub fn versions(&self) -> &HostVersions {
        &self.versions
    }

    /// Registers a root processor (with its nested processors).
    ///
    /// An existing non-sealed sibling with the same command or alias is
    /// replaced. If any colliding sibling is sealed, nothing changes and
    /// `SealedProcessor` is returned.
    pub fn register_processor(
        &mut self,
        descriptor: ProcessorDescriptor,
    ) -> Result<Arc<ProcessorDescriptor>> {
        self.insert_into(None, descriptor)
    }

    /// Registers a processor beneath an already registered one.
    pub fn register_child(
        &mut self,
        parent_path: &[&str],
        descriptor: ProcessorDescriptor,
    ) -> Result<Arc<ProcessorDescriptor>> {
        let (_, parent) = self
            .locate(parent_path)
            .ok_or_else(|| EngineError::UnknownCommand(parent_path.join(" ")))?;
        self.insert_into(Some(parent), descriptor)
    }

    /// Removes a root processor and its subtree.
    pub fn unregister_processor(&mut self, command: &str) -> Result<Arc<ProcessorDescriptor>> {
        self.unregister_path(&[command])
    }

    /// Removes the processor at `path` and its subtree, unless it is sealed.
    pub fn unregister_path(&mut self, path: &[&str]) -> Result<Arc<ProcessorDescriptor>> {
        let (parent, id) = self
            .locate(path)
            .ok_or_else(|| EngineError::UnknownCommand(path.join(" ")))?;
        let descriptor = self.descriptor(id)?;
        if descriptor.metadata.sealed {
            warn!(command = %descriptor.command, "Refusing to unregister sealed processor");
            return Err(EngineError::SealedProcessor(descriptor.command.clone()));
        }

        self.level_mut(parent)?.remove(id);
        self.free_subtree(id);
        info!(command = %path.join(" "), "Unregistered processor");
        Ok(descriptor)
    }

    /// Resolves `command` and as many of `rest` as match nested processors.
    ///
    /// Unmatched tokens are left for the caller to treat as arguments.
    pub fn find_processor<S: AsRef<str>>(&self, command: &str, rest: &[S]) -> Option<Resolved> {
        let mut id = self.roots.lookup(command)?;
        let mut path = vec![self.node(id)?.descriptor.command.clone()];
        let mut consumed = 0;

        while let Some(next) = rest.get(consumed) {
            let node = self.node(id)?;
            match node.children.lookup(next.as_ref()) {
                Some(child) => {
                    id = child;
                    path.push(self.node(child)?.descriptor.command.clone());
                    consumed += 1;
                }
                None => break,
            }
        }

        Some(Resolved {
            id,
            descriptor: Arc::clone(&self.node(id)?.descriptor),
            path,
            consumed,
        })
    }

    /// Same resolution as [`find_processor`](Self::find_processor) over a
    /// plain descriptor collection instead of the registry arena.
    pub fn find_processor_in_collection<S: AsRef<str>>(
        command: &str,
        rest: &[S],
        collection: &[Arc<ProcessorDescriptor>],
    ) -> Option<(Arc<ProcessorDescriptor>, usize)> {
        let key = command.to_lowercase();
        let found = collection
            .iter()
            .find(|d| d.keys().any(|k| k.to_lowercase() == key))?;

        if let Some(next) = rest.first() {
            if let Some((deeper, consumed)) =
                Self::find_processor_in_collection(next.as_ref(), &rest[1..], &found.processors)
            {
                return Some((deeper, consumed + 1));
            }
        }
        Some((Arc::clone(found), 0))
    }

    /// Returns the first root processor that accepts unlisted commands.
    pub fn unlisted_handler(&self) -> Option<Resolved> {
        self.roots.order.iter().find_map(|&id| {
            let node = self.node(id)?;
            node.descriptor.allow_unlisted_commands.then(|| Resolved {
                id,
                descriptor: Arc::clone(&node.descriptor),
                path: vec![node.descriptor.command.clone()],
                consumed: 0,
            })
        })
    }

    /// Returns the root processors in registration order.
    pub fn roots(&self) -> Vec<Arc<ProcessorDescriptor>> {
        self.collect(&self.roots)
    }

    /// Returns the children of the processor at `path`.
    pub fn children(&self, path: &[&str]) -> Vec<Arc<ProcessorDescriptor>> {
        self.locate(path)
            .and_then(|(_, id)| self.node(id))
            .map(|node| self.collect(&node.children))
            .unwrap_or_default()
    }

    /// Returns root command names starting with `prefix`, sorted.
    pub fn complete(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        let mut names: Vec<String> = self
            .roots()
            .iter()
            .map(|d| d.command.clone())
            .filter(|c| c.to_lowercase().starts_with(&prefix))
            .collect();
        names.sort();
        names
    }

    /// Number of root processors.
    pub fn len(&self) -> usize {
        self.roots.order.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.roots.order.is_empty()
    }

    fn insert_into(
        &mut self,
        parent: Option<ProcessorId>,
        descriptor: ProcessorDescriptor,
    ) -> Result<Arc<ProcessorDescriptor>> {
        self.check_versions(&descriptor)?;

        let conflicts = self.level(parent)?.conflicts(&descriptor);
        for &id in &conflicts {
            let existing = self.descriptor(id)?;
            if existing.metadata.sealed {
                warn!(
                    command = %descriptor.command,
                    sealed = %existing.command,
                    "Refusing to replace sealed processor"
                );
                return Err(EngineError::SealedProcessor(existing.command.clone()));
            }
        }

        for id in conflicts {
            debug!(id = id.0, "Replacing processor");
            self.level_mut(parent)?.remove(id);
            self.free_subtree(id);
        }

        let descriptor = Arc::new(descriptor);
        let id = self.alloc(Arc::clone(&descriptor));
        self.level_mut(parent)?.insert(id, &descriptor);
        info!(command = %descriptor.command, "Registered processor");
        Ok(descriptor)
    }

    fn alloc(&mut self, descriptor: Arc<ProcessorDescriptor>) -> ProcessorId {
        let mut children = Level::default();
        for child in &descriptor.processors {
            for old in children.conflicts(child) {
                children.remove(old);
                self.free_subtree(old);
            }
            let child_id = self.alloc(Arc::clone(child));
            children.insert(child_id, child);
        }

        let node = Some(Node {
            descriptor,
            children,
        });
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                ProcessorId(slot)
            }
            None => {
                self.nodes.push(node);
                ProcessorId(self.nodes.len() - 1)
            }
        }
    }

    fn free_subtree(&mut self, id: ProcessorId) {
        if let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) {
            for child in node.children.order {
                self.free_subtree(child);
            }
            self.free.push(id.0);
        }
    }

    /// Finds the node at an exact path, returning it with its parent.
    fn locate(&self, path: &[&str]) -> Option<(Option<ProcessorId>, ProcessorId)> {
        let (first, rest) = path.split_first()?;
        let mut parent = None;
        let mut id = self.roots.lookup(first)?;
        for key in rest {
            let child = self.node(id)?.children.lookup(key)?;
            parent = Some(id);
            id = child;
        }
        Some((parent, id))
    }

    fn node(&self, id: ProcessorId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn descriptor(&self, id: ProcessorId) -> Result<Arc<ProcessorDescriptor>> {
        self.node(id)
            .map(|n| Arc::clone(&n.descriptor))
            .ok_or_else(|| EngineError::internal(format!("dangling processor id {}", id.0)))
    }

    fn level(&self, parent: Option<ProcessorId>) -> Result<&Level> {
        match parent {
            None => Ok(&self.roots),
            Some(id) => self
                .node(id)
                .map(|n| &n.children)
                .ok_or_else(|| EngineError::internal(format!("dangling processor id {}", id.0))),
        }
    }

    fn level_mut(&mut self, parent: Option<ProcessorId>) -> Result<&mut Level> {
        match parent {
            None => Ok(&mut self.roots),
            Some(id) => self
                .nodes
                .get_mut(id.0)
                .and_then(Option::as_mut)
                .map(|n| &mut n.children)
                .ok_or_else(|| EngineError::internal(format!("dangling processor id {}", id.0))),
        }
    }

    fn collect(&self, level: &Level) -> Vec<Arc<ProcessorDescriptor>> {
        level
            .order
            .iter()
            .filter_map(|&id| self.node(id).map(|n| Arc::clone(&n.descriptor)))
            .collect()
    }

    fn check_versions(&self, descriptor: &ProcessorDescriptor) -> Result<()> {
        let metadata = &descriptor.metadata;
        if let Some(required) = &metadata.required_core_version {
            check_requirement(&descriptor.command, "core", required, &self.versions.core)?;
        }
        if let Some(required) = &metadata.required_cli_version {
            check_requirement(&descriptor.command, "cli", required, &self.versions.cli)?;
        }
        for child in &descriptor.processors {
            self.check_versions(child)?;
        }
        Ok(())
    }
}

/// Parses a version requirement; a bare version means "at least this".
pub fn parse_requirement(requirement: &str) -> Result<VersionReq> {
    let requirement = requirement.trim();
    if let Ok(version) = Version::parse(requirement) {
        return VersionReq::parse(&format!(">={}", version))
            .map_err(|e| EngineError::config(format!("Invalid version requirement: {e}")));
    }
    VersionReq::parse(requirement).map_err(|e| {
        EngineError::config(format!("Invalid version requirement '{requirement}': {e}"))
    })
}

fn check_requirement(
    command: &str,
    component: &'static str,
    required: &str,
    actual: &Version,
) -> Result<()> {
    let requirement = parse_requirement(required)?;
    if requirement.matches(actual) {
        return Ok(());
    }
    warn!(command, component, required, %actual, "Processor version requirement not met");
    Err(EngineError::VersionIncompatible {
        command: command.to_string(),
        component,
        required: required.to_string(),
        actual: actual.to_string(),
    })
}
