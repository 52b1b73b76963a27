//! Resource-scoped plugin registrations.
//!
//! Serializers, commands and cursor mappings are registered through a
//! [`PluginRegistry`] that is handed to whoever activates. Every registration
//! returns a [`PluginHandle`] and is tagged with an [`Owner`]; releasing the
//! handle, or every handle of an owner, undoes the registration. Plugins and
//! tools own registrations in separate scopes, so deactivating a tool drops
//! its own commands and nothing a same-named plugin registered.

mod builtin;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub use builtin::CorePlugin;

use crate::error::{EngineError, Result};
use crate::serializer::{AnnotationSerializer, SerializerHandle, SerializerRegistry};
use crate::tool::{Cursor, Tool};

/// Opaque handle of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginHandle(u64);

/// Whoever holds a registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Held until the plugin is uninstalled
    Plugin(String),
    /// Held while the tool is active
    Tool(String),
}

impl Owner {
    pub fn plugin(name: &str) -> Self {
        Owner::Plugin(name.to_string())
    }

    pub fn tool(name: &str) -> Self {
        Owner::Tool(name.to_string())
    }

    pub fn name(&self) -> &str {
        match self {
            Owner::Plugin(name) | Owner::Tool(name) => name,
        }
    }

    /// Name of the tool, if a tool owns this.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Owner::Tool(name) => Some(name),
            Owner::Plugin(_) => None,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Plugin(name) => write!(f, "plugin '{}'", name),
            Owner::Tool(name) => write!(f, "tool '{}'", name),
        }
    }
}

#[derive(Debug)]
enum Registration {
    Serializer(SerializerHandle),
    Command(String),
    Cursor(String),
}

#[derive(Debug)]
struct Entry {
    owner: Owner,
    registration: Registration,
}

/// Lookup service for everything plugins contribute.
#[derive(Default)]
pub struct PluginRegistry {
    serializers: SerializerRegistry,
    /// Command name → handle of its registration
    commands: HashMap<String, PluginHandle>,
    /// Cursor name → (handle, host cursor)
    cursors: HashMap<String, (PluginHandle, String)>,
    entries: BTreeMap<PluginHandle, Entry>,
    next_handle: u64,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    fn insert(&mut self, owner: &Owner, registration: Registration) -> PluginHandle {
        self.next_handle += 1;
        let handle = PluginHandle(self.next_handle);
        self.entries.insert(
            handle,
            Entry {
                owner: owner.clone(),
                registration,
            },
        );
        handle
    }

    pub fn register_serializer(
        &mut self,
        owner: &Owner,
        serializer: Box<dyn AnnotationSerializer>,
    ) -> Result<PluginHandle> {
        let handle = self.serializers.register(serializer)?;
        Ok(self.insert(owner, Registration::Serializer(handle)))
    }

    /// Route command `name` to `owner`.
    pub fn register_command(&mut self, owner: &Owner, name: &str) -> Result<PluginHandle> {
        if self.commands.contains_key(name) {
            return Err(EngineError::DuplicateCommand(name.to_string()));
        }
        let handle = self.insert(owner, Registration::Command(name.to_string()));
        self.commands.insert(name.to_string(), handle);
        log::debug!("{} registered command '{}'", owner, name);
        Ok(handle)
    }

    /// Map cursor `name` to a host cursor. A later mapping of the same name wins.
    pub fn register_cursor(&mut self, owner: &Owner, name: &str, host_cursor: &str) -> PluginHandle {
        let handle = self.insert(owner, Registration::Cursor(name.to_string()));
        self.cursors
            .insert(name.to_string(), (handle, host_cursor.to_string()));
        handle
    }

    /// Undo one registration. Returns `false` if it was already released.
    pub fn release(&mut self, handle: PluginHandle) -> bool {
        let Some(entry) = self.entries.remove(&handle) else {
            return false;
        };
        match entry.registration {
            Registration::Serializer(serializer) => {
                self.serializers.unregister(serializer);
            }
            Registration::Command(name) => {
                self.commands.remove(&name);
            }
            Registration::Cursor(name) => {
                if self.cursors.get(&name).is_some_and(|(h, _)| *h == handle) {
                    self.cursors.remove(&name);
                }
            }
        }
        true
    }

    /// Undo every registration of `owner`. Returns how many were released.
    pub fn release_owner(&mut self, owner: &Owner) -> usize {
        let handles: Vec<PluginHandle> = self
            .entries
            .iter()
            .filter(|(_, e)| e.owner == *owner)
            .map(|(h, _)| *h)
            .collect();
        for handle in &handles {
            self.release(*handle);
        }
        if !handles.is_empty() {
            log::debug!("Released {} registrations of {}", handles.len(), owner);
        }
        handles.len()
    }

    /// Number of live registrations of `owner`.
    pub fn registration_count(&self, owner: &Owner) -> usize {
        self.entries.values().filter(|e| e.owner == *owner).count()
    }

    /// Owner that registered command `name`.
    pub fn command_owner(&self, name: &str) -> Option<&Owner> {
        let handle = self.commands.get(name)?;
        self.entries.get(handle).map(|e| &e.owner)
    }

    /// Host cursor for `cursor`: its registered mapping, else its own name.
    pub fn resolve_cursor(&self, cursor: &Cursor) -> String {
        self.cursors
            .get(cursor.as_str())
            .map(|(_, host)| host.clone())
            .unwrap_or_else(|| cursor.as_str().to_string())
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("serializers", &self.serializers.type_names())
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("registrations", &self.entries.len())
            .finish()
    }
}

/// A bundle of serializers, commands and tools.
///
/// `activate` registers through the registry as [`Owner::Plugin`] under
/// [`Plugin::name`]; the editor releases everything it owns on uninstall.
pub trait Plugin {
    fn name(&self) -> &str;

    fn activate(&mut self, registry: &mut PluginRegistry) -> Result<()>;

    /// Fresh tool instances for a new view.
    fn create_tools(&self) -> Vec<Box<dyn Tool>> {
        Vec::new()
    }
}
