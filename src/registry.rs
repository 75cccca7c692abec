use crate::command::CommandDescriptor;
use crate::error::RegistryError;
use std::collections::HashMap;
use std::sync::Arc;

/// De-duplicated set of commands, kept in registration order.
///
/// Written only while modules load; shared read-only behind an `Arc` afterwards.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<Arc<CommandDescriptor>>,
    index: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: CommandDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateCommand(descriptor.name));
        }
        self.index
            .insert(descriptor.name.clone(), self.commands.len());
        self.commands.push(Arc::new(descriptor));
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&Arc<CommandDescriptor>, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.commands[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn list(&self) -> &[Arc<CommandDescriptor>] {
        &self.commands
    }

    pub fn names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drops every command the predicate rejects.
    pub fn retain(&mut self, mut keep: impl FnMut(&CommandDescriptor) -> bool) {
        self.commands.retain(|c| keep(c));
        self.reindex();
    }

    /// Moves all of `other` into this registry, or nothing at all on a name collision.
    pub fn absorb(&mut self, other: CommandRegistry) -> Result<usize, RegistryError> {
        if let Some(dup) = other
            .commands
            .iter()
            .find(|c| self.index.contains_key(&c.name))
        {
            return Err(RegistryError::DuplicateCommand(dup.name.clone()));
        }
        let added = other.commands.len();
        for command in other.commands {
            self.index.insert(command.name.clone(), self.commands.len());
            self.commands.push(command);
        }
        Ok(added)
    }

    fn reindex(&mut self) {
        self.index = self
            .commands
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
    }
}
