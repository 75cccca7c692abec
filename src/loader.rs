//! Discovery and loading of command modules.
//!
//! Modules are compiled in. An optional manifest directory selects which of
//! them load: `<name>.toml` enables module `<name>`, names starting with `_`
//! or `.` are private and skipped. Each module loads independently; one
//! failing module never prevents the others from registering.

use crate::error::ModuleLoadError;
use crate::registry::CommandRegistry;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub trait CommandModule: Send + Sync {
    fn name(&self) -> &'static str;
    fn register(&self, registry: &mut CommandRegistry) -> Result<(), ModuleLoadError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModuleManifest {
    pub enabled: bool,
    pub disabled_commands: Vec<String>,
}

impl Default for ModuleManifest {
    fn default() -> Self {
        Self {
            enabled: true,
            disabled_commands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCandidate {
    pub name: String,
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loaded { commands: usize },
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub name: String,
    pub state: LoadState,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub modules: Vec<ModuleRecord>,
}

impl LoadReport {
    pub fn loaded(&self) -> usize {
        self.modules
            .iter()
            .filter(|m| matches!(m.state, LoadState::Loaded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.modules
            .iter()
            .filter(|m| matches!(m.state, LoadState::Failed(_)))
            .count()
    }
}

/// Lists manifest files in `dir`, sorted by module name.
pub fn discover(dir: &Path) -> io::Result<Vec<ModuleCandidate>> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(stem) = file_name.strip_suffix(".toml") else {
            debug!("Skipping non-module entry {:?}", path);
            continue;
        };
        if stem.is_empty() || stem.starts_with('_') || stem.starts_with('.') {
            debug!("Skipping private module entry {:?}", path);
            continue;
        }
        candidates.push(ModuleCandidate {
            name: stem.to_string(),
            manifest: Some(path.clone()),
        });
    }
    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(candidates)
}

pub struct ModuleLoader {
    catalog: Vec<Box<dyn CommandModule>>,
}

impl ModuleLoader {
    pub fn new(catalog: Vec<Box<dyn CommandModule>>) -> Self {
        Self { catalog }
    }

    /// Candidates from the manifest directory, or every compiled-in module without one.
    pub fn candidates(&self, dir: Option<&Path>) -> io::Result<Vec<ModuleCandidate>> {
        match dir {
            Some(dir) => discover(dir),
            None => Ok(self
                .catalog
                .iter()
                .map(|m| ModuleCandidate {
                    name: m.name().to_string(),
                    manifest: None,
                })
                .collect()),
        }
    }

    pub fn load(&self, candidates: &[ModuleCandidate], registry: &mut CommandRegistry) -> LoadReport {
        let mut report = LoadReport::default();
        for candidate in candidates {
            let state = match self.load_one(candidate, registry) {
                Ok(state) => state,
                Err(e) => {
                    error!(module = %candidate.name, "Failed to load module {}: {}", candidate.name, e);
                    LoadState::Failed(e.to_string())
                }
            };
            match &state {
                LoadState::Loaded { commands } => {
                    info!(module = %candidate.name, "Loaded module: {} ({} command(s))", candidate.name, commands)
                }
                LoadState::Skipped => info!(module = %candidate.name, "Module {} is disabled", candidate.name),
                _ => {}
            }
            report.modules.push(ModuleRecord {
                name: candidate.name.clone(),
                state,
            });
        }

        // Compiled-in modules without a manifest stay listed, just unloaded.
        for module in &self.catalog {
            if !candidates.iter().any(|c| c.name == module.name()) {
                debug!(module = module.name(), "Module {} has no manifest", module.name());
                report.modules.push(ModuleRecord {
                    name: module.name().to_string(),
                    state: LoadState::Unloaded,
                });
            }
        }
        report
    }

    fn load_one(
        &self,
        candidate: &ModuleCandidate,
        registry: &mut CommandRegistry,
    ) -> Result<LoadState, ModuleLoadError> {
        let module = self
            .catalog
            .iter()
            .find(|m| m.name() == candidate.name)
            .ok_or_else(|| ModuleLoadError::UnknownModule(candidate.name.clone()))?;

        let manifest = match &candidate.manifest {
            Some(path) => toml::from_str::<ModuleManifest>(&fs::read_to_string(path)?)?,
            None => ModuleManifest::default(),
        };
        if !manifest.enabled {
            return Ok(LoadState::Skipped);
        }

        // Staged so a module that fails halfway leaves nothing behind.
        let mut staged = CommandRegistry::new();
        module.register(&mut staged)?;
        if !manifest.disabled_commands.is_empty() {
            staged.retain(|c| !manifest.disabled_commands.contains(&c.name));
        }
        let commands = registry.absorb(staged)?;
        Ok(LoadState::Loaded { commands })
    }
}
