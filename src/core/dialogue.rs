//! The host-facing dialogue runtime: pack loading, queries, and line
//! resolution wired to the host's effect sinks and diagnostics.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::compiler::{self, CompileError};
use crate::core::consequence::{EffectSinks, EffectTarget, StorageChange, Trigger};
use crate::core::machine::{LoadFailure, LoadStatus, Machine};
use crate::core::pack::Pack;
use crate::schema::fact_store::FactStore;

#[derive(Debug, Error)]
pub enum DialogueError {
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to load pack {0}")]
    LoadFailed(LoadFailure),
    #[error("failed to unload pack with key {0}")]
    UnloadMiss(String),
    #[error("response not found: {0}")]
    ResponseNotFound(String),
    #[error("response {0} has no lines")]
    EmptyResponse(String),
}

/// Receives a diagnostic message.
pub type Logger = Box<dyn Fn(&str)>;

/// Coordinates pack loading, rule queries and line lookup for a host.
///
/// Built via [`Dialogue::builder`].
pub struct Dialogue {
    machine: Machine,
    target: Box<dyn EffectTarget>,
    rng: StdRng,
    log_debug: Option<Logger>,
    log_error: Option<Logger>,
}

/// Builder for a [`Dialogue`].
pub struct DialogueBuilder {
    seed: u64,
    packs_dir: Option<PathBuf>,
    packs: Vec<Pack>,
    target: Option<Box<dyn EffectTarget>>,
    log_debug: Option<Logger>,
    log_error: Option<Logger>,
}

/// Writes storage changes into the queried store, then forwards every
/// effect to the host's target.
struct ApplyingTarget<'a> {
    store: &'a mut dyn FactStore,
    inner: &'a mut dyn EffectTarget,
}

impl EffectTarget for ApplyingTarget<'_> {
    fn storage_change(&mut self, change: &StorageChange) {
        change.apply_to(&mut *self.store);
        self.inner.storage_change(change);
    }

    fn text_response(&mut self, response_id: &str) {
        self.inner.text_response(response_id);
    }

    fn trigger(&mut self, trigger: &Trigger) {
        self.inner.trigger(trigger);
    }
}

impl Dialogue {
    pub fn builder() -> DialogueBuilder {
        DialogueBuilder {
            seed: 0,
            packs_dir: None,
            packs: Vec::new(),
            target: None,
            log_debug: None,
            log_error: None,
        }
    }

    /// Load a pack, merging it into a loaded pack of the same name.
    /// Returns the name it is registered under.
    pub fn add_pack(&mut self, pack: Pack) -> Result<String, DialogueError> {
        let name = pack.name().to_string();
        match self.machine.load_pack(pack) {
            LoadStatus::New => {
                self.log_debug(&format!("Pack {} was successfully loaded!", name));
                Ok(name)
            }
            LoadStatus::Additive => {
                self.log_debug(&format!(
                    "Pack {} was successfully loaded additively.",
                    name
                ));
                Ok(name)
            }
            LoadStatus::Failure(reason) => {
                self.log_error(&format!("Failed to load pack {}", reason));
                Err(DialogueError::LoadFailed(reason))
            }
        }
    }

    /// Compile a RON pack file and load it.
    pub fn load_program(&mut self, path: &Path) -> Result<String, DialogueError> {
        match compiler::compile_file(path) {
            Ok(pack) => self.add_pack(pack),
            Err(e) => {
                self.log_error(&format!(
                    "File {} was not able to be compiled: {}",
                    path.display(),
                    e
                ));
                Err(e.into())
            }
        }
    }

    pub fn unload_pack(&mut self, name: &str) -> Result<(), DialogueError> {
        if self.machine.try_unload_pack(name) {
            self.log_debug(&format!("Successfully removed the pack {}", name));
            Ok(())
        } else {
            self.log_error(&format!(
                "Was not able to remove the pack {}, are you sure it was loaded?",
                name
            ));
            Err(DialogueError::UnloadMiss(name.to_string()))
        }
    }

    pub fn unload_all(&mut self) {
        self.machine.unload_all_packs();
        self.log_debug("Unloaded all packs");
    }

    /// Run the best rule for `query` against the effect target. Returns
    /// false when no rule matched, which is an ordinary idle outcome.
    pub fn query(&mut self, query: &dyn FactStore) -> bool {
        self.query_all(&[query])
    }

    /// As [`Dialogue::query`], with several fact stores merged together.
    pub fn query_all(&mut self, queries: &[&dyn FactStore]) -> bool {
        match self.machine.try_query_rule_all(queries) {
            Some(rule) => {
                rule.execute(self.target.as_mut());
                true
            }
            None => {
                self.log_debug("No rule found");
                false
            }
        }
    }

    /// As [`Dialogue::query`], and also write the rule's storage changes
    /// back into `store` before the host sees them.
    pub fn query_and_apply(&mut self, store: &mut dyn FactStore) -> bool {
        match self.machine.try_query_rule(&*store) {
            Some(rule) => {
                let mut target = ApplyingTarget {
                    store,
                    inner: self.target.as_mut(),
                };
                rule.execute(&mut target);
                true
            }
            None => {
                self.log_debug("No rule found");
                false
            }
        }
    }

    /// A random line of the response named `response_id`.
    pub fn text(&mut self, response_id: &str) -> Result<String, DialogueError> {
        let Some(response) = self.machine.try_query_response(response_id) else {
            self.log_error(&format!("Response was not found {}", response_id));
            return Err(DialogueError::ResponseNotFound(response_id.to_string()));
        };
        match response.random_line(&mut self.rng) {
            Some(line) => Ok(line.to_string()),
            None => {
                let err = DialogueError::EmptyResponse(response_id.to_string());
                self.log_error(&err.to_string());
                Err(err)
            }
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    fn log_debug(&self, message: &str) {
        debug!("{}", message);
        if let Some(log) = &self.log_debug {
            log(message);
        }
    }

    fn log_error(&self, message: &str) {
        warn!("{}", message);
        if let Some(log) = &self.log_error {
            log(message);
        }
    }
}

impl fmt::Debug for Dialogue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialogue")
            .field("machine", &self.machine)
            .field("log_debug", &self.log_debug.is_some())
            .field("log_error", &self.log_error.is_some())
            .finish_non_exhaustive()
    }
}

impl DialogueBuilder {
    /// Seed for response line selection.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Compile and load every `.ron` file in `path`, in file name order.
    pub fn packs_dir(mut self, path: &str) -> Self {
        self.packs_dir = Some(PathBuf::from(path));
        self
    }

    /// Provide a pack directly (for testing without files).
    pub fn with_pack(mut self, pack: Pack) -> Self {
        self.packs.push(pack);
        self
    }

    pub fn with_sinks(self, sinks: EffectSinks) -> Self {
        self.with_target(sinks)
    }

    /// Route rule effects to `target`. Defaults to an [`EffectSinks`] with
    /// no handlers.
    pub fn with_target(mut self, target: impl EffectTarget + 'static) -> Self {
        self.target = Some(Box::new(target));
        self
    }

    pub fn on_debug(mut self, log: impl Fn(&str) + 'static) -> Self {
        self.log_debug = Some(Box::new(log));
        self
    }

    pub fn on_error(mut self, log: impl Fn(&str) + 'static) -> Self {
        self.log_error = Some(Box::new(log));
        self
    }

    /// Packs from `packs_dir` load first, then packs given directly.
    pub fn build(self) -> Result<Dialogue, DialogueError> {
        let mut dialogue = Dialogue {
            machine: Machine::new(),
            target: self
                .target
                .unwrap_or_else(|| Box::new(EffectSinks::new()) as Box<dyn EffectTarget>),
            rng: StdRng::seed_from_u64(self.seed),
            log_debug: self.log_debug,
            log_error: self.log_error,
        };

        if let Some(ref dir) = self.packs_dir {
            if dir.exists() {
                load_ron_files_from_dir(dir, |path| {
                    dialogue.load_program(path)?;
                    Ok(())
                })?;
            }
        }

        for pack in self.packs {
            dialogue.add_pack(pack)?;
        }

        Ok(dialogue)
    }
}

/// Call `loader` for every .ron file in `dir`, sorted by path.
fn load_ron_files_from_dir<F>(dir: &Path, mut loader: F) -> Result<(), DialogueError>
where
    F: FnMut(&Path) -> Result<(), DialogueError>,
{
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            paths.push(path);
        }
    }
    paths.sort();
    for path in &paths {
        loader(path)?;
    }
    Ok(())
}
