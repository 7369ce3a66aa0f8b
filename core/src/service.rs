use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::corpus::{CorpusClient, SampleCorpus};
use crate::db::{RecipeCache, RecipeStore};
use crate::error::{ErrorInfo, Result, SyncError};
use crate::http::build_client;
use crate::importer::{DEFAULT_IMPORT_COUNT, SampleImporter};
use crate::mealdb::{MealDbClient, MealSource};
use crate::models::{ImportSummary, Meal, Recipe, WriteOutcome};
use crate::vault::{RecipeVault, VaultClient};

const COMMAND_QUEUE_DEPTH: usize = 32;

/// Everything a presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineState {
    /// Insertion order.
    pub recipes: Vec<Recipe>,
    pub is_loading: bool,
    /// Most recent error; kept until replaced or cleared.
    pub last_error: Option<ErrorInfo>,
    /// Current random meal candidate.
    pub meal: Option<Meal>,
}

/// Collaborators the engine is built from.
pub struct EngineParts {
    pub vault: Arc<dyn RecipeVault>,
    pub store: Arc<dyn RecipeStore>,
    pub corpus: Arc<dyn SampleCorpus>,
    pub meals: Arc<dyn MealSource>,
}

impl EngineParts {
    /// Real HTTP adapters and the on-disk cache described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = build_client(config.request_timeout)?;
        let store = RecipeCache::open(&config.db_path)?;
        Ok(Self {
            vault: Arc::new(VaultClient::new(client.clone(), &config.vault_url)),
            store: Arc::new(store),
            corpus: Arc::new(CorpusClient::new(client.clone(), &config.corpus_url)),
            meals: Arc::new(MealDbClient::new(client, &config.meal_url)),
        })
    }
}

enum Command {
    FetchAll {
        reply: oneshot::Sender<()>,
    },
    PullFromVault {
        reply: oneshot::Sender<Result<usize>>,
    },
    Create {
        recipe: Recipe,
        reply: oneshot::Sender<WriteOutcome>,
    },
    Update {
        recipe: Recipe,
        reply: oneshot::Sender<WriteOutcome>,
    },
    Delete {
        positions: Vec<usize>,
        reply: oneshot::Sender<Vec<Recipe>>,
    },
    Import {
        count: usize,
        reply: oneshot::Sender<Result<ImportSummary>>,
    },
}

/// Handle to the recipe engine.
///
/// Mutations are queued to a single worker task and applied one at a time;
/// the published [`EngineState`] is a watch channel, so every reader sees a
/// whole snapshot. Random meal lookups run on the caller's task and never
/// wait behind the queue.
///
/// Must be created inside a Tokio runtime.
pub struct RecipeSyncEngine {
    commands: mpsc::Sender<Command>,
    state: Arc<watch::Sender<EngineState>>,
    meals: Arc<dyn MealSource>,
    worker: JoinHandle<()>,
}

impl RecipeSyncEngine {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::spawn(EngineParts::from_config(config)?))
    }

    /// Load the cached list and start the worker.
    pub fn spawn(parts: EngineParts) -> Self {
        let recipes = parts.store.load();
        let (state, _) = watch::channel(EngineState {
            recipes: recipes.clone(),
            ..EngineState::default()
        });
        let state = Arc::new(state);
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let worker = Worker {
            recipes,
            vault: parts.vault,
            store: parts.store,
            importer: SampleImporter::new(parts.corpus),
            state: Arc::clone(&state),
        };
        let worker = tokio::spawn(worker.run(rx));

        Self {
            commands,
            state,
            meals: parts.meals,
            worker,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> EngineState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SyncError::Closed)?;
        rx.await.map_err(|_| SyncError::Closed)
    }

    /// Reload the list from the local cache. The vault is not consulted.
    pub async fn fetch_all(&self) -> Result<()> {
        self.request(|reply| Command::FetchAll { reply }).await
    }

    /// Merge the vault listing into the local list by id and return how
    /// many recipes were added.
    pub async fn pull_from_vault(&self) -> Result<usize> {
        self.request(|reply| Command::PullFromVault { reply })
            .await?
    }

    /// Append `recipe`, synced if the vault accepts it, local-only otherwise.
    ///
    /// Only fails if the engine has stopped.
    pub async fn create(&self, recipe: Recipe) -> Result<WriteOutcome> {
        self.request(|reply| Command::Create { recipe, reply }).await
    }

    /// Replace the entry with `recipe.id`. Recipes without an id match
    /// nothing and leave the list unchanged.
    pub async fn update(&self, recipe: Recipe) -> Result<WriteOutcome> {
        self.request(|reply| Command::Update { recipe, reply }).await
    }

    /// Remove the recipes at `positions` (indices into the list as it stands
    /// when the command runs). Returns what was removed.
    pub async fn delete(&self, positions: impl IntoIterator<Item = usize>) -> Result<Vec<Recipe>> {
        let positions = positions.into_iter().collect();
        self.request(|reply| Command::Delete { positions, reply })
            .await
    }

    /// [`import_random_samples`](Self::import_random_samples) with the
    /// default window size.
    pub async fn import_samples(&self) -> Result<ImportSummary> {
        self.import_random_samples(DEFAULT_IMPORT_COUNT).await
    }

    pub async fn import_random_samples(&self, count: usize) -> Result<ImportSummary> {
        self.request(|reply| Command::Import { count, reply })
            .await?
    }

    /// Fetch and publish a random meal. On failure the previous meal stays.
    ///
    /// Runs on the caller's task, not the worker. `is_loading` is a single
    /// flag, so finishing this clears it even while a worker operation such
    /// as an import is still running.
    pub async fn fetch_random_meal(&self) -> Result<Meal> {
        let _loading = LoadingGuard::start(Arc::clone(&self.state));
        match self.meals.fetch_one().await {
            Ok(meal) => {
                debug!(id = %meal.id, name = %meal.name, "Fetched random meal");
                self.state.send_modify(|s| s.meal = Some(meal.clone()));
                Ok(meal)
            }
            Err(e) => {
                warn!(error = %e, "Random meal lookup failed");
                publish_error(&self.state, &e);
                Err(e)
            }
        }
    }

    /// Create a recipe from the current meal. `None` when no meal is held.
    pub async fn promote_meal(&self) -> Result<Option<WriteOutcome>> {
        let meal = self.state.borrow().meal.clone();
        match meal {
            Some(meal) => Ok(Some(self.create(meal.to_recipe()).await?)),
            None => Ok(None),
        }
    }

    pub fn reset_meal(&self) {
        self.state.send_modify(|s| s.meal = None);
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.last_error = None);
    }

    /// Stop accepting commands and wait for queued ones to finish.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(e) = self.worker.await {
            error!(error = %e, "Recipe engine worker panicked");
        }
    }
}

/// Sets `is_loading` for its lifetime; cleared on drop whatever the exit path.
struct LoadingGuard {
    state: Arc<watch::Sender<EngineState>>,
}

impl LoadingGuard {
    fn start(state: Arc<watch::Sender<EngineState>>) -> Self {
        state.send_modify(|s| s.is_loading = true);
        Self { state }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.is_loading = false);
    }
}

fn publish_error(state: &watch::Sender<EngineState>, err: &SyncError) {
    let info = ErrorInfo::from(err);
    state.send_modify(|s| s.last_error = Some(info));
}

/// Owns the recipe list. Only the worker task mutates it.
struct Worker {
    recipes: Vec<Recipe>,
    vault: Arc<dyn RecipeVault>,
    store: Arc<dyn RecipeStore>,
    importer: SampleImporter,
    state: Arc<watch::Sender<EngineState>>,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!(count = self.recipes.len(), "Recipe engine started");

        while let Some(command) = commands.recv().await {
            // A caller that stopped waiting does not cancel the work.
            match command {
                Command::FetchAll { reply } => {
                    self.fetch_all();
                    let _ = reply.send(());
                }
                Command::PullFromVault { reply } => {
                    let _ = reply.send(self.pull_from_vault().await);
                }
                Command::Create { recipe, reply } => {
                    let _ = reply.send(self.create(recipe).await);
                }
                Command::Update { recipe, reply } => {
                    let _ = reply.send(self.update(recipe).await);
                }
                Command::Delete { positions, reply } => {
                    let _ = reply.send(self.delete(positions).await);
                }
                Command::Import { count, reply } => {
                    let _ = reply.send(self.import(count).await);
                }
            }
        }

        info!("Recipe engine stopped");
    }

    /// Save the list and publish it. A failed save is logged and published
    /// as `last_error`; the in-memory list stays authoritative.
    fn persist(&self) {
        let saved = self.store.save(&self.recipes);
        if let Err(e) = &saved {
            error!(error = %e, count = self.recipes.len(), "Failed to persist recipes");
        }
        let recipes = self.recipes.clone();
        self.state.send_modify(|s| {
            s.recipes = recipes;
            if let Err(e) = &saved {
                s.last_error = Some(ErrorInfo::from(e));
            }
        });
    }

    fn fetch_all(&mut self) {
        let _loading = LoadingGuard::start(Arc::clone(&self.state));
        self.recipes = self.store.load();
        let recipes = self.recipes.clone();
        self.state.send_modify(|s| s.recipes = recipes);
    }

    async fn pull_from_vault(&mut self) -> Result<usize> {
        let _loading = LoadingGuard::start(Arc::clone(&self.state));
        let remote = match self.vault.list_all().await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "Vault listing failed, keeping local recipes");
                publish_error(&self.state, &e);
                return Err(e);
            }
        };

        let added = merge_remote(&mut self.recipes, remote);
        info!(added, count = self.recipes.len(), "Merged vault recipes");
        self.persist();
        Ok(added)
    }

    async fn create(&mut self, candidate: Recipe) -> WriteOutcome {
        let outcome = match self.vault.create(&candidate).await {
            Ok(saved) => WriteOutcome::Synced(saved),
            Err(e) => {
                warn!(name = %candidate.name, error = %e, "Vault create failed, keeping recipe local-only");
                WriteOutcome::LocalOnly(candidate)
            }
        };

        let recipe = outcome.recipe().clone();
        let existing = recipe
            .id
            .as_deref()
            .and_then(|id| self.recipes.iter().position(|r| r.id.as_deref() == Some(id)));
        match existing {
            Some(idx) => {
                debug!(id = ?recipe.id, "Vault returned a known id, replacing entry");
                self.recipes[idx] = recipe;
            }
            None => self.recipes.push(recipe),
        }

        self.persist();
        outcome
    }

    async fn update(&mut self, candidate: Recipe) -> WriteOutcome {
        let Some(id) = candidate.id.clone() else {
            debug!(name = %candidate.name, "Update of a local-only recipe matches no entry");
            self.persist();
            return WriteOutcome::LocalOnly(candidate);
        };

        let outcome = match self.vault.update(&candidate).await {
            Ok(Some(mut updated)) => {
                // The slot keeps the id it was requested under.
                if updated.id.as_deref() != Some(id.as_str()) {
                    debug!(id = %id, returned = ?updated.id, "Vault answered update with another id");
                    updated.id = Some(id.clone());
                }
                WriteOutcome::Synced(updated)
            }
            Ok(None) => WriteOutcome::LocalOnly(candidate),
            Err(e) => {
                warn!(id = %id, error = %e, "Vault update failed, applying locally");
                WriteOutcome::LocalOnly(candidate)
            }
        };

        match self
            .recipes
            .iter_mut()
            .find(|r| r.id.as_deref() == Some(id.as_str()))
        {
            Some(slot) => *slot = outcome.recipe().clone(),
            None => debug!(id = %id, "Updated recipe is not in the local list"),
        }

        self.persist();
        outcome
    }

    /// Positions are resolved to entries before anything is removed, so
    /// earlier removals cannot shift later targets.
    async fn delete(&mut self, positions: Vec<usize>) -> Vec<Recipe> {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for pos in positions {
            if !seen.insert(pos) {
                continue;
            }
            match self.recipes.get(pos) {
                Some(recipe) => targets.push(recipe.clone()),
                None => warn!(position = pos, len = self.recipes.len(), "Ignoring out-of-range delete position"),
            }
        }

        let mut removed = Vec::with_capacity(targets.len());
        for target in targets {
            if let Some(id) = target.id.as_deref() {
                if let Err(e) = self.vault.delete(id).await {
                    warn!(id, error = %e, "Vault delete failed, removing locally anyway");
                }
            }
            if let Some(idx) = self.recipes.iter().position(|r| r.same_entry(&target)) {
                removed.push(self.recipes.remove(idx));
                self.persist();
            }
        }
        removed
    }

    async fn import(&mut self, count: usize) -> Result<ImportSummary> {
        let _loading = LoadingGuard::start(Arc::clone(&self.state));

        let plan = match self.importer.plan(&self.recipes, count).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(count, error = %e, "Sample import aborted");
                publish_error(&self.state, &e);
                return Err(e);
            }
        };

        let mut outcomes = Vec::with_capacity(plan.recipes.len());
        for recipe in plan.recipes {
            outcomes.push(self.create(recipe).await);
        }

        let summary = ImportSummary {
            total: plan.total,
            skip: plan.skip,
            fetched: plan.fetched,
            duplicates: plan.duplicates,
            outcomes,
        };
        info!(
            total = summary.total,
            skip = summary.skip,
            fetched = summary.fetched,
            duplicates = summary.duplicates,
            created = summary.created(),
            "Sample import complete"
        );
        Ok(summary)
    }
}

/// Replace entries whose id the vault also has, append ids the list lacks.
/// Local-only entries are kept. Returns the number appended.
fn merge_remote(local: &mut Vec<Recipe>, remote: Vec<Recipe>) -> usize {
    let mut added = 0;
    for recipe in remote {
        let Some(id) = recipe.id.as_deref() else {
            continue;
        };
        match local.iter().position(|r| r.id.as_deref() == Some(id)) {
            Some(idx) => local[idx] = recipe,
            None => {
                local.push(recipe);
                added += 1;
            }
        }
    }
    added
}
