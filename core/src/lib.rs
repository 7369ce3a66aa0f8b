//! Recipe collection engine: a local recipe list kept in step with a remote
//! vault, random sample imports from a public corpus, and a random meal
//! lookup.
//!
//! [`RecipeSyncEngine`] is the entry point. Everything it talks to sits
//! behind a trait ([`RecipeVault`], [`RecipeStore`], [`SampleCorpus`],
//! [`MealSource`]) so hosts and tests can swap implementations.

pub mod config;
pub mod corpus;
pub mod db;
pub mod error;
pub mod http;
pub mod importer;
pub mod mealdb;
pub mod models;
pub mod service;
pub mod vault;

pub use config::Config;
pub use corpus::{CorpusClient, SampleCorpus};
pub use db::{RecipeCache, RecipeStore};
pub use error::{ErrorInfo, ErrorKind, SyncError};
pub use importer::{DEFAULT_IMPORT_COUNT, SampleImporter};
pub use mealdb::{MealDbClient, MealSource};
pub use models::{ImportSummary, Meal, Recipe, Sample, WriteOutcome};
pub use service::{EngineParts, EngineState, RecipeSyncEngine};
pub use vault::{RecipeVault, VaultClient};
