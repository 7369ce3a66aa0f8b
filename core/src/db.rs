use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use rusqlite::{Connection, params};
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::models::Recipe;

/// Key under which the full recipe list is stored.
pub const RECIPES_KEY: &str = "recipes";

/// Durable home of the authoritative local recipe list.
pub trait RecipeStore: Send + Sync {
    /// Stored list, or empty if nothing is stored or the stored value is unreadable.
    fn load(&self) -> Vec<Recipe>;
    /// Overwrite the stored list.
    fn save(&self, recipes: &[Recipe]) -> Result<(), SyncError>;
}

pub struct RecipeCache {
    conn: Mutex<Connection>,
}

impl RecipeCache {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let cache = RecipeCache {
            conn: Mutex::new(conn),
        };
        cache.migrate()?;
        Ok(cache)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = RecipeCache {
            conn: Mutex::new(conn),
        };
        cache.migrate()?;
        Ok(cache)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv_store (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn()?.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv_store WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub fn delete_value(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn()?
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    /// Drop the stored recipe list.
    pub fn clear(&self) -> Result<bool> {
        self.delete_value(RECIPES_KEY)
    }

    fn try_load(&self) -> Result<Vec<Recipe>> {
        match self.get_value(RECIPES_KEY)? {
            Some(json) => {
                serde_json::from_str(&json).context("Stored recipe list is not valid JSON")
            }
            None => Ok(Vec::new()),
        }
    }

    fn try_save(&self, recipes: &[Recipe]) -> Result<()> {
        let json = serde_json::to_string(recipes)?;
        self.set_value(RECIPES_KEY, &json)
            .context("Failed to write recipe list")
    }
}

impl RecipeStore for RecipeCache {
    fn load(&self) -> Vec<Recipe> {
        match self.try_load() {
            Ok(recipes) => {
                debug!(count = recipes.len(), "Loaded recipes from cache");
                recipes
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Recipe cache unreadable, starting empty");
                Vec::new()
            }
        }
    }

    fn save(&self, recipes: &[Recipe]) -> Result<(), SyncError> {
        self.try_save(recipes).map_err(SyncError::Persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soup() -> Recipe {
        Recipe::new("Soup", "Boil").with_id("1")
    }

    #[test]
    fn test_load_empty_when_absent() {
        let cache = RecipeCache::open_in_memory().unwrap();
        assert!(cache.load().is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let cache = RecipeCache::open_in_memory().unwrap();
        let recipes = vec![soup(), Recipe::new("Toast", ""), Recipe::new("Stew", "Simmer")];
        cache.save(&recipes).unwrap();
        assert_eq!(cache.load(), recipes);
    }

    #[test]
    fn test_save_overwrites() {
        let cache = RecipeCache::open_in_memory().unwrap();
        cache.save(&[soup(), Recipe::new("Toast", "")]).unwrap();
        cache.save(&[Recipe::new("Stew", "")]).unwrap();
        let loaded = cache.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "Stew");
    }

    #[test]
    fn test_corrupt_value_loads_empty() {
        let cache = RecipeCache::open_in_memory().unwrap();
        cache.set_value(RECIPES_KEY, "{not json").unwrap();
        assert!(cache.load().is_empty());

        cache.set_value(RECIPES_KEY, r#"[{"id":"1"}]"#).unwrap();
        assert!(cache.load().is_empty());
    }

    #[test]
    fn test_stored_value_uses_wire_shape() {
        let cache = RecipeCache::open_in_memory().unwrap();
        cache.save(&[soup()]).unwrap();
        let raw = cache.get_value(RECIPES_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["data"]["description"], "Boil");
    }

    #[test]
    fn test_clear() {
        let cache = RecipeCache::open_in_memory().unwrap();
        cache.save(&[soup()]).unwrap();
        assert!(cache.clear().unwrap());
        assert!(cache.load().is_empty());
        // Clearing again returns false
        assert!(!cache.clear().unwrap());
    }

    #[test]
    fn test_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("larder.db");
        {
            let cache = RecipeCache::open(&path).unwrap();
            cache.save(&[soup()]).unwrap();
        }
        let cache = RecipeCache::open(&path).unwrap();
        assert_eq!(cache.load(), vec![soup()]);
    }

    #[test]
    fn test_migration_creates_kv_table() {
        let cache = RecipeCache::open_in_memory().unwrap();
        let count: i64 = cache
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
