use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::Result;
use crate::http::{send, send_json, trim_base};
use crate::models::Recipe;

/// Remote CRUD store for recipes.
///
/// Every call is attempted once; implementations hold no recipe state.
#[async_trait]
pub trait RecipeVault: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Recipe>>;
    /// Store a new recipe; the returned value carries the server-assigned id.
    async fn create(&self, recipe: &Recipe) -> Result<Recipe>;
    /// Replace a stored recipe. Returns `Ok(None)` without a request when
    /// `recipe.id` is absent.
    async fn update(&self, recipe: &Recipe) -> Result<Option<Recipe>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

pub struct VaultClient {
    client: Client,
    objects_url: String,
}

impl VaultClient {
    /// `base_url` is the vault root; the collection is `{base_url}/objects`.
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            objects_url: format!("{}/objects", trim_base(base_url)),
        }
    }

    fn object_url(&self, id: &str) -> String {
        format!("{}/{id}", self.objects_url)
    }
}

#[async_trait]
impl RecipeVault for VaultClient {
    async fn list_all(&self) -> Result<Vec<Recipe>> {
        let recipes: Vec<Recipe> =
            send_json("GET", self.client.get(&self.objects_url)).await?;
        debug!(count = recipes.len(), "Listed vault recipes");
        Ok(recipes)
    }

    async fn create(&self, recipe: &Recipe) -> Result<Recipe> {
        let saved: Recipe =
            send_json("POST", self.client.post(&self.objects_url).json(recipe)).await?;
        debug!(id = ?saved.id, name = %saved.name, "Created vault recipe");
        Ok(saved)
    }

    async fn update(&self, recipe: &Recipe) -> Result<Option<Recipe>> {
        let Some(id) = recipe.id.as_deref() else {
            return Ok(None);
        };
        let updated: Recipe =
            send_json("PUT", self.client.put(self.object_url(id)).json(recipe)).await?;
        debug!(id, "Updated vault recipe");
        Ok(Some(updated))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        send("DELETE", self.client.delete(self.object_url(id))).await?;
        debug!(id, "Deleted vault recipe");
        Ok(())
    }
}
