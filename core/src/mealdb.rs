use async_trait::async_trait;
use reqwest::Client;

use crate::error::{Result, SyncError};
use crate::http::send_json;
use crate::models::{Meal, MealResponse};

#[async_trait]
pub trait MealSource: Send + Sync {
    async fn fetch_one(&self) -> Result<Meal>;
}

/// TheMealDB-style random endpoint returning `{"meals": [...]}`.
pub struct MealDbClient {
    client: Client,
    url: String,
}

impl MealDbClient {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl MealSource for MealDbClient {
    async fn fetch_one(&self) -> Result<Meal> {
        let resp: MealResponse = send_json("GET", self.client.get(&self.url)).await?;
        first_meal(resp)
    }
}

fn first_meal(resp: MealResponse) -> Result<Meal> {
    resp.meals
        .and_then(|meals| meals.into_iter().next())
        .ok_or(SyncError::EmptyResult)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn decode(json: &str) -> MealResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_first_meal_empty_array() {
        let err = first_meal(decode(r#"{"meals": []}"#)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }

    #[test]
    fn test_first_meal_null() {
        let err = first_meal(decode(r#"{"meals": null}"#)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }

    #[test]
    fn test_first_meal_takes_first() {
        let meal = first_meal(decode(
            r#"{"meals": [
                {"idMeal": "1", "strMeal": "Dal", "strInstructions": "Simmer", "strMealThumb": ""},
                {"idMeal": "2", "strMeal": "Pho", "strInstructions": "Boil", "strMealThumb": ""}
            ]}"#,
        ))
        .unwrap();
        assert_eq!(meal.name, "Dal");
    }

    #[tokio::test]
    #[ignore = "hits TheMealDB API"]
    async fn test_fetch_one_live() {
        let meals = MealDbClient::new(Client::new(), crate::config::DEFAULT_MEAL_URL);
        let meal = meals.fetch_one().await.unwrap();
        assert!(!meal.id.is_empty());
        assert!(!meal.name.is_empty());
    }
}
