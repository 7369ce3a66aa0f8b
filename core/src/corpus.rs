use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::http::{send_json, trim_base};
use crate::models::{CorpusSize, SamplePage};

/// Paginated, read-only source of sample recipes.
#[async_trait]
pub trait SampleCorpus: Send + Sync {
    /// Number of samples the corpus holds.
    async fn total(&self) -> Result<i64>;
    /// The window of `limit` samples starting at `skip`.
    async fn page(&self, limit: usize, skip: usize) -> Result<SamplePage>;
}

/// Client for a dummyjson-style `?limit=&skip=` listing.
pub struct CorpusClient {
    client: Client,
    url: String,
}

impl CorpusClient {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: trim_base(url),
        }
    }
}

#[async_trait]
impl SampleCorpus for CorpusClient {
    async fn total(&self) -> Result<i64> {
        let size: CorpusSize =
            send_json("GET", self.client.get(&self.url).query(&[("limit", 0)])).await?;
        Ok(size.total)
    }

    async fn page(&self, limit: usize, skip: usize) -> Result<SamplePage> {
        send_json(
            "GET",
            self.client
                .get(&self.url)
                .query(&[("limit", limit), ("skip", skip)]),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "hits dummyjson.com"]
    async fn test_total_and_page_live() {
        let corpus = CorpusClient::new(Client::new(), crate::config::DEFAULT_CORPUS_URL);
        let total = corpus.total().await.unwrap();
        assert!(total > 0);

        let page = corpus.page(2, 0).await.unwrap();
        assert_eq!(page.samples.len(), 2);
        assert!(page.samples.iter().all(|s| !s.name.is_empty()));
    }
}
