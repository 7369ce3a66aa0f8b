use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::corpus::SampleCorpus;
use crate::error::Result;
use crate::models::{Recipe, Sample};

pub const DEFAULT_IMPORT_COUNT: usize = 3;

/// Largest valid `skip` for a window of `count` over `total` samples.
#[must_use]
pub fn max_skip(total: usize, count: usize) -> usize {
    total.saturating_sub(count)
}

/// Pick `skip` uniformly from `[0, max_skip(total, count)]`.
pub fn import_window<R: Rng + ?Sized>(total: usize, count: usize, rng: &mut R) -> usize {
    rng.random_range(0..=max_skip(total, count))
}

fn random_skip(total: usize, count: usize) -> usize {
    import_window(total, count, &mut rand::rng())
}

/// Drop samples whose lowercased name is already taken, either by an
/// existing recipe or by an earlier sample in the same batch.
///
/// Returns the surviving samples as recipes, in corpus order, plus the
/// number dropped.
#[must_use]
pub fn unique_samples(existing: &[Recipe], samples: Vec<Sample>) -> (Vec<Recipe>, usize) {
    let mut seen: HashSet<String> = existing.iter().map(|r| r.name.to_lowercase()).collect();
    let fetched = samples.len();

    let recipes: Vec<Recipe> = samples
        .into_iter()
        .filter(|s| seen.insert(s.name.to_lowercase()))
        .map(Sample::into_recipe)
        .collect();

    let duplicates = fetched - recipes.len();
    (recipes, duplicates)
}

/// What an import will create, decided before any write happens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPlan {
    pub total: i64,
    pub skip: usize,
    pub fetched: usize,
    pub duplicates: usize,
    pub recipes: Vec<Recipe>,
}

pub struct SampleImporter {
    corpus: Arc<dyn SampleCorpus>,
}

impl SampleImporter {
    pub fn new(corpus: Arc<dyn SampleCorpus>) -> Self {
        Self { corpus }
    }

    /// Probe the corpus size, fetch a random window of `count` samples, and
    /// keep those whose names are new to `existing`.
    ///
    /// An empty corpus or a zero `count` yields an empty plan without
    /// fetching a page.
    pub async fn plan(&self, existing: &[Recipe], count: usize) -> Result<ImportPlan> {
        if count == 0 {
            return Ok(ImportPlan::default());
        }

        let total = self.corpus.total().await?;
        if total <= 0 {
            info!(total, "Sample corpus is empty, nothing to import");
            return Ok(ImportPlan {
                total,
                ..ImportPlan::default()
            });
        }

        let size = usize::try_from(total).unwrap_or(usize::MAX);
        let skip = random_skip(size, count);
        debug!(total, count, skip, "Chose import window");

        let page = self.corpus.page(count, skip).await?;
        if page.samples.len() > count {
            warn!(returned = page.samples.len(), count, "Corpus ignored the page limit, truncating");
        }
        let samples: Vec<Sample> = page.samples.into_iter().take(count).collect();
        let fetched = samples.len();
        let (recipes, duplicates) = unique_samples(existing, samples);

        Ok(ImportPlan {
            total,
            skip,
            fetched,
            duplicates,
            recipes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, SyncError};
    use crate::models::SamplePage;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Mutex;

    struct MockCorpus {
        total: i64,
        samples: Vec<Sample>,
        fail_page: bool,
        pages: Mutex<Vec<(usize, usize)>>,
    }

    impl MockCorpus {
        fn new(total: i64, names: &[&str]) -> Self {
            Self {
                total,
                samples: names.iter().map(|n| sample(n)).collect(),
                fail_page: false,
                pages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SampleCorpus for MockCorpus {
        async fn total(&self) -> Result<i64> {
            Ok(self.total)
        }

        async fn page(&self, limit: usize, skip: usize) -> Result<SamplePage> {
            self.pages.lock().unwrap().push((limit, skip));
            if self.fail_page {
                return Err(SyncError::EmptyResult);
            }
            Ok(SamplePage {
                samples: self.samples.clone(),
                total: self.total,
                skip: skip as i64,
                limit: limit as i64,
            })
        }
    }

    fn sample(name: &str) -> Sample {
        Sample {
            name: name.to_string(),
            instruction_steps: vec!["step".to_string()],
        }
    }

    #[test]
    fn test_max_skip() {
        assert_eq!(max_skip(10, 3), 7);
        assert_eq!(max_skip(3, 3), 0);
        assert_eq!(max_skip(2, 3), 0);
    }

    #[test]
    fn test_import_window_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut hit_low = false;
        let mut hit_high = false;
        for _ in 0..2000 {
            let skip = import_window(10, 3, &mut rng);
            assert!(skip <= 7);
            hit_low |= skip == 0;
            hit_high |= skip == 7;
        }
        // Both ends of the inclusive range are reachable
        assert!(hit_low && hit_high);
    }

    #[test]
    fn test_import_window_small_corpus() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            assert_eq!(import_window(2, 3, &mut rng), 0);
        }
    }

    #[test]
    fn test_unique_samples_case_insensitive() {
        let existing = vec![Recipe::new("Soup", "Boil").with_id("1")];
        let (recipes, dups) = unique_samples(&existing, vec![sample("SOUP"), sample("Stew")]);
        assert_eq!(dups, 1);
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].name, "Stew");
    }

    #[test]
    fn test_unique_samples_within_batch() {
        let (recipes, dups) =
            unique_samples(&[], vec![sample("Pho"), sample("pho"), sample("Dal"), sample("PHO")]);
        assert_eq!(dups, 2);
        let names: Vec<&str> = recipes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Pho", "Dal"]);
    }

    #[tokio::test]
    async fn test_plan_empty_corpus_skips_page() {
        let corpus = Arc::new(MockCorpus::new(0, &["Pho"]));
        let importer = SampleImporter::new(corpus.clone());
        let plan = importer.plan(&[], 3).await.unwrap();
        assert!(plan.recipes.is_empty());
        assert!(corpus.pages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plan_zero_count_is_noop() {
        let corpus = Arc::new(MockCorpus::new(10, &["Pho"]));
        let importer = SampleImporter::new(corpus.clone());
        let plan = importer.plan(&[], 0).await.unwrap();
        assert_eq!(plan, ImportPlan::default());
        assert!(corpus.pages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plan_requests_window_within_bounds() {
        let corpus = Arc::new(MockCorpus::new(10, &["Pho", "Dal", "Stew"]));
        let importer = SampleImporter::new(corpus.clone());
        let plan = importer.plan(&[], 3).await.unwrap();

        let pages = corpus.pages.lock().unwrap().clone();
        assert_eq!(pages.len(), 1);
        let (limit, skip) = pages[0];
        assert_eq!(limit, 3);
        assert!(skip <= 7);
        assert_eq!(plan.skip, skip);
        assert_eq!(plan.fetched, 3);
        assert_eq!(plan.recipes.len(), 3);
        assert_eq!(plan.recipes[0].description, "step");
    }

    #[tokio::test]
    async fn test_plan_truncates_oversized_page() {
        let corpus = Arc::new(MockCorpus::new(10, &["Pho", "Dal", "Stew", "Pie", "Soup"]));
        let importer = SampleImporter::new(corpus.clone());
        let plan = importer.plan(&[], 1).await.unwrap();

        assert_eq!(plan.fetched, 1);
        assert_eq!(plan.duplicates, 0);
        assert_eq!(plan.recipes.len(), 1);
        assert_eq!(plan.recipes[0].name, "Pho");
    }

    #[tokio::test]
    async fn test_plan_page_failure_propagates() {
        let mut corpus = MockCorpus::new(10, &["Pho"]);
        corpus.fail_page = true;
        let importer = SampleImporter::new(Arc::new(corpus));
        let err = importer.plan(&[], 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }
}
