use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One recipe as stored in the vault.
///
/// On the wire the description is nested under `data`:
/// `{"id": "...", "name": "...", "data": {"description": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    /// Server-assigned. `None` means the recipe has never been written remotely.
    pub id: Option<String>,
    pub name: String,
    pub description: String,
}

impl Recipe {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn is_local_only(&self) -> bool {
        self.id.is_none()
    }

    /// Whether `self` and `other` denote the same list entry.
    ///
    /// Recipes with ids compare by id. Local-only recipes have no identity
    /// beyond their content, so they compare by name and description.
    #[must_use]
    pub fn same_entry(&self, other: &Recipe) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.name == other.name && self.description == other.description,
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct RecipeWireOut<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    name: &'a str,
    data: RecipeDataOut<'a>,
}

#[derive(Serialize)]
struct RecipeDataOut<'a> {
    description: &'a str,
}

#[derive(Deserialize)]
struct RecipeWireIn {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    data: Option<RecipeDataIn>,
}

#[derive(Deserialize)]
struct RecipeDataIn {
    #[serde(default)]
    description: Option<String>,
}

impl Serialize for Recipe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RecipeWireOut {
            id: self.id.as_deref(),
            name: &self.name,
            data: RecipeDataOut {
                description: &self.description,
            },
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Recipe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = RecipeWireIn::deserialize(deserializer)?;
        Ok(Recipe {
            id: wire.id,
            name: wire.name,
            description: wire
                .data
                .and_then(|d| d.description)
                .unwrap_or_default(),
        })
    }
}

/// A random meal suggestion. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meal {
    #[serde(rename = "idMeal")]
    pub id: String,
    #[serde(rename = "strMeal")]
    pub name: String,
    #[serde(rename = "strInstructions", default, deserialize_with = "null_as_empty")]
    pub instructions: String,
    #[serde(rename = "strMealThumb", default, deserialize_with = "null_as_empty")]
    pub thumbnail_url: String,
}

impl Meal {
    /// Local-only recipe carrying this meal's name and instructions.
    #[must_use]
    pub fn to_recipe(&self) -> Recipe {
        Recipe::new(self.name.clone(), self.instructions.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct MealResponse {
    #[serde(default)]
    pub meals: Option<Vec<Meal>>,
}

/// One entry of the sample corpus.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sample {
    pub name: String,
    #[serde(rename = "instructions", default)]
    pub instruction_steps: Vec<String>,
}

impl Sample {
    #[must_use]
    pub fn into_recipe(self) -> Recipe {
        Recipe::new(self.name, self.instruction_steps.join("\n"))
    }
}

#[derive(Debug, Deserialize)]
pub struct SamplePage {
    #[serde(rename = "recipes", default)]
    pub samples: Vec<Sample>,
    pub total: i64,
    #[serde(default)]
    pub skip: i64,
    #[serde(default)]
    pub limit: i64,
}

/// Size probe for the corpus; everything but `total` is ignored.
#[derive(Debug, Deserialize)]
pub struct CorpusSize {
    pub total: i64,
}

/// Which path a write took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The vault accepted the write; carries the server's representation.
    Synced(Recipe),
    /// The vault call failed or was skipped; carries what was stored locally.
    LocalOnly(Recipe),
}

impl WriteOutcome {
    #[must_use]
    pub fn recipe(&self) -> &Recipe {
        match self {
            WriteOutcome::Synced(r) | WriteOutcome::LocalOnly(r) => r,
        }
    }

    #[must_use]
    pub fn into_recipe(self) -> Recipe {
        match self {
            WriteOutcome::Synced(r) | WriteOutcome::LocalOnly(r) => r,
        }
    }

    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self, WriteOutcome::Synced(_))
    }
}

/// Result of one `import_random_samples` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Corpus size reported by the probe request.
    pub total: i64,
    pub skip: usize,
    /// Samples returned for the window.
    pub fetched: usize,
    /// Samples dropped because their name already existed.
    pub duplicates: usize,
    pub outcomes: Vec<WriteOutcome>,
}

impl ImportSummary {
    #[must_use]
    pub fn created(&self) -> usize {
        self.outcomes.len()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}
