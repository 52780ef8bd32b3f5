//! Recipe documents
//!
//! A recipe declares one metric family (its spec) and, per label
//! combination, the scripted values that family reports on successive
//! scrapes. Recipes arrive as a YAML stream, one recipe per document:
//!
//! ```yaml
//! spec:
//!   name: test1
//!   type: counter
//!   labels: [aaa, bbb]
//! data:
//!   - labels:
//!       - key: aaa
//!         value: aaa_val1
//!       - key: bbb
//!         value: bbb_val1
//!     sequence: "1 2 3"
//! ```

pub mod sequence;
pub mod validate;

use crate::error::RecipeError;
use serde::{Deserialize, Deserializer, Serialize};

/// One metric family declaration plus its scripted data rows
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    pub spec: MetricSpec,
    #[serde(default)]
    pub data: Vec<DataRow>,
}

/// Metric family declaration
///
/// `kind` stays a plain string here so that an unknown kind is reported by
/// the validator together with the index of the offending recipe.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricSpec {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Histogram bucket upper bounds; empty means the default buckets
    #[serde(default)]
    pub buckets: Vec<f64>,
    /// HELP text for the exposition output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

/// One label combination and the sequence it replays
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DataRow {
    #[serde(default)]
    pub labels: Vec<LabelPair>,
    #[serde(deserialize_with = "sequence_text")]
    pub sequence: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LabelPair {
    pub key: String,
    pub value: String,
}

impl LabelPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Accept `sequence: 5` as well as `sequence: "5"`
fn sequence_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_yaml::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

/// Parse a YAML stream into its recipes, one per document
///
/// # Errors
///
/// Returns [`RecipeError::Parse`] if the stream is blank, is not valid YAML,
/// or a document does not have the recipe shape.
pub fn parse_documents(text: &str) -> Result<Vec<Recipe>, RecipeError> {
    if text.trim().is_empty() {
        return Err(RecipeError::Parse("recipe document is empty".to_string()));
    }

    let mut recipes = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let recipe = Recipe::deserialize(document)
            .map_err(|e| RecipeError::Parse(format!("document #{index}: {e}")))?;
        recipes.push(recipe);
    }

    if recipes.is_empty() {
        return Err(RecipeError::Parse(
            "recipe document contains no recipes".to_string(),
        ));
    }
    Ok(recipes)
}
