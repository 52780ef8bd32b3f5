//! Recipe batch validation
//!
//! Checks a whole batch before anything is installed. The checks run as
//! passes over the batch in a fixed precedence; the first failure wins and
//! names the offending recipe:
//!
//! 1. name conflicts (live registry, then earlier names in the batch)
//! 2. spec well-formedness
//! 3. data row label sets
//! 4. sequence compilation and counter monotonicity, with the compiled
//!    values of the whole batch capped at [`MAX_BATCH_VALUES`]

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::error::{RecipeError, SequenceError};
use crate::exporter::{MetricKind, Series};
use crate::recipe::{DataRow, MetricSpec, Recipe, sequence};

/// Upper bound on the values one batch may compile to, across all rows
pub const MAX_BATCH_VALUES: usize = 4 * sequence::MAX_SEQUENCE_LEN;

/// A recipe that passed every check, with its series compiled
#[derive(Debug, Clone)]
pub struct ValidatedRecipe {
    pub name: String,
    pub kind: MetricKind,
    pub labels: Vec<String>,
    pub buckets: Vec<f64>,
    pub help: String,
    pub series: Vec<Series>,
}

/// Validate a batch against the names currently registered
///
/// # Errors
///
/// - [`RecipeError::Conflict`] if a name is registered already or repeats
///   inside the batch
/// - [`RecipeError::Validation`] for malformed specs, label mismatches and
///   decreasing counter sequences
/// - [`RecipeError::Format`] if a sequence does not compile
/// - [`RecipeError::Validation`] if the batch compiles to more than
///   [`MAX_BATCH_VALUES`] values
pub fn validate<F>(recipes: &[Recipe], is_registered: F) -> Result<Vec<ValidatedRecipe>, RecipeError>
where
    F: Fn(&str) -> bool,
{
    check_conflicts(recipes, is_registered)?;

    let mut kinds = Vec::with_capacity(recipes.len());
    for (index, recipe) in recipes.iter().enumerate() {
        let kind = check_spec(&recipe.spec).map_err(|reason| invalid(index, &recipe.spec, reason))?;
        kinds.push(kind);
    }

    for (index, recipe) in recipes.iter().enumerate() {
        for (row_index, row) in recipe.data.iter().enumerate() {
            check_row_labels(&recipe.spec.labels, row).map_err(|reason| {
                invalid(index, &recipe.spec, format!("data row #{row_index}: {reason}"))
            })?;
        }
    }

    let mut budget = MAX_BATCH_VALUES;
    let mut validated = Vec::with_capacity(recipes.len());
    for (index, (recipe, kind)) in recipes.iter().zip(kinds).enumerate() {
        let mut series = Vec::with_capacity(recipe.data.len());
        for (row_index, row) in recipe.data.iter().enumerate() {
            let limit = sequence::MAX_SEQUENCE_LEN.min(budget);
            let values = match sequence::compile_with_limit(&row.sequence, limit) {
                Ok(values) => values,
                Err(SequenceError::TooLong { .. }) if limit < sequence::MAX_SEQUENCE_LEN => {
                    return Err(invalid(
                        index,
                        &recipe.spec,
                        format!(
                            "data row #{row_index}: batch expands to more than \
                             {MAX_BATCH_VALUES} values"
                        ),
                    ));
                }
                Err(source) => {
                    return Err(RecipeError::Format {
                        index,
                        name: recipe.spec.name.clone(),
                        row: row_index,
                        source,
                    });
                }
            };
            budget -= values.len();

            if kind == MetricKind::Counter {
                check_counter_sequence(&values).map_err(|reason| {
                    invalid(index, &recipe.spec, format!("data row #{row_index}: {reason}"))
                })?;
            }

            series.push(compile_series(&recipe.spec.labels, row, values));
        }

        validated.push(ValidatedRecipe {
            name: recipe.spec.name.clone(),
            kind,
            labels: recipe.spec.labels.clone(),
            buckets: recipe.spec.buckets.clone(),
            help: recipe
                .spec
                .help
                .clone()
                .filter(|help| !help.trim().is_empty())
                .unwrap_or_else(|| format!("Synthetic {} generated from recipe", kind.as_str())),
            series,
        });
    }

    Ok(validated)
}

fn invalid(index: usize, spec: &MetricSpec, reason: impl Into<String>) -> RecipeError {
    RecipeError::Validation {
        index,
        name: spec.name.clone(),
        reason: reason.into(),
    }
}

fn check_conflicts<F>(recipes: &[Recipe], is_registered: F) -> Result<(), RecipeError>
where
    F: Fn(&str) -> bool,
{
    let mut seen = HashSet::new();
    for (index, recipe) in recipes.iter().enumerate() {
        let name = recipe.spec.name.as_str();
        if name.is_empty() {
            continue;
        }
        if is_registered(name) || !seen.insert(name) {
            return Err(RecipeError::Conflict {
                index,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

fn check_spec(spec: &MetricSpec) -> Result<MetricKind, String> {
    if spec.name.is_empty() {
        return Err("metric name is empty".to_string());
    }

    let kind: MetricKind = spec
        .kind
        .parse()
        .map_err(|_| format!("unknown metric type {:?}", spec.kind))?;

    if spec.labels.is_empty() {
        return Err("label set is empty".to_string());
    }

    let mut keys = HashSet::new();
    for key in &spec.labels {
        if !keys.insert(key.as_str()) {
            return Err(format!("label {key:?} is declared more than once"));
        }
    }

    if kind == MetricKind::Histogram && keys.contains("le") {
        return Err("label \"le\" is reserved for histogram buckets".to_string());
    }

    if kind == MetricKind::Histogram && !valid_buckets(&spec.buckets) {
        return Err(format!(
            "buckets must be finite, positive and strictly increasing, got {:?}",
            spec.buckets
        ));
    }

    Ok(kind)
}

/// Buckets must be finite, strictly positive and strictly increasing
pub fn valid_buckets(buckets: &[f64]) -> bool {
    let mut previous = 0.0;
    for &bound in buckets {
        if !bound.is_finite() || bound <= previous {
            return false;
        }
        previous = bound;
    }
    true
}

/// The row's label keys must be exactly the declared label keys
fn check_row_labels(spec_labels: &[String], row: &DataRow) -> Result<(), String> {
    let mut keys = HashSet::new();
    for pair in &row.labels {
        if !keys.insert(pair.key.as_str()) {
            return Err(format!("label {:?} is given more than once", pair.key));
        }
    }

    if keys.len() != spec_labels.len() || spec_labels.iter().any(|l| !keys.contains(l.as_str())) {
        let mut given: Vec<_> = keys.into_iter().collect();
        given.sort_unstable();
        return Err(format!(
            "label keys {given:?} do not match declared labels {spec_labels:?}"
        ));
    }
    Ok(())
}

/// Counter readings never decrease, starting from an implicit 0
fn check_counter_sequence(values: &[f64]) -> Result<(), String> {
    if let Some(&first) = values.first() {
        if first < 0.0 {
            return Err(format!(
                "counter sequence must not start below 0, got {first}"
            ));
        }
    }
    if !non_decreasing(values) {
        return Err(format!(
            "counter sequence must be non-decreasing, got {values:?}"
        ));
    }
    Ok(())
}

pub fn non_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|pair| pair[0] <= pair[1])
}

fn compile_series(spec_labels: &[String], row: &DataRow, values: Vec<f64>) -> Series {
    let labels: BTreeMap<String, String> = row
        .labels
        .iter()
        .map(|pair| (pair.key.clone(), pair.value.clone()))
        .collect();
    // Spec order, which is the variable label order of the collector
    let label_values = spec_labels
        .iter()
        .map(|key| labels.get(key).cloned().unwrap_or_default())
        .collect();
    Series::new(labels, label_values, VecDeque::from(values))
}
