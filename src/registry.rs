//! Recipe registry and metric lifecycle
//!
//! Holds every registered [`MetricExporter`] by name together with the
//! prometheus registry their collectors are exposed through. Register,
//! update and clear are serialized by a single mutex; none of them awaits
//! while holding it.
//!
//! Lifecycle per metric name: absent → registered → (advanced per scrape)*
//! → removed by [`RecipeRegistry::clear`]. A metric whose series are all
//! drained keeps its name until it is cleared.

use std::collections::HashMap;

use prometheus::{Encoder, Registry, TextEncoder};
use tokio::sync::Mutex;

use crate::error::RecipeError;
use crate::exporter::{MetricExporter, MetricHandle};
use crate::recipe::validate::{ValidatedRecipe, validate};
use crate::recipe::{Recipe, parse_documents};

/// Name-keyed collection of registered metrics
pub struct RecipeRegistry {
    exporters: Mutex<HashMap<String, MetricExporter>>,
    registry: Registry,
}

impl Default for RecipeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeRegistry {
    /// Create an empty registry with its own prometheus registry
    pub fn new() -> Self {
        Self {
            exporters: Mutex::new(HashMap::new()),
            registry: Registry::new(),
        }
    }

    /// Parse a YAML recipe stream and register every recipe in it
    ///
    /// Returns the names that were installed. Either the whole batch is
    /// installed or none of it is.
    ///
    /// # Errors
    ///
    /// - [`RecipeError::Parse`] if the stream cannot be read as recipes
    /// - [`RecipeError::Conflict`] if any name is already registered
    /// - [`RecipeError::Validation`] / [`RecipeError::Format`] for invalid
    ///   specs or data rows
    pub async fn register(&self, text: &str) -> Result<Vec<String>, RecipeError> {
        let recipes = parse_documents(text)?;
        self.register_recipes(&recipes).await
    }

    /// Register an already-parsed batch of recipes
    ///
    /// # Errors
    ///
    /// Same as [`RecipeRegistry::register`], minus parse errors.
    pub async fn register_recipes(&self, recipes: &[Recipe]) -> Result<Vec<String>, RecipeError> {
        let mut exporters = self.exporters.lock().await;

        let validated = validate(recipes, |name| exporters.contains_key(name))?;
        let handles = build_handles(&validated)?;
        self.register_collectors(&validated, &handles)?;

        let mut names = Vec::with_capacity(validated.len());
        for (recipe, handle) in validated.into_iter().zip(handles) {
            tracing::info!(
                metric = %recipe.name,
                kind = %recipe.kind,
                series = recipe.series.len(),
                "Metric registered"
            );
            names.push(recipe.name.clone());
            exporters.insert(
                recipe.name.clone(),
                MetricExporter::new(recipe.name, handle, recipe.series),
            );
        }

        Ok(names)
    }

    /// Register the collectors with the prometheus registry, all or nothing
    fn register_collectors(
        &self,
        validated: &[ValidatedRecipe],
        handles: &[MetricHandle],
    ) -> Result<(), RecipeError> {
        for (index, handle) in handles.iter().enumerate() {
            if let Err(e) = self.registry.register(handle.collector()) {
                for registered in &handles[..index] {
                    if let Err(undo) = self.registry.unregister(registered.collector()) {
                        tracing::error!(
                            error = %undo,
                            "Failed to roll back collector registration"
                        );
                    }
                }
                return Err(RecipeError::Validation {
                    index,
                    name: validated[index].name.clone(),
                    reason: format!("collector registration failed: {e}"),
                });
            }
        }
        Ok(())
    }

    /// Advance every registered metric by one step
    pub async fn update(&self) {
        let mut exporters = self.exporters.lock().await;
        advance_all(&mut exporters);
    }

    /// Remove metrics that are eligible for deletion
    ///
    /// With `force` every metric is eligible; otherwise only metrics whose
    /// series are all drained. Ineligible metrics are left untouched.
    /// Returns the removed names, sorted.
    pub async fn clear(&self, force: bool) -> Vec<String> {
        let mut exporters = self.exporters.lock().await;

        let mut removed: Vec<String> = exporters
            .values()
            .filter(|exporter| force || exporter.is_drained())
            .map(|exporter| exporter.name().to_string())
            .collect();
        removed.sort_unstable();

        for name in &removed {
            let Some(exporter) = exporters.remove(name) else {
                continue;
            };
            if let Err(e) = self.registry.unregister(exporter.handle().collector()) {
                tracing::warn!(metric = %name, error = %e, "Failed to unregister collector");
            }
            tracing::info!(metric = %name, force, "Metric removed");
        }

        removed
    }

    /// Render current values in the Prometheus text format without advancing
    ///
    /// # Errors
    ///
    /// Returns an error if the text encoder fails.
    pub async fn gather(&self) -> Result<String, prometheus::Error> {
        let _exporters = self.exporters.lock().await;
        encode(&self.registry)
    }

    /// Advance every metric one step, then render the result
    ///
    /// Both happen under one lock acquisition, so concurrent scrapes each
    /// observe their own step.
    ///
    /// # Errors
    ///
    /// Returns an error if the text encoder fails.
    pub async fn scrape(&self) -> Result<String, prometheus::Error> {
        let mut exporters = self.exporters.lock().await;
        advance_all(&mut exporters);
        encode(&self.registry)
    }

    /// Registered metric names, sorted
    pub async fn names(&self) -> Vec<String> {
        let exporters = self.exporters.lock().await;
        let mut names: Vec<String> = exporters.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.exporters.lock().await.contains_key(name)
    }

    pub async fn len(&self) -> usize {
        self.exporters.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.exporters.lock().await.is_empty()
    }

    /// Number of series of `name` that still have values to replay
    pub async fn active_series(&self, name: &str) -> Option<usize> {
        self.exporters
            .lock()
            .await
            .get(name)
            .map(|exporter| exporter.series().len())
    }
}

fn build_handles(validated: &[ValidatedRecipe]) -> Result<Vec<MetricHandle>, RecipeError> {
    validated
        .iter()
        .enumerate()
        .map(|(index, recipe)| {
            MetricHandle::build(recipe).map_err(|e| RecipeError::Validation {
                index,
                name: recipe.name.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn advance_all(exporters: &mut HashMap<String, MetricExporter>) {
    for exporter in exporters.values_mut() {
        exporter.advance();
    }
}

fn encode(registry: &Registry) -> Result<String, prometheus::Error> {
    let metric_families = registry.gather();
    let metric_count = metric_families.len();

    tracing::debug!(
        metric_family_count = metric_count,
        "Encoding metrics to Prometheus text format"
    );

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    encoder.encode(&metric_families, &mut buffer).map_err(|e| {
        let metric_names: Vec<_> = metric_families.iter().map(|mf| mf.name()).collect();

        tracing::error!(
            error = %e,
            metric_family_count = metric_count,
            metric_names = ?metric_names,
            "Prometheus text encoder failed"
        );

        prometheus::Error::Msg(format!(
            "Failed to encode {} metric families: {}. Metrics: {:?}",
            metric_count, e, metric_names
        ))
    })?;

    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Metrics output is not valid UTF-8: {e}")))
}
