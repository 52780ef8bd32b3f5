//! Metric exporters
//!
//! A [`MetricExporter`] owns one prometheus collector and the series that
//! still have scripted values left. Every scrape advances each series by
//! exactly one value; a series whose queue runs dry is dropped from the
//! active list, while its last value stays visible in the collector until
//! the whole metric is cleared.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use prometheus::core::Collector;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts};

use crate::recipe::validate::ValidatedRecipe;

/// Metric family kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    /// Name used in recipes and in the exposition `# TYPE` line
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl FromStr for MetricKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            "histogram" => Ok(MetricKind::Histogram),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Cursor over one label combination's scripted values
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    labels: BTreeMap<String, String>,
    /// Label values in the collector's declared label order
    label_values: Vec<String>,
    values: VecDeque<f64>,
    /// Last absolute reading applied; counters report the difference
    last_emitted: f64,
}

impl Series {
    pub fn new(
        labels: BTreeMap<String, String>,
        label_values: Vec<String>,
        values: VecDeque<f64>,
    ) -> Self {
        Self {
            labels,
            label_values,
            values,
            last_emitted: 0.0,
        }
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Number of values not yet applied
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    pub fn is_drained(&self) -> bool {
        self.values.is_empty()
    }
}

/// Collector behind a registered metric, one variant per kind
///
/// All three share the advance loop in [`MetricExporter::advance`] and only
/// differ in how a single value is applied.
#[derive(Clone)]
pub enum MetricHandle {
    Counter(CounterVec),
    Gauge(GaugeVec),
    Histogram(HistogramVec),
}

impl MetricHandle {
    /// Build the collector for a validated recipe
    ///
    /// # Errors
    ///
    /// Returns the prometheus error for metric or label names the collector
    /// rejects.
    pub fn build(recipe: &ValidatedRecipe) -> Result<Self, prometheus::Error> {
        let labels: Vec<&str> = recipe.labels.iter().map(String::as_str).collect();

        let handle = match recipe.kind {
            MetricKind::Counter => MetricHandle::Counter(CounterVec::new(
                Opts::new(recipe.name.as_str(), recipe.help.as_str()),
                &labels,
            )?),
            MetricKind::Gauge => MetricHandle::Gauge(GaugeVec::new(
                Opts::new(recipe.name.as_str(), recipe.help.as_str()),
                &labels,
            )?),
            MetricKind::Histogram => {
                let mut opts = HistogramOpts::new(recipe.name.as_str(), recipe.help.as_str());
                // Empty buckets keep the prometheus defaults
                if !recipe.buckets.is_empty() {
                    opts = opts.buckets(recipe.buckets.clone());
                }
                MetricHandle::Histogram(HistogramVec::new(opts, &labels)?)
            }
        };
        Ok(handle)
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricHandle::Counter(_) => MetricKind::Counter,
            MetricHandle::Gauge(_) => MetricKind::Gauge,
            MetricHandle::Histogram(_) => MetricKind::Histogram,
        }
    }

    /// Boxed clone for registering with / unregistering from a registry
    pub fn collector(&self) -> Box<dyn Collector> {
        match self {
            MetricHandle::Counter(vec) => Box::new(vec.clone()),
            MetricHandle::Gauge(vec) => Box::new(vec.clone()),
            MetricHandle::Histogram(vec) => Box::new(vec.clone()),
        }
    }

    /// Apply one scripted value to the series' label set
    ///
    /// - counter: add `value - last_emitted`, then remember `value`
    /// - gauge: set to `value`
    /// - histogram: observe `value`
    pub fn apply(&self, series: &mut Series, value: f64) -> Result<(), prometheus::Error> {
        let label_values: Vec<&str> = series.label_values.iter().map(String::as_str).collect();

        match self {
            MetricHandle::Counter(vec) => {
                let delta = value - series.last_emitted;
                if delta < 0.0 {
                    return Err(prometheus::Error::Msg(format!(
                        "counter delta {delta} is negative ({} -> {value})",
                        series.last_emitted
                    )));
                }
                vec.get_metric_with_label_values(label_values.as_slice())?
                    .inc_by(delta);
            }
            MetricHandle::Gauge(vec) => {
                vec.get_metric_with_label_values(label_values.as_slice())?.set(value);
            }
            MetricHandle::Histogram(vec) => {
                vec.get_metric_with_label_values(label_values.as_slice())?
                    .observe(value);
            }
        }

        series.last_emitted = value;
        Ok(())
    }
}

/// One registered metric: its collector and still-active series
pub struct MetricExporter {
    name: String,
    handle: MetricHandle,
    series: Vec<Series>,
}

impl MetricExporter {
    pub fn new(name: String, handle: MetricHandle, series: Vec<Series>) -> Self {
        Self {
            name,
            handle,
            series,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MetricKind {
        self.handle.kind()
    }

    pub fn handle(&self) -> &MetricHandle {
        &self.handle
    }

    /// Series that still have values to replay
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    /// True once every series has been drained (or there never were any)
    pub fn is_drained(&self) -> bool {
        self.series.iter().all(Series::is_drained)
    }

    /// Advance every active series by one value, then prune drained ones
    ///
    /// A no-op once no active series remain.
    pub fn advance(&mut self) {
        for series in &mut self.series {
            let Some(value) = series.values.pop_front() else {
                continue;
            };

            if let Err(e) = self.handle.apply(series, value) {
                tracing::error!(
                    metric = %self.name,
                    labels = ?series.labels,
                    value,
                    error = %e,
                    "Failed to apply scripted value"
                );
            }

            if series.is_drained() {
                tracing::debug!(
                    metric = %self.name,
                    labels = ?series.labels,
                    "Series drained"
                );
            }
        }

        self.series.retain(|series| !series.is_drained());
    }
}

impl fmt::Debug for MetricExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricExporter")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("series", &self.series)
            .finish()
    }
}
