//! any-exporter - scriptable Prometheus exporter for end-to-end tests
//!
//! Tests register recipes: named metric families with, per label set, a
//! scripted sequence of future values. Every scrape of `/metrics` advances
//! each series by exactly one value, so a test can assert on what a metric
//! reports scrape by scrape.

pub mod cli;
pub mod config;
pub mod error;
pub mod exporter;
pub mod handlers;
pub mod recipe;
pub mod registry;
pub mod telemetry;
