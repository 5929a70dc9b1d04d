//! Observability setup for Dossier: tracing subscriber installation and
//! shared span attribute names.

pub mod attributes;
pub mod tracing_setup;
