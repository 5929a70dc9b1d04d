//! Infrastructure layer for Dossier.
//!
//! Implements the ports defined in `dossier-core`: SQLite draft storage,
//! the HTTP submission client and a static identity provider. Also loads
//! `config.toml` and resolves the data directory.

pub mod config;
pub mod identity;
pub mod sqlite;
pub mod submission;
