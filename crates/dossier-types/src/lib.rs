//! Shared domain types for Dossier.
//!
//! This crate contains the types used across the questionnaire platform:
//! section keys, form records, the cross-frame wire protocol, configuration,
//! user identity and the error enums.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod record;
pub mod section;
