//! Span names shared across Dossier.
//!
//! Constants rather than literals so that log processing can rely on one
//! vocabulary. Usable directly in `tracing::info_span!`.

/// Final submission of a user's draft.
pub const SPAN_SUBMIT: &str = "dossier.submit";

/// Rendering the review document.
pub const SPAN_REVIEW: &str = "dossier.review";

/// Dropping a user's draft from the store.
pub const SPAN_DRAFT_CLEAR: &str = "dossier.draft.clear";
