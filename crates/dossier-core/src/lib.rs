//! Form engine and draft orchestration for Dossier.
//!
//! The crate defines the ports the infrastructure layer implements
//! (`BlobStore`, `IdentityProvider`, `SubmissionEndpoint`, `FramePort`) and
//! everything that runs on top of them: the form document model, repeatable
//! groups, conditional visibility, section agents, the review agent and the
//! parent-page orchestrator. It depends only on `dossier-types`, never on
//! `dossier-infra` or any database/IO crate.

pub mod agent;
pub mod auth;
pub mod document;
pub mod draft;
pub mod form;
pub mod frame;
pub mod orchestrator;
pub mod submission;

#[cfg(test)]
mod testing;
