//! Frame-side protocol participants.

pub mod review;
pub mod section;

pub use review::{ReviewAgent, ReviewDocument, ReviewState};
pub use section::{PageInput, SectionAgent};
