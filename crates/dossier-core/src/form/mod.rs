//! Form engine: codec, repeatable groups, conditional visibility and the
//! section page that ties them together.

pub mod codec;
pub mod groups;
pub mod page;
pub mod validate;
pub mod visibility;

pub use groups::{GroupSpec, ItemHandle, RepeatableGroups};
pub use page::{Click, PageLayout, SectionPage};
pub use visibility::{Predicate, SectionToggle, VisibilityEngine, VisibilityRule};
