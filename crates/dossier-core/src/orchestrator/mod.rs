//! Parent-page orchestrator and its status bus.

pub mod session;
pub mod status;

pub use self::session::{Command, NavEntry, Orchestrator};
pub use self::status::{StatusBus, StatusEvent};
