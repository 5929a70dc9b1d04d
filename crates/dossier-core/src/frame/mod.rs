pub mod bus;
pub mod port;

pub use bus::FrameBus;
pub use port::{BusPort, FramePort};
