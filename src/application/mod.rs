//! Application layer: wiring and the periodic control-loop driver.

pub mod control_loop;

pub use control_loop::{ControlLoop, LoopState, LoopStats};
