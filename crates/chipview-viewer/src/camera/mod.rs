//! Camera module
//!
//! Perspective camera orbiting the model origin with damping and auto-rotation.

mod config;
mod controls;

pub use config::OrbitConfig;
pub use controls::OrbitControls;
