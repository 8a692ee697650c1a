//! Chipview Core - Core types and utilities for the chip model viewer
//!
//! This crate provides the foundational types shared by the asset pipeline
//! and the viewer:
//! - Mathematical primitives (re-exported from glam)
//! - Axis-aligned bounds used for model normalization
//! - RGBA colors for materials and lights
//! - Frame clock for render loop timing

pub mod time;
pub mod types;

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
pub use time::{ClockConfig, FrameClock};
pub use types::{Bounds, Color};
