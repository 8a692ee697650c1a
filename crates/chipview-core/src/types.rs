//! Core types used throughout the chip viewer

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// An empty box; expanding it by any point yields that point
    pub const EMPTY: Bounds = Bounds {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create bounds from explicit corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Whether no point has been added yet
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow the box to contain a point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grow the box to contain every `xyz` triple of a flat position buffer,
    /// transformed by `transform`
    pub fn expand_positions(&mut self, positions: &[f32], transform: &Mat4) {
        for p in positions.chunks_exact(3) {
            self.expand(transform.transform_point3(Vec3::new(p[0], p[1], p[2])));
        }
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Center point of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Extent along each axis
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Largest extent along any axis
    pub fn max_extent(&self) -> f32 {
        self.size().max_element()
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// RGBA color with floating point components (0.0 to 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    /// Create a color from RGB values (alpha = 1.0)
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from RGBA values
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from a hex value (0xRRGGBB)
    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xFF) as f32 / 255.0;
        let g = ((hex >> 8) & 0xFF) as f32 / 255.0;
        let b = (hex & 0xFF) as f32 / 255.0;
        Self::rgb(r, g, b)
    }

    /// Convert back to a 0xRRGGBB value (alpha dropped)
    pub fn to_hex(&self) -> u32 {
        let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    /// Scale the RGB channels by an intensity, keeping alpha
    pub fn scaled(&self, intensity: f32) -> Color {
        Color::rgba(self.r * intensity, self.g * intensity, self.b * intensity, self.a)
    }

    /// Convert to an array [r, g, b, a]
    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_expand_and_measure() {
        let mut bounds = Bounds::EMPTY;
        assert!(bounds.is_empty());
        assert_eq!(bounds.size(), Vec3::ZERO);

        bounds.expand(Vec3::new(-1.0, 0.0, 2.0));
        bounds.expand(Vec3::new(3.0, 4.0, 2.0));
        assert!(!bounds.is_empty());
        assert_eq!(bounds.center(), Vec3::new(1.0, 2.0, 2.0));
        assert_eq!(bounds.size(), Vec3::new(4.0, 4.0, 0.0));
        assert_eq!(bounds.max_extent(), 4.0);
    }

    #[test]
    fn test_bounds_expand_positions_applies_transform() {
        let mut bounds = Bounds::EMPTY;
        let positions = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let transform = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        bounds.expand_positions(&positions, &transform);
        assert_eq!(bounds.min, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(11.0, 1.0, 1.0));
    }

    #[test]
    fn test_bounds_union() {
        let a = Bounds::new(Vec3::ZERO, Vec3::ONE);
        let b = Bounds::new(Vec3::splat(-2.0), Vec3::splat(0.5));
        let u = a.union(&b);
        assert_eq!(u.min, Vec3::splat(-2.0));
        assert_eq!(u.max, Vec3::ONE);
        assert_eq!(Bounds::EMPTY.union(&a), a);
    }

    #[test]
    fn test_color_from_hex() {
        let color = Color::from_hex(0xFF8000);
        assert!((color.r - 1.0).abs() < 0.01);
        assert!((color.g - 0.5).abs() < 0.01);
        assert!((color.b - 0.0).abs() < 0.01);
        assert_eq!(color.to_hex(), 0xFF8000);
    }
}
