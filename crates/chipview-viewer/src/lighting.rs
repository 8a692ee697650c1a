//! Session-local lighting rig

use chipview_core::{Color, Vec3};
use serde::{Deserialize, Serialize};

/// One configured light. Lights without a position are ambient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    /// Colour as 0xRRGGBB
    pub color: u32,
    pub intensity: f32,
    pub position: Option<[f32; 3]>,
}

impl LightConfig {
    pub const fn ambient(color: u32, intensity: f32) -> Self {
        Self {
            color,
            intensity,
            position: None,
        }
    }

    pub const fn directional(color: u32, intensity: f32, position: [f32; 3]) -> Self {
        Self {
            color,
            intensity,
            position: Some(position),
        }
    }
}

/// Lighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient: LightConfig,
    /// Main light; also drives the per-draw shading constants
    pub key: LightConfig,
    pub fill: LightConfig,
    pub back: LightConfig,
    pub bottom: LightConfig,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient: LightConfig::ambient(0xffffff, 1.8),
            key: LightConfig::directional(0xffffff, 3.0, [4.0, 8.0, 5.0]),
            fill: LightConfig::directional(0x88aaff, 1.5, [-5.0, 5.0, -3.0]),
            back: LightConfig::directional(0xffffff, 1.0, [0.0, 3.0, -6.0]),
            bottom: LightConfig::directional(0x6688cc, 0.6, [0.0, -5.0, 0.0]),
        }
    }
}

/// Kind of light in the rig
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Ambient,
    /// Directional light shining from `position` toward the origin
    Directional { position: Vec3 },
}

/// A resolved light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
}

impl Light {
    fn from_config(config: &LightConfig) -> Self {
        let kind = match config.position {
            Some(position) => LightKind::Directional {
                position: Vec3::from(position),
            },
            None => LightKind::Ambient,
        };
        Self {
            kind,
            color: Color::from_hex(config.color),
            intensity: config.intensity,
        }
    }

    /// Unit vector from the origin toward the light, if directional
    pub fn direction(&self) -> Option<Vec3> {
        match self.kind {
            LightKind::Ambient => None,
            LightKind::Directional { position } => Some(position.normalize_or_zero()),
        }
    }
}

/// The five lights every session adds to its own scene
#[derive(Debug, Clone, PartialEq)]
pub struct LightingRig {
    lights: Vec<Light>,
}

impl LightingRig {
    pub fn new(config: &LightingConfig) -> Self {
        let lights = [
            &config.ambient,
            &config.key,
            &config.fill,
            &config.back,
            &config.bottom,
        ]
        .into_iter()
        .map(Light::from_config)
        .collect();
        Self { lights }
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn ambient(&self) -> Light {
        self.lights[0]
    }

    pub fn key(&self) -> Light {
        self.lights[1]
    }
}

impl Default for LightingRig {
    fn default() -> Self {
        Self::new(&LightingConfig::default())
    }
}
