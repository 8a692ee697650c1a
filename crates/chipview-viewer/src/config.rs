//! Viewer configuration

use std::time::Duration;

use chipview_core::ClockConfig;
use serde::{Deserialize, Serialize};

use crate::camera::OrbitConfig;
use crate::lighting::LightingConfig;
use crate::surface::{Container, SurfaceOptions};

/// Viewer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub camera: OrbitConfig,
    pub lighting: LightingConfig,
    /// Render loop timing
    pub clock: ClockConfig,
    /// Containers this wide or narrower use the compact profile
    pub compact_max_width: u32,
    /// Touch containers narrower than this use the compact profile
    pub touch_compact_width: u32,
    /// Always use the compact profile
    pub force_compact: bool,
    /// Upper bound on the device pixel ratio outside the compact profile
    pub max_pixel_ratio: f32,
    /// Quiet period after a drag before auto-rotation resumes, in milliseconds
    pub resume_delay_ms: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            camera: OrbitConfig::default(),
            lighting: LightingConfig::default(),
            clock: ClockConfig::default(),
            compact_max_width: 768,
            touch_compact_width: 1024,
            force_compact: false,
            max_pixel_ratio: 1.5,
            resume_delay_ms: 2500,
        }
    }
}

/// Render quality chosen for one container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayProfile {
    pub compact: bool,
    pub options: SurfaceOptions,
}

impl ViewerConfig {
    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }

    /// Pick the render profile for a container
    pub fn profile(&self, container: &dyn Container) -> DisplayProfile {
        let width = container.size().width;
        let compact = self.force_compact
            || width <= self.compact_max_width
            || (container.is_touch() && width < self.touch_compact_width);

        let options = if compact {
            SurfaceOptions {
                antialias: false,
                pixel_ratio: 1.0,
            }
        } else {
            SurfaceOptions {
                antialias: true,
                pixel_ratio: container.device_pixel_ratio().min(self.max_pixel_ratio),
            }
        };

        DisplayProfile { compact, options }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeadlessContainer;

    #[test]
    fn test_desktop_profile() {
        let config = ViewerConfig::default();
        let profile = config.profile(&HeadlessContainer::new(1280, 720).with_pixel_ratio(2.0));
        assert!(!profile.compact);
        assert!(profile.options.antialias);
        assert_eq!(profile.options.pixel_ratio, 1.5);

        let profile = config.profile(&HeadlessContainer::new(1280, 720).with_pixel_ratio(1.25));
        assert_eq!(profile.options.pixel_ratio, 1.25);
    }

    #[test]
    fn test_compact_profile() {
        let config = ViewerConfig::default();
        let narrow = config.profile(&HeadlessContainer::new(768, 900).with_pixel_ratio(3.0));
        assert!(narrow.compact);
        assert!(!narrow.options.antialias);
        assert_eq!(narrow.options.pixel_ratio, 1.0);

        let tablet = config.profile(&HeadlessContainer::new(900, 700).with_touch(true));
        assert!(tablet.compact);

        let forced = ViewerConfig {
            force_compact: true,
            ..Default::default()
        };
        assert!(forced.profile(&HeadlessContainer::new(1920, 1080)).compact);
    }
}
