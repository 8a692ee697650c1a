//! ChipView Viewer - Interactive sessions over the shared chip model
//!
//! Each session owns its surface, camera, lights and render loop, and only
//! references the model cached by `chipview-assets`.

mod camera;
mod config;
mod error;
mod events;
mod lighting;
mod palette;
mod render_loop;
mod scene;
mod session;
mod surface;
mod viewer;

pub use camera::{OrbitConfig, OrbitControls};
pub use config::{DisplayProfile, ViewerConfig};
pub use error::ViewerError;
pub use events::{HostEvent, HostEvents, ListenerId};
pub use lighting::{Light, LightConfig, LightKind, LightingConfig, LightingRig};
pub use palette::{layer_color, mesh_color, Material, LAYER_COLORS};
pub use render_loop::{FrameFn, RenderLoop};
pub use scene::{DrawConstants, SceneMesh, SessionScene};
pub use session::{SessionContext, SessionId, SessionState, ViewerSession};
pub use surface::{
    Container, HeadlessContainer, HeadlessSurface, RenderSurface, SurfaceOptions, SurfaceSize,
    SurfaceSnapshot, SurfaceStats,
};
pub use viewer::ChipViewer;
