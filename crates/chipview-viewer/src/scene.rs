//! Per-session scene: the lighting rig plus a non-owning reference to the
//! shared model

use std::sync::Arc;

use chipview_assets::ParsedModel;
use chipview_core::{Mat4, Vec3};

use crate::lighting::LightingRig;
use crate::palette::Material;

/// Per-draw shading constants handed to the render surface
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawConstants {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub key_direction: [f32; 4], // xyz = direction, w = intensity
    pub key_color: [f32; 4],     // xyz = color, w = ambient intensity
    pub base_color: [f32; 4],    // xyz = color, w = shininess
    pub specular: [f32; 4],      // xyz = color, w = 1.0 if double sided
}

impl DrawConstants {
    pub fn new(
        model: Mat4,
        view: Mat4,
        projection: Mat4,
        rig: &LightingRig,
        material: &Material,
    ) -> Self {
        let key = rig.key();
        let key_direction = key.direction().unwrap_or(Vec3::Y);
        let ambient = rig.ambient();

        Self {
            model: model.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            key_direction: [key_direction.x, key_direction.y, key_direction.z, key.intensity],
            key_color: [key.color.r, key.color.g, key.color.b, ambient.intensity],
            base_color: [
                material.color.r,
                material.color.g,
                material.color.b,
                material.shininess,
            ],
            specular: [
                material.specular.r,
                material.specular.g,
                material.specular.b,
                if material.double_sided { 1.0 } else { 0.0 },
            ],
        }
    }
}

/// Session-local wrapper around one shared mesh
#[derive(Debug, Clone)]
pub struct SceneMesh {
    /// Index into the model's mesh list
    pub index: usize,
    pub transform: Mat4,
    pub material: Material,
}

/// What one session renders
pub struct SessionScene {
    rig: LightingRig,
    model: Option<Arc<ParsedModel>>,
    meshes: Vec<SceneMesh>,
}

impl SessionScene {
    pub fn new(rig: LightingRig) -> Self {
        Self {
            rig,
            model: None,
            meshes: Vec::new(),
        }
    }

    pub fn rig(&self) -> &LightingRig {
        &self.rig
    }

    /// Add the shared model. Materials are session-local; geometry is not copied.
    pub fn attach(&mut self, model: Arc<ParsedModel>) {
        self.meshes = model
            .meshes()
            .iter()
            .enumerate()
            .map(|(index, mesh)| SceneMesh {
                index,
                transform: mesh.transform,
                material: Material::for_mesh(&mesh.name, index),
            })
            .collect();
        self.model = Some(model);
    }

    /// Remove the shared model from this scene, leaving the model itself intact
    pub fn detach(&mut self) -> Option<Arc<ParsedModel>> {
        self.meshes.clear();
        self.model.take()
    }

    pub fn model(&self) -> Option<&Arc<ParsedModel>> {
        self.model.as_ref()
    }

    pub fn meshes(&self) -> &[SceneMesh] {
        &self.meshes
    }

    /// One set of draw constants per attached mesh
    pub fn draw_constants(&self, view: Mat4, projection: Mat4) -> Vec<DrawConstants> {
        self.meshes
            .iter()
            .map(|mesh| {
                DrawConstants::new(mesh.transform, view, projection, &self.rig, &mesh.material)
            })
            .collect()
    }
}
