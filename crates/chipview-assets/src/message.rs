//! Messages exchanged with the background model worker.
//!
//! Only owned buffers and plain scalars cross the boundary. Geometry vectors
//! are moved through the channel, never copied or shared.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, ParseError};
use crate::mesh::{IndexData, Normalization, ParsedMesh, ParsedModel};
use crate::progress::Progress;

/// Work sent to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerRequest {
    /// Fetch and parse the asset at an absolute URL.
    Parse { url: String },
}

/// Events sent back by the worker, in order: any number of `Progress`
/// followed by exactly one of `Done` or `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerMessage {
    Progress(Progress),
    Done(ModelPayload),
    Failed(LoadError),
}

/// One mesh flattened for transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshPayload {
    pub name: String,
    /// Column-major world matrix, normalization included
    pub matrix: [f32; 16],
    pub positions: Vec<f32>,
    pub normals: Option<Vec<f32>>,
    pub indices: Option<IndexData>,
}

/// A parsed model flattened for transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPayload {
    pub meshes: Vec<MeshPayload>,
    pub center_offset: [f32; 3],
    pub scale_factor: f32,
}

impl From<ParsedModel> for ModelPayload {
    fn from(model: ParsedModel) -> Self {
        let normalization = model.normalization();
        let meshes = model
            .into_meshes()
            .into_iter()
            .map(|mesh| MeshPayload {
                name: mesh.name,
                matrix: mesh.transform.to_cols_array(),
                positions: mesh.positions,
                normals: mesh.normals,
                indices: mesh.indices,
            })
            .collect();

        Self {
            meshes,
            center_offset: normalization.center_offset.to_array(),
            scale_factor: normalization.scale_factor,
        }
    }
}

impl ModelPayload {
    /// Rebuild the model on the receiving side without renormalizing.
    pub fn into_model(self) -> Result<ParsedModel, ParseError> {
        let normalization = Normalization {
            center_offset: Vec3::from_array(self.center_offset),
            scale_factor: self.scale_factor,
        };
        let meshes = self
            .meshes
            .into_iter()
            .map(|m| ParsedMesh {
                name: m.name,
                transform: Mat4::from_cols_array(&m.matrix),
                positions: m.positions,
                normals: m.normals,
                indices: m.indices,
            })
            .collect();
        ParsedModel::from_parts(meshes, normalization)
    }

    pub fn byte_size(&self) -> usize {
        self.meshes
            .iter()
            .map(|m| {
                (m.positions.len() + m.normals.as_ref().map_or(0, Vec::len)) * 4
                    + m.indices.as_ref().map_or(0, |i| i.as_bytes().len())
            })
            .sum()
    }
}
