//! Renderer-agnostic model data produced by the parser.

use chipview_core::Bounds;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Edge length of the cube every model is rescaled into.
pub const REFERENCE_SIZE: f32 = 3.0;

/// Storage width of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexWidth {
    U16,
    U32,
}

/// Triangle indices, stored at the narrowest width that fits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexData {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexData {
    /// Pick 16-bit storage unless some index exceeds the 16-bit range.
    pub fn from_u32(indices: Vec<u32>) -> Self {
        if indices.iter().all(|&i| i <= u16::MAX as u32) {
            IndexData::U16(indices.into_iter().map(|i| i as u16).collect())
        } else {
            IndexData::U32(indices)
        }
    }

    pub fn width(&self) -> IndexWidth {
        match self {
            IndexData::U16(_) => IndexWidth::U16,
            IndexData::U32(_) => IndexWidth::U32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexData::U16(v) => v.len(),
            IndexData::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the indices widened to `u32`.
    pub fn iter(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            IndexData::U16(v) => Box::new(v.iter().map(|&i| i as u32)),
            IndexData::U32(v) => Box::new(v.iter().copied()),
        }
    }

    /// Raw bytes of the index buffer, for upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            IndexData::U16(v) => bytemuck::cast_slice(v),
            IndexData::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// One renderable unit of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMesh {
    /// Node or mesh name; may be empty
    pub name: String,
    /// World transform, composed through the node hierarchy
    pub transform: Mat4,
    /// Flat `xyz` vertex coordinates
    pub positions: Vec<f32>,
    /// Flat `xyz` vertex normals, one per vertex
    pub normals: Option<Vec<f32>>,
    /// Triangle indices; `None` means a triangle soup
    pub indices: Option<IndexData>,
}

impl ParsedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.vertex_count() / 3,
        }
    }

    pub fn index_width(&self) -> Option<IndexWidth> {
        self.indices.as_ref().map(IndexData::width)
    }

    /// Bytes of geometry held by this mesh.
    pub fn byte_size(&self) -> usize {
        let floats = self.positions.len() + self.normals.as_ref().map_or(0, Vec::len);
        floats * std::mem::size_of::<f32>()
            + self.indices.as_ref().map_or(0, |i| i.as_bytes().len())
    }

    /// Raw bytes of the position buffer, for upload.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Check the geometry invariants.
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.positions.len() % 3 != 0 {
            return Err(ParseError::InvalidPositions {
                mesh: self.name.clone(),
                len: self.positions.len(),
            });
        }

        if let Some(normals) = &self.normals {
            if normals.len() != self.positions.len() {
                return Err(ParseError::NormalCountMismatch {
                    mesh: self.name.clone(),
                    normals: normals.len(),
                    positions: self.positions.len(),
                });
            }
        }

        if let Some(indices) = &self.indices {
            let vertex_count = self.vertex_count();
            if let Some(index) = indices.iter().find(|&i| i as usize >= vertex_count) {
                return Err(ParseError::IndexOutOfRange {
                    mesh: self.name.clone(),
                    index,
                    vertex_count,
                });
            }
        }

        Ok(())
    }

    /// Fill in normals from topology if the source had none.
    pub fn ensure_normals(&mut self) {
        if self.normals.is_none() {
            self.normals = Some(compute_vertex_normals(&self.positions, self.indices.as_ref()));
        }
    }

    /// Bounds of this mesh after applying its transform.
    pub fn world_bounds(&self) -> Bounds {
        let mut bounds = Bounds::EMPTY;
        bounds.expand_positions(&self.positions, &self.transform);
        bounds
    }
}

/// Compute smooth vertex normals.
///
/// Indexed meshes accumulate area-weighted face normals per shared vertex;
/// triangle soups get flat face normals. Degenerate triangles contribute
/// nothing and isolated vertices keep a zero normal.
pub fn compute_vertex_normals(positions: &[f32], indices: Option<&IndexData>) -> Vec<f32> {
    let vertex_count = positions.len() / 3;
    let vertex = |i: usize| Vec3::new(positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]);
    let mut accum = vec![Vec3::ZERO; vertex_count];

    let mut add_face = |a: usize, b: usize, c: usize| {
        if a >= vertex_count || b >= vertex_count || c >= vertex_count {
            return;
        }
        let (pa, pb, pc) = (vertex(a), vertex(b), vertex(c));
        let face = (pc - pb).cross(pa - pb);
        accum[a] += face;
        accum[b] += face;
        accum[c] += face;
    };

    match indices {
        Some(indices) => {
            let flat: Vec<u32> = indices.iter().collect();
            for tri in flat.chunks_exact(3) {
                add_face(tri[0] as usize, tri[1] as usize, tri[2] as usize);
            }
        }
        None => {
            for tri in 0..vertex_count / 3 {
                add_face(tri * 3, tri * 3 + 1, tri * 3 + 2);
            }
        }
    }

    accum
        .into_iter()
        .flat_map(|n| n.normalize_or_zero().to_array())
        .collect()
}

/// Scale and offset that fit a model into the reference cube.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub center_offset: Vec3,
    pub scale_factor: f32,
}

impl Normalization {
    /// Derive the normalization from the union bounds of the whole model.
    pub fn from_bounds(bounds: &Bounds) -> Self {
        let extent = bounds.max_extent();
        let scale_factor = if extent.is_finite() && extent > f32::EPSILON {
            REFERENCE_SIZE / extent
        } else {
            1.0
        };
        let center = if bounds.is_empty() { Vec3::ZERO } else { bounds.center() };

        Self {
            center_offset: -center * scale_factor,
            scale_factor,
        }
    }

    /// `translate(center_offset) * scale(scale_factor)`
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.center_offset) * Mat4::from_scale(Vec3::splat(self.scale_factor))
    }
}

/// The decoded model: meshes in normalized world space.
///
/// Immutable once built; viewer sessions share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedModel {
    meshes: Vec<ParsedMesh>,
    normalization: Normalization,
}

impl ParsedModel {
    /// Build a model from meshes in source world space.
    ///
    /// Validates every mesh, computes missing normals, derives the
    /// normalization from the union bounds once, and folds it into every
    /// mesh transform.
    pub fn normalize(mut meshes: Vec<ParsedMesh>) -> Result<Self, ParseError> {
        meshes.retain(|m| !m.positions.is_empty());
        if meshes.is_empty() {
            return Err(ParseError::Empty);
        }

        for mesh in &mut meshes {
            mesh.validate()?;
            mesh.ensure_normals();
        }

        let bounds = meshes
            .iter()
            .fold(Bounds::EMPTY, |acc, m| acc.union(&m.world_bounds()));
        let normalization = Normalization::from_bounds(&bounds);
        let matrix = normalization.matrix();
        for mesh in &mut meshes {
            mesh.transform = matrix * mesh.transform;
        }

        Ok(Self {
            meshes,
            normalization,
        })
    }

    /// Reassemble a model whose transforms already include `normalization`.
    pub fn from_parts(
        mut meshes: Vec<ParsedMesh>,
        normalization: Normalization,
    ) -> Result<Self, ParseError> {
        if meshes.is_empty() {
            return Err(ParseError::Empty);
        }
        for mesh in &mut meshes {
            mesh.validate()?;
            mesh.ensure_normals();
        }
        Ok(Self {
            meshes,
            normalization,
        })
    }

    pub fn meshes(&self) -> &[ParsedMesh] {
        &self.meshes
    }

    pub fn into_meshes(self) -> Vec<ParsedMesh> {
        self.meshes
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn center_offset(&self) -> Vec3 {
        self.normalization.center_offset
    }

    pub fn scale_factor(&self) -> f32 {
        self.normalization.scale_factor
    }

    /// Bounds of the normalized model.
    pub fn bounds(&self) -> Bounds {
        self.meshes
            .iter()
            .fold(Bounds::EMPTY, |acc, m| acc.union(&m.world_bounds()))
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(ParsedMesh::vertex_count).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(ParsedMesh::triangle_count).sum()
    }

    pub fn byte_size(&self) -> usize {
        self.meshes.iter().map(ParsedMesh::byte_size).sum()
    }
}
