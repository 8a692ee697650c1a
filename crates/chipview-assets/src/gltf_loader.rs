use std::collections::HashSet;

use glam::Mat4;
use gltf::mesh::Mode;
use tracing::debug;

use crate::error::ParseError;
use crate::fetch::RawAsset;
use crate::mesh::{IndexData, ParsedMesh, ParsedModel};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_HEADER_LEN: usize = 12;
const MAX_NODE_DEPTH: usize = 256;

/// Parse a downloaded asset into a normalized model.
///
/// Consumes the raw buffer; it is dropped once decoding finishes.
pub fn parse_asset(raw: RawAsset) -> Result<ParsedModel, ParseError> {
    parse_model(raw.as_bytes())
}

/// Parse a glTF 2.0 document (`.glb` or embedded `.gltf`) into a normalized
/// model. Synchronous and CPU-bound; callers keep it off interactive threads.
pub fn parse_model(bytes: &[u8]) -> Result<ParsedModel, ParseError> {
    check_format(bytes)?;

    let gltf::Gltf { document, blob } =
        gltf::Gltf::from_slice(bytes).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let buffers = gltf::import_buffers(&document, None, blob)
        .map_err(|e| ParseError::Malformed(e.to_string()))?;

    let mut meshes = Vec::new();
    let roots: Vec<gltf::Node> = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().collect(),
        None => {
            // No scene list: every node that is nobody's child is a root.
            let children: HashSet<usize> = document
                .nodes()
                .flat_map(|n| n.children().map(|c| c.index()).collect::<Vec<_>>())
                .collect();
            document.nodes().filter(|n| !children.contains(&n.index())).collect()
        }
    };

    for node in roots {
        collect_node(&node, Mat4::IDENTITY, &buffers, 0, &mut meshes)?;
    }

    debug!("glTF: {} triangle meshes extracted", meshes.len());
    ParsedModel::normalize(meshes)
}

fn check_format(bytes: &[u8]) -> Result<(), ParseError> {
    if bytes.starts_with(GLB_MAGIC) {
        if bytes.len() < GLB_HEADER_LEN {
            return Err(ParseError::Truncated { len: bytes.len() });
        }
        let declared = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        if declared > bytes.len() {
            return Err(ParseError::Truncated { len: bytes.len() });
        }
        return Ok(());
    }

    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => Ok(()),
        _ if bytes.len() < GLB_HEADER_LEN => Err(ParseError::Truncated { len: bytes.len() }),
        _ => Err(ParseError::UnrecognizedFormat {
            magic: bytes[..4].to_vec(),
        }),
    }
}

fn collect_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    depth: usize,
    out: &mut Vec<ParsedMesh>,
) -> Result<(), ParseError> {
    if depth > MAX_NODE_DEPTH {
        return Err(ParseError::Malformed(format!(
            "node hierarchy deeper than {} levels",
            MAX_NODE_DEPTH
        )));
    }

    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let name = node
            .name()
            .or_else(|| mesh.name())
            .unwrap_or_default()
            .to_string();

        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                debug!("Skipping {:?} primitive in mesh '{}'", primitive.mode(), name);
                continue;
            }

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let Some(positions) = reader.read_positions() else {
                debug!("Skipping primitive without positions in mesh '{}'", name);
                continue;
            };
            let positions: Vec<f32> = positions.flatten().collect();

            let normals: Option<Vec<f32>> = reader.read_normals().map(|n| n.flatten().collect());

            let indices: Option<IndexData> = reader
                .read_indices()
                .map(|idx| IndexData::from_u32(idx.into_u32().collect()));

            out.push(ParsedMesh {
                name: name.clone(),
                transform: world,
                positions,
                normals,
                indices,
            });
        }
    }

    for child in node.children() {
        collect_node(&child, world, buffers, depth + 1, out)?;
    }

    Ok(())
}
