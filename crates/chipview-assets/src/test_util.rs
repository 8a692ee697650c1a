//! Test fixtures: an in-memory asset source and a minimal GLB writer.
//!
//! Built for this crate's tests and, with the `test-util` feature, for
//! downstream crates.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::error::FetchError;
use crate::source::{AssetSource, AssetStream};

/// Serves a fixed body from memory and counts how often it is opened.
#[derive(Clone)]
pub struct MemorySource {
    chunks: Arc<Vec<Bytes>>,
    announced: Option<u64>,
    failure: Option<FetchError>,
    panic_opens: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
    gate: Option<Arc<Notify>>,
}

impl MemorySource {
    pub fn chunked(body: Vec<u8>, chunk_size: usize) -> Self {
        let announced = Some(body.len() as u64);
        let chunks = body
            .chunks(chunk_size)
            .map(Bytes::copy_from_slice)
            .collect::<Vec<_>>();
        Self {
            chunks: Arc::new(chunks),
            announced,
            failure: None,
            panic_opens: Arc::new(AtomicUsize::new(0)),
            opens: Arc::new(AtomicUsize::new(0)),
            gate: None,
        }
    }

    pub fn failing(err: FetchError) -> Self {
        Self {
            failure: Some(err),
            ..Self::chunked(Vec::new(), 1)
        }
    }

    pub fn without_length(mut self) -> Self {
        self.announced = None;
        self
    }

    pub fn with_announced_length(mut self, len: u64) -> Self {
        self.announced = Some(len);
        self
    }

    /// The first `count` opens panic, simulating a crashing worker.
    pub fn panicking_opens(self, count: usize) -> Self {
        self.panic_opens.store(count, Ordering::SeqCst);
        self
    }

    /// Opens block until the returned gate is notified.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

struct MemoryStream {
    chunks: Arc<Vec<Bytes>>,
    next: usize,
    announced: Option<u64>,
}

#[async_trait]
impl AssetStream for MemoryStream {
    fn total_len(&self) -> Option<u64> {
        self.announced
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        let chunk = self.chunks.get(self.next).cloned();
        self.next += 1;
        Ok(chunk)
    }
}

#[async_trait]
impl AssetSource for MemorySource {
    async fn open(&self, _url: &str) -> Result<Box<dyn AssetStream>, FetchError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let should_panic = self
            .panic_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_panic {
            panic!("simulated worker crash");
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(Box::new(MemoryStream {
            chunks: self.chunks.clone(),
            next: 0,
            announced: self.announced,
        }))
    }
}

/// Writes a GLB containing the given meshes and nodes.
pub struct GlbBuilder {
    bin: Vec<u8>,
    buffer_views: Vec<Value>,
    accessors: Vec<Value>,
    meshes: Vec<Value>,
    nodes: Vec<Value>,
    roots: Vec<usize>,
}

impl GlbBuilder {
    pub fn new() -> Self {
        Self {
            bin: Vec::new(),
            buffer_views: Vec::new(),
            accessors: Vec::new(),
            meshes: Vec::new(),
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }

    fn push_view(&mut self, data: &[u8]) -> usize {
        let offset = self.bin.len();
        self.bin.extend_from_slice(data);
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        self.buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": data.len(),
        }));
        self.buffer_views.len() - 1
    }

    fn push_vec3(&mut self, values: &[[f32; 3]]) -> usize {
        let data: Vec<u8> = values
            .iter()
            .flat_map(|v| v.iter().flat_map(|c| c.to_le_bytes()))
            .collect();
        let view = self.push_view(&data);
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for v in values {
            for axis in 0..3 {
                min[axis] = min[axis].min(v[axis]);
                max[axis] = max[axis].max(v[axis]);
            }
        }
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": 5126,
            "count": values.len(),
            "type": "VEC3",
            "min": min,
            "max": max,
        }));
        self.accessors.len() - 1
    }

    fn push_indices(&mut self, indices: &[u32]) -> usize {
        let data: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        let view = self.push_view(&data);
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": 5125,
            "count": indices.len(),
            "type": "SCALAR",
        }));
        self.accessors.len() - 1
    }

    pub fn add_mesh(
        &mut self,
        name: &str,
        positions: &[[f32; 3]],
        indices: Option<&[u32]>,
        normals: Option<&[[f32; 3]]>,
    ) -> usize {
        let position = self.push_vec3(positions);
        let mut attributes = json!({ "POSITION": position });
        if let Some(normals) = normals {
            attributes["NORMAL"] = json!(self.push_vec3(normals));
        }
        let mut primitive = json!({ "attributes": attributes, "mode": 4 });
        if let Some(indices) = indices {
            primitive["indices"] = json!(self.push_indices(indices));
        }
        self.meshes.push(json!({ "name": name, "primitives": [primitive] }));
        self.meshes.len() - 1
    }

    pub fn add_node(
        &mut self,
        name: &str,
        mesh: Option<usize>,
        translation: [f32; 3],
        children: Vec<usize>,
    ) -> usize {
        let mut node = json!({ "translation": translation });
        if !name.is_empty() {
            node["name"] = json!(name);
        }
        if let Some(mesh) = mesh {
            node["mesh"] = json!(mesh);
        }
        if !children.is_empty() {
            node["children"] = json!(children);
        }
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn add_root(&mut self, node: usize) {
        self.roots.push(node);
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": self.roots }],
            "nodes": self.nodes,
        });
        if !self.meshes.is_empty() {
            doc["meshes"] = json!(self.meshes);
            doc["accessors"] = json!(self.accessors);
            doc["bufferViews"] = json!(self.buffer_views);
            doc["buffers"] = json!([{ "byteLength": self.bin.len() }]);
        }

        let mut json_chunk = serde_json::to_vec(&doc).unwrap();
        while json_chunk.len() % 4 != 0 {
            json_chunk.push(b' ');
        }

        let mut total = 12 + 8 + json_chunk.len();
        if !self.bin.is_empty() {
            total += 8 + self.bin.len();
        }

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
        out.extend_from_slice(&json_chunk);
        if !self.bin.is_empty() {
            out.extend_from_slice(&(self.bin.len() as u32).to_le_bytes());
            out.extend_from_slice(&0x004E_4942u32.to_le_bytes());
            out.extend_from_slice(&self.bin);
        }
        out
    }
}

/// A single-triangle GLB with one named node.
pub fn triangle_glb(name: &str, translation: [f32; 3]) -> Vec<u8> {
    let mut glb = GlbBuilder::new();
    let mesh = glb.add_mesh(
        name,
        &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        Some(&[0, 1, 2]),
        None,
    );
    let node = glb.add_node(name, Some(mesh), translation, vec![]);
    glb.add_root(node);
    glb.build()
}
