use serde_json::Value;

use super::{put, Metadata};
use crate::model::scan;

pub(super) fn extract(data: &[u8], extension: &str, meta: &mut Metadata) {
    match extension {
        "glb" | "gltf" => gltf(data, extension, meta),
        "obj" => obj(data, meta),
        "fbx" => fbx(data, meta),
        _ => None,
    };
}

fn gltf(data: &[u8], extension: &str, meta: &mut Metadata) -> Option<()> {
    if extension == "glb" {
        put(meta, "glb_version", super::le_u32(data, 4)?);
    }
    let doc = scan::gltf_document(data, extension)?;

    if let Some(version) = doc.pointer("/asset/version").and_then(Value::as_str) {
        put(meta, "gltf_version", version);
    }
    for key in ["nodes", "meshes", "materials", "animations"] {
        let count = doc.get(key).and_then(Value::as_array).map_or(0, Vec::len);
        put(meta, key, count);
    }
    Some(())
}

fn obj(data: &[u8], meta: &mut Metadata) -> Option<()> {
    let text = String::from_utf8_lossy(data);
    let (mut vertices, mut faces) = (0usize, 0usize);
    for line in text.lines() {
        match line.split_whitespace().next() {
            Some("v") => vertices += 1,
            Some("f") => faces += 1,
            _ => {}
        }
    }
    put(meta, "vertices", vertices);
    put(meta, "faces", faces);
    Some(())
}

fn fbx(data: &[u8], meta: &mut Metadata) -> Option<()> {
    let binary = data.starts_with(b"Kaydara FBX Binary");
    put(meta, "binary", binary);
    if binary {
        put(meta, "fbx_version", super::le_u32(data, 23)?);
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(data: &[u8], ext: &str) -> Metadata {
        let mut meta = Metadata::new();
        extract(data, ext, &mut meta);
        meta
    }

    #[test]
    fn obj_counts() {
        let meta = run(b"v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1 2 3\n", "obj");
        assert_eq!(meta["vertices"], 3);
        assert_eq!(meta["faces"], 1);
    }

    #[test]
    fn gltf_counts() {
        let doc = br#"{"asset":{"version":"2.0"},"nodes":[{},{}],"meshes":[{}],"animations":[]}"#;
        let meta = run(doc, "gltf");
        assert_eq!(meta["gltf_version"], "2.0");
        assert_eq!(meta["nodes"], 2);
        assert_eq!(meta["meshes"], 1);
        assert_eq!(meta["materials"], 0);
    }

    #[test]
    fn binary_fbx_version() {
        let mut data = b"Kaydara FBX Binary  \x00\x1a\x00".to_vec();
        data.extend_from_slice(&7400u32.to_le_bytes());
        let meta = run(&data, "fbx");
        assert_eq!(meta["binary"], true);
        assert_eq!(meta["fbx_version"], 7400);
    }
}
