//! Best-effort animation and material scanners for the supported model formats.
//!
//! None of these parse a full scene graph. They look for the markers each format uses to
//! name its animations, materials and textures and report what they find.

use std::collections::BTreeMap;

use serde_json::Value;

use super::AnimationDescriptor;
use crate::extract::le_u32;

pub type MaterialMap = BTreeMap<String, Vec<String>>;

pub(crate) const MATERIALS: &str = "materials";
pub(crate) const TEXTURES: &str = "textures";
pub(crate) const LIBRARIES: &str = "libraries";

pub(crate) fn animations(data: &[u8], extension: &str) -> Vec<AnimationDescriptor> {
    match extension {
        "glb" | "gltf" => gltf_document(data, extension)
            .map(|doc| gltf_animations(&doc))
            .unwrap_or_default(),
        "fbx" => fbx_animations(data),
        _ => Vec::new(),
    }
}

pub(crate) fn materials(data: &[u8], extension: &str, include_textures: bool) -> MaterialMap {
    match extension {
        "obj" => obj_materials(data, include_textures),
        "glb" | "gltf" => gltf_document(data, extension)
            .map(|doc| gltf_materials(&doc, include_textures))
            .unwrap_or_default(),
        "fbx" => fbx_materials(data, include_textures),
        _ => MaterialMap::new(),
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

// ============================================================================
// OBJ
// ============================================================================

fn obj_materials(data: &[u8], include_textures: bool) -> MaterialMap {
    let text = String::from_utf8_lossy(data);
    let mut used = Vec::new();
    let mut libraries = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix("usemtl") {
            push_unique(&mut used, name.trim());
        } else if let Some(libs) = line.strip_prefix("mtllib") {
            for lib in libs.split_whitespace() {
                push_unique(&mut libraries, lib);
            }
        }
    }

    let mut out = MaterialMap::new();
    if !used.is_empty() {
        out.insert(MATERIALS.to_string(), used);
    }
    if include_textures && !libraries.is_empty() {
        out.insert(LIBRARIES.to_string(), libraries);
    }
    out
}

// ============================================================================
// glTF / GLB
// ============================================================================

const GLB_HEADER_LEN: usize = 12;
const GLB_CHUNK_JSON: &[u8] = b"JSON";

/// Parses the JSON document of a `.gltf` file or the first chunk of a `.glb` container.
pub(crate) fn gltf_document(data: &[u8], extension: &str) -> Option<Value> {
    let json = if extension == "glb" {
        if !data.starts_with(b"glTF") {
            return None;
        }
        let len = le_u32(data, GLB_HEADER_LEN)? as usize;
        if data.get(GLB_HEADER_LEN + 4..GLB_HEADER_LEN + 8)? != GLB_CHUNK_JSON {
            return None;
        }
        let start = GLB_HEADER_LEN + 8;
        data.get(start..start.checked_add(len)?)?
    } else {
        data
    };

    serde_json::from_slice(json).ok()
}

fn gltf_name(item: &Value, prefix: &str, index: usize) -> String {
    item.get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}_{}", prefix, index))
}

fn gltf_animations(doc: &Value) -> Vec<AnimationDescriptor> {
    let Some(animations) = doc.get("animations").and_then(Value::as_array) else {
        return Vec::new();
    };
    let accessors = doc.get("accessors").and_then(Value::as_array);
    let nodes = doc.get("nodes").and_then(Value::as_array);

    animations
        .iter()
        .enumerate()
        .map(|(i, animation)| {
            let frame_count = animation
                .get("samplers")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|s| s.get("input").and_then(Value::as_u64))
                .filter_map(|input| accessors?.get(input as usize)?.get("count")?.as_u64())
                .max()
                .unwrap_or(0);

            let tracks = animation
                .get("channels")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|channel| {
                    let target = channel.get("target")?;
                    let path = target.get("path")?.as_str()?;
                    let node = target
                        .get("node")
                        .and_then(Value::as_u64)
                        .map(|n| match nodes.and_then(|nodes| nodes.get(n as usize)) {
                            Some(node) => gltf_name(node, "node", n as usize),
                            None => format!("node_{}", n),
                        })
                        .unwrap_or_else(|| "scene".to_string());
                    Some(format!("{}.{}", node, path))
                })
                .collect();

            AnimationDescriptor {
                name: gltf_name(animation, "animation", i),
                frame_count: u32::try_from(frame_count).unwrap_or(u32::MAX),
                tracks,
            }
        })
        .collect()
}

fn gltf_materials(doc: &Value, include_textures: bool) -> MaterialMap {
    let mut out = MaterialMap::new();

    if let Some(materials) = doc.get("materials").and_then(Value::as_array) {
        let names = materials
            .iter()
            .enumerate()
            .map(|(i, m)| gltf_name(m, "material", i))
            .collect::<Vec<_>>();
        if !names.is_empty() {
            out.insert(MATERIALS.to_string(), names);
        }
    }

    if include_textures {
        if let Some(images) = doc.get("images").and_then(Value::as_array) {
            let refs = images
                .iter()
                .enumerate()
                .map(|(i, image)| match image.get("uri").and_then(Value::as_str) {
                    Some(uri) if !uri.starts_with("data:") => uri.to_string(),
                    _ => gltf_name(image, "image", i),
                })
                .collect::<Vec<_>>();
            if !refs.is_empty() {
                out.insert(TEXTURES.to_string(), refs);
            }
        }
    }

    out
}

// ============================================================================
// FBX
// ============================================================================

const ANIMATION_STACK: &[u8] = b"AnimationStack";
const ANIM_STACK_NAME: &[u8] = b"AnimStack::";
const CURVE_NODE_NAME: &[u8] = b"AnimCurveNode::";
const KEY_TIME: &[u8] = b"KeyTime:";

fn find_all<'a>(haystack: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(move |(_, w)| *w == needle)
        .map(|(i, _)| i)
}

/// Reads a name up to the next quote, NUL or line break.
fn read_name(data: &[u8]) -> String {
    let end = data
        .iter()
        .position(|&b| b == b'"' || b == 0 || b == b'\n' || b == b'\r' || b == b',')
        .unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim().to_string()
}

fn names_after(data: &[u8], marker: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    for pos in find_all(data, marker) {
        push_unique(&mut out, &read_name(&data[pos + marker.len()..]));
    }
    out
}

/// Splits the stream into blocks that each start at an `AnimationStack` marker.
fn fbx_animations(data: &[u8]) -> Vec<AnimationDescriptor> {
    let starts: Vec<usize> = find_all(data, ANIMATION_STACK).collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(data.len());
            let block = &data[start..end];

            let name = find_all(block, ANIM_STACK_NAME)
                .next()
                .map(|pos| read_name(&block[pos + ANIM_STACK_NAME.len()..]))
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("AnimationStack_{}", i));

            // ASCII files declare key arrays as `KeyTime: *N {`.
            let frame_count = find_all(block, KEY_TIME)
                .filter_map(|pos| {
                    let rest = &block[pos + KEY_TIME.len()..];
                    let rest = String::from_utf8_lossy(&rest[..rest.len().min(24)]).into_owned();
                    let digits: String = rest
                        .trim_start()
                        .strip_prefix('*')?
                        .chars()
                        .take_while(char::is_ascii_digit)
                        .collect();
                    digits.parse::<u32>().ok()
                })
                .max()
                .unwrap_or(0);

            AnimationDescriptor {
                name,
                frame_count,
                tracks: names_after(block, CURVE_NODE_NAME),
            }
        })
        .collect()
}

fn fbx_materials(data: &[u8], include_textures: bool) -> MaterialMap {
    let mut out = MaterialMap::new();

    let materials = names_after(data, b"Material::");
    if !materials.is_empty() {
        out.insert(MATERIALS.to_string(), materials);
    }
    if include_textures {
        let textures = names_after(data, b"Texture::");
        if !textures.is_empty() {
            out.insert(TEXTURES.to_string(), textures);
        }
    }

    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const CUBE_OBJ: &[u8] = b"# cube\nmtllib cube.mtl\no Cube\n\
v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
usemtl Red\nf 1 2 3\nusemtl Blue\nf 1 3 4\nusemtl Red\n";

    pub(crate) const ASCII_FBX: &[u8] = br#"; FBX 7.4.0 project file
; Kaydara FBX
Objects:  {
    Material: 1, "Material::Steel", "" {
    }
    Texture: 2, "Texture::steel_diffuse", "" {
    }
    AnimationStack: 3, "AnimStack::Walk", "" {
    }
    AnimationCurveNode: 4, "AnimCurveNode::T", "" {
    }
    AnimationCurve: 5, "AnimCurve::", "" {
        KeyTime: *24 {
        }
    }
    AnimationStack: 6, "AnimStack::Run", "" {
    }
    AnimationCurveNode: 7, "AnimCurveNode::R", "" {
    }
}
"#;

    #[test]
    fn obj_usemtl_and_mtllib() {
        let map = obj_materials(CUBE_OBJ, true);
        assert_eq!(map[MATERIALS], vec!["Red", "Blue"]);
        assert_eq!(map[LIBRARIES], vec!["cube.mtl"]);

        let map = obj_materials(CUBE_OBJ, false);
        assert!(!map.contains_key(LIBRARIES));
        assert_eq!(map[MATERIALS].len(), 2);
    }

    #[test]
    fn fbx_animation_blocks() {
        let animations = fbx_animations(ASCII_FBX);
        assert_eq!(animations.len(), 2);
        assert_eq!(animations[0].name, "Walk");
        assert_eq!(animations[0].frame_count, 24);
        assert_eq!(animations[0].tracks, vec!["T"]);
        assert_eq!(animations[1].name, "Run");
        assert_eq!(animations[1].frame_count, 0);
        assert_eq!(animations[1].tracks, vec!["R"]);
    }

    #[test]
    fn fbx_material_names() {
        let map = fbx_materials(ASCII_FBX, true);
        assert_eq!(map[MATERIALS], vec!["Steel"]);
        assert_eq!(map[TEXTURES], vec!["steel_diffuse"]);
        assert!(!fbx_materials(ASCII_FBX, false).contains_key(TEXTURES));
    }

    #[test]
    fn fbx_unnamed_stack() {
        let animations = fbx_animations(b"\x00AnimationStack\x00\x00");
        assert_eq!(animations.len(), 1);
        assert_eq!(animations[0].name, "AnimationStack_0");
    }

    pub(crate) fn glb_bytes(json: &str) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut out = b"glTF".to_vec();
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&((20 + json.len()) as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        out
    }

    pub(crate) const ANIMATED_GLTF: &str = r#"{
        "asset": {"version": "2.0"},
        "nodes": [{"name": "Hips"}, {}],
        "accessors": [{"count": 30}, {"count": 30}, {"count": 45}],
        "animations": [{
            "name": "Idle",
            "samplers": [{"input": 0, "output": 1}, {"input": 2, "output": 1}],
            "channels": [
                {"sampler": 0, "target": {"node": 0, "path": "rotation"}},
                {"sampler": 1, "target": {"node": 1, "path": "translation"}}
            ]
        }, {"samplers": [], "channels": []}],
        "materials": [{"name": "Skin"}, {}],
        "images": [{"uri": "skin.png"}, {"uri": "data:image/png;base64,AAAA"}]
    }"#;

    #[test]
    fn glb_animations_and_materials() {
        let data = glb_bytes(ANIMATED_GLTF);
        let animations = animations(&data, "glb");
        assert_eq!(animations.len(), 2);
        assert_eq!(animations[0].name, "Idle");
        assert_eq!(animations[0].frame_count, 45);
        assert_eq!(animations[0].tracks, vec!["Hips.rotation", "node_1.translation"]);
        assert_eq!(animations[1].name, "animation_1");

        let map = materials(&data, "glb", true);
        assert_eq!(map[MATERIALS], vec!["Skin", "material_1"]);
        assert_eq!(map[TEXTURES], vec!["skin.png", "image_1"]);
    }

    #[test]
    fn oversized_accessor_counts_saturate() {
        let doc: Value = serde_json::from_str(
            r#"{
                "accessors": [{"count": 5000000000}],
                "animations": [{"samplers": [{"input": 0, "output": 0}]}]
            }"#,
        )
        .unwrap();
        assert_eq!(gltf_animations(&doc)[0].frame_count, u32::MAX);
    }

    #[test]
    fn broken_glb_is_empty() {
        let mut data = glb_bytes(ANIMATED_GLTF);
        data[16..20].copy_from_slice(b"BIN\0");
        assert!(animations(&data, "glb").is_empty());
        assert!(materials(&data[..10], "glb", true).is_empty());
    }
}
