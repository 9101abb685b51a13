//! Level-of-detail generation.
//!
//! The "simplification" applied here is a placeholder. It never decimates geometry: OBJ text
//! loses comments and blank lines (plus material directives when textures are excluded) and
//! every other format is carried through byte for byte. Each level is therefore a valid,
//! decompressible copy of the model. The per-level reduction factor only raises the
//! compression level used for that blob.

use tracing::debug;

use crate::compression::{compress_tagged, CompressionConfig};

/// Formats whose reduction factor grows by 0.2 per level; all others grow by 0.3.
const LINE_FAMILY: &[&str] = &["obj", "gltf", "dae", "ply"];

pub(crate) fn reduction_factor(extension: &str, level: u32) -> f32 {
    let step = if LINE_FAMILY.contains(&extension) {
        0.2
    } else {
        0.3
    };
    step * (level + 1) as f32
}

pub(crate) fn simplify(data: &[u8], extension: &str, include_textures: bool) -> Vec<u8> {
    if extension != "obj" {
        return data.to_vec();
    }

    let mut out = Vec::with_capacity(data.len());
    for line in data.split(|&b| b == b'\n') {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() || trimmed.starts_with(b"#") {
            continue;
        }
        if !include_textures && (trimmed.starts_with(b"usemtl") || trimmed.starts_with(b"mtllib")) {
            continue;
        }
        out.extend_from_slice(trimmed);
        out.push(b'\n');
    }
    out
}

/// Builds `levels` tagged, compressed blobs, level 0 first.
pub(crate) fn generate(
    data: &[u8],
    extension: &str,
    levels: u32,
    include_textures: bool,
    compression: &CompressionConfig,
) -> std::io::Result<Vec<Vec<u8>>> {
    (0..levels)
        .map(|level| {
            let factor = reduction_factor(extension, level);
            let simplified = simplify(data, extension, include_textures);
            let boost = (factor * 10.0).round() as i32;
            let blob = compress_tagged(
                &simplified,
                compression.compression,
                compression.level(boost),
            )?;

            debug!(
                %extension,
                level,
                factor,
                raw = simplified.len(),
                compressed = blob.len(),
                "generated LOD"
            );
            Ok(blob)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{decompress_tagged, Compression};

    const OBJ: &[u8] = b"# exported\nmtllib a.mtl\n\nv 0 0 0\nv 1 0 0\nv 0 1 0\n  usemtl Red\nf 1 2 3\n";

    #[test]
    fn factors_grow_linearly() {
        assert!((reduction_factor("obj", 0) - 0.2).abs() < 1e-6);
        assert!((reduction_factor("obj", 2) - 0.6).abs() < 1e-6);
        assert!((reduction_factor("fbx", 1) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn obj_keeps_geometry() {
        let out = simplify(OBJ, "obj", true);
        assert_eq!(
            out,
            b"mtllib a.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl Red\nf 1 2 3\n"
        );

        let out = simplify(OBJ, "obj", false);
        assert_eq!(out, b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
    }

    #[test]
    fn other_formats_pass_through() {
        let data = b"glTF\x02\x00\x00\x00";
        assert_eq!(simplify(data, "glb", false), data);
    }

    #[test]
    fn stored_levels_are_plain() {
        let config = CompressionConfig::new(Compression::Stored);
        let levels = generate(OBJ, "obj", 2, true, &config).unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0], levels[1]);
        assert_eq!(levels[0][0], Compression::Stored.id());
        assert_eq!(&levels[0][1..], simplify(OBJ, "obj", true).as_slice());
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn compressed_levels_decompress() {
        let levels = generate(OBJ, "obj", 3, true, &CompressionConfig::default()).unwrap();
        for blob in &levels {
            assert_eq!(blob[0], Compression::Zstd.id());
            assert_eq!(
                decompress_tagged(blob).unwrap(),
                simplify(OBJ, "obj", true)
            );
        }
    }
}
