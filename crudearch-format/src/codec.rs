//! Container encoding: the magic header followed by a pretty-printed JSON body.
//!
//! ```text
//! CRUDARCHv1{
//!   "files": { "<name>": { "type": "<ext>", "content": "<base64>" } },
//!   "3d_metadata": { "<model id>": { "lod": { "0": "<base64>" }, "animations": [], "materials": {} } }
//! }
//! ```

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::header::{split_header, write_header};
use crate::model::{AnimationDescriptor, MaterialMap, ModelRecord};

#[derive(Debug, Serialize, Deserialize)]
struct Body {
    #[serde(with = "ordered")]
    files: Vec<(String, FileEntry)>,
    #[serde(rename = "3d_metadata", default, skip_serializing_if = "BTreeMap::is_empty")]
    models: BTreeMap<String, ModelEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    #[serde(rename = "type")]
    kind: String,
    content: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ModelEntry {
    #[serde(default)]
    lod: BTreeMap<u32, String>,
    #[serde(default)]
    animations: Vec<AnimationDescriptor>,
    #[serde(default)]
    materials: MaterialMap,
}

/// A file as it sits in the container, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredFile {
    pub(crate) name: String,
    pub(crate) kind: String,
    pub(crate) data: Vec<u8>,
}

#[derive(Debug, Default)]
pub(crate) struct Container {
    pub(crate) files: Vec<StoredFile>,
    pub(crate) models: Vec<(String, ModelRecord)>,
}

pub(crate) fn encode<'a, F, M>(files: F, models: M) -> Result<Vec<u8>>
where
    F: IntoIterator<Item = (&'a str, &'a str, &'a [u8])>,
    M: IntoIterator<Item = (&'a str, &'a ModelRecord)>,
{
    let body = Body {
        files: files
            .into_iter()
            .map(|(name, kind, data)| {
                let entry = FileEntry {
                    kind: kind.to_string(),
                    content: STANDARD.encode(data),
                };
                (name.to_string(), entry)
            })
            .collect(),
        models: models
            .into_iter()
            .map(|(id, record)| {
                let entry = ModelEntry {
                    lod: record
                        .lod
                        .iter()
                        .map(|(level, blob)| (*level, STANDARD.encode(blob)))
                        .collect(),
                    animations: record.animations.clone(),
                    materials: record.materials.clone(),
                };
                (id.to_string(), entry)
            })
            .collect(),
    };

    let mut out = Vec::new();
    write_header(&mut out)?;
    serde_json::to_writer_pretty(&mut out, &body)
        .map_err(|e| Error::invalid_format(format!("cannot encode body: {}", e)))?;

    tracing::debug!(
        files = body.files.len(),
        models = body.models.len(),
        bytes = out.len(),
        "encoded container"
    );
    Ok(out)
}

pub(crate) fn decode(data: &[u8]) -> Result<Container> {
    let body = split_header(data)?;
    let body: Body = serde_json::from_slice(body)
        .map_err(|e| Error::invalid_format(format!("malformed body: {}", e)))?;

    let files = body
        .files
        .into_iter()
        .map(|(name, entry)| {
            let data = base64_field(&entry.content, &name)?;
            Ok(StoredFile {
                name,
                kind: entry.kind,
                data,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let models = body
        .models
        .into_iter()
        .map(|(id, entry)| {
            let lod = entry
                .lod
                .into_iter()
                .map(|(level, blob)| {
                    let context = format!("{} LOD {}", id, level);
                    Ok((level, base64_field(&blob, &context)?))
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
            let record = ModelRecord {
                lod,
                animations: entry.animations,
                materials: entry.materials,
            };
            Ok((id, record))
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        files = files.len(),
        models = models.len(),
        bytes = data.len(),
        "decoded container"
    );
    Ok(Container { files, models })
}

fn base64_field(value: &str, context: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| Error::invalid_format(format!("bad base64 in `{}`: {}", context, e)))
}

/// A JSON object read and written as a `Vec` of pairs, so entry order survives.
mod ordered {
    use std::fmt;
    use std::marker::PhantomData;

    use serde::de::{MapAccess, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(items: &[(String, T)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_map(items.iter().map(|(k, v)| (k, v)))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        struct Pairs<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for Pairs<T> {
            type Value = Vec<(String, T)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of named entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(pair) = map.next_entry()? {
                    out.push(pair);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(Pairs(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::MAGIC_HEADER;

    #[test]
    fn body_layout() {
        let files = [
            ("b.txt", "txt", b"hi".as_slice()),
            ("a.bin", "bin", b"\x00\xff".as_slice()),
        ];
        let out = encode(files, std::iter::empty()).unwrap();
        assert!(out.starts_with(MAGIC_HEADER));

        let json: serde_json::Value = serde_json::from_slice(&out[MAGIC_HEADER.len()..]).unwrap();
        assert_eq!(json["files"]["b.txt"]["type"], "txt");
        assert_eq!(json["files"]["b.txt"]["content"], "aGk=");
        assert!(json.get("3d_metadata").is_none());

        let container = decode(&out).unwrap();
        let names: Vec<_> = container.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.bin"]);
        assert_eq!(container.files[1].data, b"\x00\xff");
    }

    #[test]
    fn models_round_trip() {
        let mut record = ModelRecord::default();
        record.lod.insert(0, b"blob0".to_vec());
        record.lod.insert(10, b"blob10".to_vec());
        record.animations.push(AnimationDescriptor::new("Wave", 3));
        record
            .materials
            .insert("materials".to_string(), vec!["Red".to_string()]);

        let out = encode(std::iter::empty(), [("cube_obj", &record)]).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out[MAGIC_HEADER.len()..]).unwrap();
        assert_eq!(json["3d_metadata"]["cube_obj"]["lod"]["10"], "YmxvYjEw");

        let container = decode(&out).unwrap();
        assert_eq!(container.models, vec![("cube_obj".to_string(), record)]);
    }

    #[test]
    fn rejects_bad_bodies() {
        let mut data = MAGIC_HEADER.to_vec();
        data.extend_from_slice(b"{\"files\": ");
        assert!(matches!(decode(&data), Err(Error::InvalidFormat { .. })));

        let mut data = MAGIC_HEADER.to_vec();
        data.extend_from_slice(br#"{"files": {"a.txt": {"type": "txt", "content": "!!"}}}"#);
        assert!(matches!(decode(&data), Err(Error::InvalidFormat { .. })));

        assert!(matches!(decode(b"{\"files\": {}}"), Err(Error::InvalidFormat { .. })));
    }
}
