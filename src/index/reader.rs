use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use color_eyre::eyre::{self, Context};
use rustc_hash::FxHashMap;

use super::{MAGIC, MeshRecord, WorldTransform, read_quat, read_string7, read_varint, read_vec3};
use crate::convert;

/// Decoded scene index, records in on-disk order.
#[derive(Debug, Clone)]
pub struct SceneIndex {
    pub version: u64,
    pub sources: Vec<String>,
    pub records: Vec<MeshRecord>,
}

pub fn read_index(path: &Path) -> eyre::Result<SceneIndex> {
    let file = File::open(path)
        .wrap_err_with(|| format!("Failed to open index: {}", path.display()))?;
    let mut r = BufReader::new(file);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        eyre::bail!("not a scene index (bad magic)");
    }
    let version = read_varint(&mut r)?;
    if version != 1 && version != 2 {
        eyre::bail!("unsupported scene index version {version}");
    }

    let source_count = read_varint(&mut r)?;
    let mut sources = Vec::with_capacity(source_count.min(1 << 20) as usize);
    for _ in 0..source_count {
        sources.push(read_string7(&mut r)?);
    }

    let mesh_count = read_varint(&mut r)?;
    let mut records = Vec::with_capacity(mesh_count.min(1 << 20) as usize);
    for _ in 0..mesh_count {
        records.push(read_record(&mut r, version, &sources)?);
    }

    Ok(SceneIndex {
        version,
        sources,
        records,
    })
}

fn read_record<R: Read>(r: &mut R, version: u64, sources: &[String]) -> eyre::Result<MeshRecord> {
    let source_index = read_varint(r)?;
    let Some(source_path) = sources.get(source_index as usize) else {
        eyre::bail!("record source index {source_index} out of range");
    };
    let name = read_string7(r)?;
    let prim_path = read_string7(r)?;
    let mut position = read_vec3(r)?;
    let mut rotation = read_quat(r)?;
    let mut scale = read_vec3(r)?;

    let mut flags = [0u8; 1];
    r.read_exact(&mut flags)?;
    let has_skeleton = flags[0] & 1 != 0;
    let mut extent = if flags[0] & 2 != 0 {
        let min = read_vec3(r)?;
        let max = read_vec3(r)?;
        Some((min, max))
    } else {
        None
    };

    if version == 1 {
        // legacy files store source-frame values
        position = convert::point_to_target(position);
        rotation = convert::quat_to_target(rotation);
        scale = convert::scale_to_target(scale);
        extent = extent.map(|(min, max)| convert::extent_to_target(min, max));
    }

    Ok(MeshRecord {
        source_path: source_path.clone(),
        name,
        prim_path,
        transform: WorldTransform {
            position,
            rotation,
            scale,
        },
        has_skeleton,
        extent,
    })
}

impl SceneIndex {
    pub fn group_by_source_file(&self) -> FxHashMap<&str, Vec<&MeshRecord>> {
        let mut groups: FxHashMap<&str, Vec<&MeshRecord>> = FxHashMap::default();
        for record in &self.records {
            groups
                .entry(record.source_path.as_str())
                .or_default()
                .push(record);
        }
        groups
    }

    // occurrence transforms keyed `source_path|mesh_name`
    pub fn geometry_instances(&self) -> FxHashMap<String, Vec<WorldTransform>> {
        let mut instances: FxHashMap<String, Vec<WorldTransform>> = FxHashMap::default();
        for record in &self.records {
            let key = format!("{}|{}", record.source_path, record.name);
            instances.entry(key).or_default().push(record.transform);
        }
        instances
    }
}
