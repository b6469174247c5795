use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre;
use dashmap::DashMap;
use glam::{Vec2, Vec3};
use parking_lot::Mutex;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::convert;
use crate::geometry;
use crate::index::reader::{self, SceneIndex};
use crate::index::{MeshRecord, WorldTransform};
use crate::parser;
use crate::stage::{Prim, Stage};
use crate::value::Value;

/// Expanded triangle soup in the target frame, one entry per corner.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGeometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub triangle_count: usize,
}

#[derive(Debug, Clone)]
pub struct LoadedMesh {
    pub source_path: String,
    pub name: String,
    pub prim_path: String,
    pub transform: WorldTransform,
    pub has_skeleton: bool,
    pub geometry: Arc<MeshGeometry>,
}

// parses each distinct source file once (files load in parallel,
// geometry memoized per `source|mesh`) and fans the shared geometry
// out across instances
pub struct MeshLoader {
    geometry_cache: DashMap<String, Arc<MeshGeometry>, FxBuildHasher>,
}

impl Default for MeshLoader {
    fn default() -> Self {
        Self {
            geometry_cache: DashMap::default(),
        }
    }
}

impl MeshLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_index(
        &self,
        index_path: &Path,
        max_meshes: usize,
    ) -> eyre::Result<Vec<LoadedMesh>> {
        let index = reader::read_index(index_path)?;
        Ok(self.load_records(&index, max_meshes))
    }

    /// `max_meshes == 0` loads everything.
    pub fn load_records(&self, index: &SceneIndex, max_meshes: usize) -> Vec<LoadedMesh> {
        let limit = if max_meshes == 0 {
            index.records.len()
        } else {
            max_meshes.min(index.records.len())
        };
        let records = &index.records[..limit];

        // group by source file, preserving first-seen group order
        let mut group_of: FxHashMap<&str, usize> = FxHashMap::default();
        let mut groups: Vec<(&str, Vec<(usize, &MeshRecord)>)> = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let slot = *group_of
                .entry(record.source_path.as_str())
                .or_insert_with(|| {
                    groups.push((record.source_path.as_str(), Vec::new()));
                    groups.len() - 1
                });
            groups[slot].1.push((i, record));
        }

        let loaded = Mutex::new(Vec::with_capacity(limit));
        groups.par_iter().for_each(|(source, group)| {
            match self.load_group(source, group) {
                Ok(mut meshes) => loaded.lock().append(&mut meshes),
                Err(e) => log::warn!("failed to load source {source}: {e}"),
            }
        });

        let mut all = loaded.into_inner();
        all.sort_by_key(|(i, _)| *i);
        all.into_iter().map(|(_, mesh)| mesh).collect()
    }

    fn load_group(
        &self,
        source: &str,
        group: &[(usize, &MeshRecord)],
    ) -> eyre::Result<Vec<(usize, LoadedMesh)>> {
        let stage = parser::parse_stage_file(Path::new(source))?;

        let mut out = Vec::with_capacity(group.len());
        for &(i, record) in group {
            let key = format!("{}|{}", source, record.name);
            let geometry = if let Some(cached) = self.geometry_cache.get(&key) {
                cached.value().clone()
            } else {
                let Some(prim) = find_mesh_prim(&stage, record) else {
                    log::warn!("mesh {} not found in {source}", record.prim_path);
                    continue;
                };
                let built = Arc::new(build_geometry(prim));
                self.geometry_cache.insert(key, built.clone());
                built
            };

            out.push((
                i,
                LoadedMesh {
                    source_path: record.source_path.clone(),
                    name: record.name.clone(),
                    prim_path: record.prim_path.clone(),
                    transform: record.transform,
                    has_skeleton: record.has_skeleton,
                    geometry,
                },
            ));
        }
        Ok(out)
    }
}

pub fn load_from_index(index_path: &Path, max_meshes: usize) -> eyre::Result<Vec<LoadedMesh>> {
    MeshLoader::new().load_from_index(index_path, max_meshes)
}

fn find_mesh_prim<'a>(stage: &'a Stage, record: &MeshRecord) -> Option<&'a Prim> {
    if let Some(prim) = stage.prim_at_path(&record.prim_path)
        && prim.is_mesh()
    {
        return Some(prim);
    }
    // variant content can shift paths between index and load time;
    // fall back to the mesh name
    (0..stage.prim_count())
        .map(|id| stage.prim(id))
        .find(|p| p.is_mesh() && p.name == record.name)
}

fn build_geometry(prim: &Prim) -> MeshGeometry {
    let points = prim.points().unwrap_or(&[]);
    let counts = prim.face_vertex_counts().unwrap_or(&[]);
    let indices = prim.face_vertex_indices().unwrap_or(&[]);

    let offset = centering_offset(prim, points);

    let (tri_points, tri_slots) = geometry::triangulate(counts, indices);

    let normals_raw = prim
        .attr("primvars:normals")
        .and_then(Value::as_vec3_array)
        .or_else(|| prim.attr("normals").and_then(Value::as_vec3_array));
    let normal_indices = prim
        .attr("primvars:normals:indices")
        .and_then(Value::as_int_array);
    let expanded_normals = match normals_raw {
        Some(values) => geometry::expand_indexed(values, normal_indices),
        None => geometry::flat_normals(points, counts, indices),
    };

    let uv_indices = prim.attr("primvars:st:indices").and_then(Value::as_int_array);
    let expanded_uvs = prim
        .attr("primvars:st")
        .and_then(Value::as_vec2_array)
        .map(|values| geometry::expand_indexed(values, uv_indices))
        .unwrap_or_default();

    let mut positions = Vec::with_capacity(tri_points.len());
    let mut normals = Vec::with_capacity(tri_points.len());
    let mut uvs = Vec::new();
    if !expanded_uvs.is_empty() {
        uvs.reserve(tri_points.len());
    }

    for (corner, &point_index) in tri_points.iter().enumerate() {
        let slot = tri_slots[corner] as usize;

        let p = points
            .get(point_index as usize)
            .copied()
            .unwrap_or(Vec3::ZERO)
            - offset;
        positions.push(convert::point_to_target(p));

        let n = expanded_normals
            .get(slot)
            .or_else(|| expanded_normals.get(point_index as usize))
            .copied()
            .unwrap_or(Vec3::Z);
        let n = convert::normal_to_target(n).normalize_or_zero();
        normals.push(if n == Vec3::ZERO { Vec3::Z } else { n });

        if !expanded_uvs.is_empty() {
            uvs.push(expanded_uvs.get(slot).copied().unwrap_or(Vec2::ZERO));
        }
    }

    MeshGeometry {
        triangle_count: tri_points.len() / 3,
        positions,
        normals,
        uvs,
    }
}

// declared extent, falling back to point bounds for skinned meshes
// without one
fn centering_offset(prim: &Prim, points: &[Vec3]) -> Vec3 {
    let has_skeleton = prim.skeleton_binding().is_some() && prim.has_joint_indices();
    if !geometry::should_center(&prim.name, has_skeleton, prim.extent()) {
        return Vec3::ZERO;
    }
    if let Some((min, max)) = prim.extent() {
        return geometry::center_offset(min, max);
    }
    if points.is_empty() {
        return Vec3::ZERO;
    }
    let mut min = points[0];
    let mut max = points[0];
    for &p in points {
        min = min.min(p);
        max = max.max(p);
    }
    geometry::center_offset(min, max)
}
