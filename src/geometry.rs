use std::sync::LazyLock;

use glam::Vec3;
use regex::Regex;

/// Fan-triangulate around vertex 0. Returns parallel point-index and
/// face-vertex-slot lists.
pub fn triangulate(face_vertex_counts: &[i32], face_vertex_indices: &[i32]) -> (Vec<u32>, Vec<u32>) {
    let mut point_indices = Vec::new();
    let mut slot_indices = Vec::new();

    let mut base = 0usize;
    for &count in face_vertex_counts {
        let n = count.max(0) as usize;
        if base + n > face_vertex_indices.len() {
            break;
        }
        for i in 1..n.saturating_sub(1) {
            for corner in [0, i, i + 1] {
                point_indices.push(face_vertex_indices[base + corner] as u32);
                slot_indices.push((base + corner) as u32);
            }
        }
        base += n;
    }

    (point_indices, slot_indices)
}

pub fn expand_indexed<T: Copy + Default>(values: &[T], indices: Option<&[i32]>) -> Vec<T> {
    match indices {
        Some(indices) => indices
            .iter()
            .map(|&i| values.get(i as usize).copied().unwrap_or_default())
            .collect(),
        None => values.to_vec(),
    }
}

// one normal per face from the first two edges, repeated per
// face-vertex; degenerate faces get +Z
pub fn flat_normals(
    points: &[Vec3],
    face_vertex_counts: &[i32],
    face_vertex_indices: &[i32],
) -> Vec<Vec3> {
    let mut normals = Vec::with_capacity(face_vertex_indices.len());

    let mut base = 0usize;
    for &count in face_vertex_counts {
        let n = count.max(0) as usize;
        if base + n > face_vertex_indices.len() {
            break;
        }
        let mut normal = Vec3::Z;
        if n >= 3 {
            let p = |i: usize| {
                points
                    .get(face_vertex_indices[base + i] as usize)
                    .copied()
                    .unwrap_or(Vec3::ZERO)
            };
            let candidate = (p(1) - p(0)).cross(p(2) - p(0)).normalize_or_zero();
            if candidate != Vec3::ZERO {
                normal = candidate;
            }
        }
        for _ in 0..n {
            normals.push(normal);
        }
        base += n;
    }

    normals
}

static CENTERED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(polySurfaceShape|pPlaneShape|geoShape)\d*$").unwrap()
});

// skinned meshes always center; export shapes center when their
// declared extent sits more than 10 units off origin on a planar axis
pub fn should_center(name: &str, has_skeleton: bool, extent: Option<(Vec3, Vec3)>) -> bool {
    if has_skeleton {
        return true;
    }
    if !CENTERED_NAME.is_match(name) {
        return false;
    }
    let Some((min, max)) = extent else {
        return false;
    };
    let mid = (min + max) * 0.5;
    mid.x.abs() > 10.0 || mid.y.abs() > 10.0
}

// Z is not centered to preserve ground contact
pub fn center_offset(min: Vec3, max: Vec3) -> Vec3 {
    let mid = (min + max) * 0.5;
    Vec3::new(mid.x, mid.y, 0.0)
}
