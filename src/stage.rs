use std::path::{Path, PathBuf};

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specifier {
    Def,
    Over,
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpAxis {
    Y,
    Z,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositionArc {
    pub asset: String,
    pub prim_path: Option<String>,
}

// targets are stored verbatim, never dereferenced at parse time
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub targets: Vec<String>,
}

// variants keep source order, the first entry is the selection
// fallback; each variant is a carrier prim in the stage arena
#[derive(Debug, Clone)]
pub struct VariantSet {
    pub name: String,
    pub variants: Vec<(String, usize)>,
}

#[derive(Debug, Clone)]
pub struct Prim {
    pub name: String,
    pub path: String,
    pub type_name: String,
    pub specifier: Specifier,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub attributes: FxHashMap<String, Value>,
    pub metadata: FxHashMap<String, Value>,
    pub references: Vec<CompositionArc>,
    pub payloads: Vec<CompositionArc>,
    pub inherits: Vec<String>,
    pub variant_sets: Vec<VariantSet>,
    pub variant_selections: FxHashMap<String, String>,
    pub relationships: Vec<Relationship>,
    pub api_schemas: Vec<String>,
}

impl Prim {
    pub fn new(name: &str, path: &str, specifier: Specifier) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            type_name: String::new(),
            specifier,
            parent: None,
            children: Vec::new(),
            attributes: FxHashMap::default(),
            metadata: FxHashMap::default(),
            references: Vec::new(),
            payloads: Vec::new(),
            inherits: Vec::new(),
            variant_sets: Vec::new(),
            variant_selections: FxHashMap::default(),
            relationships: Vec::new(),
            api_schemas: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn is_mesh(&self) -> bool {
        self.type_name == "Mesh"
    }

    pub fn is_skeleton(&self) -> bool {
        self.type_name == "Skeleton"
    }

    pub fn points(&self) -> Option<&[Vec3]> {
        self.attr("points")?.as_vec3_array()
    }

    pub fn face_vertex_counts(&self) -> Option<&[i32]> {
        self.attr("faceVertexCounts")?.as_int_array()
    }

    pub fn face_vertex_indices(&self) -> Option<&[i32]> {
        self.attr("faceVertexIndices")?.as_int_array()
    }

    pub fn purpose(&self) -> Option<&str> {
        self.attr("purpose")?.as_token()
    }

    pub fn extent(&self) -> Option<(Vec3, Vec3)> {
        let corners = self.attr("extent")?.as_vec3_array()?;
        if corners.len() < 2 {
            return None;
        }
        Some((corners[0], corners[1]))
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn skeleton_binding(&self) -> Option<&str> {
        self.relationship("skel:skeleton")?
            .targets
            .iter()
            .map(String::as_str)
            .find(|t| !t.is_empty())
    }

    pub fn has_joint_indices(&self) -> bool {
        self.attr("primvars:skel:jointIndices")
            .and_then(Value::as_int_array)
            .is_some_and(|a| !a.is_empty())
    }

    pub fn selected_variant<'a>(&'a self, set: &'a VariantSet) -> Option<&'a str> {
        if let Some(sel) = self.variant_selections.get(&set.name)
            && set.variants.iter().any(|(name, _)| name == sel)
        {
            return Some(sel);
        }
        set.variants.first().map(|(name, _)| name.as_str())
    }
}

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct Stage {
    pub source_path: PathBuf,
    pub documentation: Option<String>,
    pub default_prim: Option<String>,
    pub up_axis: UpAxis,
    pub meters_per_unit: f64,
    pub time_codes_per_second: Option<f64>,
    pub frames_per_second: Option<f64>,
    pub start_time_code: Option<f64>,
    pub end_time_code: Option<f64>,
    pub sub_layers: Vec<String>,
    pub roots: Vec<usize>,
    prims: Vec<Prim>,
    path_map: FxHashMap<String, usize>,
}

impl Stage {
    pub fn new(source_path: &Path) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            documentation: None,
            default_prim: None,
            up_axis: UpAxis::Y,
            meters_per_unit: 0.01,
            time_codes_per_second: None,
            frames_per_second: None,
            start_time_code: None,
            end_time_code: None,
            sub_layers: Vec::new(),
            roots: Vec::new(),
            prims: Vec::new(),
            path_map: FxHashMap::default(),
        }
    }

    pub fn alloc_prim(&mut self, prim: Prim) -> usize {
        let id = self.prims.len();
        self.prims.push(prim);
        id
    }

    pub fn register_path(&mut self, id: usize) {
        let path = self.prims[id].path.clone();
        self.path_map.insert(path, id);
    }

    pub fn prim(&self, id: usize) -> &Prim {
        &self.prims[id]
    }

    pub fn prim_mut(&mut self, id: usize) -> &mut Prim {
        &mut self.prims[id]
    }

    pub fn prim_count(&self) -> usize {
        self.prims.len()
    }

    pub fn prim_id_at_path(&self, path: &str) -> Option<usize> {
        self.path_map.get(path).copied()
    }

    pub fn prim_at_path(&self, path: &str) -> Option<&Prim> {
        self.prim_id_at_path(path).map(|id| self.prim(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_registration() {
        let mut stage = Stage::new(Path::new("a.usda"));
        let root = stage.alloc_prim(Prim::new("Root", "/Root", Specifier::Def));
        stage.register_path(root);
        let child = stage.alloc_prim(Prim::new("Child", "/Root/Child", Specifier::Def));
        stage.prim_mut(child).parent = Some(root);
        stage.prim_mut(root).children.push(child);
        stage.register_path(child);

        assert_eq!(stage.prim_id_at_path("/Root/Child"), Some(child));
        assert_eq!(stage.prim_at_path("/Root").unwrap().name, "Root");
        assert!(stage.prim_at_path("/Missing").is_none());
    }

    #[test]
    fn test_variant_fallback() {
        let mut prim = Prim::new("p", "/p", Specifier::Def);
        let set = VariantSet {
            name: "lod".into(),
            variants: vec![("lod0".into(), 1), ("lod1".into(), 2)],
        };
        assert_eq!(prim.selected_variant(&set), Some("lod0"));

        prim.variant_selections.insert("lod".into(), "lod1".into());
        assert_eq!(prim.selected_variant(&set), Some("lod1"));

        // a selection naming a missing variant falls back to the first
        prim.variant_selections.insert("lod".into(), "lod9".into());
        assert_eq!(prim.selected_variant(&set), Some("lod0"));
    }

    #[test]
    fn test_skeleton_binding() {
        let mut prim = Prim::new("m", "/m", Specifier::Def);
        assert_eq!(prim.skeleton_binding(), None);

        prim.relationships.push(Relationship {
            name: "skel:skeleton".into(),
            targets: vec!["/Rig/Skel".into()],
        });
        assert_eq!(prim.skeleton_binding(), Some("/Rig/Skel"));
    }
}
