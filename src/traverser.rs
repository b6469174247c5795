mod filter;

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use color_eyre::eyre::{self, Context};
use glam::Mat4;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::SceneIndexConfig;
use crate::convert;
use crate::index::writer::{IndexSummary, IndexWriter};
use crate::index::{MeshRecord, WorldTransform};
use crate::parser;
use crate::stage::{CompositionArc, Prim, Stage};
use crate::utils;
use crate::xform;

pub use filter::{FileGate, PathFilter, SubstringSkipFilter};

pub trait ProgressCallback {
    fn on_progress(&self, files: u64, meshes: u64);
}

impl<F> ProgressCallback for F
where
    F: Fn(u64, u64),
{
    fn on_progress(&self, files: u64, meshes: u64) {
        self(files, meshes)
    }
}

/// Returning `Ok(false)` halts further emission cleanly.
pub trait FlushSink {
    fn on_flush(&mut self, records: &[MeshRecord]) -> eyre::Result<bool>;
}

impl<F> FlushSink for F
where
    F: FnMut(&[MeshRecord]) -> eyre::Result<bool>,
{
    fn on_flush(&mut self, records: &[MeshRecord]) -> eyre::Result<bool> {
        self(records)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TraversalReport {
    pub files_visited: usize,
    pub meshes_emitted: u64,
    pub prims_visited: u64,
    pub skinned_meshes: usize,
    pub halted: bool,
}

pub struct SceneTraverserBuilder {
    config: SceneIndexConfig,
    filter: Option<Box<dyn PathFilter>>,
}

impl Default for SceneTraverserBuilder {
    fn default() -> Self {
        Self {
            config: SceneIndexConfig::default(),
            filter: None,
        }
    }
}

impl SceneTraverserBuilder {
    pub fn with_config(mut self, config: SceneIndexConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_filter(mut self, filter: Box<dyn PathFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn build(self) -> SceneTraverser {
        let filter = self
            .filter
            .unwrap_or_else(|| Box::new(SubstringSkipFilter::new(self.config.skip_patterns())));
        SceneTraverser {
            gate: FileGate::new(self.config.skip_files(), self.config.max_files()),
            config: self.config,
            filter,
            cache: StageCache::default(),
            active: FxHashSet::default(),
            skeletons: FxHashMap::default(),
            pending_skinned: Vec::new(),
            buffered: Vec::new(),
            visited_prims: Vec::new(),
            meshes_emitted: 0,
            prims_visited: 0,
            skinned_count: 0,
            halted: false,
        }
    }
}

struct PendingSkinned {
    record: MeshRecord,
    binding_key: String,
}

pub struct SceneTraverser {
    config: SceneIndexConfig,
    filter: Box<dyn PathFilter>,
    cache: StageCache,
    active: FxHashSet<PathBuf>,
    gate: FileGate,
    skeletons: FxHashMap<String, Mat4>,
    pending_skinned: Vec<PendingSkinned>,
    buffered: Vec<MeshRecord>,
    visited_prims: Vec<String>,
    meshes_emitted: u64,
    prims_visited: u64,
    skinned_count: usize,
    halted: bool,
}

struct WalkCtx<'a> {
    sink: &'a mut dyn FlushSink,
    progress: &'a dyn ProgressCallback,
}

impl SceneTraverser {
    pub fn builder() -> SceneTraverserBuilder {
        SceneTraverserBuilder::default()
    }

    /// Prims visited since the last flush, as `source|path`.
    pub fn visited_prims(&self) -> &[String] {
        &self.visited_prims
    }

    pub fn traverse<S: FlushSink>(
        &mut self,
        root_path: &Path,
        sink: &mut S,
    ) -> eyre::Result<TraversalReport> {
        fn no_op_progress(_files: u64, _meshes: u64) {}
        self.traverse_with_progress(root_path, sink, no_op_progress)
    }

    pub fn traverse_with_progress<S, P>(
        &mut self,
        root_path: &Path,
        sink: &mut S,
        progress: P,
    ) -> eyre::Result<TraversalReport>
    where
        S: FlushSink,
        P: ProgressCallback,
    {
        self.reset();
        let mut ctx = WalkCtx {
            sink,
            progress: &progress,
        };

        let root_abs = std::path::absolute(root_path)
            .wrap_err_with(|| format!("Failed to resolve root stage: {}", root_path.display()))?;
        log::debug!("traversal root: {}", root_abs.display());
        self.enter_layer(&root_abs, 0, &mut ctx)?;

        // promote skinned meshes; bind-pose resolution is not applied,
        // the accumulated world transform and the flag are recorded
        let pending = mem::take(&mut self.pending_skinned);
        self.skinned_count = pending.len();
        for p in pending {
            if !self.skeletons.contains_key(&p.binding_key) {
                log::debug!("unresolved skeleton binding: {}", p.binding_key);
            }
            self.emit(p.record, &mut ctx)?;
        }

        if !self.halted && !self.buffered.is_empty() {
            self.flush(&mut ctx)?;
        }

        Ok(TraversalReport {
            files_visited: self.gate.discovered_count(),
            meshes_emitted: self.meshes_emitted,
            prims_visited: self.prims_visited,
            skinned_meshes: self.skinned_count,
            halted: self.halted,
        })
    }

    fn reset(&mut self) {
        self.cache.clear();
        self.active.clear();
        self.gate = FileGate::new(self.config.skip_files(), self.config.max_files());
        self.skeletons.clear();
        self.pending_skinned.clear();
        self.buffered.clear();
        self.visited_prims.clear();
        self.meshes_emitted = 0;
        self.prims_visited = 0;
        self.skinned_count = 0;
        self.halted = false;
    }

    // sub-layers recurse first, then the root prims walk under an
    // identity parent transform
    fn enter_layer(&mut self, path: &Path, depth: usize, ctx: &mut WalkCtx<'_>) -> eyre::Result<()> {
        if self.halted || depth > self.config.max_depth() {
            return Ok(());
        }
        if depth > 0 && self.filter.should_skip_path(&path.to_string_lossy()) {
            return Ok(());
        }
        let Some(stage) = self.load_stage(path) else {
            return Ok(());
        };
        if !self.active.insert(path.to_path_buf()) {
            return Ok(());
        }

        let dir = path.parent().unwrap_or(Path::new("")).to_path_buf();
        for layer in &stage.sub_layers {
            let resolved = self.resolve_asset(&dir, layer);
            self.enter_layer(&resolved, depth + 1, ctx)?;
        }

        let skip_local = self.config.is_geometry_file(path);
        for &root in &stage.roots {
            self.process_prim(&stage, root, Mat4::IDENTITY, depth, skip_local, ctx)?;
        }

        self.active.remove(path);
        Ok(())
    }

    fn process_prim(
        &mut self,
        stage: &Arc<Stage>,
        id: usize,
        parent_transform: Mat4,
        depth: usize,
        skip_local_transform: bool,
        ctx: &mut WalkCtx<'_>,
    ) -> eyre::Result<()> {
        if self.halted || depth > self.config.max_depth() {
            return Ok(());
        }
        let prim = stage.prim(id);

        let local = if skip_local_transform {
            Mat4::IDENTITY
        } else {
            xform::local_transform(prim)
        };
        let world = parent_transform * local;

        let source_dir = stage
            .source_path
            .parent()
            .unwrap_or(Path::new(""))
            .to_path_buf();

        for arc in prim.references.iter().chain(prim.payloads.iter()) {
            self.load_reference(arc, world, &source_dir, depth + 1, ctx)?;
        }

        for set in &prim.variant_sets {
            let Some(chosen) = prim.selected_variant(set) else {
                continue;
            };
            let Some(&(_, carrier_id)) = set.variants.iter().find(|(name, _)| name == chosen)
            else {
                continue;
            };
            let carrier = stage.prim(carrier_id);
            for arc in carrier.references.iter().chain(carrier.payloads.iter()) {
                self.load_reference(arc, world, &source_dir, depth + 1, ctx)?;
            }
            for &child in &carrier.children {
                self.process_prim(stage, child, world, depth, false, ctx)?;
            }
        }

        self.prims_visited += 1;
        self.visited_prims
            .push(format!("{}|{}", stage.source_path.display(), prim.path));

        if prim.is_skeleton() {
            let key = format!("{}|{}", stage.source_path.display(), prim.path);
            self.skeletons.insert(key, world);
        }

        if self.is_renderable_mesh(prim) && self.gate.emits(&stage.source_path) {
            let record = build_record(prim, &stage.source_path, world);
            if prim.skeleton_binding().is_some() && prim.has_joint_indices() {
                let binding_key = format!(
                    "{}|{}",
                    stage.source_path.display(),
                    prim.skeleton_binding().unwrap_or_default()
                );
                let mut record = record;
                record.has_skeleton = true;
                self.pending_skinned.push(PendingSkinned {
                    record,
                    binding_key,
                });
            } else {
                self.emit(record, ctx)?;
            }
        }

        for &child in &prim.children {
            self.process_prim(stage, child, world, depth, false, ctx)?;
        }

        Ok(())
    }

    fn is_renderable_mesh(&self, prim: &Prim) -> bool {
        prim.is_mesh()
            && prim.purpose() != Some("guide")
            && prim.points().is_some_and(|p| !p.is_empty())
            && prim.face_vertex_indices().is_some_and(|i| !i.is_empty())
    }

    fn load_reference(
        &mut self,
        arc: &CompositionArc,
        parent_transform: Mat4,
        source_dir: &Path,
        depth: usize,
        ctx: &mut WalkCtx<'_>,
    ) -> eyre::Result<()> {
        if self.halted {
            return Ok(());
        }
        let resolved = self.resolve_asset(source_dir, &arc.asset);
        if self.filter.should_skip_path(&resolved.to_string_lossy()) {
            return Ok(());
        }
        if depth > self.config.max_depth() {
            return Ok(());
        }
        let Some(stage) = self.load_stage(&resolved) else {
            return Ok(());
        };
        if !self.active.insert(resolved.clone()) {
            // reference loop, do not re-enter
            return Ok(());
        }

        let skip_local = self.config.is_geometry_file(&resolved);
        match &arc.prim_path {
            Some(inner) => {
                if let Some(id) = stage.prim_id_at_path(inner) {
                    self.process_prim(&stage, id, parent_transform, depth, skip_local, ctx)?;
                }
            }
            None => {
                for &root in &stage.roots {
                    self.process_prim(&stage, root, parent_transform, depth, skip_local, ctx)?;
                }
            }
        }

        self.active.remove(&resolved);
        Ok(())
    }

    fn resolve_asset(&self, source_dir: &Path, asset: &str) -> PathBuf {
        let asset = asset.strip_prefix("./").unwrap_or(asset);
        let rewritten = rewrite_binary_suffix(
            asset,
            self.config.binary_suffix(),
            self.config.text_suffix(),
        );
        utils::resolve_relative(source_dir, &rewritten)
    }

    fn load_stage(&mut self, path: &Path) -> Option<Arc<Stage>> {
        if let Some(stage) = self.cache.get(path) {
            return Some(stage);
        }
        if !self.gate.admit(path) {
            log::debug!("file cap reached, not loading {}", path.display());
            return None;
        }
        match parser::parse_stage_file(path) {
            Ok(stage) => {
                let stage = Arc::new(stage);
                self.cache.insert(path, stage.clone());
                Some(stage)
            }
            Err(e) => {
                log::warn!("failed to load stage {}: {e}", path.display());
                None
            }
        }
    }

    fn emit(&mut self, record: MeshRecord, ctx: &mut WalkCtx<'_>) -> eyre::Result<()> {
        if self.halted {
            return Ok(());
        }
        self.buffered.push(record);
        self.meshes_emitted += 1;
        ctx.progress
            .on_progress(self.gate.discovered_count() as u64, self.meshes_emitted);
        if self.buffered.len() >= self.config.flush_every_n_meshes() {
            self.flush(ctx)?;
        }
        Ok(())
    }

    fn flush(&mut self, ctx: &mut WalkCtx<'_>) -> eyre::Result<()> {
        if self.buffered.is_empty() {
            return Ok(());
        }
        if ctx.sink.on_flush(&self.buffered)? {
            self.buffered.clear();
            self.cache.trim(self.config.stage_cache_keep());
            self.visited_prims.clear();
        } else {
            self.halted = true;
        }
        Ok(())
    }
}

fn build_record(prim: &Prim, source: &Path, world: Mat4) -> MeshRecord {
    let (position, rotation, scale) = convert::decompose_to_target(world);
    MeshRecord {
        source_path: source.to_string_lossy().into_owned(),
        name: prim.name.clone(),
        prim_path: prim.path.clone(),
        transform: WorldTransform {
            position,
            rotation,
            scale,
        },
        has_skeleton: false,
        extent: prim
            .extent()
            .map(|(min, max)| convert::extent_to_target(min, max)),
    }
}

fn rewrite_binary_suffix(asset: &str, binary: &str, text: &str) -> String {
    let dotted = format!(".{binary}");
    if asset.len() > dotted.len()
        && asset[asset.len() - dotted.len()..].eq_ignore_ascii_case(&dotted)
    {
        format!("{}.{}", &asset[..asset.len() - dotted.len()], text)
    } else {
        asset.to_string()
    }
}

// ---- memoizing stage cache ----

#[derive(Default)]
struct StageCache {
    stages: FxHashMap<PathBuf, Arc<Stage>>,
    recency: Vec<PathBuf>,
}

impl StageCache {
    fn clear(&mut self) {
        self.stages.clear();
        self.recency.clear();
    }

    fn get(&mut self, path: &Path) -> Option<Arc<Stage>> {
        let stage = self.stages.get(path)?.clone();
        self.touch(path);
        Some(stage)
    }

    fn insert(&mut self, path: &Path, stage: Arc<Stage>) {
        self.stages.insert(path.to_path_buf(), stage);
        self.touch(path);
    }

    fn touch(&mut self, path: &Path) {
        if let Some(pos) = self.recency.iter().position(|p| p == path) {
            self.recency.remove(pos);
        }
        self.recency.push(path.to_path_buf());
    }

    fn trim(&mut self, keep: usize) {
        while self.recency.len() > keep {
            let evicted = self.recency.remove(0);
            self.stages.remove(&evicted);
        }
    }
}

// ---- entry point ----

pub fn build_index(
    input_stage: &Path,
    output_path: &Path,
) -> eyre::Result<(TraversalReport, IndexSummary)> {
    fn no_op_progress(_files: u64, _meshes: u64) {}
    build_index_with_config(
        input_stage,
        output_path,
        SceneIndexConfig::default(),
        no_op_progress,
    )
}

pub fn build_index_with_config<P: ProgressCallback>(
    input_stage: &Path,
    output_path: &Path,
    config: SceneIndexConfig,
    progress: P,
) -> eyre::Result<(TraversalReport, IndexSummary)> {
    let temp_dir = PathBuf::from(format!("{}.shards", output_path.display()));
    let mut writer = IndexWriter::create(output_path, &temp_dir)?;

    let mut traverser = SceneTraverser::builder().with_config(config).build();
    let mut sink = |records: &[MeshRecord]| -> eyre::Result<bool> {
        writer.spill(records)?;
        Ok(true)
    };
    let report = traverser.traverse_with_progress(input_stage, &mut sink, progress)?;

    let summary = writer.finalize()?;
    log::debug!(
        "indexed {} meshes from {} files into {}",
        summary.record_count,
        report.files_visited,
        output_path.display()
    );
    Ok((report, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};
    use std::fs;

    fn write_stage(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text).unwrap();
        path
    }

    fn run(root: &Path, config: SceneIndexConfig) -> (Vec<MeshRecord>, TraversalReport) {
        let mut out: Vec<MeshRecord> = Vec::new();
        let mut sink = |records: &[MeshRecord]| -> eyre::Result<bool> {
            out.extend_from_slice(records);
            Ok(true)
        };
        let mut traverser = SceneTraverser::builder().with_config(config).build();
        let report = traverser.traverse(root, &mut sink).unwrap();
        drop(sink);
        (out, report)
    }

    const TRIANGLE: &str = r#"
    point3f[] points = [(1,2,3)]
    int[] faceVertexCounts = [3]
    int[] faceVertexIndices = [0,0,0]
"#;

    #[test]
    fn test_minimal_stage() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!("#usda 1.0\ndef Mesh \"m\" {{{TRIANGLE}}}\n"),
        );

        let (records, report) = run(&root, SceneIndexConfig::default());
        assert_eq!(records.len(), 1);
        assert_eq!(report.meshes_emitted, 1);
        let rec = &records[0];
        assert_eq!(rec.name, "m");
        assert_eq!(rec.prim_path, "/m");
        assert_eq!(rec.transform.position, Vec3::ZERO);
        assert!(rec.transform.rotation.angle_between(Quat::IDENTITY) < 1e-5);
        assert_eq!(rec.transform.scale, Vec3::ONE);
        assert!(!rec.has_skeleton);
        assert!(rec.extent.is_none());
    }

    #[test]
    fn test_world_position_converted() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!(
                r#"def Xform "a" {{
    double3 xformOp:translate = (10, 20, 30)
    token[] xformOpOrder = ["xformOp:translate"]
    def Mesh "m" {{{TRIANGLE}}}
}}
"#
            ),
        );

        let (records, _) = run(&root, SceneIndexConfig::default());
        assert_eq!(records.len(), 1);
        assert!((records[0].transform.position - Vec3::new(20.0, -10.0, 30.0)).length() < 1e-5);
    }

    #[test]
    fn test_variant_fallback_first_inserted() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!(
                r#"def Xform "a" {{
    variantSet "lod" = {{
        "lod0" {{
            def Mesh "hi" {{{TRIANGLE}}}
        }}
        "lod1" {{
            def Mesh "lo" {{{TRIANGLE}}}
        }}
    }}
}}
"#
            ),
        );

        let (records, _) = run(&root, SceneIndexConfig::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "hi");
    }

    #[test]
    fn test_variant_recorded_selection() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!(
                r#"def Xform "a" (
    variants = {{
        string lod = "lod1"
    }}
) {{
    variantSet "lod" = {{
        "lod0" {{
            def Mesh "hi" {{{TRIANGLE}}}
        }}
        "lod1" {{
            def Mesh "lo" {{{TRIANGLE}}}
        }}
    }}
}}
"#
            ),
        );

        let (records, _) = run(&root, SceneIndexConfig::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "lo");
    }

    #[test]
    fn test_reference_with_prim_path() {
        let dir = tempfile::tempdir().unwrap();
        write_stage(
            dir.path(),
            "child.usda",
            &format!(
                r#"def Xform "a" {{
    double3 xformOp:translate = (100, 0, 0)
    token[] xformOpOrder = ["xformOp:translate"]
    def Mesh "b" {{{TRIANGLE}}}
}}
def Mesh "other" {{{TRIANGLE}}}
"#
            ),
        );
        let root = write_stage(
            dir.path(),
            "root.usda",
            r#"def Xform "anchor" (
    references = @./child.usda@</a/b>
) {
    double3 xformOp:translate = (0, 0, 5)
    token[] xformOpOrder = ["xformOp:translate"]
}
"#,
        );

        let (records, _) = run(&root, SceneIndexConfig::default());
        // only /a/b is processed, /other and /a's transform are not
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "b");
        assert!((records[0].transform.position - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn test_reference_default_processes_all_roots() {
        let dir = tempfile::tempdir().unwrap();
        write_stage(
            dir.path(),
            "props.usda",
            &format!(
                "def Mesh \"a\" {{{TRIANGLE}}}\ndef Mesh \"b\" {{{TRIANGLE}}}\n"
            ),
        );
        let root = write_stage(
            dir.path(),
            "root.usda",
            "def Xform \"x\" (\n    references = @./props.usda@\n) {}\n",
        );

        let (records, _) = run(&root, SceneIndexConfig::default());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "a");
        assert_eq!(records[1].name, "b");
    }

    #[test]
    fn test_skip_filter_blocks_reference() {
        let dir = tempfile::tempdir().unwrap();
        write_stage(
            dir.path(),
            "_audio/amb.usda",
            &format!("def Mesh \"speaker\" {{{TRIANGLE}}}\n"),
        );
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!(
                "def Xform \"x\" (\n    references = @./_audio/amb.usda@\n) {{}}\ndef Mesh \"keep\" {{{TRIANGLE}}}\n"
            ),
        );

        let (records, _) = run(&root, SceneIndexConfig::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "keep");
    }

    #[test]
    fn test_geometry_file_root_transform_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_stage(
            dir.path(),
            "asset.geo.usda",
            &format!(
                r#"def Xform "geo" {{
    double3 xformOp:translate = (999, 999, 999)
    token[] xformOpOrder = ["xformOp:translate"]
    def Mesh "m" {{{TRIANGLE}}}
}}
"#
            ),
        );
        let root = write_stage(
            dir.path(),
            "root.usda",
            r#"def Xform "x" (
    references = @./asset.geo.usda@
) {
    double3 xformOp:translate = (0, 1, 0)
    token[] xformOpOrder = ["xformOp:translate"]
}
"#,
        );

        let (records, _) = run(&root, SceneIndexConfig::default());
        assert_eq!(records.len(), 1);
        // the geo root's authoring offset is dropped, the parent world
        // transform applies directly
        assert!(
            (records[0].transform.position - convert::point_to_target(Vec3::new(0.0, 1.0, 0.0)))
                .length()
                < 1e-5
        );
    }

    #[test]
    fn test_binary_suffix_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        write_stage(
            dir.path(),
            "child.usda",
            &format!("def Mesh \"m\" {{{TRIANGLE}}}\n"),
        );
        let root = write_stage(
            dir.path(),
            "root.usda",
            "def Xform \"x\" (\n    references = @./child.usdc@\n) {}\n",
        );

        let (records, _) = run(&root, SceneIndexConfig::default());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_reference_cycle_terminates() {
        let dir = tempfile::tempdir().unwrap();
        write_stage(
            dir.path(),
            "a.usda",
            &format!(
                "def Xform \"x\" (\n    references = @./b.usda@\n) {{}}\ndef Mesh \"am\" {{{TRIANGLE}}}\n"
            ),
        );
        write_stage(
            dir.path(),
            "b.usda",
            &format!(
                "def Xform \"y\" (\n    references = @./a.usda@\n) {{}}\ndef Mesh \"bm\" {{{TRIANGLE}}}\n"
            ),
        );

        let (records, report) = run(&dir.path().join("a.usda"), SceneIndexConfig::default());
        assert!(!report.halted);
        // a enters b, b cannot re-enter a; each mesh appears once
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "bm");
        assert_eq!(records[1].name, "am");
    }

    #[test]
    fn test_max_files_zero_emits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!("def Mesh \"m\" {{{TRIANGLE}}}\n"),
        );

        let config = SceneIndexConfig::default().with_max_files(Some(0));
        let (records, report) = run(&root, config);
        assert!(records.is_empty());
        assert_eq!(report.meshes_emitted, 0);
    }

    #[test]
    fn test_skip_files_drops_early_discoveries() {
        let dir = tempfile::tempdir().unwrap();
        write_stage(
            dir.path(),
            "child.usda",
            &format!("def Mesh \"late\" {{{TRIANGLE}}}\n"),
        );
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!(
                "def Mesh \"early\" {{{TRIANGLE}}}\ndef Xform \"x\" (\n    references = @./child.usda@\n) {{}}\n"
            ),
        );

        let config = SceneIndexConfig::default().with_skip_files(1);
        let (records, _) = run(&root, config);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "late");
    }

    #[test]
    fn test_sublayers_processed_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_stage(
            dir.path(),
            "layer1.usda",
            &format!("def Mesh \"first\" {{{TRIANGLE}}}\n"),
        );
        write_stage(
            dir.path(),
            "layer2.usda",
            &format!("def Mesh \"second\" {{{TRIANGLE}}}\n"),
        );
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!(
                "#usda 1.0\n(\n    subLayers = [@./layer1.usda@, @./layer2.usda@]\n)\ndef Mesh \"own\" {{{TRIANGLE}}}\n"
            ),
        );

        let (records, report) = run(&root, SceneIndexConfig::default());
        assert_eq!(report.files_visited, 3);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "own"]);
    }

    #[test]
    fn test_guide_and_empty_meshes_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!(
                r#"def Mesh "helper" {{{TRIANGLE}    uniform token purpose = "guide"
}}
def Mesh "empty" {{
    point3f[] points = []
    int[] faceVertexCounts = []
    int[] faceVertexIndices = []
}}
def Mesh "real" {{{TRIANGLE}}}
"#
            ),
        );

        let (records, _) = run(&root, SceneIndexConfig::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "real");
    }

    #[test]
    fn test_skinned_meshes_promoted_last_with_flag() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!(
                r#"def Skeleton "skel" {{}}
def Mesh "arm" {{{TRIANGLE}    rel skel:skeleton = </skel>
    int[] primvars:skel:jointIndices = [0, 0, 0]
}}
def Mesh "plain" {{{TRIANGLE}}}
"#
            ),
        );

        let (records, report) = run(&root, SceneIndexConfig::default());
        assert_eq!(records.len(), 2);
        assert_eq!(report.skinned_meshes, 1);
        assert_eq!(records[0].name, "plain");
        assert_eq!(records[1].name, "arm");
        assert!(records[1].has_skeleton);
        assert!(!records[0].has_skeleton);
    }

    #[test]
    fn test_pre_order_within_stage() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!(
                r#"def Xform "g" {{
    def Mesh "a" {{{TRIANGLE}}}
    def Xform "inner" {{
        def Mesh "b" {{{TRIANGLE}}}
    }}
    def Mesh "c" {{{TRIANGLE}}}
}}
def Mesh "d" {{{TRIANGLE}}}
"#
            ),
        );

        let (records, _) = run(&root, SceneIndexConfig::default());
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_halt_on_falsy_flush() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!(
                "def Mesh \"a\" {{{TRIANGLE}}}\ndef Mesh \"b\" {{{TRIANGLE}}}\ndef Mesh \"c\" {{{TRIANGLE}}}\n"
            ),
        );

        let mut flushed = 0usize;
        let mut sink = |records: &[MeshRecord]| -> eyre::Result<bool> {
            flushed += records.len();
            Ok(false)
        };
        let config = SceneIndexConfig::default().with_flush_every_n_meshes(1);
        let mut traverser = SceneTraverser::builder().with_config(config).build();
        let report = traverser.traverse(&root, &mut sink).unwrap();
        drop(sink);

        assert!(report.halted);
        assert_eq!(flushed, 1);
        assert_eq!(report.meshes_emitted, 1);
    }

    #[test]
    fn test_flush_granularity_does_not_change_index_bytes() {
        let dir = tempfile::tempdir().unwrap();
        write_stage(
            dir.path(),
            "child.usda",
            &format!("def Mesh \"c1\" {{{TRIANGLE}}}\ndef Mesh \"c2\" {{{TRIANGLE}}}\n"),
        );
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!(
                "def Xform \"x\" (\n    references = @./child.usda@\n) {{}}\ndef Mesh \"own\" {{{TRIANGLE}}}\n"
            ),
        );

        let out_small = dir.path().join("small.idx");
        let out_large = dir.path().join("large.idx");
        fn no_op(_: u64, _: u64) {}
        build_index_with_config(
            &root,
            &out_small,
            SceneIndexConfig::default().with_flush_every_n_meshes(1),
            no_op,
        )
        .unwrap();
        build_index_with_config(
            &root,
            &out_large,
            SceneIndexConfig::default().with_flush_every_n_meshes(1_000_000),
            no_op,
        )
        .unwrap();

        assert_eq!(fs::read(&out_small).unwrap(), fs::read(&out_large).unwrap());
    }

    #[test]
    fn test_missing_reference_logged_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!(
                "def Xform \"x\" (\n    references = @./missing.usda@\n) {{}}\ndef Mesh \"m\" {{{TRIANGLE}}}\n"
            ),
        );

        let (records, _) = run(&root, SceneIndexConfig::default());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_extent_recorded_in_target_frame() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_stage(
            dir.path(),
            "root.usda",
            &format!(
                r#"def Mesh "m" {{{TRIANGLE}    float3[] extent = [(-1, -2, -3), (1, 2, 3)]
}}
"#
            ),
        );

        let (records, _) = run(&root, SceneIndexConfig::default());
        let (min, max) = records[0].extent.unwrap();
        assert_eq!(min, Vec3::new(-2.0, -1.0, -3.0));
        assert_eq!(max, Vec3::new(2.0, 1.0, 3.0));
    }
}
