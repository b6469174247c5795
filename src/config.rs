use std::fs;
use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre::{self, Context};
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct SceneIndexConfig {
    skip_patterns: Arc<[String]>,
    binary_suffix: String,
    text_suffix: String,
    geo_marker: String,
    max_depth: usize,
    flush_every_n_meshes: usize,
    skip_files: usize,
    max_files: Option<usize>,
    stage_cache_keep: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct SceneIndexConfigFile {
    pub skip_patterns: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub use_builtin_skip_patterns: bool,
    #[serde(default)]
    pub extra_skip_patterns: Vec<String>,
    pub binary_suffix: Option<String>,
    pub text_suffix: Option<String>,
    pub geo_marker: Option<String>,
    pub max_depth: Option<usize>,
    pub flush_every_n_meshes: Option<usize>,
    #[serde(default)]
    pub skip_files: usize,
    pub max_files: Option<usize>,
    pub stage_cache_keep: Option<usize>,
}

impl Default for SceneIndexConfig {
    fn default() -> Self {
        Self {
            skip_patterns: default_skip_patterns().into(),
            binary_suffix: "usdc".to_string(),
            text_suffix: "usda".to_string(),
            geo_marker: ".geo".to_string(),
            max_depth: 32,
            flush_every_n_meshes: 4096,
            skip_files: 0,
            max_files: None,
            stage_cache_keep: 20,
        }
    }
}

impl SceneIndexConfig {
    pub fn from_toml_str(toml_str: &str) -> eyre::Result<Self> {
        let file_cfg: SceneIndexConfigFile = toml::from_str(toml_str)?;
        Ok(Self::from_file_config(file_cfg))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config: {path:?}"))?;
        Self::from_toml_str(&s).wrap_err_with(|| format!("Failed to parse TOML config: {path:?}"))
    }

    pub fn skip_patterns(&self) -> &[String] {
        &self.skip_patterns
    }

    pub fn binary_suffix(&self) -> &str {
        &self.binary_suffix
    }

    pub fn text_suffix(&self) -> &str {
        &self.text_suffix
    }

    // a `<base>.geo.<text_suffix>` file's root transform is an
    // authoring-origin offset, not scene placement
    pub fn is_geometry_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        name.to_ascii_lowercase()
            .ends_with(&format!("{}.{}", self.geo_marker, self.text_suffix))
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn flush_every_n_meshes(&self) -> usize {
        self.flush_every_n_meshes.max(1)
    }

    pub fn skip_files(&self) -> usize {
        self.skip_files
    }

    // None is unbounded, Some(0) refuses every load
    pub fn max_files(&self) -> Option<usize> {
        self.max_files
    }

    pub fn stage_cache_keep(&self) -> usize {
        self.stage_cache_keep.max(1)
    }

    pub fn with_flush_every_n_meshes(mut self, n: usize) -> Self {
        self.flush_every_n_meshes = n;
        self
    }

    pub fn with_skip_files(mut self, n: usize) -> Self {
        self.skip_files = n;
        self
    }

    pub fn with_max_files(mut self, n: Option<usize>) -> Self {
        self.max_files = n;
        self
    }

    pub fn with_max_depth(mut self, n: usize) -> Self {
        self.max_depth = n;
        self
    }

    fn from_file_config(file_cfg: SceneIndexConfigFile) -> Self {
        let defaults = Self::default();

        let mut skip_patterns = match file_cfg.skip_patterns {
            Some(patterns) => patterns,
            None if file_cfg.use_builtin_skip_patterns => default_skip_patterns(),
            None => Vec::new(),
        };
        skip_patterns.extend(file_cfg.extra_skip_patterns);

        Self {
            skip_patterns: skip_patterns.into(),
            binary_suffix: file_cfg.binary_suffix.unwrap_or(defaults.binary_suffix),
            text_suffix: file_cfg.text_suffix.unwrap_or(defaults.text_suffix),
            geo_marker: file_cfg.geo_marker.unwrap_or(defaults.geo_marker),
            max_depth: file_cfg.max_depth.unwrap_or(defaults.max_depth),
            flush_every_n_meshes: file_cfg
                .flush_every_n_meshes
                .unwrap_or(defaults.flush_every_n_meshes),
            skip_files: file_cfg.skip_files,
            max_files: file_cfg.max_files,
            stage_cache_keep: file_cfg.stage_cache_keep.unwrap_or(defaults.stage_cache_keep),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_skip_patterns() -> Vec<String> {
    vec![
        "/breadcrumbs/",
        "/endpoints/",
        "/audio/",
        "/lighting/",
        "/ui/",
        "/vfx/",
        "/fx/",
        "breadcrumb",
        "endpoint",
        "_audio",
        "_sound",
        "_fx",
        "_vfx",
        "_lighting",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SceneIndexConfig::default();
        assert_eq!(cfg.max_depth(), 32);
        assert_eq!(cfg.skip_files(), 0);
        assert_eq!(cfg.max_files(), None);
        assert_eq!(cfg.stage_cache_keep(), 20);
        assert!(cfg.skip_patterns().contains(&"_audio".to_string()));
    }

    #[test]
    fn test_toml_overrides() {
        let cfg = SceneIndexConfig::from_toml_str(
            r#"
max_depth = 8
flush_every_n_meshes = 16
skip_files = 2
max_files = 100
extra_skip_patterns = ["_debugset"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.max_depth(), 8);
        assert_eq!(cfg.flush_every_n_meshes(), 16);
        assert_eq!(cfg.skip_files(), 2);
        assert_eq!(cfg.max_files(), Some(100));
        assert!(cfg.skip_patterns().contains(&"_debugset".to_string()));
        assert!(cfg.skip_patterns().contains(&"breadcrumb".to_string()));
    }

    #[test]
    fn test_builtin_patterns_can_be_disabled() {
        let cfg = SceneIndexConfig::from_toml_str(
            r#"
use_builtin_skip_patterns = false
extra_skip_patterns = ["_only"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.skip_patterns(), &["_only".to_string()][..]);
    }

    #[test]
    fn test_geometry_file_marker() {
        let cfg = SceneIndexConfig::default();
        assert!(cfg.is_geometry_file(Path::new("/assets/rock.geo.usda")));
        assert!(cfg.is_geometry_file(Path::new("rock.GEO.USDA")));
        assert!(!cfg.is_geometry_file(Path::new("/assets/rock.usda")));
        assert!(!cfg.is_geometry_file(Path::new("/assets/rock.geo.usdc")));
    }
}
