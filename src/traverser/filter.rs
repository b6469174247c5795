use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

pub trait PathFilter {
    fn should_skip_path(&self, path: &str) -> bool;
}

// case-insensitive substring match; catches helper sub-scenes without
// excluding material variants that merely contain `light`
pub struct SubstringSkipFilter {
    patterns: Vec<String>,
}

impl SubstringSkipFilter {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| p.to_ascii_lowercase()).collect(),
        }
    }
}

impl PathFilter for SubstringSkipFilter {
    fn should_skip_path(&self, path: &str) -> bool {
        let lower = path.to_ascii_lowercase();
        self.patterns.iter().any(|p| lower.contains(p.as_str()))
    }
}

// distinct-file accounting for the skip_files / max_files caps; files
// get a 1-based index in discovery order
pub struct FileGate {
    discovered: FxHashMap<PathBuf, usize>,
    skip_files: usize,
    max_files: Option<usize>,
}

impl FileGate {
    pub fn new(skip_files: usize, max_files: Option<usize>) -> Self {
        Self {
            discovered: FxHashMap::default(),
            skip_files,
            max_files,
        }
    }

    // false when the file cap refuses a new file; already-discovered
    // files always pass
    pub fn admit(&mut self, path: &Path) -> bool {
        if self.discovered.contains_key(path) {
            return true;
        }
        if let Some(max) = self.max_files {
            let counted = self.discovered.len().saturating_sub(self.skip_files);
            if counted >= max {
                return false;
            }
        }
        let index = self.discovered.len() + 1;
        self.discovered.insert(path.to_path_buf(), index);
        true
    }

    pub fn emits(&self, path: &Path) -> bool {
        self.discovered
            .get(path)
            .is_some_and(|&index| index > self.skip_files)
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered.len()
    }
}
