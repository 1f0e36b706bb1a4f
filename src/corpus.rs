//! Corpus discovery: walk the image root and list the files to index.
//!
//! Files are matched by extension (case-insensitive) and filtered by
//! exclude globs relative to the root. The result is sorted by relative
//! path so item IDs are the same on every run over the same tree.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

use crate::config::CorpusConfig;

/// One discovered image.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusItem {
    pub path: PathBuf,
    /// Path relative to the corpus root, `/`-separated.
    pub relative: String,
    /// Seconds into the source video, when the name is `frame_HH_MM_SS_mmm`.
    pub timestamp: Option<f64>,
}

static FRAME_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"frame_(\d{2})_(\d{2})_(\d{2})_(\d{3})").expect("valid frame pattern")
});

/// Parse a `frame_HH_MM_SS_mmm` file name into seconds.
pub fn frame_timestamp(name: &str) -> Option<f64> {
    let caps = FRAME_NAME.captures(name)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let (h, m, s, ms) = (field(1)?, field(2)?, field(3)?, field(4)?);
    Some(f64::from(h * 3600 + m * 60 + s) + f64::from(ms) / 1000.0)
}

pub fn scan_corpus(config: &CorpusConfig) -> Result<Vec<CorpusItem>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/.*/**".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let extensions: Vec<String> = config
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    let mut items = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }

        if !has_extension(path, &extensions) {
            continue;
        }

        let timestamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(frame_timestamp);

        items.push(CorpusItem {
            path: path.to_path_buf(),
            relative: rel_str,
            timestamp,
        });
    }

    // Sort for deterministic IDs
    items.sort_by(|a, b| a.relative.cmp(&b.relative));

    Ok(items)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config(root: &Path) -> CorpusConfig {
        CorpusConfig {
            root: root.to_path_buf(),
            extensions: vec!["png".into(), "jpg".into()],
            exclude_globs: vec!["skip/**".into()],
            follow_symlinks: false,
        }
    }

    #[test]
    fn test_frame_timestamp() {
        assert_eq!(frame_timestamp("frame_00_01_02_500.jpg"), Some(62.5));
        assert_eq!(frame_timestamp("frame_01_00_00_000.png"), Some(3600.0));
        assert_eq!(frame_timestamp("cover.png"), None);
        assert_eq!(frame_timestamp("frame_1_2_3_4.png"), None);
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::create_dir_all(root.join("skip")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("b/frame_00_00_10_000.PNG"), b"x").unwrap();
        fs::write(root.join("a.jpg"), b"x").unwrap();
        fs::write(root.join("notes.txt"), b"x").unwrap();
        fs::write(root.join("skip/c.png"), b"x").unwrap();
        fs::write(root.join(".cache/d.png"), b"x").unwrap();

        let items = scan_corpus(&config(root)).unwrap();
        let rel: Vec<&str> = items.iter().map(|i| i.relative.as_str()).collect();
        assert_eq!(rel, vec!["a.jpg", "b/frame_00_00_10_000.PNG"]);
        assert_eq!(items[0].timestamp, None);
        assert_eq!(items[1].timestamp, Some(10.0));
    }

    #[test]
    fn test_missing_root() {
        let cfg = config(Path::new("/nonexistent/frames"));
        assert!(scan_corpus(&cfg).is_err());
    }
}
