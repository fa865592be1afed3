//! Artifact collection.
//!
//! Patterns are either paths of existing files or globs matched against
//! paths relative to the base directory. Each collected file becomes one
//! multipart part of the submission.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::api::Artifact;
use crate::error::{Error, Result};

/// Expand `patterns` under `base_dir` into a sorted, de-duplicated file list.
pub fn collect(base_dir: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();
    let mut builder = GlobSetBuilder::new();
    let mut has_globs = false;

    for pattern in patterns {
        let literal = base_dir.join(pattern);
        if literal.is_file() {
            files.insert(literal);
            continue;
        }
        let glob = Glob::new(pattern)
            .map_err(|e| Error::config(format!("invalid artifact pattern {:?}: {}", pattern, e)))?;
        builder.add(glob);
        has_globs = true;
    }

    if has_globs {
        let set = builder
            .build()
            .map_err(|e| Error::config(format!("invalid artifact patterns: {}", e)))?;
        files.extend(walk(base_dir, &set)?);
    }

    Ok(files.into_iter().collect())
}

fn walk(base_dir: &Path, set: &GlobSet) -> Result<Vec<PathBuf>> {
    let mut matched = Vec::new();

    for entry in WalkDir::new(base_dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            // Skip hidden directories, but not the root itself
            e.depth() == 0
                || !(e.file_type().is_dir() && e.file_name().to_string_lossy().starts_with('.'))
        })
    {
        let entry = entry.map_err(|e| Error::config(format!("cannot scan {}: {}", base_dir.display(), e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(base_dir).unwrap_or(path);
        if set.is_match(relative) {
            matched.push(path.to_path_buf());
        }
    }

    Ok(matched)
}

/// Read `files` into multipart parts named `file0`, `file1`, ...
pub fn load(files: &[PathBuf]) -> Result<Vec<Artifact>> {
    files
        .iter()
        .enumerate()
        .map(|(n, path)| {
            let data = std::fs::read(path).map_err(|source| Error::Artifact {
                path: path.clone(),
                source,
            })?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("file{}", n));
            tracing::debug!(path = %path.display(), bytes = data.len(), "loaded artifact");
            Ok(Artifact {
                part_name: format!("file{}", n),
                file_name,
                data: Bytes::from(data),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("build/libs")).unwrap();
        fs::create_dir_all(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join("build/libs/app.jar"), b"jar").unwrap();
        fs::write(dir.path().join("build/libs/app-sources.zip"), b"zip").unwrap();
        fs::write(dir.path().join(".cache/old.jar"), b"stale").unwrap();
        fs::write(dir.path().join("report.xml"), b"<xml/>").unwrap();
        dir
    }

    #[test]
    fn test_collect_globs_and_literals() {
        let dir = fixture();
        let files = collect(
            dir.path(),
            &["**/*.jar".to_string(), "report.xml".to_string()],
        )
        .unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["build/libs/app.jar", "report.xml"]);
    }

    #[test]
    fn test_collect_deduplicates() {
        let dir = fixture();
        let files = collect(
            dir.path(),
            &["build/libs/app.jar".to_string(), "build/**/*.jar".to_string()],
        )
        .unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_collect_nothing_matches() {
        let dir = fixture();
        assert!(collect(dir.path(), &["*.war".to_string()]).unwrap().is_empty());
        assert!(collect(dir.path(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_glob() {
        let dir = fixture();
        let err = collect(dir.path(), &["build/[".to_string()]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_names_parts() {
        let dir = fixture();
        let files = collect(dir.path(), &["**/*.{jar,zip}".to_string()]).unwrap();
        let artifacts = load(&files).unwrap();

        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].part_name, "file0");
        assert_eq!(artifacts[0].file_name, "app-sources.zip");
        assert_eq!(artifacts[1].part_name, "file1");
        assert_eq!(artifacts[1].data, Bytes::from_static(b"jar"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(&[PathBuf::from("/definitely/not/here.jar")]).unwrap_err();
        assert!(matches!(err, Error::Artifact { .. }));
    }
}
