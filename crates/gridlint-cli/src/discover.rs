use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

/// Collect the dashboard files to lint. Explicit file arguments are taken
/// as-is; directories are walked for `.json` files, filtered through the
/// configured ignore patterns.
pub fn dashboard_files(paths: &[String], ignore_patterns: &[String]) -> Vec<PathBuf> {
    let ignore = build_ignore(ignore_patterns);
    let mut files = Vec::new();

    for path in paths {
        let path = Path::new(path);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        for entry in WalkDir::new(path).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let file = entry.into_path();
            if file.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if ignore.is_match(&file) {
                continue;
            }
            files.push(file);
        }
    }

    files.sort();
    files
}

fn build_ignore(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => log::warn!("gridlint: ignoring bad glob {:?}: {}", pattern, e),
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}
