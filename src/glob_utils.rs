//! Glob pattern matching utilities for path classification

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Compile patterns into a single case-insensitive [`GlobSet`]
///
/// `*` never crosses a `/`; use `**` for that.
pub fn compile_set(patterns: &[&str]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .build()?;
        builder.add(glob);
    }
    builder.build()
}

/// Normalize a repository-relative path for matching
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = path.trim_start_matches("./");
    path.trim_start_matches('/').to_string()
}

/// Check if a repository-relative path matches any glob in the set
pub fn matches(set: &GlobSet, path: &str) -> bool {
    set.is_match(normalize_path(path))
}
