//! Path-based file classification
//!
//! Categories are decided from the path alone, in a fixed precedence:
//! test, config, priority, ignore, then normal.

use super::language::{detect_language_for_path, is_function_oriented};
use crate::glob_utils;
use crate::types::{Category, ChunkStrategy, Classification};
use anyhow::{Context, Result};
use globset::GlobSet;

const TEST_PATTERNS: &[&str] = &[
    "**/test/**",
    "**/tests/**",
    "**/__tests__/**",
    "**/__mocks__/**",
    "**/spec/**",
    "**/testing/**",
    "**/*.test.*",
    "**/*.spec.*",
    "**/*_test.*",
    "**/*_spec.*",
    "**/test_*",
    "**/*Test.java",
    "**/*Tests.cs",
];

const CONFIG_PATTERNS: &[&str] = &[
    "**/.*",
    "**/*config*",
    "**/*config*/**",
    "**/*.json",
    "**/*.yml",
    "**/*.yaml",
    "**/*.ini",
    "**/*.toml",
    "**/*.cfg",
    "**/*.conf",
    "**/*.properties",
];

const PRIORITY_PATTERNS: &[&str] = &[
    "**/index.*",
    "**/main.*",
    "**/app.*",
    "**/core/**",
    "**/main/**",
];

const IGNORE_PATTERNS: &[&str] = &[
    "**/node_modules/**",
    "**/bower_components/**",
    "**/vendor/**",
    "**/dist/**",
    "**/build/**",
    "**/target/**",
    "**/out/**",
    "**/coverage/**",
    "**/__pycache__/**",
    "**/.next/**",
    "**/*.min.js",
    "**/*.min.css",
    "**/*.map",
    "**/*.bundle.js",
    "**/*.pyc",
    "**/*.lock",
    "**/*-lock.*",
];

/// Assigns language, category and an initial chunking hint to a path
pub struct FileClassifier {
    test: GlobSet,
    config: GlobSet,
    priority: GlobSet,
    ignore: GlobSet,
}

impl FileClassifier {
    pub fn new() -> Result<Self> {
        Ok(Self {
            test: glob_utils::compile_set(TEST_PATTERNS).context("Invalid test patterns")?,
            config: glob_utils::compile_set(CONFIG_PATTERNS).context("Invalid config patterns")?,
            priority: glob_utils::compile_set(PRIORITY_PATTERNS)
                .context("Invalid priority patterns")?,
            ignore: glob_utils::compile_set(IGNORE_PATTERNS).context("Invalid ignore patterns")?,
        })
    }

    pub fn classify(&self, path: &str) -> Classification {
        let language = detect_language_for_path(path);
        let category = self.category(path);
        let initial_strategy = if is_function_oriented(language) {
            ChunkStrategy::FunctionLevel
        } else {
            ChunkStrategy::Hybrid
        };

        Classification {
            language: language.to_string(),
            category,
            initial_strategy,
        }
    }

    pub fn category(&self, path: &str) -> Category {
        if glob_utils::matches(&self.test, path) {
            Category::Test
        } else if glob_utils::matches(&self.config, path) {
            Category::Config
        } else if glob_utils::matches(&self.priority, path) {
            Category::Priority
        } else if glob_utils::matches(&self.ignore, path) {
            Category::Ignore
        } else {
            Category::Normal
        }
    }
}
