//! Content-derived file analysis and chunking-strategy refinement
//!
//! Complexity and the refined strategy only select chunking behavior; a wrong
//! estimate changes chunk shapes, never which content is indexed.

use super::boundary::{Boundary, BoundaryKind};
use crate::config::ChunkingConfig;
use crate::types::{Category, ChunkStrategy, Classification, Complexity, FileAnalysis};

/// Structural measurements of one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentProfile {
    pub total_lines: usize,
    pub source_lines: usize,
    pub function_count: usize,
    pub class_count: usize,
    /// Count of `{`, `[` and `(`
    pub openers: usize,
}

impl ContentProfile {
    pub fn measure(content: &str, language: &str, boundaries: &[Boundary]) -> Self {
        let function_count = boundaries
            .iter()
            .filter(|b| b.kind == BoundaryKind::Function)
            .count();
        let class_count = boundaries
            .iter()
            .filter(|b| b.kind == BoundaryKind::Class)
            .count();

        Self {
            total_lines: content.lines().count(),
            source_lines: source_line_count(content, language),
            function_count,
            class_count,
            openers: content
                .chars()
                .filter(|c| matches!(c, '{' | '[' | '('))
                .count(),
        }
    }

    /// `2 * (functions + classes) + 0.1 * openers + 0.01 * lines`
    pub fn complexity_score(&self) -> f64 {
        2.0 * (self.function_count + self.class_count) as f64
            + 0.1 * self.openers as f64
            + 0.01 * self.total_lines as f64
    }

    pub fn complexity(&self) -> Complexity {
        let score = self.complexity_score();
        if score < 10.0 {
            Complexity::Low
        } else if score < 50.0 {
            Complexity::Medium
        } else {
            Complexity::High
        }
    }
}

fn comment_prefixes(language: &str) -> &'static [&'static str] {
    match language {
        "python" | "ruby" | "shell" | "yaml" | "toml" | "makefile" | "dockerfile" | "ini"
        | "properties" => &["#"],
        "sql" | "lua" => &["--"],
        "html" | "xml" | "markdown" | "vue" | "svelte" => &["<!--"],
        "php" => &["//", "#", "/*", "*"],
        _ => &["//", "/*", "*", "*/"],
    }
}

/// Lines that are neither blank nor comment-only
pub fn source_line_count(content: &str, language: &str) -> usize {
    let prefixes = comment_prefixes(language);
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !prefixes.iter().any(|p| line.starts_with(p)))
        .count()
}

/// Pick the chunking strategy from measured size and structure
///
/// Precedence: small files collapse to `file_level`, class-heavy files use
/// `complex_modules`, high complexity uses `monolithic_files`, and anything
/// else keeps the classifier hint (`function_level` maps to `clean_modules`).
pub fn refine_strategy(
    initial: ChunkStrategy,
    profile: &ContentProfile,
    size_bytes: u64,
    config: &ChunkingConfig,
) -> ChunkStrategy {
    if profile.total_lines < config.small_file_lines || size_bytes < config.small_file_bytes {
        return ChunkStrategy::FileLevel;
    }

    if profile.class_count >= config.class_heavy_min_classes
        && profile.function_count
            <= profile.class_count * config.class_heavy_max_functions_per_class
    {
        return config.complex_modules;
    }

    if profile.complexity() == Complexity::High {
        return config.monolithic_files;
    }

    match initial {
        ChunkStrategy::FunctionLevel => config.clean_modules,
        other => other,
    }
}

/// Build the [`FileAnalysis`] for one file
pub fn analyze(
    path: &str,
    classification: &Classification,
    content: &str,
    boundaries: &[Boundary],
    config: &ChunkingConfig,
) -> FileAnalysis {
    let profile = ContentProfile::measure(content, &classification.language, boundaries);
    let size_bytes = content.len() as u64;
    let chunking_strategy =
        refine_strategy(classification.initial_strategy, &profile, size_bytes, config);

    FileAnalysis {
        path: path.to_string(),
        language: classification.language.clone(),
        category: classification.category,
        complexity: profile.complexity(),
        size_bytes,
        source_line_count: profile.source_lines,
        total_lines: profile.total_lines,
        function_count: profile.function_count,
        class_count: profile.class_count,
        chunking_strategy,
    }
}

/// Whether a category is processed at all
pub fn is_indexable(category: Category, include_tests: bool) -> bool {
    match category {
        Category::Ignore => false,
        Category::Test => include_tests,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundary(kind: BoundaryKind, start_line: usize, end_line: usize) -> Boundary {
        Boundary {
            kind,
            name: None,
            start_line,
            end_line,
        }
    }

    fn profile(total_lines: usize, functions: usize, classes: usize, openers: usize) -> ContentProfile {
        ContentProfile {
            total_lines,
            source_lines: total_lines,
            function_count: functions,
            class_count: classes,
            openers,
        }
    }

    #[test]
    fn test_source_line_count_c_like() {
        let content = "// header\n\nfn main() {\n    /* inline */\n    * doc\n    run();\n}\n";
        assert_eq!(source_line_count(content, "rust"), 3);
    }

    #[test]
    fn test_source_line_count_hash_comments() {
        let content = "#!/usr/bin/env python\n# comment\n\nimport os\nprint(os.name)  # trailing\n";
        assert_eq!(source_line_count(content, "python"), 2);
    }

    #[test]
    fn test_complexity_score() {
        // 2 * 3 + 0.1 * 20 + 0.01 * 100 = 9
        let p = profile(100, 2, 1, 20);
        assert!((p.complexity_score() - 9.0).abs() < 1e-9);
        assert_eq!(p.complexity(), Complexity::Low);

        assert_eq!(profile(100, 5, 0, 0).complexity(), Complexity::Medium);
        assert_eq!(profile(100, 20, 5, 0).complexity(), Complexity::High);
    }

    #[test]
    fn test_measure_counts_boundaries() {
        let content = "class A {\n  f() {}\n}\n";
        let boundaries = vec![
            boundary(BoundaryKind::Class, 1, 3),
            boundary(BoundaryKind::Function, 2, 2),
        ];
        let p = ContentProfile::measure(content, "typescript", &boundaries);
        assert_eq!(p.total_lines, 3);
        assert_eq!(p.class_count, 1);
        assert_eq!(p.function_count, 1);
        assert_eq!(p.openers, 3);
    }

    #[test]
    fn test_small_file_collapses_to_file_level() {
        let config = ChunkingConfig::default();
        let p = profile(10, 1, 0, 2);
        assert_eq!(
            refine_strategy(ChunkStrategy::FunctionLevel, &p, 5_000, &config),
            ChunkStrategy::FileLevel
        );

        let p = profile(200, 1, 0, 2);
        assert_eq!(
            refine_strategy(ChunkStrategy::FunctionLevel, &p, 900, &config),
            ChunkStrategy::FileLevel
        );
    }

    #[test]
    fn test_class_heavy_shifts_to_complex_modules() {
        let config = ChunkingConfig::default();
        let p = profile(200, 4, 3, 10);
        assert_eq!(
            refine_strategy(ChunkStrategy::FunctionLevel, &p, 8_000, &config),
            ChunkStrategy::ClassLevel
        );
    }

    #[test]
    fn test_high_complexity_shifts_to_monolithic() {
        let config = ChunkingConfig::default();
        let p = profile(2_000, 30, 0, 300);
        assert_eq!(
            refine_strategy(ChunkStrategy::FunctionLevel, &p, 80_000, &config),
            ChunkStrategy::Hybrid
        );
    }

    #[test]
    fn test_hint_kept_otherwise() {
        let config = ChunkingConfig::default();
        let p = profile(60, 1, 0, 4);
        assert_eq!(
            refine_strategy(ChunkStrategy::FunctionLevel, &p, 2_000, &config),
            ChunkStrategy::FunctionLevel
        );
        assert_eq!(
            refine_strategy(ChunkStrategy::Hybrid, &p, 2_000, &config),
            ChunkStrategy::Hybrid
        );
    }

    #[test]
    fn test_configured_strategy_table() {
        let config = ChunkingConfig {
            clean_modules: ChunkStrategy::SlidingWindow,
            ..ChunkingConfig::default()
        };
        let p = profile(60, 1, 0, 4);
        assert_eq!(
            refine_strategy(ChunkStrategy::FunctionLevel, &p, 2_000, &config),
            ChunkStrategy::SlidingWindow
        );
    }

    #[test]
    fn test_is_indexable() {
        assert!(!is_indexable(Category::Ignore, true));
        assert!(!is_indexable(Category::Test, false));
        assert!(is_indexable(Category::Test, true));
        assert!(is_indexable(Category::Normal, false));
        assert!(is_indexable(Category::Config, false));
        assert!(is_indexable(Category::Priority, false));
    }

    #[test]
    fn test_analyze() {
        let classification = Classification {
            language: "typescript".to_string(),
            category: Category::Normal,
            initial_strategy: ChunkStrategy::FunctionLevel,
        };
        let content = "export const x = 1;\n";
        let analysis = analyze(
            "src/x.ts",
            &classification,
            content,
            &[],
            &ChunkingConfig::default(),
        );
        assert_eq!(analysis.path, "src/x.ts");
        assert_eq!(analysis.size_bytes, content.len() as u64);
        assert_eq!(analysis.source_line_count, 1);
        assert_eq!(analysis.chunking_strategy, ChunkStrategy::FileLevel);
        assert_eq!(analysis.complexity, Complexity::Low);
    }
}
