use super::ast_parser::AstBoundaryExtractor;
use super::boundary::{Boundary, BoundaryExtractor, BoundaryKind, LineIndex, RegexBoundaryExtractor};
use crate::error::ChunkingError;
use crate::types::{ChunkStrategy, ChunkType, CodeChunk};
use anyhow::{Context, Result};

/// File-level facts the chunks are stamped with
#[derive(Debug, Clone, Copy)]
pub struct FileMeta<'a> {
    pub path: &'a str,
    pub language: &'a str,
}

/// Window size in lines for the three content-size tiers
fn window_size(total_lines: usize) -> usize {
    if total_lines <= 300 {
        30
    } else if total_lines <= 1500 {
        60
    } else {
        100
    }
}

/// Splits file content into chunks according to a [`ChunkStrategy`]
///
/// Chunking never fails: a missing or failing boundary extractor degrades to
/// fixed-size line blocks.
pub struct ChunkingEngine {
    extractors: Vec<Box<dyn BoundaryExtractor>>,
    fallback_block_lines: usize,
}

impl ChunkingEngine {
    /// Engine with the tree-sitter extractor first and the regex extractor second
    pub fn new(fallback_block_lines: usize) -> Result<Self> {
        let regex = RegexBoundaryExtractor::new().context("Failed to compile boundary patterns")?;
        Ok(Self::with_extractors(
            vec![Box::new(AstBoundaryExtractor::new()), Box::new(regex)],
            fallback_block_lines,
        ))
    }

    pub fn with_extractors(
        extractors: Vec<Box<dyn BoundaryExtractor>>,
        fallback_block_lines: usize,
    ) -> Self {
        Self {
            extractors,
            fallback_block_lines: fallback_block_lines.max(1),
        }
    }

    /// Add an extractor with lower priority than the registered ones
    pub fn register(&mut self, extractor: Box<dyn BoundaryExtractor>) {
        self.extractors.push(extractor);
    }

    pub fn extractor_for(&self, language: &str) -> Option<&dyn BoundaryExtractor> {
        self.extractors
            .iter()
            .find(|e| e.supports(language))
            .map(|e| e.as_ref())
    }

    /// Boundaries from the first extractor supporting the language
    pub fn boundaries(&self, content: &str, language: &str) -> Result<Vec<Boundary>, ChunkingError> {
        let extractor = self
            .extractor_for(language)
            .ok_or_else(|| ChunkingError::UnsupportedLanguage(language.to_string()))?;
        extractor.extract(content, language)
    }

    /// Chunk with a precomputed boundary result, avoiding a second parse
    pub fn chunk_with_boundaries(
        &self,
        content: &str,
        strategy: ChunkStrategy,
        meta: FileMeta<'_>,
        boundaries: Option<Result<Vec<Boundary>, ChunkingError>>,
    ) -> Vec<CodeChunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let index = LineIndex::new(content);
        match strategy {
            ChunkStrategy::FileLevel => vec![make_chunk(
                content,
                &index,
                meta,
                strategy,
                (1, index.line_count()),
                ChunkType::File,
                None,
                None,
            )],
            ChunkStrategy::FunctionLevel | ChunkStrategy::ClassLevel => {
                let boundaries =
                    boundaries.unwrap_or_else(|| self.boundaries(content, meta.language));
                match boundaries {
                    Ok(found) if !found.is_empty() => {
                        self.chunk_by_boundaries(content, &index, meta, strategy, &found)
                    }
                    Ok(_) => {
                        tracing::debug!("No boundaries in {}, using line blocks", meta.path);
                        self.chunk_fallback_blocks(content, &index, meta, strategy)
                    }
                    Err(e) => {
                        tracing::debug!(
                            "Boundary extraction failed for {}: {}; using line blocks",
                            meta.path,
                            e
                        );
                        self.chunk_fallback_blocks(content, &index, meta, strategy)
                    }
                }
            }
            ChunkStrategy::SlidingWindow
            | ChunkStrategy::SlidingWindowWithOverlap
            | ChunkStrategy::SlidingWindowWithHighOverlap
            | ChunkStrategy::Hybrid => {
                let percent = strategy.window_overlap_percent().unwrap_or(25);
                self.chunk_sliding_window(content, &index, meta, strategy, percent)
            }
        }
    }

    /// Chunk `content` with `strategy`
    pub fn chunk(&self, content: &str, strategy: ChunkStrategy, meta: FileMeta<'_>) -> Vec<CodeChunk> {
        self.chunk_with_boundaries(content, strategy, meta, None)
    }

    /// Contiguous chunks, one per selected boundary
    ///
    /// Each chunk absorbs the gap before its boundary (imports, doc comments),
    /// and content after the last boundary becomes one fallback chunk, so the
    /// concatenated chunk contents reproduce the file exactly.
    fn chunk_by_boundaries(
        &self,
        content: &str,
        index: &LineIndex,
        meta: FileMeta<'_>,
        strategy: ChunkStrategy,
        boundaries: &[Boundary],
    ) -> Vec<CodeChunk> {
        let selected = select_boundaries(boundaries, strategy);
        if selected.is_empty() {
            return self.chunk_fallback_blocks(content, index, meta, strategy);
        }

        let total = index.line_count();
        let mut chunks = Vec::with_capacity(selected.len() + 1);
        let mut cursor = 1;

        for unit in &selected {
            let end = unit.end_line.min(total);
            if end < cursor {
                continue;
            }
            let (chunk_type, function_name) = match unit.kind {
                BoundaryKind::Function => (ChunkType::Function, unit.name.clone()),
                BoundaryKind::Class => (ChunkType::Class, None),
            };
            let class_name = match unit.kind {
                BoundaryKind::Class => unit.name.clone(),
                BoundaryKind::Function => enclosing_class(boundaries, unit),
            };
            chunks.push(make_chunk(
                content,
                index,
                meta,
                strategy,
                (cursor, end),
                chunk_type,
                function_name,
                class_name,
            ));
            cursor = end + 1;
        }

        if cursor <= total {
            let range = index.byte_range(cursor, total);
            let remainder = &content[range];
            match chunks.last_mut() {
                Some(last) if remainder.trim().is_empty() => {
                    last.content.push_str(remainder);
                    last.end_line = total;
                }
                _ => chunks.push(make_chunk(
                    content,
                    index,
                    meta,
                    strategy,
                    (cursor, total),
                    ChunkType::Fallback,
                    None,
                    None,
                )),
            }
        }

        chunks
    }

    /// Fixed-size windows with overlap, sized by the content's line count
    fn chunk_sliding_window(
        &self,
        content: &str,
        index: &LineIndex,
        meta: FileMeta<'_>,
        strategy: ChunkStrategy,
        overlap_percent: usize,
    ) -> Vec<CodeChunk> {
        let total = index.line_count();
        let size = window_size(total);
        let overlap = (size * overlap_percent).div_ceil(100).min(size - 1);
        let step = size - overlap;

        let mut chunks = Vec::new();
        let mut start = 1;
        loop {
            let end = (start + size - 1).min(total);
            let range = index.byte_range(start, end);
            if !content[range].trim().is_empty() {
                chunks.push(make_chunk(
                    content,
                    index,
                    meta,
                    strategy,
                    (start, end),
                    ChunkType::Window,
                    None,
                    None,
                ));
            }
            if end >= total {
                break;
            }
            start += step;
        }
        chunks
    }

    /// Non-overlapping blocks of `fallback_block_lines` lines
    fn chunk_fallback_blocks(
        &self,
        content: &str,
        index: &LineIndex,
        meta: FileMeta<'_>,
        strategy: ChunkStrategy,
    ) -> Vec<CodeChunk> {
        let total = index.line_count();
        let mut chunks = Vec::new();
        let mut start = 1;
        while start <= total {
            let end = (start + self.fallback_block_lines - 1).min(total);
            let range = index.byte_range(start, end);
            if !content[range].trim().is_empty() {
                chunks.push(make_chunk(
                    content,
                    index,
                    meta,
                    strategy,
                    (start, end),
                    ChunkType::Fallback,
                    None,
                    None,
                ));
            }
            start = end + 1;
        }
        chunks
    }
}

/// Units chunked for a strategy, in source order and non-overlapping
///
/// `function_level` keeps functions not nested in another function (so
/// methods are kept, closures are not); `class_level` keeps outermost classes
/// plus free functions.
fn select_boundaries(boundaries: &[Boundary], strategy: ChunkStrategy) -> Vec<&Boundary> {
    let nested_in = |b: &Boundary, kind: Option<BoundaryKind>| {
        boundaries
            .iter()
            .any(|outer| outer.contains(b) && kind.is_none_or(|k| outer.kind == k))
    };

    let mut selected: Vec<&Boundary> = boundaries
        .iter()
        .filter(|b| match strategy {
            ChunkStrategy::ClassLevel => !nested_in(b, None),
            _ => b.kind == BoundaryKind::Function && !nested_in(b, Some(BoundaryKind::Function)),
        })
        .collect();

    selected.sort_by_key(|b| (b.start_line, std::cmp::Reverse(b.end_line)));

    let mut last_end = 0;
    selected.retain(|b| {
        if b.start_line > last_end {
            last_end = b.end_line;
            true
        } else {
            false
        }
    });
    selected
}

/// Name of the innermost class containing a function
fn enclosing_class(boundaries: &[Boundary], unit: &Boundary) -> Option<String> {
    boundaries
        .iter()
        .filter(|b| b.kind == BoundaryKind::Class && b.contains(unit))
        .min_by_key(|b| b.end_line - b.start_line)
        .and_then(|b| b.name.clone())
}

#[allow(clippy::too_many_arguments)]
fn make_chunk(
    content: &str,
    index: &LineIndex,
    meta: FileMeta<'_>,
    strategy: ChunkStrategy,
    (start_line, end_line): (usize, usize),
    chunk_type: ChunkType,
    function_name: Option<String>,
    class_name: Option<String>,
) -> CodeChunk {
    CodeChunk {
        content: content[index.byte_range(start_line, end_line)].to_string(),
        source_path: meta.path.to_string(),
        strategy,
        language: meta.language.to_string(),
        start_line,
        end_line,
        chunk_type,
        function_name,
        class_name,
        origin: None,
    }
}
