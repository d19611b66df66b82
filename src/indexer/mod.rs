//! File classification, boundary extraction, and chunking
//!
//! A changed file flows through [`FileClassifier`] (path only), a
//! [`BoundaryExtractor`] (content), [`analysis::analyze`] (strategy
//! refinement), and finally [`ChunkingEngine`].

pub mod analysis;
mod ast_parser;
mod boundary;
mod chunker;
mod classifier;
pub mod language;

pub use analysis::{ContentProfile, analyze, is_indexable};
pub use ast_parser::AstBoundaryExtractor;
pub use boundary::{Boundary, BoundaryExtractor, BoundaryKind, RegexBoundaryExtractor};
pub use chunker::{ChunkingEngine, FileMeta};
pub use classifier::FileClassifier;
