//! Pluggable structure detection for function/class level chunking
//!
//! A [`BoundaryExtractor`] reports where functions and classes start and end.
//! The chunking engine keeps a registry of extractors and asks the first one
//! that supports a language; the tree-sitter extractor lives in `ast_parser`,
//! the regex extractor below covers brace languages without a grammar.

use crate::error::ChunkingError;
use regex::Regex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Function,
    Class,
}

/// A detected semantic unit, in 1-based inclusive lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    pub kind: BoundaryKind,
    pub name: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
}

impl Boundary {
    pub fn contains(&self, other: &Boundary) -> bool {
        self.start_line <= other.start_line
            && other.end_line <= self.end_line
            && (self.start_line, self.end_line) != (other.start_line, other.end_line)
    }
}

pub trait BoundaryExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, language: &str) -> bool;

    /// Boundaries in source order; an error means the structure could not be trusted
    fn extract(&self, content: &str, language: &str) -> Result<Vec<Boundary>, ChunkingError>;
}

/// Byte offsets of line starts, for line/offset conversions
pub(crate) struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub(crate) fn new(content: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in content.bytes().enumerate() {
            if b == b'\n' && i + 1 < content.len() {
                starts.push(i + 1);
            }
        }
        Self {
            starts,
            len: content.len(),
        }
    }

    /// Number of lines; a trailing newline does not open a new line
    pub(crate) fn line_count(&self) -> usize {
        if self.len == 0 { 0 } else { self.starts.len() }
    }

    /// 1-based line containing the byte offset
    pub(crate) fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }

    /// Byte range covering lines `start..=end`, newline of the last line included
    pub(crate) fn byte_range(&self, start: usize, end: usize) -> std::ops::Range<usize> {
        let from = self.starts[start - 1];
        let to = if end < self.starts.len() {
            self.starts[end]
        } else {
            self.len
        };
        from..to
    }
}

struct LanguageRules {
    function: Regex,
    class: Option<Regex>,
}

/// Names a function regex may capture that are really control flow
const NOT_FUNCTION_NAMES: &[&str] = &["if", "for", "while", "switch", "catch", "return", "else"];

/// Regex signature matching plus brace counting
pub struct RegexBoundaryExtractor {
    rules: HashMap<&'static str, LanguageRules>,
}

impl RegexBoundaryExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        let mut rules = HashMap::new();

        rules.insert(
            "kotlin",
            LanguageRules {
                function: Regex::new(
                    r"(?m)^[ \t]*(?:(?:public|private|protected|internal|override|open|abstract|suspend|inline|operator|infix|tailrec|external)\s+)*fun\s+(?:<[^>]*>\s*)?(?:[\w.]+\.)?(\w+)\s*\(",
                )?,
                class: Some(Regex::new(
                    r"(?m)^[ \t]*(?:(?:public|private|protected|internal|open|abstract|sealed|data|enum|annotation|inner|value)\s+)*(?:class|interface|object)\s+(\w+)",
                )?),
            },
        );
        rules.insert(
            "scala",
            LanguageRules {
                function: Regex::new(
                    r"(?m)^[ \t]*(?:(?:override|private|protected|final|implicit|lazy)\s+)*def\s+(\w+)",
                )?,
                class: Some(Regex::new(
                    r"(?m)^[ \t]*(?:(?:abstract|final|sealed|case|implicit|private|protected)\s+)*(?:class|object|trait)\s+(\w+)",
                )?),
            },
        );
        rules.insert(
            "groovy",
            LanguageRules {
                function: Regex::new(
                    r"(?m)^[ \t]*(?:(?:public|private|protected|static|final)\s+)*def\s+(\w+)\s*\(",
                )?,
                class: Some(Regex::new(
                    r"(?m)^[ \t]*(?:(?:public|private|protected|abstract|final)\s+)*(?:class|interface|trait|enum)\s+(\w+)",
                )?),
            },
        );
        rules.insert(
            "dart",
            LanguageRules {
                function: Regex::new(
                    r"(?m)^[ \t]*(?:(?:static|external|factory)\s+)*(?:[\w<>?,\[\]]+\s+)?(\w+)\s*\([^;{]*\)\s*(?:async\*?\s*|sync\*\s*)?\{",
                )?,
                class: Some(Regex::new(
                    r"(?m)^[ \t]*(?:abstract\s+)?(?:class|mixin|extension|enum)\s+(\w+)",
                )?),
            },
        );
        rules.insert(
            "shell",
            LanguageRules {
                function: Regex::new(r"(?m)^[ \t]*(?:function\s+)?([\w-]+)\s*\(\)")?,
                class: None,
            },
        );

        Ok(Self { rules })
    }

    fn collect(
        &self,
        content: &str,
        index: &LineIndex,
        regex: &Regex,
        kind: BoundaryKind,
        out: &mut Vec<Boundary>,
    ) -> Result<(), ChunkingError> {
        for caps in regex.captures_iter(content) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if NOT_FUNCTION_NAMES.contains(&name.as_str()) {
                continue;
            }

            // Signature start, past any leading indentation
            let indent = whole.as_str().len() - whole.as_str().trim_start().len();
            let start_line = index.line_of(whole.start() + indent);
            let last_char = whole
                .as_str()
                .char_indices()
                .last()
                .map(|(i, _)| whole.start() + i)
                .unwrap_or(whole.start());
            let end_line = match find_body_open(content, last_char) {
                Some(open) => {
                    let close = match_brace(content, open).ok_or_else(|| {
                        ChunkingError::ParseFailed(format!(
                            "unbalanced braces after '{}' at line {}",
                            name.as_str(),
                            start_line
                        ))
                    })?;
                    index.line_of(close)
                }
                None => start_line,
            };

            out.push(Boundary {
                kind,
                name: Some(name.as_str().to_string()),
                start_line,
                end_line,
            });
        }
        Ok(())
    }
}

impl BoundaryExtractor for RegexBoundaryExtractor {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn supports(&self, language: &str) -> bool {
        self.rules.contains_key(language)
    }

    fn extract(&self, content: &str, language: &str) -> Result<Vec<Boundary>, ChunkingError> {
        let rules = self
            .rules
            .get(language)
            .ok_or_else(|| ChunkingError::UnsupportedLanguage(language.to_string()))?;

        let index = LineIndex::new(content);
        let mut boundaries = Vec::new();
        if let Some(class) = &rules.class {
            self.collect(content, &index, class, BoundaryKind::Class, &mut boundaries)?;
        }
        self.collect(
            content,
            &index,
            &rules.function,
            BoundaryKind::Function,
            &mut boundaries,
        )?;

        boundaries.sort_by_key(|b| (b.start_line, std::cmp::Reverse(b.end_line)));
        boundaries.dedup_by(|a, b| a.start_line == b.start_line && a.end_line == b.end_line);
        Ok(boundaries)
    }
}

/// Offset of the `{` opening a body
///
/// The brace must follow the signature on the same line (after `=` for
/// expression-style declarations) or start the next line.
fn find_body_open(content: &str, from: usize) -> Option<usize> {
    let rest = &content[from..];
    let mut paren_depth = 0i32;
    for (offset, ch) in rest.char_indices() {
        match ch {
            '(' => paren_depth += 1,
            ')' => paren_depth -= 1,
            ';' if paren_depth <= 0 => return None,
            '{' if paren_depth <= 0 => return Some(from + offset),
            '=' if paren_depth <= 0 => {
                let after = &rest[offset + 1..];
                let trimmed = after.trim_start_matches([' ', '\t']);
                return trimmed
                    .starts_with('{')
                    .then(|| from + offset + 1 + (after.len() - trimmed.len()));
            }
            '\n' if paren_depth <= 0 => {
                let next = rest[offset + 1..].trim_start_matches([' ', '\t']);
                if !next.starts_with('{') {
                    return None;
                }
            }
            _ => {}
        }
    }
    None
}

/// Offset of the `}` closing the brace at `open`, skipping strings and comments
fn match_brace(content: &str, open: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
