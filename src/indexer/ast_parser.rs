use super::boundary::{Boundary, BoundaryExtractor, BoundaryKind};
use crate::error::ChunkingError;
use tree_sitter::{Language, Node, Parser, Tree};

/// Node kinds reported as boundaries for one grammar
struct GrammarKinds {
    functions: &'static [&'static str],
    classes: &'static [&'static str],
}

fn grammar_for(language: &str) -> Option<(Language, GrammarKinds)> {
    let grammar = match language {
        "rust" => (
            tree_sitter_rust::LANGUAGE.into(),
            GrammarKinds {
                functions: &["function_item"],
                classes: &["impl_item", "trait_item", "struct_item", "enum_item"],
            },
        ),
        "python" => (
            tree_sitter_python::LANGUAGE.into(),
            GrammarKinds {
                functions: &["function_definition"],
                classes: &["class_definition"],
            },
        ),
        "javascript" => (
            tree_sitter_javascript::LANGUAGE.into(),
            GrammarKinds {
                functions: &[
                    "function_declaration",
                    "generator_function_declaration",
                    "function_expression",
                    "arrow_function",
                    "method_definition",
                ],
                classes: &["class_declaration"],
            },
        ),
        "typescript" => (
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            GrammarKinds {
                functions: &[
                    "function_declaration",
                    "generator_function_declaration",
                    "function_expression",
                    "arrow_function",
                    "method_definition",
                ],
                classes: &[
                    "class_declaration",
                    "abstract_class_declaration",
                    "interface_declaration",
                ],
            },
        ),
        "go" => (
            tree_sitter_go::LANGUAGE.into(),
            GrammarKinds {
                functions: &["function_declaration", "method_declaration"],
                classes: &["type_declaration"],
            },
        ),
        "java" => (
            tree_sitter_java::LANGUAGE.into(),
            GrammarKinds {
                functions: &["method_declaration", "constructor_declaration"],
                classes: &[
                    "class_declaration",
                    "interface_declaration",
                    "enum_declaration",
                ],
            },
        ),
        "swift" => (
            tree_sitter_swift::LANGUAGE.into(),
            GrammarKinds {
                functions: &["function_declaration", "init_declaration"],
                classes: &["class_declaration", "protocol_declaration"],
            },
        ),
        "c" => (
            tree_sitter_c::LANGUAGE.into(),
            GrammarKinds {
                functions: &["function_definition"],
                classes: &["struct_specifier", "union_specifier", "enum_specifier"],
            },
        ),
        "cpp" => (
            tree_sitter_cpp::LANGUAGE.into(),
            GrammarKinds {
                functions: &["function_definition"],
                classes: &["class_specifier", "struct_specifier"],
            },
        ),
        "csharp" => (
            tree_sitter_c_sharp::LANGUAGE.into(),
            GrammarKinds {
                functions: &["method_declaration", "constructor_declaration"],
                classes: &[
                    "class_declaration",
                    "struct_declaration",
                    "interface_declaration",
                    "enum_declaration",
                ],
            },
        ),
        "ruby" => (
            tree_sitter_ruby::LANGUAGE.into(),
            GrammarKinds {
                functions: &["method", "singleton_method"],
                classes: &["class", "module"],
            },
        ),
        "php" => (
            tree_sitter_php::LANGUAGE_PHP.into(),
            GrammarKinds {
                functions: &["function_definition", "method_declaration"],
                classes: &[
                    "class_declaration",
                    "interface_declaration",
                    "trait_declaration",
                ],
            },
        ),
        _ => return None,
    };
    Some(grammar)
}

/// Second grammar tried when the first leaves syntax errors
///
/// `.ts` and `.tsx` share a language id; plain TypeScript rejects JSX and the
/// TSX grammar rejects `<T>` casts and generic arrows.
fn alternate_grammar(language: &str) -> Option<Language> {
    match language {
        "typescript" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        _ => None,
    }
}

fn parse(grammar: &Language, content: &str, language: &str) -> Result<Tree, ChunkingError> {
    let mut parser = Parser::new();
    parser
        .set_language(grammar)
        .map_err(|e| ChunkingError::AstParsingFailed(format!("{}: {}", language, e)))?;

    parser
        .parse(content, None)
        .ok_or_else(|| ChunkingError::AstParsingFailed("parser returned no tree".to_string()))
}

/// Tree-sitter based boundary extraction
///
/// A fresh parser is created per call; `tree_sitter::Parser` is not `Sync`.
pub struct AstBoundaryExtractor;

impl AstBoundaryExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AstBoundaryExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryExtractor for AstBoundaryExtractor {
    fn name(&self) -> &'static str {
        "tree-sitter"
    }

    fn supports(&self, language: &str) -> bool {
        grammar_for(language).is_some()
    }

    fn extract(&self, content: &str, language: &str) -> Result<Vec<Boundary>, ChunkingError> {
        let (grammar, kinds) = grammar_for(language)
            .ok_or_else(|| ChunkingError::UnsupportedLanguage(language.to_string()))?;

        let mut tree = parse(&grammar, content, language)?;
        if tree.root_node().has_error() {
            if let Some(alternate) = alternate_grammar(language) {
                tree = parse(&alternate, content, language)?;
            }
        }

        let root = tree.root_node();
        if root.has_error() {
            return Err(ChunkingError::ParseFailed(format!(
                "{} source contains syntax errors",
                language
            )));
        }

        let mut boundaries = Vec::new();
        collect(root, content, &kinds, &mut boundaries);
        Ok(boundaries)
    }
}

/// Walk the tree depth-first, recording every target node
fn collect(node: Node, source: &str, kinds: &GrammarKinds, out: &mut Vec<Boundary>) {
    let kind = node.kind();
    let boundary_kind = if kinds.functions.contains(&kind) {
        Some(BoundaryKind::Function)
    } else if kinds.classes.contains(&kind) && has_body(node) {
        Some(BoundaryKind::Class)
    } else {
        None
    };

    if let Some(boundary_kind) = boundary_kind {
        out.push(Boundary {
            kind: boundary_kind,
            name: node_name(node, source),
            // Tree-sitter rows are 0-indexed
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
        });
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect(child, source, kinds, out);
    }
}

/// `struct Foo;` style references and forward declarations are not units
fn has_body(node: Node) -> bool {
    match node.kind() {
        "struct_specifier" | "union_specifier" | "enum_specifier" | "class_specifier" => {
            node.child_by_field_name("body").is_some()
        }
        _ => true,
    }
}

fn node_name(node: Node, source: &str) -> Option<String> {
    let text = |n: Node| n.utf8_text(source.as_bytes()).ok().map(str::to_string);

    if let Some(name) = node.child_by_field_name("name") {
        return text(name);
    }

    match node.kind() {
        // impl blocks are named by the type they implement
        "impl_item" => node.child_by_field_name("type").and_then(text),
        // `const handler = () => {}`
        "arrow_function" | "function_expression" => node
            .parent()
            .filter(|p| p.kind() == "variable_declarator" || p.kind() == "pair")
            .and_then(|p| {
                p.child_by_field_name("name")
                    .or_else(|| p.child_by_field_name("key"))
            })
            .and_then(text),
        // C/C++ names sit at the bottom of the declarator chain
        "function_definition" => {
            let mut declarator = node.child_by_field_name("declarator")?;
            while let Some(inner) = declarator.child_by_field_name("declarator") {
                declarator = inner;
            }
            text(declarator)
        }
        // Go `type Foo struct {}` keeps the name on the type_spec
        "type_declaration" => {
            let mut cursor = node.walk();
            let spec = node
                .named_children(&mut cursor)
                .find(|c| c.kind() == "type_spec")?;
            spec.child_by_field_name("name").and_then(text)
        }
        _ => None,
    }
}
