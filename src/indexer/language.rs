//! Programming language detection from file extensions

/// Language id for files whose extension is not recognized
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Detect programming language from file extension
///
/// Returns a lowercase language id.
pub fn detect_language(extension: &str) -> Option<&'static str> {
    let lang = match extension.to_lowercase().as_str() {
        // Programming languages
        "rs" => "rust",
        "py" | "pyi" => "python",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "mts" | "cts" | "tsx" => "typescript",
        "java" => "java",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "cpp",
        "c" | "h" => "c",
        "cs" => "csharp",
        "go" => "go",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        "scala" | "sc" => "scala",
        "dart" => "dart",
        "groovy" | "gradle" => "groovy",
        "sh" | "bash" | "zsh" => "shell",
        "sql" => "sql",
        "lua" => "lua",

        // Web technologies
        "html" | "htm" => "html",
        "css" => "css",
        "scss" | "sass" => "scss",
        "vue" => "vue",
        "svelte" => "svelte",

        // Data formats and config files
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "ini" | "cfg" | "conf" => "ini",
        "properties" => "properties",

        // Documentation formats
        "md" | "markdown" => "markdown",
        "rst" => "restructuredtext",
        "txt" => "text",

        _ => return None,
    };

    Some(lang)
}

/// Detect the language of a repository-relative path
///
/// Falls back to well-known extensionless file names, then to `unknown`.
pub fn detect_language_for_path(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);

    match file_name {
        "Dockerfile" | "Containerfile" => return "dockerfile",
        "Makefile" | "GNUmakefile" => return "makefile",
        "Rakefile" | "Gemfile" => return "ruby",
        _ => {}
    }

    let extension = crate::types::extension_of(path);
    detect_language(&extension).unwrap_or(UNKNOWN_LANGUAGE)
}

/// Languages whose code is naturally organized around free functions and
/// methods; these default to function-level chunking.
pub fn is_function_oriented(language: &str) -> bool {
    matches!(
        language,
        "rust"
            | "python"
            | "javascript"
            | "typescript"
            | "go"
            | "c"
            | "cpp"
            | "php"
            | "ruby"
            | "swift"
            | "kotlin"
            | "scala"
            | "dart"
            | "shell"
            | "lua"
    )
}
