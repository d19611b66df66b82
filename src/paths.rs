//! Where configuration, index data and sync state live on disk

use std::path::{Path, PathBuf};

/// Directory name used under the platform data/config roots
const APP_DIR: &str = "vector-sync";

/// Per-repository config file name, looked up at the working tree root
pub const REPO_CONFIG_FILE: &str = ".vector-sync.toml";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Per-user data root
    ///
    /// `%LOCALAPPDATA%` on Windows, `~/Library/Application Support` on macOS,
    /// `$XDG_DATA_HOME` or `~/.local/share` elsewhere.
    pub fn data_dir() -> PathBuf {
        platform_dir("LOCALAPPDATA", "XDG_DATA_HOME", ".local/share")
    }

    /// Per-user config root
    ///
    /// `%APPDATA%` on Windows, `~/Library/Application Support` on macOS,
    /// `$XDG_CONFIG_HOME` or `~/.config` elsewhere.
    pub fn config_dir() -> PathBuf {
        platform_dir("APPDATA", "XDG_CONFIG_HOME", ".config")
    }

    /// Returns: {data_dir}/vector-sync
    pub fn project_data_dir() -> PathBuf {
        Self::data_dir().join(APP_DIR)
    }

    /// Returns: {config_dir}/vector-sync
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(APP_DIR)
    }

    /// Get default LanceDB database path
    ///
    /// Returns: {data_dir}/vector-sync/lancedb
    pub fn default_lancedb_path() -> PathBuf {
        Self::project_data_dir().join("lancedb")
    }

    /// Get default config file path
    ///
    /// Returns: {config_dir}/vector-sync/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }

    /// Config file living inside a repository working tree
    pub fn repo_config_path(repo_root: &Path) -> PathBuf {
        repo_root.join(REPO_CONFIG_FILE)
    }

    /// Resolve the state file against the repository root unless it is already absolute
    pub fn resolve_state_path(repo_root: &Path, state_file: &Path) -> PathBuf {
        if state_file.is_absolute() {
            state_file.to_path_buf()
        } else {
            repo_root.join(state_file)
        }
    }
}

fn platform_dir(windows_var: &str, xdg_var: &str, home_fallback: &str) -> PathBuf {
    let from_env = |var: &str| std::env::var_os(var).map(PathBuf::from);
    if cfg!(target_os = "windows") {
        from_env(windows_var).unwrap_or_else(|| PathBuf::from("."))
    } else if cfg!(target_os = "macos") {
        home_join("Library/Application Support")
    } else {
        from_env(xdg_var).unwrap_or_else(|| home_join(home_fallback))
    }
}

fn home_join(suffix: &str) -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(suffix))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_not_empty() {
        let dir = PlatformPaths::data_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn test_config_dir_not_empty() {
        let dir = PlatformPaths::config_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn test_project_paths_contain_project_name() {
        assert!(PlatformPaths::project_data_dir().ends_with("vector-sync"));
        assert!(PlatformPaths::project_config_dir().ends_with("vector-sync"));
    }

    #[test]
    fn test_default_lancedb_path() {
        let path = PlatformPaths::default_lancedb_path();
        assert!(path.ends_with("vector-sync/lancedb"));
    }

    #[test]
    fn test_default_config_path() {
        let path = PlatformPaths::default_config_path();
        assert!(path.ends_with("vector-sync/config.toml"));
    }

    #[test]
    fn test_repo_config_path() {
        let path = PlatformPaths::repo_config_path(Path::new("/work/repo"));
        assert_eq!(path, PathBuf::from("/work/repo/.vector-sync.toml"));
    }

    #[test]
    fn test_resolve_relative_state_path() {
        let path =
            PlatformPaths::resolve_state_path(Path::new("/work/repo"), Path::new(".vector-sync.json"));
        assert_eq!(path, PathBuf::from("/work/repo/.vector-sync.json"));
    }

    #[test]
    fn test_resolve_absolute_state_path() {
        let path = PlatformPaths::resolve_state_path(
            Path::new("/work/repo"),
            Path::new("/var/lib/sync/state.json"),
        );
        assert_eq!(path, PathBuf::from("/var/lib/sync/state.json"));
    }
}
