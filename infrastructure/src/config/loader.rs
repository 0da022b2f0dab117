//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const PROJECT_FILES: [&str; 2] = ["streamchat.toml", ".streamchat.toml"];
const ENV_PREFIX: &str = "STREAMCHAT_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Environment: `STREAMCHAT_<SECTION>__<KEY>`
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./streamchat.toml` or `./.streamchat.toml`
    /// 4. XDG config: `$XDG_CONFIG_HOME/streamchat/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        let global = Self::global_config_path();
        let project = Self::project_config_path(Path::new("."));
        Self::figment(global.as_deref(), project.as_deref(), config_path.map(PathBuf::as_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    fn figment(global: Option<&Path>, project: Option<&Path>, explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(path) = global {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        if let Some(path) = project {
            figment = figment.merge(Toml::file(path));
        }

        // An explicit path must exist; Toml::file would silently skip it
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file_exact(path));
        }

        figment
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/streamchat/config.toml if set,
    /// otherwise falls back to ~/.config/streamchat/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("streamchat").join("config.toml"))
    }

    /// Get the project-level config file path in `dir` (if it exists)
    pub fn project_config_path(dir: &Path) -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Describe the config file locations being used (for `--show-config`)
    pub fn describe_sources() -> Vec<String> {
        let mut lines = vec!["Configuration sources (in priority order):".to_string()];
        lines.push(format!("  [ENV  ] {ENV_PREFIX}<SECTION>__<KEY>"));

        match Self::project_config_path(Path::new(".")) {
            Some(path) => lines.push(format!("  [FOUND] Project: {}", path.display())),
            None => lines.push("  [     ] Project: ./streamchat.toml or ./.streamchat.toml".to_string()),
        }

        if let Some(path) = Self::global_config_path() {
            let mark = if path.exists() { "FOUND" } else { "     " };
            lines.push(format!("  [{mark}] Global:  {}", path.display()));
        }

        lines.push("  [     ] Default: built-in defaults".to_string());
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn extract(figment: Figment) -> FileConfig {
        figment.extract().unwrap()
    }

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.provider.model, "gpt-3.5-turbo");
        assert_eq!(config.chat.default_chat_id, 1);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("streamchat"));
    }

    #[test]
    fn test_project_file_discovery() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ConfigLoader::project_config_path(dir.path()).is_none());

        fs::write(dir.path().join(".streamchat.toml"), "").unwrap();
        let found = ConfigLoader::project_config_path(dir.path()).unwrap();
        assert!(found.ends_with(".streamchat.toml"));

        fs::write(dir.path().join("streamchat.toml"), "").unwrap();
        let found = ConfigLoader::project_config_path(dir.path()).unwrap();
        assert!(found.ends_with("streamchat.toml"));
        assert!(!found.ends_with(".streamchat.toml"));
    }

    #[test]
    fn test_layers_override_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("streamchat.toml");
        let explicit = dir.path().join("explicit.toml");
        fs::write(&global, "[provider]\nmodel = \"global\"\nbase_url = \"http://global\"\n").unwrap();
        fs::write(&project, "[provider]\nmodel = \"project\"\n").unwrap();
        fs::write(&explicit, "[server]\nbind = \"0.0.0.0:9000\"\n").unwrap();

        let config = extract(ConfigLoader::figment(
            Some(&global),
            Some(&project),
            Some(&explicit),
        ));

        assert_eq!(config.provider.model, "project");
        assert_eq!(config.provider.base_url, "http://global");
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.database.path, PathBuf::from("chat.db"));
    }

    #[test]
    fn test_missing_global_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = extract(ConfigLoader::figment(
            Some(&dir.path().join("absent.toml")),
            None,
            None,
        ));
        assert_eq!(config.server.bind, "127.0.0.1:3000");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<FileConfig, _> =
            ConfigLoader::figment(None, None, Some(&dir.path().join("absent.toml"))).extract();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_type_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[provider]\nidle_timeout_secs = \"soon\"\n").unwrap();
        let result: Result<FileConfig, _> = ConfigLoader::figment(None, None, Some(&path)).extract();
        assert!(result.is_err());
    }
}
