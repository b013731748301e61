extern crate serde_yaml;
extern crate toml;

use anyhow::Context;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_MACRO_FILE: &str = ".kbmacro";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Where macros are saved and loaded. Defaults to `$HOME/.kbmacro`.
    #[serde(default = "default_macro_file")]
    pub macro_file: Option<PathBuf>,
    /// Rewrite the macro file each time a macro is recorded or removed.
    #[serde(default = "const_true")]
    pub autosave: bool,
    /// Copy the previous file to `<file>.bak` before rewriting it.
    #[serde(default = "const_true")]
    pub backup: bool,
    #[serde(default = "const_true")]
    pub load_on_start: bool,
}

impl Config {
    pub fn new() -> Self {
        Config {
            macro_file: default_macro_file(),
            autosave: true,
            backup: true,
            load_on_start: true,
        }
    }

    /// A configuration with no macro file, for embedding and tests.
    pub fn in_memory() -> Self {
        Config {
            macro_file: None,
            autosave: false,
            backup: false,
            load_on_start: false,
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?;
        let config = match get_file_ext(path) {
            ConfigFiletype::Toml => toml::from_str(&contents).map_err(anyhow::Error::from),
            ConfigFiletype::Yaml => serde_yaml::from_str(&contents).map_err(anyhow::Error::from),
        };
        config.with_context(|| format!("invalid config {}", path.display()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

enum ConfigFiletype {
    Yaml,
    Toml,
}

fn get_file_ext(filename: &Path) -> ConfigFiletype {
    match filename.extension() {
        Some(f) if f.to_str().unwrap_or("").eq_ignore_ascii_case("toml") => ConfigFiletype::Toml,
        _ => ConfigFiletype::Yaml,
    }
}

fn default_macro_file() -> Option<PathBuf> {
    env::var_os("HOME").map(|home| PathBuf::from(home).join(DEFAULT_MACRO_FILE))
}

fn const_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::io::Write;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn test_toml_config() {
        let file = write_temp(
            ".toml",
            indoc! {r#"
                macro_file = "/tmp/macros"
                backup = false
            "#},
        );
        let config = Config::load(file.path()).expect("valid toml");
        assert_eq!(config.macro_file, Some(PathBuf::from("/tmp/macros")));
        assert!(!config.backup);
        assert!(config.autosave);
        assert!(config.load_on_start);
    }

    #[test]
    fn test_yaml_config() {
        let file = write_temp(
            ".yml",
            indoc! {"
                autosave: false
                load_on_start: false
            "},
        );
        let config = Config::load(file.path()).expect("valid yaml");
        assert!(!config.autosave);
        assert!(!config.load_on_start);
        assert_eq!(config.macro_file, default_macro_file());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write_temp(".toml", "autosav = true\n");
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = Config::load(&dir.path().join("none.toml")).expect_err("missing");
        assert!(format!("{err:#}").contains("failed to read config"));
    }
}
