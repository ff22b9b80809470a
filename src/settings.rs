use crate::compiler::compiler_errors::CompilerError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const NYLA_FILE_EXTENSION: &str = "nyla";
pub const CONFIG_FILE_NAME: &str = "nyla.toml";

pub const DEFAULT_EXECUTABLE_NAME: &str = "program";
pub const DEFAULT_MAIN_PATH: &str = "main";

// Rough pre-allocation heuristics measured against small test projects.
// Worth recalculating once larger programs exist.
pub const SRC_TO_TOKEN_RATIO: usize = 5;
pub const TOKEN_TO_NODE_RATIO: usize = 4;
pub const MINIMUM_WORD_TABLE_CAPACITY: usize = 64;

/// Optional project configuration read from a `nyla.toml` at the root of the
/// first source directory. Command line options always win over the file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Base name of the produced executable
    pub name: Option<String>,

    /// Internal path of the unit expected to declare the program entry
    pub main: Option<String>,

    /// Additional source directories, relative to the config file
    #[serde(default)]
    pub src: Vec<String>,
}

/// Reads the project config from `dir` if one exists there.
pub fn load_config(dir: &Path) -> Result<Option<Config>, CompilerError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(None);
    }

    let raw = match fs::read_to_string(&config_path) {
        Ok(raw) => raw,
        Err(e) => {
            return Err(CompilerError::config_error(
                &config_path,
                format!("Failed to read project config: {e}"),
            ));
        }
    };

    match toml::from_str::<Config>(&raw) {
        Ok(config) => Ok(Some(config)),
        Err(e) => Err(CompilerError::config_error(
            &config_path,
            format!("Malformed project config: {e}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config: Config =
            toml::from_str("name = \"calc\"\nmain = \"app/main\"\nsrc = [\"lib\"]").unwrap();
        assert_eq!(config.name.as_deref(), Some("calc"));
        assert_eq!(config.main.as_deref(), Some("app/main"));
        assert_eq!(config.src, vec!["lib".to_string()]);
    }

    #[test]
    fn missing_fields_default_to_none() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.name.is_none());
        assert!(config.main.is_none());
        assert!(config.src.is_empty());
    }
}
