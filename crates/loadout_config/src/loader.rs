//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::path::Path;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "loadout.toml";

/// Loads and validates a `loadout.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `loadout.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and configuration values are consistent.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    let paths = &config.paths;
    if paths.extension.is_empty() || paths.compiled_extension.is_empty() {
        return Err(ConfigError::ValidationError(
            "paths.extension and paths.compiled_extension must not be empty".to_string(),
        ));
    }
    if paths.extension == paths.compiled_extension {
        return Err(ConfigError::ValidationError(format!(
            "source and compiled extensions are both '{}'",
            paths.extension
        )));
    }
    for (category, list) in &config.modules {
        if list.0.iter().any(|name| name.is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "empty module name in category '{category}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[project]
name = "dots"
version = "0.1.0"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.name, "dots");
        assert_eq!(config.project.version, "0.1.0");
        assert!(config.modules.is_empty());
        assert!(!config.build.debug);
        assert!(!config.build.keep_previous_on_failure);
        assert_eq!(config.paths.extension, "el");
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "dots"
version = "0.3.1"

[paths]
core = "lisp/core"
modules = "lisp/modules"
private = "~private"
packages = "straight/build"
output = "out"
extension = "lisp"
compiled_extension = "fasl"
extra_config = ["init.lisp", "packages.lisp"]

[modules]
lang = ["rust", "python"]
ui = "modeline"

[packages]
disabled = ["evil-collection"]
doc_dirs = ["/usr/share/info"]

[associations]
"\\.rs\\'" = "rust-mode"

[build]
debug = true
keep_previous_on_failure = true
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.paths.core, "lisp/core");
        assert_eq!(config.paths.extra_config.len(), 2);
        assert!(config.is_module_enabled("ui", "modeline"));
        assert_eq!(config.packages.disabled, vec!["evil-collection"]);
        assert_eq!(config.associations["\\.rs\\'"], "rust-mode");
        assert!(config.build.debug);
        assert!(config.build.keep_previous_on_failure);
    }

    #[test]
    fn missing_name_errors() {
        let toml = r#"
[project]
name = ""
version = "0.1.0"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn same_extensions_rejected() {
        let toml = r#"
[project]
name = "dots"
version = "0.1.0"

[paths]
extension = "el"
compiled_extension = "el"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn empty_module_name_rejected() {
        let toml = r#"
[project]
name = "dots"
version = "0.1.0"

[modules]
lang = ["rust", ""]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
