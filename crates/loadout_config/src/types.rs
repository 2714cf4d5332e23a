//! Configuration types deserialized from `loadout.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, BTreeSet};

/// The top-level project configuration parsed from `loadout.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata.
    pub project: ProjectMeta,
    /// Directory and file-name layout, relative to the project root.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Enabled modules, keyed by category.
    ///
    /// Module directories on disk that are not listed here are disabled and
    /// contribute stubs instead of real declarations.
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleList>,
    /// Package bundle settings.
    #[serde(default)]
    pub packages: PackagesConfig,
    /// File-name pattern to handler associations cached in the package bundle.
    #[serde(default)]
    pub associations: BTreeMap<String, String>,
    /// Generation settings.
    #[serde(default)]
    pub build: BuildConfig,
}

impl ProjectConfig {
    /// Returns `true` if `category`/`name` is listed under `[modules]`.
    pub fn is_module_enabled(&self, category: &str, name: &str) -> bool {
        self.modules
            .get(category)
            .is_some_and(|list| list.0.iter().any(|m| m == name))
    }

    /// Returns every enabled `(category, name)` pair in a stable order.
    pub fn enabled_modules(&self) -> BTreeSet<(String, String)> {
        self.modules
            .iter()
            .flat_map(|(category, list)| {
                list.0
                    .iter()
                    .map(move |name| (category.clone(), name.clone()))
            })
            .collect()
    }
}

/// Core project metadata required in every `loadout.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// The project version string.
    pub version: String,
}

/// Directory layout of a project. Every path is relative to the project root.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Core declarations directory.
    pub core: String,
    /// Root of the `<category>/<name>` module tree.
    pub modules: String,
    /// User-override directory.
    pub private: String,
    /// Installed packages directory.
    pub packages: String,
    /// Output directory for artifacts, compiled forms, stamps and backups.
    pub output: String,
    /// Source file extension (without the dot).
    pub extension: String,
    /// Compiled artifact extension (without the dot).
    pub compiled_extension: String,
    /// Additional configuration files whose modification invalidates artifacts.
    pub extra_config: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            core: "core".to_string(),
            modules: "modules".to_string(),
            private: "private".to_string(),
            packages: "packages".to_string(),
            output: ".local/cache".to_string(),
            extension: "el".to_string(),
            compiled_extension: "elc".to_string(),
            extra_config: Vec::new(),
        }
    }
}

/// The modules enabled in one category.
///
/// Accepts either `lang = "rust"` or `lang = ["rust", "python"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleList(pub Vec<String>);

impl<'de> Deserialize<'de> for ModuleList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_string_or_vec(deserializer).map(ModuleList)
    }
}

/// Package bundle configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackagesConfig {
    /// Installed packages that must not be activated.
    pub disabled: Vec<String>,
    /// Auxiliary documentation directories.
    pub doc_dirs: Vec<String>,
}

/// Generation settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Load text artifacts instead of their compiled forms.
    pub debug: bool,
    /// On compile failure, leave the previous artifact in place instead of
    /// deleting it.
    pub keep_previous_on_failure: bool,
}

/// Deserializes a field that can be either a single string or a list of strings.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}
