//! Engine configuration.
//!
//! [`EngineConfig`] is plain data: every field has a default, so a config file
//! only needs to mention what it changes.
//!
//! ```yaml
//! dialect: scss
//! identMode: production
//! onlyColor: true
//! themeFiles:
//!   - src/theme/default.scss
//!   - src/theme/dark.scss
//! themeAttribute: data-theme
//! ```
//!
//! Files are read as YAML or JSON depending on their extension; anything that
//! is not `.json` is treated as YAML (YAML being a superset of JSON).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ThemeError};
use crate::ident::IdentMode;

/// Stylesheet syntax a file is written in.
///
/// Every dialect recognizes the universal custom-property sigil (`--`); the
/// preprocessor dialects add one more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Css,
    Scss,
    Less,
    Stylus,
}

impl Dialect {
    /// The additional reference sigil this dialect contributes, if any.
    pub fn sigil(self) -> Option<char> {
        match self {
            Dialect::Css => None,
            Dialect::Scss | Dialect::Stylus => Some('$'),
            Dialect::Less => Some('@'),
        }
    }

    /// Returns true if `name` is spelled like a variable in this dialect.
    pub fn is_variable_name(self, name: &str) -> bool {
        if name.starts_with("--") && name.len() > 2 {
            return true;
        }
        match self.sigil() {
            Some(sigil) => name.len() > 1 && name.starts_with(sigil),
            None => false,
        }
    }

    /// File extensions tried when resolving an extension-less import.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Dialect::Css => &["css"],
            Dialect::Scss => &["scss", "sass", "css"],
            Dialect::Less => &["less", "css"],
            Dialect::Stylus => &["styl", "stylus", "css"],
        }
    }

    /// Infers the dialect from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "css" | "pcss" | "postcss" => Some(Dialect::Css),
            "scss" | "sass" => Some(Dialect::Scss),
            "less" => Some(Dialect::Less),
            "styl" | "stylus" => Some(Dialect::Stylus),
            _ => None,
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = ThemeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "css" => Ok(Dialect::Css),
            "scss" | "sass" => Ok(Dialect::Scss),
            "less" => Ok(Dialect::Less),
            "stylus" | "styl" => Ok(Dialect::Stylus),
            other => Err(ThemeError::Config(format!("unknown dialect '{}'", other))),
        }
    }
}

/// Configuration for one [`Engine`](crate::Engine) session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Dialect of the files handed to the engine.
    pub dialect: Dialect,
    /// Readable or opaque variable idents.
    pub ident_mode: IdentMode,
    /// Only extract variables whose value or name carries color/image semantics.
    pub only_color: bool,
    /// Designated theme declaration files (absolute, or relative to the working dir).
    pub theme_files: Vec<PathBuf>,
    /// Attribute used by the scope annotator (`:root[data-theme="dark"]`).
    pub theme_attribute: String,
    /// Selector of the generated root-scope rule.
    pub root_selector: String,
    /// Append the theme block as a comment to inline-rewritten files.
    pub document_theme: bool,
    /// Identity stamped on every emitted message.
    pub engine_identity: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            ident_mode: IdentMode::default(),
            only_color: true,
            theme_files: Vec::new(),
            theme_attribute: "data-theme".to_string(),
            root_selector: ":root".to_string(),
            document_theme: false,
            engine_identity: "themeshift".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a configuration file, choosing the format by extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ThemeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Returns true if `path` is one of the designated theme files.
    pub fn is_theme_file(&self, path: &Path) -> bool {
        self.theme_files.iter().any(|f| f == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.dialect, Dialect::Css);
        assert!(config.only_color);
        assert_eq!(config.theme_attribute, "data-theme");
        assert_eq!(config.root_selector, ":root");
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = EngineConfig::from_yaml(
            r#"
            dialect: scss
            identMode: production
            themeFiles: [/app/theme.scss]
            "#,
        )
        .unwrap();
        assert_eq!(config.dialect, Dialect::Scss);
        assert_eq!(config.ident_mode, IdentMode::Production);
        assert!(config.is_theme_file(Path::new("/app/theme.scss")));
        assert!(config.only_color);
    }

    #[test]
    fn test_from_json() {
        let config = EngineConfig::from_json(r#"{"dialect": "less", "onlyColor": false}"#).unwrap();
        assert_eq!(config.dialect, Dialect::Less);
        assert!(!config.only_color);
    }

    #[test]
    fn test_unknown_dialect_rejected() {
        assert!(EngineConfig::from_yaml("dialect: sass-ish").is_err());
        assert!("sass-ish".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("themeshift.json");
        std::fs::write(&json, r#"{"themeAttribute": "data-mode"}"#).unwrap();
        assert_eq!(
            EngineConfig::from_file(&json).unwrap().theme_attribute,
            "data-mode"
        );

        let yaml = dir.path().join("themeshift.yaml");
        std::fs::write(&yaml, "documentTheme: true\n").unwrap();
        assert!(EngineConfig::from_file(&yaml).unwrap().document_theme);
    }

    #[test]
    fn test_dialect_sigils() {
        assert_eq!(Dialect::Css.sigil(), None);
        assert_eq!(Dialect::Scss.sigil(), Some('$'));
        assert_eq!(Dialect::Stylus.sigil(), Some('$'));
        assert_eq!(Dialect::Less.sigil(), Some('@'));
    }

    #[test]
    fn test_is_variable_name() {
        assert!(Dialect::Css.is_variable_name("--primary"));
        assert!(!Dialect::Css.is_variable_name("$primary"));
        assert!(Dialect::Scss.is_variable_name("$primary"));
        assert!(Dialect::Less.is_variable_name("@primary"));
        assert!(!Dialect::Less.is_variable_name("color"));
        assert!(!Dialect::Css.is_variable_name("--"));
    }

    #[test]
    fn test_dialect_from_path() {
        assert_eq!(Dialect::from_path(Path::new("a/b.scss")), Some(Dialect::Scss));
        assert_eq!(Dialect::from_path(Path::new("a/b.LESS")), Some(Dialect::Less));
        assert_eq!(Dialect::from_path(Path::new("a/b.styl")), Some(Dialect::Stylus));
        assert_eq!(Dialect::from_path(Path::new("a/b.txt")), None);
    }
}
