//! Import resolution and source loading.
//!
//! The engine never touches the filesystem directly. It asks an
//! [`ImportResolver`] where an `@import` points and a [`SourceLoader`] for the
//! file's text, so hosts (and tests) can serve stylesheets from anywhere.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::ast::{split_top_level, Node, Root};
use crate::config::Dialect;
use crate::error::{Result, ThemeError};
use crate::value::url::normalize;

/// Maps an import specifier, as written, to the file it designates.
///
/// `dialect` is the dialect of the importing file; it decides which
/// extensions an extension-less specifier may stand for.
pub trait ImportResolver {
    fn resolve(&self, specifier: &str, base_dir: &Path, dialect: Dialect) -> Result<PathBuf>;
}

/// Reads stylesheet sources.
pub trait SourceLoader {
    fn load(&self, path: &Path) -> Result<String>;
}

/// Resolves imports against the filesystem.
///
/// For `@import "theme/dark"` in a Scss file it tries, in order:
/// `theme/dark`, `theme/dark.scss`, `theme/_dark.scss`, `theme/dark.sass`, ...
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImportResolver;

impl ImportResolver for FsImportResolver {
    fn resolve(&self, specifier: &str, base_dir: &Path, dialect: Dialect) -> Result<PathBuf> {
        candidates(specifier, base_dir, dialect)
            .into_iter()
            .find(|path| path.is_file())
            .ok_or_else(|| ThemeError::Resolve {
                specifier: specifier.to_string(),
                base_dir: base_dir.to_path_buf(),
                message: "no matching file".to_string(),
            })
    }
}

/// Reads sources with [`std::fs::read_to_string`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSourceLoader;

impl SourceLoader for FsSourceLoader {
    fn load(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|source| ThemeError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// In-memory sources keyed by normalized path.
///
/// Implements both traits, resolving imports with the same candidate rules as
/// [`FsImportResolver`].
#[derive(Debug, Clone, Default)]
pub struct MemorySourceLoader {
    files: HashMap<PathBuf, String>,
}

impl MemorySourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, source: impl Into<String>) {
        self.files.insert(normalize(path.as_ref()), source.into());
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }
}

impl SourceLoader for MemorySourceLoader {
    fn load(&self, path: &Path) -> Result<String> {
        self.files
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| ThemeError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not in memory"),
            })
    }
}

impl ImportResolver for MemorySourceLoader {
    fn resolve(&self, specifier: &str, base_dir: &Path, dialect: Dialect) -> Result<PathBuf> {
        candidates(specifier, base_dir, dialect)
            .into_iter()
            .find(|path| self.files.contains_key(path))
            .ok_or_else(|| ThemeError::Resolve {
                specifier: specifier.to_string(),
                base_dir: base_dir.to_path_buf(),
                message: "no matching source".to_string(),
            })
    }
}

/// Normalized paths an import specifier may designate, most specific first.
fn candidates(specifier: &str, base_dir: &Path, dialect: Dialect) -> Vec<PathBuf> {
    let joined = normalize(&base_dir.join(specifier));
    let mut out = vec![joined.clone()];
    if joined.extension().is_some() {
        return out;
    }

    let Some(file_name) = joined.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return out;
    };
    for ext in dialect.extensions() {
        out.push(joined.with_file_name(format!("{}.{}", file_name, ext)));
        if dialect == Dialect::Scss {
            out.push(joined.with_file_name(format!("_{}.{}", file_name, ext)));
        }
    }
    out
}

/// Import specifiers of the top-level `@import`, `@use` and `@forward`
/// at-rules, in source order.
pub fn import_specifiers(root: &Root) -> Vec<String> {
    root.nodes
        .iter()
        .filter_map(|node| match node {
            Node::AtRule(at) if is_import(&at.name) => Some(at.params.as_str()),
            _ => None,
        })
        .flat_map(|params| split_top_level(params, ','))
        .filter_map(parse_specifier)
        .collect()
}

/// Returns true for at-rule names that pull in another stylesheet.
pub fn is_import(name: &str) -> bool {
    ["import", "use", "forward", "require"]
        .iter()
        .any(|n| name.eq_ignore_ascii_case(n))
}

/// Extracts the path from one import clause: `"a"`, `'a' as x`, `url(a)`,
/// `(reference) "a"` or a bare Stylus `a`.
fn parse_specifier(clause: &str) -> Option<String> {
    let mut clause = clause.trim();

    // Less import options
    if clause.starts_with('(') {
        let close = clause.find(')')?;
        clause = clause[close + 1..].trim_start();
    }

    if let Some(rest) = clause.strip_prefix("url(") {
        let inner = rest[..rest.find(')')?].trim();
        return Some(unquote(inner).to_string()).filter(|s| !s.is_empty());
    }

    let first = clause.chars().next()?;
    if first == '"' || first == '\'' {
        let end = clause[1..].find(first)? + 1;
        return Some(clause[1..end].to_string()).filter(|s| !s.is_empty());
    }

    clause
        .split_whitespace()
        .next()
        .map(|s| s.trim_end_matches(';').to_string())
        .filter(|s| !s.is_empty())
}

fn unquote(s: &str) -> &str {
    let trimmed = s.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    trimmed
}
