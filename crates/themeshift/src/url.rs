//! URL dependency tracking.
//!
//! A resolved value like `url(./img/bg.png)` is relative to the file that
//! declared it. When the value is emitted into another file it has to be
//! rewritten so it still points at the same resource:
//!
//! ```text
//! /a/theme.css     --bg: url(./img.png)
//! /a/b/app.css     --bg: url(../img.png)
//! ```
//!
//! [`UrlTracker`] does that rewrite once per (variable, target file) pair.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::Result;
use crate::ident::VariableIdent;
use crate::table::{UrlRecord, VariableRecord};
use crate::value::url::{is_relative, relocate_path, resource_paths, rewrite_resources};

/// Builds the [`UrlRecord`] for a value declared in `origin_file`, or `None`
/// when the value has no relative resource references.
pub fn url_record(value: &str, origin_file: Option<&Path>) -> Result<Option<UrlRecord>> {
    let Some(origin_file) = origin_file else {
        return Ok(None);
    };
    let relative_paths: BTreeSet<String> = resource_paths(value)?
        .into_iter()
        .filter(|p| is_relative(p))
        .collect();
    if relative_paths.is_empty() {
        return Ok(None);
    }
    Ok(Some(UrlRecord {
        origin_file: origin_file.to_path_buf(),
        relative_paths,
    }))
}

/// Memoizing relocator of resolved values.
#[derive(Debug, Default)]
pub struct UrlTracker {
    cache: HashMap<(VariableIdent, PathBuf), String>,
}

impl UrlTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the resolved value of `record` as it must be written in
    /// `target_file`.
    pub fn relocate(&mut self, record: &VariableRecord, target_file: Option<&Path>) -> Result<String> {
        let (Some(urls), Some(target)) = (&record.urls, target_file) else {
            return Ok(record.resolved_value.clone());
        };

        let key = (record.ident.clone(), target.to_path_buf());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let relocated = rewrite_resources(&record.resolved_value, &mut |path| {
            if urls.relative_paths.contains(path) {
                relocate_path(path, &urls.origin_file, target)
            } else {
                None
            }
        })?;
        trace!(
            ident = %record.ident,
            target = %target.display(),
            value = %relocated,
            "relocated urls"
        );
        self.cache.insert(key, relocated.clone());
        Ok(relocated)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::IdentMode;

    fn resolved(name: &str, value: &str, origin: &str) -> VariableRecord {
        let mut record = VariableRecord::new(name, value, IdentMode::Debug)
            .with_source(Some(PathBuf::from(origin)));
        record.resolved_value = value.to_string();
        record.urls = url_record(value, Some(Path::new(origin))).unwrap();
        record.parsed = true;
        record
    }

    #[test]
    fn test_url_record_keeps_only_relative_paths() {
        let record = url_record(
            "url(./a.png), url(/abs.png), url(data:image/png;base64,AA), url(\"../b.svg\")",
            Some(Path::new("/a/theme.css")),
        )
        .unwrap()
        .unwrap();
        let paths: Vec<_> = record.relative_paths.iter().map(String::as_str).collect();
        assert_eq!(paths, vec!["../b.svg", "./a.png"]);
    }

    #[test]
    fn test_url_record_none_without_urls() {
        assert!(url_record("red", Some(Path::new("/a/x.css"))).unwrap().is_none());
        assert!(url_record("url(./a.png)", None).unwrap().is_none());
    }

    #[test]
    fn test_relocate_into_child_directory() {
        let record = resolved("--bg", "url(./img.png) no-repeat", "/a/theme.css");
        let mut tracker = UrlTracker::new();
        let value = tracker
            .relocate(&record, Some(Path::new("/a/b/app.css")))
            .unwrap();
        assert_eq!(value, "url(../img.png) no-repeat");
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_relocate_same_directory_is_noop() {
        let record = resolved("--bg", "url(./img.png)", "/a/theme.css");
        let mut tracker = UrlTracker::new();
        let value = tracker.relocate(&record, Some(Path::new("/a/app.css"))).unwrap();
        assert_eq!(value, "url(./img.png)");
    }

    #[test]
    fn test_relocated_value_reapplied_is_stable() {
        let record = resolved("--bg", "url(./img.png)", "/a/theme.css");
        let mut tracker = UrlTracker::new();
        let first = tracker.relocate(&record, Some(Path::new("/a/b/app.css"))).unwrap();

        // the relocated value now belongs to /a/b/app.css
        let moved = resolved("--bg", &first, "/a/b/app.css");
        let mut fresh = UrlTracker::new();
        let second = fresh.relocate(&moved, Some(Path::new("/a/b/other.css"))).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn test_absolute_urls_untouched() {
        let record = resolved("--bg", "url(https://cdn.example/x.png)", "/a/theme.css");
        let mut tracker = UrlTracker::new();
        let value = tracker.relocate(&record, Some(Path::new("/z/app.css"))).unwrap();
        assert_eq!(value, "url(https://cdn.example/x.png)");
    }
}
