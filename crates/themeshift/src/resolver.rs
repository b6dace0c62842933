//! Recursive value resolution.
//!
//! Every record's value is tokenized and each reference is replaced by the
//! referenced variable's own resolved value, depth first. Lookups go to the
//! local table first and then to the external tables, last to first, so a
//! later import shadows an earlier one.
//!
//! Resolution never fails on missing or cyclic references:
//!
//! | Reference | Result | Dependency edge |
//! |-----------|--------|-----------------|
//! | `var()` (no name) | `""` | no |
//! | itself, or any ident currently being resolved | `""` | no |
//! | undeclared, with a `var()` fallback | resolved fallback | from the fallback |
//! | undeclared | `""` | no |
//! | declared, resolving to `""` | `""` | no |
//!
//! Only malformed values (see [`crate::value::tokenize`]) produce errors.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use tracing::trace;

use crate::config::Dialect;
use crate::error::Result;
use crate::ident::{IdentMode, VariableIdent};
use crate::table::VariableTable;
use crate::url::{url_record, UrlTracker};
use crate::value::{strip_priority, tokenize, Reference, Segment};

/// Resolves the records of one file's table.
pub struct Resolver<'a> {
    sigil: Option<char>,
    mode: IdentMode,
    externals: &'a [VariableTable],
    target_file: Option<&'a Path>,
    urls: &'a mut UrlTracker,
}

impl<'a> Resolver<'a> {
    /// `externals` are already resolved tables (imports, in import order);
    /// `target_file` is the file the local table belongs to.
    pub fn new(
        dialect: Dialect,
        mode: IdentMode,
        externals: &'a [VariableTable],
        target_file: Option<&'a Path>,
        urls: &'a mut UrlTracker,
    ) -> Self {
        Self {
            sigil: dialect.sigil(),
            mode,
            externals,
            target_file,
            urls,
        }
    }

    /// Resolves every unresolved record of `table` in place.
    pub fn resolve_table(&mut self, table: &mut VariableTable) -> Result<()> {
        for slot in 0..table.len() {
            let mut visiting = HashSet::new();
            self.resolve_slot(table, slot, &mut visiting)?;
        }
        Ok(())
    }

    /// Resolves a free-standing value against `table` and the externals.
    ///
    /// Returns the expanded value (priority markers removed) and the idents it
    /// depends on.
    pub fn resolve_value(
        &mut self,
        table: &mut VariableTable,
        value: &str,
    ) -> Result<(String, BTreeSet<VariableIdent>)> {
        let segments = tokenize(strip_priority(value), self.sigil)?;
        let mut visiting = HashSet::new();
        let mut deps = BTreeSet::new();
        let expanded = self.expand(&segments, table, &mut visiting, &mut deps)?;
        Ok((expanded, deps))
    }

    fn resolve_slot(
        &mut self,
        table: &mut VariableTable,
        slot: usize,
        visiting: &mut HashSet<VariableIdent>,
    ) -> Result<()> {
        if table[slot].parsed {
            return Ok(());
        }

        let ident = table[slot].ident.clone();
        let raw = strip_priority(&table[slot].raw_value).to_string();
        let segments = tokenize(&raw, self.sigil)?;

        visiting.insert(ident.clone());
        let mut deps = BTreeSet::new();
        let expanded = self.expand(&segments, table, visiting, &mut deps);
        visiting.remove(&ident);
        let resolved = expanded?;
        deps.remove(&ident);

        let urls = url_record(&resolved, table[slot].source_file.as_deref())?;
        trace!(ident = %ident, raw = %raw, resolved = %resolved, "resolved variable");

        let record = table.record_mut(slot);
        record.resolved_value = resolved;
        record.dependencies = deps;
        record.urls = urls;
        record.parsed = true;
        Ok(())
    }

    fn expand(
        &mut self,
        segments: &[Segment],
        table: &mut VariableTable,
        visiting: &mut HashSet<VariableIdent>,
        deps: &mut BTreeSet<VariableIdent>,
    ) -> Result<String> {
        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                // `#{$a}` folds to the value of `$a`.
                Segment::Interpolation(inner) => {
                    out.push_str(&self.expand(inner, table, visiting, deps)?)
                }
                Segment::Reference(reference) => {
                    out.push_str(&self.substitute(reference, table, visiting, deps)?)
                }
            }
        }
        Ok(out)
    }

    fn substitute(
        &mut self,
        reference: &Reference,
        table: &mut VariableTable,
        visiting: &mut HashSet<VariableIdent>,
        deps: &mut BTreeSet<VariableIdent>,
    ) -> Result<String> {
        if reference.name.is_empty() {
            return Ok(String::new());
        }

        let ident = VariableIdent::new(&reference.name, self.mode);
        if visiting.contains(&ident) {
            trace!(name = %reference.name, "cyclic reference");
            return Ok(String::new());
        }

        if let Some(slot) = table.slot_of(ident.as_str()) {
            self.resolve_slot(table, slot, visiting)?;
            let record = &table[slot];
            if !record.resolved_value.is_empty() {
                deps.insert(ident);
                deps.extend(record.dependencies.iter().cloned());
            }
            return Ok(record.resolved_value.clone());
        }

        let externals = self.externals;
        if let Some(record) = externals.iter().rev().find_map(|t| t.get(ident.as_str())) {
            let value = self.urls.relocate(record, self.target_file)?;
            if !value.is_empty() {
                deps.insert(ident);
                deps.extend(record.dependencies.iter().cloned());
            }
            return Ok(value);
        }

        match &reference.fallback {
            Some(fallback) => self.expand(fallback, table, visiting, deps),
            None => {
                trace!(name = %reference.name, "undeclared reference");
                Ok(String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse;
    use crate::scanner::scan;
    use std::path::PathBuf;

    fn resolve(source: &str, dialect: Dialect) -> VariableTable {
        resolve_with(source, dialect, &[], "/a/app.css")
    }

    fn resolve_with(
        source: &str,
        dialect: Dialect,
        externals: &[VariableTable],
        file: &str,
    ) -> VariableTable {
        let root = parse(source, dialect).unwrap();
        let file = PathBuf::from(file);
        let mut table = scan(&root, Some(&file), dialect, IdentMode::Debug);
        let mut urls = UrlTracker::new();
        Resolver::new(dialect, IdentMode::Debug, externals, Some(&file), &mut urls)
            .resolve_table(&mut table)
            .unwrap();
        table
    }

    fn ident(name: &str) -> VariableIdent {
        VariableIdent::new(name, IdentMode::Debug)
    }

    fn value<'t>(table: &'t VariableTable, name: &str) -> &'t str {
        &table.get(ident(name).as_str()).unwrap().resolved_value
    }

    fn deps(table: &VariableTable, name: &str) -> Vec<VariableIdent> {
        table
            .get(ident(name).as_str())
            .unwrap()
            .dependencies
            .iter()
            .cloned()
            .collect()
    }

    #[test]
    fn test_chain_fully_expanded() {
        let table = resolve(
            ":root { --c: #123; --b: 1px solid var(--c); --a: var(--b) !important; }",
            Dialect::Css,
        );
        assert_eq!(value(&table, "--a"), "1px solid #123");
        let mut expected = vec![ident("--b"), ident("--c")];
        expected.sort();
        assert_eq!(deps(&table, "--a"), expected);
        assert!(table.iter().all(|r| r.parsed));
    }

    #[test]
    fn test_no_references_keeps_raw_value_minus_priority() {
        let table = resolve("$a: 1px solid red !default;", Dialect::Scss);
        assert_eq!(value(&table, "$a"), "1px solid red");
        assert!(deps(&table, "$a").is_empty());
    }

    #[test]
    fn test_self_reference_is_empty() {
        let table = resolve(":root { --x: var(--x); }", Dialect::Css);
        assert_eq!(value(&table, "--x"), "");
        assert!(deps(&table, "--x").is_empty());
    }

    #[test]
    fn test_mutual_cycle_is_empty_without_edges() {
        let table = resolve(":root { --a: var(--b); --b: var(--a); }", Dialect::Css);
        assert_eq!(value(&table, "--a"), "");
        assert_eq!(value(&table, "--b"), "");
        assert!(deps(&table, "--a").is_empty());
        assert!(deps(&table, "--b").is_empty());
    }

    #[test]
    fn test_undeclared_uses_fallback_or_empty() {
        let table = resolve(
            ":root { --a: var(--missing, blue); --b: var(--missing); --c: 1px $x; }",
            Dialect::Css,
        );
        assert_eq!(value(&table, "--a"), "blue");
        assert_eq!(value(&table, "--b"), "");
        // `$x` is plain text in CSS.
        assert_eq!(value(&table, "--c"), "1px $x");
    }

    #[test]
    fn test_fallback_references_resolved() {
        let table = resolve(
            ":root { --base: red; --a: var(--missing, var(--base)); }",
            Dialect::Css,
        );
        assert_eq!(value(&table, "--a"), "red");
        assert_eq!(deps(&table, "--a"), vec![ident("--base")]);
    }

    #[test]
    fn test_scss_interpolation_folded() {
        let table = resolve("$w: 2px;\n$b: #{$w} solid $c;\n$c: red;", Dialect::Scss);
        assert_eq!(value(&table, "$b"), "2px solid red");
    }

    #[test]
    fn test_less_references() {
        let table = resolve("@a: #fff;\n@b: darken(@a, 10%);", Dialect::Less);
        assert_eq!(value(&table, "@b"), "darken(#fff, 10%)");
    }

    #[test]
    fn test_externals_later_wins_and_local_shadows() {
        let first = resolve_with("$brand: red;\n$size: 1px;", Dialect::Scss, &[], "/t/one.scss");
        let second = resolve_with("$brand: blue;", Dialect::Scss, &[], "/t/two.scss");
        let externals = vec![first, second];

        let table = resolve_with(
            "$a: $brand $size;\n$size: 2px;",
            Dialect::Scss,
            &externals,
            "/t/app.scss",
        );
        assert_eq!(value(&table, "$a"), "blue 2px");
    }

    #[test]
    fn test_external_values_relocated() {
        let theme = resolve_with("$bg: url(./img/bg.png);", Dialect::Scss, &[], "/p/theme/t.scss");
        let externals = vec![theme];
        let table = resolve_with("$hero: $bg center;", Dialect::Scss, &externals, "/p/pages/app.scss");
        assert_eq!(value(&table, "$hero"), "url(../theme/img/bg.png) center");
        let record = table.get(ident("$hero").as_str()).unwrap();
        assert_eq!(
            record.urls.as_ref().unwrap().origin_file,
            PathBuf::from("/p/pages/app.scss")
        );
    }

    #[test]
    fn test_malformed_value_is_error() {
        let root = parse(":root { --a: url(a b); }", Dialect::Css).unwrap();
        let mut table = scan(&root, None, Dialect::Css, IdentMode::Debug);
        let mut urls = UrlTracker::new();
        let result = Resolver::new(Dialect::Css, IdentMode::Debug, &[], None, &mut urls)
            .resolve_table(&mut table);
        assert!(result.is_err());
    }
}
