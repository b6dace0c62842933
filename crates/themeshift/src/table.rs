//! Variable records and the ordered tables holding them.

use std::collections::{BTreeSet, HashMap};
use std::ops::Index;
use std::path::PathBuf;

use serde::Serialize;

use crate::ident::{IdentMode, VariableIdent};

/// Relative resource paths found in a resolved value, and the file they are
/// relative to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRecord {
    pub origin_file: PathBuf,
    pub relative_paths: BTreeSet<String>,
}

/// One declared variable.
///
/// Created by the scanner with `parsed == false`; the resolver fills in
/// `resolved_value`, `dependencies` and `urls` and flips `parsed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRecord {
    pub ident: VariableIdent,
    /// Name as written, sigil included (`$primary`, `--primary`, `@primary`).
    pub original_name: String,
    /// Value as written, priority markers included.
    pub raw_value: String,
    pub resolved_value: String,
    /// Declared as a custom property inside a `:root`/`html` rule.
    pub is_root_scoped: bool,
    /// Transitively referenced idents. Never contains `ident` itself.
    pub dependencies: BTreeSet<VariableIdent>,
    pub source_file: Option<PathBuf>,
    pub parsed: bool,
    pub urls: Option<UrlRecord>,
    /// Index of the declaring top-level node in its file.
    pub position: usize,
}

impl VariableRecord {
    pub fn new(original_name: &str, raw_value: &str, mode: IdentMode) -> Self {
        Self {
            ident: VariableIdent::new(original_name, mode),
            original_name: original_name.to_string(),
            raw_value: raw_value.to_string(),
            resolved_value: String::new(),
            is_root_scoped: false,
            dependencies: BTreeSet::new(),
            source_file: None,
            parsed: false,
            urls: None,
            position: 0,
        }
    }

    pub fn with_source(mut self, file: Option<PathBuf>) -> Self {
        self.source_file = file;
        self
    }

    pub fn at_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn root_scoped(mut self, is_root_scoped: bool) -> Self {
        self.is_root_scoped = is_root_scoped;
        self
    }
}

/// Variables keyed by ident, in declaration order.
///
/// Re-inserting an ident replaces its record but keeps its original slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableTable {
    records: Vec<VariableRecord>,
    index: HashMap<VariableIdent, usize>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record`, replacing (in place) any record with the same ident.
    pub fn insert(&mut self, record: VariableRecord) {
        match self.index.get(&record.ident) {
            Some(&slot) => self.records[slot] = record,
            None => {
                self.index.insert(record.ident.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn get(&self, ident: &str) -> Option<&VariableRecord> {
        self.index.get(ident).map(|&slot| &self.records[slot])
    }

    pub fn get_mut(&mut self, ident: &str) -> Option<&mut VariableRecord> {
        let slot = *self.index.get(ident)?;
        self.records.get_mut(slot)
    }

    pub fn contains(&self, ident: &str) -> bool {
        self.index.contains_key(ident)
    }

    /// Slot of `ident`, usable with indexing.
    pub fn slot_of(&self, ident: &str) -> Option<usize> {
        self.index.get(ident).copied()
    }

    pub(crate) fn record_mut(&mut self, slot: usize) -> &mut VariableRecord {
        &mut self.records[slot]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VariableRecord> {
        self.records.iter()
    }

    pub fn idents(&self) -> impl Iterator<Item = &VariableIdent> {
        self.records.iter().map(|r| &r.ident)
    }

    /// Folds `tables` into one, later tables overriding earlier ones.
    pub fn merged<'a>(tables: impl IntoIterator<Item = &'a VariableTable>) -> Self {
        let mut merged = Self::new();
        for table in tables {
            for record in table.iter() {
                merged.insert(record.clone());
            }
        }
        merged
    }
}

impl Index<usize> for VariableTable {
    type Output = VariableRecord;

    fn index(&self, slot: usize) -> &VariableRecord {
        &self.records[slot]
    }
}

impl<'a> IntoIterator for &'a VariableTable {
    type Item = &'a VariableRecord;
    type IntoIter = std::slice::Iter<'a, VariableRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<VariableRecord> for VariableTable {
    fn from_iter<I: IntoIterator<Item = VariableRecord>>(iter: I) -> Self {
        let mut table = Self::new();
        for record in iter {
            table.insert(record);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, value: &str) -> VariableRecord {
        VariableRecord::new(name, value, IdentMode::Debug)
    }

    #[test]
    fn test_insertion_order_preserved() {
        let table: VariableTable = [record("$b", "1"), record("$a", "2"), record("$c", "3")]
            .into_iter()
            .collect();
        let names: Vec<_> = table.iter().map(|r| r.original_name.as_str()).collect();
        assert_eq!(names, vec!["$b", "$a", "$c"]);
    }

    #[test]
    fn test_redeclaration_keeps_slot_last_write_wins() {
        let mut table = VariableTable::new();
        table.insert(record("$a", "red"));
        table.insert(record("$b", "blue"));
        table.insert(record("$a", "green"));

        assert_eq!(table.len(), 2);
        assert_eq!(table[0].original_name, "$a");
        assert_eq!(table[0].raw_value, "green");
        let ident = VariableIdent::new("$a", IdentMode::Debug);
        assert_eq!(table.get(ident.as_str()).unwrap().raw_value, "green");
    }

    #[test]
    fn test_merged_later_tables_win() {
        let first: VariableTable = [record("$a", "red"), record("$b", "blue")]
            .into_iter()
            .collect();
        let second: VariableTable = [record("$a", "black")].into_iter().collect();
        let merged = VariableTable::merged([&first, &second]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].raw_value, "black");
        assert_eq!(merged[1].raw_value, "blue");
    }
}
