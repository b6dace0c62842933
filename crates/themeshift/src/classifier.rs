//! Partitions resolved variables by origin.
//!
//! - **Theme**: declared in an imported theme file and not locally.
//! - **Reference**: declared locally, but everything it (transitively)
//!   depends on is Theme or Reference, so it has to follow theme changes at
//!   runtime too.
//! - **Context**: every other local variable.

use std::collections::HashSet;

use serde::Serialize;

use crate::ident::VariableIdent;
use crate::table::VariableTable;
use crate::value::color::is_color_bearing;

/// Result of [`Classifier::classify`]. Each list is in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub theme: Vec<VariableIdent>,
    pub reference: Vec<VariableIdent>,
    pub context: Vec<VariableIdent>,
}

impl Classification {
    pub fn is_theme(&self, ident: &str) -> bool {
        self.theme.iter().any(|i| i.as_str() == ident)
    }

    pub fn is_reference(&self, ident: &str) -> bool {
        self.reference.iter().any(|i| i.as_str() == ident)
    }
}

pub struct Classifier<'a> {
    context: &'a VariableTable,
    theme: &'a VariableTable,
    only_color: bool,
}

impl<'a> Classifier<'a> {
    pub fn new(context: &'a VariableTable, theme: &'a VariableTable, only_color: bool) -> Self {
        Self {
            context,
            theme,
            only_color,
        }
    }

    /// Declared by a theme file and not shadowed locally.
    pub fn is_theme_variable(&self, ident: &str) -> bool {
        !self.context.contains(ident) && self.theme.contains(ident)
    }

    /// A theme variable that passes the color filter (when enabled).
    pub fn is_theme_candidate(&self, ident: &str) -> bool {
        if !self.is_theme_variable(ident) {
            return false;
        }
        if !self.only_color {
            return true;
        }
        self.theme
            .get(ident)
            .is_some_and(|r| is_color_bearing(Some(&r.original_name), &r.resolved_value))
    }

    pub fn is_reference(&self, ident: &str) -> bool {
        self.is_reference_inner(ident, &mut HashSet::new())
    }

    fn is_reference_inner<'s>(&self, ident: &'s str, visiting: &mut HashSet<&'s str>) -> bool
    where
        'a: 's,
    {
        if !visiting.insert(ident) {
            return false;
        }
        // `visiting` holds the current path only, so shared dependencies
        // are checked once per path and only true cycles fail
        let result = self.context.get(ident).is_some_and(|record| {
            !record.dependencies.is_empty()
                && record.dependencies.iter().all(|dep| {
                    self.is_theme_variable(dep.as_str())
                        || self.is_reference_inner(dep.as_str(), visiting)
                })
        });
        visiting.remove(ident);
        result
    }

    pub fn classify(&self) -> Classification {
        let mut classification = Classification::default();
        for ident in self.theme.idents() {
            if self.is_theme_candidate(ident.as_str()) {
                classification.theme.push(ident.clone());
            }
        }
        for ident in self.context.idents() {
            if self.is_reference(ident.as_str()) {
                classification.reference.push(ident.clone());
            } else {
                classification.context.push(ident.clone());
            }
        }
        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::IdentMode;
    use crate::table::VariableRecord;

    fn record(name: &str, resolved: &str, deps: &[&str]) -> VariableRecord {
        let mut record = VariableRecord::new(name, resolved, IdentMode::Debug);
        record.resolved_value = resolved.to_string();
        record.dependencies = deps.iter().map(|d| ident(d)).collect();
        record.parsed = true;
        record
    }

    fn ident(name: &str) -> VariableIdent {
        VariableIdent::new(name, IdentMode::Debug)
    }

    fn theme() -> VariableTable {
        [
            record("$primary", "#336699", &[]),
            record("$spacing", "4px", &[]),
            record("$shadow", "0 1px 2px", &[]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_theme_candidates_respect_only_color() {
        let theme = theme();
        let context = VariableTable::new();

        let colored = Classifier::new(&context, &theme, true);
        assert!(colored.is_theme_candidate(ident("$primary").as_str()));
        assert!(!colored.is_theme_candidate(ident("$spacing").as_str()));
        // the name alone makes it color-bearing
        assert!(colored.is_theme_candidate(ident("$shadow").as_str()));

        let everything = Classifier::new(&context, &theme, false);
        assert!(everything.is_theme_candidate(ident("$spacing").as_str()));
    }

    #[test]
    fn test_local_declaration_shadows_theme() {
        let theme = theme();
        let context: VariableTable = [record("$primary", "red", &[])].into_iter().collect();
        let classifier = Classifier::new(&context, &theme, false);
        assert!(!classifier.is_theme_variable(ident("$primary").as_str()));
        assert!(!classifier.is_theme_candidate(ident("$primary").as_str()));
    }

    #[test]
    fn test_reference_variables() {
        let theme = theme();
        let context: VariableTable = [
            record("$link", "#336699", &["$primary"]),
            record("$link-hover", "#336699", &["$link", "$primary"]),
            record("$gap", "8px", &[]),
            record("$mixed", "#336699 8px", &["$primary", "$gap"]),
        ]
        .into_iter()
        .collect();
        let classifier = Classifier::new(&context, &theme, true);

        assert!(classifier.is_reference(ident("$link").as_str()));
        assert!(classifier.is_reference(ident("$link-hover").as_str()));
        assert!(!classifier.is_reference(ident("$gap").as_str()));
        assert!(!classifier.is_reference(ident("$mixed").as_str()));
        assert!(!classifier.is_reference(ident("$primary").as_str()));
    }

    #[test]
    fn test_reference_cycle_terminates() {
        let theme = theme();
        let context: VariableTable = [
            record("$a", "x", &["$b"]),
            record("$b", "x", &["$a"]),
        ]
        .into_iter()
        .collect();
        let classifier = Classifier::new(&context, &theme, true);
        assert!(!classifier.is_reference(ident("$a").as_str()));
        assert!(!classifier.is_reference(ident("$b").as_str()));
    }

    #[test]
    fn test_deep_reference_chain_shares_dependencies() {
        let theme = theme();
        let context: VariableTable = [
            record("$link", "#336699", &["$primary"]),
            record("$hover", "#336699", &["$link"]),
            record("$btn", "#336699 #336699", &["$link", "$hover"]),
            record("$btn-active", "#336699", &["$btn", "$hover", "$link"]),
        ]
        .into_iter()
        .collect();
        let classifier = Classifier::new(&context, &theme, true);
        for name in ["$link", "$hover", "$btn", "$btn-active"] {
            assert!(classifier.is_reference(ident(name).as_str()), "{name}");
        }
    }

    #[test]
    fn test_diamond_reference_with_local_leaf() {
        let theme = theme();
        let context: VariableTable = [
            record("$gap", "8px", &[]),
            record("$left", "#336699", &["$primary"]),
            record("$right", "8px", &["$gap"]),
            record("$top", "#336699 8px", &["$left", "$right"]),
            record("$both", "#336699", &["$left", "$left"]),
        ]
        .into_iter()
        .collect();
        let classifier = Classifier::new(&context, &theme, true);
        assert!(!classifier.is_reference(ident("$top").as_str()));
        assert!(classifier.is_reference(ident("$both").as_str()));
        let classification = classifier.classify();
        assert_eq!(
            classification.reference,
            vec![ident("$left"), ident("$both")]
        );
    }

    #[test]
    fn test_classify_partition_is_idempotent() {
        let theme = theme();
        let context: VariableTable = [
            record("$link", "#336699", &["$primary"]),
            record("$gap", "8px", &[]),
        ]
        .into_iter()
        .collect();
        let classifier = Classifier::new(&context, &theme, true);
        let first = classifier.classify();
        assert_eq!(first.theme, vec![ident("$primary"), ident("$shadow")]);
        assert_eq!(first.reference, vec![ident("$link")]);
        assert_eq!(first.context, vec![ident("$gap")]);
        assert_eq!(classifier.classify(), first);
    }
}
