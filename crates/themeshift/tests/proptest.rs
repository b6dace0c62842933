//! Property-based tests for themeshift using proptest.

use std::path::Path;

use proptest::prelude::*;
use themeshift::classifier::Classifier;
use themeshift::resolver::Resolver;
use themeshift::scanner::scan;
use themeshift::{parse, Dialect, IdentMode, UrlTracker, VariableIdent, VariableTable};

// ============================================================================
// Test helpers
// ============================================================================

fn resolved(source: &str, dialect: Dialect, externals: &[VariableTable]) -> VariableTable {
    let root = parse(source, dialect).expect("generated source parses");
    let file = Path::new("/p/app.scss");
    let mut table = scan(&root, Some(file), dialect, IdentMode::Debug);
    let mut urls = UrlTracker::new();
    Resolver::new(dialect, IdentMode::Debug, externals, Some(file), &mut urls)
        .resolve_table(&mut table)
        .expect("generated values resolve");
    table
}

// Plain values: no sigils, no var(), no priority markers.
fn plain_value() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            "[a-z]{1,8}",
            "[0-9]{1,3}(px|em|%)",
            "#[0-9a-f]{6}",
            Just("rgba(0, 0, 0, .5)".to_string()),
            Just("url(./a.png)".to_string()),
        ],
        1..4,
    )
    .prop_map(|parts| parts.join(" "))
}

// Small variable graphs: entry N may reference any entry M, cycles included.
fn variable_graph() -> impl Strategy<Value = Vec<(String, Vec<usize>)>> {
    prop::collection::vec(
        ("[a-z]{1,6}", prop::collection::vec(0usize..6, 0..3)),
        1..6,
    )
}

fn graph_source(graph: &[(String, Vec<usize>)], declared: &str, referenced: &str) -> String {
    graph
        .iter()
        .enumerate()
        .map(|(i, (text, refs))| {
            let refs: Vec<String> = refs.iter().map(|r| format!("${}{}", referenced, r)).collect();
            format!("${}{}: {} {};\n", declared, i, text, refs.join(" "))
        })
        .collect()
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// The same name always yields the same ident, in either mode.
    #[test]
    fn ident_is_deterministic(name in "[$@]?-{0,2}[a-zA-Z0-9_-]{1,20}") {
        for mode in [IdentMode::Debug, IdentMode::Production] {
            let first = VariableIdent::new(&name, mode);
            let second = VariableIdent::new(&name, mode);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.as_str().starts_with("--"));
            prop_assert!(!first.as_str()[2..].starts_with(|c: char| c.is_ascii_digit()));
            prop_assert!(first
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    /// A value without references resolves to itself.
    #[test]
    fn values_without_references_resolve_to_themselves(value in plain_value()) {
        let table = resolved(&format!(":root {{ --x: {} !important; }}", value), Dialect::Css, &[]);
        let record = &table[0];
        prop_assert!(record.dependencies.is_empty());
        prop_assert_eq!(&record.resolved_value, &value);
    }

    /// Resolution terminates on arbitrary graphs, never keeps a self edge and
    /// leaves no reference behind.
    #[test]
    fn resolution_terminates_without_self_edges(graph in variable_graph()) {
        let table = resolved(&graph_source(&graph, "v", "v"), Dialect::Scss, &[]);
        for record in table.iter() {
            prop_assert!(record.parsed);
            prop_assert!(!record.dependencies.contains(&record.ident));
            prop_assert!(!record.resolved_value.contains('$'));
        }
    }

    /// Classifying twice gives the same partition, and the partition covers
    /// the local table exactly once.
    #[test]
    fn classification_is_idempotent(
        theme_graph in variable_graph(),
        local_graph in variable_graph(),
        only_color in any::<bool>(),
    ) {
        let theme = resolved(&graph_source(&theme_graph, "v", "v"), Dialect::Scss, &[]);
        // locals reference theme variables, and shadow some of them
        let mut local_source = graph_source(&local_graph, "w", "v");
        local_source.push_str("$v0: red;\n");
        let local = resolved(&local_source, Dialect::Scss, std::slice::from_ref(&theme));

        let classifier = Classifier::new(&local, &theme, only_color);
        let first = classifier.classify();
        prop_assert_eq!(&first, &classifier.classify());
        prop_assert_eq!(first.reference.len() + first.context.len(), local.len());
        for ident in &first.theme {
            prop_assert!(!local.contains(ident.as_str()));
        }
    }
}
