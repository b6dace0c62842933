//! Extracts top-level variable declarations from one tree.
//!
//! Two shapes are recognized:
//!
//! ```scss
//! $primary: #336699;        // a declaration directly under the root
//! :root { --accent: red; }  // a custom property in a root-only rule
//! ```
//!
//! A rule qualifies as root-only when *every* branch of its selector list is
//! `:root` or `html`. `:root, .card { ... }` is ignored, as is anything nested
//! in at-rules or other rules.

use std::path::Path;

use tracing::debug;

use crate::ast::{Node, Root, Rule};
use crate::config::Dialect;
use crate::ident::IdentMode;
use crate::table::{VariableRecord, VariableTable};

/// Scans the top level of `root` for variable declarations.
pub fn scan(root: &Root, file: Option<&Path>, dialect: Dialect, mode: IdentMode) -> VariableTable {
    let mut table = VariableTable::new();
    let source = file.map(Path::to_path_buf);

    for (position, node) in root.nodes.iter().enumerate() {
        match node {
            Node::Decl(decl) if dialect.is_variable_name(&decl.prop) => {
                table.insert(
                    VariableRecord::new(&decl.prop, &decl.value, mode)
                        .with_source(source.clone())
                        .at_position(position),
                );
            }
            Node::Rule(rule) if is_root_scoped(rule) => {
                for decl in rule.decls().filter(|d| d.is_custom_property()) {
                    table.insert(
                        VariableRecord::new(&decl.prop, &decl.value, mode)
                            .with_source(source.clone())
                            .at_position(position)
                            .root_scoped(true),
                    );
                }
            }
            _ => {}
        }
    }

    debug!(
        file = %file.map(|f| f.display().to_string()).unwrap_or_default(),
        variables = table.len(),
        "scanned variables"
    );
    table
}

/// Returns true if every branch of the rule's selector list selects only the
/// root element.
pub fn is_root_scoped(rule: &Rule) -> bool {
    let selectors = rule.selectors();
    !selectors.is_empty()
        && selectors
            .iter()
            .all(|s| s.eq_ignore_ascii_case(":root") || s.eq_ignore_ascii_case("html"))
}
