//! Scopes a stylesheet to one theme.
//!
//! Every rule is restricted to documents whose root carries the theme
//! attribute, and keyframes are renamed so two themes can define the same
//! animation differently:
//!
//! ```css
//! html { ... }                 html[data-theme="dark"] { ... }
//! .btn { ... }           =>    :root[data-theme="dark"] .btn { ... }
//! @keyframes spin { ... }      @keyframes spin-dark { ... }
//! .x { animation: spin 1s; }   :root[data-theme="dark"] .x { animation: spin-dark 1s; }
//! ```

use std::collections::HashMap;

use cssparser::{Parser, ParserInput, Token};
use tracing::debug;

use crate::ast::{split_top_level, AtRule, Declaration, Node, Root, Rule};
use crate::value::{malformed, TokenResult, ValueError};

/// Keyframe names that are CSS-wide keywords and are never renamed.
const RESERVED_NAMES: &[&str] = &[
    "none",
    "initial",
    "inherit",
    "unset",
    "revert",
    "revert-layer",
    "default",
];

/// Grouping at-rules whose children are scoped too.
const CONDITIONAL_AT_RULES: &[&str] = &["media", "supports", "document", "layer", "container"];

/// Annotates `root` in place for `theme`, using `attribute` on the root
/// element.
pub fn annotate(root: &mut Root, theme: &str, attribute: &str) {
    let marker = format!("[{}=\"{}\"]", attribute, theme);

    let mut renamed = HashMap::new();
    rename_keyframes(&mut root.nodes, theme, &mut renamed);
    scope_nodes(&mut root.nodes, &marker, &renamed);
    debug!(theme, keyframes = renamed.len(), "scoped stylesheet");
}

fn rename_keyframes(nodes: &mut [Node], theme: &str, renamed: &mut HashMap<String, String>) {
    for node in nodes {
        let Node::AtRule(at) = node else { continue };
        let name = at.unprefixed_name();
        if name == "keyframes" {
            if let Some((old, new)) = renamed_keyframe(&at.params, theme) {
                at.params = new.clone();
                renamed.insert(unquote(&old).to_string(), unquote(&new).to_string());
            }
        } else if CONDITIONAL_AT_RULES.contains(&name.as_str()) {
            if let Some(children) = at.nodes.as_mut() {
                rename_keyframes(children, theme, renamed);
            }
        }
    }
}

/// Returns `(old, new)` params for a keyframes at-rule, quotes preserved.
fn renamed_keyframe(params: &str, theme: &str) -> Option<(String, String)> {
    let name = params.trim();
    if name.is_empty() {
        return None;
    }
    let bare = unquote(name);
    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(bare)) {
        return None;
    }
    let new = if bare.len() == name.len() {
        format!("{}-{}", bare, theme)
    } else {
        let quote = &name[..1];
        format!("{quote}{bare}-{theme}{quote}")
    };
    Some((name.to_string(), new))
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

fn scope_nodes(nodes: &mut [Node], marker: &str, renamed: &HashMap<String, String>) {
    for node in nodes {
        match node {
            Node::Rule(rule) => scope_rule(rule, marker, renamed),
            Node::AtRule(at) => scope_at_rule(at, marker, renamed),
            Node::Decl(_) | Node::Comment(_) => {}
        }
    }
}

fn scope_at_rule(at: &mut AtRule, marker: &str, renamed: &HashMap<String, String>) {
    let name = at.unprefixed_name();
    if !CONDITIONAL_AT_RULES.contains(&name.as_str()) {
        return;
    }
    if let Some(children) = at.nodes.as_mut() {
        scope_nodes(children, marker, renamed);
    }
}

fn scope_rule(rule: &mut Rule, marker: &str, renamed: &HashMap<String, String>) {
    rule.selector = scope_selector(&rule.selector, marker);
    if renamed.is_empty() {
        return;
    }
    for child in &mut rule.nodes {
        if let Node::Decl(decl) = child {
            rename_animation(decl, renamed);
        }
    }
}

/// Scopes every branch of a selector list. Whitespace around branches is
/// preserved.
pub fn scope_selector(selector: &str, marker: &str) -> String {
    split_top_level(selector, ',')
        .into_iter()
        .map(|branch| {
            let trimmed = branch.trim_start();
            let lead = &branch[..branch.len() - trimmed.len()];
            format!("{}{}", lead, scope_branch(trimmed, marker))
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn scope_branch(branch: &str, marker: &str) -> String {
    let single_quoted = marker.replace('"', "'");
    let carries = |token: &str| token.contains(marker) || token.contains(&single_quoted);
    let leads = |rest: &str| rest.starts_with(marker) || rest.starts_with(&single_quoted);
    match root_token_len(branch) {
        // already scoped: the marker sits on the root token
        Some(len) if carries(&branch[..len]) || leads(&branch[len..]) => branch.to_string(),
        Some(len) => format!("{}{}{}", &branch[..len], marker, &branch[len..]),
        None => format!(":root{} {}", marker, branch),
    }
}

/// Length of a leading token that selects the root element: `html`, or
/// `:root` preceded by any number of attribute selectors.
fn root_token_len(branch: &str) -> Option<usize> {
    let lower = branch.to_ascii_lowercase();
    let end = if lower.starts_with("html") {
        4
    } else {
        let mut pos = 0;
        while lower[pos..].starts_with('[') {
            pos += lower[pos..].find(']')? + 1;
        }
        if !lower[pos..].starts_with(":root") {
            return None;
        }
        pos + ":root".len()
    };
    let continues_ident = lower[end..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    (!continues_ident).then_some(end)
}

fn rename_animation(decl: &mut Declaration, renamed: &HashMap<String, String>) {
    let prop = decl.prop.to_ascii_lowercase();
    let unprefixed = match prop.strip_prefix('-') {
        Some(rest) => rest.find('-').map_or(prop.as_str(), |i| &rest[i + 1..]),
        None => prop.as_str(),
    };
    if unprefixed != "animation" && unprefixed != "animation-name" {
        return;
    }
    match rename_animation_value(&decl.value, renamed) {
        Ok(value) => decl.value = value,
        Err(err) => debug!(error = %err, "animation value left unchanged"),
    }
}

fn rename_animation_value(
    value: &str,
    renamed: &HashMap<String, String>,
) -> crate::error::Result<String> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut out = String::with_capacity(value.len());
    rename_tokens(&mut parser, renamed, &mut out).map_err(|e| malformed(value, e))?;
    Ok(out)
}

fn rename_tokens<'i>(
    input: &mut Parser<'i, '_>,
    renamed: &HashMap<String, String>,
    out: &mut String,
) -> TokenResult<'i, ()> {
    loop {
        let start = input.position();
        let token = match input.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };
        match token {
            Token::Ident(ref name) => match renamed.get(&**name) {
                Some(new) => out.push_str(new),
                None => out.push_str(input.slice_from(start)),
            },
            Token::QuotedString(ref name) => match renamed.get(&**name) {
                Some(new) => {
                    let raw = input.slice_from(start);
                    let quote = &raw[..1];
                    out.push_str(&format!("{quote}{new}{quote}"));
                }
                None => out.push_str(input.slice_from(start)),
            },
            Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock => {
                let close = if matches!(token, Token::SquareBracketBlock) {
                    ']'
                } else {
                    ')'
                };
                out.push_str(input.slice_from(start));
                // names inside functions (`steps(2, end)`, `var(...)`) are not keyframes
                input.parse_nested_block(|input| {
                    let inner = input.position();
                    while input.next_including_whitespace_and_comments().is_ok() {}
                    out.push_str(input.slice_from(inner));
                    Ok::<(), cssparser::ParseError<'i, ValueError>>(())
                })?;
                out.push(close);
            }
            _ => out.push_str(input.slice_from(start)),
        }
    }
}
