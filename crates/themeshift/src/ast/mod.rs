//! Stylesheet syntax tree.
//!
//! The tree is deliberately small: a [`Root`] holding [`Node`]s, where a node
//! is one of four closed variants. Every node carries [`Raws`], the whitespace
//! and punctuation around its significant parts, so that printing an
//! unmodified tree reproduces its source byte for byte.
//!
//! ```text
//! <before>selector<between>{ ...children... <after>}
//! <before>prop<between>value<after>;
//! <before>@name<after_name>params<between>{ ...children... <after>}
//! <before>/*text*/        or, for preprocessor line comments, <before>//text
//! ```

mod parse;

use std::path::PathBuf;

pub use parse::{parse, parse_file};

/// Formatting around a node's significant text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Raws {
    /// Whitespace (and stray text) preceding the node.
    pub before: String,
    /// Between selector and `{`, between prop and value (including `:`),
    /// or between at-rule params and `{`.
    pub between: String,
    /// Before the closing `}` of a block, or before the `;` of a declaration.
    pub after: String,
    /// Between the at-rule name and its params.
    pub after_name: String,
    /// Whether a declaration is terminated by `;`.
    pub semicolon: bool,
}

/// A parsed stylesheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Root {
    pub nodes: Vec<Node>,
    /// Trailing whitespace after the last node.
    pub after: String,
    /// Source file, when parsed from disk.
    pub source: Option<PathBuf>,
}

/// One child of a [`Root`] or of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Rule(Rule),
    Decl(Declaration),
    AtRule(AtRule),
    Comment(Comment),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub selector: String,
    pub nodes: Vec<Node>,
    pub raws: Raws,
}

/// A declaration. A statement without a colon, such as a Less mixin call
/// `.bordered();`, is kept as a declaration whose `prop` holds the whole
/// statement and whose `value` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub prop: String,
    /// Value text, including any trailing priority marker such as `!important`.
    pub value: String,
    pub raws: Raws,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRule {
    pub name: String,
    pub params: String,
    /// `None` for statement at-rules such as `@import "x";`.
    pub nodes: Option<Vec<Node>>,
    pub raws: Raws,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    /// A `//` line comment rather than a `/* */` block.
    pub inline: bool,
    pub raws: Raws,
}

impl Node {
    pub fn raws(&self) -> &Raws {
        match self {
            Node::Rule(rule) => &rule.raws,
            Node::Decl(decl) => &decl.raws,
            Node::AtRule(at) => &at.raws,
            Node::Comment(comment) => &comment.raws,
        }
    }

    pub fn raws_mut(&mut self) -> &mut Raws {
        match self {
            Node::Rule(rule) => &mut rule.raws,
            Node::Decl(decl) => &mut decl.raws,
            Node::AtRule(at) => &mut at.raws,
            Node::Comment(comment) => &mut comment.raws,
        }
    }
}

impl Rule {
    /// Creates a rule formatted the conventional way.
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            nodes: Vec::new(),
            raws: Raws {
                before: "\n".to_string(),
                between: " ".to_string(),
                after: "\n".to_string(),
                ..Raws::default()
            },
        }
    }

    /// Iterates over the declarations directly inside this rule.
    pub fn decls(&self) -> impl Iterator<Item = &Declaration> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Decl(d) => Some(d),
            _ => None,
        })
    }

    /// Splits the selector list into its comma-separated branches.
    pub fn selectors(&self) -> Vec<&str> {
        split_top_level(&self.selector, ',')
            .into_iter()
            .map(str::trim)
            .collect()
    }
}

impl Declaration {
    /// Creates a declaration formatted the conventional way (indented by two spaces).
    pub fn new(prop: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            prop: prop.into(),
            value: value.into(),
            raws: Raws {
                before: "\n  ".to_string(),
                between: ": ".to_string(),
                semicolon: true,
                ..Raws::default()
            },
        }
    }

    /// Returns true for custom properties (`--name`).
    pub fn is_custom_property(&self) -> bool {
        self.prop.starts_with("--")
    }
}

impl AtRule {
    /// Returns the at-rule name without vendor prefix, lowercased.
    pub fn unprefixed_name(&self) -> String {
        let name = self.name.to_ascii_lowercase();
        if let Some(rest) = name.strip_prefix('-') {
            if let Some(idx) = rest.find('-') {
                return rest[idx + 1..].to_string();
            }
        }
        name
    }
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            inline: false,
            raws: Raws {
                before: "\n".to_string(),
                ..Raws::default()
            },
        }
    }
}

impl Root {
    /// Inserts `node` at `index`. A node inserted first loses its leading
    /// newline; the node it displaces gains one if it had no leading
    /// whitespace.
    pub fn insert(&mut self, index: usize, mut node: Node) {
        let index = index.min(self.nodes.len());
        if index == 0 {
            node.raws_mut().before.clear();
            if let Some(next) = self.nodes.first_mut() {
                if next.raws().before.is_empty() {
                    next.raws_mut().before = "\n".to_string();
                }
            }
        }
        self.nodes.insert(index, node);
    }

    /// Serializes the tree back to stylesheet text.
    pub fn to_css(&self) -> String {
        let mut out = String::new();
        write_nodes(&self.nodes, &mut out);
        out.push_str(&self.after);
        out
    }
}

impl std::fmt::Display for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_css())
    }
}

fn write_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        write_node(node, out);
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Rule(rule) => {
            out.push_str(&rule.raws.before);
            out.push_str(&rule.selector);
            out.push_str(&rule.raws.between);
            out.push('{');
            write_nodes(&rule.nodes, out);
            out.push_str(&rule.raws.after);
            out.push('}');
        }
        Node::Decl(decl) => {
            out.push_str(&decl.raws.before);
            out.push_str(&decl.prop);
            out.push_str(&decl.raws.between);
            out.push_str(&decl.value);
            out.push_str(&decl.raws.after);
            if decl.raws.semicolon {
                out.push(';');
            }
        }
        Node::AtRule(at) => {
            out.push_str(&at.raws.before);
            out.push('@');
            out.push_str(&at.name);
            out.push_str(&at.raws.after_name);
            out.push_str(&at.params);
            out.push_str(&at.raws.between);
            match &at.nodes {
                Some(children) => {
                    out.push('{');
                    write_nodes(children, out);
                    out.push_str(&at.raws.after);
                    out.push('}');
                }
                None => {
                    if at.raws.semicolon {
                        out.push(';');
                    }
                }
            }
        }
        Node::Comment(comment) => {
            out.push_str(&comment.raws.before);
            if comment.inline {
                out.push_str("//");
                out.push_str(&comment.text);
            } else {
                out.push_str("/*");
                out.push_str(&comment.text);
                out.push_str("*/");
            }
        }
    }
}

/// Splits `input` on `separator` occurring outside strings, parentheses and
/// brackets. Pieces keep their surrounding whitespace.
pub fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (idx, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' | '\'' => match quote {
                Some(q) if q == c => quote = None,
                None => quote = Some(c),
                _ => {}
            },
            _ if quote.is_some() => {}
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ if c == separator && depth == 0 => {
                pieces.push(&input[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&input[start..]);
    pieces
}
