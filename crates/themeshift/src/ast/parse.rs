//! Lossless stylesheet tree builder on the `cssparser` tokenizer.
//!
//! The tokenizer takes care of strings, comments, escapes and bracket nesting;
//! this module decides where statements start and end and slices every byte of
//! formatting back out of the source into [`Raws`], so the tree prints back
//! unchanged. Values and selectors are kept as opaque text; the value tokenizer
//! in [`crate::value`] does the fine grained work later.
//!
//! Preprocessor accommodations:
//! - `//` line comments (every dialect but plain CSS) become [`Comment`]s.
//! - Less `@name: value;` at any level is a declaration, not an at-rule.
//! - Scss `#{...}` and Less `@{...}` interpolation may contain braces and
//!   semicolons.
//! - A statement without a colon, such as the Less mixin call
//!   `.bordered();`, is kept as a declaration with an empty value.

use std::borrow::Cow;
use std::ops::Range;
use std::path::{Path, PathBuf};

use cssparser::{ParseError, Parser, ParserInput, Token};

use super::{AtRule, Comment, Declaration, Node, Raws, Root, Rule};
use crate::config::Dialect;
use crate::error::{Result, ThemeError};

/// Parses stylesheet source into a [`Root`].
pub fn parse(source: &str, dialect: Dialect) -> Result<Root> {
    TreeBuilder::new(source, dialect, None).build()
}

/// Parses stylesheet source read from `path`; the path is recorded on the root
/// and in error messages.
pub fn parse_file(path: &Path, source: &str, dialect: Dialect) -> Result<Root> {
    TreeBuilder::new(source, dialect, Some(path.to_path_buf())).build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Semicolon,
    Block,
    End,
}

/// Byte offsets of one statement, as found by [`TreeBuilder::scan`].
#[derive(Debug)]
struct Statement {
    /// Start of the first significant token.
    first: Option<usize>,
    /// End of the last significant token.
    end: usize,
    /// First top-level colon: end of the text before it, and start of the
    /// first significant token after it.
    colon: Option<(usize, Option<usize>)>,
    terminator: Terminator,
    /// Offset of the `;` or `{`, or where the statement ran out.
    terminator_at: usize,
}

struct TreeBuilder<'a> {
    src: &'a str,
    dialect: Dialect,
    path: Option<PathBuf>,
    /// `//` comments, blanked out of the text handed to the tokenizer.
    line_comments: Vec<Range<usize>>,
}

impl<'a> TreeBuilder<'a> {
    fn new(src: &'a str, dialect: Dialect, path: Option<PathBuf>) -> Self {
        Self {
            src,
            dialect,
            path,
            line_comments: Vec::new(),
        }
    }

    fn build(mut self) -> Result<Root> {
        // offsets in the masked text are offsets in `src`
        let masked = if self.dialect == Dialect::Css {
            Cow::Borrowed(self.src)
        } else {
            let (masked, comments) = mask_line_comments(self.src);
            self.line_comments = comments;
            Cow::Owned(masked)
        };
        let mut input = ParserInput::new(&masked);
        let mut parser = Parser::new(&mut input);
        let (nodes, after) = self.parse_nodes(&mut parser)?;
        Ok(Root {
            nodes,
            after,
            source: self.path,
        })
    }

    /// Parses children until the input (or the enclosing block) is exhausted.
    /// Returns the nodes and the whitespace before the end.
    fn parse_nodes<'i>(&self, input: &mut Parser<'i, '_>) -> Result<(Vec<Node>, String)> {
        let mut nodes = Vec::new();
        let mut pending = String::new();

        loop {
            let state = input.state();
            let start = state.position().byte_index();
            let token = match input.next_including_whitespace_and_comments() {
                Ok(token) => token.clone(),
                Err(_) => return Ok((nodes, pending)),
            };
            let end = input.position().byte_index();

            match token {
                Token::WhiteSpace(_) => self.push_whitespace(start..end, &mut pending, &mut nodes),
                Token::Comment(_) => {
                    self.check_comment(start, end)?;
                    nodes.push(Node::Comment(Comment {
                        text: self.src[start + 2..end - 2].to_string(),
                        inline: false,
                        raws: Raws {
                            before: std::mem::take(&mut pending),
                            ..Raws::default()
                        },
                    }));
                }
                Token::Semicolon => pending.push(';'),
                // nested parsers stop before their closing brace
                Token::CloseCurlyBracket => return Err(self.error_at(start, "unexpected '}'")),
                Token::AtKeyword(ref name) if !self.at_less_variable(name, input) => {
                    let at = self.parse_at_rule(input, start, end, std::mem::take(&mut pending))?;
                    nodes.push(Node::AtRule(at));
                }
                _ => {
                    input.reset(&state);
                    let node = self.parse_statement(input, std::mem::take(&mut pending))?;
                    nodes.push(node);
                }
            }
        }
    }

    /// Appends whitespace to `pending`, splitting out any `//` comments that
    /// were blanked inside it.
    fn push_whitespace(&self, range: Range<usize>, pending: &mut String, nodes: &mut Vec<Node>) {
        let mut cursor = range.start;
        let first = self
            .line_comments
            .partition_point(|comment| comment.start < range.start);
        for comment in self.line_comments[first..]
            .iter()
            .take_while(|comment| comment.start < range.end)
        {
            pending.push_str(&self.src[cursor..comment.start]);
            nodes.push(Node::Comment(Comment {
                text: self.src[comment.start + 2..comment.end].to_string(),
                inline: true,
                raws: Raws {
                    before: std::mem::take(pending),
                    ..Raws::default()
                },
            }));
            cursor = comment.end;
        }
        pending.push_str(&self.src[cursor..range.end]);
    }

    /// `name_start..name_end` covers the `@name` token just consumed.
    fn parse_at_rule<'i>(
        &self,
        input: &mut Parser<'i, '_>,
        name_start: usize,
        name_end: usize,
        before: String,
    ) -> Result<AtRule> {
        let statement = self.scan(input, name_end)?;
        let params_start = statement.first.unwrap_or(statement.terminator_at);
        let params_end = statement.end.max(params_start);

        let mut raws = Raws {
            before,
            between: self.src[params_end..statement.terminator_at].to_string(),
            after_name: self.src[name_end..params_start].to_string(),
            ..Raws::default()
        };

        let nodes = match statement.terminator {
            Terminator::Block => {
                let (children, after) = self.parse_block(input)?;
                raws.after = after;
                Some(children)
            }
            Terminator::Semicolon => {
                raws.semicolon = true;
                None
            }
            Terminator::End => None,
        };

        Ok(AtRule {
            name: self.src[name_start + 1..name_end].to_string(),
            params: self.src[params_start..params_end].to_string(),
            nodes,
            raws,
        })
    }

    /// Parses a rule (terminated by `{`) or a declaration (terminated by `;`,
    /// the end of the enclosing block or the end of input).
    fn parse_statement<'i>(&self, input: &mut Parser<'i, '_>, before: String) -> Result<Node> {
        let from = input.position().byte_index();
        let statement = self.scan(input, from)?;
        let start = statement.first.unwrap_or(from);
        let end = statement.end.max(start);

        if statement.terminator == Terminator::Block {
            let between = self.src[end..statement.terminator_at].to_string();
            let (children, after) = self.parse_block(input)?;
            return Ok(Node::Rule(Rule {
                selector: self.src[start..end].to_string(),
                nodes: children,
                raws: Raws {
                    before,
                    between,
                    after,
                    ..Raws::default()
                },
            }));
        }

        let semicolon = statement.terminator == Terminator::Semicolon;
        let (prop_end, value_start) = match statement.colon {
            Some((prop_end, value_start)) => {
                (prop_end.max(start), value_start.unwrap_or(statement.terminator_at))
            }
            // no colon: the whole statement is the prop
            None => (end, end),
        };
        let value_end = end.max(value_start);

        Ok(Node::Decl(Declaration {
            prop: self.src[start..prop_end].to_string(),
            value: self.src[value_start..value_end].to_string(),
            raws: Raws {
                before,
                between: self.src[prop_end..value_start].to_string(),
                after: self.src[value_end..statement.terminator_at].to_string(),
                semicolon,
                ..Raws::default()
            },
        }))
    }

    /// Consumes tokens up to and including the next top-level `;` or `{`, or
    /// up to the end of the enclosing block.
    fn scan<'i>(&self, input: &mut Parser<'i, '_>, from: usize) -> Result<Statement> {
        let mut statement = Statement {
            first: None,
            end: from,
            colon: None,
            terminator: Terminator::End,
            terminator_at: from,
        };
        // end of a `#` or `@` that may open an interpolation
        let mut sigil_end = None;

        loop {
            let state = input.state();
            let start = state.position().byte_index();
            let token = match input.next_including_whitespace_and_comments() {
                Ok(token) => token.clone(),
                Err(_) => {
                    statement.terminator_at = start;
                    return Ok(statement);
                }
            };
            let interpolation = sigil_end.take() == Some(start);
            let opens_colon = matches!(token, Token::Colon) && statement.colon.is_none();

            match token {
                Token::WhiteSpace(_) => continue,
                Token::Semicolon => {
                    statement.terminator = Terminator::Semicolon;
                    statement.terminator_at = start;
                    return Ok(statement);
                }
                Token::CurlyBracketBlock if !interpolation => {
                    statement.terminator = Terminator::Block;
                    statement.terminator_at = start;
                    return Ok(statement);
                }
                Token::CloseCurlyBracket => {
                    input.reset(&state);
                    statement.terminator_at = start;
                    return Ok(statement);
                }
                Token::Function(_)
                | Token::ParenthesisBlock
                | Token::SquareBracketBlock
                | Token::CurlyBracketBlock => self.skip_block(input)?,
                Token::Delim('#') | Token::Delim('@') => {
                    sigil_end = Some(input.position().byte_index());
                }
                Token::QuotedString(_) | Token::BadString(_) => {
                    self.check_string(start, input.position().byte_index())?;
                }
                Token::Comment(_) => self.check_comment(start, input.position().byte_index())?,
                _ => {}
            }

            if opens_colon {
                statement.colon = Some((statement.end, None));
            } else if let Some((_, value_start)) = statement.colon.as_mut() {
                value_start.get_or_insert(start);
            }
            statement.first.get_or_insert(start);
            statement.end = input.position().byte_index();
        }
    }

    /// Parses the children of the block whose `{` was just consumed, and the
    /// closing `}`.
    fn parse_block<'i>(&self, input: &mut Parser<'i, '_>) -> Result<(Vec<Node>, String)> {
        let mut parsed = None;
        let mut inner_end = input.position().byte_index();
        let _ = input.parse_nested_block(|block| {
            parsed = Some(self.parse_nodes(block));
            inner_end = block.position().byte_index();
            Ok::<(), ParseError<'i, ()>>(())
        });
        let children = parsed.unwrap_or_else(|| Err(self.error_at(inner_end, "malformed block")))?;
        // a closed block leaves the outer parser past its `}`
        if input.position().byte_index() <= inner_end {
            return Err(self.error_at(self.src.len(), "unclosed block"));
        }
        Ok(children)
    }

    /// Skips the contents of the block just opened, checking strings and
    /// comments inside it.
    fn skip_block<'i>(&self, input: &mut Parser<'i, '_>) -> Result<()> {
        let mut failure = None;
        let _ = input.parse_nested_block(|block| {
            failure = self.skip_tokens(block).err();
            Ok::<(), ParseError<'i, ()>>(())
        });
        failure.map_or(Ok(()), Err)
    }

    fn skip_tokens<'i>(&self, input: &mut Parser<'i, '_>) -> Result<()> {
        loop {
            let start = input.position().byte_index();
            let token = match input.next_including_whitespace_and_comments() {
                Ok(token) => token.clone(),
                Err(_) => return Ok(()),
            };
            let end = input.position().byte_index();
            match token {
                Token::QuotedString(_) | Token::BadString(_) => self.check_string(start, end)?,
                Token::Comment(_) => self.check_comment(start, end)?,
                Token::Function(_)
                | Token::ParenthesisBlock
                | Token::SquareBracketBlock
                | Token::CurlyBracketBlock => self.skip_block(input)?,
                _ => {}
            }
        }
    }

    /// The tokenizer ends an unterminated string at a newline or at the end
    /// of input; both are errors here.
    fn check_string(&self, start: usize, end: usize) -> Result<()> {
        let raw = self.src[start..end].as_bytes();
        if raw.len() >= 2 && raw[raw.len() - 1] == raw[0] {
            Ok(())
        } else {
            Err(self.error_at(start, "unclosed string"))
        }
    }

    fn check_comment(&self, start: usize, end: usize) -> Result<()> {
        let raw = &self.src[start..end];
        if raw.len() >= 4 && raw.ends_with("*/") {
            Ok(())
        } else {
            Err(self.error_at(start, "unclosed comment"))
        }
    }

    /// Returns true when the at-keyword just consumed is a Less variable
    /// declaration (`@name:`). The parser is left where it was.
    fn at_less_variable(&self, name: &str, input: &mut Parser<'_, '_>) -> bool {
        if self.dialect != Dialect::Less || name.eq_ignore_ascii_case("page") {
            return false;
        }
        let state = input.state();
        let colon = loop {
            match input.next_including_whitespace_and_comments() {
                Ok(Token::WhiteSpace(_)) | Ok(Token::Comment(_)) => continue,
                Ok(Token::Colon) => break true,
                _ => break false,
            }
        };
        input.reset(&state);
        colon
    }

    fn error_at(&self, offset: usize, message: &str) -> ThemeError {
        let offset = offset.min(self.src.len());
        let consumed = &self.src[..offset];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
        ThemeError::Parse {
            path: self.path.clone(),
            line,
            column,
            message: message.to_string(),
        }
    }
}

/// Replaces every `//` comment with spaces up to the end of its line and
/// returns the masked text with the comments' byte ranges.
///
/// Only a `//` that the tokenizer sees as two delimiters (or a delimiter and
/// a `/*`) counts, so strings, `url(...)` and `/*...*/` never start one; nor
/// does one right after a colon, as in an unquoted `http://host`.
fn mask_line_comments(src: &str) -> (String, Vec<Range<usize>>) {
    let mut masked = src.to_string();
    let mut comments = Vec::new();
    let mut offset = 0;
    while let Some(start) = next_line_comment(&masked[offset..]).map(|at| offset + at) {
        let mut end = masked[start..].find('\n').map_or(masked.len(), |at| start + at);
        if masked[start..end].ends_with('\r') {
            end -= 1;
        }
        masked.replace_range(start..end, &" ".repeat(end - start));
        comments.push(start..end);
        offset = end;
    }
    (masked, comments)
}

fn next_line_comment(src: &str) -> Option<usize> {
    let mut input = ParserInput::new(src);
    let mut parser = Parser::new(&mut input);
    find_line_comment(&mut parser, src)
}

fn find_line_comment<'i>(input: &mut Parser<'i, '_>, src: &str) -> Option<usize> {
    loop {
        let start = input.position().byte_index();
        let token = input.next_including_whitespace_and_comments().ok()?.clone();
        match token {
            Token::Delim('/') => {
                let state = input.state();
                let doubled = matches!(
                    input.next_including_whitespace_and_comments(),
                    Ok(Token::Delim('/')) | Ok(Token::Comment(_))
                );
                if doubled && !src[..start].ends_with(':') {
                    return Some(start);
                }
                input.reset(&state);
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => {
                let mut found = None;
                let _ = input.parse_nested_block(|block| {
                    found = find_line_comment(block, src);
                    Ok::<(), ParseError<'i, ()>>(())
                });
                if found.is_some() {
                    return found;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(source: &str, dialect: Dialect) {
        let root = parse(source, dialect).unwrap();
        assert_eq!(root.to_css(), source);
    }

    // =========================================================================
    // Structure
    // =========================================================================

    #[test]
    fn test_parse_rule_with_declarations() {
        let root = parse(".a { color: red; background: blue }", Dialect::Css).unwrap();
        assert_eq!(root.nodes.len(), 1);
        let Node::Rule(rule) = &root.nodes[0] else {
            panic!("expected rule");
        };
        assert_eq!(rule.selector, ".a");
        let decls: Vec<_> = rule.decls().collect();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].prop, "color");
        assert_eq!(decls[0].value, "red");
        assert!(decls[0].raws.semicolon);
        assert_eq!(decls[1].value, "blue");
        assert!(!decls[1].raws.semicolon);
    }

    #[test]
    fn test_parse_top_level_scss_variable() {
        let root = parse("$primary: #f00 !default;\n", Dialect::Scss).unwrap();
        let Node::Decl(decl) = &root.nodes[0] else {
            panic!("expected declaration");
        };
        assert_eq!(decl.prop, "$primary");
        assert_eq!(decl.value, "#f00 !default");
    }

    #[test]
    fn test_parse_less_variable_is_declaration() {
        let root = parse("@primary : red;\n@media screen { .a { color: @primary } }", Dialect::Less)
            .unwrap();
        assert!(matches!(&root.nodes[0], Node::Decl(d) if d.prop == "@primary" && d.value == "red"));
        assert!(matches!(&root.nodes[1], Node::AtRule(a) if a.name == "media"));
    }

    #[test]
    fn test_parse_at_rules() {
        let root = parse("@import 'theme.css';\n@media (min-width: 1px) { a { b: c } }", Dialect::Css)
            .unwrap();
        let Node::AtRule(import) = &root.nodes[0] else {
            panic!("expected import");
        };
        assert_eq!(import.name, "import");
        assert_eq!(import.params, "'theme.css'");
        assert!(import.nodes.is_none());

        let Node::AtRule(media) = &root.nodes[1] else {
            panic!("expected media");
        };
        assert_eq!(media.params, "(min-width: 1px)");
        assert_eq!(media.nodes.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_semicolons_inside_urls_and_strings() {
        let css = ".a { background: url(data:image/png;base64,AAA); content: \"a;b\"; }";
        let root = parse(css, Dialect::Css).unwrap();
        let Node::Rule(rule) = &root.nodes[0] else {
            panic!("expected rule");
        };
        let values: Vec<_> = rule.decls().map(|d| d.value.as_str()).collect();
        assert_eq!(values, vec!["url(data:image/png;base64,AAA)", "\"a;b\""]);
    }

    #[test]
    fn test_scss_interpolation_kept_in_value() {
        let root = parse(":root { --a: #{$b}; }", Dialect::Scss).unwrap();
        let Node::Rule(rule) = &root.nodes[0] else {
            panic!("expected rule");
        };
        assert_eq!(rule.decls().next().map(|d| d.value.as_str()), Some("#{$b}"));
    }

    #[test]
    fn test_line_comments_become_comment_nodes() {
        let root = parse(
            "// Primary brand color\n$primary: #336699;\n.a {\n  color: $primary; // brand\n}\n",
            Dialect::Scss,
        )
        .unwrap();
        assert!(matches!(
            &root.nodes[0],
            Node::Comment(c) if c.inline && c.text == " Primary brand color"
        ));
        assert!(matches!(&root.nodes[1], Node::Decl(d) if d.prop == "$primary" && d.value == "#336699"));
        let Node::Rule(rule) = &root.nodes[2] else {
            panic!("expected rule");
        };
        assert!(matches!(&rule.nodes[1], Node::Comment(c) if c.inline && c.text == " brand"));
        assert_eq!(rule.raws.after, "\n");
    }

    #[test]
    fn test_apostrophe_in_line_comment_is_not_a_string() {
        let root = parse("// don't touch\n$a: red;", Dialect::Scss).unwrap();
        assert!(matches!(&root.nodes[1], Node::Decl(d) if d.prop == "$a" && d.value == "red"));
    }

    #[test]
    fn test_double_slash_after_colon_is_not_a_comment() {
        let root = parse(
            "$host: http://cdn.example.com;\n.a { background: url(//cdn/x.png); }",
            Dialect::Scss,
        )
        .unwrap();
        assert!(matches!(&root.nodes[0], Node::Decl(d) if d.value == "http://cdn.example.com"));
        let Node::Rule(rule) = &root.nodes[1] else {
            panic!("expected rule");
        };
        assert_eq!(rule.decls().next().map(|d| d.value.as_str()), Some("url(//cdn/x.png)"));
    }

    #[test]
    fn test_plain_css_has_no_line_comments() {
        let root = parse(".a { b: c } // d", Dialect::Css).unwrap();
        assert!(!root.nodes.iter().any(|n| matches!(n, Node::Comment(_))));
    }

    #[test]
    fn test_less_mixin_call_is_kept_as_declaration() {
        let root = parse(".a {\n  .bordered();\n  color: @primary;\n}", Dialect::Less).unwrap();
        let Node::Rule(rule) = &root.nodes[0] else {
            panic!("expected rule");
        };
        let decls: Vec<_> = rule.decls().collect();
        assert_eq!(decls[0].prop, ".bordered()");
        assert_eq!(decls[0].value, "");
        assert!(decls[0].raws.semicolon);
        assert_eq!(decls[1].prop, "color");
        assert_eq!(decls[1].value, "@primary");
    }

    #[test]
    fn test_interpolated_selector_is_one_rule() {
        let root = parse(".icon-#{$name} { a: b; }\n.x-@{n} { c: d; }", Dialect::Scss).unwrap();
        assert!(matches!(&root.nodes[0], Node::Rule(r) if r.selector == ".icon-#{$name}"));
    }

    // =========================================================================
    // Lossless printing
    // =========================================================================

    #[test]
    fn test_roundtrip_preserves_formatting() {
        roundtrip(
            "/* header */\n:root{--a:red;--b : var(--a) ;}\n\n.x,\n.y {\n  color: var(--b)\n}\n",
            Dialect::Css,
        );
        roundtrip(
            "@use 'theme';\n$a: 1px  !default;\n.b { &:hover { c: d; } }\n;\n",
            Dialect::Scss,
        );
        roundtrip("@keyframes spin { from { a: b } to { a: c } }", Dialect::Css);
        roundtrip("@charset \"utf-8\"", Dialect::Css);
    }

    #[test]
    fn test_roundtrip_preserves_line_comments() {
        roundtrip(
            "// theme\r\n$a: red; // base\n.b {\n  // nested\n  c: $a // trailing\n}\n//",
            Dialect::Scss,
        );
        roundtrip("//x\n@a: red;\n.b { .mixin(); c: @a; }\n", Dialect::Less);
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn test_unclosed_block_reports_position() {
        let err = parse(".a {\n  color: red;\n", Dialect::Css).unwrap_err();
        match err {
            ThemeError::Parse { line, message, .. } => {
                assert_eq!(line, 3);
                assert_eq!(message, "unclosed block");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unclosed_string_is_error() {
        assert!(parse(".a { content: \"oops }", Dialect::Css).is_err());
    }

    #[test]
    fn test_unclosed_comment_is_error() {
        let err = parse(".a { b: c; }\n/* open", Dialect::Css).unwrap_err();
        assert!(matches!(err, ThemeError::Parse { line: 2, column: 1, .. }));
    }

    #[test]
    fn test_stray_closing_brace_is_error() {
        assert!(parse("a { b: c } }", Dialect::Css).is_err());
    }

    #[test]
    fn test_parse_file_records_source() {
        let root = parse_file(Path::new("/a/theme.css"), ":root{}", Dialect::Css).unwrap();
        assert_eq!(root.source.as_deref(), Some(Path::new("/a/theme.css")));
    }
}
