//! Value tokenization.
//!
//! Declaration values are tokenized with `cssparser` (the tokenizer used by
//! Firefox) and split into [`Segment`]s: literal text, variable references and
//! Scss interpolations. Literal text is copied from the source slice, so
//! rendering a value with every reference left alone reproduces it exactly.
//!
//! Recognized reference forms:
//!
//! | Form | Dialects |
//! |------|----------|
//! | `var(--name)`, `var(--name, fallback)` | all |
//! | `$name` | Scss, Stylus |
//! | `@name` | Less |

pub mod color;
pub mod url;

use cssparser::{ParseError, ParseErrorKind, Parser, ParserInput, Token};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, ThemeError};

/// One piece of a tokenized value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, copied verbatim.
    Text(String),
    /// A variable reference.
    Reference(Reference),
    /// Scss `#{...}` interpolation.
    Interpolation(Vec<Segment>),
}

/// A variable reference found in a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Referenced name including its sigil (`--a`, `$a`, `@a`). Empty for `var()`.
    pub name: String,
    /// Fallback of a `var()` reference.
    pub fallback: Option<Vec<Segment>>,
    /// Source text of the whole reference.
    pub raw: String,
    pub kind: ReferenceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `var(--name[, fallback])`
    Var,
    /// A preprocessor sigil reference (`$name`, `@name`).
    Sigil,
}

/// Errors raised while walking value tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ValueError {
    BadUrl(String),
    BadString(String),
    InvalidReference(String),
}

impl std::fmt::Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueError::BadUrl(url) => write!(f, "bad url '{}'", url),
            ValueError::BadString(s) => write!(f, "unterminated string '{}'", s),
            ValueError::InvalidReference(token) => {
                write!(f, "invalid var() reference starting with {}", token)
            }
        }
    }
}

pub(crate) type TokenResult<'i, T> = std::result::Result<T, ParseError<'i, ValueError>>;

/// Converts a tokenizer error into a [`ThemeError`] for `value`.
pub(crate) fn malformed(value: &str, err: ParseError<'_, ValueError>) -> ThemeError {
    let message = match err.kind {
        ParseErrorKind::Custom(inner) => inner.to_string(),
        ParseErrorKind::Basic(basic) => format!("{:?}", basic),
    };
    ThemeError::MalformedValue {
        value: value.to_string(),
        message: format!(
            "{} (line {}, column {})",
            message, err.location.line, err.location.column
        ),
    }
}

static PRIORITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\s*!\s*[A-Za-z][A-Za-z-]*)+\s*$").expect("priority pattern is valid")
});

/// Removes trailing priority markers (`!important`, `!default`, `!global`).
pub fn strip_priority(value: &str) -> &str {
    match PRIORITY.find(value) {
        Some(m) => value[..m.start()].trim_end(),
        None => value.trim_end(),
    }
}

/// Splits a value into its body and its trailing priority marker (with the
/// whitespace before it), e.g. `("red", " !important")`.
pub fn split_priority(value: &str) -> (&str, &str) {
    let body = strip_priority(value);
    (body, &value[body.len()..])
}

/// Tokenizes `value`, recognizing `var()` plus references with `sigil`.
pub fn tokenize(value: &str, sigil: Option<char>) -> Result<Vec<Segment>> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut segments = Vec::new();
    collect(&mut parser, sigil, &mut segments).map_err(|e| malformed(value, e))?;
    Ok(segments)
}

fn collect<'i>(
    input: &mut Parser<'i, '_>,
    sigil: Option<char>,
    out: &mut Vec<Segment>,
) -> TokenResult<'i, ()> {
    loop {
        let start = input.position();
        let token = match input.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };

        match token {
            Token::Function(ref name) if name.eq_ignore_ascii_case("var") => {
                let (name, fallback) =
                    input.parse_nested_block(|input| parse_var_body(input, sigil))?;
                out.push(Segment::Reference(Reference {
                    name,
                    fallback,
                    raw: input.slice_from(start).to_string(),
                    kind: ReferenceKind::Var,
                }));
            }
            Token::AtKeyword(ref name) if sigil == Some('@') => {
                out.push(Segment::Reference(Reference {
                    name: format!("@{}", name),
                    fallback: None,
                    raw: input.slice_from(start).to_string(),
                    kind: ReferenceKind::Sigil,
                }));
            }
            Token::Delim('#') => {
                let state = input.state();
                let is_block = matches!(
                    input.next_including_whitespace(),
                    Ok(Token::CurlyBracketBlock)
                );
                if is_block {
                    let mut inner = Vec::new();
                    input.parse_nested_block(|input| collect(input, sigil, &mut inner))?;
                    out.push(Segment::Interpolation(inner));
                } else {
                    input.reset(&state);
                    push_text(out, "#");
                }
            }
            Token::Delim(c) if Some(c) == sigil => {
                let state = input.state();
                let ident = match input.next_including_whitespace() {
                    Ok(Token::Ident(name)) => Some(name.to_string()),
                    _ => None,
                };
                match ident {
                    Some(name) => {
                        out.push(Segment::Reference(Reference {
                            name: format!("{}{}", c, name),
                            fallback: None,
                            raw: input.slice_from(start).to_string(),
                            kind: ReferenceKind::Sigil,
                        }));
                    }
                    None => {
                        input.reset(&state);
                        push_text(out, input.slice_from(start));
                    }
                }
            }
            Token::BadUrl(url) => {
                return Err(input.new_custom_error(ValueError::BadUrl(url.to_string())))
            }
            Token::BadString(s) => {
                return Err(input.new_custom_error(ValueError::BadString(s.to_string())))
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => {
                let close = closing_for(&token);
                push_text(out, input.slice_from(start));
                input.parse_nested_block(|input| collect(input, sigil, out))?;
                push_text(out, close);
            }
            _ => push_text(out, input.slice_from(start)),
        }
    }
}

/// Parses the inside of `var( ... )`: a custom-property name and an optional
/// fallback after the first comma.
fn parse_var_body<'i>(
    input: &mut Parser<'i, '_>,
    sigil: Option<char>,
) -> TokenResult<'i, (String, Option<Vec<Segment>>)> {
    input.skip_whitespace();
    if input.is_exhausted() {
        return Ok((String::new(), None));
    }

    let token = input.next()?.clone();
    let name = match token {
        Token::Ident(name) if name.starts_with("--") => name.to_string(),
        other => {
            return Err(
                input.new_custom_error(ValueError::InvalidReference(format!("{:?}", other)))
            )
        }
    };

    input.skip_whitespace();
    if input.is_exhausted() {
        return Ok((name, None));
    }

    let token = input.next()?.clone();
    match token {
        Token::Comma => {
            input.skip_whitespace();
            let mut fallback = Vec::new();
            collect(input, sigil, &mut fallback)?;
            Ok((name, Some(fallback)))
        }
        other => Err(input.new_custom_error(ValueError::InvalidReference(format!("{:?}", other)))),
    }
}

fn closing_for(token: &Token<'_>) -> &'static str {
    match token {
        Token::SquareBracketBlock => "]",
        Token::CurlyBracketBlock => "}",
        _ => ")",
    }
}

fn push_text(out: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Text(existing)) = out.last_mut() {
        existing.push_str(text);
    } else {
        out.push(Segment::Text(text.to_string()));
    }
}

/// Renders segments back to text, replacing each reference with the result
/// of `resolve`.
pub fn render<F>(segments: &[Segment], resolve: &mut F) -> Result<String>
where
    F: FnMut(&Reference) -> Result<String>,
{
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Reference(reference) => out.push_str(&resolve(reference)?),
            Segment::Interpolation(inner) => {
                out.push_str("#{");
                out.push_str(&render(inner, resolve)?);
                out.push('}');
            }
        }
    }
    Ok(out)
}

/// Renders segments with every reference left as written.
pub fn render_verbatim(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Reference(reference) => out.push_str(&reference.raw),
            Segment::Interpolation(inner) => {
                out.push_str("#{");
                out.push_str(&render_verbatim(inner));
                out.push('}');
            }
        }
    }
    out
}

/// Renders segments, letting `rewrite` replace individual references.
///
/// `rewrite` is told whether the reference sits inside a `#{}` interpolation.
/// When it returns `None` the reference is kept as written, except that a
/// `var()` fallback is still walked and rewritten.
pub fn rewrite_references<F>(segments: &[Segment], rewrite: &mut F) -> Result<String>
where
    F: FnMut(&Reference, bool) -> Result<Option<String>>,
{
    let mut out = String::new();
    rewrite_into(segments, false, rewrite, &mut out)?;
    Ok(out)
}

fn rewrite_into<F>(
    segments: &[Segment],
    interpolated: bool,
    rewrite: &mut F,
    out: &mut String,
) -> Result<()>
where
    F: FnMut(&Reference, bool) -> Result<Option<String>>,
{
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Interpolation(inner) => {
                out.push_str("#{");
                rewrite_into(inner, true, rewrite, out)?;
                out.push('}');
            }
            Segment::Reference(reference) => {
                if let Some(replacement) = rewrite(reference, interpolated)? {
                    out.push_str(&replacement);
                    continue;
                }
                match &reference.fallback {
                    Some(fallback) => {
                        let mut inner = String::new();
                        rewrite_into(fallback, interpolated, rewrite, &mut inner)?;
                        if inner == render_verbatim(fallback) {
                            out.push_str(&reference.raw);
                        } else {
                            out.push_str(&format!("var({}, {})", reference.name, inner.trim_end()));
                        }
                    }
                    None => out.push_str(&reference.raw),
                }
            }
        }
    }
    Ok(())
}

/// Collects every reference in `segments`, including those nested in
/// interpolations and `var()` fallbacks, in source order.
pub fn references(segments: &[Segment]) -> Vec<&Reference> {
    let mut found = Vec::new();
    visit_references(segments, &mut found);
    found
}

fn visit_references<'s>(segments: &'s [Segment], found: &mut Vec<&'s Reference>) {
    for segment in segments {
        match segment {
            Segment::Text(_) => {}
            Segment::Reference(reference) => {
                found.push(reference);
                if let Some(fallback) = &reference.fallback {
                    visit_references(fallback, found);
                }
            }
            Segment::Interpolation(inner) => visit_references(inner, found),
        }
    }
}
