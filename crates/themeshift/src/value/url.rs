//! Resource references inside values.
//!
//! Finds `url(...)` references (unquoted or quoted) and quoted entries of
//! `image-set()`, and rewrites them through a callback while copying every
//! other token verbatim.

use std::path::{Component, Path, PathBuf};

use cssparser::{Parser, ParserInput, Token};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{malformed, TokenResult, ValueError};
use crate::error::Result;

static SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("scheme pattern is valid"));

/// Returns true for a path that is resolved relative to the stylesheet it
/// appears in.
///
/// Absolute paths, protocol-relative and scheme-qualified URLs, fragments,
/// `~module` paths and anything containing a variable are not relative.
pub fn is_relative(path: &str) -> bool {
    let path = path.trim();
    !(path.is_empty()
        || path.starts_with('/')
        || path.starts_with('#')
        || path.starts_with('~')
        || path.contains('$')
        || path.contains('@')
        || path.contains("#{")
        || SCHEME.is_match(path))
}

/// Lists every resource path referenced by `value`, in source order.
pub fn resource_paths(value: &str) -> Result<Vec<String>> {
    let mut found = Vec::new();
    rewrite_resources(value, &mut |path| {
        found.push(path.to_string());
        None
    })?;
    Ok(found)
}

/// Rewrites resource paths in `value`. Returning `None` from `rewrite` keeps
/// the original text of that reference.
pub fn rewrite_resources<F>(value: &str, rewrite: &mut F) -> Result<String>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut out = String::with_capacity(value.len());
    walk(&mut parser, ResourceContext::None, &mut out, rewrite).map_err(|e| malformed(value, e))?;
    Ok(out)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ResourceContext {
    None,
    /// Inside `url(...)`: the single string is the path.
    Url,
    /// Inside `image-set(...)`: every string is a path.
    ImageSet,
}

fn walk<'i, F>(
    input: &mut Parser<'i, '_>,
    context: ResourceContext,
    out: &mut String,
    rewrite: &mut F,
) -> TokenResult<'i, ()>
where
    F: FnMut(&str) -> Option<String>,
{
    loop {
        let start = input.position();
        let token = match input.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };

        match token {
            Token::UnquotedUrl(ref url) => match rewrite(url) {
                Some(new) => {
                    out.push_str("url(");
                    out.push_str(&new);
                    out.push(')');
                }
                None => out.push_str(input.slice_from(start)),
            },
            Token::QuotedString(ref path) if context != ResourceContext::None => {
                let raw = input.slice_from(start);
                match rewrite(path) {
                    Some(new) => {
                        let quote = raw.chars().next().unwrap_or('"');
                        out.push(quote);
                        out.push_str(&new);
                        out.push(quote);
                    }
                    None => out.push_str(raw),
                }
            }
            Token::BadUrl(url) => {
                return Err(input.new_custom_error(ValueError::BadUrl(url.to_string())))
            }
            Token::BadString(s) => {
                return Err(input.new_custom_error(ValueError::BadString(s.to_string())))
            }
            Token::Function(ref name) => {
                let lower = name.to_ascii_lowercase();
                let inner = match lower.as_str() {
                    "url" | "src" => ResourceContext::Url,
                    "image-set" | "-webkit-image-set" => ResourceContext::ImageSet,
                    _ => ResourceContext::None,
                };
                out.push_str(input.slice_from(start));
                input.parse_nested_block(|input| walk(input, inner, out, rewrite))?;
                out.push(')');
            }
            Token::ParenthesisBlock | Token::SquareBracketBlock | Token::CurlyBracketBlock => {
                let close = match token {
                    Token::SquareBracketBlock => ']',
                    Token::CurlyBracketBlock => '}',
                    _ => ')',
                };
                out.push_str(input.slice_from(start));
                input.parse_nested_block(|input| walk(input, ResourceContext::None, out, rewrite))?;
                out.push(close);
            }
            _ => out.push_str(input.slice_from(start)),
        }
    }
}

/// Rewrites `path`, relative to `origin_file`, so it is relative to
/// `target_file` instead. Returns `None` when `path` is not relative or both
/// files live in the same directory.
pub fn relocate_path(path: &str, origin_file: &Path, target_file: &Path) -> Option<String> {
    if !is_relative(path) {
        return None;
    }
    let origin_dir = origin_file.parent().unwrap_or_else(|| Path::new(""));
    let target_dir = target_file.parent().unwrap_or_else(|| Path::new(""));
    if normalize(origin_dir) == normalize(target_dir) {
        return None;
    }

    // keep query strings and fragments out of path arithmetic
    let split = path.find(['?', '#']).unwrap_or(path.len());
    let (file_part, suffix) = path.split_at(split);

    let absolute = normalize(&origin_dir.join(file_part));
    let relative = relative_path(&normalize(target_dir), &absolute);
    let mut rewritten = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    if rewritten.is_empty() {
        rewritten.push('.');
    }
    rewritten.push_str(suffix);
    Some(rewritten)
}

/// Lexically normalizes a path (`.` dropped, `..` folded), without touching
/// the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Computes the path of `to` relative to the directory `from`. Both must be
/// normalized.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<_> = from.components().collect();
    let to: Vec<_> = to.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to[common..] {
        out.push(component.as_os_str());
    }
    out
}
