//! The per-file rewrite pipeline.
//!
//! A file goes through four phases, each consuming the previous one:
//!
//! ```text
//! FilePass::scan  ->  FilePass<Scanned>
//!   .resolve()?   ->  FilePass<Resolved>
//!   .classify()   ->  FilePass<Classified>
//!   .emit(mode)?  ->  PassOutput
//! ```
//!
//! # Emit modes
//!
//! [`EmitMode::Standalone`] inserts one root rule declaring every theme
//! variable, placed after the file's imports and after any local declaration
//! those variables depend on:
//!
//! ```css
//! @import "theme.css";
//! :root {
//!   --primary-1a2b3c4d: #336699;
//! }
//! ```
//!
//! [`EmitMode::Inline`] rewrites every reference to a theme (or reference)
//! variable in place, keeping the compile-time value as the fallback:
//!
//! ```scss
//! a { color: $primary; }
//! // becomes
//! a { color: var(--primary-1a2b3c4d, #336699); }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{Comment, Declaration, Node, Root, Rule};
use crate::classifier::{Classification, Classifier};
use crate::config::{Dialect, EngineConfig};
use crate::error::Result;
use crate::ident::VariableIdent;
use crate::loader::is_import;
use crate::messages::{Message, MessageKind, Messages};
use crate::resolver::Resolver;
use crate::scanner::{is_root_scoped, scan};
use crate::table::{VariableRecord, VariableTable};
use crate::url::UrlTracker;
use crate::value::color::is_color_property;
use crate::value::url::normalize;
use crate::value::{
    references, rewrite_references, split_priority, strip_priority, tokenize, Reference,
    ReferenceKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitMode {
    /// Insert a root rule declaring the theme variables.
    #[default]
    Standalone,
    /// Rewrite references in place.
    Inline,
}

/// Everything a pass reads but does not own.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    pub config: &'a EngineConfig,
    pub dialect: Dialect,
    /// Resolved tables of the imported theme files, in import order.
    pub imports: &'a [VariableTable],
    /// `imports` merged, later files overriding earlier ones.
    pub theme: &'a VariableTable,
}

pub struct Scanned;
pub struct Resolved;
pub struct Classified {
    classification: Classification,
}

/// One file moving through the pipeline.
pub struct FilePass<'a, S> {
    ctx: PassContext<'a>,
    root: Root,
    file: Option<PathBuf>,
    table: VariableTable,
    urls: UrlTracker,
    state: S,
}

/// Result of a completed pass.
#[derive(Debug)]
pub struct PassOutput {
    pub root: Root,
    /// The file's own variables, resolved.
    pub table: VariableTable,
    pub classification: Classification,
    pub messages: Messages,
}

impl<S> FilePass<'_, S> {
    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn table(&self) -> &VariableTable {
        &self.table
    }
}

impl<'a> FilePass<'a, Scanned> {
    pub fn scan(ctx: PassContext<'a>, root: Root, file: Option<PathBuf>) -> Self {
        let table = scan(&root, file.as_deref(), ctx.dialect, ctx.config.ident_mode);
        Self {
            ctx,
            root,
            file,
            table,
            urls: UrlTracker::new(),
            state: Scanned,
        }
    }

    pub fn resolve(self) -> Result<FilePass<'a, Resolved>> {
        let FilePass {
            ctx,
            root,
            file,
            mut table,
            mut urls,
            ..
        } = self;

        Resolver::new(
            ctx.dialect,
            ctx.config.ident_mode,
            ctx.imports,
            file.as_deref(),
            &mut urls,
        )
        .resolve_table(&mut table)?;
        debug!(variables = table.len(), "resolved");

        Ok(FilePass {
            ctx,
            root,
            file,
            table,
            urls,
            state: Resolved,
        })
    }
}

impl<'a> FilePass<'a, Resolved> {
    pub fn classify(self) -> FilePass<'a, Classified> {
        let classification =
            Classifier::new(&self.table, self.ctx.theme, self.ctx.config.only_color).classify();
        debug!(
            theme = classification.theme.len(),
            reference = classification.reference.len(),
            context = classification.context.len(),
            "classified"
        );
        FilePass {
            ctx: self.ctx,
            root: self.root,
            file: self.file,
            table: self.table,
            urls: self.urls,
            state: Classified { classification },
        }
    }
}

impl<'a> FilePass<'a, Classified> {
    pub fn classification(&self) -> &Classification {
        &self.state.classification
    }

    pub fn emit(self, mode: EmitMode) -> Result<PassOutput> {
        let FilePass {
            ctx,
            mut root,
            file,
            table,
            mut urls,
            state,
        } = self;
        let classification = state.classification;

        let messages = {
            let mut emitter = Emitter {
                ctx,
                classifier: Classifier::new(&table, ctx.theme, ctx.config.only_color),
                classification: &classification,
                table: &table,
                file: file.as_deref(),
                urls: &mut urls,
                messages: Messages::new(),
                used_references: Vec::new(),
            };
            emitter.context_messages();
            match mode {
                EmitMode::Standalone => emitter.standalone(&mut root)?,
                EmitMode::Inline => emitter.inline(&mut root)?,
            }
            if ctx.dialect == Dialect::Scss {
                interpolate_root_values(&mut root, &ctx.config.root_selector);
            }
            emitter.messages
        };
        debug!(?mode, messages = messages.len(), "emitted");

        Ok(PassOutput {
            root,
            table,
            classification,
            messages,
        })
    }
}

struct Emitter<'p> {
    ctx: PassContext<'p>,
    classifier: Classifier<'p>,
    classification: &'p Classification,
    table: &'p VariableTable,
    file: Option<&'p Path>,
    urls: &'p mut UrlTracker,
    messages: Messages,
    used_references: Vec<VariableIdent>,
}

impl<'p> Emitter<'p> {
    fn engine(&self) -> &'p str {
        let config: &'p EngineConfig = self.ctx.config;
        &config.engine_identity
    }

    fn context_messages(&mut self) {
        let table = self.table;
        for ident in &self.classification.context {
            if let Some(record) = table.get(ident.as_str()) {
                self.messages.push(Message::for_record(
                    record,
                    MessageKind::LocalContextVariable,
                    self.engine(),
                    record.resolved_value.clone(),
                ));
            }
        }
    }

    /// The theme record for `ident` and its value as written in this file.
    fn theme_value(&mut self, ident: &str) -> Result<Option<(&'p VariableRecord, String)>> {
        let theme = self.ctx.theme;
        let Some(record) = theme.get(ident) else {
            return Ok(None);
        };
        let value = self.urls.relocate(record, self.file)?;

        let engine = self.engine();
        self.messages.push(Message::for_record(
            record,
            MessageKind::ThemeVariable,
            engine,
            value.clone(),
        ));
        if record.is_root_scoped {
            self.messages.push(Message::for_record(
                record,
                MessageKind::RootScopedThemeVariable,
                engine,
                value.clone(),
            ));
        }
        if record.urls.is_some() {
            self.messages.push(Message::for_record(
                record,
                MessageKind::UrlDependencyVariable,
                engine,
                value.clone(),
            ));
        }
        Ok(Some((record, value)))
    }

    // -------------------------------------------------------------------------
    // Standalone
    // -------------------------------------------------------------------------

    fn standalone(&mut self, root: &mut Root) -> Result<()> {
        let classification = self.classification;
        if classification.theme.is_empty() {
            return Ok(());
        }

        let mut rule = Rule::new(self.ctx.config.root_selector.clone());
        let mut anchors = Vec::new();
        for ident in &classification.theme {
            let Some((record, value)) = self.theme_value(ident.as_str())? else {
                continue;
            };
            rule.nodes
                .push(Node::Decl(Declaration::new(ident.as_str(), value)));
            anchors.push(ident.clone());
            anchors.extend(record.dependencies.iter().cloned());
        }

        let at = insertion_index(root, self.table, &anchors);
        debug!(index = at, variables = rule.nodes.len(), "inserting theme block");
        root.insert(at, Node::Rule(rule));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Inline
    // -------------------------------------------------------------------------

    fn inline(&mut self, root: &mut Root) -> Result<()> {
        self.rewrite_nodes(&mut root.nodes)?;
        self.declare_references(root)?;
        if self.ctx.config.document_theme && !self.is_theme_file() {
            self.document_theme(root)?;
        }
        Ok(())
    }

    fn is_theme_file(&self) -> bool {
        self.file
            .is_some_and(|f| self.ctx.config.is_theme_file(&normalize(f)))
    }

    fn rewrite_nodes(&mut self, nodes: &mut [Node]) -> Result<()> {
        for node in nodes {
            match node {
                Node::Decl(decl) => self.rewrite_declaration(decl)?,
                Node::Rule(rule) => self.rewrite_nodes(&mut rule.nodes)?,
                Node::AtRule(at) => {
                    if let Some(children) = at.nodes.as_mut() {
                        self.rewrite_nodes(children)?;
                    }
                }
                Node::Comment(_) => {}
            }
        }
        Ok(())
    }

    fn rewrite_declaration(&mut self, decl: &mut Declaration) -> Result<()> {
        let sigil = self.ctx.dialect.sigil();
        if sigil.is_some_and(|s| decl.prop.starts_with(s)) {
            return Ok(());
        }

        let (body, priority) = split_priority(&decl.value);
        let segments = tokenize(body, sigil)?;
        if references(&segments).is_empty() {
            return Ok(());
        }

        let color_property = self.ctx.config.only_color && is_color_property(&decl.prop);
        let rewritten =
            rewrite_references(&segments, &mut |r: &Reference, _| self.inline_token(r, color_property))?;
        if rewritten != body {
            decl.value = format!("{}{}", rewritten, priority);
        }
        Ok(())
    }

    /// Replacement for one reference token, or `None` to keep it.
    fn inline_token(&mut self, reference: &Reference, color_property: bool) -> Result<Option<String>> {
        if reference.name.is_empty() {
            return Ok(None);
        }
        let ident = VariableIdent::new(&reference.name, self.ctx.config.ident_mode);

        let is_theme = self.classifier.is_theme_candidate(ident.as_str())
            || (color_property && self.classifier.is_theme_variable(ident.as_str()));
        if is_theme {
            return Ok(self
                .theme_value(ident.as_str())?
                .map(|(_, value)| var_with_fallback(&ident, &value)));
        }

        if self.classification.is_reference(ident.as_str()) {
            let table = self.table;
            let Some(record) = table.get(ident.as_str()) else {
                return Ok(None);
            };
            if !self.used_references.contains(&ident) {
                self.used_references.push(ident.clone());
            }
            return Ok(Some(var_with_fallback(&ident, &record.resolved_value)));
        }

        Ok(None)
    }

    /// Gives every reference variable used so far a runtime declaration.
    fn declare_references(&mut self, root: &mut Root) -> Result<()> {
        let sigil = self.ctx.dialect.sigil();
        let table = self.table;
        let mut declarations = Vec::new();

        // declaring one reference may pull in others
        let mut next = 0;
        while next < self.used_references.len() {
            let ident = self.used_references[next].clone();
            next += 1;
            let Some(record) = table.get(ident.as_str()) else {
                continue;
            };
            let segments = tokenize(strip_priority(&record.raw_value), sigil)?;
            let value =
                rewrite_references(&segments, &mut |r: &Reference, _| self.inline_token(r, false))?;
            self.messages.push(Message::for_record(
                record,
                MessageKind::InlinePropertyVariable,
                self.engine(),
                value.clone(),
            ));
            declarations.push((ident, value));
        }
        if declarations.is_empty() {
            return Ok(());
        }

        let mut pending = Vec::new();
        for (ident, value) in declarations {
            if !replace_root_declaration(root, ident.as_str(), &value) {
                pending.push((ident, value));
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        let mut anchors = Vec::new();
        let mut rule = Rule::new(self.ctx.config.root_selector.clone());
        for (ident, value) in pending {
            if let Some(record) = table.get(ident.as_str()) {
                anchors.extend(record.dependencies.iter().cloned());
            }
            rule.nodes
                .push(Node::Decl(Declaration::new(ident.as_str(), value)));
            anchors.push(ident);
        }
        let at = insertion_index(root, table, &anchors);
        debug!(index = at, variables = rule.nodes.len(), "inserting reference block");
        root.insert(at, Node::Rule(rule));
        Ok(())
    }

    fn document_theme(&mut self, root: &mut Root) -> Result<()> {
        let classification = self.classification;
        if classification.theme.is_empty() {
            return Ok(());
        }
        let mut text = format!(
            " {} theme variables\n{} {{\n",
            self.engine(),
            self.ctx.config.root_selector
        );
        for ident in &classification.theme {
            let theme = self.ctx.theme;
            let Some(record) = theme.get(ident.as_str()) else {
                continue;
            };
            let value = self.urls.relocate(record, self.file)?;
            text.push_str(&format!(
                "  {}: {}; // {}\n",
                ident,
                value.replace("*/", "* /"),
                record.original_name
            ));
        }
        text.push_str("}\n");

        let mut comment = Comment::new(text);
        comment.raws.before = "\n\n".to_string();
        root.nodes.push(Node::Comment(comment));
        Ok(())
    }
}

fn var_with_fallback(ident: &VariableIdent, value: &str) -> String {
    if value.is_empty() {
        format!("var({})", ident)
    } else {
        format!("var({}, {})", ident, value)
    }
}

/// Index right after the later of the last top-level import and the last
/// local declaration of any ident in `anchors`.
fn insertion_index(root: &Root, table: &VariableTable, anchors: &[VariableIdent]) -> usize {
    let last_import = root
        .nodes
        .iter()
        .rposition(|n| matches!(n, Node::AtRule(at) if is_import(&at.name)));
    let last_anchor = anchors
        .iter()
        .filter_map(|ident| table.get(ident.as_str()))
        .map(|record| record.position)
        .max();
    last_import.max(last_anchor).map_or(0, |i| i + 1)
}

/// Replaces the value of `ident` in an existing top-level root rule.
fn replace_root_declaration(root: &mut Root, ident: &str, value: &str) -> bool {
    for node in &mut root.nodes {
        let Node::Rule(rule) = node else { continue };
        if !is_root_scoped(rule) {
            continue;
        }
        for child in &mut rule.nodes {
            if let Node::Decl(decl) = child {
                if decl.prop == ident {
                    decl.value = value.to_string();
                    return true;
                }
            }
        }
    }
    false
}

/// Wraps `$var` references in custom-property values of root rules in `#{}`,
/// since Sass passes custom-property values through verbatim.
fn interpolate_root_values(root: &mut Root, root_selector: &str) {
    for node in &mut root.nodes {
        let Node::Rule(rule) = node else { continue };
        if !is_root_scoped(rule) && rule.selector.trim() != root_selector {
            continue;
        }
        for child in &mut rule.nodes {
            let Node::Decl(decl) = child else { continue };
            if !decl.is_custom_property() {
                continue;
            }
            let Ok(segments) = tokenize(&decl.value, Some('$')) else {
                continue;
            };
            let fixed = rewrite_references(&segments, &mut |r: &Reference, interpolated| {
                Ok((r.kind == ReferenceKind::Sigil && !interpolated).then(|| format!("#{{{}}}", r.raw)))
            });
            if let Ok(fixed) = fixed {
                decl.value = fixed;
            }
        }
    }
}
