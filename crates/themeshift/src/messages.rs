//! Classification messages handed back to the host.
//!
//! A message is keyed by `(ident, kind, engine)`. Pushing a message with an
//! existing key replaces the earlier one in place, so the host always sees
//! the last word on each variable without duplicates.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::ident::VariableIdent;
use crate::table::{UrlRecord, VariableRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    ThemeVariable,
    RootScopedThemeVariable,
    LocalContextVariable,
    UrlDependencyVariable,
    InlinePropertyVariable,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::ThemeVariable => "theme-variable",
            MessageKind::RootScopedThemeVariable => "root-scoped-theme-variable",
            MessageKind::LocalContextVariable => "local-context-variable",
            MessageKind::UrlDependencyVariable => "url-dependency-variable",
            MessageKind::InlinePropertyVariable => "inline-property-variable",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub ident: VariableIdent,
    pub kind: MessageKind,
    pub engine: String,
    pub original_name: String,
    /// The value as emitted.
    pub value: String,
    pub source_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<UrlRecord>,
}

impl Message {
    /// Builds a message describing `record`, carrying `value` as emitted.
    pub fn for_record(
        record: &VariableRecord,
        kind: MessageKind,
        engine: &str,
        value: impl Into<String>,
    ) -> Self {
        Self {
            ident: record.ident.clone(),
            kind,
            engine: engine.to_string(),
            original_name: record.original_name.clone(),
            value: value.into(),
            source_file: record.source_file.clone(),
            urls: record.urls.clone(),
        }
    }

    fn key(&self) -> (VariableIdent, MessageKind, String) {
        (self.ident.clone(), self.kind, self.engine.clone())
    }
}

/// Insertion-ordered messages, unique per key.
#[derive(Debug, Clone, Default)]
pub struct Messages {
    entries: Vec<Message>,
    index: HashMap<(VariableIdent, MessageKind, String), usize>,
}

impl Messages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        let key = message.key();
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot] = message,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(message);
            }
        }
    }

    pub fn extend(&mut self, other: Messages) {
        for message in other.entries {
            self.push(message);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.entries.iter()
    }

    pub fn of_kind(&self, kind: MessageKind) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter(move |m| m.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Message> {
        self.entries
    }
}

impl Serialize for Messages {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'a> IntoIterator for &'a Messages {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
