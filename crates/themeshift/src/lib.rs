//! Themeshift - runtime-swappable theme variables for stylesheets.
//!
//! Preprocessor variables (`$primary`, `@primary`) and root custom properties
//! are constants once a stylesheet is compiled. Themeshift finds the ones
//! declared in designated theme files, resolves their values, and rewrites
//! the stylesheets using them so the values can be swapped at runtime through
//! custom properties.
//!
//! # Quick Start
//!
//! ```rust
//! use std::path::Path;
//! use themeshift::{Dialect, EmitMode, Engine, EngineConfig, MemorySourceLoader};
//!
//! let loader = MemorySourceLoader::new()
//!     .with_file("/src/theme.scss", "$primary: #336699;");
//! let config = EngineConfig {
//!     dialect: Dialect::Scss,
//!     theme_files: vec!["/src/theme.scss".into()],
//!     ..EngineConfig::default()
//! };
//! let engine = Engine::with_io(config, loader.clone(), loader);
//!
//! let output = engine
//!     .process_source(
//!         "@import 'theme';\n.a { color: $primary; }",
//!         Path::new("/src/app.scss"),
//!         EmitMode::Inline,
//!     )
//!     .unwrap();
//! assert!(output.root.to_css().contains("var(--primary-"));
//! ```
//!
//! # Pipeline
//!
//! ```text
//! scan -> resolve -> classify -> emit (standalone | inline)
//! ```
//!
//! | Phase | Module | Output |
//! |-------|--------|--------|
//! | Scanning | [`scanner`] | one [`VariableTable`] per file |
//! | Resolving | [`resolver`] | resolved values and dependency sets |
//! | Classifying | [`classifier`] | theme / reference / context partition |
//! | Emitting | [`rewriter`] | rewritten tree plus [`Messages`] |
//!
//! [`scope`] is independent of the pipeline: it restricts a stylesheet to one
//! theme by attribute selector.
//!
//! # Idents
//!
//! Variables are re-published under deterministic custom-property names, see
//! [`ident`].

pub mod ast;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod ident;
pub mod loader;
pub mod messages;
pub mod resolver;
pub mod rewriter;
pub mod scanner;
pub mod scope;
pub mod table;
pub mod url;
pub mod value;

pub use ast::{parse, parse_file, Node, Root};
pub use classifier::{Classification, Classifier};
pub use config::{Dialect, EngineConfig};
pub use engine::{Engine, ThemeContext};
pub use error::{Result, ThemeError};
pub use ident::{IdentMode, VariableIdent};
pub use loader::{FsImportResolver, FsSourceLoader, ImportResolver, MemorySourceLoader, SourceLoader};
pub use messages::{Message, MessageKind, Messages};
pub use rewriter::{EmitMode, FilePass, PassOutput};
pub use table::{UrlRecord, VariableRecord, VariableTable};
pub use url::UrlTracker;
