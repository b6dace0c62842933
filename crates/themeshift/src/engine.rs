//! One theming session.
//!
//! An [`Engine`] owns the configuration and the import/source collaborators.
//! Each call to [`Engine::process`] is independent: it collects the theme
//! variables reachable through the file's imports, then runs the file
//! through the [`FilePass`] pipeline.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::ast::{parse_file, Root};
use crate::config::{Dialect, EngineConfig};
use crate::error::Result;
use crate::loader::{import_specifiers, FsImportResolver, FsSourceLoader, ImportResolver, SourceLoader};
use crate::rewriter::{EmitMode, FilePass, PassContext, PassOutput};
use crate::scope;
use crate::table::VariableTable;
use crate::value::url::normalize;

/// Theme variables reachable from one file.
#[derive(Debug, Clone, Default)]
pub struct ThemeContext {
    /// One resolved table per theme file, in import order.
    pub imports: Vec<VariableTable>,
    /// Theme files visited, in processing order.
    pub files: Vec<PathBuf>,
    /// `imports` merged; later files win.
    pub theme: VariableTable,
}

pub struct Engine<R = FsImportResolver, L = FsSourceLoader> {
    config: EngineConfig,
    resolver: R,
    loader: L,
}

impl Engine {
    /// An engine reading imports from the filesystem.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_io(config, FsImportResolver, FsSourceLoader)
    }
}

impl<R: ImportResolver, L: SourceLoader> Engine<R, L> {
    pub fn with_io(mut config: EngineConfig, resolver: R, loader: L) -> Self {
        config.theme_files = config.theme_files.iter().map(|f| normalize(f)).collect();
        Self {
            config,
            resolver,
            loader,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Dialect of `file`: inferred from its extension, else the configured one.
    pub fn dialect_for(&self, file: &Path) -> Dialect {
        Dialect::from_path(file).unwrap_or(self.config.dialect)
    }

    pub fn is_theme_file(&self, file: &Path) -> bool {
        self.config.is_theme_file(&normalize(file))
    }

    /// Loads and processes every theme file `root` imports, depth first and
    /// in import order. Imports that are not theme files are skipped.
    pub fn collect_theme_variables(&self, root: &Root, file: &Path) -> Result<ThemeContext> {
        let mut context = ThemeContext::default();
        let mut visited = HashSet::new();
        visited.insert(normalize(file));
        self.collect_imports(root, file, &mut context, &mut visited)?;
        context.theme = VariableTable::merged(&context.imports);
        debug!(
            file = %file.display(),
            theme_files = context.files.len(),
            variables = context.theme.len(),
            "collected theme variables"
        );
        Ok(context)
    }

    fn collect_imports(
        &self,
        root: &Root,
        file: &Path,
        context: &mut ThemeContext,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<()> {
        let base_dir = file.parent().unwrap_or_else(|| Path::new(""));
        let dialect = self.dialect_for(file);
        for specifier in import_specifiers(root) {
            let path = match self.resolver.resolve(&specifier, base_dir, dialect) {
                Ok(path) => normalize(&path),
                Err(err) => {
                    warn!(%specifier, error = %err, "skipping unresolvable import");
                    continue;
                }
            };
            if !self.config.is_theme_file(&path) {
                debug!(path = %path.display(), "skipping non-theme import");
                continue;
            }
            if !visited.insert(path.clone()) {
                continue;
            }

            let source = self.loader.load(&path)?;
            let theme_dialect = self.dialect_for(&path);
            let theme_root = parse_file(&path, &source, theme_dialect)?;
            self.collect_imports(&theme_root, &path, context, visited)?;

            let theme = VariableTable::merged(&context.imports);
            let ctx = PassContext {
                config: &self.config,
                dialect: theme_dialect,
                imports: &context.imports,
                theme: &theme,
            };
            let table = FilePass::scan(ctx, theme_root, Some(path.clone()))
                .resolve()?
                .table()
                .clone();
            debug!(path = %path.display(), variables = table.len(), "loaded theme file");
            context.imports.push(table);
            context.files.push(path);
        }
        Ok(())
    }

    /// Runs `root` through the pipeline.
    pub fn process(&self, root: Root, file: &Path, mode: EmitMode) -> Result<PassOutput> {
        let themes = self.collect_theme_variables(&root, file)?;
        let ctx = PassContext {
            config: &self.config,
            dialect: self.dialect_for(file),
            imports: &themes.imports,
            theme: &themes.theme,
        };
        FilePass::scan(ctx, root, Some(file.to_path_buf()))
            .resolve()?
            .classify()
            .emit(mode)
    }

    /// Parses `source` and runs it through the pipeline.
    pub fn process_source(&self, source: &str, file: &Path, mode: EmitMode) -> Result<PassOutput> {
        let root = parse_file(file, source, self.dialect_for(file))?;
        self.process(root, file, mode)
    }

    /// Scopes `root` to `theme` using the configured attribute.
    pub fn annotate_scope(&self, root: &mut Root, theme: &str) {
        scope::annotate(root, theme, &self.config.theme_attribute);
    }
}
