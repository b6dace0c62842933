//! `themeshift` command line front end.
//!
//! ```text
//! themeshift extract src/app.scss --theme-file src/theme/dark.scss
//! themeshift inline src/app.scss --config themeshift.yaml --messages out.json
//! themeshift scope src/theme/dark.css --theme dark
//! themeshift ident '$primary' --production
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use themeshift::{
    parse_file, Dialect, EmitMode, Engine, EngineConfig, IdentMode, Messages, VariableIdent,
};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Runtime-swappable theme variables for stylesheets
#[derive(Parser)]
#[command(name = "themeshift", version, about)]
struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dialect for files whose extension does not name one
    #[arg(long, global = true)]
    dialect: Option<Dialect>,

    /// Emit compact, opaque variable idents
    #[arg(long, global = true)]
    production: bool,

    /// Write classification messages as JSON to this file
    #[arg(long, global = true, value_name = "FILE")]
    messages: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert a root block declaring the theme variables a file imports
    Extract(RewriteArgs),
    /// Rewrite theme variable references in place
    Inline(RewriteArgs),
    /// Scope a stylesheet to one theme
    Scope {
        file: PathBuf,
        /// Theme name, e.g. `dark`
        #[arg(short, long)]
        theme: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the ident generated for a variable name
    Ident {
        /// Variable name with its sigil, e.g. `$primary`
        name: String,
    },
}

#[derive(Args)]
struct RewriteArgs {
    file: PathBuf,
    /// Additional theme file (repeatable)
    #[arg(long = "theme-file", value_name = "FILE")]
    theme_files: Vec<PathBuf>,
    /// Output file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Command::Extract(args) => rewrite(&mut config, args, EmitMode::Standalone, cli.messages),
        Command::Inline(args) => rewrite(&mut config, args, EmitMode::Inline, cli.messages),
        Command::Scope {
            file,
            theme,
            output,
        } => {
            let engine = Engine::new(config);
            let source = read(&file)?;
            let mut root = parse_file(&file, &source, engine.dialect_for(&file))?;
            engine.annotate_scope(&mut root, &theme);
            write(output.as_deref(), &root.to_css())
        }
        Command::Ident { name } => {
            println!("{}", VariableIdent::new(&name, config.ident_mode));
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(dialect) = cli.dialect {
        config.dialect = dialect;
    }
    if cli.production {
        config.ident_mode = IdentMode::Production;
    }
    Ok(config)
}

fn rewrite(
    config: &mut EngineConfig,
    args: RewriteArgs,
    mode: EmitMode,
    messages_path: Option<PathBuf>,
) -> Result<()> {
    let cwd = std::env::current_dir().context("reading the working directory")?;
    config.theme_files.extend(args.theme_files);
    config.theme_files = config.theme_files.iter().map(|f| cwd.join(f)).collect();
    let file = cwd.join(&args.file);

    debug!(file = %file.display(), ?mode, theme_files = config.theme_files.len(), "rewriting");

    let engine = Engine::new(config.clone());
    let source = read(&file)?;
    let output = engine
        .process_source(&source, &file, mode)
        .with_context(|| format!("processing {}", file.display()))?;

    write(args.output.as_deref(), &output.root.to_css())?;
    if let Some(path) = messages_path {
        write_messages(&path, &output.messages)?;
    }
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn write(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}

fn write_messages(path: &Path, messages: &Messages) -> Result<()> {
    let json = serde_json::to_string_pretty(messages).context("serializing messages")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}
