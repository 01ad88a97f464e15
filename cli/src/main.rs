mod report;
mod runner;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use compliance::{Engine, Selection, Template};

use crate::report::Style;
use crate::runner::{EXIT_ERROR, Target};

#[derive(Parser)]
#[command(
    name = "chaplint",
    version,
    about = "Check chapter notebooks against a structural template and apply additive fixes"
)]
struct Cli {
    /// Directory holding the chapter notebooks
    #[arg(long, global = true, env = "CHAPLINT_ROOT", default_value = ".")]
    root: PathBuf,

    /// Template file [default: <root>/chaplint.toml when present]
    #[arg(long, global = true)]
    template: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score chapters against the template
    Verify(VerifyArgs),

    /// Apply additive fixes, snapshotting each chapter before it is written
    Fix(FixArgs),

    /// List the snapshots taken of a chapter
    Snapshots(SnapshotsArgs),

    /// Restore a chapter from a snapshot
    Revert(RevertArgs),
}

#[derive(clap::Args)]
struct TargetArgs {
    /// Chapter identifier: file stem or unique prefix (e.g. `ch03`)
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    chapter: Option<String>,

    /// Every chapter under the root, one after another
    #[arg(long)]
    all: bool,

    /// Print a JSON report instead of the human-readable one
    #[arg(long)]
    json: bool,
}

impl TargetArgs {
    fn target(&self) -> Target {
        match &self.chapter {
            Some(chapter) if !self.all => Target::One(chapter.clone()),
            _ => Target::All,
        }
    }
}

#[derive(clap::Args)]
struct VerifyArgs {
    #[command(flatten)]
    target: TargetArgs,
}

#[derive(clap::Args)]
struct FixArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Report what would change without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Apply only these fixes (comma-separated): visual_summary,
    /// header_spacing, key_concepts, trailing_block
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,
}

#[derive(clap::Args)]
struct SnapshotsArgs {
    /// Chapter identifier
    chapter: String,

    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct RevertArgs {
    /// Snapshot id as printed by `fix` or `snapshots`
    snapshot: String,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);
    let style = Style::new(!cli.no_color && std::io::stdout().is_terminal());

    let template = match Template::discover(cli.template.as_deref(), &cli.root) {
        Ok(template) => template,
        Err(e) => {
            report::error(&style, &e);
            process::exit(EXIT_ERROR);
        }
    };
    let engine = Engine::new(&cli.root, template);

    let code = match cli.command {
        Command::Verify(args) => {
            runner::verify(&engine, &args.target.target(), args.target.json, &style)
        }
        Command::Fix(args) => {
            let selection = if args.only.is_empty() {
                Selection::all()
            } else {
                match Selection::only(&args.only) {
                    Ok(selection) => selection,
                    Err(e) => {
                        report::error(&style, &e);
                        process::exit(EXIT_ERROR);
                    }
                }
            };
            runner::fix(
                &engine,
                &args.target.target(),
                &selection,
                args.dry_run,
                args.target.json,
                &style,
            )
        }
        Command::Snapshots(args) => runner::snapshots(&engine, &args.chapter, args.json, &style),
        Command::Revert(args) => runner::revert(&engine, &args.snapshot, &style),
    };
    process::exit(code);
}

fn init_tracing(verbose: u8, no_color: bool) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color && std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}
