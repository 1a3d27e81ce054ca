mod build;
mod commands;
mod core;
mod gate;
mod github;
mod pipeline;
mod publish;
mod release;
mod ui;

use clap::{Parser, Subcommand};
use crate::core::context::TriggerKind;
use crate::core::error::{NightlyError, print_error};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Gated, fan-out/fan-in nightly release orchestrator
#[derive(Parser)]
#[command(name = "nightly-release")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  /// Debug-level logs (overridden by RUST_LOG)
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Path to nightly.toml (default: search the current directory)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the full nightly pipeline
  Run {
    /// What started this run
    #[arg(long, value_enum, default_value_t = TriggerKind::Scheduled)]
    trigger: TriggerKind,
    /// Externally assigned run identifier (e.g. the CI run number)
    #[arg(long)]
    run_id: Option<String>,
    /// Show the stage graph and asset names without side effects
    #[arg(long)]
    dry_run: bool,
    /// Output the run report in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Evaluate the Activity Gate only
  Gate {
    /// Trigger to evaluate for
    #[arg(long, value_enum, default_value_t = TriggerKind::Scheduled)]
    trigger: TriggerKind,
    /// Output the decision in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Show the build target table and today's artifact names
  Targets {
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Show the stage graph in execution order
  Graph {
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

/// Logs go to stderr so stdout stays parseable with --json
fn init_tracing(verbose: bool) {
  let level = if verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let root = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => {
      eprintln!("Error: Failed to get current directory: {}", e);
      std::process::exit(1);
    }
  };
  let config = cli.config.as_deref();

  let result = match cli.command {
    Commands::Run {
      trigger,
      run_id,
      dry_run,
      json,
    } => commands::run_nightly(
      &root,
      commands::RunOptions {
        trigger,
        config: cli.config.clone(),
        run_id,
        dry_run,
        json,
      },
    ),
    Commands::Gate { trigger, json } => commands::run_gate(&root, config, trigger, json),
    Commands::Targets { json } => commands::run_targets(&root, config, json),
    Commands::Graph { json } => commands::run_graph(&root, config, json),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: NightlyError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
