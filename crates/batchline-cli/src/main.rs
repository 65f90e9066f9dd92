//! batchline - batch stdin lines by size or interval
//!
//! Reads lines from stdin and writes them to stdout in batches, releasing a
//! batch once it is full or once the batch interval has lapsed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "batchline")]
#[command(about = "Batch stdin lines by size or interval")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./batchline.toml or ~/.config/batchline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Read stdin, write batches to stdout
    Run(cmd::run::RunArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect on stderr)
    let progress = Arc::new(batchline_core::ProgressContext::new());

    // Logging:
    //   TTY:     warn unless --debug, the spinner shows activity
    //   non-TTY: info unless --quiet/--debug
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = cli.quiet || (is_tty && !cli.debug);
    batchline_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Run(args) => {
            batchline_core::install_signal_handlers()?;
            cmd::run::run(args, &config, &progress)
        }
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec!["Batch size", &config.batch.size.to_string()]);
            table.add_row(vec![
                "Batch interval",
                &format!("{}ms", config.batch.interval_ms),
            ]);
            table.add_row(vec!["Output format", &config.output.format.to_string()]);
            table.add_row(vec!["Idle wait", &format!("{}ms", config.poll.idle_ms)]);
            table.add_row(vec![
                "Channel capacity",
                &config.poll.channel_capacity.to_string(),
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
