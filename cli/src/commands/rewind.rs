//! REWIND command - Drop the most recent views from a file.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use mmif_core::{Mmif, MmifConfig};
use tracing::debug;

use super::{read_input, truncate, write_mmif};

/// What one unit of `--number` counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RewindMode {
    /// Single views
    View,
    /// Runs of consecutive views from the same app
    App,
}

/// Arguments for the rewind command.
#[derive(Args)]
pub struct RewindArgs {
    /// Input file (stdin when omitted or `-`)
    pub file: Option<PathBuf>,

    /// How many views or apps to remove
    #[arg(short = 'n', long, default_value_t = 1)]
    pub number: usize,

    /// Count views or apps
    #[arg(long, value_enum, default_value_t = RewindMode::View)]
    pub mode: RewindMode,

    /// Write to this file instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON
    #[arg(long)]
    pub pretty: bool,
}

/// A removed view, for the summary.
struct Removed {
    id: String,
    app: String,
    annotations: usize,
}

/// Index of the first view to drop.
fn rewind_point(mmif: &Mmif, number: usize, mode: RewindMode) -> usize {
    let total = mmif.views().len();
    match mode {
        RewindMode::View => total.saturating_sub(number),
        RewindMode::App => {
            let mut cut = total;
            let mut runs = 0;
            let mut current: Option<&str> = None;
            for view in mmif.views().iter().rev() {
                if current != Some(view.app()) {
                    if runs == number {
                        break;
                    }
                    runs += 1;
                    current = Some(view.app());
                }
                cut -= 1;
            }
            cut
        }
    }
}

/// Remove trailing views, newest first, and report what went.
fn rewind(mmif: &mut Mmif, number: usize, mode: RewindMode) -> Result<Vec<Removed>> {
    let count = mmif.views().len() - rewind_point(mmif, number, mode);
    let ids: Vec<String> = mmif.views().keys().rev().take(count).map(str::to_string).collect();

    let mut removed = Vec::with_capacity(ids.len());
    for id in ids {
        let view = mmif.remove_view(&id)?;
        debug!(view = %id, app = view.app(), "rewound view");
        removed.push(Removed {
            id,
            app: view.app().to_string(),
            annotations: view.len(),
        });
    }
    Ok(removed)
}

fn print_human(removed: &[Removed], remaining: usize) {
    if removed.is_empty() {
        eprintln!("{}", "Nothing to rewind".yellow());
        return;
    }
    eprintln!("{}", format!("Removed {} view(s)", removed.len()).green().bold());
    eprintln!();
    for view in removed {
        eprintln!(
            "  {} {} ({} annotations)",
            view.id.cyan(),
            truncate(&view.app, 60),
            view.annotations
        );
    }
    eprintln!();
    eprintln!("  {} {}", "Views left:".cyan(), remaining);
}

/// Execute the rewind command.
pub fn execute(config: &MmifConfig, human: bool, args: RewindArgs) -> Result<()> {
    let input = read_input(args.file.as_deref())?;
    let mut mmif = Mmif::from_json_with(&input, config.clone())?;

    let removed = rewind(&mut mmif, args.number, args.mode)?;
    write_mmif(&mut mmif, config, args.pretty, args.output.as_deref())?;
    if human {
        print_human(&removed, mmif.views().len());
    }
    Ok(())
}
