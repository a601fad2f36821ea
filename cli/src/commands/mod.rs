//! Command implementations for the mmif CLI.
//!
//! Each command module provides:
//! - Args struct for clap argument parsing
//! - execute() function that performs the command
//! - Human-readable and JSON output formatting

pub mod rewind;
pub mod source;
pub mod validate;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use mmif_core::{Mmif, MmifConfig, SerializeOptions};
use serde::Serialize;

/// Print a report in JSON or human-readable format.
pub fn output<T: Serialize + HumanReadable>(value: &T, human: bool) -> Result<()> {
    if human {
        value.print_human();
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

/// Trait for types that can be printed in human-readable format.
pub trait HumanReadable {
    fn print_human(&self);
}

/// Read a whole file, or stdin when the path is absent or `-`.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Serialize a file and write it to `path`, or stdout.
pub fn write_mmif(mmif: &mut Mmif, config: &MmifConfig, pretty: bool, path: Option<&Path>) -> Result<()> {
    let options = SerializeOptions {
        pretty,
        ..SerializeOptions::from_config(config)
    };
    let json = mmif.serialize(options)?;
    match path {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

/// Truncate a string for display, adding ellipsis if needed.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
