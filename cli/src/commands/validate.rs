//! VALIDATE command - Check that a file is well-formed and loads.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use mmif_core::{Mmif, MmifConfig, ResolverRegistry, SchemaValidator, StructuralValidator};
use serde::Serialize;
use serde_json::Value;

use super::{HumanReadable, output, read_input};

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// File to validate (stdin when `-`)
    pub file: PathBuf,

    /// Also resolve every document location to a local path (downloads http/https media)
    #[arg(long)]
    pub resolve_locations: bool,
}

/// Local path a document location resolved to.
#[derive(Debug, Serialize)]
pub struct ResolvedLocation {
    pub document: String,
    pub path: PathBuf,
}

/// Summary of a file that passed validation.
#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub file: String,
    pub spec_version: String,
    pub documents: usize,
    pub views: usize,
    pub annotations: usize,
    pub views_with_error: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<ResolvedLocation>,
}

impl HumanReadable for ValidationReport {
    fn print_human(&self) {
        println!("{} {}", "Valid:".green().bold(), self.file);
        println!();
        println!("  {} {}", "Spec version:".cyan(), self.spec_version);
        println!("  {} {}", "Documents:".cyan(), self.documents);
        println!("  {} {}", "Views:".cyan(), self.views);
        println!("  {} {}", "Annotations:".cyan(), self.annotations);
        if !self.views_with_error.is_empty() {
            println!();
            println!("{}", "Views reporting errors:".yellow());
            for id in &self.views_with_error {
                println!("  - {}", id);
            }
        }
        if !self.locations.is_empty() {
            println!();
            println!("{}", "Locations:".yellow());
            for location in &self.locations {
                println!("  {} {}", location.document.cyan(), location.path.display());
            }
        }
    }
}

/// Validate the wire form, then build the full object graph.
fn load(json: &str, config: &MmifConfig) -> Result<Mmif> {
    let value: Value = serde_json::from_str(json).context("not valid JSON")?;
    StructuralValidator.validate(&value)?;
    let config = MmifConfig {
        validate: false,
        ..config.clone()
    };
    Ok(Mmif::from_value(value, config, None)?)
}

fn report(mmif: &Mmif, file: &Path) -> ValidationReport {
    ValidationReport {
        file: file.display().to_string(),
        spec_version: mmif.metadata().spec_version().to_string(),
        documents: mmif.all_documents().count(),
        views: mmif.views().len(),
        annotations: mmif.views().iter().map(|v| v.len()).sum(),
        views_with_error: mmif
            .get_views_with_error()
            .iter()
            .map(|v| v.id().to_string())
            .collect(),
        locations: Vec::new(),
    }
}

/// Resolve the location of every document that has one.
fn resolve_locations(mmif: &Mmif, registry: &ResolverRegistry) -> Result<Vec<ResolvedLocation>> {
    mmif.all_documents()
        .filter(|d| d.location().is_some())
        .map(|d| {
            let path = d
                .location_path(registry)
                .with_context(|| format!("document {} cannot be resolved", d.id()))?;
            Ok(ResolvedLocation {
                document: d.id().to_string(),
                path,
            })
        })
        .collect()
}

/// Execute the validate command.
pub fn execute(config: &MmifConfig, human: bool, args: ValidateArgs) -> Result<()> {
    let json = read_input(Some(&args.file))?;
    let mmif = load(&json, config).with_context(|| format!("{} is not valid MMIF", args.file.display()))?;
    let mut summary = report(&mmif, &args.file);
    if args.resolve_locations {
        let mut registry = ResolverRegistry::new();
        mmif_docloc_http::register(&mut registry)?;
        summary.locations = resolve_locations(&mmif, &registry)?;
    }
    output(&summary, human)
}
