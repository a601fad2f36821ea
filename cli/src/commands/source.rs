//! SOURCE command - Build a source file listing media documents.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use mmif_core::docloc::split_scheme;
use mmif_core::vocabulary::{AUDIO_DOCUMENT, IMAGE_DOCUMENT, TEXT_DOCUMENT, VIDEO_DOCUMENT};
use mmif_core::{AtType, Document, Mmif, MmifConfig};

use super::{truncate, write_mmif};

/// Arguments for the source command.
#[derive(Args)]
pub struct SourceArgs {
    /// Documents as TYPE:LOCATION, where TYPE is video, audio, text, image or a MIME type
    #[arg(required = true, value_name = "TYPE:LOCATION")]
    pub documents: Vec<String>,

    /// Absolute directory that relative locations are joined onto
    #[arg(long)]
    pub prefix: Option<PathBuf>,

    /// URI scheme given to locations written without one
    #[arg(long)]
    pub scheme: Option<String>,

    /// Write to this file instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON
    #[arg(long)]
    pub pretty: bool,
}

/// Document type for a CLI type name or a MIME type.
fn document_type(kind: &str) -> Result<(AtType, String)> {
    let top = kind.split('/').next().unwrap_or_default();
    let at_type = match top {
        "video" => VIDEO_DOCUMENT,
        "audio" => AUDIO_DOCUMENT,
        "text" => TEXT_DOCUMENT,
        "image" => IMAGE_DOCUMENT,
        _ => bail!("unknown document type {kind:?}: expected video, audio, text, image or a MIME type of one of those"),
    };
    Ok((at_type, kind.to_string()))
}

/// Location URI for one command-line location.
fn location_uri(location: &str, prefix: Option<&Path>, scheme: Option<&str>) -> Result<String> {
    if split_scheme(location).is_some() {
        return Ok(location.to_string());
    }
    let path = match prefix {
        Some(prefix) => {
            if !prefix.is_absolute() {
                bail!("--prefix must be an absolute path, got {}", prefix.display());
            }
            if Path::new(location).is_absolute() {
                bail!("{location} is absolute; locations must be relative when --prefix is given");
            }
            prefix.join(location)
        }
        None => {
            if !Path::new(location).is_absolute() {
                bail!("{location} is relative; give an absolute path or use --prefix");
            }
            PathBuf::from(location)
        }
    };
    let path = path.to_string_lossy();
    Ok(match scheme {
        Some(scheme) => format!("{scheme}://{path}"),
        None => path.into_owned(),
    })
}

/// Build a file holding one document per `TYPE:LOCATION` pair, ids `d1`, `d2`, ...
pub fn build_source(args: &SourceArgs, config: &MmifConfig) -> Result<Mmif> {
    let mut mmif = Mmif::with_config(config.clone());
    for (i, pair) in args.documents.iter().enumerate() {
        let Some((kind, location)) = pair.split_once(':') else {
            bail!("{pair:?} is not in TYPE:LOCATION form");
        };
        let (at_type, mime) = document_type(kind)?;
        let uri = location_uri(location, args.prefix.as_deref(), args.scheme.as_deref())?;

        let mut document = Document::new(at_type, format!("d{}", i + 1));
        document.set_mime(mime);
        document
            .set_location(&uri)
            .with_context(|| format!("invalid location in {pair:?}"))?;
        mmif.add_document(document, false)?;
    }
    Ok(mmif)
}

fn print_human(mmif: &Mmif, output: Option<&Path>) {
    eprintln!("{}", "Source file created".green().bold());
    eprintln!();
    for document in mmif.documents().iter() {
        eprintln!(
            "  {} {} {}",
            document.id().cyan(),
            document.at_type().name(),
            truncate(document.location().unwrap_or_default(), 60).dimmed()
        );
    }
    if let Some(path) = output {
        eprintln!();
        eprintln!("  {} {}", "Written to:".cyan(), path.display());
    }
}

/// Execute the source command.
pub fn execute(config: &MmifConfig, human: bool, args: SourceArgs) -> Result<()> {
    let mut mmif = build_source(&args, config)?;
    write_mmif(&mut mmif, config, args.pretty, args.output.as_deref())?;
    if human {
        print_human(&mmif, args.output.as_deref());
    }
    Ok(())
}
