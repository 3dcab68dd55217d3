//! gui2tree - Reconstruct a layout tree from GUI element detections
//!
//! A command line tool that reads the JSON a GUI element detector
//! produced for one screenshot and writes the reconstructed layout
//! tree as JSON.

use anyhow::Context;
use clap::{ArgAction, Parser};
use mirador_core::{DetectionInput, ElementTable, LayoutParams, recognize_layout};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Reconstruct the layout hierarchy of a GUI screenshot from its
/// detected elements.
#[derive(Parser, Debug)]
#[command(name = "gui2tree")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// One or more paths to detection JSON files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,

    // === Layout analysis options ===
    /// Position tolerance for clustering non-text elements (pixels)
    #[arg(long = "nontext-position-eps", default_value = "10.0")]
    nontext_position_eps: f64,

    /// Area tolerance for clustering non-text elements (square pixels)
    #[arg(long = "nontext-area-eps", default_value = "500.0")]
    nontext_area_eps: f64,

    /// Position tolerance for clustering text elements (pixels)
    #[arg(long = "text-position-eps", default_value = "10.0")]
    text_position_eps: f64,

    /// Maximum spread of in-group gaps for non-text groups (pixels)
    #[arg(long = "nontext-gap-eps", default_value = "4.0")]
    nontext_gap_eps: f64,

    /// Maximum spread of in-group gaps for text groups (pixels)
    #[arg(long = "text-gap-eps", default_value = "8.0")]
    text_gap_eps: f64,

    /// Fraction of connections that must agree for two groups to pair
    #[arg(long = "match-threshold", default_value = "0.7")]
    match_threshold: f64,

    /// Connection angle tolerance when pairing groups (degrees)
    #[arg(long = "angle-tolerance", default_value = "10.0")]
    angle_tolerance: f64,

    // === Output options ===
    /// Path to file where output is written, or "-" for stdout
    #[arg(short = 'o', long, default_value = "-")]
    outfile: String,

    /// Pretty-print the output JSON
    #[arg(short = 'p', long, action = ArgAction::SetTrue)]
    pretty: bool,
}

fn build_params(args: &Args) -> LayoutParams {
    LayoutParams {
        nontext_position_eps: args.nontext_position_eps,
        nontext_area_eps: args.nontext_area_eps,
        text_position_eps: args.text_position_eps,
        nontext_gap_eps: args.nontext_gap_eps,
        text_gap_eps: args.text_gap_eps,
        match_threshold: args.match_threshold,
        angle_tolerance: args.angle_tolerance,
        ..LayoutParams::default()
    }
}

fn process_file(path: &PathBuf, output: &mut dyn Write, args: &Args) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let input: DetectionInput = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;
    let mut table = ElementTable::from_detection(input)
        .with_context(|| format!("loading {}", path.display()))?;
    let tree = recognize_layout(&mut table, &build_params(args))?;
    if args.pretty {
        serde_json::to_writer_pretty(&mut *output, &tree)?;
    } else {
        serde_json::to_writer(&mut *output, &tree)?;
    }
    writeln!(output)?;
    Ok(())
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut output: Box<dyn Write> = if args.outfile == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(&args.outfile)
            .map_err(|e| format!("Failed to create output file {}: {}", args.outfile, e))?;
        Box::new(BufWriter::new(file))
    };

    for path in &args.files {
        if !path.exists() {
            eprintln!("Error: File not found: {}", path.display());
            std::process::exit(1);
        }
        if let Err(e) = process_file(path, &mut output, &args) {
            eprintln!("Error processing {}: {:#}", path.display(), e);
            std::process::exit(1);
        }
    }
    output.flush()?;
    Ok(())
}
