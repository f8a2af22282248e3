use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use blastreport_rs::format_report_file;
use blastreport_rs::taxdb::TaxonomyDb;
use blastreport_rs::taxonomy::TaxonomyLookup;

/// Summarize a BLAST XML2 report into hit statistics and taxonomy trees.
#[derive(Parser, Debug)]
#[command(name = "blastreport", version, about)]
struct Args {
    /// BLAST XML2 report (or its compact JSON form), optionally gzipped
    report: PathBuf,

    /// Taxonomy dump: <taxid>\t<parentid>\t<name>\t<rank>
    #[arg(long)]
    taxdb: Option<PathBuf>,

    /// Write the JSON bundle here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON bundle
    #[arg(long)]
    pretty: bool,
}

fn spinner(color: &str, message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let template = format!("{{spinner:.{color}}} {{msg}}");
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template(&template)
    {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Taxonomy
    let taxonomy = match &args.taxdb {
        Some(path) => {
            let sp = spinner("blue", &format!("Loading taxonomy from {}...", path.display()));
            let db = TaxonomyDb::from_file(path)?;
            sp.finish_with_message(format!("Loaded {} taxa.", db.len()));
            db
        }
        None => {
            log::warn!("No --taxdb given; every hit will resolve to NotFound");
            TaxonomyDb::new()
        }
    };
    let lookup: &dyn TaxonomyLookup = &taxonomy;

    // 2. Report
    let sp = spinner("green", "Formatting report...");
    let bundle = format_report_file(&args.report, lookup)?;
    match &bundle.message {
        Some(message) => sp.finish_with_message(format!("No hits: {message}")),
        None => sp.finish_with_message(format!("Formatted {} hit(s).", bundle.hit_count())),
    }

    // 3. Output
    let json = bundle.to_json(args.pretty)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json)?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
