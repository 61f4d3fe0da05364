use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};
use crate::scan::config::Backend;

#[derive(Parser, Debug)]
#[command(
    name = "laudo-scan",
    version,
    about = "Extract TASY numbers and report dates from year-grouped PDF reports"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk every year folder and write results.csv and failures.csv
    Scan(ScanArgs),
    /// Show resolved configuration and tool availability
    Status,
    /// Run the identifier and date picker against one local PDF
    Pick(PickArgs),
}

#[derive(Args, Debug, Default)]
pub struct ScanArgs {
    #[arg(long, help = "Root folder id (drive) or directory (local)")]
    pub root: Option<String>,
    #[arg(long, value_parser = parse_backend, help = "drive or local")]
    pub backend: Option<Backend>,
    #[arg(long)]
    pub max_items: Option<usize>,
    #[arg(long)]
    pub max_depth: Option<usize>,
    #[arg(long, help = "Case-insensitive file name filter; empty disables it")]
    pub filter: Option<String>,
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PickArgs {
    #[arg(long)]
    pub pdf: PathBuf,
    #[arg(long, help = "File name to use for identifier and filename-date lookup")]
    pub name: Option<String>,
}

fn parse_backend(raw: &str) -> Result<Backend, String> {
    Backend::parse(raw).ok_or_else(|| format!("unknown backend `{raw}` (expected drive or local)"))
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Command::Scan(args) => commands::scan::run(&commands::scan::ScanOptions {
            root: args.root,
            backend: args.backend,
            max_items: args.max_items,
            max_depth: args.max_depth,
            filter: args.filter,
            output_dir: args.output_dir,
        })?,
        Command::Status => commands::status::run()?,
        Command::Pick(args) => commands::pick::run(&commands::pick::PickOptions {
            pdf: args.pdf,
            name: args.name,
        })?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_flags_parse() {
        let cli = Cli::try_parse_from([
            "laudo-scan",
            "scan",
            "--backend",
            "fs",
            "--max-items",
            "5",
            "--filter",
            "",
            "--json",
        ])
        .expect("parse");
        assert!(cli.json);
        let Command::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.backend, Some(Backend::Local));
        assert_eq!(args.max_items, Some(5));
        assert_eq!(args.filter.as_deref(), Some(""));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["laudo-scan", "scan", "--backend", "s3"]).is_err());
    }

    #[test]
    fn pick_requires_pdf() {
        assert!(Cli::try_parse_from(["laudo-scan", "pick"]).is_err());
    }
}
