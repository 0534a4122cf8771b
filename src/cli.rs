use crate::io::backend::BackendKind;
use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{io::Write, path::Path};

/// Full version string, the crate version plus an optional build description.
///
/// # Examples
/// * `0.1.0` - plain build
/// * `0.1.0-1ba958a-dirty` - with `VCFX_BUILD_DESCRIBE=1ba958a-dirty` set at compile time
pub static FULL_VERSION: Lazy<String> = Lazy::new(|| match option_env!("VCFX_BUILD_DESCRIBE") {
    Some(describe) if !describe.is_empty() => {
        format!("{}-{}", env!("CARGO_PKG_VERSION"), describe)
    }
    _ => env!("CARGO_PKG_VERSION").to_string(),
});

#[derive(Parser, Debug)]
#[command(name="vcfx",
          version=&**FULL_VERSION,
          about="Streaming VCF reader and writer",
          long_about = None,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true
    )]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    View(ViewArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::View(_) => "view",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(arg_required_else_help(true))]
pub struct ViewArgs {
    /// Input VCF, VCF.gz (or BCF with the htslib backend); `-` reads standard input
    #[arg(value_name = "INPUT", value_parser = check_input_path)]
    pub input: String,

    /// Write output to a file [default: standard output]
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        value_parser = check_prefix_path
    )]
    pub output: Option<String>,

    /// Comma-separated sample names to keep, in output order
    #[arg(
        short = 's',
        long = "samples",
        value_name = "SAMPLES",
        value_delimiter = ','
    )]
    pub samples: Option<Vec<String>>,

    /// Decoder used for the input
    #[arg(
        long = "backend",
        value_name = "BACKEND",
        value_enum,
        default_value_t = BackendKind::Text
    )]
    pub backend: BackendKind,

    /// Compress standard output with gzip (file output follows the extension)
    #[arg(short = 'z', long = "compress", help_heading = "Advanced")]
    pub compress: bool,

    /// Print only the header and exit
    #[arg(long = "header-only", help_heading = "Advanced")]
    pub header_only: bool,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.module_path().unwrap_or("unknown_module"),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_input_path(s: &str) -> Result<String> {
    if s == "-" {
        return Ok(s.to_string());
    }
    let path = Path::new(s);
    if !path.exists() {
        return Err(anyhow!("File does not exist: {}", path.display()));
    }
    Ok(s.to_string())
}

fn check_prefix_path(s: &str) -> Result<String> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(anyhow!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(s.to_string())
}
