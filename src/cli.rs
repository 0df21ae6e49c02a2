//! CLI: grammar JSON → (format templates | registry dump)
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use bx_format::emit::{GenerateOptions, DEFAULT_MAX_ALTERNATIVES};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// synthesize format templates from tree-building PEG grammars (JSON documents)
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// more logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// write one `<name>.txt` template file per grammar
    Format(FormatOut),
    /// print the JSON debug view of the capture registry
    Dump(DumpOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more grammar files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct FormatOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output directory
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// output file name without extension (defaults to the input file stem)
    #[arg(long)]
    name: Option<String>,

    /// run the analysis but discard the output
    #[arg(long)]
    dry_run: bool,

    /// upper bound on blocks per (shape, tag)
    #[arg(long, default_value_t = DEFAULT_MAX_ALTERNATIVES)]
    max_alternatives: u64,
}

#[derive(clap::Parser, Debug)]
struct DumpOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_process(
        &self,
        mut apply: impl FnMut(&Path, bx_format::Grammar) -> Result<()>,
    ) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        for source_path in source_paths {
            let grammar = bx_format::load::load_grammar(&source_path)?;
            apply(&source_path, grammar)?;
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        StderrLogger::install(self.verbose);
        match &self.cmd {
            Command::Format(target) => {
                if target.name.is_some() && target.input_settings.input.len() > 1 {
                    bail!("--name takes exactly one input; without it outputs follow input stems");
                }
                for path in resolve_file_path_patterns(&target.input_settings.input)? {
                    let file_name = match (&target.name, target.dry_run) {
                        (_, true) => None,
                        (Some(name), false) => Some(name.clone()),
                        (None, false) => Some(file_stem(&path)?),
                    };
                    let options = GenerateOptions {
                        output_dir: target.out_dir.clone(),
                        file_name,
                        max_alternatives: target.max_alternatives,
                    };
                    let report = bx_format::emit::generate_file(&path, &options)
                        .with_context(|| format!("generating templates for {}", path.display()))?;
                    eprintln!(
                        "{} {}: {} shape(s), {} block(s), {} skipped, {} truncated",
                        "done".green().bold(),
                        path.display(),
                        report.shapes,
                        report.blocks,
                        report.skipped.len(),
                        report.truncated.len(),
                    );
                }
                Ok(())
            }
            Command::Dump(target) => {
                let mut views = Vec::new();
                target.input_settings.load_process(|path, grammar| {
                    let registry = bx_format::build::build(&grammar)
                        .with_context(|| format!("building {}", path.display()))?;
                    views.push(serde_json::json!({
                        "grammar": path.display().to_string(),
                        "registry": bx_format::dump::registry_view(&registry),
                    }));
                    Ok(())
                })?;
                let dump_src = serde_json::to_string_pretty(&views)?;
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(out, &dump_src)
                        .with_context(|| format!("writing {}", out.display()))?;
                } else {
                    println!("{dump_src}");
                }
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LOGGING
// ————————————————————————————————————————————————————————————————————————————

struct StderrLogger {
    level: log::LevelFilter,
}

impl StderrLogger {
    fn install(verbose: u8) {
        let level = match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        // a logger may already be set (tests, embedding); keep that one
        if log::set_boxed_logger(Box::new(StderrLogger { level })).is_ok() {
            log::set_max_level(level);
        }
    }
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            log::Level::Error => "error".red().bold(),
            log::Level::Warn => "warn".yellow().bold(),
            log::Level::Info => "info".green(),
            log::Level::Debug => "debug".blue(),
            log::Level::Trace => "trace".dimmed(),
        };
        eprintln!("{level}: {}", record.args());
    }

    fn flush(&self) {}
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .with_context(|| format!("cannot derive an output name from {}", path.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            let entries =
                glob::glob(pattern).with_context(|| format!("bad glob pattern: {pattern}"))?;
            for entry in entries {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
