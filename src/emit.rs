//! Emission of template blocks, and the `generate` entry point.
//!
//! Block layout:
//!
//! ```text
//! format #Tag
//! (label: #T1 / #T2, other[]: #T3)`template`
//!
//! ```
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexSet;

use crate::build::build;
use crate::element::ShapeId;
use crate::enumerate::{rate_seq, resolve};
use crate::error::{AnalysisError, Error, Result};
use crate::grammar::Grammar;
use crate::load::load_grammar;
use crate::lower::lower;
use crate::registry::{CapturedShape, Registry};
use crate::render::{render, DEFAULT_BODY};
use crate::resolve::{tag_alternatives, TagAlternative};

// ————————————————————————————————————————————————————————————————————————————
// SINKS
// ————————————————————————————————————————————————————————————————————————————

pub trait TemplateSink {
    fn write(&mut self, text: &str) -> io::Result<()>;

    fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.write(text)?;
        self.write("\n")
    }

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink over any `io::Write`.
pub struct WriterSink<W: Write>(W);

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self(writer)
    }

    pub fn into_inner(self) -> W {
        self.0
    }
}

impl<W: Write> TemplateSink for WriterSink<W> {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.0.write_all(text.as_bytes())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl TemplateSink for String {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.push_str(text);
        Ok(())
    }
}

/// Accepts and drops everything (dry runs).
pub struct Discard;

impl TemplateSink for Discard {
    fn write(&mut self, _: &str) -> io::Result<()> {
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// OPTIONS & REPORT
// ————————————————————————————————————————————————————————————————————————————

pub const DEFAULT_MAX_ALTERNATIVES: u64 = 4096;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub output_dir: PathBuf,
    /// Output goes to `<output_dir>/<file_name>.txt`; `None` discards it.
    pub file_name: Option<String>,
    /// Upper bound on blocks per (shape, tag).
    pub max_alternatives: u64,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            file_name: None,
            max_alternatives: DEFAULT_MAX_ALTERNATIVES,
        }
    }
}

impl GenerateOptions {
    pub fn new(output_dir: impl Into<PathBuf>, file_name: Option<&str>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_name: file_name.map(str::to_owned),
            ..Self::default()
        }
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        let name = self.file_name.as_ref()?;
        Some(self.output_dir.join(format!("{name}.txt")))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub shapes: usize,
    pub blocks: usize,
    /// Shapes left out, with the reason.
    pub skipped: Vec<(ShapeId, AnalysisError)>,
    /// (shape, tag) pairs cut off at `max_alternatives`.
    pub truncated: Vec<(ShapeId, String)>,
}

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINTS
// ————————————————————————————————————————————————————————————————————————————

pub fn generate(
    grammar: &Grammar,
    output_dir: &Path,
    output_file_name: Option<&str>,
) -> Result<Report> {
    generate_with(grammar, &GenerateOptions::new(output_dir, output_file_name))
}

pub fn generate_with(grammar: &Grammar, options: &GenerateOptions) -> Result<Report> {
    let registry = build(grammar)?;
    let Some(path) = options.output_path() else {
        return emit(&registry, &mut Discard, options.max_alternatives).map_err(|source| Error::Io {
            path: PathBuf::new(),
            source,
        });
    };

    log::info!("generating {}", path.display());
    let io_error = |source| Error::Io { path: path.clone(), source };
    std::fs::create_dir_all(&options.output_dir).map_err(io_error)?;
    let file = File::create(&path).map_err(io_error)?;
    let mut sink = WriterSink::new(BufWriter::new(file));
    let report = emit(&registry, &mut sink, options.max_alternatives).map_err(io_error)?;
    sink.finish().map_err(io_error)?;
    Ok(report)
}

/// Loads a JSON grammar document and generates its templates.
pub fn generate_file(grammar_path: &Path, options: &GenerateOptions) -> Result<Report> {
    let grammar = load_grammar(grammar_path)?;
    generate_with(&grammar, options)
}

/// Runs the whole pipeline into memory.
pub fn generate_to_string(grammar: &Grammar, max_alternatives: u64) -> Result<(String, Report)> {
    let registry = build(grammar)?;
    let mut out = String::new();
    let report = emit(&registry, &mut out, max_alternatives).map_err(|source| Error::Io {
        path: PathBuf::new(),
        source,
    })?;
    Ok((out, report))
}

// ————————————————————————————————————————————————————————————————————————————
// EMISSION
// ————————————————————————————————————————————————————————————————————————————

struct Block {
    tag: String,
    labels: String,
    body: String,
}

/// Writes every block of every shape in id order.
pub fn emit(
    registry: &Registry,
    sink: &mut dyn TemplateSink,
    max_alternatives: u64,
) -> io::Result<Report> {
    let mut report = Report { shapes: registry.len(), ..Report::default() };

    // a shape with a missing rule in its own sequence is out before any query
    let mut failed: Vec<Option<AnalysisError>> = vec![None; registry.len()];
    for (id, err) in registry.undefined_references() {
        failed[id] = Some(err);
    }

    let mut alternatives = Vec::with_capacity(registry.len());
    for shape in registry.shapes() {
        if failed[shape.id].is_some() {
            alternatives.push(Vec::new());
            continue;
        }
        match tag_alternatives(registry, shape).collect::<Result<Vec<_>, _>>() {
            Ok(found) if found.is_empty() => alternatives.push(fallback(shape)),
            Ok(found) => alternatives.push(found),
            Err(err) => {
                failed[shape.id] = Some(err);
                alternatives.push(Vec::new());
            }
        }
    }
    // link labels name the same tags the blocks are written under
    let tags: Vec<Vec<String>> = alternatives
        .iter()
        .map(|alts| alts.iter().map(|a| a.tag.clone()).collect())
        .collect();

    for shape in registry.shapes() {
        let blocks = match failed[shape.id].take() {
            Some(err) => Err(err),
            None => {
                let alternatives = &alternatives[shape.id];
                shape_blocks(registry, shape, alternatives, &tags, max_alternatives, &mut report)
            }
        };
        let blocks = match blocks {
            Ok(blocks) => blocks,
            Err(err) => {
                log::warn!("skipping shape {}: {err}", describe(shape));
                report.skipped.push((shape.id, err));
                continue;
            }
        };
        for block in &blocks {
            sink.write_line(&format!("format #{}", block.tag))?;
            sink.write(&format!("({})`", block.labels))?;
            sink.write(&block.body)?;
            sink.write_line("`")?;
            sink.write_line("")?;
        }
        report.blocks += blocks.len();
    }
    Ok(report)
}

/// A named shape without tags is known by its rule name; an unnamed one has
/// nothing to write.
fn fallback(shape: &CapturedShape) -> Vec<TagAlternative> {
    shape
        .name
        .iter()
        .map(|name| TagAlternative { tag: name.clone(), elements: shape.elements.clone() })
        .collect()
}

fn shape_blocks(
    registry: &Registry,
    shape: &CapturedShape,
    alternatives: &[TagAlternative],
    tags: &[Vec<String>],
    max_alternatives: u64,
    report: &mut Report,
) -> Result<Vec<Block>, AnalysisError> {
    let named = shape.name.is_some();
    log::debug!("shape {}: {} tag(s)", describe(shape), alternatives.len());

    let mut blocks = Vec::new();
    for alt in alternatives {
        let nodes = lower(registry, &alt.elements)?;
        let rate = rate_seq(&nodes);
        log::debug!("shape {} #{}: {rate} alternative(s)", shape.id, alt.tag);
        if rate > max_alternatives {
            log::warn!(
                "shape {} #{}: {rate} alternatives, keeping the first {max_alternatives}",
                describe(shape),
                alt.tag
            );
            report.truncated.push((shape.id, alt.tag.clone()));
        }
        // different indices can render alike (an empty repetition and an absent one)
        let mut written: IndexSet<(String, String)> = IndexSet::new();
        for index in 0..rate.min(max_alternatives) {
            let Some(binding) = resolve(&nodes, index, tags) else {
                break;
            };
            let body = render(&binding, named).unwrap_or_else(|| DEFAULT_BODY.to_owned());
            if !written.insert((binding.label_list(), body)) {
                log::trace!("shape {} #{}: index {index} repeats a block", shape.id, alt.tag);
            }
        }
        blocks.extend(written.into_iter().map(|(labels, body)| Block {
            tag: alt.tag.clone(),
            labels,
            body,
        }));
    }
    Ok(blocks)
}

fn describe(shape: &CapturedShape) -> String {
    match &shape.name {
        Some(name) => format!("{} ({name})", shape.id),
        None => shape.id.to_string(),
    }
}
