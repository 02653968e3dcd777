//! Public entry points: compile sources in memory, or build a project
//! from files on disk (compile, write, validate).

pub mod pipeline;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::config::{collect_inputs, Config};
use crate::diagnostic::{render_diagnostics, Diagnostic};
use crate::emit::{self, KernelShader};
use crate::error::{Error, Result};
use crate::layout::{self, Manifest};
use crate::validate::{self, Issue};

pub use pipeline::SourceFile;

/// Most files one run can address in diagnostic spans.
pub const MAX_FILES: usize = u16::MAX as usize;

/// Outcome of a run: everything reported to the operator.
#[derive(Debug, Default)]
pub struct Report {
    pub sources: Vec<SourceFile>,
    pub diagnostics: Vec<Diagnostic>,
    /// Highest per-kernel buffer count.
    pub max_buffers: usize,
    /// Kernels binding more buffers than the configured ceiling.
    pub over_limit: usize,
    /// Written kernel files.
    pub written: Vec<PathBuf>,
    pub validation: Vec<Issue>,
}

impl Report {
    pub fn errors(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warnings(&self) -> usize {
        self.diagnostics.len() - self.errors()
    }

    pub fn has_errors(&self) -> bool {
        self.errors() > 0
    }

    /// Render every diagnostic against its file, then the validator
    /// issues.
    pub fn render(&self) {
        for (file_id, source) in self.sources.iter().enumerate() {
            let diags: Vec<Diagnostic> = self
                .diagnostics
                .iter()
                .filter(|d| d.span.file_id as usize == file_id)
                .cloned()
                .collect();
            render_diagnostics(&diags, &source.name, &source.text);
        }
        for issue in &self.validation {
            eprintln!(
                "warning: {} rejected {}:\n{}",
                issue.validator,
                issue.path.display(),
                issue.message
            );
        }
    }

    /// One-line summary, always printed at the end of a run.
    pub fn summary(&self) -> String {
        format!(
            "{} kernel(s) written, {} error(s), {} warning(s); max buffers per kernel: {}, kernels over the limit: {}",
            self.written.len(),
            self.errors(),
            self.warnings(),
            self.max_buffers,
            self.over_limit
        )
    }
}

/// Result of compiling in memory.
#[derive(Debug)]
pub struct Compiled {
    pub shaders: Vec<KernelShader>,
    pub manifest: Manifest,
    /// `(file name, extracted text)` for the imports directory.
    pub imports: Vec<(String, String)>,
    pub report: Report,
}

/// Compile sources without touching the file system.
pub fn compile_sources(sources: Vec<SourceFile>, config: &Config) -> Result<Compiled> {
    if sources.len() > MAX_FILES {
        return Err(Error::TooManyFiles(MAX_FILES));
    }
    let (shaders, manifest, imports, summary, diagnostics) = {
        let mut ctx = pipeline::Context::new(&sources, config);
        let shaders = ctx.run();
        let manifest = Manifest::from_systems(&ctx.systems);
        let imports = ctx.imports();
        (shaders, manifest, imports, ctx.summary, ctx.diagnostics)
    };
    let report = Report {
        sources,
        diagnostics,
        max_buffers: summary.max_buffers,
        over_limit: summary.over_limit,
        ..Default::default()
    };
    Ok(Compiled {
        shaders,
        manifest,
        imports,
        report,
    })
}

/// Read the inputs (files, or directories of `*.rs` files).
pub fn read_sources(inputs: &[PathBuf]) -> Result<Vec<SourceFile>> {
    collect_inputs(inputs)?
        .into_iter()
        .map(|path| {
            let text = std::fs::read_to_string(&path).map_err(|source| Error::Read {
                path: path.clone(),
                source,
            })?;
            Ok(SourceFile::new(path.to_string_lossy(), text))
        })
        .collect()
}

/// Compile the inputs, write kernels, manifest and imports, then run the
/// validators. Only environment failures are errors; everything else is
/// in the report.
pub fn build(inputs: &[PathBuf], config: &Config) -> Result<Report> {
    let sources = read_sources(inputs)?;
    tracing::debug!(files = sources.len(), "read inputs");
    let compiled = compile_sources(sources, config)?;
    let mut report = compiled.report;

    report.written = emit::write_shaders(&config.output, &compiled.shaders)?;
    emit::write_manifest(&config.output, &compiled.manifest)?;
    emit::write_imports(&config.imports_dir(), &compiled.imports)?;

    if config.validate {
        let issues: Vec<Issue> = compiled
            .shaders
            .par_iter()
            .zip(report.written.par_iter())
            .filter_map(|(shader, path)| validate::check_file(path, &shader.text))
            .collect();
        report.validation.extend(issues);
    }
    if let Some(command) = &config.validator {
        report
            .validation
            .extend(validate::run_external(command, &report.written));
    }
    Ok(report)
}

/// Binding table of the inputs' Systems.
pub fn layout_table(inputs: &[PathBuf], config: &Config) -> Result<(String, Report)> {
    let sources = read_sources(inputs)?;
    let mut ctx = pipeline::Context::new(&sources, config);
    ctx.extract();
    ctx.declare();
    ctx.allocate();
    let table = layout::table(&ctx.systems);
    let diagnostics = std::mem::take(&mut ctx.diagnostics);
    Ok((
        table,
        Report {
            sources,
            diagnostics,
            ..Default::default()
        },
    ))
}

/// Directory of the first input, for finding `rustsl.toml`.
pub fn input_root(inputs: &[PathBuf]) -> &Path {
    match inputs.first() {
        Some(p) if p.is_dir() => p.as_path(),
        Some(p) => p.parent().unwrap_or(Path::new(".")),
        None => Path::new("."),
    }
}
