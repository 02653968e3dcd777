//! Staged compilation pipeline.
//!
//! A [`Context`] owns every piece of run state (sources, Systems, item
//! index, call graph, diagnostics) and is threaded through the stages in
//! order: extract, declare, allocate, parse, graph, resolve, items, emit.
//! Each stage completes before the next starts.

use rayon::prelude::*;

use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::emit::{self, KernelShader, Shared};
use crate::extract::{self, Extracted};
use crate::graph::reach::{self, ReachSummary};
use crate::graph::{CallGraph, Function};
use crate::layout;
use crate::span::LineIndex;
use crate::system::{vars, Kernel, Systems};
use crate::translate::{self, items, prepass, Env, ItemIndex, SpanMap};

/// One input file.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// An input file taking part in the run.
pub(crate) struct Unit {
    /// Index into the run's sources; also the diagnostic file id.
    pub file_id: usize,
    pub extracted: Extracted,
    /// Extracted text prepared for the Rust parser.
    pub prepared: String,
    pub spans: SpanMap,
    /// Dropped after a structural or reference error.
    pub skipped: bool,
}

/// State of one compilation run.
pub(crate) struct Context<'c> {
    pub config: &'c Config,
    pub sources: &'c [SourceFile],
    /// Usable files in processing order: vars files first.
    pub units: Vec<Unit>,
    /// Parsed trees, parallel to `units`.
    pub files: Vec<Option<syn::File>>,
    pub systems: Systems,
    pub index: ItemIndex,
    pub graph: CallGraph,
    /// Types and constants of every file.
    pub items: String,
    pub summary: ReachSummary,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'c> Context<'c> {
    pub fn new(sources: &'c [SourceFile], config: &'c Config) -> Self {
        Self {
            config,
            sources,
            units: Vec::new(),
            files: Vec::new(),
            systems: Systems::new(),
            index: ItemIndex::new(),
            graph: CallGraph::new(),
            items: String::new(),
            summary: ReachSummary::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Extract the annotated regions of every source. Files with
    /// structural errors or no regions take no further part. Files
    /// declaring vars are moved to the front, keeping relative order.
    pub fn extract(&mut self) {
        for (file_id, source) in self.sources.iter().enumerate() {
            let mut extracted = extract::extract(file_id as u16, &source.text);
            let failed = extracted.has_errors();
            self.diagnostics.append(&mut extracted.diagnostics);
            if failed {
                tracing::debug!(file = %source.name, "file skipped after extraction errors");
                continue;
            }
            if extracted.is_empty() && extracted.kernels.is_empty() {
                continue;
            }
            let spans = SpanMap::new(
                LineIndex::new(file_id as u16, &source.text),
                extracted.origin.clone(),
            );
            self.units.push(Unit {
                file_id,
                prepared: prepass::prepare(&extracted),
                extracted,
                spans,
                skipped: false,
            });
        }
        self.units.sort_by_key(|u| !u.extracted.has_vars());
        tracing::debug!(files = self.units.len(), "extracted");
    }

    /// Build Systems, Groups and Vars from vars regions, and Kernels from
    /// kernel declarations.
    pub fn declare(&mut self) {
        for unit in &self.units {
            let source = &self.sources[unit.file_id];
            let index = LineIndex::new(unit.file_id as u16, &source.text);
            for block in &unit.extracted.vars {
                let system = self.systems.get_or_insert(&block.system);
                let diags = vars::parse_vars(block, system, &index);
                self.diagnostics.extend(diags);
            }
            for decl in &unit.extracted.kernels {
                let span = index.line(decl.line);
                let system = self.systems.get_or_insert(&decl.system);
                if system.kernels.contains_key(&decl.name) {
                    self.diagnostics.push(Diagnostic::warning(
                        format!(
                            "kernel `{}` declared twice in System `{}`; the first declaration is used",
                            decl.name, decl.system
                        ),
                        span,
                    ));
                    continue;
                }
                let mut kernel = Kernel::new(&decl.name, &decl.system);
                kernel.args = decl.args.clone();
                kernel.call_args = decl.call_args.clone();
                kernel.read_write = decl.read_write.clone();
                kernel.span = span;
                system.kernels.insert(decl.name.clone(), kernel);
            }
        }
        tracing::debug!(kernels = self.systems.kernel_count(), "declared");
    }

    /// Assign binding coordinates.
    pub fn allocate(&mut self) {
        let diags = layout::allocate_all(&mut self.systems, self.config);
        self.diagnostics.extend(diags);
    }

    /// Parse every prepared file and index its declarations.
    pub fn parse(&mut self) {
        self.files = self
            .units
            .iter_mut()
            .map(|unit| match syn::parse_file(&unit.prepared) {
                Ok(file) => Some(file),
                Err(e) => {
                    let span = unit.spans.span(e.span());
                    self.diagnostics
                        .push(Diagnostic::error(format!("cannot parse extracted code: {}", e), span));
                    unit.skipped = true;
                    None
                }
            })
            .collect();
        for file in self.files.iter().flatten() {
            self.index.add_file(file);
        }
        tracing::debug!(functions = self.index.funcs.len(), "parsed");
    }

    /// Walk every function in graph mode. Any error withdraws the whole
    /// file from the run.
    pub fn graph(&mut self) {
        let mut functions: Vec<Function> = Vec::new();
        for (i, unit) in self.units.iter_mut().enumerate() {
            let Some(file) = self.files.get(i).and_then(Option::as_ref) else {
                continue;
            };
            let env = Env::graph(&self.index, &self.systems, self.config, &unit.spans);
            let mut found = Vec::new();
            let mut failed = false;
            for item in translate::fn_items(file) {
                let base = item.sig.ident.to_string();
                if self.config.is_excluded(&base) || self.config.is_excluded(&item.name) {
                    continue;
                }
                match translate::graph_function(&env, &item, i) {
                    Ok(f) => found.push(f),
                    Err(d) => {
                        self.diagnostics.push(d);
                        failed = true;
                    }
                }
            }
            if failed {
                tracing::debug!(file = %self.sources[unit.file_id].name, "file withdrawn");
                unit.skipped = true;
                continue;
            }
            functions.extend(found);
        }
        for (i, unit) in self.units.iter().enumerate() {
            if unit.skipped {
                if let Some(slot) = self.files.get_mut(i) {
                    *slot = None;
                }
            }
        }

        let mut graph = CallGraph::new();
        for f in functions {
            if let Err(dup) = graph.insert(f) {
                self.diagnostics.push(Diagnostic::warning(
                    format!("function `{}` is defined more than once; the first definition is used", dup.name),
                    dup.span,
                ));
            }
        }
        graph.link();
        tracing::debug!(functions = graph.len(), "call graph built");
        self.graph = graph;
    }

    /// Resolve every kernel's closure and buffer count.
    pub fn resolve(&mut self) {
        self.summary = reach::resolve_all(&mut self.systems, &self.graph, self.config, &mut self.diagnostics);
        tracing::debug!(
            resolved = self.summary.resolved,
            max_buffers = self.summary.max_buffers,
            "kernels resolved"
        );
    }

    /// Render the types and constants of every usable file once.
    pub fn items(&mut self) {
        let mut out = String::new();
        for (unit, file) in self.units.iter().zip(&self.files) {
            let Some(file) = file else {
                continue;
            };
            let env = Env::graph(&self.index, &self.systems, self.config, &unit.spans);
            let (text, diags) = items::render_items(file, &env);
            out.push_str(&text);
            self.diagnostics.extend(diags);
        }
        self.items = out;
    }

    /// Emit every resolved kernel, in parallel. Syntax trees cannot
    /// cross threads, so each worker parses its own copy of the files.
    pub fn emit(&mut self) -> Vec<KernelShader> {
        let spans: Vec<SpanMap> = self.units.iter().map(|u| u.spans.clone()).collect();
        let prepared: Vec<Option<&str>> = self
            .units
            .iter()
            .map(|u| (!u.skipped).then_some(u.prepared.as_str()))
            .collect();
        let shared = Shared {
            index: &self.index,
            systems: &self.systems,
            graph: &self.graph,
            config: self.config,
            items: &self.items,
            spans: &spans,
        };
        let jobs: Vec<_> = self
            .systems
            .iter()
            .flat_map(|s| s.kernels.values().filter(|k| k.resolved).map(move |k| (s, k)))
            .collect();

        let results: Vec<Result<KernelShader, Vec<Diagnostic>>> = jobs
            .par_iter()
            .map_init(
                || {
                    prepared
                        .iter()
                        .map(|p| p.and_then(|text| syn::parse_file(text).ok()))
                        .collect::<Vec<_>>()
                },
                |files, (system, kernel)| emit::emit_kernel(&shared, files, system, kernel),
            )
            .collect();

        let mut shaders = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(mut shader) => {
                    self.diagnostics.append(&mut shader.diagnostics);
                    shaders.push(shader);
                }
                Err(diags) => self.diagnostics.extend(diags),
            }
        }
        tracing::debug!(kernels = shaders.len(), "emitted");
        shaders
    }

    /// `(file name, extracted text)` of every usable file.
    pub fn imports(&self) -> Vec<(String, String)> {
        self.units
            .iter()
            .filter(|u| !u.skipped)
            .map(|u| {
                let name = std::path::Path::new(&self.sources[u.file_id].name)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| self.sources[u.file_id].name.clone());
                (name, u.extracted.text())
            })
            .collect()
    }

    /// Run every stage up to, and including, emission.
    pub fn run(&mut self) -> Vec<KernelShader> {
        self.extract();
        self.declare();
        self.allocate();
        self.parse();
        self.graph();
        self.resolve();
        self.items();
        self.emit()
    }
}
