//! Annotation extraction: pull the `//gpu:` regions out of a host file.
//!
//! Regions are stack-free: a plain (or vars) region may enclose one
//! `wgsl`/`nowgsl` region, and nothing nests deeper. The extracted lines
//! keep their original order; `origin[i]` is the original line of
//! extracted line `i`.

pub mod directive;
pub mod kernel;
pub mod namespace;

#[cfg(test)]
mod tests;

use crate::diagnostic::Diagnostic;
use crate::span::LineIndex;
use crate::system::DEFAULT_SYSTEM;

pub use directive::Directive;
pub use kernel::KernelDecl;
pub use namespace::Namespaces;

/// The raw lines of one `//gpu:vars` region.
#[derive(Clone, Debug, Default)]
pub struct VarsBlock {
    pub system: String,
    /// `(original zero-based line, text)` for every line in the region,
    /// directive lines included.
    pub lines: Vec<(usize, String)>,
}

/// Result of extracting one file.
#[derive(Clone, Debug, Default)]
pub struct Extracted {
    pub lines: Vec<String>,
    pub origin: Vec<usize>,
    pub kernels: Vec<KernelDecl>,
    pub vars: Vec<VarsBlock>,
    pub namespaces: Namespaces,
    pub diagnostics: Vec<Diagnostic>,
}

impl Extracted {
    /// Whether the file declares any global variables.
    pub fn has_vars(&self) -> bool {
        !self.vars.is_empty()
    }

    /// Structural errors make the whole file unusable.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.vars.is_empty()
    }

    /// Extracted lines joined into one text.
    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        text
    }

    /// Original zero-based line of an extracted zero-based line.
    pub fn original_line(&self, line: usize) -> usize {
        self.origin
            .get(line)
            .copied()
            .or_else(|| self.origin.last().copied())
            .unwrap_or(0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Region {
    Plain,
    Vars,
    Wgsl,
    NoWgsl,
}

impl Region {
    fn directive(self) -> &'static str {
        match self {
            Region::Plain => "//gpu:start",
            Region::Vars => "//gpu:vars",
            Region::Wgsl => "//gpu:wgsl",
            Region::NoWgsl => "//gpu:nowgsl",
        }
    }
}

struct Extractor<'a> {
    lines: Vec<&'a str>,
    index: LineIndex,
    out: Extracted,
    outer: Option<(Region, usize)>,
    inner: Option<(Region, usize)>,
    block: Option<VarsBlock>,
}

/// Extract the annotated regions of `text`.
pub fn extract(file_id: u16, text: &str) -> Extracted {
    let mut ex = Extractor {
        lines: text.lines().collect(),
        index: LineIndex::new(file_id, text),
        out: Extracted {
            namespaces: Namespaces::from_source(text),
            ..Default::default()
        },
        outer: None,
        inner: None,
        block: None,
    };
    for i in 0..ex.lines.len() {
        ex.line(i);
    }
    ex.finish();
    ex.out
}

impl<'a> Extractor<'a> {
    fn error(&mut self, line: usize, message: String) {
        let span = self.index.line(line);
        self.out.diagnostics.push(Diagnostic::error(message, span));
    }

    fn emit(&mut self, line: usize, text: String) {
        self.out.lines.push(text);
        self.out.origin.push(line);
    }

    fn is_open(&self) -> bool {
        self.outer.is_some() || self.inner.is_some()
    }

    fn line(&mut self, i: usize) {
        let raw = self.lines[i];
        let trimmed = raw.trim();
        match Directive::parse(trimmed) {
            Some(Ok(d)) => self.directive(i, raw, d),
            Some(Err(msg)) => self.error(i, msg),
            None => self.content(i, raw),
        }
    }

    fn directive(&mut self, i: usize, raw: &str, d: Directive) {
        match d {
            Directive::Start | Directive::Vars(_) => {
                if let Some((open, at)) = self.outer.or(self.inner) {
                    let msg = format!(
                        "region opened inside the `{}` region from line {}",
                        open.directive(),
                        at + 1
                    );
                    self.error(i, msg);
                    return;
                }
                if let Directive::Vars(system) = d {
                    self.outer = Some((Region::Vars, i));
                    self.block = Some(VarsBlock {
                        system: system.unwrap_or_else(|| DEFAULT_SYSTEM.to_string()),
                        lines: Vec::new(),
                    });
                } else {
                    self.outer = Some((Region::Plain, i));
                }
            }
            Directive::Wgsl | Directive::NoWgsl => {
                if let Some((open, at)) = self.inner {
                    let msg = format!(
                        "region opened inside the `{}` region from line {}",
                        open.directive(),
                        at + 1
                    );
                    self.error(i, msg);
                    return;
                }
                if matches!(self.outer, Some((Region::Vars, _))) {
                    self.error(i, "target regions are not allowed inside `//gpu:vars`".to_string());
                    return;
                }
                let region = if d == Directive::Wgsl {
                    Region::Wgsl
                } else {
                    Region::NoWgsl
                };
                self.inner = Some((region, i));
                self.emit(i, raw.to_string());
            }
            Directive::End => {
                if let Some((region, _)) = self.inner.take() {
                    if region == Region::NoWgsl {
                        self.emit(i, raw.to_string());
                    }
                } else if let Some((region, _)) = self.outer.take() {
                    if region == Region::Vars {
                        if let Some(block) = self.block.take() {
                            self.out.vars.push(block);
                        }
                    }
                } else {
                    self.error(i, "`//gpu:end` without an open region".to_string());
                }
            }
            Directive::Unknown(name) => {
                let span = self.index.line(i);
                self.out.diagnostics.push(Diagnostic::warning(
                    format!("unknown directive `//gpu:{}` ignored", name),
                    span,
                ));
            }
            attr if attr.is_var_attribute() => match self.block.as_mut() {
                Some(block) => block.lines.push((i, raw.to_string())),
                None => self.error(
                    i,
                    "variable attribute outside a `//gpu:vars` region".to_string(),
                ),
            },
            _ => {}
        }
    }

    fn content(&mut self, i: usize, raw: &str) {
        if kernel::is_kernel_line(raw) {
            self.kernel(i, raw);
            return;
        }
        match (self.outer, self.inner) {
            (_, Some((Region::Wgsl, _))) => self.emit(i, raw.to_string()),
            (Some((Region::Vars, _)), _) => {
                if let Some(block) = self.block.as_mut() {
                    block.lines.push((i, raw.to_string()));
                }
                let stripped = self.out.namespaces.strip(raw);
                self.emit(i, stripped);
            }
            (None, None) => {}
            _ => {
                let stripped = self.out.namespaces.strip(raw);
                self.emit(i, stripped);
            }
        }
    }

    fn kernel(&mut self, i: usize, raw: &str) {
        if !self.is_open() {
            self.error(i, "kernel declared outside a `//gpu:start` region".to_string());
            return;
        }
        match kernel::parse_kernel_line(raw, i) {
            Ok(mut decl) => {
                decl.body = kernel::capture_body(&self.lines, i);
                self.out.kernels.push(decl);
                let stripped = self.out.namespaces.strip(raw);
                self.emit(i, stripped);
            }
            Err(msg) => self.error(i, msg),
        }
    }

    fn finish(&mut self) {
        for (region, at) in [self.inner.take(), self.outer.take()].into_iter().flatten() {
            let msg = format!("`{}` region is never closed", region.directive());
            self.error(at, msg);
        }
    }
}
