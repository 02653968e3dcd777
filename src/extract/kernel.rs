//! Structural parse of `fn name(i: u32) { //gpu:kernel ...` lines.

use std::collections::BTreeSet;

use crate::system::DEFAULT_SYSTEM;

/// Marker that turns a function declaration line into a kernel.
pub const KERNEL_MARKER: &str = "//gpu:kernel";

/// A parsed kernel declaration line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelDecl {
    pub name: String,
    /// Parameter text between the parentheses.
    pub args: String,
    pub call_args: Vec<String>,
    pub read_write: BTreeSet<String>,
    pub system: String,
    /// Verbatim lines following the declaration, up to the closing brace.
    pub body: String,
    /// Zero-based line of the declaration in the original file.
    pub line: usize,
}

/// Whether `line` carries a kernel marker after code.
pub fn is_kernel_line(line: &str) -> bool {
    match line.find(KERNEL_MARKER) {
        Some(pos) => !line[..pos].trim().is_empty(),
        None => false,
    }
}

/// Parse a kernel declaration line.
pub fn parse_kernel_line(line: &str, line_no: usize) -> Result<KernelDecl, String> {
    let pos = line
        .find(KERNEL_MARKER)
        .ok_or_else(|| "missing kernel marker".to_string())?;
    let (code, marker) = line.split_at(pos);
    let tail = &marker[KERNEL_MARKER.len()..];

    let mut read_write = BTreeSet::new();
    let mut system: Option<String> = None;
    for word in tail.split_whitespace() {
        if let Some(list) = word.strip_prefix("read-write:") {
            read_write.extend(
                list.split(',')
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(|v| v.to_string()),
            );
        } else if system.is_none() {
            system = Some(word.to_string());
        } else {
            return Err(format!("unexpected `{}` after kernel System name", word));
        }
    }

    let fn_pos = find_fn_keyword(code).ok_or_else(|| "kernel marker must follow `fn name(...)`".to_string())?;
    let after_fn = &code[fn_pos + 3..];
    let open = after_fn
        .find('(')
        .ok_or_else(|| "kernel declaration has no parameter list".to_string())?;
    let name = after_fn[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("invalid kernel name `{}`", name));
    }
    let close = after_fn
        .rfind(')')
        .filter(|&c| c > open)
        .ok_or_else(|| "unterminated kernel parameter list".to_string())?;
    let args = after_fn[open + 1..close].trim().trim_end_matches(',').trim();

    let call_args: Vec<String> = args
        .split(',')
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(|a| {
            let pat = a.split(':').next().unwrap_or(a).trim();
            pat.trim_start_matches("mut ").trim().to_string()
        })
        .collect();
    if call_args.len() != 1 {
        return Err(format!(
            "kernel `{}` must take exactly one index parameter, found {}",
            name,
            call_args.len()
        ));
    }
    if !args.contains(':') {
        return Err(format!("kernel `{}` parameter needs a type", name));
    }

    Ok(KernelDecl {
        name: name.to_string(),
        args: args.to_string(),
        call_args,
        read_write,
        system: system.unwrap_or_else(|| DEFAULT_SYSTEM.to_string()),
        body: String::new(),
        line: line_no,
    })
}

/// Body lines following a declaration: every line up to (not including)
/// the first one starting with `}`.
pub fn capture_body(lines: &[&str], decl_line: usize) -> String {
    let mut body = Vec::new();
    for line in lines.iter().skip(decl_line + 1) {
        if line.starts_with('}') {
            break;
        }
        body.push(*line);
    }
    body.join("\n")
}

fn find_fn_keyword(code: &str) -> Option<usize> {
    let bytes = code.as_bytes();
    let mut from = 0;
    while let Some(rel) = code[from..].find("fn ") {
        let at = from + rel;
        if at == 0 || !(bytes[at - 1].is_ascii_alphanumeric() || bytes[at - 1] == b'_') {
            return Some(at);
        }
        from = at + 3;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_kernel() {
        let k = parse_kernel_line("pub fn compute(i: u32) { //gpu:kernel", 4).unwrap();
        assert_eq!(k.name, "compute");
        assert_eq!(k.args, "i: u32");
        assert_eq!(k.call_args, vec!["i"]);
        assert!(k.read_write.is_empty());
        assert_eq!(k.system, DEFAULT_SYSTEM);
        assert_eq!(k.line, 4);
    }

    #[test]
    fn test_kernel_with_read_write_and_system() {
        let k = parse_kernel_line(
            "fn step(i: u32) { //gpu:kernel read-write:Neurons,Synapses Physics",
            0,
        )
        .unwrap();
        assert_eq!(k.system, "Physics");
        assert!(k.read_write.contains("Neurons"));
        assert!(k.read_write.contains("Synapses"));
    }

    #[test]
    fn test_malformed_kernels() {
        assert!(parse_kernel_line("fn a(i: u32, j: u32) { //gpu:kernel", 0).is_err());
        assert!(parse_kernel_line("fn a() { //gpu:kernel", 0).is_err());
        assert!(parse_kernel_line("fn a(i: u32) { //gpu:kernel A B", 0).is_err());
        assert!(parse_kernel_line("let x = 1; //gpu:kernel", 0).is_err());
    }

    #[test]
    fn test_kernel_line_detection() {
        assert!(is_kernel_line("fn a(i: u32) { //gpu:kernel"));
        assert!(!is_kernel_line("//gpu:kernel"));
        assert!(!is_kernel_line("fn a(i: u32) {"));
    }

    #[test]
    fn test_capture_body() {
        let lines = vec![
            "fn a(i: u32) { //gpu:kernel",
            "    let x = i;",
            "    if x > 0 {",
            "    }",
            "}",
            "fn b() {}",
        ];
        assert_eq!(capture_body(&lines, 0), "    let x = i;\n    if x > 0 {\n    }");
    }
}
