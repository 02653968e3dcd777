use super::*;

fn lines(ex: &Extracted) -> Vec<&str> {
    ex.lines.iter().map(|l| l.as_str()).collect()
}

#[test]
fn test_plain_region_round_trip() {
    let src = "\
fn host_only() {}
//gpu:start
fn a(x: f32) -> f32 {
    x * 2.0
}
//gpu:end
fn also_host() {}
//gpu:start
const N: u32 = 4;
//gpu:end
";
    let ex = extract(0, src);
    assert!(!ex.has_errors());
    assert_eq!(
        lines(&ex),
        vec!["fn a(x: f32) -> f32 {", "    x * 2.0", "}", "const N: u32 = 4;"]
    );
    assert_eq!(ex.origin, vec![2, 3, 4, 8]);

    // Re-inserting the boundaries reproduces the tagged lines.
    let original: Vec<&str> = src.lines().collect();
    for (text, &line) in ex.lines.iter().zip(&ex.origin) {
        assert_eq!(text, original[line]);
    }
}

#[test]
fn test_file_without_regions_extracts_nothing() {
    let ex = extract(0, "fn main() {}\n");
    assert!(ex.is_empty());
    assert!(ex.diagnostics.is_empty());
}

#[test]
fn test_wgsl_region_keeps_start_drops_end() {
    let src = "\
//gpu:start
//gpu:wgsl
// fn fast(x: f32) -> f32 { return x; }
//gpu:end
fn b() {}
//gpu:end
";
    let ex = extract(0, src);
    assert!(!ex.has_errors());
    assert_eq!(
        lines(&ex),
        vec![
            "//gpu:wgsl",
            "// fn fast(x: f32) -> f32 { return x; }",
            "fn b() {}"
        ]
    );
}

#[test]
fn test_nowgsl_region_keeps_both_markers() {
    let src = "\
//gpu:start
//gpu:nowgsl
fn cpu_only() {}
//gpu:end
//gpu:end
";
    let ex = extract(0, src);
    assert_eq!(
        lines(&ex),
        vec!["//gpu:nowgsl", "fn cpu_only() {}", "//gpu:end"]
    );
}

#[test]
fn test_namespace_stripping_inside_regions() {
    let src = "\
use crate::physics;
//gpu:start
use crate::physics::Params;
fn a() -> f32 {
    physics::scale() + crate::b()
}
//gpu:end
";
    let ex = extract(0, src);
    assert_eq!(ex.lines[0], "use crate::physics::Params;");
    assert_eq!(ex.lines[2], "    scale() + b()");
}

#[test]
fn test_kernel_capture() {
    let src = "\
//gpu:start
pub fn compute(i: u32) { //gpu:kernel read-write:Data
    let x = i;
}
//gpu:end
";
    let ex = extract(0, src);
    assert!(!ex.has_errors());
    assert_eq!(ex.kernels.len(), 1);
    let k = &ex.kernels[0];
    assert_eq!(k.name, "compute");
    assert_eq!(k.body, "    let x = i;");
    assert!(k.read_write.contains("Data"));
    assert_eq!(k.line, 1);
}

#[test]
fn test_vars_block_collected() {
    let src = "\
//gpu:vars Physics
//gpu:group Main
//gpu:read-write
pub static DATA: Global<Tensor<f32>> = Global::new();
//gpu:end
";
    let ex = extract(0, src);
    assert!(!ex.has_errors());
    assert!(ex.has_vars());
    assert_eq!(ex.vars[0].system, "Physics");
    assert_eq!(ex.vars[0].lines.len(), 3);
    assert_eq!(ex.vars[0].lines[2].0, 3);
    assert_eq!(
        lines(&ex),
        vec!["pub static DATA: Global<Tensor<f32>> = Global::new();"]
    );
}

#[test]
fn test_structural_errors() {
    let end_only = extract(0, "//gpu:end\n");
    assert!(end_only.has_errors());

    let nested = extract(0, "//gpu:start\n//gpu:start\n//gpu:end\n");
    assert!(nested.has_errors());

    let open = extract(0, "//gpu:start\nfn a() {}\n");
    assert!(open.has_errors());
    assert!(open.diagnostics[0].message.contains("never closed"));

    let stray_kernel = extract(0, "fn k(i: u32) { //gpu:kernel\n}\n");
    assert!(stray_kernel.has_errors());

    let stray_attr = extract(0, "//gpu:start\n//gpu:dims 2\n//gpu:end\n");
    assert!(stray_attr.has_errors());
}

#[test]
fn test_unknown_directive_is_warning() {
    let ex = extract(0, "//gpu:start\n//gpu:mystery\n//gpu:end\n");
    assert!(!ex.has_errors());
    assert_eq!(ex.diagnostics.len(), 1);
}

#[test]
fn test_error_span_points_at_line() {
    let ex = extract(2, "fn a() {}\n//gpu:end\n");
    let d = &ex.diagnostics[0];
    assert_eq!(d.span.file_id, 2);
    assert_eq!(d.span.start, 10);
    assert_eq!(d.span.end, 19);
}
