use crate::api::*;
use crate::config::Config;

const VARS: &str = "\
//gpu:vars
//gpu:group -uniform Params
pub static PARAMS: Global<Vec<Params>> = Global::new();
//gpu:group Data
pub static Data: Global<Tensor<u32>> = Global::new();
//gpu:end

//gpu:start
pub struct Params {
    pub n: u32,
    pub pad0: u32,
    pub pad1: u32,
    pub pad2: u32,
}
//gpu:end
";

const KERNELS: &str = "\
use crate::sim;

//gpu:start
fn count(i: u32) { //gpu:kernel read-write:Data
    let p = get_params(0);
    if i >= p.n {
        return;
    }
    Data.set(sim::bump(Data.value(i)), i);
}

fn peek(i: u32) { //gpu:kernel
    let v = Data.value(i);
    Data.set(v, i);
}

fn bump(x: u32) -> u32 {
    x + 1
}

fn update() {
    Data.set(0, 0);
}
//gpu:end
";

fn compile(sources: &[(&str, &str)]) -> Compiled {
    let sources = sources
        .iter()
        .map(|(name, text)| SourceFile::new(*name, *text))
        .collect();
    compile_sources(sources, &Config::default()).unwrap()
}

fn shader<'a>(compiled: &'a Compiled, kernel: &str) -> &'a str {
    &compiled
        .shaders
        .iter()
        .find(|s| s.kernel == kernel)
        .unwrap()
        .text
}

#[test]
fn test_vars_file_is_processed_first() {
    let compiled = compile(&[("kernels.rs", KERNELS), ("vars.rs", VARS)]);
    assert!(!compiled.report.has_errors(), "{:?}", compiled.report.diagnostics);
    assert_eq!(compiled.shaders.len(), 2);
    assert_eq!(compiled.imports[0].0, "vars.rs");
    let count = shader(&compiled, "count");
    assert!(count.contains("@group(1) @binding(0) var<storage, read_write> Data: array<u32>;"));
    assert!(count.contains("Data[Index1D(TensorStrides[0], i)] = bump(Data[Index1D(TensorStrides[0], i)]);"));
    assert!(count.contains("struct Params {"));
    crate::validate::check(count).unwrap();
}

#[test]
fn test_read_write_is_per_kernel() {
    let compiled = compile(&[("vars.rs", VARS), ("kernels.rs", KERNELS)]);
    let peek = shader(&compiled, "peek");
    assert!(peek.contains("var<storage, read> Data: array<u32>;"));
    assert!(!peek.contains("fn bump"));
    let warnings: Vec<&str> = compiled
        .report
        .diagnostics
        .iter()
        .map(|d| d.message.as_str())
        .filter(|m| m.contains("not read-write in kernel `peek`"))
        .collect();
    assert_eq!(warnings.len(), 1);
}

#[test]
fn test_excluded_functions_are_not_translated() {
    let compiled = compile(&[("vars.rs", VARS), ("kernels.rs", KERNELS)]);
    for s in &compiled.shaders {
        assert!(!s.text.contains("fn update"));
    }
}

#[test]
fn test_report_counts_buffers() {
    let compiled = compile(&[("vars.rs", VARS), ("kernels.rs", KERNELS)]);
    // Strides, PARAMS and Data.
    assert_eq!(compiled.report.max_buffers, 3);
    assert_eq!(compiled.report.over_limit, 0);
    let layout = &compiled.manifest.systems[0];
    assert_eq!(layout.kernels, vec!["count".to_string(), "peek".to_string()]);
}

#[test]
fn test_unknown_variable_withdraws_file() {
    let bad = "\
//gpu:start
fn broken(i: u32) { //gpu:kernel
    let x = get_missing(i);
}
//gpu:end
";
    let compiled = compile(&[("vars.rs", VARS), ("bad.rs", bad)]);
    assert!(compiled.report.has_errors());
    assert!(compiled
        .report
        .diagnostics
        .iter()
        .any(|d| d.message.contains("get_missing")));
    assert!(compiled
        .report
        .diagnostics
        .iter()
        .any(|d| d.message.contains("kernel `broken` has no translatable function")));
    assert!(compiled.shaders.is_empty());
    assert_eq!(compiled.imports.len(), 1);
}

#[test]
fn test_structural_error_skips_only_that_file() {
    let open = "//gpu:start\nfn lost() {}\n";
    let compiled = compile(&[("vars.rs", VARS), ("open.rs", open), ("kernels.rs", KERNELS)]);
    assert_eq!(compiled.report.errors(), 1);
    assert_eq!(compiled.report.diagnostics[0].span.file_id, 1);
    assert_eq!(compiled.shaders.len(), 2);
}

#[test]
fn test_named_system() {
    let src = "\
//gpu:vars Physics
//gpu:group State
pub static Pos: Global<Tensor<f32>> = Global::new();
//gpu:end

//gpu:start
fn step(i: u32) { //gpu:kernel read-write:Pos Physics
    Pos.set_add(1.0, i);
}
//gpu:end
";
    let compiled = compile(&[("physics.rs", src)]);
    assert!(!compiled.report.has_errors(), "{:?}", compiled.report.diagnostics);
    let step = &compiled.shaders[0];
    assert_eq!(step.system, "Physics");
    assert_eq!(
        step.relative_path(),
        std::path::PathBuf::from("Physics").join("step.wgsl")
    );
    assert!(step.text.contains("Pos[Index1D(TensorStrides[0], i)] += 1.0;"));
}

#[test]
fn test_module_qualified_call_resolves() {
    let src = "\
//gpu:vars
//gpu:group Data
pub static Data: Global<Tensor<u32>> = Global::new();
//gpu:end

mod util {
    //gpu:start
    pub fn twice(x: u32) -> u32 {
        x * 2
    }
    //gpu:end
}

//gpu:start
fn foo(i: u32) { //gpu:kernel read-write:Data
    Data.set(crate::util::twice(i), i);
    Data.set(util::twice(i), i);
}
//gpu:end
";
    let compiled = compile(&[("nested.rs", src)]);
    assert!(!compiled.report.has_errors(), "{:?}", compiled.report.diagnostics);
    let foo = shader(&compiled, "foo");
    assert!(foo.contains("fn twice(x: u32) -> u32 {"));
    assert_eq!(
        foo.matches("Data[Index1D(TensorStrides[0], i)] = twice(i);").count(),
        2
    );
}

#[test]
fn test_too_many_files() {
    let sources = vec![SourceFile::new("a.rs", ""); MAX_FILES + 1];
    assert!(matches!(
        compile_sources(sources, &Config::default()),
        Err(crate::error::Error::TooManyFiles(_))
    ));
}
