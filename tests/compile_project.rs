use std::fs;

use rustsl::config::Config;
use rustsl::layout::SplitLayout;
use rustsl::{build, compile_sources, SourceFile};

const ATOMIC_SRC: &str = "\
//gpu:vars
//gpu:group Data
//gpu:dims 2
pub static Data: Global<Tensor<f32>> = Global::new();
//gpu:end

//gpu:start
fn foo(i: u32) { //gpu:kernel
    let v = Data.value(i, 0);
    Data.atomic_add(v, i, 1);
}
//gpu:end
";

const SPLIT_SRC: &str = "\
//gpu:vars
//gpu:group Storage
//gpu:nbuffs 3
pub static Big: Global<Tensor<u32>> = Global::new();
//gpu:end

//gpu:start
fn fill(i: u32) { //gpu:kernel read-write:Big
    Big.set(i, i);
}
//gpu:end
";

#[test]
fn test_atomic_kernel_layout() {
    let compiled = compile_sources(
        vec![SourceFile::new("sim.rs", ATOMIC_SRC)],
        &Config::default(),
    )
    .unwrap();
    assert!(!compiled.report.has_errors(), "{:?}", compiled.report.diagnostics);
    assert_eq!(compiled.shaders.len(), 1);
    let foo = &compiled.shaders[0];
    assert_eq!(foo.kernel, "foo");

    assert!(foo
        .text
        .contains("@group(0) @binding(0) var<storage, read> TensorStrides: array<u32>;"));
    assert!(foo
        .text
        .contains("@group(0) @binding(1) var<storage, read_write> Data: array<atomic<f32>>;"));
    assert!(foo.text.contains("atomicAdd(&Data[Index2D("));
    assert!(!foo.text.contains("+="));

    // Strides plus Data.
    assert_eq!(compiled.report.max_buffers, 2);
    let data = &compiled.manifest.systems[0].groups[0].vars[0];
    assert_eq!(data.bindings, vec![1]);
    assert_eq!(data.dims, 2);
    assert!(compiled
        .report
        .diagnostics
        .iter()
        .any(|d| d.message.contains("f32 tensor `Data`")));
}

#[test]
fn test_split_tensor_build() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("store.rs");
    fs::write(&src, SPLIT_SRC).unwrap();
    let config = Config {
        output: dir.path().join("shaders"),
        max_buffer_size: 64,
        ..Config::default()
    };

    let report = build(&[src], &config).unwrap();
    assert!(!report.has_errors(), "{:?}", report.diagnostics);
    assert!(report.validation.is_empty(), "{:?}", report.validation);
    assert_eq!(report.max_buffers, 4);

    let text = fs::read_to_string(dir.path().join("shaders").join("fill.wgsl")).unwrap();
    for (k, b) in [(0, 1), (1, 2), (2, 3)] {
        let line = format!("@group(0) @binding({}) var<storage, read_write> Big{}: array<u32>;", b, k);
        assert!(text.contains(&line), "missing {}", line);
    }
    assert!(text.contains("let b = min(ix / 16u, 2u);"));
    assert!(text.contains("Big_set(Index1D(TensorStrides[0], i), i);"));
    assert!(dir.path().join("shaders").join("layout.json").exists());
    assert!(dir
        .path()
        .join("shaders")
        .join("imports")
        .join("store.rs")
        .exists());
}

#[test]
fn test_split_covers_logical_space() {
    let split = SplitLayout {
        n_buffs: 3,
        per_buffer: 16,
    };
    let mut seen = vec![vec![false; 16]; 3];
    for ix in 0..split.capacity() {
        let (b, o) = split.locate(ix).unwrap();
        assert!(!seen[b][o as usize], "{} overlaps", ix);
        seen[b][o as usize] = true;
    }
    assert!(seen.iter().flatten().all(|s| *s));
    assert_eq!(split.locate(split.capacity()), None);
}
