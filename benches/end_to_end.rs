//! Compile latency of a synthetic project: one vars file and a kernels
//! file whose call depth grows with the parameter.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rustsl::config::Config;
use rustsl::{compile_sources, SourceFile};

const VARS: &str = "\
//gpu:vars
//gpu:group -uniform Params
pub static PARAMS: Global<Vec<Params>> = Global::new();
//gpu:group Data
pub static Data: Global<Tensor<f32>> = Global::new();
//gpu:dims 2
pub static Grid: Global<Tensor<u32>> = Global::new();
//gpu:end

//gpu:start
pub struct Params {
    pub n: u32,
    pub scale: f32,
    pub pad0: u32,
    pub pad1: u32,
}
//gpu:end
";

/// `n` kernels, each calling a chain of `n` helper functions.
fn synthetic_kernels(n: usize) -> String {
    let mut src = String::from("//gpu:start\n");
    for i in 0..n {
        let next = if i + 1 < n {
            format!("step{}(x * 0.5)", i + 1)
        } else {
            "x".to_string()
        };
        src.push_str(&format!("fn step{}(x: f32) -> f32 {{\n    {} + 1.0\n}}\n\n", i, next));
    }
    for k in 0..n {
        src.push_str(&format!(
            "fn kernel{k}(i: u32) {{ //gpu:kernel read-write:Data\n    \
             let p = get_params(0);\n    \
             if i >= p.n {{\n        return;\n    }}\n    \
             let g = Grid.value(i, {k});\n    \
             Data.set(step{k}(g as f32 * p.scale), i);\n}}\n\n"
        ));
    }
    src.push_str("//gpu:end\n");
    src
}

fn bench_compile(c: &mut Criterion) {
    let config = Config::default();
    let mut group = c.benchmark_group("compile_sources");
    for n in [4, 16, 64] {
        let kernels = synthetic_kernels(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &kernels, |b, kernels| {
            b.iter(|| {
                let sources = vec![
                    SourceFile::new("vars.rs", VARS),
                    SourceFile::new("kernels.rs", kernels.as_str()),
                ];
                black_box(compile_sources(sources, &config).ok())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
