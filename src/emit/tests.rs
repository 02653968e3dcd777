use super::*;
use crate::graph::reach;
use crate::layout;
use crate::system::{ElemKind, Group, Var, VarType, DEFAULT_SYSTEM};
use crate::translate::graph_function;

fn systems(nbuffs: Option<usize>) -> Systems {
    let mut systems = Systems::new();
    let system = systems.get_or_insert(DEFAULT_SYSTEM);
    let mut params = Group::new("Params", true);
    params.doc = "Global parameters.".to_string();
    params
        .vars
        .push(Var::new("PARAMS", VarType::Array("Params".to_string())));
    system.groups.push(params);
    let mut data = Group::new("Data", false);
    let mut var = Var::new("Data", VarType::Tensor(ElemKind::U32));
    var.doc = "Per-item counters.".to_string();
    var.nbuffs_hint = nbuffs;
    data.vars.push(var);
    system.groups.push(data);
    layout::allocate(system, &Config::default());
    systems
}

fn kernel(read_write: &[&str]) -> Kernel {
    let mut k = Kernel::new("compute", DEFAULT_SYSTEM);
    k.args = "i: u32".to_string();
    k.call_args = vec!["i".to_string()];
    k.read_write = read_write.iter().map(|s| s.to_string()).collect();
    k
}

const SRC: &str = r#"
struct Params {
    scale: u32,
    pad0: u32,
    pad1: u32,
    pad2: u32,
}

fn twice(x: u32) -> u32 {
    x * 2
}

fn unused() -> u32 {
    7
}

fn compute(i: u32) {
    let p = get_params(0);
    Data.atomic_add(twice(p.scale), i);
}
"#;

/// Graph, resolve and emit `compute` from `SRC`.
fn emit_compute(systems: &mut Systems, read_write: &[&str]) -> KernelShader {
    let file = syn::parse_file(SRC).unwrap();
    let mut index = ItemIndex::new();
    index.add_file(&file);
    let config = Config::default();
    let spans = vec![SpanMap::identity(0, SRC)];
    systems
        .get_mut(DEFAULT_SYSTEM)
        .unwrap()
        .kernels
        .insert("compute".to_string(), kernel(read_write));

    let graph = {
        let env = Env::graph(&index, systems, &config, &spans[0]);
        let funcs = fn_items(&file)
            .iter()
            .map(|item| graph_function(&env, item, 0).unwrap())
            .collect::<Vec<_>>();
        CallGraph::from_functions(funcs)
    };
    let mut diags = Vec::new();
    let summary = reach::resolve_all(systems, &graph, &config, &mut diags);
    assert_eq!(summary.resolved, 1);
    let systems: &Systems = systems;

    let items = {
        let env = Env::graph(&index, systems, &config, &spans[0]);
        crate::translate::items::render_items(&file, &env).0
    };
    let shared = Shared {
        index: &index,
        systems,
        graph: &graph,
        config: &config,
        items: &items,
        spans: &spans,
    };
    let system = systems.get(DEFAULT_SYSTEM).unwrap();
    let k = system.kernels.get("compute").unwrap();
    emit_kernel(&shared, &[Some(file)], system, k).unwrap()
}

#[test]
fn test_kernel_file_layout() {
    let mut systems = systems(None);
    let shader = emit_compute(&mut systems, &[]);
    let text = &shader.text;
    assert!(text.starts_with(GENERATED));
    assert!(text.contains("@group(0) @binding(0) var<storage, read> TensorStrides: array<u32>;"));
    assert!(text.contains("// Global parameters."));
    assert!(text.contains("@group(0) @binding(1) var<uniform> PARAMS: array<Params, 1>;"));
    assert!(text.contains("// Per-item counters."));
    assert!(text.contains("@group(1) @binding(0) var<storage, read_write> Data: array<atomic<u32>>;"));
    assert!(text.contains("@compute @workgroup_size(64, 1, 1)"));
    assert!(text.contains("\tcompute(idx);"));
    assert!(text.contains("fn Index1D(s0: u32, i0: u32) -> u32 {"));
    assert!(text.contains("struct Params {"));
    assert!(text.contains("fn twice(x: u32) -> u32 {"));
    assert!(text.contains("atomicAdd(&Data[Index1D(TensorStrides[0], i)], twice(p.scale));"));
    assert!(!text.contains("fn unused"));
    assert!(!text.contains("// runtime:"));
    assert_eq!(text.matches("fn twice").count(), 1);
    assert_eq!(shader.relative_path(), PathBuf::from("compute.wgsl"));
    crate::validate::check(text).unwrap();
}

#[test]
fn test_split_tensor_helpers_cover_every_buffer() {
    let mut systems = systems(Some(3));
    let shader = emit_compute(&mut systems, &["Data"]);
    let text = &shader.text;
    for k in 0..3 {
        assert!(text.contains(&format!(
            "@group(1) @binding({k}) var<storage, read_write> Data{k}: array<atomic<u32>>;"
        )));
    }
    assert!(text.contains("fn Data_atomicAdd(ix: u32, v: u32) -> u32 {"));
    assert!(text.contains("\t\tcase 1u: { r = atomicAdd(&Data1[o], v); }"));
    assert!(text.contains("\t\tdefault: { r = atomicAdd(&Data2[o], v); }"));
    assert!(text.contains("Data_atomicAdd(Index1D(TensorStrides[0], i), twice(p.scale));"));
    crate::validate::check(text).unwrap();
}

#[test]
fn test_split_atomic_load_and_store_helpers() {
    let systems = systems(Some(3));
    let system = systems.get(DEFAULT_SYSTEM).unwrap();
    let mut usage = Usage::default();
    for builtin in ["atomicLoad", "atomicStore"] {
        usage
            .split_atomics
            .insert(("Data".to_string(), builtin.to_string()));
    }
    let text = helpers::helpers(system, &usage);
    assert!(text.contains("fn Data_atomicLoad(ix: u32) -> u32 {"));
    assert!(text.contains("\t\tcase 0u: { r = atomicLoad(&Data0[o]); }"));
    assert!(text.contains("fn Data_atomicStore(ix: u32, v: u32) {"));
    assert!(text.contains("\t\tdefault: { atomicStore(&Data2[o], v); }"));
    assert_eq!(text.matches("let b = min(ix / ").count(), 2);
    assert!(!text.contains("fn Data_get"));
}

#[test]
fn test_index_fn() {
    insta::assert_snapshot!(helpers::index_fn(2), @r"
    fn Index2D(s0: u32, s1: u32, i0: u32, i1: u32) -> u32 {
    	return s0 * i0 + s1 * i1;
    }
    ");
}

#[test]
fn test_read_only_kernel_binds_read() {
    let systems = systems(None);
    let system = systems.get(DEFAULT_SYSTEM).unwrap();
    let text = header::bindings(system, &kernel(&[]));
    assert!(text.contains("var<storage, read> Data: array<u32>;"));
    let text = header::bindings(system, &kernel(&["Data"]));
    assert!(text.contains("var<storage, read_write> Data: array<u32>;"));
}

#[test]
fn test_signed_index_is_converted() {
    let mut k = kernel(&[]);
    k.args = "i: i32".to_string();
    assert!(header::entry_point(&k, 128).contains("\tcompute(i32(idx));"));
    assert!(header::entry_point(&k, 128).contains("* 128u;"));
}

#[test]
fn test_named_system_path() {
    let shader = KernelShader {
        system: "Physics".to_string(),
        kernel: "step".to_string(),
        text: String::new(),
        diagnostics: Vec::new(),
    };
    assert_eq!(shader.relative_path(), PathBuf::from("Physics").join("step.wgsl"));
}

#[test]
fn test_write_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let shader = KernelShader {
        system: "Physics".to_string(),
        kernel: "step".to_string(),
        text: "fn f() {}\n".to_string(),
        diagnostics: Vec::new(),
    };
    let written = write_shaders(dir.path(), &[shader]).unwrap();
    assert_eq!(written, vec![dir.path().join("Physics").join("step.wgsl")]);
    assert_eq!(std::fs::read_to_string(&written[0]).unwrap(), "fn f() {}\n");
    assert!(!dir.path().join("Physics").join("step.wgsl.tmp").exists());

    let manifest = crate::layout::Manifest::from_systems(&systems(None));
    let path = write_manifest(dir.path(), &manifest).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["systems"][0]["groups"][1]["vars"][0]["name"], "Data");

    let imports = dir.path().join("imports");
    write_imports(&imports, &[("sim.rs".to_string(), "fn a() {}\n".to_string())]).unwrap();
    let text = std::fs::read_to_string(imports.join("sim.rs")).unwrap();
    assert!(text.starts_with(GENERATED));
    assert!(text.ends_with("fn a() {}\n"));
}
