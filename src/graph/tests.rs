use super::reach::{resolve, resolve_all};
use super::*;
use crate::config::Config;
use crate::system::{ElemKind, Group, Kernel, System, Systems, Var, VarType, DEFAULT_SYSTEM};

fn func(name: &str, calls: &[&str], vars: &[&str], atomics: &[&str]) -> Function {
    let mut f = Function::new(name, 0);
    f.calls = calls.iter().map(|s| s.to_string()).collect();
    f.vars = vars.iter().map(|s| s.to_string()).collect();
    f.atomics = atomics.iter().map(|s| s.to_string()).collect();
    f
}

fn system_with(vars: &[&str]) -> System {
    let mut system = System::new(DEFAULT_SYSTEM);
    let mut group = Group::new("Data", false);
    for name in vars {
        group.vars.push(Var::new(name, VarType::Tensor(ElemKind::F32)));
    }
    system.groups.push(group);
    crate::layout::allocate(&mut system, &Config::default());
    system
}

#[test]
fn test_reachable_includes_root_and_transitive_calls() {
    let graph = CallGraph::from_functions(vec![
        func("kernel", &["a", "sqrt"], &[], &[]),
        func("a", &["b"], &[], &[]),
        func("b", &[], &[], &[]),
        func("unused", &["a"], &[], &[]),
    ]);
    let names: Vec<String> = graph.reachable("kernel").into_iter().collect();
    assert_eq!(names, vec!["a", "b", "kernel"]);
    assert!(graph.reachable("missing").is_empty());
}

#[test]
fn test_cycles_terminate_and_are_reported() {
    let graph = CallGraph::from_functions(vec![
        func("kernel", &["ping"], &[], &[]),
        func("ping", &["pong"], &[], &[]),
        func("pong", &["ping"], &[], &[]),
        func("selfish", &["selfish"], &[], &[]),
    ]);
    assert_eq!(graph.reachable("kernel").len(), 3);
    assert_eq!(
        graph.cycles(),
        vec![
            vec!["ping".to_string(), "pong".to_string()],
            vec!["selfish".to_string()]
        ]
    );
}

#[test]
fn test_first_definition_wins() {
    let mut graph = CallGraph::new();
    assert!(graph.insert(func("a", &[], &["X"], &[])).is_ok());
    let rejected = graph.insert(func("a", &[], &["Y"], &[])).unwrap_err();
    assert!(rejected.vars.contains("Y"));
    assert!(graph.get("a").unwrap().vars.contains("X"));
    assert_eq!(graph.len(), 1);
}

#[test]
fn test_closure_monotonicity() {
    let graph = CallGraph::from_functions(vec![
        func("small", &["shared"], &["A"], &[]),
        func("big", &["small", "extra"], &[], &[]),
        func("shared", &[], &["B"], &["B"]),
        func("extra", &[], &["C"], &[]),
    ]);
    let system = system_with(&["A", "B", "C"]);
    let a = resolve(&Kernel::new("small", DEFAULT_SYSTEM), &system, &graph).unwrap();
    let b = resolve(&Kernel::new("big", DEFAULT_SYSTEM), &system, &graph).unwrap();
    assert!(a.funcs.is_subset(&b.funcs));
    assert!(a.vars.is_subset(&b.vars));
    assert!(a.atomics.is_subset(&b.atomics));
    assert_eq!(a.atomics.len(), 1);
    assert!(b.vars.contains("C"));
}

#[test]
fn test_buffer_count_single_tensor() {
    let graph = CallGraph::from_functions(vec![func("compute", &[], &["Data"], &[])]);
    let system = system_with(&["Data"]);
    let reach = resolve(&Kernel::new("compute", DEFAULT_SYSTEM), &system, &graph).unwrap();
    assert_eq!(reach.n_buffers, 2);
}

#[test]
fn test_split_var_counts_all_buffers() {
    let graph = CallGraph::from_functions(vec![func("compute", &[], &["Big"], &[])]);
    let mut system = System::new(DEFAULT_SYSTEM);
    let mut group = Group::new("Data", false);
    let mut big = Var::new("Big", VarType::Tensor(ElemKind::U32));
    big.nbuffs_hint = Some(3);
    group.vars.push(big);
    system.groups.push(group);
    crate::layout::allocate(&mut system, &Config::default());
    let reach = resolve(&Kernel::new("compute", DEFAULT_SYSTEM), &system, &graph).unwrap();
    assert_eq!(reach.n_buffers, 4);
}

#[test]
fn test_var_from_other_system_is_error() {
    let graph = CallGraph::from_functions(vec![func("compute", &[], &["Elsewhere"], &[])]);
    let system = system_with(&["Data"]);
    let err = resolve(&Kernel::new("compute", DEFAULT_SYSTEM), &system, &graph).unwrap_err();
    assert!(err.is_error());
    assert!(err.message.contains("Elsewhere"));
}

#[test]
fn test_resolve_all_reports_limits() {
    let names: Vec<String> = (0..8).map(|i| format!("V{}", i)).collect();
    let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    let graph = CallGraph::from_functions(vec![
        func("wide", &[], &refs, &[]),
        func("narrow", &[], &["V0"], &[]),
    ]);
    let mut systems = Systems::new();
    {
        let system = systems.get_or_insert(DEFAULT_SYSTEM);
        *system = system_with(&refs);
        system
            .kernels
            .insert("wide".to_string(), Kernel::new("wide", DEFAULT_SYSTEM));
        system
            .kernels
            .insert("narrow".to_string(), Kernel::new("narrow", DEFAULT_SYSTEM));
        system
            .kernels
            .insert("ghost".to_string(), Kernel::new("ghost", DEFAULT_SYSTEM));
    }
    let mut diags = Vec::new();
    let summary = resolve_all(&mut systems, &graph, &Config::default(), &mut diags);
    assert_eq!(summary.resolved, 2);
    assert_eq!(summary.max_buffers, 9);
    assert_eq!(summary.over_limit, 1);
    assert_eq!(diags.iter().filter(|d| d.is_error()).count(), 1);
    let system = systems.get(DEFAULT_SYSTEM).unwrap();
    assert!(system.kernels["narrow"].resolved);
    assert!(!system.kernels["ghost"].resolved);
}
