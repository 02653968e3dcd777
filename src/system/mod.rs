//! Systems, Groups, Vars and Kernels: the shared data model of a run.
//!
//! A [`System`] is an isolated binding namespace. Its [`Group`]s are
//! declared in `//gpu:vars` regions; its [`Kernel`]s are declared by
//! `//gpu:kernel` markers. Binding coordinates are filled in by
//! [`crate::layout`], reachability by [`crate::graph::reach`].

pub mod vars;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::span::Span;

/// Name of the System every kernel and var belongs to unless told otherwise.
pub const DEFAULT_SYSTEM: &str = "Default";

/// Element kind of a tensor variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ElemKind {
    F32,
    I32,
    U32,
}

impl ElemKind {
    pub fn from_rust(name: &str) -> Option<Self> {
        match name {
            "f32" => Some(ElemKind::F32),
            "i32" => Some(ElemKind::I32),
            "u32" => Some(ElemKind::U32),
            _ => None,
        }
    }

    pub fn wgsl(self) -> &'static str {
        match self {
            ElemKind::F32 => "f32",
            ElemKind::I32 => "i32",
            ElemKind::U32 => "u32",
        }
    }

    pub fn bytes(self) -> u64 {
        4
    }
}

/// What a global variable holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum VarType {
    /// A strided n-dimensional tensor, accessed through `TensorStrides`.
    Tensor(ElemKind),
    /// A flat array of WGSL-typed elements, accessed with `get_<name>(i)`.
    Array(String),
}

/// A global state variable.
#[derive(Clone, Debug, Serialize)]
pub struct Var {
    pub name: String,
    pub doc: String,
    pub ty: VarType,
    /// Never writable, in any kernel.
    pub read_only: bool,
    /// Writable in every kernel; otherwise only in kernels listing it.
    pub read_or_write: bool,
    pub dims: usize,
    /// Number of physical buffers the var is split across.
    pub n_buffs: usize,
    /// Declared maximum element count, used to derive `n_buffs`.
    pub size: Option<u64>,
    /// Explicit `//gpu:nbuffs`, if any.
    pub nbuffs_hint: Option<usize>,
    /// Elements per physical buffer when split.
    pub per_buffer: u64,
    pub tensor_index: Option<usize>,
    pub group: u32,
    pub binding: u32,
    /// `get_<name>` for array vars.
    pub accessor: Option<String>,
    #[serde(skip)]
    pub span: Span,
}

impl Var {
    pub fn new(name: &str, ty: VarType) -> Self {
        Self {
            name: name.to_string(),
            doc: String::new(),
            ty,
            read_only: false,
            read_or_write: false,
            dims: 1,
            n_buffs: 1,
            size: None,
            nbuffs_hint: None,
            per_buffer: 0,
            tensor_index: None,
            group: 0,
            binding: 0,
            accessor: None,
            span: Span::default(),
        }
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self.ty, VarType::Tensor(_))
    }

    pub fn is_split(&self) -> bool {
        self.is_tensor() && self.n_buffs > 1
    }

    /// WGSL element type of the backing array.
    pub fn elem_wgsl(&self) -> &str {
        match &self.ty {
            VarType::Tensor(kind) => kind.wgsl(),
            VarType::Array(ty) => ty,
        }
    }

    /// Buffers this var consumes in a kernel that touches it.
    pub fn buffer_count(&self) -> usize {
        if self.n_buffs <= 1 {
            1
        } else {
            self.n_buffs
        }
    }

    /// Name of the `k`-th physical buffer.
    pub fn buffer_name(&self, k: usize) -> String {
        if self.is_split() {
            format!("{}{}", self.name, k)
        } else {
            self.name.clone()
        }
    }

    /// Accessor function name for an array var.
    pub fn accessor_name(name: &str) -> String {
        format!("get_{}", name.to_lowercase())
    }
}

/// Vars sharing one `@group` number.
#[derive(Clone, Debug, Serialize)]
pub struct Group {
    pub name: String,
    pub doc: String,
    pub uniform: bool,
    pub number: u32,
    pub vars: Vec<Var>,
}

impl Group {
    pub fn new(name: &str, uniform: bool) -> Self {
        Self {
            name: name.to_string(),
            doc: String::new(),
            uniform,
            number: 0,
            vars: Vec::new(),
        }
    }
}

/// A compute entry point.
#[derive(Clone, Debug, Default)]
pub struct Kernel {
    pub name: String,
    /// Raw parameter text, e.g. `i: u32`.
    pub args: String,
    /// Argument names, in order.
    pub call_args: Vec<String>,
    /// Vars this kernel writes.
    pub read_write: BTreeSet<String>,
    pub system: String,
    pub span: Span,
    /// Reachable functions, filled in by reachability resolution.
    pub funcs: BTreeSet<String>,
    pub atomics: BTreeSet<String>,
    pub vars: BTreeSet<String>,
    pub n_buffers: usize,
    pub resolved: bool,
}

impl Kernel {
    pub fn new(name: &str, system: &str) -> Self {
        Self {
            name: name.to_string(),
            system: system.to_string(),
            ..Default::default()
        }
    }

    /// Whether `var` is bound read-write in this kernel.
    pub fn is_read_write(&self, var: &Var) -> bool {
        if var.read_only {
            return false;
        }
        var.read_or_write || self.read_write.contains(&var.name)
    }

    /// Type of the single index parameter, `u32` when unspecified.
    pub fn index_type(&self) -> &str {
        self.args
            .split_once(':')
            .map(|(_, ty)| ty.trim())
            .filter(|ty| !ty.is_empty())
            .unwrap_or("u32")
    }
}

/// Kernels sharing one variable layout.
#[derive(Clone, Debug)]
pub struct System {
    pub name: String,
    pub groups: Vec<Group>,
    pub kernels: BTreeMap<String, Kernel>,
    /// Accessor name (`get_params`) to var name (`PARAMS`).
    pub accessors: BTreeMap<String, String>,
}

impl System {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            groups: Vec::new(),
            kernels: BTreeMap::new(),
            accessors: BTreeMap::new(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_SYSTEM
    }

    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        self.groups.iter().flat_map(|g| g.vars.iter())
    }

    pub fn var(&self, name: &str) -> Option<&Var> {
        self.vars().find(|v| v.name == name)
    }

    pub fn var_for_accessor(&self, accessor: &str) -> Option<&Var> {
        self.accessors.get(accessor).and_then(|name| self.var(name))
    }

    pub fn tensors(&self) -> impl Iterator<Item = &Var> {
        self.vars().filter(|v| v.is_tensor())
    }

    /// Whether `var` lives in a uniform Group.
    pub fn is_uniform(&self, var: &Var) -> bool {
        self.groups
            .get(var.group as usize)
            .is_some_and(|g| g.uniform)
    }

    /// Whether `kernel` binds `var` read-write: declared so (or by the
    /// var itself), or mutated atomically. Uniform vars never are.
    pub fn writable(&self, kernel: &Kernel, var: &Var) -> bool {
        !self.is_uniform(var) && (kernel.is_read_write(var) || kernel.atomics.contains(&var.name))
    }
}

/// All Systems of a run, in first-seen order; the default System is first.
#[derive(Clone, Debug)]
pub struct Systems {
    list: Vec<System>,
}

impl Default for Systems {
    fn default() -> Self {
        Self {
            list: vec![System::new(DEFAULT_SYSTEM)],
        }
    }
}

impl Systems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &System> {
        self.list.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut System> {
        self.list.iter_mut()
    }

    pub fn get(&self, name: &str) -> Option<&System> {
        self.list.iter().find(|s| s.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut System> {
        self.list.iter_mut().find(|s| s.name == name)
    }

    pub fn get_or_insert(&mut self, name: &str) -> &mut System {
        let pos = match self.list.iter().position(|s| s.name == name) {
            Some(pos) => pos,
            None => {
                self.list.push(System::new(name));
                self.list.len() - 1
            }
        };
        &mut self.list[pos]
    }

    /// Look a var up in any System.
    pub fn find_var(&self, name: &str) -> Option<(&System, &Var)> {
        self.list
            .iter()
            .find_map(|s| s.var(name).map(|v| (s, v)))
    }

    /// Look an accessor up in any System.
    pub fn find_accessor(&self, accessor: &str) -> Option<(&System, &Var)> {
        self.list
            .iter()
            .find_map(|s| s.var_for_accessor(accessor).map(|v| (s, v)))
    }

    pub fn kernels(&self) -> impl Iterator<Item = &Kernel> {
        self.list.iter().flat_map(|s| s.kernels.values())
    }

    pub fn kernel_count(&self) -> usize {
        self.list.iter().map(|s| s.kernels.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(name: &str) -> Var {
        Var::new(name, VarType::Tensor(ElemKind::F32))
    }

    #[test]
    fn test_default_system_exists() {
        let systems = Systems::new();
        assert!(systems.get(DEFAULT_SYSTEM).is_some());
        assert!(systems.iter().next().unwrap().is_default());
    }

    #[test]
    fn test_get_or_insert_keeps_order() {
        let mut systems = Systems::new();
        systems.get_or_insert("Physics");
        systems.get_or_insert(DEFAULT_SYSTEM);
        systems.get_or_insert("Physics");
        let names: Vec<&str> = systems.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![DEFAULT_SYSTEM, "Physics"]);
    }

    #[test]
    fn test_kernel_read_write_resolution() {
        let mut k = Kernel::new("compute", DEFAULT_SYSTEM);
        k.read_write.insert("DATA".to_string());
        let data = tensor("DATA");
        let other = tensor("OTHER");
        let mut shared = tensor("SHARED");
        shared.read_or_write = true;
        let mut fixed = tensor("DATA");
        fixed.read_only = true;

        assert!(k.is_read_write(&data));
        assert!(!k.is_read_write(&other));
        assert!(k.is_read_write(&shared));
        assert!(!k.is_read_write(&fixed));
    }

    #[test]
    fn test_buffer_names() {
        let mut v = tensor("DATA");
        assert_eq!(v.buffer_name(0), "DATA");
        assert_eq!(v.buffer_count(), 1);
        v.n_buffs = 3;
        assert_eq!(v.buffer_name(2), "DATA2");
        assert_eq!(v.buffer_count(), 3);
        assert_eq!(Var::accessor_name("PARAMS"), "get_params");
    }

    #[test]
    fn test_index_type() {
        let mut k = Kernel::new("k", DEFAULT_SYSTEM);
        assert_eq!(k.index_type(), "u32");
        k.args = "i: i32".to_string();
        assert_eq!(k.index_type(), "i32");
    }
}
