//! Variable layout: assign `@group`/`@binding` coordinates to every Var.
//!
//! Groups are numbered in declaration order. Bindings count from 0,
//! except in the first Group of a System where slot 0 holds the implicit
//! `TensorStrides` table. A split tensor takes `n_buffs` consecutive
//! bindings. Allocation is a pure function of declaration order, so
//! running it again yields the same assignment.


use std::fmt::Write as _;

use serde::Serialize;

use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::system::{System, Systems, Var, VarType};

/// Most dimensions a tensor may have; also the stride-table row width.
pub const MAX_TENSOR_DIMS: usize = 8;

/// Name of the implicit stride table at group 0, binding 0.
pub const STRIDES_VAR: &str = "TensorStrides";

/// Assign group numbers, bindings, tensor indexes, buffer splits and
/// accessors for one System.
pub fn allocate(system: &mut System, config: &Config) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    system.accessors.clear();
    let mut tensor_index = 0;

    for (gi, group) in system.groups.iter_mut().enumerate() {
        group.number = gi as u32;
        let mut binding: u32 = if gi == 0 { 1 } else { 0 };
        for var in group.vars.iter_mut() {
            var.group = group.number;
            var.binding = binding;
            var.n_buffs = n_buffs(var, config.max_buffer_size);
            var.per_buffer = per_buffer(var, config.max_buffer_size);
            binding += var.n_buffs as u32;

            if var.is_tensor() {
                var.tensor_index = Some(tensor_index);
                var.accessor = None;
                tensor_index += 1;
            } else {
                let accessor = Var::accessor_name(&var.name);
                system.accessors.insert(accessor.clone(), var.name.clone());
                var.tensor_index = None;
                var.accessor = Some(accessor);
            }

            if var.n_buffs + 1 > config.max_storage_buffers {
                diags.push(Diagnostic::warning(
                    format!(
                        "`{}` is split into {} buffers; a kernel touching it exceeds the limit of {}",
                        var.name, var.n_buffs, config.max_storage_buffers
                    ),
                    var.span,
                ));
            }
        }
    }
    tracing::debug!(
        system = %system.name,
        groups = system.groups.len(),
        tensors = tensor_index,
        "layout allocated"
    );
    diags
}

/// Allocate every System.
pub fn allocate_all(systems: &mut Systems, config: &Config) -> Vec<Diagnostic> {
    systems
        .iter_mut()
        .flat_map(|s| allocate(s, config))
        .collect()
}

fn elem_bytes(var: &Var) -> u64 {
    match &var.ty {
        VarType::Tensor(kind) => kind.bytes(),
        VarType::Array(_) => 4,
    }
}

/// Whole elements of `var` one physical buffer holds.
pub fn per_buffer(var: &Var, max_buffer_size: u64) -> u64 {
    (max_buffer_size / elem_bytes(var)).max(1)
}

/// Number of physical buffers for a Var: an explicit `nbuffs` wins, then
/// the declared size against the per-buffer element count, else one.
/// Counting in whole elements keeps `capacity >= size` when the buffer
/// ceiling is not a multiple of the element size.
pub fn n_buffs(var: &Var, max_buffer_size: u64) -> usize {
    if !var.is_tensor() {
        return 1;
    }
    if let Some(n) = var.nbuffs_hint {
        return n.max(1);
    }
    match var.size {
        Some(size) => size.div_ceil(per_buffer(var, max_buffer_size)).max(1) as usize,
        None => 1,
    }
}

/// Sub-addressing of a tensor split across several buffers; shared by
/// the emitted WGSL helpers and host code filling the buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SplitLayout {
    pub n_buffs: usize,
    pub per_buffer: u64,
}

impl SplitLayout {
    pub fn of(var: &Var) -> Self {
        Self {
            n_buffs: var.n_buffs.max(1),
            per_buffer: var.per_buffer.max(1),
        }
    }

    /// Total logical elements addressable.
    pub fn capacity(&self) -> u64 {
        self.per_buffer * self.n_buffs as u64
    }

    /// Physical `(buffer, offset)` of logical index `ix`.
    pub fn locate(&self, ix: u64) -> Option<(usize, u64)> {
        if ix >= self.capacity() {
            return None;
        }
        let buffer = ((ix / self.per_buffer) as usize).min(self.n_buffs - 1);
        Some((buffer, ix - buffer as u64 * self.per_buffer))
    }
}

// --- Manifest ---

/// Machine-readable binding layout, written as `layout.json`.
#[derive(Clone, Debug, Serialize)]
pub struct Manifest {
    pub systems: Vec<SystemLayout>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SystemLayout {
    pub name: String,
    pub strides: String,
    pub max_tensor_dims: usize,
    pub kernels: Vec<String>,
    pub groups: Vec<GroupLayout>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GroupLayout {
    pub name: String,
    pub number: u32,
    pub uniform: bool,
    pub vars: Vec<VarLayout>,
}

#[derive(Clone, Debug, Serialize)]
pub struct VarLayout {
    pub name: String,
    pub kind: &'static str,
    pub elem: String,
    pub dims: usize,
    pub bindings: Vec<u32>,
    pub split: Option<SplitLayout>,
    pub tensor_index: Option<usize>,
    pub accessor: Option<String>,
    pub read_only: bool,
    pub read_or_write: bool,
}

impl Manifest {
    pub fn from_systems(systems: &Systems) -> Self {
        let systems = systems
            .iter()
            .filter(|s| !s.groups.is_empty() || !s.kernels.is_empty())
            .map(|s| SystemLayout {
                name: s.name.clone(),
                strides: STRIDES_VAR.to_string(),
                max_tensor_dims: MAX_TENSOR_DIMS,
                kernels: s.kernels.keys().cloned().collect(),
                groups: s
                    .groups
                    .iter()
                    .map(|g| GroupLayout {
                        name: g.name.clone(),
                        number: g.number,
                        uniform: g.uniform,
                        vars: g.vars.iter().map(var_layout).collect(),
                    })
                    .collect(),
            })
            .collect();
        Self { systems }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn var_layout(var: &Var) -> VarLayout {
    VarLayout {
        name: var.name.clone(),
        kind: if var.is_tensor() { "tensor" } else { "array" },
        elem: var.elem_wgsl().to_string(),
        dims: var.dims,
        bindings: (0..var.buffer_count() as u32)
            .map(|k| var.binding + k)
            .collect(),
        split: var.is_split().then(|| SplitLayout::of(var)),
        tensor_index: var.tensor_index,
        accessor: var.accessor.clone(),
        read_only: var.read_only,
        read_or_write: var.read_or_write,
    }
}

/// Human-readable binding table, one line per buffer.
pub fn table(systems: &Systems) -> String {
    let mut out = String::new();
    for system in systems.iter() {
        if system.groups.is_empty() {
            continue;
        }
        let _ = writeln!(out, "System {}", system.name);
        let _ = writeln!(out, "  @group(0) @binding(0)  {}", STRIDES_VAR);
        for group in &system.groups {
            let qualifier = if group.uniform { "uniform" } else { "storage" };
            let _ = writeln!(out, "  group {} ({}, {})", group.number, group.name, qualifier);
            for var in &group.vars {
                for k in 0..var.buffer_count() {
                    let _ = writeln!(
                        out,
                        "    @group({}) @binding({})  {}: {}",
                        var.group,
                        var.binding + k as u32,
                        var.buffer_name(k),
                        var.elem_wgsl()
                    );
                }
            }
        }
    }
    out
}
