//! Call graph of every translatable function, keyed by name.
//!
//! Nodes carry the per-function facts the graph pass of the translator
//! records: direct callees, vars touched and vars mutated atomically.
//! Methods are keyed `Type_method`. Calls to names with no node (WGSL
//! built-ins, runtime helpers) have no edge.

pub mod reach;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use crate::span::Span;

/// One call-graph node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub calls: BTreeSet<String>,
    /// Vars mutated through atomic operations.
    pub atomics: BTreeSet<String>,
    /// Vars accessed at all, atomics included.
    pub vars: BTreeSet<String>,
    /// Index of the defining file in the run.
    pub file: usize,
    pub span: Span,
}

impl Function {
    pub fn new(name: &str, file: usize) -> Self {
        Self {
            name: name.to_string(),
            file,
            ..Default::default()
        }
    }
}

/// Registry of [`Function`]s with call edges.
#[derive(Clone, Debug, Default)]
pub struct CallGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
    funcs: BTreeMap<String, Function>,
    /// Function names in registration order.
    order: Vec<String>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a set of functions; later duplicates are ignored.
    pub fn from_functions(functions: impl IntoIterator<Item = Function>) -> Self {
        let mut graph = Self::new();
        for f in functions {
            if let Err(dup) = graph.insert(f) {
                tracing::debug!(function = %dup.name, "duplicate function ignored");
            }
        }
        graph.link();
        graph
    }

    /// Register a function. Returns the rejected function when the name
    /// is already taken; the first definition wins.
    pub fn insert(&mut self, f: Function) -> Result<(), Function> {
        if self.funcs.contains_key(&f.name) {
            return Err(f);
        }
        let ix = self.graph.add_node(f.name.clone());
        self.nodes.insert(f.name.clone(), ix);
        self.order.push(f.name.clone());
        self.funcs.insert(f.name.clone(), f);
        Ok(())
    }

    /// Add an edge for every call between registered functions. Safe to
    /// call again after more inserts.
    pub fn link(&mut self) {
        self.graph.clear_edges();
        for f in self.funcs.values() {
            let Some(&from) = self.nodes.get(&f.name) else {
                continue;
            };
            for callee in &f.calls {
                if let Some(&to) = self.nodes.get(callee) {
                    self.graph.update_edge(from, to, ());
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.funcs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Registration order of a function, for stable emission.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    /// Names reachable from `root`, `root` included. A visited set makes
    /// recursive cycles terminate.
    pub fn reachable(&self, root: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let Some(&start) = self.nodes.get(root) else {
            return out;
        };
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(ix) = dfs.next(&self.graph) {
            out.insert(self.graph[ix].clone());
        }
        out
    }

    /// Recursion cycles: strongly connected components with more than
    /// one function, or a function calling itself.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.iter().any(|&n| self.graph.contains_edge(n, n))
            })
            .map(|scc| {
                let mut names: Vec<String> =
                    scc.into_iter().map(|n| self.graph[n].clone()).collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        cycles
    }
}
