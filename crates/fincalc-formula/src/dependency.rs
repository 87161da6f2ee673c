//! Dependency tracking for formula calculation
//!
//! [`extract_dependencies`] turns a parsed formula into the set of cells it
//! reads. [`DependencyGraph`] stores those edges for a whole snapshot and
//! answers the two questions recalculation needs: is there a cycle, and in
//! what order must dependents be recomputed.

use crate::ast::{FormulaExpr, Reference};
use crate::error::{FormulaError, FormulaResult};
use crate::options::FormulaOptions;
use ahash::{AHashMap, AHashSet};
use fincalc_core::CellReference;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

/// Every cell a formula reads, with ranges expanded
///
/// Each range is checked against `max_range_cells` before it is expanded.
pub fn extract_dependencies(
    expr: &FormulaExpr,
    options: &FormulaOptions,
) -> FormulaResult<BTreeSet<CellReference>> {
    let mut cells = BTreeSet::new();
    for reference in expr.references() {
        match reference {
            Reference::Cell(cell) => {
                cells.insert(*cell);
            }
            Reference::Range(range) => {
                options.check_range(range)?;
                cells.extend(range.cells());
            }
        }
    }
    Ok(cells)
}

/// Reference text tokens in first-appearance order, without duplicates
///
/// Ranges stay a single normalized token such as `B1:B5`.
pub fn reference_tokens(expr: &FormulaExpr) -> Vec<String> {
    let mut seen = AHashSet::new();
    expr.references()
        .iter()
        .map(Reference::to_a1_string)
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

/// Index of a cell in a [`DependencyGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which edges a traversal follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From a cell to the cells its formula reads
    Precedents,
    /// From a cell to the cells whose formulas read it
    Dependents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Dependency graph for formula cells
///
/// Nodes live in an arena and edges are node indices, so cycles are plain
/// data. An edge runs from a referenced cell to the cell whose formula
/// references it.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    nodes: Vec<CellReference>,
    index: AHashMap<CellReference, NodeId>,
    /// Cell → cells that depend on it
    dependents: Vec<Vec<NodeId>>,
    /// Cell → cells it depends on
    precedents: Vec<Vec<NodeId>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no cells
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node for a cell, if present
    pub fn node_id(&self, cell: &CellReference) -> Option<NodeId> {
        self.index.get(cell).copied()
    }

    /// Cell stored at a node
    pub fn cell(&self, id: NodeId) -> CellReference {
        self.nodes[id.index()]
    }

    /// Node for a cell, inserting it if needed
    pub fn add_cell(&mut self, cell: CellReference) -> NodeId {
        if let Some(id) = self.index.get(&cell) {
            return *id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(cell);
        self.dependents.push(Vec::new());
        self.precedents.push(Vec::new());
        self.index.insert(cell, id);
        id
    }

    /// Record that `dependent`'s formula reads each of `precedents`
    ///
    /// Edges are not deduplicated; pass each formula's dependency set once.
    pub fn add_formula<I>(&mut self, dependent: CellReference, precedents: I)
    where
        I: IntoIterator<Item = CellReference>,
    {
        let to = self.add_cell(dependent);
        for precedent in precedents {
            let from = self.add_cell(precedent);
            self.dependents[from.index()].push(to);
            self.precedents[to.index()].push(from);
        }
    }

    /// Add a single dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: CellReference, dependent: CellReference) {
        self.add_formula(dependent, [precedent]);
    }

    fn edges(&self, id: NodeId, direction: Direction) -> &[NodeId] {
        match direction {
            Direction::Precedents => &self.precedents[id.index()],
            Direction::Dependents => &self.dependents[id.index()],
        }
    }

    /// Get cells that depend on the given cell
    pub fn dependents(&self, cell: &CellReference) -> impl Iterator<Item = CellReference> + '_ {
        self.neighbours(cell, Direction::Dependents)
    }

    /// Get cells that the given cell depends on
    pub fn precedents(&self, cell: &CellReference) -> impl Iterator<Item = CellReference> + '_ {
        self.neighbours(cell, Direction::Precedents)
    }

    fn neighbours(
        &self,
        cell: &CellReference,
        direction: Direction,
    ) -> impl Iterator<Item = CellReference> + '_ {
        self.node_id(cell)
            .into_iter()
            .flat_map(move |id| self.edges(id, direction).iter().map(|n| self.cell(*n)))
    }

    /// Find a cycle reachable from `start` following `direction`
    ///
    /// Three-colour depth-first search: white is unvisited, gray is on the
    /// current path and black is finished. Reaching a gray node closes a
    /// cycle; that node is returned. A self-reference is a cycle of length
    /// one and is found the same way. The traversal keeps an explicit stack
    /// so long chains cannot exhaust the call stack.
    pub fn find_cycle(&self, start: &CellReference, direction: Direction) -> Option<CellReference> {
        let start = self.node_id(start)?;
        let mut color = vec![Color::White; self.nodes.len()];
        let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
        color[start.index()] = Color::Gray;

        while let Some(top) = stack.len().checked_sub(1) {
            let (node, next) = stack[top];
            match self.edges(node, direction).get(next) {
                Some(&child) => {
                    stack[top].1 += 1;
                    match color[child.index()] {
                        Color::White => {
                            color[child.index()] = Color::Gray;
                            stack.push((child, 0));
                        }
                        Color::Gray => return Some(self.cell(child)),
                        Color::Black => {}
                    }
                }
                None => {
                    color[node.index()] = Color::Black;
                    stack.pop();
                }
            }
        }

        None
    }

    /// Whether any cycle is reachable from `cell` following `direction`
    pub fn has_circular_reference(&self, cell: &CellReference, direction: Direction) -> bool {
        self.find_cycle(cell, direction).is_some()
    }

    /// Every cell that reads `start`, directly or transitively
    fn dependents_closure(&self, start: NodeId) -> AHashSet<NodeId> {
        let mut seen = AHashSet::new();
        let mut pending = vec![start];
        while let Some(node) = pending.pop() {
            for &dependent in &self.dependents[node.index()] {
                if dependent != start && seen.insert(dependent) {
                    pending.push(dependent);
                }
            }
        }
        seen
    }

    /// Recalculation order after `changed` changes
    ///
    /// Returns the transitive dependents of `changed` (not `changed` itself)
    /// in topological order. Among cells that are ready at the same time the
    /// smallest in row-major order goes first, so the order is reproducible.
    /// A cycle reachable from `changed` is reported as
    /// [`FormulaError::CircularDependency`] naming one of its cells.
    pub fn recalculation_order(&self, changed: &CellReference) -> FormulaResult<Vec<CellReference>> {
        let start = match self.node_id(changed) {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };

        if let Some(cell) = self.find_cycle(changed, Direction::Dependents) {
            return Err(FormulaError::CircularDependency(cell));
        }

        let closure = self.dependents_closure(start);

        // In-degree counts only precedents that are themselves recalculated
        let mut pending: AHashMap<NodeId, usize> = closure
            .iter()
            .map(|&node| {
                let inputs = self.precedents[node.index()]
                    .iter()
                    .filter(|p| closure.contains(p))
                    .count();
                (node, inputs)
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<(CellReference, NodeId)>> = pending
            .iter()
            .filter(|&(_, &inputs)| inputs == 0)
            .map(|(&node, _)| Reverse((self.cell(node), node)))
            .collect();

        let mut order = Vec::with_capacity(closure.len());
        while let Some(Reverse((cell, node))) = ready.pop() {
            order.push(cell);
            for dependent in &self.dependents[node.index()] {
                if let Some(inputs) = pending.get_mut(dependent) {
                    *inputs -= 1;
                    if *inputs == 0 {
                        ready.push(Reverse((self.cell(*dependent), *dependent)));
                    }
                }
            }
        }

        if order.len() < closure.len() {
            // Unreachable after the cycle check, kept so a bug cannot drop cells
            let stuck = pending
                .iter()
                .filter(|&(_, &inputs)| inputs > 0)
                .map(|(&node, _)| self.cell(node))
                .min();
            if let Some(cell) = stuck {
                return Err(FormulaError::CircularDependency(cell));
            }
        }

        Ok(order)
    }
}
