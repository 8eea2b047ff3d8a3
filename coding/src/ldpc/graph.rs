//! Lifted Tanner graph lookup
//!
//! Expands the base-graph shift tables into per-lifting-size graphs. The
//! full set of 102 graphs (both base graphs, all 51 lifting sizes) is built
//! once, on first use, and shared read-only by every encoder and decoder.

use super::tables::{BgEdge, BG1_EDGES, BG2_EDGES};
use super::{
    lifting_set_index, lifting_size_position, LdpcBaseGraph, LIFTING_SIZE_SET,
    MAX_CHECK_NODE_DEGREE, NOF_LIFTING_SIZES, NO_EDGE,
};
use std::sync::OnceLock;

/// Read-only quasi-cyclic parity-check graph for one (base graph, lifting
/// size) pair.
pub struct LdpcGraph {
    base_graph: LdpcBaseGraph,
    lifting_size: usize,
    lifting_set_index: u8,
    /// Shift of every (check node, variable node) pair, flattened row-major;
    /// `NO_EDGE` where the base graph has no edge. Shifts are already
    /// reduced modulo the lifting size.
    shifts: Vec<u16>,
    /// Variable nodes adjacent to each check node, sorted ascending and
    /// `NO_EDGE`-terminated.
    adjacency: Vec<[u16; MAX_CHECK_NODE_DEGREE]>,
}

impl LdpcGraph {
    fn build(base_graph: LdpcBaseGraph, lifting_size: usize) -> Self {
        let set_index = lifting_set_index(lifting_size)
            .unwrap_or_else(|| panic!("Unsupported lifting size {}", lifting_size));
        let edges: &[BgEdge] = match base_graph {
            LdpcBaseGraph::BaseGraph1 => BG1_EDGES,
            LdpcBaseGraph::BaseGraph2 => BG2_EDGES,
        };

        let nof_rows = base_graph.nof_check_nodes();
        let nof_cols = base_graph.nof_var_nodes_full();
        let mut shifts = vec![NO_EDGE; nof_rows * nof_cols];
        let mut adjacency = vec![[NO_EDGE; MAX_CHECK_NODE_DEGREE]; nof_rows];
        let mut degree = vec![0usize; nof_rows];

        for edge in edges {
            let row = edge.row as usize;
            let col = edge.col as usize;
            shifts[row * nof_cols + col] = edge.shifts[set_index as usize] % lifting_size as u16;
            adjacency[row][degree[row]] = edge.col as u16;
            degree[row] += 1;
        }

        Self {
            base_graph,
            lifting_size,
            lifting_set_index: set_index,
            shifts,
            adjacency,
        }
    }

    /// Returns the graph for the given base graph and lifting size, or
    /// `None` if the lifting size is not one of the 51 supported values.
    pub fn get(base_graph: LdpcBaseGraph, lifting_size: usize) -> Option<&'static LdpcGraph> {
        let position = lifting_size_position(lifting_size)?;
        let skip = match base_graph {
            LdpcBaseGraph::BaseGraph1 => 0,
            LdpcBaseGraph::BaseGraph2 => NOF_LIFTING_SIZES,
        };
        Some(&graph_table()[skip + position])
    }

    /// Base graph of this lifted graph.
    pub fn base_graph(&self) -> LdpcBaseGraph {
        self.base_graph
    }

    /// Lifting size of this lifted graph.
    pub fn lifting_size(&self) -> usize {
        self.lifting_size
    }

    /// Lifting set index, 0 to 7, selecting the high-rate encoding strategy.
    pub fn lifting_set_index(&self) -> u8 {
        self.lifting_set_index
    }

    /// Number of parity check nodes `M`.
    pub fn nof_check_nodes(&self) -> usize {
        self.base_graph.nof_check_nodes()
    }

    /// Number of variable nodes before shortening.
    pub fn nof_var_nodes_full(&self) -> usize {
        self.base_graph.nof_var_nodes_full()
    }

    /// Number of variable nodes after shortening.
    pub fn nof_var_nodes_short(&self) -> usize {
        self.base_graph.nof_var_nodes_short()
    }

    /// Number of systematic information nodes `K`.
    pub fn nof_info_nodes(&self) -> usize {
        self.base_graph.nof_info_nodes()
    }

    /// Quasi-cyclic shift of the edge between a check node and a variable
    /// node, or `None` when the base graph has no such edge.
    pub fn shift(&self, check_node: usize, var_node: usize) -> Option<u16> {
        let value = self.shifts[check_node * self.nof_var_nodes_full() + var_node];
        if value == NO_EDGE {
            None
        } else {
            Some(value)
        }
    }

    /// Variable-node indices adjacent to a check node, sorted ascending.
    pub fn adjacency_row(&self, check_node: usize) -> &[u16] {
        let row = &self.adjacency[check_node];
        let degree = row.iter().position(|&v| v == NO_EDGE).unwrap_or(row.len());
        &row[..degree]
    }

    /// Iterates over the `(variable node, shift)` pairs of a check node.
    pub fn edges(&self, check_node: usize) -> impl Iterator<Item = (usize, u16)> + '_ {
        let base = check_node * self.nof_var_nodes_full();
        self.adjacency_row(check_node).iter().map(move |&col| {
            let col = col as usize;
            (col, self.shifts[base + col])
        })
    }
}

static GRAPH_TABLE: OnceLock<Vec<LdpcGraph>> = OnceLock::new();

/// The global array of 102 lifted graphs, built on first access.
fn graph_table() -> &'static [LdpcGraph] {
    GRAPH_TABLE.get_or_init(|| {
        let mut graphs = Vec::with_capacity(2 * NOF_LIFTING_SIZES);
        for &lifting_size in &LIFTING_SIZE_SET {
            graphs.push(LdpcGraph::build(LdpcBaseGraph::BaseGraph1, lifting_size));
        }
        for &lifting_size in &LIFTING_SIZE_SET {
            graphs.push(LdpcGraph::build(LdpcBaseGraph::BaseGraph2, lifting_size));
        }
        graphs
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldpc::{BG1_K, BG2_K};

    #[test]
    fn test_lookup() {
        let graph = LdpcGraph::get(LdpcBaseGraph::BaseGraph1, 384).unwrap();
        assert_eq!(graph.nof_check_nodes(), 46);
        assert_eq!(graph.nof_var_nodes_full(), 68);
        assert_eq!(graph.lifting_set_index(), 1);

        let graph = LdpcGraph::get(LdpcBaseGraph::BaseGraph2, 44).unwrap();
        assert_eq!(graph.nof_check_nodes(), 42);
        assert_eq!(graph.nof_var_nodes_full(), 52);
        assert_eq!(graph.lifting_set_index(), 5);

        assert!(LdpcGraph::get(LdpcBaseGraph::BaseGraph1, 17).is_none());
    }

    #[test]
    fn test_shifts_reduced() {
        for &z in &[2usize, 6, 44, 208, 384] {
            for bg in [LdpcBaseGraph::BaseGraph1, LdpcBaseGraph::BaseGraph2] {
                let graph = LdpcGraph::get(bg, z).unwrap();
                for m in 0..graph.nof_check_nodes() {
                    for (_, shift) in graph.edges(m) {
                        assert!((shift as usize) < z);
                    }
                }
            }
        }
    }

    #[test]
    fn test_high_rate_parity_structure() {
        // BG1, any set but 6: the p0 column carries a single +1 shift on
        // rows 0 and 3.
        let graph = LdpcGraph::get(LdpcBaseGraph::BaseGraph1, 384).unwrap();
        assert_eq!(graph.shift(0, BG1_K), Some(1));
        assert_eq!(graph.shift(1, BG1_K), Some(0));
        assert_eq!(graph.shift(3, BG1_K), Some(1));
        assert_eq!(graph.shift(0, BG1_K + 1), Some(0));

        // BG1, set 6: the rotation moves to row 1 with offset 105.
        let graph = LdpcGraph::get(LdpcBaseGraph::BaseGraph1, 208).unwrap();
        assert_eq!(graph.lifting_set_index(), 6);
        assert_eq!(graph.shift(0, BG1_K), Some(0));
        assert_eq!(graph.shift(1, BG1_K), Some(105));
        assert_eq!(graph.shift(3, BG1_K), Some(0));

        // BG2, set 3: rows 0 and 3 carry the +1 shift.
        let graph = LdpcGraph::get(LdpcBaseGraph::BaseGraph2, 112).unwrap();
        assert_eq!(graph.lifting_set_index(), 3);
        assert_eq!(graph.shift(0, BG2_K), Some(1));
        assert_eq!(graph.shift(2, BG2_K), Some(0));
        assert_eq!(graph.shift(3, BG2_K), Some(1));

        // BG2, other sets: row 2 carries it instead.
        let graph = LdpcGraph::get(LdpcBaseGraph::BaseGraph2, 128).unwrap();
        assert_eq!(graph.lifting_set_index(), 0);
        assert_eq!(graph.shift(0, BG2_K), Some(0));
        assert_eq!(graph.shift(2, BG2_K), Some(1));
        assert_eq!(graph.shift(3, BG2_K), Some(0));
    }

    #[test]
    fn test_adjacency_sorted_and_bounded() {
        for bg in [LdpcBaseGraph::BaseGraph1, LdpcBaseGraph::BaseGraph2] {
            let graph = LdpcGraph::get(bg, 384).unwrap();
            for m in 0..graph.nof_check_nodes() {
                let row = graph.adjacency_row(m);
                assert!(!row.is_empty());
                assert!(row.len() <= MAX_CHECK_NODE_DEGREE);
                assert!(row.windows(2).all(|w| w[0] < w[1]));
                assert!(row.iter().all(|&n| (n as usize) < graph.nof_var_nodes_full()));
            }
        }
    }
}
