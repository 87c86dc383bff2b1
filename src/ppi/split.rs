//! Split bookkeeping for PPI subgraphs
//!
//! Every node carries `val`/`test` flags. A connected component must agree
//! on them; the agreed split is then assigned to the whole component.
//! Components below the size threshold are pooled into one leftover
//! subgraph per split.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::{component_sizes, SparseGraph};

/// Dataset split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    /// All splits in packing order
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        };
        f.write_str(name)
    }
}

/// Raw per-node split flags as stored in the dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFlags {
    #[serde(default)]
    pub val: bool,
    #[serde(default)]
    pub test: bool,
}

impl NodeFlags {
    pub fn new(val: bool, test: bool) -> Self {
        Self { val, test }
    }

    /// Split named by the flags; both flags set is an integrity violation
    pub fn split(&self, node: usize) -> Result<Split> {
        match (self.val, self.test) {
            (false, false) => Ok(Split::Train),
            (true, false) => Ok(Split::Val),
            (false, true) => Ok(Split::Test),
            (true, true) => Err(Error::AmbiguousNodeSplit { node }),
        }
    }
}

/// Resolve the split of every node
pub fn node_splits(flags: &[NodeFlags]) -> Result<Vec<Split>> {
    flags
        .iter()
        .enumerate()
        .map(|(node, f)| f.split(node))
        .collect()
}

/// Reject any edge whose endpoints belong to different splits
pub fn validate_edge_splits(graph: &SparseGraph, splits: &[Split]) -> Result<()> {
    if splits.len() != graph.num_nodes() {
        return Err(Error::dims("node splits", graph.num_nodes(), splits.len()));
    }

    match graph.edges().find(|&(i, j, _)| splits[i] != splits[j]) {
        Some((from, to, _)) => Err(Error::EdgeSplitMismatch {
            from,
            to,
            from_split: splits[from],
            to_split: splits[to],
        }),
        None => Ok(()),
    }
}

/// Where a subgraph came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubgraphKind {
    /// A single connected component, by component id
    Component(usize),
    /// Pool of undersized components of one split
    Leftover,
}

/// Node set packed as one padded row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subgraph {
    pub kind: SubgraphKind,
    pub split: Split,
    /// Original node indices, ascending
    pub nodes: Vec<usize>,
}

impl Subgraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_leftover(&self) -> bool {
        self.kind == SubgraphKind::Leftover
    }
}

/// Renumbered partition of the graph into packable subgraphs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgraphPartition {
    subgraphs: Vec<Subgraph>,
    group_of: Vec<usize>,
}

impl SubgraphPartition {
    /// All subgraphs: large components first, then leftovers (train, val, test)
    pub fn subgraphs(&self) -> &[Subgraph] {
        &self.subgraphs
    }

    /// Subgraph index of every node
    pub fn group_of(&self) -> &[usize] {
        &self.group_of
    }

    pub fn num_subgraphs(&self) -> usize {
        self.subgraphs.len()
    }

    /// Subgraphs assigned to `split`, in partition order
    pub fn by_split(&self, split: Split) -> Vec<&Subgraph> {
        self.subgraphs.iter().filter(|s| s.split == split).collect()
    }

    /// Largest subgraph over every split
    pub fn max_subgraph_size(&self) -> usize {
        self.subgraphs.iter().map(Subgraph::len).max().unwrap_or(0)
    }
}

/// Per-component split state while scanning nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assignment {
    Unseen,
    Seen(Split),
}

/// Assign a split to every component and pool the small ones
///
/// `components` is a dense labelling as returned by
/// [`connected_components`](crate::graph::connected_components). A component
/// whose nodes disagree on their split is rejected, whatever its size.
pub fn partition_subgraphs(
    components: &[usize],
    splits: &[Split],
    min_size: usize,
) -> Result<SubgraphPartition> {
    if components.len() != splits.len() {
        return Err(Error::dims("node splits", components.len(), splits.len()));
    }

    let sizes = component_sizes(components);
    let mut assignment = vec![Assignment::Unseen; sizes.len()];

    for (node, (&component, &split)) in components.iter().zip(splits).enumerate() {
        match assignment[component] {
            Assignment::Unseen => assignment[component] = Assignment::Seen(split),
            Assignment::Seen(expected) if expected != split => {
                return Err(Error::InconsistentSplit {
                    component,
                    node,
                    expected,
                    found: split,
                });
            }
            Assignment::Seen(_) => {}
        }
    }

    let mut members: Vec<Vec<usize>> = sizes.iter().map(|&s| Vec::with_capacity(s)).collect();
    for (node, &component) in components.iter().enumerate() {
        members[component].push(node);
    }

    let mut subgraphs = Vec::new();
    let mut leftovers: [Vec<usize>; 3] = Default::default();

    for (component, nodes) in members.into_iter().enumerate() {
        let split = match assignment[component] {
            Assignment::Seen(split) => split,
            Assignment::Unseen => continue,
        };
        if nodes.len() >= min_size {
            subgraphs.push(Subgraph {
                kind: SubgraphKind::Component(component),
                split,
                nodes,
            });
        } else {
            leftovers[split_slot(split)].extend(nodes);
        }
    }

    for (split, mut nodes) in Split::ALL.into_iter().zip(leftovers) {
        if nodes.is_empty() {
            continue;
        }
        nodes.sort_unstable();
        subgraphs.push(Subgraph {
            kind: SubgraphKind::Leftover,
            split,
            nodes,
        });
    }

    let mut group_of = vec![0; components.len()];
    for (group, subgraph) in subgraphs.iter().enumerate() {
        for &node in &subgraph.nodes {
            group_of[node] = group;
        }
    }

    Ok(SubgraphPartition { subgraphs, group_of })
}

fn split_slot(split: Split) -> usize {
    match split {
        Split::Train => 0,
        Split::Val => 1,
        Split::Test => 2,
    }
}
