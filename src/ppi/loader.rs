//! PPI dataset files
//!
//! Layout of a dataset directory with prefix `ppi`:
//!
//! - `ppi-G.json`: node-link graph, nodes carry `val`/`test` flags
//! - `ppi-id_map.json`: node id to row index
//! - `ppi-class_map.json`: node id to label vector (or a single class id)
//! - `ppi-feats.csv`: one feature row per node, no header

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::split::NodeFlags;
use crate::error::{Error, Result};
use crate::graph::SparseGraph;

#[derive(Debug, Serialize, Deserialize)]
struct NodeLinkGraph {
    #[serde(default)]
    directed: bool,
    nodes: Vec<NodeRecord>,
    links: Vec<LinkRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    id: Value,
    #[serde(default)]
    val: bool,
    #[serde(default)]
    test: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct LinkRecord {
    source: Value,
    target: Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ClassEntry {
    Multi(Vec<f64>),
    Single(usize),
}

/// Whole PPI graph with per-node data, rows indexed by the id map
#[derive(Debug, Clone, PartialEq)]
pub struct PpiDataset {
    pub graph: SparseGraph,
    pub features: Array2<f64>,
    pub labels: Array2<f64>,
    pub flags: Vec<NodeFlags>,
}

impl PpiDataset {
    /// Bundle in-memory data, checking that every table has one row per node
    pub fn new(
        graph: SparseGraph,
        features: Array2<f64>,
        labels: Array2<f64>,
        flags: Vec<NodeFlags>,
    ) -> Result<Self> {
        let n = graph.num_nodes();
        if features.nrows() != n {
            return Err(Error::dims("feature rows", n, features.nrows()));
        }
        if labels.nrows() != n {
            return Err(Error::dims("label rows", n, labels.nrows()));
        }
        if flags.len() != n {
            return Err(Error::dims("node flags", n, flags.len()));
        }
        Ok(Self {
            graph,
            features,
            labels,
            flags,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.num_nodes()
    }

    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn num_classes(&self) -> usize {
        self.labels.ncols()
    }

    /// Load `{prefix}-*` files from `dir`
    pub fn load(dir: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let dir = dir.as_ref();
        info!("Loading {} dataset from {}", prefix, dir.display());

        let graph_data: NodeLinkGraph = read_json(&file_path(dir, prefix, "G.json"))?;
        let id_map: HashMap<String, usize> = read_json(&file_path(dir, prefix, "id_map.json"))?;
        let n = graph_data.nodes.len();
        debug!("{} nodes, {} links", n, graph_data.links.len());

        let mut flags = vec![NodeFlags::default(); n];
        let mut keys = vec![None; n];
        for node in &graph_data.nodes {
            let key = node_key(&node.id)?;
            let row = resolve(&id_map, n, &key)?;
            if keys[row].is_some() {
                return Err(Error::DataError(format!("row {} is mapped twice (node {})", row, key)));
            }
            flags[row] = NodeFlags::new(node.val, node.test);
            keys[row] = Some(key);
        }

        let mut edges = Vec::with_capacity(graph_data.links.len() * 2);
        for link in &graph_data.links {
            let i = resolve(&id_map, n, &node_key(&link.source)?)?;
            let j = resolve(&id_map, n, &node_key(&link.target)?)?;
            edges.push((i, j, 1.0));
            if !graph_data.directed {
                edges.push((j, i, 1.0));
            }
        }
        let graph = SparseGraph::from_edges(n, &edges)?;

        let class_map: HashMap<String, ClassEntry> =
            read_json(&file_path(dir, prefix, "class_map.json"))?;
        let entries = keys
            .iter()
            .flatten()
            .map(|key| {
                class_map
                    .get(key)
                    .ok_or_else(|| Error::DataError(format!("node {} has no class entry", key)))
            })
            .collect::<Result<Vec<_>>>()?;
        let labels = label_matrix(&entries)?;

        let features = read_features(&file_path(dir, prefix, "feats.csv"))?;

        info!(
            "Loaded graph: {} nodes, {} edges, {} features, {} classes",
            n,
            graph.num_edges(),
            features.ncols(),
            labels.ncols()
        );
        Self::new(graph, features, labels, flags)
    }

    /// Write the dataset in the layout read by [`PpiDataset::load`]
    ///
    /// Node ids are the row indices.
    pub fn save(&self, dir: impl AsRef<Path>, prefix: &str) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let n = self.num_nodes();

        let directed = !self.graph.is_symmetric();
        let links = self
            .graph
            .edges()
            .filter(|&(i, j, _)| directed || i <= j)
            .map(|(i, j, _)| LinkRecord {
                source: Value::from(i),
                target: Value::from(j),
            })
            .collect();
        let nodes = self
            .flags
            .iter()
            .enumerate()
            .map(|(i, f)| NodeRecord {
                id: Value::from(i),
                val: f.val,
                test: f.test,
            })
            .collect();
        let graph_data = NodeLinkGraph {
            directed,
            nodes,
            links,
        };
        write_json(&file_path(dir, prefix, "G.json"), &graph_data)?;

        let id_map: BTreeMap<String, usize> = (0..n).map(|i| (i.to_string(), i)).collect();
        write_json(&file_path(dir, prefix, "id_map.json"), &id_map)?;

        let class_map: BTreeMap<String, ClassEntry> = self
            .labels
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| (i.to_string(), ClassEntry::Multi(row.to_vec())))
            .collect();
        write_json(&file_path(dir, prefix, "class_map.json"), &class_map)?;

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_path(file_path(dir, prefix, "feats.csv"))?;
        for row in self.features.rows() {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush()?;

        debug!("Saved {} nodes to {}", n, dir.display());
        Ok(())
    }
}

fn file_path(dir: &Path, prefix: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{}-{}", prefix, suffix))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer(file, data)?;
    Ok(())
}

/// Id-map key of a node id, integers and strings alike
fn node_key(id: &Value) -> Result<String> {
    match id {
        Value::String(s) => Ok(s.clone()),
        Value::Number(num) => Ok(num.to_string()),
        other => Err(Error::DataError(format!("unsupported node id {}", other))),
    }
}

fn resolve(id_map: &HashMap<String, usize>, n: usize, key: &str) -> Result<usize> {
    let row = *id_map
        .get(key)
        .ok_or_else(|| Error::DataError(format!("node {} missing from id map", key)))?;
    if row >= n {
        return Err(Error::DataError(format!("node {} maps to row {} of {}", key, row, n)));
    }
    Ok(row)
}

/// Label rows in node order: multi-hot vectors as given, class ids one-hot
fn label_matrix(entries: &[&ClassEntry]) -> Result<Array2<f64>> {
    let n = entries.len();
    let width = match entries.first() {
        Some(ClassEntry::Multi(v)) => v.len(),
        Some(ClassEntry::Single(_)) => entries
            .iter()
            .map(|e| match e {
                ClassEntry::Single(c) => c + 1,
                ClassEntry::Multi(_) => 0,
            })
            .max()
            .unwrap_or(0),
        None => 0,
    };

    let mut labels = Array2::zeros((n, width));
    for (row, entry) in entries.iter().enumerate() {
        match (entries[0], entry) {
            (ClassEntry::Multi(_), ClassEntry::Multi(v)) => {
                if v.len() != width {
                    return Err(Error::dims("label vector width", width, v.len()));
                }
                for (col, &value) in v.iter().enumerate() {
                    labels[[row, col]] = value;
                }
            }
            (ClassEntry::Single(_), ClassEntry::Single(c)) => labels[[row, *c]] = 1.0,
            _ => {
                return Err(Error::DataError(
                    "class map mixes label vectors and class ids".into(),
                ))
            }
        }
    }
    Ok(labels)
}

fn read_features(path: &Path) -> Result<Array2<f64>> {
    let mut reader = ReaderBuilder::new().has_headers(false).from_path(path)?;
    let mut data = Vec::new();
    let mut rows = 0;
    let mut cols = 0;

    for result in reader.records() {
        let record = result?;
        if rows == 0 {
            cols = record.len();
        }
        for field in record.iter() {
            let value = field.trim().parse::<f64>().map_err(|e| {
                Error::DataError(format!("feature row {}: cannot parse {:?}: {}", rows, field, e))
            })?;
            data.push(value);
        }
        rows += 1;
    }

    Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::DataError(format!("feature matrix: {}", e)))
}
