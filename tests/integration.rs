//! Integration tests for graph attention and PPI batching

use graph_attention::gat::{HeadConfig, HeadParams};
use graph_attention::graph::{adj_to_bias, adj_to_bias_single, connected_components, UNREACHABLE_BIAS};
use graph_attention::ppi::{NodeFlags, SubgraphKind};
use graph_attention::{
    AttentionHead, Error, Gat, GatConfig, PpiDataset, PpiPipeline, PreprocessConfig, SparseAttentionHead,
    SparseGraph, Split,
};
use ndarray::{s, Array2, Array3, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Undirected graph from an edge list
fn undirected(n: usize, edges: &[(usize, usize)]) -> SparseGraph {
    let both: Vec<_> = edges
        .iter()
        .flat_map(|&(a, b)| [(a, b, 1.0), (b, a, 1.0)])
        .collect();
    SparseGraph::from_edges(n, &both).unwrap()
}

/// Hop distances by repeated relaxation, `usize::MAX` when unreachable
fn hop_distances(adj: &Array2<f64>) -> Array2<usize> {
    let n = adj.nrows();
    let mut dist = Array2::from_elem((n, n), usize::MAX);
    for i in 0..n {
        dist[[i, i]] = 0;
        let mut frontier = vec![i];
        let mut d = 0;
        while !frontier.is_empty() {
            d += 1;
            let mut next = Vec::new();
            for &u in &frontier {
                for v in 0..n {
                    if adj[[u, v]] > 0.0 && dist[[i, v]] == usize::MAX {
                        dist[[i, v]] = d;
                        next.push(v);
                    }
                }
            }
            frontier = next;
        }
    }
    dist
}

#[test]
fn test_ring_bias_matrix() {
    let adj = undirected(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]).to_dense();
    let bias = adj_to_bias_single(&adj, 1).unwrap();

    for i in 0..4 {
        assert_eq!(bias[[i, i]], 0.0);
        assert_eq!(bias[[i, (i + 1) % 4]], 0.0);
        assert_eq!(bias[[i, (i + 3) % 4]], 0.0);
        assert_eq!(bias[[i, (i + 2) % 4]], UNREACHABLE_BIAS);
    }
}

#[test]
fn test_bias_matches_hop_distance() {
    let mut rng = StdRng::seed_from_u64(3);
    let raw = Array2::random_using((9, 9), Uniform::new(0.0, 1.0), &mut rng);
    let adj = (&raw + &raw.t()).mapv(|v| if v > 1.4 { 1.0 } else { 0.0 });
    let dist = hop_distances(&adj);

    for nhood in 0..4 {
        let bias = adj_to_bias_single(&adj, nhood).unwrap();
        for ((i, j), &d) in dist.indexed_iter() {
            let expected = if d <= nhood { 0.0 } else { UNREACHABLE_BIAS };
            assert_eq!(bias[[i, j]], expected, "nhood {} pair ({}, {})", nhood, i, j);
        }
    }
}

#[test]
fn test_batched_bias_respects_sizes() {
    let mut adj = Array3::zeros((2, 4, 4));
    adj.slice_mut(s![0, ..3, ..3])
        .assign(&undirected(3, &[(0, 1), (1, 2)]).to_dense());
    adj[[0, 3, 3]] = 1.0;
    adj.slice_mut(s![1, .., ..]).assign(&Array2::eye(4));

    let bias = adj_to_bias(&adj, &[3, 1], 1).unwrap();
    assert_eq!(bias[[0, 0, 2]], UNREACHABLE_BIAS);
    assert_eq!(bias[[0, 0, 1]], 0.0);
    assert_eq!(bias[[1, 0, 0]], 0.0);
}

#[test]
fn test_two_triangles_two_components() {
    let graph = undirected(6, &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]);
    let labels = connected_components(&graph);

    assert_eq!(labels, vec![0, 0, 0, 1, 1, 1]);
}

#[test]
fn test_dense_and_sparse_heads_agree() {
    let mut rng = StdRng::seed_from_u64(11);
    let params = HeadParams::init(5, 3, &mut rng);
    let config = HeadConfig::default();
    let n = 6;

    let graph = undirected(n, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (0, 3)]).add_self_loops(1.0);
    let bias = adj_to_bias_single(&graph.to_dense(), 1).unwrap();
    let x = Array2::random_using((n, 5), Uniform::new(-1.0, 1.0), &mut rng);

    let dense = AttentionHead::from_params(params.clone(), config);
    let sparse = SparseAttentionHead::from_params(params, n, config);

    let dense_coefs = dense.attention_coefficients(&x, &bias).unwrap();
    let sparse_coefs = sparse.attention_coefficients(&x, &graph).unwrap().to_dense();
    for (a, b) in dense_coefs.iter().zip(sparse_coefs.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
    for (i, row) in dense_coefs.rows().into_iter().enumerate() {
        assert!((row.sum() - 1.0).abs() < 1e-10);
        for (j, &c) in row.iter().enumerate() {
            if !graph.has_edge(i, j) {
                assert_eq!(c, 0.0);
            }
        }
    }

    let dense_out = dense.forward(&x, &bias, false).unwrap();
    let sparse_out = sparse.forward(&x, &graph, false).unwrap();
    for (a, b) in dense_out.iter().zip(sparse_out.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn test_pipeline_end_to_end() {
    let tissues = [
        (12, Split::Train),
        (2, Split::Train),
        (9, Split::Val),
        (7, Split::Test),
        (1, Split::Test),
    ];
    let dataset = PpiDataset::synthetic(&tissues, 4, 3, 5).unwrap();
    let config = PreprocessConfig {
        standardize: false,
        ..PreprocessConfig::default()
    };

    let splits = PpiPipeline::new(config).run(&dataset).unwrap();

    assert_eq!(splits.max_nodes(), 12);
    assert_eq!(splits.train.num_nodes(), &[12, 2]);
    assert_eq!(splits.val.num_nodes(), &[9]);
    assert_eq!(splits.test.num_nodes(), &[7, 1]);

    let leftover = &splits.partition.subgraphs()[3];
    assert_eq!(leftover.kind, SubgraphKind::Leftover);
    assert_eq!((leftover.split, leftover.nodes.clone()), (Split::Train, vec![12, 13]));

    // every row unpads back to the original rows in node order
    for split in Split::ALL {
        let batch = splits.get(split);
        for (row, subgraph) in splits.partition.by_split(split).into_iter().enumerate() {
            let (features, labels) = batch.unpad(row).unwrap();
            assert_eq!(features, dataset.features.select(Axis(0), &subgraph.nodes));
            assert_eq!(labels, dataset.labels.select(Axis(0), &subgraph.nodes));
        }
        assert_eq!(batch.mask().sum() as usize, batch.num_nodes().iter().sum::<usize>());
    }

    // padding rows carry a self-loop only
    let adj = splits.val.adjacency().index_axis(Axis(0), 0);
    for p in 9..12 {
        assert_eq!(adj.row(p).sum(), 1.0);
        assert_eq!(adj[[p, p]], 1.0);
    }
}

#[test]
fn test_gat_over_padded_batch() {
    let tissues = [(6, Split::Train), (4, Split::Train), (5, Split::Val), (3, Split::Test)];
    let dataset = PpiDataset::synthetic(&tissues, 5, 3, 9).unwrap();
    let splits = PpiPipeline::default().run(&dataset).unwrap();

    let config = GatConfig {
        hid_units: vec![4, 4],
        n_heads: vec![2, 2, 3],
        ..GatConfig::default()
    };
    let gat = Gat::new(&config, 5, 3).unwrap();
    let bias = splits.train.bias(1).unwrap();
    let logits = gat.forward_batch(splits.train.features(), &bias, false).unwrap();

    assert_eq!(logits.dim(), (2, 6, 3));
    assert!(logits.iter().all(|v| v.is_finite()));

    // padding does not leak into real nodes
    let size = splits.train.num_nodes()[1];
    let (features, _) = splits.train.unpad(1).unwrap();
    let block = splits.train.adjacency().slice(s![1, ..size, ..size]).to_owned();
    let alone = gat
        .forward(&features, &adj_to_bias_single(&block, 1).unwrap(), false)
        .unwrap();
    let padded = logits.slice(s![1, ..size, ..]);
    for (a, b) in alone.iter().zip(padded.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn test_inconsistent_component_aborts() {
    let graph = undirected(4, &[(0, 1), (1, 2), (2, 3)]);
    let flags = vec![
        NodeFlags::new(true, false),
        NodeFlags::new(true, false),
        NodeFlags::new(true, true),
        NodeFlags::new(true, false),
    ];
    let dataset = PpiDataset::new(graph, Array2::zeros((4, 2)), Array2::zeros((4, 1)), flags).unwrap();

    let err = PpiPipeline::default().run(&dataset).unwrap_err();
    assert!(matches!(err, Error::AmbiguousNodeSplit { node: 2 }));
}

#[test]
fn test_dataset_files_round_trip() {
    let tissues = [(5, Split::Train), (4, Split::Val), (3, Split::Test)];
    let dataset = PpiDataset::synthetic(&tissues, 3, 2, 21).unwrap();

    let dir = tempfile::tempdir().unwrap();
    dataset.save(dir.path(), "ppi").unwrap();
    let loaded = PpiDataset::load(dir.path(), "ppi").unwrap();

    assert_eq!(loaded, dataset);
}
