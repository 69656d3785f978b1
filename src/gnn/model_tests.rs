use super::*;
use crate::gnn::{EdgeIndex, GraphIndependentConfig};
use crate::nn::MlpConfig;

fn small_config() -> MpnConfig {
    MpnConfig {
        encoder: GraphIndependentConfig {
            edge_in_dim: Some(4),
            node_in_dim: Some(5),
            edge_out_dim: Some(6),
            node_out_dim: Some(8),
            node_fc_dims: vec![],
            edge_fc_dims: vec![],
            dropout_p: None,
            use_batchnorm: false,
        },
        classifier: GraphIndependentConfig {
            edge_in_dim: Some(6),
            edge_out_dim: Some(1),
            ..GraphIndependentConfig::default()
        },
        edge_model: MlpConfig::new(vec![6]),
        node_model: MlpConfig::new(vec![8]),
        node_agg_fn: Aggregation::Sum,
        reattach_initial_nodes: false,
        reattach_initial_edges: false,
        num_enc_steps: 3,
        num_class_steps: 2,
        seed: Some(11),
    }
}

fn eval_model(config: &MpnConfig) -> MotMpNet {
    let mut model = MotMpNet::new(config).unwrap();
    model.eval();
    model
}

/// Three detections over two frames, edges in both directions.
fn small_graph() -> GraphSnapshot {
    let nodes: Vec<f32> = (0..15).map(|i| (i as f32 * 0.37).sin()).collect();
    let edges: Vec<f32> = (0..16).map(|i| (i as f32 * 0.53).cos()).collect();
    GraphSnapshot::from_features(
        Tensor::new(&nodes, &[3, 5]),
        EdgeIndex::from_pairs(&[[0, 1], [1, 0], [0, 2], [2, 0]]),
        Tensor::new(&edges, &[4, 4]),
    )
    .unwrap()
}

#[test]
fn test_output_counts_follow_schedule() {
    let model = eval_model(&small_config());
    let out = model.forward(&small_graph()).unwrap();

    assert_eq!(out.classified_edges.len(), 2);
    assert_eq!(out.node_feats.len(), 3);
    for logits in &out.classified_edges {
        assert_eq!(logits.shape(), &[4, 1]);
    }
    for nodes in &out.node_feats {
        assert_eq!(nodes.shape(), &[3, 8]);
    }
}

#[test]
fn test_all_rounds_classified() {
    let mut config = small_config();
    config.num_class_steps = 3;
    let out = eval_model(&config).forward(&small_graph()).unwrap();
    assert_eq!(out.classified_edges.len(), 3);
    assert_eq!(out.node_feats.len(), 4);
}

#[test]
fn test_no_classified_rounds() {
    let mut config = small_config();
    config.num_class_steps = 0;
    let out = eval_model(&config).forward(&small_graph()).unwrap();
    assert!(out.classified_edges.is_empty());
    assert_eq!(out.node_feats.len(), 1);
    assert!(out.final_logits().is_none());
    assert!(out.edge_probabilities().is_none());
}

#[test]
fn test_zero_rounds_classifies_encoded_edges() {
    let mut config = small_config();
    config.num_enc_steps = 0;
    config.num_class_steps = 0;
    let model = eval_model(&config);
    let graph = small_graph();

    let out = model.forward(&graph).unwrap();
    assert_eq!(out.classified_edges.len(), 1);
    assert_eq!(out.node_feats.len(), 1);

    let NodeInput::Features(raw) = graph.nodes() else {
        panic!("expected features");
    };
    let (edges, nodes) = model.encoder.forward(graph.edge_feats(), raw).unwrap();
    let expected = model.classifier.forward_edges(&edges).unwrap();
    assert_eq!(out.classified_edges[0], expected);
    assert_eq!(out.node_feats[0], nodes);
}

#[test]
fn test_first_node_snapshot_is_encoder_output() {
    let model = eval_model(&small_config());
    let graph = small_graph();
    let out = model.forward(&graph).unwrap();
    let NodeInput::Features(raw) = graph.nodes() else {
        panic!("expected features");
    };
    assert_eq!(out.node_feats[0], model.encoder.forward_nodes(raw).unwrap());
}

#[test]
fn test_first_class_step() {
    let config = small_config();
    let model = eval_model(&config);
    assert_eq!(model.first_class_step(), 2);
    assert_eq!(model.first_class_step(), config.first_class_step());
}

#[test]
fn test_eval_forward_is_deterministic() {
    let config = small_config();
    let a = eval_model(&config);
    let b = eval_model(&config);
    let graph = small_graph();

    let out_a = a.forward(&graph).unwrap();
    assert_eq!(out_a, a.forward(&graph).unwrap());
    assert_eq!(out_a, b.forward(&graph).unwrap());
}

#[test]
fn test_different_seeds_give_different_logits() {
    let mut config = small_config();
    let a = eval_model(&config);
    config.seed = Some(12);
    let b = eval_model(&config);
    let graph = small_graph();
    assert_ne!(
        a.forward(&graph).unwrap().final_logits(),
        b.forward(&graph).unwrap().final_logits()
    );
}

#[test]
fn test_edge_probabilities_in_unit_interval() {
    let out = eval_model(&small_config()).forward(&small_graph()).unwrap();
    let probs = out.edge_probabilities().unwrap();
    assert_eq!(probs.len(), 4);
    assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[test]
fn test_reattach_widths() {
    let mut config = small_config();
    config.reattach_initial_nodes = true;
    config.reattach_initial_edges = true;
    let out = eval_model(&config).forward(&small_graph()).unwrap();
    assert_eq!(out.classified_edges.len(), 2);
    assert_eq!(out.node_feats[2].shape(), &[3, 8]);
}

#[test]
fn test_aggregations_all_run() {
    for agg in [Aggregation::Mean, Aggregation::Max, Aggregation::Sum] {
        let mut config = small_config();
        config.node_agg_fn = agg;
        let model = eval_model(&config);
        assert_eq!(model.aggregation(), agg);
        let out = model.forward(&small_graph()).unwrap();
        assert_eq!(out.classified_edges.len(), 2);
    }
}

#[test]
fn test_self_loops_send_no_node_messages() {
    let model = eval_model(&small_config());
    let graph = GraphSnapshot::from_features(
        Tensor::new(&(0..15).map(|i| i as f32).collect::<Vec<_>>(), &[3, 5]),
        EdgeIndex::from_pairs(&[[0, 0], [1, 1], [2, 2]]),
        Tensor::ones(&[3, 4]),
    )
    .unwrap();

    let out = model.forward(&graph).unwrap();
    // Every node merges an all-zero aggregate, so all rows agree.
    let last = out.node_feats.last().unwrap();
    assert_eq!(last.row(0), last.row(1));
    assert_eq!(last.row(1), last.row(2));
}

#[test]
fn test_edgeless_graph() {
    let model = eval_model(&small_config());
    let graph = GraphSnapshot::from_features(
        Tensor::ones(&[2, 5]),
        EdgeIndex::from_pairs(&[]),
        Tensor::zeros(&[0, 4]),
    )
    .unwrap();

    let out = model.forward(&graph).unwrap();
    assert_eq!(out.classified_edges[0].shape(), &[0, 1]);
    assert_eq!(out.node_feats[1].shape(), &[2, 8]);
}

#[test]
fn test_node_width_mismatch() {
    let model = eval_model(&small_config());
    let graph = GraphSnapshot::from_features(
        Tensor::ones(&[2, 7]),
        EdgeIndex::from_pairs(&[[0, 1]]),
        Tensor::ones(&[1, 4]),
    )
    .unwrap();
    assert!(matches!(
        model.forward(&graph),
        Err(MpnError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_crops_require_appearance_encoder() {
    let model = eval_model(&small_config());
    assert!(!model.has_appearance_encoder());
    let graph = GraphSnapshot::new(
        NodeInput::Crops(Tensor::ones(&[2, 1, 2, 2])),
        EdgeIndex::from_pairs(&[[0, 1]]),
        Tensor::ones(&[1, 3]),
    )
    .unwrap();
    assert!(matches!(
        model.forward(&graph),
        Err(MpnError::MissingAppearanceEncoder)
    ));
}

#[test]
fn test_crops_with_appearance_encoder() {
    // Five-wide embedding: each crop's pixel sum repeated.
    let encoder = |crops: &Tensor| -> Result<Tensor> {
        let n = crops.rows();
        let data: Vec<f32> = (0..n)
            .flat_map(|i| std::iter::repeat(crops.row(i).iter().sum::<f32>()).take(5))
            .collect();
        Ok(Tensor::new(&data, &[n, 5]))
    };
    let model = eval_model(&small_config()).with_appearance_encoder(encoder);
    assert!(model.has_appearance_encoder());

    let mut pixels = vec![0.0; 3 * 4];
    pixels[4..8].fill(1.0);
    pixels[8..].fill(2.0);
    let graph = GraphSnapshot::new(
        NodeInput::Crops(Tensor::new(&pixels, &[3, 1, 2, 2])),
        EdgeIndex::from_pairs(&[[0, 1], [1, 2], [0, 2]]),
        Tensor::ones(&[3, 3]),
    )
    .unwrap();

    let out = model.forward(&graph).unwrap();
    assert_eq!(out.classified_edges[0].shape(), &[3, 1]);
    assert_eq!(out.node_feats[0].shape(), &[3, 8]);
}

#[test]
fn test_appearance_encoder_error_propagates() {
    let encoder =
        |_: &Tensor| -> Result<Tensor> { Err(MpnError::Appearance("backbone offline".into())) };
    let model = eval_model(&small_config()).with_appearance_encoder(encoder);
    let graph = GraphSnapshot::new(
        NodeInput::Crops(Tensor::ones(&[2, 1, 2, 2])),
        EdgeIndex::from_pairs(&[[0, 1]]),
        Tensor::ones(&[1, 3]),
    )
    .unwrap();
    assert!(matches!(model.forward(&graph), Err(MpnError::Appearance(_))));
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = small_config();
    config.num_class_steps = 5;
    assert!(MotMpNet::new(&config).is_err());
}

#[test]
fn test_num_parameters() {
    let model = eval_model(&small_config());
    // encoder edge 4->6, encoder node 5->8, classifier 6->1,
    // edge model 22->6, two flow nets 14->8, node merge 16->8
    let expected = (4 * 6 + 6)
        + (5 * 8 + 8)
        + (6 + 1)
        + (22 * 6 + 6)
        + 2 * (14 * 8 + 8)
        + (16 * 8 + 8);
    assert_eq!(model.num_parameters(), expected);
    assert_eq!(model.parameters().len(), 14);
}

#[test]
fn test_train_eval_toggle() {
    let mut model = MotMpNet::new(&small_config()).unwrap();
    assert!(model.training());
    model.eval();
    assert!(!model.training());
    model.train();
    assert!(model.training());
}

#[test]
fn test_parameters_mut_with_refresh() {
    let mut model = eval_model(&small_config());
    for p in model.parameters_mut() {
        p.data_mut().fill(0.0);
    }
    model.refresh_caches();

    let out = model.forward(&small_graph()).unwrap();
    for logits in &out.classified_edges {
        assert!(logits.data().iter().all(|&x| x == 0.0));
    }
}

#[test]
fn test_debug_output() {
    let model = eval_model(&small_config());
    let dbg = format!("{model:?}");
    assert!(dbg.contains("MotMpNet"));
    assert!(dbg.contains("num_enc_steps: 3"));
}

fn raw_node_feats(graph: &GraphSnapshot) -> &Tensor {
    match graph.nodes() {
        NodeInput::Features(t) => t,
        NodeInput::Crops(_) => panic!("expected features"),
    }
}

fn max_abs_diff(a: &Tensor, b: &Tensor) -> f32 {
    assert_eq!(a.shape(), b.shape());
    a.data()
        .iter()
        .zip(b.data())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}

#[test]
fn test_classified_round_weights_messages_by_edge_confidence() {
    let mut config = small_config();
    config.num_enc_steps = 1;
    config.num_class_steps = 1;
    let mut model = eval_model(&config);

    // Positive merge weights with a positive bias: the merge ReLU is the
    // identity and every message contributes to every output.
    {
        let mut merge = model.node_merge.parameters_mut();
        merge[0].data_mut().fill(0.05);
        merge[1].data_mut().fill(1.0);
    }
    model.refresh_caches();

    let graph = small_graph();
    let (edges, nodes) = model
        .encoder
        .forward(graph.edge_feats(), raw_node_feats(&graph))
        .unwrap();
    let (messages, new_edges) = model.mpnet.forward(&nodes, graph.edge_index(), &edges);
    let logits = model.classifier.forward_edges(&new_edges).unwrap();
    let confidence: Vec<f32> = logits
        .data()
        .iter()
        .map(|&l| 1.0 / (1.0 + (-l).exp()))
        .collect();

    let weighted_sum = |msgs: &Tensor, dst: &[usize], edge_ids: &[usize]| {
        let cols = msgs.cols();
        let mut out = Tensor::zeros(&[graph.num_nodes(), cols]);
        for (row, (&node, &edge)) in dst.iter().zip(edge_ids).enumerate() {
            for c in 0..cols {
                out.data_mut()[node * cols + c] += confidence[edge] * msgs.row(row)[c];
            }
        }
        out
    };
    let backward = weighted_sum(
        &messages.backward,
        &messages.backward_dst,
        messages.partition.backward(),
    );
    let forward = weighted_sum(
        &messages.forward,
        &messages.forward_dst,
        messages.partition.forward(),
    );
    let expected = model
        .node_merge
        .forward(&Tensor::cat_cols(&[&backward, &forward]));
    let unweighted = model
        .node_merge
        .forward(&messages.aggregate(Aggregation::Sum, None));

    let out = model.forward(&graph).unwrap();
    assert_eq!(out.classified_edges[0], logits);
    assert!(max_abs_diff(&out.node_feats[1], &expected) < 1e-4);
    assert!(max_abs_diff(&out.node_feats[1], &unweighted) > 1e-3);
}

#[test]
fn test_reattach_prepends_initial_embeddings() {
    let mut config = small_config();
    config.reattach_initial_nodes = true;
    config.reattach_initial_edges = true;
    config.num_enc_steps = 2;
    config.num_class_steps = 2;
    let model = eval_model(&config);
    let graph = small_graph();
    let edge_index = graph.edge_index();

    let (e0, n0) = model
        .encoder
        .forward(graph.edge_feats(), raw_node_feats(&graph))
        .unwrap();
    let round = |nodes: &Tensor, edges: &Tensor| {
        let (messages, new_edges) = model.mpnet.forward(nodes, edge_index, edges);
        let logits = model.classifier.forward_edges(&new_edges).unwrap();
        let weights = logits.sigmoid();
        let merged = model
            .node_merge
            .forward(&messages.aggregate(Aggregation::Sum, Some(weights.data())));
        (merged, new_edges, logits)
    };

    let (n1, e1, _) = round(
        &Tensor::cat_cols(&[&n0, &n0]),
        &Tensor::cat_cols(&[&e0, &e0]),
    );
    let (n2, _, logits2) = round(
        &Tensor::cat_cols(&[&n0, &n1]),
        &Tensor::cat_cols(&[&e0, &e1]),
    );
    let (swapped, _, swapped_logits) = round(
        &Tensor::cat_cols(&[&n1, &n0]),
        &Tensor::cat_cols(&[&e1, &e0]),
    );

    let out = model.forward(&graph).unwrap();
    assert_eq!(out.node_feats[1], n1);
    assert_eq!(out.node_feats[2], n2);
    assert_eq!(out.classified_edges[1], logits2);
    assert_ne!(out.node_feats[2], swapped);
    assert_ne!(out.classified_edges[1], swapped_logits);
}
