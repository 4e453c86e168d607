//! End-to-end tests of built PixelCNN models.

use pixelcnn::prelude::*;
use pixelcnn::pixelcnn::{Role, Scope};

fn scenario_config() -> PixelCnnConfig {
    PixelCnnConfig::new((8, 8))
        .with_channels(1)
        .with_filters(4)
        .with_layers(2)
        .with_gated(true)
        .with_seed(2016)
}

fn ramp(shape: &[usize]) -> Tensor {
    let n: usize = shape.iter().product();
    Tensor::from_vec((0..n).map(|i| ((i * 37) % 11) as f32 / 11.0 - 0.5).collect(), shape)
}

#[test]
fn test_scenario_output_shape_and_determinism() {
    let model = PixelCnn::build(scenario_config()).unwrap();
    let zeros = Tensor::zeros(&[3, 8, 8, 1]);
    let a = model.forward(&zeros, None).unwrap();
    let b = model.forward(&zeros, None).unwrap();
    assert_eq!(a.shape(), &[3, 8, 8, 1]);
    assert_eq!(a, b);
}

#[test]
fn test_scenario_single_pixel_change() {
    let model = PixelCnn::build(scenario_config()).unwrap();
    let base = Tensor::zeros(&[1, 8, 8, 1]);
    let mut changed = base.clone();
    changed.set4(0, 5, 5, 0, 1.0);

    let a = model.forward(&base, None).unwrap();
    let b = model.forward(&changed, None).unwrap();

    let mut differs_after = false;
    for r in 0..8 {
        for c in 0..8 {
            let same = a.at4(0, r, c, 0) == b.at4(0, r, c, 0);
            if (r, c) <= (5, 5) {
                assert!(same, "prediction at ({r}, {c}) saw pixel (5, 5)");
            } else if !same {
                differs_after = true;
            }
        }
    }
    assert!(differs_after, "pixel (5, 5) influenced no later prediction");
}

#[test]
fn test_single_layer_has_no_residual() {
    let model = PixelCnn::build(scenario_config().with_layers(1)).unwrap();
    assert!(!model.graph().contains(Scope::Horizontal, Role::Residual));
    let model = PixelCnn::build(scenario_config().with_layers(3)).unwrap();
    assert!(model.graph().node("h_residual_1").is_some());
    assert!(model.graph().node("h_residual_2").is_some());
    assert!(model.graph().node("h_residual_0").is_none());
}

#[test]
fn test_mask_a_crop_aligns_with_vertical_stack() {
    for first in [(3, 3), (5, 7), (7, 7), (9, 3)] {
        let config = scenario_config().with_filter_sizes(first, (3, 3));
        let model = PixelCnn::build(config).unwrap();
        let graph = model.graph();
        let vertical = &graph.node("v_conv_0").unwrap().shape;
        let cropped = &graph.node("h_crop_right_0").unwrap().shape;
        assert_eq!(cropped, vertical, "first kernel {first:?}");
        assert_eq!(graph.node("h_conv_0").unwrap().shape[1], 9);
    }
}

/// Push the head into its linear regime so every change in the last
/// horizontal map reaches the output.
fn open_head(model: &mut PixelCnn) {
    let mut state = model.graph().state_dict();
    let filters = model.config().nb_filters;
    for i in 0..2 {
        let mut identity = vec![0.0; filters * filters];
        for k in 0..filters {
            identity[k * filters + k] = 1.0;
        }
        state.insert(format!("head_conv_{i}.weight"), (identity, vec![filters, filters, 1, 1]));
        let bias = if i == 0 { 50.0 } else { 0.0 };
        state.insert(format!("head_conv_{i}.bias"), (vec![bias; filters], vec![filters]));
    }
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("open_head.safetensors");
    pixelcnn::serialization::save_safetensors(&path, &state).unwrap();
    model.load_weights(&path).unwrap();
}

#[test]
fn test_latent_change_moves_every_pixel() {
    let mut model = PixelCnn::build(scenario_config().with_latent(5)).unwrap();
    open_head(&mut model);

    let image = ramp(&[1, 8, 8, 1]);
    let latent_a = Tensor::new(&[0.3, -0.2, 0.9, 0.0, 0.5], &[1, 5]);
    let latent_b = Tensor::new(&[-0.7, 0.4, 0.1, 1.0, -0.5], &[1, 5]);

    let a = model.forward(&image, Some(&latent_a)).unwrap();
    let b = model.forward(&image, Some(&latent_b)).unwrap();
    for r in 0..8 {
        for c in 0..8 {
            assert_ne!(a.at4(0, r, c, 0), b.at4(0, r, c, 0), "pixel ({r}, {c})");
        }
    }
}

#[test]
fn test_latent_reaches_every_position_of_last_horizontal_map() {
    for gated in [true, false] {
        let model = PixelCnn::build(scenario_config().with_gated(gated).with_latent(2)).unwrap();
        let graph = model.graph();
        let last = graph.node("h_residual_1").unwrap().id;
        let index = graph
            .nodes()
            .iter()
            .position(|n| n.id == last)
            .unwrap();

        let image = ramp(&[1, 8, 8, 1]);
        let a = graph
            .evaluate(&image, Some(&Tensor::new(&[1.0, 0.0], &[1, 2])))
            .unwrap();
        let b = graph
            .evaluate(&image, Some(&Tensor::new(&[0.0, 1.0], &[1, 2])))
            .unwrap();
        let changed = (0..8)
            .flat_map(|r| (0..8).map(move |c| (r, c)))
            .filter(|&(r, c)| (0..4).any(|k| a[index].at4(0, r, c, k) != b[index].at4(0, r, c, k)))
            .count();
        if gated {
            assert_eq!(changed, 64);
        } else {
            assert!(changed > 0);
        }
    }
}

#[test]
fn test_conditional_model_requires_latent() {
    let model = PixelCnn::build(scenario_config().with_latent(3)).unwrap();
    let err = model.forward(&Tensor::zeros(&[1, 8, 8, 1]), None).unwrap_err();
    assert!(matches!(err, PixelCnnError::MissingLatent(_)));
}

#[test]
fn test_wrong_image_shape_rejected() {
    let model = PixelCnn::build(scenario_config()).unwrap();
    assert!(matches!(
        model.forward(&Tensor::zeros(&[1, 8, 7, 1]), None),
        Err(PixelCnnError::InvalidInput(_))
    ));
}

#[test]
fn test_training_surface() {
    let model = PixelCnn::build(scenario_config()).unwrap();
    let images = ramp(&[6, 8, 8, 1]);
    let dataset = Dataset::new(images.clone(), images, None).unwrap();
    let options = FitOptions::new(4, 1).with_seed(0);

    let mut seen = 0;
    for batch in dataset.batches(&options, 0).unwrap() {
        let predicted = model.predict(&batch.inputs, None, 3).unwrap();
        let loss = pixel_sse_loss(&batch.targets, &predicted).unwrap();
        assert_eq!(loss.shape(), &[batch.inputs.batch_size()]);
        assert!(loss.data().iter().all(|l| l.is_finite() && *l >= 0.0));
        seen += batch.inputs.batch_size();
    }
    assert_eq!(seen, 6);
}

#[test]
fn test_parameter_count() {
    let model = PixelCnn::build(scenario_config().with_layers(1)).unwrap();
    // v_conv_0 (4×7×8 + 8), v_feed_conv_0 (4×8 + 8), h_conv_0 (3×8 + 8),
    // h_projection_0 (4×4 + 4), two head convs (4×4 + 4), output_conv (4 + 1)
    let expected = (4 * 7 * 8 + 8) + (4 * 8 + 8) + (3 * 8 + 8) + 3 * (4 * 4 + 4) + (4 + 1);
    assert_eq!(model.num_parameters(), expected);
}
