//! Property-based tests using proptest.
//!
//! These tests check the raster-order causality of built graphs and the
//! shape invariants of every layer, over randomly drawn configurations.

use pixelcnn::pixelcnn::{PixelCnn, PixelCnnConfig};
use pixelcnn::tensor::Tensor;
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Case {
    config: PixelCnnConfig,
    batch: usize,
}

fn config_strategy() -> impl Strategy<Value = Case> {
    (
        (3usize..=6, 3usize..=6),
        1usize..=2,
        1usize..=3,
        2usize..=3,
        any::<bool>(),
        any::<bool>(),
        prop_oneof![
            Just((3usize, 3usize)),
            Just((5usize, 3usize)),
            Just((3usize, 5usize)),
            Just((5usize, 5usize)),
        ],
        prop_oneof![
            Just((1usize, 1usize)),
            Just((3usize, 3usize)),
            Just((1usize, 3usize)),
            Just((3usize, 1usize)),
        ],
        any::<u64>(),
        1usize..=2,
    )
        .prop_map(
            |(size, channels, layers, filters, gated, conditional, first, rest, seed, batch)| {
                let mut config = PixelCnnConfig::new(size)
                    .with_channels(channels)
                    .with_layers(layers)
                    .with_filters(filters)
                    .with_gated(gated)
                    .with_filter_sizes(first, rest)
                    .with_seed(seed);
                if conditional {
                    config = config.with_latent(3);
                }
                Case { config, batch }
            },
        )
}

fn image_strategy(case: &Case) -> impl Strategy<Value = Tensor> {
    let (h, w) = case.config.input_size;
    let shape = [case.batch, h, w, case.config.nb_channels];
    proptest::collection::vec(-1.0f32..1.0, shape.iter().product::<usize>())
        .prop_map(move |data| Tensor::from_vec(data, &shape))
}

fn latent_for(case: &Case, scale: f32) -> Option<Tensor> {
    case.config.conditional.then(|| {
        let n = case.batch * case.config.latent_dim;
        let data = (0..n).map(|i| scale * (i as f32 + 1.0)).collect();
        Tensor::from_vec(data, &[case.batch, case.config.latent_dim])
    })
}

fn case_with_image() -> impl Strategy<Value = (Case, Tensor)> {
    config_strategy().prop_flat_map(|case| {
        let image = image_strategy(&case);
        (Just(case), image)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Changing pixels at or after (r, c) in raster order never changes the
    /// prediction at (r, c) or anywhere before it.
    #[test]
    fn prediction_ignores_current_and_future_pixels(
        (case, image) in case_with_image(),
        pos in (0usize..36, 0usize..36),
        delta in 0.5f32..3.0,
    ) {
        let model = PixelCnn::build(case.config.clone()).unwrap();
        let (h, w) = case.config.input_size;
        let (r, c) = (pos.0 % h, pos.1 % w);
        let latent = latent_for(&case, 0.1);

        let mut perturbed = image.clone();
        for n in 0..case.batch {
            for rr in 0..h {
                for cc in 0..w {
                    if (rr, cc) >= (r, c) {
                        for k in 0..case.config.nb_channels {
                            let v = perturbed.at4(n, rr, cc, k);
                            perturbed.set4(n, rr, cc, k, v + delta);
                        }
                    }
                }
            }
        }

        let before = model.forward(&image, latent.as_ref()).unwrap();
        let after = model.forward(&perturbed, latent.as_ref()).unwrap();
        for n in 0..case.batch {
            for rr in 0..h {
                for cc in 0..w {
                    if (rr, cc) > (r, c) {
                        continue;
                    }
                    for k in 0..case.config.nb_channels {
                        prop_assert_eq!(
                            before.at4(n, rr, cc, k),
                            after.at4(n, rr, cc, k),
                            "leak at ({}, {}) from ({}, {})", rr, cc, r, c
                        );
                    }
                }
            }
        }
    }

    /// The output always has the input's spatial size and channel count.
    #[test]
    fn output_shape_matches_input((case, image) in case_with_image()) {
        let model = PixelCnn::build(case.config.clone()).unwrap();
        let latent = latent_for(&case, 1.0);
        let y = model.forward(&image, latent.as_ref()).unwrap();
        prop_assert_eq!(y.shape(), image.shape());
    }

    /// Every activation unit emits exactly `nb_filters` channels, whatever
    /// its pre-activation width.
    #[test]
    fn activation_outputs_have_nb_filters_channels(case in config_strategy()) {
        let model = PixelCnn::build(case.config.clone()).unwrap();
        let (h, w) = case.config.input_size;
        let unit_output = if case.config.gated { "merge_gate" } else { "relu" };
        let pre_width = (if case.config.gated { 2 } else { 1 }) * case.config.nb_filters;
        for layer in 0..case.config.nb_pixelcnn_layers {
            for stack in ["v", "h"] {
                let conv = model.graph().node(&format!("{stack}_conv_{layer}")).unwrap();
                prop_assert_eq!(conv.shape[2], pre_width);
                let out = model
                    .graph()
                    .node(&format!("{stack}_{unit_output}_{layer}"))
                    .unwrap();
                prop_assert_eq!(&out.shape, &vec![h, w, case.config.nb_filters]);
            }
        }
    }

    /// An unconditional model gives the same answer whatever latent-shaped
    /// tensor is passed alongside the image.
    #[test]
    fn unconditional_model_ignores_latent((case, image) in case_with_image()) {
        let mut config = case.config.clone();
        config.conditional = false;
        let model = PixelCnn::build(config).unwrap();
        let junk = Tensor::full(&[case.batch, 3], 5.0);
        let with = model.forward(&image, Some(&junk)).unwrap();
        let without = model.forward(&image, None).unwrap();
        prop_assert_eq!(with, without);
    }
}
