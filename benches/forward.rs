//! Benchmarks for graph construction and the forward pass.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pixelcnn::prelude::*;

fn config(layers: usize) -> PixelCnnConfig {
    PixelCnnConfig::new((16, 16))
        .with_channels(1)
        .with_filters(16)
        .with_layers(layers)
        .with_seed(0)
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("pixelcnn_build");

    for layers in [1, 3, 6].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(layers), layers, |b, &layers| {
            b.iter(|| PixelCnn::build(black_box(config(layers))).unwrap());
        });
    }

    group.finish();
}

fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("pixelcnn_forward");
    group.sample_size(20);

    for layers in [1, 3].iter() {
        let model = PixelCnn::build(config(*layers)).unwrap();
        let images = Tensor::full(&[4, 16, 16, 1], 0.5);

        group.bench_with_input(BenchmarkId::from_parameter(layers), layers, |b, _| {
            b.iter(|| model.forward(black_box(&images), None).unwrap());
        });
    }

    group.finish();
}

fn bench_conditional_predict(c: &mut Criterion) {
    let model = PixelCnn::build(config(3).with_latent(8)).unwrap();
    let images = Tensor::full(&[8, 16, 16, 1], 0.5);
    let latents = Tensor::full(&[8, 8], 0.1);

    c.bench_function("pixelcnn_predict_conditional", |b| {
        b.iter(|| {
            model
                .predict(black_box(&images), Some(black_box(&latents)), 4)
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_build, bench_forward, bench_conditional_predict);
criterion_main!(benches);
