use bc7_mode0::{encode_block, Tile};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn criterion_benchmark(c: &mut Criterion) {
    let pixels = std::array::from_fn(|i| {
        let v = ((i * 53) % 256) as f32;
        [v, 255.0 - v, (v * 3.0) % 255.0, 255.0]
    });
    let tile = Tile::new(pixels);

    c.bench_function("encode_block", |b| {
        b.iter(|| encode_block(black_box(&tile)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
