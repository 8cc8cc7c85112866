use criterion::{Criterion, criterion_group, criterion_main};
use image::{Rgba, RgbaImage};
use std::hint::black_box;
use std::rc::Rc;

use texstore::{FilterMode, NullBackend, TextureStore};

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    })
}

fn bench_load_rgba(c: &mut Criterion) {
    let backend = Rc::new(NullBackend::new());
    let mut store = TextureStore::new(backend, 600, 400, FilterMode::Linear)
        .expect("Failed to create texture store");
    let image = gradient(600, 400);

    c.bench_function("texture_store/load_rgba_600x400", |b| {
        b.iter(|| store.load_rgba(black_box(&image)).unwrap());
    });
}

fn bench_load_png_subsampled(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("Failed to create temporary directory");
    let path = dir.path().join("large.png");
    gradient(2048, 1536).save(&path).expect("Failed to write png");

    let backend = Rc::new(NullBackend::new());
    let mut store = TextureStore::new(backend, 512, 512, FilterMode::Linear)
        .expect("Failed to create texture store");

    c.bench_function("texture_store/load_png_2048x1536_into_512", |b| {
        b.iter(|| store.load_image(black_box(&path)).unwrap());
    });
}

criterion_group!(benches, bench_load_rgba, bench_load_png_subsampled);
criterion_main!(benches);
