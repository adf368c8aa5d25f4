use aerocal_checkerboard::{normalize_locally, SymmetryDetector};
use aerocal_core::GrayImage;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn checkerboard(width: usize, height: usize, cell: usize) -> GrayImage {
    let mut img = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            img.data[y * width + x] = if (x / cell + y / cell) % 2 == 0 { 40 } else { 210 };
        }
    }
    img
}

fn bench_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("symmetry_response");
    group.sample_size(10);
    let sizes = vec![(320, 240), (640, 480)];

    for (width, height) in sizes {
        let img = checkerboard(width, height, 40);
        let id = format!("{}x{}", width, height);
        for kernel_size in [31usize, 101] {
            let detector = SymmetryDetector::new(2, kernel_size, 40.0);
            group.bench_with_input(
                BenchmarkId::new(format!("k{kernel_size}"), &id),
                &img,
                |b, i| b.iter(|| detector.compute_response(black_box(&i.view()))),
            );
        }
        let response = SymmetryDetector::new(2, 101, 40.0).compute_response(&img.view());
        group.bench_with_input(BenchmarkId::new("normalize", &id), &response, |b, r| {
            b.iter(|| normalize_locally(black_box(r), 250))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_response);
criterion_main!(benches);
