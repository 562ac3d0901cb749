use arimgproc_rust::{cluster_image, default_config, ClusterConfig};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};

fn generate_image(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        let v = x.wrapping_mul(2654435761) ^ y.wrapping_mul(2246822519);
        Rgba([(v >> 3) as u8, (v >> 11) as u8, (v >> 19) as u8, 255])
    })
}

fn bench(c: &mut Criterion) {
    let img = generate_image(256, 256);
    let max_threads = num_cpus::get().max(1);
    let mut thread_counts: Vec<usize> = [1, 2, 4, max_threads]
        .into_iter()
        .filter(|&t| t <= max_threads)
        .collect();
    // criterion rejects repeated ids within a group
    thread_counts.sort_unstable();
    thread_counts.dedup();

    for k in [3usize, 6, 15] {
        let mut group = c.benchmark_group(format!("kmeans/k{k}"));
        group.sample_size(10);
        for &threads in &thread_counts {
            group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
                b.iter_with_large_drop(|| {
                    let cfg = ClusterConfig { num_threads: threads, seed: Some(314159), ..default_config(k) };
                    cluster_image(&img, cfg)
                })
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench);
criterion_main!(benches);
