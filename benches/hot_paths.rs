use bizmap::chrome::{fly_padding, safe_margins, PixelRect};
use bizmap::data::RawRecord;
use bizmap::map::Viewport;
use bizmap::registry::Registry;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_projection(c: &mut Criterion) {
    let viewport = Viewport::new(-81.73, 28.80, 14.0, 3.0, 18.0, 400, 200);
    let points: Vec<(f64, f64)> = (0..1000)
        .map(|i| {
            let t = i as f64 / 1000.0;
            (-81.73 + (t - 0.5) * 0.2, 28.80 + (t - 0.5) * 0.1)
        })
        .collect();

    c.bench_function("project_1k_points", |b| {
        b.iter(|| {
            let mut acc = 0i32;
            for &(lon, lat) in &points {
                let (px, py) = viewport.project(black_box(lon), black_box(lat));
                acc = acc.wrapping_add(px).wrapping_add(py);
            }
            acc
        })
    });
}

fn bench_padding(c: &mut Criterion) {
    let obstructions = [
        PixelRect::new(40, 4, 120, 12),
        PixelRect::new(40, 20, 120, 16),
    ];

    c.bench_function("fly_padding", |b| {
        b.iter(|| fly_padding(black_box(400), black_box(240), black_box(36.0)))
    });
    c.bench_function("safe_margins", |b| {
        b.iter(|| safe_margins(black_box(&obstructions)))
    });
}

fn bench_filter(c: &mut Criterion) {
    let records: Vec<RawRecord> = (0..1000)
        .map(|i| {
            [
                ("name".to_string(), format!("Business {i} Coffee")),
                ("category".to_string(), "Retail".to_string()),
                ("latitude".to_string(), format!("28.{:03}", i % 900)),
                ("longitude".to_string(), "-81.73".to_string()),
            ]
            .into_iter()
            .collect()
        })
        .collect();
    let mut registry = Registry::from_records(&records);
    let fields = vec!["name".to_string(), "category".to_string()];

    c.bench_function("filter_1k_listings", |b| {
        b.iter(|| registry.filter_by_term(black_box("coffee"), black_box(&fields)))
    });
}

criterion_group!(benches, bench_projection, bench_padding, bench_filter);
criterion_main!(benches);
