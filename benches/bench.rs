// Criterion benchmarks for the LuxeLink matcher

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use luxelink_agent::core::{similarity::partial_ratio, Matcher};
use luxelink_agent::models::{Listing, SearchProfile, VehicleCriterion};

const MAKES: [(&str, &str); 6] = [
    ("Ferrari", "F40"),
    ("Porsche", "911 GT3"),
    ("Lamborghini", "Countach"),
    ("Toyota", "Supra"),
    ("Nissan", "Skyline GT-R"),
    ("Honda", "NSX"),
];

fn create_listing(id: usize) -> Listing {
    let (make, model) = MAKES[id % MAKES.len()];
    Listing {
        external_id: format!("bench-{}", id),
        source: "bench".to_string(),
        url: format!("https://dealer.example/{}", id),
        title: format!("{} {} {} manual, {} owners", 1990 + (id % 30), make, model, id % 4 + 1),
        make: if id % 3 == 0 { None } else { Some(make.to_string()) },
        model: Some(model.to_string()),
        year: Some(1990 + (id % 30) as i32),
        price: Some(40_000.0 + (id % 50) as f64 * 5_000.0),
        mileage: Some((id % 80) as u32 * 1_000),
        location: None,
        raw: serde_json::Value::Null,
    }
}

fn create_profile() -> SearchProfile {
    SearchProfile::vehicles(vec![
        VehicleCriterion::new("Ferrari", "F40"),
        VehicleCriterion::new("Porsche", "911").with_years(Some(2015), None),
        VehicleCriterion::new("Toyota", "Supra").with_years(Some(1993), Some(1998)),
    ])
    .with_price_max(250_000.0)
    .with_exclude_keywords(&["salvage", "rebuilt"])
    .with_features_any(&["manual", "carbon"])
}

fn bench_partial_ratio(c: &mut Criterion) {
    c.bench_function("partial_ratio_substring", |b| {
        b.iter(|| partial_ratio(black_box("porsche"), black_box("2021 Porsche 911 GT3 Touring")));
    });

    c.bench_function("partial_ratio_sliding", |b| {
        b.iter(|| partial_ratio(black_box("Lamborghini"), black_box("1988 Lamborghine Countach 5000 QV")));
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let matcher = Matcher::default();
    let profile = create_profile();
    let flat = SearchProfile::flat(&["Toyota"], &["Supra"]).with_price_max(50_000.0);
    let listing = create_listing(3);

    c.bench_function("evaluate_vehicles", |b| {
        b.iter(|| matcher.evaluate(black_box(&listing), black_box(&profile)));
    });

    c.bench_function("evaluate_flat", |b| {
        b.iter(|| matcher.evaluate(black_box(&listing), black_box(&flat)));
    });
}

fn bench_rank_matches(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_matches");
    let matcher = Matcher::default();
    let profile = create_profile();

    for size in [100, 1000, 5000].iter() {
        let listings: Vec<Listing> = (0..*size).map(create_listing).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| matcher.rank_matches(black_box(&profile), black_box(listings.clone())));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_partial_ratio, bench_evaluate, bench_rank_matches);
criterion_main!(benches);
