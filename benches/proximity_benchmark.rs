use criterion::{criterion_group, criterion_main, Criterion};
use geo::Point;
use std::hint::black_box;
use tour_tracker::services::proximity::{
    first_within_radius, nearest_keypoint, PROXIMITY_RADIUS_METERS,
};
use tour_tracker::services::TourCatalog;

fn benchmark_keypoint_scan(c: &mut Criterion) {
    let tours = TourCatalog::load_from_file("data/tours.geojson").expect("Failed to load tours");
    let tour = tours
        .iter()
        .max_by_key(|t| t.total_keypoints())
        .expect("Catalog is empty");

    let first = &tour.keypoints[0];
    let at_first = Point::new(first.longitude, first.latitude);
    // Shift five degrees east: nothing in range, every keypoint is scanned
    let far_away = Point::new(first.longitude + 5.0, first.latitude);

    let mut group = c.benchmark_group("keypoint_scan");

    group.bench_function("first_keypoint_in_range", |b| {
        b.iter(|| {
            first_within_radius(
                black_box(at_first),
                &tour.keypoints,
                PROXIMITY_RADIUS_METERS,
                |_| false,
            )
        })
    });

    group.bench_function("nothing_in_range", |b| {
        b.iter(|| {
            first_within_radius(
                black_box(far_away),
                &tour.keypoints,
                PROXIMITY_RADIUS_METERS,
                |_| false,
            )
        })
    });

    group.bench_function("nearest_keypoint", |b| {
        b.iter(|| nearest_keypoint(black_box(far_away), &tour.keypoints, |_| false))
    });

    group.finish();
}

criterion_group!(benches, benchmark_keypoint_scan);
criterion_main!(benches);
