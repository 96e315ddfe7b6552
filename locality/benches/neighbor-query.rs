use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use locality::{UnitCell, Vector3D, PointSet, QueryArgs};
use locality::{NeighborQuery, AabbQuery, LinkCell};

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn random_points(cell: &UnitCell, n_points: usize, seed: u64) -> Vec<Vector3D> {
    let mut rng = StdRng::seed_from_u64(seed);
    return (0..n_points).map(|_| {
        let fractional = Vector3D::new(rng.gen(), rng.gen(), rng.gen());
        cell.cartesian(fractional)
    }).collect();
}

/// Cubic cell containing `n_points` at roughly the density of liquid water
fn setup(n_points: usize) -> (UnitCell, Vec<Vector3D>) {
    let size = f64::cbrt(n_points as f64 / 0.1);
    let cell = UnitCell::cubic(size).expect("invalid cell");
    let points = random_points(&cell, n_points, 0xBEEF);
    return (cell, points);
}

fn build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build spatial index");
    group.noise_threshold(0.05);

    for &n_points in black_box(&[1000, 10_000]) {
        let (cell, positions) = setup(n_points);
        let points = PointSet::new(&cell, &positions).expect("invalid points");

        group.bench_with_input(BenchmarkId::new("aabb", n_points), &points, |b, &points| b.iter(|| {
            AabbQuery::new(points)
        }));

        group.bench_with_input(BenchmarkId::new("link_cell", n_points), &points, |b, &points| b.iter(|| {
            LinkCell::new(points, 3.0).expect("failed to build link cell")
        }));
    }
}

fn query(c: &mut Criterion, name: &str, args: &QueryArgs) {
    let mut group = c.benchmark_group(name);
    group.noise_threshold(0.05);

    for &n_points in black_box(&[1000, 10_000]) {
        let (cell, positions) = setup(n_points);
        let points = PointSet::new(&cell, &positions).expect("invalid points");

        let indexes: [(&str, Box<dyn NeighborQuery + '_>); 2] = [
            ("aabb", Box::new(AabbQuery::new(points))),
            ("link_cell", Box::new(LinkCell::new(points, 3.0).expect("failed to build link cell"))),
        ];

        for (index_name, index) in &indexes {
            group.bench_function(BenchmarkId::new(*index_name, n_points), |b| b.iter(|| {
                let result = index.query(&positions, args).expect("failed to run query");
                result.to_neighbor_list()
            }));
        }
    }
}

fn ball_query(c: &mut Criterion) {
    query(c, "ball query (r_max = 3)", &QueryArgs::ball(3.0).with_exclude_ii(true));
}

fn nearest_query(c: &mut Criterion) {
    query(c, "nearest query (k = 12)", &QueryArgs::nearest(12).with_exclude_ii(true));
}

criterion_group!(benches, build, ball_query, nearest_query);
criterion_main!(benches);
