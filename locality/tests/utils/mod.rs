#![allow(dead_code)]

use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use locality::{UnitCell, Vector3D, PointSet};
use locality::{NeighborQuery, AabbQuery, AabbParameters, LinkCell, RawPoints};

/// Create a cubic (or square if `is_2d` is true) cell of side `size`, and
/// `n_points` random points in `[-size/2, size/2)` inside it.
pub fn make_box_and_random_points(size: f64, n_points: usize, is_2d: bool, seed: u64) -> (UnitCell, Vec<Vector3D>) {
    let cell = if is_2d {
        UnitCell::square(size).expect("invalid cell")
    } else {
        UnitCell::cubic(size).expect("invalid cell")
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let points = random_points(&cell, n_points, &mut rng);
    return (cell, points);
}

/// Create `n_points` random points inside `cell`, centered on the origin
pub fn random_points(cell: &UnitCell, n_points: usize, rng: &mut StdRng) -> Vec<Vector3D> {
    let periodic = if cell.is_2d() { 2 } else { 3 };
    return (0..n_points).map(|_| {
        let mut fractional = Vector3D::zero();
        for i in 0..periodic {
            fractional[i] = rng.gen_range(-0.5..0.5);
        }
        cell.cartesian(fractional)
    }).collect();
}

/// Build all the available spatial indexes for the given reference points.
/// The link cell grid uses cells of width `cell_width`.
pub fn all_indexes<'a>(points: PointSet<'a>, cell_width: f64) -> Vec<(&'static str, Box<dyn NeighborQuery + 'a>)> {
    let tiny_leaves = AabbParameters { leaf_size: 1 };
    return vec![
        ("aabb", Box::new(AabbQuery::new(points)) as Box<dyn NeighborQuery + 'a>),
        ("aabb/leaf_size=1", Box::new(AabbQuery::with_parameters(points, &tiny_leaves).expect("invalid parameters"))),
        ("link_cell", Box::new(LinkCell::new(points, cell_width).expect("invalid cell width"))),
        ("link_cell/small", Box::new(LinkCell::new(points, cell_width / 3.0).expect("invalid cell width"))),
        ("raw_points", Box::new(RawPoints::new(points))),
    ];
}

/// Periodic distance between `u` and `v`, computed by looking at all the
/// periodic images of `v` in the neighboring cells.
pub fn brute_force_distance(cell: &UnitCell, u: Vector3D, v: Vector3D) -> f64 {
    let mut wrapped = v - u;
    cell.wrap_vector(&mut wrapped);

    let shifts_z = if cell.is_2d() { 0..=0 } else { -1..=1 };
    let mut distance = f64::INFINITY;
    for na in -1..=1 {
        for nb in -1..=1 {
            for nc in shifts_z.clone() {
                let shift = cell.cartesian(Vector3D::new(na as f64, nb as f64, nc as f64));
                distance = f64::min(distance, (wrapped - shift).norm());
            }
        }
    }
    return distance;
}

/// All pairs `(query point, point)` with a distance strictly smaller than
/// `r_max`, found by checking every pair of points.
pub fn brute_force_ball(
    cell: &UnitCell,
    points: &[Vector3D],
    query_points: &[Vector3D],
    r_max: f64,
    exclude_ii: bool,
) -> BTreeSet<(usize, usize)> {
    let mut pairs = BTreeSet::new();
    for (i, &query) in query_points.iter().enumerate() {
        for (j, &point) in points.iter().enumerate() {
            if exclude_ii && i == j {
                continue;
            }

            if brute_force_distance(cell, query, point) < r_max {
                pairs.insert((i, j));
            }
        }
    }
    return pairs;
}

/// The `k` nearest neighbors of each query point (including all the ties
/// with the k-th neighbor), found by sorting all the distances.
pub fn brute_force_nearest(
    cell: &UnitCell,
    points: &[Vector3D],
    query_points: &[Vector3D],
    k: usize,
    exclude_ii: bool,
) -> BTreeSet<(usize, usize)> {
    let mut pairs = BTreeSet::new();
    for (i, &query) in query_points.iter().enumerate() {
        let mut distances = points.iter()
            .enumerate()
            .filter(|&(j, _)| !(exclude_ii && i == j))
            .map(|(j, &point)| (cell.distance(query, point), j))
            .collect::<Vec<_>>();
        distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        if let Some(&(kth_distance, _)) = distances.get(k - 1).or(distances.last()) {
            for &(distance, j) in &distances {
                if distance <= kth_distance {
                    pairs.insert((i, j));
                }
            }
        }
    }
    return pairs;
}

/// Collect the `(query point, point)` pairs in a sequence of bonds
pub fn pairs(bonds: impl IntoIterator<Item = locality::Bond>) -> BTreeSet<(usize, usize)> {
    bonds.into_iter().map(|bond| (bond.query_point, bond.point)).collect()
}
