use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use crate::Vector3D;
use super::UnitCell;

/// Generate `n` points uniformly distributed inside `cell`, using a random
/// generator seeded with `seed`.
pub fn random_points(cell: &UnitCell, n: usize, seed: u64) -> Vec<Vector3D> {
    let mut rng = StdRng::seed_from_u64(seed);
    let periodic = cell.dimensions();
    return (0..n).map(|_| {
        let mut fractional = Vector3D::zero();
        for i in 0..periodic {
            // also generate points slightly outside of the cell, to check
            // that they are correctly wrapped
            fractional[i] = rng.gen_range(-0.25..1.25);
        }
        cell.cartesian(fractional)
    }).collect();
}

pub fn test_cell(name: &str) -> UnitCell {
    let cell = match name {
        "cube" => UnitCell::cubic(10.0),
        "orthorhombic" => UnitCell::orthorhombic(7.0, 9.0, 12.0),
        "triclinic" => UnitCell::triclinic(8.0, 9.0, 10.0, 80.0, 100.0, 110.0),
        "square" => UnitCell::square(10.0),
        "oblique" => UnitCell::from_tilts(8.0, 6.0, 0.0, 2.5, 0.0, 0.0),
        _ => panic!("unknown test cell {}", name)
    };
    return cell.expect("invalid test cell");
}

/// Four points on a line in a cube of side 10
pub fn points_on_a_line() -> (UnitCell, Vec<Vector3D>) {
    let cell = UnitCell::cubic(10.0).expect("invalid cell");
    let positions = vec![
        Vector3D::new(0.0, 0.0, 0.0),
        Vector3D::new(1.0, 0.0, 0.0),
        Vector3D::new(3.0, 0.0, 0.0),
        Vector3D::new(2.0, 0.0, 0.0),
    ];
    return (cell, positions);
}
