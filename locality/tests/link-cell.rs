use std::collections::BTreeSet;

use locality::{LinkCell, PointSet, UnitCell, Vector3D};

mod utils;
use utils::make_box_and_random_points;

#[test]
fn unique_neighbors() {
    let cell = UnitCell::cubic(10.0).unwrap();
    let positions = [Vector3D::zero()];
    let points = PointSet::new(&cell, &positions).unwrap();
    let link_cell = LinkCell::new(points, 3.0).unwrap();

    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                let neighbors = link_cell.cell_neighbors([i, j, k], 1);
                let unique = neighbors.iter().collect::<BTreeSet<_>>();
                assert_eq!(unique.len(), 27, "cell {:?} does not have 27 unique neighbors", [i, j, k]);
                assert_eq!(neighbors.len(), 27);
            }
        }
    }
}

#[test]
fn cell_neighbors_across_boundaries() {
    let cell = UnitCell::cubic(31.0).unwrap();
    let positions = [Vector3D::new(-5.0, 0.0, 0.0), Vector3D::new(2.05, 0.0, 0.0)];
    let points = PointSet::new(&cell, &positions).unwrap();
    let link_cell = LinkCell::new(points, 3.0).unwrap();
    assert_eq!(link_cell.n_cells(), [10, 10, 10]);

    let cell_0 = link_cell.cell_index(positions[0]);
    let cell_1 = link_cell.cell_index(positions[1]);
    assert_eq!(cell_0, [8, 0, 0]);
    assert_eq!(cell_1, [0, 0, 0]);
    assert_eq!(link_cell.points_in_cell(cell_0), [0]);
    assert_eq!(link_cell.points_in_cell(cell_1), [1]);

    let neighbors_0 = link_cell.cell_neighbors(cell_0, 1);
    let neighbors_1 = link_cell.cell_neighbors(cell_1, 1);
    assert_eq!(neighbors_0.contains(&cell_1), neighbors_1.contains(&cell_0));
    assert!(!neighbors_0.contains(&cell_1));

    // with two rings, the cells are neighbors through the periodic boundary
    let neighbors_0 = link_cell.cell_neighbors(cell_0, 2);
    let neighbors_1 = link_cell.cell_neighbors(cell_1, 2);
    assert!(neighbors_0.contains(&cell_1));
    assert!(neighbors_1.contains(&cell_0));
}

#[test]
fn symmetric() {
    let (cell, positions) = make_box_and_random_points(10.0, 40, false, 0);
    let points = PointSet::new(&cell, &positions).unwrap();
    let link_cell = LinkCell::new(points, 2.0).unwrap();

    let mut neighbors_ij = BTreeSet::new();
    for (i, &position) in positions.iter().enumerate() {
        for neighbor in link_cell.cell_neighbors(link_cell.cell_index(position), 1) {
            for &j in link_cell.points_in_cell(neighbor) {
                neighbors_ij.insert((i, j));
            }
        }
    }

    let neighbors_ji = neighbors_ij.iter().map(|&(i, j)| (j, i)).collect::<BTreeSet<_>>();
    assert_eq!(neighbors_ij, neighbors_ji);
}

#[test]
fn all_points_are_in_a_cell() {
    let (cell, positions) = make_box_and_random_points(10.0, 500, true, 2);
    let points = PointSet::new(&cell, &positions).unwrap();
    let link_cell = LinkCell::new(points, 1.3).unwrap();
    let n_cells = link_cell.n_cells();
    assert_eq!(n_cells, [7, 7, 1]);

    let mut all_points = Vec::new();
    for i in 0..n_cells[0] {
        for j in 0..n_cells[1] {
            for &point in link_cell.points_in_cell([i, j, 0]) {
                assert_eq!(link_cell.cell_index(positions[point]), [i, j, 0]);
                all_points.push(point);
            }
        }
    }

    all_points.sort_unstable();
    assert_eq!(all_points, (0..500).collect::<Vec<_>>());
}
