use log::{info, warn};
use ndarray::Array3;

use serde::{Deserialize, Serialize};
use schemars::JsonSchema;

use crate::{Error, PointSet, Vector3D};
use super::NeighborQuery;

/// Maximal number of cells, we need to use this to prevent having too many
/// cells with a small unit cell and a small cell width
const MAX_NUMBER_OF_CELLS: f64 = 1e5;

/// Parameters for the [`LinkCell`] spatial index
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LinkCellParameters {
    /// Minimal width of the cells. Using the largest query cutoff here gives
    /// the best performance for ball queries.
    pub cell_width: f64,
}

/// The link cell spatial index sorts the reference points inside a regular
/// grid of cells covering the unit cell.
///
/// The grid is aligned with the lattice vectors, and the cells are at least
/// `cell_width` wide in all periodic directions. Candidates for a query are
/// found in all the cells overlapping with the slab of width `2 * radius`
/// centered on the query position, in each lattice direction.
#[derive(Debug, Clone)]
pub struct LinkCell<'a> {
    points: PointSet<'a>,
    /// requested minimal width of the cells
    cell_width: f64,
    /// actual width of the cells along each lattice direction
    widths: Vector3D,
    /// the cells themselves, containing the indexes of the points
    cells: Array3<Vec<usize>>,
}

impl<'a> LinkCell<'a> {
    /// Create a new `LinkCell` for the given reference `points`, using cells
    /// at least `cell_width` wide.
    #[time_graph::instrument(name = "LinkCell::new")]
    pub fn new(points: PointSet<'a>, cell_width: f64) -> Result<LinkCell<'a>, Error> {
        if !(cell_width > 0.0 && cell_width.is_finite()) {
            return Err(Error::Configuration(format!(
                "cell_width must be a positive number, got {}", cell_width
            )));
        }

        let cell = points.cell();
        let distances_between_faces = cell.distances_between_faces();

        let mut n_cells = [1.0; 3];
        for i in 0..cell.dimensions() {
            n_cells[i] = f64::max(f64::trunc(distances_between_faces[i] / cell_width), 1.0);
        }

        // limit memory consumption by ensuring we have less than
        // `MAX_NUMBER_OF_CELLS` cells to look though
        let n_cells_total = n_cells[0] * n_cells[1] * n_cells[2];
        if n_cells_total > MAX_NUMBER_OF_CELLS {
            // set the total number of cells close to MAX_NUMBER_OF_CELLS, while
            // keeping roughly the ratio of cells in each direction
            let ratio_x_y = n_cells[0] / n_cells[1];
            if cell.is_2d() {
                n_cells[1] = f64::max(f64::trunc(f64::sqrt(MAX_NUMBER_OF_CELLS / ratio_x_y)), 1.0);
            } else {
                let ratio_y_z = n_cells[1] / n_cells[2];
                n_cells[2] = f64::max(f64::trunc(f64::cbrt(MAX_NUMBER_OF_CELLS / (ratio_x_y * ratio_y_z * ratio_y_z))), 1.0);
                n_cells[1] = f64::max(f64::trunc(ratio_y_z * n_cells[2]), 1.0);
            }
            n_cells[0] = f64::max(f64::trunc(ratio_x_y * n_cells[1]), 1.0);

            warn!(
                "too many cells ({}) for cell_width={} in the link cell grid, using a {}x{}x{} grid instead",
                n_cells_total, cell_width, n_cells[0], n_cells[1], n_cells[2]
            );
        }

        let n_cells = [n_cells[0] as usize, n_cells[1] as usize, n_cells[2] as usize];
        if (0..cell.dimensions()).any(|i| n_cells[i] < 3) {
            info!(
                "the link cell grid only has {}x{}x{} cells, some neighboring cells will be the same",
                n_cells[0], n_cells[1], n_cells[2]
            );
        }

        let mut widths = Vector3D::zero();
        for i in 0..3 {
            widths[i] = distances_between_faces[i] / n_cells[i] as f64;
        }

        let mut link_cell = LinkCell {
            points: points,
            cell_width: cell_width,
            widths: widths,
            cells: Array3::from_elem(n_cells, Default::default()),
        };

        for (index, &position) in points.positions().iter().enumerate() {
            let cell_index = link_cell.cell_index(position);
            link_cell.cells[cell_index].push(index);
        }

        return Ok(link_cell);
    }

    /// Create a new `LinkCell` using the given `parameters`
    pub fn with_parameters(points: PointSet<'a>, parameters: &LinkCellParameters) -> Result<LinkCell<'a>, Error> {
        LinkCell::new(points, parameters.cell_width)
    }

    /// Get the minimal cell width used to create this grid
    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    /// Get the number of cells along each lattice vector
    pub fn n_cells(&self) -> [usize; 3] {
        let shape = self.cells.shape();
        return [shape[0], shape[1], shape[2]];
    }

    /// Get the index of the cell containing `position`, wrapping it inside the
    /// unit cell if required
    pub fn cell_index(&self, position: Vector3D) -> [usize; 3] {
        let n_cells = self.n_cells();
        let cell = self.points.cell();
        let fractional = cell.fractional(position);

        let mut cell_index = [0; 3];
        for i in 0..cell.dimensions() {
            let wrapped = fractional[i] - f64::floor(fractional[i]);
            // `wrapped` can be exactly 1 because of rounding
            cell_index[i] = usize::min(f64::floor(wrapped * n_cells[i] as f64) as usize, n_cells[i] - 1);
        }
        return cell_index;
    }

    /// Get the indexes of the points inside the cell at `cell_index`
    pub fn points_in_cell(&self, cell_index: [usize; 3]) -> &[usize] {
        &self.cells[cell_index]
    }

    /// Get the list of all cells within `rings` cells of the one at
    /// `cell_index`, including itself, taking periodic boundary conditions
    /// into account. Each cell is only included once, even if the grid is too
    /// small to have `2 * rings + 1` distinct cells in some direction.
    pub fn cell_neighbors(&self, cell_index: [usize; 3], rings: usize) -> Vec<[usize; 3]> {
        let n_cells = self.n_cells();
        let rings = i64::try_from(rings).unwrap_or(i64::MAX);

        let mut ranges: [Vec<usize>; 3] = Default::default();
        for i in 0..3 {
            let center = cell_index[i] as i64;
            ranges[i] = periodic_range(center.saturating_sub(rings), center.saturating_add(rings), n_cells[i]);
        }

        let mut neighbors = Vec::with_capacity(ranges.iter().map(Vec::len).product());
        for &i in &ranges[0] {
            for &j in &ranges[1] {
                for &k in &ranges[2] {
                    neighbors.push([i, j, k]);
                }
            }
        }
        return neighbors;
    }
}

/// Get the indexes of the cells from `first` to `last` (included) in a
/// periodic direction containing `n_cells` cells, each cell at most once
fn periodic_range(first: i64, last: i64, n_cells: usize) -> Vec<usize> {
    if last.saturating_sub(first).saturating_add(1) >= n_cells as i64 {
        return (0..n_cells).collect();
    }
    return (first..=last).map(|cell| modulo(cell, n_cells)).collect();
}

/// Get the remainder of the division of `a` by `b`, with the same sign as `b`
fn modulo(a: i64, b: usize) -> usize {
    debug_assert!(b < (i64::MAX as usize));
    return a.rem_euclid(b as i64) as usize;
}

impl<'a> NeighborQuery for LinkCell<'a> {
    fn points(&self) -> PointSet<'_> {
        self.points
    }

    fn as_dyn(&self) -> &dyn NeighborQuery {
        self
    }

    fn candidates(&self, position: Vector3D, radius: f64, candidates: &mut Vec<usize>) {
        candidates.clear();
        if self.points.is_empty() {
            return;
        }

        let n_cells = self.n_cells();
        let cell = self.points.cell();
        let fractional = cell.fractional(position);

        // range of cells overlapping with the slab [s - R/D, s + R/D] around
        // the fractional coordinate s of the position, in each direction
        let mut ranges: [Vec<usize>; 3] = [vec![0], vec![0], vec![0]];
        for i in 0..cell.dimensions() {
            let wrapped = fractional[i] - f64::floor(fractional[i]);
            let center = wrapped * n_cells[i] as f64;
            let extent = radius / self.widths[i];
            let first = f64::floor(center - extent) as i64;
            let last = f64::floor(center + extent) as i64;
            ranges[i] = periodic_range(first, last, n_cells[i]);
        }

        for &i in &ranges[0] {
            for &j in &ranges[1] {
                for &k in &ranges[2] {
                    candidates.extend_from_slice(&self.cells[[i, j, k]]);
                }
            }
        }
    }

    fn initial_search_radius(&self, _: usize) -> f64 {
        // search ring by ring, starting with the direct neighbors
        let cell = self.points.cell();
        return (0..cell.dimensions())
            .map(|i| self.widths[i])
            .fold(f64::INFINITY, f64::min);
    }
}
