use crate::{Error, Vector3D};
use super::UnitCell;

/// A `PointSet` is an immutable view over a set of positions, together with
/// the periodic cell in which they live.
///
/// Point sets are the common currency of this crate: spatial indexes are
/// built over a reference `PointSet`, and queried with the positions of
/// another (or the same) set of points.
#[derive(Debug, Clone, Copy)]
pub struct PointSet<'a> {
    cell: &'a UnitCell,
    positions: &'a [Vector3D],
}

impl<'a> PointSet<'a> {
    /// Create a new `PointSet` for the given `positions` inside `cell`.
    ///
    /// This checks that all positions are finite, and that positions in a
    /// two-dimensional cell have a zero z coordinate.
    pub fn new(cell: &'a UnitCell, positions: &'a [Vector3D]) -> Result<PointSet<'a>, Error> {
        for (i, position) in positions.iter().enumerate() {
            if !position.is_finite() {
                return Err(Error::Geometry(format!(
                    "position of point {} is not finite: {:?}", i, position
                )));
            }

            if cell.is_2d() && position[2] != 0.0 {
                return Err(Error::Geometry(format!(
                    "point {} has a non-zero z coordinate ({}) in a 2D cell",
                    i, position[2]
                )));
            }
        }

        Ok(PointSet { cell, positions })
    }

    /// Get the unit cell of this point set
    pub fn cell(&self) -> &'a UnitCell {
        self.cell
    }

    /// Get the positions of all points in this set
    pub fn positions(&self) -> &'a [Vector3D] {
        self.positions
    }

    /// Get the number of points in this set
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Is this set empty?
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl<'a> std::ops::Index<usize> for PointSet<'a> {
    type Output = Vector3D;

    fn index(&self, index: usize) -> &Vector3D {
        &self.positions[index]
    }
}
