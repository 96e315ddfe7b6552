mod cell;
pub use self::cell::{UnitCell, CellShape};

mod points;
pub use self::points::PointSet;

#[cfg(test)]
pub(crate) mod test_utils;
