//! The `UnitCell` type represents the periodic simulation box in which the
//! points live, in two or three dimensions.
use std::f64;

use crate::{Error, Matrix3, Vector3D};

/// The shape of a cell determine how we will be able to compute the periodic
/// boundaries condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub enum CellShape {
    /// Orthorhombic unit cell, with cuboid shape
    Orthorhombic,
    /// Triclinic unit cell, with arbitrary parallelepiped shape
    Triclinic,
}

/// An `UnitCell` defines the periodic boundaries of a system.
///
/// The cell is defined by three lattice vectors `a`, `b` and `c`, stored as
/// the rows of the cell matrix. Two-dimensional cells only have two periodic
/// lattice vectors (`a` and `b`, both in the xy plane); their third vector is
/// fixed to the unit vector along z and no periodicity is ever applied along
/// this direction.
///
/// A cell is immutable once created, and always has a strictly positive
/// volume (area in 2D).
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub struct UnitCell {
    /// Unit cell matrix
    matrix: Matrix3,
    /// Transpose of the unit cell matrix, cached from matrix
    transpose: Matrix3,
    /// Inverse of the transpose of the unit cell matrix, cached from matrix
    inverse: Matrix3,
    /// Unit cell shape
    shape: CellShape,
    /// Is this a two-dimensional cell?
    two_dimensional: bool,
}

impl TryFrom<Matrix3> for UnitCell {
    type Error = Error;

    fn try_from(matrix: Matrix3) -> Result<UnitCell, Error> {
        UnitCell::from_matrix(matrix, false)
    }
}

fn check_lengths(lengths: &[f64]) -> Result<(), Error> {
    if lengths.iter().all(|&l| l > 0.0 && l.is_finite()) {
        Ok(())
    } else {
        Err(Error::Geometry(format!(
            "cell lengths must be positive, got {:?}", lengths
        )))
    }
}

impl UnitCell {
    fn from_matrix(mut matrix: Matrix3, two_dimensional: bool) -> Result<UnitCell, Error> {
        if two_dimensional {
            if matrix[0][2] != 0.0 || matrix[1][2] != 0.0 {
                return Err(Error::Geometry(
                    "the lattice vectors of a 2D cell must be in the xy plane".into()
                ));
            }
            matrix[2] = [0.0, 0.0, 1.0];
        }

        // the volume is compared to the volume of a cuboid with the same
        // lengths, so that the check does not depend on the unit of length
        let lengths = [
            Vector3D::from(matrix[0]).norm(),
            Vector3D::from(matrix[1]).norm(),
            Vector3D::from(matrix[2]).norm(),
        ];
        let determinant = matrix.determinant();
        let relative_volume = determinant / (lengths[0] * lengths[1] * lengths[2]);
        if !determinant.is_finite() || !(relative_volume > 1e-10) {
            return Err(Error::Geometry(format!(
                "cell matrix is not invertible or left-handed (determinant is {})",
                determinant
            )));
        }

        let largest_length = f64::max(lengths[0], f64::max(lengths[1], lengths[2]));
        let is_close_0 = |value| f64::abs(value) < 1e-12 * largest_length;
        let is_diagonal = |matrix: Matrix3| {
            is_close_0(matrix[0][1]) && is_close_0(matrix[0][2]) &&
            is_close_0(matrix[1][0]) && is_close_0(matrix[1][2]) &&
            is_close_0(matrix[2][0]) && is_close_0(matrix[2][1])
        };

        let shape = if is_diagonal(matrix) {
            CellShape::Orthorhombic
        } else {
            CellShape::Triclinic
        };

        return Ok(UnitCell {
            matrix: matrix,
            transpose: matrix.transposed(),
            inverse: matrix.transposed().inverse(),
            shape: shape,
            two_dimensional: two_dimensional,
        });
    }

    /// Create an orthorhombic unit cell, with side lengths `a, b, c`.
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Result<UnitCell, Error> {
        check_lengths(&[a, b, c])?;
        let matrix = Matrix3::new([
            [a, 0.0, 0.0],
            [0.0, b, 0.0],
            [0.0, 0.0, c]
        ]);
        UnitCell::from_matrix(matrix, false)
    }

    /// Create a cubic unit cell, with side lengths `length, length, length`.
    pub fn cubic(length: f64) -> Result<UnitCell, Error> {
        UnitCell::orthorhombic(length, length, length)
    }

    /// Create a two-dimensional rectangular cell, with side lengths `a, b`.
    pub fn rectangle(a: f64, b: f64) -> Result<UnitCell, Error> {
        check_lengths(&[a, b])?;
        let matrix = Matrix3::new([
            [a, 0.0, 0.0],
            [0.0, b, 0.0],
            [0.0, 0.0, 1.0]
        ]);
        UnitCell::from_matrix(matrix, true)
    }

    /// Create a two-dimensional square cell, with side lengths `length, length`.
    pub fn square(length: f64) -> Result<UnitCell, Error> {
        UnitCell::rectangle(length, length)
    }

    /// Create a triclinic unit cell, with side lengths `a, b, c` and angles
    /// `alpha, beta, gamma` (in degrees).
    pub fn triclinic(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Result<UnitCell, Error> {
        check_lengths(&[a, b, c])?;
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let (sin_gamma, cos_gamma) = gamma.to_radians().sin_cos();

        let b_x = b * cos_gamma;
        let b_y = b * sin_gamma;

        let c_x = c * cos_beta;
        let c_y = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c_z = f64::sqrt(c * c - c_y * c_y - c_x * c_x);

        return UnitCell::from_matrix(Matrix3::new([
            [a,   0.0, 0.0],
            [b_x, b_y, 0.0],
            [c_x, c_y, c_z],
        ]), false);
    }

    /// Create a cell from its lengths and tilt factors, following the
    /// convention used by LAMMPS and HOOMD-blue: the lattice vectors are
    /// `(lx, 0, 0)`, `(xy ly, ly, 0)` and `(xz lz, yz lz, lz)`.
    ///
    /// Setting `lz` to 0 creates a two-dimensional cell, in which case `xz`
    /// and `yz` must also be 0.
    pub fn from_tilts(lx: f64, ly: f64, lz: f64, xy: f64, xz: f64, yz: f64) -> Result<UnitCell, Error> {
        if lz == 0.0 {
            check_lengths(&[lx, ly])?;
            if xz != 0.0 || yz != 0.0 {
                return Err(Error::Geometry(
                    "xz and yz tilt factors must be 0 for a 2D cell".into()
                ));
            }

            return UnitCell::from_matrix(Matrix3::new([
                [lx,      0.0, 0.0],
                [xy * ly, ly,  0.0],
                [0.0,     0.0, 1.0],
            ]), true);
        }

        check_lengths(&[lx, ly, lz])?;
        return UnitCell::from_matrix(Matrix3::new([
            [lx,      0.0,     0.0],
            [xy * ly, ly,      0.0],
            [xz * lz, yz * lz, lz],
        ]), false);
    }

    /// Get the cell shape
    pub fn shape(&self) -> CellShape {
        self.shape
    }

    /// Is this a two-dimensional cell?
    pub fn is_2d(&self) -> bool {
        self.two_dimensional
    }

    /// Get the number of periodic dimensions of this cell, 2 or 3
    pub fn dimensions(&self) -> usize {
        if self.two_dimensional { 2 } else { 3 }
    }

    /// Get the first length of the cell (i.e. the norm of the first vector of
    /// the cell)
    pub fn a(&self) -> f64 {
        match self.shape {
            CellShape::Triclinic => self.a_vector().norm(),
            CellShape::Orthorhombic => self.matrix[0][0],
        }
    }

    /// Get the second length of the cell (i.e. the norm of the second vector of
    /// the cell)
    pub fn b(&self) -> f64 {
        match self.shape {
            CellShape::Triclinic => self.b_vector().norm(),
            CellShape::Orthorhombic => self.matrix[1][1],
        }
    }

    /// Get the third length of the cell (i.e. the norm of the third vector of
    /// the cell). This is always 1 for two-dimensional cells.
    pub fn c(&self) -> f64 {
        match self.shape {
            CellShape::Triclinic => self.c_vector().norm(),
            CellShape::Orthorhombic => self.matrix[2][2],
        }
    }

    /// Get the distances between faces of the unit cell
    pub fn distances_between_faces(&self) -> Vector3D {
        let (a, b, c) = (self.a_vector(), self.b_vector(), self.c_vector());
        // Plans normal vectors
        let na = (b ^ c).normalized();
        let nb = (c ^ a).normalized();
        let nc = (a ^ b).normalized();

        Vector3D::new(f64::abs(na * a), f64::abs(nb * b), f64::abs(nc * c))
    }

    /// Get the smallest distance between two periodic images of the same
    /// point, only considering the periodic directions. Any sphere with a
    /// radius smaller than half this distance contains at most one image of
    /// each point.
    pub fn nearest_plane_distance(&self) -> f64 {
        let distances = self.distances_between_faces();
        (0..self.dimensions())
            .map(|i| distances[i])
            .fold(f64::INFINITY, f64::min)
    }

    /// Get the largest norm a vector returned by [`UnitCell::vector_image`]
    /// can have, i.e. the distance from the center of the cell to its farthest
    /// corner. A sphere of this radius around any point contains at least one
    /// image of every other point.
    pub fn max_image_distance(&self) -> f64 {
        let mut max_distance2 = 0.0;
        for &x in &[-0.5, 0.5] {
            for &y in &[-0.5, 0.5] {
                let z = if self.two_dimensional { 0.0 } else { 0.5 };
                let corner = self.cartesian(Vector3D::new(x, y, z));
                max_distance2 = f64::max(max_distance2, corner.norm2());
            }
        }
        return f64::sqrt(max_distance2);
    }

    /// Get the first angle of the cell
    pub fn alpha(&self) -> f64 {
        match self.shape {
            CellShape::Triclinic => angle(self.b_vector(), self.c_vector()).to_degrees(),
            CellShape::Orthorhombic => 90.0,
        }
    }

    /// Get the second angle of the cell
    pub fn beta(&self) -> f64 {
        match self.shape {
            CellShape::Triclinic => angle(self.a_vector(), self.c_vector()).to_degrees(),
            CellShape::Orthorhombic => 90.0,
        }
    }

    /// Get the third angle of the cell
    pub fn gamma(&self) -> f64 {
        match self.shape {
            CellShape::Triclinic => angle(self.a_vector(), self.b_vector()).to_degrees(),
            CellShape::Orthorhombic => 90.0,
        }
    }

    /// Get the volume of the cell. For two-dimensional cells, this is the
    /// area of the cell.
    pub fn volume(&self) -> f64 {
        match self.shape {
            CellShape::Orthorhombic => self.a() * self.b() * self.c(),
            CellShape::Triclinic => {
                // The volume is the mixed product of the three cell vectors
                let a = self.a_vector();
                let b = self.b_vector();
                let c = self.c_vector();
                a * (b ^ c)
            }
        }
    }

    /// Get the matricial representation of the unit cell
    pub fn matrix(&self) -> Matrix3 {
        self.matrix
    }

    /// Get the first vector of the cell
    pub fn a_vector(&self) -> Vector3D {
        self.matrix[0].into()
    }

    /// Get the second vector of the cell
    pub fn b_vector(&self) -> Vector3D {
        self.matrix[1].into()
    }

    /// Get the third vector of the cell
    pub fn c_vector(&self) -> Vector3D {
        self.matrix[2].into()
    }
}

/// Geometric operations using periodic boundary conditions
impl UnitCell {
    /// Wrap a vector in the unit cell, obeying the periodic boundary conditions.
    /// For a cubic cell of side length `L`, this produce a vector with all
    /// components in `[0, L)`.
    pub fn wrap_vector(&self, vector: &mut Vector3D) {
        let n_periodic = self.dimensions();
        match self.shape {
            CellShape::Orthorhombic => {
                for i in 0..n_periodic {
                    let length = self.matrix[i][i];
                    vector[i] -= f64::floor(vector[i] / length) * length;
                }
            }
            CellShape::Triclinic => {
                let mut fractional = self.fractional(*vector);
                for i in 0..n_periodic {
                    fractional[i] -= f64::floor(fractional[i]);
                }
                *vector = self.cartesian(fractional);
            }
        }
    }

    /// Find the image of a vector in the unit cell, obeying the periodic
    /// boundary conditions. For a cubic cell of side length `L`, this produce a
    /// vector with all components in `[-L/2, L/2]`.
    ///
    /// This is an odd function: the image of `-v` is exactly the opposite of
    /// the image of `v`, which makes distances computed from `u` to `v` and
    /// from `v` to `u` bitwise identical.
    pub fn vector_image(&self, vector: &mut Vector3D) {
        let n_periodic = self.dimensions();
        match self.shape {
            CellShape::Orthorhombic => {
                for i in 0..n_periodic {
                    let length = self.matrix[i][i];
                    vector[i] -= f64::round(vector[i] / length) * length;
                }
            }
            CellShape::Triclinic => {
                let mut fractional = self.fractional(*vector);
                for i in 0..n_periodic {
                    fractional[i] -= f64::round(fractional[i]);
                }
                *vector = self.cartesian(fractional);
            }
        }
    }

    /// Get the fractional representation of the `vector` in this cell
    pub fn fractional(&self, vector: Vector3D) -> Vector3D {
        // this needs to use the inverse of the transpose of the matrix, since
        // the lattice vectors are stored as rows
        return self.inverse * vector;
    }

    /// Get the Cartesian representation of the `fractional` vector in this
    /// cell
    pub fn cartesian(&self, fractional: Vector3D) -> Vector3D {
        return self.transpose * fractional;
    }

    /// Periodic boundary conditions squared distance between the point `u` and
    /// the point `v`
    pub fn distance2(&self, u: Vector3D, v: Vector3D) -> f64 {
        let mut d = v - u;
        self.vector_image(&mut d);
        return d.norm2();
    }

    /// Periodic boundary conditions distance between the point `u` and
    /// the point `v`
    pub fn distance(&self, u: Vector3D, v: Vector3D) -> f64 {
        return f64::sqrt(self.distance2(u, v));
    }
}

/// Get the angles between the vectors `u` and `v`.
fn angle(u: Vector3D, v: Vector3D) -> f64 {
    let un = u.normalized();
    let vn = v.normalized();
    f64::acos(un * vn)
}
