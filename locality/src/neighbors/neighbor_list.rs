use crate::{Error, Vector3D};
use super::Bond;

/// A materialized set of bonds between query points and reference points.
///
/// Bonds are sorted by query point and then by reference point, and each
/// (query point, reference point) pair appears at most once. Data for the
/// bonds is stored in parallel arrays, which can be accessed directly.
#[derive(Debug, Clone)]
pub struct NeighborList {
    /// number of query points
    num_query_points: usize,
    /// number of reference points
    num_points: usize,
    /// index of the query point for each bond
    query_point_indices: Vec<usize>,
    /// index of the reference point for each bond
    point_indices: Vec<usize>,
    /// distance for each bond
    distances: Vec<f64>,
    /// vector from the query point to the reference point for each bond
    vectors: Vec<Vector3D>,
    /// weight of each bond
    weights: Vec<f64>,
    /// `segments[i]` is the index of the first bond of query point `i`, and
    /// the last entry is the total number of bonds
    segments: Vec<usize>,
}

impl NeighborList {
    /// Create a neighbor list from a set of `bonds` between `num_query_points`
    /// query points and `num_points` reference points. All bonds get a weight
    /// of 1.
    ///
    /// The bonds are expected to come from a neighbor query, use
    /// [`NeighborList::from_arrays`] to validate external data.
    ///
    /// # Panics
    ///
    /// If any bond refers to a query point or a reference point out of bounds
    pub fn from_bonds(num_query_points: usize, num_points: usize, bonds: impl IntoIterator<Item = Bond>) -> NeighborList {
        let mut bonds = bonds.into_iter().collect::<Vec<_>>();
        bonds.sort_unstable_by_key(|bond| (bond.query_point, bond.point));

        let count = bonds.len();
        bonds.dedup_by_key(|bond| (bond.query_point, bond.point));
        debug_assert_eq!(count, bonds.len(), "got the same bond multiple times");

        for bond in &bonds {
            assert!(
                bond.query_point < num_query_points && bond.point < num_points,
                "bond between query point {} and point {} is out of bounds for {} query points and {} points",
                bond.query_point, bond.point, num_query_points, num_points
            );
        }

        let mut list = NeighborList {
            num_query_points: num_query_points,
            num_points: num_points,
            query_point_indices: Vec::with_capacity(bonds.len()),
            point_indices: Vec::with_capacity(bonds.len()),
            distances: Vec::with_capacity(bonds.len()),
            vectors: Vec::with_capacity(bonds.len()),
            weights: vec![1.0; bonds.len()],
            segments: Vec::new(),
        };

        for bond in bonds {
            list.query_point_indices.push(bond.query_point);
            list.point_indices.push(bond.point);
            list.distances.push(bond.distance);
            list.vectors.push(bond.vector);
        }
        list.segments = compute_segments(num_query_points, &list.query_point_indices);

        return list;
    }

    /// Create a neighbor list from explicit arrays of indexes and vectors.
    ///
    /// All arrays must have the same length. If `weights` is `None`, all the
    /// bonds get a weight of 1. The bonds are sorted, and an error is
    /// returned if the same pair of points is present multiple times.
    pub fn from_arrays(
        num_query_points: usize,
        num_points: usize,
        query_point_indices: &[usize],
        point_indices: &[usize],
        vectors: &[Vector3D],
        weights: Option<&[f64]>,
    ) -> Result<NeighborList, Error> {
        let n_bonds = query_point_indices.len();
        if point_indices.len() != n_bonds || vectors.len() != n_bonds {
            return Err(Error::Configuration(format!(
                "inconsistent number of bonds: got {} query point indices, {} point indices and {} vectors",
                n_bonds, point_indices.len(), vectors.len()
            )));
        }

        if let Some(weights) = weights {
            if weights.len() != n_bonds {
                return Err(Error::Configuration(format!(
                    "expected {} weights, got {}", n_bonds, weights.len()
                )));
            }
        }

        if let Some(&i) = query_point_indices.iter().find(|&&i| i >= num_query_points) {
            return Err(Error::Configuration(format!(
                "query point index {} is out of bounds for {} query points", i, num_query_points
            )));
        }

        if let Some(&i) = point_indices.iter().find(|&&i| i >= num_points) {
            return Err(Error::Configuration(format!(
                "point index {} is out of bounds for {} points", i, num_points
            )));
        }

        let mut order = (0..n_bonds).collect::<Vec<_>>();
        order.sort_unstable_by_key(|&b| (query_point_indices[b], point_indices[b]));

        for window in order.windows(2) {
            let (first, second) = (window[0], window[1]);
            if query_point_indices[first] == query_point_indices[second] && point_indices[first] == point_indices[second] {
                return Err(Error::Configuration(format!(
                    "the bond between query point {} and point {} is present multiple times",
                    query_point_indices[first], point_indices[first]
                )));
            }
        }

        let query_point_indices = order.iter().map(|&b| query_point_indices[b]).collect::<Vec<_>>();
        let segments = compute_segments(num_query_points, &query_point_indices);

        return Ok(NeighborList {
            num_query_points: num_query_points,
            num_points: num_points,
            query_point_indices: query_point_indices,
            point_indices: order.iter().map(|&b| point_indices[b]).collect(),
            distances: order.iter().map(|&b| vectors[b].norm()).collect(),
            vectors: order.iter().map(|&b| vectors[b]).collect(),
            weights: match weights {
                Some(weights) => order.iter().map(|&b| weights[b]).collect(),
                None => vec![1.0; n_bonds],
            },
            segments: segments,
        });
    }

    /// Get the number of bonds in this list
    pub fn len(&self) -> usize {
        self.point_indices.len()
    }

    /// Is this list empty?
    pub fn is_empty(&self) -> bool {
        self.point_indices.is_empty()
    }

    pub fn num_query_points(&self) -> usize {
        self.num_query_points
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn query_point_indices(&self) -> &[usize] {
        &self.query_point_indices
    }

    pub fn point_indices(&self) -> &[usize] {
        &self.point_indices
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    pub fn vectors(&self) -> &[Vector3D] {
        &self.vectors
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Get the index of the first bond of each query point, i.e. the bonds of
    /// query point `i` are in the range `segments[i]..segments[i + 1]`. This
    /// contains `num_query_points + 1` entries.
    pub fn segments(&self) -> &[usize] {
        &self.segments
    }

    /// Get the number of bonds for each query point
    pub fn neighbor_counts(&self) -> Vec<usize> {
        self.segments.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Get the index of the first bond with a query point larger or equal to
    /// `query_point`. If there is no such bond, this returns the number of
    /// bonds.
    pub fn find_first_index(&self, query_point: usize) -> usize {
        self.query_point_indices.partition_point(|&i| i < query_point)
    }

    /// Get the bond at index `i` in this list
    pub fn bond(&self, i: usize) -> Bond {
        Bond {
            query_point: self.query_point_indices[i],
            point: self.point_indices[i],
            distance: self.distances[i],
            vector: self.vectors[i],
        }
    }

    /// Iterate over all the bonds in this list
    pub fn bonds(&self) -> impl ExactSizeIterator<Item = Bond> + '_ {
        (0..self.len()).map(move |i| self.bond(i))
    }

    /// Iterate over the bonds of a single query point
    pub fn bonds_of(&self, query_point: usize) -> impl ExactSizeIterator<Item = Bond> + '_ {
        let start = self.segments[query_point];
        let stop = self.segments[query_point + 1];
        (start..stop).map(move |i| self.bond(i))
    }

    /// Create a new neighbor list containing only the bonds for which
    /// `predicate` returns `true`. Weights are kept unchanged.
    #[must_use]
    pub fn filter(&self, mut predicate: impl FnMut(&Bond) -> bool) -> NeighborList {
        let mut list = NeighborList {
            num_query_points: self.num_query_points,
            num_points: self.num_points,
            query_point_indices: Vec::new(),
            point_indices: Vec::new(),
            distances: Vec::new(),
            vectors: Vec::new(),
            weights: Vec::new(),
            segments: Vec::new(),
        };

        for i in 0..self.len() {
            let bond = self.bond(i);
            if predicate(&bond) {
                list.query_point_indices.push(bond.query_point);
                list.point_indices.push(bond.point);
                list.distances.push(bond.distance);
                list.vectors.push(bond.vector);
                list.weights.push(self.weights[i]);
            }
        }
        list.segments = compute_segments(list.num_query_points, &list.query_point_indices);

        return list;
    }

    /// Create a new neighbor list containing only the bonds with
    /// `r_min <= distance < r_max`.
    #[must_use]
    pub fn filter_r(&self, r_max: f64, r_min: f64) -> NeighborList {
        self.filter(|bond| bond.distance < r_max && bond.distance >= r_min)
    }
}

/// Two neighbor lists are equal if they contain the same pairs of points
impl PartialEq for NeighborList {
    fn eq(&self, other: &NeighborList) -> bool {
        self.query_point_indices == other.query_point_indices && self.point_indices == other.point_indices
    }
}

/// Compute the offsets of the first bond of each query point in the sorted
/// `query_point_indices`
fn compute_segments(num_query_points: usize, query_point_indices: &[usize]) -> Vec<usize> {
    let mut segments = Vec::with_capacity(num_query_points + 1);
    let mut bond = 0;
    for query_point in 0..num_query_points {
        while bond < query_point_indices.len() && query_point_indices[bond] < query_point {
            bond += 1;
        }
        segments.push(bond);
    }
    segments.push(query_point_indices.len());
    return segments;
}
