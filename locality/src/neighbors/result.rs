use rayon::prelude::*;

use crate::{Error, PointSet, Vector3D};
use super::{NeighborQuery, QueryArgs, QuerySpec, Bond, NeighborList};

/// Two distinct points closer than this are most likely an error in the input
const SUSPICIOUS_DISTANCE: f64 = 1e-3;

/// The result of a neighbor query, created with [`NeighborQuery::query`].
///
/// Nothing is computed until the bonds are requested, either lazily with
/// [`NeighborQueryResult::iter`] or all at once with
/// [`NeighborQueryResult::to_neighbor_list`]. The same result can be iterated
/// over multiple times, each iteration starting from the first query point.
#[derive(Clone, Copy)]
pub struct NeighborQueryResult<'a> {
    index: &'a dyn NeighborQuery,
    query_points: PointSet<'a>,
    spec: QuerySpec,
}

impl<'a> std::fmt::Debug for NeighborQueryResult<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeighborQueryResult")
            .field("num_points", &self.index.points().len())
            .field("num_query_points", &self.query_points.len())
            .field("spec", &self.spec)
            .finish()
    }
}

impl<'a> NeighborQueryResult<'a> {
    /// Prepare a query of the neighbors of `query_points` in `index`
    pub(crate) fn new(index: &'a dyn NeighborQuery, query_points: &'a [Vector3D], args: &QueryArgs) -> Result<NeighborQueryResult<'a>, Error> {
        let cell = index.cell();
        let spec = args.resolve(cell)?;
        let query_points = PointSet::new(cell, query_points)?;

        return Ok(NeighborQueryResult {
            index: index,
            query_points: query_points,
            spec: spec,
        });
    }

    /// Get the validated query used to create this result
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Get the query points
    pub fn query_points(&self) -> PointSet<'a> {
        self.query_points
    }

    /// Iterate over all bonds, ordered by query point
    pub fn iter(&self) -> Bonds<'a> {
        Bonds {
            index: self.index,
            query_points: self.query_points,
            spec: self.spec,
            next_query_point: 0,
            current: Vec::new().into_iter(),
        }
    }

    /// Compute all bonds and store them in a [`NeighborList`]. The query
    /// points are processed in parallel.
    #[time_graph::instrument(name = "NeighborQueryResult::to_neighbor_list")]
    pub fn to_neighbor_list(&self) -> NeighborList {
        let index = self.index;
        let spec = self.spec;
        let bonds = self.query_points.positions()
            .par_iter()
            .enumerate()
            .map(|(query_point, &position)| index.query_point(query_point, position, &spec))
            .collect::<Vec<_>>();

        for bond in bonds.iter().flatten() {
            if bond.query_point != bond.point && bond.distance < SUSPICIOUS_DISTANCE {
                log::warn!(
                    "query point {} and point {} are very close to one another ({} distance units)",
                    bond.query_point, bond.point, bond.distance
                );
            }
        }

        return NeighborList::from_bonds(
            self.query_points.len(),
            index.points().len(),
            bonds.into_iter().flatten(),
        );
    }
}

impl<'a> IntoIterator for &NeighborQueryResult<'a> {
    type Item = Bond;
    type IntoIter = Bonds<'a>;

    fn into_iter(self) -> Bonds<'a> {
        self.iter()
    }
}

/// Lazy iterator over the bonds of a [`NeighborQueryResult`]. The bonds of a
/// query point are only computed once all the bonds of the previous query
/// point have been consumed.
pub struct Bonds<'a> {
    index: &'a dyn NeighborQuery,
    query_points: PointSet<'a>,
    spec: QuerySpec,
    next_query_point: usize,
    current: std::vec::IntoIter<Bond>,
}

impl<'a> Iterator for Bonds<'a> {
    type Item = Bond;

    fn next(&mut self) -> Option<Bond> {
        loop {
            if let Some(bond) = self.current.next() {
                return Some(bond);
            }

            if self.next_query_point >= self.query_points.len() {
                return None;
            }

            let query_point = self.next_query_point;
            self.next_query_point += 1;

            let position = self.query_points[query_point];
            self.current = self.index.query_point(query_point, position, &self.spec).into_iter();
        }
    }
}

impl<'a> std::iter::FusedIterator for Bonds<'a> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AabbQuery, UnitCell};
    use crate::systems::test_utils::points_on_a_line;

    #[test]
    fn lazy_and_restartable() {
        let (cell, positions) = points_on_a_line();
        let points = PointSet::new(&cell, &positions).unwrap();
        let index = AabbQuery::new(points);

        let result = index.query(&positions, &QueryArgs::ball(2.01)).unwrap();
        let first = result.iter().collect::<Vec<_>>();
        let second = (&result).into_iter().collect::<Vec<_>>();
        assert_eq!(first.len(), 14);
        assert_eq!(first, second);

        // partial iteration does not change the next iteration
        assert_eq!(result.iter().take(3).count(), 3);
        assert_eq!(result.iter().count(), 14);

        let query_points = first.iter().map(|bond| bond.query_point).collect::<Vec<_>>();
        let mut sorted = query_points.clone();
        sorted.sort_unstable();
        assert_eq!(query_points, sorted);
    }

    #[test]
    fn materialize() {
        let (cell, positions) = points_on_a_line();
        let points = PointSet::new(&cell, &positions).unwrap();
        let index = AabbQuery::new(points);

        let result = index.query(&positions, &QueryArgs::ball(2.01)).unwrap();
        let list = result.to_neighbor_list();
        assert_eq!(list.neighbor_counts(), [3, 4, 3, 4]);
        assert_eq!(list, result.to_neighbor_list());
        assert_eq!(list, NeighborList::from_bonds(4, 4, result.iter()));
    }

    #[test]
    fn invalid_query_points() {
        let cell = UnitCell::square(5.0).unwrap();
        let positions = [Vector3D::new(1.0, 1.0, 0.0)];
        let points = PointSet::new(&cell, &positions).unwrap();
        let index = AabbQuery::new(points);

        let query = [Vector3D::new(1.0, 1.0, 1.0)];
        let error = index.query(&query, &QueryArgs::ball(1.0)).unwrap_err();
        assert!(matches!(error, Error::Geometry(_)));

        let error = index.query(&positions, &QueryArgs::ball(3.0)).unwrap_err();
        assert!(matches!(error, Error::Configuration(_)));
    }
}
