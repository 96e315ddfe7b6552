//! Spatial indexes answering neighbor queries with periodic boundary
//! conditions.
//!
//! All the indexes implement the [`NeighborQuery`] trait. Indexes only have to
//! produce a list of candidate points around a position, and the distances are
//! then always computed by the same code, which makes the different indexes
//! give exactly the same results.
use std::collections::BTreeMap;
use std::f64::consts::PI;

use once_cell::sync::Lazy;

use crate::{Error, PointSet, UnitCell, Vector3D};

mod query;
pub use self::query::{QueryArgs, QueryMode, QuerySpec, QueryKind, Bond};
use self::query::{ball_bonds, nearest_bonds};

mod result;
pub use self::result::{NeighborQueryResult, Bonds};

mod neighbor_list;
pub use self::neighbor_list::NeighborList;

mod aabb;
pub use self::aabb::{AabbQuery, AabbParameters};

mod link_cell;
pub use self::link_cell::{LinkCell, LinkCellParameters};

mod raw_points;
pub use self::raw_points::RawPoints;

/// The `NeighborQuery` trait is the interface shared by all spatial indexes.
///
/// An index is built once over a set of reference points, and can then be
/// queried any number of times, possibly from multiple threads.
pub trait NeighborQuery: Send + Sync {
    /// Get the reference points used to build this index
    fn points(&self) -> PointSet<'_>;

    /// Get this index as a trait object
    fn as_dyn(&self) -> &dyn NeighborQuery;

    /// Fill `candidates` with the indexes of all reference points having at
    /// least one periodic image within `radius` of `position`. Each point must
    /// appear at most once, and additional points further than `radius` are
    /// allowed. `candidates` is cleared before adding new points.
    fn candidates(&self, position: Vector3D, radius: f64, candidates: &mut Vec<usize>);

    /// Get the radius of the first search shell in nearest neighbors queries
    /// for `num_neighbors` neighbors. The default implementation estimates
    /// the radius of a sphere containing `num_neighbors` points on average.
    fn initial_search_radius(&self, num_neighbors: usize) -> f64 {
        let points = self.points();
        let cell = points.cell();
        let density = points.len() as f64 / cell.volume();
        let k = num_neighbors as f64;
        if cell.is_2d() {
            return f64::sqrt(k / (PI * density));
        } else {
            return f64::cbrt(3.0 * k / (4.0 * PI * density));
        }
    }

    /// Get the unit cell of the reference points
    fn cell(&self) -> &UnitCell {
        self.points().cell()
    }

    /// Get all bonds between `position` and the reference points with
    /// `r_min <= distance < r_max`, sorted by reference point. The bonds will
    /// use `query_point` as the query point index.
    fn query_ball_point(&self, query_point: usize, position: Vector3D, r_max: f64, r_min: f64, exclude_ii: bool) -> Vec<Bond> {
        ball_bonds(self.as_dyn(), query_point, position, r_max, r_min, exclude_ii)
    }

    /// Get the bonds between `position` and its `num_neighbors` nearest
    /// reference points, sorted by distance. Reference points at the same
    /// distance as the last neighbor are also included.
    fn query_nearest_point(
        &self,
        query_point: usize,
        position: Vector3D,
        num_neighbors: usize,
        r_max: Option<f64>,
        r_min: f64,
        exclude_ii: bool,
    ) -> Vec<Bond> {
        nearest_bonds(self.as_dyn(), query_point, position, num_neighbors, r_max, r_min, exclude_ii)
    }

    /// Run the query described by `spec` for a single `position`
    fn query_point(&self, query_point: usize, position: Vector3D, spec: &QuerySpec) -> Vec<Bond> {
        match spec.kind {
            QueryKind::Ball { r_max } => {
                self.query_ball_point(query_point, position, r_max, spec.r_min, spec.exclude_ii)
            }
            QueryKind::Nearest { num_neighbors, r_max } => {
                self.query_nearest_point(query_point, position, num_neighbors, r_max, spec.r_min, spec.exclude_ii)
            }
        }
    }

    /// Query the neighbors of all `points`, which must live in the same cell
    /// as the reference points. The query arguments are checked immediately,
    /// but the bonds are only computed when iterating over the result.
    fn query<'a>(&'a self, points: &'a [Vector3D], args: &QueryArgs) -> Result<NeighborQueryResult<'a>, Error> {
        NeighborQueryResult::new(self.as_dyn(), points, args)
    }
}

type IndexCreator = for<'a> fn(PointSet<'a>, &str) -> Result<Box<dyn NeighborQuery + 'a>, Error>;

macro_rules! add_index {
    ($map :expr, $name :literal, $type :ty, $parameters :ty) => ({
        fn create<'a>(points: PointSet<'a>, json: &str) -> Result<Box<dyn NeighborQuery + 'a>, Error> {
            let parameters = serde_json::from_str::<$parameters>(json)?;
            Ok(Box::new(<$type>::with_parameters(points, &parameters)?))
        }
        $map.insert($name, create as IndexCreator);
    });
    ($map :expr, $name :literal, $type :ty) => ({
        fn create<'a>(points: PointSet<'a>, json: &str) -> Result<Box<dyn NeighborQuery + 'a>, Error> {
            // this index does not take any parameter, but we still want to
            // report invalid JSON and unknown parameters
            if !json.trim().is_empty() {
                let parameters = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(json)?;
                if let Some(key) = parameters.keys().next() {
                    return Err(Error::Configuration(format!(
                        "unknown parameter '{}' for the '{}' spatial index", key, $name
                    )));
                }
            }
            Ok(Box::new(<$type>::new(points)))
        }
        $map.insert($name, create as IndexCreator);
    });
}

static REGISTERED_INDEXES: Lazy<BTreeMap<&'static str, IndexCreator>> = Lazy::new(|| {
    let mut map = BTreeMap::new();
    add_index!(map, "aabb", AabbQuery, AabbParameters);
    add_index!(map, "link_cell", LinkCell, LinkCellParameters);
    add_index!(map, "raw_points", RawPoints);
    return map;
});

/// Get the names of all the available spatial indexes
pub fn registered_indexes() -> Vec<&'static str> {
    REGISTERED_INDEXES.keys().copied().collect()
}

/// Build the spatial index registered as `name` over the reference `points`,
/// using the `parameters` given as a JSON string.
///
/// ```
/// # use locality::{build_index, PointSet, UnitCell, Vector3D, QueryArgs};
/// let cell = UnitCell::cubic(10.0)?;
/// let positions = [Vector3D::new(0.0, 0.0, 0.0), Vector3D::new(1.0, 0.0, 0.0)];
/// let points = PointSet::new(&cell, &positions)?;
///
/// let index = build_index("link_cell", points, r#"{"cell_width": 2.0}"#)?;
/// let result = index.query(&positions, &QueryArgs::ball(1.5).with_exclude_ii(true))?;
/// assert_eq!(result.iter().count(), 2);
/// # Ok::<(), locality::Error>(())
/// ```
pub fn build_index<'a>(name: &str, points: PointSet<'a>, parameters: &str) -> Result<Box<dyn NeighborQuery + 'a>, Error> {
    let creator = match REGISTERED_INDEXES.get(name) {
        Some(creator) => creator,
        None => {
            return Err(Error::Configuration(format!(
                "unknown spatial index with name '{}', available indexes are: {}",
                name, registered_indexes().join(", ")
            )));
        }
    };

    return creator(points, parameters);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::test_utils::{random_points, test_cell};

    #[test]
    fn registry() {
        assert_eq!(registered_indexes(), ["aabb", "link_cell", "raw_points"]);

        let cell = test_cell("cube");
        let positions = random_points(&cell, 20, 0xDEADBEEF);
        let points = PointSet::new(&cell, &positions).unwrap();

        for (name, parameters) in [("aabb", "{}"), ("link_cell", r#"{"cell_width": 3.0}"#), ("raw_points", "")] {
            let index = build_index(name, points, parameters).unwrap();
            assert_eq!(index.points().len(), 20);
            assert_eq!(index.cell(), &cell);
        }

        let error = build_index("kd_tree", points, "{}").err().unwrap();
        assert_eq!(
            error.to_string(),
            "invalid configuration: unknown spatial index with name 'kd_tree', \
            available indexes are: aabb, link_cell, raw_points"
        );

        let error = build_index("aabb", points, "{\"leaf_size\": ").err().unwrap();
        assert!(matches!(error, Error::Json(_)));

        let error = build_index("link_cell", points, "{}").err().unwrap();
        assert!(matches!(error, Error::Json(_)));

        let error = build_index("link_cell", points, r#"{"cell_width": -1.0}"#).err().unwrap();
        assert!(matches!(error, Error::Configuration(_)));

        let error = build_index("raw_points", points, r#"{"cell_width": 1.0}"#).err().unwrap();
        assert_eq!(
            error.to_string(),
            "invalid configuration: unknown parameter 'cell_width' for the 'raw_points' spatial index"
        );
        assert!(build_index("raw_points", points, "{}").is_ok());
    }

    #[test]
    fn initial_search_radius() {
        let cell = UnitCell::cubic(10.0).unwrap();
        let positions = random_points(&cell, 1000, 42);
        let points = PointSet::new(&cell, &positions).unwrap();
        let index = RawPoints::new(points);

        // raw points look at everything at once
        assert_eq!(index.initial_search_radius(4), cell.max_image_distance());

        let index = AabbQuery::new(points);
        // a sphere of radius r contains 4/3 pi r^3 points at density 1
        let expected = f64::cbrt(3.0 * 4.0 / (4.0 * PI));
        approx::assert_relative_eq!(index.initial_search_radius(4), expected, max_relative = 1e-12);

        let cell = UnitCell::square(10.0).unwrap();
        let positions = random_points(&cell, 100, 42);
        let points = PointSet::new(&cell, &positions).unwrap();
        let index = AabbQuery::new(points);
        approx::assert_relative_eq!(index.initial_search_radius(3), f64::sqrt(3.0 / PI), max_relative = 1e-12);
    }
}
