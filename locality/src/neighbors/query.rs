use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};
use schemars::JsonSchema;

use crate::{Error, UnitCell, Vector3D};
use super::NeighborQuery;

/// The two kinds of queries supported by the spatial indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Find all points within a distance `r_max` of the query point
    Ball,
    /// Find the `num_neighbors` points closest to the query point
    Nearest,
}

/// User-facing arguments for a neighbor query.
///
/// When `mode` is not given, it is inferred from the other fields: giving
/// only `r_max` selects a ball query, giving only `num_neighbors` selects a
/// nearest neighbors query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct QueryArgs {
    /// Which kind of query to run, inferred from the other fields if missing
    #[serde(default)]
    pub mode: Option<QueryMode>,
    /// Maximal distance (exclusive) between a query point and its neighbors.
    /// This is required for ball queries and optional for nearest neighbors
    /// queries.
    #[serde(default)]
    pub r_max: Option<f64>,
    /// Minimal distance (inclusive) between a query point and its neighbors
    #[serde(default)]
    pub r_min: f64,
    /// Number of neighbors to find in nearest neighbors queries
    #[serde(default)]
    pub num_neighbors: Option<usize>,
    /// Should we drop bonds between query point `i` and reference point `i`?
    #[serde(default)]
    pub exclude_ii: bool,
}

impl QueryArgs {
    /// Arguments for a ball query with the given cutoff
    pub fn ball(r_max: f64) -> QueryArgs {
        QueryArgs {
            mode: Some(QueryMode::Ball),
            r_max: Some(r_max),
            ..Default::default()
        }
    }

    /// Arguments for a query of the `num_neighbors` nearest neighbors
    pub fn nearest(num_neighbors: usize) -> QueryArgs {
        QueryArgs {
            mode: Some(QueryMode::Nearest),
            num_neighbors: Some(num_neighbors),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_exclude_ii(mut self, exclude_ii: bool) -> QueryArgs {
        self.exclude_ii = exclude_ii;
        self
    }

    #[must_use]
    pub fn with_r_max(mut self, r_max: f64) -> QueryArgs {
        self.r_max = Some(r_max);
        self
    }

    #[must_use]
    pub fn with_r_min(mut self, r_min: f64) -> QueryArgs {
        self.r_min = r_min;
        self
    }

    /// Check these arguments and turn them into a [`QuerySpec`], for queries
    /// running inside the given `cell`.
    pub fn resolve(&self, cell: &UnitCell) -> Result<QuerySpec, Error> {
        let mode = match (self.mode, self.r_max, self.num_neighbors) {
            (Some(mode), _, _) => mode,
            (None, Some(_), None) => QueryMode::Ball,
            (None, None, Some(_)) => QueryMode::Nearest,
            (None, Some(_), Some(_)) => {
                return Err(Error::Configuration(
                    "can not infer the query mode when both r_max and num_neighbors are given, \
                    please set the mode explicitly".into()
                ));
            }
            (None, None, None) => {
                return Err(Error::Configuration(
                    "one of r_max or num_neighbors must be given to run a query".into()
                ));
            }
        };

        if !(self.r_min >= 0.0 && self.r_min.is_finite()) {
            return Err(Error::Configuration(format!(
                "r_min must be a positive number, got {}", self.r_min
            )));
        }

        if let Some(r_max) = self.r_max {
            if !(r_max > 0.0 && r_max.is_finite()) {
                return Err(Error::Configuration(format!(
                    "r_max must be a positive number, got {}", r_max
                )));
            }

            if self.r_min >= r_max {
                return Err(Error::Configuration(format!(
                    "r_min ({}) must be smaller than r_max ({})", self.r_min, r_max
                )));
            }
        }

        let kind = match mode {
            QueryMode::Ball => {
                if self.num_neighbors.is_some() {
                    return Err(Error::Configuration(
                        "num_neighbors can not be used with a ball query".into()
                    ));
                }

                let r_max = self.r_max.ok_or_else(|| Error::Configuration(
                    "r_max is required for a ball query".into()
                ))?;

                let half_distance = 0.5 * cell.nearest_plane_distance();
                if r_max > half_distance {
                    return Err(Error::Configuration(format!(
                        "r_max ({}) is larger than half the distance between periodic \
                        images of the same point ({}), the minimum image convention \
                        would not be respected", r_max, half_distance
                    )));
                }

                QueryKind::Ball { r_max }
            }
            QueryMode::Nearest => {
                let num_neighbors = self.num_neighbors.ok_or_else(|| Error::Configuration(
                    "num_neighbors is required for a nearest neighbors query".into()
                ))?;

                if num_neighbors == 0 {
                    return Err(Error::Configuration(
                        "num_neighbors must be at least 1".into()
                    ));
                }

                QueryKind::Nearest { num_neighbors, r_max: self.r_max }
            }
        };

        return Ok(QuerySpec {
            kind: kind,
            r_min: self.r_min,
            exclude_ii: self.exclude_ii,
        });
    }
}

/// Resolved kind of a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryKind {
    /// All points with `r_min <= distance < r_max`
    Ball {
        r_max: f64,
    },
    /// The `num_neighbors` closest points, optionally limited to
    /// `distance < r_max`
    Nearest {
        num_neighbors: usize,
        r_max: Option<f64>,
    },
}

/// A validated query, created with [`QueryArgs::resolve`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuerySpec {
    pub kind: QueryKind,
    pub r_min: f64,
    pub exclude_ii: bool,
}

impl QuerySpec {
    /// Get the mode of this query
    pub fn mode(&self) -> QueryMode {
        match self.kind {
            QueryKind::Ball { .. } => QueryMode::Ball,
            QueryKind::Nearest { .. } => QueryMode::Nearest,
        }
    }
}

/// A bond between a query point and one of the reference points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
    /// index of the query point
    pub query_point: usize,
    /// index of the reference point
    pub point: usize,
    /// distance between the two points, using periodic boundary conditions
    pub distance: f64,
    /// minimum image vector going from the query point to the reference point
    pub vector: Vector3D,
}

/// Radius used to gather candidates from an index, slightly larger than
/// `radius` so that rounding in the index geometry never loses a point whose
/// minimum image distance is below `radius`.
pub(crate) fn search_radius(cell: &UnitCell, radius: f64) -> f64 {
    return radius + 1e-8 * (radius + cell.max_image_distance());
}

/// Minimum image vector going from `position` to `reference`
#[inline]
fn image_vector(cell: &UnitCell, reference: Vector3D, position: Vector3D) -> Vector3D {
    let mut vector = reference - position;
    cell.vector_image(&mut vector);
    return vector;
}

/// Find all bonds for a ball query around a single `position`
pub(crate) fn ball_bonds(
    index: &dyn NeighborQuery,
    query_point: usize,
    position: Vector3D,
    r_max: f64,
    r_min: f64,
    exclude_ii: bool,
) -> Vec<Bond> {
    let points = index.points();
    if points.is_empty() {
        return Vec::new();
    }

    let cell = points.cell();
    let mut candidates = Vec::new();
    index.candidates(position, search_radius(cell, r_max), &mut candidates);

    let r_max2 = r_max * r_max;
    let r_min2 = r_min * r_min;

    let mut bonds = Vec::new();
    for point in candidates {
        if exclude_ii && point == query_point {
            continue;
        }

        let vector = image_vector(cell, points[point], position);
        let distance2 = vector.norm2();
        if distance2 < r_max2 && distance2 >= r_min2 {
            bonds.push(Bond {
                query_point: query_point,
                point: point,
                distance: f64::sqrt(distance2),
                vector: vector,
            });
        }
    }

    bonds.sort_unstable_by_key(|bond| bond.point);
    return bonds;
}

/// Entry in the bounded heap of nearest neighbors, ordered by distance and
/// then by point index
#[derive(Debug, Clone, Copy)]
struct HeapItem {
    distance2: f64,
    point: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance2.total_cmp(&other.distance2)
            .then(self.point.cmp(&other.point))
    }
}

/// Find the `num_neighbors` nearest neighbors of a single `position`.
///
/// The search starts with a shell of radius given by
/// [`NeighborQuery::initial_search_radius`], and doubles it until the k-th
/// neighbor is known to be inside the shell. All points at the same distance
/// as the k-th neighbor are included, so there can be more than
/// `num_neighbors` bonds.
pub(crate) fn nearest_bonds(
    index: &dyn NeighborQuery,
    query_point: usize,
    position: Vector3D,
    num_neighbors: usize,
    r_max: Option<f64>,
    r_min: f64,
    exclude_ii: bool,
) -> Vec<Bond> {
    let points = index.points();
    if points.is_empty() {
        return Vec::new();
    }

    let cell = points.cell();
    let max_radius = cell.max_image_distance();
    let r_max2 = r_max.map_or(f64::INFINITY, |r| r * r);
    let r_min2 = r_min * r_min;

    let mut radius = f64::clamp(
        index.initial_search_radius(num_neighbors),
        1e-6 * max_radius,
        max_radius,
    );
    if radius.is_nan() {
        radius = max_radius;
    }

    let mut candidates = Vec::new();
    let mut bonds = Vec::new();
    let mut heap = BinaryHeap::with_capacity(num_neighbors + 1);
    loop {
        // past this radius, all points are inside the shell
        let covers_everything = radius >= max_radius;
        let complete = covers_everything || r_max.map_or(false, |r| radius >= r);

        candidates.clear();
        if covers_everything {
            candidates.extend(0..points.len());
        } else {
            index.candidates(position, search_radius(cell, radius), &mut candidates);
        }

        bonds.clear();
        heap.clear();
        for &point in &candidates {
            if exclude_ii && point == query_point {
                continue;
            }

            let vector = image_vector(cell, points[point], position);
            let distance2 = vector.norm2();
            if distance2 >= r_max2 || distance2 < r_min2 {
                continue;
            }

            bonds.push(Bond {
                query_point: query_point,
                point: point,
                distance: f64::sqrt(distance2),
                vector: vector,
            });

            heap.push(HeapItem { distance2, point });
            if heap.len() > num_neighbors {
                heap.pop();
            }
        }

        if heap.len() == num_neighbors {
            let kth_distance2 = heap.peek().map_or(f64::INFINITY, |item| item.distance2);
            if complete || kth_distance2 <= radius * radius {
                // keep ties with the k-th neighbor
                bonds.retain(|bond| bond.vector.norm2() <= kth_distance2);
                break;
            }
        } else if complete {
            log::debug!(
                "only found {} neighbors out of {} requested for point {}",
                bonds.len(), num_neighbors, query_point
            );
            break;
        }

        let mut next = 2.0 * radius;
        if let Some(r_max) = r_max {
            if radius < r_max && next > r_max {
                next = r_max;
            }
        }
        radius = f64::min(next, max_radius);
    }

    bonds.sort_unstable_by(|a, b| {
        a.distance.total_cmp(&b.distance).then(a.point.cmp(&b.point))
    });
    return bonds;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_inference() {
        let cell = UnitCell::cubic(10.0).unwrap();

        let args = QueryArgs { r_max: Some(2.0), ..Default::default() };
        let spec = args.resolve(&cell).unwrap();
        assert_eq!(spec.mode(), QueryMode::Ball);
        assert_eq!(spec, QueryArgs::ball(2.0).resolve(&cell).unwrap());

        let args = QueryArgs { num_neighbors: Some(3), ..Default::default() };
        let spec = args.resolve(&cell).unwrap();
        assert_eq!(spec.mode(), QueryMode::Nearest);
        assert_eq!(spec, QueryArgs::nearest(3).resolve(&cell).unwrap());

        let args = QueryArgs::nearest(3).with_r_max(2.0).with_exclude_ii(true);
        let spec = args.resolve(&cell).unwrap();
        assert_eq!(spec.kind, QueryKind::Nearest { num_neighbors: 3, r_max: Some(2.0) });
        assert!(spec.exclude_ii);
    }

    #[test]
    fn invalid_arguments() {
        let cell = UnitCell::cubic(10.0).unwrap();

        let invalid = [
            QueryArgs::default(),
            QueryArgs { r_max: Some(2.0), num_neighbors: Some(3), ..Default::default() },
            QueryArgs { mode: Some(QueryMode::Ball), ..Default::default() },
            QueryArgs::ball(2.0).with_r_min(3.0),
            QueryArgs::ball(2.0).with_r_min(-1.0),
            QueryArgs::ball(-2.0),
            QueryArgs::ball(f64::NAN),
            QueryArgs { num_neighbors: Some(3), ..QueryArgs::ball(2.0) },
            QueryArgs::nearest(0),
            QueryArgs::nearest(3).with_r_max(0.0),
            QueryArgs { mode: Some(QueryMode::Nearest), r_max: Some(2.0), ..Default::default() },
        ];

        for args in &invalid {
            let error = args.resolve(&cell).unwrap_err();
            assert!(matches!(error, Error::Configuration(_)), "{:?} should fail", args);
        }
    }

    #[test]
    fn too_large_cutoff() {
        let cell = UnitCell::square(5.0).unwrap();
        let error = QueryArgs::ball(5.0).resolve(&cell).unwrap_err();
        assert!(error.to_string().contains("larger than half the distance"));

        assert!(QueryArgs::ball(2.5).resolve(&cell).is_ok());
        // nearest neighbors queries can look further away
        assert!(QueryArgs::nearest(3).with_r_max(5.0).resolve(&cell).is_ok());
    }

    #[test]
    fn json() {
        let cell = UnitCell::cubic(10.0).unwrap();

        let args: QueryArgs = serde_json::from_str(r#"{"mode": "ball", "r_max": 3.5}"#).unwrap();
        assert_eq!(args, QueryArgs::ball(3.5));

        let args: QueryArgs = serde_json::from_str(
            r#"{"num_neighbors": 4, "exclude_ii": true}"#
        ).unwrap();
        let spec = args.resolve(&cell).unwrap();
        assert_eq!(spec.kind, QueryKind::Nearest { num_neighbors: 4, r_max: None });
        assert!(spec.exclude_ii);

        let error = serde_json::from_str::<QueryArgs>(r#"{"radius": 3.5}"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn heap_ordering() {
        let mut heap = BinaryHeap::new();
        heap.push(HeapItem { distance2: 1.0, point: 3 });
        heap.push(HeapItem { distance2: 4.0, point: 0 });
        heap.push(HeapItem { distance2: 4.0, point: 2 });
        heap.push(HeapItem { distance2: 0.5, point: 1 });

        assert_eq!(heap.pop().map(|item| item.point), Some(2));
        assert_eq!(heap.pop().map(|item| item.point), Some(0));
        assert_eq!(heap.pop().map(|item| item.point), Some(3));
        assert_eq!(heap.pop().map(|item| item.point), Some(1));
    }
}
