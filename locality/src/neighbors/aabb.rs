use serde::{Deserialize, Serialize};
use schemars::JsonSchema;

use crate::{Error, PointSet, Vector3D};
use super::NeighborQuery;

fn serde_default_leaf_size() -> usize { 8 }

/// Parameters for the [`AabbQuery`] spatial index
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AabbParameters {
    /// Maximal number of points in the leaves of the tree
    #[serde(default = "serde_default_leaf_size")]
    pub leaf_size: usize,
}

impl Default for AabbParameters {
    fn default() -> AabbParameters {
        AabbParameters { leaf_size: serde_default_leaf_size() }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
struct Aabb {
    min: Vector3D,
    max: Vector3D,
}

impl Aabb {
    fn empty() -> Aabb {
        Aabb {
            min: Vector3D::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Vector3D::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    fn add_point(&mut self, point: Vector3D) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Index of the longest side of this box
    fn longest_axis(&self) -> usize {
        let size = self.max - self.min;
        if size[0] >= size[1] && size[0] >= size[2] {
            0
        } else if size[1] >= size[2] {
            1
        } else {
            2
        }
    }

    /// Squared distance between `point` and the closest point of this box
    fn distance2(&self, point: Vector3D) -> f64 {
        let mut distance2 = 0.0;
        for i in 0..3 {
            let delta = if point[i] < self.min[i] {
                self.min[i] - point[i]
            } else if point[i] > self.max[i] {
                point[i] - self.max[i]
            } else {
                0.0
            };
            distance2 += delta * delta;
        }
        return distance2;
    }
}

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    /// Leaf containing the points `indices[start..end]`
    Leaf { start: usize, end: usize },
    /// Internal node, containing the index of the children in the node list
    Internal { left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct Node {
    bounds: Aabb,
    kind: NodeKind,
}

/// Spatial index storing the reference points in a tree of axis-aligned
/// bounding boxes.
///
/// The points are first wrapped inside the unit cell, then recursively split
/// in two halves along the longest side of their bounding box, until there are
/// at most `leaf_size` points in each node. Periodic boundary conditions are
/// handled by descending the tree once for each periodic image of the query
/// position that could be close enough to the unit cell.
#[derive(Debug, Clone)]
pub struct AabbQuery<'a> {
    points: PointSet<'a>,
    /// reference points, wrapped inside the unit cell
    wrapped: Vec<Vector3D>,
    /// indices of the points, ordered such that the points in each leaf are
    /// contiguous
    indices: Vec<usize>,
    /// all the nodes of the tree, the root being the last one
    nodes: Vec<Node>,
    leaf_size: usize,
}

impl<'a> AabbQuery<'a> {
    /// Create a new tree for the given reference `points`, with the default
    /// parameters
    pub fn new(points: PointSet<'a>) -> AabbQuery<'a> {
        let mut tree = AabbQuery {
            points: points,
            wrapped: Vec::new(),
            indices: Vec::new(),
            nodes: Vec::new(),
            leaf_size: serde_default_leaf_size(),
        };
        tree.build();
        return tree;
    }

    /// Create a new tree using the given `parameters`
    pub fn with_parameters(points: PointSet<'a>, parameters: &AabbParameters) -> Result<AabbQuery<'a>, Error> {
        if parameters.leaf_size == 0 {
            return Err(Error::Configuration(
                "leaf_size must be at least 1".into()
            ));
        }

        let mut tree = AabbQuery {
            points: points,
            wrapped: Vec::new(),
            indices: Vec::new(),
            nodes: Vec::new(),
            leaf_size: parameters.leaf_size,
        };
        tree.build();
        return Ok(tree);
    }

    /// Get the maximal number of points in each leaf
    pub fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    /// Get the depth of the tree, 0 for an empty tree
    pub fn depth(&self) -> usize {
        fn node_depth(nodes: &[Node], node: usize) -> usize {
            match nodes[node].kind {
                NodeKind::Leaf { .. } => 1,
                NodeKind::Internal { left, right } => {
                    1 + usize::max(node_depth(nodes, left), node_depth(nodes, right))
                }
            }
        }

        match self.root() {
            Some(root) => node_depth(&self.nodes, root),
            None => 0,
        }
    }

    fn root(&self) -> Option<usize> {
        self.nodes.len().checked_sub(1)
    }

    #[time_graph::instrument(name = "AabbQuery::build")]
    fn build(&mut self) {
        let cell = self.points.cell();
        self.wrapped = self.points.positions().iter().map(|&position| {
            let mut position = position;
            cell.wrap_vector(&mut position);
            position
        }).collect();

        self.indices = (0..self.wrapped.len()).collect();
        self.nodes.clear();

        if self.wrapped.is_empty() {
            return;
        }

        self.nodes.reserve(2 * self.wrapped.len() / self.leaf_size + 1);
        self.build_recursive(0, self.wrapped.len());

        log::debug!(
            "built AABB tree with {} nodes and depth {} for {} points",
            self.nodes.len(), self.depth(), self.wrapped.len()
        );
    }

    /// Build the node containing `indices[start..end]`, and return its index
    fn build_recursive(&mut self, start: usize, end: usize) -> usize {
        let mut bounds = Aabb::empty();
        for &i in &self.indices[start..end] {
            bounds.add_point(self.wrapped[i]);
        }

        let count = end - start;
        if count <= self.leaf_size {
            self.nodes.push(Node {
                bounds: bounds,
                kind: NodeKind::Leaf { start, end },
            });
            return self.nodes.len() - 1;
        }

        let axis = bounds.longest_axis();
        let wrapped = &self.wrapped;
        self.indices[start..end].select_nth_unstable_by(count / 2, |&a, &b| {
            wrapped[a][axis].total_cmp(&wrapped[b][axis])
        });

        let middle = start + count / 2;
        let left = self.build_recursive(start, middle);
        let right = self.build_recursive(middle, end);

        self.nodes.push(Node {
            bounds: bounds,
            kind: NodeKind::Internal { left, right },
        });
        return self.nodes.len() - 1;
    }

    /// Add all points in the tree within `sqrt(radius2)` of `center` to
    /// `candidates`, without any periodic boundary conditions
    fn collect(&self, root: usize, center: Vector3D, radius2: f64, stack: &mut Vec<usize>, candidates: &mut Vec<usize>) {
        stack.clear();
        stack.push(root);
        while let Some(node) = stack.pop() {
            let node = &self.nodes[node];
            if node.bounds.distance2(center) > radius2 {
                continue;
            }

            match node.kind {
                NodeKind::Leaf { start, end } => {
                    for &i in &self.indices[start..end] {
                        if (self.wrapped[i] - center).norm2() <= radius2 {
                            candidates.push(i);
                        }
                    }
                }
                NodeKind::Internal { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
    }
}

impl<'a> NeighborQuery for AabbQuery<'a> {
    fn points(&self) -> PointSet<'_> {
        self.points
    }

    fn as_dyn(&self) -> &dyn NeighborQuery {
        self
    }

    fn candidates(&self, position: Vector3D, radius: f64, candidates: &mut Vec<usize>) {
        candidates.clear();
        let root = match self.root() {
            Some(root) => root,
            None => return,
        };

        let cell = self.points.cell();
        let mut position = position;
        cell.wrap_vector(&mut position);

        // both the query position and the reference points are inside the
        // unit cell, so we only need the images at most `radius` away from
        // the unit cell
        let distances_between_faces = cell.distances_between_faces();
        let mut max_shift = [0_i64; 3];
        for i in 0..cell.dimensions() {
            max_shift[i] = f64::floor(radius / distances_between_faces[i]) as i64 + 1;
        }

        let radius2 = radius * radius;
        let mut stack = Vec::new();
        for na in -max_shift[0]..=max_shift[0] {
            for nb in -max_shift[1]..=max_shift[1] {
                for nc in -max_shift[2]..=max_shift[2] {
                    let shift = cell.cartesian(Vector3D::new(na as f64, nb as f64, nc as f64));
                    self.collect(root, position - shift, radius2, &mut stack, candidates);
                }
            }
        }

        // large radius can reach the same point through multiple images
        candidates.sort_unstable();
        candidates.dedup();
    }
}
