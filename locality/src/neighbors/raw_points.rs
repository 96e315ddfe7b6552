use crate::{PointSet, Vector3D};
use super::NeighborQuery;

/// A spatial index without any spatial structure: every reference point is a
/// candidate for every query. This is mainly useful as a reference to check
/// the other indexes, or for very small systems.
#[derive(Debug, Clone, Copy)]
pub struct RawPoints<'a> {
    points: PointSet<'a>,
}

impl<'a> RawPoints<'a> {
    pub fn new(points: PointSet<'a>) -> RawPoints<'a> {
        RawPoints { points }
    }
}

impl<'a> NeighborQuery for RawPoints<'a> {
    fn points(&self) -> PointSet<'_> {
        self.points
    }

    fn as_dyn(&self) -> &dyn NeighborQuery {
        self
    }

    fn candidates(&self, _: Vector3D, _: f64, candidates: &mut Vec<usize>) {
        candidates.clear();
        candidates.extend(0..self.points.len());
    }

    fn initial_search_radius(&self, _: usize) -> f64 {
        // everything is a candidate anyway
        self.points.cell().max_image_distance()
    }
}
