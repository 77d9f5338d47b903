use nalgebra as na;
use rapier3d::parry::{
    bounding_volume::Aabb,
    partitioning::{Bvh, BvhBuildStrategy},
    shape::Shape,
};

use super::types::{Iso, Vec3};

/// Acceleration structure for broad-phase queries over the world's colliders.
///
/// Notes:
/// - Finite colliders are stored as world-space AABBs in a BVH.
/// - `finite_indices` maps each BVH leaf back to its index in the world's collider list.
/// - Planes (half-spaces) are infinite, cannot live in the BVH and are listed in
///   `plane_indices`; every query tests them.
pub struct WorldAccel {
    /// BVH over finite collider AABBs.
    pub bvh: Bvh,
    /// Collider indices for the BVH leaves above.
    pub finite_indices: Vec<usize>,
    /// Collider indices of infinite planes.
    pub plane_indices: Vec<usize>,
}

impl WorldAccel {
    /// Return true if this accelerator has no finite entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.finite_indices.is_empty()
    }

    /// Number of finite entries (AABBs) in this accelerator.
    #[inline]
    pub fn len(&self) -> usize {
        self.finite_indices.len()
    }
}

/// An entry fed to [`build_world_accel`]: either an infinite plane or a finite AABB.
#[derive(Clone, Copy, Debug)]
pub enum BroadEntry {
    Plane,
    Finite(Aabb),
}

/// Build the broad-phase accelerator. Entry `i` of `entries` is collider `i` of the world.
pub fn build_world_accel(entries: impl IntoIterator<Item = BroadEntry>) -> WorldAccel {
    let mut aabbs: Vec<Aabb> = Vec::new();
    let mut finite_indices: Vec<usize> = Vec::new();
    let mut plane_indices: Vec<usize> = Vec::new();

    for (i, entry) in entries.into_iter().enumerate() {
        match entry {
            BroadEntry::Plane => plane_indices.push(i),
            BroadEntry::Finite(aabb) => {
                aabbs.push(aabb);
                finite_indices.push(i);
            }
        }
    }

    WorldAccel {
        bvh: Bvh::from_leaves(BvhBuildStrategy::Binned, &aabbs),
        finite_indices,
        plane_indices,
    }
}

/// Compute the AABB swept by `shape` moving from `start` to `start + displacement`
/// (no rotation during the sweep), inflated by `margin`.
pub fn swept_shape_aabb(shape: &dyn Shape, start: &Iso, displacement: &Vec3, margin: f32) -> Aabb {
    let end = Iso::from_parts(
        na::Translation3::from(start.translation.vector + displacement),
        start.rotation,
    );

    let aabb_start = shape.compute_aabb(start);
    let aabb_end = shape.compute_aabb(&end);

    aabb_inflate(&aabb_union(&aabb_start, &aabb_end), margin)
}

/// AABB of `shape` at `pose`, inflated by `margin` (for distance queries).
pub fn shape_aabb(shape: &dyn Shape, pose: &Iso, margin: f32) -> Aabb {
    aabb_inflate(&shape.compute_aabb(pose), margin)
}

/// Query collider indices whose AABB intersects `region`, planes included.
///
/// Returns indices referencing the world's collider list (not the local AABB array).
pub fn query_candidates(accel: &WorldAccel, region: &Aabb, out: &mut Vec<usize>) {
    out.clear();
    out.extend_from_slice(&accel.plane_indices);
    if accel.is_empty() {
        return;
    }
    out.extend(
        accel
            .bvh
            .intersect_aabb(region)
            .map(|leaf_idx| accel.finite_indices[leaf_idx as usize]),
    );
}

/// Compute the union of two AABBs.
fn aabb_union(a: &Aabb, b: &Aabb) -> Aabb {
    let min = na::Point3::new(
        a.mins.x.min(b.mins.x),
        a.mins.y.min(b.mins.y),
        a.mins.z.min(b.mins.z),
    );
    let max = na::Point3::new(
        a.maxs.x.max(b.maxs.x),
        a.maxs.y.max(b.maxs.y),
        a.maxs.z.max(b.maxs.z),
    );
    Aabb {
        mins: min,
        maxs: max,
    }
}

/// Inflate an AABB by `margin` on all sides.
fn aabb_inflate(a: &Aabb, margin: f32) -> Aabb {
    if margin <= 0.0 {
        return *a;
    }
    let delta = na::Vector3::new(margin, margin, margin);
    Aabb {
        mins: a.mins - delta,
        maxs: a.maxs + delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::parry::shape::{Ball, Cuboid};

    fn ball_aabb(center: Vec3, radius: f32) -> Aabb {
        Ball::new(radius).compute_aabb(&Iso::translation(center.x, center.y, center.z))
    }

    #[test]
    fn swept_aabb_covers_start_and_end() {
        let cuboid = Cuboid::new(Vec3::new(0.5, 0.5, 0.5));
        let start = Iso::translation(0.0, 0.0, 0.0);
        let aabb = swept_shape_aabb(&cuboid, &start, &Vec3::new(3.0, 0.0, 0.0), 0.1);

        assert!((aabb.mins.x - (-0.6)).abs() < 1.0e-5);
        assert!((aabb.maxs.x - 3.6).abs() < 1.0e-5);
        assert!((aabb.maxs.y - 0.6).abs() < 1.0e-5);
    }

    #[test]
    fn candidates_always_include_planes() {
        let accel = build_world_accel([
            BroadEntry::Plane,
            BroadEntry::Finite(ball_aabb(Vec3::new(10.0, 0.0, 0.0), 1.0)),
            BroadEntry::Finite(ball_aabb(Vec3::new(0.0, 0.0, 0.0), 1.0)),
        ]);
        assert_eq!(accel.len(), 2);

        let mut out = Vec::new();
        query_candidates(&accel, &ball_aabb(Vec3::new(0.5, 0.0, 0.0), 0.5), &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![0, 2]);
    }

    #[test]
    fn empty_accel_returns_only_planes() {
        let accel = build_world_accel([BroadEntry::Plane]);
        assert!(accel.is_empty());

        let mut out = vec![42];
        query_candidates(&accel, &ball_aabb(Vec3::zeros(), 1.0), &mut out);
        assert_eq!(out, vec![0]);
    }
}
