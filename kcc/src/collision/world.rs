//! Parry-backed collision world implementing [`CollisionQueries`].
//!
//! This is intended to be built once from a set of collider definitions (typically sourced from
//! level data) and then queried by every agent of a batch concurrently.
//!
//! Design goals
//! - Deterministic: given the same definitions, build identical collider lists and sub-keys.
//! - Query-focused: the world only answers casts and distance queries. Body state (velocities,
//!   masses) lives in a [`RigidBodyStore`](crate::bodies::RigidBodyStore).
//! - Read-only while agents run: moving a collider needs `&mut self`, so it can only happen
//!   between batches.

use rapier3d::parry::shape::{HalfSpace, SharedShape};
use thiserror::Error;

use super::{
    broad::{self, BroadEntry, WorldAccel},
    narrow_phase,
    query::{CastHits, CollisionQueries, QueryShape},
    types::{BodyIndex, CastHit, ColliderKey, DistanceHit, Iso, Quat, Transform, Vec3},
};

/// Extra margin on swept AABBs so near misses still reach the narrow phase.
const BROAD_MARGIN: f32 = 0.01;

/// Canonical, schema-agnostic definition of a world collider.
///
/// Conventions
/// - Units are meters.
/// - For planes, the normal is derived from the pose: `normal = rotation * +Y`,
///   and `dist = dot(normal, translation) + offset_along_normal`.
#[derive(Clone, Debug)]
pub struct ColliderDef {
    /// Body the collider is attached to. Colliders of static geometry still name a (static) body.
    pub body: BodyIndex,
    /// World-space pose.
    pub transform: Transform,
    /// Collider shape parameters.
    pub shape: ColliderShapeDef,
    /// Triggers are reported by casts but never block motion.
    pub is_trigger: bool,
}

impl ColliderDef {
    #[inline]
    pub fn new(body: BodyIndex, transform: Transform, shape: ColliderShapeDef) -> Self {
        Self {
            body,
            transform,
            shape,
            is_trigger: false,
        }
    }

    #[inline]
    pub fn trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }
}

/// Supported collider shapes.
///
/// Keep this intentionally small and deterministic. Extend as needed.
#[derive(Clone, Copy, Debug)]
pub enum ColliderShapeDef {
    /// Infinite plane (half-space), offset along the pose-derived normal.
    Plane { offset_along_normal: f32 },

    /// Oriented cuboid with given half-extents (meters).
    Cuboid { half_extents: Vec3 },

    /// Sphere/ball (meters).
    Sphere { radius: f32 },

    /// Y-aligned capsule (meters).
    CapsuleY { radius: f32, half_height: f32 },

    /// Y-aligned cylinder (meters).
    CylinderY { radius: f32, half_height: f32 },
}

impl ColliderShapeDef {
    #[inline]
    pub fn is_plane(&self) -> bool {
        matches!(self, ColliderShapeDef::Plane { .. })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum WorldBuildError {
    #[error("collider {index} has a non-finite pose")]
    NonFinitePose { index: usize },

    #[error("collider {index} has a non-positive or non-finite dimension")]
    InvalidDimension { index: usize },

    #[error("no collider {key:?} on body {body:?}")]
    UnknownCollider { body: BodyIndex, key: ColliderKey },
}

struct WorldCollider {
    body: BodyIndex,
    key: ColliderKey,
    def: ColliderShapeDef,
    shape: SharedShape,
    pose: Iso,
    is_trigger: bool,
}

/// In-memory collider set plus broad-phase accelerator.
pub struct CollisionWorld {
    colliders: Vec<WorldCollider>,
    accel: WorldAccel,
}

impl CollisionWorld {
    /// Build a world from collider definitions.
    ///
    /// Determinism
    /// - Definitions are stably sorted by body; each collider's [`ColliderKey`] is its ordinal
    ///   among the colliders of its body in input order.
    pub fn build(defs: impl IntoIterator<Item = ColliderDef>) -> Result<Self, WorldBuildError> {
        let mut defs: Vec<ColliderDef> = defs.into_iter().collect();

        for (index, def) in defs.iter().enumerate() {
            validate_def(index, def)?;
        }
        defs.sort_by_key(|d| d.body);

        let mut colliders = Vec::with_capacity(defs.len());
        let mut prev_body = None;
        let mut ordinal = 0u32;
        for def in defs {
            if prev_body != Some(def.body) {
                prev_body = Some(def.body);
                ordinal = 0;
            }
            let (shape, pose) = shape_and_pose(&def.shape, &def.transform);
            colliders.push(WorldCollider {
                body: def.body,
                key: ColliderKey(ordinal),
                def: def.shape,
                shape,
                pose,
                is_trigger: def.is_trigger,
            });
            ordinal += 1;
        }

        let accel = build_accel(&colliders);
        Ok(Self { colliders, accel })
    }

    /// An empty world: every query reports nothing.
    pub fn empty() -> Self {
        Self {
            colliders: Vec::new(),
            accel: broad::build_world_accel(std::iter::empty()),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    /// Move a collider (e.g. one attached to a dynamic body that was integrated this step).
    ///
    /// The broad phase is stale until [`Self::rebuild_broad_phase`] is called.
    pub fn set_collider_pose(
        &mut self,
        body: BodyIndex,
        key: ColliderKey,
        transform: Transform,
    ) -> Result<(), WorldBuildError> {
        let index = self
            .colliders
            .iter()
            .position(|c| c.body == body && c.key == key)
            .ok_or(WorldBuildError::UnknownCollider { body, key })?;
        if !transform.is_finite() {
            return Err(WorldBuildError::NonFinitePose { index });
        }

        let collider = &mut self.colliders[index];
        let (shape, pose) = shape_and_pose(&collider.def, &transform);
        collider.shape = shape;
        collider.pose = pose;
        Ok(())
    }

    /// Refit the broad phase after colliders moved.
    pub fn rebuild_broad_phase(&mut self) {
        self.accel = build_accel(&self.colliders);
    }
}

impl CollisionQueries for CollisionWorld {
    fn cast_shape(
        &self,
        shape: &QueryShape<'_>,
        start: &Iso,
        displacement: &Vec3,
        out: &mut CastHits,
    ) {
        out.clear();

        let region = broad::swept_shape_aabb(shape.shape, start, displacement, BROAD_MARGIN);
        let mut candidates = Vec::new();
        broad::query_candidates(&self.accel, &region, &mut candidates);

        for idx in candidates {
            let collider = &self.colliders[idx];
            if !shape.filter.accepts(collider.body)
                || (collider.is_trigger && !shape.filter.include_triggers)
            {
                continue;
            }

            let hit = match narrow_phase::cast_against_collider(
                start,
                shape.shape,
                displacement,
                &collider.pose,
                &*collider.shape,
            ) {
                Ok(Some(hit)) => hit,
                Ok(None) => continue,
                Err(_) => {
                    log::warn!(
                        "Unsupported cast pair {:?} vs {:?}",
                        shape.shape.shape_type(),
                        collider.shape.shape_type()
                    );
                    continue;
                }
            };

            let hit = CastHit {
                body: collider.body,
                key: collider.key,
                fraction: hit.fraction,
                position: hit.position,
                normal: hit.normal,
            };
            if collider.is_trigger {
                out.trigger_hits.push(hit);
            } else {
                out.hits.push(hit);
            }
        }
    }

    fn compute_distance(
        &self,
        shape: &QueryShape<'_>,
        pose: &Iso,
        max_distance: f32,
        out: &mut Vec<DistanceHit>,
    ) {
        out.clear();

        let region = broad::shape_aabb(shape.shape, pose, max_distance.max(0.0) + BROAD_MARGIN);
        let mut candidates = Vec::new();
        broad::query_candidates(&self.accel, &region, &mut candidates);

        for idx in candidates {
            let collider = &self.colliders[idx];
            if !shape.filter.accepts(collider.body) || collider.is_trigger {
                continue;
            }

            match narrow_phase::contact_with_collider(
                pose,
                shape.shape,
                &collider.pose,
                &*collider.shape,
                max_distance,
            ) {
                Ok(Some(contact)) => out.push(DistanceHit {
                    body: collider.body,
                    key: collider.key,
                    distance: contact.distance,
                    position: contact.position,
                    normal: contact.normal,
                }),
                Ok(None) => {}
                Err(_) => log::warn!(
                    "Unsupported contact pair {:?} vs {:?}",
                    shape.shape.shape_type(),
                    collider.shape.shape_type()
                ),
            }
        }
    }
}

fn build_accel(colliders: &[WorldCollider]) -> WorldAccel {
    broad::build_world_accel(colliders.iter().map(|c| {
        if c.def.is_plane() {
            BroadEntry::Plane
        } else {
            BroadEntry::Finite(c.shape.compute_aabb(&c.pose))
        }
    }))
}

fn validate_def(index: usize, def: &ColliderDef) -> Result<(), WorldBuildError> {
    if !def.transform.is_finite() {
        return Err(WorldBuildError::NonFinitePose { index });
    }

    let positive = |v: f32| v.is_finite() && v > 0.0;
    let valid = match def.shape {
        ColliderShapeDef::Plane {
            offset_along_normal,
        } => offset_along_normal.is_finite(),
        ColliderShapeDef::Cuboid { half_extents } => half_extents.iter().all(|&v| positive(v)),
        ColliderShapeDef::Sphere { radius } => positive(radius),
        ColliderShapeDef::CapsuleY {
            radius,
            half_height,
        }
        | ColliderShapeDef::CylinderY {
            radius,
            half_height,
        } => positive(radius) && half_height.is_finite() && half_height >= 0.0,
    };

    if valid {
        Ok(())
    } else {
        Err(WorldBuildError::InvalidDimension { index })
    }
}

/// Build the parry shape and its world pose for a definition placed at `transform`.
fn shape_and_pose(def: &ColliderShapeDef, transform: &Transform) -> (SharedShape, Iso) {
    match *def {
        ColliderShapeDef::Plane {
            offset_along_normal,
        } => {
            // Derive world-space plane normal from pose rotation: n = R * +Y.
            // Then compute plane dist: n ⋅ x = dist, where x is any point on the plane.
            let unit_n = transform.rotation * Vec3::y_axis();
            let dist = unit_n.dot(&transform.translation) + offset_along_normal;

            // The plane `unit_n ⋅ x = dist` is the half-space placed at `unit_n * dist`.
            let halfspace = HalfSpace::new(unit_n);
            let n = unit_n.into_inner() * dist;
            (SharedShape::new(halfspace), Iso::translation(n.x, n.y, n.z))
        }
        ColliderShapeDef::Cuboid { half_extents } => (
            SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z),
            transform.iso(),
        ),
        ColliderShapeDef::Sphere { radius } => (SharedShape::ball(radius), transform.iso()),
        ColliderShapeDef::CapsuleY {
            radius,
            half_height,
        } => (SharedShape::capsule_y(half_height, radius), transform.iso()),
        ColliderShapeDef::CylinderY {
            radius,
            half_height,
        } => (SharedShape::cylinder(half_height, radius), transform.iso()),
    }
}

/// Convenience: a static ground plane through `translation` with normal `rotation * +Y`.
#[inline]
pub fn plane_from_pose(body: BodyIndex, rotation: Quat, translation: Vec3) -> ColliderDef {
    ColliderDef::new(
        body,
        Transform::new(translation, rotation),
        ColliderShapeDef::Plane {
            offset_along_normal: 0.0,
        },
    )
}

/// Convenience: a cuboid collider with given half extents and pose.
#[inline]
pub fn cuboid_from_pose(body: BodyIndex, half_extents: Vec3, transform: Transform) -> ColliderDef {
    ColliderDef::new(body, transform, ColliderShapeDef::Cuboid { half_extents })
}
