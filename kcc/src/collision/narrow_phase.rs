use nalgebra as na;
use rapier3d::parry::{
    query::{self, ShapeCastOptions, ShapeCastStatus},
    shape::Shape,
};

use super::types::{Iso, Point, Vec3};

/// Raw result of a cast against one collider, before body attribution.
#[derive(Clone, Copy, Debug)]
pub struct RawCastHit {
    pub fraction: f32,
    pub position: Point,
    pub normal: Vec3,
}

/// Raw result of a contact query against one collider, before body attribution.
#[derive(Clone, Copy, Debug)]
pub struct RawContact {
    pub distance: f32,
    pub position: Point,
    pub normal: Vec3,
}

/// Cast a moving shape against a single static collider and return its hit (if any).
///
/// - `shape_iso`: the moving shape's starting isometry in world space.
/// - `displacement`: the world-space translation of the sweep (meters).
/// - `collider_iso` / `collider`: the obstacle.
///
/// Returns the obstacle's surface normal (pointing toward the moving shape) and the fraction along
/// `displacement` where the hit occurs. A shape that starts out overlapping reports fraction 0.
pub fn cast_against_collider(
    shape_iso: &Iso,
    shape: &dyn Shape,
    displacement: &Vec3,
    collider_iso: &Iso,
    collider: &dyn Shape,
) -> Result<Option<RawCastHit>, query::Unsupported> {
    let mut opts = ShapeCastOptions::with_max_time_of_impact(1.0);
    opts.stop_at_penetration = true;

    let Some(hit) = query::cast_shapes(
        shape_iso,
        displacement,
        shape,
        collider_iso,
        &na::Vector3::zeros(),
        collider,
        opts,
    )?
    else {
        return Ok(None);
    };

    // normal2 is the obstacle's outward normal in its local frame.
    let mut normal = collider_iso.rotation * hit.normal2.into_inner();
    if matches!(hit.status, ShapeCastStatus::PenetratingOrWithinTargetDist)
        && normal.norm_squared() <= 1.0e-12
    {
        // Deep overlap without a usable witness normal: push back against the motion.
        normal = -displacement.try_normalize(1.0e-12).unwrap_or_else(Vec3::y);
    }
    // Ensure the normal opposes motion (consistent with the slide logic).
    if normal.dot(displacement) > 0.0 {
        normal = -normal;
    }

    Ok(Some(RawCastHit {
        fraction: hit.time_of_impact.clamp(0.0, 1.0),
        position: collider_iso * hit.witness2,
        normal: normal.try_normalize(1.0e-12).unwrap_or_else(Vec3::y),
    }))
}

/// Signed distance between a shape and a collider, when closer than `max_distance`.
///
/// The normal is the obstacle's outward normal at the closest point, which is also the direction
/// that separates the shape when penetrating.
pub fn contact_with_collider(
    shape_iso: &Iso,
    shape: &dyn Shape,
    collider_iso: &Iso,
    collider: &dyn Shape,
    max_distance: f32,
) -> Result<Option<RawContact>, query::Unsupported> {
    // Collider first: with the halfspace second, parry measures a capsule from its far end.
    let Some(contact) = query::contact(collider_iso, collider, shape_iso, shape, max_distance)?
    else {
        return Ok(None);
    };

    Ok(Some(RawContact {
        distance: contact.dist,
        position: contact.point1,
        normal: contact.normal1.into_inner(),
    }))
}
