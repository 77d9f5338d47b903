//! The collision query boundary consumed by the controller.
//!
//! The support check and the integrator never talk to a concrete world; they only need two
//! capabilities: "sweep this shape along a displacement and report everything it touches" and
//! "report everything within some distance of this shape". [`CollisionWorld`] implements them on
//! top of parry, and tests or other engines can provide their own.
//!
//! [`CollisionWorld`]: super::world::CollisionWorld

use rapier3d::parry::shape::Shape;

use super::types::{BodyIndex, CastHit, DistanceHit, Iso, Vec3};

/// Filtering applied to a single query.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryFilter {
    /// Colliders attached to this body are never reported (the querying agent itself).
    pub exclude_body: Option<BodyIndex>,
    /// Report trigger colliders (in [`CastHits::trigger_hits`] for casts). When false they are
    /// skipped.
    pub include_triggers: bool,
}

impl QueryFilter {
    #[inline]
    pub fn excluding(body: Option<BodyIndex>) -> Self {
        Self {
            exclude_body: body,
            include_triggers: false,
        }
    }

    #[inline]
    pub fn with_triggers(mut self, include: bool) -> Self {
        self.include_triggers = include;
        self
    }

    #[inline]
    pub fn accepts(&self, body: BodyIndex) -> bool {
        self.exclude_body != Some(body)
    }
}

/// A borrowed shape plus the filter to query it with.
///
/// This is a value the caller owns for the duration of a step, so changing the filter never
/// touches the collider stored in the world.
#[derive(Clone, Copy)]
pub struct QueryShape<'a> {
    pub shape: &'a dyn Shape,
    pub filter: QueryFilter,
}

impl<'a> QueryShape<'a> {
    #[inline]
    pub fn new(shape: &'a dyn Shape, filter: QueryFilter) -> Self {
        Self { shape, filter }
    }

    /// Same shape with a different filter.
    #[inline]
    pub fn with_filter(self, filter: QueryFilter) -> Self {
        Self {
            shape: self.shape,
            filter,
        }
    }
}

impl std::fmt::Debug for QueryShape<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryShape")
            .field("shape_type", &self.shape.shape_type())
            .field("filter", &self.filter)
            .finish()
    }
}

/// Output buffers of a shape cast. Blocking hits and trigger hits are kept apart so triggers can
/// be reported without ever constraining motion.
#[derive(Clone, Debug, Default)]
pub struct CastHits {
    pub hits: Vec<CastHit>,
    pub trigger_hits: Vec<CastHit>,
}

impl CastHits {
    #[inline]
    pub fn clear(&mut self) {
        self.hits.clear();
        self.trigger_hits.clear();
    }

    /// Earliest blocking hit, if any.
    pub fn closest(&self) -> Option<&CastHit> {
        self.hits
            .iter()
            .min_by(|a, b| a.fraction.total_cmp(&b.fraction))
    }
}

/// Shape-cast and distance queries against a world of static and dynamic colliders.
///
/// Implementations must be safe to share between threads: agents of a batch query the same world
/// concurrently and nothing writes to it while they do.
pub trait CollisionQueries: Sync {
    /// Sweep `shape` from `start` by `displacement` and collect every collider it touches.
    ///
    /// `out` is cleared first. Hits are unsorted. Colliders already overlapping at `start` are
    /// reported with `fraction == 0`.
    fn cast_shape(
        &self,
        shape: &QueryShape<'_>,
        start: &Iso,
        displacement: &Vec3,
        out: &mut CastHits,
    );

    /// Collect every blocking collider within `max_distance` of `shape` posed at `pose`.
    ///
    /// `out` is cleared first. Penetrating colliders report a negative distance.
    fn compute_distance(
        &self,
        shape: &QueryShape<'_>,
        pose: &Iso,
        max_distance: f32,
        out: &mut Vec<DistanceHit>,
    );
}
