/*!
Kinematic character controller (KCC) settings and tolerances.

These constants centralize the parameters used by the simplex solver, the support check and
the collide-and-integrate loop. Keeping them together makes tuning easier and keeps the
numerical behavior identical across every agent.

Notes
- Distances are in meters, time in seconds, mass in kilograms.
- Favor practical world-space tolerances over machine epsilon for robust behavior.
- Per-agent values live in [`ControllerSettings`](crate::config::ControllerSettings); the
  `DEFAULT_*` constants below are its defaults.
*/

/// The single epsilon every solver comparison uses (plane velocities, determinants, cross
/// products, time-to-contact).
pub const SOLVER_EPSILON: f32 = 1.0e-4;

/// Squared [`SOLVER_EPSILON`], for comparisons against squared lengths.
pub const SOLVER_EPSILON_SQ: f32 = SOLVER_EPSILON * SOLVER_EPSILON;

/// Remaining step time below which the integrator stops iterating (seconds).
pub const TIME_EPSILON: f32 = 1.0e-6;

/// Distance a moving agent must be allowed to cover per solver call (meters).
/// Turned into a minimum time budget so the integrator never stalls at low speed.
pub const MIN_TRAVEL_DISTANCE: f32 = 0.01;

/// Lower bound on `dot(max_slope_normal, raw_normal)` when re-expressing a steep plane's
/// distance along its max-slope plane. 0.5 caps the re-expressed distance at twice the raw one.
pub const MAX_SLOPE_DISTANCE_FLOOR: f32 = 0.5;

/// Capacity of the solver's active plane set.
pub const MAX_SUPPORT_PLANES: usize = 4;

/// Separation from surfaces kept when landing or sliding (meters).
/// Too large creates visible gaps; too small risks jitter on contact.
pub const DEFAULT_SKIN_WIDTH: f32 = 0.02;

/// Distance within which surfaces count as touching (support probe length and penetration
/// query range, meters). Must exceed the skin width.
pub const DEFAULT_CONTACT_TOLERANCE: f32 = 0.1;

/// Maximum number of collide-and-integrate iterations per step.
/// Higher values help in tight corners at the cost of more queries.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Steepest walkable slope (degrees).
pub const DEFAULT_MAX_SLOPE_DEG: f32 = 60.0;

/// Speed clamp applied to the agent's velocity before solving (m/s).
pub const DEFAULT_MAX_SPEED: f32 = 10.0;

/// Mass used when pushing other bodies around (kg).
pub const DEFAULT_MASS: f32 = 1.0;

/// Fraction of the penetration depth recovered per step when pushing dynamic bodies.
pub const DEFAULT_TAU: f32 = 0.4;

/// Fraction of the approaching velocity removed per step when pushing dynamic bodies.
pub const DEFAULT_DAMPING: f32 = 0.9;

/// Gravity magnitude in meters per second squared (positive value).
pub const GRAVITY_MPS2: f32 = 9.81;

/// Air-control multiplier for input velocity while not supported.
///
/// Convention:
/// - 1.0 = full ground control in air
/// - 0.0 = no air control
pub const DEFAULT_AIR_CONTROL: f32 = 0.4;
