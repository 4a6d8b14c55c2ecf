pub mod polyline;
pub mod spline;
pub mod vec;

pub use vec::{Vec2, Vec3};

pub const PI: f32 = std::f32::consts::PI;

/// Clamps x to be in the range [min, max].
pub fn clamp(x: f32, min: f32, max: f32) -> f32 {
	f32::max(min, f32::min(max, x))
}

/// Linearly interpolates from a to b.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
	a + t * (b - a)
}

/// Remaps a value from one range to another.
/// The minimum of either range may be larger or smaller than the maximum.
pub fn map_range(x: f32, min: f32, max: f32, new_min: f32, new_max: f32) -> f32 {
	(x - min) * (new_max - new_min) / (max - min) + new_min
}
