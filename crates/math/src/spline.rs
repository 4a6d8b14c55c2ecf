use super::Vec2;

/// Derivative of the uniform Catmull-Rom spline through p0..p3 at t in [0,1].
///
/// q(t)  = 0.5 * [(-t^3+2t^2-t) p0 + (3t^3-5t^2+2) p1 + (-3t^3+4t^2+t) p2 + (t^3-t^2) p3]
/// q'(t) = 0.5 * [(-3t^2+4t-1) p0 + (9t^2-10t) p1 + (-9t^2+8t+1) p2 + (3t^2-2t) p3]
pub fn catmull_rom_derivative(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
	let t2 = t * t;
	let b0 = -3.0 * t2 + 4.0 * t - 1.0;
	let b1 = 9.0 * t2 - 10.0 * t;
	let b2 = -9.0 * t2 + 8.0 * t + 1.0;
	let b3 = 3.0 * t2 - 2.0 * t;
	0.5 * (b0 * p0 + b1 * p1 + b2 * p2 + b3 * p3)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn straight_chain_derivative_points_forward() {
		let p = [
			Vec2::new(0.0, 0.0),
			Vec2::new(1.0, 0.0),
			Vec2::new(2.0, 0.0),
			Vec2::new(3.0, 0.0),
		];
		for i in 0..=4 {
			let t = i as f32 / 4.0;
			let d = catmull_rom_derivative(p[0], p[1], p[2], p[3], t);
			assert!((d.x - 1.0).abs() < 1e-6);
			assert!(d.y.abs() < 1e-6);
		}
	}

	#[test]
	fn midpoint_matches_chord_for_symmetric_arc() {
		let d = catmull_rom_derivative(
			Vec2::new(0.0, 1.0),
			Vec2::new(1.0, 0.0),
			Vec2::new(2.0, 0.0),
			Vec2::new(3.0, 1.0),
			0.5,
		);
		// Symmetric control points: the tangent at the middle is horizontal.
		assert!(d.y.abs() < 1e-6);
		assert!(d.x > 0.0);
	}
}
