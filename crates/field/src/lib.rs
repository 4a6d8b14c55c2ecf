pub mod divergence;
pub mod eigen;
pub mod fft;
pub mod filter;
pub mod hessian;
pub mod normal;

use math::{Vec2, Vec3};

/// Height gradient via central differences. Out-of-bounds samples read as 0
/// (clamp-to-border), which keeps the Laplacian self-adjoint for the masked
/// Poisson solve.
pub fn height_gradient(height: &[f32], x: u32, y: u32, w: u32, h: u32) -> Vec2 {
	let idx = (y * w + x) as usize;
	let l = if x > 0 { height[idx - 1] } else { 0.0 };
	let r = if x < w - 1 { height[idx + 1] } else { 0.0 };
	let d = if y > 0 { height[idx - w as usize] } else { 0.0 };
	let u = if y < h - 1 { height[idx + w as usize] } else { 0.0 };
	Vec2::new((r - l) * 0.5, (u - d) * 0.5)
}

/// Surface normal from the height gradient. `z_scale` sets the z component
/// before renormalization: larger = flatter normals, smaller = sharper.
pub fn height_normal(height: &[f32], x: u32, y: u32, w: u32, h: u32, z_scale: f32) -> Vec3 {
	let g = height_gradient(height, x, y, w, h);
	Vec3::new(-g.x, -g.y, z_scale).normalize_or(Vec3::Z)
}

/// Rescales the z component of a unit normal and renormalizes.
pub fn scale_normal(n: Vec3, scale: f32) -> Vec3 {
	Vec3::new(n.x, n.y, n.z * scale).normalize_or(Vec3::ZERO)
}

/// Rotates `surface` into a frame where `reference` maps to (0,0,1).
pub fn to_tangent(reference: Vec3, surface: Vec3) -> Vec3 {
	let n = reference;
	let up = if n.z.abs() < 0.999 { Vec3::Z } else { Vec3::new(1.0, 0.0, 0.0) };
	let t = up.cross(n).normalize_or(Vec3::new(1.0, 0.0, 0.0));
	let b = n.cross(t);
	Vec3::new(t.dot(surface), b.dot(surface), n.dot(surface))
}

/// Inverse of [`to_tangent`]: rotates `surface` out of the tangent frame,
/// with `reference` as the new z axis.
pub fn from_tangent(reference: Vec3, surface: Vec3) -> Vec3 {
	let n = reference;
	let up = if n.z.abs() < 0.999 { Vec3::Z } else { Vec3::new(1.0, 0.0, 0.0) };
	let t = up.cross(n).normalize_or(Vec3::new(1.0, 0.0, 0.0));
	let b = n.cross(t);
	t * surface.x + b * surface.y + n * surface.z
}

/// Bilinear sample with clamp-to-edge boundary.
pub fn bilinear(data: &[f32], w: u32, h: u32, fx: f32, fy: f32) -> f32 {
	let fx = math::clamp(fx, 0.0, (w - 1) as f32);
	let fy = math::clamp(fy, 0.0, (h - 1) as f32);

	let x0 = fx as u32;
	let y0 = fy as u32;
	let x1 = if x0 < w - 1 { x0 + 1 } else { x0 };
	let y1 = if y0 < h - 1 { y0 + 1 } else { y0 };

	let sx = fx - x0 as f32;
	let sy = fy - y0 as f32;

	let v00 = data[(y0 * w + x0) as usize];
	let v10 = data[(y0 * w + x1) as usize];
	let v01 = data[(y1 * w + x0) as usize];
	let v11 = data[(y1 * w + x1) as usize];

	let top = v00 + sx * (v10 - v00);
	let bottom = v01 + sx * (v11 - v01);
	top + sy * (bottom - top)
}

/// Bilinear sample of a planar 2D vector field.
pub fn bilinear_vec2(px: &[f32], py: &[f32], w: u32, h: u32, fx: f32, fy: f32) -> Vec2 {
	Vec2::new(bilinear(px, w, h, fx, fy), bilinear(py, w, h, fx, fy))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn gradient_reads_zero_outside() {
		// Single bright pixel at the corner of a 2x2 field.
		let f = [1.0, 0.0, 0.0, 0.0];
		let g = height_gradient(&f, 0, 0, 2, 2);
		// Left and down neighbors are outside and read as 0.
		assert_eq!(g, Vec2::new(0.0, 0.0));
		let g = height_gradient(&f, 1, 0, 2, 2);
		assert_eq!(g, Vec2::new(-0.5, 0.0));
	}

	#[test]
	fn tangent_round_trip() {
		let n = Vec3::new(0.3, -0.2, 0.933).normalize_or(Vec3::Z);
		let v = Vec3::new(0.1, 0.7, 0.707).normalize_or(Vec3::Z);
		let rt = from_tangent(n, to_tangent(n, v));
		assert!((rt.x - v.x).abs() < 1e-5);
		assert!((rt.y - v.y).abs() < 1e-5);
		assert!((rt.z - v.z).abs() < 1e-5);
	}

	#[test]
	fn tangent_of_reference_is_z() {
		let n = Vec3::new(0.6, 0.0, 0.8);
		let t = to_tangent(n, n);
		assert!(t.x.abs() < 1e-6 && t.y.abs() < 1e-6);
		assert!((t.z - 1.0).abs() < 1e-6);
	}

	#[test]
	fn bilinear_interpolates() {
		let f = [0.0, 1.0, 0.0, 1.0];
		assert!((bilinear(&f, 2, 2, 0.5, 0.5) - 0.5).abs() < 1e-6);
		assert_eq!(bilinear(&f, 2, 2, -3.0, 0.0), 0.0);
	}
}
