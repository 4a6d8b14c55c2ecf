use super::height_gradient;
use math::Vec3;

/// Divergence of a planar 2D vector field via central differences.
/// Out-of-bounds samples read as 0.
pub fn divergence_2d(fx: &[f32], fy: &[f32], x: u32, y: u32, w: u32, h: u32) -> f32 {
	let xi = (y * w + x) as usize;
	let fx_l = if x > 0 { fx[xi - 1] } else { 0.0 };
	let fx_r = if x < w - 1 { fx[xi + 1] } else { 0.0 };
	let fy_d = if y > 0 { fy[xi - w as usize] } else { 0.0 };
	let fy_u = if y < h - 1 { fy[xi + w as usize] } else { 0.0 };
	(fx_r - fx_l + fy_u - fy_d) * 0.5
}

/// Divergence of the scaled projected-gradient field of a height map,
/// normalized to [-1, +1]. Positive = valley (converging flow), negative =
/// ridge (diverging flow).
///
/// Per pixel: n = normalize(-gx, -gy, normal_scale), field = (-nx, -ny),
/// divergence = d(field.x)/dx + d(field.y)/dy.
pub fn divergence_field(height: &[f32], w: u32, h: u32, normal_scale: f32) -> Vec<f32> {
	let n = (w * h) as usize;
	let scale = if normal_scale > 0.0 { normal_scale } else { 1.0 };

	let mut fx = vec![0.0f32; n];
	let mut fy = vec![0.0f32; n];

	for y in 0..h {
		for x in 0..w {
			let idx = (y * w + x) as usize;
			let g = height_gradient(height, x, y, w, h);
			let v = Vec3::new(-g.x, -g.y, scale);
			let len = v.length();
			if len > 1e-12 {
				// field = (-nx, -ny) = gradient direction after projection
				fx[idx] = g.x / len;
				fy[idx] = g.y / len;
			}
		}
	}

	let mut div = vec![0.0f32; n];
	for y in 0..h {
		for x in 0..w {
			div[(y * w + x) as usize] = divergence_2d(&fx, &fy, x, y, w, h);
		}
	}

	let max_abs = div.iter().fold(0.0f32, |m, v| m.max(v.abs()));
	if max_abs > 1e-12 {
		let inv = 1.0 / max_abs;
		for v in div.iter_mut() {
			*v *= inv;
		}
	}
	log::debug!("divergence normalized, max_abs was {:.6}", max_abs);

	div
}
