use super::height_normal;
use math::Vec3;

/// Converts one height channel to a planar normal map (nx, ny, nz planes).
///
/// `scale` is the height-to-normal sensitivity: the gradient is effectively
/// multiplied by `scale` before the z=1 normalization, folded into the z
/// component as normalize(-gx, -gy, 1/scale).
pub fn height_to_normal_planes(
	height: &[f32],
	w: u32,
	h: u32,
	scale: f32,
) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
	let n = (w * h) as usize;
	let z_scale = 1.0 / scale;

	let mut nx = vec![0.0f32; n];
	let mut ny = vec![0.0f32; n];
	let mut nz = vec![0.0f32; n];

	for y in 0..h {
		for x in 0..w {
			let idx = (y * w + x) as usize;
			let v = height_normal(height, x, y, w, h, z_scale);
			nx[idx] = v.x;
			ny[idx] = v.y;
			nz[idx] = v.z;
		}
	}

	(nx, ny, nz)
}

/// Interleaves planar normal components for the solvers.
pub fn pack_normals(nx: &[f32], ny: &[f32], nz: &[f32]) -> Vec<Vec3> {
	(0..nx.len()).map(|i| Vec3::new(nx[i], ny[i], nz[i])).collect()
}

/// Splits interleaved normals back into planes.
pub fn unpack_normals(normals: &[Vec3], nx: &mut [f32], ny: &mut [f32], nz: &mut [f32]) {
	for (i, n) in normals.iter().enumerate() {
		nx[i] = n.x;
		ny[i] = n.y;
		nz[i] = n.z;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flat_interior_points_up() {
		let f = vec![0.5f32; 25];
		let (nx, ny, nz) = height_to_normal_planes(&f, 5, 5, 1.0);
		assert_eq!((nx[12], ny[12], nz[12]), (0.0, 0.0, 1.0));
	}

	#[test]
	fn ramp_tilts_against_slope() {
		// Height increases with x, so the normal leans toward -x.
		let mut f = vec![0.0f32; 25];
		for y in 0..5 {
			for x in 0..5 {
				f[y * 5 + x] = 0.2 + 0.1 * x as f32;
			}
		}
		let (nx, _, nz) = height_to_normal_planes(&f, 5, 5, 1.0);
		assert!(nx[12] < 0.0);
		assert!(nz[12] > 0.0);
	}

	#[test]
	fn scale_sharpens() {
		let mut f = vec![0.0f32; 25];
		for y in 0..5 {
			for x in 0..5 {
				f[y * 5 + x] = 0.2 + 0.1 * x as f32;
			}
		}
		let (nx1, _, _) = height_to_normal_planes(&f, 5, 5, 1.0);
		let (nx4, _, _) = height_to_normal_planes(&f, 5, 5, 4.0);
		assert!(nx4[12].abs() > nx1[12].abs());
	}
}
