use math::Vec3;

/// Iterated 3x3 box blur. The kernel shrinks at the borders (averages only
/// the in-bounds neighborhood).
pub fn box_blur(data: &mut [f32], w: u32, h: u32, iterations: u32) {
	let n = (w * h) as usize;
	let mut temp = vec![0.0f32; n];

	for _ in 0..iterations {
		for y in 0..h as i32 {
			for x in 0..w as i32 {
				let mut sum = 0.0;
				let mut count = 0;
				for dy in -1..=1 {
					for dx in -1..=1 {
						let nx = x + dx;
						let ny = y + dy;
						if nx >= 0 && nx < w as i32 && ny >= 0 && ny < h as i32 {
							sum += data[(ny * w as i32 + nx) as usize];
							count += 1;
						}
					}
				}
				temp[(y * w as i32 + x) as usize] = sum / count as f32;
			}
		}
		data.copy_from_slice(&temp);
	}
}

/// Separable Gaussian blur with clamp-to-edge boundary. Radius = ceil(3 sigma).
pub fn gaussian_blur(input: &[f32], w: u32, h: u32, sigma: f32) -> Vec<f32> {
	let radius = (3.0 * sigma).ceil().max(1.0) as i32;
	let ksize = (2 * radius + 1) as usize;

	let mut kernel = vec![0.0f32; ksize];
	let mut sum = 0.0;
	for (i, k) in kernel.iter_mut().enumerate() {
		let x = (i as i32 - radius) as f32;
		*k = (-0.5 * x * x / (sigma * sigma)).exp();
		sum += *k;
	}
	for k in kernel.iter_mut() {
		*k /= sum;
	}

	let n = (w * h) as usize;
	let mut temp = vec![0.0f32; n];
	let mut output = vec![0.0f32; n];

	for y in 0..h as i32 {
		for x in 0..w as i32 {
			let mut acc = 0.0;
			for k in -radius..=radius {
				let sx = (x + k).clamp(0, w as i32 - 1);
				acc += input[(y * w as i32 + sx) as usize] * kernel[(k + radius) as usize];
			}
			temp[(y * w as i32 + x) as usize] = acc;
		}
	}

	for y in 0..h as i32 {
		for x in 0..w as i32 {
			let mut acc = 0.0;
			for k in -radius..=radius {
				let sy = (y + k).clamp(0, h as i32 - 1);
				acc += temp[(sy * w as i32 + x) as usize] * kernel[(k + radius) as usize];
			}
			output[(y * w as i32 + x) as usize] = acc;
		}
	}

	output
}

/// Renormalizes an interleaved-by-plane normal field after per-component
/// filtering. Degenerate vectors become (0, 0, 1).
pub fn renormalize_planes(nx: &mut [f32], ny: &mut [f32], nz: &mut [f32]) {
	for i in 0..nx.len() {
		let n = Vec3::new(nx[i], ny[i], nz[i]);
		let n = if n.length() > 1e-4 {
			n.normalize_or(Vec3::Z)
		} else {
			Vec3::Z
		};
		nx[i] = n.x;
		ny[i] = n.y;
		nz[i] = n.z;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn box_blur_preserves_constant() {
		let mut f = vec![0.25f32; 36];
		box_blur(&mut f, 6, 6, 3);
		for v in f {
			assert!((v - 0.25).abs() < 1e-6);
		}
	}

	#[test]
	fn box_blur_smooths_impulse() {
		let mut f = vec![0.0f32; 25];
		f[12] = 1.0;
		box_blur(&mut f, 5, 5, 1);
		assert!((f[12] - 1.0 / 9.0).abs() < 1e-6);
		assert!((f[11] - 1.0 / 9.0).abs() < 1e-6);
		// Mass is conserved away from borders.
		let total: f32 = f.iter().sum();
		assert!((total - 1.0).abs() < 1e-5);
	}

	#[test]
	fn gaussian_preserves_constant() {
		let f = vec![0.7f32; 49];
		let g = gaussian_blur(&f, 7, 7, 1.5);
		for v in g {
			assert!((v - 0.7).abs() < 1e-5);
		}
	}

	#[test]
	fn renormalize_fixes_degenerates() {
		let mut nx = [0.5, 0.0];
		let mut ny = [0.5, 0.0];
		let mut nz = [0.5, 0.0];
		renormalize_planes(&mut nx, &mut ny, &mut nz);
		let len = (nx[0] * nx[0] + ny[0] * ny[0] + nz[0] * nz[0]).sqrt();
		assert!((len - 1.0).abs() < 1e-6);
		assert_eq!((nx[1], ny[1], nz[1]), (0.0, 0.0, 1.0));
	}
}
