use super::SolveStats;
use math::Vec3;

/// Parameters for the constrained solve. Zeros fall back to the defaults.
#[derive(Clone, Copy, Debug)]
pub struct PoissonParams {
	pub max_iterations: u32,
	pub tolerance: f32,
	/// Heights at or below this are Dirichlet-held at zero; everything else
	/// is clamped to stay at least this positive.
	pub zero_threshold: f32,
}

impl Default for PoissonParams {
	fn default() -> Self {
		Self {
			max_iterations: 1000,
			tolerance: 1e-5,
			zero_threshold: 1e-6,
		}
	}
}

/// Target Laplacian from a normal field: g = -n.xy / n.z, L = div g.
/// Near-horizontal normals (|nz| < 1e-6) contribute zero gradient.
fn normals_to_laplacian(normals: &[Vec3], w: u32, h: u32) -> Vec<f32> {
	let n = (w * h) as usize;
	let mut gx = vec![0.0f32; n];
	let mut gy = vec![0.0f32; n];

	for i in 0..n {
		let nz = normals[i].z;
		if nz.abs() >= 1e-6 {
			gx[i] = -normals[i].x / nz;
			gy[i] = -normals[i].y / nz;
		}
	}

	let mut laplacian = vec![0.0f32; n];
	for y in 0..h {
		for x in 0..w {
			laplacian[(y * w + x) as usize] = field::divergence::divergence_2d(&gx, &gy, x, y, w, h);
		}
	}
	laplacian
}

fn gauss_seidel_sweep(
	heights: &mut [f32],
	laplacian: &[f32],
	mask: &[bool],
	w: u32,
	h: u32,
	pos_epsilon: f32,
) -> f32 {
	let mut max_change = 0.0f32;

	for y in 0..h {
		for x in 0..w {
			let idx = (y * w + x) as usize;
			if mask[idx] {
				continue;
			}

			let left = if x > 0 { heights[idx - 1] } else { 0.0 };
			let right = if x < w - 1 { heights[idx + 1] } else { 0.0 };
			let up = if y > 0 { heights[idx - w as usize] } else { 0.0 };
			let down = if y < h - 1 { heights[idx + w as usize] } else { 0.0 };

			let new_val = ((left + right + up + down - laplacian[idx]) * 0.25).max(pos_epsilon);

			max_change = max_change.max((new_val - heights[idx]).abs());
			heights[idx] = new_val;
		}
	}

	max_change
}

/// RMS of the 5-point Laplacian residual over unmasked pixels.
fn residual(heights: &[f32], laplacian: &[f32], mask: &[bool], w: u32, h: u32) -> f32 {
	let mut sum_sq = 0.0f32;
	let mut count = 0u32;

	for y in 0..h {
		for x in 0..w {
			let idx = (y * w + x) as usize;
			if mask[idx] {
				continue;
			}

			let left = if x > 0 { heights[idx - 1] } else { 0.0 };
			let right = if x < w - 1 { heights[idx + 1] } else { 0.0 };
			let up = if y > 0 { heights[idx - w as usize] } else { 0.0 };
			let down = if y < h - 1 { heights[idx + w as usize] } else { 0.0 };

			let lap = left + right + up + down - 4.0 * heights[idx];
			let r = lap - laplacian[idx];
			sum_sq += r * r;
			count += 1;
		}
	}

	if count > 0 {
		(sum_sq / count as f32).sqrt()
	} else {
		0.0
	}
}

/// Reconstructs heights from a target normal field, holding no-data pixels
/// of the original at exactly zero and all other pixels strictly positive.
///
/// Warm-starts from the original heights with the mask zeroed, then runs
/// Gauss-Seidel sweeps until `max|dh| < tolerance` or the iteration cap.
pub fn solve_constrained(
	original: &[f32],
	target_normals: &[Vec3],
	w: u32,
	h: u32,
	params: PoissonParams,
) -> (Vec<f32>, SolveStats) {
	let n = (w * h) as usize;
	let zero_thresh = params.zero_threshold;
	let pos_epsilon = zero_thresh;

	let mask: Vec<bool> = original.iter().map(|&v| v <= zero_thresh).collect();
	let laplacian = normals_to_laplacian(target_normals, w, h);

	let mut heights = original.to_vec();
	for i in 0..n {
		if mask[i] {
			heights[i] = 0.0;
		}
	}

	log::debug!(
		"constrained poisson: {}x{}, max_iter={}, tol={:.1e}",
		w, h, params.max_iterations, params.tolerance
	);

	let mut stats = SolveStats::default();
	for iter in 0..params.max_iterations {
		let max_change = gauss_seidel_sweep(&mut heights, &laplacian, &mask, w, h, pos_epsilon);

		// Re-enforce the Dirichlet mask; the sweep skips it, this is belt
		// and braces against future edits to the update.
		for i in 0..n {
			if mask[i] {
				heights[i] = 0.0;
			}
		}

		stats.iterations = iter + 1;

		let converged = max_change < params.tolerance;
		if converged || (iter + 1) % 250 == 0 {
			stats.residual = residual(&heights, &laplacian, &mask, w, h);
			log::debug!(
				"constrained poisson: iter {}, max_change={:.2e}, residual={:.2e}",
				iter + 1, max_change, stats.residual
			);
		}
		if converged {
			return (heights, stats);
		}
	}

	stats.residual = residual(&heights, &laplacian, &mask, w, h);
	log::warn!(
		"constrained poisson did not converge after {} iterations, residual={:.2e}",
		params.max_iterations, stats.residual
	);
	(heights, stats)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn flat_normals(n: usize) -> Vec<Vec3> {
		vec![Vec3::Z; n]
	}

	#[test]
	fn all_zero_field_stays_zero() {
		let original = vec![0.0f32; 64];
		let normals: Vec<Vec3> = (0..64)
			.map(|i| Vec3::new((i % 5) as f32 * 0.1 - 0.2, 0.3, 0.9).normalize_or(Vec3::Z))
			.collect();
		let (result, _) = solve_constrained(&original, &normals, 8, 8, PoissonParams::default());
		assert!(result.iter().all(|&v| v == 0.0));
	}

	#[test]
	fn mask_exact_and_positivity() {
		let mut original = vec![0.5f32; 64];
		for corner in [0usize, 7, 56, 63] {
			original[corner] = 0.0;
		}
		let params = PoissonParams { max_iterations: 500, ..Default::default() };
		let (result, stats) = solve_constrained(&original, &flat_normals(64), 8, 8, params);

		for corner in [0usize, 7, 56, 63] {
			assert_eq!(result[corner], 0.0);
		}
		let eps = params.zero_threshold;
		let mut max = 0.0f32;
		for (i, &v) in result.iter().enumerate() {
			if original[i] > eps {
				assert!(v >= eps, "pixel {} dropped below epsilon: {}", i, v);
				max = max.max(v);
			}
		}
		// Gauss-Seidel averaging with zero border reads obeys the maximum
		// principle: the warm-start maximum is never exceeded.
		assert!(max <= 0.5 + 1e-3, "max {}", max);
		assert!(stats.iterations <= 500);
	}

	#[test]
	fn round_trips_a_bump_up_to_discretization() {
		// Smooth positive bump with a zero ring; reconstructing from its own
		// normals should land close to the input (DC pinned by the ring).
		let (w, h) = (16u32, 16u32);
		let n = (w * h) as usize;
		let mut heights = vec![0.0f32; n];
		for y in 0..h {
			for x in 0..w {
				if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
					continue;
				}
				let fx = (x as f32 / (w - 1) as f32) * std::f32::consts::PI;
				let fy = (y as f32 / (h - 1) as f32) * std::f32::consts::PI;
				heights[(y * w + x) as usize] = 0.05 + 0.3 * fx.sin() * fy.sin();
			}
		}

		let (nx, ny, nz) = field::normal::height_to_normal_planes(&heights, w, h, 1.0);
		let normals = field::normal::pack_normals(&nx, &ny, &nz);

		let params = PoissonParams { max_iterations: 2000, ..Default::default() };
		let (result, _) = solve_constrained(&heights, &normals, w, h, params);

		for i in 0..n {
			if heights[i] == 0.0 {
				assert_eq!(result[i], 0.0);
			} else {
				assert!(
					(result[i] - heights[i]).abs() < 0.1,
					"pixel {}: {} vs {}",
					i, result[i], heights[i]
				);
			}
		}
	}
}
