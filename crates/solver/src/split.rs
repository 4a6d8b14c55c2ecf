use super::SolveStats;
use field::eigen;
use field::hessian::{self, Border, Hessian2, Kernel};
use math::{Vec2, Vec3};

const GRADIENT_WEIGHT: f32 = 2.0;
const HESSIAN_WEIGHT: f32 = 1.0;

#[derive(Clone, Copy, Debug)]
pub struct SplitParams {
	pub kernel: Kernel,
	pub border: Border,
	pub undefined: Option<f32>,
	pub max_iterations: u32,
	pub tolerance: f32,
	/// SOR relaxation factor, clamped to [1, 1.95].
	pub sor_omega: f32,
}

impl Default for SplitParams {
	fn default() -> Self {
		Self {
			kernel: Kernel::ThreeByThree,
			border: Border::ClampEdge,
			undefined: None,
			max_iterations: 100,
			tolerance: 1e-5,
			sor_omega: 1.7,
		}
	}
}

/// Complementary decomposition of a height field along its curvature axes.
pub struct SplitNormals {
	pub major_height: Vec<f32>,
	pub minor_height: Vec<f32>,
	pub major_normals: Vec<Vec3>,
	pub minor_normals: Vec<Vec3>,
	/// |major| / (|major| + |minor|) eigenvalue ratio per pixel.
	pub anisotropy: Vec<f32>,
	pub stats: SolveStats,
}

fn get(field: &[f32], x: i32, y: i32, w: i32, h: i32) -> f32 {
	field[(y.clamp(0, h - 1) * w + x.clamp(0, w - 1)) as usize]
}

fn gradient(field: &[f32], x: i32, y: i32, w: i32, h: i32) -> Vec2 {
	Vec2::new(
		(get(field, x + 1, y, w, h) - get(field, x - 1, y, w, h)) * 0.5,
		(get(field, x, y + 1, w, h) - get(field, x, y - 1, w, h)) * 0.5,
	)
}

/// Per-pixel 2x2 system minimizing
///   w_h [ (Lap_x(m) - H1.xx)^2 + (Lap_y(m) - H1.yy)^2 + (same for n, H2) ]
/// + w_g (m + n - height)^2
/// Solved by Cramer's rule; the sum constraint couples major and minor.
#[allow(clippy::too_many_arguments)]
fn solve_local(
	major: &[f32],
	minor: &[f32],
	height: &[f32],
	h1: &[Hessian2],
	h2: &[Hessian2],
	x: i32,
	y: i32,
	w: i32,
	h: i32,
) -> (f32, f32) {
	let idx = (y * w + x) as usize;

	let maj_sum = get(major, x - 1, y, w, h)
		+ get(major, x + 1, y, w, h)
		+ get(major, x, y - 1, w, h)
		+ get(major, x, y + 1, w, h);
	let min_sum = get(minor, x - 1, y, w, h)
		+ get(minor, x + 1, y, w, h)
		+ get(minor, x, y - 1, w, h)
		+ get(minor, x, y + 1, w, h);

	let a = 16.0 * HESSIAN_WEIGHT + 2.0 * GRADIENT_WEIGHT;
	let b = 2.0 * GRADIENT_WEIGHT;

	let rhs_m = 4.0 * HESSIAN_WEIGHT * (maj_sum - (h1[idx].xx + h1[idx].yy))
		+ 2.0 * GRADIENT_WEIGHT * height[idx];
	let rhs_n = 4.0 * HESSIAN_WEIGHT * (min_sum - (h2[idx].xx + h2[idx].yy))
		+ 2.0 * GRADIENT_WEIGHT * height[idx];

	let inv_det = 1.0 / (a * a - b * b);
	((a * rhs_m - b * rhs_n) * inv_det, (a * rhs_n - b * rhs_m) * inv_det)
}

fn split_residual(
	major: &[f32],
	minor: &[f32],
	height: &[f32],
	h1: &[Hessian2],
	h2: &[Hessian2],
	w: i32,
	h: i32,
) -> f32 {
	let mut total = 0.0f32;

	for y in 1..h - 1 {
		for x in 1..w - 1 {
			let idx = (y * w + x) as usize;

			let maj_xx = major[idx - 1] - 2.0 * major[idx] + major[idx + 1];
			let maj_yy = major[idx - w as usize] - 2.0 * major[idx] + major[idx + w as usize];
			let min_xx = minor[idx - 1] - 2.0 * minor[idx] + minor[idx + 1];
			let min_yy = minor[idx - w as usize] - 2.0 * minor[idx] + minor[idx + w as usize];

			let g_maj = gradient(major, x, y, w, h);
			let g_min = gradient(minor, x, y, w, h);
			let g_ht = gradient(height, x, y, w, h);
			let rg = g_maj + g_min - g_ht;

			total += HESSIAN_WEIGHT
				* ((maj_xx - h1[idx].xx).powi(2) + (maj_yy - h1[idx].yy).powi(2)
					+ (min_xx - h2[idx].xx).powi(2) + (min_yy - h2[idx].yy).powi(2));
			total += GRADIENT_WEIGHT * rg.length_sq();
		}
	}

	(total / ((w - 2) * (h - 2)) as f32).sqrt()
}

/// Decomposes a height field into complementary major/minor components whose
/// Hessians match the rank-1 eigen split, and derives a normal field for
/// each plus the per-pixel anisotropy ratio.
pub fn split_normals(height: &[f32], w: u32, h: u32, params: SplitParams) -> SplitNormals {
	let n = (w * h) as usize;

	let hess = hessian::hessian_field(height, w, h, params.kernel, params.border, params.undefined);

	let mut h1 = Vec::with_capacity(n);
	let mut h2 = Vec::with_capacity(n);
	let mut ratio = Vec::with_capacity(n);
	for hs in &hess {
		let (major, minor) = eigen::decompose(*hs);
		h1.push(eigen::rank_one(major));
		h2.push(eigen::rank_one(minor));
		ratio.push(eigen::anisotropy(major, minor));
	}
	drop(hess);

	let omega = math::clamp(params.sor_omega, 1.0, 1.95);
	let (wi, hi) = (w as i32, h as i32);

	let mut major = height.to_vec();
	let mut minor = height.to_vec();

	let mut stats = SolveStats::default();
	for iter in 0..params.max_iterations {
		for y in 1..hi - 1 {
			for x in 1..wi - 1 {
				let idx = (y * wi + x) as usize;
				let (new_major, new_minor) =
					solve_local(&major, &minor, height, &h1, &h2, x, y, wi, hi);
				major[idx] += omega * (new_major - major[idx]);
				minor[idx] += omega * (new_minor - minor[idx]);
			}
		}

		stats.iterations = iter + 1;
		if (iter + 1) % 10 == 0 || iter + 1 == params.max_iterations {
			stats.residual = split_residual(&major, &minor, height, &h1, &h2, wi, hi);
			if stats.residual < params.tolerance {
				break;
			}
		}
	}
	log::debug!(
		"split normals: {} iterations, residual={:.2e}",
		stats.iterations, stats.residual
	);

	// Normals from the component gradients; the major field is the ground
	// truth, the minor carries the complement.
	let mut major_normals = Vec::with_capacity(n);
	let mut minor_normals = Vec::with_capacity(n);
	for y in 0..hi {
		for x in 0..wi {
			let gm = gradient(&major, x, y, wi, hi);
			let gn = gradient(&minor, x, y, wi, hi);
			major_normals.push(Vec3::new(-gm.x, -gm.y, 1.0).normalize_or(Vec3::Z));
			minor_normals.push(Vec3::new(-gn.x, -gn.y, 1.0).normalize_or(Vec3::Z));
		}
	}

	SplitNormals {
		major_height: major,
		minor_height: minor,
		major_normals,
		minor_normals,
		anisotropy: ratio,
		stats,
	}
}
