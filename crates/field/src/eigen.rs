use super::hessian::Hessian2;
use math::Vec2;

/// Unit eigenvector with its signed eigenvalue.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EigenPair {
	pub vector: Vec2,
	pub value: f32,
}

/// Eigendecomposition of a symmetric 2x2 matrix, returned as
/// (major, minor) ordered by |value| descending.
///
/// Uses the numerically stable discriminant sqrt((xx-yy)^2 + 4 xy^2) rather
/// than sqrt(trace^2 - 4 det), which cancels catastrophically for
/// near-isotropic tensors.
pub fn decompose(h: Hessian2) -> (EigenPair, EigenPair) {
	let trace = h.xx + h.yy;
	let diff = h.xx - h.yy;
	let mut discriminant = (diff * diff + 4.0 * h.xy * h.xy).sqrt();
	if !discriminant.is_normal() {
		discriminant = 0.0;
	}

	let lambda1 = (trace + discriminant) * 0.5;
	let lambda2 = (trace - discriminant) * 0.5;

	let (v1, v2) = if h.xy.abs() > 1e-8 {
		let v1 = Vec2::new(lambda1 - h.yy, h.xy).normalize_or(Vec2::X);
		let v2 = Vec2::new(lambda2 - h.yy, h.xy).normalize_or(Vec2::Y);
		(v1, v2)
	} else if h.xx > h.yy {
		(Vec2::X, Vec2::Y)
	} else {
		(Vec2::Y, Vec2::X)
	};

	let e1 = EigenPair { vector: v1, value: lambda1 };
	let e2 = EigenPair { vector: v2, value: lambda2 };
	if e1.value.abs() >= e2.value.abs() {
		(e1, e2)
	} else {
		(e2, e1)
	}
}

/// Rank-1 reconstruction lambda * v (x) v.
pub fn rank_one(e: EigenPair) -> Hessian2 {
	Hessian2 {
		xx: e.value * e.vector.x * e.vector.x,
		xy: e.value * e.vector.x * e.vector.y,
		yy: e.value * e.vector.y * e.vector.y,
	}
}

/// Anisotropy ratio |major| / (|major| + |minor|): 0.5 isotropic, 1.0 fully
/// anisotropic. Degenerate tensors report 0.5.
pub fn anisotropy(major: EigenPair, minor: EigenPair) -> f32 {
	let a = major.value.abs();
	let b = minor.value.abs();
	let total = a + b;
	if total > 1e-8 {
		a / total
	} else {
		0.5
	}
}
