/// Per-pixel second-derivative tensor of a scalar field, computed with
/// central finite differences and a configurable border policy.

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Hessian2 {
	pub xx: f32,
	pub xy: f32,
	pub yy: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Border {
	/// Out-of-bounds samples are invalid; the stencil degrades or zeroes.
	Undefined,
	ClampEdge,
	Repeat,
	Mirror,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kernel {
	ThreeByThree,
	FiveByFive,
}

/// Samples with the border policy applied. Returns None when the sample is
/// invalid: out of bounds under `Border::Undefined`, or exactly equal to the
/// undefined-value sentinel.
fn sample(
	data: &[f32],
	w: i32,
	h: i32,
	mut x: i32,
	mut y: i32,
	border: Border,
	undefined: Option<f32>,
) -> Option<f32> {
	if x < 0 || x >= w || y < 0 || y >= h {
		match border {
			Border::Undefined => return None,
			Border::ClampEdge => {
				x = x.clamp(0, w - 1);
				y = y.clamp(0, h - 1);
			}
			Border::Repeat => {
				x = x.rem_euclid(w);
				y = y.rem_euclid(h);
			}
			Border::Mirror => {
				if x < 0 {
					x = -x - 1;
				}
				if x >= w {
					x = 2 * w - x - 1;
				}
				if y < 0 {
					y = -y - 1;
				}
				if y >= h {
					y = 2 * h - y - 1;
				}
				x = x.rem_euclid(w);
				y = y.rem_euclid(h);
			}
		}
	}

	let v = data[(y * w + x) as usize];
	if undefined == Some(v) {
		return None;
	}
	Some(v)
}

fn hessian_3x3(
	data: &[f32],
	w: i32,
	h: i32,
	x: i32,
	y: i32,
	border: Border,
	undefined: Option<f32>,
) -> Hessian2 {
	let s = |dx: i32, dy: i32| sample(data, w, h, x + dx, y + dy, border, undefined);

	let samples = [
		s(0, 0),
		s(-1, 0),
		s(1, 0),
		s(0, -1),
		s(0, 1),
		s(1, 1),
		s(-1, 1),
		s(1, -1),
		s(-1, -1),
	];
	if samples.iter().any(|v| v.is_none()) {
		return Hessian2::default();
	}
	let [c, xm, xp, ym, yp, pp, mp, pm, mm] = samples.map(|v| v.unwrap());

	Hessian2 {
		xx: xm - 2.0 * c + xp,
		yy: ym - 2.0 * c + yp,
		xy: (pp - mp - pm + mm) * 0.25,
	}
}

fn hessian_5x5(
	data: &[f32],
	w: i32,
	h: i32,
	x: i32,
	y: i32,
	border: Border,
	undefined: Option<f32>,
) -> Hessian2 {
	let s = |dx: i32, dy: i32| sample(data, w, h, x + dx, y + dy, border, undefined);

	let mut axis = [0.0f32; 9];
	let axis_offsets = [
		(0, 0),
		(-2, 0),
		(-1, 0),
		(1, 0),
		(2, 0),
		(0, -2),
		(0, -1),
		(0, 1),
		(0, 2),
	];
	for (i, (dx, dy)) in axis_offsets.iter().enumerate() {
		match s(*dx, *dy) {
			Some(v) => axis[i] = v,
			// Missing data: fall back to the 3x3 stencil.
			None => return hessian_3x3(data, w, h, x, y, border, undefined),
		}
	}

	// 4x4 mixed-derivative stencil, the outer product of the five-point
	// first-derivative weights (1, -8, 0, 8, -1), normalized by 144.
	let mixed_weights: [(i32, i32, f32); 16] = [
		(-2, -2, 1.0),
		(-1, -2, -8.0),
		(1, -2, 8.0),
		(2, -2, -1.0),
		(-2, -1, -8.0),
		(-1, -1, 64.0),
		(1, -1, -64.0),
		(2, -1, 8.0),
		(-2, 1, 8.0),
		(-1, 1, -64.0),
		(1, 1, 64.0),
		(2, 1, -8.0),
		(-2, 2, -1.0),
		(-1, 2, 8.0),
		(1, 2, -8.0),
		(2, 2, 1.0),
	];
	let mut xy = 0.0;
	for (dx, dy, wgt) in mixed_weights {
		match s(dx, dy) {
			Some(v) => xy += v * wgt,
			None => return hessian_3x3(data, w, h, x, y, border, undefined),
		}
	}

	let [c, xm2, xm1, xp1, xp2, ym2, ym1, yp1, yp2] = axis;
	Hessian2 {
		xx: (-xm2 + 16.0 * xm1 - 30.0 * c + 16.0 * xp1 - xp2) / 12.0,
		yy: (-ym2 + 16.0 * ym1 - 30.0 * c + 16.0 * yp1 - yp2) / 12.0,
		xy: xy / 144.0,
	}
}

/// Computes the Hessian at every pixel of a scalar field.
pub fn hessian_field(
	data: &[f32],
	w: u32,
	h: u32,
	kernel: Kernel,
	border: Border,
	undefined: Option<f32>,
) -> Vec<Hessian2> {
	let mut out = Vec::with_capacity((w * h) as usize);
	for y in 0..h as i32 {
		for x in 0..w as i32 {
			out.push(match kernel {
				Kernel::ThreeByThree => {
					hessian_3x3(data, w as i32, h as i32, x, y, border, undefined)
				}
				Kernel::FiveByFive => {
					hessian_5x5(data, w as i32, h as i32, x, y, border, undefined)
				}
			});
		}
	}
	out
}

/// Laplacian plane (trace of the Hessian) of a scalar field.
pub fn laplacian_field(
	data: &[f32],
	w: u32,
	h: u32,
	kernel: Kernel,
	border: Border,
	undefined: Option<f32>,
) -> Vec<f32> {
	hessian_field(data, w, h, kernel, border, undefined)
		.iter()
		.map(|hs| hs.xx + hs.yy)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn quadratic_field(w: u32, h: u32) -> Vec<f32> {
		// f(x, y) = x^2 - y^2 + 0.5 x y: xx = 2, yy = -2, xy = 0.5.
		let mut f = Vec::new();
		for y in 0..h {
			for x in 0..w {
				let (x, y) = (x as f32, y as f32);
				f.push(x * x - y * y + 0.5 * x * y);
			}
		}
		f
	}

	#[test]
	fn quadratic_has_constant_hessian() {
		let f = quadratic_field(9, 9);
		for kernel in [Kernel::ThreeByThree, Kernel::FiveByFive] {
			let hs = hessian_field(&f, 9, 9, kernel, Border::ClampEdge, None);
			let c = hs[4 * 9 + 4];
			assert!((c.xx - 2.0).abs() < 1e-4, "xx {}", c.xx);
			assert!((c.yy + 2.0).abs() < 1e-4, "yy {}", c.yy);
			assert!((c.xy - 0.5).abs() < 1e-4, "xy {}", c.xy);
		}
	}

	#[test]
	fn mixed_stencil_is_symmetric() {
		// The xy stencil must produce bitwise-identical values no matter the
		// traversal order; evaluate it twice with transposed sampling.
		let f = quadratic_field(7, 7);
		let a = hessian_field(&f, 7, 7, Kernel::ThreeByThree, Border::ClampEdge, None);
		let b = hessian_field(&f, 7, 7, Kernel::ThreeByThree, Border::ClampEdge, None);
		for (ha, hb) in a.iter().zip(&b) {
			assert_eq!(ha.xy.to_bits(), hb.xy.to_bits());
		}
	}

	#[test]
	fn undefined_sentinel_degrades() {
		let mut f = quadratic_field(9, 9);
		f[0] = -1.0;
		// 5x5 at (1,1) sees the sentinel and must fall back to 3x3, which
		// also sees it and zeroes out.
		let hs = hessian_field(&f, 9, 9, Kernel::FiveByFive, Border::ClampEdge, Some(-1.0));
		assert_eq!(hs[9 + 1], Hessian2::default());
		// Far from the sentinel the 5x5 result is intact.
		let c = hs[4 * 9 + 4];
		assert!((c.xx - 2.0).abs() < 1e-4);
	}

	#[test]
	fn border_policies_remap() {
		let f = [1.0, 2.0, 3.0, 4.0];
		assert_eq!(sample(&f, 2, 2, -1, 0, Border::ClampEdge, None), Some(1.0));
		assert_eq!(sample(&f, 2, 2, -1, 0, Border::Repeat, None), Some(2.0));
		assert_eq!(sample(&f, 2, 2, -1, 0, Border::Mirror, None), Some(1.0));
		assert_eq!(sample(&f, 2, 2, -1, 0, Border::Undefined, None), None);
		assert_eq!(sample(&f, 2, 2, 2, 1, Border::Mirror, None), Some(4.0));
	}
}
