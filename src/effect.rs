use crate::error::EffectError;
use field::hessian::Kernel;

/// All UI parameters arrive as bytes in 0-255; these unpack them into
/// their semantic ranges.
pub fn unpack_linear01(u: u8) -> f32 {
	u as f32 / 255.0
}

pub fn unpack_linear_signed(u: u8) -> f32 {
	(u as f32 / 255.0) * 2.0 - 1.0
}

pub fn unpack_angle(u: u8) -> f32 {
	(u as f32 / 255.0) * (2.0 * math::PI) - math::PI
}

pub fn unpack_linear_range(u: u8, min: f32, max: f32) -> f32 {
	min + (u as f32 / 255.0) * (max - min)
}

pub fn unpack_log_range(u: u8, min: f32, max: f32) -> f32 {
	min * (max / min).powf(u as f32 / 255.0)
}

pub fn unpack_int_range(u: u8, min: i32, max: i32) -> i32 {
	min + ((u as f32 / 255.0) * (max - min) as f32).round() as i32
}

pub fn unpack_seed(u: u8) -> u32 {
	u as u32 * 3922
}

/// Enum-typed bytes reject out-of-range values instead of clamping.
fn unpack_enum(id: u8, index: usize, u: u8, max: u8) -> Result<u8, EffectError> {
	if u <= max {
		Ok(u)
	} else {
		Err(EffectError::ParamRange { id, index })
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorStop {
	pub position: f32,
	pub color: [f32; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LicField {
	Normal,
	Tangent,
	Bitangent,
}

/// The effect catalogue: a tagged sum with flat parameter records. The
/// memo compares entries structurally.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
	// Procedural sources (gradient stack; executed by the external
	// procedural pipeline, validated here).
	LinearGradient { angle: f32, scale: f32, offset: f32 },
	Worley { scale: f32, jitter: f32, metric: u8, mode: u8 },
	Perlin { scale: f32, octaves: u32, persistence: f32, lacunarity: f32 },
	Curl { scale: f32, octaves: u32, persistence: f32, lacunarity: f32 },
	Noise { kind: u8, scale: f32, seed: u32 },

	// Erosion (height-space) effects.
	Dijkstra { minkowski: f32, chebyshev: f32 },
	FftClamp { low_pass: f32, high_pass: f32 },
	BoxBlur { iterations: u32, threshold: f32 },
	Gradientify { scale: f32 },
	PoissonSolve { iterations: u32 },
	Laminarize { scale: f32, strength: f32, blur_sigma: f32 },

	// Gradient stack combinators.
	ColorRamp { stops: Vec<ColorStop> },
	BlendMode { mode: u8, opacity: f32 },

	// Debug exports.
	DebugHessianFlow { kernel: Kernel },
	DebugSplitChannels,
	DebugLic { field: LicField, kernel_length: f32, step_size: f32 },
	DebugLaplacian { kernel: Kernel },
	DebugRidgeMesh { normal_scale: f32, min_area: f32, epsilon: f32 },
}

fn expect_len(id: u8, params: &[u8], expected: usize) -> Result<(), EffectError> {
	if params.len() == expected {
		Ok(())
	} else {
		Err(EffectError::ParamCount { id, expected, got: params.len() })
	}
}

fn unpack_kernel(id: u8, index: usize, u: u8) -> Result<Kernel, EffectError> {
	match unpack_enum(id, index, u, 1)? {
		0 => Ok(Kernel::ThreeByThree),
		_ => Ok(Kernel::FiveByFive),
	}
}

impl Effect {
	/// Unpacks and validates an effect from its catalogue id and packed
	/// parameter bytes.
	pub fn parse(id: u8, params: &[u8]) -> Result<Effect, EffectError> {
		match id {
			0x10 => {
				expect_len(id, params, 3)?;
				Ok(Effect::LinearGradient {
					angle: unpack_angle(params[0]),
					scale: unpack_log_range(params[1], 0.1, 10.0),
					offset: unpack_linear01(params[2]),
				})
			}
			0x11 => {
				expect_len(id, params, 4)?;
				Ok(Effect::Worley {
					scale: unpack_log_range(params[0], 2.0, 128.0),
					jitter: unpack_linear01(params[1]),
					metric: unpack_enum(id, 2, params[2], 2)?,
					mode: unpack_enum(id, 3, params[3], 2)?,
				})
			}
			0x12 | 0x13 => {
				expect_len(id, params, 4)?;
				let scale = unpack_log_range(params[0], 2.0, 128.0);
				let octaves = unpack_int_range(params[1], 1, 8) as u32;
				let persistence = unpack_linear01(params[2]);
				let lacunarity = unpack_linear_range(params[3], 1.5, 3.5);
				Ok(if id == 0x12 {
					Effect::Perlin { scale, octaves, persistence, lacunarity }
				} else {
					Effect::Curl { scale, octaves, persistence, lacunarity }
				})
			}
			0x14 => {
				expect_len(id, params, 3)?;
				Ok(Effect::Noise {
					kind: unpack_enum(id, 0, params[0], 2)?,
					scale: unpack_log_range(params[1], 1.0, 64.0),
					seed: unpack_seed(params[2]),
				})
			}
			0x20 => {
				expect_len(id, params, 2)?;
				Ok(Effect::Dijkstra {
					minkowski: unpack_linear_range(params[0], -10.0, 10.0),
					chebyshev: unpack_linear01(params[1]),
				})
			}
			0x21 => {
				expect_len(id, params, 2)?;
				Ok(Effect::FftClamp {
					low_pass: unpack_linear01(params[0]),
					high_pass: unpack_linear01(params[1]),
				})
			}
			0x22 => {
				expect_len(id, params, 2)?;
				Ok(Effect::BoxBlur {
					iterations: unpack_int_range(params[0], 1, 64) as u32,
					threshold: unpack_linear01(params[1]),
				})
			}
			0x23 => {
				expect_len(id, params, 1)?;
				Ok(Effect::Gradientify { scale: unpack_log_range(params[0], 0.1, 10.0) })
			}
			0x24 => {
				expect_len(id, params, 1)?;
				Ok(Effect::PoissonSolve {
					iterations: unpack_log_range(params[0], 10.0, 10000.0).round() as u32,
				})
			}
			0x25 => {
				expect_len(id, params, 3)?;
				Ok(Effect::Laminarize {
					scale: unpack_log_range(params[0], 0.01, 10.0),
					strength: unpack_linear01(params[1]),
					blur_sigma: unpack_linear_range(params[2], 0.0, 5.0),
				})
			}
			0x30 => {
				if params.is_empty() {
					return Err(EffectError::ParamCount { id, expected: 1, got: 0 });
				}
				let count = params[0] as usize;
				if count == 0 || count > 16 {
					return Err(EffectError::ParamRange { id, index: 0 });
				}
				expect_len(id, params, 1 + count * 5)?;
				let mut stops = Vec::with_capacity(count);
				for i in 0..count {
					let p = &params[1 + i * 5..1 + i * 5 + 5];
					stops.push(ColorStop {
						position: unpack_linear01(p[0]),
						color: [
							unpack_linear01(p[1]),
							unpack_linear01(p[2]),
							unpack_linear01(p[3]),
							unpack_linear01(p[4]),
						],
					});
				}
				Ok(Effect::ColorRamp { stops })
			}
			0x31 => {
				expect_len(id, params, 2)?;
				Ok(Effect::BlendMode {
					mode: unpack_enum(id, 0, params[0], 5)?,
					opacity: unpack_linear01(params[1]),
				})
			}
			0x40 => {
				expect_len(id, params, 1)?;
				Ok(Effect::DebugHessianFlow { kernel: unpack_kernel(id, 0, params[0])? })
			}
			0x41 => {
				expect_len(id, params, 0)?;
				Ok(Effect::DebugSplitChannels)
			}
			0x42 => {
				expect_len(id, params, 3)?;
				let field = match unpack_enum(id, 0, params[0], 2)? {
					0 => LicField::Normal,
					1 => LicField::Tangent,
					_ => LicField::Bitangent,
				};
				Ok(Effect::DebugLic {
					field,
					kernel_length: unpack_log_range(params[1], 1.0, 100.0),
					step_size: unpack_linear_range(params[2], 0.1, 2.0),
				})
			}
			0x43 => {
				expect_len(id, params, 1)?;
				Ok(Effect::DebugLaplacian { kernel: unpack_kernel(id, 0, params[0])? })
			}
			0x44 => {
				expect_len(id, params, 3)?;
				Ok(Effect::DebugRidgeMesh {
					normal_scale: unpack_log_range(params[0], 0.1, 10.0),
					min_area: unpack_linear_range(params[1], 0.0, 16.0),
					epsilon: unpack_linear_range(params[2], 0.25, 4.0),
				})
			}
			_ => Err(EffectError::UnknownEffect(id)),
		}
	}

	pub fn id(&self) -> u8 {
		match self {
			Effect::LinearGradient { .. } => 0x10,
			Effect::Worley { .. } => 0x11,
			Effect::Perlin { .. } => 0x12,
			Effect::Curl { .. } => 0x13,
			Effect::Noise { .. } => 0x14,
			Effect::Dijkstra { .. } => 0x20,
			Effect::FftClamp { .. } => 0x21,
			Effect::BoxBlur { .. } => 0x22,
			Effect::Gradientify { .. } => 0x23,
			Effect::PoissonSolve { .. } => 0x24,
			Effect::Laminarize { .. } => 0x25,
			Effect::ColorRamp { .. } => 0x30,
			Effect::BlendMode { .. } => 0x31,
			Effect::DebugHessianFlow { .. } => 0x40,
			Effect::DebugSplitChannels => 0x41,
			Effect::DebugLic { .. } => 0x42,
			Effect::DebugLaplacian { .. } => 0x43,
			Effect::DebugRidgeMesh { .. } => 0x44,
		}
	}

	/// Expensive effects snapshot the working buffer into the memo.
	pub fn should_memoize(&self) -> bool {
		matches!(
			self,
			Effect::Dijkstra { .. }
				| Effect::FftClamp { .. }
				| Effect::BoxBlur { .. }
				| Effect::Laminarize { .. }
				| Effect::PoissonSolve { .. }
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unpack_rules() {
		assert_eq!(unpack_linear01(0), 0.0);
		assert_eq!(unpack_linear01(255), 1.0);
		assert_eq!(unpack_linear_signed(255), 1.0);
		assert!((unpack_angle(0) + math::PI).abs() < 1e-5);
		assert_eq!(unpack_linear_range(255, 2.0, 10.0), 10.0);
		assert!((unpack_log_range(0, 0.1, 10.0) - 0.1).abs() < 1e-6);
		assert!((unpack_log_range(255, 0.1, 10.0) - 10.0).abs() < 1e-4);
		assert_eq!(unpack_int_range(128, 1, 64), 33);
		assert_eq!(unpack_seed(3), 11766);
	}

	#[test]
	fn parse_round_trips_ids() {
		let cases: Vec<(u8, Vec<u8>)> = vec![
			(0x20, vec![128, 0]),
			(0x21, vec![255, 0]),
			(0x22, vec![10, 0]),
			(0x23, vec![128]),
			(0x24, vec![200]),
			(0x25, vec![128, 255, 50]),
			(0x41, vec![]),
			(0x44, vec![128, 64, 48]),
		];
		for (id, params) in cases {
			let effect = Effect::parse(id, &params).unwrap();
			assert_eq!(effect.id(), id);
		}
	}

	#[test]
	fn unknown_and_malformed_are_rejected() {
		assert!(matches!(Effect::parse(0x99, &[]), Err(EffectError::UnknownEffect(0x99))));
		assert!(matches!(
			Effect::parse(0x20, &[1]),
			Err(EffectError::ParamCount { id: 0x20, expected: 2, got: 1 })
		));
		// Blend mode enum caps at 5.
		assert!(matches!(
			Effect::parse(0x31, &[6, 0]),
			Err(EffectError::ParamRange { id: 0x31, index: 0 })
		));
	}

	#[test]
	fn color_ramp_parses_stops() {
		let params = vec![2, 0, 255, 0, 0, 255, 255, 0, 255, 0, 255];
		let effect = Effect::parse(0x30, &params).unwrap();
		let Effect::ColorRamp { stops } = &effect else { panic!() };
		assert_eq!(stops.len(), 2);
		assert_eq!(stops[0].position, 0.0);
		assert_eq!(stops[1].position, 1.0);
		assert_eq!(stops[0].color[0], 1.0);

		// Structural equality drives the memo comparison.
		let again = Effect::parse(0x30, &params).unwrap();
		assert_eq!(effect, again);
	}

	#[test]
	fn memoization_policy() {
		assert!(Effect::parse(0x22, &[10, 0]).unwrap().should_memoize());
		assert!(Effect::parse(0x24, &[100]).unwrap().should_memoize());
		assert!(!Effect::parse(0x23, &[100]).unwrap().should_memoize());
		assert!(!Effect::parse(0x41, &[]).unwrap().should_memoize());
	}
}
