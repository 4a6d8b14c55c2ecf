use crate::error::EngineError;
use std::path::Path;

/// Loaded and quantized source image: the R/G/B planes carry the envelope
/// data (fade-in, fade-out, softness) as planar floats plus the quantized
/// byte planes the de-banding pass works from.
pub struct SourceImage {
	pub width: u32,
	pub height: u32,
	/// 3 * W * H floats in [0, 1], planar R then G then B.
	pub planes: Vec<f32>,
	/// The same planes as quantized bytes.
	pub quantized: Vec<u8>,
}

/// Quantizes a byte to the level grid implied by `quantization`
/// (0.0 = 1 bit, 1.0 = 8 bits).
fn quantize(v: u8, quantization: f32) -> u8 {
	let bits = 1 + (math::clamp(quantization, 0.0, 1.0) * 7.0).round() as u32;
	if bits >= 8 {
		return v;
	}
	let levels = (1u32 << bits) - 1;
	let step = 255.0 / levels as f32;
	((v as f32 / step).round() * step).round() as u8
}

impl SourceImage {
	/// Decodes a PNG source and splits it into quantized planar channels.
	pub fn load(path: &Path, quantization: f32) -> Result<Self, EngineError> {
		let img = image::open(path)
			.map_err(|source| EngineError::SourceRead {
				path: path.display().to_string(),
				source,
			})?
			.to_rgba8();

		let (width, height) = img.dimensions();
		let n = (width * height) as usize;

		let mut quantized = vec![0u8; 3 * n];
		for (i, px) in img.pixels().enumerate() {
			for c in 0..3 {
				quantized[c * n + i] = quantize(px.0[c], quantization);
			}
		}

		let planes = quantized.iter().map(|&v| v as f32 / 255.0).collect();

		log::info!(
			"loaded source {} ({}x{}, quantization {:.2})",
			path.display(), width, height, quantization
		);

		Ok(Self { width, height, planes, quantized })
	}

	/// Channel plane as a slice.
	pub fn plane(&self, c: usize) -> &[f32] {
		let n = (self.width * self.height) as usize;
		&self.planes[c * n..(c + 1) * n]
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn quantize_extremes() {
		// 1 bit: everything snaps to 0 or 255.
		assert_eq!(quantize(100, 0.0), 0);
		assert_eq!(quantize(200, 0.0), 255);
		// 8 bits: identity.
		assert_eq!(quantize(137, 1.0), 137);
	}

	#[test]
	fn quantize_is_idempotent() {
		for q in [0.0, 0.25, 0.5, 0.75] {
			for v in 0..=255u8 {
				let once = quantize(v, q);
				assert_eq!(quantize(once, q), once, "q={} v={}", q, v);
			}
		}
	}
}
