/// Radix-2 Cooley-Tukey FFT and Butterworth-style frequency clamps.
///
/// The spatial-domain entry point pads the image into a centered power-of-two
/// buffer, filters, and extracts the original window, forcing exact zeros in
/// the input to stay zero so ringing cannot bleed into no-data regions.

pub fn next_pow2(n: u32) -> u32 {
	let mut p = 1;
	while p < n {
		p <<= 1;
	}
	p
}

fn bit_reverse(x: usize, bits: u32) -> usize {
	let mut x = x;
	let mut result = 0;
	for _ in 0..bits {
		result = (result << 1) | (x & 1);
		x >>= 1;
	}
	result
}

/// In-place 1D FFT over strided data. `inverse` also scales by 1/n.
fn fft_1d(real: &mut [f32], imag: &mut [f32], n: usize, stride: usize, inverse: bool) {
	let bits = n.trailing_zeros();

	for i in 0..n {
		let j = bit_reverse(i, bits);
		if j > i {
			real.swap(i * stride, j * stride);
			imag.swap(i * stride, j * stride);
		}
	}

	let mut mmax = 1;
	while mmax < n {
		let theta = if inverse { std::f32::consts::PI } else { -std::f32::consts::PI } / mmax as f32;
		let wpr = theta.cos();
		let wpi = theta.sin();

		let mut wr = 1.0f32;
		let mut wi = 0.0f32;

		for m in 0..mmax {
			let mut i = m;
			while i < n {
				let j = i + mmax;
				let tr = wr * real[j * stride] - wi * imag[j * stride];
				let ti = wr * imag[j * stride] + wi * real[j * stride];

				real[j * stride] = real[i * stride] - tr;
				imag[j * stride] = imag[i * stride] - ti;
				real[i * stride] += tr;
				imag[i * stride] += ti;

				i += mmax * 2;
			}

			let temp = wr;
			wr = wr * wpr - wi * wpi;
			wi = temp * wpi + wi * wpr;
		}

		mmax <<= 1;
	}

	if inverse {
		let scale = 1.0 / n as f32;
		for i in 0..n {
			real[i * stride] *= scale;
			imag[i * stride] *= scale;
		}
	}
}

/// 2D FFT over a w x h power-of-two buffer.
pub fn fft_2d(real: &mut [f32], imag: &mut [f32], w: usize, h: usize, inverse: bool) {
	for y in 0..h {
		fft_1d(&mut real[y * w..(y + 1) * w], &mut imag[y * w..(y + 1) * w], w, 1, inverse);
	}
	for x in 0..w {
		fft_1d(&mut real[x..], &mut imag[x..], h, w, inverse);
	}
}

/// Butterworth-style rolloff 1 / (1 + d^4) where d is the frequency distance
/// relative to the cutoff. `invert` turns the low-pass response into a
/// high-pass one.
fn butterworth(real: &mut [f32], imag: &mut [f32], w: usize, h: usize, cutoff: f32, invert: bool) {
	let cutoff_x = ((w as f32 * 0.5) * cutoff).max(1e-3);
	let cutoff_y = ((h as f32 * 0.5) * cutoff).max(1e-3);

	for y in 0..h {
		for x in 0..w {
			// Frequency coordinates as distance from DC.
			let fx = if x <= w / 2 { x as f32 } else { (w - x) as f32 };
			let fy = if y <= h / 2 { y as f32 } else { (h - y) as f32 };

			let dx = fx / cutoff_x;
			let dy = fy / cutoff_y;
			let d2 = dx * dx + dy * dy;

			let mut filter = 1.0 / (1.0 + d2 * d2);
			if invert {
				filter = 1.0 - filter;
			}

			let idx = y * w + x;
			real[idx] *= filter;
			imag[idx] *= filter;
		}
	}
}

/// Frequency clamp on one channel: removes content below `high_pass` and
/// above `low_pass` (both are cutoff ratios in [0, 1]). Pixels that are
/// exactly zero in the input stay zero; the rest is clamped to [0, 1].
pub fn fft_clamp(data: &mut [f32], w: u32, h: u32, low_pass: f32, high_pass: f32) {
	if w == 0 || h == 0 {
		return;
	}
	if high_pass <= 0.0 && low_pass >= 1.0 {
		return;
	}

	let fw = next_pow2(w) as usize;
	let fh = next_pow2(h) as usize;
	let off_x = (fw - w as usize) / 2;
	let off_y = (fh - h as usize) / 2;

	let mut real = vec![0.0f32; fw * fh];
	let mut imag = vec![0.0f32; fw * fh];
	for y in 0..h as usize {
		for x in 0..w as usize {
			real[(y + off_y) * fw + (x + off_x)] = data[y * w as usize + x];
		}
	}

	fft_2d(&mut real, &mut imag, fw, fh, false);
	if high_pass > 0.0 {
		butterworth(&mut real, &mut imag, fw, fh, high_pass, true);
	}
	if low_pass < 1.0 {
		butterworth(&mut real, &mut imag, fw, fh, low_pass, false);
	}
	fft_2d(&mut real, &mut imag, fw, fh, true);

	for y in 0..h as usize {
		for x in 0..w as usize {
			let idx = y * w as usize + x;
			if data[idx] == 0.0 {
				continue;
			}
			data[idx] = math::clamp(real[(y + off_y) * fw + (x + off_x)], 0.0, 1.0);
		}
	}
}

/// Frequency clamp for signed data (normal-field components): same
/// filters, but no zero-mask shortcut and no [0, 1] clamp on the way out.
pub fn fft_clamp_signed(data: &mut [f32], w: u32, h: u32, low_pass: f32, high_pass: f32) {
	if w == 0 || h == 0 {
		return;
	}
	if high_pass <= 0.0 && low_pass >= 1.0 {
		return;
	}

	let fw = next_pow2(w) as usize;
	let fh = next_pow2(h) as usize;
	let off_x = (fw - w as usize) / 2;
	let off_y = (fh - h as usize) / 2;

	let mut real = vec![0.0f32; fw * fh];
	let mut imag = vec![0.0f32; fw * fh];
	for y in 0..h as usize {
		for x in 0..w as usize {
			real[(y + off_y) * fw + (x + off_x)] = data[y * w as usize + x];
		}
	}

	fft_2d(&mut real, &mut imag, fw, fh, false);
	if high_pass > 0.0 {
		butterworth(&mut real, &mut imag, fw, fh, high_pass, true);
	}
	if low_pass < 1.0 {
		butterworth(&mut real, &mut imag, fw, fh, low_pass, false);
	}
	fft_2d(&mut real, &mut imag, fw, fh, true);

	for y in 0..h as usize {
		for x in 0..w as usize {
			data[y * w as usize + x] = real[(y + off_y) * fw + (x + off_x)];
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn forward_inverse_round_trip() {
		let n = 8;
		let mut real: Vec<f32> = (0..n * n).map(|i| ((i * 37 + 11) % 97) as f32 / 97.0).collect();
		let original = real.clone();
		let mut imag = vec![0.0f32; n * n];

		fft_2d(&mut real, &mut imag, n, n, false);
		fft_2d(&mut real, &mut imag, n, n, true);

		for (a, b) in real.iter().zip(&original) {
			assert!((a - b).abs() < 1e-4, "{} vs {}", a, b);
		}
	}

	#[test]
	fn identity_cutoffs_leave_data_untouched() {
		let mut data: Vec<f32> = (0..64).map(|i| i as f32 / 64.0).collect();
		let original = data.clone();
		fft_clamp(&mut data, 8, 8, 1.0, 0.0);
		assert_eq!(data, original);
	}

	#[test]
	fn zeros_are_preserved() {
		let mut data = vec![0.5f32; 16 * 16];
		for i in 0..16 {
			data[i] = 0.0;
		}
		fft_clamp(&mut data, 16, 16, 0.3, 0.0);
		for i in 0..16 {
			assert_eq!(data[i], 0.0);
		}
		for v in &data[16..] {
			assert!(*v >= 0.0 && *v <= 1.0);
		}
	}

	#[test]
	fn low_pass_flattens_alternating_signal() {
		let (w, h) = (16u32, 16u32);
		let mut data: Vec<f32> = (0..w * h)
			.map(|i| if (i % w + i / w) % 2 == 0 { 0.9 } else { 0.1 })
			.collect();
		fft_clamp(&mut data, w, h, 0.1, 0.0);
		// The checkerboard is the highest frequency; a tight low-pass leaves
		// roughly the mean everywhere.
		let center = data[(8 * w + 8) as usize];
		assert!((center - 0.5).abs() < 0.2, "center {}", center);
	}
}
