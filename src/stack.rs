use crate::effect::Effect;
use crate::error::{EffectError, EngineError};
use crate::memo::{MemoState, PipelineMemo};
use crate::source::SourceImage;
use crate::{export, lic, region, ridge, MAX_STACK_SIZE};
use field::filter;
use math::Vec3;
use solver::poisson::{self, PoissonParams};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackKind {
	Gradient,
	Erosion,
}

/// Final RGBA8 render of a stack run.
pub struct StackOutput {
	pub width: u32,
	pub height: u32,
	pub rgba: Vec<u8>,
}

/// The memoized effect-stack driver: owns the source, the validated effect
/// list of the current run, and the snapshot cache of the previous one.
pub struct EffectStack {
	kind: StackKind,
	effects: Vec<Effect>,
	accepting: bool,
	memo: PipelineMemo,
	source: Option<SourceImage>,
}

impl EffectStack {
	pub fn new(kind: StackKind) -> Self {
		Self {
			kind,
			effects: Vec::new(),
			accepting: true,
			memo: PipelineMemo::default(),
			source: None,
		}
	}

	/// Loads (or replaces) the source image. The memo belongs to the old
	/// source and is discarded.
	pub fn set_source(&mut self, path: &Path, quantization: f32) -> Result<(), EngineError> {
		match SourceImage::load(path, quantization) {
			Ok(source) => {
				self.source = Some(source);
				self.memo.clear();
				Ok(())
			}
			Err(e) => {
				self.memo.clear();
				Err(e)
			}
		}
	}

	#[cfg(test)]
	pub(crate) fn set_source_direct(&mut self, source: SourceImage) {
		self.source = Some(source);
		self.memo.clear();
	}

	/// Resets the effect list for a new run; the memo survives so matching
	/// prefixes can be reused.
	pub fn begin(&mut self) {
		self.effects.clear();
		self.accepting = true;
	}

	/// Validates and appends one effect. A failed push drops the effect;
	/// overflowing the stack stops it accepting more.
	pub fn push(&mut self, id: u8, params: &[u8]) -> Result<(), EffectError> {
		if !self.accepting {
			return Err(EffectError::StackFull(self.effects.len()));
		}
		if self.effects.len() >= MAX_STACK_SIZE {
			self.accepting = false;
			return Err(EffectError::StackFull(self.effects.len()));
		}
		self.effects.push(Effect::parse(id, params)?);
		Ok(())
	}

	pub fn memo(&self) -> &PipelineMemo {
		&self.memo
	}

	/// Runs the pipeline over the working buffer and returns the RGBA
	/// render. Height-space planes are clamped to bytes at the end; the
	/// alpha plane is opaque.
	pub fn end(&mut self) -> Result<StackOutput, EngineError> {
		let source = self.source.as_ref().ok_or(EngineError::NoSource)?;
		let (w, h) = (source.width, source.height);
		let n = (w * h) as usize;

		let mut working = source.planes.clone();

		match self.kind {
			StackKind::Erosion => {
				process_erosion(&mut self.memo, source, &self.effects, &mut working, w, h);
			}
			StackKind::Gradient => {
				// Procedural sources and color ramps belong to the external
				// gradient pipeline; the source passes through unchanged.
				log::debug!("gradient stack: {} effects deferred to the procedural pipeline", self.effects.len());
			}
		}

		let mut rgba = vec![255u8; n * 4];
		for i in 0..n {
			for c in 0..3 {
				rgba[i * 4 + c] =
					(math::clamp(working[c * n + i], 0.0, 1.0) * 255.0 + 0.5) as u8;
			}
		}

		Ok(StackOutput { width: w, height: h, rgba })
	}
}

/// Re-zeroes pixels recorded in the mask, so structurally empty regions
/// survive blurs and filters untouched.
fn restore_zero_mask(plane: &mut [f32], mask: &[bool]) {
	for (v, &z) in plane.iter_mut().zip(mask) {
		if z {
			*v = 0.0;
		}
	}
}

fn box_blur_heights(working: &mut [f32], w: u32, h: u32, iterations: u32) {
	let n = (w * h) as usize;
	for c in 0..3 {
		let plane = &mut working[c * n..(c + 1) * n];
		let mask: Vec<bool> = plane.iter().map(|&v| v == 0.0).collect();
		filter::box_blur(plane, w, h, iterations);
		restore_zero_mask(plane, &mask);
	}
}

fn fft_clamp_heights(working: &mut [f32], w: u32, h: u32, low_pass: f32, high_pass: f32) {
	let n = (w * h) as usize;
	for c in 0..3 {
		field::fft::fft_clamp(&mut working[c * n..(c + 1) * n], w, h, low_pass, high_pass);
	}
}

fn process_erosion(
	memo: &mut PipelineMemo,
	source: &SourceImage,
	effects: &[Effect],
	working: &mut [f32],
	w: u32,
	h: u32,
) {
	let n = (w * h) as usize;

	let mut resume = memo.find_resume(effects, w, h);
	if let Some(si) = resume.snapshot {
		if let Some(snapshot) = &memo.layer(si).snapshot {
			working.copy_from_slice(snapshot);
		}
	}
	memo.truncate(resume.resume_from);
	memo.set_dimensions(w, h);
	if resume.resume_from > 0 {
		log::debug!("memo: resuming at effect {}", resume.resume_from);
	}

	let mut i = resume.resume_from;
	while i < effects.len() {
		match &effects[i] {
			Effect::Dijkstra { minkowski, chebyshev } => {
				// Only valid as the first effect: it reads the quantized
				// source, not the working buffer.
				if i == 0 {
					let labels = match resume.reusable.take() {
						Some(MemoState::Regions(r)) if r.labels.len() == 3 * n => {
							log::debug!("memo: reusing region labels");
							r
						}
						_ => region::label_planes(&source.quantized, w, h),
					};
					for c in 0..3 {
						let out = region::deband_channel(
							&source.quantized[c * n..(c + 1) * n],
							&labels.labels[c * n..(c + 1) * n],
							w,
							h,
							*minkowski,
							*chebyshev,
						);
						working[c * n..(c + 1) * n].copy_from_slice(&out);
					}
					memo.save_layer(i, &effects[i], Some(&working[..]));
					memo.set_state(i, MemoState::Regions(labels));
					i += 1;
					continue;
				}
			}

			Effect::BoxBlur { iterations, .. } => {
				box_blur_heights(working, w, h, *iterations);
			}

			Effect::FftClamp { low_pass, high_pass } => {
				fft_clamp_heights(working, w, h, *low_pass, *high_pass);
			}

			Effect::Gradientify { .. } | Effect::Laminarize { .. } => {
				let start = i;
				i = gradientify_subloop(working, w, h, effects, i);
				// Memo layers for every consumed effect; only the final one
				// gets a snapshot (if expensive).
				let last = i.min(effects.len() - 1);
				for j in start..=last {
					let snap = j == last && effects[j].should_memoize();
					memo.save_layer(j, &effects[j], snap.then_some(&working[..]));
				}
				i += 1;
				continue;
			}

			// An orphaned solve outside a gradient sub-loop has nothing to
			// invert.
			Effect::PoissonSolve { .. } => {}

			Effect::DebugHessianFlow { kernel } => debug_hessian_flow(working, w, h, *kernel),
			Effect::DebugSplitChannels => debug_split_channels(working, w, h),
			Effect::DebugLic { field, kernel_length, step_size } => {
				debug_lic(working, w, h, *field, *kernel_length, *step_size);
			}
			Effect::DebugLaplacian { kernel } => debug_laplacian(working, w, h, *kernel),
			Effect::DebugRidgeMesh { normal_scale, min_area, epsilon } => {
				debug_ridge_mesh(working, w, h, *normal_scale, *min_area, *epsilon);
			}

			// Sources and gradient combinators are not erosion effects.
			_ => {
				log::debug!("effect 0x{:02x} ignored by the erosion stack", effects[i].id());
			}
		}

		let snap = effects[i].should_memoize();
		memo.save_layer(i, &effects[i], snap.then_some(&working[..]));
		i += 1;
	}
}

/// Lifts the working buffer into a 9-plane normal representation (3 height
/// channels x nx/ny/nz), runs the nested normal-space loop, then lowers
/// back with the constrained Poisson solve against the pre-lift heights.
/// Returns the index of the consuming PoissonSolve (or the list end).
fn gradientify_subloop(
	working: &mut [f32],
	w: u32,
	h: u32,
	effects: &[Effect],
	mut i: usize,
) -> usize {
	let n = (w * h) as usize;

	let mut scale = 1.0f32;
	if let Effect::Gradientify { scale: s } = &effects[i] {
		if *s > 0.0 {
			scale = *s;
		}
		i += 1;
	}
	// A leading Laminarize enters normal space implicitly.

	let original = working.to_vec();

	let mut normals = vec![0.0f32; 9 * n];
	for c in 0..3 {
		let (nx, ny, nz) =
			field::normal::height_to_normal_planes(&working[c * n..(c + 1) * n], w, h, scale);
		normals[(c * 3) * n..(c * 3 + 1) * n].copy_from_slice(&nx);
		normals[(c * 3 + 1) * n..(c * 3 + 2) * n].copy_from_slice(&ny);
		normals[(c * 3 + 2) * n..(c * 3 + 3) * n].copy_from_slice(&nz);
	}

	i = gradient_space_loop(&mut normals, w, h, effects, i);

	let mut iterations = 1000u32;
	if let Some(Effect::PoissonSolve { iterations: it }) = effects.get(i) {
		if *it >= 1 {
			iterations = *it;
		}
	}

	for c in 0..3 {
		let packed: Vec<Vec3> = (0..n)
			.map(|j| {
				Vec3::new(
					normals[(c * 3) * n + j],
					normals[(c * 3 + 1) * n + j],
					normals[(c * 3 + 2) * n + j],
				)
			})
			.collect();
		let params = PoissonParams { max_iterations: iterations, ..Default::default() };
		let (result, stats) =
			poisson::solve_constrained(&original[c * n..(c + 1) * n], &packed, w, h, params);
		log::debug!(
			"poisson lower (channel {}): {} iterations, residual {:.2e}",
			c, stats.iterations, stats.residual
		);
		working[c * n..(c + 1) * n].copy_from_slice(&result);
	}

	i
}

/// The nested normal-space loop: filters run per component with
/// renormalization, until a PoissonSolve (exclusive) or the end.
fn gradient_space_loop(
	normals: &mut [f32],
	w: u32,
	h: u32,
	effects: &[Effect],
	mut i: usize,
) -> usize {
	let n = (w * h) as usize;

	while i < effects.len() {
		match &effects[i] {
			Effect::PoissonSolve { .. } => return i,

			Effect::BoxBlur { iterations, .. } => {
				for plane in 0..9 {
					filter::box_blur(&mut normals[plane * n..(plane + 1) * n], w, h, *iterations);
				}
				renormalize_channels(normals, n);
			}

			Effect::FftClamp { low_pass, high_pass } => {
				for plane in 0..9 {
					field::fft::fft_clamp_signed(
						&mut normals[plane * n..(plane + 1) * n],
						w,
						h,
						*low_pass,
						*high_pass,
					);
				}
				renormalize_channels(normals, n);
			}

			Effect::Laminarize { scale, strength, blur_sigma } => {
				for c in 0..3 {
					let packed: Vec<Vec3> = (0..n)
						.map(|j| {
							Vec3::new(
								normals[(c * 3) * n + j],
								normals[(c * 3 + 1) * n + j],
								normals[(c * 3 + 2) * n + j],
							)
						})
						.collect();
					let params = solver::laminarize::LaminarizeParams {
						scale: *scale,
						strength: *strength,
						blur_sigma: *blur_sigma,
						..Default::default()
					};
					let (result, stats) = solver::laminarize::laminarize(&packed, w, h, params);
					log::debug!(
						"laminarize (channel {}): {} iterations, residual {:.2e}",
						c, stats.iterations, stats.residual
					);
					for (j, v) in result.iter().enumerate() {
						normals[(c * 3) * n + j] = v.x;
						normals[(c * 3 + 1) * n + j] = v.y;
						normals[(c * 3 + 2) * n + j] = v.z;
					}
				}
			}

			Effect::DebugSplitChannels => {
				for c in 0..3 {
					let packed: Vec<Vec3> = (0..n)
						.map(|j| {
							field::scale_normal(
								Vec3::new(
									normals[(c * 3) * n + j],
									normals[(c * 3 + 1) * n + j],
									normals[(c * 3 + 2) * n + j],
								),
								0.1,
							)
						})
						.collect();
					let path = export::output_path(&format!("normal_ch{}.png", c));
					if let Err(e) = export::write_vec3_png(&path, &packed, w, h) {
						log::warn!("{}", e);
					}
				}
			}

			// Nested lifts and height-space-only effects have no meaning
			// here.
			_ => {
				log::debug!("effect 0x{:02x} ignored in normal space", effects[i].id());
			}
		}
		i += 1;
	}

	i
}

fn renormalize_channels(normals: &mut [f32], n: usize) {
	for c in 0..3 {
		let (a, rest) = normals[(c * 3) * n..].split_at_mut(n);
		let (b, rest) = rest.split_at_mut(n);
		let z = &mut rest[..n];
		filter::renormalize_planes(a, b, z);
	}
}

fn debug_hessian_flow(working: &[f32], w: u32, h: u32, kernel: field::hessian::Kernel) {
	let n = (w * h) as usize;
	// The fade-out plane carries the most terrain-like structure.
	let plane = &working[n..2 * n];

	let hess = field::hessian::hessian_field(
		plane, w, h, kernel, field::hessian::Border::ClampEdge, Some(-1.0),
	);

	let mut dirs = Vec::with_capacity(n);
	let mut ratio = Vec::with_capacity(n);
	for hs in &hess {
		let (major, minor) = field::eigen::decompose(*hs);
		dirs.push(major.vector * major.value.signum());
		ratio.push(field::eigen::anisotropy(major, minor));
	}

	let path = export::output_path("hessian.png");
	if let Err(e) = export::write_vec2_png(&path, &dirs, w, h) {
		log::warn!("{}", e);
	}
	let path = export::output_path("anisotropy.png");
	if let Err(e) = export::write_gray_png(&path, &ratio, w, h, 0.5, 1.0, false) {
		log::warn!("{}", e);
	}
}

fn debug_split_channels(working: &[f32], w: u32, h: u32) {
	let n = (w * h) as usize;
	for (c, name) in ["fadeIn.png", "fadeOut.png", "softness.png"].iter().enumerate() {
		let path = export::output_path(name);
		if let Err(e) =
			export::write_gray_png(&path, &working[c * n..(c + 1) * n], w, h, 0.0, 1.0, false)
		{
			log::warn!("{}", e);
		}
	}
}

fn debug_lic(
	working: &[f32],
	w: u32,
	h: u32,
	field_kind: crate::effect::LicField,
	kernel_length: f32,
	step_size: f32,
) {
	let n = (w * h) as usize;

	// Adaptive LIC streaks of all three planes, composited as RGB.
	let mut planes = working.to_vec();
	for c in 0..3 {
		let seed = 0x12345678u64 ^ (c as u64 * 2654435761);
		lic::lic_channel(
			&mut planes[c * n..(c + 1) * n],
			w,
			h,
			field_kind,
			kernel_length,
			step_size,
			seed,
		);
	}
	let mut rgb: Vec<f32> = Vec::with_capacity(n);
	for i in 0..n {
		rgb.push((planes[i] + planes[n + i] + planes[2 * n + i]) / 3.0);
	}
	let path = export::output_path("lic.png");
	if let Err(e) = export::write_gray_png(&path, &rgb, w, h, 0.0, 1.0, false) {
		log::warn!("{}", e);
	}

	// Anisotropic stylization: split the fade-out plane into complementary
	// components and convolve the minor along the major's contours.
	let split = solver::split::split_normals(
		&working[n..2 * n],
		w,
		h,
		solver::split::SplitParams::default(),
	);
	let stylized = lic::lic_stylize(
		&split.major_normals,
		&split.minor_normals,
		w,
		h,
		kernel_length,
		step_size,
	);
	let path = export::output_path("lic_stylized.png");
	if let Err(e) = export::write_vec3_png(&path, &stylized, w, h) {
		log::warn!("{}", e);
	}
}

fn debug_laplacian(working: &[f32], w: u32, h: u32, kernel: field::hessian::Kernel) {
	let n = (w * h) as usize;
	for c in 0..3 {
		let lap = field::hessian::laplacian_field(
			&working[c * n..(c + 1) * n],
			w,
			h,
			kernel,
			field::hessian::Border::ClampEdge,
			Some(-1.0),
		);
		let path = export::output_path(&format!("laplacian_ch{}.png", c));
		if let Err(e) = export::write_gray_png(&path, &lap, w, h, 0.0, 1.0, true) {
			log::warn!("{}", e);
		}
	}
}

fn debug_ridge_mesh(working: &[f32], w: u32, h: u32, normal_scale: f32, min_area: f32, epsilon: f32) {
	let n = (w * h) as usize;
	let plane = &working[n..2 * n];

	let params = ridge::RidgeParams {
		normal_scale,
		min_area,
		epsilon,
		..Default::default()
	};
	let rm = ridge::build_ridge_mesh(plane, w, h, params);

	let (closed, open) = export::feature_histogram(&rm.mesh);
	log::info!(
		"ridge mesh: {} vertices, {} half-edges, {} closed / {} open features",
		rm.mesh.vertices.len(), rm.mesh.half_edges.len(), closed, open
	);

	let exports: [(&str, Result<(), EngineError>); 4] = [
		(
			"ridge_mesh.png",
			export::write_ridge_mesh_png(
				&export::output_path("ridge_mesh.png"),
				&rm.mesh,
				plane,
				&rm.divergence,
				w,
				h,
			),
		),
		(
			"ridge_mesh.svg",
			export::write_ridge_mesh_svg(&export::output_path("ridge_mesh.svg"), &rm.mesh, w, h),
		),
		(
			"divergence.png",
			export::write_gray_png(
				&export::output_path("divergence.png"),
				&rm.divergence,
				w,
				h,
				0.0,
				1.0,
				true,
			),
		),
		(
			"dijkstra_combined.png",
			export::write_vec2_png(
				&export::output_path("dijkstra_combined.png"),
				&rm.direction,
				w,
				h,
			),
		),
	];
	for (name, result) in exports {
		if let Err(e) = result {
			log::warn!("failed to export {}: {}", name, e);
		}
	}
}
