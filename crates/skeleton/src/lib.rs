pub mod complex;
pub mod contour;
pub mod gradient;
pub mod graph;
pub mod trace;

use complex::CubicalComplex;
use graph::RawPolyline;
use math::Vec2;
use std::collections::BTreeMap;

/// Sentinel assigned to no-data pixels before the Morse pairing: it turns
/// them into deep sinks that separatrices cannot cross.
const NODATA_SINK: f32 = -1e6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CriticalKind {
	Maximum,
	Minimum,
	Saddle,
}

#[derive(Clone, Copy, Debug)]
pub struct CriticalPoint {
	pub x: f32,
	pub y: f32,
	pub kind: CriticalKind,
	pub value: f32,
}

/// A traced gradient path from a saddle, in pixel indices and sub-pixel
/// cell centroids.
pub struct Separatrix {
	pub ridge: bool,
	pub pixels: Vec<u32>,
	pub path: Vec<Vec2>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkeletonVertexKind {
	Saddle,
	Maximum,
	Minimum,
	Branch,
	Boundary,
	/// Intermediate point along an edge chain; simplified away freely.
	Interior,
}

#[derive(Clone, Copy, Debug)]
pub struct SkeletonVertex {
	pub x: f32,
	pub y: f32,
	pub divergence: f32,
	pub kind: SkeletonVertexKind,
}

/// A polyline edge of the junction graph, as indices into the vertex table.
pub struct SkeletonEdge {
	pub ridge: bool,
	pub vertices: Vec<i32>,
}

/// Morse-Smale skeleton of a height field: critical points, raw
/// separatrices, ridge/valley masks, and the post-processed junction graph
/// ready for DCEL construction.
pub struct Skeleton {
	pub critical_points: Vec<CriticalPoint>,
	pub separatrices: Vec<Separatrix>,
	pub ridge_mask: Vec<u8>,
	pub valley_mask: Vec<u8>,
	pub vertices: Vec<SkeletonVertex>,
	pub edges: Vec<SkeletonEdge>,
}

/// Extracts the skeleton of a height field. Pixels with height exactly 0
/// are no-data. `divergence` (normalized to [-1, 1]) refines vertex
/// metadata and blocks chain merges across ridge/valley transitions.
pub fn extract(height: &[f32], divergence: Option<&[f32]>, w: u32, h: u32) -> Skeleton {
	assert!(w >= 2 && h >= 2);
	let n = (w * h) as usize;

	let nodata: Vec<bool> = height.iter().map(|&v| v == 0.0).collect();
	let nodata_count = nodata.iter().filter(|b| **b).count();
	log::debug!(
		"skeleton {}x{}: {} no-data pixels ({:.1}%)",
		w, h, nodata_count, 100.0 * nodata_count as f32 / n as f32
	);

	let values: Vec<f32> = height
		.iter()
		.zip(&nodata)
		.map(|(&v, &nd)| if nd { NODATA_SINK } else { v })
		.collect();

	let cx = CubicalComplex::new(w, h);
	let morse = gradient::fill_morse_gradient(&cx, &values);

	let (critical_points, saddles) =
		trace::collect_critical_points(&cx, &morse, height, &nodata);

	let mut ridge_mask = vec![0u8; n];
	let mut valley_mask = vec![0u8; n];
	let separatrices = trace::trace_separatrices(
		&cx, &morse, &nodata, &saddles, &mut ridge_mask, &mut valley_mask,
	);

	// Drop degenerate separatrices and those hugging the image border on
	// both ends; the boundary pass owns that geometry.
	let on_border = |p: Vec2| {
		p.x <= 1.0 || p.x >= (w - 1) as f32 - 0.5 || p.y <= 1.0 || p.y >= (h - 1) as f32 - 0.5
	};
	let before = separatrices.len();
	let separatrices: Vec<Separatrix> = separatrices
		.into_iter()
		.filter(|s| {
			if s.pixels.len() < 3 {
				return false;
			}
			!(on_border(s.path[0]) && on_border(*s.path.last().unwrap()))
		})
		.collect();
	log::debug!("filtered separatrices: {} -> {}", before, separatrices.len());

	let contours = contour::boundary_contours(&nodata, w, h);

	let mut polys: Vec<RawPolyline> = Vec::with_capacity(separatrices.len() + contours.len());
	for s in &separatrices {
		if s.pixels.len() < 2 {
			continue;
		}
		polys.push(RawPolyline {
			pixels: s.pixels.clone(),
			path: s.path.clone(),
			ridge: s.ridge,
		});
	}
	for c in contours {
		polys.push(RawPolyline { pixels: c.pixels, path: c.path, ridge: false });
	}

	let mut critical_pixels: BTreeMap<u32, CriticalKind> = BTreeMap::new();
	for cp in &critical_points {
		let px = (cp.x + 0.5) as u32;
		let py = (cp.y + 0.5) as u32;
		if px < w && py < h {
			critical_pixels.insert(py * w + px, cp.kind);
		}
	}

	let (vertices, edges) =
		graph::build_graph(&polys, &critical_pixels, &nodata, divergence, w, h);

	// The terrain edge reads as a contour; mark it on the ridge mask too.
	let mut boundary_px = 0;
	for y in 0..h {
		for x in 0..w {
			let idx = (y * w + x) as usize;
			if !nodata[idx] && contour::is_boundary(&nodata, x, y, w, h) && ridge_mask[idx] == 0 {
				ridge_mask[idx] = 1;
				boundary_px += 1;
			}
		}
	}

	let ridge_px = ridge_mask.iter().filter(|v| **v != 0).count();
	let valley_px = valley_mask.iter().filter(|v| **v != 0).count();
	log::debug!(
		"skeleton masks: {} ridge ({} boundary), {} valley",
		ridge_px, boundary_px, valley_px
	);

	Skeleton {
		critical_points,
		separatrices,
		ridge_mask,
		valley_mask,
		vertices,
		edges,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn three_peak_field(w: u32, h: u32) -> Vec<f32> {
		let peaks = [(4.0f32, 4.0f32, 1.0f32), (11.0, 4.0, 0.96), (8.0, 11.0, 0.92)];
		let mut f = vec![0.0f32; (w * h) as usize];
		for y in 0..h {
			for x in 0..w {
				let mut v = 0.1f32;
				for (px, py, ph) in peaks {
					let d2 = (x as f32 - px).powi(2) + (y as f32 - py).powi(2);
					v = v.max(ph - 0.04 * d2).max(0.1);
				}
				f[(y * w + x) as usize] = v;
			}
		}
		f
	}

	#[test]
	fn three_peaks_yield_three_maxima() {
		let (w, h) = (16u32, 16u32);
		let f = three_peak_field(w, h);
		let skel = extract(&f, None, w, h);

		let maxima = skel
			.critical_points
			.iter()
			.filter(|c| c.kind == CriticalKind::Maximum)
			.count();
		let saddles = skel
			.critical_points
			.iter()
			.filter(|c| c.kind == CriticalKind::Saddle)
			.count();

		assert_eq!(maxima, 3);
		assert!(saddles >= 2, "got {} saddles", saddles);
		assert!(skel.ridge_mask.iter().any(|v| *v != 0));
	}

	#[test]
	fn maxima_sit_on_the_peaks() {
		let (w, h) = (16u32, 16u32);
		let f = three_peak_field(w, h);
		let skel = extract(&f, None, w, h);

		for cp in skel.critical_points.iter().filter(|c| c.kind == CriticalKind::Maximum) {
			let near_peak = [(4.0f32, 4.0f32), (11.0, 4.0), (8.0, 11.0)]
				.iter()
				.any(|(px, py)| (cp.x - px).abs() <= 1.5 && (cp.y - py).abs() <= 1.5);
			assert!(near_peak, "maximum at ({}, {})", cp.x, cp.y);
		}
	}

	#[test]
	fn nodata_field_produces_empty_skeleton() {
		let f = vec![0.0f32; 64];
		let skel = extract(&f, None, 8, 8);
		assert!(skel.critical_points.is_empty());
		assert!(skel.edges.is_empty());
		assert!(skel.ridge_mask.iter().all(|v| *v == 0));
	}

	#[test]
	fn graph_references_are_valid() {
		let (w, h) = (16u32, 16u32);
		let f = three_peak_field(w, h);
		let skel = extract(&f, None, w, h);
		assert!(!skel.edges.is_empty());
		for e in &skel.edges {
			assert!(e.vertices.len() >= 2);
			for &vi in &e.vertices {
				assert!((vi as usize) < skel.vertices.len());
			}
		}
	}
}
