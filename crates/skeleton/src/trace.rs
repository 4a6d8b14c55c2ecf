use super::complex::{Cell, CubicalComplex};
use super::gradient::MorseGradient;
use super::{CriticalKind, CriticalPoint, Separatrix};
use math::Vec2;

/// Cell centroid without the pixel-center offset, used to place critical
/// points (they are later snapped to pixels by rounding).
fn raw_centroid(complex: &CubicalComplex, cell: Cell) -> Vec2 {
	let verts = complex.vertices(cell);
	let mut c = Vec2::ZERO;
	for v in &verts {
		c += Vec2::new((complex.cx(*v) / 2) as f32, (complex.cy(*v) / 2) as f32);
	}
	c / verts.len() as f32
}

fn touches_nodata(complex: &CubicalComplex, nodata: &[bool], cell: Cell) -> bool {
	complex
		.vertices(cell)
		.iter()
		.any(|v| nodata[complex.vertex_pixel(*v) as usize])
}

fn fully_nodata(complex: &CubicalComplex, nodata: &[bool], cell: Cell) -> bool {
	complex
		.vertices(cell)
		.iter()
		.all(|v| nodata[complex.vertex_pixel(*v) as usize])
}

/// Collects the surviving critical points in cell-id order and returns the
/// saddle cells for tracing. Critical cells fully inside no-data are
/// discarded; boundary saddles are kept here (tracing skips them).
pub fn collect_critical_points(
	complex: &CubicalComplex,
	gradient: &MorseGradient,
	heights: &[f32],
	nodata: &[bool],
) -> (Vec<CriticalPoint>, Vec<Cell>) {
	let mut points = Vec::new();
	let mut saddles = Vec::new();
	let mut skipped = 0;

	for cell in 0..complex.cell_count() {
		if !gradient.critical[cell as usize] {
			continue;
		}
		if fully_nodata(complex, nodata, cell) {
			skipped += 1;
			continue;
		}

		let mut value = 0.0f32;
		for v in complex.vertices(cell) {
			value = value.max(heights[complex.vertex_pixel(v) as usize]);
		}

		let kind = match complex.dim(cell) {
			// Descending vertex/edge paths end on the vertex side (the
			// no-data sinks live there); ascending paths end on the face
			// side, at the peaks.
			0 => CriticalKind::Minimum,
			1 => CriticalKind::Saddle,
			_ => CriticalKind::Maximum,
		};
		if kind == CriticalKind::Saddle {
			saddles.push(cell);
		}

		let pos = raw_centroid(complex, cell);
		points.push(CriticalPoint { x: pos.x, y: pos.y, kind, value });
	}

	log::debug!(
		"critical points: {} ({} saddles), {} skipped in no-data",
		points.len(), saddles.len(), skipped
	);

	(points, saddles)
}

/// Appends a cell to a separatrix. Returns false when the cell lands on a
/// no-data or out-of-bounds pixel (the path stops there).
fn push_cell(complex: &CubicalComplex, nodata: &[bool], sep: &mut Separatrix, cell: Cell) -> bool {
	let pixel = match complex.centroid_pixel(cell) {
		Some(p) if !nodata[p as usize] => p,
		_ => return false,
	};
	sep.pixels.push(pixel);
	sep.path.push(complex.centroid(cell));
	true
}

/// Traces one gradient path from a cell adjacent to a saddle.
///
/// Descending (ridge=false): `start` is a 0-cell facet; follow the paired
/// cofacet edge, step to its other vertex facet, repeat until a critical
/// cell or no-data.
/// Ascending (ridge=true): `start` is a 2-cell cofacet; follow the paired
/// facet edge, step to its other face cofacet, repeat likewise.
fn trace_path(
	complex: &CubicalComplex,
	gradient: &MorseGradient,
	nodata: &[bool],
	saddle: Cell,
	start: Cell,
	ridge: bool,
) -> Separatrix {
	let mut sep = Separatrix {
		ridge,
		pixels: Vec::new(),
		path: Vec::new(),
	};

	push_cell(complex, nodata, &mut sep, saddle);
	if !push_cell(complex, nodata, &mut sep, start) {
		return sep;
	}

	let mut current = start;
	let mut steps = complex.width * complex.height;

	loop {
		steps -= 1;
		if steps == 0 || gradient.critical[current as usize] {
			break;
		}

		let partner = if ridge {
			gradient.pair_down(complex, current)
		} else {
			gradient.pair_up(complex, current)
		};
		let partner = match partner {
			Some(p) => p,
			None => break,
		};
		if !push_cell(complex, nodata, &mut sep, partner) {
			break;
		}

		let siblings = if ridge {
			complex.cofacets(partner)
		} else {
			complex.facets(partner)
		};
		let next = match siblings.iter().copied().find(|c| *c != current) {
			Some(n) => n,
			None => break,
		};
		if !push_cell(complex, nodata, &mut sep, next) {
			break;
		}
		current = next;
	}

	sep
}

/// Traces all separatrices from the given saddles (in saddle order) and
/// paints the ridge and valley masks.
pub fn trace_separatrices(
	complex: &CubicalComplex,
	gradient: &MorseGradient,
	nodata: &[bool],
	saddles: &[Cell],
	ridge_mask: &mut [u8],
	valley_mask: &mut [u8],
) -> Vec<Separatrix> {
	let mut separatrices = Vec::new();
	let mut boundary_skipped = 0;

	for &saddle in saddles {
		// Boundary saddles spawn artificial separatrices along the cliff
		// edge; the explicit contour pass covers that geometry instead.
		if touches_nodata(complex, nodata, saddle) {
			boundary_skipped += 1;
			continue;
		}

		for start in complex.facets(saddle) {
			let sep = trace_path(complex, gradient, nodata, saddle, start, false);
			for &p in &sep.pixels {
				valley_mask[p as usize] = 1;
			}
			separatrices.push(sep);
		}

		for start in complex.cofacets(saddle) {
			let sep = trace_path(complex, gradient, nodata, saddle, start, true);
			for &p in &sep.pixels {
				ridge_mask[p as usize] = 1;
			}
			separatrices.push(sep);
		}
	}

	if boundary_skipped > 0 {
		log::debug!("skipped {} boundary saddles", boundary_skipped);
	}
	log::debug!("traced {} raw separatrices", separatrices.len());

	separatrices
}
