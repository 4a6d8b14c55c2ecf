use super::complex::{Cell, CubicalComplex};
use std::cmp::Ordering;

pub const NONE: u32 = u32::MAX;

/// Discrete Morse gradient: a pairing between cells of adjacent dimension.
/// Unpaired cells are critical. `pair[c]` holds the partner of `c` in both
/// directions; the partner's dimension disambiguates up from down.
pub struct MorseGradient {
	pub pair: Vec<u32>,
	pub critical: Vec<bool>,
}

impl MorseGradient {
	/// The cofacet a cell is paired with, if any.
	pub fn pair_up(&self, complex: &CubicalComplex, cell: Cell) -> Option<Cell> {
		let p = self.pair[cell as usize];
		if p != NONE && complex.dim(p) == complex.dim(cell) + 1 {
			Some(p)
		} else {
			None
		}
	}

	/// The facet a cell is paired with, if any.
	pub fn pair_down(&self, complex: &CubicalComplex, cell: Cell) -> Option<Cell> {
		let p = self.pair[cell as usize];
		if p != NONE && complex.dim(cell) > 0 && complex.dim(p) == complex.dim(cell) - 1 {
			Some(p)
		} else {
			None
		}
	}
}

/// Vertex ordering key: value first, pixel index as the simulation-of-
/// simplicity tie break. Makes every lower star unambiguous.
fn vertex_key(values: &[f32], pixel: u32) -> (f32, u32) {
	(values[pixel as usize], pixel)
}

fn key_cmp(a: &(f32, u32), b: &(f32, u32)) -> Ordering {
	a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// The incident 0-cell with the greatest value.
fn max_vertex(complex: &CubicalComplex, values: &[f32], cell: Cell) -> Cell {
	let mut best = NONE;
	let mut best_key = (f32::NEG_INFINITY, 0u32);
	for v in complex.vertices(cell) {
		let key = vertex_key(values, complex.vertex_pixel(v));
		if best == NONE || key_cmp(&key, &best_key) == Ordering::Greater {
			best = v;
			best_key = key;
		}
	}
	best
}

/// Cell ordering within a lower star: lexicographic comparison of the
/// descending-sorted vertex keys.
fn cell_key(complex: &CubicalComplex, values: &[f32], cell: Cell) -> CellKey {
	let mut keys: CellKey = complex
		.vertices(cell)
		.iter()
		.map(|v| vertex_key(values, complex.vertex_pixel(*v)))
		.collect();
	keys.sort_by(|a, b| key_cmp(b, a));
	keys
}

type CellKey = smallvec::SmallVec<[(f32, u32); 4]>;

fn cell_key_cmp(a: &CellKey, b: &CellKey) -> Ordering {
	for (ka, kb) in a.iter().zip(b.iter()) {
		let ord = key_cmp(ka, kb);
		if ord != Ordering::Equal {
			return ord;
		}
	}
	a.len().cmp(&b.len())
}

fn pop_min(queue: &mut Vec<Cell>, complex: &CubicalComplex, values: &[f32]) -> Option<Cell> {
	if queue.is_empty() {
		return None;
	}
	let mut best = 0;
	let mut best_key = cell_key(complex, values, queue[0]);
	for i in 1..queue.len() {
		let key = cell_key(complex, values, queue[i]);
		if cell_key_cmp(&key, &best_key) == Ordering::Less {
			best = i;
			best_key = key;
		}
	}
	Some(queue.swap_remove(best))
}

/// Fills the discrete Morse gradient by processing the lower star of every
/// pixel vertex (Robins, Wood, Sheppard). Each cell belongs to exactly one
/// lower star (that of its maximal vertex), so the pairing is complete.
pub fn fill_morse_gradient(complex: &CubicalComplex, values: &[f32]) -> MorseGradient {
	let count = complex.cell_count() as usize;
	let mut g = MorseGradient {
		pair: vec![NONE; count],
		critical: vec![false; count],
	};

	for py in 0..complex.height {
		for px in 0..complex.width {
			let vertex = complex.cell(2 * px, 2 * py);
			process_lower_star(complex, values, vertex, &mut g);
		}
	}

	g
}

fn process_lower_star(
	complex: &CubicalComplex,
	values: &[f32],
	vertex: Cell,
	g: &mut MorseGradient,
) {
	// Star cells whose maximal vertex is this one.
	let mut star: Vec<Cell> = Vec::with_capacity(8);
	for e in complex.cofacets(vertex) {
		if max_vertex(complex, values, e) == vertex {
			star.push(e);
			for f in complex.cofacets(e) {
				if max_vertex(complex, values, f) == vertex && !star.contains(&f) {
					star.push(f);
				}
			}
		}
	}

	if star.is_empty() {
		g.critical[vertex as usize] = true;
		return;
	}

	let in_star = |cell: Cell, star: &[Cell]| star.contains(&cell);
	let num_unpaired_facets = |cell: Cell, star: &[Cell], g: &MorseGradient| {
		complex
			.facets(cell)
			.iter()
			.filter(|f| {
				(**f == vertex || in_star(**f, star))
					&& g.pair[**f as usize] == NONE
					&& !g.critical[**f as usize]
			})
			.count()
	};

	// Pair the vertex with its steepest edge.
	let mut edges: Vec<Cell> = star.iter().copied().filter(|c| complex.dim(*c) == 1).collect();
	let delta = pop_min(&mut edges, complex, values).unwrap();
	g.pair[vertex as usize] = delta;
	g.pair[delta as usize] = vertex;

	let mut pq_zero: Vec<Cell> = edges;
	let mut pq_one: Vec<Cell> = Vec::new();

	let push_cofacets = |of: Cell, star: &[Cell], g: &MorseGradient, pq_one: &mut Vec<Cell>| {
		for cf in complex.cofacets(of) {
			if in_star(cf, star)
				&& g.pair[cf as usize] == NONE
				&& !g.critical[cf as usize]
				&& num_unpaired_facets(cf, star, g) == 1
			{
				pq_one.push(cf);
			}
		}
	};

	push_cofacets(delta, &star, g, &mut pq_one);
	push_cofacets(vertex, &star, g, &mut pq_one);

	loop {
		while let Some(alpha) = pop_min(&mut pq_one, complex, values) {
			if g.pair[alpha as usize] != NONE || g.critical[alpha as usize] {
				continue;
			}
			match num_unpaired_facets(alpha, &star, g) {
				0 => pq_zero.push(alpha),
				_ => {
					// Pair alpha with its single unpaired facet.
					let facet = complex
						.facets(alpha)
						.iter()
						.copied()
						.find(|f| {
							(*f == vertex || in_star(*f, &star))
								&& g.pair[*f as usize] == NONE
								&& !g.critical[*f as usize]
						})
						.unwrap();
					g.pair[alpha as usize] = facet;
					g.pair[facet as usize] = alpha;
					pq_zero.retain(|c| *c != facet);
					push_cofacets(alpha, &star, g, &mut pq_one);
					push_cofacets(facet, &star, g, &mut pq_one);
				}
			}
		}

		match pop_min(&mut pq_zero, complex, values) {
			Some(gamma) => {
				if g.pair[gamma as usize] != NONE || g.critical[gamma as usize] {
					continue;
				}
				g.critical[gamma as usize] = true;
				push_cofacets(gamma, &star, g, &mut pq_one);
			}
			None => break,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn criticals_by_dim(complex: &CubicalComplex, g: &MorseGradient) -> [usize; 3] {
		let mut counts = [0usize; 3];
		for c in 0..complex.cell_count() {
			if g.critical[c as usize] {
				counts[complex.dim(c) as usize] += 1;
			}
		}
		counts
	}

	#[test]
	fn pairing_is_involutive_and_complete() {
		let (w, h) = (6u32, 6u32);
		let values: Vec<f32> = (0..w * h)
			.map(|i| ((i * 7919 + 13) % 101) as f32 / 101.0)
			.collect();
		let complex = CubicalComplex::new(w, h);
		let g = fill_morse_gradient(&complex, &values);

		for c in 0..complex.cell_count() {
			let p = g.pair[c as usize];
			if p == NONE {
				assert!(g.critical[c as usize], "cell {} unpaired and not critical", c);
			} else {
				assert!(!g.critical[c as usize]);
				assert_eq!(g.pair[p as usize], c, "pairing not involutive at {}", c);
				let dims = (complex.dim(c) as i32 - complex.dim(p) as i32).abs();
				assert_eq!(dims, 1);
			}
		}
	}

	#[test]
	fn euler_characteristic_holds() {
		// Alternating sum of critical cells equals the complex's Euler
		// characteristic, which is 1 for a full grid.
		let (w, h) = (8u32, 8u32);
		let values: Vec<f32> = (0..w * h)
			.map(|i| {
				let x = (i % w) as f32 / w as f32;
				let y = (i / w) as f32 / h as f32;
				0.3 + 0.2 * (x * 9.0).sin() + 0.25 * (y * 7.0).cos()
			})
			.collect();
		let complex = CubicalComplex::new(w, h);
		let g = fill_morse_gradient(&complex, &values);
		let [c0, c1, c2] = criticals_by_dim(&complex, &g);
		assert_eq!(c0 as i32 - c1 as i32 + c2 as i32, 1, "{} {} {}", c0, c1, c2);
		assert!(c0 >= 1 && c2 >= 1);
	}

	#[test]
	fn monotone_ramp_collapses_to_one_critical() {
		// Strictly monotone field: the grid collapses onto the single
		// minimum vertex, nothing else survives.
		let (w, h) = (7u32, 7u32);
		let values: Vec<f32> = (0..w * h)
			.map(|i| (i % w) as f32 + 10.0 * (i / w) as f32)
			.collect();
		let complex = CubicalComplex::new(w, h);
		let g = fill_morse_gradient(&complex, &values);
		let [c0, c1, c2] = criticals_by_dim(&complex, &g);
		assert_eq!([c0, c1, c2], [1, 0, 0]);
	}
}
