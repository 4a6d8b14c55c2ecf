use super::{Mesh, VertexKind};
use math::Vec2;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

const SQRT2: f32 = std::f32::consts::SQRT_2;

const DX: [i32; 8] = [-1, 0, 1, -1, 1, -1, 0, 1];
const DY: [i32; 8] = [-1, -1, -1, 0, 0, 1, 1, 1];
const DCOST: [f32; 8] = [SQRT2, 1.0, SQRT2, 1.0, 1.0, SQRT2, 1.0, SQRT2];
const SDX: [f32; 8] = [-SQRT2 / 2.0, 0.0, SQRT2 / 2.0, -1.0, 1.0, -SQRT2 / 2.0, 0.0, SQRT2 / 2.0];
const SDY: [f32; 8] = [-SQRT2 / 2.0, -1.0, -SQRT2 / 2.0, 0.0, 0.0, SQRT2 / 2.0, 1.0, SQRT2 / 2.0];

#[derive(Clone, Copy, Debug)]
pub struct DijkstraParams {
	pub height_bias: f32,
	pub dir_bias: f32,
	pub tangent_bias: f32,
	/// Initial cost for seeds on edges touching an endpoint vertex.
	pub terminal_cost: f32,
}

impl Default for DijkstraParams {
	fn default() -> Self {
		Self {
			height_bias: 50.0,
			dir_bias: 20.0,
			tangent_bias: 10.0,
			terminal_cost: 3.0,
		}
	}
}

/// Per-pixel result of one propagation pass.
pub struct DijkstraField {
	/// Propagated canonical tangent.
	pub dir: Vec<Vec2>,
	pub cost: Vec<f32>,
	/// Seed pixel the direction came from.
	pub seed: Vec<Vec2>,
	/// Winning half-edge id, -1 where unreached.
	pub edge_id: Vec<i32>,
	pub terminal: Vec<u8>,
}

impl DijkstraField {
	fn new(n: usize) -> Self {
		Self {
			dir: vec![Vec2::ZERO; n],
			cost: vec![f32::INFINITY; n],
			seed: vec![Vec2::ZERO; n],
			edge_id: vec![-1; n],
			terminal: vec![0; n],
		}
	}
}

#[derive(Clone, Copy)]
struct SeedPixel {
	tangent: Vec2,
	half_edge: i32,
	terminal: bool,
}

/// Visits the pixels of a grid line segment (Bresenham).
pub fn for_each_line_pixel(
	x0: i32,
	y0: i32,
	x1: i32,
	y1: i32,
	mut visit: impl FnMut(i32, i32),
) {
	let (mut x0, mut y0) = (x0, y0);
	let adx = (x1 - x0).abs();
	let ady = (y1 - y0).abs();
	let sx = if x0 < x1 { 1 } else { -1 };
	let sy = if y0 < y1 { 1 } else { -1 };
	let mut err = adx - ady;

	loop {
		visit(x0, y0);
		if x0 == x1 && y0 == y1 {
			break;
		}
		let e2 = 2 * err;
		if e2 > -ady {
			err -= ady;
			x0 += sx;
		}
		if e2 < adx {
			err += adx;
			y0 += sy;
		}
	}
}

/// Rasterises every undirected edge, storing the canonical (higher-energy)
/// half-edge's tangent and id on each covered pixel. First writer wins.
fn rasterize_seeds(mesh: &Mesh, w: u32, h: u32) -> Vec<Option<SeedPixel>> {
	let n = (w * h) as usize;
	let mut seeds: Vec<Option<SeedPixel>> = vec![None; n];
	let num_he = mesh.half_edges.len() as i32;

	for hi in 0..num_he {
		let he = &mesh.half_edges[hi as usize];
		if he.twin < hi {
			continue;
		}
		let tw = &mesh.half_edges[he.twin as usize];

		let a = mesh.vertex_pos(he.origin);
		let b = mesh.vertex_pos(tw.origin);

		let terminal = mesh.vertices[he.origin as usize].kind == VertexKind::Endpoint
			|| mesh.vertices[tw.origin as usize].kind == VertexKind::Endpoint;

		// Energy propagates toward chain ends along the canonical side, so
		// seeding with it keeps the sign consistent along each chain.
		let canon_hi = if he.energy >= tw.energy { hi } else { he.twin };
		let canon = &mesh.half_edges[canon_hi as usize];

		for_each_line_pixel(
			a.x.round() as i32,
			a.y.round() as i32,
			b.x.round() as i32,
			b.y.round() as i32,
			|x, y| {
				if x >= 0 && x < w as i32 && y >= 0 && y < h as i32 {
					let pi = (y as u32 * w + x as u32) as usize;
					if seeds[pi].is_none() {
						seeds[pi] = Some(SeedPixel {
							tangent: canon.tangent,
							half_edge: canon_hi,
							terminal,
						});
					}
				}
			},
		);
	}

	seeds
}

/// Unit height gradient per pixel, zero where flat.
fn unit_gradients(height: &[f32], w: u32, h: u32) -> Vec<Vec2> {
	let mut grad = vec![Vec2::ZERO; (w * h) as usize];
	for y in 0..h {
		for x in 0..w {
			let i = (y * w + x) as usize;
			let xm = if x > 0 { x - 1 } else { 0 };
			let xp = if x < w - 1 { x + 1 } else { w - 1 };
			let ym = if y > 0 { y - 1 } else { 0 };
			let yp = if y < h - 1 { y + 1 } else { h - 1 };

			let gx = (height[(y * w + xp) as usize] - height[(y * w + xm) as usize])
				* if xp > xm + 1 { 0.5 } else { 1.0 };
			let gy = (height[(yp * w + x) as usize] - height[(ym * w + x) as usize])
				* if yp > ym + 1 { 0.5 } else { 1.0 };

			let g = Vec2::new(gx, gy);
			if g.length() > 1e-6 {
				grad[i] = g / g.length();
			}
		}
	}
	grad
}

fn dijkstra_pass(
	height: &[f32],
	grad: &[Vec2],
	seeds: &[Option<SeedPixel>],
	w: u32,
	h: u32,
	params: DijkstraParams,
	uphill: bool,
) -> DijkstraField {
	let n = (w * h) as usize;
	let mut out = DijkstraField::new(n);

	// Min-heap with pixel-index tie break for deterministic propagation.
	let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, u32)>> = BinaryHeap::new();

	for (i, seed) in seeds.iter().enumerate() {
		if let Some(s) = seed {
			let init = if s.terminal { params.terminal_cost } else { 0.0 };
			out.cost[i] = init;
			out.dir[i] = s.tangent;
			out.seed[i] = Vec2::new((i as u32 % w) as f32, (i as u32 / w) as f32);
			out.edge_id[i] = s.half_edge;
			out.terminal[i] = s.terminal as u8;
			heap.push(Reverse((OrderedFloat(init), i as u32)));
		}
	}

	while let Some(Reverse((OrderedFloat(cost), ci))) = heap.pop() {
		if cost > out.cost[ci as usize] {
			continue;
		}

		let cx = (ci % w) as i32;
		let cy = (ci / w) as i32;
		let h_cur = height[ci as usize];
		let g = grad[ci as usize];
		let g_mag = g.length();
		let tangent = out.dir[ci as usize];
		let t_mag = tangent.length();

		for d in 0..8 {
			let nx = cx + DX[d];
			let ny = cy + DY[d];
			if nx < 0 || nx >= w as i32 || ny < 0 || ny >= h as i32 {
				continue;
			}
			let ni = (ny as u32 * w + nx as u32) as usize;

			let dh = height[ni] - h_cur;
			let h_penalty = if uphill { dh.max(0.0) } else { (-dh).max(0.0) };

			// Follow gradient flow lines: the uphill pass floods downhill,
			// so steps against the gradient are free.
			let mut d_penalty = 0.0;
			if g_mag > 0.1 {
				let dot = SDX[d] * g.x + SDY[d] * g.y;
				let alignment = (if uphill { -dot } else { dot }).max(0.0);
				d_penalty = 1.0 - alignment;
			}

			// Discourage spreading along the seeding edge itself.
			let mut t_penalty = 0.0;
			if t_mag > 1e-6 {
				t_penalty = (SDX[d] * tangent.x + SDY[d] * tangent.y).abs() / t_mag;
			}

			let new_cost = cost
				+ DCOST[d]
					* (1.0 + params.height_bias * h_penalty
						+ params.dir_bias * d_penalty
						+ params.tangent_bias * t_penalty);

			if new_cost < out.cost[ni] {
				out.cost[ni] = new_cost;
				out.dir[ni] = out.dir[ci as usize];
				out.seed[ni] = out.seed[ci as usize];
				out.edge_id[ni] = out.edge_id[ci as usize];
				out.terminal[ni] = out.terminal[ci as usize];
				heap.push(Reverse((OrderedFloat(new_cost), ni as u32)));
			}
		}
	}

	out
}

/// Propagates canonical edge directions to every pixel with two
/// multi-source passes: uphill (edges flood downhill) and downhill.
pub fn propagate(
	mesh: &Mesh,
	height: &[f32],
	w: u32,
	h: u32,
	params: DijkstraParams,
) -> (DijkstraField, DijkstraField) {
	let seeds = rasterize_seeds(mesh, w, h);
	let seed_count = seeds.iter().filter(|s| s.is_some()).count();
	log::debug!(
		"edge dijkstra: {} seed pixels from {} edges",
		seed_count, mesh.half_edges.len() / 2
	);

	let grad = unit_gradients(height, w, h);

	let uphill = dijkstra_pass(height, &grad, &seeds, w, h, params, true);
	let downhill = dijkstra_pass(height, &grad, &seeds, w, h, params, false);

	let reached = uphill.cost.iter().filter(|c| c.is_finite()).count();
	log::debug!("edge dijkstra: uphill reached {}/{}", reached, w * h);

	(uphill, downhill)
}

#[cfg(test)]
mod tests {
	use super::super::test_support::test_vertex;
	use super::super::{build, features, EdgeKind, UndirectedEdge, VertexKind};
	use super::*;

	#[test]
	fn bresenham_covers_diagonal() {
		let mut pixels = Vec::new();
		for_each_line_pixel(0, 0, 4, 4, |x, y| pixels.push((x, y)));
		assert_eq!(pixels.len(), 5);
		assert_eq!(pixels[0], (0, 0));
		assert_eq!(pixels[4], (4, 4));
	}

	/// Scenario: a row-ramp with one horizontal ridge edge in the middle.
	#[test]
	fn ramp_propagates_horizontal_direction() {
		let (w, h) = (32u32, 32u32);
		let height: Vec<f32> = (0..w * h).map(|i| (i % w) as f32 / w as f32).collect();

		let mut vertices = vec![test_vertex(8.0, 16.0), test_vertex(24.0, 16.0)];
		vertices[0].kind = VertexKind::Junction;
		vertices[1].kind = VertexKind::Junction;
		let edges = vec![UndirectedEdge { v0: 0, v1: 1, kind: EdgeKind::Ridge }];
		let mut mesh = build::build(vertices, &edges);
		features::discover(&mut mesh);
		mesh.half_edges[0].energy = 1.0;

		let (up, down) = propagate(&mesh, &height, w, h, DijkstraParams::default());

		let mut aligned = 0;
		let mut total = 0;
		for i in 0..(w * h) as usize {
			let d = up.dir[i];
			if up.cost[i].is_finite() {
				total += 1;
				if d.dot(Vec2::X).abs() > 0.95 {
					aligned += 1;
				}
			}
			assert!(down.cost[i].is_finite());
		}
		assert_eq!(total, (w * h) as i32);
		assert!(aligned as f32 / total as f32 > 0.9);
	}

	#[test]
	fn seeds_start_at_zero_and_terminals_at_three() {
		let (w, h) = (16u32, 16u32);
		let height = vec![0.5f32; (w * h) as usize];

		let mut vertices = vec![test_vertex(2.0, 8.0), test_vertex(12.0, 8.0)];
		vertices[1].kind = VertexKind::Endpoint;
		let edges = vec![UndirectedEdge { v0: 0, v1: 1, kind: EdgeKind::Valley }];
		let mut mesh = build::build(vertices, &edges);
		features::discover(&mut mesh);

		let (up, _) = propagate(&mesh, &height, w, h, DijkstraParams::default());
		let seed_idx = (8 * w + 5) as usize;
		assert_eq!(up.cost[seed_idx], 3.0);
		assert_eq!(up.terminal[seed_idx], 1);
	}

	#[test]
	fn costs_never_decrease_along_predecessors() {
		// Finality: a settled pixel's cost is never above its downstream
		// neighbors' alternatives; spot-check monotonicity toward the seed.
		let (w, h) = (16u32, 16u32);
		let height: Vec<f32> = (0..w * h).map(|i| (i / w) as f32 / h as f32).collect();

		let vertices = vec![test_vertex(4.0, 8.0), test_vertex(12.0, 8.0)];
		let edges = vec![UndirectedEdge { v0: 0, v1: 1, kind: EdgeKind::Ridge }];
		let mut mesh = build::build(vertices, &edges);
		features::discover(&mut mesh);

		let (up, _) = propagate(&mesh, &height, w, h, DijkstraParams::default());
		for y in 0..h {
			for x in 0..w {
				let i = (y * w + x) as usize;
				assert!(up.cost[i].is_finite());
				// Some 8-neighbor must be strictly cheaper unless we are a
				// seed at cost zero.
				if up.cost[i] > 0.0 {
					let mut cheaper = false;
					for d in 0..8 {
						let nx = x as i32 + DX[d];
						let ny = y as i32 + DY[d];
						if nx < 0 || nx >= w as i32 || ny < 0 || ny >= h as i32 {
							continue;
						}
						if up.cost[(ny as u32 * w + nx as u32) as usize] < up.cost[i] {
							cheaper = true;
							break;
						}
					}
					assert!(cheaper, "pixel ({}, {}) has no cheaper neighbor", x, y);
				}
			}
		}
	}
}
