use math::Vec2;
use mesh::dijkstra::{DijkstraField, DijkstraParams};
use mesh::{
	build, chain, decimate, dijkstra, energy, features, simplify, EdgeKind, Mesh,
	UndirectedEdge, Vertex, VertexKind,
};
use skeleton::SkeletonVertexKind;
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug)]
pub struct RidgeParams {
	/// Normal z scaling for the divergence field.
	pub normal_scale: f32,
	/// Closed faces below this area collapse during simplification.
	pub min_area: f32,
	/// RDP tolerance for chain decimation.
	pub epsilon: f32,
	pub dijkstra: DijkstraParams,
}

impl Default for RidgeParams {
	fn default() -> Self {
		Self {
			normal_scale: 1.0,
			min_area: 4.0,
			epsilon: 1.0,
			dijkstra: DijkstraParams::default(),
		}
	}
}

/// Everything the ridge pipeline produces for one height channel.
pub struct RidgeMesh {
	pub mesh: Mesh,
	pub divergence: Vec<f32>,
	pub skeleton: skeleton::Skeleton,
	pub uphill: DijkstraField,
	pub downhill: DijkstraField,
	/// Combined per-pixel signed contour direction, zero over no-data.
	pub direction: Vec<Vec2>,
}

fn vertex_kind(kind: SkeletonVertexKind) -> VertexKind {
	match kind {
		SkeletonVertexKind::Maximum => VertexKind::Maximum,
		SkeletonVertexKind::Minimum => VertexKind::Minimum,
		SkeletonVertexKind::Saddle | SkeletonVertexKind::Branch => VertexKind::Junction,
		SkeletonVertexKind::Boundary => VertexKind::Endpoint,
		SkeletonVertexKind::Interior => VertexKind::Path,
	}
}

fn sample(height: &[f32], w: u32, h: u32, x: f32, y: f32) -> f32 {
	let px = math::clamp(x, 0.0, (w - 1) as f32) as u32;
	let py = math::clamp(y, 0.0, (h - 1) as f32) as u32;
	height[(py * w + px) as usize]
}

/// Runs the full geometry pipeline on one height channel: divergence,
/// Morse-Smale skeleton, DCEL build, tiny-face collapse, chain decimation,
/// feature discovery, energy propagation, and the two-pass edge Dijkstra,
/// combined into a per-pixel signed direction field.
pub fn build_ridge_mesh(height: &[f32], w: u32, h: u32, params: RidgeParams) -> RidgeMesh {
	let divergence = field::divergence::divergence_field(height, w, h, params.normal_scale);

	let skel = skeleton::extract(height, Some(&divergence), w, h);

	let vertices: Vec<Vertex> = skel
		.vertices
		.iter()
		.map(|v| Vertex {
			x: v.x,
			y: v.y,
			height: sample(height, w, h, v.x, v.y),
			divergence: v.divergence,
			kind: vertex_kind(v.kind),
			edge: -1,
		})
		.collect();

	let mut edge_set: BTreeSet<(i32, i32)> = BTreeSet::new();
	let mut edges: Vec<UndirectedEdge> = Vec::new();
	for e in &skel.edges {
		let kind = if e.ridge { EdgeKind::Ridge } else { EdgeKind::Valley };
		for pair in e.vertices.windows(2) {
			let (a, b) = (pair[0], pair[1]);
			if a == b {
				continue;
			}
			let key = (a.min(b), a.max(b));
			if edge_set.insert(key) {
				edges.push(UndirectedEdge { v0: key.0, v1: key.1, kind });
			}
		}
	}

	let mut mesh = build::build(vertices, &edges);
	simplify::simplify(&mut mesh, params.min_area);
	decimate::decimate(&mut mesh, params.epsilon);
	features::discover(&mut mesh);
	energy::propagate(&mut mesh);

	let (uphill, downhill) = dijkstra::propagate(&mesh, height, w, h, params.dijkstra);

	let direction = combine_direction(&mesh, height, w, h, &uphill, &downhill);

	log::debug!(
		"ridge mesh: {} vertices, {} half-edges, {} features",
		mesh.vertices.len(), mesh.half_edges.len(), mesh.features.len()
	);

	RidgeMesh {
		mesh,
		divergence,
		skeleton: skel,
		uphill,
		downhill,
		direction,
	}
}

/// Per-pixel signed contour direction: Catmull-Rom chain tangents of both
/// passes' winning edges, sign-aligned with the propagated tangents and
/// blended by 1 / (cost + 1).
fn combine_direction(
	mesh: &Mesh,
	height: &[f32],
	w: u32,
	h: u32,
	uphill: &DijkstraField,
	downhill: &DijkstraField,
) -> Vec<Vec2> {
	let n = (w * h) as usize;
	let mut out = vec![Vec2::ZERO; n];

	for i in 0..n {
		if height[i] == 0.0 {
			continue;
		}
		let p = Vec2::new((i as u32 % w) as f32, (i as u32 / w) as f32);

		let mut u_tang = chain::edge_tangent_at(mesh, uphill.edge_id[i], p);
		let mut d_tang = chain::edge_tangent_at(mesh, downhill.edge_id[i], p);

		// The propagated tangent carries the canonical sign along the chain;
		// align the spline tangents with it.
		if u_tang.dot(uphill.dir[i]) < 0.0 {
			u_tang = -u_tang;
		}
		if d_tang.dot(downhill.dir[i]) < 0.0 {
			d_tang = -d_tang;
		}

		let u_w = if uphill.cost[i].is_finite() { 1.0 / (uphill.cost[i] + 1.0) } else { 0.0 };
		let d_w = if downhill.cost[i].is_finite() { 1.0 / (downhill.cost[i] + 1.0) } else { 0.0 };

		let combined = u_tang.normalize_or(Vec2::ZERO) * u_w + d_tang.normalize_or(Vec2::ZERO) * d_w;
		out[i] = combined.normalize_or(Vec2::ZERO);
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn island_with_ridge(w: u32, h: u32) -> Vec<f32> {
		// An island with a tent ridge along its middle column.
		let mut f = vec![0.0f32; (w * h) as usize];
		for y in 2..h - 2 {
			for x in 2..w - 2 {
				let d = (x as f32 - w as f32 / 2.0).abs();
				f[(y * w + x) as usize] = (1.0 - d * 0.08).max(0.2);
			}
		}
		f
	}

	#[test]
	fn pipeline_produces_a_connected_mesh() {
		let (w, h) = (24u32, 24u32);
		let f = island_with_ridge(w, h);
		let rm = build_ridge_mesh(&f, w, h, RidgeParams::default());

		assert!(!rm.mesh.half_edges.is_empty());
		// Twin involution survives the rebuild chain.
		for i in 0..rm.mesh.half_edges.len() as i32 {
			let twin = rm.mesh.half_edges[i as usize].twin;
			assert_eq!(rm.mesh.half_edges[twin as usize].twin, i);
		}
		// Energy canonicalisation: never two hot sides.
		for i in (0..rm.mesh.half_edges.len()).step_by(2) {
			let a = rm.mesh.half_edges[i].energy;
			let b = rm.mesh.half_edges[i + 1].energy;
			assert!(a == 0.0 || b == 0.0);
		}
	}

	#[test]
	fn direction_is_zero_over_nodata_and_unit_elsewhere() {
		let (w, h) = (24u32, 24u32);
		let f = island_with_ridge(w, h);
		let rm = build_ridge_mesh(&f, w, h, RidgeParams::default());

		for i in 0..(w * h) as usize {
			if f[i] == 0.0 {
				assert_eq!(rm.direction[i], Vec2::ZERO);
			} else {
				let len = rm.direction[i].length();
				assert!(len == 0.0 || (len - 1.0).abs() < 1e-4);
			}
		}
	}
}
