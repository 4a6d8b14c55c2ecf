use super::{EdgeKind, HalfEdge, Mesh, UndirectedEdge, Vertex, NO_FACE};
use math::Vec2;
use smallvec::SmallVec;

/// Builds a DCEL from vertices and tagged undirected edges.
///
/// Each undirected edge becomes a twin pair with opposite tangents. The
/// outgoing half-edges of every vertex are sorted CCW by atan2 of their
/// tangent, and consecutive pairs are linked with
/// `next(twin(e_i)) = e_(i+1)`, which makes every face cycle walkable.
pub fn build(vertices: Vec<Vertex>, edges: &[UndirectedEdge]) -> Mesh {
	let mut mesh = Mesh {
		vertices,
		half_edges: Vec::with_capacity(edges.len() * 2),
		features: Vec::new(),
	};

	for e in edges {
		let a = mesh.vertex_pos(e.v0);
		let b = mesh.vertex_pos(e.v1);
		let d = b - a;
		let length = d.length();
		let tangent = if length > 1e-6 { d / length } else { Vec2::ZERO };

		let fwd = mesh.half_edges.len() as i32;
		let twn = fwd + 1;

		mesh.half_edges.push(HalfEdge {
			origin: e.v0,
			twin: twn,
			next: -1,
			prev: -1,
			face: NO_FACE,
			kind: e.kind,
			tangent,
			energy: 0.0,
			length,
		});
		mesh.half_edges.push(HalfEdge {
			origin: e.v1,
			twin: fwd,
			next: -1,
			prev: -1,
			face: NO_FACE,
			kind: e.kind,
			tangent: -tangent,
			energy: 0.0,
			length,
		});
	}

	let num_verts = mesh.vertices.len();
	let mut outgoing: Vec<SmallVec<[i32; 4]>> = vec![SmallVec::new(); num_verts];
	for (i, he) in mesh.half_edges.iter().enumerate() {
		if he.origin >= 0 && (he.origin as usize) < num_verts {
			outgoing[he.origin as usize].push(i as i32);
		}
	}

	for out in outgoing.iter_mut() {
		if out.len() < 2 {
			continue;
		}
		out.sort_by(|&a, &b| {
			let ta = mesh.half_edges[a as usize].tangent;
			let tb = mesh.half_edges[b as usize].tangent;
			ta.y.atan2(ta.x).total_cmp(&tb.y.atan2(tb.x))
		});
	}

	for out in &outgoing {
		let n = out.len();
		for i in 0..n {
			let e_i = out[i];
			let e_next = out[(i + 1) % n];
			let twin_i = mesh.half_edges[e_i as usize].twin;
			mesh.half_edges[twin_i as usize].next = e_next;
			mesh.half_edges[e_next as usize].prev = twin_i;
		}
	}

	for (v, out) in outgoing.iter().enumerate() {
		mesh.vertices[v].edge = out.first().copied().unwrap_or(-1);
	}

	log::debug!(
		"dcel build: {} half-edges from {} undirected edges",
		mesh.half_edges.len(), edges.len()
	);

	mesh
}
