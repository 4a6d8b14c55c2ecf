use super::{Mesh, VertexKind};
use math::spline::catmull_rom_derivative;
use math::Vec2;

/// Continuation of a same-kind chain at the destination of `arriving`.
///
/// Rotates around the destination vertex looking for another outgoing
/// half-edge of the same kind. Returns -1 at chain ends: any non-Path
/// destination, or a dead end.
pub fn chain_continuation(mesh: &Mesh, arriving: i32) -> i32 {
	let arr_kind = mesh.half_edges[arriving as usize].kind;
	let twin = mesh.half_edges[arriving as usize].twin;
	let dest = mesh.half_edges[twin as usize].origin;
	if mesh.vertices[dest as usize].kind != VertexKind::Path {
		return -1;
	}

	let mut iter = mesh.next_around_vertex(twin);
	while iter != twin {
		if mesh.half_edges[iter as usize].kind == arr_kind {
			return iter;
		}
		iter = mesh.next_around_vertex(iter);
	}
	-1
}

/// Traces a chain forward from `start` through Path vertices, in chain
/// order. Stops on closed loops.
pub fn trace_chain(mesh: &Mesh, start: i32) -> Vec<i32> {
	let mut chain = vec![start];
	let mut cur = start;
	loop {
		let next = chain_continuation(mesh, cur);
		if next < 0 || next == start {
			break;
		}
		chain.push(next);
		cur = next;
	}
	chain
}

/// Best chain continuation from the origin vertex of `from`: the outgoing
/// edge whose direction aligns best with (ref). Returns the destination
/// vertex, or -1 when the vertex has no other edges.
fn find_continuation(mesh: &Mesh, from: i32, reference: Vec2) -> i32 {
	let mut best_dest = -1;
	let mut best_align = -2.0f32;

	let mut cur = mesh.next_around_vertex(from);
	while cur != from {
		let dest = mesh.dest(cur);
		let o = mesh.vertex_pos(mesh.half_edges[cur as usize].origin);
		let d = mesh.vertex_pos(dest);
		let dir = d - o;
		let m = dir.length();
		if m > 1e-6 {
			let align = dir.dot(reference) / m;
			if align > best_align {
				best_align = align;
				best_dest = dest;
			}
		}
		cur = mesh.next_around_vertex(cur);
	}

	best_dest
}

/// Catmull-Rom tangent of the chain through half-edge `he` at the
/// projection of pixel `p` onto its segment.
///
/// The chain is extended one vertex backward from the origin and one
/// forward from the destination to form the four control points; terminals
/// reflect (`2 P1 - P2`) so the spline degrades to the straight edge.
/// Falls back to the raw edge tangent when the spline collapses.
pub fn edge_tangent_at(mesh: &Mesh, he: i32, p: Vec2) -> Vec2 {
	if he < 0 {
		return Vec2::ZERO;
	}

	let half = &mesh.half_edges[he as usize];
	let p1 = mesh.vertex_pos(half.origin);
	let p2 = mesh.vertex_pos(mesh.dest(he));
	let edge = p2 - p1;

	let p0 = match find_continuation(mesh, he, -half.tangent) {
		v if v >= 0 => mesh.vertex_pos(v),
		_ => 2.0 * p1 - p2,
	};
	let p3 = match find_continuation(mesh, half.twin, half.tangent) {
		v if v >= 0 => mesh.vertex_pos(v),
		_ => 2.0 * p2 - p1,
	};

	let len_sq = edge.length_sq();
	let t = if len_sq < 1e-6 {
		0.5
	} else {
		math::clamp((p - p1).dot(edge) / len_sq, 0.0, 1.0)
	};

	let tangent = catmull_rom_derivative(p0, p1, p2, p3, t);
	let m = tangent.length();
	if m > 1e-6 {
		tangent / m
	} else {
		half.tangent
	}
}
