use super::{build, EdgeKind, Mesh, UndirectedEdge};
use math::Vec2;
use std::collections::BTreeSet;

/// Ramer-Douglas-Peucker decimation of degree-2 chains.
///
/// Chains are maximal runs of degree-2 vertices between non-degree-2
/// anchors (degree counts deduplicated neighbours). Each chain polyline is
/// simplified with tolerance `epsilon`; all-degree-2 cycles are broken at
/// an arbitrary vertex first. The DCEL is rebuilt from the survivors.
pub fn decimate(mesh: &mut Mesh, epsilon: f32) {
	let epsilon = if epsilon > 0.0 { epsilon } else { 1.0 };
	let num_verts = mesh.vertices.len();
	let num_he = mesh.half_edges.len();

	struct Neighbor {
		vertex: i32,
		he: i32,
	}
	let mut adj: Vec<Vec<Neighbor>> = (0..num_verts).map(|_| Vec::new()).collect();
	for i in 0..num_he as i32 {
		let origin = mesh.half_edges[i as usize].origin;
		adj[origin as usize].push(Neighbor { vertex: mesh.dest(i), he: i });
	}

	let mut degree = vec![0usize; num_verts];
	for v in 0..num_verts {
		let unique: BTreeSet<i32> = adj[v].iter().map(|n| n.vertex).collect();
		degree[v] = unique.len();
	}

	let mut survives = vec![false; num_verts];
	for v in 0..num_verts {
		if degree[v] != 2 {
			survives[v] = true;
		}
	}

	let mut visited = vec![false; num_verts];
	let mut edge_set: BTreeSet<(i32, i32)> = BTreeSet::new();
	let mut pending: Vec<UndirectedEdge> = Vec::new();
	let mut chains_found = 0;

	let positions: Vec<Vec2> = mesh.vertices.iter().map(|v| Vec2::new(v.x, v.y)).collect();

	let mut add_chain_edges = |chain: &[i32], keep: &[bool], kind: EdgeKind,
	                           edge_set: &mut BTreeSet<(i32, i32)>,
	                           pending: &mut Vec<UndirectedEdge>| {
		let mut last_kept: Option<i32> = None;
		for (i, &vi) in chain.iter().enumerate() {
			if !keep[i] {
				continue;
			}
			if let Some(prev) = last_kept {
				if prev != vi {
					let key = (prev.min(vi), prev.max(vi));
					if edge_set.insert(key) {
						pending.push(UndirectedEdge { v0: key.0, v1: key.1, kind });
					}
				}
			}
			last_kept = Some(vi);
		}
	};

	// Chains anchored at non-degree-2 vertices.
	for start in 0..num_verts as i32 {
		if degree[start as usize] == 2 {
			continue;
		}

		for ni in 0..adj[start as usize].len() {
			let first = adj[start as usize][ni].vertex;
			let chain_kind = mesh.half_edges[adj[start as usize][ni].he as usize].kind;
			if degree[first as usize] != 2 || visited[first as usize] {
				continue;
			}

			let mut chain = vec![start];
			let mut prev = start;
			let mut cur = first;
			while degree[cur as usize] == 2 && !visited[cur as usize] {
				visited[cur as usize] = true;
				chain.push(cur);
				let next = adj[cur as usize].iter().map(|n| n.vertex).find(|&v| v != prev);
				match next {
					Some(n) => {
						prev = cur;
						cur = n;
					}
					None => break,
				}
			}
			chain.push(cur);

			let points: Vec<Vec2> = chain.iter().map(|&v| positions[v as usize]).collect();
			let keep = if chain.len() < 3 {
				vec![true; chain.len()]
			} else {
				math::polyline::rdp_keep(&points, epsilon)
			};
			for (i, &vi) in chain.iter().enumerate() {
				if keep[i] {
					survives[vi as usize] = true;
				}
			}
			add_chain_edges(&chain, &keep, chain_kind, &mut edge_set, &mut pending);
			chains_found += 1;
		}
	}

	// Degree-2 cycles with no anchor: break at the first vertex.
	for v in 0..num_verts as i32 {
		if degree[v as usize] != 2 || visited[v as usize] {
			continue;
		}

		let mut chain = Vec::new();
		let mut chain_kind = EdgeKind::Ridge;
		let mut prev = -1i32;
		let mut cur = v;
		loop {
			visited[cur as usize] = true;
			chain.push(cur);
			let next = adj[cur as usize]
				.iter()
				.find(|n| n.vertex != prev)
				.map(|n| (n.vertex, n.he));
			match next {
				Some((n, he)) => {
					chain_kind = mesh.half_edges[he as usize].kind;
					prev = cur;
					cur = n;
				}
				None => break,
			}
			if cur == v {
				break;
			}
		}

		chain.push(chain[0]);
		let keep = if chain.len() < 5 {
			// Too small to thin out; keep the whole cycle.
			vec![true; chain.len()]
		} else {
			let points: Vec<Vec2> = chain.iter().map(|&vi| positions[vi as usize]).collect();
			math::polyline::rdp_keep(&points, epsilon)
		};
		for (i, &vi) in chain.iter().enumerate() {
			if keep[i] {
				survives[vi as usize] = true;
			}
		}
		add_chain_edges(&chain, &keep, chain_kind, &mut edge_set, &mut pending);
		chains_found += 1;
	}

	// Direct anchor-to-anchor edges are not part of any chain.
	for i in 0..num_he as i32 {
		let a = mesh.half_edges[i as usize].origin;
		let b = mesh.dest(i);
		if degree[a as usize] != 2 && degree[b as usize] != 2 {
			let key = (a.min(b), a.max(b));
			if edge_set.insert(key) {
				pending.push(UndirectedEdge {
					v0: key.0,
					v1: key.1,
					kind: mesh.half_edges[i as usize].kind,
				});
			}
		}
	}

	let mut remap = vec![-1i32; num_verts];
	let mut new_verts = Vec::new();
	for v in 0..num_verts {
		if survives[v] {
			remap[v] = new_verts.len() as i32;
			new_verts.push(mesh.vertices[v]);
		}
	}

	let mut new_edges = Vec::with_capacity(pending.len());
	for e in &pending {
		let a = remap[e.v0 as usize];
		let b = remap[e.v1 as usize];
		if a < 0 || b < 0 || a == b {
			continue;
		}
		new_edges.push(UndirectedEdge { v0: a.min(b), v1: a.max(b), kind: e.kind });
	}

	log::debug!(
		"decimate eps={}: {} chains, {} -> {} vertices",
		epsilon, chains_found, num_verts, new_verts.len()
	);

	*mesh = build::build(new_verts, &new_edges);
}

#[cfg(test)]
mod tests {
	use super::super::test_support::test_vertex;
	use super::super::{build, VertexKind};
	use super::*;

	/// A nearly straight chain of path vertices between two junctions, with
	/// a stub to make the endpoints degree != 2.
	fn chain_mesh() -> Mesh {
		let mut vertices = vec![
			test_vertex(0.0, 0.0),
			test_vertex(5.0, 0.1),
			test_vertex(10.0, -0.1),
			test_vertex(15.0, 0.05),
			test_vertex(20.0, 0.0),
			test_vertex(0.0, 5.0),
			test_vertex(20.0, 5.0),
		];
		for i in 1..4 {
			vertices[i].kind = VertexKind::Path;
		}
		let edges = vec![
			UndirectedEdge { v0: 0, v1: 1, kind: EdgeKind::Ridge },
			UndirectedEdge { v0: 1, v1: 2, kind: EdgeKind::Ridge },
			UndirectedEdge { v0: 2, v1: 3, kind: EdgeKind::Ridge },
			UndirectedEdge { v0: 3, v1: 4, kind: EdgeKind::Ridge },
			UndirectedEdge { v0: 0, v1: 5, kind: EdgeKind::Valley },
			UndirectedEdge { v0: 4, v1: 6, kind: EdgeKind::Valley },
		];
		build::build(vertices, &edges)
	}

	#[test]
	fn straight_chain_collapses() {
		let mut mesh = chain_mesh();
		decimate(&mut mesh, 1.0);
		// The three wiggly path vertices fall inside the tolerance band.
		assert_eq!(mesh.vertices.len(), 4);
		assert_eq!(mesh.half_edges.len(), 6);
	}

	#[test]
	fn sharp_corner_survives() {
		let mut vertices = vec![
			test_vertex(0.0, 0.0),
			test_vertex(10.0, 0.0),
			test_vertex(10.0, 10.0),
		];
		vertices[1].kind = VertexKind::Path;
		let edges = vec![
			UndirectedEdge { v0: 0, v1: 1, kind: EdgeKind::Ridge },
			UndirectedEdge { v0: 1, v1: 2, kind: EdgeKind::Ridge },
		];
		let mut mesh = build::build(vertices, &edges);
		decimate(&mut mesh, 1.0);
		// The right-angle corner at (10, 0) is far from the chord.
		assert_eq!(mesh.vertices.len(), 3);
		assert_eq!(mesh.half_edges.len(), 4);
	}

	#[test]
	fn degree_two_cycle_is_broken_and_kept() {
		let vertices = vec![
			test_vertex(0.0, 0.0),
			test_vertex(10.0, 0.0),
			test_vertex(10.0, 10.0),
			test_vertex(0.0, 10.0),
		];
		let edges = vec![
			UndirectedEdge { v0: 0, v1: 1, kind: EdgeKind::Valley },
			UndirectedEdge { v0: 1, v1: 2, kind: EdgeKind::Valley },
			UndirectedEdge { v0: 2, v1: 3, kind: EdgeKind::Valley },
			UndirectedEdge { v0: 3, v1: 0, kind: EdgeKind::Valley },
		];
		let mut mesh = build::build(vertices, &edges);
		decimate(&mut mesh, 1.0);
		// Square corners all deviate from the chord; nothing vanishes.
		assert_eq!(mesh.vertices.len(), 4);
		assert_eq!(mesh.half_edges.len(), 8);
	}
}
