use super::chain::trace_chain;
use super::{EdgeKind, Mesh};
use math::Vec2;

const VALLEY_FACTOR: f32 = 0.3;
const ALIGN_THRESH: f32 = 0.3;

/// Chain-topological energy propagation.
///
/// For each same-kind chain traced through Path vertices, a forward and a
/// backward confidence sweep accumulate chain length with dot-product decay
/// at every turn; the chain-direction half-edge keeps max(fwd, bwd) and its
/// twin is zeroed, making it the canonical direction for Dijkstra seeding.
fn propagate_chains(mesh: &mut Mesh, kind: EdgeKind, seed_factor: f32) {
	let num_he = mesh.half_edges.len() as i32;
	let mut visited = vec![false; num_he as usize];
	let mut chain_count = 0;

	for hi in 0..num_he {
		if mesh.half_edges[hi as usize].kind != kind || visited[hi as usize] {
			continue;
		}

		// Walk backward from hi to one end of its chain.
		let mut chain_start = hi;
		loop {
			let origin = mesh.half_edges[chain_start as usize].origin;
			if mesh.vertices[origin as usize].kind != super::VertexKind::Path {
				break;
			}

			// The other same-kind outgoing half-edge at the origin.
			let mut other = -1;
			let mut iter = mesh.next_around_vertex(chain_start);
			while iter != chain_start {
				if mesh.half_edges[iter as usize].kind == kind {
					other = iter;
					break;
				}
				iter = mesh.next_around_vertex(iter);
			}
			if other < 0 {
				break;
			}

			let prev = mesh.half_edges[other as usize].twin;
			if prev == hi || visited[prev as usize] {
				break;
			}
			chain_start = prev;
		}

		let chain = trace_chain(mesh, chain_start);
		let n = chain.len();

		for &idx in &chain {
			visited[idx as usize] = true;
			visited[mesh.half_edges[idx as usize].twin as usize] = true;
		}

		let mut fwd = vec![0.0f32; n];
		fwd[0] = mesh.half_edges[chain[0] as usize].length * seed_factor;
		for i in 1..n {
			let prev = &mesh.half_edges[chain[i - 1] as usize];
			let cur = &mesh.half_edges[chain[i] as usize];
			let dot = prev.tangent.dot(cur.tangent);
			let incoming = if dot > 0.0 { fwd[i - 1] * dot } else { 0.0 };
			fwd[i] = incoming + cur.length * seed_factor;
		}

		let mut bwd = vec![0.0f32; n];
		bwd[n - 1] = mesh.half_edges[chain[n - 1] as usize].length * seed_factor;
		for i in (0..n - 1).rev() {
			let next = &mesh.half_edges[chain[i + 1] as usize];
			let cur = &mesh.half_edges[chain[i] as usize];
			let dot = next.tangent.dot(cur.tangent);
			let incoming = if dot > 0.0 { bwd[i + 1] * dot } else { 0.0 };
			bwd[i] = incoming + cur.length * seed_factor;
		}

		for i in 0..n {
			let he = chain[i];
			let twin = mesh.half_edges[he as usize].twin;
			mesh.half_edges[he as usize].energy = fwd[i].max(bwd[i]);
			mesh.half_edges[twin as usize].energy = 0.0;
		}

		chain_count += 1;
	}

	log::debug!(
		"energy chains ({:?}, seed {}): {}",
		kind, seed_factor, chain_count
	);
}

/// Assigns energies to all half-edges: ridge chains seed at full strength,
/// valley chains at VALLEY_FACTOR, then nearby aligned ridges transfer
/// energy onto valleys through shared faces and valleys re-propagate.
pub fn propagate(mesh: &mut Mesh) {
	for he in mesh.half_edges.iter_mut() {
		he.energy = 0.0;
	}

	propagate_chains(mesh, EdgeKind::Ridge, 1.0);
	propagate_chains(mesh, EdgeKind::Valley, VALLEY_FACTOR);

	transfer_ridge_to_valley(mesh);

	propagate_chains(mesh, EdgeKind::Valley, VALLEY_FACTOR);
}

struct RidgeMid {
	mid: Vec2,
	he: i32,
}

/// For each valley edge, finds the nearest energetic ridge midpoint within
/// the adjacent faces; when the tangents align above ALIGN_THRESH, the
/// sign-matched valley half-edge receives ridge_energy * |dot| / (dist+1).
fn transfer_ridge_to_valley(mesh: &mut Mesh) {
	let num_he = mesh.half_edges.len() as i32;
	let num_features = mesh.features.len();

	let mut face_ridges: Vec<Vec<RidgeMid>> = (0..num_features).map(|_| Vec::new()).collect();
	for i in 0..num_he {
		let he = &mesh.half_edges[i as usize];
		if he.kind != EdgeKind::Ridge || he.energy <= 0.0 {
			continue;
		}

		let mid = mesh.edge_midpoint(i);
		let f0 = he.face;
		let f1 = mesh.half_edges[he.twin as usize].face;
		if f0 >= 0 && (f0 as usize) < num_features {
			face_ridges[f0 as usize].push(RidgeMid { mid, he: i });
		}
		if f1 >= 0 && (f1 as usize) < num_features && f1 != f0 {
			face_ridges[f1 as usize].push(RidgeMid { mid, he: i });
		}
	}

	let mut assigned = 0;
	let mut unassigned = 0;

	for i in 0..num_he {
		let he = mesh.half_edges[i as usize];
		if he.kind != EdgeKind::Valley || he.twin < i {
			continue;
		}

		let mid = mesh.edge_midpoint(i);
		let f0 = he.face;
		let f1 = mesh.half_edges[he.twin as usize].face;

		let mut best: Option<(f32, i32)> = None;
		let mut scan = |face: i32, best: &mut Option<(f32, i32)>| {
			if face < 0 || face as usize >= num_features {
				return;
			}
			for rm in &face_ridges[face as usize] {
				let d2 = mid.distance_sq(rm.mid);
				if best.map_or(true, |(bd, _)| d2 < bd) {
					*best = Some((d2, rm.he));
				}
			}
		};
		scan(f0, &mut best);
		if f1 != f0 {
			scan(f1, &mut best);
		}

		let Some((best_d2, ridge_he)) = best else {
			unassigned += 1;
			continue;
		};

		let ridge = mesh.half_edges[ridge_he as usize];
		let dot = he.tangent.dot(ridge.tangent);
		if dot.abs() < ALIGN_THRESH {
			unassigned += 1;
			continue;
		}

		let dist = best_d2.sqrt() + 1.0;
		let transfer = ridge.energy * dot.abs() / dist;

		let target = if dot > 0.0 { i } else { he.twin };
		let target_he = &mut mesh.half_edges[target as usize];
		if transfer > target_he.energy {
			target_he.energy = transfer;
		}
		assigned += 1;
	}

	log::debug!(
		"energy transfer: {} assigned, {} unassigned ({} features)",
		assigned, unassigned, num_features
	);
}

#[cfg(test)]
mod tests {
	use super::super::test_support::test_vertex;
	use super::super::{build, features, UndirectedEdge, VertexKind};
	use super::*;

	/// An open ridge polyline 0-1-2-3 through Path vertices.
	fn ridge_chain() -> Mesh {
		let mut vertices = vec![
			test_vertex(0.0, 0.0),
			test_vertex(10.0, 1.0),
			test_vertex(20.0, 0.0),
			test_vertex(30.0, 2.0),
		];
		vertices[1].kind = VertexKind::Path;
		vertices[2].kind = VertexKind::Path;
		let edges = vec![
			UndirectedEdge { v0: 0, v1: 1, kind: EdgeKind::Ridge },
			UndirectedEdge { v0: 1, v1: 2, kind: EdgeKind::Ridge },
			UndirectedEdge { v0: 2, v1: 3, kind: EdgeKind::Ridge },
		];
		build::build(vertices, &edges)
	}

	#[test]
	fn one_hot_half_edge_per_pair() {
		let mut mesh = ridge_chain();
		features::discover(&mut mesh);
		propagate(&mut mesh);

		for i in (0..mesh.half_edges.len()).step_by(2) {
			let a = mesh.half_edges[i].energy;
			let b = mesh.half_edges[i + 1].energy;
			assert!(a >= 0.0 && b >= 0.0);
			assert!(a == 0.0 || b == 0.0, "pair {} has two hot sides", i / 2);
			assert!(a > 0.0 || b > 0.0, "pair {} never energized", i / 2);
		}
	}

	#[test]
	fn chain_energy_is_directionally_consistent() {
		let mut mesh = ridge_chain();
		features::discover(&mut mesh);
		propagate(&mut mesh);

		// Collect the hot half-edges; destination of one must be the origin
		// of the next along the chain.
		let mut hot: Vec<i32> = (0..mesh.half_edges.len() as i32)
			.filter(|&i| mesh.half_edges[i as usize].energy > 0.0)
			.collect();
		hot.sort_by_key(|&i| {
			let p = mesh.vertex_pos(mesh.half_edges[i as usize].origin);
			p.x as i32
		});
		assert_eq!(hot.len(), 3);
		for pair in hot.windows(2) {
			assert_eq!(mesh.dest(pair[0]), mesh.half_edges[pair[1] as usize].origin);
		}
	}

	#[test]
	fn aligned_ridge_transfers_through_shared_face() {
		// Square of ridges with a valley diagonal: the diagonal borders both
		// triangle faces, whose boundaries carry the ridges.
		let mut mesh = super::super::test_support::square_with_diagonal();
		features::discover(&mut mesh);

		// Simulate a long energetic bottom ridge and a weak valley.
		for he in mesh.half_edges.iter_mut() {
			he.energy = 0.0;
		}
		let bottom = (0..mesh.half_edges.len() as i32)
			.find(|&i| {
				let he = &mesh.half_edges[i as usize];
				he.kind == EdgeKind::Ridge && he.origin == 0 && mesh.dest(i) == 1
			})
			.unwrap();
		mesh.half_edges[bottom as usize].energy = 100.0;
		let valley = (0..mesh.half_edges.len() as i32)
			.find(|&i| mesh.half_edges[i as usize].kind == EdgeKind::Valley)
			.unwrap();
		mesh.half_edges[valley as usize].energy = 0.5;

		transfer_ridge_to_valley(&mut mesh);

		let hot: f32 = mesh
			.half_edges
			.iter()
			.filter(|he| he.kind == EdgeKind::Valley)
			.map(|he| he.energy)
			.fold(0.0, f32::max);
		// 100 * 0.707 / (5 + 1) on the aligned side.
		assert!(hot > 5.0, "transferred valley energy {}", hot);
	}
}
