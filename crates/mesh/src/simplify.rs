use super::{build, Mesh, UndirectedEdge, Vertex};
use std::collections::BTreeSet;

struct UnionFind {
	parent: Vec<i32>,
	rank: Vec<u8>,
}

impl UnionFind {
	fn new(n: usize) -> Self {
		Self {
			parent: (0..n as i32).collect(),
			rank: vec![0; n],
		}
	}

	fn find(&mut self, mut x: i32) -> i32 {
		while self.parent[x as usize] != x {
			self.parent[x as usize] = self.parent[self.parent[x as usize] as usize];
			x = self.parent[x as usize];
		}
		x
	}

	fn unite(&mut self, a: i32, b: i32) {
		let (mut a, mut b) = (self.find(a), self.find(b));
		if a == b {
			return;
		}
		if self.rank[a as usize] < self.rank[b as usize] {
			std::mem::swap(&mut a, &mut b);
		}
		self.parent[b as usize] = a;
		if self.rank[a as usize] == self.rank[b as usize] {
			self.rank[a as usize] += 1;
		}
	}
}

/// Collapses every closed face with |area| < `min_area` by uniting its
/// vertices into one equivalence class, then rebuilds the DCEL with class
/// centroids, dropping self-loops and duplicate parallel edges.
///
/// Returns without touching the mesh when no face is small enough, so
/// running it twice is structurally a no-op.
pub fn simplify(mesh: &mut Mesh, min_area: f32) {
	let min_area = if min_area > 0.0 { min_area } else { 4.0 };
	let num_verts = mesh.vertices.len();
	let num_he = mesh.half_edges.len();

	// Rediscover face cycles locally: simplification may run before or
	// after feature assignment, so it never trusts `face` slots.
	let mut face_of = vec![-1i32; num_he];
	struct FaceInfo {
		verts: Vec<i32>,
		area: f32,
		valid: bool,
	}
	let mut faces: Vec<FaceInfo> = Vec::new();
	let mut most_negative = 0.0f32;
	let mut infinite_face = -1i32;

	for i in 0..num_he as i32 {
		if face_of[i as usize] != -1 {
			continue;
		}

		let face_idx = faces.len() as i32;
		let mut info = FaceInfo { verts: Vec::new(), area: 0.0, valid: true };

		let mut cur = i;
		let mut count = 0;
		loop {
			face_of[cur as usize] = face_idx;
			count += 1;
			if count > num_he {
				info.valid = false;
				break;
			}

			let origin = mesh.half_edges[cur as usize].origin;
			info.verts.push(origin);

			let p0 = mesh.vertex_pos(origin);
			let p1 = mesh.vertex_pos(mesh.dest(cur));
			info.area += p0.x * p1.y - p1.x * p0.y;

			cur = mesh.half_edges[cur as usize].next;
			if cur < 0 {
				info.valid = false;
				break;
			}
			if cur == i {
				break;
			}
		}

		if info.valid {
			info.area *= 0.5;
			if info.area < most_negative {
				most_negative = info.area;
				infinite_face = face_idx;
			}
		}
		faces.push(info);
	}

	let mut uf = UnionFind::new(num_verts);
	let mut collapsed = 0;
	for (fi, f) in faces.iter().enumerate() {
		if fi as i32 == infinite_face || !f.valid {
			continue;
		}
		if f.verts.len() < 3 || f.area.abs() >= min_area {
			continue;
		}
		for &v in &f.verts[1..] {
			uf.unite(f.verts[0], v);
		}
		collapsed += 1;
	}

	if collapsed == 0 {
		log::debug!("simplify: no faces below area {}", min_area);
		return;
	}

	// Class centroids, averaging position, height and divergence; the most
	// important vertex kind survives.
	let mut sum_x = vec![0.0f32; num_verts];
	let mut sum_y = vec![0.0f32; num_verts];
	let mut sum_h = vec![0.0f32; num_verts];
	let mut sum_d = vec![0.0f32; num_verts];
	let mut count = vec![0u32; num_verts];
	let mut kind = vec![super::VertexKind::Path; num_verts];

	for v in 0..num_verts as i32 {
		let rep = uf.find(v) as usize;
		let vert = &mesh.vertices[v as usize];
		sum_x[rep] += vert.x;
		sum_y[rep] += vert.y;
		sum_h[rep] += vert.height;
		sum_d[rep] += vert.divergence;
		count[rep] += 1;
		if vert.kind < kind[rep] {
			kind[rep] = vert.kind;
		}
	}

	let mut remap = vec![-1i32; num_verts];
	let mut new_verts: Vec<Vertex> = Vec::new();
	for v in 0..num_verts as i32 {
		let rep = uf.find(v) as usize;
		if remap[rep] < 0 {
			let n = count[rep] as f32;
			remap[rep] = new_verts.len() as i32;
			new_verts.push(Vertex {
				x: sum_x[rep] / n,
				y: sum_y[rep] / n,
				height: sum_h[rep] / n,
				divergence: sum_d[rep] / n,
				kind: kind[rep],
				edge: -1,
			});
		}
		remap[v as usize] = remap[rep];
	}

	let mut edge_set: BTreeSet<(i32, i32)> = BTreeSet::new();
	let mut new_edges: Vec<UndirectedEdge> = Vec::new();
	for i in (0..num_he).step_by(2) {
		let a = remap[mesh.half_edges[i].origin as usize];
		let b = remap[mesh.half_edges[i + 1].origin as usize];
		if a == b {
			continue;
		}
		let key = (a.min(b), a.max(b));
		if edge_set.insert(key) {
			new_edges.push(UndirectedEdge {
				v0: key.0,
				v1: key.1,
				kind: mesh.half_edges[i].kind,
			});
		}
	}

	log::debug!(
		"simplify: collapsed {} faces (area < {}), {} -> {} vertices, {} -> {} edges",
		collapsed, min_area, num_verts, new_verts.len(), num_he / 2, new_edges.len()
	);

	*mesh = build::build(new_verts, &new_edges);
}

#[cfg(test)]
mod tests {
	use super::super::test_support::test_vertex;
	use super::super::{build, EdgeKind, UndirectedEdge, VertexKind};
	use super::*;

	/// A long triangle with a tiny triangle appended at one corner.
	fn mesh_with_tiny_face() -> Mesh {
		let mut vertices = vec![
			test_vertex(0.0, 0.0),
			test_vertex(20.0, 0.0),
			test_vertex(10.0, 15.0),
			// Tiny triangle hanging off vertex 1.
			test_vertex(21.0, 0.0),
			test_vertex(21.0, 1.0),
		];
		vertices[4].kind = VertexKind::Maximum;
		let edges = vec![
			UndirectedEdge { v0: 0, v1: 1, kind: EdgeKind::Ridge },
			UndirectedEdge { v0: 1, v1: 2, kind: EdgeKind::Ridge },
			UndirectedEdge { v0: 2, v1: 0, kind: EdgeKind::Ridge },
			UndirectedEdge { v0: 1, v1: 3, kind: EdgeKind::Valley },
			UndirectedEdge { v0: 3, v1: 4, kind: EdgeKind::Valley },
			UndirectedEdge { v0: 4, v1: 1, kind: EdgeKind::Valley },
		];
		build::build(vertices, &edges)
	}

	#[test]
	fn tiny_face_collapses_to_a_point() {
		let mut mesh = mesh_with_tiny_face();
		simplify(&mut mesh, 4.0);
		// Vertices 1, 3, 4 merge; the big triangle survives.
		assert_eq!(mesh.vertices.len(), 3);
		assert_eq!(mesh.half_edges.len(), 6);
	}

	#[test]
	fn merged_vertex_keeps_important_kind() {
		let mut mesh = mesh_with_tiny_face();
		simplify(&mut mesh, 4.0);
		assert!(mesh.vertices.iter().any(|v| v.kind == VertexKind::Maximum));
	}

	#[test]
	fn simplify_is_idempotent() {
		let mut mesh = mesh_with_tiny_face();
		simplify(&mut mesh, 4.0);
		let (nv, ne, nf) = (mesh.vertices.len(), mesh.half_edges.len(), mesh.features.len());
		simplify(&mut mesh, 4.0);
		assert_eq!(mesh.vertices.len(), nv);
		assert_eq!(mesh.half_edges.len(), ne);
		assert_eq!(mesh.features.len(), nf);
	}

	#[test]
	fn big_faces_untouched() {
		let vertices = vec![
			test_vertex(0.0, 0.0),
			test_vertex(20.0, 0.0),
			test_vertex(10.0, 15.0),
		];
		let edges = vec![
			UndirectedEdge { v0: 0, v1: 1, kind: EdgeKind::Ridge },
			UndirectedEdge { v0: 1, v1: 2, kind: EdgeKind::Ridge },
			UndirectedEdge { v0: 2, v1: 0, kind: EdgeKind::Ridge },
		];
		let mut mesh = build::build(vertices, &edges);
		simplify(&mut mesh, 4.0);
		assert_eq!(mesh.vertices.len(), 3);
	}
}
