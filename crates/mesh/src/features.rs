use super::{Aabb, Feature, FeatureKind, Mesh, EXTERIOR_FACE, NO_FACE};

/// Walks next-cycles to discover faces, computes their signed area and
/// AABB, removes the infinite face (most negative area in the CCW-positive
/// convention) from the feature list, and assigns parents.
///
/// A cycle whose `next` chain is invalid, or which runs longer than the
/// half-edge count (a malformed mesh), is recorded as an open feature
/// instead of propagating bad indices.
pub fn discover(mesh: &mut Mesh) {
	let num_he = mesh.half_edges.len() as i32;

	for he in mesh.half_edges.iter_mut() {
		he.face = NO_FACE;
	}
	mesh.features.clear();

	let mut closed_count = 0usize;
	let mut open_count = 0usize;
	let mut infinite_face = -1i32;
	let mut most_negative_area = 0.0f32;

	for i in 0..num_he {
		if mesh.half_edges[i as usize].face != NO_FACE {
			continue;
		}

		let mut cycle = Vec::with_capacity(16);
		let mut cur = i;
		let mut is_open = false;

		loop {
			cycle.push(cur);
			if cycle.len() as i32 > num_he {
				log::warn!("runaway face cycle at half-edge {}", i);
				is_open = true;
				break;
			}

			let next = mesh.half_edges[cur as usize].next;
			if next < 0 || next >= num_he {
				is_open = true;
				break;
			}
			cur = next;
			if cur == i {
				break;
			}
		}

		let face_idx = mesh.features.len() as i32;
		for &he in &cycle {
			mesh.half_edges[he as usize].face = face_idx;
		}

		let mut bbox = Aabb {
			min_x: f32::MAX,
			min_y: f32::MAX,
			max_x: f32::MIN,
			max_y: f32::MIN,
		};
		let mut area = 0.0f32;
		for &he in &cycle {
			let p0 = mesh.vertex_pos(mesh.half_edges[he as usize].origin);
			bbox.min_x = bbox.min_x.min(p0.x);
			bbox.min_y = bbox.min_y.min(p0.y);
			bbox.max_x = bbox.max_x.max(p0.x);
			bbox.max_y = bbox.max_y.max(p0.y);

			let p1 = mesh.vertex_pos(mesh.dest(he));
			area += p0.x * p1.y - p1.x * p0.y;
		}
		area *= 0.5;

		let kind = if is_open { FeatureKind::Open } else { FeatureKind::Closed };
		mesh.features.push(Feature {
			kind,
			first_edge: cycle[0],
			edge_count: cycle.len() as i32,
			parent: -1,
			bbox,
			area_signed: area,
		});

		if kind == FeatureKind::Closed {
			closed_count += 1;
			if area < most_negative_area {
				most_negative_area = area;
				infinite_face = face_idx;
			}
		} else {
			open_count += 1;
		}
	}

	// Remove the infinite face: tag its half-edges with the sentinel and
	// swap-remove it from the feature table, fixing up the moved feature.
	if infinite_face >= 0 {
		let inf = mesh.features[infinite_face as usize];
		let mut cur = inf.first_edge;
		for _ in 0..inf.edge_count {
			mesh.half_edges[cur as usize].face = EXTERIOR_FACE;
			cur = mesh.half_edges[cur as usize].next;
		}

		let last_idx = mesh.features.len() as i32 - 1;
		if infinite_face < last_idx {
			let moved = mesh.features[last_idx as usize];
			let mut cur = moved.first_edge;
			for _ in 0..moved.edge_count {
				mesh.half_edges[cur as usize].face = infinite_face;
				cur = mesh.half_edges[cur as usize].next;
			}
			mesh.features[infinite_face as usize] = moved;
		}
		mesh.features.pop();
		closed_count -= 1;

		log::debug!("infinite face removed, area={:.1}", most_negative_area);
	}

	// Parents: among the closed faces across each boundary twin, pick the
	// smallest one that is strictly larger and whose AABB encloses ours.
	for fi in 0..mesh.features.len() {
		let f = mesh.features[fi];
		let f_area = f.area_signed.abs();
		let mut best_area = f32::INFINITY;
		let mut parent = -1i32;

		let mut cur = f.first_edge;
		for _ in 0..f.edge_count {
			let twin = mesh.half_edges[cur as usize].twin;
			let twin_face = mesh.half_edges[twin as usize].face;

			if twin_face >= 0 && twin_face != fi as i32 {
				let c = mesh.features[twin_face as usize];
				if c.kind == FeatureKind::Closed {
					let c_area = c.area_signed.abs();
					if c_area > f_area && c_area < best_area && c.bbox.contains(&f.bbox) {
						best_area = c_area;
						parent = twin_face;
					}
				}
			}

			cur = mesh.half_edges[cur as usize].next;
			if cur < 0 {
				break;
			}
		}

		mesh.features[fi].parent = parent;
	}

	log::debug!(
		"features: {} ({} closed, {} open)",
		mesh.features.len(), closed_count, open_count
	);
}

#[cfg(test)]
mod tests {
	use super::super::test_support::{square_with_diagonal, test_vertex};
	use super::super::{build, EdgeKind, UndirectedEdge, EXTERIOR_FACE};
	use super::*;

	/// K4: triangle with an interior vertex connected to all corners.
	fn k4() -> Mesh {
		let vertices = vec![
			test_vertex(0.0, 0.0),
			test_vertex(20.0, 0.0),
			test_vertex(10.0, 20.0),
			test_vertex(10.0, 7.0),
		];
		let mut edges = Vec::new();
		for v0 in 0..4 {
			for v1 in v0 + 1..4 {
				edges.push(UndirectedEdge { v0, v1, kind: EdgeKind::Ridge });
			}
		}
		build::build(vertices, &edges)
	}

	#[test]
	fn k4_has_three_interior_faces() {
		let mut mesh = k4();
		assert_eq!(mesh.half_edges.len(), 12);
		discover(&mut mesh);
		// Euler: 4 faces total; the infinite one is removed from the list.
		assert_eq!(mesh.features.len(), 3);
		assert!(mesh.features.iter().all(|f| f.kind == FeatureKind::Closed));
		assert!(mesh.half_edges.iter().any(|he| he.face == EXTERIOR_FACE));
	}

	#[test]
	fn face_cycles_close() {
		let mut mesh = k4();
		discover(&mut mesh);
		for f in &mesh.features {
			let mut cur = f.first_edge;
			for _ in 0..f.edge_count {
				cur = mesh.half_edges[cur as usize].next;
			}
			assert_eq!(cur, f.first_edge);
		}
	}

	#[test]
	fn infinite_face_is_unique_and_negative() {
		let mut mesh = square_with_diagonal();
		discover(&mut mesh);
		// Two triangles survive; every listed feature has positive area.
		assert_eq!(mesh.features.len(), 2);
		for f in &mesh.features {
			assert!(f.area_signed > 0.0);
		}
		let exterior = mesh
			.half_edges
			.iter()
			.filter(|he| he.face == EXTERIOR_FACE)
			.count();
		assert_eq!(exterior, 4);
	}

	#[test]
	fn nested_square_gets_a_parent() {
		let mut vertices = Vec::new();
		for (x, y) in [(0.0, 0.0), (30.0, 0.0), (30.0, 30.0), (0.0, 30.0)] {
			vertices.push(test_vertex(x, y));
		}
		for (x, y) in [(10.0, 10.0), (20.0, 10.0), (20.0, 20.0), (10.0, 20.0)] {
			vertices.push(test_vertex(x, y));
		}
		let mut edges = Vec::new();
		for i in 0..4 {
			edges.push(UndirectedEdge { v0: i, v1: (i + 1) % 4, kind: EdgeKind::Ridge });
			edges.push(UndirectedEdge { v0: 4 + i, v1: 4 + (i + 1) % 4, kind: EdgeKind::Valley });
		}
		// Bridge so the inner ring is reachable across twins.
		edges.push(UndirectedEdge { v0: 0, v1: 4, kind: EdgeKind::Valley });

		let mut mesh = build::build(vertices, &edges);
		discover(&mut mesh);

		// The inner square's interior face must name the outer ring's
		// interior as parent.
		let inner = mesh
			.features
			.iter()
			.find(|f| (f.area_signed.abs() - 100.0).abs() < 1.0)
			.expect("inner face");
		assert!(inner.parent >= 0);
		let parent = &mesh.features[inner.parent as usize];
		assert!(parent.area_signed.abs() > 100.0);
		assert!(parent.bbox.contains(&inner.bbox));
	}
}
