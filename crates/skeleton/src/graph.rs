use super::contour::is_boundary;
use super::{CriticalKind, SkeletonEdge, SkeletonVertex, SkeletonVertexKind};
use math::Vec2;
use std::collections::{BTreeMap, BTreeSet};

/// Uniform polyline input to the graph stage: separatrices and boundary
/// contours look the same from here on.
pub struct RawPolyline {
	pub pixels: Vec<u32>,
	pub path: Vec<Vec2>,
	pub ridge: bool,
}

const DX8: [i32; 8] = [1, 1, 0, -1, -1, -1, 0, 1];
const DY8: [i32; 8] = [0, 1, 1, 1, 0, -1, -1, -1];

/// Builds the junction graph from raw polylines: clusters junction pixels
/// into vertices, splits polylines at junctions into edges, RDP-simplifies
/// edge interiors, removes degenerates, merges mergeable degree-2 chains,
/// and compacts the vertex table.
pub fn build_graph(
	polys: &[RawPolyline],
	critical_pixels: &BTreeMap<u32, CriticalKind>,
	nodata: &[bool],
	divergence: Option<&[f32]>,
	w: u32,
	h: u32,
) -> (Vec<SkeletonVertex>, Vec<SkeletonEdge>) {
	let mut vertices: Vec<SkeletonVertex> = Vec::new();
	let mut edges: Vec<SkeletonEdge> = Vec::new();

	// Pixel -> sorted, deduplicated set of polyline indices through it.
	let mut pixel_to_polys: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
	for (pi, poly) in polys.iter().enumerate() {
		for &px in &poly.pixels {
			pixel_to_polys.entry(px).or_default().push(pi);
		}
	}
	for set in pixel_to_polys.values_mut() {
		set.sort_unstable();
		set.dedup();
	}

	// Junctions: every polyline endpoint, plus interior pixels where the
	// set of overlapping polylines changes between adjacent steps. Shared
	// runs of 3+ polylines stay unmarked; only their transition points are.
	let mut junctions: BTreeSet<u32> = BTreeSet::new();
	for poly in polys {
		if let (Some(first), Some(last)) = (poly.pixels.first(), poly.pixels.last()) {
			junctions.insert(*first);
			junctions.insert(*last);
		}
	}
	{
		let empty: Vec<usize> = Vec::new();
		let poly_set = |px: u32| pixel_to_polys.get(&px).unwrap_or(&empty);
		for poly in polys {
			for k in 1..poly.pixels.len() {
				if poly_set(poly.pixels[k - 1]) != poly_set(poly.pixels[k]) {
					junctions.insert(poly.pixels[k - 1]);
				}
			}
		}
	}

	// Cluster 8-connected junction pixels into single vertices at the
	// cluster centroid, collapsing the few-pixel transition zone around a
	// branch point into one vertex.
	let mut pixel_to_vertex: BTreeMap<u32, i32> = BTreeMap::new();
	{
		let mut remaining = junctions.clone();
		while let Some(&seed) = remaining.iter().next() {
			remaining.remove(&seed);
			let mut cluster = vec![seed];
			let mut queue = vec![seed];

			while let Some(cur) = queue.pop() {
				let cx = (cur % w) as i32;
				let cy = (cur / w) as i32;
				for d in 0..8 {
					let nx = cx + DX8[d];
					let ny = cy + DY8[d];
					if nx < 0 || nx >= w as i32 || ny < 0 || ny >= h as i32 {
						continue;
					}
					let ni = ny as u32 * w + nx as u32;
					if remaining.remove(&ni) {
						cluster.push(ni);
						queue.push(ni);
					}
				}
			}

			let mut centroid = Vec2::ZERO;
			for &px in &cluster {
				centroid += Vec2::new((px % w) as f32 + 0.5, (px / w) as f32 + 0.5);
			}
			centroid /= cluster.len() as f32;

			// Classify: critical point wins, then boundary, then branch.
			let mut kind = SkeletonVertexKind::Branch;
			for &px in &cluster {
				if let Some(ck) = critical_pixels.get(&px) {
					kind = match ck {
						CriticalKind::Maximum => SkeletonVertexKind::Maximum,
						CriticalKind::Minimum => SkeletonVertexKind::Minimum,
						CriticalKind::Saddle => SkeletonVertexKind::Saddle,
					};
					break;
				}
				if is_boundary(nodata, px % w, px / w, w, h) {
					kind = SkeletonVertexKind::Boundary;
				}
			}

			let vi = vertices.len() as i32;
			vertices.push(SkeletonVertex {
				x: centroid.x,
				y: centroid.y,
				divergence: 0.0,
				kind,
			});
			for &px in &cluster {
				pixel_to_vertex.insert(px, vi);
			}
		}
	}

	// Split each polyline at junction pixels into edges; interior pixels
	// become fresh Interior vertices. Deduplicate edges by their endpoint
	// pixel pair.
	let mut seen_edges: BTreeSet<(u32, u32)> = BTreeSet::new();

	for poly in polys {
		if poly.pixels.len() < 2 {
			continue;
		}

		let mut seg_start = 0usize;
		for k in 0..poly.pixels.len() {
			let is_junction = junctions.contains(&poly.pixels[k]);
			let is_last = k == poly.pixels.len() - 1;
			if !(is_junction && k > seg_start) && !is_last {
				continue;
			}

			let seg_end = k;
			if seg_end > seg_start {
				let sp = poly.pixels[seg_start];
				let ep = poly.pixels[seg_end];
				let key = (sp.min(ep), sp.max(ep));

				if seen_edges.insert(key) {
					let mut chain = Vec::with_capacity(seg_end - seg_start + 1);
					chain.push(ensure_vertex(
						&mut pixel_to_vertex,
						&mut vertices,
						sp,
						poly.path[seg_start],
					));
					for m in seg_start + 1..seg_end {
						let vi = vertices.len() as i32;
						vertices.push(SkeletonVertex {
							x: poly.path[m].x,
							y: poly.path[m].y,
							divergence: 0.0,
							kind: SkeletonVertexKind::Interior,
						});
						chain.push(vi);
					}
					chain.push(ensure_vertex(
						&mut pixel_to_vertex,
						&mut vertices,
						ep,
						poly.path[seg_end],
					));

					edges.push(SkeletonEdge { ridge: poly.ridge, vertices: chain });
				}
			}

			seg_start = k;
		}
	}

	log::debug!("junction graph before RDP: {} vertices, {} edges", vertices.len(), edges.len());

	// RDP on edge interiors: endpoints and every classified (non-Interior)
	// vertex always survive.
	let mut total_before = 0usize;
	let mut total_after = 0usize;
	for edge in &mut edges {
		let n = edge.vertices.len();
		total_before += n;
		if n <= 2 {
			total_after += n;
			continue;
		}

		let points: Vec<Vec2> = edge
			.vertices
			.iter()
			.map(|&vi| Vec2::new(vertices[vi as usize].x, vertices[vi as usize].y))
			.collect();
		let mut keep = math::polyline::rdp_keep(&points, 1.0);
		for (i, &vi) in edge.vertices.iter().enumerate() {
			if vertices[vi as usize].kind != SkeletonVertexKind::Interior {
				keep[i] = true;
			}
		}

		edge.vertices = edge
			.vertices
			.iter()
			.zip(&keep)
			.filter_map(|(&vi, &k)| k.then_some(vi))
			.collect();
		total_after += edge.vertices.len();
	}
	log::debug!("rdp: {} -> {} edge vertices", total_before, total_after);

	// Drop degenerate edges: fewer than 2 vertices or near-zero span.
	edges.retain(|e| {
		if e.vertices.len() < 2 {
			return false;
		}
		let v0 = &vertices[e.vertices[0] as usize];
		let v1 = &vertices[*e.vertices.last().unwrap() as usize];
		Vec2::new(v1.x - v0.x, v1.y - v0.y).length_sq() >= 0.01
	});

	// Sample per-vertex divergence before merging; sign-change vertices act
	// as merge barriers (they mark ridge/valley transitions).
	if let Some(div) = divergence {
		for v in vertices.iter_mut() {
			let px = v.x as u32;
			let py = v.y as u32;
			if px < w && py < h {
				v.divergence = div[(py * w + px) as usize];
			}
		}
	}

	merge_degree_two(&mut vertices, &mut edges, divergence.is_some());

	compact(&mut vertices, &mut edges);

	log::debug!("final skeleton graph: {} vertices, {} edges", vertices.len(), edges.len());
	(vertices, edges)
}

/// Looks up or creates the vertex for a junction pixel.
fn ensure_vertex(
	pixel_to_vertex: &mut BTreeMap<u32, i32>,
	vertices: &mut Vec<SkeletonVertex>,
	px: u32,
	at: Vec2,
) -> i32 {
	*pixel_to_vertex.entry(px).or_insert_with(|| {
		let vi = vertices.len() as i32;
		vertices.push(SkeletonVertex {
			x: at.x,
			y: at.y,
			divergence: 0.0,
			kind: SkeletonVertexKind::Branch,
		});
		vi
	})
}

fn is_mergeable_kind(kind: SkeletonVertexKind) -> bool {
	matches!(kind, SkeletonVertexKind::Branch | SkeletonVertexKind::Interior)
}

/// Merges chains of degree-2 vertices into single edges. A vertex merges
/// only when both incident edges share the ridge/valley flag, its kind is
/// branch or interior, and it is not a divergence sign-change point.
fn merge_degree_two(
	vertices: &mut [SkeletonVertex],
	edges: &mut Vec<SkeletonEdge>,
	has_divergence: bool,
) {
	let nv = vertices.len();
	let ne = edges.len();

	let mut v_edges: Vec<Vec<usize>> = vec![Vec::new(); nv];
	for (ei, e) in edges.iter().enumerate() {
		if e.vertices.len() < 2 {
			continue;
		}
		v_edges[e.vertices[0] as usize].push(ei);
		v_edges[*e.vertices.last().unwrap() as usize].push(ei);
	}

	let other_end = |edges: &[SkeletonEdge], ei: usize, vi: i32| -> i32 {
		let e = &edges[ei];
		if e.vertices[0] == vi {
			*e.vertices.last().unwrap()
		} else {
			e.vertices[0]
		}
	};

	let mut mergeable = vec![false; nv];
	let mut div_blocked = 0;
	for vi in 0..nv {
		if v_edges[vi].len() != 2 || !is_mergeable_kind(vertices[vi].kind) {
			continue;
		}
		let (e0, e1) = (v_edges[vi][0], v_edges[vi][1]);
		if edges[e0].ridge != edges[e1].ridge {
			continue;
		}

		if has_divergence {
			let my_div = vertices[vi].divergence;
			let d0 = vertices[other_end(edges, e0, vi as i32) as usize].divergence;
			let d1 = vertices[other_end(edges, e1, vi as i32) as usize].divergence;
			let sign_change = (my_div > 0.01 && d0 < -0.01 && d1 < -0.01)
				|| (my_div < -0.01 && d0 > 0.01 && d1 > 0.01)
				|| (d0 > 0.01 && d1 < -0.01)
				|| (d0 < -0.01 && d1 > 0.01);
			if sign_change {
				div_blocked += 1;
				continue;
			}
		}

		mergeable[vi] = true;
	}
	if div_blocked > 0 {
		log::debug!("divergence blocked {} merges", div_blocked);
	}

	let mut dead = vec![false; ne];
	let mut merged = 0;

	for ei in 0..ne {
		if dead[ei] || edges[ei].vertices.len() < 2 {
			continue;
		}

		// Extend forward while the tail vertex is mergeable.
		loop {
			let tail = *edges[ei].vertices.last().unwrap();
			if !mergeable[tail as usize] {
				break;
			}
			let other = v_edges[tail as usize]
				.iter()
				.copied()
				.find(|&oe| oe != ei && !dead[oe] && edges[oe].vertices.len() >= 2);
			let Some(oe) = other else { break };

			let append: Vec<i32> = if edges[oe].vertices[0] == tail {
				edges[oe].vertices[1..].to_vec()
			} else if *edges[oe].vertices.last().unwrap() == tail {
				edges[oe].vertices[..edges[oe].vertices.len() - 1]
					.iter()
					.rev()
					.copied()
					.collect()
			} else {
				break;
			};
			edges[ei].vertices.extend(append);
			dead[oe] = true;
			merged += 1;
		}

		// Extend backward likewise.
		loop {
			let head = edges[ei].vertices[0];
			if !mergeable[head as usize] {
				break;
			}
			let other = v_edges[head as usize]
				.iter()
				.copied()
				.find(|&oe| oe != ei && !dead[oe] && edges[oe].vertices.len() >= 2);
			let Some(oe) = other else { break };

			let mut prefix: Vec<i32> = if *edges[oe].vertices.last().unwrap() == head {
				edges[oe].vertices[..edges[oe].vertices.len() - 1].to_vec()
			} else if edges[oe].vertices[0] == head {
				edges[oe].vertices[1..].iter().rev().copied().collect()
			} else {
				break;
			};
			prefix.extend(edges[ei].vertices.iter().copied());
			edges[ei].vertices = prefix;
			dead[oe] = true;
			merged += 1;
		}
	}

	if merged > 0 {
		let mut surviving = Vec::with_capacity(ne - merged);
		for (ei, e) in edges.drain(..).enumerate() {
			if !dead[ei] {
				surviving.push(e);
			}
		}
		*edges = surviving;
		log::debug!("merged {} degree-2 chains, {} edges remain", merged, edges.len());
	}
}

/// Drops vertices no edge references and remaps edge indices.
fn compact(vertices: &mut Vec<SkeletonVertex>, edges: &mut [SkeletonEdge]) {
	let mut remap = vec![-1i32; vertices.len()];
	for e in edges.iter() {
		for &vi in &e.vertices {
			remap[vi as usize] = 0;
		}
	}

	let mut kept = Vec::new();
	for (i, v) in vertices.iter().enumerate() {
		if remap[i] == 0 {
			remap[i] = kept.len() as i32;
			kept.push(*v);
		}
	}
	for e in edges.iter_mut() {
		for vi in e.vertices.iter_mut() {
			*vi = remap[*vi as usize];
		}
	}
	*vertices = kept;
}
