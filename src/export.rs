use crate::error::EngineError;
use math::{Vec2, Vec3};
use mesh::{EdgeKind, FeatureKind, Mesh, VertexKind};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Process-wide output prefix, set once at startup. Debug files are
/// written to `prefix + name` (the prefix may end mid-filename).
static OUTPUT_PREFIX: OnceLock<String> = OnceLock::new();

pub fn set_output_prefix(prefix: &str) {
	let _ = OUTPUT_PREFIX.set(prefix.to_string());
}

pub fn output_path(name: &str) -> PathBuf {
	let prefix = OUTPUT_PREFIX.get().map(String::as_str).unwrap_or("./");
	PathBuf::from(format!("{}{}", prefix, name))
}

fn export_err(path: &Path, source: std::io::Error) -> EngineError {
	EngineError::Export { path: path.display().to_string(), source }
}

fn save_rgb(path: &Path, rgb: Vec<u8>, w: u32, h: u32) -> Result<(), EngineError> {
	let img: image::RgbImage = image::ImageBuffer::from_raw(w, h, rgb).unwrap();
	img.save(path)
		.map_err(|e| export_err(path, std::io::Error::new(std::io::ErrorKind::Other, e)))
}

/// Grayscale export of a float plane. With `auto_range` the data min/max
/// spans the ramp, otherwise [min_val, max_val].
pub fn write_gray_png(
	path: &Path,
	data: &[f32],
	w: u32,
	h: u32,
	min_val: f32,
	max_val: f32,
	auto_range: bool,
) -> Result<(), EngineError> {
	let (lo, hi) = if auto_range {
		data.iter().fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
	} else {
		(min_val, max_val)
	};
	let range = if hi > lo { hi - lo } else { 1.0 };

	let pixels: Vec<u8> = data
		.iter()
		.map(|&v| (math::clamp((v - lo) / range, 0.0, 1.0) * 255.0 + 0.5) as u8)
		.collect();
	let img: image::GrayImage = image::ImageBuffer::from_raw(w, h, pixels).unwrap();
	img.save(path)
		.map_err(|e| export_err(path, std::io::Error::new(std::io::ErrorKind::Other, e)))
}

/// Signed 2D vector field as a normal-map style image: (v + 1) / 2 on red
/// and green, flat blue.
pub fn write_vec2_png(path: &Path, data: &[Vec2], w: u32, h: u32) -> Result<(), EngineError> {
	let mut rgb = Vec::with_capacity(data.len() * 3);
	for v in data {
		rgb.push(((v.x + 1.0) * 0.5 * 255.0 + 0.5) as u8);
		rgb.push(((v.y + 1.0) * 0.5 * 255.0 + 0.5) as u8);
		rgb.push(128);
	}
	save_rgb(path, rgb, w, h)
}

/// Unit 3-vector field via the (n + 1) / 2 mapping.
pub fn write_vec3_png(path: &Path, data: &[Vec3], w: u32, h: u32) -> Result<(), EngineError> {
	let mut rgb = Vec::with_capacity(data.len() * 3);
	for v in data {
		rgb.push(((v.x + 1.0) * 0.5 * 255.0 + 0.5) as u8);
		rgb.push(((v.y + 1.0) * 0.5 * 255.0 + 0.5) as u8);
		rgb.push(((v.z + 1.0) * 0.5 * 255.0 + 0.5) as u8);
	}
	save_rgb(path, rgb, w, h)
}

/// Composite render of the ridge mesh over the height field: walkable
/// divergence tinted warm (ridge) or cool (valley), edges colored by
/// energy, vertices by kind.
pub fn write_ridge_mesh_png(
	path: &Path,
	mesh: &Mesh,
	height: &[f32],
	divergence: &[f32],
	w: u32,
	h: u32,
) -> Result<(), EngineError> {
	let n = (w * h) as usize;
	let mut rgb = vec![0u8; n * 3];

	for i in 0..n {
		let d = divergence[i];
		if d.abs() > 0.1 {
			let gray = (height[i] * 140.0) as u8;
			if d < 0.0 {
				rgb[i * 3] = gray.saturating_add(50);
				rgb[i * 3 + 1] = gray;
				rgb[i * 3 + 2] = gray;
			} else {
				rgb[i * 3] = gray;
				rgb[i * 3 + 1] = gray;
				rgb[i * 3 + 2] = gray.saturating_add(50);
			}
		} else {
			let gray = (height[i] * 80.0) as u8;
			rgb[i * 3] = gray;
			rgb[i * 3 + 1] = gray;
			rgb[i * 3 + 2] = gray;
		}
	}

	let mut max_ridge = 1.0f32;
	let mut max_valley = 1.0f32;
	for he in &mesh.half_edges {
		match he.kind {
			EdgeKind::Ridge => max_ridge = max_ridge.max(he.energy),
			EdgeKind::Valley => max_valley = max_valley.max(he.energy),
		}
	}

	for i in 0..mesh.half_edges.len() as i32 {
		let he = &mesh.half_edges[i as usize];
		if he.twin < i {
			continue;
		}
		let energy = he.energy.max(mesh.half_edges[he.twin as usize].energy);

		let (r, g, b) = match he.kind {
			EdgeKind::Ridge => {
				let t = energy / max_ridge;
				((80.0 + 175.0 * t) as u8, (30.0 + 200.0 * t) as u8, 30)
			}
			EdgeKind::Valley if energy > 0.0 => {
				let t = energy / max_valley;
				(30, (60.0 + 195.0 * t) as u8, (120.0 + 135.0 * t) as u8)
			}
			EdgeKind::Valley => (60, 60, 100),
		};

		let a = mesh.vertex_pos(he.origin);
		let bpos = mesh.vertex_pos(mesh.dest(i));
		mesh::dijkstra::for_each_line_pixel(
			a.x as i32,
			a.y as i32,
			bpos.x as i32,
			bpos.y as i32,
			|x, y| {
				if x >= 0 && x < w as i32 && y >= 0 && y < h as i32 {
					let pi = (y as u32 * w + x as u32) as usize;
					rgb[pi * 3] = r;
					rgb[pi * 3 + 1] = g;
					rgb[pi * 3 + 2] = b;
				}
			},
		);
	}

	for v in &mesh.vertices {
		let (color, radius): ([u8; 3], i32) = match v.kind {
			VertexKind::Maximum => ([0, 255, 0], 1),
			VertexKind::Minimum => ([255, 255, 0], 1),
			VertexKind::Junction => ([255, 255, 255], 0),
			VertexKind::Endpoint => ([180, 180, 180], 0),
			VertexKind::Path => continue,
		};
		for dy in -radius..=radius {
			for dx in -radius..=radius {
				let px = v.x.round() as i32 + dx;
				let py = v.y.round() as i32 + dy;
				if px >= 0 && px < w as i32 && py >= 0 && py < h as i32 {
					let pi = (py as u32 * w + px as u32) as usize;
					rgb[pi * 3] = color[0];
					rgb[pi * 3 + 1] = color[1];
					rgb[pi * 3 + 2] = color[2];
				}
			}
		}
	}

	save_rgb(path, rgb, w, h)
}

/// Mean |cos| of random directions against a fixed axis, and its variance;
/// the null hypothesis of the alignment z-test.
const COS_NULL_MEAN: f32 = 2.0 / std::f32::consts::PI;

fn cos_null_sigma() -> f32 {
	(0.5 - 4.0 / (std::f32::consts::PI * std::f32::consts::PI)).sqrt()
}

/// Principal axis of the edge tangents via the doubled-angle sum, so
/// opposite tangents reinforce instead of cancelling.
fn principal_axis(mesh: &Mesh) -> Vec2 {
	let mut acc = Vec2::ZERO;
	for i in 0..mesh.half_edges.len() as i32 {
		let he = &mesh.half_edges[i as usize];
		if he.twin < i {
			continue;
		}
		let t = he.tangent;
		acc += Vec2::new(t.x * t.x - t.y * t.y, 2.0 * t.x * t.y) * he.length;
	}
	let theta = acc.y.atan2(acc.x) * 0.5;
	Vec2::new(theta.cos(), theta.sin())
}

fn z_color(z: f32) -> String {
	let t = math::clamp((z + 3.0) / 6.0, 0.0, 1.0);
	let r = (t * 255.0) as u8;
	let b = ((1.0 - t) * 255.0) as u8;
	let g = (128.0 - (t - 0.5).abs() * 160.0) as u8;
	format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// SVG export of the simplified mesh: one polyline per undirected edge,
/// stroke keyed by the z score of its |cos| alignment against the mesh's
/// principal axis (null: E[|cos|] = 2/pi); one circle per non-Path vertex.
pub fn write_ridge_mesh_svg(path: &Path, mesh: &Mesh, w: u32, h: u32) -> Result<(), EngineError> {
	let axis = principal_axis(mesh);
	let sigma = cos_null_sigma();

	let mut svg = String::new();
	svg.push_str(&format!(
		"<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {} {}\">\n",
		w, h
	));
	svg.push_str(&format!("<rect width=\"{}\" height=\"{}\" fill=\"#111\"/>\n", w, h));

	for i in 0..mesh.half_edges.len() as i32 {
		let he = &mesh.half_edges[i as usize];
		if he.twin < i {
			continue;
		}
		let a = mesh.vertex_pos(he.origin);
		let b = mesh.vertex_pos(mesh.dest(i));
		let z = (he.tangent.dot(axis).abs() - COS_NULL_MEAN) / sigma;
		let width = if he.kind == EdgeKind::Ridge { 1.2 } else { 0.8 };
		svg.push_str(&format!(
			"<polyline points=\"{:.1},{:.1} {:.1},{:.1}\" stroke=\"{}\" stroke-width=\"{}\" fill=\"none\"/>\n",
			a.x, a.y, b.x, b.y, z_color(z), width
		));
	}

	for v in &mesh.vertices {
		let color = match v.kind {
			VertexKind::Maximum => "#0f0",
			VertexKind::Minimum => "#ff0",
			VertexKind::Junction => "#fff",
			VertexKind::Endpoint => "#aaa",
			VertexKind::Path => continue,
		};
		svg.push_str(&format!(
			"<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"1.5\" fill=\"{}\"/>\n",
			v.x, v.y, color
		));
	}

	svg.push_str("</svg>\n");

	let mut file = std::fs::File::create(path).map_err(|e| export_err(path, e))?;
	file.write_all(svg.as_bytes()).map_err(|e| export_err(path, e))
}

/// Counts the listed features by kind for log reporting.
pub fn feature_histogram(mesh: &Mesh) -> (usize, usize) {
	let closed = mesh.features.iter().filter(|f| f.kind == FeatureKind::Closed).count();
	(closed, mesh.features.len() - closed)
}
