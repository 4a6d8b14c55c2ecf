use crate::effect::Effect;
use crate::region::RegionLabels;

/// Opaque per-effect state worth keeping across runs.
pub enum MemoState {
	/// Connected-region labels for the de-banding Dijkstra; they depend
	/// only on the source, so a parameter tweak can reuse them.
	Regions(RegionLabels),
}

/// One cached pipeline layer: the effect config that ran, optionally a
/// snapshot of the working buffer after it, and optional reusable state.
pub struct MemoLayer {
	pub effect: Effect,
	pub snapshot: Option<Vec<f32>>,
	pub state: Option<MemoState>,
}

/// Where to restart the pipeline after comparing against the cache.
pub struct ResumePoint {
	/// First effect index that needs reprocessing.
	pub resume_from: usize,
	/// Memo layer to restore the buffer from, if any.
	pub snapshot: Option<usize>,
	/// State taken from the first mismatching layer when its effect id
	/// still matches.
	pub reusable: Option<MemoState>,
}

/// Ordered per-effect snapshots of one stack's previous run. Editing a
/// late effect then re-runs only the tail of the pipeline.
#[derive(Default)]
pub struct PipelineMemo {
	layers: Vec<MemoLayer>,
	source_w: u32,
	source_h: u32,
}

impl PipelineMemo {
	pub fn clear(&mut self) {
		self.layers.clear();
		self.source_w = 0;
		self.source_h = 0;
	}

	pub fn len(&self) -> usize {
		self.layers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.layers.is_empty()
	}

	pub fn layer(&self, idx: usize) -> &MemoLayer {
		&self.layers[idx]
	}

	pub fn set_dimensions(&mut self, w: u32, h: u32) {
		self.source_w = w;
		self.source_h = h;
	}

	/// Drops every layer at or past `new_len`.
	pub fn truncate(&mut self, new_len: usize) {
		self.layers.truncate(new_len);
	}

	/// Records a layer at `idx`, replacing any stale entry there.
	pub fn save_layer(&mut self, idx: usize, effect: &Effect, snapshot: Option<&[f32]>) {
		if idx >= crate::MAX_STACK_SIZE {
			return;
		}
		let layer = MemoLayer {
			effect: effect.clone(),
			snapshot: snapshot.map(|s| s.to_vec()),
			state: None,
		};
		if idx < self.layers.len() {
			self.layers[idx] = layer;
		} else {
			self.layers.truncate(idx);
			self.layers.push(layer);
		}
	}

	pub fn set_state(&mut self, idx: usize, state: MemoState) {
		if let Some(layer) = self.layers.get_mut(idx) {
			layer.state = Some(state);
		}
	}

	/// Compares the cached layers against the new effect list: the resume
	/// point is the first structural mismatch, the restore snapshot is the
	/// latest one at or before it. A dimension change invalidates all.
	pub fn find_resume(&mut self, effects: &[Effect], w: u32, h: u32) -> ResumePoint {
		let mut result = ResumePoint { resume_from: 0, snapshot: None, reusable: None };

		if self.layers.is_empty() || self.source_w != w || self.source_h != h {
			return result;
		}

		let limit = self.layers.len().min(effects.len());
		for i in 0..limit {
			if self.layers[i].effect != effects[i] {
				if self.layers[i].effect.id() == effects[i].id() {
					result.reusable = self.layers[i].state.take();
				}
				break;
			}
			result.resume_from = i + 1;
			if self.layers[i].snapshot.is_some() {
				result.snapshot = Some(i);
			}
		}

		result
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn blur(iterations: u32) -> Effect {
		Effect::BoxBlur { iterations, threshold: 0.0 }
	}

	fn memo_with(effects: &[Effect], snapshots: &[bool]) -> PipelineMemo {
		let mut memo = PipelineMemo::default();
		memo.set_dimensions(4, 4);
		let buf = vec![0.5f32; 16 * 3];
		for (i, e) in effects.iter().enumerate() {
			memo.save_layer(i, e, snapshots[i].then_some(buf.as_slice()));
		}
		memo
	}

	#[test]
	fn identical_stack_resumes_at_end() {
		let effects = vec![blur(3), Effect::Gradientify { scale: 1.0 }, blur(5)];
		let mut memo = memo_with(&effects, &[true, false, true]);
		let r = memo.find_resume(&effects, 4, 4);
		assert_eq!(r.resume_from, 3);
		assert_eq!(r.snapshot, Some(2));
	}

	#[test]
	fn edited_tail_resumes_at_edit() {
		let cached = vec![blur(3), blur(5), blur(7)];
		let mut memo = memo_with(&cached, &[true, true, true]);
		let edited = vec![blur(3), blur(5), blur(9)];
		let r = memo.find_resume(&edited, 4, 4);
		assert_eq!(r.resume_from, 2);
		assert_eq!(r.snapshot, Some(1));
	}

	#[test]
	fn dimension_change_invalidates() {
		let effects = vec![blur(3)];
		let mut memo = memo_with(&effects, &[true]);
		let r = memo.find_resume(&effects, 8, 8);
		assert_eq!(r.resume_from, 0);
		assert!(r.snapshot.is_none());
	}

	#[test]
	fn same_id_mismatch_offers_state() {
		let cached = vec![Effect::Dijkstra { minkowski: 1.0, chebyshev: 0.0 }];
		let mut memo = memo_with(&cached, &[true]);
		memo.set_state(
			0,
			MemoState::Regions(crate::region::RegionLabels {
				labels: vec![0; 16 * 3],
				counts: [1, 1, 1],
			}),
		);

		let edited = vec![Effect::Dijkstra { minkowski: 2.0, chebyshev: 0.0 }];
		let r = memo.find_resume(&edited, 4, 4);
		assert_eq!(r.resume_from, 0);
		assert!(r.reusable.is_some());
	}

	#[test]
	fn truncate_drops_tail() {
		let effects = vec![blur(1), blur(2), blur(3)];
		let mut memo = memo_with(&effects, &[true, true, true]);
		memo.truncate(1);
		assert_eq!(memo.len(), 1);
	}
}
