pub mod laminarize;
pub mod poisson;
pub mod split;

/// Iteration outcome of a relaxation solve. Non-convergence is not an
/// error: the caller gets the best-effort result plus these diagnostics.
#[derive(Clone, Copy, Debug, Default)]
pub struct SolveStats {
	pub iterations: u32,
	pub residual: f32,
}
