use thiserror::Error;

/// Push-time validation failures. The offending effect is dropped; the
/// stack keeps running.
#[derive(Debug, Error)]
pub enum EffectError {
	#[error("unknown effect id 0x{0:02x}")]
	UnknownEffect(u8),
	#[error("effect 0x{id:02x} expects {expected} parameter bytes, got {got}")]
	ParamCount { id: u8, expected: usize, got: usize },
	#[error("effect 0x{id:02x} parameter {index} out of range")]
	ParamRange { id: u8, index: usize },
	#[error("stack is full ({0} effects)")]
	StackFull(usize),
}

/// Run-time failures of the stack driver.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("no source image loaded")]
	NoSource,
	#[error("failed to read source {path}: {source}")]
	SourceRead {
		path: String,
		#[source]
		source: image::ImageError,
	},
	#[error("failed to write {path}: {source}")]
	Export {
		path: String,
		#[source]
		source: std::io::Error,
	},
}
