use clap::Parser;
use relief::{export, EffectStack, StackKind};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[clap(name = "relief")]
#[clap(about = "Height-field geometry engine: run an effect stack over a source image.")]
struct Args {
	#[clap(short, long, help = "Source image path")]
	input: PathBuf,

	#[clap(
		short,
		long,
		default_value = "./",
		help = "Output path prefix; 'output.png' is appended for the main render"
	)]
	output: String,

	#[clap(short, long, default_value = "erosion", help = "Stack kind: erosion or gradient")]
	stack: String,

	#[clap(
		short,
		long,
		help = "Effect spec id:p0.p1.p2 (repeatable; hex id ok, '.' separates params)"
	)]
	effect: Vec<String>,

	#[clap(short, long, default_value = "1.0", help = "Source quantization (0.0=1 bit, 1.0=8 bit)")]
	quantization: f32,
}

/// Parses "0x20:140.0" into an effect id and its packed parameter bytes.
fn parse_effect_spec(spec: &str) -> Option<(u8, Vec<u8>)> {
	let (id_str, param_str) = match spec.split_once(':') {
		Some((id, rest)) => (id, Some(rest)),
		None => (spec, None),
	};

	let id = if let Some(hex) = id_str.strip_prefix("0x").or_else(|| id_str.strip_prefix("0X")) {
		u8::from_str_radix(hex, 16).ok()?
	} else {
		id_str.parse::<u8>().ok()?
	};

	let mut params = Vec::new();
	if let Some(param_str) = param_str {
		for token in param_str.split('.').filter(|t| !t.is_empty()) {
			params.push(token.parse::<u8>().ok()?);
		}
	}
	Some((id, params))
}

fn main() -> ExitCode {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let args = Args::parse();

	let kind = match args.stack.as_str() {
		"erosion" => StackKind::Erosion,
		"gradient" => StackKind::Gradient,
		other => {
			eprintln!("unknown stack kind: {} (use 'erosion' or 'gradient')", other);
			return ExitCode::FAILURE;
		}
	};

	export::set_output_prefix(&args.output);

	let mut stack = EffectStack::new(kind);
	if let Err(e) = stack.set_source(&args.input, args.quantization) {
		eprintln!("{}", e);
		return ExitCode::FAILURE;
	}

	stack.begin();
	for spec in &args.effect {
		let Some((id, params)) = parse_effect_spec(spec) else {
			eprintln!("invalid effect spec: {}", spec);
			return ExitCode::FAILURE;
		};
		log::info!("pushing effect 0x{:02x} with {} params", id, params.len());
		if let Err(e) = stack.push(id, &params) {
			// Invalid effects are dropped; the stack keeps running.
			log::error!("{}", e);
		}
	}

	let output = match stack.end() {
		Ok(output) => output,
		Err(e) => {
			eprintln!("stack execution failed: {}", e);
			return ExitCode::FAILURE;
		}
	};

	let path = export::output_path("output.png");
	let img: image::RgbaImage =
		image::ImageBuffer::from_raw(output.width, output.height, output.rgba).unwrap();
	if let Err(e) = img.save(&path) {
		eprintln!("failed to write {}: {}", path.display(), e);
		return ExitCode::FAILURE;
	}

	log::info!("wrote {}", path.display());
	ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn effect_specs_parse() {
		assert_eq!(parse_effect_spec("0x20:140.0"), Some((0x20, vec![140, 0])));
		assert_eq!(parse_effect_spec("34:10"), Some((34, vec![10])));
		assert_eq!(parse_effect_spec("0x41"), Some((0x41, vec![])));
		assert_eq!(parse_effect_spec("0x30:2.0.255.0.0.255.255.0.255.0.255"),
			Some((0x30, vec![2, 0, 255, 0, 0, 255, 255, 0, 255, 0, 255])));
		assert_eq!(parse_effect_spec("xyz:1"), None);
		assert_eq!(parse_effect_spec("0x20:999"), None);
	}
}
