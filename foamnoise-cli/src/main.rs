use clap::Parser;
use std::path::PathBuf;

use foamnoise_core::{
    run, NoiseSettings, DEFAULT_AMP, DEFAULT_SEED, DEFAULT_TIME, DEFAULT_U_BULK,
};

#[derive(Debug, Parser)]
#[command(
    name = "foamnoise",
    version,
    about = "Seed an OpenFOAM initial velocity field with zero-mean random noise"
)]
struct Args {
    /// Case root directory.
    #[arg(long, default_value = ".")]
    case: PathBuf,

    /// Time directory holding the U and C fields.
    #[arg(long, default_value = DEFAULT_TIME)]
    time: String,

    /// Noise amplitude in m/s.
    #[arg(long, default_value_t = DEFAULT_AMP)]
    amp: f64,

    /// Seed for the perturbation RNG; the same seed reproduces the same field.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Streamwise bulk velocity written to every cell's x component.
    #[arg(long, default_value_t = DEFAULT_U_BULK)]
    u_bulk: f64,

    /// Also write a noiseU_log.txt with noise statistics into the time directory.
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Load all settings from a JSON preset file. The other flags are ignored
    /// when this is provided.
    #[arg(long, value_name = "JSON")]
    preset: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let settings = if let Some(preset) = args.preset.as_ref() {
        match NoiseSettings::from_preset(preset) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Failed to load preset {:?}: {}", preset, e);
                std::process::exit(1);
            }
        }
    } else {
        NoiseSettings {
            case_root: args.case,
            time: args.time,
            amp: args.amp,
            seed: args.seed,
            u_bulk: args.u_bulk,
            debug: args.debug,
        }
    };

    if let Err(err) = run(settings) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
