use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod foamfield;
mod noise;

pub use noise::perturbed_velocities;

pub const DEFAULT_TIME: &str = "0";
pub const DEFAULT_AMP: f64 = 0.1;
pub const DEFAULT_SEED: u64 = 7;
pub const DEFAULT_U_BULK: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseSettings {
    #[serde(default = "default_case_root")]
    pub case_root: PathBuf,
    #[serde(default = "default_time")]
    pub time: String,
    /// Noise amplitude in m/s.
    #[serde(default = "default_amp")]
    pub amp: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Streamwise bulk velocity written to every cell's x component.
    #[serde(default = "default_u_bulk")]
    pub u_bulk: f64,
    #[serde(default)]
    pub debug: bool,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        NoiseSettings {
            case_root: default_case_root(),
            time: default_time(),
            amp: DEFAULT_AMP,
            seed: DEFAULT_SEED,
            u_bulk: DEFAULT_U_BULK,
            debug: false,
        }
    }
}

impl NoiseSettings {
    /// Load settings from a JSON preset file. Missing keys fall back to the
    /// defaults above, so presets only need to name what they change.
    pub fn from_preset(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

fn default_case_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_time() -> String {
    DEFAULT_TIME.to_string()
}

fn default_amp() -> f64 {
    DEFAULT_AMP
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_u_bulk() -> f64 {
    DEFAULT_U_BULK
}

#[derive(Debug, Error)]
pub enum NoiseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid preset file: {0}")]
    Preset(#[from] serde_json::Error),

    #[error("missing velocity field file: {}", .path.display())]
    MissingField { path: PathBuf },

    #[error(
        "missing cell-centre file: {} (run `postProcess -func writeCellCentres -time {}` in the case root first)",
        .path.display(),
        .time
    )]
    MissingCellCentres { path: PathBuf, time: String },

    #[error("could not parse cell-centre data: {what}")]
    Parse { what: String },

    #[error("cell-centre file declares {expected} vectors but only {found} were found")]
    CountMismatch { expected: usize, found: usize },

    #[error("could not find an internalField declaration to replace in {}", .path.display())]
    PatternNotFound { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, NoiseError>;

#[derive(Debug)]
pub struct RunSummary {
    pub cells: usize,
    pub field_path: PathBuf,
    pub backup_path: PathBuf,
}

/// A field file as found on disk, with the bytes actually stored and the
/// decoded text. `compressed` records whether the `.gz` variant was read so
/// the rewrite can keep the same representation.
struct FieldFile {
    path: PathBuf,
    raw: Vec<u8>,
    text: String,
    compressed: bool,
}

fn read_field_file(dir: &Path, name: &str) -> Result<Option<FieldFile>> {
    let plain = dir.join(name);
    let (path, compressed) = if plain.exists() {
        (plain, false)
    } else {
        let gz = dir.join(format!("{name}.gz"));
        if gz.exists() {
            (gz, true)
        } else {
            return Ok(None);
        }
    };

    let raw = fs::read(&path)?;
    let text = if compressed {
        let mut decoder = GzDecoder::new(raw.as_slice());
        let mut text = String::new();
        decoder.read_to_string(&mut text)?;
        text
    } else {
        String::from_utf8_lossy(&raw).into_owned()
    };

    Ok(Some(FieldFile {
        path,
        raw,
        text,
        compressed,
    }))
}

fn write_field_text(file: &FieldFile, text: &str) -> Result<()> {
    if file.compressed {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes())?;
        fs::write(&file.path, encoder.finish()?)?;
    } else {
        fs::write(&file.path, text)?;
    }
    Ok(())
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Perturb the case's initial velocity field.
///
/// Reads `<case>/<time>/C` for the authoritative cell count, builds a
/// nonuniform internalField with seeded zero-mean noise in the y and z
/// components, backs up `<case>/<time>/U` and rewrites it in place. Either
/// file may also exist in its gzip form (`U.gz` / `C.gz`); a compressed
/// field is written back compressed.
pub fn run(settings: NoiseSettings) -> Result<RunSummary> {
    let time_dir = settings.case_root.join(&settings.time);

    println!("[foamnoise] case = {}", settings.case_root.display());

    let ufile = read_field_file(&time_dir, "U")?.ok_or_else(|| NoiseError::MissingField {
        path: time_dir.join("U"),
    })?;
    let cfile = read_field_file(&time_dir, "C")?.ok_or_else(|| NoiseError::MissingCellCentres {
        path: time_dir.join("C"),
        time: settings.time.clone(),
    })?;

    println!("[foamnoise] U = {}", ufile.path.display());
    println!("[foamnoise] C = {}", cfile.path.display());

    let centres = foamfield::parse_vector_field(&cfile.text)?;
    let cells = centres.count;

    let velocities = perturbed_velocities(cells, settings.amp, settings.u_bulk, settings.seed);
    let block = foamfield::format_internal_field(&velocities);

    let new_text = foamfield::replace_internal_field(&ufile.text, &block).ok_or_else(|| {
        NoiseError::PatternNotFound {
            path: ufile.path.clone(),
        }
    })?;

    let backup = backup_path(&ufile.path);
    fs::write(&backup, &ufile.raw)?;
    write_field_text(&ufile, &new_text)?;

    if settings.debug {
        write_debug_log(&time_dir, &settings, &centres.vectors, &velocities)?;
    }

    println!("[foamnoise] updated internalField with seeded noise");
    println!("[foamnoise]   amp   = {} m/s", settings.amp);
    println!("[foamnoise]   seed  = {}", settings.seed);
    println!("[foamnoise]   cells = {}", cells);
    println!("[foamnoise] backup saved as {}", backup.display());

    Ok(RunSummary {
        cells,
        field_path: ufile.path,
        backup_path: backup,
    })
}

fn write_debug_log(
    time_dir: &Path,
    settings: &NoiseSettings,
    centres: &[[f64; 3]],
    velocities: &[[f64; 3]],
) -> Result<()> {
    let mut log = format!("foamnoise seed: {}\n", settings.seed);
    log.push_str(&format!("amp: {} m/s\n", settings.amp));
    log.push_str(&format!("u_bulk: {} m/s\n", settings.u_bulk));
    log.push_str(&format!("cells: {}\n", velocities.len()));

    if let Some((lo, hi)) = bounding_box(centres) {
        log.push_str(&format!(
            "cell centres: min ({} {} {}) max ({} {} {})\n",
            lo[0], lo[1], lo[2], hi[0], hi[1], hi[2]
        ));
    }

    let (mean_y, rms_y) = column_stats(velocities, 1);
    let (mean_z, rms_z) = column_stats(velocities, 2);
    log.push_str(&format!("Uy noise: mean {mean_y:.3e}, rms {rms_y:.3e}\n"));
    log.push_str(&format!("Uz noise: mean {mean_z:.3e}, rms {rms_z:.3e}\n"));

    fs::write(time_dir.join("noiseU_log.txt"), log)?;
    Ok(())
}

fn bounding_box(vectors: &[[f64; 3]]) -> Option<([f64; 3], [f64; 3])> {
    let first = vectors.first()?;
    let mut lo = *first;
    let mut hi = *first;
    for v in &vectors[1..] {
        for axis in 0..3 {
            lo[axis] = lo[axis].min(v[axis]);
            hi[axis] = hi[axis].max(v[axis]);
        }
    }
    Some((lo, hi))
}

fn column_stats(vectors: &[[f64; 3]], column: usize) -> (f64, f64) {
    if vectors.is_empty() {
        return (0.0, 0.0);
    }
    let n = vectors.len() as f64;
    let mean = vectors.iter().map(|v| v[column]).sum::<f64>() / n;
    let rms = (vectors.iter().map(|v| v[column] * v[column]).sum::<f64>() / n).sqrt();
    (mean, rms)
}
