//! Batch finger extraction
//!
//! Usage:
//!   finger-batch <dataset_dir> [output_json] [min_area]
//!   finger-batch ./hands counts.json 2000

use clap::Parser;
use kyc_verification_engine::segmentation::{RegionSegmenter, DEFAULT_MIN_REGION_AREA};
use kyc_verification_engine::KycError;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Count finger regions in every image of a dataset directory
#[derive(Parser, Debug)]
#[command(name = "finger-batch", version)]
struct Args {
    /// Directory of .jpg, .jpeg and .png hand photographs
    dataset_dir: PathBuf,

    /// JSON file the per-image counts are written to
    #[arg(default_value = "finger_counts.json")]
    output: PathBuf,

    /// Minimum contour area for a blob to count as a finger
    #[arg(default_value_t = DEFAULT_MIN_REGION_AREA)]
    min_area: f64,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BatchEntry {
    Counted { filename: String, num_fingers: usize },
    Failed { filename: String, error: String },
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Args {
        dataset_dir,
        output,
        min_area,
    } = Args::parse();

    let segmenter = RegionSegmenter::new(min_area);

    let mut paths: Vec<PathBuf> = fs::read_dir(&dataset_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image(path))
        .collect();
    paths.sort();

    info!(
        dataset = %dataset_dir.display(),
        images = paths.len(),
        min_area,
        "Starting batch finger extraction"
    );

    let mut entries = Vec::with_capacity(paths.len());
    for path in &paths {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let entry = match fs::read(path)
            .map_err(KycError::from)
            .and_then(|bytes| segmenter.segment_bytes(&bytes))
        {
            Ok(result) => {
                debug!(file = %filename, num_fingers = result.region_count(), "Processed");
                BatchEntry::Counted {
                    filename,
                    num_fingers: result.region_count(),
                }
            }
            Err(e) => {
                warn!(file = %filename, error = %e, "Failed to process image");
                BatchEntry::Failed {
                    filename,
                    error: e.to_string(),
                }
            }
        };
        entries.push(entry);
    }

    let writer = BufWriter::new(File::create(&output)?);
    serde_json::to_writer_pretty(writer, &entries)?;

    info!(output = %output.display(), processed = entries.len(), "Batch complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["finger-batch", "hands"]).unwrap();

        assert_eq!(args.dataset_dir, PathBuf::from("hands"));
        assert_eq!(args.output, PathBuf::from("finger_counts.json"));
        assert_eq!(args.min_area, 1500.0);
    }

    #[test]
    fn test_args_positional_overrides() {
        let args = Args::try_parse_from(["finger-batch", "hands", "out.json", "2000"]).unwrap();

        assert_eq!(args.output, PathBuf::from("out.json"));
        assert_eq!(args.min_area, 2000.0);
    }

    #[test]
    fn test_args_reject_bad_input() {
        let err = Args::try_parse_from(["finger-batch", "hands", "out.json", "abc"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(err.to_string().contains("MIN_AREA"));

        let err = Args::try_parse_from(["finger-batch"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let err = Args::try_parse_from(["finger-batch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_is_image_by_extension() {
        assert!(is_image(Path::new("a/left.JPG")));
        assert!(is_image(Path::new("right.png")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("no_extension")));
    }
}
