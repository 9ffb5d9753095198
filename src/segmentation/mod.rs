//! Finger region segmentation
//!
//! Isolates finger-like blobs in a hand photograph using pure image geometry:
//!
//! grayscale → 7×7 Gaussian → inverted Otsu threshold → external contours
//! → area filter → bounding-box crops → per-crop edge overlay
//!
//! Regions come back in the order the contour search yields them: the
//! component whose first pixel is last in raster order comes first. That
//! order is part of the contract: callers number fingers by list position,
//! so it must never be re-sorted.

pub mod contours;
pub mod edges;
pub mod filters;

use crate::config::KycConfig;
use crate::error::KycError;
use crate::Result;
use contours::{draw_contour, find_external_contours, Mask};
use image::{imageops, ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

pub const DEFAULT_MIN_REGION_AREA: f64 = 1500.0;

const SMOOTHING_KERNEL: usize = 7;
const CROP_SMOOTHING_KERNEL: usize = 3;
const EDGE_LOW_THRESHOLD: f32 = 50.0;
const EDGE_HIGH_THRESHOLD: f32 = 150.0;
const EDGE_HIGHLIGHT: Rgb<u8> = Rgb([255, 0, 0]);
const CONTOUR_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);
const CONTOUR_THICKNESS: u32 = 2;

/// Decoded raster plus the bytes it was decoded from. Immutable.
#[derive(Debug, Clone)]
pub struct SourceImage {
    raster: RgbImage,
    encoded: Vec<u8>,
}

impl SourceImage {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| KycError::DecodeError(e.to_string()))?;

        Ok(Self {
            raster: decoded.to_rgb8(),
            encoded: bytes.to_vec(),
        })
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn channels(&self) -> u8 {
        3
    }

    pub fn raster(&self) -> &RgbImage {
        &self.raster
    }

    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }
}

/// Bounding box of one surviving contour plus the contour's area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub area: f64,
}

/// Regions with their crops and edge overlays (index-aligned) and a preview.
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    regions: Vec<Region>,
    crops: Vec<RgbImage>,
    edge_overlays: Vec<RgbImage>,
    preview: RgbImage,
}

/// One positional entry of a segmentation ("Finger 1", "Finger 2", ...).
#[derive(Debug, Clone, Copy)]
pub struct Finger<'a> {
    pub number: usize,
    pub region: &'a Region,
    pub crop: &'a RgbImage,
    pub edge_overlay: &'a RgbImage,
}

/// JPEG-encoded form of a segmentation, ready for transport.
#[derive(Debug, Clone)]
pub struct EncodedSegmentation {
    pub num_fingers: usize,
    pub regions: Vec<Region>,
    pub fingers: Vec<Vec<u8>>,
    pub finger_lines: Vec<Vec<u8>>,
    pub contour_img: Vec<u8>,
}

impl SegmentationResult {
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn crops(&self) -> &[RgbImage] {
        &self.crops
    }

    pub fn edge_overlays(&self) -> &[RgbImage] {
        &self.edge_overlays
    }

    pub fn preview(&self) -> &RgbImage {
        &self.preview
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Zero regions is a valid outcome, not a failure.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn fingers(&self) -> impl Iterator<Item = Finger<'_>> {
        self.regions
            .iter()
            .zip(&self.crops)
            .zip(&self.edge_overlays)
            .enumerate()
            .map(|(i, ((region, crop), edge_overlay))| Finger {
                number: i + 1,
                region,
                crop,
                edge_overlay,
            })
    }

    pub fn encode_jpeg(&self) -> Result<EncodedSegmentation> {
        let fingers = self
            .crops
            .iter()
            .map(encode_jpeg)
            .collect::<Result<Vec<_>>>()?;
        let finger_lines = self
            .edge_overlays
            .iter()
            .map(encode_jpeg)
            .collect::<Result<Vec<_>>>()?;

        Ok(EncodedSegmentation {
            num_fingers: self.regions.len(),
            regions: self.regions.clone(),
            fingers,
            finger_lines,
            contour_img: encode_jpeg(&self.preview)?,
        })
    }
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .map_err(|e| KycError::ImageEncodeError(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Stateless segmenter; safe to share and to run on several images in parallel.
#[derive(Debug, Clone, Copy)]
pub struct RegionSegmenter {
    min_region_area: f64,
}

impl RegionSegmenter {
    pub fn new(min_region_area: f64) -> Self {
        Self { min_region_area }
    }

    pub fn from_config(config: &KycConfig) -> Self {
        Self::new(config.min_region_area)
    }

    pub fn min_region_area(&self) -> f64 {
        self.min_region_area
    }

    pub fn segment_bytes(&self, bytes: &[u8]) -> Result<SegmentationResult> {
        let source = SourceImage::decode(bytes)?;
        Ok(self.segment_image(&source))
    }

    pub fn segment_image(&self, source: &SourceImage) -> SegmentationResult {
        let raster = source.raster();

        let gray = filters::to_grayscale(raster);
        let smoothed = filters::gaussian_blur(&gray, SMOOTHING_KERNEL);
        let level = filters::otsu_level(&smoothed);
        let mask = Mask::from_inverted_threshold(&smoothed, level);

        let contours = find_external_contours(&mask);
        debug!(
            threshold = level,
            contour_count = contours.len(),
            "Contours extracted"
        );

        let mut regions = Vec::new();
        let mut crops = Vec::new();
        let mut edge_overlays = Vec::new();
        let mut preview = raster.clone();

        for contour in contours {
            let area = contour.area();
            if area <= self.min_region_area {
                continue;
            }

            let (x, y, width, height) = contour.bounding_box();
            let crop = imageops::crop_imm(raster, x, y, width, height).to_image();

            let crop_gray = filters::to_grayscale(&crop);
            let crop_smoothed = filters::gaussian_blur(&crop_gray, CROP_SMOOTHING_KERNEL);
            let edge_map = edges::canny(&crop_smoothed, EDGE_LOW_THRESHOLD, EDGE_HIGH_THRESHOLD);

            debug!(x, y, width, height, area, "Region accepted");

            draw_contour(&mut preview, &contour, CONTOUR_COLOUR, CONTOUR_THICKNESS);
            edge_overlays.push(edges::overlay_edges(&crop_gray, &edge_map, EDGE_HIGHLIGHT));
            crops.push(crop);
            regions.push(Region {
                x,
                y,
                width,
                height,
                area,
            });
        }

        SegmentationResult {
            regions,
            crops,
            edge_overlays,
            preview,
        }
    }
}

impl Default for RegionSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_REGION_AREA)
    }
}

/// Decode `bytes` and segment them with the given noise floor.
pub fn segment(bytes: &[u8], min_region_area: f64) -> Result<SegmentationResult> {
    RegionSegmenter::new(min_region_area).segment_bytes(bytes)
}
