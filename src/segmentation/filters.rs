//! Grayscale conversion, Gaussian smoothing and automatic binarization

use image::{GrayImage, Luma, RgbImage};

// BT.601 luma weights in 14-bit fixed point
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const WEIGHT_SHIFT: u32 = 14;

/// Single-channel luma of an RGB raster.
pub fn to_grayscale(image: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let luma = (r as u32 * R_WEIGHT
            + g as u32 * G_WEIGHT
            + b as u32 * B_WEIGHT
            + (1 << (WEIGHT_SHIFT - 1)))
            >> WEIGHT_SHIFT;
        gray.put_pixel(x, y, Luma([luma as u8]));
    }

    gray
}

/// 1-D Gaussian weights for an odd kernel size with sigma derived from the size.
///
/// Sizes up to 7 use the fixed binomial-like tables; larger sizes use
/// `sigma = 0.3 * ((size - 1) * 0.5 - 1) + 0.8`.
pub fn gaussian_kernel(size: usize) -> Vec<f32> {
    debug_assert!(size % 2 == 1, "kernel size must be odd");

    match size {
        1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![
            0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
        ],
        _ => {
            let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
            let center = (size / 2) as f64;
            let raw: Vec<f64> = (0..size)
                .map(|i| {
                    let d = i as f64 - center;
                    (-(d * d) / (2.0 * sigma * sigma)).exp()
                })
                .collect();
            let sum: f64 = raw.iter().sum();
            raw.into_iter().map(|w| (w / sum) as f32).collect()
        }
    }
}

/// Mirror an out-of-range index back into `0..len` without repeating the edge pixel.
pub(crate) fn reflect_101(index: isize, len: usize) -> usize {
    let len = len as isize;
    if len <= 1 {
        return 0;
    }

    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * len - 2 - i;
        } else {
            return i as usize;
        }
    }
}

/// Separable Gaussian smoothing with a square `size`×`size` kernel.
pub fn gaussian_blur(gray: &GrayImage, size: usize) -> GrayImage {
    let (width, height) = (gray.width() as usize, gray.height() as usize);
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let kernel = gaussian_kernel(size);
    let radius = (size / 2) as isize;
    let src = gray.as_raw();

    let mut horizontal = vec![0f32; width * height];
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect_101(x as isize + k as isize - radius, width);
                acc += *weight * row[sx] as f32;
            }
            horizontal[y * width + x] = acc;
        }
    }

    let mut out = GrayImage::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = reflect_101(y as isize + k as isize - radius, height);
                acc += *weight * horizontal[sy * width + x];
            }
            out.put_pixel(x as u32, y as u32, Luma([acc.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}

/// Otsu threshold: the level maximising between-class variance.
///
/// Returns 0 for images with a single populated intensity.
pub fn otsu_level(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return 0;
    }

    let scale = 1.0 / total as f64;
    let mu: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, count)| i as f64 * *count as f64)
        .sum::<f64>()
        * scale;

    let epsilon = f32::EPSILON as f64;
    let (mut q1, mut mu1) = (0.0f64, 0.0f64);
    let (mut max_sigma, mut level) = (0.0f64, 0u8);

    for (i, count) in histogram.iter().enumerate() {
        let p_i = *count as f64 * scale;
        mu1 *= q1;
        q1 += p_i;
        let q2 = 1.0 - q1;

        if q1.min(q2) < epsilon || q1.max(q2) > 1.0 - epsilon {
            continue;
        }

        mu1 = (mu1 + i as f64 * p_i) / q1;
        let mu2 = (mu - q1 * mu1) / q2;
        let sigma = q1 * q2 * (mu1 - mu2) * (mu1 - mu2);

        if sigma > max_sigma {
            max_sigma = sigma;
            level = i as u8;
        }
    }

    level
}
