//! Dual-threshold gradient edge detection and edge overlays

use image::{GrayImage, Luma, Rgb, RgbImage};

// tan(22.5°) in 15-bit fixed point
const FIXED_SHIFT: u32 = 15;
const TG22: i64 = 13573;

/// Canny edge map: 255 on edge pixels, 0 elsewhere.
///
/// 3×3 Sobel gradients with replicated borders, L1 magnitude, non-maximum suppression along the
/// quantised gradient direction, then hysteresis: pixels above `high` seed
/// edges that grow through 8-connected pixels above `low`.
pub fn canny(gray: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (width, height) = (gray.width() as usize, gray.height() as usize);
    let mut edges = GrayImage::new(width as u32, height as u32);
    if width == 0 || height == 0 {
        return edges;
    }

    let src = gray.as_raw();
    let clamp = |v: isize, len: usize| v.clamp(0, len as isize - 1) as usize;
    let at = |x: isize, y: isize| -> i32 { src[clamp(y, height) * width + clamp(x, width)] as i32 };

    let mut dx = vec![0i32; width * height];
    let mut dy = vec![0i32; width * height];
    let mut magnitude = vec![0i32; width * height];

    for y in 0..height as isize {
        for x in 0..width as isize {
            let gx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
            let gy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));

            let idx = y as usize * width + x as usize;
            dx[idx] = gx;
            dy[idx] = gy;
            magnitude[idx] = gx.abs() + gy.abs();
        }
    }

    let mag = |x: isize, y: isize| -> i32 {
        if x < 0 || y < 0 || x >= width as isize || y >= height as isize {
            0
        } else {
            magnitude[y as usize * width + x as usize]
        }
    };

    let (low, high) = (low.floor() as i32, high.floor() as i32);
    let mut candidate = vec![false; width * height];
    let mut stack = Vec::new();

    for y in 0..height as isize {
        for x in 0..width as isize {
            let idx = y as usize * width + x as usize;
            let m = magnitude[idx];
            if m <= low {
                continue;
            }

            let (gx, gy) = (dx[idx], dy[idx]);
            let ax = gx.abs() as i64;
            let ay = (gy.abs() as i64) << FIXED_SHIFT;
            let tg22x = ax * TG22;

            let is_peak = if ay < tg22x {
                m > mag(x - 1, y) && m >= mag(x + 1, y)
            } else {
                let tg67x = tg22x + (ax << (FIXED_SHIFT + 1));
                if ay > tg67x {
                    m > mag(x, y - 1) && m >= mag(x, y + 1)
                } else {
                    let s: isize = if (gx ^ gy) < 0 { -1 } else { 1 };
                    m > mag(x - s, y - 1) && m > mag(x + s, y + 1)
                }
            };

            if !is_peak {
                continue;
            }

            candidate[idx] = true;
            if m > high {
                edges.put_pixel(x as u32, y as u32, Luma([255]));
                stack.push((x, y));
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                    continue;
                }
                let idx = ny as usize * width + nx as usize;
                if candidate[idx] && edges.get_pixel(nx as u32, ny as u32).0[0] == 0 {
                    edges.put_pixel(nx as u32, ny as u32, Luma([255]));
                    stack.push((nx, ny));
                }
            }
        }
    }

    edges
}

/// Grayscale copy of `gray` with every edge pixel painted `highlight`.
pub fn overlay_edges(gray: &GrayImage, edges: &GrayImage, highlight: Rgb<u8>) -> RgbImage {
    let mut overlay = RgbImage::new(gray.width(), gray.height());

    for (x, y, pixel) in gray.enumerate_pixels() {
        let value = pixel.0[0];
        let colour = if edges.get_pixel(x, y).0[0] > 0 {
            highlight
        } else {
            Rgb([value, value, value])
        };
        overlay.put_pixel(x, y, colour);
    }

    overlay
}
