//! External contour extraction on a binary mask
//!
//! Components are found in raster-scan order of their first pixel and
//! reported newest first, the order OpenCV's `findContours` yields. Each
//! outer border is traced with Suzuki-Abe border following (8-connected
//! foreground, 4-connected background). Components lying inside a hole of
//! another component are not external and produce no contour.

use image::{GrayImage, Rgb, RgbImage};
use std::collections::VecDeque;

/// Counter-clockwise neighbour offsets `(dx, dy)` starting east, y pointing down.
const NEIGHBOURS: [(i32, i32); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

const WEST: usize = 4;

/// Foreground/background mask, row-major.
#[derive(Debug, Clone)]
pub struct Mask {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl Mask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as usize,
            height: height as usize,
            data: vec![false; width as usize * height as usize],
        }
    }

    /// Inverted binary threshold: pixels at or below `level` are foreground.
    pub fn from_inverted_threshold(gray: &GrayImage, level: u8) -> Self {
        Self {
            width: gray.width() as usize,
            height: gray.height() as usize,
            data: gray.pixels().map(|p| p.0[0] <= level).collect(),
        }
    }

    pub fn set(&mut self, x: u32, y: u32) {
        let idx = y as usize * self.width + x as usize;
        self.data[idx] = true;
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|v| **v).count()
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Out-of-bounds pixels read as background.
    fn is_set(&self, x: i32, y: i32) -> bool {
        self.in_bounds(x, y) && self.data[y as usize * self.width + x as usize]
    }

    fn index(&self, x: i32, y: i32) -> usize {
        y as usize * self.width + x as usize
    }
}

/// Closed outer border of one connected foreground component.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<(i32, i32)>,
}

impl Contour {
    /// Polygon area enclosed by the border pixel centres (shoelace).
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }

        let twice: i64 = (0..n)
            .map(|i| {
                let (x0, y0) = self.points[i];
                let (x1, y1) = self.points[(i + 1) % n];
                x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64
            })
            .sum();

        twice.abs() as f64 / 2.0
    }

    /// Axis-aligned bounding box `(x, y, width, height)` in pixels.
    pub fn bounding_box(&self) -> (u32, u32, u32, u32) {
        let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
        let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);

        for &(x, y) in &self.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        if self.points.is_empty() {
            return (0, 0, 0, 0);
        }

        (
            min_x as u32,
            min_y as u32,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        )
    }
}

/// Outer borders of all external components, last discovered first.
pub fn find_external_contours(mask: &Mask) -> Vec<Contour> {
    let outer_background = outer_background(mask);
    let mut claimed = vec![false; mask.data.len()];
    let mut contours = Vec::new();

    for y in 0..mask.height as i32 {
        for x in 0..mask.width as i32 {
            let idx = mask.index(x, y);
            if !mask.data[idx] || claimed[idx] {
                continue;
            }

            let external = claim_component(mask, (x, y), &mut claimed, &outer_background);
            if external {
                contours.push(Contour {
                    points: trace_border(mask, (x, y)),
                });
            }
        }
    }

    // Each new outer border is inserted at the head of the list
    contours.reverse();
    contours
}

/// Background reachable from outside the image through 4-connected steps.
fn outer_background(mask: &Mask) -> Vec<bool> {
    let mut outer = vec![false; mask.data.len()];
    let mut queue = VecDeque::new();

    let (w, h) = (mask.width as i32, mask.height as i32);
    let border = (0..w)
        .flat_map(|x| [(x, 0), (x, h - 1)])
        .chain((0..h).flat_map(|y| [(0, y), (w - 1, y)]));

    for (x, y) in border {
        if mask.in_bounds(x, y) && !mask.is_set(x, y) {
            let idx = mask.index(x, y);
            if !outer[idx] {
                outer[idx] = true;
                queue.push_back((x, y));
            }
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let (nx, ny) = (x + dx, y + dy);
            if mask.in_bounds(nx, ny) && !mask.is_set(nx, ny) {
                let idx = mask.index(nx, ny);
                if !outer[idx] {
                    outer[idx] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
    }

    outer
}

/// Flood the 8-connected component at `start`; true when it touches the outer background.
fn claim_component(
    mask: &Mask,
    start: (i32, i32),
    claimed: &mut [bool],
    outer_background: &[bool],
) -> bool {
    let mut external = false;
    let mut queue = VecDeque::new();
    claimed[mask.index(start.0, start.1)] = true;
    queue.push_back(start);

    while let Some((x, y)) = queue.pop_front() {
        if !external {
            external = [(1, 0), (-1, 0), (0, 1), (0, -1)].iter().any(|(dx, dy)| {
                let (nx, ny) = (x + dx, y + dy);
                !mask.in_bounds(nx, ny) || outer_background[mask.index(nx, ny)]
            });
        }

        for (dx, dy) in NEIGHBOURS {
            let (nx, ny) = (x + dx, y + dy);
            if mask.is_set(nx, ny) {
                let idx = mask.index(nx, ny);
                if !claimed[idx] {
                    claimed[idx] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
    }

    external
}

fn direction(from: (i32, i32), to: (i32, i32)) -> usize {
    let delta = (to.0 - from.0, to.1 - from.1);
    NEIGHBOURS
        .iter()
        .position(|offset| *offset == delta)
        .unwrap_or(WEST)
}

fn step(p: (i32, i32), dir: usize) -> (i32, i32) {
    let (dx, dy) = NEIGHBOURS[dir % 8];
    (p.0 + dx, p.1 + dy)
}

/// Follow the outer border starting at a pixel whose west neighbour is background.
fn trace_border(mask: &Mask, start: (i32, i32)) -> Vec<(i32, i32)> {
    // Clockwise from west for the last border pixel before returning to start
    let first = (0..8)
        .map(|k| step(start, (WEST + 8 - k) % 8))
        .find(|p| mask.is_set(p.0, p.1));

    let Some(p1) = first else {
        return vec![start];
    };

    let mut points = Vec::new();
    let (mut previous, mut current) = (p1, start);

    loop {
        points.push(current);

        let from = direction(current, previous);
        let next = (1..=8)
            .map(|k| step(current, from + k))
            .find(|p| mask.is_set(p.0, p.1))
            .unwrap_or(current);

        if next == start && current == p1 {
            break;
        }

        previous = current;
        current = next;
    }

    points
}

/// Outline a contour on `canvas` with a square brush of `thickness` pixels.
pub fn draw_contour(canvas: &mut RgbImage, contour: &Contour, colour: Rgb<u8>, thickness: u32) {
    let lo = -(thickness as i32 / 2);
    let hi = thickness as i32 - thickness as i32 / 2;
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);

    for &(x, y) in &contour.points {
        for dy in lo..hi {
            for dx in lo..hi {
                let (px, py) = (x + dx, y + dy);
                if px >= 0 && py >= 0 && px < w && py < h {
                    canvas.put_pixel(px as u32, py as u32, colour);
                }
            }
        }
    }
}
