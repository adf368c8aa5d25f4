//! Peak blobs in a thresholded response map.
//!
//! Blobs are 8-connected components. Each blob's outer boundary is traced
//! with Moore-neighbour tracing and the blob center is the centroid of that
//! boundary polygon.

use aerocal_core::ImageF32;
use nalgebra::Point2;

/// Binary image; `true` marks a pixel above the threshold.
#[derive(Clone, Debug)]
pub struct BinaryMask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>,
}

impl BinaryMask {
    /// Pixels strictly above `level`.
    pub fn threshold(map: &ImageF32, level: f32) -> Self {
        Self {
            width: map.width,
            height: map.height,
            data: map.data.iter().map(|&v| v > level).collect(),
        }
    }

    #[inline]
    fn at(&self, x: isize, y: isize) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.data[y as usize * self.width + x as usize]
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}

/// One traced blob.
#[derive(Clone, Debug)]
pub struct Peak {
    pub center: Point2<f32>,
    /// Area enclosed by the boundary polygon (pixel centers as vertices).
    pub area: f32,
    pub perimeter: f32,
    pub pixel_count: usize,
}

impl Peak {
    /// Isoperimetric ratio `4πA/P²`; 1 for a circle, 0 for degenerate blobs.
    pub fn roundness(&self) -> f32 {
        if self.perimeter <= 0.0 {
            return 0.0;
        }
        4.0 * std::f32::consts::PI * self.area / (self.perimeter * self.perimeter)
    }
}

// Clockwise in image coordinates (y down), starting west.
const MOORE: [(isize, isize); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

fn direction_index(from: (isize, isize), to: (isize, isize)) -> usize {
    let d = (to.0 - from.0, to.1 - from.1);
    MOORE.iter().position(|&m| m == d).unwrap_or(0)
}

/// Trace the outer boundary starting at the top-left pixel of a blob.
///
/// Stops when the walk is back at `start` and about to repeat its first move.
fn trace_boundary(mask: &BinaryMask, start: (isize, isize), max_steps: usize) -> Vec<(isize, isize)> {
    let mut contour = vec![start];
    let mut current = start;
    let mut back = (start.0 - 1, start.1);

    for _ in 0..max_steps {
        let d = direction_index(current, back);
        let mut next = None;
        for k in 1..=8 {
            let (dx, dy) = MOORE[(d + k) % 8];
            let p = (current.0 + dx, current.1 + dy);
            if mask.at(p.0, p.1) {
                let (bx, by) = MOORE[(d + k - 1) % 8];
                next = Some((p, (current.0 + bx, current.1 + by)));
                break;
            }
        }
        let Some((p, b)) = next else {
            // Isolated pixel.
            break;
        };
        if current == start && contour.get(1) == Some(&p) {
            break;
        }
        contour.push(p);
        current = p;
        back = b;
    }
    if contour.len() > 1 && contour.last() == Some(&start) {
        contour.pop();
    }
    contour
}

/// Signed-area moments of a closed polygon: `(m00, m10, m01)`.
fn polygon_moments(contour: &[(isize, isize)]) -> (f64, f64, f64) {
    let n = contour.len();
    let (mut a, mut mx, mut my) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let (x0, y0) = (contour[i].0 as f64, contour[i].1 as f64);
        let (x1, y1) = (contour[(i + 1) % n].0 as f64, contour[(i + 1) % n].1 as f64);
        let cross = x0 * y1 - x1 * y0;
        a += cross;
        mx += (x0 + x1) * cross;
        my += (y0 + y1) * cross;
    }
    (a / 2.0, mx / 6.0, my / 6.0)
}

fn polygon_perimeter(contour: &[(isize, isize)]) -> f64 {
    let n = contour.len();
    if n < 2 {
        return 0.0;
    }
    (0..n)
        .map(|i| {
            let (x0, y0) = contour[i];
            let (x1, y1) = contour[(i + 1) % n];
            (((x1 - x0).pow(2) + (y1 - y0).pow(2)) as f64).sqrt()
        })
        .sum()
}

fn peak_from_contour(contour: &[(isize, isize)], pixel_count: usize) -> Peak {
    let (m00, m10, m01) = polygon_moments(contour);
    let center = if m00.abs() > f64::EPSILON {
        Point2::new((m10 / m00) as f32, (m01 / m00) as f32)
    } else {
        Point2::new(contour[0].0 as f32, contour[0].1 as f32)
    };
    Peak {
        center,
        area: m00.abs() as f32,
        perimeter: polygon_perimeter(contour) as f32,
        pixel_count,
    }
}

/// Label 8-connected blobs and trace each one.
pub fn find_peaks(mask: &BinaryMask) -> Vec<Peak> {
    let mut visited = vec![false; mask.data.len()];
    let mut peaks = Vec::new();
    let mut stack = Vec::new();

    for start_idx in 0..mask.data.len() {
        if !mask.data[start_idx] || visited[start_idx] {
            continue;
        }
        let start = (
            (start_idx % mask.width) as isize,
            (start_idx / mask.width) as isize,
        );

        let mut pixel_count = 0;
        visited[start_idx] = true;
        stack.push(start);
        while let Some((x, y)) = stack.pop() {
            pixel_count += 1;
            for (dx, dy) in MOORE {
                let (nx, ny) = (x + dx, y + dy);
                if mask.at(nx, ny) {
                    let idx = ny as usize * mask.width + nx as usize;
                    if !visited[idx] {
                        visited[idx] = true;
                        stack.push((nx, ny));
                    }
                }
            }
        }

        let contour = trace_boundary(mask, start, 4 * pixel_count + 8);
        peaks.push(peak_from_contour(&contour, pixel_count));
    }
    peaks
}

/// Blob centers, keeping only blobs rounder than `min_roundness` when set.
///
/// With a roundness filter, blobs whose boundary encloses no area (single
/// pixels, one-pixel-wide lines) are dropped.
pub fn locate_peak_centers(mask: &BinaryMask, min_roundness: Option<f32>) -> Vec<Point2<f32>> {
    find_peaks(mask)
        .into_iter()
        .filter(|p| match min_roundness {
            Some(min) => p.area > 0.0 && p.roundness() > min,
            None => true,
        })
        .map(|p| p.center)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mask_from(rows: &[&str]) -> BinaryMask {
        let width = rows[0].len();
        BinaryMask {
            width,
            height: rows.len(),
            data: rows
                .iter()
                .flat_map(|r| r.chars().map(|c| c == '#'))
                .collect(),
        }
    }

    fn disc(width: usize, height: usize, cx: f32, cy: f32, r: f32) -> BinaryMask {
        let data = (0..width * height)
            .map(|i| {
                let (x, y) = ((i % width) as f32, (i / width) as f32);
                (x - cx).powi(2) + (y - cy).powi(2) <= r * r
            })
            .collect();
        BinaryMask {
            width,
            height,
            data,
        }
    }

    #[test]
    fn square_blob_boundary_and_centroid() {
        let mask = mask_from(&[
            "......", //
            ".###..", //
            ".###..", //
            ".###..", //
            "......",
        ]);
        let peaks = find_peaks(&mask);
        assert_eq!(peaks.len(), 1);
        let p = &peaks[0];
        assert_eq!(p.pixel_count, 9);
        assert_abs_diff_eq!(p.area, 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.perimeter, 8.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.center.x, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.center.y, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn single_pixel_falls_back_to_its_position() {
        let mask = mask_from(&["....", "..#.", "...."]);
        let peaks = find_peaks(&mask);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].center, Point2::new(2.0, 1.0));
        assert_eq!(peaks[0].area, 0.0);
        assert!(locate_peak_centers(&mask, Some(0.6)).is_empty());
        assert_eq!(locate_peak_centers(&mask, None).len(), 1);
    }

    #[test]
    fn diagonal_pixels_form_one_component() {
        let mask = mask_from(&["#...", ".#..", "..#."]);
        assert_eq!(find_peaks(&mask).len(), 1);
    }

    #[test]
    fn concave_blob_is_traced_completely() {
        let mask = mask_from(&[
            ".......", //
            ".#####.", //
            ".#...#.", //
            ".#...#.", //
            ".#####.", //
            ".......",
        ]);
        let peaks = find_peaks(&mask);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].pixel_count, 14);
        // Outer boundary only: a 4x3 rectangle of pixel centers.
        assert_abs_diff_eq!(peaks[0].area, 12.0, epsilon = 1e-6);
        assert_abs_diff_eq!(peaks[0].center.x, 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(peaks[0].center.y, 2.5, epsilon = 1e-6);
    }

    #[test]
    fn roundness_filter_rejects_elongated_blobs() {
        let mut mask = disc(80, 40, 20.0, 20.0, 6.0);
        for x in 45..75 {
            for y in 19..22 {
                mask.data[y * 80 + x] = true;
            }
        }
        let all = locate_peak_centers(&mask, None);
        assert_eq!(all.len(), 2);
        let round = locate_peak_centers(&mask, Some(0.6));
        assert_eq!(round.len(), 1);
        assert_abs_diff_eq!(round[0].x, 20.0, epsilon = 0.1);
        assert_abs_diff_eq!(round[0].y, 20.0, epsilon = 0.1);
    }
}
