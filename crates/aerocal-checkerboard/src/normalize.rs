//! Local min/max normalization of a response map.
//!
//! The symmetry response varies strongly with contrast, so peaks are rescaled
//! against the extrema of their neighbourhood. The extrema come from a cheap
//! pyramid: `floor(log2(n))` rounds of 3×3 erode/dilate followed by a 2×
//! bilinear downsample, then one bilinear upsample back to full size.

use aerocal_core::ImageF32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

fn morph3x3(src: &ImageF32, which: Extremum) -> ImageF32 {
    let mut out = ImageF32::zeros(src.width, src.height);
    for y in 0..src.height {
        let y0 = y.saturating_sub(1);
        let y1 = (y + 1).min(src.height - 1);
        for x in 0..src.width {
            let x0 = x.saturating_sub(1);
            let x1 = (x + 1).min(src.width - 1);
            let mut acc = src.get(x, y);
            for yy in y0..=y1 {
                for xx in x0..=x1 {
                    let v = src.get(xx, yy);
                    acc = match which {
                        Extremum::Min => acc.min(v),
                        Extremum::Max => acc.max(v),
                    };
                }
            }
            out.set(x, y, acc);
        }
    }
    out
}

fn pyramid_levels(neighbourhood: usize) -> u32 {
    if neighbourhood < 2 {
        0
    } else {
        neighbourhood.ilog2()
    }
}

/// Approximate min or max of `resp` over a `neighbourhood`-sized window.
pub fn local_extremum(resp: &ImageF32, neighbourhood: usize, which: Extremum) -> ImageF32 {
    if resp.width == 0 || resp.height == 0 {
        return resp.clone();
    }
    let mut level = resp.clone();
    for _ in 0..pyramid_levels(neighbourhood) {
        let filtered = morph3x3(&level, which);
        let w = ((filtered.width as f32 * 0.5).round() as usize).max(1);
        let h = ((filtered.height as f32 * 0.5).round() as usize).max(1);
        level = filtered.resize_bilinear(w, h);
    }
    level.resize_bilinear(resp.width, resp.height)
}

/// `(r - local_min) / (eps + local_max - local_min)` with `eps = 0.05 × global max`.
pub fn normalize_locally(resp: &ImageF32, neighbourhood: usize) -> ImageF32 {
    let eps = 0.05 * resp.max_value();
    let local_min = local_extremum(resp, neighbourhood, Extremum::Min);
    let local_max = local_extremum(resp, neighbourhood, Extremum::Max);

    let data = resp
        .data
        .iter()
        .zip(local_min.data.iter().zip(&local_max.data))
        .map(|(&r, (&lo, &hi))| {
            let denom = eps + hi - lo;
            if denom > 0.0 {
                (r - lo) / denom
            } else {
                0.0
            }
        })
        .collect();
    ImageF32 {
        width: resp.width,
        height: resp.height,
        data,
    }
}
