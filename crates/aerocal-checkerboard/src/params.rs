use serde::{Deserialize, Serialize};

/// Parameters of the symmetry filter and the peak extraction stage.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Rotational symmetry order of the kernel (2 for checkerboard corners).
    pub order: u32,

    /// Side length of the square kernel in pixels.
    pub kernel_size: usize,

    /// Divisor applied to both kernel components.
    pub scale_factor: f32,

    /// Neighbourhood (pixels) over which responses are min/max normalized.
    pub neighbourhood_size: usize,

    /// Binarization level on the normalized response, in `[0, 1]`.
    pub relative_threshold: f32,

    /// Minimal isoperimetric ratio `4πA/P²` of a peak blob. `None` keeps all blobs.
    pub min_roundness: Option<f32>,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            order: 2,
            kernel_size: 101,
            scale_factor: 40.0,
            neighbourhood_size: 250,
            relative_threshold: 0.5,
            min_roundness: Some(0.6),
        }
    }
}

/// Tolerances used while growing the lattice from the seed corner.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EnumeratorParams {
    /// Max `distance / square diagonal` for accepting a predicted corner.
    pub distance_threshold: f32,

    /// Max `distance / side` when closing the central square.
    pub central_square_ratio: f32,

    /// Increment of the search multiplier along the second basis direction.
    pub basis_ratio_step: f32,

    /// Give up on the second basis direction beyond this multiplier.
    pub basis_ratio_max: f32,

    /// How a square predicts the cells bordering it.
    pub square_model: SquareModel,

    /// With [`SquareModel::Supported`], correspondences needed before the
    /// local model gets perspective terms; below this an affine model is fitted.
    pub min_projective_support: usize,
}

/// Local model used to predict the cells bordering a known square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SquareModel {
    /// Exact homography through the square's four corners only.
    UnitSquare,
    /// Fit over the four corners plus every known cell of the surrounding
    /// 4×4 block: affine while support is thin, a DLT homography after.
    #[default]
    Supported,
}

impl Default for EnumeratorParams {
    fn default() -> Self {
        Self {
            distance_threshold: 0.13,
            central_square_ratio: 0.4,
            basis_ratio_step: 0.3,
            basis_ratio_max: 2.5,
            square_model: SquareModel::Supported,
            min_projective_support: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let params: EnumeratorParams =
            serde_json::from_str(r#"{ "distance_threshold": 0.06 }"#).expect("parse");
        assert_eq!(params.distance_threshold, 0.06);
        assert_eq!(params.central_square_ratio, 0.4);
        assert_eq!(params.square_model, SquareModel::Supported);

        let params: EnumeratorParams =
            serde_json::from_str(r#"{ "square_model": "unit_square" }"#).unwrap();
        assert_eq!(params.square_model, SquareModel::UnitSquare);

        let det: DetectorParams = serde_json::from_str(r#"{ "min_roundness": null }"#).unwrap();
        assert_eq!(det.min_roundness, None);
        assert_eq!(det.kernel_size, 101);
    }
}
