//! Adaptive frame stride for scanning a video.
//!
//! The sampler aims at `initial_samples` frames spread over the clip. Every
//! rejected frame raises that target by one (capped at `max_samples`), which
//! shortens the stride for the rest of the clip.

use crate::params::SamplingParams;

/// Position of the scan: the frame to examine and the current sample target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleState {
    pub frame: usize,
    pub target: usize,
}

#[derive(Clone, Debug)]
pub struct StrideSampler {
    frame_count: usize,
    params: SamplingParams,
}

impl StrideSampler {
    pub fn new(frame_count: usize, params: SamplingParams) -> Self {
        Self {
            frame_count,
            params,
        }
    }

    /// First frame to examine, `None` for an empty clip.
    pub fn start(&self) -> Option<SampleState> {
        (self.frame_count > 0).then_some(SampleState {
            frame: 0,
            target: self.params.initial_samples.max(1),
        })
    }

    /// Next state after examining `state.frame`; `None` once past the end.
    pub fn step(&self, state: SampleState, accepted: bool) -> Option<SampleState> {
        let target = if accepted {
            state.target
        } else {
            (state.target + 1).min(self.params.max_samples.max(state.target))
        };
        let stride = (self.frame_count / target).max(1);
        let frame = state.frame + stride;
        (frame < self.frame_count).then_some(SampleState { frame, target })
    }
}
