use bytemuck::{Pod, Zeroable};
use serde::Serialize;

use crate::audio::features::FeatureVector;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Resolution {
    pub width: f32,
    pub height: f32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
        }
    }
}

/// Everything a renderer reads for one tick. A detached copy of the
/// integrator's state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlFrame {
    pub level: f32,
    pub bands: [f32; 4],
    pub pending_smoothed: f32,
    pub effective_time: f64,
    pub wall_time: f64,
    pub resolution: Resolution,
}

impl ControlFrame {
    pub fn features(&self) -> FeatureVector {
        FeatureVector {
            level: self.level,
            bands: self.bands,
        }
    }

    pub fn to_uniforms(&self) -> ControlUniforms {
        ControlUniforms {
            level: self.level,
            band0: self.bands[0],
            band1: self.bands[1],
            band2: self.bands[2],
            band3: self.bands[3],
            pending_smoothed: self.pending_smoothed,
            effective_time: self.effective_time as f32,
            wall_time: self.wall_time as f32,
            resolution_width: self.resolution.width,
            resolution_height: self.resolution.height,
        }
    }
}

/// Flat per-tick record, laid out for direct upload as a uniform block and
/// serialized with camelCase keys for external consumers.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlUniforms {
    pub level: f32,
    pub band0: f32,
    pub band1: f32,
    pub band2: f32,
    pub band3: f32,
    pub pending_smoothed: f32,
    pub effective_time: f32,
    pub wall_time: f32,
    pub resolution_width: f32,
    pub resolution_height: f32,
}
