//! Filter settings for the reference point-cloud stages
//!
//! # Main Types
//!
//! - [`CropSettings`] - Bounding box kept by the preprocessing stage
//! - [`DriveableSettings`] - Grid and slope limits for driveable-surface detection
//!
//! All distances are metres in vehicle coordinates: `x` forward, `y` left,
//! `z` up.

use serde::{Deserialize, Serialize};

/// Preprocessing crop box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropSettings {
    /// Keep points with `0 < x <= forward`
    pub forward: f32,

    /// Keep points with `|y| <= side`
    pub side: f32,

    /// Keep points with `|z| <= top`
    pub top: f32,
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            forward: 30.0,
            side: 15.0,
            top: 2.0,
        }
    }
}

/// Driveable-surface detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveableSettings {
    /// Forward extent of the analysed region
    pub forward: f32,

    /// Lateral half-width of the analysed region
    pub side: f32,

    /// Maximum height spread inside one grid cell
    pub max_diff: f32,

    /// Maximum slope (rise over run) between a cell and the one behind it
    pub max_incline: f32,

    /// Edge length of a square grid cell
    pub cell_size: f32,
}

impl Default for DriveableSettings {
    fn default() -> Self {
        Self {
            forward: 30.0,
            side: 15.0,
            max_diff: 0.5,
            max_incline: 0.15,
            cell_size: 1.0,
        }
    }
}
