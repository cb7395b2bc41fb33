//! CropFilter: preprocessing stage.
//!
//! Discards everything outside a box in front of the vehicle: points behind
//! the sensor, too far to the side, or too far above/below it.

use crate::config::CropSettings;
use crate::pipeline::error::StageError;
use crate::pipeline::node::FrameProcessor;
use crate::types::{Point3, PointCloud};

pub struct CropFilter {
    settings: CropSettings,
}

impl CropFilter {
    pub fn new(settings: CropSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CropSettings {
        &self.settings
    }

    fn keeps(&self, p: &Point3) -> bool {
        p.x > 0.0
            && p.x <= self.settings.forward
            && p.y.abs() <= self.settings.side
            && p.z.abs() <= self.settings.top
    }
}

impl Default for CropFilter {
    fn default() -> Self {
        Self::new(CropSettings::default())
    }
}

impl FrameProcessor<PointCloud> for CropFilter {
    fn process(&mut self, frame: PointCloud) -> Result<PointCloud, StageError> {
        let input = frame.len();
        let mut points = frame.points;
        points.retain(|p| self.keeps(p));
        tracing::trace!("CropFilter kept {} of {} points", points.len(), input);
        Ok(PointCloud { points })
    }
}
