//! Test data builders for creating test objects

use lidar_rt::{Point3, PointCloud};
use std::path::{Path, PathBuf};

/// Builder for synthetic point clouds
pub struct CloudBuilder {
    points: Vec<Point3>,
}

impl CloudBuilder {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn point(mut self, x: f32, y: f32, z: f32) -> Self {
        self.points.push(Point3::new(x, y, z));
        self
    }

    /// Flat ground: one point per 0.5 m step over `[1, forward) x [-side, side)`.
    pub fn flat_ground(mut self, forward: f32, side: f32, z: f32) -> Self {
        let mut x = 1.25;
        while x < forward {
            let mut y = -side + 0.25;
            while y < side {
                self.points.push(Point3::new(x, y, z));
                y += 0.5;
            }
            x += 0.5;
        }
        self
    }

    /// Points the crop stage must discard.
    pub fn clutter(self) -> Self {
        self.point(-5.0, 0.0, -1.5)
            .point(50.0, 0.0, -1.5)
            .point(5.0, 40.0, -1.5)
            .point(5.0, 0.0, 8.0)
    }

    pub fn build(self) -> PointCloud {
        self.points.into_iter().collect()
    }

    /// Save to `dir/name` and return the path.
    pub fn save_to(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        self.build().save(&path).expect("failed to write test frame");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_builder() {
        let cloud = CloudBuilder::new()
            .point(1.0, 2.0, 3.0)
            .clutter()
            .build();

        assert_eq!(cloud.len(), 5);
        assert_eq!(cloud.points[0], Point3::new(1.0, 2.0, 3.0));
    }
}
