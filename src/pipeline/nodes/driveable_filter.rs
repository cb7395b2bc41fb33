//! DriveableFilter: identifies the drivable surface.
//!
//! Points inside the analysed region are bucketed into square grid cells on
//! the ground plane. A cell is drivable when its height spread is at most
//! `max_diff` and its mean height rises or falls by at most
//! `max_incline * cell_size` relative to the cell directly behind it. The
//! incline is only checked against a cell behind that is itself flat, so an
//! obstacle does not take the road beyond it down with it. Only points in
//! drivable cells are kept, in their original order.

use crate::config::DriveableSettings;
use crate::pipeline::error::StageError;
use crate::pipeline::node::FrameProcessor;
use crate::types::{Point3, PointCloud};
use std::collections::HashMap;

type CellKey = (i32, i32);

#[derive(Debug, Clone, Copy)]
struct Cell {
    min_z: f32,
    max_z: f32,
    sum_z: f32,
    count: u32,
}

impl Cell {
    fn new(z: f32) -> Self {
        Self {
            min_z: z,
            max_z: z,
            sum_z: z,
            count: 1,
        }
    }

    fn add(&mut self, z: f32) {
        self.min_z = self.min_z.min(z);
        self.max_z = self.max_z.max(z);
        self.sum_z += z;
        self.count += 1;
    }

    fn mean_z(&self) -> f32 {
        self.sum_z / self.count as f32
    }
}

pub struct DriveableFilter {
    settings: DriveableSettings,
}

impl DriveableFilter {
    pub fn new(settings: DriveableSettings) -> Self {
        Self { settings }
    }

    fn cell_of(&self, p: &Point3) -> Option<CellKey> {
        let s = &self.settings;
        if p.x <= 0.0 || p.x > s.forward || p.y.abs() > s.side {
            return None;
        }
        Some((
            (p.x / s.cell_size).floor() as i32,
            (p.y / s.cell_size).floor() as i32,
        ))
    }

    fn drivable_cells(&self, cells: &HashMap<CellKey, Cell>) -> HashMap<CellKey, bool> {
        let max_step = self.settings.max_incline * self.settings.cell_size;
        let flat: HashMap<CellKey, bool> = cells
            .iter()
            .map(|(&key, cell)| (key, cell.max_z - cell.min_z <= self.settings.max_diff))
            .collect();
        let is_flat = |key: &CellKey| flat.get(key).copied().unwrap_or(false);

        cells
            .iter()
            .map(|(&(ix, iy), cell)| {
                // An obstacle behind says nothing about the ground slope.
                let gentle = match cells.get(&(ix - 1, iy)) {
                    Some(behind) if is_flat(&(ix - 1, iy)) => {
                        (cell.mean_z() - behind.mean_z()).abs() <= max_step
                    }
                    _ => true,
                };
                ((ix, iy), is_flat(&(ix, iy)) && gentle)
            })
            .collect()
    }
}

impl Default for DriveableFilter {
    fn default() -> Self {
        Self::new(DriveableSettings::default())
    }
}

impl FrameProcessor<PointCloud> for DriveableFilter {
    fn process(&mut self, frame: PointCloud) -> Result<PointCloud, StageError> {
        let mut cells: HashMap<CellKey, Cell> = HashMap::new();
        for p in &frame {
            if let Some(key) = self.cell_of(p) {
                cells
                    .entry(key)
                    .and_modify(|c| c.add(p.z))
                    .or_insert_with(|| Cell::new(p.z));
            }
        }

        let drivable = self.drivable_cells(&cells);
        let input = frame.len();
        let mut points = frame.points;
        points.retain(|p| {
            self.cell_of(p)
                .and_then(|key| drivable.get(&key).copied())
                .unwrap_or(false)
        });

        tracing::trace!(
            "DriveableFilter kept {} of {} points in {} cell(s)",
            points.len(),
            input,
            cells.len()
        );
        Ok(PointCloud { points })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_patch(x0: f32, z: f32) -> Vec<Point3> {
        vec![
            Point3::new(x0 + 0.2, 0.2, z),
            Point3::new(x0 + 0.5, 0.5, z + 0.05),
            Point3::new(x0 + 0.8, 0.8, z - 0.05),
        ]
    }

    #[test]
    fn test_flat_road_is_kept() {
        let mut filter = DriveableFilter::default();
        let cloud: PointCloud = (1..5).flat_map(|i| flat_patch(i as f32, -1.5)).collect();
        let n = cloud.len();
        assert_eq!(filter.process(cloud).unwrap().len(), n);
    }

    #[test]
    fn test_wall_cell_is_dropped() {
        let mut filter = DriveableFilter::default();
        let mut points = flat_patch(1.0, -1.5);
        // A vertical wall inside the cell x in [2, 3).
        points.extend([
            Point3::new(2.5, 0.5, -1.5),
            Point3::new(2.5, 0.5, 0.0),
            Point3::new(2.5, 0.5, 1.5),
        ]);
        let out = filter.process(points.into_iter().collect()).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|p| p.x < 2.0));
    }

    #[test]
    fn test_road_beyond_obstacle_is_kept() {
        let mut filter = DriveableFilter::default();
        let mut points = flat_patch(1.0, -1.5);
        // A pole in x in [2, 3), with level road continuing behind it.
        points.extend([
            Point3::new(2.5, 0.5, -1.5),
            Point3::new(2.5, 0.5, 0.0),
            Point3::new(2.5, 0.5, 1.5),
        ]);
        points.extend(flat_patch(3.0, -1.5));
        let out = filter.process(points.into_iter().collect()).unwrap();

        assert_eq!(out.len(), 6);
        assert!(out.iter().all(|p| !(2.0..3.0).contains(&p.x)));
        assert_eq!(out.iter().filter(|p| p.x >= 3.0).count(), 3);
    }

    #[test]
    fn test_kerb_step_is_dropped() {
        let mut filter = DriveableFilter::default();
        let mut points = flat_patch(1.0, -1.5);
        // Flat on its own, but 0.3 m above the cell behind it.
        points.extend(flat_patch(2.0, -1.2));
        let out = filter.process(points.into_iter().collect()).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|p| p.z < -1.4));
    }

    #[test]
    fn test_points_outside_region_dropped() {
        let mut filter = DriveableFilter::default();
        let cloud: PointCloud = vec![Point3::new(-2.0, 0.0, -1.5), Point3::new(5.0, 20.0, -1.5)]
            .into_iter()
            .collect();
        assert!(filter.process(cloud).unwrap().is_empty());
    }
}
