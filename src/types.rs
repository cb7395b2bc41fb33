//! Core data types for lidar-rt
//!
//! A [`PointCloud`] is the frame that flows through the pipeline. On disk a
//! cloud is plain text: one point per line, three whitespace-separated
//! floats (`x y z`). Blank lines and lines starting with `#` are ignored.

use crate::error::{LidarError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A single LiDAR return in vehicle coordinates (metres).
///
/// `x` points forward, `y` to the left and `z` up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// One frame of sensor data: an ordered sequence of points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointCloud {
    pub points: Vec<Point3>,
}

impl PointCloud {
    /// Create an empty cloud
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cloud with room for `capacity` points
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn push(&mut self, point: Point3) {
        self.points.push(point);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point3> {
        self.points.iter()
    }

    /// Parse a cloud from its text representation.
    ///
    /// `origin` is only used for error messages.
    pub fn parse(reader: impl BufRead, origin: &Path) -> Result<Self> {
        let mut cloud = PointCloud::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {:?}", origin))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let parse_err = |message: String| LidarError::FrameParse {
                path: origin.to_path_buf(),
                line: idx + 1,
                message,
            };

            let mut values = [0.0f32; 3];
            let mut count = 0;
            for field in trimmed.split_whitespace() {
                if count == 3 {
                    return Err(parse_err("expected 3 values, found more".to_string()));
                }
                values[count] = field
                    .parse::<f32>()
                    .map_err(|e| parse_err(format!("invalid number '{}': {}", field, e)))?;
                count += 1;
            }
            if count != 3 {
                return Err(parse_err(format!("expected 3 values, found {}", count)));
            }

            cloud.push(Point3::new(values[0], values[1], values[2]));
        }

        Ok(cloud)
    }

    /// Load a cloud from a text file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open frame file {:?}", path))?;
        Self::parse(BufReader::new(file), path)
    }

    /// Write the cloud to a text file in the same format `load` reads
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create frame file {:?}", path))?;
        let mut out = BufWriter::new(file);
        for p in &self.points {
            writeln!(out, "{} {} {}", p.x, p.y, p.z)
                .with_context(|| format!("Failed to write {:?}", path))?;
        }
        out.flush()
            .with_context(|| format!("Failed to flush {:?}", path))?;
        Ok(())
    }
}

impl FromIterator<Point3> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Point3;
    type IntoIter = std::slice::Iter<'a, Point3>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
