//! Frame sources for the acquisition stage.
//!
//! - [`FileFrameSource`] replays point-cloud files in order, wrapping around.
//! - [`MemoryFrameSource`] yields pre-built frames, for tests and demos.

use crate::error::{LidarError, Result};
use crate::pipeline::error::StageError;
use crate::pipeline::node::FrameSource;
use crate::types::PointCloud;
use std::path::PathBuf;

/// Loads one point-cloud file per call, cycling through a fixed list.
#[derive(Debug, Clone)]
pub struct FileFrameSource {
    files: Vec<PathBuf>,
    next: usize,
}

impl FileFrameSource {
    pub fn new(files: Vec<PathBuf>) -> Result<Self> {
        if files.is_empty() {
            return Err(LidarError::Config(
                "frame source needs at least one file".to_string(),
            ));
        }
        Ok(Self { files, next: 0 })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl FrameSource<PointCloud> for FileFrameSource {
    fn load_next_frame(&mut self) -> std::result::Result<PointCloud, StageError> {
        let path = &self.files[self.next];
        self.next = (self.next + 1) % self.files.len();
        let cloud = PointCloud::load(path)?;
        tracing::trace!("Loaded {} points from {:?}", cloud.len(), path);
        Ok(cloud)
    }
}

/// Yields clones of in-memory frames.
#[derive(Debug, Clone)]
pub struct MemoryFrameSource<T> {
    frames: Vec<T>,
    next: usize,
    cycle: bool,
}

impl<T: Clone> MemoryFrameSource<T> {
    /// Repeat `frames` forever.
    pub fn cycling(frames: Vec<T>) -> Self {
        Self {
            frames,
            next: 0,
            cycle: true,
        }
    }

    /// Yield each frame once, then fail.
    pub fn once(frames: Vec<T>) -> Self {
        Self {
            frames,
            next: 0,
            cycle: false,
        }
    }
}

impl<T: Clone + Send + 'static> FrameSource<T> for MemoryFrameSource<T> {
    fn load_next_frame(&mut self) -> std::result::Result<T, StageError> {
        if self.frames.is_empty() || (!self.cycle && self.next >= self.frames.len()) {
            return Err(StageError::Source("no more frames".to_string()));
        }
        let frame = self.frames[self.next % self.frames.len()].clone();
        self.next += 1;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point3;

    #[test]
    fn test_empty_file_list_rejected() {
        assert!(FileFrameSource::new(Vec::new()).is_err());
    }

    #[test]
    fn test_file_source_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for n in 1..=2 {
            let path = dir.path().join(format!("point_cloud{}.txt", n));
            let cloud: PointCloud = (0..n).map(|i| Point3::new(i as f32, 0.0, 0.0)).collect();
            cloud.save(&path).unwrap();
            files.push(path);
        }

        let mut source = FileFrameSource::new(files).unwrap();
        let sizes: Vec<usize> = (0..5)
            .map(|_| source.load_next_frame().unwrap().len())
            .collect();
        assert_eq!(sizes, vec![1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_file_source_missing_file_is_error() {
        let mut source = FileFrameSource::new(vec![PathBuf::from("/nonexistent.txt")]).unwrap();
        assert!(matches!(
            source.load_next_frame(),
            Err(StageError::Frame(_))
        ));
    }

    #[test]
    fn test_memory_source_once() {
        let mut source = MemoryFrameSource::once(vec!['A', 'B']);
        assert_eq!(source.load_next_frame().unwrap(), 'A');
        assert_eq!(source.load_next_frame().unwrap(), 'B');
        assert!(source.load_next_frame().is_err());
    }

    #[test]
    fn test_memory_source_cycling() {
        let mut source = MemoryFrameSource::cycling(vec![1u8, 2]);
        let got: Vec<u8> = (0..4).map(|_| source.load_next_frame().unwrap()).collect();
        assert_eq!(got, vec![1, 2, 1, 2]);
    }
}
