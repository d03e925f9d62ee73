//! Frame files on disk.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{CaptureError, Result};

/// Writes raw frames to `<dir>/frame<N>.raw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameWriter {
    dir: PathBuf,
}

impl FrameWriter {
    /// File name prefix.
    pub const PREFIX: &'static str = "frame";
    /// File extension.
    pub const EXTENSION: &'static str = "raw";

    /// Create a writer targeting `dir`. The directory must already exist.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the file for zero-based frame `frame`.
    pub fn path_for(&self, frame: u32) -> PathBuf {
        self.dir
            .join(format!("{}{frame}.{}", Self::PREFIX, Self::EXTENSION))
    }

    /// Write `data` verbatim as frame `frame`, replacing any existing file.
    pub fn write(&self, frame: u32, data: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(frame);
        let written = File::create(&path).and_then(|mut file| {
            file.write_all(data)?;
            file.flush()
        });

        match written {
            Ok(()) => Ok(path),
            Err(source) => Err(CaptureError::FrameSave {
                frame,
                path,
                source,
            }),
        }
    }
}
