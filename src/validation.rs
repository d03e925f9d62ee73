//! Post-capture checks on what a session wrote.
//!
//! Useful for integration testing with virtual cameras, where the driver is
//! real but the output can be inspected afterwards.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::session::{CaptureReport, SavedFrame};

/// Reason a capture failed validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Nothing to validate.
    #[error("cannot validate empty frame sequence")]
    Empty,

    /// Driver sequence numbers skipped or repeated.
    #[error("frame sequence gap at index {index}: expected {expected}, got {actual}")]
    SequenceGap {
        /// Position in the saved frame list.
        index: usize,
        /// Expected sequence number.
        expected: u32,
        /// Sequence number found.
        actual: u32,
    },

    /// A frame file's size differs from the bytes the driver reported.
    #[error("{} holds {actual} bytes, expected {expected}", path.display())]
    SizeMismatch {
        /// Frame file.
        path: PathBuf,
        /// Bytes-used reported by the driver.
        expected: u64,
        /// Size on disk.
        actual: u64,
    },

    /// A frame file could not be inspected.
    #[error("cannot inspect {}: {source}", path.display())]
    Io {
        /// Frame file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Validates that every saved frame file exists and holds exactly the bytes
/// the driver reported as used.
///
/// # Errors
///
/// Returns `Empty` if nothing was saved, `Io` if a file cannot be stat'ed,
/// and `SizeMismatch` on the first file whose size is wrong.
pub fn validate_saved_frames(report: &CaptureReport) -> Result<(), ValidationError> {
    if report.saved.is_empty() {
        return Err(ValidationError::Empty);
    }

    for saved in &report.saved {
        let actual = fs::metadata(&saved.path)
            .map_err(|source| ValidationError::Io {
                path: saved.path.clone(),
                source,
            })?
            .len();
        let expected = u64::from(saved.bytes);

        if actual != expected {
            return Err(ValidationError::SizeMismatch {
                path: saved.path.clone(),
                expected,
                actual,
            });
        }
    }

    Ok(())
}

/// Validates that a sequence of frames has incrementing sequence numbers.
///
/// Frames missing from the list because they could not be written are
/// allowed for: the sequence must advance by exactly as many frames as the
/// frame counter did.
///
/// # Errors
///
/// Returns `Empty` for an empty slice and `SequenceGap` at the first frame
/// whose sequence number does not follow its predecessor's.
pub fn validate_frame_sequence(frames: &[SavedFrame]) -> Result<(), ValidationError> {
    if frames.is_empty() {
        return Err(ValidationError::Empty);
    }

    for (i, pair) in frames.windows(2).enumerate() {
        if let [prev, curr] = pair {
            let expected = prev
                .sequence
                .wrapping_add(curr.frame.wrapping_sub(prev.frame));
            if curr.sequence != expected {
                return Err(ValidationError::SequenceGap {
                    index: i + 1,
                    expected,
                    actual: curr.sequence,
                });
            }
        }
    }

    Ok(())
}
