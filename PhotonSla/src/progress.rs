//! Progress reporting for long-running file operations

/// Callback invoked synchronously from the calling thread.
pub type ProgressCallback<'a> = &'a dyn Fn(&PhotonProgress);

/// Progress information for read, save and analysis operations
#[derive(Debug, Clone)]
pub struct PhotonProgress {
    /// Current operation phase
    pub phase: PhotonPhase,
    /// Current item number (1-indexed)
    pub current: usize,
    /// Total number of items
    pub total: usize,
    /// Free-form detail text
    pub message: Option<String>,
}

impl PhotonProgress {
    /// Create a new progress update
    #[must_use]
    pub fn new(phase: PhotonPhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            message: None,
        }
    }

    /// Create a progress update with detail text
    #[must_use]
    pub fn with_message(
        phase: PhotonPhase,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            message: Some(message.into()),
        }
    }

    /// Get the progress percentage (0.0 - 1.0)
    #[must_use]
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f32 / self.total as f32
        }
    }
}

/// Phase of a Photon operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotonPhase {
    /// Reading the header and parameter blocks
    ReadingHeader,
    /// Reading preview images
    ReadingPreviews,
    /// Reading layer records and payloads
    ReadingLayers,
    /// Authoritative island and margin analysis
    Analyzing,
    /// Local island repair
    Repairing,
    /// Outright island removal
    Removing,
    /// Rendering anti-aliasing companions
    RenderingAntiAliasing,
    /// Writing the file
    Writing,
    /// Operation complete
    Complete,
}

impl PhotonPhase {
    /// Get a human-readable description of this phase
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadingHeader => "Reading header",
            Self::ReadingPreviews => "Reading previews",
            Self::ReadingLayers => "Reading layers",
            Self::Analyzing => "Analyzing layers",
            Self::Repairing => "Repairing islands",
            Self::Removing => "Removing islands",
            Self::RenderingAntiAliasing => "Rendering anti-aliasing",
            Self::Writing => "Writing file",
            Self::Complete => "Complete",
        }
    }
}

/// Report through an optional callback.
pub(crate) fn report(progress: Option<ProgressCallback>, update: impl FnOnce() -> PhotonProgress) {
    if let Some(callback) = progress {
        callback(&update());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_percentage_handles_empty_total() {
        assert!((PhotonProgress::new(PhotonPhase::Complete, 0, 0).percentage() - 1.0).abs() < f32::EPSILON);
        assert!((PhotonProgress::new(PhotonPhase::Analyzing, 1, 4).percentage() - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_report_skips_work_without_callback() {
        report(None, || panic!("update built without a callback"));

        let seen = RefCell::new(Vec::new());
        let callback = |p: &PhotonProgress| seen.borrow_mut().push(p.phase);
        report(Some(&callback), || PhotonProgress::new(PhotonPhase::Writing, 1, 1));
        assert_eq!(*seen.borrow(), vec![PhotonPhase::Writing]);
    }
}
