//! Progress reporting for catalog operations

/// Progress callback type for catalog operations
pub type ProgressCallback<'a> = &'a (dyn Fn(&Progress) + Sync + Send);

/// Progress information during catalog operations
#[derive(Debug, Clone)]
pub struct Progress {
    /// Current operation phase
    pub phase: Phase,
    /// Current item number (1-indexed)
    pub current: usize,
    /// Total number of items
    pub total: usize,
    /// Current file being processed (if applicable)
    pub current_file: Option<String>,
}

impl Progress {
    /// Create a new progress update
    #[must_use]
    pub fn new(phase: Phase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: None,
        }
    }

    /// Create a progress update with a file name
    #[must_use]
    pub fn with_file(phase: Phase, current: usize, total: usize, file: impl Into<String>) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: Some(file.into()),
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

/// Phase of a catalog operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading the manifest and checking existing links
    Planning,
    /// Hashing pakfile contents
    Hashing,
    /// Creating canonical symlinks
    Linking,
    /// Appending to the checksum ledger
    Recording,
    /// Walking directories for the duplicate detector
    Scanning,
    /// Operation complete
    Complete,
}

impl Phase {
    /// Get a human-readable description of this phase
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "Checking catalog",
            Self::Hashing => "Hashing pakfiles",
            Self::Linking => "Linking pakfiles",
            Self::Recording => "Updating ledger",
            Self::Scanning => "Scanning directories",
            Self::Complete => "Complete",
        }
    }
}

/// A callback that ignores every update.
pub fn no_progress(_: &Progress) {}
