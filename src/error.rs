use std::fmt;

#[derive(Debug)]
pub enum CaptureError {
    InvalidConfig(String),

    /// An extraction read would fall outside the source buffer.
    RegionOutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        source_width: u32,
        source_height: u32,
    },

    /// The baseline image could not be found in the asset bundle nor on
    /// the filesystem.
    ResourceNotFound(String),

    /// Actual and baseline images differ in size. Contains
    /// `(width, height)` of each side.
    SizeMismatch {
        actual: (u32, u32),
        baseline: (u32, u32),
    },

    BufferOverflow,

    /// The view thread is not running; no further snapshots can be taken.
    WorkerDead,

    /// A worker panicked while processing a request. Contains the panic
    /// message.
    WorkerPanic(String),

    /// The view snapshot provider failed to produce a frame.
    Snapshot(anyhow::Error),

    /// Persist, encode, decode or read failure.
    Io(anyhow::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureErrorClass {
    InvalidInput,
    NotFound,
    Mismatch,
    Io,
    Fatal,
}

impl CaptureError {
    pub fn class(&self) -> CaptureErrorClass {
        match self {
            Self::InvalidConfig(_) | Self::RegionOutOfBounds { .. } => {
                CaptureErrorClass::InvalidInput
            }
            Self::ResourceNotFound(_) => CaptureErrorClass::NotFound,
            Self::SizeMismatch { .. } => CaptureErrorClass::Mismatch,
            Self::Io(_) | Self::Snapshot(_) => CaptureErrorClass::Io,
            Self::BufferOverflow | Self::WorkerDead | Self::WorkerPanic(_) => {
                CaptureErrorClass::Fatal
            }
        }
    }

    pub(crate) fn io(context: impl fmt::Display, err: impl Into<anyhow::Error>) -> Self {
        Self::Io(err.into().context(context.to_string()))
    }

    /// Create a string-based copy of this error suitable for handing to
    /// another thread or caller. The anyhow variants lose their source
    /// chain and keep its formatted text.
    pub fn to_sendable(&self) -> Self {
        match self {
            Self::InvalidConfig(s) => Self::InvalidConfig(s.clone()),
            Self::RegionOutOfBounds {
                x,
                y,
                width,
                height,
                source_width,
                source_height,
            } => Self::RegionOutOfBounds {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
                source_width: *source_width,
                source_height: *source_height,
            },
            Self::ResourceNotFound(s) => Self::ResourceNotFound(s.clone()),
            Self::SizeMismatch { actual, baseline } => Self::SizeMismatch {
                actual: *actual,
                baseline: *baseline,
            },
            Self::BufferOverflow => Self::BufferOverflow,
            Self::WorkerDead => Self::WorkerDead,
            Self::WorkerPanic(s) => Self::WorkerPanic(s.clone()),
            Self::Snapshot(inner) => Self::Snapshot(anyhow::anyhow!("{inner:#}")),
            Self::Io(inner) => Self::Io(anyhow::anyhow!("{inner:#}")),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(message) => write!(f, "invalid capture configuration: {message}"),
            Self::RegionOutOfBounds {
                x,
                y,
                width,
                height,
                source_width,
                source_height,
            } => write!(
                f,
                "region {width}x{height} at ({x}, {y}) lies outside the {source_width}x{source_height} snapshot"
            ),
            Self::ResourceNotFound(what) => write!(f, "could not open compare image: {what}"),
            Self::SizeMismatch { actual, baseline } => write!(
                f,
                "the actual and expected image are not the same size: actual {}x{}, expected {}x{}",
                actual.0, actual.1, baseline.0, baseline.1
            ),
            Self::BufferOverflow => write!(f, "pixel buffer size overflow"),
            Self::WorkerDead => write!(f, "view capture thread is not running"),
            Self::WorkerPanic(message) => write!(f, "capture worker panicked: {message}"),
            Self::Snapshot(inner) => write!(f, "view snapshot failed: {inner:#}"),
            Self::Io(inner) => write!(f, "{inner:#}"),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Snapshot(inner) | Self::Io(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;
