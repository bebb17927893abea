use std::fmt;

/// Coarse failure classes. Everything the controller reports to the user is
/// bucketed into one of these, so the notice is uniform per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MissingSurface,
    Capture,
    Sink,
    Read,
    Draft,
    Config,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MissingSurface => "missing_surface",
            FailureKind::Capture => "capture",
            FailureKind::Sink => "sink",
            FailureKind::Read => "read",
            FailureKind::Draft => "draft",
            FailureKind::Config => "config",
        }
    }
}

#[derive(Debug)]
pub enum LedgerLeafError {
    MissingSurface,
    Capture(String),
    DegenerateBitmap { width: u32, height: u32 },
    TaintedImage(String),
    Pdf(String),
    Sink(String),
    Read(String),
    Draft(String),
    InvalidConfiguration(String),
    Io(std::io::Error),
}

impl LedgerLeafError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LedgerLeafError::MissingSurface => FailureKind::MissingSurface,
            LedgerLeafError::Capture(_)
            | LedgerLeafError::DegenerateBitmap { .. }
            | LedgerLeafError::TaintedImage(_)
            | LedgerLeafError::Pdf(_) => FailureKind::Capture,
            LedgerLeafError::Sink(_) | LedgerLeafError::Io(_) => FailureKind::Sink,
            LedgerLeafError::Read(_) => FailureKind::Read,
            LedgerLeafError::Draft(_) => FailureKind::Draft,
            LedgerLeafError::InvalidConfiguration(_) => FailureKind::Config,
        }
    }
}

impl fmt::Display for LedgerLeafError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerLeafError::MissingSurface => write!(f, "no renderable surface is mounted"),
            LedgerLeafError::Capture(message) => write!(f, "capture failed: {}", message),
            LedgerLeafError::DegenerateBitmap { width, height } => {
                write!(f, "degenerate capture bitmap {}x{}", width, height)
            }
            LedgerLeafError::TaintedImage(source) => {
                write!(f, "capture tainted by cross-origin image: {}", source)
            }
            LedgerLeafError::Pdf(message) => write!(f, "pdf encoding failed: {}", message),
            LedgerLeafError::Sink(message) => write!(f, "output sink failed: {}", message),
            LedgerLeafError::Read(message) => write!(f, "read error: {}", message),
            LedgerLeafError::Draft(message) => write!(f, "draft store error: {}", message),
            LedgerLeafError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            LedgerLeafError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for LedgerLeafError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerLeafError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LedgerLeafError {
    fn from(value: std::io::Error) -> Self {
        LedgerLeafError::Io(value)
    }
}

impl From<lopdf::Error> for LedgerLeafError {
    fn from(value: lopdf::Error) -> Self {
        LedgerLeafError::Pdf(value.to_string())
    }
}
