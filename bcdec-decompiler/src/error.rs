use std::fmt;

use bcdec_ir::FrameError;
use thiserror::Error;

/// Input corruption or internal limits; fatal for the method being decompiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompileError {
    #[error("Unresolved jump target {target} at pc {pc}")]
    UnresolvedTarget { pc: usize, target: usize },

    #[error("Malformed exception range [{start}, {end}) -> {handler}")]
    MalformedExceptionRange {
        start: usize,
        end: usize,
        handler: usize,
    },

    #[error("Stack depth mismatch at pc {pc}: {left} vs {right}")]
    StackDepthMismatch { pc: usize, left: usize, right: usize },

    #[error("Frame error at pc {pc}: {source}")]
    Frame {
        pc: usize,
        #[source]
        source: FrameError,
    },

    #[error("Invalid register r{reg} at pc {pc}")]
    InvalidRegister { pc: usize, reg: usize },

    #[error("{pass} exceeded {limit} iterations")]
    IterationLimit { pass: &'static str, limit: usize },

    #[error("Method has no operations")]
    EmptyMethod,
}

impl DecompileError {
    /// Attach the pc to a frame error.
    pub fn frame(pc: usize, source: FrameError) -> Self {
        match source {
            FrameError::InvalidRegister(reg) => DecompileError::InvalidRegister { pc, reg },
            FrameError::DepthMismatch(left, right) => {
                DecompileError::StackDepthMismatch { pc, left, right }
            }
            source => DecompileError::Frame { pc, source },
        }
    }

    /// Pc the error was detected at, if it has one.
    pub fn pc(&self) -> Option<usize> {
        match self {
            DecompileError::UnresolvedTarget { pc, .. }
            | DecompileError::StackDepthMismatch { pc, .. }
            | DecompileError::Frame { pc, .. }
            | DecompileError::InvalidRegister { pc, .. } => Some(*pc),
            DecompileError::MalformedExceptionRange { start, .. } => Some(*start),
            DecompileError::IterationLimit { .. } | DecompileError::EmptyMethod => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DecompileError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Heuristic ambiguity, processing continued with the default choice.
    Warning,
    /// Something could not be reconstructed; the method is flagged.
    Error,
}

/// A message attached to the decompiled method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub pc: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(pc: Option<usize>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            pc,
            message: message.into(),
        }
    }

    pub fn warning(pc: Option<usize>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            pc,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.pc {
            Some(pc) => write!(f, "{tag} at pc {pc}: {}", self.message),
            None => write!(f, "{tag}: {}", self.message),
        }
    }
}

impl From<&DecompileError> for Diagnostic {
    fn from(err: &DecompileError) -> Self {
        Diagnostic::error(err.pc(), err.to_string())
    }
}

/// Diagnostics collected while decompiling one method.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error-severity diagnostic, logged with `warn!`.
    pub fn error(&mut self, method: &str, pc: Option<usize>, message: impl Into<String>) {
        let diag = Diagnostic::error(pc, message);
        log::warn!("{method}: {diag}");
        self.items.push(diag);
    }

    /// Record a warning-severity diagnostic, logged with `debug!`.
    pub fn warning(&mut self, method: &str, pc: Option<usize>, message: impl Into<String>) {
        let diag = Diagnostic::warning(pc, message);
        log::debug!("{method}: {diag}");
        self.items.push(diag);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
