//! Error type for allocation operations
//!
//! Provides a unified error type for the heap engine and its process-wide
//! facade, with rich context and optional backtrace capture, following the
//! error-reporting conventions used throughout this crate's other modules.

use core::alloc::Layout;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "std")]
use std::backtrace::{Backtrace, BacktraceStatus};

#[cfg(feature = "logging")]
use tracing::warn;

// ============================================================================
// Error statistics
// ============================================================================

/// Global, process-wide error counters, useful for monitoring callers that
/// poll rather than log.
pub struct ErrorStats {
    exhausted: AtomicU64,
    zero_size_request: AtomicU64,
    invalid_pointer: AtomicU64,
    double_free: AtomicU64,
    invalid_layout: AtomicU64,
    total_errors: AtomicU64,
}

impl ErrorStats {
    const fn new() -> Self {
        Self {
            exhausted: AtomicU64::new(0),
            zero_size_request: AtomicU64::new(0),
            invalid_pointer: AtomicU64::new(0),
            double_free: AtomicU64::new(0),
            invalid_layout: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
        }
    }

    fn record(&self, kind: AllocErrorKind) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
        let counter = match kind {
            AllocErrorKind::Exhausted => &self.exhausted,
            AllocErrorKind::ZeroSizeRequest => &self.zero_size_request,
            AllocErrorKind::InvalidPointer => &self.invalid_pointer,
            AllocErrorKind::DoubleFree => &self.double_free,
            AllocErrorKind::InvalidLayout => &self.invalid_layout,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> ErrorStatsSnapshot {
        ErrorStatsSnapshot {
            exhausted: self.exhausted.load(Ordering::Relaxed),
            zero_size_request: self.zero_size_request.load(Ordering::Relaxed),
            invalid_pointer: self.invalid_pointer.load(Ordering::Relaxed),
            double_free: self.double_free.load(Ordering::Relaxed),
            invalid_layout: self.invalid_layout.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
        }
    }

    /// Zeroes all counters.
    pub fn reset(&self) {
        self.exhausted.store(0, Ordering::Relaxed);
        self.zero_size_request.store(0, Ordering::Relaxed);
        self.invalid_pointer.store(0, Ordering::Relaxed);
        self.double_free.store(0, Ordering::Relaxed);
        self.invalid_layout.store(0, Ordering::Relaxed);
        self.total_errors.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`ErrorStats`]'s counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorStatsSnapshot {
    pub exhausted: u64,
    pub zero_size_request: u64,
    pub invalid_pointer: u64,
    pub double_free: u64,
    pub invalid_layout: u64,
    pub total_errors: u64,
}

/// Global error statistics instance.
pub static ERROR_STATS: ErrorStats = ErrorStats::new();

// ============================================================================
// Error context
// ============================================================================

/// Additional context captured at the point an [`AllocError`] is raised.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub message: Option<&'static str>,
    pub location: Option<&'static core::panic::Location<'static>>,
    #[cfg(feature = "std")]
    pub thread_id: Option<std::thread::ThreadId>,
}

impl ErrorContext {
    #[track_caller]
    fn with_caller() -> Self {
        Self {
            message: None,
            location: Some(core::panic::Location::caller()),
            #[cfg(feature = "std")]
            thread_id: Some(std::thread::current().id()),
        }
    }

    fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    fn empty() -> Self {
        Self {
            message: None,
            location: None,
            #[cfg(feature = "std")]
            thread_id: None,
        }
    }
}

// ============================================================================
// Error kind
// ============================================================================

/// The ways a caller can misuse the heap engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum AllocErrorKind {
    /// No free block large enough to satisfy the request exists.
    #[error("heap exhausted")]
    Exhausted,
    /// `alloc(0)` was requested.
    #[error("zero-size allocation requested")]
    ZeroSizeRequest,
    /// The pointer passed to `free` does not point at a live block start.
    #[error("pointer is not a live block allocated by this heap")]
    InvalidPointer,
    /// The pointer passed to `free` was already freed (or never allocated).
    #[error("pointer already freed")]
    DoubleFree,
    /// The pool handed to `init` cannot host even one quantum-sized block.
    #[error("pool too small or misshapen for a buddy heap")]
    InvalidLayout,
}

impl AllocErrorKind {
    /// Severity this kind of error is reported at.
    pub const fn severity(self) -> ErrorSeverity {
        match self {
            AllocErrorKind::Exhausted => ErrorSeverity::Warning,
            AllocErrorKind::ZeroSizeRequest => ErrorSeverity::Warning,
            AllocErrorKind::InvalidPointer | AllocErrorKind::DoubleFree => ErrorSeverity::Error,
            AllocErrorKind::InvalidLayout => ErrorSeverity::Critical,
        }
    }

    /// A short, human-readable recovery hint.
    pub const fn recovery_hint(self) -> &'static str {
        match self {
            AllocErrorKind::Exhausted => "free outstanding allocations or grow the pool",
            AllocErrorKind::ZeroSizeRequest => "request at least one byte",
            AllocErrorKind::InvalidPointer => "pass a pointer previously returned by alloc",
            AllocErrorKind::DoubleFree => "do not free a pointer more than once",
            AllocErrorKind::InvalidLayout => "supply a larger, word-aligned pool",
        }
    }
}

/// Error severity, highest first when ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Warning,
    Error,
    Critical,
}

// ============================================================================
// AllocError
// ============================================================================

/// Error returned by the heap engine's fallible operations.
#[derive(Debug, Clone)]
pub struct AllocError {
    kind: AllocErrorKind,
    layout: Option<Layout>,
    context: Option<alloc_box::Box<ErrorContext>>,
    #[cfg(feature = "std")]
    backtrace: Option<alloc_box::Rc<Backtrace>>,
}

// `std::backtrace::Backtrace` is not `Clone`; share it behind an `Rc` so
// `AllocError` itself can stay `Clone` the way callers expect of a value type.
mod alloc_box {
    #[cfg(feature = "std")]
    pub use std::boxed::Box;
    #[cfg(feature = "std")]
    pub use std::rc::Rc;

    #[cfg(not(feature = "std"))]
    extern crate alloc;
    #[cfg(not(feature = "std"))]
    pub use alloc::boxed::Box;
}

impl AllocError {
    /// Creates an error of the given kind, capturing caller location.
    #[track_caller]
    pub fn new(kind: AllocErrorKind) -> Self {
        ERROR_STATS.record(kind);
        Self::log(kind);
        Self {
            kind,
            layout: None,
            context: Some(alloc_box::Box::new(ErrorContext::with_caller())),
            #[cfg(feature = "std")]
            backtrace: capture_backtrace(),
        }
    }

    /// Creates an error of the given kind carrying the layout that triggered it.
    #[track_caller]
    pub fn with_layout(kind: AllocErrorKind, layout: Layout) -> Self {
        let mut err = Self::new(kind);
        err.layout = Some(layout);
        err
    }

    #[cfg(feature = "logging")]
    fn log(kind: AllocErrorKind) {
        match kind.severity() {
            ErrorSeverity::Warning => warn!(kind = %kind, "allocator error"),
            ErrorSeverity::Error | ErrorSeverity::Critical => {
                warn!(kind = %kind, critical = kind.severity() == ErrorSeverity::Critical, "allocator error")
            }
        }
    }

    #[cfg(not(feature = "logging"))]
    fn log(_kind: AllocErrorKind) {}

    /// Attaches a short static message to the error's context.
    #[must_use]
    pub fn with_message(mut self, message: &'static str) -> Self {
        let ctx = self.context.take().map(|c| *c).unwrap_or_else(ErrorContext::empty);
        self.context = Some(alloc_box::Box::new(ctx.with_message(message)));
        self
    }

    /// The specific kind of failure.
    pub const fn kind(&self) -> AllocErrorKind {
        self.kind
    }

    /// The layout associated with this error, if any.
    pub const fn layout(&self) -> Option<Layout> {
        self.layout
    }

    /// Error severity, derived from `kind`.
    pub const fn severity(&self) -> ErrorSeverity {
        self.kind.severity()
    }

    /// Suggested recovery action as free text.
    pub const fn recovery_hint(&self) -> &'static str {
        self.kind.recovery_hint()
    }

    pub const fn is_exhausted(&self) -> bool {
        matches!(self.kind, AllocErrorKind::Exhausted)
    }

    pub const fn is_double_free(&self) -> bool {
        matches!(self.kind, AllocErrorKind::DoubleFree)
    }

    pub const fn is_invalid_pointer(&self) -> bool {
        matches!(self.kind, AllocErrorKind::InvalidPointer)
    }

    pub const fn is_critical(&self) -> bool {
        matches!(self.severity(), ErrorSeverity::Critical)
    }

    /// A multi-line, human-oriented rendering including context and backtrace.
    #[cfg(feature = "std")]
    pub fn detailed_format(&self) -> String {
        let mut out = format!("AllocError: {}\n", self.kind);

        if let Some(layout) = self.layout {
            out.push_str(&format!("  layout: {} bytes, align {}\n", layout.size(), layout.align()));
        }

        if let Some(ctx) = &self.context {
            if let Some(msg) = ctx.message {
                out.push_str(&format!("  message: {msg}\n"));
            }
            if let Some(loc) = ctx.location {
                out.push_str(&format!("  location: {loc}\n"));
            }
            if let Some(thread_id) = ctx.thread_id {
                out.push_str(&format!("  thread: {thread_id:?}\n"));
            }
        }

        out.push_str(&format!("  severity: {:?}\n", self.severity()));
        out.push_str(&format!("  recovery: {}\n", self.recovery_hint()));

        if let Some(bt) = &self.backtrace {
            if bt.status() == BacktraceStatus::Captured {
                out.push_str(&format!("  backtrace:\n{bt:?}\n"));
            }
        }

        out
    }
}

#[cfg(feature = "std")]
fn capture_backtrace() -> Option<alloc_box::Rc<Backtrace>> {
    let bt = Backtrace::capture();
    if bt.status() == BacktraceStatus::Captured {
        Some(alloc_box::Rc::new(bt))
    } else {
        None
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.layout {
            Some(layout) => write!(
                f,
                "{} (layout: {} bytes, align {})",
                self.kind,
                layout.size(),
                layout.align()
            ),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AllocError {}

/// Result type for allocation operations.
pub type AllocResult<T> = Result<T, AllocError>;

/// Extension methods for [`AllocResult`].
pub trait AllocResultExt<T> {
    /// Attaches a static context message to an error leg.
    fn context(self, msg: &'static str) -> AllocResult<T>;
}

impl<T> AllocResultExt<T> for AllocResult<T> {
    fn context(self, msg: &'static str) -> AllocResult<T> {
        self.map_err(|e| e.with_message(msg))
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl AllocError {
    /// Builds an [`AllocErrorKind::InvalidLayout`] error for a size/align pair.
    #[track_caller]
    pub fn invalid_layout(size: usize, align: usize) -> Self {
        match Layout::from_size_align(size, align) {
            Ok(layout) => Self::with_layout(AllocErrorKind::InvalidLayout, layout),
            Err(_) => Self::new(AllocErrorKind::InvalidLayout),
        }
    }

    /// Builds an [`AllocErrorKind::Exhausted`] error for a failed request size.
    #[track_caller]
    pub fn exhausted(requested: usize) -> Self {
        Self::new(AllocErrorKind::Exhausted).with_message(if requested == 0 {
            "requested zero bytes"
        } else {
            "no free block large enough"
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_layout_round_trip() {
        let layout = Layout::from_size_align(128, 8).unwrap();
        let err = AllocError::with_layout(AllocErrorKind::Exhausted, layout);
        assert_eq!(err.kind(), AllocErrorKind::Exhausted);
        assert_eq!(err.layout(), Some(layout));
        assert!(!err.is_critical());
    }

    #[test]
    fn invalid_layout_is_critical() {
        let err = AllocError::new(AllocErrorKind::InvalidLayout);
        assert!(err.is_critical());
    }

    #[test]
    fn stats_track_totals() {
        ERROR_STATS.reset();
        let _ = AllocError::new(AllocErrorKind::DoubleFree);
        let _ = AllocError::new(AllocErrorKind::Exhausted);
        let snap = ERROR_STATS.snapshot();
        assert_eq!(snap.total_errors, 2);
        assert_eq!(snap.double_free, 1);
        assert_eq!(snap.exhausted, 1);
    }

    #[test]
    fn message_is_attached() {
        let err = AllocError::new(AllocErrorKind::ZeroSizeRequest).with_message("from test");
        assert_eq!(err.context.as_ref().and_then(|c| c.message), Some("from test"));
    }
}
