//! Typed abort signal returned by handlers.

use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use axum::http::StatusCode;

/// Boxed cause carried by a [`Fault`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// How the dispatch loop treats a [`Fault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Client-attributable or deliberate abort; the status is written as-is, never retried.
    Coded(StatusCode),
    /// Retry-eligible backend condition asserted by the handler.
    Transient,
    /// Anything else. The configured classifier may still decide it is transient.
    Unclassified,
}

/// Early abort of a handler.
///
/// Any `std::error::Error` converts into an unclassified fault, so handlers can
/// use `?` on backend calls and let the dispatch loop decide between a retry and
/// a server error:
///
/// ```ignore
/// async fn hello(req: JsonRequest) -> Result<Envelope<Hello>, Fault> {
///     let body: HelloRequest = req.decode()?;
///     if body.name.is_empty() {
///         return Err(Fault::bad_request("name is empty"));
///     }
///     Ok(Envelope::success(Hello::new(&body.name)))
/// }
/// ```
pub struct Fault {
    kind: FaultKind,
    cause: BoxError,
    backtrace: Backtrace,
}

impl Fault {
    fn with_kind(kind: FaultKind, cause: BoxError) -> Self {
        Self {
            kind,
            cause,
            backtrace: Backtrace::force_capture(),
        }
    }

    /// Unclassified fault.
    pub fn new(cause: impl Into<BoxError>) -> Self {
        Self::with_kind(FaultKind::Unclassified, cause.into())
    }

    /// Abort with an explicit response status.
    pub fn with_status(cause: impl Into<BoxError>, status: StatusCode) -> Self {
        Self::with_kind(FaultKind::Coded(status), cause.into())
    }

    pub fn bad_request(cause: impl Into<BoxError>) -> Self {
        Self::with_status(cause, StatusCode::BAD_REQUEST)
    }

    pub fn forbidden(cause: impl Into<BoxError>) -> Self {
        Self::with_status(cause, StatusCode::FORBIDDEN)
    }

    /// Retry-eligible fault, regardless of what the classifier would say.
    pub fn transient(cause: impl Into<BoxError>) -> Self {
        Self::with_kind(FaultKind::Transient, cause.into())
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Status carried by a coded fault.
    pub fn status(&self) -> Option<StatusCode> {
        match self.kind {
            FaultKind::Coded(status) => Some(status),
            _ => None,
        }
    }

    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.cause
    }

    pub fn into_cause(self) -> BoxError {
        self.cause
    }

    /// Backtrace captured where the fault was built, regardless of
    /// `RUST_BACKTRACE`.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("kind", &self.kind)
            .field("cause", &self.cause)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FaultKind::Coded(status) => write!(f, "status {}: {}", status.as_u16(), self.cause),
            FaultKind::Transient => write!(f, "transient: {}", self.cause),
            FaultKind::Unclassified => self.cause.fmt(f),
        }
    }
}

// Fault must not implement std::error::Error: this impl would then overlap
// with `impl<T> From<T> for T`.
impl<E> From<E> for Fault
where
    E: StdError + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(err)
    }
}

/// Classify the error of a `Result` at the call site.
///
/// ```ignore
/// let user = load_user(id).await.forbidden()?;
/// let row = tx.commit().await.transient()?;
/// ```
pub trait FaultExt<T> {
    fn with_status(self, status: StatusCode) -> Result<T, Fault>;

    fn bad_request(self) -> Result<T, Fault>;

    fn forbidden(self) -> Result<T, Fault>;

    fn transient(self) -> Result<T, Fault>;
}

impl<T, E> FaultExt<T> for Result<T, E>
where
    E: Into<BoxError>,
{
    fn with_status(self, status: StatusCode) -> Result<T, Fault> {
        self.map_err(|e| Fault::with_status(e, status))
    }

    fn bad_request(self) -> Result<T, Fault> {
        self.with_status(StatusCode::BAD_REQUEST)
    }

    fn forbidden(self) -> Result<T, Fault> {
        self.with_status(StatusCode::FORBIDDEN)
    }

    fn transient(self) -> Result<T, Fault> {
        self.map_err(Fault::transient)
    }
}
