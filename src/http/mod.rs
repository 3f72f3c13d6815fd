//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing, timeout)
//!     → endpoint.rs (handler shape → dispatch-wrapped route)
//!     → request.rs / multipart.rs (adapt body or query, capture head and IP)
//!     → [dispatch retry loop]
//!     → response.rs / file.rs (envelope, redirect or file download)
//!     → Send to client
//! ```

pub mod endpoint;
pub mod file;
pub mod handlers;
pub mod multipart;
pub mod request;
pub mod request_id;
pub mod response;
pub mod server;

pub use endpoint::Endpoint;
pub use file::FileResponse;
pub use multipart::{FormFile, MultipartForm};
pub use request::{Adapt, AdaptError, CommonRequest, FormRequest, JsonRequest, QueryRequest};
pub use request_id::{MakeRequestUuidV4, X_REQUEST_ID};
pub use response::{Envelope, FailCode, Redirect, Respond};
pub use server::{Server, ServerError};
