//! Response types.
//!
//! # Responsibilities
//! - JSON envelope for success and failure replies
//! - Redirect replies
//! - The single `Respond` entry point turning a reply into the HTTP response
//!
//! # Design Decisions
//! - `Respond::respond` consumes the reply, so a reply is written at most once
//! - Envelope payloads are serialized to `serde_json::Value` inside the handler
//!   attempt, so a serialization failure is a handler fault like any other

use std::borrow::Cow;

use axum::{
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::dispatch::Fault;

/// Turns a handler reply into the HTTP response.
pub trait Respond: Send + 'static {
    /// `request` is the head of the request being answered.
    fn respond(self, request: &Parts) -> Response;
}

/// A numeric failure code with a default message.
pub trait FailCode {
    fn code(&self) -> i64;

    fn message(&self) -> Cow<'_, str>;
}

/// JSON reply envelope.
///
/// Success: `{"success":true,"code":0,"data":...}`, `data` omitted when absent.
/// Failure: `{"success":false,"code":N,"msg":"..."}`, `msg` omitted when empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    pub success: bool,
    pub code: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: 0,
            msg: String::new(),
            data: Some(data),
        }
    }

    /// Success without a payload.
    pub fn ok() -> Self {
        Self {
            success: true,
            code: 0,
            msg: String::new(),
            data: None,
        }
    }

    /// Failure carrying the code's own message.
    pub fn fail(code: impl FailCode) -> Self {
        let msg = code.message().into_owned();
        Self::fail_with_msg(code, msg)
    }

    pub fn fail_with_msg(code: impl FailCode, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.code(),
            msg: msg.into(),
            data: None,
        }
    }
}

impl<T: Serialize> Envelope<T> {
    /// Erase the payload type.
    pub fn into_json(self) -> Result<Envelope, Fault> {
        let data = self.data.map(serde_json::to_value).transpose()?;
        Ok(Envelope {
            success: self.success,
            code: self.code,
            msg: self.msg,
            data,
        })
    }
}

impl Respond for Envelope {
    fn respond(self, _request: &Parts) -> Response {
        match serde_json::to_vec(&self) {
            Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize envelope");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Redirect reply: a `Location` header and a caller-chosen status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    location: String,
    status: StatusCode,
}

impl Redirect {
    pub fn to(location: impl Into<String>, status: StatusCode) -> Self {
        Self {
            location: location.into(),
            status,
        }
    }

    /// 302 Found.
    pub fn found(location: impl Into<String>) -> Self {
        Self::to(location, StatusCode::FOUND)
    }

    /// 303 See Other.
    pub fn see_other(location: impl Into<String>) -> Self {
        Self::to(location, StatusCode::SEE_OTHER)
    }

    /// 307 Temporary Redirect.
    pub fn temporary(location: impl Into<String>) -> Self {
        Self::to(location, StatusCode::TEMPORARY_REDIRECT)
    }

    /// 308 Permanent Redirect.
    pub fn permanent(location: impl Into<String>) -> Self {
        Self::to(location, StatusCode::PERMANENT_REDIRECT)
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl Respond for Redirect {
    fn respond(self, _request: &Parts) -> Response {
        match HeaderValue::try_from(self.location) {
            Ok(location) => (self.status, [(header::LOCATION, location)]).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Invalid redirect location");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
