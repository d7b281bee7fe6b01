// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request error taxonomy shared by the control surface
//!
//! Every fault that can escape a request handler is folded into a
//! [`RequestError`] carrying a stable numeric code, so clients can react
//! without parsing message text. Codes are part of the wire contract.

use std::fmt;

use serde::Serialize;

/// Numeric error codes published in error responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u16")]
pub enum ErrorCode {
    BadRequest = 100,
    NotSpecified = 101,
    Parse = 102,
    Range = 103,
    InvalidData = 104,
    NotImplemented = 108,
    Internal = 200,
    Timeout = 300,
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> u16 {
        code as u16
    }
}

impl ErrorCode {
    /// Short tag published as the error `name`
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "badRequest",
            ErrorCode::NotSpecified => "notSpecified",
            ErrorCode::Parse => "parse",
            ErrorCode::Range => "range",
            ErrorCode::InvalidData => "invalidData",
            ErrorCode::NotImplemented => "notImplemented",
            ErrorCode::Internal => "internal",
            ErrorCode::Timeout => "timeout",
        }
    }
}

/// Structured error returned from a request handler
#[derive(Debug, Clone, Serialize)]
pub struct RequestError {
    pub code: ErrorCode,
    pub name: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Byte offset into the payload for parse failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl RequestError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            name: code.name(),
            message: message.into(),
            cause: None,
            offset: None,
        }
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Malformed request envelope
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// A required field was missing from the request
    pub fn not_specified(field: &str) -> Self {
        Self::new(ErrorCode::NotSpecified, format!("{field} not specified"))
    }

    /// A payload failed to decode
    pub fn parse(what: &str, cause: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Parse, format!("could not parse {what}")).with_cause(cause)
    }

    /// A semantically invalid update
    pub fn invalid_data(what: &str, cause: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidData, format!("could not process {what}")).with_cause(cause)
    }

    /// An unknown request type
    pub fn not_implemented(kind: &str) -> Self {
        Self::new(
            ErrorCode::NotImplemented,
            format!("invalid api request type: {kind}"),
        )
    }

    /// An unexpected fault caught at the request boundary
    pub fn internal(cause: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Internal, "internal error").with_cause(cause)
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.message, cause),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RequestError {}

/// Check that an optional index is present and in `0..len`
///
/// Used to validate section and program ids arriving over the wire.
pub fn check_index(index: Option<i64>, name: &str, len: usize) -> Result<usize, RequestError> {
    let index = index.ok_or_else(|| RequestError::not_specified(name))?;
    if index < 0 {
        return Err(RequestError::new(
            ErrorCode::Range,
            format!("{name} out of range: {index} < 0"),
        ));
    }
    if index as usize >= len {
        return Err(RequestError::new(
            ErrorCode::Range,
            format!("{name} out of range: {index} >= {len}"),
        ));
    }
    Ok(index as usize)
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
