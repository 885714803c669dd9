// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::settings::store::WriteError;
use crate::token::TokenError;

/// Error codes for the HTTP and WebSocket surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    AuthRequired,
    ProviderRejected,
    TransientNetwork,
    StorageUnavailable,
    MalformedInput,
    Unauthorized,
    /// The catalog refused a search made with a valid token.
    SearchFailed,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AuthRequired => 401,
            Self::ProviderRejected => 401,
            Self::TransientNetwork => 503,
            Self::StorageUnavailable => 503,
            Self::MalformedInput => 400,
            Self::Unauthorized => 401,
            Self::SearchFailed => 502,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::ProviderRejected => "PROVIDER_REJECTED",
            Self::TransientNetwork => "TRANSIENT_NETWORK",
            Self::StorageUnavailable => "STORAGE_UNAVAILABLE",
            Self::MalformedInput => "MALFORMED_INPUT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::SearchFailed => "SEARCH_FAILED",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&TokenError> for ErrorCode {
    fn from(err: &TokenError) -> Self {
        match err {
            TokenError::AuthRequired(_) => Self::AuthRequired,
            TokenError::TransientNetwork(_) => Self::TransientNetwork,
            TokenError::ProviderRejected(_) => Self::ProviderRejected,
        }
    }
}

impl From<&WriteError> for ErrorCode {
    fn from(err: &WriteError) -> Self {
        match err {
            WriteError::Malformed(_) => Self::MalformedInput,
            WriteError::Storage(_) => Self::StorageUnavailable,
        }
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
