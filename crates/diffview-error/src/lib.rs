use std::fmt;

use thiserror::Error;

/// Coarse grouping for every failure the tool can report. Component crates
/// define their own error enums and convert into [`ToolError`] at the
/// boundary, so callers always see a category plus a stable machine code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    GitOperation,
    HttpServer,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "VALIDATION",
            ErrorCategory::GitOperation => "GIT_OPERATION",
            ErrorCategory::HttpServer => "HTTP_SERVER",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{category}/{code}: {message}")]
pub struct ToolError {
    category: ErrorCategory,
    code: &'static str,
    message: String,
}

impl ToolError {
    pub fn new(category: ErrorCategory, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
        }
    }

    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, code, message)
    }

    pub fn git_operation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::GitOperation, code, message)
    }

    pub fn http_server(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::HttpServer, code, message)
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
