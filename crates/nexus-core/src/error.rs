use std::fmt;

/// Machine-readable error codes for callers that branch on failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    EmptyQuery,
    InvalidLimit,
    InvalidThreshold,
    UnknownProfile,
    InvalidProfile,
    ConfigParseError,
    StoreUnavailable,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::EmptyQuery => "E1001",
            Self::InvalidLimit => "E1002",
            Self::InvalidThreshold => "E1003",
            Self::UnknownProfile => "E2001",
            Self::InvalidProfile => "E2002",
            Self::ConfigParseError => "E2003",
            Self::StoreUnavailable => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::EmptyQuery => "Query text is empty",
            Self::InvalidLimit => "Result limit out of range",
            Self::InvalidThreshold => "Semantic threshold out of range",
            Self::UnknownProfile => "Unknown weight profile",
            Self::InvalidProfile => "Invalid weight profile",
            Self::ConfigParseError => "Config file parse error",
            Self::StoreUnavailable => "Document store unavailable",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::EmptyQuery => Some("Provide a non-empty query string."),
            Self::InvalidLimit => Some("Use a limit between 1 and the configured search.max_limit."),
            Self::InvalidThreshold => Some("Use a semantic threshold between 0.0 and 1.0."),
            Self::UnknownProfile => Some("Run `nx profiles` to list the registered weight profiles."),
            Self::InvalidProfile => Some("Profile weights must be finite and non-negative."),
            Self::ConfigParseError => Some("Fix syntax in .nexus/config.toml and retry."),
            Self::StoreUnavailable => Some("Run `nx index` to create the document store."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors that reject a ranking request before any work is spent.
///
/// Degraded external signals never surface here; they are recorded per
/// candidate as [`crate::model::SignalOutcome`] values instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("{code}: {message}")]
    Validation { code: ErrorCode, message: String },

    #[error("{}: unknown weight profile '{0}'", ErrorCode::UnknownProfile)]
    UnknownProfile(String),

    #[error("{}: invalid weight profile '{name}': {reason}", ErrorCode::InvalidProfile)]
    InvalidProfile { name: String, reason: String },

    #[error("{}: {0}", ErrorCode::ConfigParseError)]
    Config(String),
}

impl PipelineError {
    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    /// The machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::UnknownProfile(_) => ErrorCode::UnknownProfile,
            Self::InvalidProfile { .. } => ErrorCode::InvalidProfile,
            Self::Config(_) => ErrorCode::ConfigParseError,
        }
    }
}
