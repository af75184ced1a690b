// Comment moderation states
//
// Every comment is born pending and only leaves that state through an
// explicit status change. Parsing happens before any SQL runs so a bad
// status never costs a round trip.

use std::fmt;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentStatus {
    #[default]
    Pending,
    Approved,
    Spam,
}

impl CommentStatus {
    pub fn parse(input: &str) -> Result<Self, ApiError> {
        match input.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "spam" => Ok(Self::Spam),
            other => Err(ApiError::validation(format!(
                "invalid comment status '{}': expected pending, approved or spam",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Spam => "spam",
        }
    }
}

impl fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
