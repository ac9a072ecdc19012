//! Line-oriented JSON protocol: one request object per line in, one
//! response envelope per line out.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::track::Track;

pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
/// largest page the catalog search accepts
pub const MAX_SEARCH_LIMIT: u32 = 50;

pub const SERVER_BUSY: &str = "Server busy, try again later";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Search,
    Recommend,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Search => f.write_str("SEARCH"),
            Action::Recommend => f.write_str("RECOMMEND"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "UPPERCASE")]
pub enum Request {
    Search {
        query: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
    },
    Recommend {
        #[serde(rename = "trackId")]
        track_id: String,
    },
}

impl Request {
    pub fn action(&self) -> Action {
        match self {
            Request::Search { .. } => Action::Search,
            Request::Recommend { .. } => Action::Recommend,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Success { action: Action, data: Vec<Track> },
    Error { message: String },
}

impl Response {
    pub fn success(action: Action, data: Vec<Track>) -> Self {
        Self::Success { action, data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// the envelope as a single JSON line, without the trailing newline
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::error!("Failed to encode response: {e}");
            r#"{"status":"error","message":"Failed to encode response"}"#.to_string()
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Not a valid JSON object: {0}")]
    NotAnObject(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Request is not valid UTF-8")]
    InvalidUtf8,

    #[error("Request line too long (limit {limit} bytes)")]
    LineTooLong { limit: usize },
}

pub fn parse_request(line: &str) -> Result<Request, ProtocolError> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let Value::Object(object) = value else {
        return Err(ProtocolError::NotAnObject(line.trim().to_string()));
    };

    let action = required_str(&object, "action")?;
    match action.as_str() {
        "SEARCH" => Ok(Request::Search {
            query: required_str(&object, "query")?,
            limit: search_limit(&object)?,
        }),
        "RECOMMEND" => Ok(Request::Recommend {
            track_id: required_str(&object, "trackId")?,
        }),
        _ => Err(ProtocolError::UnknownAction(action)),
    }
}

fn required_str(object: &Map<String, Value>, field: &'static str) -> Result<String, ProtocolError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(ProtocolError::MissingField(field)),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(ProtocolError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}

fn search_limit(object: &Map<String, Value>) -> Result<Option<u32>, ProtocolError> {
    let Some(value) = object.get("limit").filter(|v| !v.is_null()) else {
        return Ok(None);
    };

    value
        .as_u64()
        .and_then(|limit| u32::try_from(limit).ok())
        .filter(|limit| (1..=MAX_SEARCH_LIMIT).contains(limit))
        .map(Some)
        .ok_or(ProtocolError::InvalidField {
            field: "limit",
            expected: "an integer between 1 and 50",
        })
}
