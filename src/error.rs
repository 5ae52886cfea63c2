// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the session telemetry engine.
//!
//! Only [`CommandError`] ever reaches the host: it is the downstream command's
//! own failure, carried through every delegate unchanged. Host and config
//! errors stay inside the telemetry side and degrade it instead.

use thiserror::Error;

/// A failed host command, as seen by the delegates wrapping it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("{command} failed: {message}")]
    Failed { command: String, message: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

impl CommandError {
    /// Create a generic command failure.
    pub fn failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            command: command.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the host collaborator when queried for live sessions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Host unavailable: {0}")]
    Unavailable(String),
}

/// Why a create-session response could not be decoded into a session
/// identity. Attribute capture is skipped; the command outcome is unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseShapeError {
    #[error("response value is not an array")]
    NotAnArray,

    #[error("response value has {0} element(s), expected at least 2")]
    TooShort(usize),

    /// The first element is null, empty, a boolean, or a compound value.
    /// Numeric ids are accepted and stringified.
    #[error("first response element is not a session id")]
    InvalidSessionId,
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Result type alias using anyhow for setup and binary plumbing.
pub type Result<T> = anyhow::Result<T>;
