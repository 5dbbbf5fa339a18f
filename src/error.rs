// File: error.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use std::fmt;

/// Failure of a single raw request exchange.
#[derive(Debug)]
pub enum TransportError {
    Connect(String),
    Tls(String),
    Write(std::io::Error),
    Read(std::io::Error),
    Timeout(u128),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "Connection failed: {}", e),
            Self::Tls(e) => write!(f, "TLS handshake failed: {}", e),
            Self::Write(e) => write!(f, "Write failed: {}", e),
            Self::Read(e) => write!(f, "Read failed: {}", e),
            Self::Timeout(ms) => write!(f, "Request timeout after {}ms", ms),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Write(e) | Self::Read(e) => Some(e),
            _ => None,
        }
    }
}

/// A target line that could not be turned into test cases.
#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    InvalidLine(String),
    InvalidUrl(String, String),
    UnsupportedScheme(String),
    InvalidIp(String),
    Resolve(String, String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLine(line) => write!(f, "Invalid input line: {}", line),
            Self::InvalidUrl(url, e) => write!(f, "Failed to parse URL {}: {}", url, e),
            Self::UnsupportedScheme(url) => write!(f, "Unsupported URL scheme: {}", url),
            Self::InvalidIp(ip) => write!(f, "Failed to parse IP address: {}", ip),
            Self::Resolve(host, e) => write!(f, "Failed to resolve host {}: {}", host, e),
        }
    }
}

impl std::error::Error for InputError {}

#[derive(Debug)]
pub enum ScanError {
    Config(String),
    Io(std::io::Error),
    Join(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Join(msg) => write!(f, "Task failed: {}", msg),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ScanError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<tokio::task::JoinError> for ScanError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Join(error.to_string())
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
