//! Error types for the server, client and directory adapters.
//!
//! Protocol-level problems (bad header, unknown token, unknown login) are not
//! errors: they are answered in-band and the session completes normally.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Directory read errors
#[derive(Debug)]
pub enum DirectoryError {
    /// The passwd file could not be read
    Read(PathBuf, io::Error),
    /// The system account database rejected a lookup
    Lookup(String, nix::errno::Errno),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryError::Read(path, e) => {
                write!(f, "Failed to read directory '{}': {}", path.display(), e)
            }
            DirectoryError::Lookup(login, e) => {
                write!(f, "Failed to look up login '{}': {}", login, e)
            }
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Errors that end a single server session
#[derive(Debug)]
pub enum SessionError {
    /// Writing to the peer failed
    Write(io::Error),
    /// The directory could not be read
    Directory(DirectoryError),
    /// The blocking directory task panicked or was cancelled
    Task(tokio::task::JoinError),
    /// The session outlived its timeout
    Timeout,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Write(e) => write!(f, "Error on writing to socket: {}", e),
            SessionError::Directory(e) => write!(f, "{}", e),
            SessionError::Task(e) => write!(f, "Directory task failed: {}", e),
            SessionError::Timeout => write!(f, "Session timed out"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<DirectoryError> for SessionError {
    fn from(e: DirectoryError) -> Self {
        SessionError::Directory(e)
    }
}

/// Fatal server errors
#[derive(Debug)]
pub enum ServerError {
    Bind(SocketAddr, io::Error),
    Accept(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Bind(addr, e) => write!(f, "Error on binding {}: {}", addr, e),
            ServerError::Accept(e) => write!(f, "Error on accept: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

/// Client errors
#[derive(Debug)]
pub enum ClientError {
    /// Host name did not resolve to any address
    Resolve(String, io::Error),
    /// No resolved address accepted the connection
    Connect(String, io::Error),
    /// Writing the request failed
    Write(io::Error),
    /// Printing a result line failed
    Output(io::Error),
    /// The server closed the connection before the terminator line
    ProtocolIncomplete,
    /// Connecting or waiting for the response took too long
    Timeout,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Resolve(host, e) => write!(f, "Error no such host '{}': {}", host, e),
            ClientError::Connect(target, e) => write!(f, "Error connecting to {}: {}", target, e),
            ClientError::Write(e) => write!(f, "Error on writing to socket: {}", e),
            ClientError::Output(e) => write!(f, "Error writing output: {}", e),
            ClientError::ProtocolIncomplete => {
                write!(f, "Connection closed before end of protocol")
            }
            ClientError::Timeout => write!(f, "Timed out waiting for server"),
        }
    }
}

impl std::error::Error for ClientError {}
