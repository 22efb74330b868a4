//! pwlookup: user directory lookups over the Martinu protocol
//!
//! A client asks for one of:
//! - the descriptive name of a login (`-n`)
//! - the home directory of a login (`-f`)
//! - all logins starting with a prefix (`-l`)
//! - all logins (`-L`)
//!
//! and the server streams back one result per line, followed by a fixed
//! terminator line. Each connection carries exactly one request.

pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;
