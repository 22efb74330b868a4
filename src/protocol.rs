//! Martinu lookup protocol grammar.
//!
//! One request per connection:
//!
//! ```text
//! Client -> Server:  <HEADER>\n
//! Client -> Server:  <token>\n          one of: -n | -f | -l | -L
//! Client -> Server:  <payload>          no trailing newline; omitted for -L
//! Server -> Client:  <result line>\n    zero or more
//! Server -> Client:  <TERMINATOR>\n
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Handshake line the client sends first.
pub const HEADER: &str = "< Martinu Protocol version 1.0 >";

/// Sentinel line closing every response.
pub const TERMINATOR: &str = "< Martinu protocol -- End >";

/// Sent in-band for a bad header or an unknown command token.
pub const SERVER_WARNING: &str = "Server: Wrong protocol header or client arguments!";

/// Sent in-band when an exact lookup finds no such login.
pub const LOGIN_UNKNOWN: &str = "Server: Login unknown";

/// Line reads give up after this many bytes without a newline.
pub const MAX_LINE_LENGTH: usize = 255;

/// Command selector, as carried by the token line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    LookupById,
    LookupDir,
    LookupByPrefix,
    ListAll,
}

impl CommandKind {
    /// Parse a token line. Exact, case-sensitive match.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "-n" => Some(CommandKind::LookupById),
            "-f" => Some(CommandKind::LookupDir),
            "-l" => Some(CommandKind::LookupByPrefix),
            "-L" => Some(CommandKind::ListAll),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            CommandKind::LookupById => "-n",
            CommandKind::LookupDir => "-f",
            CommandKind::LookupByPrefix => "-l",
            CommandKind::ListAll => "-L",
        }
    }

    /// Whether a raw payload follows the token line.
    pub fn takes_payload(self) -> bool {
        !matches!(self, CommandKind::ListAll)
    }
}

/// A single lookup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Descriptive (gecos) field of one login
    LookupById(String),
    /// Home directory of one login
    LookupDir(String),
    /// Every login starting with the prefix
    LookupByPrefix(String),
    /// Every login
    ListAll,
}

impl Command {
    /// Build a command from its token kind and payload. The payload is
    /// ignored for [`CommandKind::ListAll`].
    pub fn from_parts(kind: CommandKind, payload: impl Into<String>) -> Self {
        match kind {
            CommandKind::LookupById => Command::LookupById(payload.into()),
            CommandKind::LookupDir => Command::LookupDir(payload.into()),
            CommandKind::LookupByPrefix => Command::LookupByPrefix(payload.into()),
            CommandKind::ListAll => Command::ListAll,
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::LookupById(_) => CommandKind::LookupById,
            Command::LookupDir(_) => CommandKind::LookupDir,
            Command::LookupByPrefix(_) => CommandKind::LookupByPrefix,
            Command::ListAll => CommandKind::ListAll,
        }
    }

    pub fn token(&self) -> &'static str {
        self.kind().token()
    }

    /// Login name or prefix; `None` for [`Command::ListAll`].
    pub fn payload(&self) -> Option<&str> {
        match self {
            Command::LookupById(login) | Command::LookupDir(login) => Some(login),
            Command::LookupByPrefix(prefix) => Some(prefix),
            Command::ListAll => None,
        }
    }
}

/// Encode the full client byte stream for a command.
pub fn encode_request(command: &Command) -> Bytes {
    let payload = command.payload().unwrap_or("");
    let mut buf = BytesMut::with_capacity(HEADER.len() + 4 + payload.len());
    buf.put_slice(HEADER.as_bytes());
    buf.put_u8(b'\n');
    buf.put_slice(command.token().as_bytes());
    buf.put_u8(b'\n');
    buf.put_slice(payload.as_bytes());
    buf.freeze()
}

/// Encode a server response: each line, then the terminator.
pub fn encode_response<I, S>(lines: I) -> Bytes
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut buf = BytesMut::new();
    for line in lines {
        buf.put_slice(line.as_ref().as_bytes());
        buf.put_u8(b'\n');
    }
    buf.put_slice(TERMINATOR.as_bytes());
    buf.put_u8(b'\n');
    buf.freeze()
}

/// Split a server byte stream into its result lines.
///
/// Returns `None` if the stream never reaches a terminator line.
pub fn decode_response(input: &[u8]) -> Option<Vec<String>> {
    let mut lines = Vec::new();
    let mut rest = input;

    while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
        let line = String::from_utf8_lossy(&rest[..pos]);
        if line == TERMINATOR {
            return Some(lines);
        }
        lines.push(line.into_owned());
        rest = &rest[pos + 1..];
    }

    None
}
