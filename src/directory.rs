//! User directory adapters.
//!
//! The server only reads from the directory. Each call to
//! [`Directory::cursor`] starts a fresh enumeration from the first entry, so
//! sessions never see each other's position.
//!
//! Adapters are synchronous and may block (file reads, NSS queries); the
//! session runs them on the blocking pool.

use nix::unistd::User;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::DirectoryError;

/// Default passwd file location.
pub const DEFAULT_PASSWD_PATH: &str = "/etc/passwd";

/// One account record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Login name
    pub login: String,
    /// Descriptive name (gecos field)
    pub gecos: String,
    /// Home directory
    pub home: String,
}

impl DirectoryEntry {
    pub fn new(
        login: impl Into<String>,
        gecos: impl Into<String>,
        home: impl Into<String>,
    ) -> Self {
        DirectoryEntry {
            login: login.into(),
            gecos: gecos.into(),
            home: home.into(),
        }
    }
}

/// Enumeration over directory entries, in directory order.
pub type Cursor = Box<dyn Iterator<Item = DirectoryEntry> + Send>;

/// Read-only account directory.
pub trait Directory: Send + Sync {
    /// Open a fresh cursor positioned at the first entry.
    fn cursor(&self) -> Result<Cursor, DirectoryError>;

    /// Find the entry with exactly this login.
    fn lookup(&self, login: &str) -> Result<Option<DirectoryEntry>, DirectoryError> {
        Ok(self.cursor()?.find(|entry| entry.login == login))
    }
}

/// Directory backed by a passwd-format file, re-read on every cursor.
#[derive(Debug, Clone)]
pub struct PasswdDirectory {
    path: PathBuf,
}

impl PasswdDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PasswdDirectory { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for PasswdDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_PASSWD_PATH)
    }
}

impl Directory for PasswdDirectory {
    fn cursor(&self) -> Result<Cursor, DirectoryError> {
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| DirectoryError::Read(self.path.clone(), e))?;

        let entries: Vec<DirectoryEntry> =
            contents.lines().filter_map(parse_passwd_line).collect();
        trace!(path = %self.path.display(), count = entries.len(), "Loaded passwd entries");

        Ok(Box::new(entries.into_iter()))
    }
}

/// Parse one `name:passwd:uid:gid:gecos:home:shell` line.
///
/// Blank lines and `#` comments yield `None`, as do lines with fewer than
/// seven fields.
pub fn parse_passwd_line(line: &str) -> Option<DirectoryEntry> {
    if line.trim().is_empty() || line.starts_with('#') {
        return None;
    }

    let fields: Vec<&str> = line.splitn(7, ':').collect();
    if fields.len() < 7 {
        debug!(line, "Skipping malformed passwd line");
        return None;
    }

    Some(DirectoryEntry::new(fields[0], fields[4], fields[5]))
}

/// The host's account database.
///
/// Exact lookups go through `getpwnam` (so NSS sources such as LDAP or sssd
/// are honoured); enumeration walks the local passwd file.
#[derive(Debug, Clone, Default)]
pub struct SystemDirectory {
    passwd: PasswdDirectory,
}

impl SystemDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Directory for SystemDirectory {
    fn cursor(&self) -> Result<Cursor, DirectoryError> {
        self.passwd.cursor()
    }

    fn lookup(&self, login: &str) -> Result<Option<DirectoryEntry>, DirectoryError> {
        let user =
            User::from_name(login).map_err(|e| DirectoryError::Lookup(login.to_string(), e))?;

        Ok(user.map(|user| {
            DirectoryEntry::new(
                user.name,
                user.gecos.to_string_lossy(),
                user.dir.to_string_lossy(),
            )
        }))
    }
}

/// Pick the directory the server answers from: an explicit passwd file, or
/// the system account database.
pub fn open(passwd: Option<&Path>) -> Arc<dyn Directory> {
    match passwd {
        Some(path) => Arc::new(PasswdDirectory::new(path)),
        None => Arc::new(SystemDirectory::new()),
    }
}

/// In-memory directory with a fixed entry order.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    entries: Vec<DirectoryEntry>,
}

impl MemoryDirectory {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        MemoryDirectory { entries }
    }
}

impl Directory for MemoryDirectory {
    fn cursor(&self) -> Result<Cursor, DirectoryError> {
        Ok(Box::new(self.entries.clone().into_iter()))
    }
}
