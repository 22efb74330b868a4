//! Server side of a single lookup session.
//!
//! A session makes one pass: header, command token, optional payload,
//! dispatch, terminator. Protocol mistakes are answered in-band with
//! `SERVER_WARNING` and the session still finishes with the terminator.

use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{trace, warn};

use crate::directory::{Cursor, Directory, DirectoryEntry};
use crate::error::{DirectoryError, SessionError};
use crate::protocol::{
    Command, CommandKind, HEADER, LOGIN_UNKNOWN, MAX_LINE_LENGTH, SERVER_WARNING, TERMINATOR,
};
use crate::transport::{send_line, LineReadOutcome, LineReader};

/// Run a session over an accepted TCP connection.
pub async fn handle_connection(
    stream: TcpStream,
    directory: Arc<dyn Directory>,
) -> Result<(), SessionError> {
    let (reader, writer) = stream.into_split();
    Session::new(reader, writer, directory).run().await
}

/// Per-connection state. Owns both halves of the connection and a handle to
/// the shared read-only directory.
pub struct Session<R, W> {
    reader: LineReader<R>,
    writer: W,
    directory: Arc<dyn Directory>,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, directory: Arc<dyn Directory>) -> Self {
        Session {
            reader: LineReader::new(reader),
            writer,
            directory,
        }
    }

    /// Drive the session to completion and close the write half.
    pub async fn run(mut self) -> Result<(), SessionError> {
        self.check_header().await?;

        if let Some(command) = self.read_command().await? {
            trace!(?command, "Processing command");
            self.dispatch(&command).await?;
        }

        self.send(TERMINATOR).await?;
        self.writer.shutdown().await.map_err(SessionError::Write)
    }

    async fn check_header(&mut self) -> Result<(), SessionError> {
        match self.reader.read_line().await {
            LineReadOutcome::Line(header) if header == HEADER => Ok(()),
            other => {
                warn!(header = ?other, "Wrong protocol header");
                self.send(SERVER_WARNING).await
            }
        }
    }

    /// Read the token line and, if the command takes one, the payload.
    /// Unknown tokens get a warning and yield `None`.
    async fn read_command(&mut self) -> Result<Option<Command>, SessionError> {
        let kind = match self.reader.read_line().await {
            LineReadOutcome::Line(token) => CommandKind::from_token(&token),
            LineReadOutcome::EndOfStream(_) | LineReadOutcome::Truncated => None,
        };

        let Some(kind) = kind else {
            warn!("Unknown command token");
            self.send(SERVER_WARNING).await?;
            return Ok(None);
        };

        let payload = if kind.takes_payload() {
            let raw = self.reader.read_to_end(MAX_LINE_LENGTH).await;
            String::from_utf8_lossy(&raw).into_owned()
        } else {
            String::new()
        };

        Ok(Some(Command::from_parts(kind, payload)))
    }

    async fn dispatch(&mut self, command: &Command) -> Result<(), SessionError> {
        match command {
            Command::LookupById(login) => match self.lookup(login).await? {
                Some(entry) => self.send(&entry.gecos).await,
                None => self.send(LOGIN_UNKNOWN).await,
            },
            Command::LookupDir(login) => match self.lookup(login).await? {
                Some(entry) => self.send(&entry.home).await,
                None => self.send(LOGIN_UNKNOWN).await,
            },
            Command::LookupByPrefix(prefix) => {
                for entry in self.cursor().await? {
                    if entry.login.starts_with(prefix.as_str()) {
                        self.send(&entry.login).await?;
                    }
                }
                Ok(())
            }
            Command::ListAll => {
                for entry in self.cursor().await? {
                    self.send(&entry.login).await?;
                }
                Ok(())
            }
        }
    }

    fn lookup(
        &self,
        login: &str,
    ) -> impl Future<Output = Result<Option<DirectoryEntry>, SessionError>> {
        let login = login.to_string();
        blocking(Arc::clone(&self.directory), move |directory| {
            directory.lookup(&login)
        })
    }

    fn cursor(&self) -> impl Future<Output = Result<Cursor, SessionError>> {
        blocking(Arc::clone(&self.directory), |directory| directory.cursor())
    }

    async fn send(&mut self, line: &str) -> Result<(), SessionError> {
        send_line(&mut self.writer, line)
            .await
            .map_err(SessionError::Write)
    }
}

/// Run a directory call on the blocking pool.
async fn blocking<T, F>(directory: Arc<dyn Directory>, call: F) -> Result<T, SessionError>
where
    F: FnOnce(&dyn Directory) -> Result<T, DirectoryError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || call(directory.as_ref()))
        .await
        .map_err(SessionError::Task)?;
    Ok(result?)
}
