//! Client side of the lookup protocol.
//!
//! Connects, sends the header, the token and the payload, then copies
//! result lines to the output until the terminator arrives.

use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::protocol::{Command, HEADER, TERMINATOR};
use crate::transport::{send_line, send_raw, LineReadOutcome, LineReader};

/// Lookup client
pub struct Client {
    host: String,
    port: u16,
    timeout: Option<Duration>,
}

impl Client {
    pub fn new(config: &ClientConfig) -> Self {
        Client {
            host: config.host.clone(),
            port: config.port,
            timeout: config.timeout,
        }
    }

    /// Connect, run one request and print the result lines to `out`.
    /// Returns the number of result lines printed.
    pub async fn run<O: Write>(
        &self,
        command: &Command,
        out: &mut O,
    ) -> Result<usize, ClientError> {
        let session = async move {
            let stream = self.connect().await?;
            Self::exchange(stream, command, out).await
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, session)
                .await
                .unwrap_or(Err(ClientError::Timeout)),
            None => session.await,
        }
    }

    /// Resolve the host and connect to the first address that accepts.
    async fn connect(&self) -> Result<TcpStream, ClientError> {
        let target = format!("{}:{}", self.host, self.port);
        let addrs = lookup_host(target.as_str())
            .await
            .map_err(|e| ClientError::Resolve(self.host.clone(), e))?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    debug!(peer = %addr, "Connected");
                    return Ok(stream);
                }
                Err(e) => {
                    debug!(peer = %addr, error = %e, "Connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => ClientError::Connect(target, e),
            None => ClientError::Resolve(
                self.host.clone(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
            ),
        })
    }

    /// Run one request over an established stream.
    ///
    /// The payload goes out without a newline and the write half is then
    /// shut down: the server reads the payload up to end-of-stream.
    pub async fn exchange<S, O>(
        stream: S,
        command: &Command,
        out: &mut O,
    ) -> Result<usize, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        O: Write,
    {
        let (reader, mut writer) = tokio::io::split(stream);

        send_line(&mut writer, HEADER)
            .await
            .map_err(ClientError::Write)?;
        send_line(&mut writer, command.token())
            .await
            .map_err(ClientError::Write)?;
        if let Some(payload) = command.payload() {
            send_raw(&mut writer, payload)
                .await
                .map_err(ClientError::Write)?;
        }
        writer.shutdown().await.map_err(ClientError::Write)?;

        let mut reader = LineReader::new(reader);
        let mut printed = 0;

        loop {
            let line = match reader.read_line().await {
                LineReadOutcome::Line(line) if line == TERMINATOR => break,
                LineReadOutcome::Line(line) => line,
                LineReadOutcome::Truncated => {
                    warn!("Over-long response line dropped");
                    String::new()
                }
                LineReadOutcome::EndOfStream(partial) => {
                    if !partial.is_empty() {
                        writeln!(out, "{}", partial).map_err(ClientError::Output)?;
                    }
                    return Err(ClientError::ProtocolIncomplete);
                }
            };

            writeln!(out, "{}", line).map_err(ClientError::Output)?;
            printed += 1;
        }

        out.flush().map_err(ClientError::Output)?;
        Ok(printed)
    }
}
