//! Transport boundary between the client layer and the engine.
//!
//! [`Transport::submit`] is fire-and-forget: it hands a request to the
//! engine and returns without waiting for anything. Replies and updates
//! come back later, unordered, on a single inbound [`mpsc`] channel of
//! [`Message`]s that the transport was constructed with.
//!
//! [`StdioTransport`] is the bundled implementation: it runs a bridge
//! process that speaks newline-delimited JSON on stdin/stdout.
//!
//! # Example
//!
//! ```rust,ignore
//! use tdlink_api::{StdioTransport, Transport};
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! let (inbound_tx, inbound_rx) = mpsc::channel(1024);
//! let cancel = CancellationToken::new();
//! let transport = StdioTransport::spawn("tdjson-bridge", &[], inbound_tx, cancel.clone())?;
//!
//! let client_id = transport.create_client_id();
//! transport.submit(client_id, &Request::new("getAuthorizationState"))?;
//! ```

use std::process::Stdio;
use std::sync::atomic::{AtomicI32, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::message::{ClientId, Message, Request};

// ── Transport ────────────────────────────────────────────────────────

/// Outbound half of the engine connection.
///
/// Implementations deliver inbound messages on a channel of their own
/// choosing; the process-wide client registry routes them by
/// [`Message::client_id`].
pub trait Transport: Send + Sync + 'static {
    /// Allocate a new engine-side client identity.
    fn create_client_id(&self) -> ClientId;

    /// Hand a request to the engine. Never waits for a reply.
    fn submit(&self, client_id: ClientId, request: &Request) -> Result<(), Error>;
}

// ── StdioTransport ───────────────────────────────────────────────────

/// Transport backed by a bridge process speaking JSON lines.
///
/// Each request is written to the bridge's stdin as one JSON object per
/// line, including `@client_id`. Each line the bridge prints on stdout is
/// parsed as a [`Message`] and pushed to the inbound channel; lines that
/// are not valid JSON objects are skipped.
pub struct StdioTransport {
    outbound: mpsc::UnboundedSender<String>,
    next_client_id: AtomicI32,
    cancel: CancellationToken,
}

impl StdioTransport {
    /// Spawn the bridge and its reader/writer tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        program: &str,
        args: &[String],
        inbound: mpsc::Sender<Message>,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Spawn {
                program: program.to_owned(),
                reason: e.to_string(),
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                return Err(Error::Spawn {
                    program: program.to_owned(),
                    reason: "bridge stdio was not captured".into(),
                });
            }
        };

        tracing::info!(program, "bridge process started");

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(stdin, outbound_rx, cancel.clone()));
        tokio::spawn(read_loop(child, stdout, inbound, cancel.clone()));

        Ok(Self {
            outbound,
            next_client_id: AtomicI32::new(1),
            cancel,
        })
    }

    /// Stop the reader/writer tasks and kill the bridge.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Transport for StdioTransport {
    fn create_client_id(&self) -> ClientId {
        ClientId::new(self.next_client_id.fetch_add(1, Ordering::Relaxed))
    }

    fn submit(&self, client_id: ClientId, request: &Request) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Closed);
        }
        tracing::trace!(%client_id, kind = request.kind(), extra = request.extra(), "submit");
        self.outbound
            .send(request.to_json(client_id))
            .map_err(|_| Error::Closed)
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn write_loop(
    mut stdin: ChildStdin,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            line = outbound.recv() => {
                let Some(mut line) = line else { break };
                line.push('\n');
                let written = async {
                    stdin.write_all(line.as_bytes()).await?;
                    stdin.flush().await
                }
                .await;
                if let Err(e) = written {
                    tracing::warn!(error = %e, "bridge stdin closed");
                    break;
                }
            }
        }
    }
    tracing::debug!("bridge writer exiting");
}

async fn read_loop(
    mut child: Child,
    stdout: ChildStdout,
    inbound: mpsc::Sender<Message>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match Message::from_json(&line) {
                            Ok(message) => {
                                if inbound.send(message).await.is_err() {
                                    tracing::debug!("inbound receiver dropped");
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "skipping unparseable bridge line");
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::info!("bridge stdout closed");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "bridge read failed");
                        break;
                    }
                }
            }
        }
    }

    cancel.cancel();
    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "bridge already exited");
    }
    tracing::debug!("bridge reader exiting");
}
