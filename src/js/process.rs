// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Sandbox processes
//!
//! The host re-executes a kuriiri binary with the `sandbox` command and
//! talks to it over stdin/stdout, one JSON message per line. The first line
//! the child reads is the job; after that it reads host replies and writes
//! sandbox messages. Killing the child is the only way to stop a script that
//! never yields, so the host owns it through a handle that kills on drop.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use super::message::{HostMessage, SandboxMessage};
use super::sandbox::{self, SandboxJob};

/// Command-line verb that turns the binary into a sandbox
pub const SANDBOX_COMMAND: &str = "sandbox";

/// Start a sandbox process for `job`.
///
/// Messages the child writes go to `outbox`; messages sent on `inbox` are
/// written to the child. Both pumps stop when the child's pipes close.
pub(crate) fn spawn(
    program: &Path,
    job: &SandboxJob,
    outbox: UnboundedSender<SandboxMessage>,
    inbox: UnboundedReceiver<HostMessage>,
) -> io::Result<Child> {
    let mut child = Command::new(program)
        .arg(SANDBOX_COMMAND)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "sandbox stdin unavailable"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "sandbox stdout unavailable"))?;

    let first = format!("{}\n", serde_json::to_string(job)?);
    tokio::spawn(write_replies(stdin, first, inbox));
    tokio::spawn(read_messages(stdout, outbox));

    debug!(pid = ?child.id(), "Sandbox process started");
    Ok(child)
}

async fn write_replies(
    mut stdin: ChildStdin,
    first: String,
    mut inbox: UnboundedReceiver<HostMessage>,
) {
    if let Err(e) = stdin.write_all(first.as_bytes()).await {
        debug!(error = %e, "Sandbox stdin closed before the job was sent");
        return;
    }
    while let Some(reply) = inbox.recv().await {
        let line = match serde_json::to_string(&reply) {
            Ok(json) => format!("{}\n", json),
            Err(e) => {
                warn!(error = %e, "Failed to encode host reply");
                continue;
            }
        };
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            debug!(error = %e, "Sandbox stdin closed");
            break;
        }
    }
}

async fn read_messages(stdout: ChildStdout, outbox: UnboundedSender<SandboxMessage>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match serde_json::from_str::<SandboxMessage>(&line) {
                Ok(message) => {
                    if outbox.send(message).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "Malformed sandbox output"),
            },
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Sandbox stdout closed");
                break;
            }
        }
    }
}

/// Serve one script over stdin/stdout. Entry point of a sandbox process.
///
/// Call this from a plain `main`, outside any tokio runtime.
pub fn serve() -> io::Result<()> {
    let mut first = String::new();
    if io::stdin().lock().read_line(&mut first)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "no sandbox job on stdin",
        ));
    }
    let job: SandboxJob = serde_json::from_str(&first)?;

    let (replies, inbox) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("sandbox-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match serde_json::from_str::<HostMessage>(&line) {
                    Ok(reply) => {
                        if replies.send(reply).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Malformed host reply"),
                }
            }
        })?;

    let (outbox, mut outgoing) = mpsc::unbounded_channel::<SandboxMessage>();
    let writer = std::thread::Builder::new()
        .name("sandbox-stdout".to_string())
        .spawn(move || -> io::Result<()> {
            let mut stdout = io::stdout().lock();
            while let Some(message) = outgoing.blocking_recv() {
                serde_json::to_writer(&mut stdout, &message)?;
                stdout.write_all(b"\n")?;
                stdout.flush()?;
            }
            Ok(())
        })?;

    sandbox::execute(job, outbox, inbox, Arc::new(AtomicBool::new(false)));

    writer
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "sandbox writer panicked"))?
}
