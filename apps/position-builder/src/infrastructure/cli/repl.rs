//! Console read loop.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

use crate::application::services::{BuilderError, BuilderHandle};
use crate::domain::position::EditOutcome;
use crate::infrastructure::presentation::render_snapshot;

use super::command::{Command, USAGE};

/// Whether the loop keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplControl {
    /// Read the next line.
    Continue,
    /// Stop reading.
    Quit,
}

/// Run one command against the builder, writing any reply to `out`.
///
/// Leg errors are reported to `out` and are not fatal.
///
/// # Errors
///
/// `Stopped` if the builder task is gone, or an I/O error writing `out`.
pub async fn execute<W: Write>(
    handle: &BuilderHandle,
    command: Command,
    out: &mut W,
) -> anyhow::Result<ReplControl> {
    let reply = match command {
        Command::Add {
            action,
            multiplier,
            key,
        } => handle.add(action, multiplier, key).await.map(|_| None),
        Command::Remove { key } => handle.remove(key).await.map(|_| None),
        Command::Edit { key, field } => {
            handle
                .edit(key, field)
                .await
                .map(|(_, outcome)| match outcome {
                    EditOutcome::Merged { into } => Some(format!("merged into {into}")),
                    EditOutcome::Unchanged => Some("no change".to_string()),
                    EditOutcome::Updated | EditOutcome::Rekeyed { .. } => None,
                })
        }
        Command::Clear => handle.clear().await.map(|_| None),
        Command::Refresh => handle
            .refresh()
            .await
            .map(|requested| (!requested).then(|| "nothing to refresh".to_string())),
        Command::Expirations => handle.expirations().await.map(|dates| {
            let dates: Vec<String> = dates.iter().map(ToString::to_string).collect();
            Some(format!("expirations: {}", dates.join(" ")))
        }),
        Command::Show => handle
            .snapshot()
            .await
            .map(|snapshot| Some(render_snapshot(&snapshot))),
        Command::Json => match handle.snapshot().await {
            Ok(snapshot) => Ok(Some(serde_json::to_string_pretty(&snapshot)?)),
            Err(e) => Err(e),
        },
        Command::Help => Ok(Some(USAGE.to_string())),
        Command::Quit => return Ok(ReplControl::Quit),
    };

    match reply {
        Ok(Some(text)) => writeln!(out, "{}", text.trim_end())?,
        Ok(None) => {}
        Err(BuilderError::Stopped) => return Err(BuilderError::Stopped.into()),
        Err(e) => writeln!(out, "error: {e}")?,
    }
    Ok(ReplControl::Continue)
}

/// Read commands from `input` until EOF, `quit` or cancellation.
///
/// # Errors
///
/// Returns an error if reading `input` fails or the builder stops.
pub async fn run_repl<R, W>(
    handle: BuilderHandle,
    input: R,
    mut out: W,
    cancel: CancellationToken,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            tracing::debug!("Console input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(command) => {
                if execute(&handle, command, &mut out).await? == ReplControl::Quit {
                    break;
                }
            }
            Err(e) => writeln!(out, "error: {e} (try `help`)")?,
        }
    }

    Ok(())
}
