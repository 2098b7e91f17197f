//! Line-oriented command/response exchange with one engine child process.
//!
//! A synchronous call writes one command, then hands the output reader to a
//! short-lived worker thread that reads up to the sentinel line and sends the
//! reader back together with the collected lines. The caller waits on that
//! reply with a deadline. When the deadline wins, the reader stays with the
//! abandoned worker and the session is poisoned: every later call fails
//! until the session is closed.

use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::config::SessionConfig;
use crate::engine::Engine;
use crate::error::{ExtractError, ExtractResult};

/// Progress chatter the engine interleaves with real output.
pub const PROGRESS_PREFIX: &str = "SOLVER:";

const EXIT_COMMAND: &str = "exit";

type Reader = BufReader<ChildStdout>;

struct Live {
    child: Child,
    stdin: ChildStdin,
    /// `None` once the reader was lost to a timed-out call or a stream.
    reader: Option<Reader>,
}

pub struct Session {
    config: SessionConfig,
    sentinel_timeout: Duration,
    live: Mutex<Option<Live>>,
}

/// Output of a long-running command. `lines` disconnects at end of stream;
/// a read failure is delivered on `errors` just before that.
pub struct LineStream {
    pub lines: Receiver<String>,
    pub errors: Receiver<io::Error>,
}

fn strip_newline(raw: &str) -> &str {
    raw.trim_end_matches(['\n', '\r'])
}

/// Reads until a line equal to `sentinel` or end of stream, dropping blank
/// lines and progress lines.
pub fn read_until_sentinel<R: BufRead>(reader: &mut R, sentinel: &str) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut buf = String::new();
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            return Ok(lines);
        }
        let line = strip_newline(&buf);
        log::trace!("<- {}", line);
        if line == sentinel {
            return Ok(lines);
        }
        if !line.is_empty() && !line.starts_with(PROGRESS_PREFIX) {
            lines.push(line.to_string());
        }
    }
}

impl Session {
    pub fn new(config: SessionConfig, sentinel_timeout: Duration) -> Session {
        Session {
            config,
            sentinel_timeout,
            live: Mutex::new(None),
        }
    }

    fn lock(&self) -> ExtractResult<MutexGuard<'_, Option<Live>>> {
        self.live.lock().map_err(|_| ExtractError::SessionPoisoned)
    }

    pub fn is_started(&self) -> bool {
        self.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Launches the engine, waits for it to settle and installs the sentinel.
    pub fn start(&self) -> ExtractResult<()> {
        {
            let mut guard = self.lock()?;
            if guard.is_some() {
                return Err(ExtractError::AlreadyStarted);
            }
            let launch_error = |reason: String| ExtractError::Launch {
                path: self.config.executable.display().to_string(),
                reason,
            };

            let mut child = Command::new(&self.config.executable)
                .args(&self.config.args)
                .current_dir(&self.config.working_dir)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .spawn()
                .map_err(|e| launch_error(e.to_string()))?;

            let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
                let _ = child.kill();
                let _ = child.wait();
                return Err(launch_error("standard pipes unavailable".to_string()));
            };

            log::info!(
                "started engine {} (pid {})",
                self.config.executable.display(),
                child.id()
            );
            thread::sleep(self.config.settle());
            *guard = Some(Live {
                child,
                stdin,
                reader: Some(BufReader::new(stdout)),
            });
        }

        let command = format!("set_end_string {}", self.config.sentinel);
        if let Err(e) = self.call(&command, self.sentinel_timeout) {
            log::warn!("could not set end string: {}", e);
        }
        Ok(())
    }

    /// Sends one command and collects its response lines.
    pub fn call(&self, command: &str, timeout: Duration) -> ExtractResult<Vec<String>> {
        let mut guard = self.lock()?;
        let live = guard.as_mut().ok_or(ExtractError::NotStarted)?;
        let mut reader = live.reader.take().ok_or(ExtractError::SessionPoisoned)?;

        log::debug!("-> {}", command);
        if let Err(e) = writeln!(live.stdin, "{}", command).and_then(|_| live.stdin.flush()) {
            live.reader = Some(reader);
            return Err(e.into());
        }

        let (tx, rx) = mpsc::sync_channel(1);
        let sentinel = self.config.sentinel.clone();
        thread::spawn(move || {
            let outcome = read_until_sentinel(&mut reader, &sentinel);
            let _ = tx.send((reader, outcome));
        });

        match rx.recv_timeout(timeout) {
            Ok((reader, outcome)) => {
                live.reader = Some(reader);
                let mut lines = outcome?;
                if lines.first().is_some_and(|first| first == command) {
                    lines.remove(0);
                }
                Ok(lines)
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("'{}' timed out after {:?}; session poisoned", command, timeout);
                Err(ExtractError::Timeout {
                    command: command.to_string(),
                    timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(ExtractError::SessionPoisoned),
        }
    }

    /// Sends a command whose output is consumed as a stream. The session can
    /// only accept `send_raw` and `close` afterwards.
    pub fn stream(&self, command: &str) -> ExtractResult<LineStream> {
        let mut guard = self.lock()?;
        let live = guard.as_mut().ok_or(ExtractError::NotStarted)?;
        let mut reader = live.reader.take().ok_or(ExtractError::SessionPoisoned)?;

        log::debug!("-> {} (streaming)", command);
        if let Err(e) = writeln!(live.stdin, "{}", command).and_then(|_| live.stdin.flush()) {
            live.reader = Some(reader);
            return Err(e.into());
        }

        let (line_tx, lines) = mpsc::channel();
        let (error_tx, errors) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = String::new();
            loop {
                buf.clear();
                match reader.read_line(&mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        if line_tx.send(strip_newline(&buf).to_string()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = error_tx.send(e);
                        break;
                    }
                }
            }
        });

        Ok(LineStream { lines, errors })
    }

    /// Writes a command without waiting for any response.
    pub fn send_raw(&self, command: &str) -> ExtractResult<()> {
        let mut guard = self.lock()?;
        let live = guard.as_mut().ok_or(ExtractError::NotStarted)?;
        log::debug!("-> {} (no response expected)", command);
        writeln!(live.stdin, "{}", command)?;
        live.stdin.flush()?;
        Ok(())
    }

    /// Asks the engine to exit, then kills it if it is still around.
    /// Closing a session that is not running does nothing.
    pub fn close(&self) -> ExtractResult<()> {
        let mut guard = self.lock()?;
        let Some(mut live) = guard.take() else {
            return Ok(());
        };

        let _ = writeln!(live.stdin, "{}", EXIT_COMMAND).and_then(|_| live.stdin.flush());
        drop(live.stdin);
        thread::sleep(self.config.shutdown_grace());

        match live.child.try_wait() {
            Ok(Some(status)) => log::debug!("engine exited with {}", status),
            _ => {
                if let Err(e) = live.child.kill() {
                    log::debug!("kill failed: {}", e);
                }
                let _ = live.child.wait();
                log::debug!("engine killed");
            }
        }
        Ok(())
    }
}

impl Engine for Session {
    fn call(&self, command: &str, timeout: Duration) -> ExtractResult<Vec<String>> {
        Session::call(self, command, timeout)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("close on drop failed: {}", e);
        }
    }
}
