//! Deciding when a streamed compute command has finished.
//!
//! The engine never terminates the output of `go` with the sentinel, so
//! completion is inferred from stop phrases, the convergence metric, and
//! how long the output has been quiet. `assess` holds the decision and is
//! pure; `wait_for_compute` feeds it from a live stream.

use std::fmt;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use crate::config::CompletionPolicy;
use crate::error::{ExtractError, ExtractResult};
use crate::transport::{LineStream, PROGRESS_PREFIX};

#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    StopPhrase(String),
    Metric(f64),
    Idle(Duration),
    StreamClosed,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reason::StopPhrase(line) => write!(f, "engine reported '{}'", line),
            Reason::Metric(value) => write!(f, "exploitability {:.6} reached", value),
            Reason::Idle(quiet) => write!(f, "no output for {:.0}s", quiet.as_secs_f64()),
            Reason::StreamClosed => write!(f, "output closed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Continue,
    Converged(Reason),
    TimedOut,
}

/// Reads the value following `prefix`, e.g. `0.08` from
/// `"SOLVER: Exploitable for: 0.08 (...)"`.
pub fn parse_metric(line: &str, prefix: &str) -> Option<f64> {
    let (_, rest) = line.split_once(prefix)?;
    rest.split_whitespace().next()?.parse().ok()
}

fn is_stop_line(policy: &CompletionPolicy, line: &str) -> bool {
    policy.stop_phrases.iter().any(|p| line.contains(p.as_str()))
        && !line.contains(policy.stop_exclusion.as_str())
}

/// Decides from elapsed time, idle time and the lines seen since the compute
/// was acknowledged. Signals in the output win over the clocks.
pub fn assess(
    policy: &CompletionPolicy,
    elapsed: Duration,
    idle: Duration,
    recent: &[String],
) -> Verdict {
    for line in recent {
        if is_stop_line(policy, line) {
            return Verdict::Converged(Reason::StopPhrase(line.trim().to_string()));
        }
        if let Some(value) = parse_metric(line, &policy.metric_prefix) {
            if value <= policy.threshold {
                return Verdict::Converged(Reason::Metric(value));
            }
        }
    }
    if elapsed > policy.hard_ceiling() {
        return Verdict::TimedOut;
    }
    if idle > policy.idle_ceiling() {
        return Verdict::Converged(Reason::Idle(idle));
    }
    Verdict::Continue
}

/// Tracks one compute run. Lines before the start acknowledgement are
/// logged but never examined for completion signals.
pub struct CompletionWatch<'p> {
    policy: &'p CompletionPolicy,
    acknowledged: bool,
    recent: Vec<String>,
    started: Instant,
    last_output: Instant,
}

impl<'p> CompletionWatch<'p> {
    pub fn new(policy: &'p CompletionPolicy, now: Instant) -> Self {
        CompletionWatch {
            policy,
            acknowledged: false,
            recent: Vec::with_capacity(policy.window),
            started: now,
            last_output: now,
        }
    }

    pub fn acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn observe(&mut self, line: &str, now: Instant) {
        self.last_output = now;
        if line.contains(self.policy.start_ack.as_str()) {
            self.acknowledged = true;
            log::info!("compute started");
            return;
        }
        if !self.acknowledged {
            log::debug!("engine: {}", line);
            return;
        }

        if line.contains(PROGRESS_PREFIX) || line.contains(self.policy.metric_prefix.as_str()) {
            log::info!(
                "engine: {} ({}s)",
                line,
                now.duration_since(self.started).as_secs()
            );
        } else {
            log::debug!("engine: {}", line);
        }
        if self.recent.len() >= self.policy.window.max(1) {
            self.recent.remove(0);
        }
        self.recent.push(line.to_string());
    }

    pub fn verdict_at(&self, now: Instant) -> Verdict {
        assess(
            self.policy,
            now.saturating_duration_since(self.started),
            now.saturating_duration_since(self.last_output),
            &self.recent,
        )
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub reason: Reason,
    pub elapsed: Duration,
}

/// Consumes `stream` until the compute is judged finished. Exceeding the
/// hard ceiling is an error; a read error on the stream is reported as I/O.
pub fn wait_for_compute(stream: &LineStream, policy: &CompletionPolicy) -> ExtractResult<Completion> {
    let mut watch = CompletionWatch::new(policy, Instant::now());
    loop {
        match stream.lines.recv_timeout(policy.tick()) {
            Ok(line) => watch.observe(&line, Instant::now()),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                if let Ok(e) = stream.errors.try_recv() {
                    return Err(e.into());
                }
                let elapsed = watch.elapsed_at(Instant::now());
                log::info!("engine output closed after {}s", elapsed.as_secs());
                return Ok(Completion {
                    reason: Reason::StreamClosed,
                    elapsed,
                });
            }
        }
        if let Ok(e) = stream.errors.try_recv() {
            return Err(e.into());
        }

        let now = Instant::now();
        match watch.verdict_at(now) {
            Verdict::Continue => {}
            Verdict::Converged(reason) => {
                if !watch.acknowledged() {
                    log::warn!("compute judged finished without '{}'", policy.start_ack);
                }
                let elapsed = watch.elapsed_at(now);
                log::info!("compute finished: {} ({}s)", reason, elapsed.as_secs());
                return Ok(Completion { reason, elapsed });
            }
            Verdict::TimedOut => return Err(ExtractError::ComputeTimeout(policy.hard_ceiling())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_follows_prefix() {
        assert_eq!(
            parse_metric("SOLVER: Exploitable for: 0.08 (0.1% of pot)", "Exploitable for:"),
            Some(0.08)
        );
        assert_eq!(parse_metric("Exploitable for:", "Exploitable for:"), None);
        assert_eq!(parse_metric("EV OOP: 3.2", "Exploitable for:"), None);
    }

    #[test]
    fn started_line_is_not_a_stop() {
        let policy = CompletionPolicy::default();
        assert!(!is_stop_line(&policy, "SOLVER: stopped ... started"));
        assert!(is_stop_line(&policy, "SOLVER: stopped"));
    }

    #[test]
    fn window_keeps_latest_lines() {
        let policy = CompletionPolicy {
            window: 2,
            ..CompletionPolicy::default()
        };
        let now = Instant::now();
        let mut watch = CompletionWatch::new(&policy, now);
        watch.observe("go ok!", now);
        for line in ["a", "b", "c"] {
            watch.observe(line, now);
        }
        assert_eq!(watch.recent, vec!["b".to_string(), "c".to_string()]);
    }
}
