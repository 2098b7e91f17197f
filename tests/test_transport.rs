#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use upi_extract::completion::{wait_for_compute, Reason};
use upi_extract::config::{CompletionPolicy, SessionConfig, Timeouts};
use upi_extract::engine::Queries;
use upi_extract::error::ExtractError;
use upi_extract::transport::Session;

/// A tiny stand-in for the engine, driven by `sh`.
const FAKE_ENGINE: &str = r#"
END=""
while IFS= read -r line; do
  case "$line" in
    set_end_string*)
      END="${line#set_end_string }"
      echo "$line"
      echo "set_end_string ok"
      echo "$END" ;;
    is_ready)
      echo "is_ready"
      echo "SOLVER: warming up"
      echo ""
      echo "is_ready ok!"
      echo "$END" ;;
    show_effective_stack)
      echo "97.5"
      echo "$END" ;;
    stall)
      sleep 5 ;;
    go)
      echo "go ok!"
      echo "SOLVER: started"
      echo "Exploitable for: 1.5"
      echo "Exploitable for: 0.4"
      echo "SOLVER: stopped (required accuracy reached)" ;;
    dump_tree*)
      target=$(echo "$line" | cut -d '"' -f 2)
      : > "$target" ;;
    exit)
      exit 0 ;;
    *)
      echo "ERROR: unknown command $line"
      echo "$END" ;;
  esac
done
"#;

fn fake_engine(dir: &Path) -> SessionConfig {
    let script = dir.join("engine.sh");
    fs::write(&script, FAKE_ENGINE).unwrap();
    SessionConfig {
        executable: PathBuf::from("/bin/sh"),
        args: vec![script.display().to_string()],
        working_dir: dir.to_path_buf(),
        settle_secs: 0.0,
        shutdown_grace_secs: 0.5,
        ..SessionConfig::default()
    }
}

fn started(dir: &Path) -> Session {
    let session = Session::new(fake_engine(dir), Duration::from_secs(5));
    session.start().unwrap();
    session
}

#[test]
fn test_call_filters_echo_progress_and_blanks() {
    let dir = tempfile::tempdir().unwrap();
    let session = started(dir.path());
    let lines = session.call("is_ready", Duration::from_secs(5)).unwrap();
    assert_eq!(lines, vec!["is_ready ok!"]);
    session.close().unwrap();
}

#[test]
fn test_queries_over_a_real_process() {
    let dir = tempfile::tempdir().unwrap();
    let session = started(dir.path());
    let timeouts = Timeouts::default();
    let queries = Queries::new(&session, &timeouts);
    assert!(queries.is_ready().unwrap());
    assert_eq!(queries.effective_stack().unwrap(), 97.5);
    assert!(queries.load_tree(Path::new("missing.cfr")).is_err());
    // The session survives an engine-level error.
    assert!(queries.is_ready().unwrap());
}

#[test]
fn test_timeout_poisons_session() {
    let dir = tempfile::tempdir().unwrap();
    let session = started(dir.path());
    match session.call("stall", Duration::from_millis(200)) {
        Err(e @ ExtractError::Timeout { .. }) => assert!(e.poisons_session()),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(matches!(
        session.call("is_ready", Duration::from_secs(1)),
        Err(ExtractError::SessionPoisoned)
    ));
    session.close().unwrap();
}

#[test]
fn test_lifecycle_errors() {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::new(fake_engine(dir.path()), Duration::from_secs(5));
    assert!(matches!(
        session.call("is_ready", Duration::from_secs(1)),
        Err(ExtractError::NotStarted)
    ));
    session.start().unwrap();
    assert!(session.is_started());
    assert!(matches!(session.start(), Err(ExtractError::AlreadyStarted)));

    session.close().unwrap();
    session.close().unwrap();
    assert!(!session.is_started());
    assert!(matches!(
        session.call("is_ready", Duration::from_secs(1)),
        Err(ExtractError::NotStarted)
    ));
}

#[test]
fn test_launch_failure() {
    let config = SessionConfig {
        executable: PathBuf::from("/nonexistent/engine"),
        settle_secs: 0.0,
        ..SessionConfig::default()
    };
    let session = Session::new(config, Duration::from_secs(1));
    assert!(matches!(session.start(), Err(ExtractError::Launch { .. })));
}

#[test]
fn test_stream_then_raw_dump() {
    let dir = tempfile::tempdir().unwrap();
    let session = started(dir.path());
    let policy = CompletionPolicy {
        tick_secs: 0.05,
        ..CompletionPolicy::default()
    };

    let stream = session.stream("go").unwrap();
    let done = wait_for_compute(&stream, &policy).unwrap();
    assert!(matches!(done.reason, Reason::StopPhrase(_)));
    drop(stream);

    // The reader now belongs to the stream.
    assert!(matches!(
        session.call("is_ready", Duration::from_secs(1)),
        Err(ExtractError::SessionPoisoned)
    ));

    let dump = dir.path().join("solved.cfr");
    session
        .send_raw(&format!("dump_tree \"{}\" no_rivers", dump.display()))
        .unwrap();
    session.close().unwrap();
    assert!(dump.exists());
}
