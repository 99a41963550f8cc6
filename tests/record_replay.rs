//! Record-replay round-trip integration test.
//!
//! Records a session against the live process and filesystem adapters, then
//! replays it twice and checks the replayed outputs match what was recorded,
//! failures included.

use std::path::Path;
use std::time::Duration;

use fsfault::config::Settings;
use fsfault::context::ServiceContext;
use fsfault::ports::{ProcessResult, SupervisorError};

#[derive(Debug, PartialEq)]
struct Snapshot {
    echoed: ProcessResult,
    failed: ProcessResult,
    timed_out: (String, String),
    root_exists: bool,
    missing_read: String,
}

fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

async fn exercise_ports(ctx: &ServiceContext) -> Snapshot {
    let echoed = ctx.process.run_bounded(Duration::from_secs(5), &argv(&["echo", "hello"])).await.unwrap();
    let failed = ctx
        .process
        .run_bounded(Duration::from_secs(5), &argv(&["sh", "-c", "echo oops >&2; exit 3"]))
        .await
        .unwrap();
    let timeout = ctx
        .process
        .run_bounded(Duration::from_millis(300), &argv(&["sh", "-c", "echo early; sleep 10"]))
        .await
        .unwrap_err();
    let timed_out = match &timeout {
        SupervisorError::Timeout { partial_output, .. } => {
            (timeout.kind().to_string(), String::from_utf8_lossy(partial_output).into_owned())
        }
        other => panic!("expected a timeout, got {other:?}"),
    };
    let root_exists = ctx.fs.exists(Path::new("/"));
    let missing_read = ctx
        .fs
        .read_to_string(Path::new("/nonexistent/fsfault/plan.yaml"))
        .unwrap_err()
        .to_string();
    Snapshot { echoed, failed, timed_out, root_exists, missing_read }
}

#[tokio::test]
async fn record_then_replay_produces_identical_outputs() {
    let root = std::env::temp_dir().join("fsfault_record_replay_test");
    let _ = std::fs::remove_dir_all(&root);

    // --- Phase 1: Record against live adapters ---
    let (ctx, session) = ServiceContext::recording_at(root.clone(), &Settings::default()).unwrap();
    let recorded = exercise_ports(&ctx).await;
    drop(ctx);
    let dir = session.finish().expect("recording should succeed");

    assert_eq!(recorded.echoed.output_lossy(), "hello\n");
    assert_eq!(recorded.failed.exit_code, 3);
    assert_eq!(recorded.timed_out, ("timeout".to_string(), "early\n".to_string()));
    assert!(recorded.root_exists);

    // --- Phase 2: Replay and verify identical outputs ---
    let replayed = exercise_ports(&ServiceContext::replaying(&dir).unwrap()).await;
    assert_eq!(replayed, recorded);

    // --- Phase 3: Replay a second time for determinism ---
    let again = exercise_ports(&ServiceContext::replaying(&dir).unwrap()).await;
    assert_eq!(again, replayed);

    let _ = std::fs::remove_dir_all(&root);
}
