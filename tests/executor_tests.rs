use hogwatch::executor::{KillOutcome, ProcessKiller, SignalKiller};
use std::process::Command;

#[test]
fn test_terminate_running_child() {
    let mut child = Command::new("sleep").arg("30").spawn().unwrap();
    let pid = child.id();

    let outcome = SignalKiller.terminate(pid).unwrap();
    assert_eq!(outcome, KillOutcome::Terminated);

    let status = child.wait().unwrap();
    assert!(!status.success(), "child should have died to the signal");
}

#[test]
fn test_terminate_reaped_child_is_already_gone() {
    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();

    let outcome = SignalKiller.terminate(pid).unwrap();
    assert_eq!(outcome, KillOutcome::AlreadyGone);
}
