/*!
 * Process Lifecycle Tests
 * Tests for handle state transitions, results, aborts, and spawn options
 */

use future_process::{
    CommandSpec, DescriptorSpec, Environment, PipeError, PipeMode, ProcessError, ProcessStatus,
    Shell, Signal, SpawnOptions,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

const WAIT: Option<Duration> = Some(Duration::from_secs(10));

#[test]
fn test_successful_run_reports_exit_code_zero() {
    let shell = Shell::new();
    let handle = shell.start_process("true", SpawnOptions::new()).unwrap();

    let result = handle.result();
    assert_eq!(result.exit_code(WAIT).unwrap(), Some(0));
    assert_eq!(handle.status(false), ProcessStatus::Exited);
}

#[test]
fn test_exit_code_is_preserved() {
    let shell = Shell::new();
    let handle = shell.start_process("exit 42", SpawnOptions::new()).unwrap();

    assert_eq!(handle.result().exit_code(WAIT).unwrap(), Some(42));
}

#[test]
fn test_signaled_process_has_no_exit_code() {
    let shell = Shell::new();
    let handle = shell.start_process("kill -9 $$", SpawnOptions::new()).unwrap();

    assert_eq!(handle.result().exit_code(WAIT).unwrap(), None);
    assert_eq!(handle.status(false), ProcessStatus::Exited);
}

#[test]
fn test_wait_blocks_until_started_not_exited() {
    let shell = Shell::new();
    let handle = shell.start_process("sleep 2", SpawnOptions::new()).unwrap();

    handle.wait(WAIT).unwrap();
    assert_eq!(handle.status(true), ProcessStatus::Running);
    assert!(handle.pid().is_some());

    handle.abort(None, Some(Signal::SIGKILL));
    handle.result().wait(WAIT).unwrap();
}

#[test]
fn test_stdout_round_trip_through_cat() {
    let shell = Shell::new();
    let handle = shell.start_process(CommandSpec::Argv(vec!["cat".into()]), SpawnOptions::new()).unwrap();

    handle.write_to_buffer(0, b"hello stdin\n").unwrap();
    handle.close_descriptor(0).unwrap();

    let result = handle.result();
    result.wait(WAIT).unwrap();
    assert_eq!(result.read_from_buffer(1).unwrap().as_ref(), b"hello stdin\n");
}

#[test]
fn test_stderr_is_buffered_separately() {
    let shell = Shell::new();
    let handle = shell.start_process("echo out; echo err >&2", SpawnOptions::new()).unwrap();

    let result = handle.result();
    result.wait(WAIT).unwrap();
    assert_eq!(result.read_from_buffer(1).unwrap().as_ref(), b"out\n");
    assert_eq!(result.read_from_buffer(2).unwrap().as_ref(), b"err\n");
}

#[test]
fn test_stream_contents_block_until_exit() {
    let shell = Shell::new();
    let handle = shell.start_process("sleep 0.2; echo late", SpawnOptions::new()).unwrap();

    let output = handle.result().stream(1).contents(WAIT).unwrap();
    assert_eq!(output.as_ref(), b"late\n");
    assert_eq!(handle.status(false), ProcessStatus::Exited);
}

#[test]
fn test_stream_of_failed_process_stays_readable() {
    let shell = Shell::new();
    let handle = shell.start_process("echo partial; exit 7", SpawnOptions::new()).unwrap();

    let output = handle.result().stream(1).contents(WAIT).unwrap();
    assert_eq!(output.as_ref(), b"partial\n");
    assert_eq!(handle.result().exit_code(WAIT).unwrap(), Some(7));
}

#[test]
fn test_buffered_reads_are_destructive() {
    let shell = Shell::new();
    let handle = shell.start_process("echo once", SpawnOptions::new()).unwrap();

    let result = handle.result();
    result.wait(WAIT).unwrap();
    assert_eq!(result.read_from_buffer(1).unwrap().as_ref(), b"once\n");
    assert!(result.read_from_buffer(1).unwrap().is_empty());
}

#[test]
fn test_quiet_abort_resolves_with_no_exit_code() {
    let shell = Shell::new();
    let handle = shell.start_process("sleep 5", SpawnOptions::new()).unwrap();
    handle.wait(WAIT).unwrap();

    handle.abort(None, Some(Signal::SIGKILL));
    assert_eq!(handle.status(false), ProcessStatus::Aborted);
    assert_eq!(handle.result().exit_code(WAIT).unwrap(), None);
}

#[test]
fn test_abort_with_error_rejects_the_result() {
    let shell = Shell::new();
    let handle = shell.start_process("sleep 5", SpawnOptions::new()).unwrap();
    handle.wait(WAIT).unwrap();

    let error = ProcessError::Aborted("operator request".to_string());
    handle.abort(Some(error.clone()), Some(Signal::SIGKILL));

    assert_eq!(handle.result().exit_code(WAIT).unwrap_err(), error);
    // output produced before the abort stays readable
    assert!(handle.read_from_buffer(1).unwrap().is_empty());
}

#[test]
fn test_abort_after_exit_changes_nothing() {
    let shell = Shell::new();
    let handle = shell.start_process("exit 9", SpawnOptions::new()).unwrap();
    let result = handle.result();
    result.wait(WAIT).unwrap();

    handle.abort(Some(ProcessError::Aborted("late".to_string())), None);
    assert_eq!(handle.status(false), ProcessStatus::Exited);
    assert_eq!(result.exit_code(WAIT).unwrap(), Some(9));
}

#[test]
fn test_time_limit_aborts_the_process() {
    let shell = Shell::new();
    let handle = shell.start_process(
        "sleep 10",
        SpawnOptions::new().with_timeout(Duration::from_millis(100)),
    ).unwrap();

    assert_eq!(
        handle.result().exit_code(WAIT).unwrap_err(),
        ProcessError::TimeLimitExceeded
    );
    assert_eq!(handle.status(false), ProcessStatus::Aborted);
}

#[test]
fn test_fast_process_beats_its_time_limit() {
    let shell = Shell::new();
    let handle = shell.start_process(
        "echo quick",
        SpawnOptions::new().with_timeout(Duration::from_secs(10)),
    ).unwrap();

    assert_eq!(handle.result().exit_code(WAIT).unwrap(), Some(0));
}

#[test]
fn test_detach_releases_a_running_process() {
    let shell = Shell::new();
    let handle = shell.start_process("sleep 5", SpawnOptions::new()).unwrap();
    handle.wait(WAIT).unwrap();
    let pid = handle.pid().unwrap();

    handle.detach().unwrap();
    assert_eq!(handle.status(false), ProcessStatus::Detached);
    assert_eq!(handle.result().exit_code(WAIT).unwrap(), None);

    // the process is no longer ours but is still alive
    assert!(nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok());
    let _ = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[test]
fn test_detach_is_rejected_after_exit() {
    let shell = Shell::new();
    let handle = shell.start_process("true", SpawnOptions::new()).unwrap();
    handle.result().wait(WAIT).unwrap();

    assert!(matches!(
        handle.detach(),
        Err(ProcessError::InvalidState(_))
    ));
}

#[test]
fn test_spawn_failure_is_fatal_at_construction() {
    let shell = Shell::new();
    let err = shell
        .start_process(
            CommandSpec::Argv(vec!["no-such-binary-exists".into()]),
            SpawnOptions::new(),
        )
        .unwrap_err();

    assert!(matches!(err, ProcessError::SpawnFailed(_)));
    assert_eq!(shell.active_count(), 0);
}

#[test]
fn test_deferred_spawn_failure_rejects_both_futures() {
    let shell = Shell::new();
    shell.set_process_limit(Some(1));
    let blocker = shell.start_process("sleep 0.2", SpawnOptions::new()).unwrap();
    let handle = shell
        .start_process(
            CommandSpec::Argv(vec!["no-such-binary-exists".into()]),
            SpawnOptions::new(),
        )
        .unwrap();

    assert!(matches!(
        handle.wait(WAIT).unwrap_err(),
        ProcessError::SpawnFailed(_)
    ));
    assert!(matches!(
        handle.result().exit_code(WAIT).unwrap_err(),
        ProcessError::SpawnFailed(_)
    ));
    assert_eq!(handle.status(false), ProcessStatus::Error);
    blocker.result().wait(WAIT).unwrap();
}

#[test]
fn test_environment_replaces_inherited_variables() {
    let shell = Shell::new();
    let env = Environment::new()
        .with("GREETING", "bonjour")
        .with("PATH", std::env::var("PATH").unwrap_or_default());
    let handle = shell.start_process(
        "echo \"$GREETING:$HOME\"",
        SpawnOptions::new().with_env(env),
    ).unwrap();

    let output = handle.result().stream(1).contents(WAIT).unwrap();
    assert_eq!(output.as_ref(), b"bonjour:\n");
}

#[test]
fn test_working_directory_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let shell = Shell::new();
    let handle = shell.start_process("pwd", SpawnOptions::new().with_working_dir(dir.path())).unwrap();

    let output = handle.result().stream(1).contents(WAIT).unwrap();
    let reported = String::from_utf8_lossy(&output);
    let canonical = dir.path().canonicalize().unwrap();
    assert_eq!(reported.trim(), canonical.to_string_lossy());
}

#[test]
fn test_inherited_descriptors_are_not_buffered() {
    let shell = Shell::new();
    let handle = shell.start_process(
        "true",
        SpawnOptions::new().with_descriptors(DescriptorSpec::inherit_all()),
    ).unwrap();
    handle.result().wait(WAIT).unwrap();

    assert_eq!(
        handle.read_from_buffer(1).unwrap_err(),
        ProcessError::Pipe(PipeError::UnknownDescriptor(1))
    );
}

#[test]
fn test_high_descriptors_cannot_be_piped() {
    let shell = Shell::new();
    let err = shell
        .start_process(
            "true",
            SpawnOptions::new().with_descriptors(DescriptorSpec::stdio().with(3, PipeMode::Read)),
        )
        .unwrap_err();

    assert_eq!(err, ProcessError::Pipe(PipeError::UnsupportedDescriptor(3)));
}

#[test]
fn test_then_chains_onto_the_result() {
    let shell = Shell::new();
    let handle = shell.start_process("exit 5", SpawnOptions::new()).unwrap();

    let summary = handle
        .result()
        .then(|result| format!("code={:?}", result.exit_code(None).unwrap()));
    assert_eq!(summary.value(WAIT).unwrap(), "code=Some(5)");
}

#[test]
fn test_result_then_fires_after_error_abort() {
    let shell = Shell::new();
    let handle = shell.start_process("sleep 5", SpawnOptions::new()).unwrap();
    handle.wait(WAIT).unwrap();

    let outcome = handle
        .result()
        .then(|result| result.exit_code(None).unwrap_err());
    handle.abort(
        Some(ProcessError::Aborted("operator".into())),
        Some(Signal::SIGKILL),
    );

    assert_eq!(
        outcome.value(WAIT).unwrap(),
        ProcessError::Aborted("operator".into())
    );
}

#[test]
fn test_stream_then_fires_after_time_limit() {
    let shell = Shell::new();
    let handle = shell.start_process(
        "echo partial; sleep 10",
        SpawnOptions::new().with_timeout(Duration::from_millis(100)),
    ).unwrap();

    let collected = handle
        .result()
        .stream(1)
        .then(|stream| stream.contents(None).unwrap());
    assert_eq!(collected.value(WAIT).unwrap().as_ref(), b"partial\n");
}
