/*!
 * Spawn Primitive
 * Turns a command spec plus options into a live OS process and its pipe fds
 */

use super::types::{CommandSpec, SpawnOptions};
use crate::core::errors::{PipeError, ProcessError, ProcessResult};
use crate::core::types::{Descriptor, Pid};
use crate::pipes::PipeMode;
use std::fs::File;
use std::os::fd::OwnedFd;
use std::process::{Child, Command, Stdio};

/// Everything a successful spawn hands back to the caller
#[derive(Debug)]
pub(crate) struct SpawnRecord {
    pub child: Child,
    pub pid: Pid,
    pub pipes: Vec<(Descriptor, File)>,
}

/// Spawn the process described by `command` and `options`
///
/// Only descriptors 0-2 can be piped (`std::process` portability); higher
/// descriptors are accepted solely with `PipeMode::Inherit`.
pub(crate) fn spawn(command: &CommandSpec, options: &SpawnOptions) -> ProcessResult<SpawnRecord> {
    if command.is_empty() {
        return Err(ProcessError::SpawnFailed("empty command".to_string()));
    }

    let mut cmd = match command {
        CommandSpec::Line(line) => {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(line);
            cmd
        }
        CommandSpec::Argv(argv) => {
            let mut cmd = Command::new(&argv[0]);
            cmd.args(&argv[1..]);
            cmd
        }
    };

    if let Some(dir) = &options.working_dir {
        cmd.current_dir(dir);
    }

    // A provided environment replaces the inherited one entirely
    if let Some(env) = &options.env {
        cmd.env_clear();
        for (name, value) in env.iter() {
            cmd.env(name, value);
        }
    }

    for (descriptor, mode) in options.descriptors.iter() {
        if descriptor > 2 {
            if mode != PipeMode::Inherit {
                return Err(PipeError::UnsupportedDescriptor(descriptor).into());
            }
            continue;
        }
        let stdio = match (descriptor, mode) {
            (_, PipeMode::Inherit) => Stdio::inherit(),
            (0, PipeMode::Write) | (1 | 2, PipeMode::Read) => Stdio::piped(),
            (descriptor, mode) => {
                return Err(ProcessError::SpawnFailed(format!(
                    "descriptor {} does not support mode {:?}",
                    descriptor, mode
                )))
            }
        };
        match descriptor {
            0 => cmd.stdin(stdio),
            1 => cmd.stdout(stdio),
            _ => cmd.stderr(stdio),
        };
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| ProcessError::SpawnFailed(format!("{}: {}", command, e)))?;
    let pid = child.id();

    let mut pipes = Vec::new();
    if let Some(stdin) = child.stdin.take() {
        pipes.push((0, File::from(OwnedFd::from(stdin))));
    }
    if let Some(stdout) = child.stdout.take() {
        pipes.push((1, File::from(OwnedFd::from(stdout))));
    }
    if let Some(stderr) = child.stderr.take() {
        pipes.push((2, File::from(OwnedFd::from(stderr))));
    }

    Ok(SpawnRecord { child, pid, pipes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::DescriptorSpec;

    #[test]
    fn test_spawn_provides_declared_pipes() {
        let options = SpawnOptions::default();
        let mut record = spawn(&CommandSpec::from("true"), &options).unwrap();

        assert!(record.pid > 0);
        let descriptors: Vec<_> = record.pipes.iter().map(|(d, _)| *d).collect();
        assert_eq!(descriptors, vec![0, 1, 2]);

        record.child.wait().unwrap();
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let err = spawn(&CommandSpec::from(""), &SpawnOptions::default()).unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed(_)));
    }

    #[test]
    fn test_missing_executable_is_fatal() {
        let command = CommandSpec::Argv(vec!["definitely-not-a-real-binary".to_string()]);
        let err = spawn(&command, &SpawnOptions::default()).unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed(_)));
    }

    #[test]
    fn test_high_descriptor_pipe_is_unsupported() {
        let options = SpawnOptions::default()
            .with_descriptors(DescriptorSpec::default().with(3, PipeMode::Read));
        let err = spawn(&CommandSpec::from("true"), &options).unwrap_err();
        assert_eq!(err, ProcessError::Pipe(PipeError::UnsupportedDescriptor(3)));
    }
}
