use std::process::{Command, Stdio};

use plugin_core::{platform_process_control, ChildProcess};

use crate::error::LaunchError;

/// Starts `command` with stdout and stderr captured.
///
/// With `shell` set the command line goes through the platform shell
/// (`sh -c` / `cmd /C`) unmodified; it is trusted input. Otherwise it is split
/// on whitespace and executed directly. On unix the child leads its own
/// process group so pausing it also pauses whatever the shell started.
pub fn spawn_command(command: &str, shell: bool) -> Result<ChildProcess, LaunchError> {
    let mut cmd = build_command(command, shell)?;
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        command: command.to_string(),
        source,
    })?;

    Ok(ChildProcess::new(child, platform_process_control(cfg!(unix))))
}

fn build_command(command: &str, shell: bool) -> Result<Command, LaunchError> {
    let command = command.trim();
    if command.is_empty() {
        return Err(LaunchError::InvalidRequest("No command given.".to_string()));
    }

    if shell {
        let cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        };
        return Ok(cmd);
    }

    let mut parts = command.split_whitespace();
    // Non-empty after trim, so there is always a program.
    let program = parts.next().unwrap_or(command);
    let mut cmd = Command::new(program);
    cmd.args(parts);
    Ok(cmd)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use plugin_core::CancelSignal;
    use std::io::Read;
    use std::time::Duration;

    #[test]
    fn shell_commands_support_operators() {
        let process = spawn_command("echo Hello && echo World", true).unwrap();
        process.wait(Some(Duration::from_secs(5)), &CancelSignal::new()).unwrap();

        let mut out = String::new();
        process.take_stdout().unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "Hello\nWorld\n");
    }

    #[test]
    fn direct_mode_runs_program_with_arguments() {
        let process = spawn_command("echo direct mode", false).unwrap();
        process.wait(Some(Duration::from_secs(5)), &CancelSignal::new()).unwrap();

        let mut out = String::new();
        process.take_stdout().unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out.trim(), "direct mode");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = spawn_command("definitely-not-a-real-binary-4242", false).unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
        assert_eq!(err.kind(), "spawn_error");
    }

    #[test]
    fn blank_command_is_rejected() {
        assert!(matches!(spawn_command("   ", true), Err(LaunchError::InvalidRequest(_))));
    }

    #[test]
    fn shell_child_can_be_paused_as_a_group() {
        let process = spawn_command("sleep 0.2; echo done", true).unwrap();
        process.pause().unwrap();
        std::thread::sleep(Duration::from_millis(400));
        assert!(!process.has_exited());
        process.resume().unwrap();
        let status = process.wait(Some(Duration::from_secs(5)), &CancelSignal::new()).unwrap();
        assert!(status.unwrap().success());
    }
}
