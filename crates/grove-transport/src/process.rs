use std::io::{Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use crate::{Transport, TransportError};

/// A peer running as a child process, talking over its stdin and stdout.
pub struct ProcessTransport {
    program: String,
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
}

impl ProcessTransport {
    /// Spawn `command` with piped standard streams.
    pub fn spawn(mut command: Command) -> Result<Self, TransportError> {
        let program = command.get_program().to_string_lossy().into_owned();
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TransportError::ConnectionFailed(format!("failed to spawn {program}: {e}")))?;

        let missing = || TransportError::ConnectionFailed(format!("{program}: stdio not captured"));
        let stdin = child.stdin.take().ok_or_else(missing)?;
        let stdout = child.stdout.take().ok_or_else(missing)?;
        // Drained on a thread so a chatty peer cannot block on a full pipe.
        let stderr = child.stderr.take().map(|mut err| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = err.read_to_string(&mut text);
                text
            })
        });
        tracing::debug!(%program, pid = child.id(), "spawned peer");
        Ok(Self {
            program,
            child,
            stdin,
            stdout,
            stderr,
        })
    }

    /// Run an upload-pack program against `path`. `program` may carry
    /// leading arguments, for example `grove upload-pack`.
    pub fn upload_pack(program: &str, path: &str) -> Result<Self, TransportError> {
        let mut words = program.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| TransportError::ConnectionFailed("empty upload-pack program".into()))?;
        let mut command = Command::new(name);
        command.args(words).arg(path);
        Self::spawn(command)
    }
}

impl Transport for ProcessTransport {
    fn reader(&mut self) -> &mut dyn Read {
        &mut self.stdout
    }

    fn writer(&mut self) -> &mut dyn Write {
        &mut self.stdin
    }

    fn close(self: Box<Self>) -> Result<(), TransportError> {
        let ProcessTransport {
            program,
            mut child,
            stdin,
            stderr,
            ..
        } = *self;
        drop(stdin);
        let status = child.wait()?;
        let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();
        if status.success() {
            return Ok(());
        }
        Err(TransportError::ProcessFailed {
            program,
            code: status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        })
    }
}
