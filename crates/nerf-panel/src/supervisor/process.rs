use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, TryRecvError};

use super::{JobExit, JobLauncher, JobProcess};
use crate::command::Invocation;
use crate::error::{Error, Result};

const MAX_PENDING_BYTES: usize = 16 * 1024;

/// Runs the argv directly, without a shell, in its own process group.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    env: Vec<(String, String)>,
}

impl ProcessLauncher {
    pub fn new() -> Self {
        // Python tools buffer their output when it is not a tty.
        Self {
            env: vec![("PYTHONUNBUFFERED".into(), "1".into())],
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }
}

impl JobLauncher for ProcessLauncher {
    fn start(&self, invocation: &Invocation) -> Result<Box<dyn JobProcess>> {
        if invocation.program().is_empty() {
            return Err(Error::launch("empty command"));
        }
        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.args());
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        Ok(Box::new(spawn_job(cmd, invocation.program())?))
    }
}

/// Runs the shell form of the command in a new terminal window. The job seen by the
/// supervisor is the terminal process itself; its output is not captured.
#[derive(Debug, Clone)]
pub struct TerminalLauncher {
    candidates: Vec<String>,
}

impl Default for TerminalLauncher {
    fn default() -> Self {
        Self {
            candidates: [
                "x-terminal-emulator",
                "gnome-terminal",
                "konsole",
                "xfce4-terminal",
                "xterm",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl TerminalLauncher {
    pub fn with_candidates(candidates: Vec<String>) -> Self {
        Self { candidates }
    }

    /// First candidate found on `PATH`.
    pub fn find_terminal(&self) -> Option<(String, PathBuf)> {
        let path = std::env::var_os("PATH")?;
        let dirs: Vec<PathBuf> = std::env::split_paths(&path).collect();
        self.candidates.iter().find_map(|name| {
            dirs.iter()
                .map(|d| d.join(name))
                .find(|p| is_executable(p))
                .map(|p| (name.clone(), p))
        })
    }
}

#[cfg(unix)]
fn is_executable(p: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    p.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(p: &Path) -> bool {
    p.is_file()
}

/// Argv that opens `terminal` running `shell_command` under bash, keeping the window open
/// afterwards. The command stays one argv token, so it is never re-quoted.
pub fn terminal_argv(terminal: &str, shell_command: &str) -> Vec<String> {
    let exec_flag = match terminal {
        "gnome-terminal" => "--",
        "xfce4-terminal" => "-x",
        _ => "-e",
    };
    vec![
        terminal.to_string(),
        exec_flag.to_string(),
        "bash".to_string(),
        "-c".to_string(),
        format!("{shell_command}; exec bash"),
    ]
}

impl JobLauncher for TerminalLauncher {
    fn start(&self, invocation: &Invocation) -> Result<Box<dyn JobProcess>> {
        let shell = invocation.to_shell_string();
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "cmd.exe", "/K", shell.as_str()]);
            return Ok(Box::new(spawn_job(cmd, "cmd")?));
        }
        let Some((name, path)) = self.find_terminal() else {
            return Err(Error::launch(
                "no supported terminal emulator found; install one of x-terminal-emulator, gnome-terminal, konsole, xfce4-terminal, xterm",
            ));
        };
        let argv = terminal_argv(&name, &shell);
        let mut cmd = Command::new(path);
        cmd.args(&argv[1..]);
        Ok(Box::new(spawn_job(cmd, &name)?))
    }
}

pub(super) struct OsProcess {
    child: Child,
    pgid: u32,
    rx: mpsc::Receiver<String>,
    exited: bool,
    /// Every reader thread has hit end of file.
    closed: bool,
}

fn spawn_job(mut cmd: Command, program: &str) -> Result<OsProcess> {
    // On unix: own process group, so stop/pause reach the whole subtree.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        unsafe {
            cmd.pre_exec(|| {
                if libc::setpgid(0, 0) != 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    let mut child = cmd
        // A job in its own process group that reads the controlling tty gets SIGTTIN.
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::launch(format!("{program}: {e}")))?;
    let pgid = child.id();

    let (tx, rx) = mpsc::channel::<String>();
    if let Some(out) = child.stdout.take() {
        let tx = tx.clone();
        std::thread::spawn(move || read_output_stream(out, tx));
    }
    if let Some(err) = child.stderr.take() {
        let tx = tx.clone();
        std::thread::spawn(move || read_output_stream(err, tx));
    }
    drop(tx);

    Ok(OsProcess {
        child,
        pgid,
        rx,
        exited: false,
        closed: false,
    })
}

impl JobProcess for OsProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn try_read_line(&mut self) -> Option<String> {
        match self.rx.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    fn output_closed(&self) -> bool {
        self.closed
    }

    fn try_wait(&mut self) -> Result<Option<JobExit>> {
        let status = self
            .child
            .try_wait()
            .map_err(|e| Error::msg(format!("wait failed: {e}")))?;
        Ok(status.map(|s| {
            self.exited = true;
            JobExit { code: s.code() }
        }))
    }

    fn terminate(&mut self) {
        if self.exited {
            return;
        }
        #[cfg(unix)]
        {
            let _ = signal_pgroup(self.pgid, libc::SIGTERM);
            // A suspended group never sees SIGTERM until continued.
            let _ = signal_pgroup(self.pgid, libc::SIGCONT);
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }
    }

    fn suspend(&mut self) -> Result<()> {
        #[cfg(unix)]
        {
            signal_pgroup(self.pgid, libc::SIGSTOP)
                .map_err(|e| Error::msg(format!("pause failed: {e}")))
        }
        #[cfg(not(unix))]
        {
            Err(Error::msg("pause is not supported on this platform"))
        }
    }

    fn resume(&mut self) -> Result<()> {
        #[cfg(unix)]
        {
            signal_pgroup(self.pgid, libc::SIGCONT)
                .map_err(|e| Error::msg(format!("resume failed: {e}")))
        }
        #[cfg(not(unix))]
        {
            Err(Error::msg("resume is not supported on this platform"))
        }
    }
}

#[cfg(unix)]
fn signal_pgroup(pgid: u32, sig: libc::c_int) -> std::io::Result<()> {
    // Negative PID targets the whole process group.
    let rc = unsafe { libc::kill(-(pgid as i32), sig) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

fn read_output_stream<R: Read>(reader: R, tx: mpsc::Sender<String>) {
    let mut r = BufReader::new(reader);
    let mut buf = [0u8; 8192];
    let mut pending = Vec::with_capacity(1024);

    let flush = |pending: &mut Vec<u8>| {
        let line = String::from_utf8_lossy(pending).into_owned();
        pending.clear();
        tx.send(line).is_ok()
    };

    loop {
        let n = match r.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        for b in &buf[..n] {
            // Progress bars redraw with '\r'; each redraw counts as a line.
            if *b == b'\n' || *b == b'\r' {
                if !pending.is_empty() && !flush(&mut pending) {
                    return;
                }
            } else {
                pending.push(*b);
                if pending.len() >= MAX_PENDING_BYTES && !flush(&mut pending) {
                    return;
                }
            }
        }
    }

    if !pending.is_empty() {
        flush(&mut pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminals_get_the_command_as_one_token() {
        let argv = terminal_argv("konsole", "ns-train nerfacto");
        assert_eq!(
            argv,
            ["konsole", "-e", "bash", "-c", "ns-train nerfacto; exec bash"]
        );
        assert_eq!(terminal_argv("gnome-terminal", "x")[1], "--");
        assert_eq!(terminal_argv("xfce4-terminal", "x")[1], "-x");
        assert_eq!(terminal_argv("xterm", "x")[1], "-e");
    }

    #[test]
    fn quotes_and_dollars_in_paths_survive_the_terminal_wrapper() {
        let inv = Invocation::new(vec![
            "ns-process-data".into(),
            "images".into(),
            "--data".into(),
            "/data/say \"hi\" $HOME `x`".into(),
        ]);
        let shell = inv.to_shell_string();
        let argv = terminal_argv("gnome-terminal", &shell);
        assert_eq!(argv.len(), 5);
        assert_eq!(argv[4], format!("{shell}; exec bash"));
        assert!(shell.contains("'/data/say \"hi\" $HOME `x`'"), "{shell}");
    }

    #[test]
    fn output_is_split_on_newlines_and_carriage_returns() {
        let (tx, rx) = mpsc::channel();
        read_output_stream(&b"a\r\nb\rc\n\nd"[..], tx);
        let lines: Vec<String> = rx.iter().collect();
        assert_eq!(lines, ["a", "b", "c", "d"]);
    }

    #[test]
    fn missing_binary_is_a_launch_error() {
        let inv = Invocation::new(vec!["/nonexistent/nerf-panel-test-binary".into()]);
        let err = match ProcessLauncher::new().start(&inv) {
            Ok(_) => panic!("expected spawn failure"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), crate::error::ErrorKind::Launch);
    }

    #[test]
    fn unknown_terminals_are_not_found() {
        let launcher = TerminalLauncher::with_candidates(vec!["no-such-terminal-xyz".into()]);
        assert!(launcher.find_terminal().is_none());
    }
}
