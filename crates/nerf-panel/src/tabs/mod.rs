//! Per-tab controllers. Each owns its forms, its pending arguments and one supervisor.

use std::net::{Ipv4Addr, TcpListener};
use std::path::PathBuf;

use crate::error::{Error, Result};

pub mod processor;
pub mod trainer;

pub use processor::{ProcessRequest, ProcessorTab};
pub use trainer::{TrainForm, TrainerTab};

/// Normalises a path typed into a path box, creating the directory when it does not exist.
pub fn submit_path(raw: &str) -> Result<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::validation("Please select a path"));
    }
    let path = PathBuf::from(raw);
    if !path.exists() {
        std::fs::create_dir_all(&path)
            .map_err(|e| Error::msg(format!("failed to create {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "created directory");
    }
    Ok(path)
}

/// First entry of a multi-selection from a path picker, as text.
pub fn first_selected(paths: &[String]) -> String {
    paths.first().cloned().unwrap_or_default()
}

fn port_is_free(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

/// `preferred` when it is set and free, otherwise a port the OS hands out.
pub fn choose_websocket_port(preferred: u16) -> Result<u16> {
    if preferred > 0 && port_is_free(preferred) {
        return Ok(preferred);
    }
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .map_err(|e| Error::launch(format!("no free port for the viewer: {e}")))?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::launch(format!("no free port for the viewer: {e}")))?
        .port();
    Ok(port)
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::{Arc, Mutex};

    use crate::command::Invocation;
    use crate::error::Result;
    use crate::supervisor::{JobExit, JobLauncher, JobProcess};

    /// Records every argv it is asked to start; the jobs run until terminated.
    #[derive(Default)]
    pub struct RecordingLauncher {
        pub started: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingLauncher {
        pub fn last(&self) -> Option<Vec<String>> {
            self.started.lock().unwrap().last().cloned()
        }
    }

    struct Running {
        exit: Option<JobExit>,
    }

    impl JobProcess for Running {
        fn pid(&self) -> Option<u32> {
            Some(7)
        }
        fn try_read_line(&mut self) -> Option<String> {
            None
        }
        fn try_wait(&mut self) -> Result<Option<JobExit>> {
            Ok(self.exit)
        }
        fn terminate(&mut self) {
            self.exit = Some(JobExit { code: None });
        }
        fn suspend(&mut self) -> Result<()> {
            Ok(())
        }
        fn resume(&mut self) -> Result<()> {
            Ok(())
        }
    }

    impl JobLauncher for RecordingLauncher {
        fn start(&self, invocation: &Invocation) -> Result<Box<dyn JobProcess>> {
            self.started.lock().unwrap().push(invocation.argv.clone());
            Ok(Box::new(Running { exit: None }))
        }
    }

    pub fn launcher() -> Arc<RecordingLauncher> {
        Arc::new(RecordingLauncher::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out/nested");
        let got = submit_path(&format!("  {}  ", target.display())).unwrap();
        assert_eq!(got, target);
        assert!(target.is_dir());
        assert!(submit_path(" ").is_err());
    }

    #[test]
    fn busy_preferred_port_falls_back() {
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let busy = held.local_addr().unwrap().port();
        let got = choose_websocket_port(busy).unwrap();
        assert_ne!(got, busy);
        assert!(got > 0);
        assert!(choose_websocket_port(0).unwrap() > 0);
    }

    #[test]
    fn first_selection_wins() {
        assert_eq!(first_selected(&["a".into(), "b".into()]), "a");
        assert_eq!(first_selected(&[]), "");
    }
}
