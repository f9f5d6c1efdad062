//! Service management for civiq-api
//!
//! Start/stop/status for the API daemon. The daemon records its pid and
//! bound port in the state directory; the CLI reads them back to manage
//! the process.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use sysinfo::{Pid, System};

const SERVICE_BINARY: &str = "civiq-api";
const STATE_SUBDIR: &str = "civiq";

/// Manages the civiq-api daemon process
pub struct ServiceManager {
    state_dir: PathBuf,
}

/// Observed state of the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    Running { pid: u32, port: Option<u16> },
    Stopped,
    /// PID file exists but no such process
    Dead,
}

impl ServiceManager {
    pub fn new() -> Result<Self> {
        let state_dir = state_dir()?;
        std::fs::create_dir_all(&state_dir)?;
        Ok(Self { state_dir })
    }

    pub fn pid_file(&self) -> PathBuf {
        self.state_dir.join(format!("{SERVICE_BINARY}.pid"))
    }

    pub fn port_file(&self) -> PathBuf {
        self.state_dir.join(format!("{SERVICE_BINARY}.port"))
    }

    pub fn is_running(&self) -> bool {
        match self.read_pid() {
            Ok(pid) => process_exists(pid),
            Err(_) => false,
        }
    }

    pub fn read_pid(&self) -> Result<u32> {
        self.read_number(&self.pid_file(), "pid")
    }

    pub fn read_port(&self) -> Result<u16> {
        self.read_number(&self.port_file(), "port")
    }

    fn read_number<T: std::str::FromStr>(&self, path: &Path, what: &str) -> Result<T> {
        let content = std::fs::read_to_string(path)?;
        content
            .trim()
            .parse()
            .map_err(|_| Error::Service(format!("invalid {what} file: {}", path.display())))
    }

    /// Start the daemon.
    ///
    /// With `foreground` the call blocks until the server exits. Otherwise
    /// the binary found beside the current executable is spawned detached
    /// and the call waits until its pid file shows up. An explicit config
    /// path is forwarded to the daemon.
    pub fn start(&self, foreground: bool, config: Option<&Path>) -> Result<()> {
        if self.is_running() {
            return Err(Error::Service("service already running".into()));
        }

        let exe = std::env::current_exe()?;
        let service_exe = exe
            .parent()
            .ok_or_else(|| Error::Service("cannot locate the service binary".into()))?
            .join(SERVICE_BINARY);

        if !service_exe.exists() {
            return Err(Error::Service(format!(
                "{SERVICE_BINARY} binary not found next to {}",
                exe.display()
            )));
        }

        let mut cmd = Command::new(&service_exe);
        if let Some(path) = config {
            cmd.arg("--config").arg(path);
        }

        if foreground {
            let status = cmd.status()?;
            if !status.success() {
                return Err(Error::Service("service exited with an error".into()));
            }
            return Ok(());
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .process_group(0)
                .spawn()?;
        }

        #[cfg(not(unix))]
        {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()?;
        }

        for _ in 0..20 {
            std::thread::sleep(std::time::Duration::from_millis(100));
            if self.is_running() {
                return Ok(());
            }
        }
        Err(Error::Service("service failed to start".into()))
    }

    /// Stop the daemon and remove its state files.
    pub fn stop(&self) -> Result<()> {
        let pid = self.read_pid()?;

        if !process_exists(pid) {
            std::fs::remove_file(self.pid_file()).ok();
            return Err(Error::Service("service not running".into()));
        }

        #[cfg(unix)]
        {
            Command::new("kill").arg(pid.to_string()).status()?;
        }

        #[cfg(windows)]
        {
            Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/F"])
                .status()?;
        }

        for _ in 0..50 {
            std::thread::sleep(std::time::Duration::from_millis(100));
            if !process_exists(pid) {
                break;
            }
        }

        self.cleanup();
        Ok(())
    }

    pub fn restart(&self, config: Option<&Path>) -> Result<()> {
        if self.is_running() {
            self.stop()?;
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
        self.start(false, config)
    }

    pub fn status(&self) -> ServiceStatus {
        match self.read_pid() {
            Ok(pid) if process_exists(pid) => ServiceStatus::Running {
                pid,
                port: self.read_port().ok(),
            },
            Ok(_) => ServiceStatus::Dead,
            Err(_) => ServiceStatus::Stopped,
        }
    }

    /// Record the daemon's pid, called by civiq-api at startup.
    pub fn write_pid(&self, pid: u32) -> Result<()> {
        std::fs::write(self.pid_file(), pid.to_string())?;
        Ok(())
    }

    /// Record the bound port, called by civiq-api at startup.
    pub fn write_port(&self, port: u16) -> Result<()> {
        std::fs::write(self.port_file(), port.to_string())?;
        Ok(())
    }

    /// Remove pid and port files, called by civiq-api on shutdown.
    pub fn cleanup(&self) {
        std::fs::remove_file(self.pid_file()).ok();
        std::fs::remove_file(self.port_file()).ok();
    }
}

fn process_exists(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::All, false);
    sys.process(Pid::from_u32(pid)).is_some()
}

fn state_dir() -> Result<PathBuf> {
    let base = std::env::var("XDG_STATE_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))
        .ok_or_else(|| Error::Service("could not determine the state directory".into()))?;

    Ok(base.join(STATE_SUBDIR))
}
