use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{AppError, AppResult, LifecycleError};

/// A service process the run owns.
#[async_trait]
pub trait ServiceProcess: Send {
    async fn spawn(&mut self) -> AppResult<()>;

    /// Exit status text when the process has already exited.
    ///
    /// # Errors
    ///
    /// Returns an error when the process state cannot be queried.
    fn exit_status(&mut self) -> AppResult<Option<String>>;

    /// Asks the process to shut down gracefully.
    async fn terminate(&mut self) -> AppResult<()>;

    /// Waits up to `timeout` for exit; `false` when it is still running.
    async fn wait_exit(&mut self, timeout: Duration) -> AppResult<bool>;

    async fn kill(&mut self) -> AppResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct ServiceCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub workdir: Option<PathBuf>,
}

impl ServiceCommand {
    fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Child process launched from a configured command line.
#[derive(Debug)]
pub struct CommandProcess {
    command: ServiceCommand,
    child: Option<Child>,
}

impl CommandProcess {
    #[must_use]
    pub const fn new(command: ServiceCommand) -> Self {
        Self {
            command,
            child: None,
        }
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }
}

#[async_trait]
impl ServiceProcess for CommandProcess {
    async fn spawn(&mut self) -> AppResult<()> {
        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .envs(self.command.env.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = self.command.workdir.as_ref() {
            command.current_dir(dir);
        }
        let child = command.spawn().map_err(|err| {
            AppError::lifecycle(LifecycleError::Spawn {
                command: self.command.display(),
                source: err,
            })
        })?;
        info!(
            "Started service '{}' (pid {})",
            self.command.display(),
            child.id().unwrap_or_default()
        );
        self.child = Some(child);
        Ok(())
    }

    fn exit_status(&mut self) -> AppResult<Option<String>> {
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        let status = child
            .try_wait()
            .map_err(|err| AppError::lifecycle(LifecycleError::Wait { source: err }))?;
        Ok(status.map(|status| status.to_string()))
    }

    async fn terminate(&mut self) -> AppResult<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        let Some(pid) = child.id() else {
            // Already reaped.
            return Ok(());
        };
        send_terminate(child, pid)
    }

    async fn wait_exit(&mut self, timeout: Duration) -> AppResult<bool> {
        let Some(child) = self.child.as_mut() else {
            return Ok(true);
        };
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Service exited with {}", status);
                Ok(true)
            }
            Ok(Err(err)) => Err(AppError::lifecycle(LifecycleError::Wait { source: err })),
            Err(_elapsed) => Ok(false),
        }
    }

    async fn kill(&mut self) -> AppResult<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        child
            .kill()
            .await
            .map_err(|err| AppError::lifecycle(LifecycleError::Kill { source: err }))
    }
}

#[cfg(unix)]
fn send_terminate(_child: &mut Child, pid: u32) -> AppResult<()> {
    let pid = libc::pid_t::try_from(pid).map_err(|_err| {
        AppError::lifecycle(LifecycleError::Signal {
            source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
        })
    })?;
    // Safety: kill(2) has no memory-safety preconditions; pid belongs to our child.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(AppError::lifecycle(LifecycleError::Signal { source: err }))
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child, _pid: u32) -> AppResult<()> {
    child
        .start_kill()
        .map_err(|err| AppError::lifecycle(LifecycleError::Signal { source: err }))
}

/// A service started and stopped outside this process; only health-checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalService;

#[async_trait]
impl ServiceProcess for ExternalService {
    async fn spawn(&mut self) -> AppResult<()> {
        Ok(())
    }

    fn exit_status(&mut self) -> AppResult<Option<String>> {
        Ok(None)
    }

    async fn terminate(&mut self) -> AppResult<()> {
        Ok(())
    }

    async fn wait_exit(&mut self, _timeout: Duration) -> AppResult<bool> {
        Ok(true)
    }

    async fn kill(&mut self) -> AppResult<()> {
        Ok(())
    }
}
