//! Process restart primitive

use crate::connection::FatalError;
use tracing::error;

/// Exit status asking the service manager for a restart (EX_TEMPFAIL)
pub const DEFAULT_RESTART_EXIT_CODE: i32 = 75;

/// Whole-process restart, invoked once per fatal condition
pub trait Supervisor: Send + Sync {
    fn restart(&self, cause: &FatalError);
}

/// Terminates the process so the external supervisor starts it again
#[derive(Debug, Clone, Copy)]
pub struct ProcessSupervisor {
    exit_code: i32,
}

impl ProcessSupervisor {
    pub fn new(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_RESTART_EXIT_CODE)
    }
}

impl Supervisor for ProcessSupervisor {
    fn restart(&self, cause: &FatalError) {
        error!("[SUPERVISOR] Fatal: {}", cause);
        error!("[SUPERVISOR] Restarting (exit {})", self.exit_code);
        std::process::exit(self.exit_code);
    }
}
