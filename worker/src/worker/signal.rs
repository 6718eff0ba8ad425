//! Hangup handling for the worker process.
//!
//! A SIGHUP only raises a flag; the driver consumes it between selection
//! passes and treats it as a request to reload the configuration. The policy
//! engine itself is signal-agnostic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;

use walb_worker_core::error::{ResultExt, SystemError, TypedResult};

#[derive(Clone)]
pub struct ReloadFlag(Arc<AtomicBool>);

impl ReloadFlag {
    /// Registers the SIGHUP handler.
    pub fn install() -> TypedResult<Self> {
        let flag = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGHUP, flag.clone())
            .context("cannot register SIGHUP handler")
            .typ(SystemError::Config)?;
        Ok(Self(flag))
    }

    /// Whether a hangup arrived since the last call; clears the flag.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hangup_sets_the_flag_once() {
        let flag = ReloadFlag::install().unwrap();
        assert!(!flag.take());

        signal_hook::low_level::raise(signal_hook::consts::SIGHUP).unwrap();
        assert!(flag.take());
        assert!(!flag.take());
    }
}
