//! One-shot silence timer.
//!
//! Arming spawns a tokio task that sleeps for the timeout and then posts
//! [`CaptureEvent::SilenceTimeout`] for its session.  Cancelling (or
//! dropping) the timer aborts the task.  A timeout that was already posted
//! cannot be recalled, so the controller also checks the session id.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::engine::CaptureEvent;

#[derive(Debug)]
pub struct SilenceTimer {
    session: u64,
    handle: JoinHandle<()>,
}

impl SilenceTimer {
    /// Arm a timer for `session`.  Must be called inside a tokio runtime.
    pub fn arm(
        timeout: Duration,
        session: u64,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(CaptureEvent::SilenceTimeout { session });
        });
        Self { session, handle }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for SilenceTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
