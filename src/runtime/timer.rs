use super::SchedulerMessage;
use super::registry::Token;
use std::time::Duration;
use tokio::sync::mpsc;

pub type TimerId = u64;

/// A scheduled request timeout. Dropping the guard cancels the timer.
#[derive(Debug)]
pub struct TimeoutGuard {
    id: TimerId,
    scheduler_tx: mpsc::UnboundedSender<SchedulerMessage>,
}

impl TimeoutGuard {
    pub fn arm(
        id: TimerId,
        token: Token,
        delay: Duration,
        scheduler_tx: mpsc::UnboundedSender<SchedulerMessage>,
    ) -> Self {
        let _ = scheduler_tx.send(SchedulerMessage::ScheduleTimeout(id, token, delay));

        log::debug!(
            "timeout {} armed for request {} ({}ms)",
            id,
            token,
            delay.as_millis()
        );

        Self { id, scheduler_tx }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        let _ = self.scheduler_tx.send(SchedulerMessage::ClearTimer(self.id));
    }
}
