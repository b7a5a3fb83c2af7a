//! Suspension points for the phase sequence
//!
//! Every wait the sequence performs goes through a `Scheduler`, which checks
//! the run's cancellation token before and after suspending. Timers are plain
//! futures owned by the sequence task, so they die with it.

use crate::error::Cancelled;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// How a bounded `wait_until` finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    TimedOut,
    /// The publishing side went away
    Closed,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    token: CancellationToken,
}

impl Scheduler {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail fast if the run was stopped
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.token.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resume after `delay`, unless cancelled first
    pub async fn after(&self, delay: Duration) -> Result<(), Cancelled> {
        self.checkpoint()?;
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep(delay) => self.checkpoint(),
        }
    }

    /// Resume once `predicate` holds for the watched value, or after `timeout`
    pub async fn wait_until<T, F>(
        &self,
        rx: &mut watch::Receiver<T>,
        timeout: Duration,
        predicate: F,
    ) -> Result<WaitOutcome, Cancelled>
    where
        F: FnMut(&T) -> bool,
    {
        self.checkpoint()?;
        let wait = async { rx.wait_for(predicate).await.map(|_| ()) };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Cancelled),
            res = tokio::time::timeout(timeout, wait) => {
                self.checkpoint()?;
                Ok(match res {
                    Ok(Ok(())) => WaitOutcome::Satisfied,
                    Ok(Err(_)) => WaitOutcome::Closed,
                    Err(_) => WaitOutcome::TimedOut,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_after_elapses() {
        let sched = Scheduler::new(CancellationToken::new());
        let start = tokio::time::Instant::now();

        sched.after(Duration::from_secs(5)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_cancelled_mid_wait() {
        let token = CancellationToken::new();
        let sched = Scheduler::new(token.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let start = tokio::time::Instant::now();
        assert_eq!(sched.after(Duration::from_secs(60)).await, Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_checkpoint_after_cancel() {
        let token = CancellationToken::new();
        let sched = Scheduler::new(token.clone());
        assert!(sched.checkpoint().is_ok());

        token.cancel();
        assert!(sched.is_cancelled());
        assert_eq!(sched.after(Duration::ZERO).await, Err(Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_satisfied() {
        let sched = Scheduler::new(CancellationToken::new());
        let (tx, mut rx) = watch::channel(0u32);

        tokio::spawn(async move {
            for i in 1..=3 {
                tokio::time::sleep(Duration::from_secs(1)).await;
                tx.send_replace(i);
            }
            // keep the sender alive past the last update
            tokio::time::sleep(Duration::from_secs(100)).await;
        });

        let outcome = sched
            .wait_until(&mut rx, Duration::from_secs(30), |v| *v == 3)
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Satisfied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_times_out() {
        let sched = Scheduler::new(CancellationToken::new());
        let (_tx, mut rx) = watch::channel(false);

        let outcome = sched
            .wait_until(&mut rx, Duration::from_secs(10), |v| *v)
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_cancelled() {
        let token = CancellationToken::new();
        let sched = Scheduler::new(token.clone());
        let (_tx, mut rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            token.cancel();
        });

        let res = sched.wait_until(&mut rx, Duration::from_secs(30), |v| *v).await;
        assert_eq!(res, Err(Cancelled));
    }
}
