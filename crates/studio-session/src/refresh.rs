//! Single-flight refresh coordination
//!
//! The coordinator owns the refresh state machine and the queue of callers
//! waiting on an in-flight exchange:
//!
//! - Idle → Refreshing: the first caller to report an expired access token
//!   becomes the leader and drives the exchange
//! - Refreshing: later callers are queued (FIFO) as oneshot senders and
//!   suspend without starting a second exchange
//! - Refreshing → Idle: the leader settles; every queued caller receives the
//!   same outcome in arrival order
//!
//! State transitions and queue append/drain happen under a std Mutex that is
//! never held across an `.await`. If the leader is dropped mid-exchange the
//! queue is settled with a rejection so no caller waits forever.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use common::Secret;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// How a refresh exchange settled. Delivered to the leader and to every
/// queued caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// New access token, already written to the credential store
    Refreshed(Secret<String>),
    /// Store held no refresh token; no exchange was attempted
    NoRefreshToken,
    /// Exchange failed; credentials have been cleared
    Rejected(String),
}

impl RefreshOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Refreshed(_) => "refreshed",
            RefreshOutcome::NoRefreshToken => "no_refresh_token",
            RefreshOutcome::Rejected(_) => "rejected",
        }
    }
}

/// Observable coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

enum State {
    Idle,
    Refreshing {
        waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
    },
}

/// Per-session single-flight guard around the refresh exchange.
pub struct RefreshCoordinator {
    state: Mutex<State>,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Idle),
        }
    }

    pub fn state(&self) -> RefreshState {
        match *self.lock() {
            State::Idle => RefreshState::Idle,
            State::Refreshing { .. } => RefreshState::Refreshing,
        }
    }

    /// Number of callers queued behind the in-flight exchange.
    pub fn pending(&self) -> usize {
        match &*self.lock() {
            State::Idle => 0,
            State::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Run `exchange` unless one is already in flight, in which case wait for
    /// its outcome instead. `exchange` is only invoked by the leader.
    pub async fn run<F, Fut>(&self, exchange: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome>,
    {
        match self.join() {
            Ticket::Leader => {
                let guard = SettleGuard {
                    coordinator: self,
                    armed: true,
                };
                let outcome = exchange().await;
                guard.settle(outcome.clone());
                outcome
            }
            Ticket::Follower(receiver) => receiver.await.unwrap_or_else(|_| {
                RefreshOutcome::Rejected("refresh exchange was abandoned".into())
            }),
        }
    }

    /// Enter the state machine: become the leader if idle, else queue.
    fn join(&self) -> Ticket {
        let mut state = self.lock();
        match &mut *state {
            State::Idle => {
                *state = State::Refreshing {
                    waiters: VecDeque::new(),
                };
                debug!("refresh started");
                Ticket::Leader
            }
            State::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push_back(tx);
                debug!(pending = waiters.len(), "refresh in flight, caller queued");
                Ticket::Follower(rx)
            }
        }
    }

    /// Return to Idle and drain the queue in arrival order.
    fn settle(&self, outcome: &RefreshOutcome) {
        let waiters = match std::mem::replace(&mut *self.lock(), State::Idle) {
            State::Idle => VecDeque::new(),
            State::Refreshing { waiters } => waiters,
        };
        debug!(
            outcome = outcome.label(),
            drained = waiters.len(),
            "refresh settled"
        );
        for waiter in waiters {
            // A dropped receiver means that caller went away; nothing to resume
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Ticket {
    Leader,
    Follower(oneshot::Receiver<RefreshOutcome>),
}

/// Settles the coordinator if the leader's future is dropped before the
/// exchange completes.
struct SettleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl SettleGuard<'_> {
    fn settle(mut self, outcome: RefreshOutcome) {
        self.armed = false;
        self.coordinator.settle(&outcome);
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("refresh leader dropped before settling, rejecting queued callers");
            self.coordinator.settle(&RefreshOutcome::Rejected(
                "refresh exchange was abandoned".into(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn refreshed(token: &str) -> RefreshOutcome {
        RefreshOutcome::Refreshed(Secret::from(token))
    }

    #[tokio::test]
    async fn idle_by_default() {
        let coordinator = RefreshCoordinator::new();
        assert_eq!(coordinator.state(), RefreshState::Idle);
        assert_eq!(coordinator.pending(), 0);
    }

    #[tokio::test]
    async fn single_caller_runs_exchange_and_returns_to_idle() {
        let coordinator = RefreshCoordinator::new();
        let outcome = coordinator.run(|| async { refreshed("T2") }).await;
        assert_eq!(outcome, refreshed("T2"));
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_exchange() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let exchanges = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            let exchanges = exchanges.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .run(|| async {
                        exchanges.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        refreshed("T2")
                    })
                    .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap(), refreshed("T2"));
        }
        assert_eq!(exchanges.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn rejection_reaches_every_queued_caller() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .run(|| async {
                        let _ = release_rx.await;
                        RefreshOutcome::Rejected("refresh token expired".into())
                    })
                    .await
            })
        };
        while coordinator.state() != RefreshState::Refreshing {
            tokio::task::yield_now().await;
        }

        let mut followers = vec![];
        for _ in 0..3 {
            let coordinator = coordinator.clone();
            followers.push(tokio::spawn(async move {
                // Followers never run their exchange; the leader's outcome wins
                coordinator.run(|| async { refreshed("follower") }).await
            }));
        }
        while coordinator.pending() < 3 {
            tokio::task::yield_now().await;
        }

        release_tx.send(()).unwrap();
        let expected = RefreshOutcome::Rejected("refresh token expired".into());
        assert_eq!(leader.await.unwrap(), expected);
        for f in followers {
            assert_eq!(f.await.unwrap(), expected);
        }
        assert_eq!(coordinator.state(), RefreshState::Idle);
        assert_eq!(coordinator.pending(), 0);
    }

    #[tokio::test]
    async fn queue_drains_in_arrival_order() {
        let coordinator = RefreshCoordinator::new();
        assert!(matches!(coordinator.join(), Ticket::Leader));

        let mut receivers = vec![];
        for _ in 0..3 {
            match coordinator.join() {
                Ticket::Follower(rx) => receivers.push(rx),
                Ticket::Leader => panic!("second leader while refreshing"),
            }
        }
        assert_eq!(coordinator.pending(), 3);

        coordinator.settle(&refreshed("T2"));
        assert_eq!(coordinator.state(), RefreshState::Idle);
        for rx in receivers {
            assert_eq!(rx.await.unwrap(), refreshed("T2"));
        }
    }

    #[tokio::test]
    async fn new_exchange_allowed_after_settling() {
        let coordinator = RefreshCoordinator::new();
        let exchanges = AtomicUsize::new(0);

        for _ in 0..2 {
            coordinator
                .run(|| async {
                    exchanges.fetch_add(1, Ordering::SeqCst);
                    RefreshOutcome::NoRefreshToken
                })
                .await;
        }
        assert_eq!(exchanges.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropped_leader_releases_followers() {
        let coordinator = Arc::new(RefreshCoordinator::new());

        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .run(|| std::future::pending::<RefreshOutcome>())
                    .await
            })
        };
        while coordinator.state() != RefreshState::Refreshing {
            tokio::task::yield_now().await;
        }

        let follower = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run(|| async { refreshed("never") }).await })
        };
        while coordinator.pending() < 1 {
            tokio::task::yield_now().await;
        }

        leader.abort();
        let outcome = follower.await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Rejected(_)), "got: {outcome:?}");
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[test]
    fn outcome_debug_redacts_token() {
        let debug = format!("{:?}", refreshed("T2-secret"));
        assert!(!debug.contains("T2-secret"));
    }
}
