//! Background polling for the dashboard.
//!
//! One poller task owns each fetch loop and publishes outcomes over a
//! channel; the interactive side only ever reads. Fetches happen inline
//! between waits, so two cycles of one poller can never overlap, and the
//! spec/status arrays inside any published view always come from a single
//! point-in-time fetch.

use std::sync::Arc;
use std::time::Duration;

use supwatch_kubectl::{ClusterQuery, KubectlError, RunLocator};
use supwatch_model::{ChainSummary, RunSnapshot};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

/// One published point-in-time view of the cluster. Cheap to clone, and
/// immutable once published: the next cycle replaces the pointers rather
/// than editing anything in place.
#[derive(Debug, Clone)]
pub struct ClusterView {
    pub runs: Arc<Vec<RunSnapshot>>,
    pub chains: Arc<Vec<ChainSummary>>,
}

#[derive(Debug)]
pub struct RefreshOutcome {
    /// Increments per fetch cycle; consumers discard anything at or below
    /// the last sequence they applied.
    pub seq: u64,
    pub result: Result<ClusterView, KubectlError>,
}

/// Periodic full-collection poller. Dropping the handle aborts the task;
/// nothing awaits its cancellation.
pub struct Poller {
    poke: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl Poller {
    pub fn spawn<Q: ClusterQuery>(
        query: Q,
        interval: Duration,
    ) -> (Poller, mpsc::UnboundedReceiver<RefreshOutcome>) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (poke_tx, mut poke_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut seq = 0u64;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    poked = poke_rx.recv() => {
                        if poked.is_none() {
                            break;
                        }
                        // a manual refresh restarts the periodic clock
                        ticker.reset();
                    }
                }

                seq += 1;
                debug!("fetch cycle {seq}");
                let result = fetch(&query).await;
                if outcome_tx.send(RefreshOutcome { seq, result }).is_err() {
                    break;
                }
            }
        });

        (
            Poller {
                poke: poke_tx,
                task,
            },
            outcome_rx,
        )
    }

    /// Request a refresh ahead of the next tick. While a fetch is in flight
    /// (or a request is already pending) further pokes coalesce into it.
    pub fn poke(&self) {
        let _ = self.poke.try_send(());
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn fetch<Q: ClusterQuery>(query: &Q) -> Result<ClusterView, KubectlError> {
    let runs = query.list_runs().await?;
    let chains = query.list_chains().await?;
    Ok(ClusterView {
        runs: Arc::new(runs),
        chains: Arc::new(chains),
    })
}

#[derive(Debug)]
pub struct RunOutcome {
    /// Identifies which detail view the poller belongs to. A late result
    /// from a closed view carries a stale session and is dropped.
    pub session: u64,
    pub result: Result<RunSnapshot, KubectlError>,
}

/// Single-run poller behind a detail view. Same shape as [`Poller`], minus
/// the poke: the detail cadence is short enough that manual refresh never
/// grew a need.
pub struct RunPoller {
    task: JoinHandle<()>,
}

impl RunPoller {
    pub fn spawn<Q: ClusterQuery>(
        query: Q,
        locator: RunLocator,
        interval: Duration,
        session: u64,
    ) -> (RunPoller, mpsc::UnboundedReceiver<RunOutcome>) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!("detail fetch for {locator}");
                let result = query.get_run(&locator).await;
                if outcome_tx.send(RunOutcome { session, result }).is_err() {
                    break;
                }
            }
        });

        (RunPoller { task }, outcome_rx)
    }
}

impl Drop for RunPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// What applying one outcome did to the state.
#[derive(Debug)]
pub enum Applied {
    /// A fresh view was published; derived views should be recomputed.
    Replaced,
    /// The cycle failed; the previous view stands untouched.
    Failed(KubectlError),
    /// Outcome of an older cycle than one already applied; dropped.
    Stale,
}

/// The consumer side of the refresh loop: holds the last good view, the
/// consecutive-failure count, and the stale-outcome guard.
#[derive(Debug, Default)]
pub struct ViewState {
    view: Option<ClusterView>,
    applied_seq: u64,
    failures: u64,
}

impl ViewState {
    pub fn apply(&mut self, outcome: RefreshOutcome) -> Applied {
        if outcome.seq <= self.applied_seq {
            return Applied::Stale;
        }
        self.applied_seq = outcome.seq;
        match outcome.result {
            Ok(view) => {
                self.view = Some(view);
                self.failures = 0;
                Applied::Replaced
            }
            Err(error) => {
                self.failures += 1;
                Applied::Failed(error)
            }
        }
    }

    /// The last successfully published view, if any cycle has succeeded.
    pub fn view(&self) -> Option<&ClusterView> {
        self.view.as_ref()
    }

    /// Consecutive failed cycles since the last success.
    pub fn failures(&self) -> u64 {
        self.failures
    }
}
