//! The payment watcher: a cancellable polling loop waiting for the
//! transaction that settles a payment request.
//!
//! One tokio task per watch. Ticks are strictly sequential (a new ledger
//! query is never issued while a previous one is in flight) and
//! cancellation is cooperative: the signal is observed between ticks, an
//! in-progress query is never force-interrupted, and its result is discarded
//! once it resolves.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{oneshot, watch};

use crate::constants::{LedgerConfig, DEFAULT_POLL_INTERVAL};
use crate::error::PayError;
use crate::ledger::{FindResult, LedgerClient, TransactionDetail};
use crate::reference::ReferenceId;
use crate::request::PaymentRequest;
use crate::validate::{validate_transfer, MismatchReason, Validation};

/// Watcher lifecycle. `Matched`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Polling,
    Matched,
    Failed,
    Cancelled,
}

/// Terminal result of a watch.
#[derive(Debug, Clone)]
pub enum WatchOutcome {
    /// A transaction satisfying the request was found and validated.
    Matched {
        request: PaymentRequest,
        transaction: TransactionDetail,
    },
    /// A transaction exists at the reference but fails validation. The
    /// reference is single-use, so polling it further is pointless; the
    /// caller must issue a new request.
    Mismatched(MismatchReason),
    /// Cancelled by the caller before a match.
    Cancelled,
    /// The optional deadline elapsed before a match.
    Expired,
}

/// Knobs for a single watch.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Delay between ledger polls.
    pub poll_interval: Duration,
    /// Optional overall deadline, observed on tick boundaries. `None` (the
    /// default) polls until matched or cancelled.
    pub max_duration: Option<Duration>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_duration: None,
        }
    }
}

/// Spawns and tracks watch tasks, at most one per outstanding reference.
pub struct PaymentWatcher<C> {
    client: Arc<C>,
    config: LedgerConfig,
    active: Arc<DashMap<ReferenceId, ()>>,
}

impl<C> PaymentWatcher<C>
where
    C: LedgerClient + 'static,
{
    pub fn new(client: Arc<C>, config: LedgerConfig) -> Self {
        Self {
            client,
            config,
            active: Arc::new(DashMap::new()),
        }
    }

    /// Start watching for the transaction settling `request`.
    ///
    /// A reference has exactly one live polling task: starting a second
    /// watch on the same reference fails with [`PayError::WatchActive`]
    /// until the first one reaches a terminal state.
    pub fn start(
        &self,
        request: PaymentRequest,
        opts: WatchOptions,
    ) -> Result<WatchHandle, PayError> {
        let reference = request.reference();
        match self.active.entry(reference) {
            Entry::Occupied(_) => return Err(PayError::WatchActive(reference.to_string())),
            Entry::Vacant(v) => {
                v.insert(());
            }
        }

        let (state_tx, state_rx) = watch::channel(WatchState::Idle);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        tokio::spawn(run_watch(
            Arc::clone(&self.client),
            request,
            opts,
            self.config.native_decimals,
            Arc::clone(&self.active),
            state_tx,
            outcome_tx,
            cancel_rx,
        ));

        Ok(WatchHandle {
            reference,
            state: state_rx,
            cancel: Some(cancel_tx),
            outcome: outcome_rx,
        })
    }
}

/// Handle to a running watch.
///
/// Dropping the handle cancels the watch, since nobody could observe it anyway.
#[derive(Debug)]
pub struct WatchHandle {
    reference: ReferenceId,
    state: watch::Receiver<WatchState>,
    cancel: Option<oneshot::Sender<()>>,
    outcome: oneshot::Receiver<WatchOutcome>,
}

impl WatchHandle {
    pub fn reference(&self) -> ReferenceId {
        self.reference
    }

    /// Current state.
    pub fn state(&self) -> WatchState {
        *self.state.borrow()
    }

    /// Wait for the next state transition and return the new state.
    pub async fn changed(&mut self) -> WatchState {
        // An error means the task is gone; the last observed value is final.
        let _ = self.state.changed().await;
        *self.state.borrow()
    }

    /// Request cancellation.
    ///
    /// Returns immediately. The task observes the signal before issuing
    /// another ledger query, so no query starts after this returns; an
    /// in-flight query is left to resolve and its result dropped.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the terminal outcome.
    pub async fn outcome(self) -> WatchOutcome {
        self.outcome.await.unwrap_or(WatchOutcome::Cancelled)
    }
}

/// Result of one polling tick.
enum Tick {
    /// Transient: nothing at the reference yet, the ledger was unreachable,
    /// or the transaction is not finalized. Wait for the next tick.
    Waiting,
    Matched(TransactionDetail),
    Mismatched(MismatchReason),
}

#[allow(clippy::too_many_arguments)]
async fn run_watch<C: LedgerClient>(
    client: Arc<C>,
    request: PaymentRequest,
    opts: WatchOptions,
    native_decimals: u32,
    active: Arc<DashMap<ReferenceId, ()>>,
    state_tx: watch::Sender<WatchState>,
    outcome_tx: oneshot::Sender<WatchOutcome>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let reference = request.reference();
    let deadline = opts.max_duration.map(|d| tokio::time::Instant::now() + d);
    let mut ticker = tokio::time::interval(opts.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let _ = state_tx.send(WatchState::Polling);
    tracing::debug!(
        reference = %reference,
        interval_ms = opts.poll_interval.as_millis() as u64,
        "watch started"
    );

    let (terminal, outcome) = loop {
        tokio::select! {
            biased;

            _ = &mut cancel_rx => {
                tracing::debug!(reference = %reference, "watch cancelled");
                break (WatchState::Cancelled, WatchOutcome::Cancelled);
            }

            _ = ticker.tick() => {
                if let Some(deadline) = deadline {
                    if tokio::time::Instant::now() >= deadline {
                        tracing::info!(reference = %reference, "watch deadline elapsed");
                        break (WatchState::Cancelled, WatchOutcome::Expired);
                    }
                }

                // Cancellation races the tick; never issue a query once
                // cancel() has returned.
                if cancelled(&mut cancel_rx) {
                    break (WatchState::Cancelled, WatchOutcome::Cancelled);
                }

                let polled = poll_once(client.as_ref(), &request, native_decimals).await;

                // A result that resolves after cancellation is discarded.
                if cancelled(&mut cancel_rx) {
                    break (WatchState::Cancelled, WatchOutcome::Cancelled);
                }

                match polled {
                    Tick::Waiting => {}
                    Tick::Matched(transaction) => {
                        tracing::info!(
                            reference = %reference,
                            signature = %transaction.signature,
                            "payment matched"
                        );
                        break (
                            WatchState::Matched,
                            WatchOutcome::Matched { request: request.clone(), transaction },
                        );
                    }
                    Tick::Mismatched(reason) => {
                        tracing::warn!(
                            reference = %reference,
                            reason = %reason,
                            "transaction found but failed validation, stopping watch"
                        );
                        break (WatchState::Failed, WatchOutcome::Mismatched(reason));
                    }
                }
            }
        }
    };

    let _ = state_tx.send(terminal);
    active.remove(&reference);
    let _ = outcome_tx.send(outcome);
}

/// Has the handle cancelled (or been dropped)?
fn cancelled(cancel_rx: &mut oneshot::Receiver<()>) -> bool {
    !matches!(
        cancel_rx.try_recv(),
        Err(oneshot::error::TryRecvError::Empty)
    )
}

async fn poll_once<C: LedgerClient>(
    client: &C,
    request: &PaymentRequest,
    native_decimals: u32,
) -> Tick {
    let reference = request.reference();

    let signature = match client.find_by_reference(&reference).await {
        Ok(FindResult::Found(signature)) => signature,
        Ok(FindResult::NotYet) => {
            // The expected steady state before the payment arrives.
            tracing::debug!(reference = %reference, "no transaction yet");
            return Tick::Waiting;
        }
        Err(e) => {
            tracing::debug!(reference = %reference, error = %e, "reference lookup failed, will retry");
            return Tick::Waiting;
        }
    };

    // The detail fetch is the one transient failure point of validation;
    // treat a miss like "not found yet" and retry on the next tick.
    let detail = match client.transaction_detail(&signature).await {
        Ok(detail) => detail,
        Err(e) => {
            tracing::debug!(
                reference = %reference,
                signature = %signature,
                error = %e,
                "detail fetch failed, will retry"
            );
            return Tick::Waiting;
        }
    };

    if !detail.finalized {
        tracing::debug!(reference = %reference, signature = %signature, "not finalized yet");
        return Tick::Waiting;
    }

    match validate_transfer(request, &detail, native_decimals) {
        Validation::Match => Tick::Matched(detail),
        Validation::Mismatch(reason) => Tick::Mismatched(reason),
    }
}
