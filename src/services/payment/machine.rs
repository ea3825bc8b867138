//! Payment submission state machine
//!
//! Drives one [`PaymentIntent`] from wallet connection through broadcast and
//! confirmation to the purchase record. Every collaborator is injected, every
//! transition is published, and every failure ends in exactly one
//! [`FailureKind`].
//!
//! The flow is sequential: `connect` and `pay` take `&mut self`, so a second
//! attempt cannot start while one is in flight. Cancellation from another task
//! goes through a [`CancelHandle`] and is honoured at every suspension point
//! up to, but not including, `Broadcasting`.

use backoff::{backoff::Backoff, ExponentialBackoff};
use chrono::{DateTime, Utc};
use solana_sdk::{
    hash::Hash,
    message::Message,
    pubkey::Pubkey,
    signature::Signature,
    system_instruction,
    transaction::Transaction,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::AppConfig;
use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::core::types::{abbreviate, IntentId, Plan};
use crate::services::recorder::{PurchaseReceipt, PurchaseRecord, PurchaseRecorder};
use crate::services::solana::{
    Confirmation, EndpointResolver, LedgerRpc, ResolutionCursor, ResolveError,
};
use crate::services::wallet::{WalletError, WalletProvider};
use crate::utils::validation;
use super::failure::PaymentFailure;
use super::intent::{PaymentIntent, PaymentStatus};

/// Fixed parameters of the checkout flow
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    /// Destination of every plan payment
    pub treasury: Pubkey,
    /// Reserved on top of the price when checking the balance
    pub estimated_fee_lamports: u64,
    /// Upper bound on waiting for confirmation
    pub confirmation_timeout: Duration,
    /// First delay between confirmation polls
    pub confirmation_poll_interval: Duration,
    /// Query the balance again right before building the transfer
    pub refresh_balance_before_submit: bool,
}

impl PaymentSettings {
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let treasury = validation::validate_solana_address(&config.payment.treasury_address)
            .map_err(|e| AppError::config(format!("Invalid treasury address: {}", e)))?;

        Ok(Self {
            treasury,
            estimated_fee_lamports: config.payment.estimated_fee_lamports,
            confirmation_timeout: config.solana.confirmation_timeout(),
            confirmation_poll_interval: config.solana.confirmation_poll_interval(),
            refresh_balance_before_submit: config.payment.refresh_balance_before_submit,
        })
    }
}

/// Published on every status change
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub intent_id: IntentId,
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub signature: Option<Signature>,
    /// Set when the transition was caused by a failure
    pub failure: Option<PaymentFailure>,
    pub at: DateTime<Utc>,
}

/// How a payment attempt ended
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Succeeded {
        intent_id: IntentId,
        signature: Signature,
        receipt: PurchaseReceipt,
    },
    Failed {
        intent_id: IntentId,
        failure: PaymentFailure,
    },
    Cancelled {
        intent_id: IntentId,
    },
}

impl PaymentOutcome {
    pub fn status(&self) -> PaymentStatus {
        match self {
            PaymentOutcome::Succeeded { .. } => PaymentStatus::Succeeded,
            PaymentOutcome::Failed { failure, .. } => PaymentStatus::Failed(failure.kind),
            PaymentOutcome::Cancelled { .. } => PaymentStatus::Cancelled,
        }
    }

    pub fn signature(&self) -> Option<Signature> {
        match self {
            PaymentOutcome::Succeeded { signature, .. } => Some(*signature),
            PaymentOutcome::Failed { failure, .. } => failure.signature,
            PaymentOutcome::Cancelled { .. } => None,
        }
    }
}

/// Result of [`PaymentMachine::connect`]
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    /// Wallet connected and balance snapshot taken
    Connected { address: Pubkey, balance_lamports: u64 },
    /// Back to `Idle`; connecting again is allowed
    Retryable(PaymentFailure),
    /// The attempt reached a terminal status
    Finished(PaymentOutcome),
}

/// Receives status notifications from the machine
#[cfg_attr(test, mockall::automock)]
pub trait PaymentObserver: Send + Sync {
    fn on_transition(&self, event: &StatusEvent);

    /// Called once when the attempt succeeds or fails
    fn on_complete(&self, outcome: &PaymentOutcome);
}

/// Cancellation token guarded by the "still cancellable" flag
///
/// The machine closes the gate under the same lock the handle cancels under,
/// so a cancel either lands before `Broadcasting` or is refused.
#[derive(Debug, Clone)]
struct CancelGate {
    token: CancellationToken,
    open: Arc<Mutex<bool>>,
}

impl CancelGate {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            open: Arc::new(Mutex::new(true)),
        }
    }

    fn cancel(&self) -> bool {
        let open = self.open.lock();
        if *open {
            self.token.cancel();
        }
        *open
    }

    /// Close the gate; `false` when a cancel got in first
    fn close(&self) -> bool {
        let mut open = self.open.lock();
        *open = false;
        !self.token.is_cancelled()
    }
}

/// Cancels the current attempt from another task
#[derive(Debug, Clone)]
pub struct CancelHandle {
    gate: CancelGate,
}

impl CancelHandle {
    /// Request cancellation; returns `false` once the attempt is past the
    /// point where it can be cancelled
    pub fn cancel(&self) -> bool {
        self.gate.cancel()
    }
}

enum ConfirmationWait {
    Confirmed,
    Failed(String),
    TimedOut,
}

/// Await `fut` unless the token fires first
async fn or_cancelled<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}

/// Best-effort wallet disconnect
async fn release(wallet: &dyn WalletProvider) {
    if let Err(e) = wallet.disconnect().await {
        warn!("⚠️  Wallet disconnect failed: {}", e);
    }
}

/// Checkout flow for one plan purchase
pub struct PaymentMachine {
    wallet: Option<Arc<dyn WalletProvider>>,
    resolver: Arc<EndpointResolver>,
    recorder: Arc<dyn PurchaseRecorder>,
    settings: PaymentSettings,
    observer: Option<Arc<dyn PaymentObserver>>,
    intent: PaymentIntent,
    rpc: Option<Arc<dyn LedgerRpc>>,
    cursor: ResolutionCursor,
    cancel: CancelGate,
    status_tx: watch::Sender<PaymentStatus>,
}

impl std::fmt::Debug for PaymentMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentMachine")
            .field("intent", &self.intent)
            .field("settings", &self.settings)
            .field("endpoint", &self.rpc.as_ref().map(|rpc| rpc.endpoint()))
            .finish()
    }
}

impl PaymentMachine {
    /// Create a machine for `plan`; `wallet` is `None` when no provider exists
    pub fn new(
        plan: Plan,
        wallet: Option<Arc<dyn WalletProvider>>,
        resolver: Arc<EndpointResolver>,
        recorder: Arc<dyn PurchaseRecorder>,
        settings: PaymentSettings,
    ) -> Self {
        let (status_tx, _) = watch::channel(PaymentStatus::Idle);

        Self {
            wallet,
            resolver,
            recorder,
            settings,
            observer: None,
            intent: PaymentIntent::new(plan),
            rpc: None,
            cursor: ResolutionCursor::new(),
            cancel: CancelGate::new(),
            status_tx,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PaymentObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn intent(&self) -> &PaymentIntent {
        &self.intent
    }

    pub fn status(&self) -> PaymentStatus {
        self.intent.status()
    }

    /// Watch the status of the current and future intents
    pub fn subscribe(&self) -> watch::Receiver<PaymentStatus> {
        self.status_tx.subscribe()
    }

    /// Handle that cancels the current intent; stale after [`restart`](Self::restart)
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle { gate: self.cancel.clone() }
    }

    /// Pay is offered only with a connected wallet and no attempt in flight
    pub fn can_pay(&self) -> bool {
        self.intent.status() == PaymentStatus::WalletConnected
    }

    /// Connect the wallet, pick an RPC endpoint and snapshot the balance
    #[instrument(skip(self), fields(intent = %self.intent.id()))]
    pub async fn connect(&mut self) -> AppResult<ConnectOutcome> {
        if self.intent.status() != PaymentStatus::Idle {
            return Err(self.misuse("connect is only allowed from Idle"));
        }

        let token = self.cancel.token.clone();
        if token.is_cancelled() {
            return self.cancelled().map(ConnectOutcome::Finished);
        }

        self.advance(PaymentStatus::WalletConnecting)?;

        let Some(wallet) = self.wallet.clone() else {
            return self.fail(PaymentFailure::wallet_unavailable()).map(ConnectOutcome::Finished);
        };

        let address = match or_cancelled(&token, wallet.connect()).await {
            None => return self.cancelled().map(ConnectOutcome::Finished),
            Some(Ok(address)) => address,
            Some(Err(WalletError::Unavailable)) => {
                return self.fail(PaymentFailure::wallet_unavailable()).map(ConnectOutcome::Finished);
            }
            Some(Err(e)) => return self.connection_failed(PaymentFailure::from_connect_error(&e)),
        };

        let rpc = match self.rpc.clone() {
            Some(rpc) => rpc,
            None => match self.resolve_endpoint(&token).await {
                None => return self.cancelled().map(ConnectOutcome::Finished),
                Some(Ok(rpc)) => rpc,
                Some(Err(e)) => {
                    release(wallet.as_ref()).await;
                    return self.fail(PaymentFailure::no_endpoint(&e)).map(ConnectOutcome::Finished);
                }
            },
        };

        let balance = match or_cancelled(&token, rpc.get_balance(&address)).await {
            None => return self.cancelled().map(ConnectOutcome::Finished),
            Some(Ok(balance)) => balance,
            Some(Err(e)) => {
                self.cursor.record_failure(e.clone());
                self.rpc = None;
                release(wallet.as_ref()).await;
                return self.connection_failed(PaymentFailure::balance_unavailable(&e));
            }
        };

        self.intent.set_payer(address, balance)?;
        self.advance(PaymentStatus::WalletConnected)?;

        info!(
            "👛 Connected {} with {} lamports",
            abbreviate(&address.to_string()),
            balance
        );

        Ok(ConnectOutcome::Connected { address, balance_lamports: balance })
    }

    /// Run the payment from balance check to purchase record
    #[instrument(skip(self), fields(intent = %self.intent.id(), plan = %self.intent.plan()))]
    pub async fn pay(&mut self) -> AppResult<PaymentOutcome> {
        if !self.can_pay() {
            return Err(self.misuse("pay requires a connected wallet and no attempt in flight"));
        }

        let (Some(wallet), Some(payer)) = (self.wallet.clone(), self.intent.payer_address()) else {
            return Err(AppError::internal("connected intent without wallet or payer"));
        };

        let token = self.cancel.token.clone();
        if token.is_cancelled() {
            return self.cancelled();
        }

        self.advance(PaymentStatus::Submitting)?;

        let plan = self.intent.plan().clone();
        let price = match plan.price_lamports() {
            Ok(price) => price,
            Err(e) => return self.fail(PaymentFailure::unknown(e.to_string())),
        };
        let Some(required) = price.checked_add(self.settings.estimated_fee_lamports) else {
            return self.fail(PaymentFailure::unknown("Plan price is out of range"));
        };

        if self.settings.refresh_balance_before_submit {
            if let Some(rpc) = self.rpc.clone() {
                match or_cancelled(&token, rpc.get_balance(&payer)).await {
                    None => return self.cancelled(),
                    Some(Ok(balance)) => self.intent.refresh_balance(balance),
                    Some(Err(e)) => warn!("⚠️  Balance refresh failed, using snapshot: {}", e),
                }
            }
        }

        // Without a refresh this compares against the connect-time snapshot;
        // the balance may have changed since.
        let balance = self.intent.payer_balance().unwrap_or(0);
        if balance < required {
            return self.fail(PaymentFailure::insufficient_balance(required, balance));
        }

        let (rpc, blockhash) = match self.fresh_blockhash(&token).await {
            None => return self.cancelled(),
            Some(Ok(pair)) => pair,
            Some(Err(e)) => return self.fail(PaymentFailure::no_endpoint(&e)),
        };

        let instruction = system_instruction::transfer(&payer, &self.settings.treasury, price);
        let message = Message::new_with_blockhash(&[instruction], Some(&payer), &blockhash);
        let unsigned = Transaction::new_unsigned(message.clone());

        self.advance(PaymentStatus::AwaitingSignature)?;

        let signed = match or_cancelled(&token, wallet.sign_transaction(unsigned)).await {
            None => return self.cancelled(),
            Some(Ok(transaction)) => transaction,
            Some(Err(e)) => return self.fail(PaymentFailure::from_sign_error(&e)),
        };

        if signed.message != message || !signed.is_signed() {
            return self.fail(PaymentFailure::unknown(
                "Wallet returned an unsigned or modified transaction",
            ));
        }

        if !self.cancel.close() {
            return self.cancelled();
        }

        self.advance(PaymentStatus::Broadcasting)?;

        let signature = match rpc.send_transaction(&signed).await {
            Ok(signature) => signature,
            Err(e) => return self.fail(PaymentFailure::broadcast(&e)),
        };
        // Never resend: a retry builds a new transaction on a new intent
        drop(signed);

        self.after_broadcast(signature, rpc).await
    }

    /// Everything past broadcast; errors keep the signature attached
    async fn after_broadcast(&mut self, signature: Signature, rpc: Arc<dyn LedgerRpc>) -> AppResult<PaymentOutcome> {
        let keep_signature = |e: AppError| AppError::after_broadcast(signature, e);

        self.intent.set_signature(signature).map_err(keep_signature)?;
        self.advance(PaymentStatus::Confirming).map_err(keep_signature)?;

        match self.await_confirmation(rpc.as_ref(), &signature).await {
            ConfirmationWait::Confirmed => {}
            ConfirmationWait::Failed(reason) => {
                return self.fail(PaymentFailure::on_chain(signature, &reason)).map_err(keep_signature);
            }
            ConfirmationWait::TimedOut => {
                let waited = self.settings.confirmation_timeout;
                return self
                    .fail(PaymentFailure::confirmation_timeout(signature, waited))
                    .map_err(keep_signature);
            }
        }

        self.advance(PaymentStatus::Recording).map_err(keep_signature)?;

        let payer = self.intent.payer_address().map(|p| p.to_string()).unwrap_or_default();
        let plan = self.intent.plan();
        let record = PurchaseRecord {
            hours: plan.hours,
            sol: plan.price_sol,
            wallet_address: payer,
            transaction_hash: signature.to_string(),
        };

        match self.recorder.record(&record).await {
            Ok(receipt) => self.succeed(signature, receipt).map_err(keep_signature),
            Err(e) => self.fail(PaymentFailure::recording(signature, &e)).map_err(keep_signature),
        }
    }

    /// Cancel an attempt that is not in flight
    pub fn cancel(&mut self) -> AppResult<PaymentOutcome> {
        if !self.intent.status().is_cancellable() || !self.cancel.cancel() {
            return Err(self.misuse("payment can no longer be cancelled"));
        }
        self.cancelled()
    }

    /// Disconnect the wallet; a connected intent returns to `Idle`
    pub async fn disconnect(&mut self) -> AppResult<()> {
        let status = self.intent.status();
        if status != PaymentStatus::WalletConnected && status != PaymentStatus::Idle && !status.is_terminal() {
            return Err(self.misuse("cannot disconnect while a payment is in progress"));
        }

        if let Some(wallet) = &self.wallet {
            release(wallet.as_ref()).await;
        }

        if status == PaymentStatus::WalletConnected {
            self.advance(PaymentStatus::Idle)?;
        }
        Ok(())
    }

    /// Discard a finished intent and start a fresh one for the same plan
    pub fn restart(&mut self) -> AppResult<()> {
        if !self.intent.status().is_terminal() {
            return Err(self.misuse("only a finished payment can be restarted"));
        }

        let plan = self.intent.plan().clone();
        debug!("🔁 Restarting payment for {}", plan);

        self.intent = PaymentIntent::new(plan);
        self.rpc = None;
        self.cursor = ResolutionCursor::new();
        self.cancel = CancelGate::new();
        self.status_tx.send_replace(PaymentStatus::Idle);
        Ok(())
    }

    /// Next healthy endpoint for this intent; `None` when cancelled
    async fn resolve_endpoint(
        &mut self,
        token: &CancellationToken,
    ) -> Option<Result<Arc<dyn LedgerRpc>, ResolveError>> {
        let resolved = or_cancelled(token, self.resolver.resolve_next(&mut self.cursor)).await;
        if let Some(Ok(rpc)) = &resolved {
            self.rpc = Some(rpc.clone());
        }
        resolved
    }

    /// Blockhash from the current endpoint, moving down the list on failure
    async fn fresh_blockhash(
        &mut self,
        token: &CancellationToken,
    ) -> Option<Result<(Arc<dyn LedgerRpc>, Hash), ResolveError>> {
        loop {
            let rpc = match self.rpc.clone() {
                Some(rpc) => rpc,
                None => match self.resolve_endpoint(token).await? {
                    Ok(rpc) => rpc,
                    Err(e) => return Some(Err(e)),
                },
            };

            match or_cancelled(token, rpc.get_latest_blockhash()).await? {
                Ok(blockhash) => return Some(Ok((rpc, blockhash))),
                Err(e) => {
                    warn!("⚠️  Blockhash from {} failed: {}", rpc.endpoint(), e);
                    self.cursor.record_failure(e);
                    self.rpc = None;
                }
            }
        }
    }

    /// Poll the signature status until confirmed, failed or the deadline passes
    async fn await_confirmation(&self, rpc: &dyn LedgerRpc, signature: &Signature) -> ConfirmationWait {
        let poll = self.settings.confirmation_poll_interval;
        let deadline = Instant::now() + self.settings.confirmation_timeout;

        let mut backoff = ExponentialBackoff {
            initial_interval: poll,
            current_interval: poll,
            max_interval: poll * 4,
            multiplier: 1.5,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return ConfirmationWait::TimedOut;
            }

            match tokio::time::timeout(remaining, rpc.confirm_transaction(signature)).await {
                Err(_) => return ConfirmationWait::TimedOut,
                Ok(Ok(Confirmation::Confirmed)) => {
                    info!("✅ Transaction {} confirmed", abbreviate(&signature.to_string()));
                    return ConfirmationWait::Confirmed;
                }
                Ok(Ok(Confirmation::Failed(reason))) => return ConfirmationWait::Failed(reason),
                Ok(Ok(Confirmation::Pending)) => {
                    debug!("⏳ Transaction {} pending", abbreviate(&signature.to_string()));
                }
                Ok(Err(e)) => warn!("⚠️  Confirmation poll failed, retrying: {}", e),
            }

            let wait = backoff.next_backoff().unwrap_or(poll);
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(wait.min(remaining)).await;
        }
    }

    fn advance(&mut self, next: PaymentStatus) -> AppResult<()> {
        let from = self.intent.status();
        self.intent.advance(next)?;
        self.emit(from, None);
        Ok(())
    }

    fn connection_failed(&mut self, failure: PaymentFailure) -> AppResult<ConnectOutcome> {
        warn!("❌ {}", failure);
        metrics::counter!("checkout_payment_failures_total", "kind" => failure.kind.as_str()).increment(1);

        let from = self.intent.status();
        self.intent.advance(PaymentStatus::Idle)?;
        self.emit(from, Some(failure.clone()));
        Ok(ConnectOutcome::Retryable(failure))
    }

    fn fail(&mut self, failure: PaymentFailure) -> AppResult<PaymentOutcome> {
        let from = self.intent.status();
        self.intent.fail(failure.clone())?;

        metrics::counter!("checkout_payment_failures_total", "kind" => failure.kind.as_str()).increment(1);
        if failure.kind.after_broadcast() {
            error!(signature = ?failure.signature, "❌ {}", failure);
        } else {
            warn!("❌ {}", failure);
        }

        self.emit(from, Some(failure.clone()));
        Ok(self.complete(PaymentOutcome::Failed {
            intent_id: self.intent.id(),
            failure,
        }))
    }

    fn succeed(&mut self, signature: Signature, receipt: PurchaseReceipt) -> AppResult<PaymentOutcome> {
        self.advance(PaymentStatus::Succeeded)?;
        info!("🎉 Purchase {} recorded for {}", receipt.purchase_id, signature);

        Ok(self.complete(PaymentOutcome::Succeeded {
            intent_id: self.intent.id(),
            signature,
            receipt,
        }))
    }

    fn cancelled(&mut self) -> AppResult<PaymentOutcome> {
        self.advance(PaymentStatus::Cancelled)?;
        info!("🛑 Payment cancelled");
        Ok(PaymentOutcome::Cancelled { intent_id: self.intent.id() })
    }

    fn complete(&self, outcome: PaymentOutcome) -> PaymentOutcome {
        if let Some(observer) = &self.observer {
            observer.on_complete(&outcome);
        }
        outcome
    }

    fn emit(&self, from: PaymentStatus, failure: Option<PaymentFailure>) {
        let to = self.intent.status();
        if !to.is_cancellable() {
            self.cancel.close();
        }
        self.status_tx.send_replace(to);
        metrics::counter!("checkout_payment_transitions_total", "to" => to.label()).increment(1);
        debug!("🔄 {} -> {}", from, to);

        if let Some(observer) = &self.observer {
            observer.on_transition(&StatusEvent {
                intent_id: self.intent.id(),
                from,
                to,
                signature: self.intent.signature(),
                failure,
                at: Utc::now(),
            });
        }
    }

    fn misuse(&self, message: &str) -> AppError {
        AppError::payment(message).with_intent(self.intent.id(), self.intent.status())
    }
}
