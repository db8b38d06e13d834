//! Suggestion providers.
//!
//! Every provider follows the same contract: `start()` may emit batches
//! synchronously (low-latency paths first) and spawn async work for the rest;
//! the last batch for a query carries `has_more = false`. `stop()` cancels the
//! provider's in-flight work. A stopped provider emits nothing further, but a
//! batch already in the channel can still arrive, so the orchestrator checks
//! the query id of every batch it receives.

pub mod bookmark;
pub mod history_url;
pub mod open_tab;
pub mod zero_suggest;

pub use bookmark::BookmarkProvider;
pub use history_url::HistoryUrlProvider;
pub use open_tab::OpenTabProvider;
pub use zero_suggest::ZeroSuggestProvider;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::input::AutocompleteInput;
use crate::interface::{AutocompleteMatch, OmniboxError, ProviderKind};

/// Polymorphic suggestion source driven by the orchestrator
pub trait AutocompleteProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Begin producing matches for `input` into `sink`.
    fn start(&self, input: Arc<AutocompleteInput>, sink: ResultSink);

    /// Cancel in-flight work. Safe to call when nothing is running.
    fn stop(&self);
}

/// One delivery from a provider
#[derive(Debug, Clone)]
pub struct ProviderBatch {
    pub provider: ProviderKind,
    pub query_id: u64,
    pub matches: Vec<AutocompleteMatch>,
    pub has_more: bool,
}

/// Where a provider sends its batches for one query
#[derive(Debug, Clone)]
pub struct ResultSink {
    provider: ProviderKind,
    query_id: u64,
    token: CancellationToken,
    tx: UnboundedSender<ProviderBatch>,
}

impl ResultSink {
    pub fn new(
        provider: ProviderKind,
        query_id: u64,
        token: CancellationToken,
        tx: UnboundedSender<ProviderBatch>,
    ) -> Self {
        Self { provider, query_id, token, tx }
    }

    pub fn query_id(&self) -> u64 {
        self.query_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Same destination, guarded by a different token
    pub fn with_token(&self, token: CancellationToken) -> Self {
        Self { token, ..self.clone() }
    }

    /// Send a batch. Returns false if cancelled or the query is gone.
    pub fn emit(&self, matches: Vec<AutocompleteMatch>, has_more: bool) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.tx
            .send(ProviderBatch {
                provider: self.provider,
                query_id: self.query_id,
                matches,
                has_more,
            })
            .is_ok()
    }
}

/// Tracks the cancellation token of a provider's current query.
#[derive(Debug, Default)]
pub struct InFlight {
    token: Mutex<Option<CancellationToken>>,
}

impl InFlight {
    /// Child of `parent` for a new query; cancels the previous one.
    pub fn begin(&self, parent: &CancellationToken) -> CancellationToken {
        let child = parent.child_token();
        if let Some(previous) = self.token.lock().replace(child.clone()) {
            previous.cancel();
        }
        child
    }

    pub fn cancel(&self) {
        if let Some(token) = self.token.lock().take() {
            token.cancel();
        }
    }
}

/// Run a collaborator call with a timeout. Failures and timeouts are logged
/// and become `None`; so does cancellation.
pub async fn call_collaborator<T, F>(
    provider: ProviderKind,
    call: &'static str,
    timeout: Duration,
    token: &CancellationToken,
    fut: F,
) -> Option<T>
where
    F: Future<Output = Result<T, OmniboxError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        outcome = tokio::time::timeout(timeout, fut) => match outcome {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(provider = provider.name(), call, error = %e, "collaborator call failed");
                None
            }
            Err(_) => {
                let e = OmniboxError::Timeout {
                    provider: provider.name(),
                    millis: timeout.as_millis() as u64,
                };
                warn!(call, error = %e, "collaborator call timed out");
                None
            }
        },
    }
}
