use crate::alert::{Clock, CooldownPolicy};
use crate::config::{AppConfig, RunSettings};
use crate::domain::ListingRecord;
use crate::error::{AbortReason, EntryError, RunError};
use crate::history::{AlertHistory, HistoryStore};
use crate::listing::Normalizer;
use crate::notifier::{MessageTransport, Notifier, TelegramTransport};
use crate::tgtg::{FavoritesSource, TgtgClient, TgtgError};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    HistoryLoaded,
    FetchingSnapshot,
    ProcessingEntries,
    Done,
    Aborted(AbortReason),
}

/// Counters reported when a run completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub listings: usize,
    pub notified: usize,
    pub skipped: usize,
    pub suppressed: usize,
}

enum Outcome {
    Skipped,
    Suppressed,
    Notified,
}

/// Builds the marketplace and messaging collaborators from checked settings.
pub trait Connector {
    type Source: FavoritesSource;
    type Transport: MessageTransport;

    fn connect(&self, settings: &RunSettings) -> Result<(Self::Source, Self::Transport), RunError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LiveConnector;

impl Connector for LiveConnector {
    type Source = TgtgClient;
    type Transport = TelegramTransport;

    fn connect(&self, settings: &RunSettings) -> Result<(TgtgClient, TelegramTransport), RunError> {
        let source = TgtgClient::new(&settings.tgtg_base_url, settings.credentials.clone())
            .map_err(|e| RunError::UnclassifiedError(e.to_string()))?;
        let transport =
            TelegramTransport::with_api_url(&settings.telegram_api_url, settings.bot_token.clone());
        Ok((source, transport))
    }
}

pub struct Watcher<C, K> {
    config: AppConfig,
    store: HistoryStore,
    connector: C,
    clock: K,
    policy: CooldownPolicy,
    state: RunState,
}

impl<C: Connector, K: Clock> Watcher<C, K> {
    pub fn new(config: AppConfig, store: HistoryStore, connector: C, clock: K) -> Self {
        Self {
            config,
            store,
            connector,
            clock,
            policy: CooldownPolicy::default(),
            state: RunState::Init,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// One pass over the favorites snapshot. Any error ends the run.
    pub async fn run(&mut self) -> Result<RunSummary, RunError> {
        match self.run_inner().await {
            Ok(summary) => {
                self.transition(RunState::Done);
                info!(
                    "✅ Run complete: {} listings, {} notified, {} in cooldown, {} not actionable",
                    summary.listings, summary.notified, summary.suppressed, summary.skipped
                );
                Ok(summary)
            }
            Err(e) => {
                self.transition(RunState::Aborted(e.reason()));
                error!("❌ Run aborted ({:?}): {}", e.reason(), e);
                Err(e)
            }
        }
    }

    async fn run_inner(&mut self) -> Result<RunSummary, RunError> {
        let mut history = self.store.load()?;
        info!(
            "📋 Loaded {} alert history entries from {:?}",
            history.len(),
            self.store.path()
        );
        self.transition(RunState::HistoryLoaded);

        let settings = self.config.require()?;
        info!("🔑 Marketplace auth: {}", settings.credentials.describe());
        let (source, transport) = self.connector.connect(&settings)?;
        let notifier = Notifier::new(transport, settings.chat_id.clone());
        let normalizer = Normalizer::new(settings.timezone);
        self.transition(RunState::FetchingSnapshot);

        let snapshot = source.get_favorites().await.map_err(classify_fetch_error)?;
        info!("👁️  Fetched {} favorite listings", snapshot.len());
        self.transition(RunState::ProcessingEntries);

        let mut summary = RunSummary {
            listings: snapshot.len(),
            ..RunSummary::default()
        };
        for record in &snapshot {
            match self
                .process(record, &mut history, &normalizer, &notifier)
                .await?
            {
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Suppressed => summary.suppressed += 1,
                Outcome::Notified => summary.notified += 1,
            }
        }

        Ok(summary)
    }

    /// Normalize, check cooldown, notify, then record and persist before the
    /// next listing is touched.
    async fn process<T: MessageTransport>(
        &self,
        record: &ListingRecord,
        history: &mut AlertHistory,
        normalizer: &Normalizer,
        notifier: &Notifier<T>,
    ) -> Result<Outcome, RunError> {
        let entry_error = |source: EntryError| {
            error!("Listing {} failed: {}", record.label(), source);
            RunError::ProcessingError {
                listing: record.label(),
                source,
            }
        };

        let Some(payload) = normalizer.normalize(record).map_err(entry_error)? else {
            debug!("Listing {} has nothing to announce", record.label());
            return Ok(Outcome::Skipped);
        };
        // normalize() only succeeds for records carrying an id.
        let id = record.id.as_deref().unwrap_or_default();

        let now = self.clock.now();
        if !self.policy.can_alert(id, history, now) {
            debug!("Listing {} is still in cooldown", record.label());
            return Ok(Outcome::Suppressed);
        }

        info!("🛍️  {} has {} bag(s) available", record.label(), record.items_available);
        notifier.notify(&payload).await.map_err(entry_error)?;

        self.policy.record(history, id, now);
        self.store.save(history)?;
        Ok(Outcome::Notified)
    }

    fn transition(&mut self, next: RunState) {
        debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

pub fn classify_fetch_error(err: TgtgError) -> RunError {
    if err.is_auth_failure() {
        RunError::AuthFailure(err)
    } else {
        RunError::FetchFailure(err)
    }
}
