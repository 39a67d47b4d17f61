//! The exchange rate service.
//!
//! A [`RatesService`] handle talks to a single worker task over a bounded
//! channel. The worker owns the store namespace and the provider and handles
//! one message at a time, so queries, scheduled refreshes and historic
//! preloads never overlap and `latest_rates`/`last_updated` are only ever
//! written by that one loop.
//!
//! A timer task posts `Refresh` every `refresh_interval_ms`. It holds a weak
//! sender, so dropping every handle stops both tasks.

use crate::core::cache::{Namespace, RateStore};
use crate::core::config::AppConfig;
use crate::core::error::RatesError;
use crate::core::log::{LogLevels, emit};
use crate::core::provider::{FetchOutcome, RateProvider};
use crate::core::rates::{CacheKey, CacheValue, RateSnapshot};
use crate::providers::build_provider;
use crate::store::open_store;
use chrono::{DateTime, NaiveDate, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

const MAILBOX_SIZE: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, RatesError>>;

enum Message {
    Latest(Reply<RateSnapshot>),
    Historic(NaiveDate, Reply<RateSnapshot>),
    LastUpdated(Reply<DateTime<Utc>>),
    Refresh,
    Preload(NaiveDate),
    Clear(Reply<()>),
    Shutdown(Reply<()>),
}

#[derive(Clone)]
pub struct RatesService {
    config: Arc<AppConfig>,
    sender: mpsc::Sender<Message>,
}

impl RatesService {
    /// Starts a service with the store, transport and provider named in
    /// `config`.
    pub async fn start(config: AppConfig) -> Result<Self, RatesError> {
        config.validate()?;
        let store = open_store(&config)?;
        let provider = build_provider(&config)?;
        Self::start_with(config, store, provider).await
    }

    /// Starts a service on an explicit store and provider.
    ///
    /// The first refresh is queued before this returns, so a cold cache is
    /// warmed without waiting a full interval. Historic preloads are queued
    /// in the background.
    pub async fn start_with(
        config: AppConfig,
        store: Arc<dyn RateStore>,
        provider: Arc<dyn RateProvider>,
    ) -> Result<Self, RatesError> {
        config.validate()?;
        let namespace = config.namespace();
        store.init(&namespace).await?;

        emit(
            config.log.info,
            format_args!(
                "Starting exchange rate service {} with provider {}",
                namespace,
                provider.name()
            ),
        );
        emit(
            config.log.info,
            format_args!(
                "Exchange rates will be refreshed every {} seconds",
                config.refresh_interval().as_secs_f64()
            ),
        );

        let (sender, receiver) = mpsc::channel(MAILBOX_SIZE);
        let worker = Worker {
            namespace,
            store,
            provider,
            log: config.log,
        };
        tokio::spawn(worker.run(receiver));

        sender
            .send(Message::Refresh)
            .await
            .map_err(|_| RatesError::ServiceStopped)?;
        spawn_timer(sender.downgrade(), config.refresh_interval());
        if let Some(preload) = config.preload {
            spawn_preload(sender.downgrade(), preload.dates());
        }

        Ok(Self {
            config: Arc::new(config),
            sender,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Latest rates from the cache, fetching synchronously on a miss.
    pub async fn latest_rates(&self) -> Result<RateSnapshot, RatesError> {
        self.request(Message::Latest).await
    }

    /// Rates for `date` from the cache, fetching synchronously on a miss.
    pub async fn historic_rates(&self, date: NaiveDate) -> Result<RateSnapshot, RatesError> {
        self.request(|reply| Message::Historic(date, reply)).await
    }

    /// When the latest rates were last replaced by a fresh snapshot.
    pub async fn last_updated(&self) -> Result<DateTime<Utc>, RatesError> {
        self.request(Message::LastUpdated).await
    }

    /// Queues a refresh outside the regular schedule.
    pub async fn refresh(&self) -> Result<(), RatesError> {
        self.sender
            .send(Message::Refresh)
            .await
            .map_err(|_| RatesError::ServiceStopped)
    }

    /// Drops every cached record of this service's namespace along with the
    /// transport validators.
    pub async fn clear_cache(&self) -> Result<(), RatesError> {
        self.request(Message::Clear).await
    }

    /// Stops the worker after the messages already queued.
    pub async fn shutdown(&self) -> Result<(), RatesError> {
        self.request(Message::Shutdown).await
    }

    async fn request<T>(&self, message: impl FnOnce(Reply<T>) -> Message) -> Result<T, RatesError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(message(reply))
            .await
            .map_err(|_| RatesError::ServiceStopped)?;
        response.await.map_err(|_| RatesError::ServiceStopped)?
    }
}

fn spawn_timer(sender: mpsc::WeakSender<Message>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let Some(sender) = sender.upgrade() else {
                break;
            };
            if sender.send(Message::Refresh).await.is_err() {
                break;
            }
        }
        debug!("Refresh timer stopped");
    });
}

fn spawn_preload(sender: mpsc::WeakSender<Message>, dates: Vec<NaiveDate>) {
    tokio::spawn(async move {
        for date in dates {
            let Some(sender) = sender.upgrade() else {
                break;
            };
            if sender.send(Message::Preload(date)).await.is_err() {
                break;
            }
        }
    });
}

struct Worker {
    namespace: Namespace,
    store: Arc<dyn RateStore>,
    provider: Arc<dyn RateProvider>,
    log: LogLevels,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::Receiver<Message>) {
        while let Some(message) = receiver.recv().await {
            match message {
                Message::Latest(reply) => {
                    let _ = reply.send(self.latest_rates().await);
                }
                Message::Historic(date, reply) => {
                    let _ = reply.send(self.historic_rates(date).await);
                }
                Message::LastUpdated(reply) => {
                    let _ = reply.send(self.last_updated().await);
                }
                Message::Refresh => self.refresh().await,
                Message::Preload(date) => self.preload(date).await,
                Message::Clear(reply) => {
                    let _ = reply.send(self.clear().await);
                }
                Message::Shutdown(reply) => {
                    let _ = reply.send(self.terminate().await);
                    return;
                }
            }
        }
        if let Err(e) = self.terminate().await {
            debug!("Failed to terminate store namespace {}: {}", self.namespace, e);
        }
    }

    async fn cached_rates(&self, key: &CacheKey) -> Option<RateSnapshot> {
        self.store
            .get(&self.namespace, key)
            .await
            .and_then(CacheValue::into_rates)
    }

    async fn latest_rates(&self) -> Result<RateSnapshot, RatesError> {
        if let Some(snapshot) = self.cached_rates(&CacheKey::LatestRates).await {
            return Ok(snapshot);
        }
        let snapshot = self
            .fetch_fresh("latest", || self.provider.get_latest())
            .await?;
        self.store_latest(snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn historic_rates(&self, date: NaiveDate) -> Result<RateSnapshot, RatesError> {
        let key = CacheKey::HistoricRates(date);
        if let Some(snapshot) = self.cached_rates(&key).await {
            return Ok(snapshot);
        }
        let snapshot = self
            .fetch_fresh(&format!("historic ({date})"), || {
                self.provider.get_historic(date)
            })
            .await?;
        self.store_historic(date, snapshot).await
    }

    async fn last_updated(&self) -> Result<DateTime<Utc>, RatesError> {
        self.store
            .get(&self.namespace, &CacheKey::LastUpdated)
            .await
            .and_then(CacheValue::into_timestamp)
            .ok_or(RatesError::NeverUpdated)
    }

    /// Scheduled refresh: always asks the provider, whatever is cached.
    async fn refresh(&self) {
        match self.provider.get_latest().await {
            Ok(FetchOutcome::Rates(snapshot)) => {
                emit(
                    self.log.success,
                    format_args!(
                        "Retrieved latest exchange rates from {}",
                        self.provider.name()
                    ),
                );
                self.store_latest(snapshot).await;
            }
            Ok(FetchOutcome::NotModified) => {
                emit(
                    self.log.success,
                    format_args!(
                        "Latest exchange rates from {} are unchanged",
                        self.provider.name()
                    ),
                );
                if self.cached_rates(&CacheKey::LatestRates).await.is_none() {
                    // Nothing to keep; make the next tick download the table.
                    self.provider.forget_validators().await;
                }
            }
            Err(e) => emit(
                self.log.failure,
                format_args!("Failed to retrieve latest exchange rates: {e}"),
            ),
        }
    }

    async fn preload(&self, date: NaiveDate) {
        if self
            .store
            .get(&self.namespace, &CacheKey::HistoricRates(date))
            .await
            .is_some()
        {
            debug!("Historic rates for {} already stored", date);
            return;
        }
        // failures are logged by `historic_rates`
        let _ = self.historic_rates(date).await;
    }

    async fn clear(&self) -> Result<(), RatesError> {
        self.store.clear(&self.namespace).await?;
        self.provider.forget_validators().await;
        Ok(())
    }

    async fn terminate(&self) -> Result<(), RatesError> {
        self.store.terminate(&self.namespace).await
    }

    /// Fetches a snapshot for a cache miss.
    ///
    /// "Not modified" is useless when nothing is cached, so validators are
    /// dropped and the fetch is repeated once.
    async fn fetch_fresh<F, Fut>(&self, what: &str, fetch: F) -> Result<RateSnapshot, RatesError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<FetchOutcome, RatesError>>,
    {
        let mut outcome = fetch().await;
        if matches!(outcome, Ok(FetchOutcome::NotModified)) {
            debug!("Provider reported {} rates unchanged on a cache miss", what);
            self.provider.forget_validators().await;
            outcome = fetch().await;
        }

        match outcome {
            Ok(FetchOutcome::Rates(snapshot)) => {
                emit(
                    self.log.success,
                    format_args!(
                        "Retrieved {} exchange rates from {}",
                        what,
                        self.provider.name()
                    ),
                );
                Ok(snapshot)
            }
            Ok(FetchOutcome::NotModified) => {
                let e = RatesError::NotModifiedWithoutData {
                    provider: self.provider.name().to_string(),
                };
                emit(
                    self.log.failure,
                    format_args!("Failed to retrieve {what} exchange rates: {e}"),
                );
                Err(e)
            }
            Err(e) => {
                emit(
                    self.log.failure,
                    format_args!("Failed to retrieve {what} exchange rates: {e}"),
                );
                Err(e)
            }
        }
    }

    async fn store_latest(&self, snapshot: RateSnapshot) {
        if let Err(e) = self
            .store
            .put_latest(&self.namespace, snapshot, Utc::now())
            .await
        {
            emit(
                self.log.failure,
                format_args!("Failed to store latest exchange rates: {e}"),
            );
        }
    }

    /// Historic snapshots are written once; an existing record wins.
    async fn store_historic(
        &self,
        date: NaiveDate,
        snapshot: RateSnapshot,
    ) -> Result<RateSnapshot, RatesError> {
        let key = CacheKey::HistoricRates(date);
        if let Some(existing) = self.cached_rates(&key).await {
            return Ok(existing);
        }
        match self
            .store
            .put(&self.namespace, key, CacheValue::Rates(snapshot.clone()))
            .await
        {
            Ok(_) => {}
            Err(e) => emit(
                self.log.failure,
                format_args!("Failed to store historic exchange rates for {date}: {e}"),
            ),
        }
        Ok(snapshot)
    }
}
