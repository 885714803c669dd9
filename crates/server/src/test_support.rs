// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: in-memory collaborators, builders, and
//! assertion helpers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::catalog::{MediaCatalog, SearchItem, SearchQuery};
use crate::clock::Clock;
use crate::hub::{BroadcastHub, DEFAULT_QUEUE_CAPACITY};
use crate::persist::StorageUnavailable;
use crate::settings::store::SettingsStore;
use crate::settings::{SettingsPatch, SettingsPersistence, SettingsRecord};
use crate::token::login::{LoginStates, LOGIN_TTL};
use crate::token::manager::TokenManager;
use crate::token::provider::{CodeGrant, OAuthProvider, ProviderError, RefreshGrant};
use crate::token::{TokenRecord, TokenStore, TokenUpdate};
use crate::transport::AppState;

/// Clock pinned by the test.
#[derive(Debug, Default)]
pub struct ManualClock {
    ms: AtomicU64,
}

impl ManualClock {
    pub fn at_secs(secs: u64) -> Self {
        Self { ms: AtomicU64::new(secs * 1000) }
    }

    pub fn set_secs(&self, secs: u64) {
        self.ms.store(secs * 1000, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.ms.fetch_add(secs * 1000, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }
}

/// In-memory [`TokenStore`] with switchable failures.
#[derive(Default)]
pub struct MemoryTokenStore {
    record: Mutex<Option<TokenRecord>>,
    pub fail_get: AtomicBool,
    pub fail_upsert: AtomicBool,
    pub upserts: AtomicU32,
    upsert_delay_ms: AtomicU64,
}

impl MemoryTokenStore {
    pub fn with_record(record: TokenRecord) -> Self {
        Self { record: Mutex::new(Some(record)), ..Self::default() }
    }

    pub fn snapshot(&self) -> Option<TokenRecord> {
        self.record.lock().clone()
    }

    pub fn set_fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_upsert(&self, fail: bool) {
        self.fail_upsert.store(fail, Ordering::SeqCst);
    }

    /// Make every upsert take `delay` before succeeding or failing.
    pub fn set_upsert_delay(&self, delay: Duration) {
        self.upsert_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> BoxFuture<'_, Result<Option<TokenRecord>, StorageUnavailable>> {
        async move {
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(StorageUnavailable("token store offline".to_owned()));
            }
            Ok(self.record.lock().clone())
        }
        .boxed()
    }

    fn upsert(&self, update: TokenUpdate) -> BoxFuture<'_, Result<TokenRecord, StorageUnavailable>> {
        async move {
            let delay = self.upsert_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if self.fail_upsert.load(Ordering::SeqCst) {
                return Err(StorageUnavailable("token store read-only".to_owned()));
            }
            self.upserts.fetch_add(1, Ordering::SeqCst);
            let mut slot = self.record.lock();
            let record = slot.take().unwrap_or_default().with_update(&update);
            *slot = Some(record.clone());
            Ok(record)
        }
        .boxed()
    }
}

/// In-memory [`SettingsPersistence`] with switchable failures.
#[derive(Default)]
pub struct MemorySettingsStore {
    record: Mutex<Option<SettingsRecord>>,
    pub fail_get: AtomicBool,
    pub fail_upsert: AtomicBool,
}

impl MemorySettingsStore {
    pub fn snapshot(&self) -> Option<SettingsRecord> {
        self.record.lock().clone()
    }

    pub fn set_fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_upsert(&self, fail: bool) {
        self.fail_upsert.store(fail, Ordering::SeqCst);
    }
}

impl SettingsPersistence for MemorySettingsStore {
    fn get(&self) -> BoxFuture<'_, Result<Option<SettingsRecord>, StorageUnavailable>> {
        async move {
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(StorageUnavailable("settings store offline".to_owned()));
            }
            Ok(self.record.lock().clone())
        }
        .boxed()
    }

    fn upsert(
        &self,
        patch: SettingsPatch,
        now_ms: u64,
    ) -> BoxFuture<'_, Result<SettingsRecord, StorageUnavailable>> {
        async move {
            if self.fail_upsert.load(Ordering::SeqCst) {
                return Err(StorageUnavailable("settings store read-only".to_owned()));
            }
            let mut slot = self.record.lock();
            let record = slot.take().unwrap_or_default().with_patch(&patch, now_ms);
            *slot = Some(record.clone());
            Ok(record)
        }
        .boxed()
    }
}

/// Scripted [`OAuthProvider`].
///
/// Without queued results, the n-th refresh returns `A{n+1}` valid for an
/// hour and a code exchange returns `A1`/`R1` valid for an hour. A held gate
/// parks every refresh call until released.
pub struct FakeProvider {
    pub refresh_calls: AtomicU32,
    pub code_calls: AtomicU32,
    refresh_results: Mutex<VecDeque<Result<RefreshGrant, ProviderError>>>,
    code_results: Mutex<VecDeque<Result<CodeGrant, ProviderError>>>,
    gate: watch::Sender<bool>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            refresh_calls: AtomicU32::new(0),
            code_calls: AtomicU32::new(0),
            refresh_results: Mutex::new(VecDeque::new()),
            code_results: Mutex::new(VecDeque::new()),
            gate,
        }
    }

    pub fn push_refresh(&self, result: Result<RefreshGrant, ProviderError>) {
        self.refresh_results.lock().push_back(result);
    }

    pub fn push_code(&self, result: Result<CodeGrant, ProviderError>) {
        self.code_results.lock().push_back(result);
    }

    /// Park refresh calls until [`Self::release`].
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn refreshes(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn codes(&self) -> u32 {
        self.code_calls.load(Ordering::SeqCst)
    }
}

impl OAuthProvider for FakeProvider {
    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, Result<CodeGrant, ProviderError>> {
        async move {
            self.code_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(result) = self.code_results.lock().pop_front() {
                return result;
            }
            if code.is_empty() {
                return Err(ProviderError::Rejected("invalid_grant (400 Bad Request)".to_owned()));
            }
            Ok(CodeGrant {
                access_token: "A1".to_owned(),
                refresh_token: "R1".to_owned(),
                expires_in: 3600,
            })
        }
        .boxed()
    }

    fn exchange_refresh_token<'a>(
        &'a self,
        _refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshGrant, ProviderError>> {
        async move {
            let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let mut gate = self.gate.subscribe();
            let _ = gate.wait_for(|open| *open).await;
            if let Some(result) = self.refresh_results.lock().pop_front() {
                return result;
            }
            Ok(RefreshGrant {
                access_token: format!("A{}", n + 1),
                refresh_token: None,
                expires_in: 3600,
            })
        }
        .boxed()
    }

    fn authorization_url(&self, state: &str) -> String {
        format!("https://accounts.example.test/authorize?client_id=test&state={state}")
    }
}

/// Catalog answering every search with one item and recording the tokens used.
#[derive(Default)]
pub struct FakeCatalog {
    tokens: Mutex<Vec<String>>,
    results: Mutex<VecDeque<Result<Vec<SearchItem>, ProviderError>>>,
}

impl FakeCatalog {
    pub fn push_result(&self, result: Result<Vec<SearchItem>, ProviderError>) {
        self.results.lock().push_back(result);
    }

    /// Access tokens presented, in call order.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }
}

impl MediaCatalog for FakeCatalog {
    fn search<'a>(
        &'a self,
        access_token: &'a str,
        query: &'a SearchQuery,
    ) -> BoxFuture<'a, Result<Vec<SearchItem>, ProviderError>> {
        async move {
            self.tokens.lock().push(access_token.to_owned());
            if let Some(result) = self.results.lock().pop_front() {
                return result;
            }
            Ok(vec![SearchItem {
                id: "x1".to_owned(),
                name: query.q.clone(),
                uri: format!("spotify:{}:x1", query.kind),
                kind: query.kind,
                image: None,
                artist: None,
                album: None,
                description: None,
            }])
        }
        .boxed()
    }
}

/// Builder for an [`AppState`] wired to in-memory collaborators.
pub struct AppStateBuilder {
    clock: Arc<ManualClock>,
    tokens: Arc<MemoryTokenStore>,
    settings: Arc<MemorySettingsStore>,
    provider: Arc<FakeProvider>,
    catalog: Arc<FakeCatalog>,
    admin_token: Option<String>,
    refresh_buffer: Duration,
    queue_capacity: usize,
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ManualClock::at_secs(1_700_000_000)),
            tokens: Arc::new(MemoryTokenStore::default()),
            settings: Arc::new(MemorySettingsStore::default()),
            provider: Arc::new(FakeProvider::new()),
            catalog: Arc::new(FakeCatalog::default()),
            admin_token: None,
            refresh_buffer: Duration::from_secs(300),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn admin_token(mut self, t: impl Into<String>) -> Self {
        self.admin_token = Some(t.into());
        self
    }

    pub fn token_record(self, record: TokenRecord) -> Self {
        Self { tokens: Arc::new(MemoryTokenStore::with_record(record)), ..self }
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    pub fn clock(&self) -> Arc<ManualClock> {
        Arc::clone(&self.clock)
    }

    pub fn token_store(&self) -> Arc<MemoryTokenStore> {
        Arc::clone(&self.tokens)
    }

    pub fn settings_store(&self) -> Arc<MemorySettingsStore> {
        Arc::clone(&self.settings)
    }

    pub fn provider(&self) -> Arc<FakeProvider> {
        Arc::clone(&self.provider)
    }

    pub fn catalog(&self) -> Arc<FakeCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn build(self) -> Arc<AppState> {
        let clock: Arc<dyn Clock> = self.clock;
        let provider: Arc<dyn OAuthProvider> = self.provider;
        Arc::new(AppState {
            settings: Arc::new(SettingsStore::new(self.settings, Arc::clone(&clock))),
            tokens: TokenManager::new(
                self.tokens,
                Arc::clone(&provider),
                Arc::clone(&clock),
                self.refresh_buffer,
            ),
            hub: BroadcastHub::new(self.queue_capacity),
            logins: Arc::new(LoginStates::new(clock, LOGIN_TTL)),
            provider,
            catalog: self.catalog,
            admin_token: self.admin_token,
            shutdown: CancellationToken::new(),
        })
    }
}

/// Extension trait to convert any `Display` error into `anyhow::Error`.
pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}

/// Spawn the HTTP/WebSocket server (and the settings relay) on a random port.
///
/// Returns the bound address and a join handle for the server task.
pub async fn spawn_http_server(
    state: Arc<AppState>,
) -> anyhow::Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
    crate::relay::spawn_settings_relay(
        Arc::clone(&state.settings),
        Arc::clone(&state.hub),
        state.shutdown.clone(),
    );
    let router = crate::transport::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((addr, handle))
}
