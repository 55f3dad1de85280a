//! In-memory stand-ins for the storage, OAuth and scrape seams.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Notify;

use crate::collectors::{FetchError, FetchQuery, JobSource, Period, ScrapeClient, ScrapeRequest};
use crate::error::AppError;
use crate::merge::{JobStore, UpsertOutcome};
use crate::models::credential::{OAuthCredential, SaveCredential};
use crate::models::job::{JobPosting, NewJobPosting, Platform};
use crate::models::preference::SearchPair;
use crate::sync::PreferenceSource;
use crate::vault::{CredentialStore, OAuthError, TokenCipher, TokenEndpoint, TokenResponse};

pub fn test_cipher() -> TokenCipher {
    TokenCipher::new("test-master-secret").unwrap()
}

pub fn posting(platform: Platform, raw_id: &str, title: &str) -> NewJobPosting {
    NewJobPosting {
        external_id: platform.external_id(raw_id),
        platform,
        title: title.to_string(),
        company: "Acme".to_string(),
        location: Some("Paris, France".to_string()),
        description: None,
        requirements: None,
        skills: Vec::new(),
        salary_min: None,
        salary_max: None,
        salary_currency: None,
        job_type: None,
        remote: false,
        url: None,
        posted_date: Utc::now(),
        raw_data: None,
    }
}

// Credentials

#[derive(Default)]
pub struct MemoryCredentialStore {
    rows: Mutex<HashMap<i32, OAuthCredential>>,
}

impl MemoryCredentialStore {
    pub fn get(&self, user_id: i32) -> Option<OAuthCredential> {
        self.rows.lock().unwrap().get(&user_id).cloned()
    }

    pub fn corrupt_access_token(&self, user_id: i32) {
        if let Some(row) = self.rows.lock().unwrap().get_mut(&user_id) {
            row.access_token = "not-a-valid-ciphertext".to_string();
        }
    }
}

fn credential_row(id: i32, created_at: DateTime<Utc>, input: &SaveCredential) -> OAuthCredential {
    OAuthCredential {
        id,
        user_id: input.user_id,
        access_token: input.access_token.clone(),
        refresh_token: input.refresh_token.clone(),
        expires_at: Some(input.expires_at),
        token_type: input.token_type.clone(),
        scope: input.scope.clone(),
        created_at,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find(&self, user_id: i32) -> Result<Option<OAuthCredential>, AppError> {
        Ok(self.get(user_id))
    }

    async fn save(&self, credential: &SaveCredential) -> Result<OAuthCredential, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let next_id = rows.len() as i32 + 1;
        let (id, created_at) = rows
            .get(&credential.user_id)
            .map(|row| (row.id, row.created_at))
            .unwrap_or((next_id, Utc::now()));
        let row = credential_row(id, created_at, credential);
        rows.insert(credential.user_id, row.clone());
        Ok(row)
    }

    // Mirrors the `expires_at < $4` guard of `OAuthCredential::update_refreshed`.
    async fn update_refreshed(&self, credential: &SaveCredential) -> Result<OAuthCredential, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let existing = rows
            .get(&credential.user_id)
            .filter(|row| row.expires_at.is_none_or(|at| at < credential.expires_at))
            .ok_or_else(|| AppError::Conflict("credential missing or expiry not advancing".into()))?;
        let row = credential_row(existing.id, existing.created_at, credential);
        rows.insert(credential.user_id, row.clone());
        Ok(row)
    }

    async fn delete(&self, user_id: i32) -> Result<bool, AppError> {
        Ok(self.rows.lock().unwrap().remove(&user_id).is_some())
    }
}

#[derive(Default)]
pub struct FakeTokenEndpoint {
    pub refresh_calls: AtomicU32,
    refresh_responses: Mutex<VecDeque<Result<TokenResponse, OAuthError>>>,
    exchange_responses: Mutex<VecDeque<Result<TokenResponse, OAuthError>>>,
    refreshed_with: Mutex<Vec<String>>,
}

impl FakeTokenEndpoint {
    pub fn push_refresh(&self, response: Result<TokenResponse, OAuthError>) {
        self.refresh_responses.lock().unwrap().push_back(response);
    }

    pub fn push_exchange(&self, response: Result<TokenResponse, OAuthError>) {
        self.exchange_responses.lock().unwrap().push_back(response);
    }

    /// Refresh tokens presented so far, in order.
    pub fn refreshed_with(&self) -> Vec<String> {
        self.refreshed_with.lock().unwrap().clone()
    }
}

fn unavailable() -> OAuthError {
    OAuthError::Rejected {
        status: 500,
        code: None,
        description: Some("no scripted response".into()),
    }
}

#[async_trait]
impl TokenEndpoint for FakeTokenEndpoint {
    async fn exchange_code(&self, _code: &str) -> Result<TokenResponse, OAuthError> {
        self.exchange_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(unavailable()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, OAuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refreshed_with.lock().unwrap().push(refresh_token.to_string());
        self.refresh_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(unavailable()))
    }
}

// Scrape service

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub keywords: String,
    pub location: String,
    pub limit: u32,
    pub platform: Platform,
    pub period: Period,
}

#[derive(Default)]
pub struct FakeScrapeClient {
    pub calls: AtomicU32,
    responses: Mutex<VecDeque<Result<Vec<Value>, FetchError>>>,
    requests: Mutex<Vec<(RecordedRequest, Option<String>)>>,
}

impl FakeScrapeClient {
    pub fn push(&self, response: Result<Vec<Value>, FetchError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn bearers(&self) -> Vec<Option<String>> {
        self.requests.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
    }
}

#[async_trait]
impl ScrapeClient for FakeScrapeClient {
    async fn scrape(
        &self,
        request: &ScrapeRequest<'_>,
        bearer: Option<&str>,
    ) -> Result<Vec<Value>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let recorded = RecordedRequest {
            keywords: request.keywords.to_string(),
            location: request.location.to_string(),
            limit: request.limit,
            platform: request.platform,
            period: request.period,
        };
        self.requests
            .lock()
            .unwrap()
            .push((recorded, bearer.map(String::from)));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// Job storage

#[derive(Default)]
struct JobRows {
    next_id: i32,
    by_external_id: HashMap<String, JobPosting>,
}

impl JobRows {
    fn upsert(&mut self, input: &NewJobPosting) -> UpsertOutcome {
        let now = Utc::now();
        if let Some(row) = self.by_external_id.get_mut(&input.external_id) {
            row.title = input.title.clone();
            row.company = input.company.clone();
            row.location = input.location.clone();
            row.description = input.description.clone();
            row.requirements = input.requirements.clone();
            row.skills = input.skills.clone();
            row.salary_min = input.salary_min;
            row.salary_max = input.salary_max;
            row.salary_currency = input.salary_currency.clone();
            row.raw_data = input.raw_data.clone();
            row.updated_at = now;
            return UpsertOutcome::Updated;
        }

        self.next_id += 1;
        let row = JobPosting {
            id: self.next_id,
            external_id: input.external_id.clone(),
            platform: input.platform.as_str().to_string(),
            title: input.title.clone(),
            company: input.company.clone(),
            location: input.location.clone(),
            description: input.description.clone(),
            requirements: input.requirements.clone(),
            skills: input.skills.clone(),
            salary_min: input.salary_min,
            salary_max: input.salary_max,
            salary_currency: input.salary_currency.clone(),
            job_type: input.job_type.clone(),
            remote: input.remote,
            url: input.url.clone(),
            posted_date: Some(input.posted_date),
            raw_data: input.raw_data.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.by_external_id.insert(input.external_id.clone(), row);
        UpsertOutcome::Inserted
    }
}

#[derive(Default)]
pub struct MemoryJobStore {
    rows: Mutex<JobRows>,
    failing: Mutex<Vec<String>>,
}

impl MemoryJobStore {
    pub fn get(&self, external_id: &str) -> Option<JobPosting> {
        self.rows.lock().unwrap().by_external_id.get(external_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().by_external_id.len()
    }

    /// Make every write of `external_id` fail.
    pub fn fail_on(&self, external_id: &str) {
        self.failing.lock().unwrap().push(external_id.to_string());
    }

    fn check(&self, posting: &NewJobPosting) -> Result<(), AppError> {
        if self.failing.lock().unwrap().contains(&posting.external_id) {
            return Err(AppError::Internal(format!("write of {} failed", posting.external_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    // `JobRows::upsert` mirrors the `ON CONFLICT` column list and the
    // `xmax = 0` insert flag of `JobPosting::upsert`.
    async fn upsert(&self, posting: &NewJobPosting) -> Result<UpsertOutcome, AppError> {
        self.check(posting)?;
        Ok(self.rows.lock().unwrap().upsert(posting))
    }

    async fn upsert_batch(&self, postings: &[NewJobPosting]) -> Result<Vec<UpsertOutcome>, AppError> {
        for posting in postings {
            self.check(posting)?;
        }
        let mut rows = self.rows.lock().unwrap();
        Ok(postings.iter().map(|p| rows.upsert(p)).collect())
    }

    async fn deactivate_posted_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let mut changed = 0;
        for row in rows.by_external_id.values_mut() {
            if row.is_active && row.posted_date.is_some_and(|d| d < cutoff) {
                row.is_active = false;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn purge_inactive_posted_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.by_external_id.len();
        rows.by_external_id
            .retain(|_, row| row.is_active || !row.posted_date.is_some_and(|d| d < cutoff));
        Ok((before - rows.by_external_id.len()) as u64)
    }
}

// Sync inputs

pub struct StaticPreferences(pub Vec<SearchPair>);

#[async_trait]
impl PreferenceSource for StaticPreferences {
    async fn search_pairs(&self) -> Result<Vec<SearchPair>, AppError> {
        Ok(self.0.clone())
    }
}

pub struct FakeSource {
    platform: Platform,
    /// Notified every time a fetch begins.
    pub started: Notify,
    gate: Mutex<Option<Arc<Notify>>>,
    panic_next: AtomicBool,
    responses: Mutex<VecDeque<Result<Vec<NewJobPosting>, FetchError>>>,
    queries: Mutex<Vec<FetchQuery>>,
}

impl FakeSource {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            started: Notify::new(),
            gate: Mutex::new(None),
            panic_next: AtomicBool::new(false),
            responses: Mutex::new(VecDeque::new()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Hold every fetch until `gate` is notified.
    pub fn block_on(&self, gate: Arc<Notify>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub fn panic_next(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    pub fn push(&self, response: Result<Vec<NewJobPosting>, FetchError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn queries(&self) -> Vec<FetchQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobSource for FakeSource {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<NewJobPosting>, FetchError> {
        self.queries.lock().unwrap().push(query.clone());
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("{} source crashed", self.platform);
        }
        self.started.notify_one();

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}
