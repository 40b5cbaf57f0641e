use crate::Table;
use crate::csv_io::CsvError;
use crate::flatten::{Schema, ShapeError, ShapePolicy, flatten_page};
use crate::wire::PageResponse;
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use reqwest::{Client, Url};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

pub type ApiResult<T> = Result<T, ApiError>;

pub const DEFAULT_ENDPOINT: &str = "https://www.balldontlie.io/api/v1/games";
pub const DEFAULT_OUTPUT_PATH: &str = "data/games_data.csv";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// The public endpoint throttles bursts; one request per 800 ms stays under it.
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_millis(800);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a fetch needs to know about where to read and write.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub endpoint: String,
    pub output_path: PathBuf,
    pub page_size: u32,
    /// Minimum spacing between the starts of consecutive requests.
    /// Zero disables rate limiting.
    pub rate_limit_delay: Duration,
    pub request_timeout: Duration,
    /// Sent as the `postseason` query parameter.
    pub postseason: bool,
    /// Sent verbatim in the `Authorization` header when present.
    pub api_key: Option<String>,
    /// Declared record layout. `None` infers it from the first record fetched.
    pub schema: Option<Schema>,
    pub shape_policy: ShapePolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            page_size: DEFAULT_PAGE_SIZE,
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            postseason: true,
            api_key: None,
            schema: None,
            shape_policy: ShapePolicy::Strict,
        }
    }
}

/// Which pages to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    /// 1-based page to start from.
    pub start_page: u32,
    /// Highest page number to fetch; the endpoint's `total_pages` wins when smaller.
    pub page_cap: Option<u32>,
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self { start_page: 1, page_cap: None }
    }
}

impl FetchRequest {
    pub fn last_page(&self, available: u32) -> u32 {
        match self.page_cap {
            Some(cap) => available.min(cap),
            None => available,
        }
    }
}

/// Shared flag a caller can set to stop a fetch between pages.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub first_page: u32,
    pub last_page: u32,
    pub pages_fetched: u32,
    pub rows: usize,
    pub output_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl FetchReport {
    pub fn elapsed(&self) -> TimeDelta {
        self.finished_at - self.started_at
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub table: Table,
    pub report: FetchReport,
}

#[derive(Debug)]
pub enum ApiError {
    Network(reqwest::Error, String),
    Api(reqwest::Error, String),
    Parsing(reqwest::Error, String),
    InvalidEndpoint(String),
    Shape(ShapeError),
    Write(CsvError),
    Cancelled { completed_pages: u32 },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            ApiError::Api(e, url) => write!(f, "API error for {url}: {e}"),
            ApiError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
            ApiError::InvalidEndpoint(msg) => write!(f, "Invalid endpoint: {msg}"),
            ApiError::Shape(e) => write!(f, "Record shape mismatch at {e}"),
            ApiError::Write(e) => write!(f, "Could not write table: {e}"),
            ApiError::Cancelled { completed_pages } => {
                write!(f, "Fetch cancelled after {completed_pages} page(s)")
            }
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Network(e, _) | ApiError::Api(e, _) | ApiError::Parsing(e, _) => Some(e),
            ApiError::Shape(e) => Some(e),
            ApiError::Write(e) => Some(e),
            ApiError::InvalidEndpoint(_) | ApiError::Cancelled { .. } => None,
        }
    }
}

impl From<ShapeError> for ApiError {
    fn from(e: ShapeError) -> Self {
        ApiError::Shape(e)
    }
}

impl From<CsvError> for ApiError {
    fn from(e: CsvError) -> Self {
        ApiError::Write(e)
    }
}

/// Spaces request starts at least `delay` apart. The first wait returns
/// immediately.
struct RateLimiter {
    interval: Option<Interval>,
}

impl RateLimiter {
    fn new(delay: Duration) -> Self {
        let interval = (!delay.is_zero()).then(|| {
            let mut interval = tokio::time::interval(delay);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        Self { interval }
    }

    async fn wait(&mut self) {
        if let Some(interval) = &mut self.interval {
            interval.tick().await;
        }
    }
}

/// Paginated games client.
#[derive(Debug, Clone)]
pub struct GamesApi {
    client: Client,
    config: FetchConfig,
}

impl GamesApi {
    pub fn new(config: FetchConfig) -> ApiResult<Self> {
        // Fail early on a bad endpoint rather than on the first page.
        Url::parse(&config.endpoint)
            .map_err(|e| ApiError::InvalidEndpoint(format!("{}: {e}", config.endpoint)))?;
        let client = Client::builder()
            .user_agent(concat!("hoopstats/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e, config.endpoint.clone()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch every requested page, flatten the records, write the table to
    /// `output_path`, and return it.
    ///
    /// One metadata request reads `total_pages`, then pages `start..=last` are
    /// fetched in order. Any failure aborts the whole fetch and nothing is
    /// written.
    pub async fn fetch_games(&self, request: FetchRequest, cancel: &CancelFlag) -> ApiResult<FetchOutcome> {
        let started_at = Utc::now();
        let mut limiter = RateLimiter::new(self.config.rate_limit_delay);
        let first_page = request.start_page.max(1);

        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled { completed_pages: 0 });
        }
        limiter.wait().await;
        let head = self.fetch_page(first_page).await?;
        let last_page = request.last_page(head.meta.total_pages);
        info!(
            "endpoint reports {} page(s); fetching pages {first_page}..={last_page}",
            head.meta.total_pages
        );
        if first_page > last_page {
            warn!("start page {first_page} is past the last page {last_page}; nothing to fetch");
        }

        let mut schema = self.config.schema.clone();
        let mut table: Option<Table> = None;
        let mut pages_fetched = 0;

        for page in first_page..=last_page {
            if cancel.is_cancelled() {
                warn!("fetch cancelled before page {page}");
                return Err(ApiError::Cancelled { completed_pages: pages_fetched });
            }
            limiter.wait().await;
            let response = self.fetch_page(page).await?;
            pages_fetched += 1;

            // The first record seen fixes the layout for every later page.
            if schema.is_none() {
                schema = response.data.first().map(Schema::infer);
            }
            let Some(schema) = schema.as_ref() else {
                debug!("page {page}/{last_page} is empty");
                continue;
            };

            let batch = flatten_page(&response.data, schema, page, self.config.shape_policy)?;
            debug!("page {page}/{last_page}: {} record(s)", batch.len());
            match table.as_mut() {
                Some(table) => table.append(batch),
                None => table = Some(batch),
            }
        }

        let table = table.unwrap_or_else(|| {
            schema.map(|s| Table::new(s.column_names())).unwrap_or_default()
        });
        table.write_csv(&self.config.output_path)?;

        let report = FetchReport {
            first_page,
            last_page,
            pages_fetched,
            rows: table.len(),
            output_path: self.config.output_path.clone(),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "fetched {} row(s) from {pages_fetched} page(s) into {}",
            report.rows,
            report.output_path.display()
        );
        Ok(FetchOutcome { table, report })
    }

    /// Fetch and decode a single page.
    pub async fn fetch_page(&self, page: u32) -> ApiResult<PageResponse> {
        let url = self.page_url(page)?;
        let mut request = self.client.get(url.clone()).timeout(self.config.request_timeout);
        if let Some(key) = &self.config.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url.to_string()))?;

        match response.error_for_status() {
            Ok(res) => res
                .json::<PageResponse>()
                .await
                .map_err(|e| ApiError::Parsing(e, url.to_string())),
            Err(e) => Err(ApiError::Api(e, url.to_string())),
        }
    }

    fn page_url(&self, page: u32) -> ApiResult<Url> {
        let params = [
            ("page", page.to_string()),
            ("per_page", self.config.page_size.to_string()),
            ("postseason", self.config.postseason.to_string()),
        ];
        Url::parse_with_params(&self.config.endpoint, &params)
            .map_err(|e| ApiError::InvalidEndpoint(format!("{}: {e}", self.config.endpoint)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_page_uses_total_without_cap() {
        assert_eq!(FetchRequest::default().last_page(12), 12);
    }

    #[test]
    fn last_page_is_min_of_total_and_cap() {
        let capped = FetchRequest { start_page: 1, page_cap: Some(3) };
        assert_eq!(capped.last_page(12), 3);
        assert_eq!(capped.last_page(2), 2);
    }

    #[test]
    fn page_url_carries_query_parameters() {
        let api = GamesApi::new(FetchConfig {
            endpoint: "https://example.test/api/v1/games".into(),
            page_size: 25,
            ..Default::default()
        })
        .unwrap();
        let url = api.page_url(7).unwrap();
        assert_eq!(url.as_str(), "https://example.test/api/v1/games?page=7&per_page=25&postseason=true");
    }

    #[test]
    fn invalid_endpoint_is_rejected_up_front() {
        let err = GamesApi::new(FetchConfig { endpoint: "not a url".into(), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidEndpoint(_)));
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn default_config_matches_public_endpoint_conventions() {
        let config = FetchConfig::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.rate_limit_delay, Duration::from_millis(800));
        assert_eq!(config.output_path, PathBuf::from("data/games_data.csv"));
        assert!(config.postseason);
        assert_eq!(config.shape_policy, ShapePolicy::Strict);
    }

    #[tokio::test]
    async fn rate_limiter_spaces_ticks() {
        let mut limiter = RateLimiter::new(Duration::from_millis(40));
        let start = tokio::time::Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn zero_delay_disables_rate_limiter() {
        let mut limiter = RateLimiter::new(Duration::ZERO);
        assert!(limiter.interval.is_none());
        limiter.wait().await;
    }
}
