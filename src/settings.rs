use anyhow::{Context, anyhow};
use hoops_api::client::{FetchConfig, FetchRequest};
use hoops_api::flatten::{Schema, ShapePolicy};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_IMAGE_DIR: &str = "img";
pub const DEFAULT_TOP_N: usize = 5;

/// Runtime settings, read from `HOOPSTATS_*` environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub fetch: FetchConfig,
    pub request: FetchRequest,
    /// Reload a previously written table instead of calling the endpoint.
    pub from_csv: Option<PathBuf>,
    pub image_dir: PathBuf,
    /// How many teams per conference enter the home-court comparison.
    /// `None` keeps every team.
    pub top_n: Option<usize>,
    /// Also write the results as JSON here.
    pub report_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            request: FetchRequest::default(),
            from_csv: None,
            image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
            top_n: Some(DEFAULT_TOP_N),
            report_path: None,
        }
    }
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source; unset or blank variables
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let mut settings = Settings::default();

        if let Some(endpoint) = var("HOOPSTATS_ENDPOINT") {
            settings.fetch.endpoint = endpoint;
        }
        settings.fetch.api_key = var("HOOPSTATS_API_KEY");
        if let Some(path) = var("HOOPSTATS_OUTPUT") {
            settings.fetch.output_path = PathBuf::from(path);
        }
        if let Some(size) = parse(&var, "HOOPSTATS_PAGE_SIZE")? {
            settings.fetch.page_size = size;
        }
        if let Some(ms) = parse::<u64>(&var, "HOOPSTATS_RATE_LIMIT_MS")? {
            settings.fetch.rate_limit_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse::<u64>(&var, "HOOPSTATS_TIMEOUT_SECS")? {
            settings.fetch.request_timeout = Duration::from_secs(secs);
        }
        settings.fetch.schema = match var("HOOPSTATS_SCHEMA").as_deref() {
            None | Some("infer") => None,
            Some("games") => Some(Schema::games()),
            Some(other) => {
                return Err(anyhow!("invalid HOOPSTATS_SCHEMA={other} (expected games or infer)"));
            }
        };
        if let Some(lenient) = parse::<bool>(&var, "HOOPSTATS_LENIENT")? {
            settings.fetch.shape_policy =
                if lenient { ShapePolicy::Lenient } else { ShapePolicy::Strict };
        }
        if let Some(start) = parse(&var, "HOOPSTATS_START_PAGE")? {
            settings.request.start_page = start;
        }
        settings.request.page_cap = parse(&var, "HOOPSTATS_MAX_PAGES")?;

        settings.from_csv = var("HOOPSTATS_FROM_CSV").map(PathBuf::from);
        if let Some(dir) = var("HOOPSTATS_IMAGE_DIR") {
            settings.image_dir = PathBuf::from(dir);
        }
        settings.top_n = match var("HOOPSTATS_TOP_N").as_deref() {
            None => Some(DEFAULT_TOP_N),
            Some("all") => None,
            Some(_) => parse::<usize>(&var, "HOOPSTATS_TOP_N")?.filter(|&n| n > 0),
        };
        settings.report_path = var("HOOPSTATS_REPORT_JSON").map(PathBuf::from);

        if settings.fetch.page_size == 0 {
            return Err(anyhow!("HOOPSTATS_PAGE_SIZE must be at least 1"));
        }
        Ok(settings)
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(name)
        .map(|raw| raw.parse::<T>().with_context(|| format!("invalid {name}={raw}")))
        .transpose()
}
