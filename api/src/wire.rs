/// Wire types for the paginated games endpoint.
/// Shape: `{ "meta": { "total_pages": 42, ... }, "data": [ {game}, ... ] }`
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct PageResponse {
    pub meta: PageMeta,
    /// Records are kept as raw JSON objects; the flattener decides their shape.
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PageMeta {
    pub total_pages: u32,
    pub current_page: Option<u32>,
    pub next_page: Option<u32>,
    pub per_page: Option<u32>,
    pub total_count: Option<u64>,
}
