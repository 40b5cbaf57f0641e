use hoops_api::Cell;
use hoops_api::client::{ApiError, CancelFlag, FetchConfig, FetchRequest, GamesApi};
use hoops_api::flatten::{MismatchKind, Schema, ShapePolicy};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{Value, json};
use std::path::Path;
use std::time::{Duration, Instant};

fn game(id: i64, home: (&str, &str), visitor: (&str, &str), score: (i64, i64)) -> Value {
    json!({
        "id": id,
        "date": "2019-04-13T00:00:00.000Z",
        "home_team": {"id": id * 10, "full_name": home.0, "conference": home.1},
        "home_team_score": score.0,
        "postseason": true,
        "visitor_team": {"id": id * 10 + 1, "full_name": visitor.0, "conference": visitor.1},
        "visitor_team_score": score.1,
    })
}

fn sample_games(count: i64) -> Vec<Value> {
    (1..=count)
        .map(|id| game(id, ("Boston Celtics", "East"), ("Denver Nuggets", "West"), (100 + id, 95)))
        .collect()
}

fn page_body(total_pages: u32, page: u32, data: &[Value]) -> String {
    json!({
        "data": data,
        "meta": {"total_pages": total_pages, "current_page": page, "per_page": data.len()}
    })
    .to_string()
}

async fn mock_page(
    server: &mut ServerGuard,
    page: u32,
    per_page: u32,
    body: String,
    hits: usize,
) -> Mock {
    server
        .mock("GET", "/games")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), page.to_string()),
            Matcher::UrlEncoded("per_page".into(), per_page.to_string()),
            Matcher::UrlEncoded("postseason".into(), "true".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

fn config(server: &ServerGuard, output: &Path, per_page: u32) -> FetchConfig {
    FetchConfig {
        endpoint: format!("{}/games", server.url()),
        output_path: output.to_owned(),
        page_size: per_page,
        rate_limit_delay: Duration::ZERO,
        ..Default::default()
    }
}

#[tokio::test]
async fn fetches_all_pages_and_writes_csv() {
    let mut server = mockito::Server::new_async().await;
    let games = sample_games(3);
    // Page 1 is requested twice: once for the metadata, once for data.
    let p1 = mock_page(&mut server, 1, 2, page_body(2, 1, &games[..2]), 2).await;
    let p2 = mock_page(&mut server, 2, 2, page_body(2, 2, &games[2..]), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("data/games_data.csv");
    let api = GamesApi::new(config(&server, &output, 2)).unwrap();
    let outcome = api.fetch_games(FetchRequest::default(), &CancelFlag::new()).await.unwrap();

    p1.assert_async().await;
    p2.assert_async().await;

    let table = &outcome.table;
    assert_eq!(table.len(), 3);
    assert_eq!(outcome.report.pages_fetched, 2);
    assert_eq!(outcome.report.rows, 3);
    assert!(table.column_index("home_team").is_none());
    assert!(table.column_index("visitor_team").is_none());
    let conferences: Vec<&str> =
        table.column("visitor_team_conference").unwrap().filter_map(Cell::as_str).collect();
    assert_eq!(conferences, ["West", "West", "West"]);
    let ids: Vec<i64> = table.column("id").unwrap().filter_map(Cell::as_i64).collect();
    assert_eq!(ids, [1, 2, 3]);

    let written = std::fs::read_to_string(&output).unwrap();
    let header = written.lines().next().unwrap();
    assert_eq!(
        header,
        "id,date,home_team_id,home_team_full_name,home_team_conference,home_team_score,\
         postseason,visitor_team_id,visitor_team_full_name,visitor_team_conference,visitor_team_score"
    );
    assert_eq!(written.lines().count(), 4);
}

#[tokio::test]
async fn page_cap_limits_requested_pages() {
    let mut server = mockito::Server::new_async().await;
    let games = sample_games(3);
    let p1 = mock_page(&mut server, 1, 1, page_body(3, 1, &games[..1]), 2).await;
    let p2 = mock_page(&mut server, 2, 1, page_body(3, 2, &games[1..2]), 1).await;
    let p3 = mock_page(&mut server, 3, 1, page_body(3, 3, &games[2..]), 0).await;

    let dir = tempfile::tempdir().unwrap();
    let api = GamesApi::new(config(&server, &dir.path().join("out.csv"), 1)).unwrap();
    let request = FetchRequest { start_page: 1, page_cap: Some(2) };
    let outcome = api.fetch_games(request, &CancelFlag::new()).await.unwrap();

    p1.assert_async().await;
    p2.assert_async().await;
    p3.assert_async().await;
    assert_eq!(outcome.table.len(), 2);
    assert_eq!(outcome.report.last_page, 2);
}

#[tokio::test]
async fn row_count_does_not_depend_on_page_size() {
    let mut server = mockito::Server::new_async().await;
    let games = sample_games(4);
    let _page1 = mock_page(&mut server, 1, 2, page_body(2, 1, &games[..2]), 2).await;
    let _page2 = mock_page(&mut server, 2, 2, page_body(2, 2, &games[2..]), 1).await;
    let _page1 = mock_page(&mut server, 1, 4, page_body(1, 1, &games), 2).await;

    let dir = tempfile::tempdir().unwrap();
    let small = GamesApi::new(config(&server, &dir.path().join("small.csv"), 2)).unwrap();
    let large = GamesApi::new(config(&server, &dir.path().join("large.csv"), 4)).unwrap();

    let small = small.fetch_games(FetchRequest::default(), &CancelFlag::new()).await.unwrap();
    let large = large.fetch_games(FetchRequest::default(), &CancelFlag::new()).await.unwrap();
    assert_eq!(small.table.len(), 4);
    assert_eq!(small.table, large.table);
}

#[tokio::test]
async fn start_page_offsets_the_range() {
    let mut server = mockito::Server::new_async().await;
    let games = sample_games(3);
    let p1 = mock_page(&mut server, 1, 1, page_body(3, 1, &games[..1]), 0).await;
    let _page2 = mock_page(&mut server, 2, 1, page_body(3, 2, &games[1..2]), 2).await;
    let _page3 = mock_page(&mut server, 3, 1, page_body(3, 3, &games[2..]), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let api = GamesApi::new(config(&server, &dir.path().join("out.csv"), 1)).unwrap();
    let request = FetchRequest { start_page: 2, page_cap: None };
    let outcome = api.fetch_games(request, &CancelFlag::new()).await.unwrap();

    p1.assert_async().await;
    let ids: Vec<i64> = outcome.table.column("id").unwrap().filter_map(Cell::as_i64).collect();
    assert_eq!(ids, [2, 3]);
}

#[tokio::test]
async fn missing_total_pages_fails_without_writing() {
    let mut server = mockito::Server::new_async().await;
    let body = json!({"data": sample_games(1), "meta": {"current_page": 1}}).to_string();
    let _page1 = mock_page(&mut server, 1, 100, body, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.csv");
    let api = GamesApi::new(config(&server, &output, 100)).unwrap();
    let err = api.fetch_games(FetchRequest::default(), &CancelFlag::new()).await.unwrap_err();

    assert!(matches!(err, ApiError::Parsing(_, _)), "unexpected error: {err}");
    assert!(!output.exists());
}

#[tokio::test]
async fn server_error_propagates() {
    let mut server = mockito::Server::new_async().await;
    let _unavailable = server
        .mock("GET", "/games")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let api = GamesApi::new(config(&server, &dir.path().join("out.csv"), 100)).unwrap();
    let err = api.fetch_games(FetchRequest::default(), &CancelFlag::new()).await.unwrap_err();
    assert!(matches!(err, ApiError::Api(_, _)), "unexpected error: {err}");
}

#[tokio::test]
async fn cancelled_fetch_makes_no_requests() {
    let mut server = mockito::Server::new_async().await;
    let mock = mock_page(&mut server, 1, 100, page_body(1, 1, &sample_games(1)), 0).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.csv");
    let api = GamesApi::new(config(&server, &output, 100)).unwrap();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = api.fetch_games(FetchRequest::default(), &cancel).await.unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, ApiError::Cancelled { completed_pages: 0 }));
    assert!(!output.exists());
}

#[tokio::test]
async fn shape_drift_on_later_page_is_reported() {
    let mut server = mockito::Server::new_async().await;
    let mut drifted = sample_games(2);
    drifted[1]["visitor_team"] = json!("Denver Nuggets");
    let _page1 = mock_page(&mut server, 1, 1, page_body(2, 1, &drifted[..1]), 2).await;
    let _page2 = mock_page(&mut server, 2, 1, page_body(2, 2, &drifted[1..]), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.csv");
    let api = GamesApi::new(config(&server, &output, 1)).unwrap();
    let err = api.fetch_games(FetchRequest::default(), &CancelFlag::new()).await.unwrap_err();

    match err {
        ApiError::Shape(shape) => {
            assert_eq!(shape.page, 2);
            assert_eq!(shape.row, 0);
            assert_eq!(shape.field, "visitor_team");
            assert_eq!(shape.kind, MismatchKind::NotAnObject);
        }
        other => panic!("expected shape error, got {other}"),
    }
    assert!(!output.exists());
}

#[tokio::test]
async fn lenient_policy_keeps_drifted_rows() {
    let mut server = mockito::Server::new_async().await;
    let mut drifted = sample_games(2);
    drifted[1]["visitor_team"] = json!("Denver Nuggets");
    let _page1 = mock_page(&mut server, 1, 2, page_body(1, 1, &drifted), 2).await;

    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&server, &dir.path().join("out.csv"), 2);
    cfg.shape_policy = ShapePolicy::Lenient;
    let api = GamesApi::new(cfg).unwrap();
    let outcome = api.fetch_games(FetchRequest::default(), &CancelFlag::new()).await.unwrap();

    let names: Vec<&Cell> = outcome.table.column("visitor_team_full_name").unwrap().collect();
    assert_eq!(names, [&Cell::from("Denver Nuggets"), &Cell::Null]);
}

#[tokio::test]
async fn declared_schema_rejects_unknown_fields() {
    let mut server = mockito::Server::new_async().await;
    let _page1 = mock_page(&mut server, 1, 100, page_body(1, 1, &sample_games(1)), 2).await;

    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&server, &dir.path().join("out.csv"), 100);
    cfg.schema = Some(
        Schema::new()
            .scalar("id")
            .nested("home_team", ["full_name", "conference"])
            .scalar("home_team_score"),
    );
    let api = GamesApi::new(cfg).unwrap();
    let err = api.fetch_games(FetchRequest::default(), &CancelFlag::new()).await.unwrap_err();
    assert!(matches!(err, ApiError::Shape(ref s) if s.kind == MismatchKind::UndeclaredField));
}

#[tokio::test]
async fn empty_range_writes_empty_table() {
    let mut server = mockito::Server::new_async().await;
    let _page4 = mock_page(&mut server, 4, 100, page_body(2, 4, &[]), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.csv");
    let api = GamesApi::new(config(&server, &output, 100)).unwrap();
    let request = FetchRequest { start_page: 4, page_cap: None };
    let outcome = api.fetch_games(request, &CancelFlag::new()).await.unwrap();

    assert!(outcome.table.is_empty());
    assert_eq!(outcome.report.pages_fetched, 0);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "");
}

#[tokio::test]
async fn requests_are_spaced_by_rate_limit() {
    let mut server = mockito::Server::new_async().await;
    let games = sample_games(2);
    let _page1 = mock_page(&mut server, 1, 1, page_body(2, 1, &games[..1]), 2).await;
    let _page2 = mock_page(&mut server, 2, 1, page_body(2, 2, &games[1..]), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&server, &dir.path().join("out.csv"), 1);
    cfg.rate_limit_delay = Duration::from_millis(60);
    let api = GamesApi::new(cfg).unwrap();

    let started = Instant::now();
    api.fetch_games(FetchRequest::default(), &CancelFlag::new()).await.unwrap();
    // Probe, page 1, page 2: two full intervals between three requests.
    assert!(started.elapsed() >= Duration::from_millis(120));
}

#[tokio::test]
async fn api_key_is_sent_as_authorization_header() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/games")
        .match_query(Matcher::Any)
        .match_header("authorization", "secret-key")
        .with_status(200)
        .with_body(page_body(1, 1, &sample_games(1)))
        .expect(2)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&server, &dir.path().join("out.csv"), 100);
    cfg.api_key = Some("secret-key".into());
    let api = GamesApi::new(cfg).unwrap();
    api.fetch_games(FetchRequest::default(), &CancelFlag::new()).await.unwrap();
    mock.assert_async().await;
}
