use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use gamma_log::RunConfig;
use gamma_log::api_server_axum::{ApiResponse, AppState, Records, build_router};
use gamma_log::history::store::write_csv_file;
use gamma_log::history::{RAW_SCHEMA, RAW_TABLE, SUMMARY_SCHEMA, SUMMARY_TABLE};
use std::path::Path;
use tower::ServiceExt;

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(root: &Path) -> RunConfig {
        let cfg = RunConfig::rooted(root, &["SPY", "QQQ"]);
        let store = cfg.store();

        let header: Vec<String> = RAW_SCHEMA.iter().map(|s| s.to_string()).collect();
        let raw_row = |date: &str, symbol: &str, spot: &str| {
            let mut r = vec![String::new(); RAW_SCHEMA.len()];
            r[0] = date.to_string();
            r[2] = symbol.to_string();
            r[3] = spot.to_string();
            r
        };
        let rows = vec![
            raw_row("2025-03-10", "SPY", "500"),
            raw_row("2025-03-10", "QQQ", "420"),
            raw_row("2025-03-11", "SPY", "505"),
        ];
        write_csv_file(&store.table_path(RAW_TABLE), &header, &rows).unwrap();

        let header: Vec<String> = SUMMARY_SCHEMA.iter().map(|s| s.to_string()).collect();
        let rows = vec![vec![
            "2025-03-11".to_string(),
            "center | gamma_neutral".to_string(),
            "0.67".to_string(),
            "3".to_string(),
            "2025-03-11T21:00:00Z".to_string(),
        ]];
        write_csv_file(&store.table_path(SUMMARY_TABLE), &header, &rows).unwrap();
        cfg
    }

    async fn get(cfg: RunConfig, uri: &str) -> (StatusCode, ApiResponse<Records>) {
        let app = build_router(AppState::new(cfg).unwrap());
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_history_filters_by_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get(seed(dir.path()), "/api/history?symbol=spy").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        let rows = body.data.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["symbol"] == "SPY"));
        assert_eq!(rows[1]["spot"], "505");
        assert_eq!(rows[0].len(), RAW_SCHEMA.len());
    }

    #[tokio::test]
    async fn test_summary_lists_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get(seed(dir.path()), "/api/summary").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        assert!(body.error.is_none());
        let rows = body.data.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["dominant_regime"], "center | gamma_neutral");
        assert_eq!(rows[0]["share"], "0.67");
    }

    #[tokio::test]
    async fn test_empty_store_returns_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RunConfig::rooted(dir.path(), &["SPY"]);
        let (status, body) = get(cfg, "/api/history?symbol=SPY").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        assert!(body.data.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_symbol_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(AppState::new(RunConfig::rooted(dir.path(), &["SPY"])).unwrap());
        let response = app
            .oneshot(Request::builder().uri("/api/history").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
