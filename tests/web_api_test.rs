#![cfg(feature = "web")]
//! Router integration tests: pages and the JSON API against an in-memory
//! database.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tradejournal::adapters::web::{build_router, AppState};

use common::*;

const BOUNDARY: &str = "XBOUNDARYX";

fn create_test_app() -> Router {
    let state = AppState {
        journal: test_journal(),
        config: Arc::new(MockConfigPort),
        images_dir: std::env::temp_dir().join("tradejournal_test_images"),
    };
    build_router(state)
}

fn multipart_file(field: &str, filename: &str, content: &str) -> Vec<u8> {
    format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    )
    .into_bytes()
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn import_sample(app: &Router) -> Value {
    let response = app
        .clone()
        .oneshot(multipart_request(
            "/api/import",
            multipart_file("file", "fills.csv", SAMPLE_CSV),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

mod pages {
    use super::*;

    #[tokio::test]
    async fn index_renders() {
        let app = create_test_app();
        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn index_lists_imported_day() {
        let app = create_test_app();
        import_sample(&app).await;

        let response = app
            .oneshot(get("/?from=2024-07-01&to=2024-07-31"))
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("2024-07-15"));
    }

    #[tokio::test]
    async fn missing_day_is_404() {
        let app = create_test_app();
        let response = app.oneshot(get("/day/999")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn day_by_date_redirects_to_id() {
        let app = create_test_app();
        let imported = import_sample(&app).await;
        let day_id = imported["days"][0]["day_id"].as_i64().unwrap();

        let response = app.oneshot(get("/day/2024-07-15")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert_eq!(location, format!("/day/{day_id}"));
    }

    #[tokio::test]
    async fn trade_page_shows_fills_and_tags() {
        let app = create_test_app();
        import_sample(&app).await;

        let response = app.oneshot(get("/trade/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("Fills"));
        assert!(html.contains("Setup"));
    }

    #[tokio::test]
    async fn analytics_and_settings_render() {
        let app = create_test_app();
        for uri in ["/analytics", "/settings", "/portfolios", "/live"] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = create_test_app();
        let response = app.oneshot(get("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

mod import_api {
    use super::*;

    #[tokio::test]
    async fn import_returns_day_summaries() {
        let app = create_test_app();
        let body = import_sample(&app).await;
        assert_eq!(body["days"][0]["date"], "2024-07-15");
        assert_eq!(body["days"][0]["trade_count"], 2);
    }

    #[tokio::test]
    async fn excel_upload_is_rejected() {
        let app = create_test_app();
        let response = app
            .oneshot(multipart_request(
                "/api/import",
                multipart_file("file", "fills.xlsx", "PK"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn delete_missing_day_is_404() {
        let app = create_test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/day/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

mod portfolios_api {
    use super::*;

    #[tokio::test]
    async fn create_and_list() {
        let app = create_test_app();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/portfolio",
                json!({ "name": "Eval", "color": "#ff0000" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created = json_body(response).await;
        assert_eq!(created["ok"], true);

        let response = app.oneshot(get("/api/portfolios")).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(body[0]["name"], "Eval");
    }

    #[tokio::test]
    async fn name_is_required() {
        let app = create_test_app();
        let response = app
            .oneshot(json_request("POST", "/api/portfolio", json!({ "name": "  " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

mod settings_api {
    use super::*;

    #[tokio::test]
    async fn theme_round_trip() {
        let app = create_test_app();

        let response = app.clone().oneshot(get("/api/settings/theme")).await.unwrap();
        assert_eq!(json_body(response).await["theme"], "mint");

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/settings/theme",
                json!({ "theme": "amber" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/api/settings/theme")).await.unwrap();
        assert_eq!(json_body(response).await["theme"], "amber");
    }

    #[tokio::test]
    async fn tag_config_save_and_reset() {
        let app = create_test_app();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/settings/tags/volume",
                json!({ "tags": ["Thin", "Heavy"] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(get("/api/settings/tags")).await.unwrap();
        let groups = json_body(response).await;
        let volume = groups
            .as_array()
            .unwrap()
            .iter()
            .find(|g| g["id"] == "volume")
            .unwrap();
        assert_eq!(volume["tags"], json!(["Thin", "Heavy"]));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/settings/tags/volume/reset",
                json!({}),
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["tags"], json!(["Avg", "Above Avg", "Below Avg"]));
    }

    #[tokio::test]
    async fn trade_defaults_override_plan_distances() {
        let app = create_test_app();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/settings/trade-defaults",
                json!({ "full_stop_points": "10" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // new full-mode trade now risks 10 points instead of 20
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/live",
                json!({
                    "direction": "Long", "instrument": "MES", "entry_price": 5000.0,
                    "entry_time": "09:30", "total_qty": 2, "mode": "full",
                }),
            ))
            .await
            .unwrap();
        let id = json_body(response).await["id"].as_i64().unwrap();

        let response = app
            .oneshot(get(&format!("/api/live/{id}/recalc")))
            .await
            .unwrap();
        let calc = json_body(response).await;
        assert_eq!(calc["initial_risk"], 100.0);
    }

    #[tokio::test]
    async fn db_export_is_an_attachment() {
        let app = create_test_app();
        let response = app.oneshot(get("/api/db/export")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("tradejournal_backup.sql"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let sql = String::from_utf8_lossy(&bytes);
        assert!(sql.contains("CREATE TABLE"));
    }
}

mod trades_api {
    use super::*;

    #[tokio::test]
    async fn tags_and_notes_round_trip() {
        let app = create_test_app();
        import_sample(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/trade/1/tags",
                json!({ "group_id": "setup", "tags": ["Initiative"] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/trade/1/notes",
                json!({ "notes": "clean breakout" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/trade/1")).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("clean breakout"));
    }

    #[tokio::test]
    async fn tags_require_group_id() {
        let app = create_test_app();
        import_sample(&app).await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/trade/1/tags",
                json!({ "tags": ["Initiative"] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

mod live_api {
    use super::*;

    async fn create_live(app: &Router) -> i64 {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/live",
                json!({
                    "direction": "Long", "instrument": "MES", "entry_price": 5000.0,
                    "entry_time": "09:30", "total_qty": 2, "mode": "full",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn create_computes_default_plan() {
        let app = create_test_app();
        let id = create_live(&app).await;

        let response = app
            .oneshot(get(&format!("/api/live/{id}/recalc")))
            .await
            .unwrap();
        let calc = json_body(response).await;
        // stop 20 pts below entry on 2 MES contracts
        assert_eq!(calc["initial_risk"], 200.0);
        assert_eq!(calc["current_risk"], 200.0);
        assert_eq!(calc["potential_reward"], 200.0);
        assert_eq!(calc["remaining_qty"], 2);
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let app = create_test_app();
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/live",
                json!({ "direction": "Long" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn execute_records_pnl_and_closes() {
        let app = create_test_app();
        let id = create_live(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/live/{id}/execute"),
                json!({
                    "exec_type": "tp_hit", "portion": 1, "qty": 2,
                    "price": 5010.0, "exec_time": "10:00",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        // 10 pts * 2 qty * $5
        assert_eq!(body["pnl"], 100.0);
        assert_eq!(body["calc"]["is_closed"], true);
        assert_eq!(body["calc"]["realized_pnl"], 100.0);
    }

    #[tokio::test]
    async fn push_writes_journal_trade_once() {
        let app = create_test_app();
        let id = create_live(&app).await;

        app.clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/live/{id}/execute"),
                json!({
                    "exec_type": "tp_hit", "portion": 1, "qty": 2,
                    "price": 5010.0, "exec_time": "10:00",
                }),
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(json_request("POST", &format!("/api/live/{id}/push"), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let trade_id = body["journal_trade_id"].as_i64().unwrap();

        // the journal trade carries entry + exit fills
        let response = app
            .clone()
            .oneshot(get(&format!("/trade/{trade_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // a second push is rejected
        let response = app
            .oneshot(json_request("POST", &format!("/api/live/{id}/push"), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn deleting_exit_reopens_closed_trade() {
        let app = create_test_app();
        let id = create_live(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/live/{id}/execute"),
                json!({
                    "exec_type": "stop_hit", "portion": 1, "qty": 2,
                    "price": 4980.0, "exec_time": "10:00",
                }),
            ))
            .await
            .unwrap();
        let exec_id = json_body(response).await["exec_id"].as_i64().unwrap();

        // mark it closed, as the frontend does once is_closed flips
        app.clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/live/{id}"),
                json!({ "status": "closed" }),
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/live/{id}/execution/{exec_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["calc"]["is_closed"], false);

        let response = app.oneshot(get("/api/live/0/recalc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
