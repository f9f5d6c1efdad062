//! HTTP routes for the civiq API
//!
//! Handlers stay thin and delegate straight to the engine. Issue
//! creation is the one multipart route; everything else speaks JSON.

use crate::error::ApiError;
use crate::upload::{MediaProcessor, PUBLIC_PREFIX};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use civiq_core::{
    Comment, Coordinates, Engine, Error, Issue, IssueFilter, IssueQuery, IssueStats, MediaConfig,
    NewComment, NewIssue, UpdateIssue,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub media: Arc<dyn MediaProcessor>,
}

/// Build the full application router.
pub fn router(state: AppState, media: &MediaConfig) -> Router {
    // The whole multipart body passes through memory, so allow the photo
    // cap plus some headroom for the text parts.
    let body_limit = (media.max_bytes as usize).saturating_add(512 * 1024);

    Router::new()
        .route("/health", get(health))
        .route("/issues", get(list_issues).post(create_issue))
        .route(
            "/issues/{id}",
            get(get_issue).patch(update_issue).delete(delete_issue),
        )
        .route(
            "/issues/{id}/comments",
            get(list_comments).post(add_comment),
        )
        .route("/analytics/stats", get(stats))
        .nest_service(PUBLIC_PREFIX, ServeDir::new(&media.upload_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Query parameters for listing issues
#[derive(Debug, Default, Deserialize)]
struct ListIssuesQuery {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    district: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

impl ListIssuesQuery {
    /// Parse the vocabulary filters; unknown values are the caller's error.
    fn into_query(self) -> Result<IssueQuery, Error> {
        let mut filter = IssueFilter {
            state: self.state,
            district: self.district,
            ..Default::default()
        };
        if let Some(category) = self.category.as_deref() {
            filter.category = Some(category.parse()?);
        }
        if let Some(status) = self.status.as_deref() {
            filter.status = Some(status.parse()?);
        }
        Ok(IssueQuery {
            filter,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

async fn list_issues(
    State(state): State<AppState>,
    Query(query): Query<ListIssuesQuery>,
) -> Result<Json<Vec<Issue>>, ApiError> {
    let query = query.into_query()?;
    Ok(Json(state.engine.list_issues(query).await?))
}

async fn get_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Issue>, ApiError> {
    Ok(Json(state.engine.get_issue(&id).await?))
}

/// Create an issue from a multipart form.
///
/// Text parts carry the report fields, `coordinates` is a JSON string
/// part and `image` is the optional photo. The photo is persisted before
/// the record is created so the stored issue carries its final locator.
async fn create_issue(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Issue>), ApiError> {
    let mut input = NewIssue::default();
    let mut image: Option<(Vec<u8>, String, Option<String>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                image = Some((bytes.to_vec(), file_name, content_type));
            }
            "coordinates" => {
                let text = field.text().await.map_err(bad_multipart)?;
                if !text.trim().is_empty() {
                    let coordinates: Coordinates =
                        serde_json::from_str(&text).map_err(|_| {
                            Error::Validation(
                                "coordinates must be a JSON object with lat and lng".to_string(),
                            )
                        })?;
                    input.coordinates = Some(coordinates);
                }
            }
            _ => {
                let text = field.text().await.map_err(bad_multipart)?;
                match name.as_str() {
                    "title" => input.title = text,
                    "description" => input.description = text,
                    "category" => input.category = text,
                    "priority" => input.priority = text,
                    "state" => input.state = text,
                    "district" => input.district = text,
                    "location" => input.location = text,
                    _ => {}
                }
            }
        }
    }

    if let Some((bytes, file_name, content_type)) = image {
        input.image_url = Some(state.media.store(&bytes, &file_name, content_type.as_deref())?);
    }

    let issue = state.engine.create_issue(input).await?;
    Ok((StatusCode::CREATED, Json(issue)))
}

async fn update_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(updates): Json<UpdateIssue>,
) -> Result<Json<Issue>, ApiError> {
    Ok(Json(state.engine.update_issue(&id, updates).await?))
}

async fn delete_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.engine.delete_issue(&id).await? {
        Ok(Json(serde_json::json!({ "success": true })))
    } else {
        Err(ApiError(Error::NotFound(id)))
    }
}

async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    Ok(Json(state.engine.list_comments(&id).await?))
}

async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<NewComment>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state.engine.add_comment(&id, input).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn stats(State(state): State<AppState>) -> Result<Json<IssueStats>, ApiError> {
    Ok(Json(state.engine.issue_stats().await?))
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError(Error::Validation(format!("malformed multipart body: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::DiskMedia;
    use axum::body::Body;
    use axum::http::Request;
    use civiq_core::{Category, MemStore, Status};
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "civiq-test-boundary";

    fn test_app() -> (Router, Engine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let media_config = MediaConfig {
            upload_dir: dir.path().join("uploads"),
            max_bytes: 1024 * 1024,
        };
        let engine = Engine::new(Arc::new(MemStore::new()));
        let state = AppState {
            engine: engine.clone(),
            media: Arc::new(DiskMedia::new(&media_config).unwrap()),
        };
        (router(state, &media_config), engine, dir)
    }

    fn form_text(name: &str, value: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
    }

    fn form_file(name: &str, file_name: &str, content_type: &str, data: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n{data}\r\n"
        )
    }

    fn form_close() -> String {
        format!("--{BOUNDARY}--\r\n")
    }

    fn report_form(category: &str) -> String {
        let mut body = String::new();
        body.push_str(&form_text("title", "Pothole on MG Road"));
        body.push_str(&form_text("description", "Deep pothole near the signal"));
        body.push_str(&form_text("category", category));
        body.push_str(&form_text("priority", "high"));
        body.push_str(&form_text("state", "karnataka"));
        body.push_str(&form_text("district", "Bengaluru Urban"));
        body.push_str(&form_text("location", "MG Road, near Trinity metro"));
        body
    }

    fn multipart_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/issues")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _dir) = test_app();
        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "status": "ok" })
        );
    }

    #[tokio::test]
    async fn test_create_issue_from_multipart_form() {
        let (app, _, _dir) = test_app();

        let mut body = report_form("roads");
        body.push_str(&form_text("coordinates", r#"{"lat": 12.97, "lng": 77.59}"#));
        body.push_str(&form_close());

        let response = app.oneshot(multipart_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let issue: Issue = serde_json::from_value(body_json(response).await).unwrap();
        assert!(issue.id.starts_with("civ-"));
        assert_eq!(issue.status, Status::New);
        assert_eq!(issue.category, Category::Roads);
        assert_eq!(issue.state, "karnataka");
        let coordinates = issue.coordinates.unwrap();
        assert!((coordinates.lat - 12.97).abs() < 1e-9);
        assert!(issue.ai_category.is_none());
        assert_eq!(issue.created_at, issue.updated_at);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_category() {
        let (app, _, _dir) = test_app();

        let mut body = report_form("potholes");
        body.push_str(&form_close());

        let response = app.oneshot(multipart_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = body_json(response).await;
        assert!(error["error"].as_str().unwrap().contains("invalid category"));
    }

    #[tokio::test]
    async fn test_create_with_photo_serves_it_back() {
        let (app, _, _dir) = test_app();

        let mut body = report_form("roads");
        body.push_str(&form_file("image", "pothole.png", "image/png", "fake png bytes"));
        body.push_str(&form_close());

        let response = app
            .clone()
            .oneshot(multipart_request(body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let issue: Issue = serde_json::from_value(body_json(response).await).unwrap();
        let image_url = issue.image_url.unwrap();
        assert!(image_url.starts_with("/uploads/"));

        let served = app.oneshot(get_request(&image_url)).await.unwrap();
        assert_eq!(served.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(served.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"fake png bytes");
    }

    #[tokio::test]
    async fn test_create_with_bad_photo_is_rejected() {
        let (app, engine, _dir) = test_app();

        let mut body = report_form("roads");
        body.push_str(&form_file("image", "malware.exe", "application/x-msdownload", "MZ"));
        body.push_str(&form_close());

        let response = app.oneshot(multipart_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Nothing was created either.
        let all = engine.list_issues(IssueQuery::default()).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_issue_is_404() {
        let (app, _, _dir) = test_app();
        let response = app
            .oneshot(get_request("/issues/civ-missing1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn seeded_issue(engine: &Engine, category: &str) -> Issue {
        engine
            .create_issue(NewIssue {
                title: format!("{category} problem"),
                description: "Reported by a resident".to_string(),
                category: category.to_string(),
                priority: "medium".to_string(),
                state: "karnataka".to_string(),
                district: "Bengaluru Urban".to_string(),
                location: "MG Road".to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_patch_merges_and_maps_errors() {
        let (app, engine, _dir) = test_app();
        let issue = seeded_issue(&engine, "electricity").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                &format!("/issues/{}", issue.id),
                serde_json::json!({ "status": "in_progress", "assignedTo": "Electrical Dept" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated: Issue = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(updated.status, Status::InProgress);
        assert_eq!(updated.assigned_to.as_deref(), Some("Electrical Dept"));
        assert_eq!(updated.title, issue.title);

        let response = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                "/issues/civ-missing1",
                serde_json::json!({ "status": "closed" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(json_request(
                "PATCH",
                &format!("/issues/{}", issue.id),
                serde_json::json!({ "status": "finished" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_reports_success_then_404() {
        let (app, engine, _dir) = test_app();
        let issue = seeded_issue(&engine, "water").await;
        let uri = format!("/issues/{}", issue.id);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(&uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "success": true })
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(&uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_comments_round_trip() {
        let (app, engine, _dir) = test_app();
        let issue = seeded_issue(&engine, "sanitation").await;
        let uri = format!("/issues/{}/comments", issue.id);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &uri,
                serde_json::json!({ "content": "Crew dispatched", "isInternal": true }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let comment: Comment = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(comment.issue_id, issue.id);
        assert!(comment.is_internal);

        let response = app.clone().oneshot(get_request(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed: Vec<Comment> = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content, "Crew dispatched");

        let response = app
            .oneshot(json_request(
                "POST",
                "/issues/civ-missing1/comments",
                serde_json::json!({ "content": "hello" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_filters_and_rejects_bad_vocab() {
        let (app, engine, _dir) = test_app();
        seeded_issue(&engine, "roads").await;
        seeded_issue(&engine, "water").await;
        seeded_issue(&engine, "roads").await;

        let response = app
            .clone()
            .oneshot(get_request("/issues?category=roads"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed: Vec<Issue> = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|i| i.category == Category::Roads));

        let response = app
            .clone()
            .oneshot(get_request("/issues?limit=1&offset=1"))
            .await
            .unwrap();
        let listed: Vec<Issue> = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(listed.len(), 1);

        let response = app
            .oneshot(get_request("/issues?category=bogus"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats_reflect_current_records() {
        let (app, engine, _dir) = test_app();
        seeded_issue(&engine, "roads").await;
        seeded_issue(&engine, "roads").await;
        seeded_issue(&engine, "environment").await;

        let response = app.oneshot(get_request("/analytics/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stats = body_json(response).await;
        assert_eq!(stats["total"], 3);
        assert_eq!(stats["byCategory"]["roads"], 2);
        assert_eq!(stats["byCategory"]["environment"], 1);
        assert_eq!(stats["byStatus"]["new"], 3);
        assert_eq!(stats["byPriority"]["medium"], 3);
    }
}
