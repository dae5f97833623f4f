pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::state::AppState;
use crate::{admin, assistant, auth, employee, hr, pm, reports};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api/v1/auth", auth_routes())
        .nest("/api/v1/admin", admin_routes())
        .nest("/api/v1/hr", hr_routes())
        .nest("/api/v1/pm", pm_routes())
        .nest("/api/v1/me", me_routes())
        .nest("/api/v1/assistant", assistant_routes())
        .with_state(state)
}

fn auth_routes() -> Router<AppState> {
    use auth::handlers::*;
    Router::new()
        .route("/login", post(handle_login))
        .route("/me", get(handle_me))
        .route("/password", post(handle_change_password))
}

fn admin_routes() -> Router<AppState> {
    use admin::handlers::*;
    Router::new()
        .route("/users", get(handle_list_users).post(handle_create_user))
        .route(
            "/users/:id",
            get(handle_get_user)
                .patch(handle_update_user)
                .delete(handle_delete_user),
        )
        .route("/backups", get(handle_list_backups).post(handle_create_backup))
        .route("/backups/:id", get(handle_get_backup).delete(handle_delete_backup))
        .route("/backups/:id/download", get(handle_download_backup))
        .route("/dashboard", get(handle_dashboard))
}

fn hr_routes() -> Router<AppState> {
    use hr::handlers::*;
    Router::new()
        .route(
            "/employees",
            get(handle_list_employees).post(handle_create_employee),
        )
        .route(
            "/employees/:id",
            get(handle_get_employee)
                .patch(handle_update_employee)
                .delete(handle_delete_employee),
        )
        .route("/policies", get(handle_list_policies).post(handle_create_policy))
        .route("/policies/draft", post(handle_draft_policy))
        .route(
            "/policies/:id",
            get(handle_get_policy)
                .patch(handle_update_policy)
                .delete(handle_delete_policy),
        )
        .route("/dashboard", get(handle_dashboard))
}

fn pm_routes() -> Router<AppState> {
    use pm::handlers::*;
    Router::new()
        .route("/projects", get(handle_list_projects).post(handle_create_project))
        .route(
            "/projects/:id",
            get(handle_get_project)
                .patch(handle_update_project)
                .delete(handle_delete_project),
        )
        .route(
            "/projects/:id/members",
            get(handle_list_members).post(handle_add_member),
        )
        .route(
            "/projects/:id/members/:user_id",
            axum::routing::delete(handle_remove_member),
        )
        .route(
            "/projects/:id/tasks",
            get(handle_list_tasks).post(handle_create_task),
        )
        .route(
            "/tasks/:id",
            patch(handle_update_task).delete(handle_delete_task),
        )
        .route(
            "/projects/:id/reports",
            get(reports::handlers::handle_list_reports)
                .post(reports::handlers::handle_queue_report),
        )
        .route(
            "/projects/:id/reports/run",
            post(reports::handlers::handle_run_report),
        )
        .route("/reports/:id", get(reports::handlers::handle_get_report))
        .route("/dashboard", get(handle_dashboard))
}

fn me_routes() -> Router<AppState> {
    use employee::handlers::*;
    Router::new()
        .route("/profile", get(handle_get_profile).patch(handle_update_profile))
        .route("/tasks", get(handle_my_tasks))
        .route("/tasks/:id/status", patch(handle_update_task_status))
        .route("/updates", get(handle_list_updates).post(handle_post_update))
        .route("/policies", get(handle_list_policies))
        .route("/policies/:id", get(handle_get_policy))
        .route("/projects", get(handle_my_projects))
        .route("/dashboard", get(handle_dashboard))
}

fn assistant_routes() -> Router<AppState> {
    use assistant::handlers::*;
    Router::new()
        .route(
            "/sessions",
            get(handle_list_sessions).post(handle_create_session),
        )
        .route("/sessions/:id", axum::routing::delete(handle_delete_session))
        .route(
            "/sessions/:id/messages",
            get(handle_list_messages).post(handle_send_message),
        )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::auth::TokenService;
    use crate::config::test_config;
    use crate::llm_client::LlmClient;
    use crate::models::user::Role;
    use crate::queue::MemoryQueue;

    /// Router over a pool that never connects. Only paths that stop before
    /// the database are exercised here.
    fn test_app() -> (Router, TokenService) {
        let config = test_config();
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        let tokens = TokenService::new(&config.jwt_secret, config.token_ttl_minutes);
        let state = AppState {
            db,
            s3: aws_sdk_s3::Client::from_conf(s3_config),
            llm: LlmClient::new(config.anthropic_api_key.clone()).unwrap(),
            tokens: tokens.clone(),
            queue: Arc::new(MemoryQueue::default()),
            config,
        };
        (build_router(state), tokens)
    }

    fn bearer(tokens: &TokenService, role: Role) -> String {
        let issued = tokens
            .issue(Uuid::new_v4(), "someone@syncem.io", role)
            .unwrap();
        format!("Bearer {}", issued.token)
    }

    async fn status_of(app: Router, request: Request<Body>) -> StatusCode {
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app();
        let request = Request::get("/health").body(Body::empty()).unwrap();
        assert_eq!(status_of(app, request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let (app, _) = test_app();
        let request = Request::get("/api/v1/admin/users").body(Body::empty()).unwrap();
        assert_eq!(status_of(app, request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let (app, _) = test_app();
        let request = Request::get("/api/v1/me/tasks")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(app, request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_role_gates() {
        let cases = [
            (Role::Employee, "/api/v1/admin/dashboard"),
            (Role::Pm, "/api/v1/admin/users"),
            (Role::Employee, "/api/v1/hr/employees"),
            (Role::Pm, "/api/v1/hr/dashboard"),
            (Role::Hr, "/api/v1/pm/projects"),
            (Role::Employee, "/api/v1/pm/dashboard"),
        ];
        for (role, path) in cases {
            let (app, tokens) = test_app();
            let request = Request::get(path)
                .header(header::AUTHORIZATION, bearer(&tokens, role))
                .body(Body::empty())
                .unwrap();
            assert_eq!(
                status_of(app, request).await,
                StatusCode::FORBIDDEN,
                "{role} on {path}"
            );
        }
    }

    #[tokio::test]
    async fn test_pm_cannot_queue_reports_as_employee() {
        let (app, tokens) = test_app();
        let path = format!("/api/v1/pm/projects/{}/reports", Uuid::new_v4());
        let request = Request::post(path)
            .header(header::AUTHORIZATION, bearer(&tokens, Role::Employee))
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(app, request).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_malformed_report_body_is_bad_request() {
        let bodies = [
            r#"{"report_date":"2024-13-45","send_email":true}"#,
            r#"{"send_email":"yes"}"#,
            "{not json",
        ];
        for raw in bodies {
            let (app, tokens) = test_app();
            let path = format!("/api/v1/pm/projects/{}/reports", Uuid::new_v4());
            let request = Request::post(path)
                .header(header::AUTHORIZATION, bearer(&tokens, Role::Pm))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(raw))
                .unwrap();
            assert_eq!(status_of(app, request).await, StatusCode::BAD_REQUEST, "{raw}");
        }
    }

    #[tokio::test]
    async fn test_malformed_backup_body_is_bad_request() {
        let (app, tokens) = test_app();
        let request = Request::post("/api/v1/admin/backups")
            .header(header::AUTHORIZATION, bearer(&tokens, Role::Admin))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"note": 42"#))
            .unwrap();
        assert_eq!(status_of(app, request).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (app, _) = test_app();
        let request = Request::get("/api/v1/nowhere").body(Body::empty()).unwrap();
        assert_eq!(status_of(app, request).await, StatusCode::NOT_FOUND);
    }
}
