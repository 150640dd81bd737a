use axum::{
    http::StatusCode,
    response::{Html, IntoResponse},
};

const LANDING_PAGE: &str = r#"
<h1>sysprom exporter</h1>
<p><a href="/metrics">Metrics</a> | <a href="/health">Health</a></p>
"#;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn index() -> impl IntoResponse {
    Html(LANDING_PAGE)
}
