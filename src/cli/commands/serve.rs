//! Web form for the clinical agent.
//!
//! Serves a single page with a request box; submitting it runs the agent and
//! renders the final summary plus an expandable reasoning trace. A JSON
//! endpoint is provided for integration with other systems.

use crate::agent::{Agent, AgentResponse};
use crate::cli::preflight::{self, Operation};
use crate::cli::{Output, EXAMPLE_QUERY};
use crate::config::Settings;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Shared application state.
pub struct AppState {
    agent: Agent,
}

impl AppState {
    pub fn new(agent: Agent) -> Self {
        Self { agent }
    }
}

/// Run the web form server.
pub async fn run_serve(host: Option<&str>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Agent, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'medicore verify' for detailed diagnostics.");
        return Err(e.into());
    }

    let agent = Agent::from_settings(&settings, None)?;
    let executor = agent.executor_name();
    let state = Arc::new(AppState::new(agent));

    let host = host.unwrap_or(&settings.server.host);
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("MediCore Clinical Decision Support");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Form", "GET  /");
    Output::kv("Analyze (form)", "POST /analyze");
    Output::kv("Analyze (JSON)", "POST /api/analyze");
    Output::kv("Health", "GET  /health");
    Output::kv("Sandbox", executor);
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = state.agent.shutdown().await {
        warn!("Failed to release sandbox: {}", e);
    }
    Ok(())
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/analyze", post(analyze_form))
        .route("/api/analyze", post(analyze_json))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct AnalyzeRequest {
    /// Free-text clinical request.
    #[serde(default)]
    query: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn index() -> Html<String> {
    Html(render_page("", None))
}

async fn analyze_form(
    State(state): State<Arc<AppState>>,
    Form(req): Form<AnalyzeRequest>,
) -> impl IntoResponse {
    let query = req.query.trim();
    if query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Html(render_page("", Some(&Outcome::Failed("Enter a request first.".to_string())))),
        );
    }

    let outcome = match state.agent.run(query).await {
        Ok(response) => Outcome::Answered(response),
        Err(e) => {
            error!("Agent run failed: {}", e);
            Outcome::Failed(e.to_string())
        }
    };
    let status = match outcome {
        Outcome::Answered(_) => StatusCode::OK,
        Outcome::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Html(render_page(query, Some(&outcome))))
}

async fn analyze_json(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    if req.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "query must not be empty".to_string(),
            }),
        )
            .into_response();
    }

    match state.agent.run(req.query.trim()).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

// === Page rendering ===

/// Result of one form submission.
enum Outcome {
    Answered(AgentResponse),
    Failed(String),
}

fn render_page(query: &str, outcome: Option<&Outcome>) -> String {
    let mut body = String::new();

    body.push_str(&format!(
        r#"<form method="post" action="/analyze">
<label for="query">Enter Physician Request:</label>
<textarea id="query" name="query" rows="5" placeholder="e.g., '{}'">{}</textarea>
<button type="submit">Run Clinical Analysis</button>
</form>
"#,
        escape_html(EXAMPLE_QUERY),
        escape_html(query)
    ));

    match outcome {
        Some(Outcome::Answered(response)) => {
            body.push_str("<h2>Final Clinical Summary</h2>\n");
            body.push_str(&format!(
                "<div class=\"success\">{}</div>\n",
                escape_html(&response.content).replace('\n', "<br>\n")
            ));
            body.push_str(&render_trace(response));
        }
        Some(Outcome::Failed(message)) => {
            body.push_str(&format!(
                "<div class=\"error\">{}</div>\n",
                escape_html(message)
            ));
        }
        None => {}
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>MediCore Medical Assistant</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }}
textarea {{ width: 100%; display: block; margin: 0.5rem 0; }}
.success {{ background: #e8f5e9; padding: 1rem; border-radius: 4px; }}
.error {{ background: #ffebee; padding: 1rem; border-radius: 4px; }}
pre {{ white-space: pre-wrap; background: #f5f5f5; padding: 0.5rem; }}
</style>
</head>
<body>
<h1>&#x1FA7A; Clinical Decision Support Agent</h1>
<hr>
{}</body>
</html>
"#,
        body
    )
}

fn render_trace(response: &AgentResponse) -> String {
    let mut trace = String::from("<details>\n<summary>View Agent's Reasoning Trace</summary>\n");
    trace.push_str(&format!(
        "<p>Run {} with {} started {} &middot; {} step(s)</p>\n",
        response.run_id,
        escape_html(&response.model),
        response.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        response.iterations
    ));
    if response.steps.is_empty() {
        trace.push_str("<p>No tools were called.</p>\n");
    }
    for record in &response.steps {
        trace.push_str(&format!(
            "<h4>Step {}: {}{}</h4>\n<pre>{}</pre>\n<pre>{}</pre>\n",
            record.step,
            escape_html(&record.name),
            if record.success { "" } else { " (failed)" },
            escape_html(&record.arguments),
            escape_html(&record.result)
        ));
    }
    trace.push_str("</details>\n");
    trace
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ToolContext;
    use crate::model::AssistantTurn;
    use crate::sandbox::ImportPolicy;
    use crate::testing::{tool_call, tools_turn, NoopExecutor, ScriptedModel};

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn state(turns: Vec<AssistantTurn>) -> Arc<AppState> {
        let tools = ToolContext::new(Arc::new(NoopExecutor), ImportPolicy::new(&["numpy"]));
        Arc::new(AppState::new(Agent::new(ScriptedModel::new(turns), tools)))
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"A & B's"</b>"#),
            "&lt;b&gt;&quot;A &amp; B&#39;s&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_index_renders_form() {
        let Html(page) = tokio_test::block_on(index());
        assert!(page.contains("Clinical Decision Support Agent"));
        assert!(page.contains("Enter Physician Request:"));
        assert!(page.contains("Run Clinical Analysis"));
        assert!(!page.contains("Final Clinical Summary"));
    }

    #[tokio::test]
    async fn test_form_submission_renders_summary_and_trace() {
        let state = state(vec![
            tools_turn(vec![tool_call(
                "call_1",
                "calculate_renal_function",
                r#"{"creatinine": 1.2, "age": 65, "gender": "female"}"#,
            )]),
            AssistantTurn::text("GFR 45.09 <reduced>"),
        ]);

        let response = analyze_form(
            State(state),
            Form(AnalyzeRequest {
                query: "65F creatinine 1.2".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let page = body_text(response).await;
        assert!(page.contains("Final Clinical Summary"));
        assert!(page.contains("GFR 45.09 &lt;reduced&gt;"));
        assert!(page.contains("Calculated GFR: 45.09 mL/min/1.73m²"));
        assert!(page.contains(">65F creatinine 1.2</textarea>"));
    }

    #[test]
    fn test_render_page_with_answer() {
        let response = AgentResponse {
            run_id: uuid::Uuid::nil(),
            model: "gpt-4o".to_string(),
            content: "GFR 45.09 <reduced>".to_string(),
            steps: vec![crate::agent::ToolCallRecord {
                step: 1,
                name: "calculate_renal_function".to_string(),
                arguments: r#"{"age": 65}"#.to_string(),
                result: "Calculated GFR: 45.09 mL/min/1.73m². ".to_string(),
                success: true,
            }],
            iterations: 2,
            started_at: chrono::Utc::now(),
        };
        let page = render_page("65F", Some(&Outcome::Answered(response)));

        assert!(page.contains("Final Clinical Summary"));
        assert!(page.contains("GFR 45.09 &lt;reduced&gt;"));
        assert!(page.contains("<details>"));
        assert!(page.contains("View Agent's Reasoning Trace"));
        assert!(page.contains("Step 1: calculate_renal_function"));
        assert!(page.contains("{&quot;age&quot;: 65}"));
        assert!(page.contains(">65F</textarea>"));
    }

    #[test]
    fn test_render_page_with_failure() {
        let outcome = Outcome::Failed("Agent exceeded maximum steps (10)".to_string());
        let page = render_page("q", Some(&outcome));
        assert!(page.contains("class=\"error\""));
        assert!(page.contains("Agent exceeded maximum steps (10)"));
        assert!(!page.contains("<details>"));
    }

    #[tokio::test]
    async fn test_empty_form_is_rejected() {
        let response = analyze_form(
            State(state(Vec::new())),
            Form(AnalyzeRequest {
                query: "   ".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_agent_failure_is_reported() {
        // An empty script makes the model fail on the first step.
        let response = analyze_json(
            State(state(Vec::new())),
            Json(AnalyzeRequest {
                query: "anything".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("script exhausted"));
    }

    #[tokio::test]
    async fn test_json_analyze_success() {
        let response = analyze_json(
            State(state(vec![AssistantTurn::text("No tools needed.")])),
            Json(AnalyzeRequest {
                query: "hello".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["content"], "No tools needed.");
        assert_eq!(body["iterations"], 1);
        assert_eq!(body["steps"].as_array().unwrap().len(), 0);
    }
}
