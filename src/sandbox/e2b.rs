//! Remote execution in an E2B code-interpreter sandbox.
//!
//! A sandbox is created on first use and reused until [`CodeExecutor::shutdown`].
//! The agent runs each request on a [`CodeExecutor::scoped`] copy, so a sandbox
//! never outlives one run and is never shared between runs. A sandbox that
//! has expired or vanished is replaced once. Code runs through the
//! interpreter's `/execute` endpoint, which streams one JSON event per line.

use super::{CodeExecutor, ExecutionOutput};
use crate::config::SandboxSettings;
use crate::error::{MediCoreError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Port the code interpreter listens on inside the sandbox.
const INTERPRETER_PORT: u16 = 49999;

/// Remote sandbox executor backed by the E2B API.
pub struct E2bExecutor {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    domain: String,
    template: String,
    lifetime: Duration,
    session: Mutex<Option<SandboxSession>>,
}

/// A running sandbox.
#[derive(Debug, Clone)]
struct SandboxSession {
    sandbox_id: String,
    access_token: Option<String>,
    domain: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSandboxRequest<'a> {
    #[serde(rename = "templateID")]
    template_id: &'a str,
    timeout: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSandboxResponse {
    #[serde(rename = "sandboxID")]
    sandbox_id: String,
    #[serde(default)]
    envd_access_token: Option<String>,
    #[serde(default)]
    domain: Option<String>,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    code: &'a str,
    language: &'a str,
}

/// One line of the interpreter's execution stream.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ExecutionEvent {
    Stdout {
        text: String,
    },
    Stderr {
        text: String,
    },
    #[serde(rename = "result")]
    Value {
        #[serde(default)]
        text: Option<String>,
    },
    Error {
        name: String,
        value: String,
        #[serde(default)]
        traceback: String,
    },
    EndOfExecution,
    #[serde(other)]
    Other,
}

impl E2bExecutor {
    /// Create an executor from settings. Requires an E2B API key.
    pub fn from_settings(settings: &SandboxSettings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.timeout_seconds.max(1));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediCoreError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: settings.resolved_e2b_api_key()?,
            api_url: settings.e2b_api_url.trim_end_matches('/').to_string(),
            domain: settings.e2b_domain.clone(),
            template: settings.e2b_template.clone(),
            lifetime: Duration::from_secs(settings.lifetime_seconds.max(1)),
            session: Mutex::new(None),
        })
    }

    /// Same configuration, no sandbox yet.
    fn detached(&self) -> Self {
        Self {
            http: self.http.clone(),
            api_key: self.api_key.clone(),
            api_url: self.api_url.clone(),
            domain: self.domain.clone(),
            template: self.template.clone(),
            lifetime: self.lifetime,
            session: Mutex::new(None),
        }
    }

    /// Return the running sandbox, creating one if needed.
    async fn session(&self) -> Result<SandboxSession> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }

        let session = self.create_sandbox().await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Drop the cached sandbox if it is still the one given.
    async fn forget(&self, sandbox_id: &str) {
        let mut guard = self.session.lock().await;
        if guard.as_ref().is_some_and(|s| s.sandbox_id == sandbox_id) {
            *guard = None;
        }
    }

    #[instrument(skip(self), fields(template = %self.template))]
    async fn create_sandbox(&self) -> Result<SandboxSession> {
        let url = url::Url::parse(&format!("{}/sandboxes", self.api_url))?;
        let response = self
            .http
            .post(url)
            .header("X-API-Key", &self.api_key)
            .json(&CreateSandboxRequest {
                template_id: &self.template,
                timeout: self.lifetime.as_secs(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MediCoreError::Sandbox(format!(
                "Failed to create sandbox ({}): {}",
                status, body
            )));
        }

        let created: CreateSandboxResponse = response.json().await?;
        info!("Created E2B sandbox {}", created.sandbox_id);

        Ok(SandboxSession {
            sandbox_id: created.sandbox_id,
            access_token: created.envd_access_token,
            domain: created.domain.unwrap_or_else(|| self.domain.clone()),
        })
    }

    /// Post code to the sandbox. `Ok(None)` means the sandbox is gone.
    async fn send_execute(
        &self,
        session: &SandboxSession,
        code: &str,
    ) -> Result<Option<reqwest::Response>> {
        let mut request = self.http.post(session.execute_url()?).json(&ExecuteRequest {
            code,
            language: "python",
        });
        if let Some(token) = &session.access_token {
            request = request.header("X-Access-Token", token);
        }

        match request.send().await {
            Ok(response) if sandbox_gone(response.status()) => Ok(None),
            Ok(response) => Ok(Some(response)),
            Err(e) if e.is_connect() => {
                debug!("Sandbox {} unreachable: {}", session.sandbox_id, e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Statuses the sandbox proxy returns once a sandbox has been killed or expired.
fn sandbox_gone(status: StatusCode) -> bool {
    matches!(status, StatusCode::NOT_FOUND | StatusCode::BAD_GATEWAY)
}

impl SandboxSession {
    fn execute_url(&self) -> Result<url::Url> {
        Ok(url::Url::parse(&format!(
            "https://{}-{}.{}/execute",
            INTERPRETER_PORT, self.sandbox_id, self.domain
        ))?)
    }
}

#[async_trait]
impl CodeExecutor for E2bExecutor {
    #[instrument(skip(self, code), fields(bytes = code.len()))]
    async fn execute(&self, code: &str) -> Result<ExecutionOutput> {
        let session = self.session().await?;

        let response = match self.send_execute(&session, code).await? {
            Some(response) => response,
            None => {
                warn!(
                    "E2B sandbox {} is gone, starting a new one",
                    session.sandbox_id
                );
                self.forget(&session.sandbox_id).await;
                let session = self.session().await?;
                self.send_execute(&session, code).await?.ok_or_else(|| {
                    MediCoreError::Sandbox(format!(
                        "Sandbox {} unreachable right after creation",
                        session.sandbox_id
                    ))
                })?
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MediCoreError::Sandbox(format!(
                "Execution request failed ({}): {}",
                status, body
            )));
        }

        let mut collector = EventCollector::default();
        let mut buffer: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                collector.push_line(&String::from_utf8_lossy(&line))?;
            }
        }
        collector.push_line(&String::from_utf8_lossy(&buffer))?;

        debug!("Sandbox execution finished (success: {})", collector.output.success());
        Ok(collector.output)
    }

    async fn shutdown(&self) -> Result<()> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };

        let url = url::Url::parse(&format!("{}/sandboxes/{}", self.api_url, session.sandbox_id))?;
        let response = self
            .http
            .delete(url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;

        if response.status().is_success() {
            info!("Killed E2B sandbox {}", session.sandbox_id);
        } else {
            warn!(
                "Failed to kill E2B sandbox {} ({})",
                session.sandbox_id,
                response.status()
            );
        }
        Ok(())
    }

    fn scoped(&self) -> Option<Arc<dyn CodeExecutor>> {
        Some(Arc::new(self.detached()))
    }

    fn name(&self) -> &'static str {
        "e2b"
    }
}

/// Folds execution stream lines into an [`ExecutionOutput`].
#[derive(Debug, Default)]
struct EventCollector {
    output: ExecutionOutput,
}

impl EventCollector {
    fn push_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        match serde_json::from_str::<ExecutionEvent>(line)? {
            ExecutionEvent::Stdout { text } => self.output.stdout.push_str(&text),
            ExecutionEvent::Stderr { text } => self.output.stderr.push_str(&text),
            ExecutionEvent::Value { text: Some(text) } => self.output.results.push(text),
            ExecutionEvent::Error {
                name,
                value,
                traceback,
            } => {
                if !traceback.is_empty() {
                    debug!("Sandbox traceback:\n{}", traceback);
                }
                self.output.error = Some(format!("{}: {}", name, value));
            }
            ExecutionEvent::Value { text: None }
            | ExecutionEvent::EndOfExecution
            | ExecutionEvent::Other => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_stream_events() {
        let mut collector = EventCollector::default();
        let stream = r#"{"type":"stdout","text":"GFR computed\n","timestamp":1}
{"type":"result","text":"45.09","is_main_result":true}
{"type":"number_of_executions","execution_count":1}
{"type":"end_of_execution"}
"#;
        for line in stream.lines() {
            collector.push_line(line).unwrap();
        }

        assert_eq!(collector.output.stdout, "GFR computed\n");
        assert_eq!(collector.output.results, vec!["45.09"]);
        assert!(collector.output.success());
        assert_eq!(collector.output.render(), "GFR computed\n=> 45.09");
    }

    #[test]
    fn test_collects_error_event() {
        let mut collector = EventCollector::default();
        collector
            .push_line(r#"{"type":"error","name":"ZeroDivisionError","value":"division by zero","traceback":"..."}"#)
            .unwrap();
        assert_eq!(
            collector.output.error.as_deref(),
            Some("ZeroDivisionError: division by zero")
        );
    }

    #[test]
    fn test_blank_lines_ignored_and_garbage_rejected() {
        let mut collector = EventCollector::default();
        assert!(collector.push_line("   ").is_ok());
        assert!(collector.push_line("not json").is_err());
    }

    #[test]
    fn test_execute_url() {
        let session = SandboxSession {
            sandbox_id: "abc123".to_string(),
            access_token: None,
            domain: "e2b.app".to_string(),
        };
        assert_eq!(
            session.execute_url().unwrap().as_str(),
            "https://49999-abc123.e2b.app/execute"
        );
    }

    fn executor() -> E2bExecutor {
        E2bExecutor::from_settings(&SandboxSettings {
            e2b_api_key: Some("e2b_test".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    fn session(id: &str, domain: &str) -> SandboxSession {
        SandboxSession {
            sandbox_id: id.to_string(),
            access_token: None,
            domain: domain.to_string(),
        }
    }

    #[test]
    fn test_gone_statuses() {
        assert!(sandbox_gone(StatusCode::NOT_FOUND));
        assert!(sandbox_gone(StatusCode::BAD_GATEWAY));
        assert!(!sandbox_gone(StatusCode::OK));
        assert!(!sandbox_gone(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_forget_only_drops_matching_sandbox() {
        let executor = executor();
        *executor.session.lock().await = Some(session("sbx_new", "e2b.app"));

        executor.forget("sbx_old").await;
        assert!(executor.session.lock().await.is_some());

        executor.forget("sbx_new").await;
        assert!(executor.session.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_sandbox_is_dropped() {
        let mut settings = SandboxSettings {
            e2b_api_key: Some("e2b_test".to_string()),
            // Nothing listens here, so recreating the sandbox fails fast.
            e2b_api_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 5,
            ..Default::default()
        };
        settings.e2b_domain = "invalid".to_string();
        let executor = E2bExecutor::from_settings(&settings).unwrap();
        *executor.session.lock().await = Some(session("sbxexpired", "invalid"));

        let err = executor.execute("print(1)").await.unwrap_err();
        assert!(matches!(err, MediCoreError::Http(_)));
        assert!(executor.session.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_scoped_copy_has_its_own_session() {
        let executor = executor();
        *executor.session.lock().await = Some(session("sbx_shared", "e2b.app"));

        let scoped = executor.scoped().unwrap();
        assert_eq!(scoped.name(), "e2b");
        // Nothing was created for the copy, so shutdown has nothing to kill.
        tokio_test::assert_ok!(scoped.shutdown().await);
        assert!(executor.session.lock().await.is_some());
    }

    #[test]
    fn test_requires_api_key() {
        let settings = SandboxSettings {
            e2b_api_key: Some("e2b_test".to_string()),
            ..Default::default()
        };
        let executor = E2bExecutor::from_settings(&settings).unwrap();
        assert_eq!(executor.name(), "e2b");
        assert_eq!(executor.api_url, "https://api.e2b.dev");
    }

    #[test]
    fn test_create_response_parsing() {
        let created: CreateSandboxResponse = serde_json::from_str(
            r#"{"sandboxID":"sbx1","clientID":"c1","templateID":"code-interpreter-v1","envdAccessToken":"tok"}"#,
        )
        .unwrap();
        assert_eq!(created.sandbox_id, "sbx1");
        assert_eq!(created.envd_access_token.as_deref(), Some("tok"));
        assert!(created.domain.is_none());
    }
}
