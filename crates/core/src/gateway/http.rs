use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{CommandGateway, CommandName, GatewayError};

/// Gateway that posts each command to `{base_url}/commands/{name}`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpGateway {
    /// Build a gateway whose requests give up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL commands are posted under.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, command: CommandName) -> String {
        format!("{}/commands/{}", self.base_url, command)
    }
}

impl CommandGateway for HttpGateway {
    async fn invoke(&self, command: CommandName, payload: Value) -> Result<Value, GatewayError> {
        let response = self
            .client
            .post(self.endpoint(command))
            .json(&payload)
            .send()
            .await
            .map_err(|err| transport_error(command, err))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| transport_error(command, err))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .map(|body| body.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            warn!(%command, status = status.as_u16(), %message, "backend rejected command");
            return Err(GatewayError::Remote { command, message });
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&body).map_err(|source| GatewayError::Decode { command, source })
    }
}

fn transport_error(command: CommandName, err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout { command }
    } else {
        GatewayError::Transport {
            command,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CreateRaceEvent, RemoveRaceEvent};
    use crate::models::{RaceEventId, RaceEventType};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        sync::oneshot,
    };

    /// Serve a single canned response and hand back the raw request.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> anyhow::Result<(String, oneshot::Receiver<String>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = Vec::new();
            let mut chunk = [0_u8; 1024];
            loop {
                let Ok(read) = socket.read(&mut chunk).await else {
                    return;
                };
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..read]);
                if request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
            let _ = tx.send(String::from_utf8_lossy(&request).to_string());
        });
        Ok((format!("http://{addr}/"), rx))
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..split]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= split + 4 + length
    }

    #[tokio::test]
    async fn posts_payload_and_decodes_result() -> anyhow::Result<()> {
        let (url, request) = serve_once(
            "200 OK",
            r#"{"id":"evt-9","name":"Finals","race_event_type":"Cloud","created_at":"2024-05-01T10:00:00Z"}"#,
        )
        .await?;
        let gateway = HttpGateway::new(url, Duration::from_secs(5))?;

        let event = gateway
            .execute(&CreateRaceEvent {
                name: "Finals".to_string(),
            })
            .await?;

        assert_eq!(event.id, RaceEventId::from("evt-9"));
        assert_eq!(event.race_event_type, RaceEventType::Cloud);
        let raw = request.await?;
        assert!(raw.starts_with("POST /commands/create_race_event "));
        assert!(raw.ends_with(r#"{"name":"Finals"}"#));
        Ok(())
    }

    #[tokio::test]
    async fn empty_body_decodes_as_unit() -> anyhow::Result<()> {
        let (url, _request) = serve_once("204 No Content", "").await?;
        let gateway = HttpGateway::new(url, Duration::from_secs(5))?;

        gateway
            .execute(&RemoveRaceEvent {
                race_event_id: RaceEventId::from("evt-1"),
            })
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn error_status_surfaces_backend_message() -> anyhow::Result<()> {
        let (url, _request) = serve_once(
            "422 Unprocessable Entity",
            r#"{"message":"Missing 'name' property in RaceEvent"}"#,
        )
        .await?;
        let gateway = HttpGateway::new(url, Duration::from_secs(5))?;

        let err = gateway
            .execute(&CreateRaceEvent {
                name: String::new(),
            })
            .await
            .unwrap_err();

        match err {
            GatewayError::Remote { command, message } => {
                assert_eq!(command, CommandName::CreateRaceEvent);
                assert_eq!(message, "Missing 'name' property in RaceEvent");
            }
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn silent_backend_times_out() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(socket);
            }
        });
        let gateway = HttpGateway::new(format!("http://{addr}"), Duration::from_millis(200))?;

        let err = gateway
            .execute(&RemoveRaceEvent {
                race_event_id: RaceEventId::from("evt-1"),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Timeout {
                command: CommandName::RemoveRaceEvent
            }
        ));
        Ok(())
    }
}
