//! Minimal W3C WebDriver client.
//!
//! Only the commands the harvester needs are implemented: session
//! create/delete, navigation, element lookup (page and element scoped),
//! text/attribute reads, clear/send-keys, click and synchronous script
//! execution.

use super::{BrowserLauncher, ElementHandle, PageDriver};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use trendscout_core::DriverError;
use url::Url;

/// Key under which WebDriver servers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const CSS_SELECTOR: &str = "css selector";

fn network_error(error: reqwest::Error) -> DriverError {
    DriverError::Network(error.to_string())
}

/// Unwraps the `value` member of a WebDriver response, mapping error
/// payloads onto [`DriverError`].
pub(crate) fn decode_response(status: u16, payload: Value) -> Result<Value, DriverError> {
    let value = payload.get("value").cloned().unwrap_or(Value::Null);
    if (200..300).contains(&status) {
        return Ok(value);
    }

    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Err(match error.as_str() {
        "no such element" => DriverError::NoSuchElement { selector: message },
        "timeout" | "script timeout" => DriverError::Timeout {
            selector: message,
            timeout_ms: 0,
        },
        "javascript error" => DriverError::Script { message },
        "invalid session id" => DriverError::SessionClosed,
        _ => DriverError::Protocol {
            status,
            error,
            message,
        },
    })
}

pub(crate) fn element_id(value: &Value) -> Result<String, DriverError> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| DriverError::Protocol {
            status: 200,
            error: "invalid element reference".to_string(),
            message: value.to_string(),
        })
}

fn locator(selector: &str) -> Value {
    json!({ "using": CSS_SELECTOR, "value": selector })
}

pub struct WebDriverLauncher {
    client: Client,
    endpoint: Url,
    capabilities: Value,
    poll_interval: Duration,
}

impl WebDriverLauncher {
    pub fn new(endpoint: Url) -> Result<Self, DriverError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(network_error)?;

        Ok(Self {
            client,
            endpoint,
            capabilities: json!({}),
            poll_interval: Duration::from_millis(250),
        })
    }

    pub fn headless_chrome(endpoint: Url) -> Result<Self, DriverError> {
        Ok(Self::new(endpoint)?.with_capabilities(json!({
            "browserName": "chrome",
            "goog:chromeOptions": { "args": ["--headless=new", "--window-size=1280,2000"] }
        })))
    }

    pub fn with_capabilities(mut self, capabilities: Value) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn base(&self) -> String {
        self.endpoint.as_str().trim_end_matches('/').to_string()
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        let url = format!("{}/session", self.base());
        let body = json!({ "capabilities": { "alwaysMatch": self.capabilities } });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;
        let status = response.status().as_u16();
        let payload: Value = response.json().await.map_err(network_error)?;
        let value = decode_response(status, payload)?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Protocol {
                status,
                error: "session not created".to_string(),
                message: value.to_string(),
            })?;

        info!("Opened WebDriver session {}", session_id);
        Ok(Box::new(WebDriverSession {
            inner: Arc::new(SessionInner {
                client: self.client.clone(),
                base: format!("{}/session/{}", self.base(), session_id),
                poll_interval: self.poll_interval,
                closed: AtomicBool::new(false),
            }),
        }))
    }
}

struct SessionInner {
    client: Client,
    base: String,
    poll_interval: Duration,
    closed: AtomicBool,
}

impl SessionInner {
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, DriverError> {
        let url = format!("{}{}", self.base, path);
        debug!("WebDriver {} {}", method, path);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        let payload: Value = response.json().await.map_err(network_error)?;
        decode_response(status, payload)
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::SessionClosed);
        }
        self.send(method, path, body).await
    }

    async fn find_elements(&self, scope: Option<&str>, selector: &str) -> Result<Vec<String>, DriverError> {
        let path = match scope {
            Some(id) => format!("/element/{}/elements", id),
            None => "/elements".to_string(),
        };
        let value = self.command(Method::POST, &path, Some(locator(selector))).await?;

        value
            .as_array()
            .map(|elements| elements.iter().map(element_id).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn find_element(&self, selector: &str) -> Result<String, DriverError> {
        let value = self
            .command(Method::POST, "/element", Some(locator(selector)))
            .await
            .map_err(|e| match e {
                DriverError::NoSuchElement { .. } => DriverError::NoSuchElement {
                    selector: selector.to_string(),
                },
                other => other,
            })?;
        element_id(&value)
    }
}

pub struct WebDriverSession {
    inner: Arc<SessionInner>,
}

impl WebDriverSession {
    fn element(&self, id: String) -> Box<dyn ElementHandle> {
        Box::new(WebDriverElement {
            session: self.inner.clone(),
            id,
        })
    }
}

#[async_trait]
impl PageDriver for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.inner
            .command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, DriverError> {
        let ids = self.inner.find_elements(None, selector).await?;
        Ok(ids.into_iter().map(|id| self.element(id)).collect())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let id = self.inner.find_element(selector).await?;
        self.inner
            .command(Method::POST, &format!("/element/{}/clear", id), Some(json!({})))
            .await?;
        self.inner
            .command(
                Method::POST,
                &format!("/element/{}/value", id),
                Some(json!({ "text": value })),
            )
            .await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let id = self.inner.find_element(selector).await?;
        self.inner
            .command(Method::POST, &format!("/element/{}/click", id), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.inner.find_elements(None, selector).await?.is_empty() {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(DriverError::Timeout {
                    selector: selector.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.inner.poll_interval.min(deadline - now)).await;
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Value, DriverError> {
        self.inner
            .command(
                Method::POST,
                "/execute/sync",
                Some(json!({ "script": script, "args": [] })),
            )
            .await
    }

    async fn close(&self) -> Result<(), DriverError> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Err(DriverError::SessionClosed);
        }
        self.inner.send(Method::DELETE, "", None).await?;
        info!("Closed WebDriver session {}", self.inner.base);
        Ok(())
    }
}

struct WebDriverElement {
    session: Arc<SessionInner>,
    id: String,
}

#[async_trait]
impl ElementHandle for WebDriverElement {
    async fn text(&self) -> Result<String, DriverError> {
        let value = self
            .session
            .command(Method::GET, &format!("/element/{}/text", self.id), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        let value = self
            .session
            .command(
                Method::GET,
                &format!("/element/{}/attribute/{}", self.id, name),
                None,
            )
            .await?;
        Ok(value.as_str().map(String::from))
    }

    async fn query(&self, selector: &str) -> Result<Option<Box<dyn ElementHandle>>, DriverError> {
        let ids = self.session.find_elements(Some(&self.id), selector).await?;
        Ok(ids.into_iter().next().map(|id| {
            Box::new(WebDriverElement {
                session: self.session.clone(),
                id,
            }) as Box<dyn ElementHandle>
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_success_unwraps_value() {
        let payload = json!({ "value": 4200 });
        assert_eq!(decode_response(200, payload).unwrap(), json!(4200));

        let empty = json!({ "value": null });
        assert_eq!(decode_response(200, empty).unwrap(), Value::Null);
    }

    #[test]
    fn test_decode_error_payloads() {
        let no_element = json!({ "value": { "error": "no such element", "message": "#username" } });
        assert!(matches!(
            decode_response(404, no_element),
            Err(DriverError::NoSuchElement { .. })
        ));

        let script = json!({ "value": { "error": "javascript error", "message": "boom" } });
        assert_eq!(
            decode_response(500, script),
            Err(DriverError::Script {
                message: "boom".to_string()
            })
        );

        let gone = json!({ "value": { "error": "invalid session id", "message": "" } });
        assert_eq!(decode_response(404, gone), Err(DriverError::SessionClosed));

        let other = json!({ "value": { "error": "unknown command", "message": "nope" } });
        match decode_response(404, other) {
            Err(DriverError::Protocol { status, error, .. }) => {
                assert_eq!(status, 404);
                assert_eq!(error, "unknown command");
            }
            result => panic!("Expected Protocol error, got {:?}", result),
        }
    }

    #[test]
    fn test_element_reference_parsing() {
        let reference = json!({ ELEMENT_KEY: "abc-123" });
        assert_eq!(element_id(&reference).unwrap(), "abc-123");

        let legacy = json!({ "ELEMENT": "abc-123" });
        assert!(element_id(&legacy).is_err());
    }

    #[test]
    fn test_launcher_base_url() {
        let launcher = WebDriverLauncher::new(Url::parse("http://localhost:9515/").unwrap()).unwrap();
        assert_eq!(launcher.base(), "http://localhost:9515");

        let chrome =
            WebDriverLauncher::headless_chrome(Url::parse("http://localhost:9515").unwrap()).unwrap();
        assert_eq!(chrome.capabilities["browserName"], "chrome");
    }
}
