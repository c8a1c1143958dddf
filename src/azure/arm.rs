//! Azure Resource Manager REST client for Analysis Services servers.
//!
//! Requests are made with a blocking `ureq` agent on the blocking thread
//! pool. Long-running operations are polled from async code so a caller's
//! deadline can cancel them between polls.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::auth::TokenSource;
use super::client::{AnalysisServicesClient, ClientError};
use super::models::{is_terminal_provisioning_state, Server};
use super::resource_id::ResourceId;
use crate::config::ResolvedConfig;

/// Upper bound for a single HTTP exchange.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

enum Request {
    Get(String),
    Delete(String),
    Put(String, Server),
}

struct RawResponse {
    status: u16,
    body: String,
    location: Option<String>,
}

impl RawResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn into_error(self) -> ClientError {
        ClientError::from_status(self.status, arm_error_message(self.status, &self.body))
    }

    fn decode_server(&self) -> Result<Option<Server>, ClientError> {
        if self.body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&self.body)
            .map(Some)
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

struct Inner {
    agent: ureq::Agent,
    tokens: TokenSource,
    endpoint: String,
    subscription_id: String,
    api_version: String,
}

impl Inner {
    fn execute(&self, request: Request) -> Result<RawResponse, ClientError> {
        let token = self.tokens.token(&self.agent)?;
        let bearer = format!("Bearer {}", token);

        let result = match request {
            Request::Get(url) => self
                .agent
                .get(&url)
                .header("Authorization", bearer.as_str())
                .call(),
            Request::Delete(url) => self
                .agent
                .delete(&url)
                .header("Authorization", bearer.as_str())
                .call(),
            Request::Put(url, server) => self
                .agent
                .put(&url)
                .header("Authorization", bearer.as_str())
                .send_json(&server),
        };

        let mut response = result.map_err(map_transport_error)?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(map_transport_error)?;

        Ok(RawResponse {
            status,
            body,
            location,
        })
    }
}

/// [`AnalysisServicesClient`] backed by the Resource Manager REST API.
#[derive(Clone)]
pub struct ArmClient {
    inner: Arc<Inner>,
    poll_interval: Duration,
}

impl ArmClient {
    /// Build a client from resolved provider configuration.
    pub fn new(config: &ResolvedConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();

        let tokens = TokenSource::new(
            config.credentials.clone(),
            config.authority.clone(),
            format!("{}/", config.endpoint),
        );

        Self {
            inner: Arc::new(Inner {
                agent: ureq::Agent::new_with_config(agent_config),
                tokens,
                endpoint: config.endpoint.clone(),
                subscription_id: config.subscription_id.clone(),
                api_version: config.api_version.clone(),
            }),
            poll_interval: config.poll_interval,
        }
    }

    fn server_url(&self, resource_group: &str, name: &str) -> String {
        let id = ResourceId::analysis_server(&self.inner.subscription_id, resource_group, name);
        format!(
            "{}{}?api-version={}",
            self.inner.endpoint, id, self.inner.api_version
        )
    }

    async fn send(&self, request: Request) -> Result<RawResponse, ClientError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.execute(request))
            .await
            .map_err(|e| ClientError::Transport(format!("request task failed: {}", e)))?
    }

    /// Poll the server until its provisioning state is terminal.
    async fn wait_for_provisioning(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<Server, ClientError> {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let server = self.get_details(resource_group, name).await?;
            match server.provisioning_state() {
                Some(state) if !is_terminal_provisioning_state(state) => {
                    debug!(resource_group, name, state, "Server still provisioning");
                }
                _ => return check_provisioning(server),
            }
        }
    }

    /// Follow an ARM `Location` header until the operation stops reporting 202.
    async fn wait_for_location(&self, url: String) -> Result<(), ClientError> {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let response = self.send(Request::Get(url.clone())).await?;
            match response.status {
                202 => debug!(url = %url, "Operation still in progress"),
                _ if response.is_success() => return Ok(()),
                _ => return Err(response.into_error()),
            }
        }
    }
}

#[async_trait::async_trait]
impl AnalysisServicesClient for ArmClient {
    #[instrument(skip(self, server))]
    async fn create(
        &self,
        resource_group: &str,
        name: &str,
        server: &Server,
    ) -> Result<Server, ClientError> {
        let url = self.server_url(resource_group, name);
        let response = self.send(Request::Put(url, server.clone())).await?;
        if !response.is_success() {
            return Err(response.into_error());
        }

        match response.decode_server()? {
            Some(server)
                if server
                    .provisioning_state()
                    .is_some_and(is_terminal_provisioning_state) =>
            {
                check_provisioning(server)
            }
            _ => self.wait_for_provisioning(resource_group, name).await,
        }
    }

    #[instrument(skip(self))]
    async fn get_details(&self, resource_group: &str, name: &str) -> Result<Server, ClientError> {
        let url = self.server_url(resource_group, name);
        let response = self.send(Request::Get(url)).await?;
        if !response.is_success() {
            return Err(response.into_error());
        }
        response
            .decode_server()?
            .ok_or_else(|| ClientError::Decode("empty response body".to_string()))
    }

    #[instrument(skip(self))]
    async fn delete(&self, resource_group: &str, name: &str) -> Result<(), ClientError> {
        let url = self.server_url(resource_group, name);
        let response = self.send(Request::Delete(url)).await?;
        match response.status {
            202 => match response.location {
                Some(location) => self.wait_for_location(location).await,
                None => self.wait_for_absence(resource_group, name).await,
            },
            _ if response.is_success() => Ok(()),
            _ => Err(response.into_error()),
        }
    }
}

impl ArmClient {
    async fn wait_for_absence(&self, resource_group: &str, name: &str) -> Result<(), ClientError> {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            match self.get_details(resource_group, name).await {
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
                Ok(_) => debug!(resource_group, name, "Server still deleting"),
            }
        }
    }
}

fn check_provisioning(server: Server) -> Result<Server, ClientError> {
    match server.provisioning_state() {
        Some(state)
            if state.eq_ignore_ascii_case("Failed") || state.eq_ignore_ascii_case("Canceled") =>
        {
            warn!(state, "Provisioning ended unsuccessfully");
            Err(ClientError::OperationFailed(format!(
                "provisioning state is {}",
                state
            )))
        }
        _ => Ok(server),
    }
}

fn map_transport_error(err: ureq::Error) -> ClientError {
    match err {
        ureq::Error::Timeout(_) => ClientError::Timeout(err.to_string()),
        other => ClientError::Transport(other.to_string()),
    }
}

/// Render an ARM error body (`{"error": {"code", "message"}}`) as text.
fn arm_error_message(status: u16, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let code = error.and_then(|e| e.get("code")).and_then(Value::as_str);
    let message = error.and_then(|e| e.get("message")).and_then(Value::as_str);

    match (code, message) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (None, Some(message)) => message.to_string(),
        (Some(code), None) => code.to_string(),
        (None, None) if !body.trim().is_empty() => body.trim().to_string(),
        (None, None) => format!("request failed with HTTP {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::models::ServerProperties;
    use crate::config::{Credentials, Timeouts};
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_test::{assert_err, assert_ok};

    const SERVER_PATH: &str = "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.AnalysisServices/servers/acctest1?api-version=2017-08-01";

    fn config() -> ResolvedConfig {
        ResolvedConfig {
            subscription_id: "sub".into(),
            credentials: Credentials::AccessToken("token".into()),
            endpoint: "https://management.azure.com".into(),
            authority: "https://login.microsoftonline.com".into(),
            api_version: "2017-08-01".into(),
            poll_interval: Duration::from_secs(1),
            timeouts: Timeouts::default(),
        }
    }

    fn response(status: u16, headers: &[(&str, &str)], body: &str) -> String {
        let reason = match status {
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            404 => "Not Found",
            _ => "Unknown",
        };
        let mut out = format!(
            "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
            status,
            reason,
            body.len()
        );
        for (name, value) in headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        out.push_str("\r\n");
        out.push_str(body);
        out
    }

    fn server_body(provisioning_state: &str) -> String {
        format!(
            r#"{{"id":"/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.AnalysisServices/servers/acctest1","name":"acctest1","location":"westus","sku":{{"name":"B1","tier":"Basic"}},"properties":{{"provisioningState":"{}"}}}}"#,
            provisioning_state
        )
    }

    /// Read one request and return its `METHOD target`.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some((head, body)) = text.split_once("\r\n\r\n") {
                let length = head
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let chunked = head.to_ascii_lowercase().contains("transfer-encoding: chunked");
                let complete = if chunked {
                    body.ends_with("0\r\n\r\n")
                } else {
                    body.len() >= length
                };
                if n == 0 || complete {
                    let request_line = head.lines().next().unwrap_or_default();
                    return request_line
                        .rsplit_once(' ')
                        .map(|(line, _)| line.to_string())
                        .unwrap_or_default();
                }
            }
            if n == 0 {
                return String::new();
            }
        }
    }

    /// Serve the responses built for the stub's endpoint in order, one per
    /// connection, recording each request.
    async fn arm_stub(
        responses: impl FnOnce(&str) -> Vec<String>,
    ) -> (ArmClient, String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let responses = responses(&endpoint);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        tokio::spawn(async move {
            for canned in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                recorded.lock().unwrap().push(request);
                let _ = socket.write_all(canned.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        let client = ArmClient::new(&ResolvedConfig {
            endpoint: endpoint.clone(),
            poll_interval: Duration::from_millis(10),
            ..config()
        });
        (client, endpoint, requests)
    }

    fn server() -> Server {
        Server {
            location: Some("westus".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_polls_until_succeeded() {
        let (client, _, requests) = arm_stub(|_| {
            vec![
                response(201, &[], &server_body("Provisioning")),
                response(200, &[], &server_body("Provisioning")),
                response(200, &[], &server_body("Succeeded")),
            ]
        })
        .await;

        let created = assert_ok!(client.create("rg1", "acctest1", &server()).await);
        assert_eq!(created.provisioning_state(), Some("Succeeded"));

        let requests = requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec![
                format!("PUT {}", SERVER_PATH),
                format!("GET {}", SERVER_PATH),
                format!("GET {}", SERVER_PATH),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_failed_provisioning() {
        let (client, _, requests) =
            arm_stub(|_| vec![response(200, &[], &server_body("Failed"))]).await;

        let err = assert_err!(client.create("rg1", "acctest1", &server()).await);
        assert!(matches!(err, ClientError::OperationFailed(_)));
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_canceled_while_polling() {
        let (client, _, _) = arm_stub(|_| {
            vec![
                response(201, &[], &server_body("Provisioning")),
                response(200, &[], &server_body("Canceled")),
            ]
        })
        .await;

        let err = assert_err!(client.create("rg1", "acctest1", &server()).await);
        assert_eq!(
            err,
            ClientError::OperationFailed("provisioning state is Canceled".into())
        );
    }

    #[tokio::test]
    async fn test_create_rejected_maps_arm_error() {
        let (client, _, _) = arm_stub(|_| {
            vec![response(
                409,
                &[],
                r#"{"error":{"code":"Conflict","message":"name in use"}}"#,
            )]
        })
        .await;

        let err = assert_err!(client.create("rg1", "acctest1", &server()).await);
        assert_eq!(err, ClientError::Conflict("Conflict: name in use".into()));
    }

    #[tokio::test]
    async fn test_delete_follows_location_header() {
        let (client, _, requests) = arm_stub(|endpoint| {
            let location = format!("{}/operations/1", endpoint);
            vec![
                response(202, &[("location", location.as_str())], ""),
                response(202, &[("location", location.as_str())], ""),
                response(200, &[], ""),
            ]
        })
        .await;

        assert_ok!(client.delete("rg1", "acctest1").await);

        let requests = requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec![
                format!("DELETE {}", SERVER_PATH),
                "GET /operations/1".to_string(),
                "GET /operations/1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_without_location_waits_for_absence() {
        let (client, _, requests) = arm_stub(|_| {
            vec![
                response(202, &[], ""),
                response(200, &[], &server_body("Deleting")),
                response(404, &[], r#"{"error":{"code":"ResourceNotFound","message":"gone"}}"#),
            ]
        })
        .await;

        assert_ok!(client.delete("rg1", "acctest1").await);

        let requests = requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec![
                format!("DELETE {}", SERVER_PATH),
                format!("GET {}", SERVER_PATH),
                format!("GET {}", SERVER_PATH),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_operation_failure_is_reported() {
        let (client, _, _) = arm_stub(|endpoint| {
            let location = format!("{}/operations/1", endpoint);
            vec![
                response(202, &[("location", location.as_str())], ""),
                response(500, &[], r#"{"error":{"code":"InternalError","message":"boom"}}"#),
            ]
        })
        .await;

        let err = assert_err!(client.delete("rg1", "acctest1").await);
        assert_eq!(err, ClientError::Unavailable("InternalError: boom".into()));
    }

    #[test]
    fn test_server_url() {
        let client = ArmClient::new(&config());
        assert_eq!(
            client.server_url("rg1", "acctest1"),
            "https://management.azure.com/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.AnalysisServices/servers/acctest1?api-version=2017-08-01"
        );
    }

    #[test]
    fn test_arm_error_message() {
        assert_eq!(
            arm_error_message(
                400,
                r#"{"error":{"code":"InvalidSku","message":"The SKU B9 is not valid."}}"#
            ),
            "InvalidSku: The SKU B9 is not valid."
        );
        assert_eq!(
            arm_error_message(404, r#"{"error":{"code":"ResourceGroupNotFound"}}"#),
            "ResourceGroupNotFound"
        );
        assert_eq!(arm_error_message(502, "Bad Gateway"), "Bad Gateway");
        assert_eq!(arm_error_message(500, ""), "request failed with HTTP 500");
    }

    #[test]
    fn test_raw_response_classification() {
        let response = RawResponse {
            status: 404,
            body: r#"{"error":{"code":"ResourceNotFound","message":"gone"}}"#.into(),
            location: None,
        };
        assert!(!response.is_success());
        assert!(response.into_error().is_not_found());

        let response = RawResponse {
            status: 204,
            body: String::new(),
            location: None,
        };
        assert!(response.is_success());
        assert_eq!(response.decode_server().unwrap(), None);
    }

    #[test]
    fn test_check_provisioning() {
        let with_state = |state: &str| Server {
            properties: Some(ServerProperties {
                provisioning_state: Some(state.into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(check_provisioning(with_state("Succeeded")).is_ok());
        assert!(matches!(
            check_provisioning(with_state("Failed")),
            Err(ClientError::OperationFailed(_))
        ));
        assert!(check_provisioning(Server::default()).is_ok());
    }
}
