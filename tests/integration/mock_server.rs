use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

/// One request received by the mock sink server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub api_key: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// Stands in for Pinata and the notification webhook.
#[derive(Clone)]
pub struct MockSinkServer {
    pins: Arc<Mutex<Vec<CapturedRequest>>>,
    hooks: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockSinkServer {
    pub fn new() -> Self {
        Self {
            pins: Arc::new(Mutex::new(Vec::new())),
            hooks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn start(&self) -> String {
        let pins = self.pins.clone();
        let hooks = self.hooks.clone();

        let make_svc = make_service_fn(move |_conn| {
            let pins = pins.clone();
            let hooks = hooks.clone();

            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    handle_request(req, pins.clone(), hooks.clone())
                }))
            }
        });

        // Bind to random port
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let server = Server::bind(&addr).serve(make_svc);
        let actual_addr = server.local_addr();

        tokio::spawn(async move {
            if let Err(e) = server.await {
                eprintln!("Mock server error: {}", e);
            }
        });

        format!("http://{}", actual_addr)
    }

    pub fn get_pins(&self) -> Vec<CapturedRequest> {
        self.pins.lock().unwrap().clone()
    }

    pub fn get_hooks(&self) -> Vec<CapturedRequest> {
        self.hooks.lock().unwrap().clone()
    }

    /// Wait for the detached webhook task to deliver.
    pub async fn wait_for_hooks(&self, count: usize) -> Vec<CapturedRequest> {
        for _ in 0..50 {
            let hooks = self.get_hooks();
            if hooks.len() >= count {
                return hooks;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }
        self.get_hooks()
    }
}

async fn handle_request(
    req: Request<Body>,
    pins: Arc<Mutex<Vec<CapturedRequest>>>,
    hooks: Arc<Mutex<Vec<CapturedRequest>>>,
) -> Result<Response<Body>, Infallible> {
    let path = req.uri().path().to_string();
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let api_key = header("pinata_api_key");
    let content_type = header("content-type");

    let body = hyper::body::to_bytes(req.into_body())
        .await
        .unwrap_or_default()
        .to_vec();
    let captured = CapturedRequest {
        path: path.clone(),
        api_key,
        content_type,
        body,
    };

    match path.as_str() {
        "/pinning/pinFileToIPFS" | "/pinning/pinJSONToIPFS" => {
            let cid = if path.ends_with("pinFileToIPFS") {
                "QmCertificateFile"
            } else {
                "QmCertificateMeta"
            };
            let size = captured.body.len();
            pins.lock().unwrap().push(captured);

            let body = serde_json::json!({
                "IpfsHash": cid,
                "PinSize": size,
                "Timestamp": "2024-01-01T00:00:00.000Z"
            });
            Ok(Response::new(Body::from(body.to_string())))
        }
        p if p.starts_with("/hook/") => {
            hooks.lock().unwrap().push(captured);
            Ok(Response::new(Body::from("Accepted")))
        }
        _ => {
            let mut response = Response::new(Body::from("Not Found"));
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockSinkServer::new();
        let url = server.start().await;

        assert!(url.starts_with("http://127.0.0.1:"));
    }

    #[tokio::test]
    async fn test_mock_server_answers_pins() {
        let server = MockSinkServer::new();
        let url = server.start().await;

        let client = hyper::Client::new();
        let req = hyper::Request::builder()
            .method("POST")
            .uri(format!("{}/pinning/pinJSONToIPFS", url))
            .header("content-type", "application/json")
            .header("pinata_api_key", "key")
            .body(Body::from(r#"{"pinataContent":{}}"#))
            .unwrap();

        let response = client.request(req).await.unwrap();
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["IpfsHash"], "QmCertificateMeta");
        let pins = server.get_pins();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].api_key.as_deref(), Some("key"));
    }
}
