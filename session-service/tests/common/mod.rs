//! Shared setup for session-service integration tests.

#![allow(dead_code)]

use reqwest::{Client, Response};
use serde_json::{json, Value};
use session_service::config::SessionConfig;
use session_service::startup::Application;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: Client,
}

impl TestApp {
    /// Starts the service on a random port backed by a fresh in-memory store.
    pub async fn spawn() -> Self {
        let app = Application::build(SessionConfig::in_memory())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to answer
        let client = Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_session(&self, body: &Value) -> Response {
        self.client
            .post(self.url("/sessions"))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Creates a session and returns its JSON body. Panics unless 201.
    pub async fn create_session(&self, name: &str, tags: &[&str], duration: &str) -> Value {
        let response = self
            .post_session(&json!({ "name": name, "tags": tags, "duration": duration }))
            .await;
        assert_eq!(response.status(), 201, "create {} failed", name);
        response.json().await.expect("Failed to parse JSON")
    }

    pub async fn get_session(&self, id: &str) -> Response {
        self.client
            .get(self.url(&format!("/sessions/{}", id)))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put_session(&self, id: &str, etag: Option<&str>, body: &Value) -> Response {
        let mut request = self
            .client
            .put(self.url(&format!("/sessions/{}", id)))
            .json(body);
        if let Some(etag) = etag {
            request = request.header("ETag", etag);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn delete_session(&self, id: &str, etag: Option<&str>) -> Response {
        let mut request = self.client.delete(self.url(&format!("/sessions/{}", id)));
        if let Some(etag) = etag {
            request = request.header("ETag", etag);
        }
        request.send().await.expect("Failed to execute request")
    }
}

pub fn etag_of(response: &Response) -> String {
    response
        .headers()
        .get("etag")
        .expect("Missing ETag header")
        .to_str()
        .expect("Invalid ETag header")
        .to_string()
}
