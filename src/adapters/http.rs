use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::path::PathBuf;
use tokio::process::Command;

use crate::core::curl::CurlCommand;
use crate::domain::model::{Payload, PresignedPost, PresignedPut};
use crate::domain::ports::Transport;
use crate::utils::error::{ProbeError, Result};

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

async fn status_of(response: reqwest::Response) -> Result<u16> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("⚠️ {} response body: {}", status, body);
    }
    Ok(status.as_u16())
}

impl Transport for ReqwestTransport {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    async fn submit_post(&self, post: &PresignedPost, payload: &Payload) -> Result<u16> {
        let mut form = Form::new();
        for (name, value) in &post.fields {
            form = form.text(name.clone(), value.clone());
        }
        // 服務端會忽略 file 之後的欄位
        let file = Part::bytes(payload.bytes.clone()).file_name(payload.file_name.clone());
        form = form.part("file", file);

        tracing::debug!("POST {} ({} fields)", post.url, post.fields.len());
        let response = self.client.post(&post.url).multipart(form).send().await?;
        status_of(response).await
    }

    async fn submit_put(&self, put: &PresignedPut, payload: &Payload) -> Result<u16> {
        let mut request = self.client.put(&put.url).body(payload.bytes.clone());
        for (name, value) in &put.headers {
            if name.eq_ignore_ascii_case("host") {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }

        tracing::debug!("PUT {} ({} bytes)", put.url, payload.len());
        let response = request.send().await?;
        status_of(response).await
    }

    async fn fetch(&self, url: &str) -> Result<(u16, Vec<u8>)> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }
}

/// 以子行程執行 curl，與手動測試時複製貼上的命令完全相同
#[derive(Debug, Clone)]
pub struct CurlTransport {
    program: String,
    scratch_dir: PathBuf,
}

impl CurlTransport {
    pub fn new() -> Self {
        Self {
            program: "curl".to_string(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    fn scratch_path(&self, name: &str) -> PathBuf {
        let sanitized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
            .collect();
        self.scratch_dir
            .join(format!("presign-probe-{}-{}", std::process::id(), sanitized))
    }

    async fn run(&self, command: &CurlCommand) -> Result<u16> {
        tracing::debug!("run: {}", command.render());
        let output = Command::new(&self.program)
            .args(command.args())
            .output()
            .await
            .map_err(|e| ProbeError::TransportError {
                message: format!("failed to spawn {}: {}", self.program, e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            return Err(ProbeError::TransportError {
                message: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        parse_status(&stdout)
    }

    async fn with_payload_file<F, Fut>(&self, payload: &Payload, f: F) -> Result<u16>
    where
        F: FnOnce(String) -> Fut,
        Fut: std::future::Future<Output = Result<u16>>,
    {
        let path = self.scratch_path(&payload.file_name);
        tokio::fs::write(&path, &payload.bytes).await?;
        let result = f(path.to_string_lossy().into_owned()).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::debug!("could not remove {}: {}", path.display(), e);
        }
        result
    }
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_status(stdout: &str) -> Result<u16> {
    // 回應本體都導向檔案，stdout 只剩 -w %{http_code}
    let code = stdout.trim();
    code.parse::<u16>().map_err(|_| ProbeError::TransportError {
        message: format!("unexpected curl output: '{}'", code),
    })
}

impl Transport for CurlTransport {
    fn name(&self) -> &'static str {
        "curl"
    }

    async fn submit_post(&self, post: &PresignedPost, payload: &Payload) -> Result<u16> {
        self.with_payload_file(payload, |path| async move {
            self.run(&CurlCommand::post(post, &path, &payload.file_name))
                .await
        })
        .await
    }

    async fn submit_put(&self, put: &PresignedPut, payload: &Payload) -> Result<u16> {
        self.with_payload_file(payload, |path| async move {
            self.run(&CurlCommand::put(put, &path)).await
        })
        .await
    }

    async fn fetch(&self, url: &str) -> Result<(u16, Vec<u8>)> {
        let path = self.scratch_path("fetch.out");
        let output_path = path.to_string_lossy().into_owned();
        let status = self.run(&CurlCommand::get(url, &output_path)).await?;
        let body = tokio::fs::read(&path).await.unwrap_or_default();
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::debug!("could not remove {}: {}", path.display(), e);
        }
        Ok((status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::collections::BTreeMap;

    fn post_to(url: String) -> PresignedPost {
        let mut fields = BTreeMap::new();
        fields.insert("key".to_string(), "objx:sid".to_string());
        fields.insert("x:sid".to_string(), "123abc".to_string());
        PresignedPost { url, fields }
    }

    #[tokio::test]
    async fn test_reqwest_post_sends_multipart_form() {
        let server = MockServer::start();
        let upload_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/yyytest")
                .header_exists("content-type")
                .body_contains("name=\"x:sid\"")
                .body_contains("123abc")
                .body_contains("filename=\"test.txt\"")
                .body_contains("aaaaaaaaaa");
            then.status(204);
        });

        let transport = ReqwestTransport::new();
        let status = transport
            .submit_post(&post_to(server.url("/yyytest")), &Payload::default())
            .await
            .unwrap();

        upload_mock.assert();
        assert_eq!(status, 204);
    }

    #[tokio::test]
    async fn test_reqwest_returns_error_status_without_failing() {
        let server = MockServer::start();
        let upload_mock = server.mock(|when, then| {
            when.method(POST).path("/yyytest");
            then.status(403).body("<Error><Code>AccessDenied</Code></Error>");
        });

        let transport = ReqwestTransport::new();
        let status = transport
            .submit_post(&post_to(server.url("/yyytest")), &Payload::default())
            .await
            .unwrap();

        upload_mock.assert();
        assert_eq!(status, 403);
    }

    #[tokio::test]
    async fn test_reqwest_put_replays_signed_headers() {
        let server = MockServer::start();
        let put_mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/yyytest/test.py")
                .header("x-amz-meta-sid", "aaa")
                .body("aaaaaaaaaa");
            then.status(200);
        });

        let mut headers = BTreeMap::new();
        headers.insert("x-amz-meta-sid".to_string(), "aaa".to_string());
        let put = PresignedPut {
            url: server.url("/yyytest/test.py?X-Amz-Signature=abc"),
            headers,
        };

        let status = ReqwestTransport::new()
            .submit_put(&put, &Payload::default())
            .await
            .unwrap();

        put_mock.assert();
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn test_curl_post_sends_form_with_payload_file_name() {
        let server = MockServer::start();
        let upload_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/yyytest")
                .body_contains("name=\"x:sid\"")
                .body_contains("123abc")
                .body_contains("filename=\"test.txt\"")
                .body_contains("aaaaaaaaaa");
            then.status(204);
        });

        let scratch = tempfile::tempdir().unwrap();
        let transport = CurlTransport::new().with_scratch_dir(scratch.path());
        let status = transport
            .submit_post(&post_to(server.url("/yyytest")), &Payload::default())
            .await
            .unwrap();

        upload_mock.assert();
        assert_eq!(status, 204);
        // 暫存檔上傳後即刪除
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_curl_put_and_fetch() {
        let server = MockServer::start();
        let put_mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/yyytest/test.py")
                .header("x-amz-meta-sid", "aaa")
                .body("aaaaaaaaaa");
            then.status(200);
        });
        let get_mock = server.mock(|when, then| {
            when.method(GET).path("/yyytest/test.py");
            then.status(200).body("aaaaaaaaaa");
        });

        let mut headers = BTreeMap::new();
        headers.insert("x-amz-meta-sid".to_string(), "aaa".to_string());
        let put = PresignedPut {
            url: server.url("/yyytest/test.py?X-Amz-Signature=abc"),
            headers,
        };

        let scratch = tempfile::tempdir().unwrap();
        let transport = CurlTransport::new().with_scratch_dir(scratch.path());

        let status = transport.submit_put(&put, &Payload::default()).await.unwrap();
        assert_eq!(status, 200);
        put_mock.assert();

        let (status, body) = transport
            .fetch(&server.url("/yyytest/test.py?X-Amz-Signature=abc"))
            .await
            .unwrap();
        get_mock.assert();
        assert_eq!(status, 200);
        assert_eq!(body, b"aaaaaaaaaa".to_vec());
    }

    #[tokio::test]
    async fn test_curl_reports_error_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/yyytest");
            then.status(403).body("<Error><Code>AccessDenied</Code></Error>");
        });

        let scratch = tempfile::tempdir().unwrap();
        let status = CurlTransport::new()
            .with_scratch_dir(scratch.path())
            .submit_post(&post_to(server.url("/yyytest")), &Payload::default())
            .await
            .unwrap();
        assert_eq!(status, 403);
    }

    #[tokio::test]
    async fn test_curl_transport_missing_program() {
        let transport = CurlTransport::new().with_program("definitely-not-curl-binary");
        let err = transport
            .fetch("http://127.0.0.1:1/nothing")
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::TransportError { .. }));
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("204").unwrap(), 204);
        assert_eq!(parse_status("  200\n").unwrap(), 200);
        assert!(parse_status("").is_err());
    }
}
