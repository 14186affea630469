pub mod post_batched;
pub mod post_each;
pub mod put;

use std::sync::Arc;

use crate::config::toml_config::{ProbeConfig, ScenarioKind};
use crate::core::curl::CurlCommand;
use crate::core::presign::Presigner;
use crate::domain::model::{
    CheckOutcome, CheckStep, Payload, PresignedPost, PresignedPut, UploadMethod, UploadRecord,
};
use crate::domain::ports::{ObjectStore, Scenario, Transport};
use crate::utils::error::{ProbeError, Result};

pub use post_batched::PostBatchedScenario;
pub use post_each::PostEachScenario;
pub use put::PutScenario;

/// 所有 scenario 共用的簽名器、傳輸、存取端與上傳內容
pub struct ProbeContext<S: ObjectStore, T: Transport> {
    pub presigner: Presigner,
    pub transport: T,
    pub store: S,
    pub payload: Payload,
    pub run_name: String,
    pub dry_run: bool,
    pub print_curl: bool,
}

impl<S: ObjectStore, T: Transport> ProbeContext<S, T> {
    pub(crate) async fn send_post(
        &self,
        scenario: &str,
        key: &str,
        post: &PresignedPost,
    ) -> Result<UploadRecord> {
        if self.print_curl {
            let file_name = &self.payload.file_name;
            println!("run : {}", CurlCommand::post(post, file_name, file_name).render());
        }

        let status = if self.dry_run {
            None
        } else {
            Some(self.transport.submit_post(post, &self.payload).await?)
        };
        log_upload(scenario, UploadMethod::Post, key, status);

        Ok(UploadRecord {
            scenario: scenario.to_string(),
            key: key.to_string(),
            method: UploadMethod::Post,
            url: post.url.clone(),
            status,
            transport: self.transport.name().to_string(),
        })
    }

    pub(crate) async fn send_put(
        &self,
        scenario: &str,
        key: &str,
        put: &PresignedPut,
    ) -> Result<UploadRecord> {
        if self.print_curl {
            println!("{}", CurlCommand::put(put, &self.payload.file_name).render());
        }

        let status = if self.dry_run {
            None
        } else {
            Some(self.transport.submit_put(put, &self.payload).await?)
        };
        log_upload(scenario, UploadMethod::Put, key, status);

        Ok(UploadRecord {
            scenario: scenario.to_string(),
            key: key.to_string(),
            method: UploadMethod::Put,
            url: put.url.clone(),
            status,
            transport: self.transport.name().to_string(),
        })
    }

    /// 讀回物件並比對內容
    pub(crate) async fn read_back(&self, key: &str) -> CheckOutcome {
        match self.store.get_object(key).await {
            Ok(object) if object.body == self.payload.bytes => {
                tracing::info!(
                    "📥 Get object {}: {} bytes, content-type={:?}, metadata={:?}",
                    key,
                    object.body.len(),
                    object.content_type,
                    object.metadata
                );
                CheckOutcome::pass(
                    CheckStep::Get,
                    key,
                    format!("{} bytes match", object.body.len()),
                )
            }
            Ok(object) => CheckOutcome::fail(
                CheckStep::Get,
                key,
                format!(
                    "body mismatch: expected {} bytes, got {} bytes",
                    self.payload.len(),
                    object.body.len()
                ),
            ),
            Err(e) => CheckOutcome::fail(CheckStep::Get, key, e.to_string()),
        }
    }

    pub(crate) async fn remove(&self, key: &str) -> CheckOutcome {
        match self.store.delete_object(key).await {
            Ok(()) => {
                tracing::info!("🗑️ Deleted {}", key);
                CheckOutcome::pass(CheckStep::Delete, key, "deleted")
            }
            Err(e) => CheckOutcome::fail(CheckStep::Delete, key, e.to_string()),
        }
    }
}

fn log_upload(scenario: &str, method: UploadMethod, key: &str, status: Option<u16>) {
    match status {
        Some(code) if (200..300).contains(&code) => {
            tracing::info!("✅ [{}] {} {} -> {}", scenario, method, key, code)
        }
        Some(code) => tracing::warn!("❌ [{}] {} {} -> {}", scenario, method, key, code),
        None => tracing::info!("🔍 [{}] {} {} minted (dry run)", scenario, method, key),
    }
}

/// 每筆上傳的狀態碼本身就是一項檢查
pub(crate) fn upload_checks(uploads: &[UploadRecord]) -> Vec<CheckOutcome> {
    uploads
        .iter()
        .filter(|u| u.status.is_some())
        .map(|u| {
            let status = u.status.unwrap_or_default();
            if u.succeeded() {
                CheckOutcome::pass(CheckStep::Upload, &u.key, format!("HTTP {}", status))
            } else {
                CheckOutcome::fail(CheckStep::Upload, &u.key, format!("HTTP {}", status))
            }
        })
        .collect()
}

/// 依設定的順序建立 scenario
pub fn build_scenarios<S, T>(
    config: &ProbeConfig,
    ctx: Arc<ProbeContext<S, T>>,
) -> Result<Vec<Box<dyn Scenario>>>
where
    S: ObjectStore + 'static,
    T: Transport + 'static,
{
    let mut scenarios: Vec<Box<dyn Scenario>> = Vec::new();
    for kind in config.run.scenarios() {
        match kind {
            ScenarioKind::PostEach => scenarios.push(Box::new(PostEachScenario::new(
                ctx.clone(),
                &config.post,
            ))),
            ScenarioKind::PostBatched => {
                let scenario = PostBatchedScenario::new(ctx.clone(), &config.post);
                if scenario.rounds() == 0 {
                    return Err(ProbeError::ConfigValidationError {
                        field: "post.fields".to_string(),
                        message: "post-batched needs at least one field".to_string(),
                    });
                }
                scenarios.push(Box::new(scenario));
            }
            ScenarioKind::Put => {
                scenarios.push(Box::new(PutScenario::new(ctx.clone(), &config.put)))
            }
        }
    }
    Ok(scenarios)
}
