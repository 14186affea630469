use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::{upload_checks, ProbeContext};
use crate::config::toml_config::PutConfig;
use crate::domain::model::{CheckOutcome, CheckStep, UploadRecord};
use crate::domain::ports::{ObjectStore, Scenario, Transport};
use crate::utils::error::Result;

pub struct PutScenario<S: ObjectStore, T: Transport> {
    ctx: Arc<ProbeContext<S, T>>,
    key: String,
    metadata: BTreeMap<String, String>,
    expires_in: Duration,
}

impl<S: ObjectStore, T: Transport> PutScenario<S, T> {
    pub fn new(ctx: Arc<ProbeContext<S, T>>, put: &PutConfig) -> Self {
        Self {
            key: put.key().to_string(),
            metadata: put.metadata(),
            expires_in: put.expires_in(),
            ctx,
        }
    }

    async fn check_metadata(&self) -> Option<CheckOutcome> {
        if self.metadata.is_empty() {
            return None;
        }
        let outcome = match self.ctx.store.get_object(&self.key).await {
            Ok(object) => {
                let wrong: Vec<&str> = self
                    .metadata
                    .iter()
                    .filter(|(name, value)| {
                        // header 名稱傳輸時不分大小寫，服務端以小寫保存
                        !object
                            .metadata
                            .iter()
                            .any(|(stored, v)| stored.eq_ignore_ascii_case(name) && v == *value)
                    })
                    .map(|(name, _)| name.as_str())
                    .collect();
                if wrong.is_empty() {
                    CheckOutcome::pass(CheckStep::Get, &self.key, "metadata stored")
                } else {
                    CheckOutcome::fail(
                        CheckStep::Get,
                        &self.key,
                        format!("metadata missing or different: {}", wrong.join(", ")),
                    )
                }
            }
            Err(e) => CheckOutcome::fail(CheckStep::Get, &self.key, e.to_string()),
        };
        Some(outcome)
    }

    /// 透過 presigned GET 再讀一次
    async fn check_presigned_get(&self) -> CheckOutcome {
        let url = match self.ctx.presigner.presign_get(&self.key, self.expires_in).await {
            Ok(url) => url,
            Err(e) => return CheckOutcome::fail(CheckStep::PresignedGet, &self.key, e.to_string()),
        };

        match self.ctx.transport.fetch(&url).await {
            Ok((status, body)) if (200..300).contains(&status) && body == self.ctx.payload.bytes => {
                CheckOutcome::pass(CheckStep::PresignedGet, &self.key, format!("HTTP {}", status))
            }
            Ok((status, body)) => CheckOutcome::fail(
                CheckStep::PresignedGet,
                &self.key,
                format!("HTTP {} with {} bytes", status, body.len()),
            ),
            Err(e) => CheckOutcome::fail(CheckStep::PresignedGet, &self.key, e.to_string()),
        }
    }
}

#[async_trait]
impl<S, T> Scenario for PutScenario<S, T>
where
    S: ObjectStore + 'static,
    T: Transport + 'static,
{
    fn name(&self) -> &str {
        "put"
    }

    async fn upload(&self, _round: usize) -> Result<Vec<UploadRecord>> {
        let put = self
            .ctx
            .presigner
            .presign_put(&self.key, &self.metadata, self.expires_in)
            .await?;
        tracing::info!(" Uploading {} with {} ...", self.key, self.ctx.transport.name());

        let record = self.ctx.send_put(self.name(), &self.key, &put).await?;
        Ok(vec![record])
    }

    async fn verify(&self, uploads: &[UploadRecord]) -> Result<Vec<CheckOutcome>> {
        let mut checks = upload_checks(uploads);
        if !uploads.iter().any(UploadRecord::succeeded) {
            return Ok(checks);
        }

        checks.push(self.ctx.read_back(&self.key).await);
        if let Some(check) = self.check_metadata().await {
            checks.push(check);
        }
        checks.push(self.check_presigned_get().await);
        Ok(checks)
    }

    async fn cleanup(&self, uploads: &[UploadRecord]) -> Result<Vec<CheckOutcome>> {
        if !uploads.iter().any(UploadRecord::succeeded) {
            return Ok(Vec::new());
        }
        Ok(vec![self.ctx.remove(&self.key).await])
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::context;
    use super::*;

    #[tokio::test]
    async fn test_put_upload_verify_cleanup() {
        let (ctx, store) = context(200, false).await;
        let scenario = PutScenario::new(ctx, &PutConfig::default());

        let uploads = scenario.upload(0).await.unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].key, "test.py");
        assert!(uploads[0].url.contains("X-Amz-Signature="));
        assert!(store.objects.lock().await.contains_key("test.py"));

        let checks = scenario.verify(&uploads).await.unwrap();
        assert!(checks.iter().all(|c| c.passed), "{:?}", checks);
        assert!(checks.iter().any(|c| c.step == CheckStep::PresignedGet));

        let cleanup = scenario.cleanup(&uploads).await.unwrap();
        assert_eq!(cleanup.len(), 1);
        assert!(store.objects.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_put_metadata_not_stored_is_reported() {
        let (ctx, _store) = context(200, false).await;
        let put = PutConfig {
            metadata: Some(BTreeMap::from([("sid".to_string(), "aaa".to_string())])),
            ..Default::default()
        };
        let scenario = PutScenario::new(ctx, &put);

        let uploads = scenario.upload(0).await.unwrap();
        let checks = scenario.verify(&uploads).await.unwrap();

        // MockStore 不保存 metadata
        let failed: Vec<_> = checks.iter().filter(|c| !c.passed).collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].detail.contains("sid"));
    }

    #[tokio::test]
    async fn test_dry_run_mints_without_sending() {
        let (ctx, store) = context(200, true).await;
        let scenario = PutScenario::new(ctx, &PutConfig::default());

        let uploads = scenario.upload(0).await.unwrap();
        assert!(uploads[0].status.is_none());
        assert!(store.objects.lock().await.is_empty());
    }
}
