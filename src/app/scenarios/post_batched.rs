use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use super::{upload_checks, ProbeContext};
use crate::config::toml_config::PostConfig;
use crate::domain::model::{CheckOutcome, Condition, UploadRecord};
use crate::domain::ports::{ObjectStore, Scenario, Transport};
use crate::utils::error::Result;

/// 多個自訂欄位放進同一張表單，同一個 key 每批上傳一次，讀回後刪除
pub struct PostBatchedScenario<S: ObjectStore, T: Transport> {
    ctx: Arc<ProbeContext<S, T>>,
    batches: Vec<Vec<String>>,
    acl: String,
    value: String,
    key: String,
    expires_in: Duration,
}

impl<S: ObjectStore, T: Transport> PostBatchedScenario<S, T> {
    pub fn new(ctx: Arc<ProbeContext<S, T>>, post: &PostConfig) -> Self {
        // 最後不足一批的欄位也會送出
        let batches = post
            .fields()
            .chunks(post.batch_size().max(1))
            .map(|chunk| chunk.to_vec())
            .collect();
        let key = format!("{}{}", post.batch_key(), ctx.run_name);
        Self {
            batches,
            acl: post.acl().to_string(),
            value: post.field_value().to_string(),
            expires_in: post.expires_in(),
            key,
            ctx,
        }
    }

    pub fn batches(&self) -> &[Vec<String>] {
        &self.batches
    }
}

#[async_trait]
impl<S, T> Scenario for PostBatchedScenario<S, T>
where
    S: ObjectStore + 'static,
    T: Transport + 'static,
{
    fn name(&self) -> &str {
        "post-batched"
    }

    fn rounds(&self) -> usize {
        self.batches.len()
    }

    async fn upload(&self, round: usize) -> Result<Vec<UploadRecord>> {
        let Some(batch) = self.batches.get(round) else {
            return Ok(Vec::new());
        };

        let mut builder = self
            .ctx
            .presigner
            .post_policy(self.key.clone(), self.expires_in)
            .field("acl", self.acl.clone());
        for field in batch {
            builder = builder
                .extra_field(field.clone(), self.value.clone())
                .condition(Condition::starts_with(field.clone(), ""));
        }

        tracing::info!("📦 Batch {}/{}: {}", round + 1, self.batches.len(), batch.join(", "));
        let post = self
            .ctx
            .presigner
            .presign_post(builder, self.ctx.payload.len(), Utc::now())?;

        let record = self.ctx.send_post(self.name(), &self.key, &post).await?;
        Ok(vec![record])
    }

    async fn verify(&self, uploads: &[UploadRecord]) -> Result<Vec<CheckOutcome>> {
        let mut checks = upload_checks(uploads);
        for upload in uploads.iter().filter(|u| u.succeeded()) {
            checks.push(self.ctx.read_back(&upload.key).await);
        }
        Ok(checks)
    }

    async fn cleanup(&self, uploads: &[UploadRecord]) -> Result<Vec<CheckOutcome>> {
        let mut checks = Vec::new();
        for upload in uploads.iter().filter(|u| u.succeeded()) {
            checks.push(self.ctx.remove(&upload.key).await);
        }
        Ok(checks)
    }
}
