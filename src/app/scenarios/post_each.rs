use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use super::{upload_checks, ProbeContext};
use crate::config::toml_config::PostConfig;
use crate::domain::model::{CheckOutcome, CheckStep, Condition, UploadRecord};
use crate::domain::ports::{ObjectStore, Scenario, Transport};
use crate::utils::error::Result;

/// 每個自訂欄位各上傳一個物件：`{"acl": acl}` 加上 `["starts-with", "$field", ""]`
pub struct PostEachScenario<S: ObjectStore, T: Transport> {
    ctx: Arc<ProbeContext<S, T>>,
    fields: Vec<String>,
    acl: String,
    value: String,
    key_prefix: String,
    expires_in: Duration,
}

impl<S: ObjectStore, T: Transport> PostEachScenario<S, T> {
    pub fn new(ctx: Arc<ProbeContext<S, T>>, post: &PostConfig) -> Self {
        let key_prefix = format!("{}{}", post.key_prefix(), ctx.run_name);
        Self {
            fields: post.fields(),
            acl: post.acl().to_string(),
            value: post.field_value().to_string(),
            expires_in: post.expires_in(),
            key_prefix,
            ctx,
        }
    }

    pub fn key_for(&self, field: &str) -> String {
        format!("{}{}", self.key_prefix, field)
    }
}

#[async_trait]
impl<S, T> Scenario for PostEachScenario<S, T>
where
    S: ObjectStore + 'static,
    T: Transport + 'static,
{
    fn name(&self) -> &str {
        "post-each"
    }

    async fn upload(&self, _round: usize) -> Result<Vec<UploadRecord>> {
        let mut uploads = Vec::with_capacity(self.fields.len());

        for field in &self.fields {
            let key = self.key_for(field);
            let builder = self
                .ctx
                .presigner
                .post_policy(key.clone(), self.expires_in)
                .field("acl", self.acl.clone())
                .extra_field(field.clone(), self.value.clone())
                .condition(Condition::starts_with(field.clone(), ""));

            let post = self
                .ctx
                .presigner
                .presign_post(builder, self.ctx.payload.len(), Utc::now())?;
            tracing::debug!("{} -> fields {:?}", field, post.fields.keys().collect::<Vec<_>>());

            uploads.push(self.ctx.send_post(self.name(), &key, &post).await?);
        }

        Ok(uploads)
    }

    async fn verify(&self, uploads: &[UploadRecord]) -> Result<Vec<CheckOutcome>> {
        let mut checks = upload_checks(uploads);
        let stored: Vec<&UploadRecord> = uploads.iter().filter(|u| u.succeeded()).collect();

        for upload in &stored {
            checks.push(self.ctx.read_back(&upload.key).await);
        }

        let listed = self.ctx.store.list_objects(Some(&self.key_prefix)).await?;
        tracing::info!("📋 List objects ({}): {} found", self.key_prefix, listed.len());
        let missing: Vec<&str> = stored
            .iter()
            .map(|u| u.key.as_str())
            .filter(|key| !listed.iter().any(|o| o.key == *key))
            .collect();

        if missing.is_empty() {
            checks.push(CheckOutcome::pass(
                CheckStep::List,
                self.key_prefix.clone(),
                format!("{} uploaded keys listed", stored.len()),
            ));
        } else {
            checks.push(CheckOutcome::fail(
                CheckStep::List,
                self.key_prefix.clone(),
                format!("missing from listing: {}", missing.join(", ")),
            ));
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
