use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::Client as S3Client;

use crate::domain::ports::TargetProvider;

/// 以固定憑證與自訂 endpoint 建立 S3 client；presigned POST 也用同一組憑證簽名
pub async fn build_s3_client<T: TargetProvider>(target: &T) -> S3Client {
    let credentials = Credentials::new(
        target.access_key(),
        target.secret_key(),
        target.session_token().map(str::to_string),
        None,
        "presign-probe",
    );

    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(target.region().to_string()))
        .endpoint_url(target.endpoint())
        .credentials_provider(credentials)
        .load()
        .await;

    let config = aws_sdk_s3::config::Builder::from(&config)
        .force_path_style(target.force_path_style())
        .build();

    tracing::debug!(
        "S3 client ready: endpoint={}, region={}, path_style={}",
        target.endpoint(),
        target.region(),
        target.force_path_style()
    );
    S3Client::from_conf(config)
}
