use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use presign_probe::core::signer::{sign_policy, SigningScope};

/// 對手寫的 POST policy JSON 簽名，用來對照服務端的驗證結果
#[derive(Parser)]
#[command(name = "sign_policy")]
#[command(about = "Sign a POST policy document with SigV4")]
struct Args {
    /// Path to the policy JSON document
    #[arg(short, long)]
    policy: String,

    #[arg(long, default_value = "us-east-1")]
    region: String,

    /// Signing date as YYYYMMDD (default: today, UTC)
    #[arg(long)]
    date: Option<String>,

    /// Access key used to build x-amz-credential
    #[arg(long)]
    access_key: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.policy)
        .with_context(|| format!("reading {}", args.policy))?;
    // 驗證是合法 JSON，再以緊湊格式編碼
    let document: serde_json::Value =
        serde_json::from_str(&raw).context("policy is not valid JSON")?;
    if document.get("conditions").is_none() {
        bail!("policy has no 'conditions' array");
    }
    let policy_b64 = STANDARD.encode(serde_json::to_string(&document)?);

    let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .context("AWS_SECRET_ACCESS_KEY must be set")?;
    let access_key = args
        .access_key
        .or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok())
        .unwrap_or_else(|| "<access-key>".to_string());

    let mut scope = SigningScope::s3(Utc::now(), args.region);
    if let Some(date) = args.date {
        NaiveDate::parse_from_str(&date, "%Y%m%d")
            .with_context(|| format!("invalid --date '{}'", date))?;
        scope.date = date;
    }

    let signature = sign_policy(&policy_b64, &secret_key, &scope)?;

    println!("policy           = {}", policy_b64);
    println!("x-amz-credential = {}", scope.credential(&access_key));
    println!("x-amz-signature  = {}", signature);
    Ok(())
}
