use clap::Parser;
use presign_probe::config::s3::build_s3_client;
use presign_probe::config::toml_config::TransportKind;
use presign_probe::domain::model::ProbeReport;
use presign_probe::domain::ports::Transport;
use presign_probe::utils::{logger, validation::Validate};
use presign_probe::{
    build_scenarios, CliConfig, CurlTransport, EngineOptions, Presigner, ProbeConfig,
    ProbeContext, ProbeEngine, ProbeError, ReqwestTransport, S3ObjectStore,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose, cli.log_json);

    tracing::info!("Starting presign-probe");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    match run(&cli).await {
        Ok(report) => {
            print_summary(&report);
            let exit_code = report.exit_code();
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Probe failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            std::process::exit(e.severity().exit_code());
        }
    }
}

async fn run(cli: &CliConfig) -> Result<ProbeReport, ProbeError> {
    let config = cli.load()?;
    config.validate()?;
    tracing::info!(
        "✅ Target {} bucket={} region={}",
        config.target.endpoint,
        config.target.bucket,
        config.target.region
    );

    let report = match config.run.transport() {
        TransportKind::Reqwest => run_with(&config, cli, ReqwestTransport::new()).await?,
        TransportKind::Curl => run_with(&config, cli, CurlTransport::new()).await?,
    };

    if let Some(path) = &cli.report {
        std::fs::write(path, report.to_json()?)?;
        tracing::info!("📁 Report saved to: {}", path);
    }

    Ok(report)
}

async fn run_with<T: Transport + 'static>(
    config: &ProbeConfig,
    cli: &CliConfig,
    transport: T,
) -> Result<ProbeReport, ProbeError> {
    let payload = config.payload.load()?;
    let client = build_s3_client(&config.target).await;
    let presigner = Presigner::new(&config.target, client.clone())?;
    let store = S3ObjectStore::new(client, config.target.bucket.clone());

    let ctx = Arc::new(ProbeContext {
        presigner,
        transport,
        store,
        payload,
        run_name: config.run.run_name().to_string(),
        dry_run: cli.dry_run,
        print_curl: config.run.print_curl() || cli.dry_run,
    });

    let scenarios = build_scenarios(config, ctx)?;
    let options = EngineOptions {
        dry_run: cli.dry_run,
        keep_objects: config.run.keep_objects(),
    };

    Ok(ProbeEngine::with_scenarios(options, scenarios).run().await)
}

fn print_summary(report: &ProbeReport) {
    println!();
    for scenario in &report.scenarios {
        let mark = if scenario.passed() { "✅" } else { "❌" };
        println!(
            "{} {}: {} upload(s), {} check(s), {} failed",
            mark,
            scenario.name,
            scenario.uploads.len(),
            scenario.checks.len(),
            scenario.failed_checks()
        );
        for check in scenario.checks.iter().filter(|c| !c.passed) {
            println!("   - {:?} {}: {}", check.step, check.key, check.detail);
        }
        if let Some(error) = &scenario.error {
            println!("   - aborted: {}", error);
        }
    }

    if report.dry_run {
        println!("🔍 Dry run: {} URL(s) minted, nothing sent", report.total_uploads());
    } else if report.passed() {
        println!("✅ All {} check(s) passed", report.total_checks());
    } else {
        println!(
            "❌ {} of {} check(s) failed",
            report.failed_checks(),
            report.total_checks()
        );
    }
}
