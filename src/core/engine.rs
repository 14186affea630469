use std::time::Instant;

use crate::domain::model::{ProbeReport, ScenarioReport};
use crate::domain::ports::Scenario;

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    pub dry_run: bool,
    pub keep_objects: bool,
}

/// 依序執行每個 scenario 的每一輪：上傳、驗證、清理
pub struct ProbeEngine {
    scenarios: Vec<Box<dyn Scenario>>,
    options: EngineOptions,
}

impl ProbeEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            scenarios: Vec::new(),
            options,
        }
    }

    pub fn with_scenarios(options: EngineOptions, scenarios: Vec<Box<dyn Scenario>>) -> Self {
        Self { scenarios, options }
    }

    pub fn add_scenario(&mut self, scenario: Box<dyn Scenario>) {
        self.scenarios.push(scenario);
    }

    pub async fn run(&self) -> ProbeReport {
        let mut report = ProbeReport::new(self.options.dry_run);
        tracing::info!("🚀 Running {} scenario(s)", self.scenarios.len());

        for scenario in &self.scenarios {
            let started = Instant::now();
            let result = self.run_scenario(scenario.as_ref()).await;
            tracing::info!(
                "{} {} finished in {:?}: {} upload(s), {} check(s), {} failed",
                if result.passed() { "✅" } else { "❌" },
                result.name,
                started.elapsed(),
                result.uploads.len(),
                result.checks.len(),
                result.failed_checks()
            );
            report.scenarios.push(result);
        }

        report
    }

    async fn run_scenario(&self, scenario: &dyn Scenario) -> ScenarioReport {
        let mut report = ScenarioReport::new(scenario.name());
        let name = scenario.name();
        let rounds = scenario.rounds();

        for round in 0..rounds {
            let label = format!("{} {}/{}", name, round + 1, rounds);

            tracing::info!("📤 [{}] Upload phase started", label);
            let started = Instant::now();
            let uploads = match scenario.upload(round).await {
                Ok(uploads) => uploads,
                Err(e) => {
                    tracing::error!("❌ [{}] Upload failed after {:?}: {}", label, started.elapsed(), e);
                    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
                    report.record_error(&e);
                    break;
                }
            };
            tracing::info!(
                "✅ [{}] Upload phase finished in {:?}: {} upload(s)",
                label,
                started.elapsed(),
                uploads.len()
            );

            if self.options.dry_run {
                report.uploads.extend(uploads);
                continue;
            }

            tracing::info!("🔍 [{}] Verify phase started", label);
            let started = Instant::now();
            match scenario.verify(&uploads).await {
                Ok(checks) => {
                    tracing::info!(
                        "✅ [{}] Verify phase finished in {:?}: {} check(s)",
                        label,
                        started.elapsed(),
                        checks.len()
                    );
                    report.checks.extend(checks);
                }
                Err(e) => {
                    tracing::error!("❌ [{}] Verify failed after {:?}: {}", label, started.elapsed(), e);
                    report.record_error(&e);
                }
            }

            if self.options.keep_objects {
                tracing::info!("📌 [{}] Keeping objects, cleanup skipped", label);
            } else {
                tracing::info!("🗑️ [{}] Cleanup phase started", label);
                let started = Instant::now();
                match scenario.cleanup(&uploads).await {
                    Ok(checks) => {
                        tracing::info!(
                            "✅ [{}] Cleanup phase finished in {:?}: {} object(s)",
                            label,
                            started.elapsed(),
                            checks.len()
                        );
                        report.checks.extend(checks);
                    }
                    Err(e) => {
                        tracing::error!(
                            "❌ [{}] Cleanup failed after {:?}: {}",
                            label,
                            started.elapsed(),
                            e
                        );
                        report.record_error(&e);
                    }
                }
            }

            report.uploads.extend(uploads);
            if report.error.is_some() {
                break;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{CheckOutcome, CheckStep, UploadMethod, UploadRecord};
    use crate::utils::error::{ProbeError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Calls {
        upload: AtomicUsize,
        verify: AtomicUsize,
        cleanup: AtomicUsize,
    }

    struct MockScenario {
        rounds: usize,
        fail_upload_at: Option<usize>,
        calls: Arc<Calls>,
    }

    impl MockScenario {
        fn new(rounds: usize) -> (Self, Arc<Calls>) {
            let calls = Arc::new(Calls::default());
            let scenario = Self {
                rounds,
                fail_upload_at: None,
                calls: calls.clone(),
            };
            (scenario, calls)
        }
    }

    #[async_trait]
    impl Scenario for MockScenario {
        fn name(&self) -> &str {
            "mock"
        }

        fn rounds(&self) -> usize {
            self.rounds
        }

        async fn upload(&self, round: usize) -> Result<Vec<UploadRecord>> {
            self.calls.upload.fetch_add(1, Ordering::SeqCst);
            if self.fail_upload_at == Some(round) {
                return Err(ProbeError::PresignError {
                    message: "boom".to_string(),
                });
            }
            Ok(vec![UploadRecord {
                scenario: "mock".to_string(),
                key: format!("key{}", round),
                method: UploadMethod::Post,
                url: "http://localhost/yyytest".to_string(),
                status: Some(204),
                transport: "mock".to_string(),
            }])
        }

        async fn verify(&self, uploads: &[UploadRecord]) -> Result<Vec<CheckOutcome>> {
            self.calls.verify.fetch_add(1, Ordering::SeqCst);
            Ok(uploads
                .iter()
                .map(|u| CheckOutcome::pass(CheckStep::Get, &u.key, "ok"))
                .collect())
        }

        async fn cleanup(&self, uploads: &[UploadRecord]) -> Result<Vec<CheckOutcome>> {
            self.calls.cleanup.fetch_add(1, Ordering::SeqCst);
            Ok(uploads
                .iter()
                .map(|u| CheckOutcome::pass(CheckStep::Delete, &u.key, "deleted"))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_runs_every_round_in_order() {
        let (scenario, calls) = MockScenario::new(3);
        let engine = ProbeEngine::with_scenarios(EngineOptions::default(), vec![Box::new(scenario)]);

        let report = engine.run().await;

        assert!(report.passed());
        assert_eq!(calls.upload.load(Ordering::SeqCst), 3);
        assert_eq!(calls.verify.load(Ordering::SeqCst), 3);
        assert_eq!(calls.cleanup.load(Ordering::SeqCst), 3);
        let keys: Vec<_> = report.scenarios[0].uploads.iter().map(|u| u.key.as_str()).collect();
        assert_eq!(keys, vec!["key0", "key1", "key2"]);
    }

    #[tokio::test]
    async fn test_dry_run_skips_verify_and_cleanup() {
        let (scenario, calls) = MockScenario::new(2);
        let options = EngineOptions {
            dry_run: true,
            keep_objects: false,
        };
        let report = ProbeEngine::with_scenarios(options, vec![Box::new(scenario)])
            .run()
            .await;

        assert!(report.dry_run);
        assert_eq!(calls.upload.load(Ordering::SeqCst), 2);
        assert_eq!(calls.verify.load(Ordering::SeqCst), 0);
        assert_eq!(calls.cleanup.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_keep_objects_skips_cleanup() {
        let (scenario, calls) = MockScenario::new(1);
        let options = EngineOptions {
            dry_run: false,
            keep_objects: true,
        };
        let mut engine = ProbeEngine::new(options);
        engine.add_scenario(Box::new(scenario));
        engine.run().await;

        assert_eq!(calls.verify.load(Ordering::SeqCst), 1);
        assert_eq!(calls.cleanup.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_error_stops_scenario_but_not_engine() {
        let (mut failing, failing_calls) = MockScenario::new(3);
        failing.fail_upload_at = Some(1);
        let (healthy, healthy_calls) = MockScenario::new(1);

        let engine = ProbeEngine::with_scenarios(
            EngineOptions::default(),
            vec![Box::new(failing), Box::new(healthy)],
        );
        let report = engine.run().await;

        assert!(!report.passed());
        assert!(report.scenarios[0].error.as_deref().unwrap().contains("boom"));
        assert_eq!(failing_calls.upload.load(Ordering::SeqCst), 2);
        assert_eq!(failing_calls.cleanup.load(Ordering::SeqCst), 1);
        assert!(report.scenarios[1].passed());
        assert_eq!(healthy_calls.upload.load(Ordering::SeqCst), 1);
        // PresignError 屬於簽名錯誤
        assert_eq!(report.exit_code(), 1);
    }

    struct UnreachableScenario;

    #[async_trait]
    impl Scenario for UnreachableScenario {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn upload(&self, _round: usize) -> Result<Vec<UploadRecord>> {
            Err(ProbeError::TransportError {
                message: "connection refused".to_string(),
            })
        }

        async fn verify(&self, _uploads: &[UploadRecord]) -> Result<Vec<CheckOutcome>> {
            Ok(Vec::new())
        }

        async fn cleanup(&self, _uploads: &[UploadRecord]) -> Result<Vec<CheckOutcome>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_transport_error_keeps_its_severity() {
        let (healthy, _) = MockScenario::new(1);
        let engine = ProbeEngine::with_scenarios(
            EngineOptions::default(),
            vec![Box::new(UnreachableScenario), Box::new(healthy)],
        );
        let report = engine.run().await;

        assert_eq!(
            report.scenarios[0].error_severity,
            Some(crate::utils::error::ErrorSeverity::Medium)
        );
        assert!(report.scenarios[1].passed());
        assert_eq!(report.exit_code(), 2);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_logs_each_phase_with_elapsed_time() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (scenario, _) = MockScenario::new(1);
        ProbeEngine::with_scenarios(EngineOptions::default(), vec![Box::new(scenario)])
            .run()
            .await;

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        for phase in ["Upload", "Verify", "Cleanup"] {
            assert!(output.contains(&format!("[mock 1/1] {} phase started", phase)), "{}", output);
            assert!(output.contains(&format!("[mock 1/1] {} phase finished in", phase)), "{}", output);
        }
    }
}
