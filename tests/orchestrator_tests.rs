//! Tests for the ensemble orchestrator.

use llm_ensemble::config::ProviderSettings;
use llm_ensemble::testing::{MockCircuitBreaker, MockProvider};
use llm_ensemble::{
    AnalysisInput, AnalysisOptions, BreakerState, EnsembleConfig, EnsembleConfigUpdate, EnsembleError,
    EnsembleOptions, EnsembleOrchestrator, RegistrationOptions, SelectionStrategy,
};
use std::sync::Arc;
use std::time::Duration;

fn input() -> AnalysisInput {
    AnalysisInput::text("<button>Submit</button>")
}

fn config(min_providers: usize) -> EnsembleConfig {
    let mut config = EnsembleConfig::default();
    config.orchestrator.min_providers_required = min_providers;
    config.balancer.enable_health_checks = false;
    config
}

async fn register(
    orchestrator: &EnsembleOrchestrator,
    name: &str,
    provider: MockProvider,
) -> (Arc<MockProvider>, Arc<MockCircuitBreaker>) {
    let provider = Arc::new(provider);
    let breaker = Arc::new(MockCircuitBreaker::new());
    orchestrator
        .register_provider(name, provider.clone(), breaker.clone(), RegistrationOptions::default())
        .await;
    (provider, breaker)
}

// ============================================================================
// Registry Tests
// ============================================================================

#[tokio::test]
async fn test_provider_lists_are_ranked_and_filtered() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    let breaker = Arc::new(MockCircuitBreaker::open());
    orchestrator
        .register_provider("zeta", Arc::new(MockProvider::new("z")), Arc::new(MockCircuitBreaker::new()),
            RegistrationOptions::default().priority(90))
        .await;
    orchestrator
        .register_provider("beta", Arc::new(MockProvider::new("b")), Arc::new(MockCircuitBreaker::new()),
            RegistrationOptions::default())
        .await;
    orchestrator
        .register_provider("alpha", Arc::new(MockProvider::new("a")), breaker,
            RegistrationOptions::default())
        .await;
    orchestrator
        .register_provider("off", Arc::new(MockProvider::new("o")), Arc::new(MockCircuitBreaker::new()),
            RegistrationOptions::default().priority(99).enabled(false))
        .await;

    assert_eq!(orchestrator.get_available_providers().await, vec!["zeta", "alpha", "beta"]);
    assert_eq!(orchestrator.get_healthy_providers().await, vec!["zeta", "beta"]);

    assert!(orchestrator.unregister_provider("zeta").await);
    assert!(!orchestrator.unregister_provider("zeta").await);
    assert_eq!(orchestrator.get_healthy_providers().await, vec!["beta"]);
    assert_eq!(orchestrator.balancer().provider_count().await, 3);
}

#[tokio::test]
async fn test_registration_falls_back_to_configured_settings() {
    let mut cfg = config(1);
    cfg.providers.insert(
        "configured".to_string(),
        ProviderSettings { enabled: true, priority: 80, weight: 2.5 },
    );
    let orchestrator = EnsembleOrchestrator::new(cfg);
    register(&orchestrator, "configured", MockProvider::new("c")).await;
    orchestrator
        .register_provider(
            "explicit",
            Arc::new(MockProvider::new("e")),
            Arc::new(MockCircuitBreaker::new()),
            RegistrationOptions::default().priority(10).weight(0.5),
        )
        .await;
    register(&orchestrator, "plain", MockProvider::new("p")).await;

    let stats = orchestrator.get_statistics().await;
    let status: Vec<(&str, i32, f64)> = stats
        .providers
        .iter()
        .map(|p| (p.name.as_str(), p.priority, p.weight))
        .collect();
    assert_eq!(status, vec![("configured", 80, 2.5), ("plain", 50, 1.0), ("explicit", 10, 0.5)]);
}

#[tokio::test]
async fn test_set_provider_enabled() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    register(&orchestrator, "alpha", MockProvider::new("a")).await;

    orchestrator.set_provider_enabled("alpha", false).await.unwrap();
    assert!(orchestrator.get_available_providers().await.is_empty());

    let err = orchestrator.set_provider_enabled("missing", true).await.unwrap_err();
    assert!(matches!(err, EnsembleError::ProviderNotFound(ref name) if name == "missing"));
}

// ============================================================================
// Ensemble Calls
// ============================================================================

#[tokio::test]
async fn test_insufficient_providers_dispatches_nothing() {
    let orchestrator = EnsembleOrchestrator::new(config(2));
    let (healthy, _) = register(&orchestrator, "alpha", MockProvider::new("a")).await;
    let (tripped, breaker) = register(&orchestrator, "beta", MockProvider::new("b")).await;
    breaker.set_open(true);

    let err = orchestrator
        .analyze_with_ensemble(&input(), "review", &EnsembleOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EnsembleError::InsufficientProviders { required: 2, available: 1 }));
    assert_eq!(healthy.call_count(), 0);
    assert_eq!(tripped.call_count(), 0);

    let stats = orchestrator.get_statistics().await;
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.failed_requests, 1);
}

#[tokio::test]
async fn test_all_providers_failed() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    register(&orchestrator, "alpha", MockProvider::new("a").failing("quota exhausted")).await;
    register(&orchestrator, "beta", MockProvider::new("b").failing("bad gateway")).await;

    let err = orchestrator
        .analyze_with_ensemble(&input(), "review", &EnsembleOptions::default())
        .await
        .unwrap_err();

    match err {
        EnsembleError::AllProvidersFailed { failures } => {
            assert_eq!(failures.len(), 2);
            let joined: String = failures.iter().map(|(_, e)| e.clone()).collect::<Vec<_>>().join("|");
            assert!(joined.contains("quota exhausted"));
            assert!(joined.contains("bad gateway"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_partial_failure_is_reported_in_metadata() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    register(&orchestrator, "alpha", MockProvider::new("a").failing("upstream error")).await;
    register(&orchestrator, "beta", MockProvider::new("contrast is too low").with_cost_per_token(0.0001)).await;
    register(&orchestrator, "gamma", MockProvider::new("g").failing("invalid response")).await;

    let response = orchestrator
        .analyze_with_ensemble(&input(), "review", &EnsembleOptions::default())
        .await
        .unwrap();

    assert_eq!(response.metadata.providers_attempted.len(), 3);
    assert_eq!(response.metadata.providers_successful, vec!["beta"]);
    assert_eq!(response.metadata.providers_failed.len(), 2);
    for failure in &response.metadata.providers_failed {
        assert!(failure.error.contains(&failure.provider));
        assert!(!failure.error.is_empty());
    }
    assert_eq!(response.aggregated.primary_content, "contrast is too low");
    assert_eq!(response.consensus.consensus_content, "contrast is too low");
    assert!((response.metadata.cost_breakdown.total - 0.01).abs() < 1e-9);
    assert!(response.confidence > 0.0 && response.confidence <= 1.0);
    assert_eq!(response.metadata.circuit_breaker_status["alpha"], BreakerState::Closed);
    assert!(!response.id.is_empty());
}

#[tokio::test]
async fn test_majority_voting_picks_consensus_content() {
    let mut cfg = config(1);
    cfg.aggregation.consensus_threshold = 0.6;
    let orchestrator = EnsembleOrchestrator::new(cfg);
    register(&orchestrator, "alpha", MockProvider::new("The submit button has no label").with_confidence(0.9))
        .await;
    register(&orchestrator, "beta", MockProvider::new("Missing alt text on logo").with_confidence(0.9)).await;
    register(&orchestrator, "gamma", MockProvider::new("missing alt text on logo").with_confidence(0.9)).await;

    let response = orchestrator
        .analyze_with_ensemble(&input(), "review", &EnsembleOptions::default())
        .await
        .unwrap();

    assert_eq!(response.consensus.consensus_content, "Missing alt text on logo");
    assert_eq!(response.consensus.disagreements.len(), 1);
    assert_eq!(response.consensus.disagreements[0].provider, "alpha");
    assert!((response.consensus.agreement_level - 0.9).abs() < 1e-9);
}

#[tokio::test]
async fn test_slow_provider_does_not_block_siblings() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    let (_, slow_breaker) =
        register(&orchestrator, "slow", MockProvider::new("late").with_latency(Duration::from_millis(500))).await;
    let (_, fast_breaker) = register(&orchestrator, "fast", MockProvider::new("on time")).await;

    let options = EnsembleOptions::default().with_timeout(Duration::from_millis(50));
    let response = orchestrator.analyze_with_ensemble(&input(), "review", &options).await.unwrap();

    assert_eq!(response.metadata.providers_successful, vec!["fast"]);
    assert_eq!(response.metadata.providers_failed[0].provider, "slow");
    assert!(response.metadata.providers_failed[0].error.contains("timed out"));
    assert_eq!(slow_breaker.failure_count(), 1);
    assert_eq!(fast_breaker.success_count(), 1);
}

// ============================================================================
// Single Provider Execution
// ============================================================================

#[tokio::test]
async fn test_timeout_records_exactly_one_failure() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    let (_, breaker) =
        register(&orchestrator, "slow", MockProvider::new("late").with_latency(Duration::from_millis(300))).await;

    let options = AnalysisOptions {
        timeout: Some(Duration::from_millis(30)),
        ..AnalysisOptions::default()
    };
    let err = orchestrator
        .execute_with_provider("slow", &input(), "review", &options)
        .await
        .unwrap_err();

    assert!(matches!(err, EnsembleError::ProviderTimeout { ref provider, .. } if provider == "slow"));
    assert_eq!(breaker.failure_count(), 1);
    assert_eq!(breaker.success_count(), 0);
}

#[tokio::test]
async fn test_provider_timeout_cap_applies_to_long_caller_budgets() {
    let mut cfg = config(1);
    cfg.orchestrator.max_provider_timeout_ms = 30;
    let orchestrator = EnsembleOrchestrator::new(cfg);
    register(&orchestrator, "slow", MockProvider::new("late").with_latency(Duration::from_millis(300))).await;

    let options = AnalysisOptions {
        timeout: Some(Duration::from_secs(10)),
        ..AnalysisOptions::default()
    };
    let err = orchestrator
        .execute_with_provider("slow", &input(), "review", &options)
        .await
        .unwrap_err();

    match err {
        EnsembleError::ProviderTimeout { timeout, .. } => assert_eq!(timeout, Duration::from_millis(30)),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_open_breaker_rejects_without_calling() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    let (provider, breaker) = register(&orchestrator, "alpha", MockProvider::new("a")).await;
    breaker.set_open(true);

    let err = orchestrator
        .execute_with_provider("alpha", &input(), "review", &AnalysisOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EnsembleError::CircuitBreakerOpen(ref name) if name == "alpha"));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_provider() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    let err = orchestrator
        .execute_with_provider("ghost", &input(), "review", &AnalysisOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EnsembleError::ProviderNotFound(ref name) if name == "ghost"));
}

#[tokio::test]
async fn test_failures_are_wrapped_with_cause() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    let (_, breaker) = register(&orchestrator, "alpha", MockProvider::new("a").failing("malformed JSON")).await;

    let err = orchestrator
        .execute_with_provider("alpha", &input(), "review", &AnalysisOptions::default())
        .await
        .unwrap_err();

    match &err {
        EnsembleError::ProviderAnalysisFailure { provider, cause, .. } => {
            assert_eq!(provider, "alpha");
            assert!(matches!(**cause, EnsembleError::ApiError(_)));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(breaker.failure_count(), 1);
}

// ============================================================================
// Load Balancer Integration
// ============================================================================

#[tokio::test]
async fn test_load_balancing_limits_dispatch() {
    let mut cfg = config(1);
    cfg.orchestrator.enable_load_balancing = true;
    cfg.balancer.strategy = SelectionStrategy::RoundRobin;
    let orchestrator = EnsembleOrchestrator::new(cfg);
    let (alpha, _) = register(&orchestrator, "alpha", MockProvider::new("a")).await;
    let (beta, _) = register(&orchestrator, "beta", MockProvider::new("b")).await;

    let options = EnsembleOptions::default().with_provider_count(1);
    for _ in 0..4 {
        let response = orchestrator.analyze_with_ensemble(&input(), "review", &options).await.unwrap();
        assert_eq!(response.metadata.providers_attempted.len(), 1);
        assert!(response.metadata.selection_reasoning.is_some());
    }
    assert_eq!(alpha.call_count(), 2);
    assert_eq!(beta.call_count(), 2);
}

#[tokio::test]
async fn test_load_balanced_selection_rechecks_minimum() {
    let mut cfg = config(2);
    cfg.orchestrator.enable_load_balancing = true;
    let orchestrator = EnsembleOrchestrator::new(cfg);
    let (alpha, _) = register(&orchestrator, "alpha", MockProvider::new("a")).await;
    register(&orchestrator, "beta", MockProvider::new("b")).await;

    let options = EnsembleOptions::default().with_provider_count(1);
    let err = orchestrator.analyze_with_ensemble(&input(), "review", &options).await.unwrap_err();
    assert!(matches!(err, EnsembleError::InsufficientProviders { required: 2, available: 1 }));
    assert_eq!(alpha.call_count(), 0);
}

#[tokio::test]
async fn test_performance_tracking_feeds_balancer() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    register(&orchestrator, "alpha", MockProvider::new("a").with_tokens(40)).await;
    register(&orchestrator, "beta", MockProvider::new("b").failing("boom")).await;

    orchestrator
        .analyze_with_ensemble(&input(), "review", &EnsembleOptions::default())
        .await
        .unwrap();

    let metrics = orchestrator.balancer().get_provider_metrics(None).await;
    assert_eq!(metrics.len(), 2);
    for m in &metrics {
        assert_eq!(m.active_connections, 0);
        assert_eq!(m.response_time.len(), 1);
    }
    assert_eq!(metrics[0].success_rate.average, 1.0);
    assert_eq!(metrics[0].total_tokens, 40);
    assert_eq!(metrics[1].success_rate.average, 0.0);
}

#[tokio::test]
async fn test_tracking_disabled_leaves_balancer_untouched() {
    let mut cfg = config(1);
    cfg.monitoring.enable_performance_tracking = false;
    let orchestrator = EnsembleOrchestrator::new(cfg);
    register(&orchestrator, "alpha", MockProvider::new("a")).await;

    orchestrator
        .analyze_with_ensemble(&input(), "review", &EnsembleOptions::default())
        .await
        .unwrap();

    let metrics = orchestrator.balancer().get_provider_metrics(Some("alpha")).await;
    assert!(metrics[0].response_time.is_empty());
}

#[tokio::test]
async fn test_cancelled_call_releases_active_connections() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    register(&orchestrator, "slow", MockProvider::new("late").with_latency(Duration::from_millis(500))).await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        orchestrator.analyze_with_ensemble(&input(), "review", &EnsembleOptions::default()),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let metrics = orchestrator.balancer().get_provider_metrics(Some("slow")).await;
    assert_eq!(metrics[0].active_connections, 0);
    assert_eq!(metrics[0].success_rate.len(), 1);
    assert_eq!(metrics[0].success_rate.average, 0.0);

    // Nothing is recorded a second time once the provider would have answered
    tokio::time::sleep(Duration::from_millis(600)).await;
    let metrics = orchestrator.balancer().get_provider_metrics(Some("slow")).await;
    assert_eq!(metrics[0].active_connections, 0);
    assert_eq!(metrics[0].success_rate.len(), 1);
}

// ============================================================================
// Health, Configuration and Builder
// ============================================================================

#[tokio::test]
async fn test_monitoring_switch_disables_balancer_sweeps() {
    let mut cfg = config(1);
    cfg.orchestrator.enable_load_balancing = true;
    cfg.balancer.enable_health_checks = true;
    cfg.monitoring.enable_health_checks = false;
    let orchestrator = EnsembleOrchestrator::new(cfg);
    let (provider, _) = register(&orchestrator, "alpha", MockProvider::new("a")).await;

    orchestrator
        .analyze_with_ensemble(&input(), "review", &EnsembleOptions::default())
        .await
        .unwrap();

    assert_eq!(provider.health_check_count(), 0);
    assert!(!orchestrator.balancer().config().await.enable_health_checks);
}

#[tokio::test]
async fn test_update_config_monitoring_switch_reaches_balancer() {
    let mut cfg = config(1);
    cfg.orchestrator.enable_load_balancing = true;
    cfg.balancer.enable_health_checks = true;
    let orchestrator = EnsembleOrchestrator::new(cfg);
    let (provider, _) = register(&orchestrator, "alpha", MockProvider::new("a")).await;
    assert!(orchestrator.balancer().config().await.enable_health_checks);

    let mut update = EnsembleConfigUpdate::default();
    update.enable_health_checks = Some(false);
    orchestrator.update_config(update).await.unwrap();

    orchestrator
        .analyze_with_ensemble(&input(), "review", &EnsembleOptions::default())
        .await
        .unwrap();
    assert_eq!(provider.health_check_count(), 0);

    let mut update = EnsembleConfigUpdate::default();
    update.enable_health_checks = Some(true);
    orchestrator.update_config(update).await.unwrap();
    assert!(orchestrator.balancer().config().await.enable_health_checks);
}

#[tokio::test]
async fn test_health_monitor_checks_periodically_and_stops_when_disabled() {
    let mut cfg = config(1);
    cfg.monitoring.health_check_interval_ms = 30;
    let orchestrator = Arc::new(EnsembleOrchestrator::new(cfg));
    let (provider, _) = register(&orchestrator, "alpha", MockProvider::new("a")).await;

    let monitor = orchestrator.spawn_health_monitor();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(provider.health_check_count() >= 2);
    assert!(!monitor.is_finished());

    let mut update = EnsembleConfigUpdate::default();
    update.enable_health_checks = Some(false);
    orchestrator.update_config(update).await.unwrap();

    let stopped = tokio::time::timeout(Duration::from_millis(500), monitor).await;
    assert!(stopped.is_ok());
}

#[tokio::test]
async fn test_health_monitor_stops_when_orchestrator_dropped() {
    let mut cfg = config(1);
    cfg.monitoring.health_check_interval_ms = 30;
    let orchestrator = Arc::new(EnsembleOrchestrator::new(cfg));
    register(&orchestrator, "alpha", MockProvider::new("a")).await;

    let monitor = orchestrator.spawn_health_monitor();
    drop(orchestrator);

    let stopped = tokio::time::timeout(Duration::from_millis(500), monitor).await;
    assert!(stopped.is_ok());
}

#[tokio::test]
async fn test_health_monitor_exits_immediately_when_disabled() {
    let mut cfg = config(1);
    cfg.monitoring.enable_health_checks = false;
    let orchestrator = Arc::new(EnsembleOrchestrator::new(cfg));
    let (provider, _) = register(&orchestrator, "alpha", MockProvider::new("a")).await;

    let monitor = orchestrator.spawn_health_monitor();
    let stopped = tokio::time::timeout(Duration::from_millis(200), monitor).await;
    assert!(stopped.is_ok());
    assert_eq!(provider.health_check_count(), 0);
}

#[tokio::test]
async fn test_perform_health_check_updates_balancer() {
    let mut cfg = config(1);
    cfg.balancer.health_check_timeout_ms = 50;
    let orchestrator = EnsembleOrchestrator::new(cfg);
    register(&orchestrator, "up", MockProvider::new("a")).await;
    register(&orchestrator, "down", MockProvider::new("b").unhealthy()).await;

    let health = orchestrator.perform_health_check().await;
    assert_eq!(health["up"], true);
    assert_eq!(health["down"], false);

    let metrics = orchestrator.balancer().get_provider_metrics(Some("down")).await;
    assert_eq!(metrics[0].availability, 0.0);
}

#[tokio::test]
async fn test_health_check_without_balancer_refresh() {
    let mut cfg = config(1);
    cfg.monitoring.enable_health_checks = false;
    let orchestrator = EnsembleOrchestrator::new(cfg);
    register(&orchestrator, "broken", MockProvider::new("b").with_health_error()).await;

    let health = orchestrator.perform_health_check().await;
    assert_eq!(health["broken"], false);

    let metrics = orchestrator.balancer().get_provider_metrics(Some("broken")).await;
    assert!(metrics[0].last_health_check.is_none());
}

#[tokio::test]
async fn test_update_config_applies_to_live_registrations() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    register(&orchestrator, "alpha", MockProvider::new("a")).await;
    register(&orchestrator, "beta", MockProvider::new("b")).await;

    let mut update = EnsembleConfigUpdate::default();
    update.min_providers_required = Some(2);
    update.providers.insert(
        "beta".to_string(),
        ProviderSettings { enabled: false, priority: 10, weight: 1.0 },
    );
    orchestrator.update_config(update).await.unwrap();

    assert_eq!(orchestrator.get_available_providers().await, vec!["alpha"]);
    assert_eq!(orchestrator.config().await.orchestrator.min_providers_required, 2);
    let stats = orchestrator.balancer().get_statistics().await;
    assert_eq!(stats.enabled_providers, 1);
}

#[tokio::test]
async fn test_invalid_update_is_rejected() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    let mut update = EnsembleConfigUpdate::default();
    update.consensus_threshold = Some(1.5);

    let err = orchestrator.update_config(update).await.unwrap_err();
    assert!(matches!(err, EnsembleError::ConfigError(_)));
    assert_eq!(orchestrator.config().await.aggregation.consensus_threshold, 0.7);
}

#[tokio::test]
async fn test_update_config_switches_balancer_strategy() {
    let orchestrator = EnsembleOrchestrator::new(config(1));
    let mut update = EnsembleConfigUpdate::default();
    let mut balancer = orchestrator.config().await.balancer;
    balancer.strategy = SelectionStrategy::LeastConnections;
    update.balancer = Some(balancer);

    orchestrator.update_config(update).await.unwrap();
    assert_eq!(orchestrator.balancer().strategy().await, SelectionStrategy::LeastConnections);
}

#[tokio::test]
async fn test_builder_registers_providers() {
    let orchestrator = EnsembleOrchestrator::builder()
        .config(config(1))
        .add_provider("alpha", Arc::new(MockProvider::new("a")))
        .priority(70)
        .weight(2.0)
        .add_provider("beta", Arc::new(MockProvider::new("b")))
        .circuit_breaker(Arc::new(MockCircuitBreaker::open()))
        .add_provider("gamma", Arc::new(MockProvider::new("c")))
        .enabled(false)
        .build()
        .await
        .unwrap();

    assert_eq!(orchestrator.provider_count().await, 3);
    assert_eq!(orchestrator.get_available_providers().await, vec!["alpha", "beta"]);
    assert_eq!(orchestrator.get_healthy_providers().await, vec!["alpha"]);
}

#[tokio::test]
async fn test_builder_rejects_invalid_config() {
    let result = EnsembleOrchestrator::builder().min_providers(0).build().await;
    assert!(matches!(result, Err(EnsembleError::ConfigError(_))));
}

#[test]
#[should_panic(expected = "called before '.add_provider()'")]
fn test_builder_panics_without_provider() {
    let _ = EnsembleOrchestrator::builder().priority(10);
}
