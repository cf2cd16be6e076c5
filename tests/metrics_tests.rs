//! Tests for the metrics module.
//!
//! Recorded metrics are rendered through a Prometheus recorder installed
//! locally for each test, so tests never share global state.

#[cfg(feature = "metrics")]
mod metrics_tests {
    use llm_ensemble::metrics::labels::{error_type_label, keys, outcome_label};
    use llm_ensemble::metrics::{names, record_provider_failure, record_provider_success, set_provider_health};
    use llm_ensemble::testing::{MockCircuitBreaker, MockProvider};
    use llm_ensemble::{
        AnalysisInput, EnsembleError, EnsembleOptions, EnsembleOrchestrator, RegistrationOptions,
    };
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_error_type_labels() {
        assert_eq!(error_type_label(&EnsembleError::NoProvidersAvailable), "no_providers_available");
        assert_eq!(
            error_type_label(&EnsembleError::CircuitBreakerOpen("a".to_string())),
            "circuit_breaker_open"
        );
        assert_eq!(
            error_type_label(&EnsembleError::ProviderTimeout {
                provider: "a".to_string(),
                timeout: Duration::from_millis(10),
                elapsed: Duration::from_millis(10),
            }),
            "provider_timeout"
        );
        assert_eq!(outcome_label(true), "success");
        assert_eq!(outcome_label(false), "failure");
    }

    #[test]
    fn test_label_keys() {
        assert_eq!(keys::PROVIDER, "provider");
        assert_eq!(keys::ERROR_TYPE, "error_type");
        assert_eq!(keys::STRATEGY, "strategy");
    }

    #[test]
    fn test_recorder_functions_render() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            record_provider_success("alpha", "mock-model", Duration::from_millis(120), 300, 0.01);
            record_provider_failure(
                "beta",
                &EnsembleError::CircuitBreakerOpen("beta".to_string()),
                Duration::ZERO,
            );
            set_provider_health("beta", false);
        });

        let rendered = handle.render();
        assert!(rendered.contains(names::PROVIDER_CALLS_TOTAL));
        assert!(rendered.contains(names::PROVIDER_ERRORS_TOTAL));
        assert!(rendered.contains("provider=\"alpha\""));
        assert!(rendered.contains("error_type=\"circuit_breaker_open\""));
        assert!(rendered.contains(names::PROVIDER_HEALTHY));
    }

    #[test]
    fn test_ensemble_call_emits_metrics() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let orchestrator = EnsembleOrchestrator::default();
                orchestrator
                    .register_provider(
                        "alpha",
                        Arc::new(MockProvider::new("ok")),
                        Arc::new(MockCircuitBreaker::new()),
                        RegistrationOptions::default(),
                    )
                    .await;
                orchestrator
                    .analyze_with_ensemble(
                        &AnalysisInput::text("<p>hi</p>"),
                        "review",
                        &EnsembleOptions::default(),
                    )
                    .await
                    .unwrap();
            });
        });

        let rendered = handle.render();
        assert!(rendered.contains(names::ENSEMBLE_REQUESTS_TOTAL));
        assert!(rendered.contains("outcome=\"success\""));
        assert!(rendered.contains(names::ACTIVE_CONNECTIONS));
    }
}
