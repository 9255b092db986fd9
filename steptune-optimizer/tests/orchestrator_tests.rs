//! End-to-end orchestrator tests: build, propagate, optimize, escalate, report

use std::sync::Arc;
use steptune_config::{AggregationPolicy, FailurePolicy, SteptuneConfig};
use steptune_core::StepTuneError;
use steptune_optimizer::Orchestrator;
use steptune_testing::{definitions, MockInvoker, MockSamplerProvider};

fn base_config() -> SteptuneConfig {
    SteptuneConfig::builder()
        .arn("arn:aws:states:us-west-2:123:stateMachine:Pipeline")
        .region("us-west-2")
        .payload("{}")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_linear_two_task_chain_stays_below_threshold() {
    // A -> B, both func-f with 2000/m curves on [128, 256]: initial memory
    // 256, critical path 15.625ms, no escalation needed under 20ms
    let config = SteptuneConfig::builder()
        .arn("arn:test")
        .payload("{}")
        .constraint_execution_time_threshold(20.0)
        .build()
        .unwrap();
    let definition = definitions::linear_chain(&[("A", "func-f"), ("B", "func-f")]);
    let invoker = Arc::new(MockInvoker::new());
    let samplers = Arc::new(MockSamplerProvider::new(vec![128, 256]).with_curve("func-f", 2000.0));

    let orchestrator = Orchestrator::new(config, definition, invoker, samplers);
    let reports = orchestrator.optimize().await.unwrap();

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert!(report.constraint_met);
    assert!((report.critical_path_ms - 15.625).abs() < 1e-9);
    // cost of a 2000/m curve is flat 2000 MB*ms per task
    assert!((report.cost_mb_ms - 4000.0).abs() < 1e-9);
    assert_eq!(report.function_memory.len(), 1);
    assert_eq!(report.function_memory[0].function, "func-f");
    assert_eq!(report.function_memory[0].memory_mb, 256);
}

#[tokio::test]
async fn test_map_payload_drives_fan_out_and_reporting() {
    let config = SteptuneConfig::builder()
        .arn("arn:test")
        .payload(r#"{"items": [1, 2, 3]}"#)
        .build()
        .unwrap();
    let definition = definitions::single_map(
        "Each",
        "$.items",
        definitions::linear_chain(&[("A", "func-a")]),
    );
    let invoker = Arc::new(MockInvoker::new());
    let samplers = Arc::new(MockSamplerProvider::new(vec![128, 256]).with_curve("func-a", 1000.0));

    let orchestrator =
        Orchestrator::new(config, definition, Arc::clone(&invoker) as _, samplers);
    let reports = orchestrator.optimize().await.unwrap();

    // one iteration per item, each invoked live exactly once
    assert_eq!(invoker.invocation_count("func-a"), 3);
    let inputs: Vec<String> = invoker
        .invocations()
        .into_iter()
        .map(|(_, payload)| payload)
        .collect();
    assert_eq!(inputs, vec!["1", "2", "3"]);

    let report = &reports[0];
    assert_eq!(report.function_memory.len(), 1);
    assert_eq!(report.function_memory[0].function, "func-a");
    // map time is the max iteration, all three identical here
    assert!((report.critical_path_ms - 1000.0 / 256.0).abs() < 1e-9);
    // cost sums the iterations
    assert!((report.cost_mb_ms - 3000.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_escalation_raises_memory_to_meet_threshold() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("steptune_optimizer=debug")
        .try_init();
    // flat cost profile keeps the initial assignment at 128MB with headroom
    // to 512MB; the 12ms threshold then forces escalation to 384MB
    let config = SteptuneConfig::builder()
        .arn("arn:test")
        .payload("{}")
        .constraint_execution_time_threshold(12.0)
        .build()
        .unwrap();
    let definition = definitions::linear_chain(&[("A", "func-f"), ("B", "func-f")]);
    let invoker = Arc::new(MockInvoker::new());
    let samplers = Arc::new(
        MockSamplerProvider::new(vec![128, 256, 384, 512])
            .with_curve("func-f", 2000.0)
            .with_cost_profile("func-f", vec![10.0, 10.0, 10.0, 10.0]),
    );

    let orchestrator = Orchestrator::new(config, definition, invoker, samplers);
    let reports = orchestrator.optimize().await.unwrap();

    let report = &reports[0];
    assert!(report.constraint_met);
    assert_eq!(report.function_memory[0].memory_mb, 384);
    // 2 x 2000/384
    assert!((report.critical_path_ms - 2.0 * 2000.0 / 384.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_infeasible_constraint_reports_unmet_instead_of_failing() {
    // single-entry axis leaves no headroom at all
    let config = SteptuneConfig::builder()
        .arn("arn:test")
        .payload("{}")
        .constraint_execution_time_threshold(1.0)
        .build()
        .unwrap();
    let definition = definitions::linear_chain(&[("A", "func-f")]);
    let invoker = Arc::new(MockInvoker::new());
    let samplers = Arc::new(MockSamplerProvider::new(vec![128]).with_curve("func-f", 2000.0));

    let orchestrator = Orchestrator::new(config, definition, invoker, samplers);
    let reports = orchestrator.optimize().await.unwrap();

    let report = &reports[0];
    assert!(!report.constraint_met);
    assert_eq!(report.function_memory[0].memory_mb, 128);
    assert!((report.critical_path_ms - 15.625).abs() < 1e-9);
}

#[tokio::test]
async fn test_abort_policy_surfaces_the_first_payload_failure() {
    let config = SteptuneConfig::builder()
        .arn("arn:test")
        .payload(r#"{"items": 5}"#) // not an array: propagation error
        .payload(r#"{"items": [1]}"#)
        .build()
        .unwrap();
    let definition = definitions::single_map(
        "Each",
        "$.items",
        definitions::linear_chain(&[("A", "func-a")]),
    );
    let invoker = Arc::new(MockInvoker::new());
    let samplers = Arc::new(MockSamplerProvider::new(vec![128, 256]));

    let orchestrator = Orchestrator::new(config, definition, invoker, samplers);
    let err = orchestrator.optimize().await.unwrap_err();

    assert!(matches!(err, StepTuneError::Propagation { .. }));
}

#[tokio::test]
async fn test_skip_policy_drops_the_failed_payload() {
    let config = SteptuneConfig::builder()
        .arn("arn:test")
        .payload(r#"{"items": 5}"#)
        .payload(r#"{"items": [1]}"#)
        .on_payload_failure(FailurePolicy::Skip)
        .build()
        .unwrap();
    let definition = definitions::single_map(
        "Each",
        "$.items",
        definitions::linear_chain(&[("A", "func-a")]),
    );
    let invoker = Arc::new(MockInvoker::new());
    let samplers = Arc::new(MockSamplerProvider::new(vec![128, 256]));

    let orchestrator = Orchestrator::new(config, definition, invoker, samplers);
    let reports = orchestrator.optimize().await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].payload, r#"{"items": [1]}"#);
}

#[tokio::test]
async fn test_independent_aggregation_returns_none() {
    let orchestrator = Orchestrator::new(
        base_config(),
        definitions::linear_chain(&[("A", "func-a")]),
        Arc::new(MockInvoker::new()),
        Arc::new(MockSamplerProvider::new(vec![128])),
    );
    let reports = orchestrator.optimize().await.unwrap();
    assert!(orchestrator.aggregate(&reports).is_none());
}

#[tokio::test]
async fn test_max_memory_aggregation_combines_reports() {
    let config = SteptuneConfig::builder()
        .arn("arn:test")
        .payload("{}")
        .payload("{}")
        .aggregation(AggregationPolicy::MaxMemoryPerFunction)
        .build()
        .unwrap();
    let definition = definitions::linear_chain(&[("A", "func-a"), ("B", "func-b")]);
    let invoker = Arc::new(MockInvoker::new());
    let samplers = Arc::new(
        MockSamplerProvider::new(vec![128, 256])
            .with_curve("func-a", 1000.0)
            .with_curve("func-b", 3000.0),
    );

    let orchestrator = Orchestrator::new(config, definition, invoker, samplers);
    let reports = orchestrator.optimize().await.unwrap();
    assert_eq!(reports.len(), 2);

    let aggregate = orchestrator.aggregate(&reports).unwrap();
    assert_eq!(aggregate.function_memory.len(), 2);
    assert_eq!(aggregate.function_memory[0].function, "func-a");
    // decreasing mock cost always picks the axis maximum
    assert_eq!(aggregate.function_memory[0].memory_mb, 256);
    assert_eq!(aggregate.function_memory[1].memory_mb, 256);
}

#[tokio::test]
async fn test_index_is_rebuilt_per_payload() {
    // two payloads over the same definition: the live function is invoked
    // once per payload because each run starts from a fresh workflow
    let config = SteptuneConfig::builder()
        .arn("arn:test")
        .payload(r#"{"first": true}"#)
        .payload(r#"{"second": true}"#)
        .build()
        .unwrap();
    let definition = definitions::linear_chain(&[("A", "func-a")]);
    let invoker = Arc::new(MockInvoker::new());
    let samplers = Arc::new(MockSamplerProvider::new(vec![128, 256]));

    let orchestrator =
        Orchestrator::new(config, definition, Arc::clone(&invoker) as _, samplers);
    let reports = orchestrator.optimize().await.unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(invoker.invocation_count("func-a"), 2);
    // each report carries exactly the functions of one expansion
    for report in &reports {
        assert_eq!(report.function_memory.len(), 1);
    }
}
