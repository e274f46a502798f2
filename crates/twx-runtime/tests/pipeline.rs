use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use twx_core::{
    ActionKind, ActionOutcome, ExecutionMode, FailureKind, HttpMethod, RejectionStage,
    RequestResolver, ResolvedRequest, RunState, Specification,
};
use twx_policy::{GuardrailEngine, GuardrailPolicy, GuardrailViolation, SchemaValidator};
use twx_runtime::fakes::RecordingTransport;
use twx_runtime::{
    CancellationToken, ExecutionEventType, Executor, MemoryAuditSink, Pipeline, PipelineError,
    RemoteResponse, RemoteTransport, TransportError,
};

fn pipeline(transport: Arc<RecordingTransport>) -> Pipeline<Arc<RecordingTransport>> {
    Pipeline::new(
        SchemaValidator::new(),
        GuardrailEngine::new(GuardrailPolicy::default()),
        Executor::new(transport),
    )
}

fn demo_spec() -> Specification {
    Specification::from_json_str(
        r#"{
            "metadata": {"description": "calculator demo"},
            "actions": [
                {"type": "create-entity", "params": {"name": "demo-thing", "template": "GenericThing"}},
                {"type": "enable-entity", "params": {"name": "demo-thing"}},
                {"type": "add-capability", "params": {
                    "entity": "demo-thing", "capability": "solve", "code": "result = a + b;",
                    "params": {"a": "NUMBER", "b": "NUMBER"}, "resultType": "NUMBER"
                }}
            ]
        }"#,
    )
    .unwrap()
}

fn spec(actions: Vec<Value>) -> Specification {
    Specification::from_actions(actions)
}

fn enable(name: &str) -> Value {
    json!({"type": "enable-entity", "params": {"name": name}})
}

fn enable_path(name: &str) -> String {
    format!("/Things/{name}/Services/EnableThing")
}

#[tokio::test]
async fn demo_scenario_completes_with_three_successes() {
    let transport = Arc::new(RecordingTransport::new());
    let report = pipeline(transport.clone())
        .run(&demo_spec(), ExecutionMode::Live, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.records.len(), 3);
    assert_eq!(report.succeeded_count(), 3);
    assert_eq!(report.specification.description.as_deref(), Some("calculator demo"));

    let paths: Vec<String> = transport.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(
        paths,
        vec![
            "/Resources/EntityServices/Services/CreateThing".to_string(),
            "/Things/demo-thing/Services/EnableThing".to_string(),
            "/Things/ServiceHelper/Services/AddServiceToThing".to_string(),
        ]
    );
}

#[tokio::test]
async fn delete_entity_is_rejected_before_any_request() {
    let transport = Arc::new(RecordingTransport::new());
    let input = spec(vec![json!({"type": "delete-entity", "params": {"name": "demo-thing"}})]);

    let err = pipeline(transport.clone())
        .run(&input, ExecutionMode::Live, &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        PipelineError::Guardrail(rejection) => {
            assert_eq!(rejection.index, 0);
            assert_eq!(rejection.action_type, ActionKind::DeleteEntity);
            assert_eq!(rejection.violation, GuardrailViolation::ActionNotPermitted);
            assert_eq!(rejection.violation.to_string(), "action type not permitted");
        }
        other => panic!("expected guardrail rejection, got {other:?}"),
    }
    assert_eq!(transport.request_count(), 0);

    let report = err.into_report(&input, ExecutionMode::Live);
    assert!(report.records.is_empty());
    match report.state {
        RunState::Rejected { at, stage, reason } => {
            assert_eq!(at, Some(0));
            assert_eq!(stage, RejectionStage::Guardrail);
            assert!(reason.contains("action type not permitted"));
        }
        other => panic!("expected rejected state, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_action_type_is_schema_error_with_index() {
    let transport = Arc::new(RecordingTransport::new());
    let input = spec(vec![enable("a"), json!({"type": "reboot-platform", "params": {}})]);

    let err = pipeline(transport.clone())
        .run(&input, ExecutionMode::Live, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), RejectionStage::Schema);
    assert_eq!(err.index(), Some(1));
    assert!(err.to_string().contains("reboot-platform"));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn blocklisted_resolution_stops_everything_at_and_after_it() {
    let transport = Arc::new(RecordingTransport::new());
    let input = spec(vec![
        enable("a"),
        json!({"type": "invoke-capability", "params": {"entity": "a", "capability": "PurgeAll"}}),
        enable("b"),
    ]);

    let err = pipeline(transport.clone())
        .run(&input, ExecutionMode::Live, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.index(), Some(1));
    assert!(matches!(
        err,
        PipelineError::Guardrail(ref r)
            if matches!(r.violation, GuardrailViolation::BlockedEndpoint { .. })
    ));
    // No partial approval: not even the allowed first action is sent.
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn failure_aborts_and_later_actions_are_never_attempted() {
    let transport = Arc::new(RecordingTransport::new().script(
        enable_path("b"),
        Ok(RemoteResponse::new(500, json!("Internal error"))),
    ));
    let input = spec(vec![enable("a"), enable("b"), enable("c")]);

    let report = pipeline(transport.clone())
        .run(&input, ExecutionMode::Live, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Aborted { at: 1 });
    assert_eq!(report.records.len(), 2);
    assert!(matches!(report.records[0].outcome, ActionOutcome::Succeeded { .. }));
    assert_eq!(
        report.records[1].outcome,
        ActionOutcome::Failed {
            kind: FailureKind::RemoteCallFailure,
            status: Some(500),
            message: "Internal error".into(),
        }
    );
    assert_eq!(report.failure().map(|r| r.index), Some(1));

    let paths: Vec<String> = transport.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec![enable_path("a"), enable_path("b")]);
}

#[tokio::test]
async fn dry_run_and_live_resolve_identical_requests() {
    let dry_transport = Arc::new(RecordingTransport::new());
    let dry = pipeline(dry_transport.clone())
        .run(&demo_spec(), ExecutionMode::DryRun, &CancellationToken::new())
        .await
        .unwrap();

    let live_transport = Arc::new(RecordingTransport::new());
    let live = pipeline(live_transport.clone())
        .run(&demo_spec(), ExecutionMode::Live, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(dry_transport.request_count(), 0);
    assert_eq!(dry.state, RunState::Completed);
    assert!(dry.records.iter().all(|r| r.outcome == ActionOutcome::Planned));

    let planned: Vec<ResolvedRequest> = dry.records.iter().map(|r| r.request.clone()).collect();
    let recorded: Vec<ResolvedRequest> = live.records.iter().map(|r| r.request.clone()).collect();
    assert_eq!(planned, recorded);
    assert_eq!(planned, live_transport.requests());
}

#[tokio::test]
async fn dry_runs_of_the_same_specification_are_comparable() {
    let transport = Arc::new(RecordingTransport::new());
    let pipeline = pipeline(transport);
    let first = pipeline
        .run(&demo_spec(), ExecutionMode::DryRun, &CancellationToken::new())
        .await
        .unwrap();
    let second = pipeline
        .run(&demo_spec(), ExecutionMode::DryRun, &CancellationToken::new())
        .await
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.comparable(), second.comparable());
}

#[tokio::test]
async fn rerunning_creation_against_existing_entity_converges() {
    let transport = Arc::new(RecordingTransport::new().script(
        "/Resources/EntityServices/Services/CreateThing",
        Ok(RemoteResponse::new(
            500,
            json!("Thing [demo-thing] already exists"),
        )),
    ));

    let report = pipeline(transport.clone())
        .run(&demo_spec(), ExecutionMode::Live, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert!(matches!(
        report.records[0].outcome,
        ActionOutcome::Succeeded {
            status: 500,
            already_existed: true,
            ..
        }
    ));
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn already_exists_is_a_failure_for_non_creation_kinds() {
    let transport = Arc::new(RecordingTransport::new().script(
        enable_path("a"),
        Ok(RemoteResponse::new(500, json!("already exists"))),
    ));

    let report = pipeline(transport)
        .run(&spec(vec![enable("a")]), ExecutionMode::Live, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Aborted { at: 0 });
}

#[tokio::test]
async fn timeout_aborts_like_any_other_failure() {
    let transport = Arc::new(
        RecordingTransport::new().script(enable_path("a"), Err(TransportError::Timeout)),
    );

    let report = pipeline(transport.clone())
        .run(
            &spec(vec![enable("a"), enable("b")]),
            ExecutionMode::Live,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Aborted { at: 0 });
    assert!(matches!(
        report.records[0].outcome,
        ActionOutcome::Failed {
            kind: FailureKind::Timeout,
            status: None,
            ..
        }
    ));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn connection_error_is_remote_call_failure() {
    let transport = Arc::new(RecordingTransport::new().script(
        enable_path("a"),
        Err(TransportError::Connection("connection refused".into())),
    ));

    let report = pipeline(transport)
        .run(&spec(vec![enable("a")]), ExecutionMode::Live, &CancellationToken::new())
        .await
        .unwrap();

    match &report.records[0].outcome {
        ActionOutcome::Failed {
            kind,
            status,
            message,
        } => {
            assert_eq!(*kind, FailureKind::RemoteCallFailure);
            assert_eq!(*status, None);
            assert!(message.contains("connection refused"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_token_stops_before_first_action() {
    let transport = Arc::new(RecordingTransport::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = pipeline(transport.clone())
        .run(&demo_spec(), ExecutionMode::Live, &cancel)
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Cancelled { at: 0 });
    assert!(report.records.is_empty());
    assert_eq!(transport.request_count(), 0);
}

/// Cancels the token while the first request is in flight.
struct CancelOnFirstSend {
    inner: RecordingTransport,
    cancel: CancellationToken,
}

#[async_trait]
impl RemoteTransport for CancelOnFirstSend {
    async fn send(&self, request: &ResolvedRequest) -> Result<RemoteResponse, TransportError> {
        self.cancel.cancel();
        self.inner.send(request).await
    }
}

#[tokio::test]
async fn cancellation_is_observed_only_at_action_boundaries() {
    let cancel = CancellationToken::new();
    let transport = Arc::new(CancelOnFirstSend {
        inner: RecordingTransport::new(),
        cancel: cancel.clone(),
    });
    let pipeline = Pipeline::new(
        SchemaValidator::new(),
        GuardrailEngine::default(),
        Executor::new(transport.clone()),
    );

    let report = pipeline
        .run(&demo_spec(), ExecutionMode::Live, &cancel)
        .await
        .unwrap();

    // The in-flight request completed and was recorded.
    assert_eq!(report.state, RunState::Cancelled { at: 1 });
    assert_eq!(report.records.len(), 1);
    assert!(matches!(report.records[0].outcome, ActionOutcome::Succeeded { .. }));
    assert_eq!(transport.inner.request_count(), 1);
}

#[tokio::test]
async fn audit_sink_sees_one_event_pair_per_action() {
    let transport = Arc::new(RecordingTransport::new().script(
        enable_path("b"),
        Ok(RemoteResponse::new(404, Value::Null)),
    ));
    let sink = Arc::new(MemoryAuditSink::new());
    let pipeline = Pipeline::new(
        SchemaValidator::new(),
        GuardrailEngine::default(),
        Executor::new(transport).with_audit_sink(sink.clone()),
    );

    pipeline
        .run(
            &spec(vec![enable("a"), enable("b")]),
            ExecutionMode::Live,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        sink.event_types(),
        vec![
            ExecutionEventType::ActionDispatched,
            ExecutionEventType::ActionSucceeded,
            ExecutionEventType::ActionDispatched,
            ExecutionEventType::ActionFailed,
        ]
    );
    let failed = &sink.events()[3];
    assert_eq!(failed.index, 1);
    assert_eq!(failed.status, Some(404));
    assert_eq!(failed.method, HttpMethod::Post.to_string());
}

#[tokio::test]
async fn dry_run_emits_planned_events_only() {
    let sink = Arc::new(MemoryAuditSink::new());
    let pipeline = Pipeline::new(
        SchemaValidator::new(),
        GuardrailEngine::default(),
        Executor::new(Arc::new(RecordingTransport::new())).with_audit_sink(sink.clone()),
    );

    pipeline
        .run(&demo_spec(), ExecutionMode::DryRun, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        sink.event_types(),
        vec![ExecutionEventType::ActionPlanned; 3]
    );
}

#[tokio::test]
async fn executor_uses_the_policy_resolver() {
    let transport = Arc::new(RecordingTransport::new());
    let policy = GuardrailPolicy::builder()
        .allow(ActionKind::AddCapability)
        .resolver(RequestResolver::new("Injector"))
        .build()
        .unwrap();
    let pipeline = Pipeline::new(
        SchemaValidator::new(),
        GuardrailEngine::new(policy),
        Executor::new(transport.clone()),
    );

    pipeline
        .run(
            &spec(vec![json!({"type": "add-capability", "params": {
                "entity": "t", "capability": "c", "code": "result = 1;"
            }})]),
            ExecutionMode::Live,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        transport.requests()[0].path,
        "/Things/Injector/Services/AddServiceToThing"
    );
}

#[tokio::test]
async fn executor_sends_exactly_the_approved_requests() {
    let transport = Arc::new(RecordingTransport::new());
    let policy = GuardrailPolicy::builder()
        .allow(ActionKind::AddCapability)
        .resolver(RequestResolver::new("Injector"))
        .build()
        .unwrap();
    let validated = SchemaValidator::new()
        .validate(&spec(vec![json!({"type": "add-capability", "params": {
            "entity": "t", "capability": "c", "code": "result = 1;"
        }})]))
        .unwrap();
    let approved = GuardrailEngine::new(policy).evaluate(&validated).unwrap();

    let report = Executor::new(transport.clone())
        .run(&approved, ExecutionMode::Live, &CancellationToken::new())
        .await;

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(transport.requests(), approved.requests().to_vec());
    assert_eq!(report.records[0].request, approved.requests()[0]);
}

#[tokio::test]
async fn check_runs_only_the_pure_stages() {
    let transport = Arc::new(RecordingTransport::new());
    let approved = pipeline(transport.clone()).check(&demo_spec()).unwrap();
    assert_eq!(approved.len(), 3);
    assert_eq!(transport.request_count(), 0);
}
