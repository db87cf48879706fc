use courier::{ConfigError, CourierError, DispatcherBuilder, testing::{RecordingBehavior, RecordingLog}};

mod common;
use common::{CreateUser, CreateUserHandler, EmailHasAt, NameRequired, Ping, PingHandler};

fn users(handler: CreateUserHandler) -> DispatcherBuilder {
    DispatcherBuilder::new()
        .register_validator::<CreateUser, _>(NameRequired)
        .and_then(|builder| builder.register_validator::<CreateUser, _>(EmailHasAt))
        .and_then(|builder| builder.register_handler_instance::<CreateUser, _>(handler))
        .unwrap()
}

#[tokio::test]
async fn test_all_failures_are_reported_together() {
    let handler = CreateUserHandler::default();
    let calls = handler.calls.clone();
    let dispatcher = users(handler).build().unwrap();

    let err = dispatcher
        .dispatch(CreateUser { name: "", email: "nobody" })
        .await
        .unwrap_err();

    let failures = err.validation().expect("validation error").failures();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].field, "name");
    assert_eq!(failures[1].field, "email");
    assert_eq!(calls.count(), 0);
}

#[tokio::test]
async fn test_valid_request_reaches_handler() {
    let handler = CreateUserHandler::default();
    let calls = handler.calls.clone();
    let dispatcher = users(handler).build().unwrap();

    let id = dispatcher
        .dispatch(CreateUser { name: "ada", email: "ada@example.com" })
        .await
        .unwrap();

    assert_eq!(id, 42);
    assert_eq!(calls.count(), 1);
}

#[tokio::test]
async fn test_requests_without_validators_pass() {
    let dispatcher = users(CreateUserHandler::default())
        .register_handler_instance::<Ping, _>(PingHandler::default())
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(dispatcher.dispatch(Ping).await.unwrap(), "pong");
}

#[tokio::test]
async fn test_validation_runs_at_its_registration_position() {
    let log = RecordingLog::new();
    let dispatcher = DispatcherBuilder::new()
        .register_behavior_instance(RecordingBehavior::new("inner", log.clone()))
        .register_validator::<CreateUser, _>(NameRequired)
        .unwrap()
        .register_behavior_instance(RecordingBehavior::new("outer", log.clone()))
        .register_handler_instance::<CreateUser, _>(CreateUserHandler::default())
        .unwrap()
        .build()
        .unwrap();

    let err = dispatcher
        .dispatch(CreateUser { name: "", email: "a@b" })
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::Validation(_)));
    assert_eq!(log.entries(), ["outer"]);
}

#[test]
fn test_duplicate_validator_is_rejected() {
    let err = DispatcherBuilder::new()
        .register_validator::<CreateUser, _>(NameRequired)
        .and_then(|builder| builder.register_validator::<CreateUser, _>(NameRequired))
        .unwrap_err();

    assert!(matches!(err, ConfigError::DuplicateValidator { .. }));
}
