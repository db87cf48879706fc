use courier::{
    Behavior, CancellationToken, Container, CourierError, DispatcherBuilder, Lifetime, Next, Payload,
    RequestContext,
    testing::{CallCounter, RecordingLog},
};
use std::{sync::Arc, time::Duration};

mod common;
use common::{Outcome, Ping, PingHandler, SaveOrder, ScopeProbe, scoped_orders};

#[tokio::test]
async fn test_scope_is_released_after_success() {
    let probe = ScopeProbe::new();
    let dispatcher = scoped_orders(&probe).build().unwrap();

    assert_eq!(dispatcher.dispatch(SaveOrder(Outcome::Commit)).await.unwrap(), "saved");

    assert_eq!(probe.opened.count(), 1);
    assert_eq!(probe.released.count(), 1);
}

#[tokio::test]
async fn test_scope_is_released_after_failure() {
    let probe = ScopeProbe::new();
    let dispatcher = scoped_orders(&probe).build().unwrap();

    let err = dispatcher.dispatch(SaveOrder(Outcome::Fail)).await.unwrap_err();

    assert_eq!(err.to_string(), "rollback");
    assert_eq!(probe.opened.count(), 1);
    assert_eq!(probe.released.count(), 1);
}

#[tokio::test]
async fn test_scope_is_released_after_cancellation() {
    let probe = ScopeProbe::new();
    let dispatcher = scoped_orders(&probe).build().unwrap();
    let cancel = CancellationToken::new();

    let (result, ()) = tokio::join!(
        dispatcher.dispatch_with(SaveOrder(Outcome::WaitForCancel), &cancel),
        async {
            tokio::task::yield_now().await;
            cancel.cancel();
        }
    );

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(probe.opened.count(), 1);
    assert_eq!(probe.released.count(), 1);
}

#[tokio::test]
async fn test_scope_is_released_after_timeout() {
    let probe = ScopeProbe::new();
    let dispatcher = scoped_orders(&probe)
        .use_timeout(Duration::from_millis(20))
        .build()
        .unwrap();

    let err = dispatcher.dispatch(SaveOrder(Outcome::WaitForCancel)).await.unwrap_err();

    assert!(matches!(err, CourierError::Timeout(_)));
    assert_eq!(probe.opened.count(), 1);
    assert_eq!(probe.released.count(), 1);
}

#[tokio::test]
async fn test_each_dispatch_gets_its_own_scope() {
    let probe = ScopeProbe::new();
    let dispatcher = scoped_orders(&probe).build().unwrap();

    for _ in 0..3 {
        dispatcher.dispatch(SaveOrder(Outcome::Commit)).await.unwrap();
    }

    assert_eq!(probe.opened.count(), 3);
    assert_eq!(probe.released.count(), 3);
}

#[tokio::test]
async fn test_in_scope_shares_one_scope() {
    let probe = ScopeProbe::new();
    let dispatcher = scoped_orders(&probe).build().unwrap();

    let scoped = dispatcher.in_scope().unwrap();
    scoped.dispatch(SaveOrder(Outcome::Commit)).await.unwrap();
    scoped.dispatch(SaveOrder(Outcome::Commit)).await.unwrap();

    assert_eq!(probe.opened.count(), 1);
    assert_eq!(probe.released.count(), 0);

    drop(scoped);
    assert_eq!(probe.released.count(), 1);
}

#[tokio::test]
async fn test_scoped_resource_cannot_come_from_root() {
    let probe = ScopeProbe::new();
    let dispatcher = scoped_orders(&probe).build().unwrap();

    let Err(err) = dispatcher.container().resolve::<common::UnitOfWork>() else {
        panic!("scoped service resolved from the root container");
    };

    assert!(err.is_scope_required());
    assert_eq!(probe.opened.count(), 0);
}

#[tokio::test]
async fn test_reusable_pipeline_is_shared_across_clones() {
    let built = CallCounter::new();
    let counter = built.clone();
    let dispatcher = DispatcherBuilder::new()
        .register_handler::<Ping, _, _>(Lifetime::Reusable, move |_: &dyn courier::Container| {
            counter.increment();
            Ok(PingHandler::default())
        })
        .unwrap()
        .build()
        .unwrap();

    let clone = dispatcher.clone();
    dispatcher.dispatch(Ping).await.unwrap();
    clone.dispatch(Ping).await.unwrap();

    assert_eq!(built.count(), 1);
}

/// A scoped service numbered in creation order.
struct Session {
    id: usize,
}

/// Records the session it was built with on every call.
struct SessionStamp {
    session: Arc<Session>,
    log: RecordingLog,
}

impl Behavior for SessionStamp {
    async fn handle(&self, _cx: &RequestContext<'_>, next: Next<'_>) -> Result<Payload, CourierError> {
        self.log.push(self.session.id.to_string());
        next.run().await
    }
}

fn stamped_pings(log: &RecordingLog) -> courier::Dispatcher {
    let sessions = CallCounter::new();
    let stamp_log = log.clone();
    DispatcherBuilder::new()
        .configure_services(move |services| {
            services.add_scoped_factory(move |_: &dyn Container| {
                Ok(Session {
                    id: sessions.increment(),
                })
            });
        })
        .register_behavior(move |c: &dyn Container| {
            Ok(SessionStamp {
                session: c.resolve::<Session>()?,
                log: stamp_log.clone(),
            })
        })
        .register_handler_instance::<Ping, _>(PingHandler::default())
        .unwrap()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_reusable_pipeline_does_not_outlive_its_scope() {
    let log = RecordingLog::new();
    let dispatcher = stamped_pings(&log);

    let first = dispatcher.in_scope().unwrap();
    first.dispatch(Ping).await.unwrap();
    first.dispatch(Ping).await.unwrap();
    drop(first);

    let second = dispatcher.in_scope().unwrap();
    second.dispatch(Ping).await.unwrap();

    assert_eq!(log.entries(), ["0", "0", "1"]);
}

#[tokio::test]
async fn test_scoped_behavior_dependency_fails_from_root() {
    let log = RecordingLog::new();
    let dispatcher = stamped_pings(&log);

    let err = dispatcher.dispatch(Ping).await.unwrap_err();

    assert!(matches!(err, CourierError::Resolve(ref e) if e.is_scope_required()));
    assert!(log.is_empty());
}
