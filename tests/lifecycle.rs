//! Adapter lifecycle over real sockets.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{routing::get, Router};
use reqwest::StatusCode;
use tokio::net::TcpListener;

use pb_host::config::ServiceConfig;
use pb_host::http::server::{self, HostServer};
use pb_host::lifecycle::{App, HostContext, LifecycleState, Shutdown};
use pb_host::service::SUPERUSERS;

mod common;

#[tokio::test]
async fn test_forwarder_unavailable_until_started() {
    let root = tempfile::tempdir().unwrap();
    let config = common::local_config(5);
    let mut app = App::new(ServiceConfig::default());
    app.provision(&HostContext::new(root.path())).await.unwrap();

    let routers = HostServer::new(&config, app.service().unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let public = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let task = tokio::spawn(server::run(
        listener,
        routers.public_router(),
        "public",
        shutdown.signaled(),
    ));

    let client = common::client();
    let res = client
        .get(common::url(public, "/api/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.headers()["retry-after"], "1");

    app.start().unwrap();
    let _router = tokio::time::timeout(Duration::from_secs(5), app.service().unwrap().on_serve().wait())
        .await
        .unwrap();

    let res = client
        .get(common::url(public, "/api/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    shutdown.trigger();
    task.await.unwrap().unwrap();
    app.stop(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_embedded_listener_serves_directly() {
    let root = tempfile::tempdir().unwrap();
    let mut app = App::new(ServiceConfig::default());
    app.provision(&HostContext::new(root.path())).await.unwrap();
    app.start().unwrap();

    let addr = app.listen_addr().unwrap();
    let res = common::client()
        .get(common::url(addr, "/api/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    app.stop(Duration::from_secs(5)).await.unwrap();
    assert_eq!(app.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_stop_honours_deadline_with_slow_request() {
    let root = tempfile::tempdir().unwrap();
    let mut app = App::new(ServiceConfig::default());
    app.provision(&HostContext::new(root.path())).await.unwrap();
    app.service().unwrap().bind_serve_hook(|router: Router, _| {
        router.route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                "done"
            }),
        )
    });
    app.start().unwrap();
    let _router = tokio::time::timeout(Duration::from_secs(5), app.service().unwrap().on_serve().wait())
        .await
        .unwrap();

    let slow = common::url(app.listen_addr().unwrap(), "/slow");
    let in_flight = tokio::spawn(async move { common::client().get(slow).send().await });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let started = Instant::now();
    let err = app.stop(Duration::from_secs(5)).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout(), "{}", err);
    assert!(elapsed >= Duration::from_secs(4), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(7), "{:?}", elapsed);
    assert_eq!(app.state(), LifecycleState::Stopped);
    in_flight.abort();
}

#[tokio::test]
async fn test_data_survives_restart() {
    let root = tempfile::tempdir().unwrap();
    let host = HostContext::new(root.path());

    let mut first = App::new(ServiceConfig::default());
    first.provision(&host).await.unwrap();
    let service = first.service().unwrap();
    let superusers = service.find_collection(SUPERUSERS).unwrap();
    let mut record = service.new_record(&superusers);
    record.set_email("keep@example.com");
    record.set_password("secret123").unwrap();
    service.save(&record).unwrap();
    first.start().unwrap();
    first.stop(Duration::from_secs(5)).await.unwrap();

    let mut second = App::new(ServiceConfig::default());
    second.provision(&host).await.unwrap();
    assert_eq!(second.data_dir(), first.data_dir());
    let restored = second
        .service()
        .unwrap()
        .find_auth_record_by_email(SUPERUSERS, "keep@example.com")
        .unwrap();
    assert_eq!(restored.id, record.id);
    assert!(restored.validate_password("secret123"));
}

#[tokio::test]
async fn test_host_launch_and_shutdown() {
    let (_root, host) = common::launch(common::local_config(5)).await;
    assert_eq!(host.app().state(), LifecycleState::Running);
    assert!(host.admin_addr().is_some());

    let service: Arc<_> = host.app().service().unwrap();
    host.shutdown().await.unwrap();
    assert!(!service.is_bootstrapped());
}

#[tokio::test]
async fn test_host_launch_fails_on_taken_port() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = common::local_config(5);
    config.listener.bind_address = taken.local_addr().unwrap().to_string();

    let root = tempfile::tempdir().unwrap();
    let err = pb_host::lifecycle::startup::launch(&config, &HostContext::new(root.path()))
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("public"), "{}", err);
}
