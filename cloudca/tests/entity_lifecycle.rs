//! End-to-end entity lifecycle against a mock API

#![allow(clippy::disallowed_methods)]

use cloudca::api::pool::API_KEY_HEADER;
use cloudca::{
    ApiError, Client, ClientConfig, Context, EntityOperations, EntityType, PollConfig,
    QueryOptions,
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const SERVICE: &str = "compute-qc";
const ENVIRONMENT: &str = "staging";

fn client_for(server: &Server) -> Client {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let config = ClientConfig::new(server.url(), "lifecycle-key")
        .with_poll(PollConfig::default().with_interval(Duration::from_millis(10)));
    Client::with_config(config).unwrap()
}

fn instances_path(suffix: &str) -> String {
    format!("/services/{}/{}/instances{}", SERVICE, ENVIRONMENT, suffix)
}

#[tokio::test(flavor = "multi_thread")]
async fn instance_create_stop_delete_lifecycle() {
    let mut server = Server::new_async().await;

    let create = server
        .mock("POST", instances_path("").as_str())
        .match_header(API_KEY_HEADER, "lifecycle-key")
        .match_body(Matcher::PartialJson(json!({"name": "web-1"})))
        .with_body(r#"{"taskId":"task-create","taskStatus":"PENDING"}"#)
        .expect(1)
        .create_async()
        .await;
    let create_pending = server
        .mock("GET", "/tasks/task-create")
        .with_body(r#"{"data":{"id":"task-create","status":"PENDING","created":"2024-05-01T10:00:00Z"}}"#)
        .expect(2)
        .create_async()
        .await;
    let create_done = server
        .mock("GET", "/tasks/task-create")
        .with_body(
            r#"{"data":{"id":"task-create","status":"SUCCESS","created":"2024-05-01T10:00:00Z","result":{"id":"i-100","name":"web-1","state":"Running"}}}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let stop = server
        .mock("POST", instances_path("/i-100").as_str())
        .match_query(Matcher::UrlEncoded("operation".into(), "stop".into()))
        .with_body(r#"{"taskId":"task-stop","taskStatus":"SUCCESS","data":{"id":"i-100","state":"Stopped"}}"#)
        .expect(1)
        .create_async()
        .await;

    let delete = server
        .mock("DELETE", instances_path("/i-100").as_str())
        .match_body(Matcher::Json(json!({"purgeImmediately": true})))
        .with_body(r#"{"taskId":"task-delete","taskStatus":"PENDING"}"#)
        .expect(1)
        .create_async()
        .await;
    let delete_done = server
        .mock("GET", "/tasks/task-delete")
        .with_body(r#"{"data":{"id":"task-delete","status":"success"}}"#)
        .expect(1)
        .create_async()
        .await;

    let read_after_delete = server
        .mock("GET", instances_path("/i-100").as_str())
        .with_status(404)
        .with_body(
            r#"{"errors":[{"errorCode":"NOT_FOUND","message":"Instance i-100 not found","context":{}}]}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let registry = client.registry(SERVICE, ENVIRONMENT);
    let instances = registry.resolve("instances").unwrap();
    let ctx = Context::new().with_timeout(Duration::from_secs(30));
    let none = QueryOptions::new();

    let created = assert_ok!(
        instances
            .create(&ctx, &json!({"name": "web-1", "templateId": "tpl-1"}), &none)
            .await
    );
    assert_eq!(created["id"], "i-100");

    let stopped = assert_ok!(instances.execute(&ctx, "i-100", "stop", None, &none).await);
    assert_eq!(stopped["state"], "Stopped");

    let deleted = assert_ok!(
        instances
            .delete(&ctx, "i-100", Some(&json!({"purgeImmediately": true})), &none)
            .await
    );
    assert!(deleted.is_null());

    let err = assert_err!(instances.get(&ctx, "i-100", &none).await);
    assert!(err.is_not_found());
    assert_eq!(err.errors().len(), 1);

    create.assert_async().await;
    create_pending.assert_async().await;
    create_done.assert_async().await;
    stop.assert_async().await;
    delete.assert_async().await;
    delete_done.assert_async().await;
    read_after_delete.assert_async().await;

    let stats = client.connection_stats().await;
    assert_eq!(stats.total_requests, 8);
    assert_eq!(stats.remote_errors, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn independent_operations_share_one_client() {
    let mut server = Server::new_async().await;

    let mut mocks = Vec::new();
    for id in ["vol-1", "vol-2", "vol-3"] {
        mocks.push(
            server
                .mock(
                    "GET",
                    format!("/services/{}/{}/volumes/{}", SERVICE, ENVIRONMENT, id).as_str(),
                )
                .with_body(json!({"data": {"id": id}}).to_string())
                .expect(1)
                .create_async()
                .await,
        );
    }

    let client = client_for(&server);
    let ctx = Context::new();
    let options = QueryOptions::new();

    let calls = ["vol-1", "vol-2", "vol-3"].map(|id| {
        let volumes = client.entity(SERVICE, ENVIRONMENT, EntityType::Volumes);
        let ctx = ctx.clone();
        let options = options.clone();
        async move { volumes.get(&ctx, id, &options).await }
    });

    let results = futures::future::join_all(calls).await;
    for (result, id) in results.into_iter().zip(["vol-1", "vol-2", "vol-3"]) {
        assert_eq!(result.unwrap()["id"], id);
    }

    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelling_stops_a_long_running_task() {
    let mut server = Server::new_async().await;

    let _attach = server
        .mock(
            "POST",
            format!("/services/{}/{}/volumes/vol-9", SERVICE, ENVIRONMENT).as_str(),
        )
        .match_query(Matcher::UrlEncoded("operation".into(), "attachToInstance".into()))
        .with_body(r#"{"taskId":"task-attach"}"#)
        .create_async()
        .await;
    let _pending = server
        .mock("GET", "/tasks/task-attach")
        .with_body(r#"{"data":{"id":"task-attach","status":"PENDING"}}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let volumes = client.entity(SERVICE, ENVIRONMENT, EntityType::Volumes);

    let ctx = Context::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let result = volumes
        .execute(
            &ctx,
            "vol-9",
            "attachToInstance",
            Some(&json!({"instanceId": "i-100"})),
            &QueryOptions::new(),
        )
        .await;

    assert!(matches!(result, Err(ApiError::Cancelled)));
}

#[tokio::test(flavor = "multi_thread")]
async fn protocol_violation_is_never_success() {
    let mut server = Server::new_async().await;

    let _broken = server
        .mock("PUT", instances_path("/i-1").as_str())
        .with_status(503)
        .with_body("Service Unavailable")
        .create_async()
        .await;

    let client = client_for(&server);
    let result = client
        .entity(SERVICE, ENVIRONMENT, EntityType::Instances)
        .update(&Context::new(), "i-1", &json!({"name": "x"}), &QueryOptions::new())
        .await;

    match result {
        Err(ApiError::ProtocolViolation { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "Service Unavailable");
        }
        other => panic!("Expected ProtocolViolation, got {:?}", other),
    }
}
