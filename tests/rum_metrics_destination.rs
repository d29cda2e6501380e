//! CloudWatch RUM metrics destination handler against a mocked REST-JSON endpoint

mod common;

use cloudrec::aws::Service;
use cloudrec::resource::Resource;
use cloudrec::service::rum::{MetricsDestination, MetricsDestinationConfig};
use common::{client_for, not_found_rest};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DESTINATION_PATH: &str = "/rummetrics/web/metricsdestination";

fn cloudwatch() -> MetricsDestinationConfig {
    MetricsDestinationConfig {
        app_monitor_name: "web".to_string(),
        destination: "CloudWatch".to_string(),
        destination_arn: None,
        iam_role_arn: None,
    }
}

async fn mock_list(server: &MockServer, destinations: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(DESTINATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Destinations": destinations })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_create_puts_destination() {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), &[Service::Rum]);

    Mock::given(method("POST"))
        .and(path(DESTINATION_PATH))
        .and(body_json(json!({"Destination": "CloudWatch"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mock_list(&server, json!([{"Destination": "CloudWatch"}])).await;

    let state = MetricsDestination.create(&client, &cloudwatch()).await.unwrap();
    assert_eq!(state.id, "web");
    assert_eq!(state.destination, "CloudWatch");
    assert!(state.destination_arn.is_none());
}

#[tokio::test]
async fn test_read_follows_pagination() {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), &[Service::Rum]);

    Mock::given(method("GET"))
        .and(path(DESTINATION_PATH))
        .and(query_param("maxResults", "100"))
        .and(query_param_is_missing("nextToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Destinations": [], "NextToken": "t1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DESTINATION_PATH))
        .and(query_param("nextToken", "t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Destinations": [{
                "Destination": "Evidently",
                "DestinationArn": "arn:aws:evidently:us-east-1:123456789012:project/checkout",
                "IamRoleArn": "arn:aws:iam::123456789012:role/rum"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = MetricsDestination.read(&client, "web").await.unwrap().unwrap();
    assert_eq!(state.destination, "Evidently");
    assert_eq!(
        state.destination_arn.as_deref(),
        Some("arn:aws:evidently:us-east-1:123456789012:project/checkout")
    );
    assert_eq!(state.iam_role_arn.as_deref(), Some("arn:aws:iam::123456789012:role/rum"));
}

#[tokio::test]
async fn test_read_without_destinations_returns_none() {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), &[Service::Rum]);

    mock_list(&server, json!([])).await;

    assert!(MetricsDestination.read(&client, "web").await.unwrap().is_none());
}

#[tokio::test]
async fn test_read_of_missing_app_monitor_returns_none() {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), &[Service::Rum]);

    Mock::given(method("GET"))
        .and(path(DESTINATION_PATH))
        .respond_with(not_found_rest("AppMonitor not found"))
        .mount(&server)
        .await;

    assert!(MetricsDestination.read(&client, "web").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_without_changes_issues_no_put() {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), &[Service::Rum]);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mock_list(&server, json!([{"Destination": "CloudWatch"}])).await;

    assert_ok!(MetricsDestination.update(&client, "web", &cloudwatch(), &cloudwatch()).await);
}

#[tokio::test]
async fn test_destination_change_removes_previous_destination() {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), &[Service::Rum]);

    let evidently = MetricsDestinationConfig {
        destination: "Evidently".to_string(),
        destination_arn: Some("arn:aws:evidently:us-east-1:123456789012:project/checkout".to_string()),
        iam_role_arn: Some("arn:aws:iam::123456789012:role/rum".to_string()),
        ..cloudwatch()
    };

    Mock::given(method("DELETE"))
        .and(path(DESTINATION_PATH))
        .and(query_param("destination", "CloudWatch"))
        .and(query_param_is_missing("destinationArn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(DESTINATION_PATH))
        .and(body_json(json!({
            "Destination": "Evidently",
            "DestinationArn": "arn:aws:evidently:us-east-1:123456789012:project/checkout",
            "IamRoleArn": "arn:aws:iam::123456789012:role/rum"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mock_list(
        &server,
        json!([{
            "Destination": "Evidently",
            "DestinationArn": "arn:aws:evidently:us-east-1:123456789012:project/checkout",
            "IamRoleArn": "arn:aws:iam::123456789012:role/rum"
        }]),
    )
    .await;

    let state = MetricsDestination
        .update(&client, "web", &cloudwatch(), &evidently)
        .await
        .unwrap();
    assert_eq!(state.destination, "Evidently");

    let methods: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.method.to_string())
        .collect();
    assert_eq!(methods, vec!["DELETE", "POST", "GET"]);
}

#[tokio::test]
async fn test_role_change_keeps_destination() {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), &[Service::Rum]);

    let with_role = MetricsDestinationConfig {
        iam_role_arn: Some("arn:aws:iam::123456789012:role/rum".to_string()),
        ..cloudwatch()
    };

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(DESTINATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mock_list(&server, json!([{"Destination": "CloudWatch", "IamRoleArn": "arn:aws:iam::123456789012:role/rum"}])).await;

    assert_ok!(MetricsDestination.update(&client, "web", &cloudwatch(), &with_role).await);
}

#[tokio::test]
async fn test_delete_passes_current_destination() {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), &[Service::Rum]);

    mock_list(&server, json!([{"Destination": "CloudWatch"}])).await;
    Mock::given(method("DELETE"))
        .and(path(DESTINATION_PATH))
        .and(query_param("destination", "CloudWatch"))
        .and(query_param_is_missing("destinationArn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    assert_ok!(MetricsDestination.delete(&client, "web").await);
}

#[tokio::test]
async fn test_delete_without_destination_issues_no_call() {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), &[Service::Rum]);

    mock_list(&server, json!([])).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert_ok!(MetricsDestination.delete(&client, "web").await);
}

#[tokio::test]
async fn test_evidently_without_arn_is_rejected_locally() {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), &[Service::Rum]);

    let config = MetricsDestinationConfig {
        destination: "Evidently".to_string(),
        ..cloudwatch()
    };
    let err = MetricsDestination.create(&client, &config).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid value for destination_arn: required when destination is Evidently"
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}
