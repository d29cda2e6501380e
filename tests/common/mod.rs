//! Shared fixtures for the wiremock integration tests

#![allow(dead_code)]

use cloudrec::aws::auth::Credentials;
use cloudrec::aws::http::RetryConfig;
use cloudrec::aws::{AwsClient, Service};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use wiremock::{Request, Respond, ResponseTemplate};

pub const ACCOUNT_ID: &str = "123456789012";

/// Client pointed at `uri` for the given services, with no retries and
/// millisecond polling
pub fn client_for(uri: &str, services: &[Service]) -> AwsClient {
    let mut client = AwsClient::with_retry(
        Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY", None, None, "test"),
        "us-east-1",
        RetryConfig::none(),
    )
    .unwrap()
    .with_poll_interval(Duration::from_millis(5));

    for service in services {
        client = client.with_endpoint(*service, uri).unwrap();
    }
    client
}

pub fn not_found_rest(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(404)
        .insert_header("x-amzn-ErrorType", "ResourceNotFoundException:http://internal.amazon.com/")
        .set_body_json(json!({ "Message": message }))
}

pub fn iam_error(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "Error": {"Type": "Sender", "Code": code, "Message": message},
        "RequestId": "4a5b6c"
    }))
}

pub fn iam_response(action: &str, result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        format!("{}Response", action): {
            format!("{}Result", action): result,
            "ResponseMetadata": {"RequestId": "4a5b6c"}
        }
    }))
}

#[derive(Debug, Clone)]
struct StoredFramework {
    name: String,
    arn: String,
    description: Option<String>,
    controls: Value,
    tags: BTreeMap<String, String>,
    deployment_status: String,
    /// Describe calls left before the deployment completes
    pending_polls: u32,
}

/// How a framework deployment ends once its pending polls run out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Deployment {
    #[default]
    Completes,
    Fails,
    /// Stays in progress forever
    Stalls,
}

#[derive(Debug, Default)]
struct FakeBackupState {
    frameworks: BTreeMap<String, StoredFramework>,
    writes: Vec<String>,
    deployment: Deployment,
}

/// In-memory AWS Backup audit framework API
#[derive(Debug, Default)]
pub struct FakeBackup {
    state: Mutex<FakeBackupState>,
}

impl FakeBackup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake whose deployments end the given way
    pub fn with_deployment(deployment: Deployment) -> Self {
        let fake = Self::default();
        fake.set_deployment(deployment);
        fake
    }

    /// Change how later deployments end
    pub fn set_deployment(&self, deployment: Deployment) {
        self.state.lock().unwrap().deployment = deployment;
    }

    /// Names of the mutating operations received so far
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn framework_count(&self) -> usize {
        self.state.lock().unwrap().frameworks.len()
    }

    /// Remove a framework behind the handler's back
    pub fn remove(&self, name: &str) {
        self.state.lock().unwrap().frameworks.remove(name);
    }

    fn describe(framework: &StoredFramework) -> Value {
        let mut output = json!({
            "FrameworkName": framework.name,
            "FrameworkArn": framework.arn,
            "FrameworkControls": framework.controls,
            "CreationTime": 1700000000.123,
            "DeploymentStatus": framework.deployment_status,
            "FrameworkStatus": "ACTIVE",
            "IdempotencyToken": "token"
        });
        if let Some(description) = &framework.description {
            output["FrameworkDescription"] = json!(description);
        }
        output
    }

    fn find_by_arn<'a>(state: &'a mut FakeBackupState, arn: &str) -> Option<&'a mut StoredFramework> {
        state.frameworks.values_mut().find(|f| f.arn == arn)
    }
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment).map(|s| s.into_owned()).unwrap_or_default()
}

impl Respond for FakeBackup {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let segments: Vec<String> = request
            .url
            .path()
            .trim_start_matches('/')
            .split('/')
            .map(decode)
            .collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        match (request.method.as_str(), segments.as_slice()) {
            ("POST", ["audit", "frameworks"]) => {
                let name = body["FrameworkName"].as_str().unwrap_or_default().to_string();
                if state.frameworks.contains_key(&name) {
                    return ResponseTemplate::new(409)
                        .insert_header("x-amzn-ErrorType", "AlreadyExistsException")
                        .set_body_json(json!({"Message": "exists"}));
                }
                let arn = format!("arn:aws:backup:us-east-1:{}:framework:{}-4d5e", ACCOUNT_ID, name);
                let tags = body["FrameworkTags"]
                    .as_object()
                    .map(|m| {
                        m.iter()
                            .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                            .collect()
                    })
                    .unwrap_or_default();
                state.frameworks.insert(
                    name.clone(),
                    StoredFramework {
                        name: name.clone(),
                        arn: arn.clone(),
                        description: body["FrameworkDescription"].as_str().map(String::from),
                        controls: body["FrameworkControls"].clone(),
                        tags,
                        deployment_status: "CREATE_IN_PROGRESS".to_string(),
                        pending_polls: 1,
                    },
                );
                state.writes.push("CreateFramework".to_string());
                ResponseTemplate::new(200).set_body_json(json!({"FrameworkName": name, "FrameworkArn": arn}))
            }
            ("GET", ["audit", "frameworks", name]) => {
                let deployment = state.deployment;
                match state.frameworks.get_mut(*name) {
                    Some(framework) => {
                        if framework.pending_polls > 0 {
                            framework.pending_polls -= 1;
                        } else {
                            match deployment {
                                Deployment::Completes => framework.deployment_status = "COMPLETED".to_string(),
                                Deployment::Fails => framework.deployment_status = "FAILED".to_string(),
                                Deployment::Stalls => {}
                            }
                        }
                        ResponseTemplate::new(200).set_body_json(Self::describe(framework))
                    }
                    None => not_found_rest("Framework not found"),
                }
            }
            ("PUT", ["audit", "frameworks", name]) => match state.frameworks.get_mut(*name) {
                Some(framework) => {
                    framework.description = body["FrameworkDescription"].as_str().map(String::from);
                    framework.controls = body["FrameworkControls"].clone();
                    framework.deployment_status = "UPDATE_IN_PROGRESS".to_string();
                    framework.pending_polls = 1;
                    let response = json!({"FrameworkName": framework.name, "FrameworkArn": framework.arn});
                    state.writes.push("UpdateFramework".to_string());
                    ResponseTemplate::new(200).set_body_json(response)
                }
                None => not_found_rest("Framework not found"),
            },
            ("DELETE", ["audit", "frameworks", name]) => {
                if state.frameworks.remove(*name).is_some() {
                    state.writes.push("DeleteFramework".to_string());
                    ResponseTemplate::new(200)
                } else {
                    not_found_rest("Framework not found")
                }
            }
            ("GET", ["tags", arn, ""]) => match Self::find_by_arn(&mut state, arn) {
                Some(framework) => {
                    let tags: Map<String, Value> =
                        framework.tags.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
                    ResponseTemplate::new(200).set_body_json(json!({ "Tags": tags }))
                }
                None => not_found_rest("Resource not found"),
            },
            ("POST", ["tags", arn]) => {
                let Some(framework) = Self::find_by_arn(&mut state, arn) else {
                    return not_found_rest("Resource not found");
                };
                if let Some(tags) = body["Tags"].as_object() {
                    for (k, v) in tags {
                        framework.tags.insert(k.clone(), v.as_str().unwrap_or_default().to_string());
                    }
                }
                state.writes.push("TagResource".to_string());
                ResponseTemplate::new(200)
            }
            ("POST", ["untag", arn]) => {
                let Some(framework) = Self::find_by_arn(&mut state, arn) else {
                    return not_found_rest("Resource not found");
                };
                if let Some(keys) = body["TagKeyList"].as_array() {
                    for key in keys.iter().filter_map(|k| k.as_str()) {
                        framework.tags.remove(key);
                    }
                }
                state.writes.push("UntagResource".to_string());
                ResponseTemplate::new(200)
            }
            _ => ResponseTemplate::new(400)
                .insert_header("x-amzn-ErrorType", "UnknownOperationException")
                .set_body_json(json!({"Message": format!("{} {}", request.method, request.url.path())})),
        }
    }
}
