use bootcamp_services::config::config_server::ConfigServerSource;
use bootcamp_services::config::sources::InMemorySource;
use bootcamp_services::{BootcampError, ConfigurationBuilder, Settings};
use httpmock::prelude::*;

fn environment_body() -> serde_json::Value {
    serde_json::json!({
        "name": "bootcamp-webapi",
        "profiles": ["Development"],
        "label": null,
        "version": "9f1c2e",
        "state": null,
        "propertySources": [
            {
                "name": "https://github.com/bootcamp/config/bootcamp-webapi-Development.yml",
                "source": {"bootcamp.greeting": "hello from dev", "bootcamp.features[0]": "products"}
            },
            {
                "name": "https://github.com/bootcamp/config/application.yml",
                "source": {"bootcamp.greeting": "hello", "bootcamp.owner": "platform"}
            }
        ]
    })
}

async fn load(local: Settings, environment: &str) -> Result<Settings, BootcampError> {
    let mut builder = ConfigurationBuilder::new();
    builder
        .add_source(InMemorySource::new(local))
        .add_source(ConfigServerSource::new("bootcamp-webapi", environment));
    builder.build().await
}

#[tokio::test]
async fn test_remote_settings_override_local_layers() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/bootcamp-webapi/Development");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(environment_body());
    });

    let local = Settings::new()
        .with("spring:cloud:config:uri", server.base_url())
        .with("bootcamp:greeting", "hello from disk")
        .with("bootcamp:local", "kept");

    let settings = load(local, "Development").await.unwrap();

    mock.assert();
    assert_eq!(settings.get("bootcamp:greeting"), Some("hello from dev"));
    assert_eq!(settings.get("bootcamp:owner"), Some("platform"));
    assert_eq!(settings.get("bootcamp:features:0"), Some("products"));
    assert_eq!(settings.get("bootcamp:local"), Some("kept"));
}

#[tokio::test]
async fn test_unknown_application_yields_no_settings() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/bootcamp-webapi/Production");
        then.status(404);
    });

    let local = Settings::new()
        .with("spring:cloud:config:uri", server.base_url())
        .with("spring:cloud:config:failFast", "true");

    let settings = load(local.clone(), "Production").await.unwrap();

    mock.assert();
    assert_eq!(settings, local);
}

#[tokio::test]
async fn test_server_error_is_ignored_without_fail_fast() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/bootcamp-webapi/Production");
        then.status(500);
    });

    let local = Settings::new().with("spring:cloud:config:uri", server.base_url());
    let settings = load(local.clone(), "Production").await.unwrap();

    mock.assert_hits(1);
    assert_eq!(settings, local);
}

#[tokio::test]
async fn test_unreachable_server_is_ignored_without_fail_fast() {
    let local = Settings::new()
        .with("spring:cloud:config:uri", "http://127.0.0.1:1")
        .with("spring:cloud:config:timeout", "500");
    let settings = load(local.clone(), "Production").await.unwrap();
    assert_eq!(settings, local);
}

#[tokio::test]
async fn test_fail_fast_surfaces_the_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/bootcamp-webapi/Production");
        then.status(503);
    });

    let local = Settings::new()
        .with("spring:cloud:config:uri", server.base_url())
        .with("spring:cloud:config:failFast", "true");

    let result = load(local, "Production").await;
    assert!(matches!(result, Err(BootcampError::ConfigServerError { .. })));
}

#[tokio::test]
async fn test_fail_fast_retries_before_giving_up() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/bootcamp-webapi/Production");
        then.status(500);
    });

    let local = Settings::new()
        .with("spring:cloud:config:uri", server.base_url())
        .with("spring:cloud:config:failFast", "true")
        .with("spring:cloud:config:retry:enabled", "true")
        .with("spring:cloud:config:retry:maxAttempts", "3")
        .with("spring:cloud:config:retry:initialInterval", "10")
        .with("spring:cloud:config:retry:maxInterval", "20");

    let result = load(local, "Production").await;

    assert!(result.is_err());
    mock.assert_hits(3);
}

#[tokio::test]
async fn test_retry_is_ignored_without_fail_fast() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/bootcamp-webapi/Production");
        then.status(500);
    });

    let local = Settings::new()
        .with("spring:cloud:config:uri", server.base_url())
        .with("spring:cloud:config:retry:enabled", "true")
        .with("spring:cloud:config:retry:initialInterval", "10");

    assert!(load(local, "Production").await.is_ok());
    mock.assert_hits(1);
}

#[tokio::test]
async fn test_label_name_and_credentials_are_sent() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/orders/Staging/release(_)2024")
            .header_exists("authorization");
        then.status(200).json_body(serde_json::json!({
            "name": "orders",
            "profiles": ["Staging"],
            "propertySources": [{"name": "orders.yml", "source": {"orders.limit": 10}}]
        }));
    });

    let local = Settings::new()
        .with("spring:cloud:config:uri", server.base_url())
        .with("spring:cloud:config:name", "orders")
        .with("spring:cloud:config:env", "Staging")
        .with("spring:cloud:config:label", "release/2024")
        .with("spring:cloud:config:username", "config")
        .with("spring:cloud:config:password", "s3cret");

    let settings = load(local, "Production").await.unwrap();

    mock.assert();
    assert_eq!(settings.get_parsed::<u32>("orders:limit").unwrap(), Some(10));
}

#[tokio::test]
async fn test_second_uri_is_tried_when_first_fails() {
    let broken = MockServer::start();
    let healthy = MockServer::start();
    let broken_mock = broken.mock(|when, then| {
        when.method(GET).path("/bootcamp-webapi/Production");
        then.status(500);
    });
    let healthy_mock = healthy.mock(|when, then| {
        when.method(GET).path("/bootcamp-webapi/Production");
        then.status(200).json_body(environment_body());
    });

    let local = Settings::new()
        .with("spring:cloud:config:uri", format!("{}, {}", broken.base_url(), healthy.base_url()))
        .with("spring:cloud:config:failFast", "true");

    let settings = load(local, "Production").await.unwrap();

    broken_mock.assert();
    healthy_mock.assert();
    assert_eq!(settings.get("bootcamp:owner"), Some("platform"));
}

#[tokio::test]
async fn test_disabled_client_makes_no_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET);
        then.status(200).json_body(environment_body());
    });

    let local = Settings::new()
        .with("spring:cloud:config:uri", server.base_url())
        .with("spring:cloud:config:enabled", "false");

    let settings = load(local.clone(), "Production").await.unwrap();

    mock.assert_hits(0);
    assert_eq!(settings, local);
}

#[tokio::test]
async fn test_bound_service_uses_oauth_token() {
    let server = MockServer::start();
    let token = server.mock(|when, then| {
        when.method(POST)
            .path("/oauth/token")
            .body_contains("grant_type=client_credentials");
        then.status(200)
            .json_body(serde_json::json!({"access_token": "abc123", "token_type": "bearer"}));
    });
    let config = server.mock(|when, then| {
        when.method(GET)
            .path("/bootcamp-webapi/Production")
            .header("authorization", "Bearer abc123");
        then.status(200).json_body(environment_body());
    });

    let local = Settings::new()
        .with("vcap:services:p-config-server:0:credentials:uri", server.base_url())
        .with("vcap:services:p-config-server:0:credentials:client_id", "client")
        .with("vcap:services:p-config-server:0:credentials:client_secret", "secret")
        .with(
            "vcap:services:p-config-server:0:credentials:access_token_uri",
            server.url("/oauth/token"),
        );

    let settings = load(local, "Production").await.unwrap();

    token.assert();
    config.assert();
    assert_eq!(settings.get("bootcamp:greeting"), Some("hello"));
}

#[tokio::test]
async fn test_bad_retry_multiplier_is_a_config_error() {
    let local = Settings::new()
        .with("spring:cloud:config:uri", "http://127.0.0.1:1")
        .with("spring:cloud:config:retry:multiplier", "-1");

    let result = load(local, "Production").await;

    assert!(matches!(
        result,
        Err(BootcampError::InvalidConfigValueError { ref field, .. })
            if field == "spring:cloud:config:retry:multiplier"
    ));
}
