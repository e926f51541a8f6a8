//! End-to-end tests of CSRF protection through a pipeline.

use rustapi_csrf::{
    CookieOptions, CsrfConfig, CsrfPlugin, CsrfToken, CsrfValidator, HmacSha256, Secret,
    TokenCrypto,
};
use rustapi_pipeline::{
    CookieParser, IntoResponse, Pipeline, PipelineError, Request, Response, TestClient,
    TestRequest, TestResponse,
};
use serde_json::Value;

fn protected(config: CsrfConfig) -> TestClient {
    let pipeline = Pipeline::new()
        .register(CookieParser)
        .unwrap()
        .register(CsrfPlugin::new(config))
        .unwrap()
        .handler(|_req: Request| async { "handled" });
    TestClient::new(pipeline)
}

fn token_of(response: &TestResponse) -> String {
    response
        .cookie("csrfToken")
        .map(|c| c.value().to_string())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_post_get_scenario() {
    let client = protected(CsrfConfig::new("s1"));

    // POST without cookies: rejected, pair issued
    let rejected = client.post("/submit").await;
    rejected.assert_status(400);
    assert!(rejected.text().contains("Invalid CSRF token provided."));

    let cookies = rejected.set_cookies();
    assert_eq!(cookies.len(), 2);
    let token = rejected.cookie("csrfToken").unwrap();
    let checksum = rejected.cookie("csrfChecksum").unwrap();
    assert_ne!(token.http_only(), Some(true));
    assert_eq!(checksum.http_only(), Some(true));
    assert!(HmacSha256::default().verify_checksum(
        token.value(),
        checksum.value(),
        &Secret::new("s1")
    ));

    // Retry with the issued cookies and the token echoed back
    let accepted = client
        .request(
            TestRequest::post("/submit")
                .cookies_from(&rejected)
                .header("x-csrf-token", token.value()),
        )
        .await;
    accepted.assert_status(200);
    assert_eq!(accepted.text(), "handled");
    assert!(accepted.set_cookies().is_empty());

    // GET without anything: allowed, pair issued proactively
    let get = client.get("/").await;
    get.assert_status(200);
    assert_eq!(get.text(), "handled");
    assert_eq!(get.set_cookies().len(), 2);
    assert!(get.cookie("csrfToken").is_some());
    assert!(get.cookie("csrfChecksum").is_some());
}

#[tokio::test]
async fn test_header_priority() {
    let client = protected(CsrfConfig::new("s1"));
    let seed = client.get("/").await;
    let token = token_of(&seed);

    let headers = ["csrf-token", "xsrf-token", "x-csrf-token", "x-xsrf-token"];
    for (winner_index, _) in headers.iter().enumerate() {
        let mut req = TestRequest::post("/").cookies_from(&seed);
        for (index, header) in headers.iter().enumerate() {
            let value = if index == winner_index {
                token.clone()
            } else {
                format!("wrong-{index}")
            };
            req = req.header(header, &value);
        }

        let response = client.request(req).await;
        let expected = if winner_index == 0 { 200 } else { 400 };
        response.assert_status(expected);
    }
}

#[tokio::test]
async fn test_multi_value_header_uses_first_entry() {
    let client = protected(CsrfConfig::new("s1"));
    let seed = client.get("/").await;
    let token = token_of(&seed);

    let first_good = client
        .request(
            TestRequest::post("/")
                .cookies_from(&seed)
                .append_header("x-csrf-token", &token)
                .append_header("x-csrf-token", "wrong"),
        )
        .await;
    first_good.assert_status(200);

    let first_bad = client
        .request(
            TestRequest::post("/")
                .cookies_from(&seed)
                .append_header("x-csrf-token", "wrong")
                .append_header("x-csrf-token", &token),
        )
        .await;
    first_bad.assert_status(400);
}

#[tokio::test]
async fn test_forged_token_is_rejected_then_recovers() {
    let client = protected(CsrfConfig::new("s1"));
    let seed = client.get("/").await;

    let forged = client
        .request(
            TestRequest::put("/item")
                .cookies_from(&seed)
                .header("csrf-token", "forged"),
        )
        .await;
    forged.assert_status(400);
    assert_eq!(forged.set_cookies().len(), 2);
    assert_ne!(token_of(&forged), token_of(&seed));

    let retry = client
        .request(
            TestRequest::put("/item")
                .cookies_from(&forged)
                .header("csrf-token", &token_of(&forged)),
        )
        .await;
    retry.assert_status(200);
}

#[tokio::test]
async fn test_corrupted_checksum_cookie_recovers() {
    let client = protected(CsrfConfig::new("s1"));
    let seed = client.get("/").await;
    let token = token_of(&seed);

    let corrupted = client
        .request(
            TestRequest::delete("/item")
                .cookie("csrfToken", &token)
                .cookie("csrfChecksum", "garbage")
                .header("csrf-token", &token),
        )
        .await;
    corrupted.assert_status(400);

    let healed = client
        .request(
            TestRequest::delete("/item")
                .cookies_from(&corrupted)
                .header("csrf-token", &token_of(&corrupted)),
        )
        .await;
    healed.assert_status(200);
}

#[tokio::test]
async fn test_error_body_uses_configured_message() {
    let client = protected(CsrfConfig::new("s1").error_message("Bad token, try again."));

    let response = client.post("/").await;

    response.assert_status(400);
    let body: Value = response.json().unwrap();
    assert_eq!(body["error"]["type"], "csrf_invalid");
    assert_eq!(body["error"]["message"], "Bad token, try again.");
}

#[tokio::test]
async fn test_custom_ignore_methods_and_cookie_names() {
    let client = protected(
        CsrfConfig::new("s1")
            .ignore_methods(["get", "post"])
            .token_key("XSRF-TOKEN")
            .checksum_key("XSRF-CHECK"),
    );

    let post = client.post("/").await;
    post.assert_status(200);
    assert!(post.cookie("XSRF-TOKEN").is_some());
    assert!(post.cookie("XSRF-CHECK").is_some());

    let head = client.request(TestRequest::new(http::Method::HEAD, "/")).await;
    head.assert_status(400);
}

#[tokio::test]
async fn test_cookie_options_keep_checksum_http_only() {
    let client = protected(
        CsrfConfig::new("s1").cookie(
            CookieOptions::new()
                .path("/app")
                .secure(true)
                .http_only(false),
        ),
    );

    let response = client.get("/app").await;

    let token = response.cookie("csrfToken").unwrap();
    let checksum = response.cookie("csrfChecksum").unwrap();
    assert_eq!(token.path(), Some("/app"));
    assert_eq!(token.secure(), Some(true));
    assert_ne!(token.http_only(), Some(true));
    assert_eq!(checksum.path(), Some("/app"));
    assert_eq!(checksum.http_only(), Some(true));
    assert_eq!(checksum.same_site(), Some(cookie::SameSite::Strict));
}

#[tokio::test]
async fn test_handler_sees_current_token() {
    let pipeline = Pipeline::new()
        .register(CookieParser)
        .unwrap()
        .register(CsrfPlugin::new(CsrfConfig::new("s1")))
        .unwrap()
        .handler(|req: Request| async move {
            CsrfToken::from_request(&req).map(|token| token.to_string())
        });
    let client = TestClient::new(pipeline);

    let first = client.get("/form").await;
    assert_eq!(first.text(), token_of(&first));

    let second = client
        .request(TestRequest::get("/form").cookies_from(&first))
        .await;
    assert_eq!(second.text(), token_of(&first));
    assert!(second.set_cookies().is_empty());
}

async fn manually_checked(req: Request) -> Response {
    let Some(validator) = req.state().get::<CsrfValidator>().cloned() else {
        return rustapi_pipeline::ApiError::internal("CSRF validator missing").into_response();
    };
    let cookies = match validator.validate(&req).into_result() {
        Ok(cookies) => cookies,
        Err(rejected) => return rejected,
    };

    let mut response = "checked".into_response();
    cookies.apply(&mut response);
    response
}

#[tokio::test]
async fn test_manual_validation_mode() {
    let pipeline = Pipeline::new()
        .register(CookieParser)
        .unwrap()
        .register(CsrfPlugin::new(
            CsrfConfig::new("s1").validate_on_request(false),
        ))
        .unwrap()
        .handler(manually_checked);
    assert!(pipeline.decoration::<CsrfValidator>().is_some());
    let client = TestClient::new(pipeline);

    let rejected = client.post("/").await;
    rejected.assert_status(400);
    assert_eq!(rejected.set_cookies().len(), 2);

    let accepted = client
        .request(
            TestRequest::post("/")
                .cookies_from(&rejected)
                .header("xsrf-token", &token_of(&rejected)),
        )
        .await;
    accepted.assert_status(200);
    assert_eq!(accepted.text(), "checked");
}

#[tokio::test]
async fn test_manual_mode_installs_no_layer() {
    let pipeline = Pipeline::new()
        .register(CookieParser)
        .unwrap()
        .register(CsrfPlugin::new(
            CsrfConfig::new("s1").validate_on_request(false),
        ))
        .unwrap()
        .handler(|_req: Request| async { "unchecked" });
    let client = TestClient::new(pipeline);

    let response = client.post("/").await;

    response.assert_status(200);
    assert!(response.set_cookies().is_empty());
}

#[test]
fn test_double_registration_fails() {
    let err = Pipeline::new()
        .register(CookieParser)
        .unwrap()
        .register(CsrfPlugin::new(CsrfConfig::new("s1")))
        .unwrap()
        .register(CsrfPlugin::new(CsrfConfig::new("s2")))
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::AlreadyRegistered {
            plugin: "rustapi-csrf"
        }
    ));
}

#[test]
fn test_cookie_parser_is_required() {
    let err = Pipeline::new()
        .register(CsrfPlugin::new(CsrfConfig::new("s1")))
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::MissingDependency {
            plugin: "rustapi-csrf",
            dependency: "rustapi-cookies"
        }
    ));
}

#[test]
fn test_invalid_config_fails_registration() {
    let err = Pipeline::new()
        .register(CookieParser)
        .unwrap()
        .register(CsrfPlugin::new(CsrfConfig::new("")))
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "plugin `rustapi-csrf` failed to register: option `secret` must be a non-empty string"
    );
}

#[test]
fn test_unsendable_cookie_options_fail_registration() {
    let err = Pipeline::new()
        .register(CookieParser)
        .unwrap()
        .register(CsrfPlugin::new(
            CsrfConfig::new("s1").cookie(CookieOptions::new().path("/a\nb")),
        ))
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Plugin {
            plugin: "rustapi-csrf",
            ..
        }
    ));
    assert!(err.to_string().contains("cookie option `path` is invalid"));
}

#[tokio::test]
async fn test_stale_token_cookie_is_refreshed_on_success() {
    let client = protected(CsrfConfig::new("s1"));
    let seed = client.get("/").await;
    let token = token_of(&seed);
    let checksum = seed.cookie("csrfChecksum").unwrap();

    let response = client
        .request(
            TestRequest::post("/")
                .cookie("csrfToken", "stale")
                .cookie("csrfChecksum", checksum.value())
                .header("csrf-token", &token),
        )
        .await;

    response.assert_status(200);
    assert_eq!(response.set_cookies().len(), 2);
    assert_ne!(token_of(&response), "stale");
}

#[test]
fn test_pipelines_register_independently() {
    let build = || {
        Pipeline::new()
            .register(CookieParser)
            .and_then(|p| p.register(CsrfPlugin::new(CsrfConfig::new("s1"))))
    };

    assert!(build().unwrap().has_plugin(CsrfPlugin::NAME));
    assert!(build().unwrap().has_plugin(CsrfPlugin::NAME));
}
