use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use http_harness::{
    Application, Error, HandlerError, HarnessConfig, Headers, Method, ModelTest, Payload,
    ResponseAssertions as _, RouteManifest, Router, StatusCode, TestSuite,
    message::APPLICATION_JSON,
    routing::Route,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

struct WidgetTest;

impl ModelTest for WidgetTest {
    const MODEL_NAME: &'static str = "Widget";
}

fn widget_routes(router: &mut Router) {
    router
        .get("/widgets/{id}", |req, resp| {
            let id = req
                .attribute("id")
                .unwrap_or_default()
                .parse::<u64>()
                .map_err(HandlerError::bad_request)?;
            Ok(resp.with_json(&json!({"id": id}))?)
        })
        .post("/widgets", |req, resp| {
            let raw = String::from_utf8_lossy(req.body().contents()).to_string();
            let content_type = req.header("Content-Type").unwrap_or_default().to_string();
            Ok(resp
                .with_status(StatusCode::Created)
                .with_header("X-Raw-Body", raw)
                .with_header("X-Seen-Content-Type", content_type)
                .with_header("X-Body-Length", req.body().len().to_string()))
        })
        .get("/headers", |req, resp| {
            let headers = req.headers().iter().collect::<BTreeMap<_, _>>();
            Ok(resp.with_json(&headers)?)
        })
        .get("/env/{key}", |req, resp| {
            let key = req.attribute("key").unwrap_or_default();
            let value = req.server_params().get_string(key);
            Ok(resp.with_json(&json!({ "value": value }))?)
        })
        .get("/explode", |_, _| {
            Err(HandlerError::internal_server_error("widget store offline"))
        });
}

fn manifest() -> RouteManifest {
    RouteManifest::new()
        .with_model(WidgetTest::MODEL_NAME, widget_routes)
        .with_default(|router| {
            router.get("/", |_, resp| Ok(resp.with_body("default routes")));
        })
        .with_extra(|router| {
            router.get("/health", |_, resp| Ok(resp.with_body("ok")));
        })
}

fn isolated() -> http_harness::fixture::TestSuiteBuilder {
    TestSuite::builder()
        .with_application(Arc::new(Mutex::new(Application::new())))
        .with_router(Arc::new(Mutex::new(Router::new())))
        .with_manifest(manifest())
        .with_config(HarnessConfig::default().with_seed(1234))
}

fn widget_suite() -> TestSuite {
    isolated().with_model::<WidgetTest>().build().unwrap()
}

#[test_log::test]
fn get_widget_returns_its_id() {
    let suite = widget_suite();
    let test = suite.set_up();

    let response = test.get("/widgets/42").unwrap();

    response
        .assert_status(StatusCode::Ok)
        .assert_json_equals(&json!({"id": 42}));
    assert_eq!(response.body().position(), 0);
}

#[test_log::test]
fn post_body_is_exact_json_with_json_content_type() {
    let suite = widget_suite();
    let test = suite.set_up();

    let response = test.post("/widgets", &json!({"name": "foo"})).unwrap();

    response
        .assert_status(StatusCode::Created)
        .assert_header("X-Raw-Body", r#"{"name":"foo"}"#)
        .assert_header("X-Seen-Content-Type", APPLICATION_JSON);
}

#[test_log::test]
fn absent_post_gives_empty_body() {
    let suite = widget_suite();
    let test = suite.set_up();

    let response = test
        .request(Method::Post, "/widgets", None, true, &Headers::new())
        .unwrap();

    response.assert_header("X-Body-Length", "0");
}

#[test_log::test]
fn raw_post_is_written_verbatim() {
    let suite = widget_suite();
    let test = suite.set_up();

    let response = test
        .request(
            Method::Post,
            "/widgets",
            Some(&Payload::from("name=foo")),
            false,
            &Headers::new(),
        )
        .unwrap();

    response
        .assert_header("X-Raw-Body", "name=foo")
        .assert_header("X-Seen-Content-Type", "");
}

#[test_log::test]
fn json_headers_win_over_caller_values() {
    let suite = widget_suite();
    let test = suite.set_up();
    let extra = Headers::from([("Content-Type", "text/xml"), ("Accept", "text/html")]);

    let response = test
        .request(Method::Get, "/headers", None, true, &extra)
        .unwrap();

    let headers = response.json::<BTreeMap<String, String>>().unwrap();
    assert_eq!(headers.get("Content-type").map(String::as_str), Some(APPLICATION_JSON));
    assert_eq!(headers.get("Accept").map(String::as_str), Some(APPLICATION_JSON));
}

#[test_log::test]
fn extra_headers_override_default_headers() {
    let suite = widget_suite();
    let mut test = suite.set_up();
    test.set_request_header("HTTP_X_TENANT", "default-tenant")
        .set_request_header("HTTP_X_TRACE", "t-1");

    let response = test
        .request(
            Method::Get,
            "/headers",
            None,
            false,
            &Headers::from([("http_x_tenant", "override-tenant")]),
        )
        .unwrap();

    response.assert_json_contains(&json!({"X-Tenant": "override-tenant", "X-Trace": "t-1"}));
}

#[test_log::test]
fn default_headers_reach_the_request_only_through_the_environment() {
    let suite = widget_suite();
    let mut test = suite.set_up();
    test.set_request_header("Authorization", "Bearer default");

    for is_json_request in [true, false] {
        let headers = test
            .request(Method::Get, "/headers", None, is_json_request, &Headers::new())
            .unwrap()
            .json::<BTreeMap<String, String>>()
            .unwrap();
        assert_eq!(headers.get("Authorization"), None, "json={is_json_request}");
    }

    test.get("/env/Authorization")
        .unwrap()
        .assert_json_equals(&json!({"value": "Bearer default"}));

    test.request(
        Method::Get,
        "/headers",
        None,
        true,
        &Headers::from([("Authorization", "Bearer extra")]),
    )
    .unwrap()
    .assert_json_contains(&json!({"Authorization": "Bearer extra"}));
}

#[test_log::test]
fn environment_overrides_reach_the_handler() {
    let suite = widget_suite();
    let mut test = suite.set_up();
    test.set_environment_variable("APP_MODE", "test");

    let response = test.get("/env/APP_MODE").unwrap();

    response.assert_json_equals(&json!({"value": "test"}));
}

#[test_log::test]
fn script_name_and_nonce_are_in_the_environment() {
    let suite = widget_suite();
    let test = suite.set_up();

    test.get("/env/SCRIPT_NAME")
        .unwrap()
        .assert_json_equals(&json!({"value": "/index.php"}));

    let nonce = test.get("/env/RAND").unwrap().json::<Value>().unwrap();
    let nonce = nonce["value"].as_str().unwrap().parse::<u32>().unwrap();
    assert!(nonce <= 100_000_000);
}

#[test_log::test]
fn defaults_do_not_leak_between_tests() {
    let suite = widget_suite();

    {
        let mut first = suite.set_up();
        first
            .set_environment_variable("APP_MODE", "first")
            .set_request_header("X-Tenant", "first");
        first
            .get("/env/APP_MODE")
            .unwrap()
            .assert_json_equals(&json!({"value": "first"}));
    }

    let second = suite.set_up();
    second
        .get("/env/APP_MODE")
        .unwrap()
        .assert_json_equals(&json!({"value": null}));
    let headers = second
        .get("/headers")
        .unwrap()
        .json::<BTreeMap<String, String>>()
        .unwrap();
    assert!(!headers.contains_key("X-Tenant"));
}

#[test_log::test]
fn repeated_requests_are_idempotent() {
    let suite = widget_suite();
    let test = suite.set_up();

    let first = test.get("/widgets/7").unwrap();
    let second = test.get("/widgets/7").unwrap();

    assert_eq!(first.status(), second.status());
    assert_eq!(first.text().unwrap(), second.text().unwrap());

    let application = suite.application().lock().unwrap();
    // 5 widget routes + 1 extra, registered once despite two dispatches
    assert_eq!(application.app().routes().len(), 6);
    assert_eq!(application.app().request_log().len(), 1);
}

#[test_log::test]
fn model_routes_are_loaded_for_model_tests() {
    let suite = widget_suite();
    let test = suite.set_up();

    test.get("/widgets/1").unwrap().assert_status(StatusCode::Ok);
    test.get("/health").unwrap().assert_text_equals("ok");
    test.get("/").unwrap().assert_status(StatusCode::NotFound);
}

#[test_log::test]
fn unknown_model_falls_back_to_default_routes() {
    let suite = isolated().with_model_name("Gadget").build().unwrap();
    let test = suite.set_up();

    test.get("/").unwrap().assert_text_equals("default routes");
    test.get("/health").unwrap().assert_text_equals("ok");
    test.get("/widgets/1").unwrap().assert_status(StatusCode::NotFound);
}

#[test_log::test]
fn suites_without_model_use_default_routes() {
    let suite = isolated().build().unwrap();
    let test = suite.set_up();

    test.get("/").unwrap().assert_status(StatusCode::Ok);
}

#[test_log::test]
fn method_mismatch_is_not_allowed() {
    let suite = widget_suite();
    let test = suite.set_up();

    test.delete("/widgets")
        .unwrap()
        .assert_status(StatusCode::MethodNotAllowed)
        .assert_header("Allow", "POST");
}

#[test_log::test]
fn handler_failure_propagates_without_error_middleware() {
    let suite = widget_suite();
    let test = suite.set_up();

    let err = test.get("/explode").unwrap_err();

    match err {
        Error::Handler { method, path, source } => {
            assert_eq!(method, Method::Get);
            assert_eq!(path, "/explode");
            assert_eq!(source.to_string(), "widget store offline");
        }
        other => panic!("Expected handler error, got {other:?}"),
    }
}

#[test_log::test]
fn error_middleware_turns_failures_into_responses() {
    let suite = widget_suite();
    suite
        .application()
        .lock()
        .unwrap()
        .app_mut()
        .add_error_middleware();
    let test = suite.set_up();

    test.get("/explode")
        .unwrap()
        .assert_server_error()
        .assert_json_equals(&json!({"status": 500, "error": "widget store offline"}));

    test.get("/widgets/abc")
        .unwrap()
        .assert_status(StatusCode::BadRequest);
}

#[test_log::test]
fn unencodable_payload_is_a_serialization_error() {
    let suite = widget_suite();
    let test = suite.set_up();
    let mut bad = BTreeMap::new();
    bad.insert((1, 2), "tuple keys");

    let err = test.post("/widgets", &bad).unwrap_err();

    assert!(matches!(err, Error::Serialization(_)), "{err:?}");
    let application = suite.application().lock().unwrap();
    assert!(application.app().request_log().is_empty());
}

#[test_log::test]
fn middleware_sees_the_full_request() {
    let suite = widget_suite();
    suite
        .application()
        .lock()
        .unwrap()
        .app_mut()
        .add_middleware_fn(|req, resp, next| {
            let resp = next.run(req, resp)?;
            Ok(resp.with_header("X-Request-Uri", req.uri().to_string()))
        });
    let test = suite.set_up();

    test.get("/widgets/3?expand=parts")
        .unwrap()
        .assert_header("X-Request-Uri", "http://localhost/widgets/3?expand=parts");
}

#[test_log::test]
fn routes_registered_directly_are_also_dispatched() {
    let suite = widget_suite();
    suite
        .router()
        .lock()
        .unwrap()
        .add_route(Route::new(Method::Get, "/direct", |_, resp| {
            Ok(resp.with_body("direct"))
        }));
    let test = suite.set_up();

    test.get("/direct").unwrap().assert_text_equals("direct");
}
