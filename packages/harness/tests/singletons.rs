//! Tests against the process-wide application and router.

use std::sync::LazyLock;

use http_harness::{
    Application, HarnessConfig, ResponseAssertions as _, RouteManifest, Router, StatusCode,
    TestSuite, app::lock, container::Logger,
};
use pretty_assertions::assert_eq;
use serial_test::serial;

static SUITE: LazyLock<TestSuite> = LazyLock::new(|| {
    TestSuite::builder()
        .with_manifest(RouteManifest::new().with_default(|router| {
            router.get("/ping", |_, resp| Ok(resp.with_body("pong")));
        }))
        .with_config(HarnessConfig::default().with_seed(99))
        .build()
        .unwrap()
});

#[test_log::test]
#[serial]
fn default_suite_uses_the_process_wide_instances() {
    let test = SUITE.set_up();

    test.get("/ping").unwrap().assert_text_equals("pong");

    let application = Application::instance();
    let application = lock(&application);
    assert_eq!(application.app().request_log().len(), 1);
    assert!(
        std::sync::Arc::ptr_eq(SUITE.application(), &Application::instance()),
        "suite should share the singleton"
    );
}

#[test_log::test]
#[serial]
fn cleared_router_registry_is_reloaded_by_the_next_request() {
    let test = SUITE.set_up();
    test.get("/ping").unwrap().assert_status(StatusCode::Ok);

    // a reset of the routing registry must be repaired by the next request
    lock(&Router::instance()).clear();

    test.get("/ping").unwrap().assert_text_equals("pong");
    assert_eq!(lock(&Router::instance()).len(), 1);
}

#[test_log::test]
#[serial]
fn scoped_services_do_not_survive_a_dispatch() {
    #[derive(Debug)]
    struct CurrentUser;

    let test = SUITE.set_up();
    lock(&Application::instance())
        .container_mut()
        .bind_scoped(CurrentUser);

    test.get("/ping").unwrap().assert_status(StatusCode::Ok);

    let application = Application::instance();
    let application = lock(&application);
    assert!(!application.container().has::<CurrentUser>());
    assert!(application.container().has::<Logger>());
}

#[test_log::test]
#[serial]
fn logger_comes_from_the_container() {
    SUITE.logger().info("suite logger is wired");
    assert_eq!(SUITE.logger().name(), http_harness::app::LOGGER_NAME);
}
