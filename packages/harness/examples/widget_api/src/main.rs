#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Widget API example.
//!
//! Registers a `Widget` route set backed by an in-memory store, then drives a
//! create/read/update/delete cycle through the harness, printing a waypoint
//! after each step.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
};

use http_harness::{
    HandlerError, ModelTest, ResponseAssertions as _, RouteManifest, Router, StatusCode,
    TestSuite, faker::FakerError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
enum ExampleError {
    #[error(transparent)]
    Harness(#[from] http_harness::Error),
    #[error(transparent)]
    Faker(#[from] FakerError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Widget {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct NewWidget {
    name: String,
}

#[derive(Debug, Default)]
struct WidgetStore {
    next_id: u64,
    widgets: BTreeMap<u64, Widget>,
}

type SharedStore = Arc<Mutex<WidgetStore>>;

struct WidgetApiTest;

impl ModelTest for WidgetApiTest {
    const MODEL_NAME: &'static str = "Widget";
}

fn widget_id(request: &http_harness::SyntheticRequest) -> Result<u64, HandlerError> {
    request
        .attribute("id")
        .unwrap_or_default()
        .parse()
        .map_err(HandlerError::bad_request)
}

fn widget_routes(store: &SharedStore, router: &mut Router) {
    let list = store.clone();
    let create = store.clone();
    let read = store.clone();
    let update = store.clone();
    let delete = store.clone();

    router
        .get("/widgets", move |_, resp| {
            let store = list.lock().unwrap_or_else(PoisonError::into_inner);
            Ok(resp.with_json(&store.widgets.values().collect::<Vec<_>>())?)
        })
        .post("/widgets", move |req, resp| {
            let new = req.json::<NewWidget>()?;
            let mut store = create.lock().unwrap_or_else(PoisonError::into_inner);
            store.next_id += 1;
            let widget = Widget {
                id: store.next_id,
                name: new.name,
            };
            store.widgets.insert(widget.id, widget.clone());
            log::debug!("created widget {}", widget.id);
            Ok(resp.with_status(StatusCode::Created).with_json(&widget)?)
        })
        .get("/widgets/{id}", move |req, resp| {
            let id = widget_id(req)?;
            let store = read.lock().unwrap_or_else(PoisonError::into_inner);
            let widget = store
                .widgets
                .get(&id)
                .ok_or_else(|| HandlerError::not_found(format!("Widget {id} not found")))?;
            Ok(resp.with_json(widget)?)
        })
        .put("/widgets/{id}", move |req, resp| {
            let id = widget_id(req)?;
            let changes = req.json::<NewWidget>()?;
            let mut store = update.lock().unwrap_or_else(PoisonError::into_inner);
            let widget = store
                .widgets
                .get_mut(&id)
                .ok_or_else(|| HandlerError::not_found(format!("Widget {id} not found")))?;
            widget.name = changes.name;
            Ok(resp.with_json(widget)?)
        })
        .delete("/widgets/{id}", move |req, resp| {
            let id = widget_id(req)?;
            let mut store = delete.lock().unwrap_or_else(PoisonError::into_inner);
            store
                .widgets
                .remove(&id)
                .ok_or_else(|| HandlerError::not_found(format!("Widget {id} not found")))?;
            Ok(resp.with_status(StatusCode::NoContent))
        });
}

fn main() -> Result<(), ExampleError> {
    env_logger::init();

    let store = SharedStore::default();
    let routes_store = store.clone();

    let suite = TestSuite::builder()
        .with_manifest(
            RouteManifest::new()
                .with_model(WidgetApiTest::MODEL_NAME, move |router| {
                    widget_routes(&routes_store, router);
                })
                .with_extra(|router| {
                    router.get("/health", |_, resp| Ok(resp.with_body("ok")));
                }),
        )
        .with_model::<WidgetApiTest>()
        .build()?;

    {
        let application = suite.application();
        let mut application = application.lock().unwrap_or_else(PoisonError::into_inner);
        application.app_mut().add_error_middleware();
    }

    let mut test = suite.set_up();
    test.set_request_header("HTTP_X_CLIENT", "widget_api_example");

    test.get("/health")?.assert_text_equals("ok");
    test.waypoint("health");

    let name = format!("{} {}", suite.faker().word()?, suite.faker().company_suffix()?);
    let created = test.post("/widgets", &serde_json::json!({ "name": name }))?;
    created.assert_status(StatusCode::Created);
    let widget = created.json::<Widget>()?;
    suite.logger().info(format!("created {widget:?}"));
    test.waypoint("create");

    test.get(&format!("/widgets/{}", widget.id))?
        .assert_status(StatusCode::Ok)
        .assert_json_equals(&widget);
    test.waypoint("read");

    let renamed = suite.faker().catch_phrase()?;
    test.put(
        &format!("/widgets/{}", widget.id),
        &serde_json::json!({ "name": renamed }),
    )?
    .assert_json_contains(&serde_json::json!({ "name": renamed }));
    test.waypoint("update");

    test.delete(&format!("/widgets/{}", widget.id))?
        .assert_status(StatusCode::NoContent);
    test.get(&format!("/widgets/{}", widget.id))?
        .assert_status(StatusCode::NotFound);
    test.waypoint("delete");

    let remaining = test.get("/widgets")?.json::<Vec<Widget>>()?;
    println!("{} widget(s) left in the store", remaining.len());

    Ok(())
}
