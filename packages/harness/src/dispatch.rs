//! Dispatcher: runs a request through an [`App`] and hands the response back
//! ready to read.

use crate::{
    Error,
    app::App,
    message::{SyntheticRequest, SyntheticResponse},
};

/// Feed `request` and `response` into the application pipeline.
///
/// The returned response body is rewound to offset 0.
///
/// # Errors
///
/// * [`Error::Handler`] if a handler fails and the application has no error
///   middleware. The failure is passed through untouched.
pub fn dispatch(
    app: &mut App,
    request: SyntheticRequest,
    response: SyntheticResponse,
) -> Result<SyntheticResponse, Error> {
    let mut response = app.process(request, response)?;
    response.body_mut().rewind();
    Ok(response)
}

#[cfg(test)]
mod tests {
    use http_harness_models::{Headers, Method, StatusCode};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        HandlerError,
        environment::{self, Environment},
        message,
        routing::Route,
    };

    fn pair(method: Method, path: &str) -> (SyntheticRequest, SyntheticResponse) {
        let env = environment::build(&Environment::new(), &Headers::new(), method, path);
        message::create(method, &env, &Headers::new(), None, false).unwrap()
    }

    #[test_log::test]
    fn response_body_is_rewound() {
        let mut app = App::new();
        app.add_route(Route::new(Method::Get, "/widgets/{id}", |req, resp| {
            let id = req
                .attribute("id")
                .unwrap_or_default()
                .parse::<u64>()
                .map_err(HandlerError::bad_request)?;
            resp.with_json(&serde_json::json!({"id": id}))
                .map_err(HandlerError::internal_server_error)
        }));
        let (request, response) = pair(Method::Get, "/widgets/42");

        let response = dispatch(&mut app, request, response).unwrap();

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.body().position(), 0);
        assert_eq!(response.text().unwrap(), r#"{"id":42}"#);
    }

    #[test_log::test]
    fn handler_failure_is_not_translated() {
        let mut app = App::new();
        app.add_route(Route::new(Method::Get, "/", |_, _| {
            Err(HandlerError::new("exploded"))
        }));
        let (request, response) = pair(Method::Get, "/");

        let err = dispatch(&mut app, request, response).unwrap_err();

        assert!(matches!(err, Error::Handler { .. }), "{err:?}");
    }
}
