//! In-process requests against the dashboard router.
//!
//! Requests go through `tower::ServiceExt::oneshot`; no server is started.
//! Besides status and header checks, [`ScenarioAssert`] knows the dashboard's
//! own response shapes: the checkout `{redirect}` body, the `{error}` body,
//! and the pricing page's tier cards.
//!
//! # Example
//!
//! ```rust,ignore
//! use dashboard_billing::testing;
//!
//! testing::post(app, "/dashboard/checkout")
//!     .session_cookie("dashboard_session", &session_id)
//!     .price_id("price_123")
//!     .execute()
//!     .await
//!     .assert_checkout_redirect("/dashboard")
//!     .await;
//! ```

use axum::{
    Router,
    body::Body,
    http::{HeaderName, Method, Request, StatusCode, header},
    response::Response,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower::ServiceExt;

/// One request to run against a router.
pub struct Scenario {
    app: Router,
    request: Request<Body>,
}

impl Scenario {
    pub fn new(app: Router) -> Self {
        Self {
            app,
            request: Request::builder()
                .method(Method::GET)
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        *self.request.method_mut() = method;
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        *self.request.uri_mut() = uri.parse().unwrap();
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.request.headers_mut().insert(
            HeaderName::from_bytes(key.as_bytes()).unwrap(),
            value.parse().unwrap(),
        );
        self
    }

    pub fn bearer_token(self, token: &str) -> Self {
        self.header("Authorization", &format!("Bearer {}", token))
    }

    pub fn session_cookie(self, name: &str, session_id: &str) -> Self {
        self.header("Cookie", &format!("{}={}", name, session_id))
    }

    pub fn json_body<T: Serialize>(mut self, body: &T) -> Self {
        let json = serde_json::to_string(body).unwrap();
        *self.request.body_mut() = Body::from(json);
        self.request
            .headers_mut()
            .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        self
    }

    /// Body of a checkout button click: `{"priceId": ...}`.
    pub fn price_id(self, price_id: &str) -> Self {
        self.json_body(&json!({ "priceId": price_id }))
    }

    pub async fn execute(self) -> ScenarioAssert {
        let response = self.app.oneshot(self.request).await.unwrap();
        ScenarioAssert { response }
    }
}

/// Assertions on a router response.
pub struct ScenarioAssert {
    response: Response,
}

impl ScenarioAssert {
    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.response.status(),
            expected,
            "Expected status {}, got {}",
            expected,
            self.response.status()
        );
        self
    }

    pub fn assert_ok(self) -> Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn assert_bad_request(self) -> Self {
        self.assert_status(StatusCode::BAD_REQUEST)
    }

    pub fn assert_unauthorized(self) -> Self {
        self.assert_status(StatusCode::UNAUTHORIZED)
    }

    pub fn assert_conflict(self) -> Self {
        self.assert_status(StatusCode::CONFLICT)
    }

    pub fn assert_bad_gateway(self) -> Self {
        self.assert_status(StatusCode::BAD_GATEWAY)
    }

    /// A `302 Found` page redirect to `location`.
    pub fn assert_redirect(self, location: &str) -> Self {
        self.assert_status(StatusCode::FOUND)
            .assert_header("location", location)
    }

    pub fn assert_header(self, key: &str, expected: &str) -> Self {
        let value = self
            .response
            .headers()
            .get(key)
            .unwrap_or_else(|| panic!("Header '{}' not found", key))
            .to_str()
            .unwrap();
        assert_eq!(value, expected, "Header '{}' value mismatch", key);
        self
    }

    pub fn assert_json(self) -> Self {
        let content_type = self
            .response
            .headers()
            .get(header::CONTENT_TYPE)
            .expect("Content-Type header not found")
            .to_str()
            .unwrap();
        assert!(
            content_type.contains("application/json"),
            "Expected JSON content type, got: {}",
            content_type
        );
        self
    }

    /// Parse the body into `T`.
    pub async fn json<T: for<'de> Deserialize<'de>>(self) -> T {
        let (body, _) = self.body_value().await;
        serde_json::from_value(body).expect("Failed to parse JSON response")
    }

    /// Assert the value at a dotted path (`tiers.1.action.label`).
    pub async fn assert_json_path(self, path: &str, expected: Value) -> Self {
        let (body, this) = self.body_value().await;
        let actual = json_path_get(&body, path)
            .unwrap_or_else(|| panic!("Path '{}' not found in {}", path, body));
        assert_eq!(actual, &expected, "JSON path '{}' value mismatch", path);
        this
    }

    /// A checkout button answer sending the browser to `location`.
    pub async fn assert_checkout_redirect(self, location: &str) -> Self {
        self.assert_ok()
            .assert_json_path("redirect", json!(location))
            .await
    }

    /// An `{error}` body carrying `message`.
    pub async fn assert_error(self, message: &str) -> Self {
        self.assert_json_path("error", json!(message)).await
    }

    /// The pricing page's card for `tier_id` shows `label`, with `loading`
    /// when the card has a checkout button.
    pub async fn assert_tier_action(self, tier_id: &str, label: &str, loading: bool) -> Self {
        let (body, this) = self.body_value().await;
        let card = body["tiers"]
            .as_array()
            .and_then(|tiers| tiers.iter().find(|card| card["id"] == tier_id))
            .unwrap_or_else(|| panic!("No tier card '{}' in {}", tier_id, body));
        let action = &card["action"];
        assert_eq!(action["label"], label, "Tier '{}' label mismatch", tier_id);
        if action["kind"] == "checkout" {
            assert_eq!(action["loading"], loading, "Tier '{}' loading mismatch", tier_id);
        }
        this
    }

    /// The underlying response for custom assertions.
    pub fn response(self) -> Response {
        self.response
    }

    async fn body_value(self) -> (Value, Self) {
        let (parts, body) = self.response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|e| panic!("Body is not JSON ({}): {:?}", e, bytes));
        let response = Response::from_parts(parts, Body::from(bytes));
        (value, Self { response })
    }
}

/// Dotted path lookup; numeric segments index arrays.
fn json_path_get<'a>(json: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(json, |current, part| match part.parse::<usize>() {
        Ok(index) => current.get(index),
        Err(_) => current.get(part),
    })
}

pub fn get(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::GET).uri(uri)
}

pub fn post(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::POST).uri(uri)
}
