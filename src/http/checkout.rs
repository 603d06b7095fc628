use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use super::response::JsonResponse;
use super::routes::RouteModule;
use crate::app::AppContext;
use crate::billing::Price;
use crate::error::DashboardError;
use crate::session::RequestContext;

/// Server half of hosted checkout: creates a session and returns its id.
pub struct CheckoutApiModule;

impl RouteModule for CheckoutApiModule {
    fn routes(&self) -> Router<AppContext> {
        Router::new().route("/create-checkout-session", post(create_checkout_session))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/api")
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutSessionBody {
    pub price: Price,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionResponse {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The session's customer is attached when the request is signed in. A user
/// who already has a subscription gets 409 and no new session; only
/// self-serve prices from the catalog are accepted.
async fn create_checkout_session(
    State(ctx): State<AppContext>,
    request: RequestContext,
    Json(body): Json<CreateCheckoutSessionBody>,
) -> JsonResponse<CreateCheckoutSessionResponse> {
    let session = ctx.sessions.get_session(&request).await?;

    if let Some(subscription) = session.as_ref().and_then(|s| s.subscription.as_ref()) {
        return Err(DashboardError::conflict(format!(
            "Subscription already exists ({}); manage it from the dashboard",
            subscription.status
        )));
    }

    let price = Price::from_catalog(&ctx.catalog, &body.price.id)?;
    let checkout = ctx
        .checkout
        .create_session(&price, session.as_ref().map(|s| s.customer()))
        .await?;

    tracing::info!(
        target: "dashboard_billing::checkout",
        price_id = %price.id,
        session_id = %checkout.id,
        "Checkout session created"
    );

    Ok(Json(CreateCheckoutSessionResponse {
        session_id: checkout.id,
        url: checkout.url,
    }))
}
