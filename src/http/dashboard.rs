use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

use super::response::{MessageResponse, PageRedirect, RedirectBody};
use super::routes::RouteModule;
use crate::app::AppContext;
use crate::billing::{CheckoutOutcome, Price};
use crate::dashboard::PricingPage;
use crate::error::{DashboardError, Result};
use crate::session::RequestContext;
use crate::usage::PageLoad;

/// Pricing page and checkout button, under `/dashboard`.
pub struct DashboardModule;

impl RouteModule for DashboardModule {
    fn routes(&self) -> Router<AppContext> {
        Router::new()
            .route("/pricing", get(pricing_page))
            .route("/checkout", post(start_checkout))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/dashboard")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCheckoutRequest {
    pub price_id: String,
}

async fn pricing_page(State(ctx): State<AppContext>, request: RequestContext) -> Result<Response> {
    let session = ctx.sessions.get_session(&request).await?;

    match ctx.usage.load_dashboard_data(session.as_ref()).await {
        PageLoad::Redirect {
            destination,
            permanent,
        } => Ok(PageRedirect {
            location: destination,
            permanent,
        }
        .into_response()),
        PageLoad::Data(data) => {
            let subscription = session.as_ref().and_then(|s| s.subscription.as_ref());
            let page = PricingPage::build(
                data,
                subscription,
                &ctx.catalog,
                &ctx.portal,
                &ctx.indicators,
            );
            Ok(Json(page).into_response())
        }
    }
}

async fn start_checkout(
    State(ctx): State<AppContext>,
    request: RequestContext,
    Json(body): Json<StartCheckoutRequest>,
) -> Result<Response> {
    let Some(session) = ctx.sessions.get_session(&request).await? else {
        return Err(DashboardError::unauthorized("Sign in to change your plan"));
    };

    let price = Price::from_catalog(&ctx.catalog, &body.price_id)?;

    let outcome = ctx
        .checkout
        .initiate_tracked(
            &price,
            session.subscription.as_ref(),
            session.customer(),
            &ctx.indicators,
        )
        .await;

    match outcome {
        CheckoutOutcome::Dashboard(navigation) | CheckoutOutcome::Checkout { navigation, .. } => {
            Ok(Json(RedirectBody {
                redirect: navigation.location().to_string(),
            })
            .into_response())
        }
        CheckoutOutcome::InProgress => Err(DashboardError::conflict(format!(
            "Checkout for {} is already in progress",
            price.id
        ))),
        CheckoutOutcome::Failed { message } => Ok(MessageResponse {
            status: StatusCode::BAD_GATEWAY,
            error: message,
        }
        .into_response()),
    }
}
