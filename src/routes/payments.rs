use anyhow::Context;
use axum::{Json, extract::State, response::IntoResponse};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    api::stripe::StripeError,
    app_error::{AppError, StdResponse},
    app_state::AppState,
    pricing::{self, PricedLine},
    schema::{cart_items, products},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/create-payment-intent",
        OpenApiRouter::new().routes(utoipa_axum::routes!(create_payment_intent)),
    )
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePaymentIntentReq {
    pub session_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct CreatePaymentIntentRes {
    pub client_secret: String,
}

/// Start a checkout for the session's cart. The charge amount is computed
/// here from the cart and catalog prices; any amount the client sends is
/// ignored.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Payments"],
    request_body = CreatePaymentIntentReq,
    responses(
        (status = 200, description = "Payment intent created", body = StdResponse<CreatePaymentIntentRes, String>),
        (status = 400, description = "Empty cart or nothing priceable"),
        (status = 502, description = "Payment provider unreachable")
    )
)]
async fn create_payment_intent(
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentIntentReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.session_id.trim().is_empty() {
        return Err(AppError::Validation("session_id must not be empty".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let rows: Vec<(i32, i32, Option<Decimal>)> = cart_items::table
        .inner_join(products::table)
        .filter(cart_items::session_id.eq(&body.session_id))
        .select((cart_items::product_id, cart_items::quantity, products::price))
        .get_results(conn)
        .await
        .context("Failed to get cart items")?;

    if rows.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let lines: Vec<PricedLine> = rows
        .into_iter()
        .map(|(product_id, quantity, unit_price)| PricedLine {
            product_id,
            quantity,
            unit_price,
        })
        .collect();
    let totals = pricing::compute_totals(&lines);

    if totals.total <= Decimal::ZERO {
        return Err(AppError::Validation(
            "cart contains no priceable items".into(),
        ));
    }

    let amount_minor = pricing::to_minor_units(totals.total)
        .ok_or_else(|| AppError::Validation("cart total is out of range".into()))?;

    let intent = state
        .stripe
        .create_payment_intent(amount_minor, "usd", &body.session_id)
        .await
        .map_err(|err| match err {
            StripeError::Http(_) => AppError::ServiceUnreachable("Stripe".into()),
            other => AppError::Other(other.into()),
        })?;

    tracing::info!(
        "created payment intent {} for session {} ({} minor units)",
        intent.id,
        body.session_id,
        amount_minor
    );

    let client_secret = intent
        .client_secret
        .context("Payment intent response carried no client secret")?;

    Ok(StdResponse {
        data: Some(CreatePaymentIntentRes { client_secret }),
        message: Some("Created payment intent successfully"),
    })
}
