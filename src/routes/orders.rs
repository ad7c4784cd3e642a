use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{
    ExpressionMethods, QueryDsl, QueryResult, SelectableHelper, result::DatabaseErrorKind,
};
use diesel_async::{AsyncConnection, RunQueryDsl};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    aliases::DieselError,
    api::stripe::{self, StripeError},
    app_error::{AppError, StdResponse},
    app_state::AppState,
    models::{
        CartItemEntity, CreateOrderEntity, CreateOrderItemEntity, OrderEntity, OrderItemEntity,
        OrderStatus,
    },
    pricing::{self, PricedLine},
    schema::{cart_items, order_items, orders, products},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(create_order))
            .routes(utoipa_axum::routes!(get_order_by_number)),
    )
}

#[derive(Deserialize, ToSchema)]
struct CreateOrderReq {
    order_number: String,
    session_id: String,
    #[serde(default = "default_payment_method")]
    payment_method: String,
    payment_intent_id: String,
    // Clients historically also sent subtotal/tax/total/status here. Those
    // fields are not read: pricing is recomputed from the cart and the
    // status always starts at `pending`.
}

fn default_payment_method() -> String {
    "stripe".to_string()
}

#[derive(Serialize, ToSchema)]
struct CreateOrderRes {
    order: OrderEntity,
    order_items: Vec<OrderItemEntity>,
}

/// Materialize the session's cart into an immutable order.
///
/// The referenced payment intent is verified with the payment provider
/// first; the snapshot (order row, one line per cart item, cart clear)
/// is then applied in a single transaction, so a failure part-way leaves
/// neither a dangling order nor a prematurely cleared cart.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    request_body = CreateOrderReq,
    responses(
        (status = 200, description = "Created order successfully", body = StdResponse<CreateOrderRes, String>),
        (status = 400, description = "Invalid input, empty cart, or reused order number"),
        (status = 402, description = "Payment has not succeeded"),
        (status = 502, description = "Payment provider unreachable")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.order_number.trim().is_empty() {
        return Err(AppError::Validation("order_number must not be empty".into()));
    }
    if body.session_id.trim().is_empty() {
        return Err(AppError::Validation("session_id must not be empty".into()));
    }
    if body.payment_intent_id.trim().is_empty() {
        return Err(AppError::Validation(
            "payment_intent_id must not be empty".into(),
        ));
    }

    // Payment gate: an order is never created for a charge the provider
    // does not report as succeeded.
    let intent = state
        .stripe
        .retrieve_payment_intent(&body.payment_intent_id)
        .await
        .map_err(|err| match err {
            StripeError::Http(_) => AppError::ServiceUnreachable("Stripe".into()),
            StripeError::Api { status: 404, .. } => {
                AppError::PaymentVerification("unknown payment intent".into())
            }
            other => AppError::Other(other.into()),
        })?;

    if intent.status != stripe::STATUS_SUCCEEDED {
        return Err(AppError::PaymentVerification(format!(
            "payment intent {} is '{}', expected '{}'",
            body.payment_intent_id,
            intent.status,
            stripe::STATUS_SUCCEEDED
        )));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let session_id = body.session_id.clone();
    let (order, order_items) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let cart_rows: Vec<(CartItemEntity, Option<Decimal>)> = cart_items::table
                    .inner_join(products::table)
                    .filter(cart_items::session_id.eq(&session_id))
                    .select((CartItemEntity::as_select(), products::price))
                    .get_results(conn)
                    .await
                    .context("Failed to get cart items")?;

                if cart_rows.is_empty() {
                    return Err(AppError::EmptyCart);
                }

                let lines: Vec<PricedLine> = cart_rows
                    .iter()
                    .map(|(item, price)| PricedLine {
                        product_id: item.product_id,
                        quantity: item.quantity,
                        unit_price: *price,
                    })
                    .collect();
                let totals = pricing::compute_totals(&lines);

                let order: OrderEntity = diesel::insert_into(orders::table)
                    .values(CreateOrderEntity {
                        order_number: body.order_number,
                        session_id: session_id.clone(),
                        subtotal: totals.subtotal,
                        tax: totals.tax,
                        total: totals.total,
                        status: OrderStatus::Pending.to_string(),
                        payment_method: body.payment_method,
                        payment_intent_id: body.payment_intent_id,
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .map_err(|err| match err {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                            AppError::Validation(
                                "order number or payment intent already used".into(),
                            )
                        }
                        other => AppError::Other(
                            anyhow::Error::new(other).context("Failed to create order"),
                        ),
                    })?;

                // Snapshot each line's unit price; later catalog edits must
                // not change what this order says was paid.
                let new_items: Vec<CreateOrderItemEntity> = cart_rows
                    .iter()
                    .map(|(item, price)| CreateOrderItemEntity {
                        order_id: order.id,
                        product_id: item.product_id,
                        quantity: item.quantity,
                        unit_price: *price,
                    })
                    .collect();

                let order_items: Vec<OrderItemEntity> = diesel::insert_into(order_items::table)
                    .values(new_items)
                    .returning(OrderItemEntity::as_returning())
                    .get_results(conn)
                    .await
                    .context("Failed to create order items")?;

                diesel::delete(cart_items::table.filter(cart_items::session_id.eq(&session_id)))
                    .execute(conn)
                    .await
                    .context("Failed to clear cart")?;

                Ok::<(OrderEntity, Vec<OrderItemEntity>), AppError>((order, order_items))
            })
        })
        .await?;

    tracing::info!(
        "materialized order {} for session {} (total {})",
        order.order_number,
        order.session_id,
        order.total
    );

    Ok(StdResponse {
        data: Some(CreateOrderRes { order, order_items }),
        message: Some("Created order successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct GetOrderRes {
    order: OrderEntity,
    order_items: Vec<OrderItemEntity>,
}

/// Fetch an order by its external-facing order number.
#[utoipa::path(
    get,
    path = "/{order_number}",
    tags = ["Orders"],
    params(
        ("order_number" = String, Path, description = "External order number")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<GetOrderRes, String>),
        (status = 404, description = "Order not found")
    )
)]
async fn get_order_by_number(
    Path(order_number): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: QueryResult<OrderEntity> = orders::table
        .filter(orders::order_number.eq(&order_number))
        .get_result(conn)
        .await;

    let order = match order {
        Ok(order) => order,
        Err(DieselError::NotFound) => return Err(AppError::NotFound),
        Err(err) => return Err(AppError::Other(err.into())),
    };

    let order_items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    Ok(StdResponse {
        data: Some(GetOrderRes { order, order_items }),
        message: Some("Get order successfully"),
    })
}
