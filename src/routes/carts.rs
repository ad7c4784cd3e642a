use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper, upsert::excluded};
use diesel_async::RunQueryDsl;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::AppError,
    app_state::AppState,
    models::{CartItemEntity, CreateCartItemEntity, ProductEntity},
    pricing::{self, PricedLine},
    schema::{cart_items, products},
};

/// Session-scoped cart operations. The session id is an opaque token the
/// client generates and holds; it is not an authenticated identity.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/cart",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(add_cart_item))
            .routes(utoipa_axum::routes!(get_cart))
            .routes(utoipa_axum::routes!(update_cart_item, remove_cart_item)),
    )
}

#[derive(Deserialize, ToSchema)]
struct AddCartItemReq {
    session_id: String,
    product_id: i32,
    #[serde(default = "default_quantity")]
    quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// Add a product to the session's cart. Adding a product that is already
/// in the cart increments the existing line's quantity.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Cart"],
    request_body = AddCartItemReq,
    responses(
        (status = 200, description = "Created or incremented cart line", body = CartItemEntity),
        (status = 400, description = "Invalid session id or quantity"),
        (status = 404, description = "Product missing or inactive")
    )
)]
async fn add_cart_item(
    State(state): State<AppState>,
    Json(body): Json<AddCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.session_id.trim().is_empty() {
        return Err(AppError::Validation("session_id must not be empty".into()));
    }
    if body.quantity < 1 {
        return Err(AppError::Validation(format!(
            "quantity must be at least 1, got {}",
            body.quantity
        )));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product_count: i64 = products::table
        .filter(products::id.eq(body.product_id))
        .filter(products::is_active.eq(true))
        .count()
        .get_result(conn)
        .await
        .context("Failed to check product")?;

    if product_count == 0 {
        return Err(AppError::NotFound);
    }

    let item: CartItemEntity = diesel::insert_into(cart_items::table)
        .values(CreateCartItemEntity {
            session_id: body.session_id,
            product_id: body.product_id,
            quantity: body.quantity,
        })
        .on_conflict((cart_items::session_id, cart_items::product_id))
        .do_update()
        .set(cart_items::quantity.eq(cart_items::quantity + excluded(cart_items::quantity)))
        .returning(CartItemEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to add cart item")?;

    Ok(Json(item))
}

#[derive(Serialize, ToSchema)]
struct CartItemWithProduct {
    cart_item: CartItemEntity,
    product: ProductEntity,
}

#[derive(Serialize, ToSchema)]
struct GetCartRes {
    cart_items: Vec<CartItemWithProduct>,
    subtotal: Decimal,
    tax: Decimal,
    total: Decimal,
}

/// Fetch the session's cart lines with their products and server-computed
/// totals. Quote-only products appear in the cart but never price.
#[utoipa::path(
    get,
    path = "/session/{session_id}",
    tags = ["Cart"],
    params(
        ("session_id" = String, Path, description = "Opaque cart session token")
    ),
    responses(
        (status = 200, description = "Cart lines with totals", body = GetCartRes)
    )
)]
async fn get_cart(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let rows: Vec<(CartItemEntity, ProductEntity)> = cart_items::table
        .inner_join(products::table)
        .filter(cart_items::session_id.eq(&session_id))
        .order_by(cart_items::created_at.asc())
        .select((CartItemEntity::as_select(), ProductEntity::as_select()))
        .get_results(conn)
        .await
        .context("Failed to get cart items")?;

    let lines: Vec<PricedLine> = rows
        .iter()
        .map(|(item, product)| PricedLine {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: product.price,
        })
        .collect();
    let totals = pricing::compute_totals(&lines);

    let cart_items = rows
        .into_iter()
        .map(|(cart_item, product)| CartItemWithProduct { cart_item, product })
        .collect();

    Ok(Json(GetCartRes {
        cart_items,
        subtotal: totals.subtotal,
        tax: totals.tax,
        total: totals.total,
    }))
}

#[derive(Deserialize, ToSchema)]
struct UpdateCartItemReq {
    quantity: i32,
}

#[derive(Serialize, ToSchema)]
struct UpdateCartItemRes {
    updated_item: Option<CartItemEntity>,
    removed: bool,
}

/// Set a cart line's quantity. A quantity of zero or less behaves exactly
/// like removing the line.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Cart"],
    params(
        ("id" = i32, Path, description = "Cart line ID to update")
    ),
    request_body = UpdateCartItemReq,
    responses(
        (status = 200, description = "Updated or removed cart line", body = UpdateCartItemRes),
        (status = 404, description = "Cart line does not exist")
    )
)]
async fn update_cart_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    if body.quantity <= 0 {
        diesel::delete(cart_items::table.find(id))
            .execute(conn)
            .await
            .context("Failed to remove cart item")?;

        return Ok(Json(UpdateCartItemRes {
            updated_item: None,
            removed: true,
        }));
    }

    let updated: Result<CartItemEntity, _> = diesel::update(cart_items::table.find(id))
        .set(cart_items::quantity.eq(body.quantity))
        .returning(CartItemEntity::as_returning())
        .get_result(conn)
        .await;

    match updated {
        Ok(item) => Ok(Json(UpdateCartItemRes {
            updated_item: Some(item),
            removed: false,
        })),
        Err(err) => Err(err.into()),
    }
}

#[derive(Serialize, ToSchema)]
struct RemoveCartItemRes {
    removed_items: Vec<CartItemEntity>,
}

/// Remove a cart line. Removing a line that is already gone succeeds with
/// an empty result; the operation is idempotent.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Cart"],
    params(
        ("id" = i32, Path, description = "Cart line ID to remove")
    ),
    responses(
        (status = 200, description = "Removed cart line (empty if it was already gone)", body = RemoveCartItemRes)
    )
)]
async fn remove_cart_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let removed_items: Vec<CartItemEntity> = diesel::delete(cart_items::table.find(id))
        .returning(CartItemEntity::as_returning())
        .get_results(conn)
        .await
        .context("Failed to remove cart item")?;

    Ok(Json(RemoveCartItemRes { removed_items }))
}
