use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Local, NaiveTime, Utc};
use diesel::{
    ExpressionMethods, QueryDsl, SelectableHelper, dsl::sum, result::DatabaseErrorKind,
};
use diesel_async::RunQueryDsl;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    aliases::DieselError,
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware,
    models::{
        CategoryEntity, CreateCategoryEntity, CreateProductEntity, OrderEntity, OrderStatus,
        ProductEntity, UpdateProductEntity,
    },
    schema::{categories, orders, products},
};

/// Admin surface: dashboard aggregates, order status management and
/// catalog CRUD. Everything behind the shared-secret token layer.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/admin",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_stats))
            .routes(utoipa_axum::routes!(get_orders))
            .routes(utoipa_axum::routes!(update_order_status))
            .routes(utoipa_axum::routes!(create_product))
            .routes(utoipa_axum::routes!(update_product, delete_product))
            .routes(utoipa_axum::routes!(create_category))
            .route_layer(axum::middleware::from_fn(middleware::admin_authorization)),
    )
}

#[derive(Serialize, ToSchema)]
struct AdminStatsRes {
    total_products: i64,
    active_products: i64,
    total_orders: i64,
    orders_today: i64,
    revenue_today: Decimal,
    lifetime_revenue: Decimal,
}

/// Dashboard aggregates, computed on demand. Revenue counts delivered
/// orders only; the figures are advisory and carry no consistency
/// guarantee beyond read-committed at query time.
#[utoipa::path(
    get,
    path = "/stats",
    tags = ["Admin"],
    responses(
        (status = 200, description = "Dashboard statistics", body = StdResponse<AdminStatsRes, String>),
        (status = 403, description = "Missing or invalid admin token")
    )
)]
async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let total_products: i64 = products::table
        .count()
        .get_result(conn)
        .await
        .context("Failed to count products")?;

    let active_products: i64 = products::table
        .filter(products::is_active.eq(true))
        .count()
        .get_result(conn)
        .await
        .context("Failed to count active products")?;

    let total_orders: i64 = orders::table
        .count()
        .get_result(conn)
        .await
        .context("Failed to count orders")?;

    let today_start = start_of_today();

    let orders_today: i64 = orders::table
        .filter(orders::created_at.ge(today_start))
        .count()
        .get_result(conn)
        .await
        .context("Failed to count today's orders")?;

    let revenue_today: Option<Decimal> = orders::table
        .filter(orders::status.eq(OrderStatus::Delivered.as_str()))
        .filter(orders::created_at.ge(today_start))
        .select(sum(orders::total))
        .get_result(conn)
        .await
        .context("Failed to sum today's revenue")?;

    let lifetime_revenue: Option<Decimal> = orders::table
        .filter(orders::status.eq(OrderStatus::Delivered.as_str()))
        .select(sum(orders::total))
        .get_result(conn)
        .await
        .context("Failed to sum lifetime revenue")?;

    Ok(StdResponse {
        data: Some(AdminStatsRes {
            total_products,
            active_products,
            total_orders,
            orders_today,
            revenue_today: revenue_today.unwrap_or(Decimal::ZERO),
            lifetime_revenue: lifetime_revenue.unwrap_or(Decimal::ZERO),
        }),
        message: Some("Get stats successfully"),
    })
}

/// Midnight of the current day in the server's local timezone, as UTC.
fn start_of_today() -> DateTime<Utc> {
    let midnight = Local::now().date_naive().and_time(NaiveTime::MIN);
    midnight
        .and_local_timezone(Local)
        .earliest()
        // a DST gap at exactly midnight leaves no local midnight; fall
        // back to "now", which stays within the same local day
        .unwrap_or_else(Local::now)
        .with_timezone(&Utc)
}

/// Fetch all orders, newest first.
#[utoipa::path(
    get,
    path = "/orders",
    tags = ["Admin"],
    responses(
        (status = 200, description = "List all orders", body = StdResponse<Vec<OrderEntity>, String>)
    )
)]
async fn get_orders(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let orders: Vec<OrderEntity> = orders::table
        .order_by(orders::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get orders successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateOrderStatusReq {
    status: String,
}

/// Set an order's status. The status set is flat: any state may be set
/// from any other, there is no enforced transition graph.
#[utoipa::path(
    put,
    path = "/orders/{id}/status",
    tags = ["Admin"],
    params(
        ("id" = i32, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Updated order status", body = StdResponse<OrderEntity, String>),
        (status = 400, description = "Unknown status value"),
        (status = 404, description = "Order not found")
    )
)]
async fn update_order_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let status: OrderStatus = body.status.parse().map_err(|_| {
        AppError::Validation(format!("{} is not a valid order status", body.status))
    })?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = diesel::update(orders::table.find(id))
        .set(orders::status.eq(status.as_str()))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await;

    match order {
        Ok(order) => Ok(StdResponse {
            data: Some(order),
            message: Some("Updated order status successfully"),
        }),
        Err(DieselError::NotFound) => Err(AppError::NotFound),
        Err(err) => Err(AppError::Other(err.into())),
    }
}

/// Create a catalog product.
#[utoipa::path(
    post,
    path = "/products",
    tags = ["Admin"],
    request_body = CreateProductEntity,
    responses(
        (status = 200, description = "Created product", body = StdResponse<ProductEntity, String>),
        (status = 400, description = "Invalid product data")
    )
)]
async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<CreateProductEntity>,
) -> Result<impl IntoResponse, AppError> {
    validate_product_fields(&body.name, &body.slug, body.price, body.stock)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = diesel::insert_into(products::table)
        .values(body)
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Validation("slug is already in use".into())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                AppError::Validation("category does not exist".into())
            }
            other => AppError::Other(anyhow::Error::new(other).context("Failed to create product")),
        })?;

    Ok(StdResponse {
        data: Some(product),
        message: Some("Created product successfully"),
    })
}

/// Update a product. Absent fields stay untouched; an explicit `null`
/// price turns the product into a quote-only listing.
#[utoipa::path(
    put,
    path = "/products/{id}",
    tags = ["Admin"],
    params(
        ("id" = i32, Path, description = "Product ID to update")
    ),
    request_body = UpdateProductEntity,
    responses(
        (status = 200, description = "Updated product", body = StdResponse<ProductEntity, String>),
        (status = 400, description = "Invalid product data"),
        (status = 404, description = "Product not found")
    )
)]
async fn update_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateProductEntity>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".into()));
        }
    }
    if let Some(slug) = &body.slug {
        if slug.trim().is_empty() {
            return Err(AppError::Validation("slug must not be empty".into()));
        }
    }
    if let Some(Some(price)) = body.price {
        if price < Decimal::ZERO {
            return Err(AppError::Validation("price must not be negative".into()));
        }
    }
    if let Some(stock) = body.stock {
        if stock < 0 {
            return Err(AppError::Validation("stock must not be negative".into()));
        }
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = diesel::update(products::table.find(id))
        .set(&body)
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await;

    match product {
        Ok(product) => Ok(StdResponse {
            data: Some(product),
            message: Some("Updated product successfully"),
        }),
        Err(DieselError::NotFound) => Err(AppError::NotFound),
        Err(DieselError::QueryBuilderError(_)) => {
            Err(AppError::Validation("no fields to update".into()))
        }
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            Err(AppError::Validation("slug is already in use".into()))
        }
        Err(err) => Err(AppError::Other(err.into())),
    }
}

/// Delete a product from the catalog.
#[utoipa::path(
    delete,
    path = "/products/{id}",
    tags = ["Admin"],
    params(
        ("id" = i32, Path, description = "Product ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted product", body = StdResponse<ProductEntity, String>),
        (status = 400, description = "Product is referenced by existing orders"),
        (status = 404, description = "Product not found")
    )
)]
async fn delete_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = diesel::delete(products::table.find(id))
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await;

    match product {
        Ok(product) => Ok(StdResponse {
            data: Some(product),
            message: Some("Deleted product successfully"),
        }),
        Err(DieselError::NotFound) => Err(AppError::NotFound),
        Err(DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)) => Err(
            AppError::Validation("product is referenced by existing orders".into()),
        ),
        Err(err) => Err(AppError::Other(err.into())),
    }
}

/// Create a catalog category.
#[utoipa::path(
    post,
    path = "/categories",
    tags = ["Admin"],
    request_body = CreateCategoryEntity,
    responses(
        (status = 200, description = "Created category", body = StdResponse<CategoryEntity, String>),
        (status = 400, description = "Invalid category data")
    )
)]
async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryEntity>,
) -> Result<impl IntoResponse, AppError> {
    if body.name.trim().is_empty() || body.slug.trim().is_empty() {
        return Err(AppError::Validation("name and slug are required".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category = diesel::insert_into(categories::table)
        .values(body)
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Validation("slug is already in use".into())
            }
            other => {
                AppError::Other(anyhow::Error::new(other).context("Failed to create category"))
            }
        })?;

    Ok(StdResponse {
        data: Some(category),
        message: Some("Created category successfully"),
    })
}

fn validate_product_fields(
    name: &str,
    slug: &str,
    price: Option<Decimal>,
    stock: i32,
) -> Result<(), AppError> {
    if name.trim().is_empty() || slug.trim().is_empty() {
        return Err(AppError::Validation("name and slug are required".into()));
    }
    if let Some(price) = price {
        if price < Decimal::ZERO {
            return Err(AppError::Validation("price must not be negative".into()));
        }
    }
    if stock < 0 {
        return Err(AppError::Validation("stock must not be negative".into()));
    }
    Ok(())
}
