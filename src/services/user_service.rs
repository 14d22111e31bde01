use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::users::{UpdateProfileRequest, WishlistProductList},
    entity::products::{Column as ProdCol, Entity as Products},
    error::{AppError, AppResult, FieldError},
    middleware::auth::AuthUser,
    models::{Product, User},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::product_service::product_from_entity,
    state::AppState,
};

pub async fn update_profile(
    pool: &DbPool,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(pool)
        .await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let mut errors = Vec::new();
    if let Some(name) = payload.name.as_ref() {
        if name.trim().is_empty() {
            errors.push(FieldError::new("name", "Name must not be empty"));
        }
    }
    if let Some(email) = payload.email.as_ref() {
        if !email.contains('@') {
            errors.push(FieldError::new("email", "Please include a valid email"));
        }
    }
    if let Some(password) = payload.password.as_ref() {
        if password.len() < 6 {
            errors.push(FieldError::new(
                "password",
                "Password must be at least 6 characters",
            ));
        }
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    if let Some(email) = payload.email.as_ref() {
        let taken: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 AND id <> $2")
                .bind(email.as_str())
                .bind(user.user_id)
                .fetch_optional(pool)
                .await?;
        if taken.is_some() {
            return Err(AppError::BadRequest("Email is already registered".into()));
        }
    }

    let name = payload.name.unwrap_or(existing.name);
    let email = payload.email.unwrap_or(existing.email);
    let phone = payload.phone.or(existing.phone);
    let address = payload.address.or(existing.address);
    let password_hash = match payload.password {
        Some(password) => super::auth_service::hash_password(&password)?,
        None => existing.password_hash,
    };

    let updated: User = sqlx::query_as(
        r#"
        UPDATE users
        SET name = $2, email = $3, phone = $4, address = $5, password_hash = $6
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(name)
    .bind(email)
    .bind(phone)
    .bind(address)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "profile_update",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.user_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Profile updated", updated, Some(Meta::empty())))
}

pub async fn list_wishlist(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<WishlistProductList>> {
    let (page, limit, offset) = pagination.normalize();

    let product_ids: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT product_id
        FROM wishlist_items
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let ids: Vec<Uuid> = product_ids.into_iter().map(|(id,)| id).collect();
    let mut products: Vec<Product> = Products::find()
        .filter(ProdCol::Id.is_in(ids.clone()))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();
    // restore the wishlist ordering lost by the IN query
    products.sort_by_key(|p| ids.iter().position(|id| *id == p.id));

    let total: (i64,) = sqlx::query_as("SELECT count(*) FROM wishlist_items WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    let data = WishlistProductList { items: products };
    Ok(ApiResponse::success("OK", data, Some(meta)))
}

pub async fn add_wishlist_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let product_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&state.pool)
        .await?;
    if product_exists.is_none() {
        return Err(AppError::NotFound);
    }

    let existing: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM wishlist_items WHERE user_id = $1 AND product_id = $2",
    )
    .bind(user.user_id)
    .bind(product_id)
    .fetch_optional(&state.pool)
    .await?;
    if existing.is_some() {
        return Err(AppError::BadRequest("Product already in wishlist".into()));
    }

    sqlx::query("INSERT INTO wishlist_items (id, user_id, product_id) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind(user.user_id)
        .bind(product_id)
        .execute(&state.pool)
        .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "wishlist_add",
        Some("wishlist_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Added to wishlist",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn remove_wishlist_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
        .bind(user.user_id)
        .bind(product_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "wishlist_remove",
        Some("wishlist_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from wishlist",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
