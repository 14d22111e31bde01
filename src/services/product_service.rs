use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::products::{CreateProductRequest, CreateReviewRequest, ProductDetail, ProductList, UpdateProductRequest},
    entity::{
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products, Model as ProductModel},
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews, Model as ReviewModel},
    },
    error::{AppError, AppResult, FieldError},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, Product, Review},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

const FEATURED_LIMIT: u64 = 8;

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(category) = query.category {
        condition = condition.add(ProdCol::Category.eq(category.as_str()));
    }

    if let Some(search) = query.search.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(ProdCol::Name).ilike(pattern.clone()))
                .add(Expr::col(ProdCol::Description).ilike(pattern)),
        );
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(ProdCol::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(ProdCol::Price.lte(max_price));
    }

    if let Some(min_rating) = query.min_rating {
        condition = condition.add(ProdCol::Rating.gte(min_rating));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => ProdCol::CreatedAt,
        ProductSortBy::Price => ProdCol::Price,
        ProductSortBy::Rating => ProdCol::Rating,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    let data = ProductList { items };
    Ok(ApiResponse::success("Products", data, Some(meta)))
}

pub async fn list_featured(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let items = Products::find()
        .filter(ProdCol::IsFeatured.eq(true))
        .order_by_desc(ProdCol::CreatedAt)
        .limit(FEATURED_LIMIT)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let data = ProductList { items };
    Ok(ApiResponse::success("Featured products", data, None))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(product_from_entity);
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let reviews = Reviews::find()
        .filter(ReviewCol::ProductId.eq(id))
        .order_by_desc(ReviewCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(review_from_entity)
        .collect();

    let data = ProductDetail { product, reviews };
    Ok(ApiResponse::success("Product", data, None))
}

fn validate_product(payload: &CreateProductRequest) -> Result<(), AppError> {
    let mut errors = Vec::new();
    if payload.name.trim().is_empty() {
        errors.push(FieldError::new("name", "Name is required"));
    }
    if payload.description.trim().is_empty() {
        errors.push(FieldError::new("description", "Description is required"));
    }
    if payload.price < Decimal::ZERO {
        errors.push(FieldError::new("price", "Price must not be negative"));
    }
    if payload.stock < 0 {
        errors.push(FieldError::new("stock", "Stock must not be negative"));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    validate_product(&payload)?;

    let id = Uuid::new_v4();
    let active = ProductActive {
        id: Set(id),
        name: Set(payload.name),
        description: Set(payload.description),
        price: Set(payload.price),
        original_price: Set(payload.original_price),
        category: Set(payload.category.as_str().to_string()),
        brand: Set(payload.brand),
        material: Set(payload.material),
        color: Set(payload.color),
        stock: Set(payload.stock),
        is_available: Set(payload.is_available.unwrap_or(true)),
        is_featured: Set(payload.is_featured.unwrap_or(false)),
        images: Set(serde_json::json!(payload.images)),
        rating: Set(Decimal::ZERO),
        num_reviews: Set(0),
        sold: Set(0),
        created_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if let Some(price) = payload.price {
        if price < Decimal::ZERO {
            return Err(AppError::Validation(vec![FieldError::new(
                "price",
                "Price must not be negative",
            )]));
        }
    }
    if let Some(stock) = payload.stock {
        if stock < 0 {
            return Err(AppError::Validation(vec![FieldError::new(
                "stock",
                "Stock must not be negative",
            )]));
        }
    }

    let mut active: ProductActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if payload.original_price.is_some() {
        active.original_price = Set(payload.original_price);
    }
    if let Some(category) = payload.category {
        active.category = Set(category.as_str().to_string());
    }
    if let Some(brand) = payload.brand {
        active.brand = Set(brand);
    }
    if payload.material.is_some() {
        active.material = Set(payload.material);
    }
    if payload.color.is_some() {
        active.color = Set(payload.color);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(is_available) = payload.is_available {
        active.is_available = Set(is_available);
    }
    if let Some(is_featured) = payload.is_featured {
        active.is_featured = Set(is_featured);
    }
    if let Some(images) = payload.images {
        active.images = Set(serde_json::json!(images));
    }

    let product = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn add_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    let mut errors = Vec::new();
    if !(1..=5).contains(&payload.rating) {
        errors.push(FieldError::new("rating", "Rating must be between 1 and 5"));
    }
    if payload.comment.trim().is_empty() {
        errors.push(FieldError::new("comment", "Comment is required"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let txn = state.orm.begin().await?;

    // Lock the product row so concurrent reviews serialize and the
    // aggregate below always reflects the full review set.
    let product = Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let already = Reviews::find()
        .filter(
            Condition::all()
                .add(ReviewCol::ProductId.eq(product_id))
                .add(ReviewCol::UserId.eq(user.user_id)),
        )
        .one(&txn)
        .await?;
    if already.is_some() {
        return Err(AppError::BadRequest("Product already reviewed".into()));
    }

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        user_id: Set(user.user_id),
        author_name: Set(user.name.clone()),
        rating: Set(payload.rating),
        comment: Set(payload.comment),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    // Recompute from the full list rather than adjusting incrementally.
    let ratings: Vec<i32> = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|r| r.rating)
        .collect();
    let num_reviews = ratings.len() as i32;
    let rating = if ratings.is_empty() {
        Decimal::ZERO
    } else {
        let sum: i64 = ratings.iter().map(|r| *r as i64).sum();
        (Decimal::from(sum) / Decimal::from(num_reviews))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    };

    let mut active: ProductActive = product.into();
    active.rating = Set(rating);
    active.num_reviews = Set(num_reviews);
    active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "review_add",
        Some("products"),
        Some(serde_json::json!({ "product_id": product_id, "rating": review.rating })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review added",
        review_from_entity(review),
        Some(Meta::empty()),
    ))
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        original_price: model.original_price,
        category: Category::parse(&model.category).unwrap_or(Category::Other),
        brand: model.brand,
        material: model.material,
        color: model.color,
        stock: model.stock,
        is_available: model.is_available,
        is_featured: model.is_featured,
        images: serde_json::from_value(model.images).unwrap_or_default(),
        rating: model.rating,
        num_reviews: model.num_reviews,
        sold: model.sold,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        id: model.id,
        product_id: model.product_id,
        user_id: model.user_id,
        author_name: model.author_name,
        rating: model.rating,
        comment: model.comment,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
