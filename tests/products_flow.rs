use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

use furnistore::{
    db::{create_orm_conn, create_pool},
    dto::products::CreateReviewRequest,
    entity::products::{ActiveModel as ProductActive, Entity as Products},
    error::AppError,
    middleware::auth::AuthUser,
    routes::params::Pagination,
    services::{product_service, user_service},
    state::AppState,
};

fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(Some(AppState { pool, orm }))
}

async fn create_user(state: &AppState, name: &str, role: &str) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    let email = format!("{id}@example.com");
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(name)
    .bind(&email)
    .bind("dummy")
    .bind(role)
    .execute(&state.pool)
    .await?;

    Ok(AuthUser {
        user_id: id,
        name: name.into(),
        email,
        role: role.into(),
    })
}

async fn create_product(state: &AppState) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    ProductActive {
        id: Set(id),
        name: Set(format!("Test Bookshelf {id}")),
        description: Set("A product for testing".into()),
        price: Set(dec("89.00")),
        original_price: Set(None),
        category: Set("cabinet".into()),
        brand: Set("TestBrand".into()),
        material: Set(None),
        color: Set(None),
        stock: Set(10),
        is_available: Set(true),
        is_featured: Set(false),
        images: Set(serde_json::json!([])),
        rating: Set(Decimal::ZERO),
        num_reviews: Set(0),
        sold: Set(0),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(id)
}

#[tokio::test]
async fn review_aggregation_and_duplicate_conflict() -> anyhow::Result<()> {
    let state = match setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let alice = create_user(&state, "Alice", "user").await?;
    let bob = create_user(&state, "Bob", "user").await?;
    let product_id = create_product(&state).await?;

    let review = product_service::add_review(
        &state,
        &alice,
        product_id,
        CreateReviewRequest {
            rating: 4,
            comment: "Sturdy shelves".into(),
        },
    )
    .await?
    .data
    .expect("review");
    assert_eq!(review.author_name, "Alice");

    let detail = product_service::get_product(&state, product_id)
        .await?
        .data
        .expect("product detail");
    assert_eq!(detail.product.num_reviews, 1);
    assert_eq!(detail.product.rating, dec("4"));

    // Same user again: conflict, aggregates untouched.
    let err = product_service::add_review(
        &state,
        &alice,
        product_id,
        CreateReviewRequest {
            rating: 1,
            comment: "Changed my mind".into(),
        },
    )
    .await
    .expect_err("duplicate review must fail");
    assert!(matches!(err, AppError::BadRequest(_)));

    let detail = product_service::get_product(&state, product_id)
        .await?
        .data
        .expect("product detail");
    assert_eq!(detail.product.num_reviews, 1);
    assert_eq!(detail.product.rating, dec("4"));
    assert_eq!(detail.reviews.len(), 1);

    // A second reviewer moves the mean.
    product_service::add_review(
        &state,
        &bob,
        product_id,
        CreateReviewRequest {
            rating: 5,
            comment: "Great value".into(),
        },
    )
    .await?;

    let detail = product_service::get_product(&state, product_id)
        .await?
        .data
        .expect("product detail");
    assert_eq!(detail.product.num_reviews, 2);
    assert_eq!(detail.product.rating, dec("4.5"));

    Ok(())
}

#[tokio::test]
async fn review_input_is_validated() -> anyhow::Result<()> {
    let state = match setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let alice = create_user(&state, "Alice", "user").await?;
    let product_id = create_product(&state).await?;

    for rating in [0, 6] {
        let err = product_service::add_review(
            &state,
            &alice,
            product_id,
            CreateReviewRequest {
                rating,
                comment: "out of range".into(),
            },
        )
        .await
        .expect_err("rating outside 1..=5 must fail");
        assert!(matches!(err, AppError::Validation(_)));
    }

    let detail = product_service::get_product(&state, product_id)
        .await?
        .data
        .expect("product detail");
    assert_eq!(detail.product.num_reviews, 0);
    assert_eq!(detail.product.rating, Decimal::ZERO);

    Ok(())
}

#[tokio::test]
async fn wishlist_add_remove_and_conflicts() -> anyhow::Result<()> {
    let state = match setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let alice = create_user(&state, "Alice", "user").await?;
    let product_id = create_product(&state).await?;

    user_service::add_wishlist_item(&state, &alice, product_id).await?;

    let err = user_service::add_wishlist_item(&state, &alice, product_id)
        .await
        .expect_err("second add must conflict");
    assert!(matches!(err, AppError::BadRequest(_)));

    let list = user_service::list_wishlist(
        &state,
        &alice,
        Pagination {
            page: None,
            limit: None,
        },
    )
    .await?
    .data
    .expect("wishlist");
    assert_eq!(list.items.len(), 1);
    assert_eq!(list.items[0].id, product_id);

    user_service::remove_wishlist_item(&state, &alice, product_id).await?;
    let err = user_service::remove_wishlist_item(&state, &alice, product_id)
        .await
        .expect_err("second remove must 404");
    assert!(matches!(err, AppError::NotFound));

    // Unknown product cannot be wishlisted.
    let err = user_service::add_wishlist_item(&state, &alice, Uuid::new_v4())
        .await
        .expect_err("unknown product must 404");
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn delete_is_admin_only_and_removes_the_product() -> anyhow::Result<()> {
    let state = match setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let customer = create_user(&state, "Alice", "user").await?;
    let admin = create_user(&state, "Root", "admin").await?;
    let product_id = create_product(&state).await?;

    let err = product_service::delete_product(&state, &customer, product_id)
        .await
        .expect_err("non-admin delete must fail");
    assert!(matches!(err, AppError::Forbidden));
    assert!(
        Products::find_by_id(product_id)
            .one(&state.orm)
            .await?
            .is_some()
    );

    product_service::delete_product(&state, &admin, product_id).await?;

    let err = product_service::get_product(&state, product_id)
        .await
        .expect_err("deleted product must 404");
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}
