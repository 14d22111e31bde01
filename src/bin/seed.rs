use rust_decimal::Decimal;
use uuid::Uuid;

use furnistore::{config::AppConfig, db::create_pool, services::auth_service::hash_password};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "Admin User", "admin@furnistore.com", "admin123", "admin").await?;
    let user_id = ensure_user(&pool, "John Doe", "john@example.com", "password123", "user").await?;
    ensure_user(&pool, "Jane Smith", "jane@example.com", "password123", "user").await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    // If user already exists, fetch id
    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

struct SeedProduct {
    name: &'static str,
    description: &'static str,
    price: Decimal,
    original_price: Option<Decimal>,
    category: &'static str,
    brand: &'static str,
    material: &'static str,
    color: &'static str,
    stock: i32,
    is_featured: bool,
    image: &'static str,
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = vec![
        SeedProduct {
            name: "Modern Sectional Sofa",
            description: "Comfortable and stylish sectional sofa perfect for modern living rooms. Features premium fabric upholstery and sturdy wooden frame.",
            price: Decimal::from(1299),
            original_price: Some(Decimal::from(1599)),
            category: "sofa",
            brand: "ComfortHome",
            material: "Fabric",
            color: "Gray",
            stock: 15,
            is_featured: true,
            image: "https://images.unsplash.com/photo-1586023492125-27b2c045efd7?w=400&h=400&fit=crop",
        },
        SeedProduct {
            name: "Ergonomic Office Chair",
            description: "Professional ergonomic office chair with lumbar support and adjustable height. Perfect for long working hours.",
            price: Decimal::from(299),
            original_price: Some(Decimal::from(399)),
            category: "chair",
            brand: "WorkWell",
            material: "Mesh",
            color: "Black",
            stock: 30,
            is_featured: true,
            image: "https://images.unsplash.com/photo-1541558869434-2840d308329a?w=400&h=400&fit=crop",
        },
        SeedProduct {
            name: "Queen Platform Bed",
            description: "Minimalist queen-size platform bed with solid oak slats and a padded headboard.",
            price: Decimal::from(749),
            original_price: None,
            category: "bed",
            brand: "DreamRest",
            material: "Oak",
            color: "Natural",
            stock: 12,
            is_featured: false,
            image: "https://images.unsplash.com/photo-1505693416388-ac5ce068fe85?w=400&h=400&fit=crop",
        },
        SeedProduct {
            name: "Walnut Dining Table",
            description: "Six-seat dining table in solid walnut with a hand-rubbed oil finish.",
            price: Decimal::from(899),
            original_price: Some(Decimal::from(1099)),
            category: "table",
            brand: "OakCraft",
            material: "Walnut",
            color: "Brown",
            stock: 8,
            is_featured: true,
            image: "https://images.unsplash.com/photo-1533090481720-856c6e3c1fdc?w=400&h=400&fit=crop",
        },
        SeedProduct {
            name: "Glass Cabinet",
            description: "Display cabinet with tempered glass doors and adjustable shelving.",
            price: Decimal::from(449),
            original_price: None,
            category: "cabinet",
            brand: "ClearView",
            material: "Glass",
            color: "White",
            stock: 20,
            is_featured: false,
            image: "https://images.unsplash.com/photo-1493663284031-b7e3aefcae8e?w=400&h=400&fit=crop",
        },
        SeedProduct {
            name: "Standing Desk",
            description: "Height-adjustable standing desk with memory presets and cable management tray.",
            price: Decimal::from(549),
            original_price: Some(Decimal::from(649)),
            category: "desk",
            brand: "WorkWell",
            material: "Bamboo",
            color: "Natural",
            stock: 25,
            is_featured: false,
            image: "https://images.unsplash.com/photo-1518455027359-f3f8164ba6bd?w=400&h=400&fit=crop",
        },
    ];

    for product in products {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, description, price, original_price, category, brand,
                 material, color, stock, is_featured, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product.name)
        .bind(product.description)
        .bind(product.price)
        .bind(product.original_price)
        .bind(product.category)
        .bind(product.brand)
        .bind(product.material)
        .bind(product.color)
        .bind(product.stock)
        .bind(product.is_featured)
        .bind(serde_json::json!([product.image]))
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
