use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AuthResponse, Claims, LoginRequest, RegisterRequest},
        orders::{
            CreateOrderRequest, OrderLineInput, OrderList, OrderWithItems, PayOrderRequest,
            UpdateOrderStatusRequest,
        },
        products::{
            CreateProductRequest, CreateReviewRequest, ProductDetail, ProductList,
            UpdateProductRequest,
        },
        users::{UpdateProfileRequest, UpdateUserRoleRequest, UserList, WishlistProductList},
    },
    error::FieldError,
    models::{
        Category, Order, OrderItem, OrderStatus, PaymentMethod, PaymentResult, Product, Review,
        ShippingAddress, User,
    },
    response::{ApiResponse, Meta},
    routes::{auth, health, orders, params, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        products::list_products,
        products::list_featured,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::add_review,
        orders::create_order,
        orders::list_all_orders,
        orders::list_my_orders,
        orders::get_order,
        orders::pay_order,
        orders::update_order_status,
        users::list_users,
        users::update_profile,
        users::list_wishlist,
        users::add_wishlist_item,
        users::remove_wishlist_item,
        users::update_user_role,
        users::delete_user
    ),
    components(
        schemas(
            User,
            Product,
            Review,
            Order,
            OrderItem,
            Category,
            OrderStatus,
            PaymentMethod,
            PaymentResult,
            ShippingAddress,
            FieldError,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            Claims,
            CreateProductRequest,
            UpdateProductRequest,
            CreateReviewRequest,
            ProductList,
            ProductDetail,
            CreateOrderRequest,
            OrderLineInput,
            PayOrderRequest,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            UpdateProfileRequest,
            UpdateUserRoleRequest,
            UserList,
            WishlistProductList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<User>,
            ApiResponse<Review>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<ProductDetail>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<UserList>,
            ApiResponse<AuthResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog and review endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Users", description = "Profile, wishlist and user admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
