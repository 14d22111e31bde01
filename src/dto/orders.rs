use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress};

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderLineInput {
    pub product: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub order_items: Vec<OrderLineInput>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// Payment-gateway confirmation attached when the owner marks an order paid.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PayOrderRequest {
    pub id: String,
    pub status: String,
    pub update_time: Option<String>,
    pub email_address: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
