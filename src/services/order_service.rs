use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CreateOrderRequest, OrderList, OrderWithItems, PayOrderRequest},
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult, FieldError},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentResult, ShippingAddress},
    pricing,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

fn validate_order(payload: &CreateOrderRequest) -> Result<(), AppError> {
    if payload.order_items.is_empty() {
        return Err(AppError::BadRequest("No order items".into()));
    }

    let mut errors = Vec::new();
    if payload
        .order_items
        .iter()
        .any(|line| line.quantity < 1)
    {
        errors.push(FieldError::new(
            "order_items",
            "Quantity must be at least 1",
        ));
    }
    let mut ids: Vec<Uuid> = payload.order_items.iter().map(|l| l.product).collect();
    ids.sort();
    ids.dedup();
    if ids.len() != payload.order_items.len() {
        errors.push(FieldError::new(
            "order_items",
            "Duplicate product in order items",
        ));
    }

    let addr = &payload.shipping_address;
    for (field, value) in [
        ("shipping_address.full_name", &addr.full_name),
        ("shipping_address.address", &addr.address),
        ("shipping_address.city", &addr.city),
        ("shipping_address.postal_code", &addr.postal_code),
        ("shipping_address.country", &addr.country),
    ] {
        if value.trim().is_empty() {
            errors.push(FieldError::new(field, "Field is required"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    validate_order(&payload)?;

    let mut lines = payload.order_items;
    // Stable lock order: two checkouts touching the same products always
    // lock rows in the same sequence, so they cannot deadlock.
    lines.sort_by_key(|line| line.product);

    let txn = state.orm.begin().await?;

    // Pre-flight under row locks. A concurrent checkout of the same product
    // waits here until this transaction commits, then sees the new stock.
    let mut reserved = Vec::with_capacity(lines.len());
    for line in &lines {
        let product = Products::find_by_id(line.product)
            .lock(LockType::Update)
            .one(&txn)
            .await?;
        let product = match product {
            Some(p) => p,
            None => return Err(AppError::NotFound),
        };
        if product.stock < line.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}: {} available",
                product.name, product.stock
            )));
        }
        reserved.push((product, line.quantity));
    }

    // Prices come from the locked rows, never from the client.
    let quote = pricing::quote(reserved.iter().map(|(p, qty)| (p.price, *qty)));

    let shipping_address = serde_json::to_value(&payload.shipping_address)
        .map_err(|e| AppError::Internal(e.into()))?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        status: Set(OrderStatus::Pending.as_str().into()),
        payment_method: Set(payload.payment_method.as_str().into()),
        items_price: Set(quote.items_price),
        shipping_price: Set(quote.shipping_price),
        tax_price: Set(quote.tax_price),
        total_price: Set(quote.total_price),
        shipping_address: Set(shipping_address),
        payment_result: Set(None),
        is_paid: Set(false),
        paid_at: Set(None),
        is_delivered: Set(false),
        delivered_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::new();
    for (product, quantity) in &reserved {
        let images: Vec<String> =
            serde_json::from_value(product.images.clone()).unwrap_or_default();
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            name: Set(product.name.clone()),
            image: Set(images.first().cloned().unwrap_or_default()),
            price: Set(product.price),
            quantity: Set(*quantity),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        order_items.push(order_item_from_entity(item));

        // reserve stock
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(*quantity))
            .col_expr(ProdCol::Sold, Expr::col(ProdCol::Sold).add(*quantity))
            .filter(ProdCol::Id.eq(product.id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: order_from_entity(order),
            items: order_items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if order.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::Forbidden);
    }

    let items = load_items(&state.orm, order.id).await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn pay_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: PayOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id).lock(LockType::Update).one(&txn).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    if order.is_paid {
        return Err(AppError::BadRequest("Order already paid".into()));
    }

    let status = OrderStatus::parse(&order.status).unwrap_or(OrderStatus::Pending);
    if status == OrderStatus::Cancelled {
        return Err(AppError::BadRequest("Order is cancelled".into()));
    }

    let payment_result = PaymentResult {
        id: payload.id,
        status: payload.status,
        update_time: payload.update_time,
        email_address: payload.email_address,
    };
    let payment_result =
        serde_json::to_value(&payment_result).map_err(|e| AppError::Internal(e.into()))?;

    let mut active: OrderActive = order.into();
    active.is_paid = Set(true);
    active.paid_at = Set(Some(Utc::now().into()));
    active.payment_result = Set(Some(payment_result));
    if status.can_transition(OrderStatus::Processing) {
        active.status = Set(OrderStatus::Processing.as_str().into());
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    let items = load_items(&txn, order.id).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_paid",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment recorded",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub(crate) async fn load_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(conn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect())
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        status: OrderStatus::parse(&model.status).unwrap_or(OrderStatus::Pending),
        payment_method: PaymentMethod::parse(&model.payment_method)
            .unwrap_or(PaymentMethod::CashOnDelivery),
        items_price: model.items_price,
        shipping_price: model.shipping_price,
        tax_price: model.tax_price,
        total_price: model.total_price,
        shipping_address: serde_json::from_value::<ShippingAddress>(model.shipping_address)
            .unwrap_or_default(),
        payment_result: model
            .payment_result
            .and_then(|v| serde_json::from_value(v).ok()),
        is_paid: model.is_paid,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        is_delivered: model.is_delivered,
        delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        name: model.name,
        image: model.image,
        price: model.price,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
