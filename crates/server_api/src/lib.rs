use chrono::Local;
use shared::{
    domain::{Business, Client, Courier, CourierId, Order, OrderNumber, OrderStatus},
    error::{ApiError, ErrorCode},
    protocol::{
        AssignmentConfirmation, CourierEarnings, CreateCourierRequest, CreateOrderRequest,
        DailyReport,
    },
};
use storage::Storage;
use tracing::{error, info, warn};

pub mod report;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_orders(ctx: &ApiContext) -> Result<Vec<Order>, ApiError> {
    Ok(ctx.storage.orders().load().await)
}

pub async fn get_order(ctx: &ApiContext, number: OrderNumber) -> Result<Order, ApiError> {
    let orders = ctx.storage.orders().load().await;
    orders
        .into_iter()
        .find(|order| order.number == number)
        .ok_or_else(|| order_not_found(number))
}

pub async fn create_order(
    ctx: &ApiContext,
    request: CreateOrderRequest,
) -> Result<Order, ApiError> {
    let Some(client) = request.client else {
        return Err(ApiError::new(ErrorCode::Validation, "order client is required"));
    };

    let order = {
        let guard = ctx.storage.orders().lock().await;
        let mut orders = guard.load().await;
        if orders
            .iter()
            .any(|existing| existing.is_duplicate_of(&request.observations, &client))
        {
            return Err(ApiError::new(
                ErrorCode::Duplicate,
                "an identical order already exists",
            ));
        }

        let number = OrderNumber::next_after(orders.iter().map(|order| order.number))
            .ok_or_else(|| exhausted("order numbers"))?;
        let order = Order::new(number, request.observations, client);
        orders.push(order.clone());
        guard.save(&orders).await.map_err(internal)?;
        order
    };

    info!(order = %order.number, client = %order.client.name, "order created");
    sync_business(ctx).await?;
    Ok(order)
}

pub async fn assign_courier(
    ctx: &ApiContext,
    number: OrderNumber,
    courier_id: CourierId,
) -> Result<AssignmentConfirmation, ApiError> {
    let order = {
        let couriers_guard = ctx.storage.couriers().lock().await;
        let orders_guard = ctx.storage.orders().lock().await;
        let couriers = couriers_guard.load().await;
        let mut orders = orders_guard.load().await;

        let order = find_order_mut(&mut orders, number)?;
        if order.status.is_terminal() {
            return Err(ApiError::new(
                ErrorCode::InvalidTransition,
                format!("order {number} was already delivered and cannot be assigned"),
            ));
        }
        ensure_courier_exists(&couriers, courier_id)?;

        order.courier_id = Some(courier_id);
        order.status = OrderStatus::Assigned;
        let order = order.clone();
        orders_guard.save(&orders).await.map_err(internal)?;
        order
    };

    info!(order = %number, courier = %courier_id, "courier assigned");
    sync_business(ctx).await?;
    Ok(AssignmentConfirmation {
        message: format!("order {number} assigned to courier {courier_id}"),
        order,
    })
}

/// Sets any status. Moves against the lifecycle are accepted but logged.
pub async fn change_status(
    ctx: &ApiContext,
    number: OrderNumber,
    status: OrderStatus,
) -> Result<Order, ApiError> {
    let (order, previous) = {
        let guard = ctx.storage.orders().lock().await;
        let mut orders = guard.load().await;
        let order = find_order_mut(&mut orders, number)?;

        let previous = order.status;
        order.status = status;
        let order = order.clone();
        guard.save(&orders).await.map_err(internal)?;
        (order, previous)
    };

    if !status.is_forward_of(previous) {
        warn!(order = %number, from = %previous, to = %status, "order status moved backwards");
    }
    info!(order = %number, status = %status, "order status changed");
    sync_business(ctx).await?;
    Ok(order)
}

pub async fn reassign_courier(
    ctx: &ApiContext,
    number: OrderNumber,
    courier_id: CourierId,
) -> Result<Order, ApiError> {
    let order = {
        let couriers_guard = ctx.storage.couriers().lock().await;
        let orders_guard = ctx.storage.orders().lock().await;
        let couriers = couriers_guard.load().await;
        let mut orders = orders_guard.load().await;

        let order = find_order_mut(&mut orders, number)?;
        if order.status.is_terminal() {
            return Err(ApiError::new(
                ErrorCode::InvalidTransition,
                format!("order {number} was already delivered; its courier cannot change"),
            ));
        }
        ensure_courier_exists(&couriers, courier_id)?;
        if order.courier_id == Some(courier_id) {
            return Err(ApiError::new(
                ErrorCode::NoOp,
                format!("order {number} is already assigned to courier {courier_id}"),
            ));
        }

        order.courier_id = Some(courier_id);
        let order = order.clone();
        orders_guard.save(&orders).await.map_err(internal)?;
        order
    };

    info!(order = %number, courier = %courier_id, "courier reassigned");
    sync_business(ctx).await?;
    Ok(order)
}

pub async fn unassign_courier(ctx: &ApiContext, number: OrderNumber) -> Result<Order, ApiError> {
    let order = {
        let guard = ctx.storage.orders().lock().await;
        let mut orders = guard.load().await;
        let order = find_order_mut(&mut orders, number)?;
        if order.status.is_terminal() {
            return Err(ApiError::new(
                ErrorCode::InvalidTransition,
                format!("order {number} was already delivered; its courier cannot change"),
            ));
        }
        if order.courier_id.is_none() {
            return Err(ApiError::new(
                ErrorCode::NoOp,
                format!("order {number} has no courier assigned"),
            ));
        }

        order.courier_id = None;
        order.status = OrderStatus::Pending;
        let order = order.clone();
        guard.save(&orders).await.map_err(internal)?;
        order
    };

    info!(order = %number, "courier unassigned");
    sync_business(ctx).await?;
    Ok(order)
}

pub async fn list_couriers(ctx: &ApiContext) -> Result<Vec<Courier>, ApiError> {
    Ok(ctx.storage.couriers().load().await)
}

pub async fn get_courier(ctx: &ApiContext, courier_id: CourierId) -> Result<Courier, ApiError> {
    let couriers = ctx.storage.couriers().load().await;
    couriers
        .into_iter()
        .find(|courier| courier.id == courier_id)
        .ok_or_else(|| courier_not_found(courier_id))
}

pub async fn add_courier(
    ctx: &ApiContext,
    request: CreateCourierRequest,
) -> Result<Courier, ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "courier name is required"));
    }
    if let Some(id) = request.id.filter(|id| id.0 <= 0) {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("courier id must be positive, got {id}"),
        ));
    }

    let courier = {
        let guard = ctx.storage.couriers().lock().await;
        let mut couriers = guard.load().await;
        let id = match request.id {
            Some(id) if couriers.iter().any(|courier| courier.id == id) => {
                return Err(ApiError::new(
                    ErrorCode::Duplicate,
                    format!("courier {id} already exists"),
                ));
            }
            Some(id) => id,
            None => CourierId::next_after(couriers.iter().map(|courier| courier.id))
                .ok_or_else(|| exhausted("courier ids"))?,
        };

        let courier = Courier {
            id,
            name: request.name,
            address: request.address,
            phone: request.phone,
        };
        couriers.push(courier.clone());
        guard.save(&couriers).await.map_err(internal)?;
        courier
    };

    info!(courier = %courier.id, name = %courier.name, "courier added");
    sync_business(ctx).await?;
    Ok(courier)
}

/// Removes a courier that no open order depends on. Delivered orders that
/// pointed at it lose the reference.
pub async fn remove_courier(ctx: &ApiContext, courier_id: CourierId) -> Result<Courier, ApiError> {
    let removed = {
        let couriers_guard = ctx.storage.couriers().lock().await;
        let orders_guard = ctx.storage.orders().lock().await;
        let mut couriers = couriers_guard.load().await;
        let mut orders = orders_guard.load().await;

        let position = couriers
            .iter()
            .position(|courier| courier.id == courier_id)
            .ok_or_else(|| courier_not_found(courier_id))?;

        let open_orders: Vec<String> = orders
            .iter()
            .filter(|order| order.courier_id == Some(courier_id) && !order.status.is_terminal())
            .map(|order| order.number.to_string())
            .collect();
        if !open_orders.is_empty() {
            return Err(ApiError::new(
                ErrorCode::Conflict,
                format!(
                    "courier {courier_id} still has open orders: {}",
                    open_orders.join(", ")
                ),
            ));
        }

        let mut detached = 0usize;
        for order in orders
            .iter_mut()
            .filter(|order| order.courier_id == Some(courier_id))
        {
            order.courier_id = None;
            detached += 1;
        }
        if detached > 0 {
            orders_guard.save(&orders).await.map_err(internal)?;
        }

        let removed = couriers.remove(position);
        couriers_guard.save(&couriers).await.map_err(internal)?;
        info!(courier = %courier_id, detached, "courier removed");
        removed
    };

    sync_business(ctx).await?;
    Ok(removed)
}

pub async fn compute_earnings(
    ctx: &ApiContext,
    courier_id: CourierId,
) -> Result<CourierEarnings, ApiError> {
    let couriers = ctx.storage.couriers().load().await;
    let orders = ctx.storage.orders().load().await;
    Ok(CourierEarnings {
        courier_id,
        earnings: report::earnings_for(courier_id, &couriers, &orders),
    })
}

pub async fn daily_report(ctx: &ApiContext) -> Result<DailyReport, ApiError> {
    let couriers = ctx.storage.couriers().load().await;
    let orders = ctx.storage.orders().load().await;
    Ok(report::build_daily_report(
        &couriers,
        &orders,
        Local::now().date_naive(),
    ))
}

pub async fn business(ctx: &ApiContext) -> Result<Business, ApiError> {
    Ok(ctx.storage.business().load().await)
}

/// Writes the starter roster and two pending orders when both collections
/// are empty. Returns whether anything was written.
pub async fn seed_sample_data(ctx: &ApiContext) -> Result<bool, ApiError> {
    {
        let couriers_guard = ctx.storage.couriers().lock().await;
        let orders_guard = ctx.storage.orders().lock().await;
        if !couriers_guard.load().await.is_empty() || !orders_guard.load().await.is_empty() {
            return Ok(false);
        }

        let couriers = vec![
            Courier {
                id: CourierId(1),
                name: "Juan Pérez".into(),
                address: "Calle Falsa 123".into(),
                phone: "111111111".into(),
            },
            Courier {
                id: CourierId(2),
                name: "María Gómez".into(),
                address: "Av. Siempre Viva 456".into(),
                phone: "222222222".into(),
            },
        ];
        let orders = vec![
            Order::new(
                OrderNumber(1),
                "Dejar en portería",
                Client {
                    name: "Cliente 1".into(),
                    address: "Calle A 123".into(),
                    phone: "333333333".into(),
                    address_reference: None,
                },
            ),
            Order::new(
                OrderNumber(2),
                "Llamar al llegar",
                Client {
                    name: "Cliente 2".into(),
                    address: "Calle B 456".into(),
                    phone: "444444444".into(),
                    address_reference: None,
                },
            ),
        ];
        orders_guard.save(&orders).await.map_err(internal)?;
        couriers_guard.save(&couriers).await.map_err(internal)?;
    }

    info!("sample couriers and orders written");
    sync_business(ctx).await?;
    Ok(true)
}

/// Rewrites the business snapshot from the collections currently on disk.
///
/// Reading both collections after taking the business lock means the last
/// refresh to run always sees every save that preceded it.
async fn sync_business(ctx: &ApiContext) -> Result<(), ApiError> {
    let guard = ctx.storage.business().lock().await;
    let mut business = guard.load().await;
    business.couriers = ctx.storage.couriers().load().await;
    business.orders = ctx.storage.orders().load().await;
    guard.save(&business).await.map_err(internal)
}

fn find_order_mut(orders: &mut [Order], number: OrderNumber) -> Result<&mut Order, ApiError> {
    orders
        .iter_mut()
        .find(|order| order.number == number)
        .ok_or_else(|| order_not_found(number))
}

fn ensure_courier_exists(couriers: &[Courier], courier_id: CourierId) -> Result<(), ApiError> {
    if couriers.iter().any(|courier| courier.id == courier_id) {
        Ok(())
    } else {
        Err(courier_not_found(courier_id))
    }
}

fn order_not_found(number: OrderNumber) -> ApiError {
    ApiError::new(ErrorCode::NotFound, format!("order {number} not found"))
}

fn courier_not_found(courier_id: CourierId) -> ApiError {
    ApiError::new(ErrorCode::NotFound, format!("courier {courier_id} not found"))
}

fn exhausted(what: &str) -> ApiError {
    ApiError::new(ErrorCode::Conflict, format!("no {what} left to hand out"))
}

fn internal(err: anyhow::Error) -> ApiError {
    error!(error = %format!("{err:#}"), "persistence failure");
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
