use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use server_api::{
    add_courier, assign_courier, business, change_status, compute_earnings, create_order,
    daily_report, get_courier, get_order, list_couriers, list_orders, reassign_courier,
    remove_courier, seed_sample_data, unassign_courier, ApiContext,
};
use shared::{
    domain::{Business, Courier, CourierId, Order, OrderNumber, OrderStatus},
    error::{ApiError, ErrorCode},
    protocol::{
        AssignmentConfirmation, CourierEarnings, CreateCourierRequest, CreateOrderRequest,
        DailyReport,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_data_dir};

type HttpResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

const API_ROOT: &str = "/api/cadeteria";

#[derive(Debug, Deserialize)]
struct AssignQuery {
    #[serde(rename = "idPedido", alias = "order_number")]
    order_number: i64,
    #[serde(rename = "idCadete", alias = "courier_id")]
    courier_id: i64,
}

#[derive(Debug, Deserialize)]
struct ChangeStatusQuery {
    #[serde(rename = "idPedido", alias = "order_number")]
    order_number: i64,
    #[serde(rename = "nuevoEstado", alias = "status")]
    status: OrderStatus,
}

#[derive(Debug, Deserialize)]
struct ReassignQuery {
    #[serde(rename = "idPedido", alias = "order_number")]
    order_number: i64,
    #[serde(rename = "idNuevoCadete", alias = "courier_id")]
    courier_id: i64,
}

#[derive(Debug, Deserialize)]
struct OrderQuery {
    #[serde(rename = "idPedido", alias = "order_number")]
    order_number: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let data_dir = prepare_data_dir(&settings.data_dir)?;
    let storage = Storage::new(&data_dir).await.map_err(|error| {
        error!(
            data_dir = %data_dir.display(),
            %error,
            "failed to open data directory; verify it exists and is writable"
        );
        error
    })?;
    let api = ApiContext { storage };

    if settings.seed_sample_data && seed_sample_data(&api).await? {
        info!(data_dir = %data_dir.display(), "seeded sample data");
    }

    let state = AppState { api };
    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, data_dir = %data_dir.display(), "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    let api = Router::new()
        .route("/", get(http_business))
        .route("/pedidos", get(http_list_orders).post(http_create_order))
        .route("/pedidos/:number", get(http_get_order))
        .route("/cadetes", get(http_list_couriers).post(http_add_courier))
        .route(
            "/cadetes/:courier_id",
            get(http_get_courier).delete(http_remove_courier),
        )
        .route("/cadetes/:courier_id/jornal", get(http_courier_earnings))
        .route("/informe", get(http_daily_report))
        .route("/asignar", put(http_assign_courier))
        .route("/cambiarEstadoPedido", put(http_change_status))
        .route("/cambiarCadetePedido", put(http_reassign_courier))
        .route("/quitarCadetePedido", put(http_unassign_courier));

    Router::new()
        .route("/healthz", get(healthz))
        .nest(API_ROOT, api)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation
        | ErrorCode::Duplicate
        | ErrorCode::InvalidTransition
        | ErrorCode::NoOp => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_failure(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = status_for(err.code);
    if status.is_server_error() {
        error!(code = ?err.code, message = %err.message, "request failed");
    } else {
        warn!(code = ?err.code, message = %err.message, "request rejected");
    }
    (status, Json(err))
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    api_failure(ApiError::new(ErrorCode::Validation, message))
}

fn json_rejection(rejection: JsonRejection) -> (StatusCode, Json<ApiError>) {
    let status = rejection.status();
    warn!(%status, reason = %rejection.body_text(), "request body rejected");
    (
        status,
        Json(ApiError::new(ErrorCode::Validation, rejection.body_text())),
    )
}

fn query_or_bad_request<T>(query: Result<Query<T>, QueryRejection>) -> HttpResult<T> {
    query
        .map(|Query(q)| q)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

fn path_or_bad_request<T>(path: Result<Path<T>, PathRejection>) -> HttpResult<T> {
    path.map(|Path(p)| p)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.api.storage.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            error!(error = %format!("{error:#}"), "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

async fn http_business(State(state): State<Arc<AppState>>) -> HttpResult<Json<Business>> {
    let business = business(&state.api).await.map_err(api_failure)?;
    Ok(Json(business))
}

async fn http_list_orders(State(state): State<Arc<AppState>>) -> HttpResult<Json<Vec<Order>>> {
    let orders = list_orders(&state.api).await.map_err(api_failure)?;
    Ok(Json(orders))
}

async fn http_get_order(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> HttpResult<Json<Order>> {
    let number = path_or_bad_request(path)?;
    let order = get_order(&state.api, OrderNumber(number))
        .await
        .map_err(api_failure)?;
    Ok(Json(order))
}

async fn http_create_order(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Option<CreateOrderRequest>>, JsonRejection>,
) -> HttpResult<Response> {
    let Json(request) = body.map_err(json_rejection)?;
    let Some(request) = request else {
        return Err(bad_request("order payload is required"));
    };

    let order = create_order(&state.api, request)
        .await
        .map_err(api_failure)?;

    let location = format!("{API_ROOT}/pedidos/{}", order.number);
    let mut response = (StatusCode::CREATED, Json(order)).into_response();
    if let Ok(value) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    Ok(response)
}

async fn http_list_couriers(State(state): State<Arc<AppState>>) -> HttpResult<Json<Vec<Courier>>> {
    let couriers = list_couriers(&state.api).await.map_err(api_failure)?;
    Ok(Json(couriers))
}

async fn http_get_courier(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> HttpResult<Json<Courier>> {
    let courier_id = path_or_bad_request(path)?;
    let courier = get_courier(&state.api, CourierId(courier_id))
        .await
        .map_err(api_failure)?;
    Ok(Json(courier))
}

async fn http_add_courier(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateCourierRequest>, JsonRejection>,
) -> HttpResult<(StatusCode, Json<Courier>)> {
    let Json(request) = body.map_err(json_rejection)?;
    let courier = add_courier(&state.api, request)
        .await
        .map_err(api_failure)?;
    Ok((StatusCode::CREATED, Json(courier)))
}

async fn http_remove_courier(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> HttpResult<StatusCode> {
    let courier_id = path_or_bad_request(path)?;
    remove_courier(&state.api, CourierId(courier_id))
        .await
        .map_err(api_failure)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_courier_earnings(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> HttpResult<Json<CourierEarnings>> {
    let courier_id = path_or_bad_request(path)?;
    let earnings = compute_earnings(&state.api, CourierId(courier_id))
        .await
        .map_err(api_failure)?;
    Ok(Json(earnings))
}

async fn http_daily_report(State(state): State<Arc<AppState>>) -> HttpResult<Json<DailyReport>> {
    let report = daily_report(&state.api).await.map_err(api_failure)?;
    Ok(Json(report))
}

async fn http_assign_courier(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AssignQuery>, QueryRejection>,
) -> HttpResult<Json<AssignmentConfirmation>> {
    let q = query_or_bad_request(query)?;
    let confirmation = assign_courier(
        &state.api,
        OrderNumber(q.order_number),
        CourierId(q.courier_id),
    )
    .await
    .map_err(api_failure)?;
    Ok(Json(confirmation))
}

async fn http_change_status(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ChangeStatusQuery>, QueryRejection>,
) -> HttpResult<Json<Order>> {
    let q = query_or_bad_request(query)?;
    let order = change_status(&state.api, OrderNumber(q.order_number), q.status)
        .await
        .map_err(api_failure)?;
    Ok(Json(order))
}

async fn http_reassign_courier(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ReassignQuery>, QueryRejection>,
) -> HttpResult<Json<Order>> {
    let q = query_or_bad_request(query)?;
    let order = reassign_courier(
        &state.api,
        OrderNumber(q.order_number),
        CourierId(q.courier_id),
    )
    .await
    .map_err(api_failure)?;
    Ok(Json(order))
}

async fn http_unassign_courier(
    State(state): State<Arc<AppState>>,
    query: Result<Query<OrderQuery>, QueryRejection>,
) -> HttpResult<Json<Order>> {
    let q = query_or_bad_request(query)?;
    let order = unassign_courier(&state.api, OrderNumber(q.order_number))
        .await
        .map_err(api_failure)?;
    Ok(Json(order))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
