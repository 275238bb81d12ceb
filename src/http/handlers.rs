use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::application::parse_transaction_type;
use crate::domain::{ClientSort, ClientUpdate};

use super::AppState;
use super::dto::{
    ClientQuery, CoinTransactionRequest, CreateClientRequest, DebtTransactionRequest,
    ExpenseRequest, IdQuery, LedgerQuery, LimitQuery, OneOrMany, PosSaleRequest, SaleRequest,
    UpdateClientRequest, UpdateExpenseRequest, UpdateSaleRequest, required, required_amount,
};
use super::error::ApiError;

type JsonResult = Result<Json<Value>, ApiError>;
type CreatedResult = Result<(StatusCode, Json<Value>), ApiError>;

fn required_id(query: Result<Query<IdQuery>, QueryRejection>) -> Result<i64, ApiError> {
    let Query(query) = query?;
    Ok(required(query.id, "id")?)
}

// === Clients ===

/// GET /api/clients - one client by `id` or `phone`, otherwise a filtered list.
pub async fn get_clients(
    State(state): State<AppState>,
    query: Result<Query<ClientQuery>, QueryRejection>,
) -> JsonResult {
    let Query(query) = query?;

    if let Some(id) = query.id {
        let client = state.service.get_client(id).await?;
        return Ok(Json(json!({ "success": true, "data": client })));
    }
    if let Some(phone) = query.phone.as_deref() {
        let client = state.service.find_client_by_phone(phone).await?;
        return Ok(Json(json!({ "success": true, "data": client })));
    }

    let sort = match query.sort.as_deref() {
        Some(raw) => ClientSort::from_str(raw).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Invalid sort '{}'. Valid: coins, debt, recent",
                raw
            ))
        })?,
        None => ClientSort::default(),
    };

    let clients = state
        .service
        .list_clients(query.search.as_deref(), sort, query.limit)
        .await?;
    Ok(Json(json!({ "success": true, "data": clients })))
}

/// POST /api/clients
pub async fn create_client(
    State(state): State<AppState>,
    payload: Result<Json<CreateClientRequest>, JsonRejection>,
) -> CreatedResult {
    let Json(request) = payload?;
    let name = required(request.name, "name")?;

    let client = state
        .service
        .create_client(name, request.phone, request.observations)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": client })),
    ))
}

/// PUT /api/clients
pub async fn update_client(
    State(state): State<AppState>,
    payload: Result<Json<UpdateClientRequest>, JsonRejection>,
) -> JsonResult {
    let Json(request) = payload?;
    let id = required(request.id, "id")?;

    let update = ClientUpdate {
        name: request.name,
        phone: request.phone,
        observations: request.observations,
        coin_balance: request.coin_balance,
        debt_balance: request.debt_balance.map(|a| a.to_cents()).transpose()?,
    };

    let client = state.service.update_client(id, update).await?;
    Ok(Json(json!({ "success": true, "data": client })))
}

/// DELETE /api/clients?id=
pub async fn delete_client(
    State(state): State<AppState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> JsonResult {
    let id = required_id(query)?;
    state.service.delete_client(id).await?;
    Ok(Json(json!({ "success": true })))
}

// === Coin ledger ===

/// GET /api/coin-transactions?client_id=&limit=
pub async fn list_coin_transactions(
    State(state): State<AppState>,
    query: Result<Query<LedgerQuery>, QueryRejection>,
) -> JsonResult {
    let Query(query) = query?;
    let transactions = state
        .service
        .list_coin_transactions(query.client_id, query.limit)
        .await?;
    Ok(Json(json!({ "success": true, "data": transactions })))
}

/// POST /api/coin-transactions
pub async fn post_coin_transaction(
    State(state): State<AppState>,
    payload: Result<Json<CoinTransactionRequest>, JsonRejection>,
) -> CreatedResult {
    let Json(request) = payload?;
    let client_id = required(request.client_id, "client_id")?;
    let amount = required_amount(request.amount)?;

    let result = state
        .service
        .post_coin_transaction(client_id, request.client_name, amount)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": result.transaction,
            "newBalance": result.new_balance,
        })),
    ))
}

/// DELETE /api/coin-transactions?id= - compensates the balance, then removes the entry.
pub async fn reverse_coin_transaction(
    State(state): State<AppState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> JsonResult {
    let id = required_id(query)?;
    let result = state.service.reverse_coin_transaction(id).await?;
    Ok(Json(json!({
        "success": true,
        "newBalance": result.new_balance,
    })))
}

// === Debt ledger ===

/// GET /api/debt-transactions?client_id=&current_month=&limit=
pub async fn list_debt_transactions(
    State(state): State<AppState>,
    query: Result<Query<LedgerQuery>, QueryRejection>,
) -> JsonResult {
    let Query(query) = query?;
    let transactions = state
        .service
        .list_debt_transactions(query.client_id, query.current_month, query.limit)
        .await?;
    Ok(Json(json!({ "success": true, "data": transactions })))
}

/// POST /api/debt-transactions
pub async fn post_debt_transaction(
    State(state): State<AppState>,
    payload: Result<Json<DebtTransactionRequest>, JsonRejection>,
) -> CreatedResult {
    let Json(request) = payload?;
    let client_id = required(request.client_id, "client_id")?;
    let amount = required_amount(request.amount)?;
    let transaction_type =
        parse_transaction_type(&required(request.transaction_type, "transaction_type")?)?;

    let result = state
        .service
        .post_debt_transaction(
            client_id,
            request.client_name,
            amount,
            transaction_type,
            request.notes,
            request.branch,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": result.transaction,
            "newBalance": result.new_balance,
        })),
    ))
}

/// DELETE /api/debt-transactions?id= - inverse-applies the entry and drops its mirrored sale.
pub async fn reverse_debt_transaction(
    State(state): State<AppState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> JsonResult {
    let id = required_id(query)?;
    let result = state.service.reverse_debt_transaction(id).await?;
    Ok(Json(json!({
        "success": true,
        "newBalance": result.new_balance,
        "removedSales": result.removed_sales,
    })))
}

// === Sales and expenses ===

pub async fn list_sales(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> JsonResult {
    let Query(query) = query?;
    let sales = state.service.list_sales(query.limit).await?;
    Ok(Json(json!({ "success": true, "data": sales })))
}

/// POST /api/sales - one sale or an array of them, saved all or nothing.
pub async fn record_sales(
    State(state): State<AppState>,
    payload: Result<Json<OneOrMany<SaleRequest>>, JsonRejection>,
) -> CreatedResult {
    let Json(body) = payload?;
    let drafts = body
        .into_vec()
        .into_iter()
        .map(SaleRequest::into_draft)
        .collect::<Result<Vec<_>, _>>()?;

    let sales = state.service.record_sales(drafts).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "count": sales.len(), "data": sales })),
    ))
}

pub async fn update_sale(
    State(state): State<AppState>,
    payload: Result<Json<UpdateSaleRequest>, JsonRejection>,
) -> JsonResult {
    let Json(request) = payload?;
    let (id, update) = request.into_update()?;
    let sale = state.service.update_sale(id, update).await?;
    Ok(Json(json!({ "success": true, "data": sale })))
}

pub async fn delete_sale(
    State(state): State<AppState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> JsonResult {
    let id = required_id(query)?;
    state.service.delete_sale(id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> JsonResult {
    let Query(query) = query?;
    let expenses = state.service.list_expenses(query.limit).await?;
    Ok(Json(json!({ "success": true, "data": expenses })))
}

/// POST /api/expenses - one expense or an array of them, saved all or nothing.
pub async fn record_expenses(
    State(state): State<AppState>,
    payload: Result<Json<OneOrMany<ExpenseRequest>>, JsonRejection>,
) -> CreatedResult {
    let Json(body) = payload?;
    let drafts = body
        .into_vec()
        .into_iter()
        .map(ExpenseRequest::into_draft)
        .collect::<Result<Vec<_>, _>>()?;

    let expenses = state.service.record_expenses(drafts).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "count": expenses.len(), "data": expenses })),
    ))
}

pub async fn update_expense(
    State(state): State<AppState>,
    payload: Result<Json<UpdateExpenseRequest>, JsonRejection>,
) -> JsonResult {
    let Json(request) = payload?;
    let (id, update) = request.into_update()?;
    let expense = state.service.update_expense(id, update).await?;
    Ok(Json(json!({ "success": true, "data": expense })))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> JsonResult {
    let id = required_id(query)?;
    state.service.delete_expense(id).await?;
    Ok(Json(json!({ "success": true })))
}

// === Point of sale ===

/// POST /api/sale
pub async fn register_pos_sale(
    State(state): State<AppState>,
    payload: Result<Json<PosSaleRequest>, JsonRejection>,
) -> JsonResult {
    let Json(request) = payload?;
    let phone = required(request.phone, "phone")?;
    let amount = required_amount(request.amount)?;

    let result = state
        .service
        .register_pos_sale(&phone, amount, request.is_credit, request.client_name)
        .await?;
    Ok(Json(json!({
        "success": true,
        "data": result.client,
        "earnedCoins": result.coins_earned,
        "createdClient": result.created_client,
    })))
}

// === Reports and maintenance ===

pub async fn analytics(State(state): State<AppState>) -> JsonResult {
    let report = state.service.analytics().await?;
    Ok(Json(json!({ "success": true, "data": report })))
}

pub async fn check_integrity(State(state): State<AppState>) -> JsonResult {
    let report = state.service.check_integrity().await?;
    Ok(Json(json!({
        "success": true,
        "healthy": report.is_healthy(),
        "data": report,
    })))
}

pub async fn rebuild_balances(State(state): State<AppState>) -> JsonResult {
    let repaired = state.service.rebuild_balances().await?;
    Ok(Json(json!({ "success": true, "repaired": repaired })))
}
