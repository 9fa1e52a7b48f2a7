use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::derived::kudos_balance;
use crate::error::AppError;
use crate::model::kudos::{KudosTransaction, NewKudos};
use crate::store::{Collection, Filter, Order, Query, RecordStore, RecordStoreExt};

#[derive(Deserialize, IntoParams)]
pub struct KudosFilter {
    /// Only this user's ledger
    pub user_id: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct KudosBalance {
    pub user_id: String,
    #[schema(example = 15)]
    pub total_kudos: i64,
    #[schema(example = 2)]
    pub transactions_count: u64,
}

/// Kudos ledger entries, newest first
#[utoipa::path(
    get,
    path = "/api/kudos/transactions",
    params(KudosFilter),
    responses(
        (status = 200, description = "Ledger entries", body = [KudosTransaction]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Kudos"
)]
pub async fn list_transactions(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    filter: web::Query<KudosFilter>,
) -> actix_web::Result<impl Responder> {
    let mut query = Query::new().order(Order::desc("created_at"));
    if let Some(user_id) = filter.into_inner().user_id {
        query = query.filter(Filter::eq("user_id", user_id));
    }

    let ledger: Vec<KudosTransaction> = store
        .find_as(Collection::KudosTransactions, query)
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(ledger))
}

/// Manually grant (or deduct) kudos
#[utoipa::path(
    post,
    path = "/api/kudos/transactions",
    request_body = NewKudos,
    responses(
        (status = 201, description = "Ledger entry added", body = KudosTransaction),
        (status = 400, description = "Zero amount"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Kudos"
)]
pub async fn give_kudos(
    auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    payload: web::Json<NewKudos>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let mut entry = payload.into_inner();
    if entry.amount == 0 {
        return Err(AppError::validation("amount must not be zero").into());
    }
    entry.given_by = auth.user_id.clone();
    entry.source_ref = None;

    let stored: KudosTransaction = store
        .insert_as(Collection::KudosTransactions, &entry)
        .await
        .map_err(AppError::from)?;

    tracing::info!(user_id = %stored.user_id, amount = stored.amount, given_by = %stored.given_by, "Kudos granted");
    Ok(HttpResponse::Created().json(stored))
}

/// Current balance, always summed from the ledger
#[utoipa::path(
    get,
    path = "/api/kudos/balance/{user_id}",
    params(
        ("user_id", description = "User ID")
    ),
    responses(
        (status = 200, description = "Balance", body = KudosBalance),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Kudos"
)]
pub async fn balance(
    _auth: AuthUser,
    store: web::Data<dyn RecordStore>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let user_id = path.into_inner();

    let ledger: Vec<KudosTransaction> = store
        .find_as(
            Collection::KudosTransactions,
            Query::new().filter(Filter::eq("user_id", user_id.clone())),
        )
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(KudosBalance {
        total_kudos: kudos_balance(&ledger),
        transactions_count: ledger.len() as u64,
        user_id,
    }))
}
