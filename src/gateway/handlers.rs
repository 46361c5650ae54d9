//! HTTP handlers.
//!
//! Thin adapters: parse, call the orchestrator or admin service, wrap in the
//! response envelope. Amounts cross the wire as strings to preserve scale.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, Identity, OtpId, PendingTransferId, UserId};
use crate::flow::{AdjustDirection, PendingTransfer};
use crate::ledger::{Account, LedgerEntry, TransferReceipt};
use crate::money;

use super::state::AppState;
use super::types::{ApiError, ApiResult, ok};

// ----------------------------------------------------------------------
// DTOs
// ----------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct WalletData {
    pub account_id: AccountId,
    pub address: String,
    pub balance: String,
    pub active: bool,
    pub daily_transfer_limit: String,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for WalletData {
    fn from(a: Account) -> Self {
        Self {
            account_id: a.id,
            address: a.address,
            balance: money::format_amount(a.balance),
            active: a.active,
            daily_transfer_limit: money::format_amount(a.daily_transfer_limit),
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntryData {
    pub id: u64,
    pub kind: &'static str,
    /// Signed: debits negative, credits positive.
    pub amount: String,
    pub balance_after: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<AccountId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for EntryData {
    fn from(e: LedgerEntry) -> Self {
        let signed = e.signed_amount();
        Self {
            id: e.id,
            kind: e.kind.as_str(),
            amount: money::format_amount(signed),
            balance_after: money::format_amount(e.balance_after),
            counterparty: e.counterparty,
            description: e.description,
            reference_id: e.reference_id,
            status: e.status.as_str(),
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PendingData {
    pub id: PendingTransferId,
    pub sender_account: AccountId,
    pub recipient_account: AccountId,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub state: &'static str,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<PendingTransfer> for PendingData {
    fn from(t: PendingTransfer) -> Self {
        Self {
            id: t.id,
            sender_account: t.sender_account,
            recipient_account: t.recipient_account,
            amount: money::format_amount(t.amount),
            purpose: t.purpose,
            state: t.state.as_str(),
            created_at: t.created_at,
            expires_at: t.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReceiptData {
    pub reference_id: String,
    pub balance: String,
}

// ----------------------------------------------------------------------
// Wallet
// ----------------------------------------------------------------------

/// POST /api/v1/wallet
pub async fn open_wallet(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> ApiResult<WalletData> {
    let account = state.orchestrator.open_wallet(&identity).await?;
    ok(account.into())
}

/// GET /api/v1/wallet
pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> ApiResult<WalletData> {
    let account = state.orchestrator.wallet_of(&identity).await?;
    ok(account.into())
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    50
}

/// GET /api/v1/wallet/history
pub async fn wallet_history(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<EntryData>> {
    let limit = query.limit.min(500);
    let entries = state.orchestrator.history(&identity, limit).await?;
    ok(entries.into_iter().map(EntryData::from).collect())
}

// ----------------------------------------------------------------------
// Transfer protocol
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    pub recipient_address: String,
    pub amount: String,
    #[serde(default)]
    pub purpose: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitiateData {
    pub otp_id: OtpId,
}

/// POST /api/v1/transfer/initiate
pub async fn initiate_transfer(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<InitiateRequest>,
) -> ApiResult<InitiateData> {
    let amount = money::parse_amount(&req.amount)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let otp_id = state
        .orchestrator
        .initiate_transfer(&identity, &req.recipient_address, amount, req.purpose)
        .await?;
    ok(InitiateData { otp_id })
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub otp_id: OtpId,
    pub code: String,
}

/// POST /api/v1/transfer/verify
///
/// Pending/accept flow: consumes the OTP and creates a revocable offer.
pub async fn verify_transfer(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<PendingData> {
    let transfer = state
        .orchestrator
        .verify_and_create_pending(&identity, req.otp_id, &req.code)
        .await?;
    ok(transfer.into())
}

/// POST /api/v1/transfer/commit
///
/// Immediate-confirm flow: consumes the OTP and commits in one step.
pub async fn commit_transfer(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<ReceiptData> {
    let receipt = state
        .orchestrator
        .verify_and_commit(&identity, req.otp_id, &req.code)
        .await?;
    ok(sender_receipt(receipt))
}

fn sender_receipt(receipt: TransferReceipt) -> ReceiptData {
    ReceiptData {
        reference_id: receipt.reference_id,
        balance: money::format_amount(receipt.sender_balance_after),
    }
}

fn parse_pending_id(raw: &str) -> Result<PendingTransferId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("Invalid pending transfer id"))
}

/// POST /api/v1/transfer/pending/{id}/accept
pub async fn accept_pending(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<ReceiptData> {
    let id = parse_pending_id(&id)?;
    let receipt = state.orchestrator.accept_pending(&identity, id).await?;
    ok(ReceiptData {
        reference_id: receipt.reference_id,
        balance: money::format_amount(receipt.recipient_balance_after),
    })
}

/// POST /api/v1/transfer/pending/{id}/cancel
pub async fn cancel_pending(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_pending_id(&id)?;
    state.orchestrator.cancel_pending(&identity, id).await?;
    ok(())
}

/// GET /api/v1/transfer/incoming
pub async fn list_incoming(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> ApiResult<Vec<PendingData>> {
    let transfers = state.orchestrator.list_incoming(identity.user_id).await?;
    ok(transfers.into_iter().map(PendingData::from).collect())
}

/// GET /api/v1/transfer/outgoing
pub async fn list_outgoing(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> ApiResult<Vec<PendingData>> {
    let transfers = state.orchestrator.list_outgoing(identity.user_id).await?;
    ok(transfers.into_iter().map(PendingData::from).collect())
}

// ----------------------------------------------------------------------
// Earnings
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct EarningRequest {
    pub user_id: UserId,
    pub amount: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct BalanceData {
    pub balance: String,
}

/// POST /api/v1/admin/earning
///
/// Internal endpoint for task/engagement reward services.
pub async fn credit_earning(
    State(state): State<Arc<AppState>>,
    _admin: Identity,
    Json(req): Json<EarningRequest>,
) -> ApiResult<BalanceData> {
    let amount = money::parse_amount(&req.amount)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let balance = state
        .orchestrator
        .credit_earning(req.user_id, amount, &req.description)
        .await?;
    ok(BalanceData {
        balance: money::format_amount(balance),
    })
}

// ----------------------------------------------------------------------
// Admin
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub account_id: AccountId,
    pub amount: String,
    pub direction: AdjustDirection,
    pub description: String,
}

/// POST /api/v1/admin/adjust
pub async fn admin_adjust(
    State(state): State<Arc<AppState>>,
    admin: Identity,
    Json(req): Json<AdjustRequest>,
) -> ApiResult<BalanceData> {
    let amount = money::parse_amount(&req.amount)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let balance = state
        .admin
        .adjust_balance(&admin, req.account_id, amount, req.direction, &req.description)
        .await?;
    ok(BalanceData {
        balance: money::format_amount(balance),
    })
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /api/v1/admin/account/{id}/active
pub async fn admin_set_active(
    State(state): State<Arc<AppState>>,
    admin: Identity,
    Path(account_id): Path<AccountId>,
    Json(req): Json<SetActiveRequest>,
) -> ApiResult<()> {
    state
        .admin
        .set_account_active(&admin, account_id, req.active, req.reason.as_deref())
        .await?;
    ok(())
}

#[derive(Debug, Deserialize)]
pub struct SetLimitRequest {
    pub daily_transfer_limit: String,
}

/// POST /api/v1/admin/account/{id}/limit
pub async fn admin_set_limit(
    State(state): State<Arc<AppState>>,
    admin: Identity,
    Path(account_id): Path<AccountId>,
    Json(req): Json<SetLimitRequest>,
) -> ApiResult<()> {
    let limit = money::parse_amount(&req.daily_transfer_limit)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    state.admin.set_daily_limit(&admin, account_id, limit).await?;
    ok(())
}
