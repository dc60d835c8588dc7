use super::types::*;
use super::AppState;
use crate::account::auth::{self, Claims};
use crate::account::types::{Account, BadgeTier, CardTier};
use crate::error::ApiError;
use crate::rate_limit::Admission;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::{debug_handler, Json};
use tracing::{debug, info};

/// Limiter key: first forwarded address, or "anonymous" when the request
/// carries none.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Protected-route gate: rate limiter first, then stateless credential
/// validation. The store is not consulted here.
fn guard(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
    if state.limiter.admit(&client_key(headers)) == Admission::RateLimited {
        return Err(ApiError::RateLimited);
    }
    let token = bearer_token(headers).ok_or(ApiError::MissingCredential)?;
    state.tokens.verify(token).map_err(ApiError::from)
}

fn resolve(state: &AppState, user_id: &str) -> Result<Account, ApiError> {
    Ok(state.store.get(user_id)?.ok_or(ApiError::AccountNotFound)?)
}

#[debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if req.email.is_empty() || !req.email.contains('@') {
        return Err(ApiError::Validation("a valid email is required".to_string()));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("a password is required".to_string()));
    }

    let password_hash = auth::hash_password(&req.password)?;
    let account = Account::new(req.email.clone(), password_hash, state.starting_balance);
    state.store.insert(account.clone())?;
    info!(user = %account.id, "account created");

    let token = state.tokens.issue(&account.id, &account.email)?;
    let session_id = state.sessions.create(&account.id);
    Ok(Json(AuthResponse {
        user: account.public_view(),
        token,
        session_id,
    }))
}

#[debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    // Unknown email and wrong password are indistinguishable on the wire
    let account = state
        .store
        .find_by_email(&req.email)?
        .ok_or(ApiError::InvalidLogin)?;
    auth::verify_password(&req.password, &account.password_hash)
        .map_err(|_| ApiError::InvalidLogin)?;

    let token = state.tokens.issue(&account.id, &account.email)?;
    let session_id = state.sessions.create(&account.id);
    debug!(user = %account.id, "login");
    Ok(Json(AuthResponse {
        user: account.public_view(),
        token,
        session_id,
    }))
}

/// Best-effort: a missing or invalid credential still yields success,
/// matching the tolerant logout contract.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<SimpleResponse> {
    if let Some(token) = bearer_token(&headers) {
        if let Ok(claims) = state.tokens.verify(token) {
            state.sessions.remove_for_user(&claims.user_id);
            debug!(user = %claims.user_id, "sessions cleared");
        }
    }
    Json(SimpleResponse { success: true })
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, ApiError> {
    let claims = guard(&state, &headers)?;
    let account = resolve(&state, &claims.user_id)?;
    Ok(Json(MeResponse {
        user: account.public_view(),
    }))
}

#[debug_handler]
pub async fn buy_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BuyCardRequest>,
) -> Result<Json<BuyCardResponse>, ApiError> {
    let claims = guard(&state, &headers)?;
    let tier =
        CardTier::parse(&req.card_id).ok_or_else(|| ApiError::UnknownCard(req.card_id.clone()))?;

    let purchase = state.engine.buy_card(&claims.user_id, tier)?;
    Ok(Json(BuyCardResponse {
        success: true,
        new_balance: purchase.new_balance,
        voucher: purchase.voucher,
    }))
}

#[debug_handler]
pub async fn scratch_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ScratchCardRequest>,
) -> Result<Json<ScratchCardResponse>, ApiError> {
    let claims = guard(&state, &headers)?;
    let tier =
        CardTier::parse(&req.card_id).ok_or_else(|| ApiError::UnknownCard(req.card_id.clone()))?;

    let outcome = state
        .engine
        .scratch_card(&claims.user_id, tier, &req.voucher)?;
    Ok(Json(ScratchCardResponse {
        prize: outcome.prize,
        new_balance: outcome.new_balance,
    }))
}

#[debug_handler]
pub async fn link_wallet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LinkWalletRequest>,
) -> Result<Json<LinkWalletResponse>, ApiError> {
    let claims = guard(&state, &headers)?;
    if req.wallet_address.is_empty() {
        return Err(ApiError::Validation(
            "wallet address is required".to_string(),
        ));
    }

    let updated = crate::account::store::update(&*state.store, &claims.user_id, |account| {
        if let Some(previous) = &account.wallet_address {
            if previous != &req.wallet_address {
                info!(user = %account.id, "wallet re-linked to a new address");
            }
        }
        account.wallet_address = Some(req.wallet_address.clone());
        Ok::<(), ApiError>(())
    })?;

    Ok(Json(LinkWalletResponse {
        success: true,
        user: updated.public_view(),
    }))
}

#[debug_handler]
pub async fn mint_badge(
    State(state): State<AppState>,
    Path(badge_type): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MintBadgeResponse>, ApiError> {
    // Limiter and authenticator run before any request interpretation
    let claims = guard(&state, &headers)?;
    let tier =
        BadgeTier::parse(&badge_type).ok_or_else(|| ApiError::UnknownBadge(badge_type.clone()))?;
    // 404 for a vanished account, before any debit
    resolve(&state, &claims.user_id)?;

    let outcome = state.coordinator.mint_badge(&claims.user_id, tier).await?;
    Ok(Json(MintBadgeResponse {
        success: true,
        message: format!("{} badge minted successfully", tier),
        transaction_hash: Some(outcome.transaction_hash),
        new_balance: outcome.new_balance,
    }))
}
