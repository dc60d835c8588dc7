// Request/response types for the JSON HTTP API
use crate::account::types::PublicAccount;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: PublicAccount,
    pub token: String,
    pub session_id: String,
}

#[derive(Serialize, Debug)]
pub struct SimpleResponse {
    pub success: bool,
}

#[derive(Serialize, Debug)]
pub struct MeResponse {
    pub user: PublicAccount,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BuyCardRequest {
    pub card_id: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BuyCardResponse {
    pub success: bool,
    pub new_balance: u64,
    pub voucher: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScratchCardRequest {
    pub card_id: String,
    pub voucher: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScratchCardResponse {
    pub prize: u64,
    pub new_balance: u64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LinkWalletRequest {
    pub wallet_address: String,
}

#[derive(Serialize, Debug)]
pub struct LinkWalletResponse {
    pub success: bool,
    pub user: PublicAccount,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MintBadgeResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    pub new_balance: u64,
}
