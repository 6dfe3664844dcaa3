use serde::{Deserialize, Serialize};

use crate::domain::ban::BanStatus;

/// An operator request to ban a storage endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanStorageDto {
    pub storage: String,
    pub status: BanStatus,

    #[serde(default)]
    pub vo: Option<String>,
    #[serde(default)]
    pub timeout: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// An operator request to ban a user DN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanUserDto {
    pub user_dn: String,

    #[serde(default)]
    pub message: Option<String>,
}
