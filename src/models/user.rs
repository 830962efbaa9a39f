use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    /// Absent for accounts created through an OAuth provider.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub is_two_factor_enabled: bool,
    pub email_verified: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_verified(&self) -> bool {
        self.email_verified.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Landlord,
    Tenant,
    Admin,
}

impl UserRole {
    /// Tenants use the mobile app; this dashboard is for landlords and admins.
    pub fn may_use_dashboard(self) -> bool {
        !matches!(self, UserRole::Tenant)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Landlord
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}
