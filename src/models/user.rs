use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account roles. The wire casing is exact: role checks and route guards
/// compare against these three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Frontliner,
    PartnerNGO,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Frontliner => "Frontliner",
            Role::PartnerNGO => "PartnerNGO",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSettings {
    #[serde(default)]
    pub project_notification_count: i32,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            project_notification_count: 0,
            notifications_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NgoInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub registration_number: String,
    #[serde(default)]
    pub contact_person: String,
    #[serde(default)]
    pub phone_number: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontlinerInfo {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub assigned_projects: Vec<String>,
    #[serde(default)]
    pub supervisor: String,
}

/// Stored user record. `password` holds the bcrypt hash and never leaves
/// the server: responses carry [`PublicUser`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_settings: Option<AdminSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ngo_info: Option<NgoInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontliner_info: Option<FrontlinerInfo>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token_expiry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the API exposes about a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_settings: Option<AdminSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ngo_info: Option<NgoInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontliner_info: Option<FrontlinerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            name: user.name,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            is_verified: user.is_verified,
            admin_settings: user.admin_settings,
            ngo_info: user.ngo_info,
            frontliner_info: user.frontliner_info,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn minimal_user_json() -> serde_json::Value {
        serde_json::json!({
            "userId": "u-1",
            "name": "A",
            "email": "a@x.com",
            "password": "$2b$10$hash",
            "role": "PartnerNGO",
            "createdAt": Utc::now(),
            "updatedAt": Utc::now(),
        })
    }

    #[test]
    fn role_wire_casing_is_exact() {
        assert_eq!(serde_json::to_string(&Role::PartnerNGO).unwrap(), "\"PartnerNGO\"");
        assert!(serde_json::from_str::<Role>("\"partnerngo\"").is_err());
    }

    #[test]
    fn missing_flags_default_to_active_unverified() {
        let user: User = serde_json::from_value(minimal_user_json()).unwrap();
        assert!(user.is_active);
        assert!(!user.is_verified);
        assert!(user.ngo_info.is_none());
    }

    #[test]
    fn public_projection_drops_the_password() {
        let user: User = serde_json::from_value(minimal_user_json()).unwrap();
        let public = serde_json::to_value(PublicUser::from(user)).unwrap();
        assert!(public.get("password").is_none());
        assert!(public.get("verificationToken").is_none());
        assert_eq!(public["role"], "PartnerNGO");
    }

    #[test]
    fn admin_settings_default_enables_notifications() {
        let settings = AdminSettings::default();
        assert!(settings.notifications_enabled);
        assert_eq!(settings.project_notification_count, 0);
    }
}
