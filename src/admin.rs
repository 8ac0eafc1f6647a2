use actix_web::{web, HttpResponse};
use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::{doc, to_bson};
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::access::{self, CurrentUser};
use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::{AdminSettings, FrontlinerInfo, NgoInfo, PublicUser, Role, User};

const RECENT_USERS: i64 = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNgoRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub ngo_info: Option<NgoInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFrontlinerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub frontliner_info: Option<FrontlinerInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAdminSettingsRequest {
    pub project_notification_count: Option<i32>,
    pub notifications_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: u64,
    pub ngo_count: u64,
    pub frontliner_count: u64,
}

/// Admin-created accounts are pre-verified: the admin vouches for the
/// address, and there is no verification mail in this flow.
async fn create_managed_user(
    users: &Collection<User>,
    name: String,
    email: String,
    password: String,
    role: Role,
    ngo_info: Option<NgoInfo>,
    frontliner_info: Option<FrontlinerInfo>,
) -> Result<User, ApiError> {
    let existing = users
        .find_one(doc! { "email": &email })
        .await
        .map_err(ApiError::internal)?;
    if existing.is_some() {
        return Err(ApiError::validation("User with this email already exists"));
    }

    let hashed_password = hash(&password, DEFAULT_COST).map_err(ApiError::internal)?;
    let now = Utc::now();
    let new_user = User {
        user_id: Uuid::new_v4().to_string(),
        name,
        email,
        password: hashed_password,
        role,
        admin_settings: None,
        ngo_info,
        frontliner_info,
        is_active: true,
        is_verified: true,
        verification_token: None,
        verification_token_expiry: None,
        last_login: None,
        created_at: now,
        updated_at: now,
    };
    users.insert_one(&new_user).await.map_err(ApiError::internal)?;
    info!("Admin created {} user {}", role.as_str(), new_user.user_id);
    Ok(new_user)
}

/// POST /api/v1/admin/ngos
pub async fn create_ngo(
    data: web::Data<AppState>,
    payload: web::Json<CreateNgoRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (name, email, password) = match (payload.name, payload.email, payload.password) {
        (Some(n), Some(e), Some(p)) if !n.trim().is_empty() && !e.trim().is_empty() && !p.trim().is_empty() => {
            (n, e, p)
        }
        _ => return Err(ApiError::validation("All fields are required")),
    };

    // Default the organization name to the account name.
    let mut ngo_info = payload.ngo_info.unwrap_or_default();
    if ngo_info.name.trim().is_empty() {
        ngo_info.name = name.clone();
    }

    let users = data.mongodb.db.collection::<User>("users");
    let new_ngo = create_managed_user(
        &users,
        name,
        email,
        password,
        Role::PartnerNGO,
        Some(ngo_info),
        None,
    )
    .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "NGO created successfully",
        "ngo": PublicUser::from(new_ngo),
    })))
}

/// POST /api/v1/admin/frontliners
pub async fn create_frontliner(
    data: web::Data<AppState>,
    payload: web::Json<CreateFrontlinerRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (name, email, password) = match (payload.name, payload.email, payload.password) {
        (Some(n), Some(e), Some(p)) if !n.trim().is_empty() && !e.trim().is_empty() && !p.trim().is_empty() => {
            (n, e, p)
        }
        _ => return Err(ApiError::validation("All fields are required")),
    };

    let users = data.mongodb.db.collection::<User>("users");
    let new_frontliner = create_managed_user(
        &users,
        name,
        email,
        password,
        Role::Frontliner,
        None,
        Some(payload.frontliner_info.unwrap_or_default()),
    )
    .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Frontliner created successfully",
        "frontliner": PublicUser::from(new_frontliner),
    })))
}

async fn list_active_users(users: &Collection<User>, role: Role) -> Result<Vec<PublicUser>, ApiError> {
    let mut cursor = users
        .find(doc! { "role": role.as_str(), "isActive": true })
        .await
        .map_err(ApiError::internal)?;

    let mut listed = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(user) => listed.push(PublicUser::from(user)),
            Err(err) => {
                error!("Cursor error while listing users: {}", err);
                return Err(ApiError::internal(err));
            }
        }
    }
    Ok(listed)
}

/// GET /api/v1/admin/ngos
pub async fn get_all_ngos(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let users = data.mongodb.db.collection::<User>("users");
    let ngos = list_active_users(&users, Role::PartnerNGO).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "NGOs retrieved successfully",
        "count": ngos.len(),
        "ngos": ngos,
    })))
}

/// GET /api/v1/admin/frontliners
pub async fn get_all_frontliners(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let users = data.mongodb.db.collection::<User>("users");
    let frontliners = list_active_users(&users, Role::Frontliner).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Frontliners retrieved successfully",
        "count": frontliners.len(),
        "frontliners": frontliners,
    })))
}

fn merge_admin_settings(
    current: Option<AdminSettings>,
    payload: &UpdateAdminSettingsRequest,
) -> AdminSettings {
    let current = current.unwrap_or_default();
    AdminSettings {
        project_notification_count: payload
            .project_notification_count
            .unwrap_or(current.project_notification_count),
        notifications_enabled: payload
            .notifications_enabled
            .unwrap_or(current.notifications_enabled),
    }
}

/// PUT /api/v1/admin/settings/{user_id}
pub async fn update_admin_settings(
    data: web::Data<AppState>,
    current: CurrentUser,
    path: web::Path<String>,
    payload: web::Json<UpdateAdminSettingsRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    if let access::Access::Forbidden = access::own_account(&current, &user_id) {
        return Err(ApiError::forbidden("You can only update your own settings."));
    }

    let payload = payload.into_inner();
    let settings = merge_admin_settings(current.admin_settings.clone(), &payload);
    let users = data.mongodb.db.collection::<User>("users");
    let updated = users
        .find_one_and_update(
            doc! { "userId": &user_id },
            doc! { "$set": { "adminSettings": to_bson(&settings).map_err(ApiError::internal)? } },
        )
        .return_document(ReturnDocument::After)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Admin settings updated successfully",
        "admin": PublicUser::from(updated),
    })))
}

async fn recent_active_users(users: &Collection<User>, role: Role) -> Result<Vec<PublicUser>, ApiError> {
    let mut cursor = users
        .find(doc! { "role": role.as_str(), "isActive": true })
        .sort(doc! { "createdAt": -1 })
        .limit(RECENT_USERS)
        .await
        .map_err(ApiError::internal)?;

    let mut recent = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(user) => recent.push(PublicUser::from(user)),
            Err(err) => {
                error!("Cursor error while listing recent users: {}", err);
                return Err(ApiError::internal(err));
            }
        }
    }
    Ok(recent)
}

/// GET /api/v1/admin/dashboard/{user_id}
pub async fn get_admin_dashboard(
    data: web::Data<AppState>,
    current: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    if let access::Access::Forbidden = access::own_account(&current, &user_id) {
        return Err(ApiError::forbidden("You can only access your own dashboard."));
    }

    let users = data.mongodb.db.collection::<User>("users");
    let ngo_count = users
        .count_documents(doc! { "role": Role::PartnerNGO.as_str(), "isActive": true })
        .await
        .map_err(ApiError::internal)?;
    let frontliner_count = users
        .count_documents(doc! { "role": Role::Frontliner.as_str(), "isActive": true })
        .await
        .map_err(ApiError::internal)?;
    let total_users = users
        .count_documents(doc! { "isActive": true })
        .await
        .map_err(ApiError::internal)?;

    let recent_ngos = recent_active_users(&users, Role::PartnerNGO).await?;
    let recent_frontliners = recent_active_users(&users, Role::Frontliner).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Dashboard data retrieved successfully",
        "stats": AdminStats {
            total_users,
            ngo_count,
            frontliner_count,
        },
        "recentNGOs": recent_ngos,
        "recentFrontliners": recent_frontliners,
        "adminSettings": current.admin_settings.unwrap_or_default(),
    })))
}

/// PUT /api/v1/admin/users/{user_id}/status
///
/// Idempotent: setting the flag to its current value is a no-op update
/// that still reports success.
pub async fn toggle_user_status(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ToggleStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let is_active = payload.is_active;

    let users = data.mongodb.db.collection::<User>("users");
    let updated = users
        .find_one_and_update(
            doc! { "userId": &user_id },
            doc! { "$set": { "isActive": is_active } },
        )
        .return_document(ReturnDocument::After)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let message = if is_active {
        "User activated successfully"
    } else {
        "User deactivated successfully"
    };
    Ok(HttpResponse::Ok().json(json!({
        "message": message,
        "user": PublicUser::from(updated),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_merge_keeps_unspecified_fields() {
        let current = AdminSettings {
            project_notification_count: 7,
            notifications_enabled: false,
        };
        let payload: UpdateAdminSettingsRequest = serde_json::from_value(json!({
            "projectNotificationCount": 12,
        }))
        .unwrap();
        let merged = merge_admin_settings(Some(current), &payload);
        assert_eq!(merged.project_notification_count, 12);
        assert!(!merged.notifications_enabled);
    }

    #[test]
    fn settings_merge_starts_from_defaults_when_unset() {
        let payload: UpdateAdminSettingsRequest = serde_json::from_value(json!({
            "notificationsEnabled": false,
        }))
        .unwrap();
        let merged = merge_admin_settings(None, &payload);
        assert_eq!(merged.project_notification_count, 0);
        assert!(!merged.notifications_enabled);
    }

    #[test]
    fn stats_serialize_with_the_dashboard_field_names() {
        let stats = serde_json::to_value(AdminStats {
            total_users: 10,
            ngo_count: 4,
            frontliner_count: 5,
        })
        .unwrap();
        assert_eq!(stats["totalUsers"], 10);
        assert_eq!(stats["ngoCount"], 4);
        assert_eq!(stats["frontlinerCount"], 5);
    }
}
