use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{error, info};
use mongodb::bson::{doc, to_bson};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::access::CurrentUser;
use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::{AdminSettings, FrontlinerInfo, NgoInfo, PublicUser, Role, User};

pub const TOKEN_COOKIE: &str = "token";

const TOKEN_TTL_HOURS: i64 = 24;
const VERIFICATION_TTL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

pub fn create_jwt(user_id: &str, role: Role, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(TOKEN_TTL_HOURS);
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: expiration.timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// HTTP-only session cookie carrying the signed token.
pub fn auth_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(CookieDuration::hours(TOKEN_TTL_HOURS))
        .finish()
}

pub fn clear_auth_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(CookieDuration::ZERO)
        .finish()
}

fn generate_verification_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub ngo_info: Option<NgoInfo>,
    pub frontliner_info: Option<FrontlinerInfo>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

/// POST /api/v1/user/register
///
/// Two-phase: the unverified record is created first, the verification
/// mail is dispatched best-effort afterwards. A failed dispatch leaves the
/// record in place and is surfaced in the 201 message; resend-verification
/// is the compensating action.
pub async fn register(
    data: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let RegisterRequest {
        name,
        email,
        password,
        role,
        ngo_info,
        frontliner_info,
    } = payload.into_inner();

    let (name, email, password, role) = match (non_empty(name), non_empty(email), non_empty(password), role) {
        (Some(n), Some(e), Some(p), Some(r)) => (n, e, p, r),
        _ => return Err(ApiError::validation("All fields are required")),
    };

    let users = data.mongodb.db.collection::<User>("users");
    let existing = users
        .find_one(doc! { "email": &email })
        .await
        .map_err(ApiError::internal)?;
    if existing.is_some() {
        return Err(ApiError::validation("User already exists"));
    }

    let hashed_password = hash(&password, DEFAULT_COST).map_err(ApiError::internal)?;
    let verification_token = generate_verification_token();
    let now = Utc::now();

    let new_user = User {
        user_id: Uuid::new_v4().to_string(),
        name,
        email,
        password: hashed_password,
        role,
        admin_settings: (role == Role::Admin).then(AdminSettings::default),
        ngo_info: (role == Role::PartnerNGO).then(|| ngo_info.unwrap_or_default()),
        frontliner_info: (role == Role::Frontliner).then(|| frontliner_info.unwrap_or_default()),
        is_active: true,
        is_verified: false,
        verification_token: Some(verification_token.clone()),
        verification_token_expiry: Some(now + Duration::hours(VERIFICATION_TTL_HOURS)),
        last_login: None,
        created_at: now,
        updated_at: now,
    };
    users.insert_one(&new_user).await.map_err(ApiError::internal)?;
    info!("User registered: {} ({})", new_user.user_id, new_user.role.as_str());

    let email_sent = data
        .mailer
        .send_verification_email(&new_user.email, &verification_token, &new_user.name)
        .await;
    let message = if email_sent {
        "User registered successfully. Please check your email to verify your account."
    } else {
        "User registered successfully, but verification email could not be sent. Please contact support."
    };

    Ok(HttpResponse::Created().json(json!({
        "message": message,
        "user": PublicUser::from(new_user),
    })))
}

/// POST /api/v1/user/login
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let LoginRequest { email, password } = payload.into_inner();
    let (email, password) = match (non_empty(email), non_empty(password)) {
        (Some(e), Some(p)) => (e, p),
        _ => return Err(ApiError::validation("All fields are required")),
    };

    let users = data.mongodb.db.collection::<User>("users");
    let user = users
        .find_one(doc! { "email": &email })
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::validation("Invalid credentials"))?;

    if !verify(&password, &user.password).unwrap_or(false) {
        return Err(ApiError::validation("Invalid credentials"));
    }
    if !user.is_verified {
        return Err(ApiError::unauthorized(
            "Please verify your email address before logging in. Check your inbox for the verification link.",
        ));
    }

    let token = create_jwt(&user.user_id, user.role, &data.config.jwt_secret)
        .map_err(ApiError::internal)?;

    let last_login = to_bson(&Utc::now()).map_err(ApiError::internal)?;
    if let Err(err) = users
        .update_one(doc! { "userId": &user.user_id }, doc! { "$set": { "lastLogin": last_login } })
        .await
    {
        error!("Failed to stamp lastLogin for {}: {}", user.user_id, err);
    }

    Ok(HttpResponse::Ok()
        .cookie(auth_cookie(&token, data.config.secure_cookies))
        .json(json!({
            "message": format!("Welcome back, {}", user.name),
            "user": PublicUser::from(user),
        })))
}

/// GET /api/v1/user/logout
pub async fn logout(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(clear_auth_cookie(data.config.secure_cookies))
        .json(json!({
            "message": "Logged out Successfully.",
            "success": true,
        }))
}

/// GET /api/v1/user/profile
pub async fn get_profile(
    data: web::Data<AppState>,
    current: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let users = data.mongodb.db.collection::<User>("users");
    let user = users
        .find_one(doc! { "userId": &current.user_id })
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({ "user": PublicUser::from(user) })))
}

/// GET /api/v1/user/verify-email/{token}
pub async fn verify_email(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let token = path.into_inner();
    let users = data.mongodb.db.collection::<User>("users");

    let user = users
        .find_one(doc! { "verificationToken": &token })
        .await
        .map_err(ApiError::internal)?;
    let user = match user {
        Some(u) if u.verification_token_expiry.is_some_and(|expiry| expiry > Utc::now()) => u,
        _ => return Err(ApiError::validation("Invalid or expired verification token")),
    };

    users
        .update_one(
            doc! { "userId": &user.user_id },
            doc! {
                "$set": { "isVerified": true },
                "$unset": { "verificationToken": "", "verificationTokenExpiry": "" },
            },
        )
        .await
        .map_err(ApiError::internal)?;
    info!("Email verified for user {}", user.user_id);

    Ok(HttpResponse::Ok().json(json!({
        "message": "Email verified successfully! You can now log in to your account."
    })))
}

/// POST /api/v1/user/resend-verification
pub async fn resend_verification(
    data: web::Data<AppState>,
    payload: web::Json<ResendVerificationRequest>,
) -> Result<HttpResponse, ApiError> {
    let users = data.mongodb.db.collection::<User>("users");
    let user = users
        .find_one(doc! { "email": &payload.email })
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.is_verified {
        return Err(ApiError::validation("Email is already verified"));
    }

    let verification_token = generate_verification_token();
    let expiry = to_bson(&(Utc::now() + Duration::hours(VERIFICATION_TTL_HOURS)))
        .map_err(ApiError::internal)?;
    users
        .update_one(
            doc! { "userId": &user.user_id },
            doc! { "$set": {
                "verificationToken": &verification_token,
                "verificationTokenExpiry": expiry,
            } },
        )
        .await
        .map_err(ApiError::internal)?;

    let email_sent = data
        .mailer
        .send_verification_email(&user.email, &verification_token, &user.name)
        .await;
    if !email_sent {
        return Ok(HttpResponse::InternalServerError().json(json!({
            "message": "Failed to send verification email. Please try again later."
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Verification email sent successfully. Please check your inbox."
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn jwt_round_trip_preserves_identity_and_role() {
        let token = create_jwt("u-42", Role::PartnerNGO, SECRET).unwrap();
        let claims = validate_jwt(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "u-42");
        assert_eq!(claims.role, Role::PartnerNGO);
    }

    #[test]
    fn jwt_rejects_wrong_secret() {
        let token = create_jwt("u-42", Role::Admin, SECRET).unwrap();
        assert!(validate_jwt(&token, "other-secret").is_err());
    }

    #[test]
    fn jwt_rejects_expired_token() {
        let claims = Claims {
            sub: "u-42".to_string(),
            role: Role::Frontliner,
            exp: (Utc::now() - Duration::hours(2)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_ref()),
        )
        .unwrap();
        assert!(validate_jwt(&token, SECRET).is_err());
    }

    #[test]
    fn auth_cookie_is_http_only_lax_one_day() {
        let cookie = auth_cookie("abc", false);
        assert_eq!(cookie.name(), TOKEN_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(CookieDuration::hours(24)));
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn clearing_cookie_expires_it() {
        let cookie = clear_auth_cookie(true);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn verification_tokens_are_64_hex_chars_and_random() {
        let a = generate_verification_token();
        let b = generate_verification_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn blank_fields_count_as_missing() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("x".to_string())), Some("x".to_string()));
    }
}
