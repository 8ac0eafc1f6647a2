use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse};
use futures::future::{ok, ready, Ready};
use log::{error, warn};
use mongodb::bson::doc;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::{validate_jwt, TOKEN_COOKIE};
use crate::error::ApiError;
use crate::models::{AdminSettings, Role, User};

/// Identity resolved by the [`Authentication`] middleware and attached to
/// the request. Handlers receive it as an extractor.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub admin_settings: Option<AdminSettings>,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            name: user.name,
            email: user.email,
            role: user.role,
            admin_settings: user.admin_settings,
        }
    }
}

impl FromRequest for CurrentUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<CurrentUser>()
                .cloned()
                .ok_or_else(|| ApiError::unauthorized("User not Authenticated")),
        )
    }
}

/// Tagged outcome of a policy check. Ownership checks collapse
/// "does not exist" and "exists but is someone else's" into `NotFound`
/// so existence is never leaked; self-only resources (dashboards,
/// settings) are addressed by user id and answer `Forbidden` instead.
#[derive(Debug)]
pub enum Access<T> {
    Allowed(T),
    NotFound,
    Forbidden,
}

impl<T> Access<T> {
    pub fn into_result(self, resource: &str) -> Result<T, ApiError> {
        match self {
            Access::Allowed(value) => Ok(value),
            Access::NotFound => Err(ApiError::not_found(format!("{resource} not found"))),
            Access::Forbidden => Err(ApiError::forbidden("Access denied")),
        }
    }
}

pub fn owned<T>(resource: Option<T>, owns: impl FnOnce(&T) -> bool) -> Access<T> {
    match resource {
        Some(value) if owns(&value) => Access::Allowed(value),
        Some(_) | None => Access::NotFound,
    }
}

pub fn own_account(current: &CurrentUser, target_user_id: &str) -> Access<()> {
    if current.user_id == target_user_id {
        Access::Allowed(())
    } else {
        Access::Forbidden
    }
}

fn reject(req: ServiceRequest, status_fn: fn() -> actix_web::HttpResponseBuilder, message: &str) -> ServiceResponse<BoxBody> {
    let (parts, _payload) = req.into_parts();
    let response = status_fn()
        .json(json!({ "message": message, "success": false }))
        .map_into_boxed_body();
    ServiceResponse::new(parts, response)
}

/// Verifies the `token` cookie, resolves the embedded user id against the
/// `users` collection and attaches the resolved [`CurrentUser`]. Requests
/// failing any step are rejected with 401 before any handler runs.
#[derive(Debug)]
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthenticationMiddleware {
            service: Rc::new(service),
        })
    }
}

pub struct AuthenticationMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let state = match req.app_data::<web::Data<AppState>>() {
                Some(state) => state.clone(),
                None => {
                    error!("AppState missing in Authentication middleware");
                    return Ok(reject(req, HttpResponse::Unauthorized, "Authentication failed"));
                }
            };

            let token = match req.cookie(TOKEN_COOKIE) {
                Some(cookie) => cookie.value().to_string(),
                None => return Ok(reject(req, HttpResponse::Unauthorized, "User not Authenticated")),
            };

            let claims = match validate_jwt(&token, &state.config.jwt_secret) {
                Ok(claims) => claims,
                Err(err) => {
                    warn!("Rejected token: {}", err);
                    return Ok(reject(req, HttpResponse::Unauthorized, "Invalid token"));
                }
            };

            let users = state.mongodb.db.collection::<User>("users");
            let user = match users.find_one(doc! { "userId": &claims.sub }).await {
                Ok(Some(user)) => user,
                Ok(None) => return Ok(reject(req, HttpResponse::Unauthorized, "User not found")),
                Err(err) => {
                    error!("Error resolving authenticated user: {}", err);
                    return Ok(reject(req, HttpResponse::Unauthorized, "Authentication failed"));
                }
            };

            req.extensions_mut().insert(CurrentUser::from(user));
            let res = service.call(req).await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

/// Role gate applied after [`Authentication`]: 403 when the attached
/// identity's role differs from the scope's required role.
#[derive(Debug, Clone, Copy)]
pub struct RoleGuard {
    required: Role,
}

impl RoleGuard {
    pub fn new(required: Role) -> Self {
        Self { required }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RoleGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = RoleGuardMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RoleGuardMiddleware {
            service,
            required: self.required,
        })
    }
}

pub struct RoleGuardMiddleware<S> {
    service: S,
    required: Role,
}

impl<S, B> Service<ServiceRequest> for RoleGuardMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let attached_role = req.extensions().get::<CurrentUser>().map(|user| user.role);
        match attached_role {
            Some(role) if role == self.required => {
                let fut = self.service.call(req);
                Box::pin(async move { Ok(fut.await?.map_into_boxed_body()) })
            }
            Some(_) => {
                let message = match self.required {
                    Role::Admin => "Access denied. Admin privileges required.",
                    Role::PartnerNGO => "Access denied. NGO privileges required.",
                    Role::Frontliner => "Access denied. Frontliner privileges required.",
                };
                let response = reject(req, HttpResponse::Forbidden, message);
                Box::pin(async move { Ok(response) })
            }
            None => {
                let response = reject(req, HttpResponse::Unauthorized, "Authentication required");
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn current_user(user_id: &str, role: Role) -> CurrentUser {
        CurrentUser {
            user_id: user_id.to_string(),
            name: "Test".to_string(),
            email: "test@x.com".to_string(),
            role,
            admin_settings: None,
        }
    }

    fn project_owned_by(owner: &str) -> crate::models::Project {
        serde_json::from_value(json!({
            "projectId": "p-1",
            "title": "Wells",
            "status": "active",
            "createdBy": owner,
            "createdAt": Utc::now(),
            "updatedAt": Utc::now(),
        }))
        .unwrap()
    }

    #[test]
    fn owner_is_allowed_through() {
        let project = project_owned_by("u-1");
        let access = owned(Some(project), |p| p.created_by == "u-1");
        assert!(matches!(access, Access::Allowed(_)));
    }

    #[test]
    fn foreign_resource_reads_as_missing() {
        // Not-owned must be indistinguishable from nonexistent: 404, not 403.
        let project = project_owned_by("u-1");
        let access = owned(Some(project), |p| p.created_by == "u-2");
        assert!(matches!(access, Access::NotFound));

        let err = owned(None::<crate::models::Project>, |_| true)
            .into_result("Project")
            .unwrap_err();
        assert_eq!(err.to_string(), "Project not found");
    }

    #[test]
    fn self_resources_answer_forbidden_on_mismatch() {
        let user = current_user("u-1", Role::Admin);
        assert!(matches!(own_account(&user, "u-1"), Access::Allowed(())));
        assert!(matches!(own_account(&user, "u-2"), Access::Forbidden));
    }

    #[test]
    fn into_result_maps_forbidden_to_403() {
        let err = Access::<()>::Forbidden.into_result("Dashboard").unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));
    }
}
