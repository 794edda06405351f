// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{get, post, web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::task::{Context, Poll};
use utoipa::ToSchema;

use crate::api::ApiResponse;
use crate::errors::{AppError, AppResult};
use crate::models::{NewUser, Role, User};
use crate::{db, validation, AppState};

pub const BCRYPT_COST: u32 = 12;
pub const TOKEN_COOKIE: &str = "token";
pub const SESSION_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

/// Authenticated caller. Built per request from the stored user row, so a
/// deactivated account or a changed role takes effect immediately.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Principal {
    #[serde(rename = "id")]
    pub user_id: i32,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role.grants(Role::Admin)
    }
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            role: user.role,
        }
    }
}

/// User id from a verified token, attached by [`SessionMiddleware`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SessionUser(i32);

impl FromRequest for Principal {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let session_user = req.extensions().get::<SessionUser>().copied();
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let SessionUser(user_id) =
                session_user.ok_or_else(|| AppError::Unauthorized("Not authorized, no token".into()))?;
            let state =
                state.ok_or_else(|| AppError::Internal("application state is not configured".into()))?;

            match db::get_user(&state.pool, user_id).await? {
                Some(user) if user.is_active => Ok(Principal::from(user)),
                Some(_) => Err(AppError::Unauthorized("Account is deactivated".into())),
                None => Err(AppError::Unauthorized("Not authorized, token failed".into())),
            }
        })
    }
}

pub fn require_role(principal: &Principal, role: Role) -> AppResult<()> {
    if principal.role.grants(role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role '{}' is not allowed to access this resource",
            principal.role
        )))
    }
}

/// Passes for the owner of a resource or an admin.
pub fn require_self_or_admin(principal: &Principal, owner_id: i32) -> AppResult<()> {
    if principal.user_id == owner_id || principal.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not authorized to access this resource".into()))
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    Ok(hash(password, BCRYPT_COST)?)
}

pub fn generate_token(secret: &str, user_id: i32, email: &str, role: Role) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(SESSION_DAYS))
        .ok_or_else(|| AppError::Internal("token expiry out of range".into()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role,
        exp: expiration,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, token)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::None)
        .max_age(time::Duration::days(SESSION_DAYS))
        .finish()
}

fn removal_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build(TOKEN_COOKIE, "")
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::None)
        .finish();
    cookie.make_removal();
    cookie
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SigninRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created"),
        (status = 400, description = "Missing fields, invalid data or email already registered")
    ),
    tag = "auth"
)]
#[post("/auth/signup")]
pub async fn signup(
    state: web::Data<AppState>,
    payload: web::Json<SignupRequest>,
) -> AppResult<HttpResponse> {
    let payload = payload.into_inner();
    let (Some(full_name), Some(email), Some(password)) =
        (payload.full_name, payload.email, payload.password)
    else {
        return Err(AppError::validation("All fields are required"));
    };

    let (first_name, last_name) = validation::split_full_name(&full_name)?;
    let email = validation::normalize_email(&email)?;
    validation::validate_password(&password)?;

    if db::find_user_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::validation("User already exists"));
    }

    let password_hash = hash_password(&password)?;
    let user = db::insert_user(
        &state.pool,
        &NewUser {
            email,
            password_hash,
            first_name,
            last_name,
            role: Role::User,
            email_verified: false,
        },
    )
    .await
    .map_err(|e| AppError::from_unique(e, "User already exists"))?;

    log::info!("user {} signed up", user.id);
    Ok(HttpResponse::Created().json(ApiResponse::ok(user).with_message("User created successfully")))
}

#[utoipa::path(
    post,
    path = "/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in, session cookie set", body = Principal),
        (status = 401, description = "Invalid credentials or deactivated account")
    ),
    tag = "auth"
)]
#[post("/auth/signin")]
pub async fn signin(
    state: web::Data<AppState>,
    payload: web::Json<SigninRequest>,
) -> AppResult<HttpResponse> {
    let payload = payload.into_inner();
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(AppError::validation("Email and password are required"));
    };
    let email = email.trim().to_lowercase();

    let invalid = || AppError::Unauthorized("Invalid email or password".into());

    let Some(user) = db::find_user_by_email(&state.pool, &email).await? else {
        return Err(invalid());
    };
    if !verify(&password, &user.password_hash)? {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::Unauthorized("Account is deactivated".into()));
    }

    let token = generate_token(&state.jwt_secret, user.id, &user.email, user.role)?;
    let principal = Principal::from(user);

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(token, state.secure_cookies))
        .json(ApiResponse::ok(principal).with_message("Signed in successfully")))
}

#[utoipa::path(
    post,
    path = "/auth/signout",
    responses((status = 200, description = "Session cookie cleared")),
    tag = "auth"
)]
#[post("/auth/signout")]
pub async fn signout(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(removal_cookie(state.secure_cookies))
        .json(ApiResponse::message("Signed out successfully"))
}

#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Current session", body = Principal),
        (status = 401, description = "No valid session")
    ),
    tag = "auth"
)]
#[get("/auth/session")]
pub async fn session(principal: Principal) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(principal))
}

fn request_token(req: &ServiceRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

/// Middleware that:
/// - reads the `token` cookie, falling back to `Authorization: Bearer <jwt>`
/// - validates the JWT with the secret from `AppState`
/// - puts the token's user id into `req.extensions_mut()`
///
/// Requests without a valid token pass through anonymously. The `Principal`
/// extractor loads the user and rejects missing sessions and inactive
/// accounts where a session is required.
pub struct SessionMiddleware;

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareInner { service }))
    }
}

pub struct SessionMiddlewareInner<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let secret = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.jwt_secret.clone());

        if let (Some(secret), Some(token)) = (secret, request_token(&req)) {
            match decode_token(&secret, &token) {
                Some(claims) => {
                    req.extensions_mut().insert(SessionUser(claims.sub));
                }
                None => log::debug!("ignoring invalid session token on {}", req.path()),
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await })
    }
}
