//! Token-based authentication.
//!
//! Tokens are HS256 JWTs carrying the caller's identity and role set. The
//! [`AuthUser`] extractor turns the `Authorization: Bearer` header into a
//! typed session object; handlers receive it by value and never touch
//! ambient global state.

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::Json;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::domain::user::{Role, User, UserId};
use crate::error::{RelabError, Result};

use super::AppState;

/// Signing and verification keys plus token lifetime.
#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl AuthKeys {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    /// Issue a token for a freshly authenticated user.
    pub fn issue(&self, user: &User) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.0,
            username: user.username.clone(),
            email: user.email.clone(),
            roles: user.roles.clone(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| RelabError::Unauthorized(format!("Failed to issue token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| RelabError::Unauthorized(format!("Invalid token: {e}")))
    }
}

/// JWT claim set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated caller, created on signin and destroyed when the token
/// expires. Extracted per request from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub roles: Vec<Role>,
}

impl AuthUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_reviewer(&self) -> bool {
        self.roles.iter().any(|r| r.is_reviewer())
    }

    /// Fail with `403` unless the caller holds the given role.
    pub fn require(&self, role: Role) -> Result<()> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(RelabError::Forbidden(format!("Requires role {role}")))
        }
    }

    /// Fail with `403` unless the caller holds any reviewer role.
    pub fn require_reviewer(&self) -> Result<()> {
        if self.is_reviewer() {
            Ok(())
        } else {
            Err(RelabError::Forbidden(
                "Requires a reviewer role".to_string(),
            ))
        }
    }

    /// Fail with `403` unless the caller is an admin.
    pub fn require_admin(&self) -> Result<()> {
        self.require(Role::Admin)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = RelabError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let keys = parts
            .extensions
            .get::<AuthKeys>()
            .ok_or_else(|| RelabError::Unauthorized("Auth keys not configured".to_string()))?;

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| RelabError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| RelabError::Unauthorized("Expected a bearer token".to_string()))?;

        let claims = keys.verify(token)?;
        Ok(AuthUser {
            id: UserId(claims.sub),
            username: claims.username,
            email: claims.email,
            roles: claims.roles,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtResponse {
    pub access_token: String,
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub student_number: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub semester: Option<i32>,
    /// Short lowercase role names; anything unknown becomes a student.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// `POST /api/auth/signin`
pub async fn signin(
    State(state): State<AppState>,
    Json(body): Json<SigninRequest>,
) -> Result<Json<JwtResponse>> {
    let user = state
        .store
        .find_user_by_username(&body.username)
        .await?
        .ok_or_else(|| RelabError::Unauthorized("Invalid username or password".to_string()))?;

    let valid = bcrypt::verify(&body.password, &user.password_hash)
        .map_err(|e| RelabError::Other(e.into()))?;
    if !valid {
        return Err(RelabError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    }
    if !user.enabled {
        return Err(RelabError::Unauthorized("Account is disabled".to_string()));
    }

    let token = state.keys.issue(&user)?;
    tracing::info!(user = %user.username, "signin");
    Ok(Json(JwtResponse {
        access_token: token,
        id: user.id,
        username: user.username,
        email: user.email,
        roles: user.roles,
    }))
}

/// `POST /api/auth/signup`
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<Json<Value>> {
    if body.username.trim().is_empty() {
        return Err(RelabError::Validation("username is required".to_string()));
    }
    if body.password.is_empty() {
        return Err(RelabError::Validation("password is required".to_string()));
    }
    if state
        .store
        .find_user_by_username(&body.username)
        .await?
        .is_some()
    {
        return Err(RelabError::Validation(
            "Error: Username is already taken!".to_string(),
        ));
    }
    if state.store.find_user_by_email(&body.email).await?.is_some() {
        return Err(RelabError::Validation(
            "Error: Email is already in use!".to_string(),
        ));
    }

    let mut roles: Vec<Role> = body
        .roles
        .iter()
        .map(|name| Role::from_signup(name))
        .collect();
    if roles.is_empty() {
        roles.push(Role::Student);
    }
    roles.dedup();

    let password_hash = bcrypt::hash(&body.password, bcrypt::DEFAULT_COST)
        .map_err(|e| RelabError::Other(e.into()))?;

    let now = Utc::now();
    let user = User {
        id: UserId::new(),
        username: body.username.trim().to_string(),
        email: body.email.trim().to_string(),
        password_hash,
        first_name: body.first_name.trim().to_string(),
        last_name: body.last_name.trim().to_string(),
        student_number: body.student_number,
        department: body.department,
        semester: body.semester,
        roles,
        enabled: true,
        created_at: now,
        updated_at: now,
    };
    state.store.insert_user(user).await?;

    Ok(Json(json!({ "message": "User registered successfully!" })))
}
