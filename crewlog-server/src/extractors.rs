use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path},
    http::{self, request, Request},
    Json,
};
use crewlog_api::{AuthToken, Db, Error as ApiError, PostId, User, Uuid, SESSION_COOKIE};

use crate::{Error, PostFeeds};

/// Source of persistence connections
#[async_trait]
pub trait Backend: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn Db>, Error>;
}

#[derive(Clone, axum::extract::FromRef)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub feeds: PostFeeds,
    pub admin_token: Option<AuthToken>,
}

pub struct DbConn(Box<dyn Db>);

impl DbConn {
    pub async fn acquire(backend: &dyn Backend) -> Result<DbConn, Error> {
        Ok(DbConn(backend.acquire().await?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for DbConn {
    type Rejection = Error;

    async fn from_request_parts(
        _req: &mut request::Parts,
        state: &AppState,
    ) -> Result<DbConn, Error> {
        DbConn::acquire(&*state.backend).await
    }
}

impl Deref for DbConn {
    type Target = dyn Db;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl DerefMut for DbConn {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.0
    }
}

/// `:post_id` path segment; anything that is not a uuid cannot be a post
pub struct PostPath(pub PostId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PostPath {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, state: &S) -> Result<PostPath, Error> {
        let Path(post) = Path::<Uuid>::from_request_parts(req, state)
            .await
            .map_err(|_| Error::not_found())?;
        Ok(PostPath(PostId(post)))
    }
}

fn parse_bearer(auth: &http::HeaderValue) -> Result<AuthToken, Error> {
    let auth = auth.to_str().map_err(|_| Error::permission_denied())?;
    let mut auth = auth.split(' ');
    if !auth
        .next()
        .ok_or(Error::permission_denied())?
        .eq_ignore_ascii_case("bearer")
    {
        return Err(Error::permission_denied());
    }
    let token = auth.next().ok_or(Error::permission_denied())?;
    if !auth.next().is_none() {
        return Err(Error::permission_denied());
    }
    let token = Uuid::try_from(token).map_err(|_| Error::permission_denied())?;
    Ok(AuthToken(token))
}

fn parse_session_cookie(cookies: &http::HeaderValue) -> Option<AuthToken> {
    let cookies = cookies.to_str().ok()?;
    cookies
        .split(';')
        .filter_map(|c| c.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .find_map(|tok| Uuid::try_from(tok).ok())
        .map(AuthToken)
}

/// Session token, from the `Authorization: Bearer` header or else the session cookie
pub struct PreAuth(pub AuthToken);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for PreAuth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, _state: &S) -> Result<PreAuth, Error> {
        if let Some(auth) = req.headers.get(http::header::AUTHORIZATION) {
            return Ok(PreAuth(parse_bearer(auth)?));
        }
        req.headers
            .get_all(http::header::COOKIE)
            .iter()
            .find_map(parse_session_cookie)
            .map(PreAuth)
            .ok_or(Error::permission_denied())
    }
}

pub struct Auth(pub User);

#[async_trait]
impl FromRequestParts<AppState> for Auth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, state: &AppState) -> Result<Auth, Error> {
        let token = PreAuth::from_request_parts(req, state).await?.0;
        let mut conn = DbConn::from_request_parts(req, state).await?;
        let user = conn
            .recover_session(token)
            .await
            .context("recovering session")?
            .ok_or(Error::permission_denied())?;
        Ok(Auth(user))
    }
}

pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = Error;

    async fn from_request_parts(
        req: &mut request::Parts,
        state: &AppState,
    ) -> Result<AdminAuth, Error> {
        let token = PreAuth::from_request_parts(req, state).await?.0;
        if Some(token) == state.admin_token {
            Ok(AdminAuth)
        } else {
            Err(Error::permission_denied())
        }
    }
}

/// JSON request body, refused with a failure envelope when it does not parse
pub struct Body<T>(pub T);

#[async_trait]
impl<S, B, T> FromRequest<S, B> for Body<T>
where
    Json<T>: FromRequest<S, B, Rejection = JsonRejection>,
    S: Send + Sync,
    B: Send + 'static,
{
    type Rejection = Error;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(data)) => Ok(Body(data)),
            Err(rej) => Err(Error::Api(ApiError::InvalidBody(rej.body_text()))),
        }
    }
}
