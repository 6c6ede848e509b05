use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{ws::Message, State, WebSocketUpgrade},
    Json,
};
use chrono::Utc;
use crewlog_api::{
    AuthToken, Comment, CommentId, DeleteComment, EditComment, Envelope, NewComment, NewPost,
    NewUser, PostId, User, Uuid,
};
use futures::{SinkExt, StreamExt};

use crate::{extractors::*, Error, PostFeeds};

pub async fn admin_create_user(
    AdminAuth: AdminAuth,
    mut conn: DbConn,
    Body(data): Body<NewUser>,
) -> Result<Json<Envelope<AuthToken>>, Error> {
    data.validate()?;
    let token = AuthToken(Uuid::new_v4());
    let user = data.into_user();
    if !conn
        .create_user(&user, token)
        .await
        .with_context(|| format!("creating user {:?}", user.id))?
    {
        return Err(Error::uuid_already_used(user.id.0));
    }
    tracing::info!(user=?user.id, kind=?user.kind, "created user");
    Ok(Json(Envelope::with_data(token)))
}

pub async fn admin_create_post(
    AdminAuth: AdminAuth,
    mut conn: DbConn,
    Body(data): Body<NewPost>,
) -> Result<Json<Envelope<()>>, Error> {
    data.validate()?;
    if conn
        .get_user(data.author_id)
        .await
        .with_context(|| format!("fetching author {:?}", data.author_id))?
        .is_none()
    {
        return Err(Error::not_found());
    }
    let post = data.into_post();
    if !conn
        .create_post(&post)
        .await
        .with_context(|| format!("creating post {:?}", post.id))?
    {
        return Err(Error::uuid_already_used(post.id.0));
    }
    Ok(Json(Envelope::success()))
}

pub async fn whoami(Auth(user): Auth) -> Json<Envelope<User>> {
    Json(Envelope::with_data(user))
}

pub async fn list_comments(
    Auth(user): Auth,
    PostPath(post): PostPath,
    mut conn: DbConn,
) -> Result<Json<Envelope<Vec<Comment>>>, Error> {
    let post = conn
        .get_post(post)
        .await
        .with_context(|| format!("fetching post {post:?}"))?
        .ok_or(Error::not_found())?;
    let mut comments = conn
        .list_comments(post.id)
        .await
        .with_context(|| format!("listing comments of {:?} for {:?}", post.id, user.id))?;
    let viewer = user.actor();
    for c in comments.iter_mut() {
        c.redact_for(&post, &viewer);
    }
    Ok(Json(Envelope::with_data(comments)))
}

pub async fn add_comment(
    Auth(user): Auth,
    PostPath(post): PostPath,
    State(feeds): State<PostFeeds>,
    mut conn: DbConn,
    Body(data): Body<NewComment>,
) -> Result<Json<Envelope<()>>, Error> {
    let content = String::from(data.validate()?);
    data.authorize(&mut *conn, post, &user.actor())
        .await
        .with_context(|| format!("authorizing new comment of {:?} on {post:?}", user.id))??;
    let comment = Comment::new(
        CommentId(Uuid::new_v4()),
        post,
        data.parent_comment_id,
        &user,
        content,
        Utc::now(),
    );
    conn.insert_comment(&comment)
        .await
        .with_context(|| format!("inserting comment {:?}", comment.id))?;
    feeds.relay_change(post).await;
    Ok(Json(Envelope::success()))
}

pub async fn edit_comment(
    Auth(user): Auth,
    PostPath(post): PostPath,
    State(feeds): State<PostFeeds>,
    mut conn: DbConn,
    Body(data): Body<EditComment>,
) -> Result<Json<Envelope<()>>, Error> {
    let content = String::from(data.validate()?);
    let now = Utc::now();
    data.authorize(&mut *conn, post, &user.actor(), now)
        .await
        .with_context(|| format!("authorizing edit of {:?} by {:?}", data.comment_id, user.id))??;
    if !conn
        .update_comment(data.comment_id, &content, now)
        .await
        .with_context(|| format!("updating comment {:?}", data.comment_id))?
    {
        // deleted since authorization
        return Err(Error::not_found());
    }
    feeds.relay_change(post).await;
    Ok(Json(Envelope::success()))
}

pub async fn delete_comment(
    Auth(user): Auth,
    PostPath(post): PostPath,
    State(feeds): State<PostFeeds>,
    mut conn: DbConn,
    Body(data): Body<DeleteComment>,
) -> Result<Json<Envelope<()>>, Error> {
    data.authorize(&mut *conn, post, &user.actor(), Utc::now())
        .await
        .with_context(|| format!("authorizing deletion of {:?} by {:?}", data.comment_id, user.id))??;
    let removed = conn
        .delete_comment(data.comment_id)
        .await
        .with_context(|| format!("deleting comment {:?}", data.comment_id))?;
    if removed == 0 {
        return Err(Error::not_found());
    }
    tracing::debug!(comment=?data.comment_id, removed, "deleted comment and its replies");
    feeds.relay_change(post).await;
    Ok(Json(Envelope::success()))
}

pub async fn comment_feed(
    ws: WebSocketUpgrade,
    PostPath(post): PostPath,
    State(backend): State<Arc<dyn Backend>>,
    State(feeds): State<PostFeeds>,
) -> Result<axum::response::Response, Error> {
    Ok(ws.on_upgrade(move |sock| {
        let (write, read) = sock.split();
        comment_feed_impl(write, read, post, backend, feeds)
    }))
}

async fn check_feed_access(backend: &dyn Backend, token: &str, post: PostId) -> Result<User, Error> {
    let token = Uuid::try_from(token).map_err(|_| Error::permission_denied())?;
    let mut conn = DbConn::acquire(backend).await?;
    let user = conn
        .recover_session(AuthToken(token))
        .await
        .context("recovering session")?
        .ok_or(Error::permission_denied())?;
    conn.get_post(post)
        .await
        .with_context(|| format!("fetching post {post:?}"))?
        .ok_or(Error::not_found())?;
    Ok(user)
}

pub async fn comment_feed_impl<W, R>(
    mut write: W,
    mut read: R,
    post: PostId,
    backend: Arc<dyn Backend>,
    feeds: PostFeeds,
) where
    W: 'static + Send + Unpin + futures::Sink<Message>,
    <W as futures::Sink<Message>>::Error: Send,
    R: 'static + Send + Unpin + futures::Stream<Item = Result<Message, axum::Error>>,
{
    tracing::debug!(?post, "comment feed websocket connected");
    let token = match read.next().await {
        Some(Ok(Message::Text(token))) => token,
        _ => return,
    };
    let answer = match check_feed_access(&*backend, &token, post).await {
        Ok(user) => {
            if write.send(Message::Text(String::from("ok"))).await.is_ok() {
                tracing::debug!(?post, user=?user.id, "comment feed websocket auth success");
                feeds.add_for_post(post, write, read).await;
            }
            return;
        }
        Err(Error::Api(crewlog_api::Error::NotFound)) => "not found",
        Err(Error::Anyhow(err)) => {
            tracing::error!(?err, "internal error while opening comment feed");
            "permission denied"
        }
        Err(Error::Api(_)) => "permission denied",
    };
    tracing::debug!(?post, answer, "comment feed websocket auth failure");
    let _ = write.send(Message::Text(String::from(answer))).await;
}
