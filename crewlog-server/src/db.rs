use anyhow::{anyhow, Context};
use crewlog_api::{
    AuthToken, AuthorKind, Comment, CommentId, Db, Post, PostId, Time, User, UserId, Uuid,
};
use sqlx::Connection;

use crate::{extractors::Backend, Error};

#[derive(Clone)]
pub struct PgBackend(sqlx::PgPool);

impl PgBackend {
    pub fn new(pool: sqlx::PgPool) -> PgBackend {
        PgBackend(pool)
    }
}

#[async_trait::async_trait]
impl Backend for PgBackend {
    async fn acquire(&self) -> Result<Box<dyn Db>, Error> {
        Ok(Box::new(PostgresDb(
            self.0.acquire().await.context("acquiring db connection")?,
        )))
    }
}

pub struct PostgresDb(sqlx::pool::PoolConnection<sqlx::Postgres>);

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    display_name: String,
    role: String,
    kind: String,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> anyhow::Result<User> {
        Ok(User {
            id: UserId(r.id),
            kind: AuthorKind::parse(&r.kind)
                .ok_or_else(|| anyhow!("user {:?} has unknown kind {:?}", r.id, r.kind))?,
            display_name: r.display_name,
            role: r.role,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    title: String,
    anonymous: bool,
}

impl From<PostRow> for Post {
    fn from(r: PostRow) -> Post {
        Post {
            id: PostId(r.id),
            author_id: UserId(r.author_id),
            title: r.title,
            anonymous: r.anonymous,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    parent_comment_id: Option<Uuid>,
    author_id: Uuid,
    author_display_name: String,
    author_role: String,
    author_kind: String,
    content: String,
    created_at: Time,
    updated_at: Time,
}

impl TryFrom<CommentRow> for Comment {
    type Error = anyhow::Error;

    fn try_from(r: CommentRow) -> anyhow::Result<Comment> {
        Ok(Comment {
            id: CommentId(r.id),
            post_id: PostId(r.post_id),
            parent_comment_id: r.parent_comment_id.map(CommentId),
            author_id: UserId(r.author_id),
            author_kind: AuthorKind::parse(&r.author_kind).ok_or_else(|| {
                anyhow!("comment {:?} has unknown author kind {:?}", r.id, r.author_kind)
            })?,
            author_display_name: r.author_display_name,
            author_role: r.author_role,
            content: r.content,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const COMMENT_COLUMNS: &str = "
    id, post_id, parent_comment_id,
    author_id, author_display_name, author_role, author_kind,
    content, created_at, updated_at
";

#[async_trait::async_trait]
impl Db for PostgresDb {
    async fn recover_session(&mut self, token: AuthToken) -> anyhow::Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(
            "
                SELECT users.id, users.display_name, users.role, users.kind
                    FROM sessions
                INNER JOIN users
                    ON users.id = sessions.user_id
                WHERE sessions.id = $1
            ",
        )
        .bind(token.0)
        .fetch_optional(&mut *self.0)
        .await
        .context("querying sessions table")?
        .map(User::try_from)
        .transpose()
    }

    async fn get_user(&mut self, user: UserId) -> anyhow::Result<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT id, display_name, role, kind FROM users WHERE id = $1")
            .bind(user.0)
            .fetch_optional(&mut *self.0)
            .await
            .with_context(|| format!("querying user {user:?}"))?
            .map(User::try_from)
            .transpose()
    }

    async fn create_user(&mut self, user: &User, token: AuthToken) -> anyhow::Result<bool> {
        let mut t = self.0.begin().await.context("starting transaction")?;
        let inserted = sqlx::query(
            "INSERT INTO users VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO NOTHING",
        )
        .bind(user.id.0)
        .bind(&user.display_name)
        .bind(&user.role)
        .bind(user.kind.as_str())
        .execute(&mut *t)
        .await
        .with_context(|| format!("inserting user {:?}", user.id))?
        .rows_affected();
        if inserted == 0 {
            return Ok(false);
        }
        sqlx::query("INSERT INTO sessions VALUES ($1, $2, NOW())")
            .bind(token.0)
            .bind(user.id.0)
            .execute(&mut *t)
            .await
            .with_context(|| format!("inserting session for user {:?}", user.id))?;
        t.commit().await.context("committing user creation")?;
        Ok(true)
    }

    async fn create_post(&mut self, post: &Post) -> anyhow::Result<bool> {
        let inserted = sqlx::query(
            "INSERT INTO posts VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO NOTHING",
        )
        .bind(post.id.0)
        .bind(post.author_id.0)
        .bind(&post.title)
        .bind(post.anonymous)
        .execute(&mut *self.0)
        .await
        .with_context(|| format!("inserting post {:?}", post.id))?
        .rows_affected();
        Ok(inserted == 1)
    }

    async fn get_post(&mut self, post: PostId) -> anyhow::Result<Option<Post>> {
        Ok(sqlx::query_as::<_, PostRow>(
            "SELECT id, author_id, title, anonymous FROM posts WHERE id = $1",
        )
        .bind(post.0)
        .fetch_optional(&mut *self.0)
        .await
        .with_context(|| format!("querying post {post:?}"))?
        .map(Post::from))
    }

    async fn get_comment(&mut self, comment: CommentId) -> anyhow::Result<Option<Comment>> {
        sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(comment.0)
        .fetch_optional(&mut *self.0)
        .await
        .with_context(|| format!("querying comment {comment:?}"))?
        .map(Comment::try_from)
        .transpose()
    }

    async fn list_comments(&mut self, post: PostId) -> anyhow::Result<Vec<Comment>> {
        sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 ORDER BY created_at, id"
        ))
        .bind(post.0)
        .fetch_all(&mut *self.0)
        .await
        .with_context(|| format!("querying comments of post {post:?}"))?
        .into_iter()
        .map(Comment::try_from)
        .collect()
    }

    async fn insert_comment(&mut self, c: &Comment) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "INSERT INTO comments ({COMMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(c.id.0)
        .bind(c.post_id.0)
        .bind(c.parent_comment_id.map(|p| p.0))
        .bind(c.author_id.0)
        .bind(&c.author_display_name)
        .bind(&c.author_role)
        .bind(c.author_kind.as_str())
        .bind(&c.content)
        .bind(c.created_at)
        .bind(c.updated_at)
        .execute(&mut *self.0)
        .await
        .with_context(|| format!("inserting comment {:?}", c.id))?;
        Ok(())
    }

    async fn update_comment(
        &mut self,
        comment: CommentId,
        content: &str,
        now: Time,
    ) -> anyhow::Result<bool> {
        let updated = sqlx::query("UPDATE comments SET content = $1, updated_at = $2 WHERE id = $3")
            .bind(content)
            .bind(now)
            .bind(comment.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("updating comment {comment:?}"))?
            .rows_affected();
        Ok(updated == 1)
    }

    async fn delete_comment(&mut self, comment: CommentId) -> anyhow::Result<usize> {
        // the foreign key would cascade by itself, but then the replies would not be counted
        let deleted = sqlx::query(
            "
                WITH RECURSIVE subtree AS (
                    SELECT id FROM comments WHERE id = $1
                    UNION ALL
                    SELECT c.id FROM comments c INNER JOIN subtree s ON c.parent_comment_id = s.id
                )
                DELETE FROM comments WHERE id IN (SELECT id FROM subtree)
            ",
        )
        .bind(comment.0)
        .execute(&mut *self.0)
        .await
        .with_context(|| format!("deleting comment {comment:?}"))?
        .rows_affected();
        Ok(usize::try_from(deleted).context("deleted more comments than fit in memory")?)
    }
}
