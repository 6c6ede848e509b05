use anyhow::Context;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    api::{Comment, DeleteComment, EditComment, Envelope, NewComment, PostId, User},
    ClientConfig, CommentService, Error,
};

/// Persistence service reached over the HTTP/JSON comment endpoints
#[derive(Clone)]
pub struct HttpService {
    config: ClientConfig,
    client: reqwest::Client,

    // Only for idempotent requests: retrying a POST could duplicate a comment
    retrying: ClientWithMiddleware,
}

impl HttpService {
    pub fn new(config: ClientConfig) -> HttpService {
        let client = reqwest::Client::new();
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let retrying = ClientBuilder::new(client.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        HttpService {
            config,
            client,
            retrying,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn comments_url(&self, post: PostId) -> String {
        format!(
            "{}/{}/{}/comments",
            self.config.host, self.config.api_base, post.0
        )
    }

    /// The user the configured token belongs to
    pub async fn whoami(&self) -> Result<User, Error> {
        let resp = self
            .retrying
            .get(format!("{}/api/whoami", self.config.host))
            .bearer_auth(self.config.token.0)
            .send()
            .await
            .context("requesting whoami")?;
        parse::<User>(resp)
            .await?
            .ok_or_else(|| Error::Transport(anyhow::anyhow!("whoami answer has no data")))
    }

    async fn mutate<B: Serialize>(
        &self,
        method: reqwest::Method,
        post: PostId,
        body: &B,
    ) -> Result<(), Error> {
        let resp = self
            .client
            .request(method.clone(), self.comments_url(post))
            .bearer_auth(self.config.token.0)
            .json(body)
            .send()
            .await
            .with_context(|| format!("sending {method} for comments of post {post:?}"))?;
        parse::<()>(resp).await?;
        Ok(())
    }
}

async fn parse<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Option<T>, Error> {
    let status = resp.status();
    let envelope = resp
        .json::<Envelope<T>>()
        .await
        .with_context(|| format!("parsing response envelope of {status} answer"))?;
    Ok(envelope.into_result()?)
}

#[async_trait::async_trait]
impl CommentService for HttpService {
    async fn list_comments(&self, post: PostId) -> Result<Vec<Comment>, Error> {
        let resp = self
            .retrying
            .get(self.comments_url(post))
            .bearer_auth(self.config.token.0)
            .send()
            .await
            .with_context(|| format!("listing comments of post {post:?}"))?;
        Ok(parse::<Vec<Comment>>(resp).await?.unwrap_or_default())
    }

    async fn add_comment(&self, post: PostId, comment: NewComment) -> Result<(), Error> {
        let comment = NewComment {
            content: String::from(comment.validate()?),
            parent_comment_id: comment.parent_comment_id,
        };
        self.mutate(reqwest::Method::POST, post, &comment).await
    }

    async fn edit_comment(&self, post: PostId, edit: EditComment) -> Result<(), Error> {
        let edit = EditComment {
            content: String::from(edit.validate()?),
            comment_id: edit.comment_id,
        };
        self.mutate(reqwest::Method::PATCH, post, &edit).await
    }

    async fn delete_comment(&self, post: PostId, delete: DeleteComment) -> Result<(), Error> {
        self.mutate(reqwest::Method::DELETE, post, &delete).await
    }
}
