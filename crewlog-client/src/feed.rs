use anyhow::{anyhow, Context};
use futures::{
    channel::{mpsc, oneshot},
    pin_mut, select, FutureExt, SinkExt, StreamExt,
};
use tokio::{net::TcpStream, time::Instant};
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

use crate::{
    api::{self, FeedMessage, PostId},
    ChangeFeed, Changed, ClientConfig, Error, Subscription, ThreadConfig,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Change feed over the server's per-post websocket
#[derive(Clone, Debug)]
pub struct WsChangeFeed {
    config: ClientConfig,
    thread: ThreadConfig,
}

impl WsChangeFeed {
    pub fn new(config: ClientConfig, thread: ThreadConfig) -> WsChangeFeed {
        WsChangeFeed { config, thread }
    }

    fn url(&self, post: PostId) -> anyhow::Result<String> {
        let rest = self
            .config
            .host
            .strip_prefix("http")
            .ok_or_else(|| anyhow!("host {:?} is not an http(s) url", self.config.host))?;
        Ok(format!("ws{rest}/ws/feedback/{}/comments", post.0))
    }

    async fn connect(&self, post: PostId) -> Result<Socket, Error> {
        let url = self.url(post)?;
        let (mut sock, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("connecting to change feed {url:?}"))?;

        // Authentify
        sock.send(Message::Text(self.config.token.0.to_string()))
            .await
            .context("sending authentication to change feed")?;
        match sock.next().await {
            Some(Ok(Message::Text(t))) if t == "ok" => Ok(sock),
            Some(Ok(Message::Text(t))) if t == "permission denied" => {
                Err(Error::Api(api::Error::PermissionDenied))
            }
            Some(Ok(Message::Text(t))) if t == "not found" => Err(Error::Api(api::Error::NotFound)),
            other => Err(Error::Transport(anyhow!(
                "unexpected answer to change feed authentication: {other:?}"
            ))),
        }
    }

    async fn run(
        self,
        post: PostId,
        sock: Socket,
        events: mpsc::UnboundedSender<Changed>,
        mut release: oneshot::Receiver<()>,
    ) {
        let mut first = Some(sock);
        'reconnect: loop {
            let sock = match first.take() {
                Some(s) => s,
                None => {
                    tracing::warn!(?post, "lost change feed connection");
                    tokio::time::sleep(self.thread.reconnect_spacing).await;
                    if events.is_closed() {
                        return;
                    }
                    match self.connect(post).await {
                        Ok(s) => {
                            // notifications may have been missed while disconnected
                            if events.unbounded_send(Changed).is_err() {
                                return;
                            }
                            s
                        }
                        Err(e) => {
                            tracing::debug!(?post, "failed reconnecting to change feed: {e:#}");
                            continue 'reconnect;
                        }
                    }
                }
            };
            tracing::debug!(?post, "connected to change feed");

            let mut next_ping = Instant::now() + self.thread.ping_interval;
            let mut last_pong = Instant::now();
            let mut sock = sock.fuse();
            loop {
                let delay_pong_reception =
                    tokio::time::sleep_until(last_pong + self.thread.disconnect_after).fuse();
                let delay_ping_send = tokio::time::sleep_until(next_ping).fuse();
                pin_mut!(delay_ping_send, delay_pong_reception);
                select! {
                    _ = release => {
                        let _ = sock.into_inner().close(None).await;
                        tracing::debug!(?post, "released change feed");
                        return;
                    }
                    _ = delay_pong_reception => continue 'reconnect,
                    _ = delay_ping_send => {
                        if sock.send(Message::Text(String::from("ping"))).await.is_err() {
                            continue 'reconnect;
                        }
                        next_ping += self.thread.ping_interval;
                    }
                    msg = sock.next() => {
                        let msg = match msg {
                            Some(Ok(Message::Text(t))) => serde_json::from_str::<FeedMessage>(&t),
                            Some(Ok(Message::Binary(b))) => serde_json::from_slice::<FeedMessage>(&b),
                            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                            None | Some(Ok(Message::Close(_))) | Some(Err(_)) => continue 'reconnect,
                        };
                        match msg {
                            Ok(FeedMessage::Pong) => last_pong = Instant::now(),
                            Ok(FeedMessage::CommentsChanged(p)) if p == post => {
                                if events.unbounded_send(Changed).is_err() {
                                    return;
                                }
                            }
                            Ok(FeedMessage::CommentsChanged(p)) => {
                                tracing::warn!(?post, other=?p, "change feed notified about another post");
                            }
                            Err(err) => {
                                tracing::warn!(?err, "failed parsing change feed message");
                            }
                        }
                    }
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl ChangeFeed for WsChangeFeed {
    async fn subscribe(&self, post: PostId) -> Result<Subscription, Error> {
        let sock = self.connect(post).await?;
        let (sender, receiver) = mpsc::unbounded();
        let (sub, release) = Subscription::with_release(receiver.boxed());
        tokio::spawn(self.clone().run(post, sock, sender, release));
        Ok(sub)
    }
}
