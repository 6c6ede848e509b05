#![cfg(test)]

use bolero::generator::TypeGenerator;
use axum::{
    extract::FromRequestParts,
    http::{self, request},
};
use chrono::{Duration, Utc};
use crewlog_api::{
    AuthorKind, Comment, CommentId, DeleteComment, EditComment, Envelope, Error as ApiError,
    NewComment, NewPost, NewUser, PostId, UserId, STUB_UUID,
};
use crewlog_mock_server::{MockServer, SharedMock};
use std::{cmp, fmt::Debug, ops::RangeTo, panic::AssertUnwindSafe};
use tower::{Service, ServiceExt};

use crate::{extractors::*, *};

macro_rules! do_tokio_test {
    ( $name:ident, $typ:ty, $fn:expr ) => {
        #[test]
        fn $name() {
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            bolero::check!()
                .with_type::<$typ>()
                .cloned()
                .for_each(move |v| {
                    let () = runtime.block_on($fn(v));
                })
        }
    };
}

#[async_trait::async_trait]
impl Backend for SharedMock {
    async fn acquire(&self) -> Result<Box<dyn crewlog_api::Db>, Error> {
        Ok(Box::new(self.db().await))
    }
}

/// Router backed by `mock`, along with its admin token
pub(crate) fn mock_app(mock: SharedMock, feeds: PostFeeds) -> (Router, AuthToken) {
    let admin_token = AuthToken(Uuid::new_v4());
    (app(Arc::new(mock), feeds, Some(admin_token)), admin_token)
}

do_tokio_test!(fuzz_preauth_extractor, String, |token| async move {
    if let Ok(req) = http::Request::builder()
        .method(http::Method::GET)
        .uri("/")
        .header(http::header::AUTHORIZATION, token)
        .body(())
    {
        let mut req = req.into_parts().0;
        let res = PreAuth::from_request_parts(&mut req, &()).await;
        match res {
            Ok(_) => (),
            Err(Error::Api(ApiError::PermissionDenied)) => (),
            Err(e) => panic!("got unexpected error: {e}"),
        }
    }
});

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    CreateUser {
        admin: bool,
        reuse_id: bool,
        #[generator(bolero::generator::gen_with::<String>().len(0..20usize))]
        name: String,
    },
    CreatePost {
        author: usize,
        anonymous: bool,
        #[generator(bolero::generator::gen_with::<String>().len(0..20usize))]
        title: String,
    },
    AddComment {
        sid: usize,
        post: usize,
        parent: Option<usize>,
        #[generator(bolero::generator::gen_with::<String>().len(0..50usize))]
        content: String,
    },
    EditComment {
        sid: usize,
        post: usize,
        comment: usize,
        #[generator(bolero::generator::gen_with::<String>().len(0..50usize))]
        content: String,
    },
    DeleteComment {
        sid: usize,
        post: usize,
        comment: usize,
    },
    ListComments {
        sid: usize,
        post: usize,
    },
    Backdate {
        comment: usize,
        minutes: u8,
    },
}

pub(crate) async fn call<Resp>(
    app: &mut Router,
    req: request::Request<axum::body::Body>,
) -> Result<Option<Resp>, ApiError>
where
    Resp: 'static + for<'de> serde::Deserialize<'de>,
{
    app.ready().await.expect("waiting for app to be ready");
    let resp = app.call(req).await.expect("running request");
    let status = resp.status();
    let body = hyper::body::to_bytes(resp.into_body())
        .await
        .expect("recovering resp bytes");
    let envelope: Envelope<Resp> = serde_json::from_slice(&body).unwrap_or_else(|err| {
        panic!(
            r#"
                Failed parsing resp body!

                The error is the following:
                ---
                {err}
                ---

                Response body is:
                ---
                {body:?}
                ---
            "#
        )
    });
    assert_eq!(
        envelope.success,
        status.is_success(),
        "envelope and status {status} disagree, body is {body:?}"
    );
    envelope.into_result()
}

pub(crate) async fn run_on_app<Req, Resp>(
    app: &mut Router,
    method: &str,
    uri: &str,
    token: Option<AuthToken>,
    body: &Req,
) -> Result<Option<Resp>, ApiError>
where
    Req: Debug + serde::Serialize,
    Resp: 'static + for<'de> serde::Deserialize<'de>,
{
    let req = request::Builder::new()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    let req = match token {
        Some(token) => req.header(http::header::AUTHORIZATION, format!("bearer {}", token.0)),
        None => req,
    };
    let req = req
        .body(axum::body::Body::from(
            serde_json::to_vec(body).expect("serializing request body to json"),
        ))
        .expect("building request");
    call(app, req).await
}

fn compare<T>(name: &str, app_res: Result<T, ApiError>, mock_res: Result<T, ApiError>)
where
    T: Debug + PartialEq,
{
    assert_eq!(
        app_res, mock_res,
        "app and mock did not return the same result for {name}"
    );
}

fn resize_int(fuzz_id: usize, RangeTo { end }: RangeTo<usize>) -> Option<usize> {
    if end == 0 {
        return None;
    }
    let bucket_size = cmp::max(1, usize::MAX / end); // in case we rounded to 0
    let id = fuzz_id / bucket_size;
    Some(cmp::min(id, end - 1)) // in case id was actually over end - 1 due to rounding
}

// Comment ids are random on each side, so errors mentioning them are compared by kind only
fn normalize<T>(res: Result<T, ApiError>) -> Result<T, ApiError> {
    res.map_err(|e| match e {
        ApiError::InvalidParent(_) => ApiError::InvalidParent(CommentId(STUB_UUID)),
        e => e,
    })
}

#[derive(Clone, Copy)]
struct Session {
    app: AuthToken,
    mock: AuthToken,
}

#[derive(Clone, Copy)]
struct CommentPair {
    app: CommentId,
    mock: CommentId,
}

/// What a comment looks like regardless of which side stored it
#[derive(Debug, PartialEq)]
struct Seen {
    parent: Option<Option<usize>>,
    author_id: UserId,
    author_display_name: String,
    author_role: String,
    author_kind: AuthorKind,
    content: String,
    edited: bool,
}

impl Seen {
    fn new(c: &Comment, index_of: impl Fn(CommentId) -> Option<usize>) -> Seen {
        Seen {
            parent: c.parent_comment_id.map(index_of),
            author_id: c.author_id,
            author_display_name: c.author_display_name.clone(),
            author_role: c.author_role.clone(),
            author_kind: c.author_kind,
            content: c.content.clone(),
            edited: c.is_edited(),
        }
    }
}

struct ComparativeFuzzer {
    admin_token: AuthToken,
    app: Router,
    app_mock: SharedMock,
    mock: MockServer,
    users: Vec<UserId>,
    sessions: Vec<Session>,
    posts: Vec<PostId>,
    comments: Vec<CommentPair>,
}

impl ComparativeFuzzer {
    fn new() -> ComparativeFuzzer {
        let app_mock = SharedMock::default();
        let (app, admin_token) = mock_app(app_mock.clone(), PostFeeds::new());
        ComparativeFuzzer {
            admin_token,
            app,
            app_mock,
            mock: MockServer::new(),
            users: Vec::new(),
            sessions: Vec::new(),
            posts: Vec::new(),
            comments: Vec::new(),
        }
    }

    fn session(&self, sid: usize) -> Session {
        match resize_int(sid, ..self.sessions.len()) {
            Some(sid) => self.sessions[sid],
            None => {
                let tok = AuthToken(Uuid::new_v4());
                Session { app: tok, mock: tok }
            }
        }
    }

    fn post(&self, post: usize) -> PostId {
        match resize_int(post, ..self.posts.len()) {
            Some(post) => self.posts[post],
            None => PostId(Uuid::new_v4()),
        }
    }

    fn comment(&self, comment: usize) -> CommentPair {
        match resize_int(comment, ..self.comments.len()) {
            Some(comment) => self.comments[comment],
            None => {
                let id = CommentId(Uuid::new_v4());
                CommentPair { app: id, mock: id }
            }
        }
    }

    fn comments_uri(post: PostId) -> String {
        format!("/api/feedback/{}/comments", post.0)
    }

    async fn execute_fuzz_op(&mut self, op: FuzzOp) {
        match op {
            FuzzOp::CreateUser {
                admin,
                reuse_id,
                name,
            } => {
                let kind = match admin {
                    true => AuthorKind::Admin,
                    false => AuthorKind::Submitter,
                };
                let mut new_user = NewUser::new(name, String::from("Crew"), kind);
                if let (true, Some(&id)) = (reuse_id, self.users.first()) {
                    new_user.id = id;
                }
                let app_tok = run_on_app::<_, AuthToken>(
                    &mut self.app,
                    "POST",
                    "/api/admin/create-user",
                    Some(self.admin_token),
                    &new_user,
                )
                .await;
                let mock_tok = self.mock.admin_create_user(new_user.clone());
                if let (Ok(Some(app)), Ok(mock)) = (&app_tok, &mock_tok) {
                    self.users.push(new_user.id);
                    self.sessions.push(Session {
                        app: *app,
                        mock: *mock,
                    });
                }
                compare("CreateUser", app_tok.map(|_| ()), mock_tok.map(|_| ()));
            }
            FuzzOp::CreatePost {
                author,
                anonymous,
                title,
            } => {
                let author_id = match resize_int(author, ..self.users.len()) {
                    Some(author) => self.users[author],
                    None => UserId(Uuid::new_v4()),
                };
                let new_post = NewPost {
                    id: PostId(Uuid::new_v4()),
                    author_id,
                    title,
                    anonymous,
                };
                let app_res = run_on_app::<_, ()>(
                    &mut self.app,
                    "POST",
                    "/api/admin/create-post",
                    Some(self.admin_token),
                    &new_post,
                )
                .await;
                let mock_res = self.mock.admin_create_post(new_post.clone());
                if mock_res.is_ok() {
                    self.posts.push(new_post.id);
                }
                compare("CreatePost", app_res.map(|_| ()), mock_res);
            }
            FuzzOp::AddComment {
                sid,
                post,
                parent,
                content,
            } => {
                let session = self.session(sid);
                let post = self.post(post);
                let parent = parent.map(|p| self.comment(p));
                let app_res = run_on_app::<_, ()>(
                    &mut self.app,
                    "POST",
                    &Self::comments_uri(post),
                    Some(session.app),
                    &NewComment {
                        content: content.clone(),
                        parent_comment_id: parent.map(|p| p.app),
                    },
                )
                .await;
                let mock_res = self.mock.add_comment(
                    session.mock,
                    post,
                    NewComment {
                        content,
                        parent_comment_id: parent.map(|p| p.mock),
                    },
                    Utc::now(),
                );
                if let (Ok(_), Ok(mock)) = (&app_res, &mock_res) {
                    let app = self
                        .app_mock
                        .lock()
                        .await
                        .test_last_comment_id()
                        .expect("app accepted a comment it did not store");
                    self.comments.push(CommentPair { app, mock: *mock });
                }
                compare(
                    "AddComment",
                    normalize(app_res.map(|_| ())),
                    normalize(mock_res.map(|_| ())),
                );
            }
            FuzzOp::EditComment {
                sid,
                post,
                comment,
                content,
            } => {
                let session = self.session(sid);
                let post = self.post(post);
                let comment = self.comment(comment);
                let app_res = run_on_app::<_, ()>(
                    &mut self.app,
                    "PATCH",
                    &Self::comments_uri(post),
                    Some(session.app),
                    &EditComment {
                        comment_id: comment.app,
                        content: content.clone(),
                    },
                )
                .await;
                let mock_res = self.mock.edit_comment(
                    session.mock,
                    post,
                    EditComment {
                        comment_id: comment.mock,
                        content,
                    },
                    Utc::now(),
                );
                compare("EditComment", app_res.map(|_| ()), mock_res);
            }
            FuzzOp::DeleteComment { sid, post, comment } => {
                let session = self.session(sid);
                let post = self.post(post);
                let comment = self.comment(comment);
                let app_res = run_on_app::<_, ()>(
                    &mut self.app,
                    "DELETE",
                    &Self::comments_uri(post),
                    Some(session.app),
                    &DeleteComment {
                        comment_id: comment.app,
                    },
                )
                .await;
                let mock_res = self.mock.delete_comment(
                    session.mock,
                    post,
                    DeleteComment {
                        comment_id: comment.mock,
                    },
                    Utc::now(),
                );
                compare("DeleteComment", app_res.map(|_| ()), mock_res);
            }
            FuzzOp::ListComments { sid, post } => {
                let session = self.session(sid);
                let post = self.post(post);
                let app_res = run_on_app::<_, Vec<Comment>>(
                    &mut self.app,
                    "GET",
                    &Self::comments_uri(post),
                    Some(session.app),
                    &(),
                )
                .await
                .map(Option::unwrap_or_default);
                let mock_res = self.mock.list_comments(session.mock, post);
                let pairs = &self.comments;
                let seen_app = app_res.map(|cs| {
                    cs.iter()
                        .map(|c| Seen::new(c, |id| pairs.iter().position(|p| p.app == id)))
                        .collect::<Vec<_>>()
                });
                let seen_mock = mock_res.map(|cs| {
                    cs.iter()
                        .map(|c| Seen::new(c, |id| pairs.iter().position(|p| p.mock == id)))
                        .collect::<Vec<_>>()
                });
                compare("ListComments", seen_app, seen_mock);
            }
            FuzzOp::Backdate { comment, minutes } => {
                if let Some(comment) = resize_int(comment, ..self.comments.len()) {
                    // even steps only, so that no comment ever sits right on the window boundary
                    let age = Duration::minutes(if minutes % 4 == 0 { 16 } else { 2 });
                    let pair = self.comments[comment];
                    let mut app_mock = self.app_mock.lock().await;
                    if app_mock.test_get_comment(pair.app).is_some() {
                        app_mock.test_backdate_comment(pair.app, age);
                    }
                    if self.mock.test_get_comment(pair.mock).is_some() {
                        self.mock.test_backdate_comment(pair.mock, age);
                    }
                }
            }
        }
    }
}

do_tokio_test!(compare_with_mock, Vec<FuzzOp>, |test: Vec<FuzzOp>| async move {
    let mut fuzzer = ComparativeFuzzer::new();
    for op in test {
        fuzzer.execute_fuzz_op(op).await;
    }
});
