use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use crewlog_client::{
    api::{
        AuthToken, AuthorKind, CommentId, DeleteComment, EditComment, Envelope, NewComment,
        NewPost, NewUser, PostId, UserId, Uuid,
    },
    assemble, flatten, ClientConfig, CommentInput, CommentService, Coordinator, HttpService,
    InputMode, LoadState, ThreadConfig, ThreadRow, WsChangeFeed,
};
use tokio::io::AsyncBufReadExt;

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long, env = "CREWLOG_HOST")]
    host: String,

    /// Session token, not needed for admin commands
    #[structopt(short, long, env = "CREWLOG_TOKEN")]
    token: Option<Uuid>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Create a user and print its session token
    CreateUser {
        display_name: String,

        /// eg. "Captain"
        role: String,

        #[structopt(long)]
        admin: bool,
    },

    /// Create a feedback post and print its id
    CreatePost {
        author: Uuid,
        title: String,

        /// Hide the author of the post from other submitters
        #[structopt(long)]
        anonymous: bool,
    },

    /// Show who the session token belongs to
    Whoami,

    /// Print the comment thread of a post
    List { post: Uuid },

    /// Add a top-level comment
    Post { post: Uuid, content: String },

    Reply {
        post: Uuid,
        parent: Uuid,
        content: String,
    },

    Edit {
        post: Uuid,
        comment: Uuid,
        content: String,
    },

    /// Delete a comment along with all its replies
    Delete { post: Uuid, comment: Uuid },

    /// Follow the thread live; each line read on stdin is posted as a comment
    Watch { post: Uuid },
}

fn admin_token() -> anyhow::Result<AuthToken> {
    let tok =
        std::env::var("ADMIN_TOKEN").context("retrieving ADMIN_TOKEN environment variable")?;
    let tok = Uuid::try_parse(&tok).context("parsing ADMIN_TOKEN as an auth token")?;
    Ok(AuthToken(tok))
}

async fn admin_call<B, T>(host: &str, path: &str, body: &B) -> anyhow::Result<Option<T>>
where
    B: serde::Serialize,
    T: serde::de::DeserializeOwned,
{
    let envelope = reqwest::Client::new()
        .post(format!("{host}/api/admin/{path}"))
        .json(body)
        .bearer_auth(admin_token()?.0)
        .send()
        .await
        .with_context(|| format!("sending {path} request"))?
        .json::<Envelope<T>>()
        .await
        .with_context(|| format!("parsing {path} answer"))?;
    Ok(envelope.into_result()?)
}

fn print_rows(rows: &[ThreadRow]) {
    if rows.is_empty() {
        println!("(no comments yet)");
    }
    for r in rows {
        let c = &r.comment;
        let badge = match r.badge {
            AuthorKind::Admin => "[admin] ",
            AuthorKind::Submitter => "",
        };
        let edited = if r.edited { " (edited)" } else { "" };
        let you = if r.is_own { " (you)" } else { "" };
        println!(
            "{:indent$}{badge}{} - {}{you}, {}{edited} [{}]",
            "",
            c.author_display_name,
            c.author_role,
            c.created_at.format("%Y-%m-%d %H:%M"),
            c.id.0,
            indent = 2 * r.indent,
        );
        for line in c.content.lines() {
            println!("{:indent$}  {line}", "", indent = 2 * r.indent);
        }
    }
}

async fn watch(config: ClientConfig, post: PostId) -> anyhow::Result<()> {
    let http = Arc::new(HttpService::new(config.clone()));
    let me = http.whoami().await.context("recovering session")?.actor();
    let thread = ThreadConfig::default();
    let feed = WsChangeFeed::new(config, thread.clone());
    let coordinator = Coordinator::new(post, http, thread);
    let mut view = coordinator.watch();
    coordinator
        .mount(&feed)
        .await
        .context("loading the comment thread")?;
    print_rows(&coordinator.rows(&me, Utc::now()));

    let input = CommentInput::new(InputMode::Compose);
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = view.borrow_and_update().state.clone();
                match state {
                    LoadState::Ready => {
                        println!("---");
                        print_rows(&coordinator.rows(&me, Utc::now()));
                    }
                    LoadState::Error(err) => eprintln!("failed loading comments: {err}"),
                    LoadState::Idle | LoadState::Loading => (),
                }
            }
            line = lines.next_line() => match line.context("reading stdin")? {
                None => break,
                Some(line) => {
                    input.set_text(line);
                    if let Err(err) = input.submit(|content| coordinator.submit(content)).await {
                        eprintln!("comment not posted: {err}");
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    coordinator.unmount();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let host = String::from(opt.host.trim_end_matches('/'));
    let config = || -> anyhow::Result<ClientConfig> {
        let token = opt
            .token
            .context("this command needs a session token, see --token")?;
        Ok(ClientConfig::new(host.clone(), AuthToken(token)))
    };

    match opt.cmd {
        Command::CreateUser {
            display_name,
            role,
            admin,
        } => {
            let kind = match admin {
                true => AuthorKind::Admin,
                false => AuthorKind::Submitter,
            };
            let user = NewUser::new(display_name, role, kind);
            let token: AuthToken = admin_call(&host, "create-user", &user)
                .await?
                .context("server did not answer with a token")?;
            println!("user {}", user.id.0);
            println!("token {}", token.0);
        }
        Command::CreatePost {
            author,
            title,
            anonymous,
        } => {
            let post = NewPost {
                id: PostId(Uuid::new_v4()),
                author_id: UserId(author),
                title,
                anonymous,
            };
            admin_call::<_, ()>(&host, "create-post", &post).await?;
            println!("post {}", post.id.0);
        }
        Command::Whoami => {
            let user = HttpService::new(config()?).whoami().await?;
            println!(
                "{} - {} ({}) [{}]",
                user.display_name,
                user.role,
                user.kind.as_str(),
                user.id.0
            );
        }
        Command::List { post } => {
            let http = HttpService::new(config()?);
            let me = http.whoami().await?.actor();
            let comments = http.list_comments(PostId(post)).await?;
            let tree = assemble(comments);
            print_rows(&flatten(
                &tree,
                &me,
                Utc::now(),
                ThreadConfig::default().max_depth,
            ));
        }
        Command::Post { post, content } => {
            let comment = NewComment {
                content,
                parent_comment_id: None,
            };
            HttpService::new(config()?)
                .add_comment(PostId(post), comment)
                .await?;
        }
        Command::Reply {
            post,
            parent,
            content,
        } => {
            let comment = NewComment {
                content,
                parent_comment_id: Some(CommentId(parent)),
            };
            HttpService::new(config()?)
                .add_comment(PostId(post), comment)
                .await?;
        }
        Command::Edit {
            post,
            comment,
            content,
        } => {
            let edit = EditComment {
                comment_id: CommentId(comment),
                content,
            };
            HttpService::new(config()?)
                .edit_comment(PostId(post), edit)
                .await?;
        }
        Command::Delete { post, comment } => {
            let delete = DeleteComment {
                comment_id: CommentId(comment),
            };
            HttpService::new(config()?)
                .delete_comment(PostId(post), delete)
                .await?;
        }
        Command::Watch { post } => watch(config()?, PostId(post)).await?,
    }

    Ok(())
}
