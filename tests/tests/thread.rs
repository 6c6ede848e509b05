use std::sync::Arc;

use chrono::Utc;
use crewlog_client::{
    api::{AuthorKind, Error as ApiError, PostId, Uuid, ANONYMOUS},
    CommentEditor, CommentInput, Coordinator, Error, InputMode, LoadState, SubmitOutcome,
    ThreadAction,
};
use tests::{thread_config, until, Crew};

#[tokio::test]
async fn replies_show_up_nested_for_everyone() {
    let crew = Crew::new(false);
    let jane = crew.mounted(&crew.jane).await;
    let john = crew.mounted(&crew.john).await;
    assert!(!john.view().expanded);

    jane.submit(String::from("  Great work\n")).await.unwrap();
    until("john sees the comment", || john.view().count() == 1).await;
    assert!(john.view().expanded);

    let john_me = crew.actor(&crew.john).await;
    let rows = john.rows(&john_me, Utc::now());
    let reply = rows[0].reply(String::from("Agreed")).unwrap();
    john.dispatch(reply).await.unwrap();
    until("jane sees the reply", || jane.view().count() == 2).await;

    let jane_me = crew.actor(&crew.jane).await;
    let rows = jane.rows(&jane_me, Utc::now());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].comment.content, "Great work");
    assert_eq!((rows[0].depth, rows[0].indent), (0, 0));
    assert!(rows[0].is_own);
    assert_eq!(rows[1].comment.content, "Agreed");
    assert_eq!(rows[1].comment.author_display_name, "John");
    assert_eq!(rows[1].comment.author_role, "First Officer");
    assert_eq!((rows[1].depth, rows[1].indent), (1, 1));
    assert_eq!(rows[1].badge, AuthorKind::Submitter);
    assert!(!rows[1].is_own);
    assert!(!rows[1].affordances.can_edit);
    assert_eq!(jane.view().state, LoadState::Ready);
}

#[tokio::test]
async fn edits_follow_the_fifteen_minute_window() {
    let crew = Crew::new(false);
    let jane = crew.mounted(&crew.jane).await;
    let me = crew.actor(&crew.jane).await;
    jane.submit(String::from("Great work")).await.unwrap();
    let id = jane.view().comments[0].id;

    crew.backdate(id, 10).await;
    jane.submit(String::from("refresh")).await.unwrap();
    let rows = jane.rows(&me, Utc::now());
    assert!(rows[0].affordances.can_edit);
    assert!(rows[0].affordances.can_delete);

    let mut editor = CommentEditor::new();
    editor.begin(&rows[0].comment);
    editor.set_draft(" Great work, team ");
    let action = editor.commit().unwrap();
    assert!(matches!(action, ThreadAction::Edit(_)));
    jane.dispatch(action).await.unwrap();
    let rows = jane.rows(&me, Utc::now());
    assert_eq!(rows[0].comment.content, "Great work, team");
    assert!(rows[0].edited);
    assert!(!rows[1].edited);

    crew.backdate(id, 10).await;
    let err = jane.edit(id, String::from("too late")).await.unwrap_err();
    assert_eq!(err.api(), Some(&ApiError::EditWindowExpired));
    let err = jane.delete(id).await.unwrap_err();
    assert_eq!(err.api(), Some(&ApiError::EditWindowExpired));

    jane.submit(String::from("refresh again")).await.unwrap();
    let rows = jane.rows(&me, Utc::now());
    assert!(!rows[0].affordances.can_edit);
    assert!(!rows[0].affordances.can_delete);
    assert!(rows[0].delete().is_none());
    assert_eq!(rows[0].comment.content, "Great work, team");
}

#[tokio::test]
async fn admins_delete_whole_subtrees() {
    let crew = Crew::new(false);
    let jane = crew.mounted(&crew.jane).await;
    let john = crew.mounted(&crew.john).await;
    let ops = crew.mounted(&crew.ops).await;

    jane.submit(String::from("root")).await.unwrap();
    let root = jane.view().comments[0].id;
    john.reply(root, String::from("reply")).await.unwrap();
    let reply = john.view().comments[1].id;
    jane.reply(reply, String::from("nested")).await.unwrap();
    john.submit(String::from("other")).await.unwrap();
    crew.backdate(reply, 5).await;
    until("ops sees everything", || ops.view().count() == 4).await;

    let john_me = crew.actor(&crew.john).await;
    let john_rows = john.rows(&john_me, Utc::now());
    assert!(john_rows[0].delete().is_none());

    let ops_me = crew.actor(&crew.ops).await;
    let rows = ops.rows(&ops_me, Utc::now());
    let reply_row = rows.iter().find(|r| r.comment.id == reply).unwrap();
    assert!(reply_row.affordances.can_delete);
    assert!(!reply_row.affordances.can_edit);
    ops.dispatch(reply_row.delete().unwrap()).await.unwrap();
    assert_eq!(ops.view().count(), 2);
    until("jane sees the deletion", || jane.view().count() == 2).await;
    let left = jane
        .view()
        .comments
        .iter()
        .map(|c| c.content.clone())
        .collect::<Vec<_>>();
    assert_eq!(left, vec![String::from("root"), String::from("other")]);
}

#[tokio::test]
async fn deep_threads_stop_nesting() {
    let crew = Crew::new(false);
    let jane = crew.mounted(&crew.jane).await;
    let me = crew.actor(&crew.jane).await;
    jane.submit(String::from("level 0")).await.unwrap();
    for level in 1..5 {
        let parent = jane.view().comments.last().unwrap().id;
        jane.reply(parent, format!("level {level}")).await.unwrap();
    }

    let rows = jane.rows(&me, Utc::now());
    let depths = rows.iter().map(|r| r.depth).collect::<Vec<_>>();
    let indents = rows.iter().map(|r| r.indent).collect::<Vec<_>>();
    let replies = rows
        .iter()
        .map(|r| r.affordances.can_reply)
        .collect::<Vec<_>>();
    assert_eq!(depths, vec![0, 1, 2, 3, 4]);
    assert_eq!(indents, vec![0, 1, 2, 3, 3]);
    assert_eq!(replies, vec![true, true, true, false, false]);
    assert!(rows[3].reply(String::from("deeper")).is_none());
}

#[tokio::test]
async fn unmounting_releases_the_change_feed() {
    let crew = Crew::new(false);
    let jane = crew.mounted(&crew.jane).await;
    let john = crew.mounted(&crew.john).await;
    crew.until_feeds(2).await;

    john.unmount();
    crew.until_feeds(1).await;
    assert!(!john.is_mounted());
    assert!(matches!(
        john.submit(String::from("hello")).await,
        Err(Error::NotMounted)
    ));

    // the unmounted view is frozen
    jane.submit(String::from("Great work")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(john.view().count(), 0);

    drop(jane);
    crew.until_feeds(0).await;

    // mounting again picks up what was missed
    john.mount(&crew.john).await.unwrap();
    assert_eq!(john.view().count(), 1);
    crew.until_feeds(1).await;
}

#[tokio::test]
async fn inputs_keep_their_text_until_it_is_posted() {
    let crew = Crew::new(false);
    let jane = crew.mounted(&crew.jane).await;
    let input = CommentInput::new(InputMode::Compose);

    input.set_text(" \n ");
    let outcome = input.submit(|c| jane.submit(c)).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Empty);

    let lost = Coordinator::new(PostId(Uuid::new_v4()), Arc::new(crew.jane.clone()), thread_config());
    assert!(lost.mount(&crew.jane).await.is_err());
    assert!(matches!(lost.view().state, LoadState::Error(_)));
    input.set_text(" Great work ");
    let err = input.submit(|c| lost.submit(c)).await.unwrap_err();
    assert_eq!(err.api(), Some(&ApiError::NotFound));
    assert_eq!(input.text(), " Great work ");

    let outcome = input.submit(|c| jane.submit(c)).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Sent);
    assert_eq!(input.text(), "");
    assert_eq!(jane.view().comments[0].content, "Great work");
}

#[tokio::test]
async fn anonymous_posts_hide_their_author() {
    let crew = Crew::new(true);
    let jane = crew.mounted(&crew.jane).await;
    let john = crew.mounted(&crew.john).await;
    let ops = crew.mounted(&crew.ops).await;
    jane.submit(String::from("it was me")).await.unwrap();
    until("john sees the comment", || john.view().count() == 1).await;
    until("ops sees the comment", || ops.view().count() == 1).await;

    let john_me = crew.actor(&crew.john).await;
    let rows = john.rows(&john_me, Utc::now());
    assert_eq!(rows[0].comment.author_display_name, ANONYMOUS);
    assert_eq!(rows[0].comment.author_role, ANONYMOUS);
    assert!(!rows[0].is_own);
    assert!(rows[0].affordances.can_reply);
    assert!(!rows[0].affordances.can_edit);

    assert_eq!(ops.view().comments[0].author_display_name, "Jane");
    let jane_me = crew.actor(&crew.jane).await;
    assert!(jane.rows(&jane_me, Utc::now())[0].is_own);
    assert_eq!(crew.author_id, jane_me.id);
}

#[tokio::test]
async fn refused_mutations_leave_the_thread_alone() {
    let crew = Crew::new(false);
    let jane = crew.mounted(&crew.jane).await;
    let john = crew.mounted(&crew.john).await;
    jane.submit(String::from("Great work")).await.unwrap();
    until("john sees the comment", || john.view().count() == 1).await;
    let id = john.view().comments[0].id;

    let err = john.edit(id, String::from("mine now")).await.unwrap_err();
    assert_eq!(err.api(), Some(&ApiError::PermissionDenied));
    let err = john.delete(id).await.unwrap_err();
    assert_eq!(err.api(), Some(&ApiError::PermissionDenied));
    let err = john.submit(String::from("   ")).await.unwrap_err();
    assert_eq!(err.api(), Some(&ApiError::EmptyContent));
    assert_eq!(john.view().comments[0].content, "Great work");
    assert_eq!(crew.mock.lock().await.test_num_comments(), 1);
}
