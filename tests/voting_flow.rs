//! Voting and post history against a real PostgreSQL database.
//!
//! These need `DATABASE_URL` to point at a server where the test user may create
//! databases. Run with `cargo test -- --ignored`.

use appeal::{
    auth::AuthUser,
    error::AppError,
    models::{
        Comment, CreateCommentRequest, CreatePostRequest, MarkType, NewUser, PostFilter,
        PostResponse, RatedScope, UpdateCommentRequest,
    },
    services::{comment_service, history_service, mark_service, post_service, user_service},
};
use sqlx::PgPool;
use std::time::Duration;

async fn user(db: &PgPool, username: &str) -> AuthUser {
    let (user, _profile) = user_service::create_user(
        db,
        &NewUser {
            username: username.to_string(),
            email: None,
            password_hash: None,
            is_staff: false,
        },
    )
    .await
    .unwrap();

    AuthUser {
        user_id: user.id,
        username: user.username,
        jti: String::new(),
    }
}

async fn post_by(db: &PgPool, author: Option<&AuthUser>, body: &str) -> PostResponse {
    post_service::create_post(
        db,
        author,
        &CreatePostRequest {
            body: body.to_string(),
            username: Some("guest".to_string()),
            email: None,
            tags: None,
        },
    )
    .await
    .unwrap()
}

async fn comment_on(db: &PgPool, author: Option<&AuthUser>, post_id: i64, body: &str) -> Comment {
    comment_service::create_comment(
        db,
        author,
        &CreateCommentRequest {
            post: post_id,
            body: body.to_string(),
            username: Some("guest".to_string()),
            email: None,
        },
    )
    .await
    .unwrap()
}

async fn marks_of(db: &PgPool, post_id: i64, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM post_marks WHERE post_id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(user_id)
        .fetch_one(db)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn like_toggle_and_comment_scenario(db: PgPool) {
    let a = user(&db, "alice").await;
    let b = user(&db, "bob").await;
    let c = user(&db, "carol").await;

    let post = post_by(&db, Some(&a), "first").await;
    let t0 = post.created;
    assert_eq!(post.username, "alice");
    assert_eq!(post.last_action, Some(t0));

    // B likes
    let rated = mark_service::rate_post(&db, post.id, b.user_id, Some(MarkType::Like))
        .await
        .unwrap();
    assert_eq!(rated, 1);
    assert_eq!(mark_service::mark_counts(&db, post.id).await.unwrap(), (1, 0));

    let history = history_service::get_history(&db, post.id).await.unwrap().unwrap();
    assert!(history.up_voted.is_some());
    assert_eq!(history.last_action, Some(t0));

    // B likes again: withdrawn
    let rated = mark_service::rate_post(&db, post.id, b.user_id, Some(MarkType::Like))
        .await
        .unwrap();
    assert_eq!(rated, 0);
    assert_eq!(mark_service::mark_counts(&db, post.id).await.unwrap(), (0, 0));

    let history = history_service::get_history(&db, post.id).await.unwrap().unwrap();
    assert!(history.un_voted.is_some());
    assert_eq!(history.last_action, Some(t0));

    // C comments
    let comment = comment_service::create_comment(
        &db,
        Some(&c),
        &CreateCommentRequest {
            post: post.id,
            body: "nice".to_string(),
            username: None,
            email: None,
        },
    )
    .await
    .unwrap();

    let history = history_service::get_history(&db, post.id).await.unwrap().unwrap();
    assert_eq!(history.commented, Some(comment.created));
    assert_eq!(history.last_action, Some(comment.created));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_histories WHERE post_id = $1")
        .bind(post.id)
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn owner_cannot_mark_own_post(db: PgPool) {
    let a = user(&db, "alice").await;
    let post = post_by(&db, Some(&a), "mine").await;

    let mark = mark_service::submit_mark(&db, post.id, a.user_id, MarkType::Like)
        .await
        .unwrap();
    assert!(mark.is_none());

    let rated = mark_service::rate_post(&db, post.id, a.user_id, Some(MarkType::Dislike))
        .await
        .unwrap();
    assert_eq!(rated, 0);

    assert_eq!(marks_of(&db, post.id, a.user_id).await, 0);
    assert_eq!(mark_service::mark_counts(&db, post.id).await.unwrap(), (0, 0));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn like_then_dislike_keeps_one_dislike(db: PgPool) {
    let a = user(&db, "alice").await;
    let b = user(&db, "bob").await;
    let post = post_by(&db, Some(&a), "post").await;

    mark_service::rate_post(&db, post.id, b.user_id, Some(MarkType::Like))
        .await
        .unwrap();
    mark_service::rate_post(&db, post.id, b.user_id, Some(MarkType::Dislike))
        .await
        .unwrap();

    assert_eq!(marks_of(&db, post.id, b.user_id).await, 1);
    assert_eq!(mark_service::mark_counts(&db, post.id).await.unwrap(), (0, 1));

    let seen = post_service::get_post_by_id(&db, post.id, Some(b.user_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen.rated, 2);

    let anonymous = post_service::get_post_by_id(&db, post.id, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(anonymous.rated, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn duplicate_marks_are_healed(db: PgPool) {
    let a = user(&db, "alice").await;
    let b = user(&db, "bob").await;
    let post = post_by(&db, Some(&a), "post").await;

    for _ in 0..3 {
        sqlx::query("INSERT INTO post_marks (post_id, user_id, mark_type) VALUES ($1, $2, 1)")
            .bind(post.id)
            .bind(b.user_id)
            .execute(&db)
            .await
            .unwrap();
    }

    let mark = mark_service::submit_mark(&db, post.id, b.user_id, MarkType::Dislike)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(mark.mark_type, MarkType::Dislike);
    assert_eq!(marks_of(&db, post.id, b.user_id).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn concurrent_submissions_leave_one_mark(db: PgPool) {
    let a = user(&db, "alice").await;
    let b = user(&db, "bob").await;
    let post = post_by(&db, Some(&a), "post").await;

    let (post_id, voter_id) = (post.id, b.user_id);
    let mut handles = Vec::new();
    for i in 0..8 {
        let db = db.clone();
        let mark_type = if i % 2 == 0 {
            MarkType::Like
        } else {
            MarkType::Dislike
        };
        handles.push(tokio::spawn(async move {
            mark_service::submit_mark(&db, post_id, voter_id, mark_type).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(marks_of(&db, post.id, b.user_id).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn deleting_a_mark_records_un_vote(db: PgPool) {
    let a = user(&db, "alice").await;
    let b = user(&db, "bob").await;
    let post = post_by(&db, None, "anonymous post").await;

    let mark = mark_service::submit_mark(&db, post.id, b.user_id, MarkType::Like)
        .await
        .unwrap()
        .unwrap();

    let err = mark_service::delete_mark(&db, mark.id, a.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    mark_service::delete_mark(&db, mark.id, b.user_id).await.unwrap();

    let history = history_service::get_history(&db, post.id).await.unwrap().unwrap();
    assert!(history.un_voted.is_some());
    assert_eq!(history.last_action, Some(post.created));
    assert!(mark_service::get_mark(&db, mark.id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn rated_listing_only_shows_marked_posts(db: PgPool) {
    let a = user(&db, "alice").await;
    let b = user(&db, "bob").await;
    let liked = post_by(&db, Some(&a), "liked").await;
    let _ignored = post_by(&db, Some(&a), "ignored").await;

    mark_service::rate_post(&db, liked.id, b.user_id, Some(MarkType::Like))
        .await
        .unwrap();

    let filter = PostFilter::default();
    let all = post_service::get_posts(&db, Some(b.user_id), &filter, RatedScope::All)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let rated = post_service::get_posts(
        &db,
        Some(b.user_id),
        &filter,
        RatedScope::OnlyRated,
    )
    .await
    .unwrap();
    assert_eq!(rated.len(), 1);
    assert_eq!(rated[0].id, liked.id);
    assert_eq!(rated[0].rated, 1);

    let anonymous =
        post_service::get_posts(&db, None, &filter, RatedScope::OnlyRated)
            .await
            .unwrap();
    assert!(anonymous.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn comment_on_missing_post_is_not_found(db: PgPool) {
    let err = comment_service::create_comment(
        &db,
        None,
        &CreateCommentRequest {
            post: 9999,
            body: "hello?".to_string(),
            username: Some("guest".to_string()),
            email: None,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn new_user_gets_default_profile(db: PgPool) {
    let a = user(&db, "alice").await;

    let profile = user_service::get_profile(&db, a.user_id).await.unwrap();
    assert!(profile.receive_comments_email);
    assert!(!profile.email_confirmed);

    let err = user_service::create_user(
        &db,
        &NewUser {
            username: "alice".to_string(),
            email: None,
            password_hash: None,
            is_staff: false,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn queued_comments_leave_the_newest_in_history(db: PgPool) {
    let a = user(&db, "alice").await;
    let post = post_by(&db, Some(&a), "busy").await;

    for round in 0..10 {
        // Hold the post so both comments queue up behind it
        let mut holder = db.begin().await.unwrap();
        sqlx::query("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
            .bind(post.id)
            .execute(&mut *holder)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for body in ["first", "second"] {
            let db = db.clone();
            let post_id = post.id;
            handles.push(tokio::spawn(async move {
                comment_on(&db, None, post_id, body).await
            }));
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        holder.commit().await.unwrap();

        let mut latest = None;
        for handle in handles {
            let created = handle.await.unwrap().created;
            latest = latest.max(Some(created));
        }

        let history = history_service::get_history(&db, post.id).await.unwrap().unwrap();
        assert_eq!(history.commented, latest, "round {round}");
        assert_eq!(history.last_action, latest, "round {round}");
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn editing_a_comment_records_history(db: PgPool) {
    let a = user(&db, "alice").await;
    let c = user(&db, "carol").await;
    let post = post_by(&db, Some(&a), "post").await;

    let older = comment_on(&db, Some(&c), post.id, "first").await;

    sqlx::query("UPDATE post_histories SET commented = NULL, last_action = $2 WHERE post_id = $1")
        .bind(post.id)
        .bind(post.created)
        .execute(&db)
        .await
        .unwrap();

    let edit = UpdateCommentRequest {
        body: "first, edited".to_string(),
    };
    comment_service::update_comment(&db, older.id, c.user_id, &edit)
        .await
        .unwrap();

    let history = history_service::get_history(&db, post.id).await.unwrap().unwrap();
    assert_eq!(history.commented, Some(older.created));
    assert_eq!(history.last_action, Some(older.created));

    // Editing the older comment again keeps the newer one in history
    let newer = comment_on(&db, Some(&c), post.id, "second").await;
    comment_service::update_comment(&db, older.id, c.user_id, &edit)
        .await
        .unwrap();

    let history = history_service::get_history(&db, post.id).await.unwrap().unwrap();
    assert_eq!(history.commented, Some(newer.created));
    assert_eq!(history.last_action, Some(newer.created));

    let versions = comment_service::get_comment_versions(&db, older.id)
        .await
        .unwrap();
    assert_eq!(versions.len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn racing_registrations_yield_one_user(db: PgPool) {
    let mut handles = Vec::new();
    for _ in 0..4 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            user_service::create_user(
                &db,
                &NewUser {
                    username: "dave".to_string(),
                    email: None,
                    password_hash: None,
                    is_staff: false,
                },
            )
            .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(created, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn updating_a_mark_replaces_it(db: PgPool) {
    let a = user(&db, "alice").await;
    let b = user(&db, "bob").await;
    let post = post_by(&db, Some(&a), "post").await;

    let like = mark_service::submit_mark(&db, post.id, b.user_id, MarkType::Like)
        .await
        .unwrap()
        .unwrap();

    let err = mark_service::update_mark(&db, like.id, a.user_id, MarkType::Dislike)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let dislike = mark_service::update_mark(&db, like.id, b.user_id, MarkType::Dislike)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(dislike.mark_type, MarkType::Dislike);
    assert_eq!(marks_of(&db, post.id, b.user_id).await, 1);
    assert_eq!(mark_service::mark_counts(&db, post.id).await.unwrap(), (0, 1));

    let history = history_service::get_history(&db, post.id).await.unwrap().unwrap();
    assert_eq!(history.down_voted, Some(dislike.created));

    let err = mark_service::update_mark(&db, like.id, b.user_id, MarkType::Like)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
