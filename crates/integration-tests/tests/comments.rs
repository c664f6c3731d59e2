//! Moderation queue and comment counts.

#![allow(clippy::unwrap_used)]

use folio_cms::LifecycleError;
use folio_cms::models::{AccountCommentStats, ModerationStats};
use folio_core::CommentStatus;
use folio_integration_tests::TestContext;

#[tokio::test]
async fn test_pending_queue_spans_items_newest_first() {
    let ctx = TestContext::new();
    let admin = ctx.administrator("admin").await;
    let writer = ctx.member("writer").await;
    let reader = ctx.member("reader").await;
    let first = ctx.post(&writer, "First", false).await;
    let second = ctx.post(&writer, "Second", false).await;
    let comments = ctx.lifecycle.comments();

    let early = comments.add(&reader, first.id, "Early").await.unwrap();
    let late = comments.add(&reader, second.id, "Late").await.unwrap();
    ctx.comment(&first, &reader, &admin).await;

    let queue = comments.list_pending(&admin).await.unwrap();
    let ids: Vec<_> = queue.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![late.id, early.id]);
    assert!(queue.iter().all(|c| c.status == CommentStatus::Pending));

    let denied = comments.list_pending(&writer).await;
    assert!(matches!(denied, Err(LifecycleError::Unauthorized(_))));

    comments.approve(&admin, early.id).await.unwrap();
    let queue = comments.list_pending(&admin).await.unwrap();
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn test_counts_follow_approval_and_deletion() {
    let ctx = TestContext::new();
    let admin = ctx.administrator("admin").await;
    let writer = ctx.member("writer").await;
    let reader = ctx.member("reader").await;
    let item = ctx.post(&writer, "Counted", false).await;
    let comments = ctx.lifecycle.comments();

    ctx.comment(&item, &reader, &admin).await;
    ctx.comment(&item, &writer, &admin).await;
    comments.add(&reader, item.id, "Waiting").await.unwrap();

    assert_eq!(comments.approved_count(item.id).await.unwrap(), 2);
    assert_eq!(
        comments.moderation_stats(&admin).await.unwrap(),
        ModerationStats {
            total: 3,
            pending: 1
        }
    );
    assert_eq!(
        comments
            .account_stats(&writer, writer.account_id)
            .await
            .unwrap(),
        AccountCommentStats {
            made: 1,
            received: 3
        }
    );
    assert_eq!(
        comments
            .account_stats(&admin, reader.account_id)
            .await
            .unwrap(),
        AccountCommentStats {
            made: 2,
            received: 0
        }
    );

    ctx.lifecycle
        .deletion()
        .delete_account(&admin, reader.account_id)
        .await
        .unwrap();

    assert_eq!(comments.approved_count(item.id).await.unwrap(), 1);
    assert_eq!(
        comments.moderation_stats(&admin).await.unwrap(),
        ModerationStats {
            total: 1,
            pending: 0
        }
    );
    assert_eq!(
        comments
            .account_stats(&writer, writer.account_id)
            .await
            .unwrap(),
        AccountCommentStats {
            made: 1,
            received: 1
        }
    );
}
