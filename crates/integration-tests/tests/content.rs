//! Content writes from stale or foreign sessions.

#![allow(clippy::unwrap_used)]

use folio_cms::LifecycleError;
use folio_cms::services::{AssetChange, ContentUpdate, NewContent};
use folio_core::{ContentKind, ContentStatus};
use folio_integration_tests::{PASSWORD, TestContext, png, post_input};

// ============================================================================
// Stale sessions
// ============================================================================

#[tokio::test]
async fn test_create_after_account_deletion_is_not_found() {
    let ctx = TestContext::new();
    let admin = ctx.administrator("admin").await;
    ctx.member("leaving").await;
    let stale = ctx
        .lifecycle
        .credentials()
        .authenticate("leaving", PASSWORD)
        .await
        .unwrap();

    ctx.lifecycle
        .deletion()
        .delete_account(&admin, stale.account_id)
        .await
        .unwrap();

    let err = ctx
        .lifecycle
        .content()
        .create(
            &stale,
            NewContent {
                featured_image: Some(png()),
                ..post_input("Posted from an old tab")
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::NotFound("account")));
    assert!(!err.is_internal());
    assert!(ctx.blobs.is_empty().await);
    assert_eq!(ctx.store.content_count().await, 0);
}

// ============================================================================
// Foreign drafts
// ============================================================================

#[tokio::test]
async fn test_foreign_draft_is_not_found_for_update_and_delete() {
    let ctx = TestContext::new();
    let owner = ctx.member("owner").await;
    let other = ctx.member("other").await;
    let content = ctx.lifecycle.content();

    let draft = content
        .create(
            &owner,
            NewContent {
                status: ContentStatus::Draft,
                ..post_input("Embargoed")
            },
        )
        .await
        .unwrap();

    let update = ContentUpdate {
        title: "Leaked".to_owned(),
        body: "<p>Leaked</p>".to_owned(),
        excerpt: None,
        status: ContentStatus::Published,
        featured_image: AssetChange::Keep,
    };
    let err = content.update(&other, draft.id, update).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound("post")));

    let err = ctx
        .lifecycle
        .deletion()
        .delete_content_item(&other, draft.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound("post")));

    let unchanged = content
        .get_by_slug(Some(&owner), ContentKind::Post, draft.slug.as_str())
        .await
        .unwrap();
    assert_eq!(unchanged.title, "Embargoed");
    assert_eq!(unchanged.status, ContentStatus::Draft);
}

#[tokio::test]
async fn test_foreign_published_item_is_unauthorized() {
    let ctx = TestContext::new();
    let owner = ctx.member("owner").await;
    let other = ctx.member("other").await;
    let item = ctx.post(&owner, "Public", false).await;

    let update = ContentUpdate {
        title: "Defaced".to_owned(),
        body: String::new(),
        excerpt: None,
        status: ContentStatus::Published,
        featured_image: AssetChange::Remove,
    };
    let err = ctx
        .lifecycle
        .content()
        .update(&other, item.id, update)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Unauthorized(_)));
}
