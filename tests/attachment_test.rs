use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use bullhorn::{
    auth::AuthService,
    domain::{Category, CreateAnnouncementRequest, DirectoryUser, DurationUnit, LastFor, Role},
    error::AppError,
    fanout::{realtime::NoopPublisher, Fanout, ReadCache},
    repository::{
        SqliteAnnouncementRepository, SqliteNotificationRepository, SqliteUserRepository,
        UserRepository,
    },
    service::{ServiceContext, UploadFile},
    storage::{BlobStore, FlakyBlobStore, LocalBlobStore},
};

fn scratch_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("bullhorn-test-{}", Uuid::new_v4()))
}

async fn setup() -> anyhow::Result<Arc<ServiceContext>> {
    setup_with(Arc::new(LocalBlobStore::new(scratch_dir(), 10))).await
}

async fn setup_with(blob_store: Arc<dyn BlobStore>) -> anyhow::Result<Arc<ServiceContext>> {
    let pool = SqlitePool::connect(":memory:").await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let user_repo = Arc::new(SqliteUserRepository::new(pool.clone()));
    let announcement_repo = Arc::new(SqliteAnnouncementRepository::new(pool.clone()));
    let notification_repo = Arc::new(SqliteNotificationRepository::new(pool.clone()));

    let fanout = Arc::new(Fanout::new(
        user_repo.clone(),
        announcement_repo.clone(),
        notification_repo.clone(),
        Arc::new(NoopPublisher),
        Arc::new(ReadCache::new()),
        None,
    ));

    let auth_service = Arc::new(AuthService::new(pool.clone()));

    Ok(Arc::new(ServiceContext::new(
        user_repo,
        announcement_repo,
        notification_repo,
        blob_store,
        fanout,
        auth_service,
        pool,
    )))
}

async fn seed_user(ctx: &ServiceContext, role: Role) -> anyhow::Result<DirectoryUser> {
    let now = Utc::now();
    let user = DirectoryUser {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", Uuid::new_v4()),
        full_name: "Test User".to_string(),
        role,
        department_id: None,
        is_active: true,
        is_verified: true,
        created_at: now,
        updated_at: now,
    };
    Ok(ctx.user_repo.create(&user, "not-a-real-hash").await?)
}

async fn seed_announcement(ctx: &ServiceContext, creator: &DirectoryUser) -> anyhow::Result<Uuid> {
    let outcome = ctx
        .announcement_service
        .create(
            creator,
            CreateAnnouncementRequest {
                title: "With files".to_string(),
                description: "See attached".to_string(),
                category: Category::General,
                subscribers: None,
                last_for: LastFor {
                    value: 7,
                    unit: DurationUnit::Days,
                },
                scheduled_for: None,
                allow_comments: None,
                is_pinned: None,
            },
            Vec::new(),
        )
        .await?;
    Ok(outcome.announcement.id)
}

fn file(name: &str, data: &[u8]) -> UploadFile {
    UploadFile {
        original_name: name.to_string(),
        data: data.to_vec(),
    }
}

#[tokio::test]
async fn duplicate_content_is_rejected_per_announcement() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;
    let id = seed_announcement(&ctx, &admin).await?;

    let outcome = ctx
        .attachment_service
        .upload(&admin, id, vec![file("report.pdf", b"pdf bytes")])
        .await?;
    assert_eq!(outcome.added.len(), 1);

    // Same bytes under a different name: whole batch is duplicates.
    let result = ctx
        .attachment_service
        .upload(&admin, id, vec![file("renamed.pdf", b"pdf bytes")])
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    // Mixed batch: the new file lands, the duplicate is reported.
    let outcome = ctx
        .attachment_service
        .upload(
            &admin,
            id,
            vec![file("fresh.pdf", b"other bytes"), file("again.pdf", b"pdf bytes")],
        )
        .await?;
    assert_eq!(outcome.added.len(), 1);
    assert_eq!(outcome.duplicates, vec!["again.pdf".to_string()]);

    Ok(())
}

#[tokio::test]
async fn blob_failures_are_captured_per_file() -> anyhow::Result<()> {
    let ctx = setup_with(Arc::new(FlakyBlobStore::new(scratch_dir()))).await?;
    let admin = seed_user(&ctx, Role::Admin).await?;
    let id = seed_announcement(&ctx, &admin).await?;

    // One file the store accepts, one it refuses. The batch goes
    // through; the refusal surfaces per file instead of aborting.
    let outcome = ctx
        .attachment_service
        .upload(
            &admin,
            id,
            vec![
                file("good.pdf", b"fine bytes"),
                file("fail-me.pdf", b"doomed bytes"),
            ],
        )
        .await?;

    assert_eq!(outcome.added.len(), 1);
    assert_eq!(outcome.added[0].original_name, "good.pdf");
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].original_name, "fail-me.pdf");
    assert!(outcome.duplicates.is_empty());

    // The refused file never became a record.
    let listing = ctx.attachment_service.list(&admin, id, true).await?;
    assert_eq!(listing.total, 1);

    // A batch of pure failures reports them all without a conflict.
    let outcome = ctx
        .attachment_service
        .upload(&admin, id, vec![file("fail-me-too.pdf", b"more doom")])
        .await?;
    assert!(outcome.added.is_empty());
    assert_eq!(outcome.failed.len(), 1);

    Ok(())
}

#[tokio::test]
async fn same_content_allowed_on_different_announcements() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;
    let first = seed_announcement(&ctx, &admin).await?;
    let second = seed_announcement(&ctx, &admin).await?;

    ctx.attachment_service
        .upload(&admin, first, vec![file("shared.pdf", b"shared bytes")])
        .await?;
    let outcome = ctx
        .attachment_service
        .upload(&admin, second, vec![file("shared.pdf", b"shared bytes")])
        .await?;
    assert_eq!(outcome.added.len(), 1);

    Ok(())
}

#[tokio::test]
async fn soft_delete_frees_the_hash_and_restore_reclaims_it() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;
    let id = seed_announcement(&ctx, &admin).await?;

    let outcome = ctx
        .attachment_service
        .upload(&admin, id, vec![file("notes.txt", b"meeting notes")])
        .await?;
    let attachment_id = outcome.added[0].id;

    let deleted = ctx
        .attachment_service
        .soft_delete(&admin, id, attachment_id)
        .await?;
    assert!(deleted.is_deleted);
    assert!(deleted.deleted_at.is_some());
    assert_eq!(deleted.deleted_by, Some(admin.id));

    // The hash no longer blocks a re-upload.
    let outcome = ctx
        .attachment_service
        .upload(&admin, id, vec![file("notes-v2.txt", b"meeting notes")])
        .await?;
    assert_eq!(outcome.added.len(), 1);

    // Restoring the original would revive a duplicate hash.
    let result = ctx
        .attachment_service
        .restore(&admin, id, attachment_id)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn restore_round_trip() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;
    let id = seed_announcement(&ctx, &admin).await?;

    let outcome = ctx
        .attachment_service
        .upload(&admin, id, vec![file("policy.pdf", b"policy text")])
        .await?;
    let attachment_id = outcome.added[0].id;

    ctx.attachment_service
        .soft_delete(&admin, id, attachment_id)
        .await?;

    let restored = ctx
        .attachment_service
        .restore(&admin, id, attachment_id)
        .await?;
    assert!(!restored.is_deleted);
    assert_eq!(restored.deleted_at, None);
    assert_eq!(restored.deleted_by, None);

    // Restoring a live attachment is an error.
    let result = ctx
        .attachment_service
        .restore(&admin, id, attachment_id)
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    Ok(())
}

#[tokio::test]
async fn only_admins_restore() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;
    let manager = seed_user(&ctx, Role::Manager).await?;
    let id = seed_announcement(&ctx, &admin).await?;

    let outcome = ctx
        .attachment_service
        .upload(&admin, id, vec![file("a.txt", b"aaa")])
        .await?;
    let attachment_id = outcome.added[0].id;

    ctx.attachment_service
        .soft_delete(&admin, id, attachment_id)
        .await?;

    let result = ctx
        .attachment_service
        .restore(&manager, id, attachment_id)
        .await;
    assert!(matches!(result, Err(AppError::Forbidden)));

    Ok(())
}

#[tokio::test]
async fn hard_delete_removes_the_record() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;
    let id = seed_announcement(&ctx, &admin).await?;

    let outcome = ctx
        .attachment_service
        .upload(&admin, id, vec![file("tmp.txt", b"scratch")])
        .await?;
    let attachment_id = outcome.added[0].id;

    ctx.attachment_service
        .hard_delete(&admin, id, attachment_id)
        .await?;

    let listing = ctx.attachment_service.list(&admin, id, true).await?;
    assert_eq!(listing.total, 0);

    // Hard delete also frees the hash.
    let outcome = ctx
        .attachment_service
        .upload(&admin, id, vec![file("tmp.txt", b"scratch")])
        .await?;
    assert_eq!(outcome.added.len(), 1);

    Ok(())
}

#[tokio::test]
async fn listing_partitions_by_resource_type() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;
    let employee = seed_user(&ctx, Role::Employee).await?;
    let id = seed_announcement(&ctx, &admin).await?;

    let outcome = ctx
        .attachment_service
        .upload(
            &admin,
            id,
            vec![
                file("photo.png", b"png bytes"),
                file("chart.jpg", b"jpg bytes"),
                file("minutes.docx", b"doc bytes"),
            ],
        )
        .await?;
    assert_eq!(outcome.added.len(), 3);

    ctx.attachment_service
        .soft_delete(&admin, id, outcome.added[0].id)
        .await?;

    // Default listing hides the soft-deleted image.
    let listing = ctx.attachment_service.list(&employee, id, false).await?;
    assert_eq!(listing.image_count, 1);
    assert_eq!(listing.document_count, 1);
    assert_eq!(listing.total, 2);

    // include_deleted only takes effect for admins.
    let listing = ctx.attachment_service.list(&employee, id, true).await?;
    assert_eq!(listing.total, 2);

    let listing = ctx.attachment_service.list(&admin, id, true).await?;
    assert_eq!(listing.image_count, 2);
    assert_eq!(listing.total, 3);

    Ok(())
}

#[tokio::test]
async fn tagging_validates_the_vocabulary() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;
    let id = seed_announcement(&ctx, &admin).await?;

    let outcome = ctx
        .attachment_service
        .upload(&admin, id, vec![file("plan.pdf", b"plan")])
        .await?;
    let attachment_id = outcome.added[0].id;

    let tagged = ctx
        .attachment_service
        .set_tag(&admin, id, attachment_id, "policy")
        .await?;
    assert_eq!(tagged.tag.as_str(), "policy");

    let result = ctx
        .attachment_service
        .set_tag(&admin, id, attachment_id, "meme")
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    Ok(())
}
