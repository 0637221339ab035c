use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use bullhorn::{
    auth::AuthService,
    domain::{
        Category, CreateAnnouncementRequest, DirectoryUser, DurationUnit, LastFor, Role,
        UpdateAnnouncementRequest,
    },
    error::AppError,
    fanout::{realtime::NoopPublisher, Fanout, ReadCache},
    repository::{
        SqliteAnnouncementRepository, SqliteNotificationRepository, SqliteUserRepository,
        UserRepository,
    },
    service::ServiceContext,
    storage::LocalBlobStore,
};

async fn setup() -> anyhow::Result<Arc<ServiceContext>> {
    let pool = SqlitePool::connect(":memory:").await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let user_repo = Arc::new(SqliteUserRepository::new(pool.clone()));
    let announcement_repo = Arc::new(SqliteAnnouncementRepository::new(pool.clone()));
    let notification_repo = Arc::new(SqliteNotificationRepository::new(pool.clone()));

    let blob_store = Arc::new(LocalBlobStore::new(
        std::env::temp_dir().join(format!("bullhorn-test-{}", Uuid::new_v4())),
        10,
    ));

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

fn request(title: &str) -> CreateAnnouncementRequest {
    CreateAnnouncementRequest {
        title: title.to_string(),
        description: "Something happened".to_string(),
        category: Category::General,
        subscribers: None,
        last_for: LastFor {
            value: 7,
            unit: DurationUnit::Days,
        },
        scheduled_for: None,
        allow_comments: None,
        is_pinned: None,
    }
}

#[tokio::test]
async fn create_broadcasts_and_snapshots_recipients() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;
    let employee = seed_user(&ctx, Role::Employee).await?;

    let outcome = ctx
        .announcement_service
        .create(&admin, request("Office move"), Vec::new())
        .await?;

    let announcement = outcome.announcement;
    assert!(!announcement.is_scheduled);
    assert!(announcement.broadcasted_at.is_some());

    let recipients = announcement.broadcasted_to.expect("snapshot recorded");
    assert!(recipients.contains(&admin.id));
    assert!(recipients.contains(&employee.id));

    Ok(())
}

#[tokio::test]
async fn employees_cannot_publish() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let employee = seed_user(&ctx, Role::Employee).await?;

    let result = ctx
        .announcement_service
        .create(&employee, request("Nope"), Vec::new())
        .await;

    assert!(matches!(result, Err(AppError::Forbidden)));
    Ok(())
}

#[tokio::test]
async fn pin_capacity_is_three() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;

    for i in 0..3 {
        let mut req = request(&format!("Pinned {}", i));
        req.is_pinned = Some(true);
        ctx.announcement_service
            .create(&admin, req, Vec::new())
            .await?;
    }

    let mut req = request("One too many");
    req.is_pinned = Some(true);
    let result = ctx
        .announcement_service
        .create(&admin, req, Vec::new())
        .await;
    assert!(matches!(result, Err(AppError::Capacity(_))));

    // Unpinned creation still works against a full pin set.
    ctx.announcement_service
        .create(&admin, request("Unpinned"), Vec::new())
        .await?;

    Ok(())
}

#[tokio::test]
async fn unpin_renumbers_remaining_positions() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;

    let mut ids = Vec::new();
    for i in 0..3 {
        let mut req = request(&format!("Pinned {}", i));
        req.is_pinned = Some(true);
        let outcome = ctx
            .announcement_service
            .create(&admin, req, Vec::new())
            .await?;
        ids.push(outcome.announcement.id);
    }

    // Drop the middle pin; the third moves up to position 2.
    ctx.announcement_service
        .set_pinned(&admin, ids[1], false)
        .await?;

    let first = ctx.announcement_service.fetch(ids[0]).await?;
    let third = ctx.announcement_service.fetch(ids[2]).await?;
    assert_eq!(first.pin_position, Some(1));
    assert_eq!(third.pin_position, Some(2));

    // A freed slot is reusable.
    let fourth = ctx
        .announcement_service
        .create(
            &admin,
            {
                let mut req = request("Backfill");
                req.is_pinned = Some(true);
                req
            },
            Vec::new(),
        )
        .await?;
    assert_eq!(fourth.announcement.pin_position, Some(3));

    Ok(())
}

#[tokio::test]
async fn archiving_forces_unpin() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;

    let mut req = request("Pinned then archived");
    req.is_pinned = Some(true);
    let outcome = ctx
        .announcement_service
        .create(&admin, req, Vec::new())
        .await?;

    let archived = ctx
        .announcement_service
        .set_archived(&admin, outcome.announcement.id, true)
        .await?;

    assert!(archived.is_archived);
    assert!(archived.archived_at.is_some());
    assert!(!archived.is_pinned);
    assert_eq!(archived.pin_position, None);

    Ok(())
}

#[tokio::test]
async fn extend_expiry_recomputes_from_now() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;

    let outcome = ctx
        .announcement_service
        .create(&admin, request("Short lived"), Vec::new())
        .await?;

    let extended = ctx
        .announcement_service
        .extend_expiry(
            &admin,
            outcome.announcement.id,
            LastFor {
                value: 4,
                unit: DurationUnit::Weeks,
            },
        )
        .await?;

    assert!(extended.expires_at > Utc::now() + Duration::weeks(3));

    let rejected = ctx
        .announcement_service
        .extend_expiry(
            &admin,
            outcome.announcement.id,
            LastFor {
                value: 0,
                unit: DurationUnit::Days,
            },
        )
        .await;
    assert!(matches!(rejected, Err(AppError::Validation(_))));

    Ok(())
}

#[tokio::test]
async fn overlong_durations_are_rejected() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;

    // Astronomical spans fail validation instead of blowing up the
    // date arithmetic.
    let mut req = request("Forever");
    req.last_for = LastFor {
        value: 4_000_000_000_000,
        unit: DurationUnit::Hours,
    };
    let result = ctx
        .announcement_service
        .create(&admin, req, Vec::new())
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let outcome = ctx
        .announcement_service
        .create(&admin, request("Normal"), Vec::new())
        .await?;

    let result = ctx
        .announcement_service
        .extend_expiry(
            &admin,
            outcome.announcement.id,
            LastFor {
                value: LastFor::MAX_VALUE + 1,
                unit: DurationUnit::Days,
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    // The ceiling itself is accepted.
    let extended = ctx
        .announcement_service
        .extend_expiry(
            &admin,
            outcome.announcement.id,
            LastFor {
                value: LastFor::MAX_VALUE,
                unit: DurationUnit::Days,
            },
        )
        .await?;
    assert!(extended.expires_at > Utc::now() + Duration::weeks(520));

    Ok(())
}

#[tokio::test]
async fn pin_rejection_leaves_content_edits_unapplied() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;

    for i in 0..3 {
        let mut req = request(&format!("Pinned {}", i));
        req.is_pinned = Some(true);
        ctx.announcement_service
            .create(&admin, req, Vec::new())
            .await?;
    }

    let outcome = ctx
        .announcement_service
        .create(&admin, request("Original"), Vec::new())
        .await?;
    let id = outcome.announcement.id;

    // Pinning into a full set fails the whole request; the title edit
    // must not land half-applied.
    let result = ctx
        .announcement_service
        .update(
            &admin,
            id,
            UpdateAnnouncementRequest {
                title: Some("Revised".to_string()),
                is_pinned: Some(true),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Capacity(_))));

    let unchanged = ctx.announcement_service.fetch(id).await?;
    assert_eq!(unchanged.title, "Original");
    assert!(!unchanged.is_pinned);

    Ok(())
}

#[tokio::test]
async fn mark_read_counts_each_user_once() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;
    let reader = seed_user(&ctx, Role::Employee).await?;

    let outcome = ctx
        .announcement_service
        .create(&admin, request("Read me"), Vec::new())
        .await?;
    let id = outcome.announcement.id;

    assert!(ctx.announcement_service.mark_read(&reader, id).await?);
    assert!(!ctx.announcement_service.mark_read(&reader, id).await?);
    assert!(!ctx.announcement_service.mark_read(&reader, id).await?);

    let announcement = ctx.announcement_service.fetch(id).await?;
    assert_eq!(announcement.view_count, 1);
    assert_eq!(announcement.read_by.len(), 1);
    assert_eq!(announcement.read_by[0].user_id, reader.id);

    Ok(())
}

#[tokio::test]
async fn scheduled_announcements_broadcast_when_due() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;

    let mut req = request("Later");
    req.scheduled_for = Some(Utc::now() + Duration::hours(2));
    let outcome = ctx
        .announcement_service
        .create(&admin, req, Vec::new())
        .await?;

    let announcement = outcome.announcement;
    assert!(announcement.is_scheduled);
    assert!(announcement.broadcasted_at.is_none());

    // Nothing due yet.
    assert_eq!(ctx.announcement_service.broadcast_due().await?, 0);

    // Move the schedule into the past, as the sweeper would find it.
    sqlx::query("UPDATE announcements SET scheduled_for = ? WHERE id = ?")
        .bind((Utc::now() - Duration::minutes(1)).naive_utc())
        .bind(announcement.id.to_string())
        .execute(&ctx.db_pool)
        .await?;

    assert_eq!(ctx.announcement_service.broadcast_due().await?, 1);

    let broadcast = ctx.announcement_service.fetch(announcement.id).await?;
    assert!(!broadcast.is_scheduled);
    assert!(broadcast.broadcasted_at.is_some());

    // Already swept; not picked up twice.
    assert_eq!(ctx.announcement_service.broadcast_due().await?, 0);

    Ok(())
}

#[tokio::test]
async fn past_schedule_broadcasts_immediately() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;

    let mut req = request("Stale schedule");
    req.scheduled_for = Some(Utc::now() - Duration::hours(1));
    let outcome = ctx
        .announcement_service
        .create(&admin, req, Vec::new())
        .await?;

    assert!(!outcome.announcement.is_scheduled);
    assert!(outcome.announcement.broadcasted_at.is_some());

    Ok(())
}

#[tokio::test]
async fn update_merges_partial_fields() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;

    let outcome = ctx
        .announcement_service
        .create(&admin, request("Original"), Vec::new())
        .await?;

    let updated = ctx
        .announcement_service
        .update(
            &admin,
            outcome.announcement.id,
            UpdateAnnouncementRequest {
                title: Some("Revised".to_string()),
                category: Some(Category::Custom("Facilities".to_string())),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(updated.title, "Revised");
    assert_eq!(updated.category, Category::Custom("Facilities".to_string()));
    // Untouched fields survive the merge.
    assert_eq!(updated.description, "Something happened");

    Ok(())
}

#[tokio::test]
async fn delete_is_idempotent() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let admin = seed_user(&ctx, Role::Admin).await?;

    let outcome = ctx
        .announcement_service
        .create(&admin, request("Doomed"), Vec::new())
        .await?;
    let id = outcome.announcement.id;

    ctx.announcement_service.delete(&admin, id).await?;
    assert!(matches!(
        ctx.announcement_service.fetch(id).await,
        Err(AppError::NotFound(_))
    ));

    // Second delete of the same id still succeeds.
    ctx.announcement_service.delete(&admin, id).await?;

    Ok(())
}
