//! End-to-end service behaviour against the in-memory store.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use sa_core::{
    encode, AppError, Catalog, Caller, DocumentStore, NewNotification, NewUser, Notification,
    NotificationService, NotificationType, PermissionMatrix, Preset, RoleService, UserService,
    NOTIFICATIONS, ROSTER_LIMIT,
};
use sa_store_memory::MemoryStore;

async fn seed_notifications(store: &MemoryStore, user: &str, count: i64) {
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
    for i in 0..count {
        let n = Notification {
            id: String::new(),
            title: format!("Intake #{i}"),
            message: "New animal awaiting assessment".into(),
            kind: NotificationType::Info,
            created_at: base + Duration::minutes(i),
            read: false,
            user_id: Some(user.to_string()),
            link: Some(format!("/cases/{i}")),
        };
        store
            .create(NOTIFICATIONS, encode(&n).unwrap())
            .await
            .unwrap();
    }
}

fn services(store: Arc<MemoryStore>) -> (Arc<RoleService>, NotificationService, UserService) {
    let catalog = Arc::new(Catalog::shelter_default());
    let roles = Arc::new(RoleService::new(store.clone(), catalog));
    let notifications = NotificationService::new(store.clone());
    let users = UserService::new(store, roles.clone());
    (roles, notifications, users)
}

#[tokio::test]
async fn roster_caps_at_fifty_newest_first_then_mark_all_read() {
    let store = Arc::new(
        MemoryStore::enforcing_indexes().with_index(NOTIFICATIONS, &["userId"], "createdAt"),
    );
    seed_notifications(&store, "u1", 60).await;
    seed_notifications(&store, "u2", 3).await;
    let (_, notifications, _) = services(store);

    let roster = notifications.fetch("u1").await;
    assert_eq!(roster.len(), ROSTER_LIMIT);
    assert_eq!(roster.notifications[0].title, "Intake #59");
    assert!(roster
        .notifications
        .windows(2)
        .all(|w| w[0].created_at > w[1].created_at));
    assert_eq!(roster.unread_count(), 50);

    assert_eq!(notifications.mark_all_read(&roster).await.unwrap(), 50);
    let refreshed = notifications.fetch("u1").await;
    assert_eq!(refreshed.unread_count(), 0);

    // Other users are untouched.
    assert_eq!(notifications.fetch("u2").await.unread_count(), 3);
}

#[tokio::test]
async fn roster_without_index_uses_client_side_fallback() {
    let store = Arc::new(MemoryStore::enforcing_indexes());
    seed_notifications(&store, "u1", 60).await;
    let (_, notifications, _) = services(store);

    let roster = notifications.fetch("u1").await;
    assert_eq!(roster.len(), ROSTER_LIMIT);
    assert_eq!(roster.notifications[0].title, "Intake #59");
    assert_eq!(roster.notifications[49].title, "Intake #10");
}

#[tokio::test]
async fn mark_read_flips_one_entry() {
    let store = Arc::new(MemoryStore::new());
    let (_, notifications, _) = services(store);

    let created = notifications
        .notify(
            "u7",
            NewNotification {
                title: "Vaccination due".into(),
                message: "Bella is due for a rabies booster".into(),
                kind: NotificationType::Warning,
                link: Some("/animals/bella".into()),
            },
        )
        .await
        .unwrap();
    notifications
        .notify(
            "u7",
            NewNotification {
                title: "Adoption approved".into(),
                message: "Case 88 closed".into(),
                kind: NotificationType::Success,
                link: None,
            },
        )
        .await
        .unwrap();

    let roster = notifications.fetch("u7").await;
    assert_eq!(roster.unread_count(), 2);

    notifications.mark_read(&roster, &created.id).await.unwrap();
    // The old roster is a snapshot; the count only moves after a re-fetch.
    assert_eq!(roster.unread_count(), 2);

    let refreshed = notifications.fetch("u7").await;
    assert_eq!(refreshed.unread_count(), 1);
    assert!(refreshed.get(&created.id).unwrap().read);
}

#[tokio::test]
async fn role_lifecycle_and_protected_admin() {
    let store = Arc::new(MemoryStore::new());
    let (roles, _, _) = services(store);

    let admin = roles.ensure_default_roles().await.unwrap().unwrap();
    assert_eq!(admin.name, "Admin");
    assert!(roles.ensure_default_roles().await.unwrap().is_none());
    let caller = Caller::new("u-root", admin.clone());

    // create
    let mut editor = roles.editor();
    editor.name = "Kennel Staff".into();
    editor.matrix.toggle("Animal Care", "View").unwrap();
    editor.matrix.toggle("Animal Care", "Edit").unwrap();
    let saved = roles.save(&caller, &editor).await.unwrap();
    let id = saved.id.clone().unwrap();

    // edit: full replacement
    let mut editor = roles.editor_for(&id).await.unwrap();
    assert_eq!(editor.matrix.count_selected("Animal Care"), 2);
    editor.matrix.toggle_module("Inventory").unwrap();
    roles.save(&caller, &editor).await.unwrap();

    let stored = roles.get_role(&id).await.unwrap();
    let matrix = PermissionMatrix::from_role(roles.catalog().clone(), &stored);
    assert_eq!(matrix.count_selected_total(), 2 + 5);

    let names: Vec<_> = roles.list_roles().await.unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(names, ["Admin", "Kennel Staff"]);

    // admin cannot be deleted, even by a full admin
    let err = roles
        .delete_role(&caller, admin.id.as_deref().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    roles.delete_role(&caller, &id).await.unwrap();
    assert!(matches!(roles.get_role(&id).await, Err(AppError::NotFound(..))));
}

#[tokio::test]
async fn admin_role_cannot_be_renamed_then_deleted() {
    let store = Arc::new(MemoryStore::new());
    let (roles, _, _) = services(store);
    let admin = roles.ensure_default_roles().await.unwrap().unwrap();
    let admin_id = admin.id.clone().unwrap();
    let caller = Caller::new("u-root", admin);

    let mut editor = roles.editor_for(&admin_id).await.unwrap();
    editor.name = "Former Admin".into();
    let err = roles.save(&caller, &editor).await.unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    let err = roles.delete_role(&caller, &admin_id).await.unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));
    assert_eq!(roles.get_role(&admin_id).await.unwrap().name, "Admin");
    assert_eq!(roles.list_roles().await.unwrap().len(), 1);

    // same name in another case, with permission edits, is still allowed
    let mut editor = roles.editor_for(&admin_id).await.unwrap();
    editor.name = " admin ".into();
    editor.matrix.toggle("Dashboard", "View").unwrap();
    let saved = roles.save(&caller, &editor).await.unwrap();
    assert_eq!(saved.name, "admin");
    assert!(!saved.grants("Dashboard", "View"));
}

#[tokio::test]
async fn viewer_cannot_delete_roles() {
    let store = Arc::new(MemoryStore::new());
    let (roles, _, _) = services(store);
    let admin = roles.ensure_default_roles().await.unwrap().unwrap();

    let mut editor = roles.editor();
    editor.apply_preset(Preset::Viewer);
    let viewer = roles
        .save(&Caller::new("u-root", admin), &editor)
        .await
        .unwrap();

    let caller = Caller::new("u-view", viewer.clone());
    let err = roles
        .delete_role(&caller, viewer.id.as_deref().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));
}

#[tokio::test]
async fn provisioning_validates_and_resolves_callers() {
    let store = Arc::new(MemoryStore::new());
    let (roles, _, users) = services(store);
    let admin = roles.ensure_default_roles().await.unwrap().unwrap();
    let admin_id = admin.id.clone().unwrap();
    let caller = Caller::new("bootstrap", admin);

    let form = NewUser {
        email: "Sam@Shelter.org ".trim().into(),
        display_name: "Sam".into(),
        phone: None,
        role_id: admin_id.clone(),
    };
    let profile = users.provision(&caller, form.clone()).await.unwrap();
    assert_eq!(profile.email, "sam@shelter.org");

    // duplicate email
    let err = users.provision(&caller, form.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    // unknown role
    let mut ghost = form.clone();
    ghost.email = "kim@shelter.org".into();
    ghost.role_id = "missing".into();
    let err = users.provision(&caller, ghost).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    // whitespace-only display name
    let mut blank = form;
    blank.email = "lee@shelter.org".into();
    blank.display_name = "   ".into();
    let err = users.provision(&caller, blank).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let resolved = users.resolve_caller(profile.id.as_deref().unwrap()).await.unwrap();
    assert!(resolved.can("Role Management", "Delete"));
    assert!(matches!(
        users.resolve_caller("nobody").await,
        Err(AppError::PermissionDenied(_))
    ));
    assert_eq!(users.list_users().await.unwrap().len(), 1);
}
