/// Project service behaviour against the in-memory repository
///
/// Run with: cargo test --test project_service_tests

mod common;

use chrono::NaiveDate;
use common::{ids, new_project, Fixture};
use teamboard_shared::error::ServiceError;
use teamboard_shared::models::project::{ProjectChanges, ProjectStatus};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_collaborator_lists_only_member_projects() {
    let fx = Fixture::new().await;
    let ana = fx.collaborator("Ana").await;

    let mine = fx.project("Website", &[ana.id]).await;
    fx.project("Billing", &[]).await;

    let listed = fx.projects.list(&ana, None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].project.id, mine.id);
    assert_eq!(listed[0].collaborators_count, 1);

    let all = fx.projects.list(&fx.admin, None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].project.name, "Billing", "newest first");
}

#[tokio::test]
async fn test_list_search_is_case_insensitive() {
    let fx = Fixture::new().await;
    fx.project("Mobile App", &[]).await;
    fx.project("Website", &[]).await;

    let found = fx
        .projects
        .list(&fx.admin, Some("mobile".to_string()))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].project.name, "Mobile App");
}

#[tokio::test]
async fn test_get_foreign_project_is_forbidden() {
    let fx = Fixture::new().await;
    let ana = fx.collaborator("Ana").await;
    let project = fx.project("Secret", &[]).await;

    let err = fx.projects.get(&ana, project.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = fx.projects.collaborators(&ana, project.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn test_get_missing_project_is_not_found() {
    let fx = Fixture::new().await;
    let ana = fx.collaborator("Ana").await;

    let err = fx.projects.get(&ana, 999).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_detail_hides_tasks_not_assigned_to_collaborator() {
    let fx = Fixture::new().await;
    let ana = fx.collaborator("Ana").await;
    let ben = fx.collaborator("Ben").await;
    let project = fx.project("Website", &[ana.id, ben.id]).await;

    let anas = fx.task(project.id, "Header", &[ana.id]).await;
    fx.task(project.id, "Footer", &[ben.id]).await;

    let detail = fx.projects.get(&ana, project.id).await.unwrap();
    assert_eq!(detail.collaborators_count, 2);
    assert_eq!(detail.tasks.len(), 1);
    assert_eq!(detail.tasks[0].task.id, anas.task.id);

    let detail = fx.projects.get(&fx.admin, project.id).await.unwrap();
    assert_eq!(detail.tasks.len(), 2);
}

#[tokio::test]
async fn test_collaborator_cannot_create_project() {
    let fx = Fixture::new().await;
    let ana = fx.collaborator("Ana").await;

    let err = fx
        .projects
        .create(&ana, new_project("Mine"), ids(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    assert!(fx.projects.list(&fx.admin, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_rejects_inverted_dates() {
    let fx = Fixture::new().await;

    let mut data = new_project("Backwards");
    data.start_date = Some(date(2025, 3, 1));
    data.end_date = Some(date(2025, 2, 1));

    let err = fx.projects.create(&fx.admin, data, ids(&[])).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn test_create_accepts_equal_dates() {
    let fx = Fixture::new().await;

    let mut data = new_project("One day");
    data.start_date = Some(date(2025, 3, 1));
    data.end_date = Some(date(2025, 3, 1));

    let project = fx.projects.create(&fx.admin, data, ids(&[])).await.unwrap();
    assert!(project.has_valid_dates());
    assert_eq!(project.status, ProjectStatus::Active);
}

#[tokio::test]
async fn test_create_with_unknown_collaborator_writes_nothing() {
    let fx = Fixture::new().await;

    let err = fx
        .projects
        .create(&fx.admin, new_project("Ghosts"), ids(&[4242]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(fx.projects.list(&fx.admin, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_replaces_collaborators_when_given() {
    let fx = Fixture::new().await;
    let ana = fx.collaborator("Ana").await;
    let ben = fx.collaborator("Ben").await;
    let project = fx.project("Website", &[ana.id]).await;

    let changes = ProjectChanges {
        status: Some(ProjectStatus::Paused),
        ..Default::default()
    };
    let updated = fx
        .projects
        .update(&fx.admin, project.id, changes, Some(ids(&[ben.id])))
        .await
        .unwrap();
    assert_eq!(updated.status, ProjectStatus::Paused);

    let members: Vec<i64> = fx
        .projects
        .collaborators(&fx.admin, project.id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(members, vec![ben.id]);
}

#[tokio::test]
async fn test_update_without_collaborators_keeps_them() {
    let fx = Fixture::new().await;
    let ana = fx.collaborator("Ana").await;
    let project = fx.project("Website", &[ana.id]).await;

    let changes = ProjectChanges {
        name: Some("Website v2".to_string()),
        ..Default::default()
    };
    let updated = fx
        .projects
        .update(&fx.admin, project.id, changes, None)
        .await
        .unwrap();
    assert_eq!(updated.name, "Website v2");
    assert!(fx.repo.is_collaborator(project.id, ana.id).await.unwrap());
}

#[tokio::test]
async fn test_update_checks_merged_dates() {
    let fx = Fixture::new().await;

    let mut data = new_project("Dated");
    data.start_date = Some(date(2025, 1, 10));
    let project = fx.projects.create(&fx.admin, data, ids(&[])).await.unwrap();

    let changes = ProjectChanges {
        end_date: Some(Some(date(2025, 1, 1))),
        ..Default::default()
    };
    let err = fx
        .projects
        .update(&fx.admin, project.id, changes, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let stored = fx.repo.find_project(project.id).await.unwrap().unwrap();
    assert_eq!(stored.end_date, None);
}

#[tokio::test]
async fn test_collaborator_cannot_update_or_delete() {
    let fx = Fixture::new().await;
    let ana = fx.collaborator("Ana").await;
    let project = fx.project("Website", &[ana.id]).await;

    let err = fx
        .projects
        .update(&ana, project.id, ProjectChanges::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = fx.projects.delete(&ana, project.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn test_delete_removes_tasks_and_memberships() {
    let fx = Fixture::new().await;
    let ana = fx.collaborator("Ana").await;
    let project = fx.project("Website", &[ana.id]).await;
    let view = fx.task(project.id, "Header", &[ana.id]).await;

    fx.projects.delete(&fx.admin, project.id).await.unwrap();

    assert!(fx.repo.find_project(project.id).await.unwrap().is_none());
    assert!(fx.repo.find_task(view.task.id).await.unwrap().is_none());
    assert!(fx.repo.user_projects(ana.id).await.unwrap().is_empty());

    let err = fx.projects.delete(&fx.admin, project.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_collaborator_updates_never_mix_sets() {
    let fx = Fixture::new().await;
    let mut people = Vec::new();
    for name in ["Ana", "Leo", "Mia", "Noa"] {
        people.push(fx.collaborator(name).await.id);
    }
    let project_id = fx.project("Website", &[]).await.id;
    let left = ids(&people[..2]);
    let right = ids(&people[2..]);

    for _ in 0..20 {
        let admin = fx.admin;
        let first = tokio::spawn({
            let (projects, set) = (fx.projects.clone(), left.clone());
            async move {
                projects
                    .update(&admin, project_id, ProjectChanges::default(), Some(set))
                    .await
            }
        });
        let second = tokio::spawn({
            let (projects, set) = (fx.projects.clone(), right.clone());
            async move {
                projects
                    .update(&admin, project_id, ProjectChanges::default(), Some(set))
                    .await
            }
        });
        let (first, second) = tokio::join!(first, second);
        first.unwrap().unwrap();
        second.unwrap().unwrap();

        let members: std::collections::BTreeSet<i64> = fx
            .repo
            .project_collaborators(project_id)
            .await
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert!(members == left || members == right, "{:?}", members);
    }
}
