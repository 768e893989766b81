mod common;

use anyhow::Result;

use workgate::authz::{ApprovalWorkflow, SubjectKind, Transition, WorkStatus};
use workgate::db::{access, work_items};
use workgate::errors::AppError;
use workgate::models::approval::ApprovalStatus;

use common::*;

struct Fixture {
    _dir: tempfile::TempDir,
    pool: sqlx::SqlitePool,
    owner: uuid::Uuid,
    member: uuid::Uuid,
    project: uuid::Uuid,
    story: workgate::authz::Subject,
    workflow: ApprovalWorkflow,
}

async fn fixture() -> Result<Fixture> {
    let (dir, pool) = setup_pool().await?;
    let owner = seed_user(&pool, "olivia").await?;
    let member = seed_user(&pool, "mo").await?;
    let project = gated_project(&pool, owner, member).await?;
    let story_id = seed_item(&pool, "story", Some(project), "in_review").await?;
    let story = access::load_subject(&pool, SubjectKind::Story, story_id).await?;

    Ok(Fixture {
        _dir: dir,
        workflow: ApprovalWorkflow::new(pool.clone()),
        pool,
        owner,
        member,
        project,
        story,
    })
}

fn done() -> Transition {
    Transition::to(WorkStatus::Done)
}

#[tokio::test]
async fn second_create_for_same_transition_conflicts() -> Result<()> {
    let fx = fixture().await?;

    fx.workflow.create(fx.member, &fx.story, done(), None).await?;
    let second = fx.workflow.create(fx.member, &fx.story, done(), None).await;
    assert!(matches!(second, Err(AppError::Conflict(_))), "got {:?}", second);

    let pending = fx
        .workflow
        .list_for_project(fx.project, Some(ApprovalStatus::Pending))
        .await?;
    assert_eq!(pending.len(), 1);
    Ok(())
}

#[tokio::test]
async fn ungated_transition_cannot_be_requested() -> Result<()> {
    let fx = fixture().await?;

    let result = fx
        .workflow
        .create(fx.member, &fx.story, Transition::to(WorkStatus::Blocked), None)
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    Ok(())
}

#[tokio::test]
async fn approving_twice_is_invalid_and_leaves_record_unchanged() -> Result<()> {
    let fx = fixture().await?;
    let request = fx.workflow.create(fx.member, &fx.story, done(), None).await?;

    let approved = fx.workflow.approve(request.id, fx.owner, Some("ok".to_string())).await?;
    assert_eq!(approved.status, ApprovalStatus::Approved);
    assert_eq!(approved.decided_by, Some(fx.owner));
    assert!(approved.decided_at.is_some());

    let again = fx.workflow.approve(request.id, fx.owner, None).await;
    match again {
        Err(AppError::InvalidState(message)) => assert_eq!(message, "only pending requests can be modified"),
        other => panic!("expected invalid state, got {:?}", other),
    }

    let stored = fx.workflow.get(request.id).await?;
    assert_eq!(stored, approved);
    assert!(fx.workflow.has_approved(&fx.story.reference(), &done()).await?);
    Ok(())
}

#[tokio::test]
async fn rejection_needs_a_reason() -> Result<()> {
    let fx = fixture().await?;
    let request = fx.workflow.create(fx.member, &fx.story, done(), None).await?;

    let blank = fx.workflow.reject(request.id, fx.owner, "   ").await;
    assert!(matches!(blank, Err(AppError::BadRequest(_))));

    let rejected = fx.workflow.reject(request.id, fx.owner, "missing tests").await?;
    assert_eq!(rejected.status, ApprovalStatus::Rejected);
    assert_eq!(rejected.decision_comment.as_deref(), Some("missing tests"));
    assert!(!fx.workflow.has_approved(&fx.story.reference(), &done()).await?);

    // A closed request frees the slot for a new one.
    fx.workflow.create(fx.member, &fx.story, done(), None).await?;
    Ok(())
}

#[tokio::test]
async fn only_requester_cancels() -> Result<()> {
    let fx = fixture().await?;
    let request = fx.workflow.create(fx.member, &fx.story, done(), None).await?;

    let by_owner = fx.workflow.cancel(request.id, fx.owner).await;
    assert!(matches!(by_owner, Err(AppError::Forbidden(_))));

    let cancelled = fx.workflow.cancel(request.id, fx.member).await?;
    assert_eq!(cancelled.status, ApprovalStatus::Cancelled);

    let late = fx.workflow.approve(request.id, fx.owner, None).await;
    assert!(matches!(late, Err(AppError::InvalidState(_))));
    Ok(())
}

#[tokio::test]
async fn outsiders_cannot_decide() -> Result<()> {
    let fx = fixture().await?;
    let outsider = seed_user(&fx.pool, "eve").await?;
    let request = fx.workflow.create(fx.member, &fx.story, done(), None).await?;

    let approve = fx.workflow.approve(request.id, outsider, None).await;
    assert!(matches!(approve, Err(AppError::Forbidden(_))));
    // The requester is not an approver either.
    let self_approve = fx.workflow.approve(request.id, fx.member, None).await;
    assert!(matches!(self_approve, Err(AppError::Forbidden(_))));

    assert_eq!(fx.workflow.get(request.id).await?.status, ApprovalStatus::Pending);
    Ok(())
}

#[tokio::test]
async fn designated_approver_and_super_admin_can_decide() -> Result<()> {
    let fx = fixture().await?;
    let reviewer = seed_user(&fx.pool, "rita").await?;
    add_member(&fx.pool, fx.project, reviewer, "admin").await?;
    let root = seed_super_admin(&fx.pool).await?;

    let request = fx.workflow.create(fx.member, &fx.story, done(), Some(reviewer)).await?;
    assert_eq!(request.approver_id, reviewer);
    fx.workflow.approve(request.id, reviewer, None).await?;

    let epic_id = seed_item(&fx.pool, "epic", Some(fx.project), "todo").await?;
    let epic = access::load_subject(&fx.pool, SubjectKind::Epic, epic_id).await?;
    let request = fx.workflow.create(fx.owner, &epic, done(), None).await?;
    let rejected = fx.workflow.reject(request.id, root, "not this sprint").await?;
    assert_eq!(rejected.decided_by, Some(root));
    Ok(())
}

#[tokio::test]
async fn concurrent_approve_and_reject_commit_once() -> Result<()> {
    let fx = fixture().await?;
    let request = fx.workflow.create(fx.member, &fx.story, done(), None).await?;

    let approve = {
        let workflow = fx.workflow.clone();
        let owner = fx.owner;
        tokio::spawn(async move { workflow.approve(request.id, owner, None).await })
    };
    let reject = {
        let workflow = fx.workflow.clone();
        let owner = fx.owner;
        tokio::spawn(async move { workflow.reject(request.id, owner, "conflicting priorities").await })
    };

    let results = [approve.await?, reject.await?];
    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1, "results: {:?}", results);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::InvalidState(_)))));

    let stored = fx.workflow.get(request.id).await?;
    assert!(stored.status.is_terminal());
    Ok(())
}

#[tokio::test]
async fn requester_cannot_nominate_themselves() -> Result<()> {
    let fx = fixture().await?;

    let nominated = fx.workflow.create(fx.member, &fx.story, done(), Some(fx.member)).await;
    assert!(matches!(nominated, Err(AppError::Forbidden(_))), "got {:?}", nominated);

    // Rows pointing back at the requester still need a second person.
    let request = fx.workflow.create(fx.member, &fx.story, done(), None).await?;
    sqlx::query("UPDATE approval_requests SET approver_id = requested_by WHERE id = ?")
        .bind(request.id.to_string())
        .execute(&fx.pool)
        .await?;

    let self_approve = fx.workflow.approve(request.id, fx.member, None).await;
    assert!(matches!(self_approve, Err(AppError::Forbidden(_))));
    assert_eq!(fx.workflow.get(request.id).await?.status, ApprovalStatus::Pending);
    assert!(!fx.workflow.has_approved(&fx.story.reference(), &done()).await?);
    Ok(())
}

#[tokio::test]
async fn designated_approver_must_be_able_to_decide() -> Result<()> {
    let fx = fixture().await?;
    let peer = seed_user(&fx.pool, "pat").await?;
    add_member(&fx.pool, fx.project, peer, "member").await?;

    let result = fx.workflow.create(fx.member, &fx.story, done(), Some(peer)).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))), "got {:?}", result);
    assert!(fx.workflow.list_for_project(fx.project, None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn outsiders_learn_nothing_about_decided_requests() -> Result<()> {
    let fx = fixture().await?;
    let outsider = seed_user(&fx.pool, "eve").await?;
    let request = fx.workflow.create(fx.member, &fx.story, done(), None).await?;
    fx.workflow.approve(request.id, fx.owner, None).await?;

    let approve = fx.workflow.approve(request.id, outsider, None).await;
    assert!(matches!(approve, Err(AppError::Forbidden(_))), "got {:?}", approve);
    let reject = fx.workflow.reject(request.id, outsider, "no").await;
    assert!(matches!(reject, Err(AppError::Forbidden(_))), "got {:?}", reject);
    let cancel = fx.workflow.cancel(request.id, outsider).await;
    assert!(matches!(cancel, Err(AppError::Forbidden(_))), "got {:?}", cancel);
    Ok(())
}

#[tokio::test]
async fn approval_is_spent_once_the_status_changes() -> Result<()> {
    let fx = fixture().await?;
    let request = fx.workflow.create(fx.member, &fx.story, done(), None).await?;
    fx.workflow.approve(request.id, fx.owner, None).await?;
    assert!(fx.workflow.has_approved(&fx.story.reference(), &done()).await?);

    work_items::update_status(&fx.pool, SubjectKind::Story, fx.story.id(), WorkStatus::Done).await?;
    assert!(!fx.workflow.has_approved(&fx.story.reference(), &done()).await?);

    // Leaving done and coming back needs a fresh sign-off.
    work_items::update_status(&fx.pool, SubjectKind::Story, fx.story.id(), WorkStatus::InProgress).await?;
    assert!(!fx.workflow.has_approved(&fx.story.reference(), &done()).await?);
    Ok(())
}

#[tokio::test]
async fn later_rejection_revokes_an_earlier_approval() -> Result<()> {
    let fx = fixture().await?;
    let first = fx.workflow.create(fx.member, &fx.story, done(), None).await?;
    fx.workflow.approve(first.id, fx.owner, None).await?;

    let second = fx.workflow.create(fx.member, &fx.story, done(), None).await?;
    fx.workflow.reject(second.id, fx.owner, "scope changed").await?;

    assert!(!fx.workflow.has_approved(&fx.story.reference(), &done()).await?);
    Ok(())
}

#[tokio::test]
async fn concurrent_creates_leave_one_pending() -> Result<()> {
    let fx = fixture().await?;

    let spawn_create = || {
        let workflow = fx.workflow.clone();
        let story = fx.story.clone();
        let member = fx.member;
        tokio::spawn(async move { workflow.create(member, &story, done(), None).await })
    };
    let (first, second) = (spawn_create(), spawn_create());

    let results = [first.await?, second.await?];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "results: {:?}", results);
    assert!(results.iter().any(|r| matches!(r, Err(AppError::Conflict(_)))));

    let pending = fx
        .workflow
        .list_for_project(fx.project, Some(ApprovalStatus::Pending))
        .await?;
    assert_eq!(pending.len(), 1);
    Ok(())
}
