//! Approval workflow for gated status transitions.
//!
//! A request starts `pending` and moves exactly once into `approved`,
//! `rejected` or `cancelled`. Each move is a compare-and-set on the status
//! column, so when two deciders race only one commits; the other sees a
//! non-pending row and fails with an invalid-state error. A partial unique
//! index keeps at most one pending request per subject and transition.
//!
//! Deciding takes a second person: the requester may only approve or reject
//! their own request when they already hold a deciding position in the
//! project, and cannot nominate themselves as approver.
//!
//! The workflow never touches the subject; callers apply the status change
//! after observing an approved request.

use sqlx::SqlitePool;
use uuid::Uuid;

use super::{Role, RoleResolver, Subject, SubjectRef, SystemRole, Transition};
use crate::db::{access, projects, row_parsers};
use crate::errors::{AppError, AppResult};
use crate::models::approval::{ApprovalRequest, ApprovalStatus, ONLY_PENDING};
use crate::models::project::Project;
use crate::utils::{non_blank, utc_now};

const SELECT_APPROVAL: &str = "SELECT id, subject_type, subject_id, project_id, transition, requested_by, approver_id, status, decision_comment, decided_by, decided_at, created_at FROM approval_requests";

#[derive(Debug, Clone)]
pub struct ApprovalWorkflow {
    pool: SqlitePool,
}

impl ApprovalWorkflow {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pending request for `subject` moving to `transition`.
    pub async fn create(
        &self,
        requester: Uuid,
        subject: &Subject,
        transition: Transition,
        approver: Option<Uuid>,
    ) -> AppResult<ApprovalRequest> {
        let project_id = subject
            .project_of()
            .ok_or_else(|| AppError::bad_request("approval requires a subject that belongs to a project"))?;
        let project = projects::fetch_project(&self.pool, project_id).await?;

        if !subject.transition_requires_approval(transition.to, &project.settings.permission_settings) {
            return Err(AppError::bad_request(format!(
                "approval is not required for {} on this {}",
                transition,
                subject.kind()
            )));
        }

        let approver_id = match approver {
            Some(approver) if approver == requester => {
                return Err(AppError::forbidden("requesters cannot approve their own request"));
            }
            Some(approver) => {
                if !self.is_decider(&project, approver).await? {
                    return Err(AppError::bad_request(
                        "the designated approver cannot decide requests in this project",
                    ));
                }
                approver
            }
            None => project.owner_id,
        };

        let request = ApprovalRequest {
            id: Uuid::new_v4(),
            subject_type: subject.kind(),
            subject_id: subject.id(),
            project_id,
            transition,
            requested_by: requester,
            approver_id,
            status: ApprovalStatus::Pending,
            decision_comment: None,
            decided_by: None,
            decided_at: None,
            created_at: utc_now(),
        };

        let inserted = sqlx::query(
            "INSERT INTO approval_requests (id, subject_type, subject_id, project_id, transition, requested_by, approver_id, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(request.id.to_string())
        .bind(request.subject_type.as_str())
        .bind(request.subject_id.to_string())
        .bind(request.project_id.to_string())
        .bind(request.transition.key())
        .bind(request.requested_by.to_string())
        .bind(request.approver_id.to_string())
        .bind(request.status.as_str())
        .bind(request.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(AppError::conflict("an approval request is already pending for this transition"));
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            approval_id = %request.id,
            subject_id = %request.subject_id,
            transition = %request.transition,
            requested_by = %requester,
            "approval requested"
        );
        Ok(request)
    }

    pub async fn approve(&self, id: Uuid, actor: Uuid, comment: Option<String>) -> AppResult<ApprovalRequest> {
        let request = self.get(id).await?;
        self.ensure_can_decide(&request, actor).await?;
        request.status.transition(ApprovalStatus::Approved)?;

        self.commit(request, actor, ApprovalStatus::Approved, non_blank(comment)).await
    }

    pub async fn reject(&self, id: Uuid, actor: Uuid, reason: &str) -> AppResult<ApprovalRequest> {
        let reason = non_blank(Some(reason.to_string()))
            .ok_or_else(|| AppError::bad_request("a rejection reason is required"))?;

        let request = self.get(id).await?;
        self.ensure_can_decide(&request, actor).await?;
        request.status.transition(ApprovalStatus::Rejected)?;

        self.commit(request, actor, ApprovalStatus::Rejected, Some(reason)).await
    }

    pub async fn cancel(&self, id: Uuid, actor: Uuid) -> AppResult<ApprovalRequest> {
        let request = self.get(id).await?;
        if request.requested_by != actor {
            return Err(AppError::forbidden("only the requester can cancel this request"));
        }
        request.status.transition(ApprovalStatus::Cancelled)?;

        self.commit(request, actor, ApprovalStatus::Cancelled, None).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ApprovalRequest> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_APPROVAL))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Approval request not found"))?;

        row_parsers::approval_from_row(&row)
    }

    pub async fn list_for_project(
        &self,
        project_id: Uuid,
        status: Option<ApprovalStatus>,
    ) -> AppResult<Vec<ApprovalRequest>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "{} WHERE project_id = ? AND status = ? ORDER BY created_at DESC",
                    SELECT_APPROVAL
                ))
                .bind(project_id.to_string())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("{} WHERE project_id = ? ORDER BY created_at DESC", SELECT_APPROVAL))
                    .bind(project_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(row_parsers::approval_from_row).collect()
    }

    pub async fn has_approved(&self, subject: &SubjectRef, transition: &Transition) -> AppResult<bool> {
        access::has_approved(&self.pool, subject, transition).await
    }

    /// Approve and reject are open to the designated approver and to anyone
    /// holding a deciding position in the project. The requester only counts
    /// through such a position.
    async fn ensure_can_decide(&self, request: &ApprovalRequest, actor: Uuid) -> AppResult<()> {
        let project = projects::fetch_project(&self.pool, request.project_id).await?;

        if actor != request.requested_by && actor == request.approver_id {
            return Ok(());
        }
        if self.is_decider(&project, actor).await? {
            return Ok(());
        }

        Err(AppError::forbidden(
            "only the assigned approver or the project owner can decide this request",
        ))
    }

    /// Project owner, holders of `admin` (directly or through the hierarchy),
    /// super admins and org admins of the project's organization.
    async fn is_decider(&self, project: &Project, user: Uuid) -> AppResult<bool> {
        if user == project.owner_id {
            return Ok(true);
        }

        let subject = Subject::Project { id: project.id };
        let snapshot = access::load_snapshot(&self.pool, user, Some(&subject), None).await?;
        let roles = RoleResolver::new().roles(&snapshot, user, Some(project.id), project.organization_id);

        Ok(roles.is_bypass() || roles.holds(&Role::System(SystemRole::Admin)))
    }

    async fn commit(
        &self,
        mut request: ApprovalRequest,
        actor: Uuid,
        status: ApprovalStatus,
        comment: Option<String>,
    ) -> AppResult<ApprovalRequest> {
        let decided_at = utc_now();

        let result = sqlx::query(
            "UPDATE approval_requests SET status = ?, decision_comment = ?, decided_by = ?, decided_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(&comment)
        .bind(actor.to_string())
        .bind(decided_at.to_rfc3339())
        .bind(request.id.to_string())
        .execute(&self.pool)
        .await?;

        // Someone else decided between our read and this write.
        if result.rows_affected() == 0 {
            return Err(AppError::invalid_state(ONLY_PENDING));
        }

        request.status = status;
        request.decision_comment = comment;
        request.decided_by = Some(actor);
        request.decided_at = Some(decided_at);

        tracing::info!(
            approval_id = %request.id,
            status = status.as_str(),
            decided_by = %actor,
            "approval request decided"
        );
        Ok(request)
    }
}
