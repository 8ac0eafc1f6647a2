use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::{doc, to_bson, Document};
use mongodb::options::ReturnDocument;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::access::{self, CurrentUser};
use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::{
    Project, ProjectReport, ProjectStatus, PublicUser, ReportStatus, Task, TaskStatus, User,
};
use crate::project::with_updated_at;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressRequest {
    pub progress: Option<i32>,
    pub status: Option<ProjectStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportRequest {
    pub report_content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontlinerInfoPatch {
    pub region: Option<String>,
    pub supervisor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFrontlinerProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub frontliner_info: Option<FrontlinerInfoPatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskStatusRequest {
    pub status: TaskStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontlinerDashboard {
    assigned_projects_count: usize,
    pending_tasks_count: usize,
    submitted_tasks_count: usize,
    completed_tasks_count: usize,
    overdue_tasks_count: usize,
    pending_reports_count: usize,
    performance_metrics: FrontlinerPerformanceMetrics,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FrontlinerPerformanceMetrics {
    completion_rate: f64,
    average_task_time: f64,
    projects_completed: usize,
}

async fn fetch_assigned_projects(
    data: &AppState,
    user_id: &str,
) -> Result<Vec<Project>, ApiError> {
    let projects_coll = data.mongodb.db.collection::<Project>("projects");
    let mut cursor = projects_coll
        .find(doc! { "assignedTo": user_id })
        .await
        .map_err(ApiError::internal)?;

    let mut projects = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(project) => projects.push(project),
            Err(err) => {
                error!("Cursor error while reading assigned projects: {}", err);
                return Err(ApiError::internal(err));
            }
        }
    }
    Ok(projects)
}

async fn fetch_assigned_tasks(data: &AppState, user_id: &str) -> Result<Vec<Task>, ApiError> {
    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let mut cursor = tasks_coll
        .find(doc! { "assignedTo": user_id })
        .await
        .map_err(ApiError::internal)?;

    let mut tasks = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(task) => tasks.push(task),
            Err(err) => {
                error!("Cursor error while reading tasks: {}", err);
                return Err(ApiError::internal(err));
            }
        }
    }
    Ok(tasks)
}

/// Task counts are per closed status; a completed project with no report
/// yet counts as a pending report.
fn build_frontliner_dashboard(projects: &[Project], tasks: &[Task]) -> FrontlinerDashboard {
    let count_tasks = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
    let completed_tasks = count_tasks(TaskStatus::Completed);
    let projects_completed = projects
        .iter()
        .filter(|p| p.status == ProjectStatus::Completed)
        .count();

    let completion_rate = if tasks.is_empty() {
        0.0
    } else {
        completed_tasks as f64 / tasks.len() as f64 * 100.0
    };

    FrontlinerDashboard {
        assigned_projects_count: projects
            .iter()
            .filter(|p| p.status == ProjectStatus::Active)
            .count(),
        pending_tasks_count: count_tasks(TaskStatus::Pending),
        submitted_tasks_count: count_tasks(TaskStatus::Submitted),
        completed_tasks_count: completed_tasks,
        overdue_tasks_count: count_tasks(TaskStatus::Overdue),
        pending_reports_count: projects
            .iter()
            .filter(|p| p.status == ProjectStatus::Completed && !p.report_submitted)
            .count(),
        performance_metrics: FrontlinerPerformanceMetrics {
            completion_rate,
            average_task_time: 0.0,
            projects_completed,
        },
    }
}

/// GET /api/v1/frontliner/dashboard/{user_id}
pub async fn get_frontliner_dashboard(
    data: web::Data<AppState>,
    current: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    if let access::Access::Forbidden = access::own_account(&current, &user_id) {
        return Err(ApiError::forbidden("Access denied"));
    }

    let projects = fetch_assigned_projects(&data, &user_id).await?;
    let tasks = fetch_assigned_tasks(&data, &user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Dashboard data retrieved successfully",
        "data": build_frontliner_dashboard(&projects, &tasks),
    })))
}

/// GET /api/v1/frontliner/projects
pub async fn get_assigned_projects(
    data: web::Data<AppState>,
    current: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let projects = fetch_assigned_projects(&data, &current.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Assigned projects retrieved successfully",
        "projects": projects,
    })))
}

/// GET /api/v1/frontliner/projects/{project_id}
pub async fn get_project_details(
    data: web::Data<AppState>,
    current: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let project_id = path.into_inner();
    let projects = data.mongodb.db.collection::<Project>("projects");
    let project = projects
        .find_one(doc! { "projectId": &project_id, "assignedTo": &current.user_id })
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Project details retrieved successfully",
        "project": project,
    })))
}

/// PUT /api/v1/frontliner/projects/{project_id}/progress
pub async fn update_project_progress(
    data: web::Data<AppState>,
    current: CurrentUser,
    path: web::Path<String>,
    payload: web::Json<UpdateProgressRequest>,
) -> Result<HttpResponse, ApiError> {
    let project_id = path.into_inner();
    let payload = payload.into_inner();
    if let Some(progress) = payload.progress {
        if !(0..=100).contains(&progress) {
            return Err(ApiError::validation("Progress must be between 0 and 100"));
        }
    }

    let mut set_doc = doc! {};
    if let Some(progress) = payload.progress {
        set_doc.insert("progress", progress);
    }
    if let Some(status) = payload.status {
        set_doc.insert("status", status.as_str());
    }
    if let Some(notes) = &payload.notes {
        set_doc.insert("notes", notes);
    }
    if set_doc.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    let projects = data.mongodb.db.collection::<Project>("projects");
    let updated = projects
        .find_one_and_update(
            doc! { "projectId": &project_id, "assignedTo": &current.user_id },
            doc! { "$set": with_updated_at(set_doc)? },
        )
        .return_document(ReturnDocument::After)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Project progress updated successfully",
        "project": updated,
    })))
}

/// POST /api/v1/frontliner/projects/{project_id}/reports
pub async fn submit_project_report(
    data: web::Data<AppState>,
    current: CurrentUser,
    path: web::Path<String>,
    payload: web::Json<SubmitReportRequest>,
) -> Result<HttpResponse, ApiError> {
    let project_id = path.into_inner();
    let payload = payload.into_inner();
    let content = payload
        .report_content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Report content is required"))?;

    let report = ProjectReport {
        report_type: None,
        content,
        attachments: payload.attachments,
        submitted_by: current.user_id.clone(),
        submitted_at: Utc::now(),
        status: ReportStatus::Submitted,
    };

    let projects = data.mongodb.db.collection::<Project>("projects");
    let updated = projects
        .find_one_and_update(
            doc! { "projectId": &project_id, "assignedTo": &current.user_id },
            doc! {
                "$push": { "reports": to_bson(&report).map_err(ApiError::internal)? },
                "$set": with_updated_at(doc! { "reportSubmitted": true })?,
            },
        )
        .return_document(ReturnDocument::After)
        .await
        .map_err(ApiError::internal)?;

    if updated.is_none() {
        return Err(ApiError::not_found("Project not found"));
    }
    info!("Report submitted for project {} by {}", project_id, current.user_id);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Project report submitted successfully",
        "report": report,
    })))
}

/// GET /api/v1/frontliner/profile
pub async fn get_frontliner_profile(
    data: web::Data<AppState>,
    current: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let users = data.mongodb.db.collection::<User>("users");
    let user = users
        .find_one(doc! { "userId": &current.user_id })
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Profile retrieved successfully",
        "user": PublicUser::from(user),
    })))
}

/// PUT /api/v1/frontliner/profile
pub async fn update_frontliner_profile(
    data: web::Data<AppState>,
    current: CurrentUser,
    payload: web::Json<UpdateFrontlinerProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let set_doc = frontliner_profile_update_doc(&payload.into_inner());
    if set_doc.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    let users = data.mongodb.db.collection::<User>("users");
    let updated = users
        .find_one_and_update(
            doc! { "userId": &current.user_id },
            doc! { "$set": with_updated_at(set_doc)? },
        )
        .return_document(ReturnDocument::After)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "user": PublicUser::from(updated),
    })))
}

/// GET /api/v1/frontliner/tasks
pub async fn get_frontliner_tasks(
    data: web::Data<AppState>,
    current: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let tasks = fetch_assigned_tasks(&data, &current.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Tasks retrieved successfully",
        "tasks": tasks,
    })))
}

/// PUT /api/v1/frontliner/tasks/{task_id}/status
pub async fn update_task_status(
    data: web::Data<AppState>,
    current: CurrentUser,
    path: web::Path<String>,
    payload: web::Json<UpdateTaskStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let task_id = path.into_inner();
    let payload = payload.into_inner();

    let mut set_doc = doc! { "status": payload.status.as_str() };
    if let Some(notes) = &payload.notes {
        set_doc.insert("notes", notes);
    }
    let mut update = doc! {};
    if payload.status == TaskStatus::Completed {
        set_doc.insert("completedAt", to_bson(&Utc::now()).map_err(ApiError::internal)?);
    } else {
        update.insert("$unset", doc! { "completedAt": "" });
    }
    update.insert("$set", with_updated_at(set_doc)?);

    let tasks = data.mongodb.db.collection::<Task>("tasks");
    let updated = tasks
        .find_one_and_update(doc! { "taskId": &task_id, "assignedTo": &current.user_id }, update)
        .return_document(ReturnDocument::After)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Task status updated successfully",
        "task": updated,
    })))
}

fn frontliner_profile_update_doc(payload: &UpdateFrontlinerProfileRequest) -> Document {
    let mut set_doc = doc! {};
    if let Some(name) = &payload.name {
        set_doc.insert("name", name);
    }
    if let Some(email) = &payload.email {
        set_doc.insert("email", email);
    }
    if let Some(info) = &payload.frontliner_info {
        if let Some(region) = &info.region {
            set_doc.insert("frontlinerInfo.region", region);
        }
        if let Some(supervisor) = &info.supervisor {
            set_doc.insert("frontlinerInfo.supervisor", supervisor);
        }
    }
    set_doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn project(id: &str, status: ProjectStatus, report_submitted: bool) -> Project {
        let now = Utc::now();
        Project {
            project_id: id.to_string(),
            title: format!("Project {id}"),
            description: None,
            objectives: None,
            category: None,
            location: None,
            budget: None,
            funding: None,
            funding_status: None,
            status,
            progress: 0,
            notes: None,
            timeline: None,
            start_date: None,
            created_by: "ngo-1".to_string(),
            assigned_to: vec!["fl-1".to_string()],
            report_submitted,
            reports: Vec::new(),
            funding_requests: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn task(id: &str, status: TaskStatus) -> Task {
        let now = Utc::now();
        Task {
            task_id: id.to_string(),
            title: format!("Task {id}"),
            project_id: "p-1".to_string(),
            assigned_to: "fl-1".to_string(),
            due_date: now + Duration::days(7),
            status,
            notes: None,
            submission: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn dashboard_counts_tasks_per_status() {
        let tasks = vec![
            task("a", TaskStatus::Pending),
            task("b", TaskStatus::Pending),
            task("c", TaskStatus::Submitted),
            task("d", TaskStatus::Completed),
            task("e", TaskStatus::Overdue),
        ];
        let dashboard = build_frontliner_dashboard(&[], &tasks);
        assert_eq!(dashboard.pending_tasks_count, 2);
        assert_eq!(dashboard.submitted_tasks_count, 1);
        assert_eq!(dashboard.completed_tasks_count, 1);
        assert_eq!(dashboard.overdue_tasks_count, 1);
        assert_eq!(dashboard.performance_metrics.completion_rate, 20.0);
    }

    #[test]
    fn dashboard_counts_active_projects_and_pending_reports() {
        let projects = vec![
            project("a", ProjectStatus::Active, false),
            project("b", ProjectStatus::Completed, false),
            project("c", ProjectStatus::Completed, true),
            project("d", ProjectStatus::Pending, false),
        ];
        let dashboard = build_frontliner_dashboard(&projects, &[]);
        assert_eq!(dashboard.assigned_projects_count, 1);
        assert_eq!(dashboard.pending_reports_count, 1);
        assert_eq!(dashboard.performance_metrics.projects_completed, 2);
    }

    #[test]
    fn empty_workload_yields_zero_completion_rate() {
        let dashboard = build_frontliner_dashboard(&[], &[]);
        assert_eq!(dashboard.performance_metrics.completion_rate, 0.0);
    }

    #[test]
    fn profile_patch_only_touches_provided_info_fields() {
        let payload: UpdateFrontlinerProfileRequest = serde_json::from_value(json!({
            "frontlinerInfo": { "region": "North" },
        }))
        .unwrap();
        let set_doc = frontliner_profile_update_doc(&payload);
        assert_eq!(set_doc.get_str("frontlinerInfo.region").unwrap(), "North");
        assert!(set_doc.get("name").is_none());
        assert!(set_doc.get("frontlinerInfo.supervisor").is_none());
    }
}
