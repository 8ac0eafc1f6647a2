use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::{doc, to_bson, Document};
use mongodb::options::ReturnDocument;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::access::{self, CurrentUser};
use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::{
    FundingRequest, FundingStatus, Project, ProjectReport, ProjectStatus, PublicUser,
    ReportStatus, User,
};
use crate::project::with_updated_at;

const RECENT_PROJECTS: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNgoProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub objectives: Option<String>,
    pub budget: Option<f64>,
    pub timeline: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNgoProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub objectives: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub budget: Option<f64>,
    pub timeline: Option<String>,
    pub status: Option<ProjectStatus>,
    pub progress: Option<i32>,
    pub notes: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NgoInfoPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub registration_number: Option<String>,
    pub contact_person: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNgoProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub ngo_info: Option<NgoInfoPatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRequestPayload {
    pub project_id: Option<String>,
    pub amount: Option<f64>,
    pub purpose: Option<String>,
    pub timeline: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportRequest {
    pub project_id: Option<String>,
    pub report_type: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NgoDashboard {
    total_projects: usize,
    active_projects: usize,
    completed_projects: usize,
    pending_projects: usize,
    total_funding: f64,
    pending_funding: f64,
    recent_projects: Vec<Project>,
    performance_metrics: NgoPerformanceMetrics,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NgoPerformanceMetrics {
    completion_rate: f64,
    average_project_duration: f64,
    funding_utilization: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingSummary {
    total_requested: f64,
    total_approved: f64,
    total_disbursed: f64,
    pending_requests: usize,
    approved_requests: usize,
    rejected_requests: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    #[serde(flatten)]
    pub report: ProjectReport,
    pub project_title: String,
    pub project_id: String,
}

async fn fetch_owned_projects(
    data: &AppState,
    owner_id: &str,
) -> Result<Vec<Project>, ApiError> {
    let projects_coll = data.mongodb.db.collection::<Project>("projects");
    let mut cursor = projects_coll
        .find(doc! { "createdBy": owner_id })
        .await
        .map_err(ApiError::internal)?;

    let mut projects = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(project) => projects.push(project),
            Err(err) => {
                error!("Cursor error while reading projects: {}", err);
                return Err(ApiError::internal(err));
            }
        }
    }
    Ok(projects)
}

/// Fixed battery of counts over the NGO's own projects, recomputed from
/// scratch on every call.
fn build_ngo_dashboard(projects: &[Project]) -> NgoDashboard {
    let count_status =
        |status: ProjectStatus| projects.iter().filter(|p| p.status == status).count();
    let active_projects = count_status(ProjectStatus::Active);
    let completed_projects = count_status(ProjectStatus::Completed);
    let pending_projects = count_status(ProjectStatus::Pending);

    let total_funding: f64 = projects.iter().filter_map(|p| p.funding).sum();
    let pending_funding: f64 = projects
        .iter()
        .filter(|p| p.funding_status == Some(FundingStatus::Pending))
        .filter_map(|p| p.funding)
        .sum();

    let mut recent: Vec<Project> = projects.to_vec();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(RECENT_PROJECTS);

    let completion_rate = if projects.is_empty() {
        0.0
    } else {
        completed_projects as f64 / projects.len() as f64 * 100.0
    };
    let funding_utilization = if total_funding > 0.0 {
        (total_funding - pending_funding) / total_funding * 100.0
    } else {
        0.0
    };

    NgoDashboard {
        total_projects: projects.len(),
        active_projects,
        completed_projects,
        pending_projects,
        total_funding,
        pending_funding,
        recent_projects: recent,
        performance_metrics: NgoPerformanceMetrics {
            completion_rate,
            average_project_duration: 0.0,
            funding_utilization,
        },
    }
}

fn build_funding_summary(projects: &[Project]) -> FundingSummary {
    let funding_with_status = |status: FundingStatus| -> f64 {
        projects
            .iter()
            .filter(|p| p.funding_status == Some(status))
            .filter_map(|p| p.funding)
            .sum()
    };
    let count_with_status = |status: FundingStatus| {
        projects
            .iter()
            .filter(|p| p.funding_status == Some(status))
            .count()
    };

    FundingSummary {
        total_requested: projects.iter().filter_map(|p| p.budget).sum(),
        total_approved: funding_with_status(FundingStatus::Approved),
        total_disbursed: funding_with_status(FundingStatus::Disbursed),
        pending_requests: count_with_status(FundingStatus::Pending),
        approved_requests: count_with_status(FundingStatus::Approved),
        rejected_requests: count_with_status(FundingStatus::Rejected),
    }
}

fn build_report_listing(projects: &[Project]) -> Vec<ReportEntry> {
    projects
        .iter()
        .flat_map(|project| {
            project.reports.iter().map(|report| ReportEntry {
                report: report.clone(),
                project_title: project.title.clone(),
                project_id: project.project_id.clone(),
            })
        })
        .collect()
}

/// GET /api/v1/ngo/dashboard/{user_id}
pub async fn get_ngo_dashboard(
    data: web::Data<AppState>,
    current: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    if let access::Access::Forbidden = access::own_account(&current, &user_id) {
        return Err(ApiError::forbidden("Access denied"));
    }

    let projects = fetch_owned_projects(&data, &user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Dashboard data retrieved successfully",
        "data": build_ngo_dashboard(&projects),
    })))
}

/// GET /api/v1/ngo/projects
pub async fn get_ngo_projects(
    data: web::Data<AppState>,
    current: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let projects = fetch_owned_projects(&data, &current.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Projects retrieved successfully",
        "projects": projects,
    })))
}

/// POST /api/v1/ngo/projects
pub async fn create_ngo_project(
    data: web::Data<AppState>,
    current: CurrentUser,
    payload: web::Json<CreateNgoProjectRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let title = payload
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Title is required"))?;

    let now = Utc::now();
    let new_project = Project {
        project_id: Uuid::new_v4().to_string(),
        title,
        description: payload.description,
        objectives: payload.objectives,
        category: payload.category,
        location: payload.location,
        budget: payload.budget,
        funding: None,
        funding_status: None,
        status: ProjectStatus::Pending,
        progress: 0,
        notes: None,
        timeline: payload.timeline,
        start_date: None,
        created_by: current.user_id.clone(),
        assigned_to: Vec::new(),
        report_submitted: false,
        reports: Vec::new(),
        funding_requests: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    let projects = data.mongodb.db.collection::<Project>("projects");
    projects.insert_one(&new_project).await.map_err(ApiError::internal)?;
    info!("NGO {} created project {}", current.user_id, new_project.project_id);

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Project created successfully",
        "project": new_project,
    })))
}

/// PUT /api/v1/ngo/projects/{project_id}
pub async fn update_ngo_project(
    data: web::Data<AppState>,
    current: CurrentUser,
    path: web::Path<String>,
    payload: web::Json<UpdateNgoProjectRequest>,
) -> Result<HttpResponse, ApiError> {
    let project_id = path.into_inner();
    let set_doc = ngo_project_update_doc(&payload.into_inner()).map_err(ApiError::internal)?;
    if set_doc.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    let projects = data.mongodb.db.collection::<Project>("projects");
    let updated = projects
        .find_one_and_update(
            doc! { "projectId": &project_id, "createdBy": &current.user_id },
            doc! { "$set": with_updated_at(set_doc)? },
        )
        .return_document(ReturnDocument::After)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Project updated successfully",
        "project": updated,
    })))
}

/// DELETE /api/v1/ngo/projects/{project_id}
pub async fn delete_ngo_project(
    data: web::Data<AppState>,
    current: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let project_id = path.into_inner();
    let projects = data.mongodb.db.collection::<Project>("projects");
    let result = projects
        .delete_one(doc! { "projectId": &project_id, "createdBy": &current.user_id })
        .await
        .map_err(ApiError::internal)?;

    if result.deleted_count == 0 {
        return Err(ApiError::not_found("Project not found"));
    }
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Project deleted successfully",
    })))
}

/// GET /api/v1/ngo/projects/{project_id}
pub async fn get_ngo_project_details(
    data: web::Data<AppState>,
    current: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let project_id = path.into_inner();
    let projects = data.mongodb.db.collection::<Project>("projects");
    let project = projects
        .find_one(doc! { "projectId": &project_id, "createdBy": &current.user_id })
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Project details retrieved successfully",
        "project": project,
    })))
}

/// GET /api/v1/ngo/profile
pub async fn get_ngo_profile(
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

/// PUT /api/v1/ngo/profile
pub async fn update_ngo_profile(
    data: web::Data<AppState>,
    current: CurrentUser,
    payload: web::Json<UpdateNgoProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let set_doc = ngo_profile_update_doc(&payload.into_inner());
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

/// GET /api/v1/ngo/funding
pub async fn get_ngo_funding_status(
    data: web::Data<AppState>,
    current: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let projects = fetch_owned_projects(&data, &current.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Funding status retrieved successfully",
        "funding": build_funding_summary(&projects),
    })))
}

/// POST /api/v1/ngo/funding/request
pub async fn submit_funding_request(
    data: web::Data<AppState>,
    current: CurrentUser,
    payload: web::Json<FundingRequestPayload>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (project_id, amount, purpose) = match (payload.project_id, payload.amount, payload.purpose) {
        (Some(project_id), Some(amount), Some(purpose)) if !purpose.trim().is_empty() => {
            (project_id, amount, purpose)
        }
        _ => {
            return Err(ApiError::validation(
                "Project id, amount, and purpose are required",
            ))
        }
    };

    let funding_request = FundingRequest {
        amount,
        purpose,
        timeline: payload.timeline,
        documents: payload.documents,
        submitted_at: Utc::now(),
        status: FundingStatus::Pending,
    };

    let projects = data.mongodb.db.collection::<Project>("projects");
    let updated = projects
        .find_one_and_update(
            doc! { "projectId": &project_id, "createdBy": &current.user_id },
            doc! {
                "$push": { "fundingRequests": to_bson(&funding_request).map_err(ApiError::internal)? },
                "$set": with_updated_at(doc! { "fundingStatus": FundingStatus::Pending.as_str() })?,
            },
        )
        .return_document(ReturnDocument::After)
        .await
        .map_err(ApiError::internal)?;

    if updated.is_none() {
        return Err(ApiError::not_found("Project not found"));
    }
    info!("Funding request submitted for project {}", project_id);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Funding request submitted successfully",
        "fundingRequest": funding_request,
    })))
}

/// GET /api/v1/ngo/reports
pub async fn get_ngo_reports(
    data: web::Data<AppState>,
    current: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let projects = fetch_owned_projects(&data, &current.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Reports retrieved successfully",
        "reports": build_report_listing(&projects),
    })))
}

/// POST /api/v1/ngo/reports/generate
pub async fn generate_report(
    data: web::Data<AppState>,
    current: CurrentUser,
    payload: web::Json<GenerateReportRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (project_id, content) = match (payload.project_id, payload.content) {
        (Some(project_id), Some(content)) if !content.trim().is_empty() => (project_id, content),
        _ => return Err(ApiError::validation("Project id and content are required")),
    };

    let report = ProjectReport {
        report_type: payload.report_type,
        content,
        attachments: payload.attachments,
        submitted_by: current.user_id.clone(),
        submitted_at: Utc::now(),
        status: ReportStatus::Draft,
    };

    let projects = data.mongodb.db.collection::<Project>("projects");
    let updated = projects
        .find_one_and_update(
            doc! { "projectId": &project_id, "createdBy": &current.user_id },
            doc! {
                "$push": { "reports": to_bson(&report).map_err(ApiError::internal)? },
                "$set": with_updated_at(doc! {})?,
            },
        )
        .return_document(ReturnDocument::After)
        .await
        .map_err(ApiError::internal)?;

    if updated.is_none() {
        return Err(ApiError::not_found("Project not found"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Report generated successfully",
        "report": report,
    })))
}

fn ngo_project_update_doc(
    payload: &UpdateNgoProjectRequest,
) -> Result<Document, mongodb::bson::ser::Error> {
    let mut set_doc = doc! {};
    if let Some(title) = &payload.title {
        set_doc.insert("title", title);
    }
    if let Some(description) = &payload.description {
        set_doc.insert("description", description);
    }
    if let Some(objectives) = &payload.objectives {
        set_doc.insert("objectives", objectives);
    }
    if let Some(category) = &payload.category {
        set_doc.insert("category", category);
    }
    if let Some(location) = &payload.location {
        set_doc.insert("location", location);
    }
    if let Some(budget) = payload.budget {
        set_doc.insert("budget", budget);
    }
    if let Some(timeline) = &payload.timeline {
        set_doc.insert("timeline", timeline);
    }
    if let Some(status) = payload.status {
        set_doc.insert("status", status.as_str());
    }
    if let Some(progress) = payload.progress {
        set_doc.insert("progress", progress);
    }
    if let Some(notes) = &payload.notes {
        set_doc.insert("notes", notes);
    }
    if let Some(start_date) = payload.start_date {
        set_doc.insert("startDate", to_bson(&start_date)?);
    }
    if let Some(assigned_to) = &payload.assigned_to {
        set_doc.insert("assignedTo", assigned_to.clone());
    }
    Ok(set_doc)
}

fn ngo_profile_update_doc(payload: &UpdateNgoProfileRequest) -> Document {
    let mut set_doc = doc! {};
    if let Some(name) = &payload.name {
        set_doc.insert("name", name);
    }
    if let Some(email) = &payload.email {
        set_doc.insert("email", email);
    }
    if let Some(info) = &payload.ngo_info {
        if let Some(name) = &info.name {
            set_doc.insert("ngoInfo.name", name);
        }
        if let Some(address) = &info.address {
            set_doc.insert("ngoInfo.address", address);
        }
        if let Some(registration_number) = &info.registration_number {
            set_doc.insert("ngoInfo.registrationNumber", registration_number);
        }
        if let Some(contact_person) = &info.contact_person {
            set_doc.insert("ngoInfo.contactPerson", contact_person);
        }
        if let Some(phone_number) = &info.phone_number {
            set_doc.insert("ngoInfo.phoneNumber", phone_number);
        }
    }
    set_doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn project(
        id: &str,
        status: ProjectStatus,
        funding: Option<f64>,
        funding_status: Option<FundingStatus>,
        age_hours: i64,
    ) -> Project {
        let created = Utc::now() - Duration::hours(age_hours);
        Project {
            project_id: id.to_string(),
            title: format!("Project {id}"),
            description: None,
            objectives: None,
            category: None,
            location: None,
            budget: Some(1000.0),
            funding,
            funding_status,
            status,
            progress: 0,
            notes: None,
            timeline: None,
            start_date: None,
            created_by: "ngo-1".to_string(),
            assigned_to: Vec::new(),
            report_submitted: false,
            reports: Vec::new(),
            funding_requests: Vec::new(),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn dashboard_counts_by_status_and_sums_funding() {
        let projects = vec![
            project("a", ProjectStatus::Active, Some(500.0), Some(FundingStatus::Pending), 1),
            project("b", ProjectStatus::Active, Some(300.0), Some(FundingStatus::Approved), 2),
            project("c", ProjectStatus::Completed, None, None, 3),
            project("d", ProjectStatus::Pending, Some(200.0), Some(FundingStatus::Pending), 4),
        ];
        let dashboard = build_ngo_dashboard(&projects);
        assert_eq!(dashboard.total_projects, 4);
        assert_eq!(dashboard.active_projects, 2);
        assert_eq!(dashboard.completed_projects, 1);
        assert_eq!(dashboard.pending_projects, 1);
        assert_eq!(dashboard.total_funding, 800.0);
        assert_eq!(dashboard.pending_funding, 700.0);
        assert_eq!(dashboard.performance_metrics.completion_rate, 25.0);
    }

    #[test]
    fn dashboard_recent_projects_are_newest_first_capped_at_five() {
        let projects: Vec<Project> = (0..7)
            .map(|i| project(&format!("p{i}"), ProjectStatus::Active, None, None, i))
            .collect();
        let dashboard = build_ngo_dashboard(&projects);
        assert_eq!(dashboard.recent_projects.len(), 5);
        assert_eq!(dashboard.recent_projects[0].project_id, "p0");
        assert_eq!(dashboard.recent_projects[4].project_id, "p4");
    }

    #[test]
    fn empty_portfolio_yields_zeroed_dashboard() {
        let dashboard = build_ngo_dashboard(&[]);
        assert_eq!(dashboard.total_projects, 0);
        assert_eq!(dashboard.performance_metrics.completion_rate, 0.0);
        assert_eq!(dashboard.performance_metrics.funding_utilization, 0.0);
    }

    #[test]
    fn funding_summary_partitions_by_funding_status() {
        let projects = vec![
            project("a", ProjectStatus::Active, Some(400.0), Some(FundingStatus::Approved), 1),
            project("b", ProjectStatus::Active, Some(100.0), Some(FundingStatus::Disbursed), 2),
            project("c", ProjectStatus::Active, Some(50.0), Some(FundingStatus::Pending), 3),
            project("d", ProjectStatus::Active, None, Some(FundingStatus::Rejected), 4),
        ];
        let summary = build_funding_summary(&projects);
        assert_eq!(summary.total_requested, 4000.0);
        assert_eq!(summary.total_approved, 400.0);
        assert_eq!(summary.total_disbursed, 100.0);
        assert_eq!(summary.pending_requests, 1);
        assert_eq!(summary.approved_requests, 1);
        assert_eq!(summary.rejected_requests, 1);
    }

    #[test]
    fn report_listing_annotates_with_project_identity() {
        let mut with_report = project("a", ProjectStatus::Active, None, None, 1);
        with_report.reports.push(ProjectReport {
            report_type: Some("progress".to_string()),
            content: "All wells dug".to_string(),
            attachments: Vec::new(),
            submitted_by: "ngo-1".to_string(),
            submitted_at: Utc::now(),
            status: ReportStatus::Draft,
        });
        let without_report = project("b", ProjectStatus::Active, None, None, 2);

        let listing = build_report_listing(&[with_report, without_report]);
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].project_id, "a");
        assert_eq!(listing[0].project_title, "Project a");
    }

    #[test]
    fn profile_patch_uses_dotted_paths_for_the_info_block() {
        let payload: UpdateNgoProfileRequest = serde_json::from_value(json!({
            "name": "Hope Works",
            "ngoInfo": { "contactPerson": "R. Devi" },
        }))
        .unwrap();
        let set_doc = ngo_profile_update_doc(&payload);
        assert_eq!(set_doc.get_str("name").unwrap(), "Hope Works");
        assert_eq!(set_doc.get_str("ngoInfo.contactPerson").unwrap(), "R. Devi");
        assert!(set_doc.get("email").is_none());
        assert!(set_doc.get("ngoInfo.address").is_none());
    }
}
