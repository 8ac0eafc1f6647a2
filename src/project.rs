use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::{doc, to_bson, Document};
use mongodb::options::ReturnDocument;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::{FundingStatus, Project, ProjectStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub partner_ngo: Option<String>,
    #[serde(default)]
    pub frontliners: Vec<String>,
    pub status: Option<ProjectStatus>,
    pub budget: Option<f64>,
    pub category: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub objectives: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub budget: Option<f64>,
    pub funding: Option<f64>,
    pub funding_status: Option<FundingStatus>,
    pub status: Option<ProjectStatus>,
    pub progress: Option<i32>,
    pub notes: Option<String>,
    pub timeline: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub frontliners: Option<Vec<String>>,
}

/// POST /api/v1/projects
pub async fn create_project(
    data: web::Data<AppState>,
    payload: web::Json<CreateProjectRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (name, start_date, partner_ngo) = match (&payload.name, payload.start_date, &payload.partner_ngo) {
        (Some(name), Some(start_date), Some(partner_ngo))
            if !name.trim().is_empty() && !partner_ngo.trim().is_empty() =>
        {
            (name.clone(), start_date, partner_ngo.clone())
        }
        _ => {
            return Err(ApiError::validation(
                "Name, start date, and partner NGO are required",
            ))
        }
    };

    let now = Utc::now();
    let new_project = Project {
        project_id: Uuid::new_v4().to_string(),
        title: name,
        description: payload.description,
        objectives: None,
        category: payload.category,
        location: payload.location,
        budget: payload.budget,
        funding: None,
        funding_status: None,
        status: payload.status.unwrap_or(ProjectStatus::Active),
        progress: 0,
        notes: None,
        timeline: None,
        start_date: Some(start_date),
        created_by: partner_ngo,
        assigned_to: payload.frontliners,
        report_submitted: false,
        reports: Vec::new(),
        funding_requests: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    let projects = data.mongodb.db.collection::<Project>("projects");
    projects.insert_one(&new_project).await.map_err(ApiError::internal)?;
    info!("Project created: {}", new_project.project_id);

    Ok(HttpResponse::Created().json(json!({
        "message": "Project created successfully",
        "project": new_project,
    })))
}

/// GET /api/v1/projects
pub async fn list_projects(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let projects_coll = data.mongodb.db.collection::<Project>("projects");
    let mut cursor = projects_coll.find(doc! {}).await.map_err(ApiError::internal)?;

    let mut projects = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(project) => projects.push(project),
            Err(err) => {
                error!("Cursor error while listing projects: {}", err);
                return Err(ApiError::internal(err));
            }
        }
    }
    Ok(HttpResponse::Ok().json(projects))
}

/// GET /api/v1/projects/{project_id}
pub async fn get_project(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let project_id = path.into_inner();
    let projects = data.mongodb.db.collection::<Project>("projects");
    let project = projects
        .find_one(doc! { "projectId": &project_id })
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    Ok(HttpResponse::Ok().json(project))
}

/// PUT /api/v1/projects/{project_id}
///
/// Shallow merge of the provided fields; identity fields (projectId,
/// createdBy) are not part of the payload and stay untouched.
pub async fn update_project(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateProjectRequest>,
) -> Result<HttpResponse, ApiError> {
    let project_id = path.into_inner();
    let set_doc = project_update_doc(&payload.into_inner()).map_err(ApiError::internal)?;
    if set_doc.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    let projects = data.mongodb.db.collection::<Project>("projects");
    let updated = projects
        .find_one_and_update(
            doc! { "projectId": &project_id },
            doc! { "$set": with_updated_at(set_doc)? },
        )
        .return_document(ReturnDocument::After)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Project updated successfully",
        "project": updated,
    })))
}

/// DELETE /api/v1/projects/{project_id}
///
/// Unconditional delete; tasks under the project are left alone.
pub async fn delete_project(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let project_id = path.into_inner();
    let projects = data.mongodb.db.collection::<Project>("projects");
    let result = projects
        .delete_one(doc! { "projectId": &project_id })
        .await
        .map_err(ApiError::internal)?;

    if result.deleted_count == 0 {
        return Err(ApiError::not_found("Project not found"));
    }
    info!("Project deleted: {}", project_id);
    Ok(HttpResponse::Ok().json(json!({ "message": "Project deleted successfully" })))
}

fn project_update_doc(payload: &UpdateProjectRequest) -> Result<Document, mongodb::bson::ser::Error> {
    let mut set_doc = doc! {};
    if let Some(name) = &payload.name {
        set_doc.insert("title", name);
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
    if let Some(funding) = payload.funding {
        set_doc.insert("funding", funding);
    }
    if let Some(funding_status) = payload.funding_status {
        set_doc.insert("fundingStatus", funding_status.as_str());
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
    if let Some(timeline) = &payload.timeline {
        set_doc.insert("timeline", timeline);
    }
    if let Some(start_date) = payload.start_date {
        set_doc.insert("startDate", to_bson(&start_date)?);
    }
    if let Some(frontliners) = &payload.frontliners {
        set_doc.insert("assignedTo", frontliners.clone());
    }
    Ok(set_doc)
}

pub(crate) fn with_updated_at(mut set_doc: Document) -> Result<Document, ApiError> {
    set_doc.insert("updatedAt", to_bson(&Utc::now()).map_err(ApiError::internal)?);
    Ok(set_doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_doc_maps_only_provided_fields() {
        let payload: UpdateProjectRequest = serde_json::from_value(json!({
            "name": "New title",
            "status": "completed",
            "progress": 80,
        }))
        .unwrap();
        let set_doc = project_update_doc(&payload).unwrap();
        assert_eq!(set_doc.get_str("title").unwrap(), "New title");
        assert_eq!(set_doc.get_str("status").unwrap(), "completed");
        assert_eq!(set_doc.get_i32("progress").unwrap(), 80);
        assert!(set_doc.get("description").is_none());
        // Identity fields are never writable through the merge.
        assert!(set_doc.get("projectId").is_none());
        assert!(set_doc.get("createdBy").is_none());
    }

    #[test]
    fn empty_payload_produces_empty_doc() {
        let payload: UpdateProjectRequest = serde_json::from_value(json!({})).unwrap();
        assert!(project_update_doc(&payload).unwrap().is_empty());
    }

    #[test]
    fn status_outside_the_enum_is_rejected_at_the_boundary() {
        let result = serde_json::from_value::<UpdateProjectRequest>(json!({
            "status": "Active"
        }));
        assert!(result.is_err());
    }
}
