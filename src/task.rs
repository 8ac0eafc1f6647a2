use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::{doc, to_bson, Document};
use mongodb::options::ReturnDocument;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::access::{self, CurrentUser};
use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::{Task, TaskStatus, TaskSubmission};
use crate::project::with_updated_at;
use crate::storage::{ALLOWED_MIME, MAX_UPLOAD_BYTES};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub project: Option<String>,
    pub assigned_to: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub assigned_to: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<TaskStatus>,
    pub notes: Option<String>,
}

/// POST /api/v1/tasks
pub async fn create_task(
    data: web::Data<AppState>,
    payload: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (title, project, assigned_to, due_date) = match (
        payload.title,
        payload.project,
        payload.assigned_to,
        payload.due_date,
    ) {
        (Some(title), Some(project), Some(assigned_to), Some(due_date))
            if !title.trim().is_empty() && !project.trim().is_empty() && !assigned_to.trim().is_empty() =>
        {
            (title, project, assigned_to, due_date)
        }
        _ => return Err(ApiError::validation("All fields are required")),
    };

    let now = Utc::now();
    let new_task = Task {
        task_id: Uuid::new_v4().to_string(),
        title,
        project_id: project,
        assigned_to,
        due_date,
        status: TaskStatus::Pending,
        notes: None,
        submission: None,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };

    let tasks = data.mongodb.db.collection::<Task>("tasks");
    tasks.insert_one(&new_task).await.map_err(ApiError::internal)?;
    info!("Task created: {}", new_task.task_id);

    Ok(HttpResponse::Created().json(json!({
        "message": "Task created successfully",
        "task": new_task,
    })))
}

/// GET /api/v1/tasks/project/{project_id}
pub async fn get_project_tasks(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let project_id = path.into_inner();
    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let mut cursor = tasks_coll
        .find(doc! { "projectId": &project_id })
        .await
        .map_err(ApiError::internal)?;

    let mut tasks = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(task) => tasks.push(task),
            Err(err) => {
                error!("Cursor error while listing tasks: {}", err);
                return Err(ApiError::internal(err));
            }
        }
    }
    Ok(HttpResponse::Ok().json(tasks))
}

/// GET /api/v1/tasks/{task_id}
pub async fn get_task(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let task_id = path.into_inner();
    let tasks = data.mongodb.db.collection::<Task>("tasks");
    let task = tasks
        .find_one(doc! { "taskId": &task_id })
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    Ok(HttpResponse::Ok().json(task))
}

/// PUT /api/v1/tasks/{task_id}
pub async fn update_task(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let task_id = path.into_inner();
    let set_doc = task_update_doc(&payload.into_inner()).map_err(ApiError::internal)?;
    if set_doc.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    let tasks = data.mongodb.db.collection::<Task>("tasks");
    let updated = tasks
        .find_one_and_update(
            doc! { "taskId": &task_id },
            doc! { "$set": with_updated_at(set_doc)? },
        )
        .return_document(ReturnDocument::After)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Task updated successfully",
        "task": updated,
    })))
}

/// DELETE /api/v1/tasks/{task_id}
pub async fn delete_task(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let task_id = path.into_inner();
    let tasks = data.mongodb.db.collection::<Task>("tasks");
    let result = tasks
        .delete_one(doc! { "taskId": &task_id })
        .await
        .map_err(ApiError::internal)?;

    if result.deleted_count == 0 {
        return Err(ApiError::not_found("Task not found"));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Task deleted successfully" })))
}

/// POST /api/v1/tasks/{task_id}/submit
///
/// Multipart upload (field `file`, PDF, ≤10 MB) by the assignee. Anyone
/// else sees the task as nonexistent. The only way a task ever reaches
/// `Submitted` is through here.
pub async fn submit_task(
    data: web::Data<AppState>,
    current: CurrentUser,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let task_id = path.into_inner();
    let tasks = data.mongodb.db.collection::<Task>("tasks");

    let task = tasks
        .find_one(doc! { "taskId": &task_id })
        .await
        .map_err(ApiError::internal)?;
    let task = access::owned(task, |t| t.assigned_to == current.user_id).into_result("Task")?;

    let (original_name, bytes) = read_submission_file(payload).await?;
    let file_url = data.storage.store_submission(&original_name, bytes).await?;
    info!("Submission stored for task {}: {}", task.task_id, file_url);

    let submission = TaskSubmission {
        file_url,
        submission_date: Utc::now(),
    };
    let updated = tasks
        .find_one_and_update(
            doc! { "taskId": &task_id, "assignedTo": &current.user_id },
            doc! { "$set": with_updated_at(doc! {
                "status": TaskStatus::Submitted.as_str(),
                "submission": to_bson(&submission).map_err(ApiError::internal)?,
            })? },
        )
        .return_document(ReturnDocument::After)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Task submitted successfully",
        "task": updated,
    })))
}

/// Drains the multipart stream and returns the `file` field's name and
/// bytes, enforcing the MIME allow-list and the size cap.
async fn read_submission_file(mut payload: Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|err| ApiError::validation(format!("Upload error: {err}")))?;
        if field.name() != Some("file") {
            continue;
        }

        let mime_ok = field
            .content_type()
            .map(|mime| mime.essence_str() == ALLOWED_MIME)
            .unwrap_or(false);
        if !mime_ok {
            return Err(ApiError::validation("Only PDF files are allowed!"));
        }

        let original_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or("submission")
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|err| ApiError::validation(format!("Upload error: {err}")))?;
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(ApiError::validation("File too large. Maximum size is 10MB."));
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok((original_name, bytes));
    }
    Err(ApiError::validation(
        "Unexpected field. Make sure the file field is named 'file'.",
    ))
}

fn task_update_doc(payload: &UpdateTaskRequest) -> Result<Document, mongodb::bson::ser::Error> {
    let mut set_doc = doc! {};
    if let Some(title) = &payload.title {
        set_doc.insert("title", title);
    }
    if let Some(assigned_to) = &payload.assigned_to {
        set_doc.insert("assignedTo", assigned_to);
    }
    if let Some(due_date) = payload.due_date {
        set_doc.insert("dueDate", to_bson(&due_date)?);
    }
    if let Some(status) = payload.status {
        set_doc.insert("status", status.as_str());
    }
    if let Some(notes) = &payload.notes {
        set_doc.insert("notes", notes);
    }
    Ok(set_doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_doc_validates_status_and_keeps_identity_out() {
        let payload: UpdateTaskRequest = serde_json::from_value(json!({
            "status": "Completed",
            "notes": "done early",
        }))
        .unwrap();
        let set_doc = task_update_doc(&payload).unwrap();
        assert_eq!(set_doc.get_str("status").unwrap(), "Completed");
        assert_eq!(set_doc.get_str("notes").unwrap(), "done early");
        assert!(set_doc.get("taskId").is_none());
        assert!(set_doc.get("projectId").is_none());
    }

    #[test]
    fn bogus_status_never_reaches_the_update() {
        assert!(serde_json::from_value::<UpdateTaskRequest>(json!({
            "status": "Done"
        }))
        .is_err());
    }
}
