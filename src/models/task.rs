use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task lifecycle. `Submitted` is only ever written by the submit
/// endpoint, which also stamps the submission block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Submitted,
    Overdue,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Submitted => "Submitted",
            TaskStatus::Overdue => "Overdue",
            TaskStatus::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSubmission {
    pub file_url: String,
    pub submission_date: DateTime<Utc>,
}

/// Unit of work under a project, assigned to exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: String,
    pub title: String,
    pub project_id: String,
    pub assigned_to: String,
    pub due_date: DateTime<Utc>,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<TaskSubmission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_form_is_capitalized() {
        assert_eq!(serde_json::to_string(&TaskStatus::Overdue).unwrap(), "\"Overdue\"");
        assert_eq!(
            serde_json::from_str::<TaskStatus>("\"Submitted\"").unwrap(),
            TaskStatus::Submitted
        );
        // Lowercase variants from older clients are rejected at the boundary.
        assert!(serde_json::from_str::<TaskStatus>("\"pending\"").is_err());
    }

    #[test]
    fn submission_is_absent_until_submit() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "taskId": "t-1",
            "title": "Survey",
            "projectId": "p-1",
            "assignedTo": "u-1",
            "dueDate": chrono::Utc::now(),
            "status": "Pending",
            "createdAt": chrono::Utc::now(),
            "updatedAt": chrono::Utc::now(),
        }))
        .unwrap();
        assert!(task.submission.is_none());
        assert!(task.completed_at.is_none());
    }
}
