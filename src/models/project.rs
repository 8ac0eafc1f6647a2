use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Project lifecycle. One closed set replaces the free-form strings the
/// two historical schema revisions used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    Active,
    Completed,
    Discontinued,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Pending => "pending",
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Discontinued => "discontinued",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundingStatus {
    Pending,
    Approved,
    Disbursed,
    Rejected,
}

impl FundingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundingStatus::Pending => "pending",
            FundingStatus::Approved => "approved",
            FundingStatus::Disbursed => "disbursed",
            FundingStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Draft,
    Submitted,
}

/// A report attached to a project, either drafted by the owning NGO or
/// submitted by an assigned frontliner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_type: Option<String>,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    pub status: ReportStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRequest {
    pub amount: f64,
    pub purpose: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    pub status: FundingStatus,
}

/// Unit of work owned by one PartnerNGO (`created_by`) and assigned to
/// zero or more frontliners (`assigned_to`). Ownership filters on those
/// two fields are the only access control on projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objectives: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding_status: Option<FundingStatus>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    pub created_by: String,
    #[serde(default)]
    pub assigned_to: Vec<String>,
    #[serde(default)]
    pub report_submitted: bool,
    #[serde(default)]
    pub reports: Vec<ProjectReport>,
    #[serde(default)]
    pub funding_requests: Vec<FundingRequest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_form_is_lowercase() {
        assert_eq!(serde_json::to_string(&ProjectStatus::Active).unwrap(), "\"active\"");
        assert_eq!(
            serde_json::from_str::<ProjectStatus>("\"discontinued\"").unwrap(),
            ProjectStatus::Discontinued
        );
        // The old capitalized revision is rejected at the boundary.
        assert!(serde_json::from_str::<ProjectStatus>("\"Active\"").is_err());
    }

    #[test]
    fn funding_status_rejects_unknown_values() {
        assert!(serde_json::from_str::<FundingStatus>("\"granted\"").is_err());
        assert_eq!(
            serde_json::from_str::<FundingStatus>("\"disbursed\"").unwrap(),
            FundingStatus::Disbursed
        );
    }

    #[test]
    fn embedded_arrays_default_to_empty() {
        let project: Project = serde_json::from_value(serde_json::json!({
            "projectId": "p-1",
            "title": "Clean water",
            "status": "pending",
            "createdBy": "u-1",
            "createdAt": chrono::Utc::now(),
            "updatedAt": chrono::Utc::now(),
        }))
        .unwrap();
        assert!(project.reports.is_empty());
        assert!(project.funding_requests.is_empty());
        assert!(project.assigned_to.is_empty());
        assert_eq!(project.progress, 0);
        assert!(!project.report_submitted);
    }
}
