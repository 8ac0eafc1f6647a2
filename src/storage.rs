use chrono::Utc;
use opendal::services::Fs;
use opendal::Operator;

use crate::error::ApiError;

/// One file per task submission, ≤10 MB, PDF only (mirrors the upload
/// policy of the legacy deployment).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const ALLOWED_MIME: &str = "application/pdf";

const SUBMISSIONS_PREFIX: &str = "ngo_submissions";

/// Opaque store for submitted documents. Backed by a filesystem operator
/// here; anything opendal speaks would do.
#[derive(Clone)]
pub struct SubmissionStore {
    operator: Operator,
}

impl SubmissionStore {
    pub fn new(root: &str) -> Result<Self, opendal::Error> {
        let builder = Fs::default().root(root);
        let operator = Operator::new(builder)?.finish();
        Ok(Self { operator })
    }

    /// Persists the uploaded bytes and returns the stored key, which
    /// doubles as the submission's file URL.
    pub async fn store_submission(
        &self,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ApiError> {
        let key = submission_key(original_name, Utc::now().timestamp_millis());
        self.operator
            .write(&key, bytes)
            .await
            .map_err(ApiError::internal)?;
        Ok(key)
    }
}

/// `ngo_submissions/<sanitized stem>-<millis>.pdf`
fn submission_key(original_name: &str, millis: i64) -> String {
    let stem = original_name
        .rsplit('/')
        .next()
        .unwrap_or(original_name)
        .split('.')
        .next()
        .unwrap_or("submission");
    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "submission".to_string() } else { stem };
    format!("{SUBMISSIONS_PREFIX}/{stem}-{millis}.pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed_stamped_and_pdf() {
        let key = submission_key("field report.pdf", 1700000000000);
        assert_eq!(key, "ngo_submissions/field_report-1700000000000.pdf");
    }

    #[test]
    fn path_components_cannot_escape_the_prefix() {
        let key = submission_key("../../etc/passwd", 42);
        assert!(key.starts_with("ngo_submissions/"));
        assert!(!key.contains(".."));
        assert_eq!(key, "ngo_submissions/passwd-42.pdf");
    }

    #[test]
    fn empty_names_fall_back_to_a_stem() {
        let key = submission_key(".pdf", 7);
        assert_eq!(key, "ngo_submissions/submission-7.pdf");
    }
}
