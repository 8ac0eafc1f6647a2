use std::sync::Arc;

use crate::config::Config;
use crate::db::MongoDB;
use crate::email::Mailer;
use crate::storage::SubmissionStore;

#[derive(Clone)]
pub struct AppState {
    pub mongodb: Arc<MongoDB>,
    pub config: Config,
    pub mailer: Arc<Mailer>,
    pub storage: SubmissionStore,
}
