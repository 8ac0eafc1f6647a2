use mongodb::{options::ClientOptions, Client, Database};

/// Shared database handle. Constructed once at startup and passed around
/// through `AppState`; the driver's connection pool lives behind `client`.
pub struct MongoDB {
    pub client: Client,
    pub db: Database,
}

impl MongoDB {
    pub async fn init(uri: &str, db_name: &str) -> Result<Self, mongodb::error::Error> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);
        Ok(MongoDB { client, db })
    }
}
