use std::env;

#[derive(Clone)]
pub struct Config {
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub frontend_origin: String,
    pub frontend_url: String,
    pub smtp_host: String,
    pub smtp_user: String,
    pub smtp_password: String,
    pub email_from: String,
    pub upload_root: String,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let secure_cookies = env::var("NODE_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);

        Self {
            mongo_uri: env::var("MONGO_URI").expect("MONGO_URI must be set"),
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "ngo_connect".to_string()),
            jwt_secret: env::var("SECRET_KEY").expect("SECRET_KEY must be set"),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            smtp_user: env::var("EMAIL_USER").unwrap_or_default(),
            smtp_password: env::var("EMAIL_PASSWORD").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .or_else(|_| env::var("EMAIL_USER"))
                .unwrap_or_default(),
            upload_root: env::var("UPLOAD_ROOT").unwrap_or_else(|_| "./uploads".to_string()),
            secure_cookies,
        }
    }
}
