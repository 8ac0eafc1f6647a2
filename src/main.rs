// src/main.rs

mod access;
mod admin;
mod app_state;
mod auth;
mod config;
mod db;
mod email;
mod error;
mod frontliner;
mod models;
mod ngo;
mod project;
mod storage;
mod task;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;

use crate::access::{Authentication, RoleGuard};
use crate::app_state::AppState;
use crate::email::Mailer;
use crate::models::Role;
use crate::storage::SubmissionStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let mongodb = Arc::new(
        db::MongoDB::init(&config.mongo_uri, &config.database_name)
            .await
            .expect("Failed to connect to MongoDB"),
    );
    let mailer = Arc::new(Mailer::from_config(&config));
    let storage = SubmissionStore::new(&config.upload_root).expect("Failed to initialize storage");

    let state = AppState {
        mongodb,
        config: config.clone(),
        mailer,
        storage,
    };

    println!("Server running at http://{}", config.bind_addr);
    println!("Allowed CORS Origin: {}", config.frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&state.config.frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .service(
                web::scope("/api/v1")
                    // SESSION / ACCOUNT
                    .service(
                        web::scope("/user")
                            .route("/register", web::post().to(auth::register))
                            .route("/login", web::post().to(auth::login))
                            .route("/logout", web::get().to(auth::logout))
                            .route("/verify-email/{token}", web::get().to(auth::verify_email))
                            .route("/resend-verification", web::post().to(auth::resend_verification))
                            .service(
                                web::scope("/profile")
                                    .wrap(Authentication)
                                    .route("", web::get().to(auth::get_profile)),
                            ),
                    )
                    // PROJECTS (any authenticated user)
                    .service(
                        web::scope("/projects")
                            .wrap(Authentication)
                            .route("", web::post().to(project::create_project))
                            .route("", web::get().to(project::list_projects))
                            .route("/{project_id}", web::get().to(project::get_project))
                            .route("/{project_id}", web::put().to(project::update_project))
                            .route("/{project_id}", web::delete().to(project::delete_project)),
                    )
                    // TASKS (any authenticated user; submit is assignee-only)
                    .service(
                        web::scope("/tasks")
                            .wrap(Authentication)
                            .route("", web::post().to(task::create_task))
                            .route("/project/{project_id}", web::get().to(task::get_project_tasks))
                            .route("/{task_id}/submit", web::post().to(task::submit_task))
                            .route("/{task_id}", web::get().to(task::get_task))
                            .route("/{task_id}", web::put().to(task::update_task))
                            .route("/{task_id}", web::delete().to(task::delete_task)),
                    )
                    // ADMIN
                    .service(
                        web::scope("/admin")
                            .wrap(RoleGuard::new(Role::Admin))
                            .wrap(Authentication)
                            .route("/ngos", web::post().to(admin::create_ngo))
                            .route("/ngos", web::get().to(admin::get_all_ngos))
                            .route("/frontliners", web::post().to(admin::create_frontliner))
                            .route("/frontliners", web::get().to(admin::get_all_frontliners))
                            .route("/settings/{user_id}", web::put().to(admin::update_admin_settings))
                            .route("/dashboard/{user_id}", web::get().to(admin::get_admin_dashboard))
                            .route("/users/{user_id}/status", web::put().to(admin::toggle_user_status)),
                    )
                    // PARTNER NGO
                    .service(
                        web::scope("/ngo")
                            .wrap(RoleGuard::new(Role::PartnerNGO))
                            .wrap(Authentication)
                            .route("/dashboard/{user_id}", web::get().to(ngo::get_ngo_dashboard))
                            .route("/projects", web::get().to(ngo::get_ngo_projects))
                            .route("/projects", web::post().to(ngo::create_ngo_project))
                            .route("/projects/{project_id}", web::get().to(ngo::get_ngo_project_details))
                            .route("/projects/{project_id}", web::put().to(ngo::update_ngo_project))
                            .route("/projects/{project_id}", web::delete().to(ngo::delete_ngo_project))
                            .route("/profile", web::get().to(ngo::get_ngo_profile))
                            .route("/profile", web::put().to(ngo::update_ngo_profile))
                            .route("/funding", web::get().to(ngo::get_ngo_funding_status))
                            .route("/funding/request", web::post().to(ngo::submit_funding_request))
                            .route("/reports", web::get().to(ngo::get_ngo_reports))
                            .route("/reports/generate", web::post().to(ngo::generate_report)),
                    )
                    // FRONTLINER
                    .service(
                        web::scope("/frontliner")
                            .wrap(RoleGuard::new(Role::Frontliner))
                            .wrap(Authentication)
                            .route("/dashboard/{user_id}", web::get().to(frontliner::get_frontliner_dashboard))
                            .route("/projects", web::get().to(frontliner::get_assigned_projects))
                            .route("/projects/{project_id}/progress", web::put().to(frontliner::update_project_progress))
                            .route("/projects/{project_id}/reports", web::post().to(frontliner::submit_project_report))
                            .route("/projects/{project_id}", web::get().to(frontliner::get_project_details))
                            .route("/profile", web::get().to(frontliner::get_frontliner_profile))
                            .route("/profile", web::put().to(frontliner::update_frontliner_profile))
                            .route("/tasks", web::get().to(frontliner::get_frontliner_tasks))
                            .route("/tasks/{task_id}/status", web::put().to(frontliner::update_task_status)),
                    ),
            )
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
