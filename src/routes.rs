use crate::{
    api::{
        attendance, dashboard, finance, kudos, leave_request, meeting, project, task, training,
        user,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::AppError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Malformed bodies and query strings are validation failures
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| AppError::validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| AppError::validation(err.to_string()).into()),
    );

    cfg.service(
        web::scope(&config.api_prefix)
            // Public routes
            .service(
                web::scope("/auth").service(
                    web::resource("/login")
                        .wrap(login_limiter)
                        .route(web::post().to(handlers::login)),
                ),
            )
            // Protected routes
            .service(
                web::scope("")
                    .wrap(from_fn(auth_middleware)) // authentication
                    .wrap(protected_limiter) // rate limiting
                    .service(
                        web::scope("/users")
                            .service(
                                web::resource("")
                                    .route(web::get().to(user::list_users))
                                    .route(web::post().to(user::create_user)),
                            )
                            .service(
                                web::resource("/{id}")
                                    .route(web::get().to(user::get_user))
                                    .route(web::put().to(user::update_user))
                                    .route(web::delete().to(user::delete_user)),
                            ),
                    )
                    .service(
                        web::scope("/projects")
                            .service(
                                web::resource("")
                                    .route(web::get().to(project::list_projects))
                                    .route(web::post().to(project::create_project)),
                            )
                            .service(
                                web::resource("/{id}")
                                    .route(web::put().to(project::update_project))
                                    .route(web::delete().to(project::delete_project)),
                            ),
                    )
                    .service(
                        web::scope("/tasks")
                            .service(
                                web::resource("")
                                    .route(web::get().to(task::list_tasks))
                                    .route(web::post().to(task::create_task)),
                            )
                            .service(
                                web::resource("/{id}")
                                    .route(web::put().to(task::update_task))
                                    .route(web::delete().to(task::delete_task)),
                            ),
                    )
                    .service(
                        web::scope("/leave-requests")
                            .service(
                                web::resource("")
                                    .route(web::get().to(leave_request::leave_list))
                                    .route(web::post().to(leave_request::create_leave)),
                            )
                            .service(
                                web::resource("/{id}")
                                    .route(web::put().to(leave_request::review_leave)),
                            ),
                    )
                    .service(
                        web::scope("/finance")
                            .service(
                                web::resource("/transactions")
                                    .route(web::get().to(finance::list_transactions))
                                    .route(web::post().to(finance::create_transaction)),
                            )
                            .service(
                                web::resource("/transactions/{id}")
                                    .route(web::delete().to(finance::delete_transaction)),
                            )
                            .service(
                                web::resource("/salaries")
                                    .route(web::get().to(finance::list_salaries))
                                    .route(web::post().to(finance::create_salary)),
                            )
                            .service(
                                web::resource("/salaries/{id}")
                                    .route(web::put().to(finance::update_salary_status)),
                            )
                            .service(web::resource("/summary").route(web::get().to(finance::summary))),
                    )
                    .service(
                        web::scope("/attendance")
                            .service(web::resource("/check-in").route(web::post().to(attendance::check_in)))
                            .service(
                                web::resource("/check-out").route(web::post().to(attendance::check_out)),
                            )
                            .service(web::resource("/records").route(web::get().to(attendance::records)))
                            .service(web::resource("/summary").route(web::get().to(attendance::summary))),
                    )
                    .service(
                        web::scope("/kudos")
                            .service(
                                web::resource("/transactions")
                                    .route(web::get().to(kudos::list_transactions))
                                    .route(web::post().to(kudos::give_kudos)),
                            )
                            .service(web::resource("/balance/{user_id}").route(web::get().to(kudos::balance))),
                    )
                    .service(
                        web::scope("/training")
                            .service(
                                web::resource("/courses")
                                    .route(web::get().to(training::list_courses))
                                    .route(web::post().to(training::create_course)),
                            )
                            .service(
                                web::resource("/courses/{id}")
                                    .route(web::put().to(training::update_course)),
                            )
                            .service(
                                web::resource("/progress")
                                    .route(web::get().to(training::list_progress))
                                    .route(web::post().to(training::enroll)),
                            )
                            .service(
                                web::resource("/progress/{id}")
                                    .route(web::put().to(training::update_progress)),
                            ),
                    )
                    .service(
                        web::scope("/meetings")
                            .service(
                                web::resource("")
                                    .route(web::get().to(meeting::list_meetings))
                                    .route(web::post().to(meeting::create_meeting)),
                            )
                            .service(
                                web::resource("/{id}").route(web::put().to(meeting::update_meeting)),
                            )
                            .service(
                                web::resource("/{id}/attendance")
                                    .route(web::get().to(meeting::list_attendance))
                                    .route(web::post().to(meeting::record_attendance)),
                            )
                            .service(
                                web::resource("/{id}/penalties")
                                    .route(web::post().to(meeting::apply_penalties)),
                            ),
                    )
                    .service(
                        web::scope("/dashboard")
                            .service(web::resource("/stats").route(web::get().to(dashboard::stats))),
                    ),
            ),
    );
}
