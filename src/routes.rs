use crate::{
    api::{leave_request, quota},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;

// Helper to build per-scope limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    // Authentication is handled by the gateway in front of this service
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(build_limiter(config.rate_protected_per_min))
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // /leave/pending (before /{id})
                    .service(
                        web::resource("/pending")
                            .route(web::get().to(leave_request::pending_list)),
                    )
                    // /leave/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave_request::get_leave))
                            .route(web::delete().to(leave_request::delete_leave)),
                    )
                    // /leave/{id}/approve
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    // /leave/{id}/reject
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    )
                    // /leave/{id}/revoke
                    .service(
                        web::resource("/{id}/revoke")
                            .route(web::post().to(leave_request::revoke_leave)),
                    ),
            )
            .service(
                web::scope("/quota")
                    // /quota
                    .service(
                        web::resource("")
                            .route(web::get().to(quota::quota_list))
                            .route(web::post().to(quota::create_quota)),
                    )
                    // /quota/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(quota::get_quota))
                            .route(web::put().to(quota::update_quota))
                            .route(web::delete().to(quota::delete_quota)),
                    ),
            ),
    );
}
