// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        // API v1 routes (all require authentication)
        .service(
            web::scope("/api/v1")
                // Provider taxonomy + saved location mappings
                .route(
                    "/locations",
                    web::get().to(handlers::list_location_mappings),
                )
                .route(
                    "/locations",
                    web::post().to(handlers::save_location_mappings),
                )
                .route(
                    "/locations/countries",
                    web::get().to(handlers::list_provider_countries),
                )
                .route(
                    "/locations/cities",
                    web::get().to(handlers::list_provider_cities),
                )
                // Site catalog
                .route("/cities", web::get().to(handlers::list_cities))
                .route("/cities/{id}", web::get().to(handlers::get_city))
                .route("/tours", web::get().to(handlers::list_tours))
                // Import pipeline (before the catch-all {id} route)
                .route("/tours/verify", web::post().to(handlers::verify_tours))
                .route("/tours/preview", web::post().to(handlers::preview_tours))
                .route("/tours/import", web::post().to(handlers::import_tours))
                .route("/tours/{id}", web::get().to(handlers::get_tour))
                // Audit feed
                .route("/imports", web::get().to(handlers::recent_imports)),
        );
}
