pub mod upload;

use actix_web::web;

/// Mount the API routes
pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api").service(web::resource("/upload").route(web::post().to(upload::upload))),
    );
}
