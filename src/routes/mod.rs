// Route exports
pub mod agents;

use actix_web::web;

pub use agents::AppState;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(agents::configure),
    );
}
