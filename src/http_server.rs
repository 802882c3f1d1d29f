use actix_web::{middleware, web, App, HttpServer};

use crate::context::AppContext;
use crate::handlers;

pub async fn run_http_server(ctx: web::Data<AppContext>, port: u16) -> std::io::Result<()> {
    tracing::info!("Starting HTTP server on port {}", port);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(ctx.clone())
            .configure(handlers::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
