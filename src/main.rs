use actix_cors::Cors;
use actix_web::{web, App, HttpServer, middleware::{Logger, DefaultHeaders}, HttpResponse, Responder};
use newsroom_backend::{
    config::Config,
    helper::image_suggestion_helpers::ImageSuggester,
    helper::upload_helpers::{UploadSettings, UPLOADS_URL_PREFIX},
    middleware::{admin_ip_guard, AllowedIps},
    models::db_operations,
    routes,
    store::{ChangeWatcher, ContentStore},
};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// A simple handler for the root URL.
async fn root_handler() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

#[derive(Parser, Debug)]
#[command(name = "newsroom_server", author, version, about = "Starts the newsroom content server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    // Load configuration first
    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    // Initialize logger using the value from config
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    fs::create_dir_all(&config.uploads_path)
        .expect("Failed to create uploads directory");

    let storage = db_operations::open_storage(&config)
        .expect("FATAL: content storage not found. Run 'newsroom_cli --env-file <path> db setup'");
    let store = Arc::new(ContentStore::open(storage));
    let store_data = web::Data::from(Arc::clone(&store));

    let watcher = ChangeWatcher::spawn(Arc::clone(&store), config.change_poll_interval());

    let upload_settings = web::Data::new(UploadSettings::from_config(&config));
    // No stock photo client is bundled; suggestions come from the fallback set.
    let suggester = web::Data::new(ImageSuggester::fallback_only());

    let allowed_ips = AllowedIps::parse(&config.admin_accept_ip);
    if allowed_ips.denies_everyone() {
        log::warn!("ADMIN_ACCEPT_IP is not set. The admin API will refuse every request.");
    }

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    println!("🚀 Server starting at http://{}", server_address);

    let server_config = config.clone();
    let server = HttpServer::new(move || {
        let config = &server_config;
        let cors = {
            let allowed_origins_str = &config.allowed_origins;
            let cors = if allowed_origins_str.trim() == "*" {
                Cors::default().allow_any_origin()
            } else {
                allowed_origins_str
                    .split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            };
            cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
                .allowed_headers(vec![actix_web::http::header::ACCEPT, actix_web::http::header::CONTENT_TYPE])
                .max_age(3600)
        };

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
            )
            .app_data(store_data.clone())
            .app_data(upload_settings.clone())
            .app_data(suggester.clone())
            .configure(routes::public::config_api)
            .service(actix_files::Files::new(UPLOADS_URL_PREFIX, &config.uploads_path))
            .route("/", web::get().to(root_handler))
            .service(
                web::scope("/management")
                    .service(
                        web::scope(&config.admin_url_prefix)
                            .guard(admin_ip_guard(allowed_ips.clone()))
                            .configure(routes::admin::config_admin_api)
                    )
            )
    })
    .bind(server_address)?
    .run();

    let result = server.await;
    watcher.shutdown().await;
    result
}
