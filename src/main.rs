use actix_web::{middleware, web, App, HttpServer};
use std::fs;
use zip_deploy::{register, Config};

fn create_projects_root(config: &Config) -> std::io::Result<()> {
    // Recursive won't fail if the folders already exist
    fs::DirBuilder::new()
        .recursive(true)
        .create(&config.projects_root)
}

fn init() -> std::io::Result<Config> {
    // Initialise logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;
    create_projects_root(&config)?;
    Ok(config)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = init()?;
    let address = config.listen_at;
    let serve_form = config.public_folder.is_dir();
    if !serve_form {
        log::warn!(
            "Public folder {} not found, upload form disabled",
            config.public_folder.display()
        );
    }
    log::info!(
        "Deploying uploads into {}, listening on {}",
        config.projects_root.display(),
        address
    );

    let config = web::Data::new(config);
    HttpServer::new(move || {
        let app = App::new()
            .wrap(middleware::Logger::default())
            .app_data(config.clone())
            .configure(register);
        if serve_form {
            // Upload form
            app.service(actix_files::Files::new("/", &config.public_folder).index_file("index.html"))
        } else {
            app
        }
    })
    .bind(address)?
    .run()
    .await
}
