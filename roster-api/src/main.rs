use roster_api::config::AppConfig;

#[rocket::main]
async fn main() {
    roster_api::init_logger();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = roster_api::rocket(config).launch().await {
        log::error!("server failed: {}", e);
        std::process::exit(1);
    }
}
