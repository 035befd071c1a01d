use inkpress::{Config, build_rocket};

#[rocket::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    let rocket = match build_rocket(config) {
        Ok(rocket) => rocket,
        Err(err) => {
            eprintln!("Failed to start: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = rocket.launch().await {
        tracing::error!(error = %err, "server terminated");
        std::process::exit(1);
    }
}
