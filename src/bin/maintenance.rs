use inkpress::{Config, init_tracing, maintenance};

fn print_usage(bin_name: &str) {
    eprintln!("Usage: {bin_name} <cleanup|bootstrap>");
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let mut args = std::env::args();
    let bin_name = args.next().unwrap_or_else(|| "inkpress-maintenance".to_string());
    let command = args.next();

    if args.next().is_some() {
        print_usage(&bin_name);
        std::process::exit(2);
    }

    let config = match Config::load().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level, config.logging.json_format);

    let outcome = match command.as_deref() {
        Some("cleanup") => maintenance::run_cleanup(&config).await.map(|result| {
            println!(
                "Cleanup completed: sessions_deleted={}, resets_deleted={}",
                result.sessions_deleted, result.resets_deleted
            );
        }),
        Some("bootstrap") => maintenance::run_bootstrap(&config).await.map(|result| {
            println!(
                "Bootstrap completed: admin_id={}, tags={}, categories={}, settings={}",
                result.admin_id, result.tags, result.categories, result.settings
            );
        }),
        _ => {
            print_usage(&bin_name);
            std::process::exit(2);
        }
    };

    if let Err(err) = outcome {
        eprintln!("Maintenance task failed: {err:?}");
        std::process::exit(1);
    }
}
