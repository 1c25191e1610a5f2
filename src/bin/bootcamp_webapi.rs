use bootcamp_services::app::webapi::{ProductContext, WebApiStartup, APPLICATION_NAME};
use bootcamp_services::utils::logger::{self, LoggerOptions};
use bootcamp_services::{BootcampError, LauncherArgs, WebHostBuilder};
use clap::Parser;

#[derive(Parser)]
#[command(name = "bootcamp-webapi")]
#[command(about = "Product web API with externalized configuration")]
struct Args {
    #[command(flatten)]
    launcher: LauncherArgs,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // The config server client logs before host logging exists, so start at trace.
    if let Err(e) = logger::init_logger(&LoggerOptions::trace()) {
        eprintln!("❌ {}", e);
    }

    if let Err(e) = run(&args.launcher).await {
        tracing::error!(
            "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
            APPLICATION_NAME,
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }
}

async fn run(args: &LauncherArgs) -> Result<(), BootcampError> {
    tracing::info!("🚀 Starting {} ({})", APPLICATION_NAME, args.environment);

    let web_host = WebHostBuilder::create_default(APPLICATION_NAME, args)
        .use_cloud_foundry_hosting(None)
        .add_config_server()
        .use_startup(WebApiStartup)
        .build()
        .await?;

    web_host.ensure_migration_of_context::<ProductContext>().await?;
    web_host.run().await
}
