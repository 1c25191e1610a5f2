use bootcamp_services::app::store::{StoreStartup, APPLICATION_NAME, RUN_LOCAL_PORT};
use bootcamp_services::utils::logger::{self, LoggerOptions};
use bootcamp_services::{BootcampError, LauncherArgs, WebHostBuilder};
use clap::Parser;

#[derive(Parser)]
#[command(name = "bootcamp-store")]
#[command(about = "Storefront guarded by a circuit breaker")]
struct Args {
    #[command(flatten)]
    launcher: LauncherArgs,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = logger::init_logger(&LoggerOptions::default().verbose(args.launcher.verbose)) {
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

    WebHostBuilder::create_default(APPLICATION_NAME, args)
        .use_cloud_foundry_hosting(Some(RUN_LOCAL_PORT))
        .add_cloud_foundry()
        .use_startup(StoreStartup)
        .build()
        .await?
        .run()
        .await
}
