use clap::Parser;

use lntop::arguments::Arguments;

/// Main entry point for lntop
///
/// Default mode: hub + terminal dashboard. `pubsub`: hub only, events logged.
#[tokio::main]
async fn main() {
    let args = Arguments::parse();

    if let Err(e) = lntop::run::run(args).await {
        eprintln!("❌ lntop failed: {:#}", e);
        std::process::exit(1);
    }
}
