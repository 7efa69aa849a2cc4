mod app;
mod cli;

use tracing_subscriber::EnvFilter;

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("qpilot=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    app::run(cli::parse());
}
