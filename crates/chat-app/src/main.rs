use std::process::ExitCode;

use chatbox::settings::SettingsStore;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // stdout belongs to the chat transcript.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match chatbox::app::run(SettingsStore::load()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("chatbox stopped: {error}");
            ExitCode::FAILURE
        }
    }
}
