use anyhow::Result;
use sesamo::cli::{actions, actions::Action, start, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse the CLI and initialize logging/telemetry
    let (action, globals) = start()?;

    // Handle the action
    match action {
        Action::Server { .. } => actions::server::handle(action, &globals).await?,
    }

    // Flush any pending spans before exit
    telemetry::shutdown_tracer();

    Ok(())
}
