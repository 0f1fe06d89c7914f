#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::process::ExitCode;

use dotenv::dotenv;
use sshdash::connect::cli::CommandLine;
use sshdash::connect::command::{self, EXIT_CANCELLED, EXIT_ERROR};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    let cli = CommandLine::parse_args();

    // Log to stderr so prompts and progress on stdout stay readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(cli.log_level().parse().expect("valid directive")),
        )
        .init();

    // Cancel probes and lookups on Ctrl-C
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, cancelling");
            signal_token.cancel();
        }
    });

    match command::run(cli, cancel).await {
        // A prompt thread may still be blocked on the terminal, and dropping
        // the runtime would wait for it.
        Ok(EXIT_CANCELLED) => std::process::exit(i32::from(EXIT_CANCELLED)),
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
