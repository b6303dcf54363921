use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    partsline_cli::run().await
}
