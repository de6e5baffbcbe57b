use mns_queue_cli::run_cli;

#[tokio::main]
async fn main() {
    // Exit with a code that identifies the error category
    if let Err(e) = run_cli().await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
