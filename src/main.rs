use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = shadowtraffic::cli::Cli::parse();
    if let Err(e) = shadowtraffic::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
