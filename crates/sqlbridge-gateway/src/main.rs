#[tokio::main]
async fn main() {
    if let Err(e) = sqlbridge_gateway::run(std::env::args().collect()).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
