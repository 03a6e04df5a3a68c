#[tokio::main]
async fn main() {
    if let Err(e) = mountdeck_lib::run().await {
        eprintln!("mountdeck: {}", e);
        std::process::exit(1);
    }
}
