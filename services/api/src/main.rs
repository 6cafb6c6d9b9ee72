use cargolink_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("cargolink-api: {err}");
        std::process::exit(1);
    }
}
