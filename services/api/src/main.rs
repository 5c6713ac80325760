use pod_quality_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("pod-quality error: {err}");
        std::process::exit(1);
    }
}
