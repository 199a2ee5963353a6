#[tokio::main]
async fn main() {
  if let Err(e) = daily_coach_lib::run().await {
    eprintln!("daily-coach failed: {}", e);
    std::process::exit(1);
  }
}
