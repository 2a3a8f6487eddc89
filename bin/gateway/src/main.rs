use gateway::{load_and_install_logger, run_services};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  let config_file_path = std::env::args()
    .nth(1)
    .unwrap_or("./config.json".to_string());

  let config_object = load_and_install_logger(&config_file_path)?;

  run_services(config_object).await
}
