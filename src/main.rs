use actix_web::{web, App, HttpServer};
use log::info;
use std::error::Error;

use student_risk::{api, ModelConfig, RiskModel, ServerConfig};

async fn start_api(config: ServerConfig, model: RiskModel) -> std::io::Result<()> {
    let model_data = web::Data::new(model);
    let options_data = web::Data::new(config.import_options());

    HttpServer::new(move || {
        App::new()
            .app_data(model_data.clone())
            .app_data(options_data.clone())
            .configure(api::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env()?;
    let model = RiskModel::new(ModelConfig::default())?;
    let info = model.model_info();
    info!(
        "risk model ready: weights {:?}, thresholds {:?}",
        info.weights, info.thresholds
    );
    info!(
        "input policy {:?}, parse failure policy {:?}",
        config.input_policy, config.parse_failure
    );

    info!("starting student risk API on http://{}:{}", config.host, config.port);
    start_api(config, model).await?;

    Ok(())
}
