use actix_web::{App, HttpServer, web};
use anyhow::Context;
use common::{AdapterFactory, CounterMetrics};
use fcm::FcmAdapterFactory;
use huawei::HuaweiAdapterFactory;
use log::*;
use push_server::{Dispatcher, PushSettings, api};
use std::sync::Arc;
use xiaomi::XiaomiAdapterFactory;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = PushSettings::from_env()?;

    let factories: Vec<Box<dyn AdapterFactory>> = vec![
        Box::new(FcmAdapterFactory),
        Box::new(HuaweiAdapterFactory),
        Box::new(XiaomiAdapterFactory),
    ];
    let metrics = Arc::new(CounterMetrics::new());
    let dispatcher = Dispatcher::from_settings(&settings, &factories, metrics.clone());
    dispatcher
        .ensure_ready()
        .context("refusing to start without the default android provider")?;
    info!("Registered providers: {:?}", dispatcher.providers());

    let dispatcher_data = web::Data::new(dispatcher);
    let metrics_data = web::Data::from(metrics);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(dispatcher_data.clone())
            .app_data(metrics_data.clone())
            .configure(api::configure)
    })
    .bind(&settings.listen_address)
    .with_context(|| format!("failed to bind {}", settings.listen_address))?
    .run()
    .await?;

    Ok(())
}
