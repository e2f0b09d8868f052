use crate::dispatcher::Dispatcher;
use actix_web::{HttpResponse, Responder, get, post, web};
use common::{CounterMetrics, CounterSample, Notification, Provider};
use log::*;
use serde::Serialize;

/// 健康检查响应体
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// 已启用的厂商
    pub providers: Vec<Provider>,
}

/// 统计响应体
#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    pub counters: Vec<CounterSample>,
}

#[get("/health")]
async fn health(dispatcher: web::Data<Dispatcher>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        providers: dispatcher.providers(),
    })
}

#[post("/api/v1/send_push")]
async fn send_push(
    req: web::Json<Notification>,
    dispatcher: web::Data<Dispatcher>,
) -> HttpResponse {
    info!(
        "Received push request for provider: {} type: {}",
        req.device.provider(),
        req.push_type
    );

    let outcome = dispatcher.dispatch(&req).await;
    HttpResponse::Ok().json(outcome)
}

#[get("/api/v1/metrics")]
async fn metrics(metrics: web::Data<CounterMetrics>) -> HttpResponse {
    HttpResponse::Ok().json(MetricsResponse {
        counters: metrics.snapshot(),
    })
}

/// 注册所有路由
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(send_push).service(metrics);
}
