use crate::settings::PushSettings;
use common::{
    AdapterFactory, Notification, Outcome, Provider, PushAdapter, PushError, PushMetrics,
};
use log::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// 推送分发器
///
/// 按目标设备选择厂商适配器并委托发送，同时记录统计。
/// 适配器表在启动时构建，之后只读，可被并发调用。
pub struct Dispatcher {
    adapters: HashMap<Provider, Arc<dyn PushAdapter>>,
    metrics: Arc<dyn PushMetrics>,
}

impl Dispatcher {
    /// 创建一个没有任何适配器的分发器
    pub fn new(metrics: Arc<dyn PushMetrics>) -> Self {
        Self {
            adapters: HashMap::new(),
            metrics,
        }
    }

    /// 按配置通过各厂商工厂构建适配器
    ///
    /// 缺少配置或凭证不完整的厂商只记录错误，不注册。
    pub fn from_settings(
        settings: &PushSettings,
        factories: &[Box<dyn AdapterFactory>],
        metrics: Arc<dyn PushMetrics>,
    ) -> Self {
        let mut dispatcher = Self::new(metrics);

        for factory in factories {
            let provider = factory.provider();
            info!("Initializing android notification server for provider={}", provider);

            let Some(config) = settings.provider_config(provider) else {
                error!(
                    "Android push notifications not configured for provider={}, missing settings",
                    provider
                );
                continue;
            };

            match factory.create(config, settings.timeout()) {
                Ok(adapter) => dispatcher.register(adapter),
                Err(e) => error!("Failed to initialize provider={}: {}", provider, e),
            }
        }

        dispatcher
    }

    /// 注册适配器，同一厂商后注册的覆盖先注册的
    pub fn register(&mut self, adapter: Arc<dyn PushAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    /// 已注册的厂商
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.adapters.keys().copied().collect();
        providers.sort();
        providers
    }

    /// FCM 为默认通道，缺失时启动失败
    pub fn ensure_ready(&self) -> Result<(), PushError> {
        if self.adapters.contains_key(&Provider::Fcm) {
            Ok(())
        } else {
            Err(PushError::Config(
                "android push notifications not configured, missing fcm api_key".to_string(),
            ))
        }
    }

    /// 分发一条通知，每次调用恰好返回一个结果
    pub async fn dispatch(&self, notification: &Notification) -> Outcome {
        let provider = notification.device.provider();
        let push_type = notification.push_type;

        self.metrics.increment_total(provider, push_type);

        let result = match self.adapters.get(&provider) {
            Some(adapter) => {
                let start = Instant::now();
                let result = adapter.send(notification, notification.device.token()).await;
                self.metrics.observe_response(provider, start.elapsed());
                result
            }
            None => {
                error!(
                    "No adapter for provider={}, dropping push sid={:?}",
                    provider, notification.server_id
                );
                Err(PushError::Config(format!(
                    "{provider} push notifications are not configured"
                )))
            }
        };

        self.record(notification, provider, &result);
        result.into()
    }

    fn record(
        &self,
        notification: &Notification,
        provider: Provider,
        result: &Result<(), PushError>,
    ) {
        let push_type = notification.push_type;
        match result {
            Ok(()) if notification.has_ack() => {
                self.metrics.increment_success_with_ack(provider, push_type)
            }
            Ok(()) => self.metrics.increment_success(provider, push_type),
            // 删除统计按厂商错误码区分
            Err(PushError::InvalidToken(code)) => {
                info!(
                    "Provider={} reported invalid token code={}, sending remove for sid={:?}",
                    provider, code, notification.server_id
                );
                self.metrics.increment_removal(provider, push_type, code)
            }
            Err(e) => self
                .metrics
                .increment_failure(provider, push_type, &e.to_string()),
        }
    }
}
