use crate::{Provider, PushType};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// 推送统计接口
///
/// 由分发器注入，测试中可替换。
pub trait PushMetrics: Send + Sync {
    fn increment_total(&self, provider: Provider, push_type: PushType);

    fn increment_success(&self, provider: Provider, push_type: PushType);

    fn increment_success_with_ack(&self, provider: Provider, push_type: PushType);

    fn increment_failure(&self, provider: Provider, push_type: PushType, reason: &str);

    fn increment_removal(&self, provider: Provider, push_type: PushType, reason: &str);

    /// 记录一次厂商调用耗时
    fn observe_response(&self, provider: Provider, elapsed: Duration);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    Attempted,
    Succeeded,
    SucceededWithAck,
    Failed,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct CounterKey {
    kind: CounterKind,
    provider: Provider,
    push_type: PushType,
    reason: Option<String>,
}

/// 计数器快照中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSample {
    pub kind: CounterKind,
    pub provider: Provider,
    pub push_type: PushType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub value: u64,
}

#[derive(Debug, Default)]
struct Timing {
    count: AtomicU64,
    total_micros: AtomicU64,
}

/// 基于原子计数的内存统计
#[derive(Debug, Default)]
pub struct CounterMetrics {
    counters: DashMap<CounterKey, AtomicU64>,
    timings: DashMap<Provider, Timing>,
}

impl CounterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(
        &self,
        kind: CounterKind,
        provider: Provider,
        push_type: PushType,
        reason: Option<&str>,
    ) {
        let key = CounterKey {
            kind,
            provider,
            push_type,
            reason: reason.map(str::to_string),
        };
        self.counters
            .entry(key)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    /// 指定维度的计数，失败与删除会汇总所有原因
    pub fn count(&self, kind: CounterKind, provider: Provider, push_type: PushType) -> u64 {
        self.counters
            .iter()
            .filter(|entry| {
                let key = entry.key();
                key.kind == kind && key.provider == provider && key.push_type == push_type
            })
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .sum()
    }

    /// 指定原因的计数
    pub fn count_reason(
        &self,
        kind: CounterKind,
        provider: Provider,
        push_type: PushType,
        reason: &str,
    ) -> u64 {
        let key = CounterKey {
            kind,
            provider,
            push_type,
            reason: Some(reason.to_string()),
        };
        self.counters
            .get(&key)
            .map(|value| value.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// 记录过的调用耗时次数
    pub fn observations(&self, provider: Provider) -> u64 {
        self.timings
            .get(&provider)
            .map(|timing| timing.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// 平均调用耗时
    pub fn mean_response_time(&self, provider: Provider) -> Option<Duration> {
        let timing = self.timings.get(&provider)?;
        let count = timing.count.load(Ordering::Relaxed);
        if count == 0 {
            return None;
        }
        Some(Duration::from_micros(
            timing.total_micros.load(Ordering::Relaxed) / count,
        ))
    }

    pub fn snapshot(&self) -> Vec<CounterSample> {
        let mut samples: Vec<CounterSample> = self
            .counters
            .iter()
            .map(|entry| {
                let key = entry.key();
                CounterSample {
                    kind: key.kind,
                    provider: key.provider,
                    push_type: key.push_type,
                    reason: key.reason.clone(),
                    value: entry.value().load(Ordering::Relaxed),
                }
            })
            .collect();
        samples.sort_by(|a, b| {
            (a.kind, a.provider, a.push_type, &a.reason)
                .cmp(&(b.kind, b.provider, b.push_type, &b.reason))
        });
        samples
    }
}

impl PushMetrics for CounterMetrics {
    fn increment_total(&self, provider: Provider, push_type: PushType) {
        self.bump(CounterKind::Attempted, provider, push_type, None);
    }

    fn increment_success(&self, provider: Provider, push_type: PushType) {
        self.bump(CounterKind::Succeeded, provider, push_type, None);
    }

    fn increment_success_with_ack(&self, provider: Provider, push_type: PushType) {
        self.bump(CounterKind::SucceededWithAck, provider, push_type, None);
    }

    fn increment_failure(&self, provider: Provider, push_type: PushType, reason: &str) {
        self.bump(CounterKind::Failed, provider, push_type, Some(reason));
    }

    fn increment_removal(&self, provider: Provider, push_type: PushType, reason: &str) {
        self.bump(CounterKind::Removed, provider, push_type, Some(reason));
    }

    fn observe_response(&self, provider: Provider, elapsed: Duration) {
        let timing = self.timings.entry(provider).or_default();
        timing.count.fetch_add(1, Ordering::Relaxed);
        timing
            .total_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }
}
