//! 发送重试策略：去相关抖动的指数退避。
//!
//! 第 n 次重试的延迟中位数约为 `first_retry_delay * 2^(n-1)`，
//! 延迟序列每次重新随机生成，避免多个实例同步重试。

use std::time::Duration;

use domain::{AlarmRecord, WebApi};
use rand::Rng;
use tracing::{error, warn};

use crate::error::DeliveryError;
use crate::transport::AlarmTransport;

const P_FACTOR: f64 = 4.0;
const RP_SCALING_FACTOR: f64 = 1.0 / 1.4;
const MAX_DELAY: Duration = Duration::from_secs(300);

/// 重试参数
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub retry_count: u32,
    pub first_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: 3,
            first_retry_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(retry_count: u32, first_retry_delay: Duration) -> Self {
        Self {
            retry_count,
            first_retry_delay,
        }
    }

    /// 生成本次发送的重试延迟序列（长度为 `retry_count`）。
    pub fn delays(&self) -> Vec<Duration> {
        let mut rng = rand::thread_rng();
        let median = self.first_retry_delay.as_secs_f64();
        let mut previous = 0.0_f64;
        (0..self.retry_count)
            .map(|attempt| {
                let t = f64::from(attempt) + rng.gen_range(0.0..1.0);
                let next = 2f64.powf(t) * (P_FACTOR * t).sqrt().tanh();
                let delay = ((next - previous) * RP_SCALING_FACTOR * median).max(0.0);
                previous = next;
                Duration::try_from_secs_f64(delay)
                    .unwrap_or(MAX_DELAY)
                    .min(MAX_DELAY)
            })
            .collect()
    }
}

/// 一次带重试的发送结果
#[derive(Debug)]
pub struct DeliveryReport {
    pub result: Result<(), DeliveryError>,
    /// 实际等待过的重试延迟
    pub retry_delays: Vec<Duration>,
}

impl DeliveryReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// 发送一条记录；仅对瞬时错误重试，首次重试时记录触发错误。
pub async fn send_with_retry(
    transport: &dyn AlarmTransport,
    policy: &RetryPolicy,
    api: &WebApi,
    record: &AlarmRecord,
) -> DeliveryReport {
    let delays = policy.delays();
    let mut retry_delays = Vec::new();
    loop {
        let err = match transport.send(api, record).await {
            Ok(()) => {
                return DeliveryReport {
                    result: Ok(()),
                    retry_delays,
                };
            }
            Err(err) => err,
        };
        let retry = retry_delays.len();
        let delay = match delays.get(retry) {
            Some(delay) if err.is_transient() => *delay,
            _ => {
                return DeliveryReport {
                    result: Err(err),
                    retry_delays,
                };
            }
        };
        if retry == 0 {
            error!(target: "gw.delivery", api = %api.name, alarm_id = %record.id, error = %err, "delivery_failed_first_attempt");
        }
        warn!(
            target: "gw.delivery",
            api = %api.name,
            alarm_id = %record.id,
            retry = retry + 1,
            delay_ms = delay.as_millis() as u64,
            "delivery_retry_scheduled"
        );
        gw_telemetry::record_delivery_retry();
        tokio::time::sleep(delay).await;
        retry_delays.push(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_match_retry_count_and_grow() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1_000));
        for _ in 0..20 {
            let delays = policy.delays();
            assert_eq!(delays.len(), 5);
            assert!(delays.iter().all(|delay| *delay <= MAX_DELAY));
            let total: Duration = delays.iter().sum();
            // 五次重试的累计延迟远大于首次延迟中位数。
            assert!(total > Duration::from_millis(1_000));
        }
        assert!(RetryPolicy::new(0, Duration::from_secs(1)).delays().is_empty());
    }
}
