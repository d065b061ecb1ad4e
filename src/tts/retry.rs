//! Единая политика повторных попыток
//!
//! Одна параметризованная политика (число попыток, базовая задержка,
//! джиттер) применяется на границах синтеза речи и загрузки сегментов.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryPolicy;
use crate::error::{PodcastTtsError, Result};

/// Выполнить операцию с повторными попытками и экспоненциальной задержкой
///
/// Повторяются только ошибки, для которых `is_retryable()` истинно;
/// остальные возвращаются сразу. Задержка удваивается после каждой
/// неудачи, со случайным разбросом в пределах доли `jitter`.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = Duration::from_millis(policy.base_delay_ms);
    let mut last_error: Option<PodcastTtsError> = None;

    for attempt in 1..=policy.max_attempts {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let jittered = apply_jitter(delay, policy.jitter);
                log::warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    operation,
                    attempt,
                    policy.max_attempts,
                    jittered,
                    e
                );
                tokio::time::sleep(jittered).await;
                delay *= 2;
                last_error = Some(e);
            }
            Err(e) => {
                if attempt > 1 {
                    log::error!(
                        "{} failed after {} attempts: {}",
                        operation,
                        attempt,
                        e
                    );
                }
                return Err(e);
            }
        }
    }

    // Недостижимо: цикл всегда возвращается на последней попытке
    Err(last_error.unwrap_or_else(|| {
        PodcastTtsError::Other(format!("{}: retry loop exhausted", operation))
    }))
}

fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }
    let factor = rand::thread_rng().gen_range(1.0 - jitter..1.0 + jitter);
    delay.mul_f64(factor.max(0.0))
}
