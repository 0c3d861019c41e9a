//! 同 key 并发请求合并
//!
//! 同一 key 的并发调用只执行一次底层操作，其余调用方等待并共享同一
//! 结果，避免快速连续导航时对后端权限接口发出重复请求

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use arbor_errors::{AppError, AppResult};
use tokio::sync::{Mutex, broadcast};
use tracing::debug;

/// 并发合并组
///
/// 错误跨调用方以字符串形式广播，领头调用方拿到原始错误
#[derive(Clone)]
pub struct FlightGroup<T> {
    #[allow(clippy::type_complexity)]
    in_flight: Arc<Mutex<HashMap<String, broadcast::Sender<Result<T, String>>>>>,
}

impl<T: Clone + Send + Sync + 'static> FlightGroup<T> {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 执行操作；若同 key 已有操作在执行中则等待其结果
    pub async fn run<F, Fut>(&self, key: &str, f: F) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut f = Some(f);
        loop {
            let tx = {
                let mut in_flight = self.in_flight.lock().await;
                match in_flight.get(key) {
                    Some(tx) => {
                        // 已有领头调用，跟随等待
                        let mut rx = tx.subscribe();
                        drop(in_flight);
                        debug!(key = %key, "Joining in-flight call");
                        match rx.recv().await {
                            Ok(Ok(value)) => return Ok(value),
                            Ok(Err(msg)) => return Err(AppError::internal(msg)),
                            // 领头调用消失且没有广播结果，重新竞争
                            Err(_) => continue,
                        }
                    }
                    None => {
                        let (tx, _rx) = broadcast::channel(1);
                        in_flight.insert(key.to_string(), tx.clone());
                        tx
                    }
                }
            };

            // 本调用成为领头，执行实际操作
            let operation =
                f.take().unwrap_or_else(|| unreachable!("leader branch is entered at most once"));
            let result = operation().await;

            let broadcast_result = match &result {
                Ok(value) => Ok(value.clone()),
                Err(e) => Err(e.to_string()),
            };
            {
                let mut in_flight = self.in_flight.lock().await;
                in_flight.remove(key);
            }
            let _ = tx.send(broadcast_result);

            return result;
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for FlightGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}
