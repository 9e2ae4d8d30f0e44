//! Shared helpers for socket-backed integration tests.
//!
//! Every test gets its own channel prefix so tests can run in parallel
//! without their named channels colliding.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use cmd_broker::broker::{Broker, BrokerHandle};
use cmd_broker::config::BrokerConfig;
use cmd_broker::exec::Executor;
use cmd_broker::Result;
use tokio::task::JoinHandle;

/// Build a default configuration with a unique channel prefix.
pub fn test_config() -> BrokerConfig {
    BrokerConfig {
        name: format!("cmdb-test-{}", uuid::Uuid::new_v4().simple()),
        shutdown_grace_seconds: 2,
        ..BrokerConfig::default()
    }
}

/// Replies with `ran: {command}` after an optional delay.
pub struct EchoExecutor {
    pub delay: Duration,
}

impl EchoExecutor {
    pub fn instant() -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::ZERO,
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay })
    }
}

impl Executor for EchoExecutor {
    fn execute<'a>(
        &'a self,
        command: &'a str,
        _max_output_bytes: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(format!("ran: {command}").into_bytes())
        })
    }
}

/// A broker serving on a background task.
pub struct RunningBroker {
    pub config: Arc<BrokerConfig>,
    pub handle: BrokerHandle,
    pub serve: JoinHandle<Result<()>>,
}

/// Start a broker for `config` and serve it in the background.
pub fn start_broker(config: BrokerConfig, executor: Arc<dyn Executor>) -> RunningBroker {
    let config = Arc::new(config);
    let broker = Broker::start(Arc::clone(&config), executor).expect("broker starts");
    let handle = broker.handle();
    let serve = tokio::spawn(broker.serve());
    RunningBroker {
        config,
        handle,
        serve,
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
