//! Gateway: connects transports to the message pipeline.

mod context;
mod gate;
mod pipeline;
mod responder;


pub use context::{ContextBuilder, NEW_CONVERSATION};
pub use gate::{ExactPolicy, ResponderPolicy, ResponseGate, SubstringPolicy};
pub use pipeline::Pipeline;
pub use responder::Responder;

use parley_core::message::TransportEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Owns one pipeline per transport and runs the event loop.
pub struct Gateway {
    pipelines: Vec<Arc<Pipeline>>,
}

impl Gateway {
    pub fn new(pipelines: Vec<Arc<Pipeline>>) -> Self {
        Self { pipelines }
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(
            "Parley gateway running | channels: {}",
            self.pipelines
                .iter()
                .map(|p| p.channel_name().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let (tx, mut rx) = mpsc::channel::<(usize, TransportEvent)>(256);

        for (idx, pipeline) in self.pipelines.iter().enumerate() {
            let name = pipeline.channel_name().to_string();
            let mut channel_rx = pipeline
                .channel()
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start channel {name}: {e}"))?;
            let tx = tx.clone();

            tokio::spawn(async move {
                while let Some(event) = channel_rx.recv().await {
                    if tx.send((idx, event)).await.is_err() {
                        info!("gateway receiver dropped, stopping {name} forwarder");
                        break;
                    }
                }
            });

            info!("Channel started: {}", pipeline.channel_name());
        }

        drop(tx);

        loop {
            tokio::select! {
                Some((idx, event)) = rx.recv() => self.dispatch(idx, event),
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    fn dispatch(&self, idx: usize, event: TransportEvent) {
        let Some(pipeline) = self.pipelines.get(idx) else {
            return;
        };
        match event {
            TransportEvent::Ready(identity) => {
                info!(
                    "[{}] ready as {} ({})",
                    pipeline.channel_name(),
                    identity.display_name.as_deref().unwrap_or("unnamed"),
                    identity.id
                );
                pipeline.set_identity(identity);
            }
            TransportEvent::PairingCode(code) => {
                info!(
                    "[{}] pairing required, scan or enter this code: {code}",
                    pipeline.channel_name()
                );
            }
            TransportEvent::Message(inbound) => {
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    let id = inbound.id.clone();
                    let outcome = pipeline.handle(inbound).await;
                    debug!("[{}] {id}: {outcome:?}", pipeline.channel_name());
                });
            }
        }
    }

    async fn shutdown(&self) {
        info!("Shutting down...");
        for pipeline in &self.pipelines {
            if let Err(e) = pipeline.channel().stop().await {
                warn!("failed to stop channel {}: {e}", pipeline.channel_name());
            }
        }
        info!("Shutdown complete.");
    }
}
