// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::{ChainClient, ChainErr, ChainInfo, RpcClient};
use crate::network::NetworkConfig;
use async_trait::async_trait;
use log::*;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Creates chain clients for a network.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, network: &'static NetworkConfig)
        -> Result<Arc<dyn ChainClient>, ChainErr>;
}

/// Connects to the http endpoint of a network over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcConnector {
    timeout: Duration,
}

impl RpcConnector {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Connector for RpcConnector {
    async fn connect(
        &self,
        network: &'static NetworkConfig,
    ) -> Result<Arc<dyn ChainClient>, ChainErr> {
        let client = RpcClient::for_network(network, self.timeout)?;
        info!("Connecting to {} at {}", network.name, client.url());
        Ok(Arc::new(client))
    }
}

/// A live client together with what is known about its chain.
pub struct Connection {
    pub generation: u64,
    pub network: &'static NetworkConfig,
    pub client: Arc<dyn ChainClient>,
    pub info: ChainInfo,
}

/// Owns the single live chain connection.
///
/// Writers are serialized so a network switch always tears down the old
/// client before a new one exists. Readers grab an `Arc<Connection>` and can
/// check with [`ConnectionManager::is_current`] whether it went stale.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    writer: Mutex<()>,
    current: RwLock<Option<Arc<Connection>>>,
    generation: AtomicU64,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            writer: Mutex::new(()),
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Connects to `network`. Any existing connection is closed first.
    pub async fn connect(
        &self,
        network: &'static NetworkConfig,
    ) -> Result<Arc<Connection>, ChainErr> {
        let _guard = self.writer.lock().await;
        self.teardown().await;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let client = self.connector.connect(network).await?;

        let info = match client.chain_info().await {
            Ok(info) => info,
            Err(err) => {
                client.disconnect().await;
                return Err(err);
            }
        };

        info!("Connected to {} ({})", info.chain, network.name);
        let connection = Arc::new(Connection {
            generation,
            network,
            client,
            info,
        });

        *self.current.write() = Some(connection.clone());
        Ok(connection)
    }

    /// Replaces the live connection with one to `network`.
    pub async fn switch_network(
        &self,
        network: &'static NetworkConfig,
    ) -> Result<Arc<Connection>, ChainErr> {
        if let Some(current) = self.current() {
            info!("Switching from {} to {}", current.network.name, network.name);
        }

        self.connect(network).await
    }

    #[must_use]
    pub fn current(&self) -> Option<Arc<Connection>> {
        self.current.read().clone()
    }

    pub async fn disconnect(&self) {
        let _guard = self.writer.lock().await;
        self.teardown().await;
    }

    /// Whether `generation` still names the live connection.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.current
            .read()
            .as_ref()
            .map_or(false, |c| c.generation == generation)
    }

    /// Must be called with the writer lock held.
    async fn teardown(&self) {
        let old = self.current.write().take();
        if let Some(old) = old {
            debug!("Closing connection to {}", old.network.name);
            old.client.disconnect().await;
        }
    }
}
