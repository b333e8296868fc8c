//! The benchmark client driven by a load harness.
//!
//! A client moves from unconnected to ready on a successful [`BenchmarkClient::dial`]
//! and then serves any number of [`BenchmarkClient::request`] calls, one
//! outstanding transaction at a time. Every failure is per-call; the client
//! stays usable after returning an error.

use ovsdb_client::{Connector, RowUuid};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::builder::OperationBuilder;
use crate::cache::RowHandleCache;
use crate::config::{ClientConfig, OpKind};
use crate::error::BenchError;
use crate::executor::TransactionExecutor;
use crate::validate::check_reply;

pub struct BenchmarkClient<C: Connector> {
    connector: C,
    op: OpKind,
    builder: OperationBuilder,
    executor: TransactionExecutor,
    cache: RowHandleCache,
    session: Option<C::Session>,
    rng: SmallRng,
}

impl<C: Connector> BenchmarkClient<C> {
    pub fn new(connector: C, config: ClientConfig) -> Self {
        // Use a random seed when the caller provides zero.
        let seed = if config.seed == 0 {
            rand::thread_rng().gen()
        } else {
            config.seed
        };
        Self {
            connector,
            op: config.op,
            executor: TransactionExecutor::new(config.target.database.clone()),
            builder: OperationBuilder::new(config.target),
            cache: RowHandleCache::new(),
            session: None,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Build a client from a raw operation token, rejecting unknown tokens
    /// before anything touches the network.
    pub fn from_token(
        connector: C,
        op_token: Option<&str>,
        mut config: ClientConfig,
    ) -> Result<Self, BenchError> {
        config.op = OpKind::resolve(op_token)?;
        Ok(Self::new(connector, config))
    }

    pub fn op(&self) -> OpKind {
        self.op
    }

    pub fn cache(&self) -> &RowHandleCache {
        &self.cache
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Open a session and snapshot the target table's row identities.
    ///
    /// Either step failing leaves the client unconnected with its previous
    /// cache untouched.
    pub async fn dial(&mut self, address: &str) -> Result<(), BenchError> {
        let session = self
            .connector
            .connect(address)
            .await
            .map_err(|source| BenchError::Connect {
                address: address.to_string(),
                source,
            })?;

        let mut cache = RowHandleCache::new();
        let handles = cache
            .refresh(&session, &self.executor, &self.builder)
            .await?;
        tracing::info!(
            address,
            database = self.executor.database(),
            table = %self.builder.target().table,
            handles,
            op = %self.op,
            "dialed ovsdb"
        );

        self.cache = cache;
        self.session = Some(session);
        Ok(())
    }

    /// Issue one transaction for the configured operation and validate it.
    pub async fn request(&mut self) -> Result<(), BenchError> {
        let Some(session) = self.session.as_ref() else {
            return Err(BenchError::NotConnected);
        };
        let identity = if self.op.targets_row() {
            self.cache.pick(&mut self.rng)
        } else {
            RowUuid::nil()
        };
        let request = self.builder.build(self.op, identity);
        let reply = self.executor.execute(session, &request).await;
        check_reply(reply, request.operations())?;
        Ok(())
    }
}

impl<C: Connector> std::fmt::Debug for BenchmarkClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkClient")
            .field("op", &self.op)
            .field("database", &self.executor.database())
            .field("table", &self.builder.target().table)
            .field("cached_handles", &self.cache.len())
            .field("connected", &self.session.is_some())
            .finish()
    }
}
