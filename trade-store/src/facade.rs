//! Persistence facade.
//!
//! [`TradeStore`] is the one surface callers use. The backend is picked once
//! from [`StoreConfig`] and every call goes to it; nothing is caught or
//! retried here, mappers own their retry policy.

use crate::columnar::{ColumnarClient, FactTradeMapper, FlatTradeMapper};
use crate::config::{BackendKind, StoreConfig};
use crate::document::{DocumentClient, DocumentTradeAdapter};
use crate::error::{StoreError, StoreResult};
use crate::repository::{AnalyticalTradeMapper, PeriodQuery, PeriodRecord, TradeRepository};
use crate::retry::RetryConfig;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use trade_domain::{SearchCriteria, TradeAggregate, TradeDto, TradeId};

#[cfg(feature = "postgres")]
use sqlx::PgPool;

/// Storage clients available to the facade; only the selected backend's
/// client has to be present
#[derive(Default, Clone)]
pub struct BackendClients {
    /// Relational connection pool
    #[cfg(feature = "postgres")]
    pub pg_pool: Option<PgPool>,
    /// Document store client
    pub document: Option<Arc<dyn DocumentClient>>,
    /// Columnar store client, shared by both analytical layouts
    pub columnar: Option<Arc<dyn ColumnarClient>>,
}

impl BackendClients {
    /// No clients
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide the relational pool
    #[cfg(feature = "postgres")]
    pub fn with_pg_pool(mut self, pool: PgPool) -> Self {
        self.pg_pool = Some(pool);
        self
    }

    /// Provide the document client
    pub fn with_document(mut self, client: Arc<dyn DocumentClient>) -> Self {
        self.document = Some(client);
        self
    }

    /// Provide the columnar client
    pub fn with_columnar(mut self, client: Arc<dyn ColumnarClient>) -> Self {
        self.columnar = Some(client);
        self
    }
}

fn missing_client(kind: BackendKind, client: &str) -> StoreError {
    StoreError::Config(format!("backend {} selected but no {} was provided", kind, client))
}

/// Uniform persist / find / search / delete over one configured backend
pub struct TradeStore {
    kind: BackendKind,
    backend: Arc<dyn TradeRepository>,
    analytical: Option<Arc<dyn AnalyticalTradeMapper>>,
}

impl TradeStore {
    /// Wire the backend selected by `config`
    ///
    /// # Errors
    /// `StoreError::Config` if the selected backend's client is missing or
    /// the backend is not compiled in
    pub fn from_config(config: &StoreConfig, clients: BackendClients) -> StoreResult<Self> {
        let retry = config.retry_config();
        let kind = config.backend;

        let mut analytical: Option<Arc<dyn AnalyticalTradeMapper>> = None;
        let backend: Arc<dyn TradeRepository> = match kind {
            BackendKind::Relational => Self::relational(&clients, retry)?,
            BackendKind::Document => {
                let client = clients.document.ok_or_else(|| missing_client(kind, "document client"))?;
                Arc::new(DocumentTradeAdapter::new(client, config.tables.document.clone()).with_retry(retry))
            },
            BackendKind::OlapFlat => {
                let client = clients.columnar.ok_or_else(|| missing_client(kind, "columnar client"))?;
                let mapper = Arc::new(
                    FlatTradeMapper::new(client, config.tables.olap_flat.clone()).with_retry(retry),
                );
                analytical = Some(mapper.clone());
                mapper
            },
            BackendKind::OlapFact => {
                let client = clients.columnar.ok_or_else(|| missing_client(kind, "columnar client"))?;
                let mapper = Arc::new(
                    FactTradeMapper::new(client, config.tables.olap_fact.clone()).with_retry(retry),
                );
                analytical = Some(mapper.clone());
                mapper
            },
        };

        info!(backend = %kind, environment = %config.environment, "Trade store initialised");
        Ok(Self {
            kind,
            backend,
            analytical,
        })
    }

    #[cfg(feature = "postgres")]
    fn relational(clients: &BackendClients, retry: RetryConfig) -> StoreResult<Arc<dyn TradeRepository>> {
        let pool = clients
            .pg_pool
            .clone()
            .ok_or_else(|| missing_client(BackendKind::Relational, "PostgreSQL pool"))?;
        Ok(Arc::new(crate::relational::PgTradeMapper::new(pool).with_retry(retry)))
    }

    #[cfg(not(feature = "postgres"))]
    fn relational(_clients: &BackendClients, _retry: RetryConfig) -> StoreResult<Arc<dyn TradeRepository>> {
        Err(StoreError::Config(
            "relational backend requires the `postgres` feature".to_string(),
        ))
    }

    /// Wrap an already built repository
    pub fn with_repository(kind: BackendKind, backend: Arc<dyn TradeRepository>) -> Self {
        Self {
            kind,
            backend,
            analytical: None,
        }
    }

    /// Selected backend
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Name the active repository reports
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Create or fully replace a trade
    pub async fn persist(&self, trade: &TradeAggregate) -> StoreResult<TradeAggregate> {
        let span = info_span!(
            "trade_store.persist",
            backend = self.backend.backend_name(),
            trade_id = %trade.trade_id(),
        );
        async {
            let saved = self.backend.persist(trade).await?;
            info!(periods = saved.periods.len(), "Trade persisted");
            Ok::<_, StoreError>(saved)
        }
        .instrument(span)
        .await
    }

    /// Find a trade by id
    pub async fn find_by_trade_id(&self, id: &TradeId) -> StoreResult<Option<TradeAggregate>> {
        let span = info_span!(
            "trade_store.find",
            backend = self.backend.backend_name(),
            trade_id = %id,
        );
        self.backend.find_by_trade_id(id).instrument(span).await
    }

    /// Trades whose header matches every set predicate
    pub async fn search_by_criteria(&self, criteria: &SearchCriteria) -> StoreResult<Vec<TradeAggregate>> {
        let span = info_span!(
            "trade_store.search",
            backend = self.backend.backend_name(),
            predicates = criteria.predicate_count(),
        );
        self.backend.search_by_criteria(criteria).instrument(span).await
    }

    /// Remove a trade; deleting a missing id succeeds
    pub async fn delete_by_trade_id(&self, id: &TradeId) -> StoreResult<()> {
        let span = info_span!(
            "trade_store.delete",
            backend = self.backend.backend_name(),
            trade_id = %id,
        );
        async {
            self.backend.delete_by_trade_id(id).await?;
            info!("Trade deleted");
            Ok::<_, StoreError>(())
        }
        .instrument(span)
        .await
    }

    /// Period-level query; only analytical backends support it
    pub async fn find_periods(&self, query: &PeriodQuery) -> StoreResult<Vec<PeriodRecord>> {
        let mapper = self.analytical.as_ref().ok_or_else(|| {
            StoreError::Config(format!("backend {} does not support period queries", self.kind))
        })?;
        let span = info_span!(
            "trade_store.find_periods",
            backend = self.backend.backend_name(),
            layout = mapper.layout().as_str(),
        );
        mapper.find_periods(query).instrument(span).await
    }

    /// Validate and persist a trade received at the DTO boundary
    pub async fn persist_dto(&self, dto: TradeDto) -> StoreResult<TradeDto> {
        let trade = TradeAggregate::try_from(dto)?;
        let saved = self.persist(&trade).await?;
        Ok(TradeDto::from(&saved))
    }

    /// Find a trade and render it for the DTO boundary
    pub async fn find_dto_by_trade_id(&self, id: &str) -> StoreResult<Option<TradeDto>> {
        let id = TradeId::new(id)?;
        Ok(self.find_by_trade_id(&id).await?.as_ref().map(TradeDto::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columnar::MemoryColumnarClient;
    use crate::document::MemoryDocumentClient;
    use crate::error::ErrorKind;

    #[test]
    fn test_missing_client_is_config_error() {
        let config = StoreConfig::test().with_backend(BackendKind::OlapFlat);
        let err = TradeStore::from_config(&config, BackendClients::new()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);

        let config = StoreConfig::test().with_backend(BackendKind::Relational);
        let err = TradeStore::from_config(&config, BackendClients::new()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_selects_configured_backend() {
        let clients = BackendClients::new()
            .with_document(Arc::new(MemoryDocumentClient::new()))
            .with_columnar(Arc::new(MemoryColumnarClient::new()));

        for (kind, name) in [
            (BackendKind::Document, "document"),
            (BackendKind::OlapFlat, "olap-flat"),
            (BackendKind::OlapFact, "olap-fact"),
        ] {
            let store = TradeStore::from_config(&StoreConfig::test().with_backend(kind), clients.clone()).unwrap();
            assert_eq!(store.kind(), kind);
            assert_eq!(store.backend_name(), name);
        }
    }

    #[tokio::test]
    async fn test_period_queries_need_analytical_backend() {
        let clients = BackendClients::new().with_document(Arc::new(MemoryDocumentClient::new()));
        let store = TradeStore::from_config(&StoreConfig::test(), clients).unwrap();

        let err = store.find_periods(&PeriodQuery::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_blank_dto_id_is_validation_failure() {
        let clients = BackendClients::new().with_document(Arc::new(MemoryDocumentClient::new()));
        let store = TradeStore::from_config(&StoreConfig::test(), clients).unwrap();

        let err = store.find_dto_by_trade_id("  ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    }
}
