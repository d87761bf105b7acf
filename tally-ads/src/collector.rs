use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde_json::Value;

use tally_core::driver;
use tally_core::normalize::{array_at, str_at};
use tally_core::table::{archive_to_frame, rows_to_frame, sum_by, union_frames};
use tally_core::{
    CollectorConfig, DATE_COLUMN, DimensionDescriptor, MetricDescriptor, TallyError, ValueKind,
    drain_pages,
};

use crate::adapter::AdsApi;
use crate::model::{Account, Entity, EntityKind, Placement};
use crate::source::EntityStatsSource;

/// Column holding the account display name.
pub const ACCOUNT_COLUMN: &str = "AccountName";
/// Column holding the entity-kind label.
pub const TYPE_COLUMN: &str = "AnalyticsType";
/// Column holding the placement.
pub const PLACEMENT_COLUMN: &str = "Placement";

/// Tables produced by one ads run.
#[derive(Debug, Clone)]
pub struct AdsTables {
    /// One row per (date, account, kind, placement, entity).
    pub detail: DataFrame,
    /// `detail` summed over placements.
    pub summary: DataFrame,
    /// Raw stats pages `{Date, AccountName, AnalyticsType, Placement, JsonString}`.
    pub archive: Option<DataFrame>,
}

impl AdsTables {
    /// Tables in sink order: summary, detail, then the archive if present.
    #[must_use]
    pub fn into_frames(self) -> Vec<DataFrame> {
        [self.summary, self.detail]
            .into_iter()
            .chain(self.archive)
            .collect()
    }
}

/// Walks accounts and their entities and collects daily stats.
///
/// Accounts are listed once per run and narrowed to the configured target (id
/// or name) when one is set. Each entity kind is listed per account, and one
/// driver runs per (account, kind, placement) over the entities of that kind.
pub struct AdsCollector {
    api: Arc<dyn AdsApi>,
    kinds: Vec<EntityKind>,
    placements: Vec<Placement>,
    listing_delay: Duration,
}

impl AdsCollector {
    /// Collector over every entity kind and placement.
    #[must_use]
    pub fn new(api: Arc<dyn AdsApi>) -> Self {
        Self {
            api,
            kinds: EntityKind::ALL.to_vec(),
            placements: Placement::ALL.to_vec(),
            listing_delay: Duration::from_secs(3),
        }
    }

    /// Restrict collection to `kinds`.
    #[must_use]
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Restrict collection to `placements`.
    #[must_use]
    pub fn with_placements(mut self, placements: impl IntoIterator<Item = Placement>) -> Self {
        self.placements = placements.into_iter().collect();
        self
    }

    /// Delay after each account or entity listing call.
    #[must_use]
    pub fn with_listing_delay(mut self, delay: Duration) -> Self {
        self.listing_delay = delay;
        self
    }

    /// Dimensions emitted by the stats source, in column order.
    #[must_use]
    pub fn default_dimensions() -> Vec<DimensionDescriptor> {
        vec![
            DimensionDescriptor::new("account", ACCOUNT_COLUMN),
            DimensionDescriptor::new("entity", TYPE_COLUMN),
            DimensionDescriptor::new("placement", PLACEMENT_COLUMN),
            DimensionDescriptor::new("id", "EntityId"),
            DimensionDescriptor::new("name", "EntityName"),
        ]
    }

    /// Engagement metrics; absent series count as zero.
    #[must_use]
    pub fn default_metrics() -> Vec<MetricDescriptor> {
        [
            ("impressions", "Impressions"),
            ("clicks", "Clicks"),
            ("engagements", "Engagements"),
        ]
        .into_iter()
        .map(|(expr, col)| MetricDescriptor::new(expr, col, ValueKind::Int).missing_as_zero(true))
        .collect()
    }

    /// Scheduled-run configuration over `[start, end)`.
    #[must_use]
    pub fn default_config(start: DateTime<Utc>, end: DateTime<Utc>) -> CollectorConfig {
        CollectorConfig::new(start, end)
            .with_dimensions(Self::default_dimensions())
            .with_metrics(Self::default_metrics())
            .with_inter_call_delay(Duration::from_secs(4))
            .with_archive_raw(true)
    }

    fn records(raw: &Value) -> (Vec<Value>, Option<String>) {
        let next = str_at(raw, &["next_cursor"]).map(str::to_string);
        (array_at(raw, &["data"]).to_vec(), next)
    }

    async fn accounts(&self, config: &CollectorConfig) -> Result<Vec<Account>, TallyError> {
        let records = drain_pages("ads accounts", self.listing_delay, &config.retry, |cursor| {
            let api = Arc::clone(&self.api);
            async move {
                let raw = api.accounts(cursor.as_deref()).await?;
                Ok::<_, TallyError>(Self::records(&raw))
            }
        })
        .await?;
        let target = config.target_identifier.as_str();
        let mut out = Vec::with_capacity(records.len());
        for record in &records {
            let account = Account::from_json(record)?;
            if target.is_empty() || account.id == target || account.name == target {
                out.push(account);
            }
        }
        Ok(out)
    }

    async fn entities(
        &self,
        config: &CollectorConfig,
        account: &Account,
        kind: EntityKind,
    ) -> Result<Vec<Entity>, TallyError> {
        let label = format!("ads {} listing", kind.endpoint());
        let records = drain_pages(&label, self.listing_delay, &config.retry, |cursor| {
            let api = Arc::clone(&self.api);
            let account_id = account.id.clone();
            async move {
                let raw = api.entities(&account_id, kind, cursor.as_deref()).await?;
                Ok::<_, TallyError>(Self::records(&raw))
            }
        })
        .await?;
        records.iter().map(Entity::from_json).collect()
    }

    /// List accounts and entities, then run every (account, kind, placement).
    ///
    /// # Errors
    /// Returns the first validation, listing, fetch, or assembly error.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tally::ads::collect",
            skip(self, config),
            fields(target = %config.target_identifier, start = %config.start),
        )
    )]
    pub async fn collect(&self, config: &CollectorConfig) -> Result<AdsTables, TallyError> {
        config.validate()?;
        let schema = config.schema();
        let mut details = Vec::new();
        let mut archives = Vec::new();

        for account in self.accounts(config).await? {
            for &kind in &self.kinds {
                let entities = self.entities(config, &account, kind).await?;
                #[cfg(feature = "tracing")]
                tracing::debug!(account = %account.id, %kind, entities = entities.len(), "entities listed");
                if entities.is_empty() {
                    continue;
                }
                for &placement in &self.placements {
                    let source = EntityStatsSource::new(
                        Arc::clone(&self.api),
                        account.clone(),
                        kind,
                        placement,
                        entities.clone(),
                    );
                    let set = driver::run(&source, config).await?;
                    if config.archive_raw {
                        let extra = [
                            (ACCOUNT_COLUMN, account.name.as_str()),
                            (TYPE_COLUMN, kind.label()),
                            (PLACEMENT_COLUMN, placement.as_str()),
                        ];
                        archives.push(archive_to_frame(&set.archive, &extra)?);
                    }
                    details.push(rows_to_frame(&set, &[])?);
                }
            }
        }

        let detail = union_frames(details)?;
        let summary = if detail.width() == 0 {
            detail.clone()
        } else {
            let keys: Vec<String> = std::iter::once(DATE_COLUMN.to_string())
                .chain(
                    schema
                        .dimensions
                        .iter()
                        .filter(|d| d.as_str() != PLACEMENT_COLUMN)
                        .cloned(),
                )
                .collect();
            let values: Vec<String> = schema.metrics.iter().map(|(name, _)| name.clone()).collect();
            sum_by(&detail, &keys, &values)?
        };
        let archive = if config.archive_raw {
            Some(union_frames(archives)?)
        } else {
            None
        };
        #[cfg(feature = "tracing")]
        tracing::info!(detail = detail.height(), summary = summary.height(), "ads collected");
        Ok(AdsTables {
            detail,
            summary,
            archive,
        })
    }
}
