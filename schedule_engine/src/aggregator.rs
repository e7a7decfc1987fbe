use crate::config::{EngineConfig, PumpedStorageConfig};
use crate::directory::PlantDirectory;
use crate::error::ConfigurationError;
use crate::extractor::ScheduleExtractor;
use crate::feed::{FeedPayload, ScheduleRecord};
use crate::models::{round_to, PlantScheduleMatrix};
use crate::resolver::IdentityResolver;
use crate::share::ShareCalculator;
use log::{debug, info};
use serde::Serialize;

/// Per-pass record counts, by outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationSummary {
    pub records: usize,
    pub aggregated: usize,
    pub excluded: usize,
    pub unresolved: usize,
    pub untracked: usize,
    pub no_share: usize,
}

/// Where a resolved plant's slot values are accumulated.
#[derive(Clone, Copy)]
enum Destination<'a> {
    Plant(&'a str),
    PumpedStorage(&'a PumpedStorageConfig),
}

/// Reconciles one feed revision into the entity's per-plant block matrix.
pub struct AggregationEngine {
    resolver: IdentityResolver,
    shares: ShareCalculator,
    extractor: ScheduleExtractor,
    pumped_storage: PumpedStorageConfig,
    precision: u32,
}

impl AggregationEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigurationError> {
        let rule_set = config.active_rule_set()?;
        Ok(Self {
            resolver: IdentityResolver::new(&rule_set)?,
            shares: ShareCalculator::from_config(config),
            extractor: ScheduleExtractor::new(config.short_series_fill),
            pumped_storage: config.pumped_storage.clone(),
            precision: config.precision,
        })
    }

    pub fn aggregate(&self, feed: &FeedPayload, directory: &PlantDirectory) -> PlantScheduleMatrix {
        self.aggregate_with_summary(feed, directory).0
    }

    pub fn aggregate_with_summary(
        &self,
        feed: &FeedPayload,
        directory: &PlantDirectory,
    ) -> (PlantScheduleMatrix, AggregationSummary) {
        let mut matrix = PlantScheduleMatrix::new(directory.tracked_columns());
        let mut summary = AggregationSummary::default();

        for record in feed.records() {
            summary.records += 1;
            self.accumulate(record, directory, &mut matrix, &mut summary);
        }

        info!(
            "Aggregated revision {:?} with rule set {}: {} of {} records ({} excluded, {} unresolved, {} untracked, {} without share)",
            feed.revision(),
            self.resolver.rule_set_version(),
            summary.aggregated,
            summary.records,
            summary.excluded,
            summary.unresolved,
            summary.untracked,
            summary.no_share
        );
        (matrix, summary)
    }

    fn accumulate(
        &self,
        record: &ScheduleRecord,
        directory: &PlantDirectory,
        matrix: &mut PlantScheduleMatrix,
        summary: &mut AggregationSummary,
    ) {
        if self.shares.excludes(&record.buyer, &record.seller) {
            debug!("Skipping excluded counter-party {} -> {}", record.seller, record.buyer);
            summary.excluded += 1;
            return;
        }

        let Some(code) = self.resolver.resolve(&record.seller, directory) else {
            debug!("Unresolved seller {:?}", record.seller);
            summary.unresolved += 1;
            return;
        };

        let Some(destination) = self.destination(&code, matrix) else {
            debug!("Seller {:?} resolved to untracked plant {}", record.seller, code);
            summary.untracked += 1;
            return;
        };

        let share = self.shares.share(&record.buyer, &code, directory);
        if share <= 0.0 {
            debug!("No share of {} for buyer {:?}", code, record.buyer);
            summary.no_share += 1;
            return;
        }

        let quantities = self.extractor.extract(record);
        self.add_series(matrix, destination, &quantities, share);
        summary.aggregated += 1;
    }

    fn add_series(
        &self,
        matrix: &mut PlantScheduleMatrix,
        destination: Destination<'_>,
        quantities: &[f64],
        share: f64,
    ) {
        for (index, quantity) in quantities.iter().enumerate() {
            let value = round_to(quantity * share, self.precision);
            let account = match destination {
                Destination::Plant(plant) => plant,
                Destination::PumpedStorage(psp) if value < 0.0 => psp.pumping_code.as_str(),
                Destination::PumpedStorage(psp) => psp.code.as_str(),
            };
            matrix.add(account, index, value);
        }
    }

    /// The pumped-storage split applies only when both accounts are tracked;
    /// otherwise that code is handled like any other plant.
    fn destination<'a>(
        &'a self,
        code: &'a str,
        matrix: &PlantScheduleMatrix,
    ) -> Option<Destination<'a>> {
        let psp = &self.pumped_storage;
        if code == psp.code && matrix.is_tracked(&psp.code) && matrix.is_tracked(&psp.pumping_code) {
            Some(Destination::PumpedStorage(psp))
        } else if matrix.is_tracked(code) {
            Some(Destination::Plant(code))
        } else {
            None
        }
    }
}
