pub mod aggregator;
pub mod config;
pub mod directory;
pub mod error;
pub mod extractor;
pub mod feed;
pub mod models;
pub mod resolver;
pub mod revision;
pub mod share;
pub mod table;

pub use aggregator::{AggregationEngine, AggregationSummary};
pub use config::{EngineConfig, PumpedStorageConfig, ShortSeriesFill};
pub use directory::{normalize_key, PlantDirectory};
pub use error::{BaselineError, ConfigurationError, FeedError};
pub use extractor::ScheduleExtractor;
pub use feed::{FeedPayload, ScheduleRecord};
pub use models::{Alert, PlantScheduleMatrix, BLOCKS_PER_DAY};
pub use resolver::{FallbackRule, IdentityResolver, RuleSet, RuleTarget, UnitMarker};
pub use revision::{
    BaselineStore, CsvBaselineStore, CycleOutcome, MemoryBaselineStore, RevisionTracker,
    StoredBaseline, TrackerState,
};
pub use share::ShareCalculator;
pub use table::DisplayFormat;
