pub mod metadata_extractor;
pub mod metadata_row;
pub mod navigation;
pub mod numeric;
pub mod output_manager;

pub use metadata_extractor::{
    BeamwidthSource, EnvironmentLayout, ExtractionOutcome, ExtractionProgress,
    ExtractionSettings, ExtractionTrace, FileExtraction, MetadataExtractor,
};
pub use metadata_row::{FieldFormat, MetadataRow, COLUMNS};
pub use navigation::NavigationSummary;
pub use output_manager::{OutputManager, RunReport, RunSummary};
