// Handler for the preprocess stage
use crate::config::PipelineSettings;
use crate::data::csv_parser::PriceCsvParser;
use crate::data::dataset;
use crate::error::Result;
use crate::indicators::IndicatorEngine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessSummary {
    pub input_rows: usize,
    pub retained_rows: usize,
}

pub fn handle_preprocess(settings: &PipelineSettings) -> Result<PreprocessSummary> {
    let paths = &settings.paths;
    let table = PriceCsvParser::load_raw_table(&paths.raw_data)?;
    let records = IndicatorEngine::new(&settings.indicators).process(&table)?;
    if records.is_empty() {
        tracing::warn!(
            rows = table.len(),
            "No row has every indicator defined; the processed dataset is empty"
        );
    }
    dataset::write_processed(&paths.processed_data, &records)?;
    Ok(PreprocessSummary {
        input_rows: table.len(),
        retained_rows: records.len(),
    })
}
