// Handler for the report stage
use crate::config::PipelineSettings;
use crate::data::dataset;
use crate::error::Result;
use crate::report::ForecastReport;

pub fn handle_report(settings: &PipelineSettings) -> Result<ForecastReport> {
    let paths = &settings.paths;
    let records = dataset::load_predictions(&paths.predictions)?;
    let report = ForecastReport::build(&records, settings.report.horizon, None)?;
    report.save(&paths.report)?;
    Ok(report)
}
