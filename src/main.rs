use anyhow::{Context, Result};
use log::info;
use needed_items::localization::{detect_language, LocalizationManager};
use needed_items::need_config::{AutofillSettings, ExtractorConfig};
use needed_items::need_types::ReportText;
use needed_items::report_autofill::read_report_text;
use needed_items::text_processing::NeedExtractor;
use std::env;
use std::io::{self, Read};
use std::path::Path;

fn main() -> Result<()> {
    // Load .env first so RUST_LOG and NEEDS_* can come from it
    dotenv::dotenv().ok();
    env_logger::init();

    info!("Starting needs-extract");

    let config = ExtractorConfig::from_env();
    let settings = AutofillSettings::from_env();
    let extractor =
        NeedExtractor::with_config(config).context("Failed to compile extraction rules")?;

    let report = match env::args().nth(1) {
        Some(path) if path != "-" => read_report_text(Path::new(&path))?,
        _ => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read report text from stdin")?;
            ReportText::new(&buffer, "")
        }
    };

    let mut items = extractor.extract(&report.compose())?;
    items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.unit.cmp(&b.unit)));

    let localization = LocalizationManager::new()?;
    let language = detect_language(Some(&settings.locale));
    let status = if items.is_empty() {
        localization.get_message_in_language("cli-no-items", language, None)
    } else {
        let count = items.len().to_string();
        localization.get_message_with_args("cli-items-found", language, &[("count", count.as_str())])
    };
    eprintln!("{}", status);

    println!(
        "{}",
        serde_json::to_string_pretty(&items).context("Failed to serialize items")?
    );

    Ok(())
}
