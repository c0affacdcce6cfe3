use anyhow::Result;

use crate::config::Config;
use crate::services::ExtractionService;

/// Print one JSON line per tool with its storage root and availability.
pub async fn handle_status_command() -> Result<()> {
    let config = Config::load()?;
    let service = ExtractionService::from_config(&config);

    for status in service.status() {
        println!("{}", serde_json::to_string(&status)?);
    }

    let capture = config.capture_config();
    println!(
        "{}",
        serde_json::json!({
            "capture": {
                "enabled": capture.enabled,
                "maxBodyBytes": capture.max_body_bytes,
            }
        })
    );

    Ok(())
}
