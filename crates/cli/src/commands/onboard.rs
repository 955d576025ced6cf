//! `tumorboard onboard`: first-time setup.

use std::path::Path;
use tumorboard_config::AppConfig;
use tumorboard_core::artifact::template_filename;

pub async fn run(templates_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Tumor Board Assistant: First-Time Setup");
    println!("=======================================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let defaults = AppConfig::default();
    let templates_dir = templates_dir.unwrap_or(defaults.export.templates_dir.as_path());
    let template_path = templates_dir.join(template_filename(defaults.export.default_template_id));
    if template_path.exists() {
        println!("  Template exists: {}", template_path.display());
    } else {
        std::fs::create_dir_all(templates_dir)?;
        std::fs::write(&template_path, tumorboard_export::default_template()?)?;
        println!("Created default template: {}", template_path.display());
    }

    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created config.toml at: {}", config_path.display());
        println!("\nNext steps:");
        println!("   1. Set AZURE_DEPLOYMENT_ENDPOINT, AZURE_DEPLOYMENT_KEY and AZURE_DEPLOYMENT_NAME");
        println!("      (or edit {})", config_path.display());
        println!("   2. Point [storage] at your patient data (local directory or STORAGE_ACCOUNT_URL)");
        println!("   3. Run: tumorboard chat\n");
    }

    println!("Setup complete.\n");
    Ok(())
}
