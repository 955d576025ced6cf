//! `tumorboard status`: show the effective configuration.

use tumorboard_config::{AppConfig, StorageBackend};
use tumorboard_core::artifact::template_filename;
use tumorboard_providers::model_supports_temperature;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let storage = match config.storage.backend {
        StorageBackend::Azure => format!(
            "azure ({})",
            config
                .storage
                .account_url
                .clone()
                .or_else(|| config.storage.account_name.clone())
                .unwrap_or_default()
        ),
        StorageBackend::Local => format!("local ({})", config.storage.local_root().display()),
        StorageBackend::Memory => "memory".into(),
    };
    let template = config
        .export
        .templates_dir
        .join(template_filename(config.export.default_template_id));
    let sections = &config.export.sections;
    let enabled: Vec<&str> = [
        ("summary", sections.clinical_summary),
        ("timeline", sections.clinical_timeline),
        ("trials", sections.clinical_trials),
        ("papers", sections.research_papers),
        ("timeline images", sections.timeline_images),
        ("radiology", sections.radiology_images),
        ("pathology", sections.pathology_images),
    ]
    .into_iter()
    .filter_map(|(name, on)| on.then_some(name))
    .collect();

    println!("Tumor Board Assistant Status");
    println!("============================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.default_model);
    println!(
        "  Temperature:  {}",
        if model_supports_temperature(&config.default_model, &config.models.no_temperature) {
            "supported"
        } else {
            "not supported"
        }
    );
    println!("  API key:      {}", if config.api_key_for(&config.default_provider).is_some() { "set" } else { "missing" });
    println!("  Storage:      {storage}");
    println!(
        "  Containers:   {}, {}",
        config.storage.patient_data_container, config.storage.chat_context_container
    );
    println!("  Template:     {}", template.display());
    println!("  Artifacts:    {}", config.export.artifacts_base_url);
    println!("  Sections:     {}", enabled.join(", "));

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file; run `tumorboard onboard` first");
    }
    if !template.exists() {
        println!("  Template missing; exports will fail until it is created");
    }

    Ok(())
}
