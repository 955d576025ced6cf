//! `tumorboard archive`: move a conversation's artifacts aside.

use tumorboard_config::AppConfig;

use super::runtime::Runtime;

pub async fn run(conversation: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let runtime = Runtime::build(&config)?;

    let moved = runtime
        .data_access
        .chat_artifact_accessor
        .archive(&conversation)
        .await
        .map_err(|e| format!("Failed to archive conversation {conversation}: {e}"))?;

    if moved == 0 {
        println!("No artifacts found for conversation {conversation}");
    } else {
        println!("Archived {moved} artifact(s) of conversation {conversation}");
    }
    Ok(())
}
