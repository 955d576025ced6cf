//! `tumorboard chat`: interactive or single-message conversation.

use std::io::{BufRead, Write};
use tumorboard_config::AppConfig;
use tumorboard_core::context::ChatContext;
use tumorboard_core::message::{Conversation, ConversationId, Message};

use super::runtime::Runtime;

pub async fn run(message: Option<String>, patient: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if config.api_key_for(&config.default_provider).is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    AZURE_DEPLOYMENT_KEY   (Azure OpenAI, with AZURE_DEPLOYMENT_ENDPOINT)");
        eprintln!("    OPENAI_API_KEY         (OpenAI-compatible providers)");
        eprintln!("    TUMORBOARD_API_KEY     (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let runtime = Runtime::build(&config)?;
    let session = runtime.session(&config);
    let mut ctx = ChatContext::new(ConversationId::new());
    let mut conv = Conversation::new();

    if let Some(patient_id) = patient {
        conv.push(Message::user(format!("Load the data for patient {patient_id}.")));
        let response = session.process(&mut conv, &mut ctx).await?;
        println!("{response}");
    }

    if let Some(msg) = message {
        conv.push(Message::user(&msg));
        eprint!("  Thinking...");
        let response = session.process(&mut conv, &mut ctx).await?;
        eprint!("\r              \r");
        println!("{response}");
        return Ok(());
    }

    println!();
    println!("  Tumor Board Assistant");
    println!();
    println!("  Conversation: {}", ctx.conversation_id());
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.default_model);
    println!("  Tools:        get_patient_data, create_patient_timeline, export_to_word_doc");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'clear' to reset the conversation, 'exit' to quit.");
    println!();

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let input = line.trim();
        match input {
            "" => continue,
            "exit" | "quit" => break,
            "clear" => {
                conv.clear();
                println!("  (conversation cleared)");
                continue;
            }
            _ => {}
        }

        conv.push(Message::user(input));
        eprint!("  ...");
        match session.process(&mut conv, &mut ctx).await {
            Ok(response) => {
                eprint!("\r     \r");
                println!();
                for line in response.lines() {
                    println!("  Assistant > {line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    if !ctx.display_blob_urls.is_empty() {
        println!();
        println!("  Documents created in this conversation:");
        for url in &ctx.display_blob_urls {
            println!("    {url}");
        }
    }
    println!();
    Ok(())
}
