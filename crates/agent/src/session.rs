//! The chat session: forwards the conversation to the model and runs the
//! tools it asks for until it answers in plain text.

use std::sync::Arc;
use tracing::{debug, info, warn};
use tumorboard_core::context::ChatContext;
use tumorboard_core::message::{Conversation, Message, Role};
use tumorboard_core::provider::{Provider, ProviderRequest, ToolDefinition};
use tumorboard_core::tool::ToolCall;
use tumorboard_data::{ChatContextAccessor, CHAT_HISTORY_FILE};
use tumorboard_tools::ToolDispatcher;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant that helps clinicians prepare \
tumor board reviews. Use get_patient_data to select a patient and read their records, \
create_patient_timeline to build the patient's clinical timeline, and export_to_word_doc to \
produce the tumor board review document. Answer concisely and never invent clinical facts.";

const MAX_ITERATIONS_REPLY: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

pub struct ChatSession {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    dispatcher: Arc<ToolDispatcher>,
    tool_definitions: Vec<ToolDefinition>,
    system_prompt: String,
    max_iterations: usize,
    transcripts: Option<ChatContextAccessor>,
}

impl ChatSession {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, dispatcher: Arc<ToolDispatcher>) -> Self {
        let tool_definitions = dispatcher.definitions();
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            dispatcher,
            tool_definitions,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 10,
            transcripts: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// `None` leaves the field off the request.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Persist the transcript after every turn.
    pub fn with_transcripts(mut self, accessor: ChatContextAccessor) -> Self {
        self.transcripts = Some(accessor);
        self
    }

    fn ensure_system_prompt(&self, conversation: &mut Conversation) {
        match conversation.messages.first() {
            Some(first) if first.role == Role::System => {
                conversation.messages[0] = Message::system(&self.system_prompt);
            }
            _ => conversation.messages.insert(0, Message::system(&self.system_prompt)),
        }
    }

    /// Run one user turn. The caller has already pushed the user's message.
    pub async fn process(
        &self,
        conversation: &mut Conversation,
        ctx: &mut ChatContext,
    ) -> Result<String, tumorboard_core::Error> {
        info!(
            conversation_id = %ctx.conversation_id(),
            messages = conversation.messages.len(),
            "Processing conversation"
        );
        self.ensure_system_prompt(conversation);

        let reply = self.run(conversation, ctx).await;
        self.save_transcript(conversation, ctx).await;
        reply
    }

    async fn run(
        &self,
        conversation: &mut Conversation,
        ctx: &mut ChatContext,
    ) -> Result<String, tumorboard_core::Error> {
        for iteration in 1..=self.max_iterations {
            debug!(conversation_id = %ctx.conversation_id(), iteration, "Session iteration");

            let mut request = ProviderRequest::new(&self.model, conversation.messages.clone());
            request.temperature = self.temperature;
            request.max_tokens = self.max_tokens;
            request.tools = self.tool_definitions.clone();

            let response = self.provider.complete(request).await?;
            if let Some(usage) = &response.usage {
                debug!(model = %response.model, tokens = usage.total_tokens, "Model usage");
            }

            if response.message.tool_calls.is_empty() {
                let text = response.message.content.clone();
                conversation.push(response.message);
                return Ok(text);
            }

            let tool_calls = response.message.tool_calls.clone();
            conversation.push(response.message);

            for tc in &tool_calls {
                let arguments = match serde_json::from_str::<serde_json::Value>(&tc.arguments) {
                    Ok(arguments) => arguments,
                    Err(e) if tc.arguments.trim().is_empty() => {
                        debug!(tool = %tc.name, error = %e, "Empty tool arguments");
                        serde_json::Value::Object(Default::default())
                    }
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool arguments are not valid JSON");
                        conversation.push(Message::tool_result(
                            &tc.id,
                            format!("Error: arguments are not valid JSON: {e}"),
                        ));
                        continue;
                    }
                };
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                };

                match self.dispatcher.execute(&call, ctx).await {
                    Ok(result) => conversation.push(Message::tool_result(&tc.id, result.output)),
                    Err(e) => conversation.push(Message::tool_result(&tc.id, format!("Error: {e}"))),
                }
            }
        }

        warn!(
            conversation_id = %ctx.conversation_id(),
            max_iterations = self.max_iterations,
            "Max tool iterations reached"
        );
        Ok(MAX_ITERATIONS_REPLY.into())
    }

    async fn save_transcript(&self, conversation: &Conversation, ctx: &ChatContext) {
        let Some(accessor) = &self.transcripts else {
            return;
        };
        let data = match serde_json::to_vec(&conversation.messages) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Failed to serialize transcript");
                return;
            }
        };
        if let Err(e) = accessor
            .write(ctx.conversation_id().as_str(), CHAT_HISTORY_FILE, data)
            .await
        {
            warn!(conversation_id = %ctx.conversation_id(), error = %e, "Failed to save transcript");
        }
    }
}
