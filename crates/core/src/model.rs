use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
    },
    Client,
};
use async_trait::async_trait;
use baodao_common::{ChatMessage, InvocationState, Result, Role, TalkError};
use futures::StreamExt;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One tool call requested by the model, arguments still raw JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

/// The model's complete output for one round: the streamed text plus any
/// tool calls it requested.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    pub content: String,
    pub tool_calls: Vec<ModelToolCall>,
}

/// A chat-completion backend. Text deltas are pushed into `deltas` as they
/// arrive; the accumulated turn is returned once the stream ends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn stream_turn(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        tools: &[ChatCompletionTool],
        deltas: mpsc::Sender<String>,
    ) -> Result<ModelTurn>;
}

#[derive(Debug, Clone)]
pub struct OpenAiModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiModel {
    pub fn new(api_key: &str, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model,
            temperature: 0.3,
        }
    }

    /// Replay stored history in wire shape. Resolved tool invocations become
    /// an assistant tool-call message followed by one tool message per
    /// result, so the model sees prior results without them being re-run.
    fn build_messages(
        system_prompt: &str,
        history: &[ChatMessage],
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(|e| TalkError::Model(e.to_string()))?,
        ));

        for message in history {
            match message.role {
                Role::User => {
                    messages.push(ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(message.content.clone())
                            .build()
                            .map_err(|e| TalkError::Model(e.to_string()))?,
                    ));
                }
                Role::Assistant => {
                    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                    args.content(message.content.clone());
                    if !message.tool_invocations.is_empty() {
                        let calls: Vec<ChatCompletionMessageToolCall> = message
                            .tool_invocations
                            .iter()
                            .map(|inv| ChatCompletionMessageToolCall {
                                id: inv.call_id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: inv.tool_name.clone(),
                                    arguments: inv.arguments.to_string(),
                                },
                            })
                            .collect();
                        args.tool_calls(calls);
                    }
                    messages.push(ChatCompletionRequestMessage::Assistant(
                        args.build().map_err(|e| TalkError::Model(e.to_string()))?,
                    ));
                    for inv in &message.tool_invocations {
                        if inv.state != InvocationState::Result {
                            continue;
                        }
                        let content = inv
                            .result
                            .as_ref()
                            .map(|r| r.to_string())
                            .unwrap_or_else(|| "null".to_string());
                        messages.push(ChatCompletionRequestMessage::Tool(
                            ChatCompletionRequestToolMessageArgs::default()
                                .content(content)
                                .tool_call_id(inv.call_id.clone())
                                .build()
                                .map_err(|e| TalkError::Model(e.to_string()))?,
                        ));
                    }
                }
                // The pinned system prompt is rebuilt each turn; stored
                // system or stray tool rows are not replayed.
                Role::System | Role::Tool => {}
            }
        }
        Ok(messages)
    }
}

#[async_trait]
impl ChatModel for OpenAiModel {
    async fn stream_turn(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        tools: &[ChatCompletionTool],
        deltas: mpsc::Sender<String>,
    ) -> Result<ModelTurn> {
        let messages = Self::build_messages(system_prompt, history)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature);
        if !tools.is_empty() {
            builder.tools(tools.to_vec());
        }
        let request = builder
            .build()
            .map_err(|e| TalkError::Model(e.to_string()))?;

        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| TalkError::Model(e.to_string()))?;

        let mut content = String::new();
        // Tool-call fragments arrive interleaved, keyed by index.
        let mut pending: BTreeMap<_, (String, String, String)> = BTreeMap::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TalkError::Model(e.to_string()))?;
            let Some(choice) = chunk.choices.first() else {
                continue;
            };
            if let Some(text) = &choice.delta.content {
                content.push_str(text);
                if deltas.send(text.clone()).await.is_err() {
                    debug!("Delta receiver dropped; continuing to drain stream");
                }
            }
            if let Some(calls) = &choice.delta.tool_calls {
                for fragment in calls {
                    let entry = pending.entry(fragment.index).or_default();
                    if let Some(id) = &fragment.id {
                        entry.0.push_str(id);
                    }
                    if let Some(function) = &fragment.function {
                        if let Some(name) = &function.name {
                            entry.1.push_str(name);
                        }
                        if let Some(arguments) = &function.arguments {
                            entry.2.push_str(arguments);
                        }
                    }
                }
            }
        }

        let tool_calls = pending
            .into_values()
            .filter(|(id, name, _)| {
                if id.is_empty() || name.is_empty() {
                    warn!("Discarding incomplete tool-call fragment");
                    return false;
                }
                true
            })
            .map(|(call_id, name, arguments)| ModelToolCall {
                call_id,
                name,
                arguments,
            })
            .collect();

        Ok(ModelTurn {
            content,
            tool_calls,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted model: plays back a queue of prepared turns, streaming each
    /// turn's content as a single delta.
    pub struct ScriptedModel {
        turns: Mutex<VecDeque<ModelTurn>>,
    }

    impl ScriptedModel {
        pub fn new(turns: Vec<ModelTurn>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
            }
        }

        pub fn say(content: &str) -> ModelTurn {
            ModelTurn {
                content: content.to_string(),
                tool_calls: Vec::new(),
            }
        }

        pub fn call(call_id: &str, name: &str, arguments: serde_json::Value) -> ModelTurn {
            ModelTurn {
                content: String::new(),
                tool_calls: vec![ModelToolCall {
                    call_id: call_id.to_string(),
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                }],
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn stream_turn(
            &self,
            _system_prompt: &str,
            _history: &[ChatMessage],
            _tools: &[ChatCompletionTool],
            deltas: mpsc::Sender<String>,
        ) -> Result<ModelTurn> {
            let turn = self
                .turns
                .lock()
                .map_err(|_| TalkError::Model("scripted model poisoned".to_string()))?
                .pop_front()
                .ok_or_else(|| TalkError::Model("scripted model exhausted".to_string()))?;
            if !turn.content.is_empty() {
                let _ = deltas.send(turn.content.clone()).await;
            }
            Ok(turn)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baodao_common::ToolInvocation;

    #[test]
    fn test_build_messages_prepends_system_prompt() {
        let history = vec![ChatMessage::user("hello")];
        let messages = OpenAiModel::build_messages("SYSTEM", &history).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(matches!(
            messages[0],
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_resolved_invocations_replay_as_tool_messages() {
        let mut assistant = ChatMessage::assistant("Please select a time.");
        assistant.tool_invocations = vec![ToolInvocation {
            call_id: "call-1".to_string(),
            tool_name: "generateCalendar".to_string(),
            arguments: serde_json::json!({}),
            state: InvocationState::Result,
            result: Some(serde_json::json!({"slots": []})),
        }];
        let history = vec![ChatMessage::user("book a lesson"), assistant];

        let messages = OpenAiModel::build_messages("SYSTEM", &history).unwrap();
        // system + user + assistant(with tool_calls) + tool result
        assert_eq!(messages.len(), 4);
        assert!(matches!(
            messages[3],
            ChatCompletionRequestMessage::Tool(_)
        ));
    }

    #[test]
    fn test_pending_invocations_get_no_tool_message() {
        let mut assistant = ChatMessage::assistant("");
        assistant.tool_invocations = vec![ToolInvocation {
            call_id: "call-1".to_string(),
            tool_name: "getInformation".to_string(),
            arguments: serde_json::json!({"query": "prices"}),
            state: InvocationState::Pending,
            result: None,
        }];
        let history = vec![ChatMessage::user("prices?"), assistant];

        let messages = OpenAiModel::build_messages("SYSTEM", &history).unwrap();
        assert_eq!(messages.len(), 3);
    }
}
