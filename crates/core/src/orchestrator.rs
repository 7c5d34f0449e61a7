use crate::language::LanguageDetector;
use crate::model::{ChatModel, ModelToolCall};
use crate::prompt::build_system_prompt;
use crate::store::TalkStore;
use crate::teachers::{list_teachers, TEACHER_COUNT};
use crate::tools::{StudentProfile, ToolContext, ToolName, ToolRegistry};
use baodao_common::{
    ChatMessage, InvocationState, Language, Teacher, ToolInvocation,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Upper bound on model/tool rounds within one turn. The booking flow never
/// legitimately needs more than a couple.
const MAX_ROUNDS: usize = 4;

const EVENT_BUFFER: usize = 64;

/// One conversational turn from the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub selected_time: Option<String>,
}

/// Events streamed back to the client, one JSON object per line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEvent {
    #[serde(rename_all = "camelCase")]
    TextDelta { text: String },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolResult {
        call_id: String,
        tool_name: String,
        result: Value,
    },
    Done,
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

/// Outcome of one `handle` call: either the selected-time shortcut's teacher
/// list, or a live event stream.
pub enum ChatOutcome {
    Teachers {
        language: Language,
        teachers: Vec<Teacher>,
    },
    Stream(mpsc::Receiver<ChatEvent>),
}

/// Server-side booking progression. The system prompt asks the model to
/// respect this order; the orchestrator enforces it regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BookingStep {
    AwaitingLessonType,
    AwaitingTime,
    AwaitingTeacher,
    AwaitingPayment,
    Confirmed,
}

fn is_tool_allowed(step: BookingStep, tool: ToolName) -> bool {
    match tool {
        // FAQ lookups and calendar display are permitted at any point.
        ToolName::GetInformation | ToolName::GenerateCalendar => true,
        // The selected-time shortcut serves the teacher carousel without a
        // registry call, so teacher selection only requires that a calendar
        // round has happened.
        ToolName::CheckTeacherAvailability | ToolName::SelectTeacher => {
            step >= BookingStep::AwaitingTime
        }
        ToolName::CreateBooking => step >= BookingStep::AwaitingTeacher,
    }
}

fn payload_succeeded(payload: &Value) -> bool {
    payload.get("status").map_or(true, |s| s != "failed")
}

fn advance_step(step: BookingStep, tool: ToolName, payload: &Value) -> BookingStep {
    if !payload_succeeded(payload) {
        return step;
    }
    let reached = match tool {
        ToolName::GetInformation => step,
        ToolName::GenerateCalendar => BookingStep::AwaitingTime,
        ToolName::CheckTeacherAvailability | ToolName::SelectTeacher => {
            BookingStep::AwaitingTeacher
        }
        ToolName::CreateBooking => {
            if payload.get("paymentRequired") == Some(&Value::Bool(true)) {
                BookingStep::AwaitingPayment
            } else {
                BookingStep::Confirmed
            }
        }
    };
    step.max(reached)
}

/// Replay the stored history to find how far the booking has progressed.
fn derive_step(messages: &[ChatMessage]) -> BookingStep {
    let mut step = BookingStep::AwaitingLessonType;
    for message in messages {
        for invocation in &message.tool_invocations {
            if invocation.state != InvocationState::Result {
                continue;
            }
            let Ok(tool) = ToolName::from_str(&invocation.tool_name) else {
                continue;
            };
            let payload = invocation.result.clone().unwrap_or(Value::Null);
            step = advance_step(step, tool, &payload);
        }
    }
    step
}

/// Drives one conversational turn: language pinning, the model/tool loop,
/// step enforcement, and best-effort transcript persistence.
pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
    detector: LanguageDetector,
    store: TalkStore,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        registry: Arc<ToolRegistry>,
        detector: LanguageDetector,
        store: TalkStore,
    ) -> Self {
        Self {
            model,
            registry,
            detector,
            store,
        }
    }

    pub async fn handle(&self, request: ChatRequest, student: StudentProfile) -> ChatOutcome {
        let language = self.detector.pinned_language(&request.messages);

        // Once the client has a selected time it only needs the teacher
        // list; no model round-trip is spent on it.
        if request.selected_time.is_some() {
            debug!("Selected-time shortcut for conversation {}", request.id);
            return ChatOutcome::Teachers {
                language,
                teachers: list_teachers(TEACHER_COUNT, language),
            };
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let model = self.model.clone();
        let registry = self.registry.clone();
        let store = self.store.clone();

        tokio::spawn(async move {
            run_turn(model, registry, store, request, student, language, tx).await;
        });

        ChatOutcome::Stream(rx)
    }
}

async fn run_turn(
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
    store: TalkStore,
    request: ChatRequest,
    student: StudentProfile,
    language: Language,
    tx: mpsc::Sender<ChatEvent>,
) {
    let system_prompt = build_system_prompt(language);
    let tools = registry.definitions();
    let ctx = ToolContext {
        language,
        student: student.clone(),
    };

    let mut history: Vec<ChatMessage> = request
        .messages
        .into_iter()
        .filter(|m| !m.content.is_empty() || !m.tool_invocations.is_empty())
        .collect();

    let mut step = derive_step(&history);
    // Results already present in the history are never executed again.
    let mut resolved: HashMap<String, Value> = history
        .iter()
        .flat_map(|m| &m.tool_invocations)
        .filter(|inv| inv.state == InvocationState::Result)
        .filter_map(|inv| Some((inv.call_id.clone(), inv.result.clone()?)))
        .collect();

    for round in 0..MAX_ROUNDS {
        let (delta_tx, mut delta_rx) = mpsc::channel::<String>(EVENT_BUFFER);
        let forward_tx = tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(text) = delta_rx.recv().await {
                if forward_tx.send(ChatEvent::TextDelta { text }).await.is_err() {
                    break;
                }
            }
        });

        let turn = model
            .stream_turn(&system_prompt, &history, &tools, delta_tx)
            .await;
        let _ = forwarder.await;

        let turn = match turn {
            Ok(turn) => turn,
            Err(e) => {
                error!("Model turn failed: {}", e);
                let _ = tx
                    .send(ChatEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                break;
            }
        };

        if turn.tool_calls.is_empty() {
            history.push(ChatMessage::assistant(turn.content));
            break;
        }

        let mut invocations = Vec::with_capacity(turn.tool_calls.len());
        for call in &turn.tool_calls {
            let ModelToolCall {
                call_id,
                name,
                arguments,
            } = call;
            let parsed_args: Value =
                serde_json::from_str(arguments).unwrap_or(Value::String(arguments.clone()));

            let _ = tx
                .send(ChatEvent::ToolCall {
                    call_id: call_id.clone(),
                    tool_name: name.clone(),
                    arguments: parsed_args.clone(),
                })
                .await;

            let result = if let Some(previous) = resolved.get(call_id) {
                debug!("Reusing resolved result for call {}", call_id);
                previous.clone()
            } else {
                let allowed = ToolName::from_str(name)
                    .map(|tool| is_tool_allowed(step, tool))
                    .unwrap_or(false);
                if allowed {
                    registry.execute(name, arguments, &ctx).await
                } else {
                    warn!("Rejecting out-of-order tool call {} at {:?}", name, step);
                    json!({
                        "status": "failed",
                        "error": format!("{} is not available at this step of the booking flow", name),
                    })
                }
            };

            if let Ok(tool) = ToolName::from_str(name) {
                step = advance_step(step, tool, &result);
            }
            resolved.insert(call_id.clone(), result.clone());

            let _ = tx
                .send(ChatEvent::ToolResult {
                    call_id: call_id.clone(),
                    tool_name: name.clone(),
                    result: result.clone(),
                })
                .await;

            invocations.push(ToolInvocation {
                call_id: call_id.clone(),
                tool_name: name.clone(),
                arguments: parsed_args,
                state: InvocationState::Result,
                result: Some(result),
            });
        }

        let mut assistant = ChatMessage::assistant(turn.content);
        assistant.tool_invocations = invocations;
        history.push(assistant);

        if round + 1 == MAX_ROUNDS {
            warn!("Conversation {} hit the round limit", request.id);
        }
    }

    // Transcript persistence is a best-effort chat log. It runs before the
    // terminal event so a client that has seen `done` can rely on the
    // transcript being stored (or the failure already logged).
    match serde_json::to_value(&history) {
        Ok(transcript) => {
            if let Err(e) = store
                .save_chat(&request.id, student.id, language.as_str(), &transcript)
                .await
            {
                warn!("Failed to save transcript {}: {}", request.id, e);
            } else {
                info!("Saved transcript {} ({} messages)", request.id, history.len());
            }
        }
        Err(e) => warn!("Transcript {} not serializable: {}", request.id, e),
    }

    let _ = tx.send(ChatEvent::Done).await;
}
