//! OpenTelemetry GenAI semantic-convention attribute names.
//!
//! Usable as field names in `tracing::info_span!` and friends. Span naming
//! follows `"{operation} {model}"` (e.g., `"chat deepseek-chat"`).

// --- Required attributes ---

/// The operation being performed (e.g., "chat", "summarize_context").
pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

/// The backend identifier (e.g., "deepseek").
pub const GEN_AI_PROVIDER_NAME: &str = "gen_ai.provider.name";

// --- Recommended attributes ---

pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";
pub const GEN_AI_REQUEST_TEMPERATURE: &str = "gen_ai.request.temperature";
pub const GEN_AI_REQUEST_MAX_TOKENS: &str = "gen_ai.request.max_tokens";
pub const GEN_AI_USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";
pub const GEN_AI_USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";

/// The finish reasons for the response (e.g., "end_turn", "tool_use").
pub const GEN_AI_RESPONSE_FINISH_REASONS: &str = "gen_ai.response.finish_reasons";

// --- Switchyard-specific attributes ---

/// Whether the response was served from the semantic cache.
pub const SWITCHYARD_CACHE_HIT: &str = "switchyard.cache.hit";

/// Number of backend attempts a dispatch took.
pub const SWITCHYARD_DISPATCH_ATTEMPTS: &str = "switchyard.dispatch.attempts";

// --- Operation name values ---

pub const OP_CHAT: &str = "chat";
pub const OP_CHAT_STREAM: &str = "chat_stream";

/// Context summarization when the conversation overflows.
pub const OP_SUMMARIZE_CONTEXT: &str = "summarize_context";
