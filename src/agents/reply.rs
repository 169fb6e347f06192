//! Reply Agent
//!
//! Answers user questions. Retrieval runs first: the question is embedded and
//! matched against the vector store, and any hits are placed in the prompt as
//! numbered excerpts. Without hits the agent either falls back to a plain
//! assistant chat (`/api/chat`) or reports that nothing relevant was found
//! (`/api/query`).

use chrono::Utc;
use tracing::{info, warn};

use crate::embeddings::ScoredChunk;
use crate::models::{AppState, ChatResponse, QueryRequest, QueryResponse, SourceReference};
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};

pub const SYSTEM_MESSAGE: &str = r#"You are an advanced EV Battery & Vehicle Assistant specialized in answering queries about electric vehicles (EVs) in India, including brands like Tata, Mahindra, MG, Hyundai, Kia, BYD, and others.

Your purpose is to provide accurate, clear, and useful information based only on official EV manuals, technical documentation, verified specifications, and authentic sources.

Guidelines:
- Cover all aspects of EVs in India: battery (SoH, RUL, charging cycles, warnings, troubleshooting), vehicle performance, charging infrastructure, warranty, and usage best practices.
- Always use simple, human-like language and avoid unnecessary jargon.
- If a query is vague, interpret it intelligently and provide the most relevant and helpful explanation instead of rejecting it.
- Stay factual and grounded in available manuals, datasets, or trusted references. Never invent details.
- Structure answers so they are easy to follow, with step-by-step explanations when helpful.

Response Format:
Answer: [Clear and concise explanation]
Reference: [Mention the manual/section/source if available]"#;

pub const NO_RELEVANT_INFORMATION: &str =
    "I couldn't find any relevant information in the indexed documents to answer this question.";

const SNIPPET_CHARS: usize = 200;

/// Reply mode - determines prompt shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplyMode {
    /// Answer from retrieved document excerpts
    Grounded,
    /// Plain assistant chat, no document context
    Chat,
}

pub struct ReplyAgent;

impl ReplyAgent {
    /// Embed `question` and return the best matching chunks. An empty store
    /// short-circuits without calling the embedding provider.
    pub async fn retrieve(
        state: &AppState,
        question: &str,
        top_k: usize,
        threshold: f64,
    ) -> AppResult<Vec<ScoredChunk>> {
        if state.store.get_stats().chunks_count == 0 {
            return Ok(Vec::new());
        }

        let embedding = state.embedder.embed(question).await?;
        let hits = state.store.search_similar(&embedding, top_k, threshold)?;

        info!(
            hits = hits.len(),
            top_k,
            threshold,
            best = hits.first().map(|h| h.similarity),
            "Retrieval complete"
        );
        Ok(hits)
    }

    pub fn classify_mode(context: &[ScoredChunk]) -> ReplyMode {
        if context.is_empty() {
            ReplyMode::Chat
        } else {
            ReplyMode::Grounded
        }
    }

    pub fn build_messages(question: &str, context: &[ScoredChunk], mode: ReplyMode) -> Vec<LLMMessage> {
        let user = match mode {
            ReplyMode::Chat => question.to_string(),
            ReplyMode::Grounded => Self::create_grounded_prompt(question, context),
        };
        vec![LLMMessage::system(SYSTEM_MESSAGE), LLMMessage::user(user)]
    }

    fn create_grounded_prompt(question: &str, context: &[ScoredChunk]) -> String {
        let excerpts = context
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                let title = Self::title_of(hit).unwrap_or_else(|| hit.chunk.document_id.clone());
                format!(
                    "[{}] {} (similarity {:.2})\n{}",
                    i + 1,
                    title,
                    hit.similarity,
                    hit.chunk.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"Answer the question using the document excerpts below.

DOCUMENT EXCERPTS:
{excerpts}

QUESTION: {question}

GUIDELINES:
- Base the answer on the excerpts; cite them by number, e.g. [1]
- If the excerpts do not contain the answer, say so plainly"#
        )
    }

    fn title_of(hit: &ScoredChunk) -> Option<String> {
        hit.document.as_ref().and_then(|d| d.metadata.title.clone())
    }

    pub fn sources(context: &[ScoredChunk]) -> Vec<SourceReference> {
        context
            .iter()
            .map(|hit| SourceReference {
                document_id: hit.chunk.document_id.clone(),
                chunk_id: hit.chunk.id.clone(),
                title: Self::title_of(hit),
                similarity: hit.similarity,
                snippet: snippet(&hit.chunk.content),
            })
            .collect()
    }

    async fn complete(state: &AppState, messages: Vec<LLMMessage>) -> AppResult<(String, String)> {
        let model = state.llm.default_model().to_string();
        let request = LLMRequest {
            model: model.clone(),
            messages,
            max_tokens: Some(state.config.llm.max_tokens),
            temperature: Some(state.config.llm.temperature),
        };

        let response = state.llm.create_chat_completion(&request).await?;
        info!(
            provider = state.llm.name(),
            response_len = response.content.len(),
            total_tokens = response.usage.total_tokens,
            "Generated reply"
        );
        Ok((response.content, model))
    }

    /// `/api/chat`: assistant answer, grounded when the store has matches
    pub async fn chat(state: &AppState, message: &str) -> AppResult<ChatResponse> {
        let question = message.trim();
        if question.is_empty() {
            return Err(AppError::InvalidRequest(
                "Please provide a valid question about EVs".to_string(),
            ));
        }

        let retrieval = &state.config.retrieval;
        let context = match Self::retrieve(state, question, retrieval.top_k, retrieval.threshold).await {
            Ok(context) => context,
            Err(e) => {
                warn!(error = %e, "Retrieval failed, answering without documents");
                Vec::new()
            }
        };

        let mode = Self::classify_mode(&context);
        let (answer, model) = Self::complete(state, Self::build_messages(question, &context, mode)).await?;

        Ok(ChatResponse {
            question: message.to_string(),
            answer,
            timestamp: Utc::now().to_rfc3339(),
            model,
            sources: Self::sources(&context),
        })
    }

    /// `/api/query`: answer strictly from retrieved chunks
    pub async fn answer_query(state: &AppState, request: QueryRequest) -> AppResult<QueryResponse> {
        request.check()?;

        let top_k = request.top_k.unwrap_or(state.config.retrieval.top_k);
        let threshold = request.threshold.unwrap_or(state.config.retrieval.threshold);
        let question = request.question.trim();

        let context = Self::retrieve(state, question, top_k, threshold).await?;
        if context.is_empty() {
            return Ok(QueryResponse {
                question: request.question.clone(),
                answer: NO_RELEVANT_INFORMATION.to_string(),
                model: state.llm.default_model().to_string(),
                sources: Vec::new(),
            });
        }

        let messages = Self::build_messages(question, &context, ReplyMode::Grounded);
        let (answer, model) = Self::complete(state, messages).await?;

        Ok(QueryResponse {
            question: request.question.clone(),
            answer,
            model,
            sources: Self::sources(&context),
        })
    }
}

fn snippet(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(SNIPPET_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}
