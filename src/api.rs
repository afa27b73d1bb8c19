//! LLM analysis of fetched Spanish content.
//!
//! This module talks to an OpenAI-compatible chat-completions endpoint and
//! turns its plain-text answers into structured values:
//!
//! - [`SpanishAnalyzer::analyze_difficulty`]: grade a text on the CEFR scale
//! - [`SpanishAnalyzer::analyze_article_grammar`]: extract grammar points
//!   from an article, pitched at the phase's level
//! - [`SpanishAnalyzer::analyze_podcast_expressions`]: extract colloquial
//!   expressions actually present in an episode's text
//!
//! # Failure semantics
//!
//! Every call is single-shot: a transport failure, a non-2xx status, or a
//! response that does not match the expected format is an
//! [`AnalysisError`] and aborts the content item's run. Nothing is retried;
//! recovery is the next scheduled invocation.

use crate::error::AnalysisError;
use crate::models::{Difficulty, GrammarPoint};
use crate::utils::{cap_chars, truncate_for_log};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const MODEL: &str = "gpt-4o-mini";
const SYSTEM_PROMPT: &str = "You are an expert Spanish language teacher and linguist \
specializing in analyzing Spanish content for language learners.";

/// Sentinel the model is instructed to return for formal-register text.
const NO_EXPRESSIONS_SENTINEL: &str = "NO_COLLOQUIAL_EXPRESSIONS_FOUND";

#[derive(Serialize)]
struct CompletionRequest {
    model: &'static str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Client for the chat-completions endpoint.
pub struct SpanishAnalyzer {
    client: Client,
    api_key: String,
    completions_url: String,
}

impl SpanishAnalyzer {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("HTTP client construction cannot fail with static options");
        Self {
            client,
            api_key,
            completions_url: COMPLETIONS_URL.to_string(),
        }
    }

    /// Send one prompt and return the assistant's text.
    #[instrument(level = "info", skip_all, fields(max_tokens))]
    async fn complete(&self, prompt: String, max_tokens: u32) -> Result<String, AnalysisError> {
        let request = CompletionRequest {
            model: MODEL,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens,
            temperature: 0.3,
            top_p: 0.9,
        };

        let t0 = Instant::now();
        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %truncate_for_log(&body, 300), "Completion call failed");
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }

        let parsed = response.json::<CompletionResponse>().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AnalysisError::Unparseable {
                reason: "completion had no choices".to_string(),
            })?;

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            bytes = content.len(),
            "Completion call succeeded"
        );
        Ok(content)
    }

    /// Grade a Spanish text on the CEFR scale.
    ///
    /// The model is asked for a bare tag; the response is scanned for the
    /// first valid one.
    #[instrument(level = "info", skip_all)]
    pub async fn analyze_difficulty(&self, content: &str) -> Result<Difficulty, AnalysisError> {
        let content = cap_chars(content, 1000);
        let prompt = format!(
            "Analyze this Spanish text and determine its CEFR difficulty level \
(A1, A2, B1, B1+, B2, B2+, C1, C2).\n\n\
Consider:\n\
- Vocabulary complexity\n\
- Grammar structures used\n\
- Sentence length and complexity\n\
- Abstract vs concrete concepts\n\
- Technical vs everyday language\n\n\
Text:\n{content}\n\n\
Respond with only the CEFR level (e.g., \"B2\" or \"B2+\" or \"C1\"), no additional text."
        );

        let response = self.complete(prompt, 50).await?;
        Difficulty::scan(&response).ok_or_else(|| AnalysisError::Unparseable {
            reason: format!("no CEFR tag in {:?}", truncate_for_log(&response, 80)),
        })
    }

    /// Extract 3–4 grammar structures from an article, pitched at `level`.
    #[instrument(level = "info", skip_all, fields(%level))]
    pub async fn analyze_article_grammar(
        &self,
        content: &str,
        level: Difficulty,
    ) -> Result<Vec<GrammarPoint>, AnalysisError> {
        let content = cap_chars(content, 1500);
        let prompt = format!(
            "Analyze this Spanish article and identify 3-4 specific grammar structures \
suitable for {level} level learners.\n\n\
For each grammar point, provide:\n\
1. The exact sentence from the text where it appears\n\
2. The specific grammar structure used\n\
3. The CEFR level of that structure\n\
4. A brief explanation\n\n\
Article content:\n{content}\n\n\
Please provide exactly 3-4 grammar points in this format:\n\
- Sentence: \"exact sentence from text\"\n\
- Structure: grammar structure name\n\
- Level: CEFR level (A1, A2, B1, B2, C1, C2)\n\
- Explanation: brief explanation\n\n\
Focus on grammar structures appropriate for {level} level such as:\n\
- B1: present/past tenses, ser vs estar, reflexive verbs\n\
- B2: present/past subjunctive, conditional, perfect tenses\n\
- C1: perfect subjunctive, compound conditionals, passive voice\n\n\
Return only the grammar points in the exact format above, no additional text."
        );

        let response = self.complete(prompt, 600).await?;
        let points = parse_grammar_points(&response);
        if points.is_empty() {
            return Err(AnalysisError::Unparseable {
                reason: format!(
                    "no complete grammar points in {:?}",
                    truncate_for_log(&response, 120)
                ),
            });
        }
        debug!(count = points.len(), "Parsed grammar points");
        Ok(points)
    }

    /// Extract colloquial expressions actually present in an episode's text.
    ///
    /// Formal text legitimately contains none: the model signals that with
    /// a sentinel and the result is an empty list, not an error.
    #[instrument(level = "info", skip_all, fields(%level))]
    pub async fn analyze_podcast_expressions(
        &self,
        transcript: &str,
        level: Difficulty,
    ) -> Result<Vec<String>, AnalysisError> {
        let transcript = cap_chars(transcript, 2000);
        let prompt = format!(
            "You are analyzing Spanish text to find ACTUAL colloquial expressions that \
appear in the text.\n\n\
CRITICAL RULE: Only extract expressions that are ACTUALLY PRESENT in the provided \
text. Do not suggest or create expressions that are not in the text.\n\n\
Text to analyze:\n{transcript}\n\n\
Instructions:\n\
1. Read the text carefully\n\
2. Look for actual colloquial expressions, informal phrases, or conversational \
elements that appear in the text\n\
3. If the text is formal and contains no colloquial expressions, return \
\"{NO_EXPRESSIONS_SENTINEL}\"\n\
4. If you find expressions, format them as: \"expression\" → meaning (usage context)\n\n\
Examples of what to look for (ONLY if they actually appear in the text):\n\
- Conversational fillers: o sea, bueno, pues, entonces\n\
- Question tags: ¿verdad?, ¿no?, ¿sabes?\n\
- Informal transitions: por cierto, a propósito, además\n\
- Opinion expressions: me parece que, creo que, la cosa es que\n\n\
Response format (only if expressions are found in the text):\n\
- \"actual_expression_from_text\" → meaning (context)\n\n\
If no colloquial expressions are found in this formal text, respond with: \
{NO_EXPRESSIONS_SENTINEL}"
        );

        let response = self.complete(prompt, 400).await?;
        if response.contains(NO_EXPRESSIONS_SENTINEL) {
            info!("Model found no colloquial expressions in the text");
            return Ok(Vec::new());
        }

        let expressions = parse_expressions(&response);
        if expressions.is_empty() {
            return Err(AnalysisError::Unparseable {
                reason: format!(
                    "no expressions and no sentinel in {:?}",
                    truncate_for_log(&response, 120)
                ),
            });
        }
        debug!(count = expressions.len(), "Parsed colloquial expressions");
        Ok(expressions)
    }
}

/// Parse grammar points from the fixed bullet format.
///
/// A point needs its sentence, structure, and level to count; incomplete
/// points are dropped, and at most four are kept.
pub fn parse_grammar_points(response: &str) -> Vec<GrammarPoint> {
    let mut points = Vec::new();
    let mut sentence: Option<String> = None;
    let mut structure: Option<String> = None;
    let mut level: Option<String> = None;
    let mut explanation: Option<String> = None;

    let mut flush =
        |sentence: &mut Option<String>,
         structure: &mut Option<String>,
         level: &mut Option<String>,
         explanation: &mut Option<String>,
         points: &mut Vec<GrammarPoint>| {
            if let (Some(s), Some(g), Some(l)) = (sentence.take(), structure.take(), level.take())
            {
                points.push(GrammarPoint {
                    sentence: s,
                    structure: g,
                    level: l,
                    explanation: explanation.take(),
                });
            } else {
                explanation.take();
            }
        };

    for line in response.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("- Sentence:") {
            flush(&mut sentence, &mut structure, &mut level, &mut explanation, &mut points);
            sentence = Some(rest.trim().trim_matches('"').to_string());
        } else if let Some(rest) = line.strip_prefix("- Structure:") {
            structure = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("- Level:") {
            level = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("- Explanation:") {
            explanation = Some(rest.trim().to_string());
        }
    }
    flush(&mut sentence, &mut structure, &mut level, &mut explanation, &mut points);

    points.retain(|p| !p.sentence.is_empty() && !p.structure.is_empty() && !p.level.is_empty());
    points.truncate(4);
    points
}

/// Parse `- "expression" → meaning (context)` lines into `expression (meaning)`.
///
/// The usage-context parenthetical is dropped; at most five expressions are
/// kept, matching what fits in a memo.
pub fn parse_expressions(response: &str) -> Vec<String> {
    let mut expressions = Vec::new();

    for line in response.lines() {
        let line = line.trim();
        if !line.starts_with('-') || !line.contains('"') || !line.contains('→') {
            continue;
        }
        let Some(start) = line.find('"') else { continue };
        let Some(end_rel) = line[start + 1..].find('"') else {
            continue;
        };
        let expression = &line[start + 1..start + 1 + end_rel];
        let remaining = &line[start + 1 + end_rel + 1..];
        let Some((_, meaning_part)) = remaining.split_once('→') else {
            continue;
        };
        let meaning = match meaning_part.split_once('(') {
            Some((before, _)) => before.trim(),
            None => meaning_part.trim(),
        };
        if !expression.is_empty() && !meaning.is_empty() {
            expressions.push(format!("{expression} ({meaning})"));
        }
    }

    expressions.truncate(5);
    expressions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grammar_points_complete() {
        let response = r#"- Sentence: "Si hubiera tenido más tiempo, habría terminado el proyecto."
- Structure: past perfect subjunctive
- Level: C1
- Explanation: expresses an unreal past condition and its result
- Sentence: "El informe fue publicado ayer."
- Structure: passive voice
- Level: B2
- Explanation: ser + past participle"#;

        let points = parse_grammar_points(response);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].structure, "past perfect subjunctive");
        assert_eq!(points[0].level, "C1");
        assert!(points[0].sentence.starts_with("Si hubiera"));
        assert_eq!(points[1].level, "B2");
        assert_eq!(
            points[1].explanation.as_deref(),
            Some("ser + past participle")
        );
    }

    #[test]
    fn test_parse_grammar_points_drops_incomplete() {
        // The first point is missing its level and must not survive.
        let response = r#"- Sentence: "Una frase."
- Structure: something
- Sentence: "Otra frase completa."
- Structure: imperfect tense
- Level: B1"#;

        let points = parse_grammar_points(response);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].structure, "imperfect tense");
    }

    #[test]
    fn test_parse_grammar_points_caps_at_four() {
        let mut response = String::new();
        for i in 0..6 {
            response.push_str(&format!(
                "- Sentence: \"Frase {i}.\"\n- Structure: s{i}\n- Level: B2\n"
            ));
        }
        assert_eq!(parse_grammar_points(&response).len(), 4);
    }

    #[test]
    fn test_parse_grammar_points_empty_on_prose() {
        assert!(parse_grammar_points("The text is too short to analyze.").is_empty());
    }

    #[test]
    fn test_parse_expressions() {
        let response = r#"- "o sea" → I mean (conversational filler)
- "¿sabes?" → you know? (question tag)
- not an expression line"#;

        let expressions = parse_expressions(response);
        assert_eq!(
            expressions,
            vec!["o sea (I mean)".to_string(), "¿sabes? (you know?)".to_string()]
        );
    }

    #[test]
    fn test_parse_expressions_without_context() {
        let expressions = parse_expressions(r#"- "pues nada" → oh well"#);
        assert_eq!(expressions, vec!["pues nada (oh well)".to_string()]);
    }

    #[test]
    fn test_parse_expressions_caps_at_five() {
        let mut response = String::new();
        for i in 0..8 {
            response.push_str(&format!("- \"expr{i}\" → meaning{i} (ctx)\n"));
        }
        assert_eq!(parse_expressions(&response).len(), 5);
    }

    #[test]
    fn test_parse_expressions_empty_on_prose() {
        assert!(parse_expressions("No structured lines here.").is_empty());
    }
}
