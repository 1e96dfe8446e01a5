//! Scripted coaching dialogue.
//!
//! A [`CoachingSession`] walks the user through the ten steps in [`script`],
//! capturing their goal, success indicators and action step along the way.
//! Sessions are plain data so HTTP clients can carry the state between calls.

mod script;

pub use script::{
    is_summary_request, step, Capture, CoachingStep, CLOSING_TEMPLATE, COACH_SYSTEM_PROMPT,
    NOT_SPECIFIED, OPENING_LINES, STEPS, STEP_COUNT, SUMMARY_KEYWORDS,
    TECHNICAL_DIFFICULTY_RESPONSE,
};

use crate::completion::{ChatMessage, Completer, Role};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Number of earlier user messages listed in a summary written without the model.
const SUMMARY_POINTS: usize = 5;

const SUMMARY_INSTRUCTION: &str = "Summarize the following conversation between a user and \
an executive coach named Joel. Highlight the user's goal, success indicators and action step. \
Keep the summary concise (under 200 words) and professional, focusing on the most important \
insights.";

/// Answers captured during a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapturedData {
    pub goal: Option<String>,
    pub success_indicators: Option<String>,
    pub action_step: Option<String>,
}

impl CapturedData {
    fn store(&mut self, capture: Capture, value: &str) {
        let value = Some(value.trim().to_string());
        match capture {
            Capture::Goal => self.goal = value,
            Capture::SuccessIndicators => self.success_indicators = value,
            Capture::ActionStep => self.action_step = value,
        }
    }

    fn or_missing(value: &Option<String>) -> &str {
        value.as_deref().unwrap_or(NOT_SPECIFIED)
    }

    /// The closing summary with missing values marked.
    pub fn closing_summary(&self) -> String {
        CLOSING_TEMPLATE
            .replace("{goal}", Self::or_missing(&self.goal))
            .replace(
                "{success_indicators}",
                Self::or_missing(&self.success_indicators),
            )
            .replace("{action_step}", Self::or_missing(&self.action_step))
    }
}

/// State of one coaching conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingSession {
    current_step: usize,
    history: Vec<ChatMessage>,
    #[serde(default)]
    captured: CapturedData,
}

impl Default for CoachingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CoachingSession {
    pub fn new() -> Self {
        Self {
            current_step: 1,
            history: Vec::new(),
            captured: CapturedData::default(),
        }
    }

    /// Resume a session from state held by a client.
    pub fn from_state(
        history: Vec<ChatMessage>,
        current_step: usize,
        captured: CapturedData,
    ) -> Self {
        Self {
            current_step: current_step.clamp(1, STEP_COUNT),
            history,
            captured,
        }
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn captured(&self) -> &CapturedData {
        &self.captured
    }

    /// Split into `(history, current_step, captured)`.
    pub fn into_parts(self) -> (Vec<ChatMessage>, usize, CapturedData) {
        (self.history, self.current_step, self.captured)
    }

    /// Back to step 1 with no history.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Handle one user message and return the coach's reply.
    ///
    /// Summary requests leave the step untouched. Any other message advances
    /// the step, stopping at the last one.
    pub async fn respond(&mut self, completer: &dyn Completer, user_input: &str) -> String {
        let input = user_input.trim();
        self.history.push(ChatMessage::user(input));

        if is_summary_request(input) {
            debug!("Summary requested at step {}", self.current_step);
            let summary = self.summarize(completer).await;
            self.history.push(ChatMessage::assistant(summary.clone()));
            return summary;
        }

        let current = step(self.current_step);
        if let Some(capture) = current.captures {
            self.captured.store(capture, input);
        }

        let reply = match current.number {
            1 => OPENING_LINES
                .choose(&mut rand::thread_rng())
                .unwrap_or(&OPENING_LINES[0])
                .to_string(),
            STEP_COUNT => self.captured.closing_summary(),
            _ => self.generate(completer, current, input).await,
        };

        self.history.push(ChatMessage::assistant(reply.clone()));
        self.current_step = (self.current_step + 1).min(STEP_COUNT);
        reply
    }

    async fn generate(
        &self,
        completer: &dyn Completer,
        current: &CoachingStep,
        input: &str,
    ) -> String {
        let instruction = format!(
            "Coaching step {} of {} ({}). Goal of this step: {}.\n\
             The user just said: \"{}\"\n\
             Acknowledge it briefly, then ask: {}",
            current.number, STEP_COUNT, current.title, current.purpose, input, current.prompt
        );

        // The newest user message is carried by the instruction.
        let earlier = self
            .history
            .split_last()
            .map(|(_, earlier)| earlier)
            .unwrap_or_default();
        let mut messages = Vec::with_capacity(earlier.len() + 2);
        messages.push(ChatMessage::system(COACH_SYSTEM_PROMPT));
        messages.extend_from_slice(earlier);
        messages.push(ChatMessage::user(instruction));

        match completer.complete(&messages).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => current.prompt.to_string(),
            Err(e) => {
                warn!("Coaching reply failed at step {}: {}", current.number, e);
                TECHNICAL_DIFFICULTY_RESPONSE.to_string()
            }
        }
    }

    fn key_points(&self) -> String {
        format!(
            "**Key Points**\n- Goal: {}\n- Success indicators: {}\n- Action step: {}",
            CapturedData::or_missing(&self.captured.goal),
            CapturedData::or_missing(&self.captured.success_indicators),
            CapturedData::or_missing(&self.captured.action_step),
        )
    }

    /// Model-written summary of the conversation followed by the key points.
    ///
    /// Falls back to [`conversation_summary`](Self::conversation_summary) when
    /// the completion fails or comes back empty.
    pub async fn summarize(&self, completer: &dyn Completer) -> String {
        let transcript: Vec<String> = self
            .history
            .iter()
            .filter(|m| !(m.role == Role::User && is_summary_request(&m.content)))
            .map(|m| {
                let speaker = match m.role {
                    Role::User => "User",
                    Role::Assistant => "Joel",
                    Role::System => "System",
                };
                format!("{}: {}", speaker, m.content)
            })
            .collect();

        let prompt = format!(
            "{}\n\nConversation:\n{}\n\n{}\n\nSummary:",
            SUMMARY_INSTRUCTION,
            transcript.join("\n"),
            self.key_points()
        );
        let messages = [
            ChatMessage::system(COACH_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        match completer.complete(&messages).await {
            Ok(text) if !text.trim().is_empty() => format!(
                "**Conversation Summary**\n\n{}\n\n{}",
                text.trim(),
                self.key_points()
            ),
            Ok(_) => self.conversation_summary(),
            Err(e) => {
                warn!("Summary generation failed: {}", e);
                self.conversation_summary()
            }
        }
    }

    /// Markdown summary of the conversation so far, written without the model.
    pub fn conversation_summary(&self) -> String {
        let current = step(self.current_step);
        let mut summary = String::from("**Conversation Summary**\n\n");
        summary.push_str(&format!(
            "We're at step {} of {}: {}.\n\n",
            current.number, STEP_COUNT, current.title
        ));
        summary.push_str(&self.key_points());
        summary.push('\n');

        let said: Vec<&str> = self
            .history
            .iter()
            .filter(|m| m.role == Role::User && !is_summary_request(&m.content))
            .map(|m| m.content.as_str())
            .collect();
        if !said.is_empty() {
            summary.push_str("\n**What you've shared**\n");
            for point in &said[said.len().saturating_sub(SUMMARY_POINTS)..] {
                summary.push_str(&format!("- {}\n", point));
            }
        }

        summary.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCompleter;

    async fn walk(session: &mut CoachingSession, completer: &ScriptedCompleter, inputs: &[&str]) {
        for input in inputs {
            session.respond(completer, input).await;
        }
    }

    #[tokio::test]
    async fn test_first_reply_is_an_opening_line() {
        let completer = ScriptedCompleter::replying("unused");
        let mut session = CoachingSession::new();

        let reply = session.respond(&completer, "hi").await;
        assert!(OPENING_LINES.contains(&reply.as_str()));
        assert_eq!(session.current_step(), 2);
        assert_eq!(session.history().len(), 2);
        assert!(completer.requests().is_empty());
    }

    #[tokio::test]
    async fn test_middle_steps_use_completer() {
        let completer = ScriptedCompleter::replying("Tell me more.");
        let mut session = CoachingSession::new();
        walk(&mut session, &completer, &["hi"]).await;

        let reply = session.respond(&completer, "I freeze in meetings").await;
        assert_eq!(reply, "Tell me more.");

        let request = completer.last_request().unwrap();
        assert_eq!(request[0].content, COACH_SYSTEM_PROMPT);
        assert!(request[1].content.contains("I freeze in meetings"));
        assert!(request[1].content.contains(step(2).prompt));
    }

    #[tokio::test]
    async fn test_full_session_captures_and_closes() {
        let completer = ScriptedCompleter::replying("ok");
        let mut session = CoachingSession::new();
        walk(
            &mut session,
            &completer,
            &[
                "hi",
                "presenting",
                "no",
                "sure",
                "speak up in the weekly meeting",
                "I share one idea",
                "people will judge me",
                "they'd see it as practice",
                "prepare one talking point",
            ],
        )
        .await;
        assert_eq!(session.current_step(), 10);

        let captured = session.captured().clone();
        assert_eq!(captured.goal.as_deref(), Some("speak up in the weekly meeting"));
        assert_eq!(captured.success_indicators.as_deref(), Some("I share one idea"));
        assert_eq!(captured.action_step.as_deref(), Some("prepare one talking point"));

        let closing = session.respond(&completer, "that's it").await;
        assert!(closing
            .starts_with("To summarize: You're working on speak up in the weekly meeting"));
        assert!(closing.contains("you'll try prepare one talking point"));

        session.respond(&completer, "thanks").await;
        assert_eq!(session.current_step(), STEP_COUNT);
    }

    #[tokio::test]
    async fn test_closing_marks_missing_values() {
        let completer = ScriptedCompleter::replying("ok");
        let mut session = CoachingSession::from_state(Vec::new(), 10, CapturedData::default());
        let closing = session.respond(&completer, "done").await;
        assert_eq!(closing.matches(NOT_SPECIFIED).count(), 3);
    }

    #[tokio::test]
    async fn test_later_steps_see_earlier_turns() {
        let completer = ScriptedCompleter::replying("What else?");
        let mut session = CoachingSession::new();
        walk(&mut session, &completer, &["hi", "I freeze in meetings"]).await;

        session.respond(&completer, "I've never had a coach").await;

        let request = completer.last_request().unwrap();
        assert_eq!(request[0].role, Role::System);
        assert_eq!(request[1], ChatMessage::user("hi"));
        assert_eq!(request[2].role, Role::Assistant);
        assert!(OPENING_LINES.contains(&request[2].content.as_str()));
        assert_eq!(request[3], ChatMessage::user("I freeze in meetings"));
        assert_eq!(request[4], ChatMessage::assistant("What else?"));

        let last = request.last().unwrap();
        assert_eq!(request.len(), 6);
        assert!(last.content.contains("I've never had a coach"));
        assert!(last.content.contains(step(3).prompt));
    }

    #[tokio::test]
    async fn test_summary_is_written_by_the_model() {
        let completer = ScriptedCompleter::replying("You want to speak up more in meetings.");
        let mut session = CoachingSession::from_state(Vec::new(), 5, CapturedData::default());
        walk(&mut session, &completer, &["speak up in the weekly meeting"]).await;
        let step_before = session.current_step();

        let summary = session.respond(&completer, "can you recap?").await;
        assert_eq!(
            summary,
            "**Conversation Summary**\n\n\
             You want to speak up more in meetings.\n\n\
             **Key Points**\n\
             - Goal: speak up in the weekly meeting\n\
             - Success indicators: Not specified\n\
             - Action step: Not specified"
        );
        assert_eq!(session.current_step(), step_before);

        let prompt = &completer.last_request().unwrap()[1].content;
        assert!(prompt.contains("under 200 words"));
        assert!(prompt.contains("User: speak up in the weekly meeting"));
        assert!(!prompt.contains("recap?"));
    }

    #[tokio::test]
    async fn test_summary_falls_back_when_model_fails() {
        let completer = ScriptedCompleter::replying("ok");
        let mut session = CoachingSession::new();
        walk(&mut session, &completer, &["hi", "presenting"]).await;
        let step_before = session.current_step();

        let summary = session.respond(&ScriptedCompleter::failing(), "can you recap?").await;
        assert!(summary.starts_with("**Conversation Summary**"));
        assert!(summary.contains("We're at step 3 of 10"));
        assert!(summary.contains("**Key Points**"));
        assert!(summary.contains("- Goal: Not specified"));
        assert!(summary.contains("- presenting"));
        assert!(!summary.contains("recap?"));
        assert_eq!(session.current_step(), step_before);
    }

    #[tokio::test]
    async fn test_completer_failure_gives_technical_difficulty() {
        let completer = ScriptedCompleter::failing();
        let mut session = CoachingSession::from_state(Vec::new(), 3, CapturedData::default());
        let reply = session.respond(&completer, "never").await;
        assert_eq!(reply, TECHNICAL_DIFFICULTY_RESPONSE);
        assert_eq!(session.current_step(), 4);
    }

    #[tokio::test]
    async fn test_reset() {
        let completer = ScriptedCompleter::replying("ok");
        let mut session = CoachingSession::new();
        walk(&mut session, &completer, &["hi", "a", "b", "c", "goal"]).await;
        assert!(session.captured().goal.is_some());

        session.reset();
        assert_eq!(session, CoachingSession::new());
    }

    #[test]
    fn test_from_state_clamps_step() {
        let session = CoachingSession::from_state(Vec::new(), 0, CapturedData::default());
        assert_eq!(session.current_step(), 1);
        let session = CoachingSession::from_state(Vec::new(), 99, CapturedData::default());
        assert_eq!(session.current_step(), STEP_COUNT);
    }
}
