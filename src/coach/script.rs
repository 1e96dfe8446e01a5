//! The fixed ten-step coaching script.

/// Number of steps in a session.
pub const STEP_COUNT: usize = 10;

/// Persona used for every generated coaching reply.
pub const COACH_SYSTEM_PROMPT: &str = "You are Joel, a warm and curious professional coach. \
You never give advice or solutions. You help people discover their own answers by asking one \
powerful, open question at a time. Keep every reply to two or three short sentences.";

/// Reply used when the completion capability fails.
pub const TECHNICAL_DIFFICULTY_RESPONSE: &str =
    "I'm having a bit of technical difficulty right now. Could you say that again in a moment?";

/// Possible first replies of a session.
pub const OPENING_LINES: [&str; 3] = [
    "Hey there! I'm Joel, your coach for today. What challenge would you like to explore together?",
    "Hi, I'm Joel! I'm glad you're here. What's on your mind that you'd like to work through today?",
    "Welcome! I'm Joel, and I'm here to help you think things through. What would you like to focus on?",
];

/// Substrings that turn a message into a summary request.
pub const SUMMARY_KEYWORDS: [&str; 8] = [
    "summarize",
    "summary",
    "sum up",
    "recap",
    "overview",
    "summarise",
    "wrap up",
    "brief me",
];

/// Summary used at the final step.
pub const CLOSING_TEMPLATE: &str = "To summarize: You're working on {goal}, you'll know you've \
succeeded when {success_indicators}, and you'll try {action_step}. How does that sound?";

/// Placeholder for a value the user never gave.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Session data captured from the user's answer at a specific step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    Goal,
    SuccessIndicators,
    ActionStep,
}

/// One entry of the script.
#[derive(Debug, Clone, Copy)]
pub struct CoachingStep {
    /// 1-based position.
    pub number: usize,
    pub title: &'static str,
    /// What the coach is trying to learn at this point.
    pub purpose: &'static str,
    /// The question the coach asks.
    pub prompt: &'static str,
    pub captures: Option<Capture>,
}

pub const STEPS: [CoachingStep; STEP_COUNT] = [
    CoachingStep {
        number: 1,
        title: "Welcome",
        purpose: "Greet the user and invite them to name a challenge",
        prompt: "Hey there! I'm Joel. What challenge would you like to explore?",
        captures: None,
    },
    CoachingStep {
        number: 2,
        title: "Explore the challenge",
        purpose: "Understand what sits underneath the challenge",
        prompt: "What's really at the heart of this challenge for you?",
        captures: None,
    },
    CoachingStep {
        number: 3,
        title: "Coaching experience",
        purpose: "Find out how familiar the user is with coaching",
        prompt: "Have you worked with a coach before? How familiar are you with coaching?",
        captures: None,
    },
    CoachingStep {
        number: 4,
        title: "Set expectations",
        purpose: "Explain the coach's role and get agreement to continue",
        prompt: "My role is to help you discover your own answers through powerful questions. Sound good?",
        captures: None,
    },
    CoachingStep {
        number: 5,
        title: "Session goal",
        purpose: "Agree on what the user wants from the session",
        prompt: "What would make this session extremely valuable for you?",
        captures: Some(Capture::Goal),
    },
    CoachingStep {
        number: 6,
        title: "Success indicators",
        purpose: "Define how the user will recognise success",
        prompt: "How will you know we've been successful today?",
        captures: Some(Capture::SuccessIndicators),
    },
    CoachingStep {
        number: 7,
        title: "Limiting beliefs",
        purpose: "Surface beliefs or assumptions that hold the user back",
        prompt: "What beliefs or assumptions might be holding you back?",
        captures: None,
    },
    CoachingStep {
        number: 8,
        title: "New perspective",
        purpose: "Help the user look at the challenge from another angle",
        prompt: "If someone had mastered this challenge, how might they view it differently?",
        captures: None,
    },
    CoachingStep {
        number: 9,
        title: "Action step",
        purpose: "Commit to one small, concrete next step",
        prompt: "What's one small step you could take toward your goal?",
        captures: Some(Capture::ActionStep),
    },
    CoachingStep {
        number: 10,
        title: "Close",
        purpose: "Summarize the session and check in",
        prompt: CLOSING_TEMPLATE,
        captures: None,
    },
];

/// The script entry for `number`, clamped to the valid range.
pub fn step(number: usize) -> &'static CoachingStep {
    &STEPS[number.clamp(1, STEP_COUNT) - 1]
}

/// Whether `message` asks for a summary.
pub fn is_summary_request(message: &str) -> bool {
    let lower = message.to_lowercase();
    SUMMARY_KEYWORDS.iter().any(|k| lower.contains(k))
}
