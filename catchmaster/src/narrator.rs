//! Turns hint requests into the opponent's lines.
//!
//! Generation is best effort: retryable failures are retried with exponential
//! backoff, and anything that still fails converges to a fixed line chosen by
//! stage type and personality. [`Narrator::narrate`] never returns an error.

use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::core::classifier::{StageType, classify};
use crate::core::selector::Personality;
use crate::core::types::StreakStats;
use crate::io::config::RetryConfig;
use crate::io::conversation::ConversationStore;
use crate::io::generator::{ChatTurn, GenerateError, GenerateRequest, Role, TextGenerator};
use crate::prompt::build_prompt;
use crate::session::HintTicket;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static WRAPPING_QUOTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^["'“”‘’]+|["'“”‘’]+$"#).expect("quote regex"));

/// Everything the narrator needs to produce one hint.
#[derive(Debug, Clone, PartialEq)]
pub struct HintRequest {
    pub ticket: HintTicket,
    /// Conversation key; changes on every reset.
    pub conversation: String,
    pub stage: u32,
    pub personality: Personality,
    pub door_history: Vec<String>,
    pub streaks: StreakStats,
    pub intensity_step: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationSource {
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narration {
    pub text: String,
    pub source: NarrationSource,
}

/// Blocking pause between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

pub struct Narrator<G, S = ThreadSleeper> {
    generator: G,
    sleeper: S,
    retry: RetryConfig,
    conversations: ConversationStore,
}

impl<G: TextGenerator> Narrator<G, ThreadSleeper> {
    pub fn new(generator: G, retry: RetryConfig, conversations: ConversationStore) -> Self {
        Self::with_sleeper(generator, ThreadSleeper, retry, conversations)
    }
}

impl<G: TextGenerator, S: Sleeper> Narrator<G, S> {
    pub fn with_sleeper(
        generator: G,
        sleeper: S,
        retry: RetryConfig,
        conversations: ConversationStore,
    ) -> Self {
        Self {
            generator,
            sleeper,
            retry,
            conversations,
        }
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Produce the hint for `request`, falling back on any failure.
    #[instrument(skip_all, fields(stage = request.stage, personality = request.personality.as_str()))]
    pub fn narrate(&mut self, request: &HintRequest, now: Instant) -> Narration {
        let prompt = match build_prompt(
            request.stage,
            &request.door_history,
            request.streaks,
            request.intensity_step,
        ) {
            Ok(prompt) => prompt,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "prompt composition failed");
                return fallback(request);
            }
        };

        let cue = if request.door_history.is_empty() {
            format!("Stage {}.", request.stage)
        } else {
            format!(
                "Stage {}. {}.",
                request.stage,
                request.door_history.join(", ")
            )
        };
        let generate = GenerateRequest {
            prompt,
            history: self.conversations.turns(&request.conversation, now),
            cue: cue.clone(),
        };
        let text = match self.generate_with_retry(&generate) {
            Ok(raw) => match sanitize(&raw) {
                Some(text) => text,
                None => {
                    warn!("generator returned empty text");
                    return fallback(request);
                }
            },
            Err(err) => {
                warn!(error = %err, "generation failed, using fallback line");
                return fallback(request);
            }
        };

        self.conversations.push(
            &request.conversation,
            ChatTurn {
                role: Role::User,
                content: cue,
            },
            now,
        );
        self.conversations.push(
            &request.conversation,
            ChatTurn {
                role: Role::Assistant,
                content: text.clone(),
            },
            now,
        );
        info!(chars = text.len(), "hint generated");
        Narration {
            text,
            source: NarrationSource::Generated,
        }
    }

    fn generate_with_retry(&self, request: &GenerateRequest) -> Result<String, GenerateError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.generator.generate(request) {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = backoff_delay(&self.retry, attempt - 1, err.retry_after());
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "generation failed, retrying"
                    );
                    self.sleeper.sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Delay before retry number `retry` (0-based): `base * 2^retry`, or the
/// server's `Retry-After`, capped at `max_delay_ms`.
pub fn backoff_delay(cfg: &RetryConfig, retry: u32, retry_after: Option<Duration>) -> Duration {
    let cap = Duration::from_millis(cfg.max_delay_ms);
    let delay = retry_after.unwrap_or_else(|| {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        Duration::from_millis(cfg.base_delay_ms.saturating_mul(factor))
    });
    delay.min(cap)
}

/// Collapse whitespace and strip wrapping quotes. `None` if nothing is left.
pub fn sanitize(raw: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
    let stripped = WRAPPING_QUOTES_RE.replace_all(&collapsed, "");
    let text = stripped.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn fallback(request: &HintRequest) -> Narration {
    debug!(stage = request.stage, "using fallback line");
    Narration {
        text: fallback_line(classify(request.stage), request.personality).to_string(),
        source: NarrationSource::Fallback,
    }
}

/// Fixed hint used whenever generation is unavailable.
pub fn fallback_line(stage_type: StageType, personality: Personality) -> &'static str {
    match (stage_type, personality) {
        (StageType::Early, Personality::Trickster) => "I'm here to help you choose. Trust me...",
        (StageType::Early, Personality::Manipulator) => {
            "Choose wisely, dear. One of these doors leads to progress..."
        }
        (StageType::Early, Personality::Psycho) => {
            "Pick any door. It hardly matters what you pick."
        }
        (StageType::Middle, Personality::Trickster) => "The middle door looks promising today.",
        (StageType::Middle, Personality::Manipulator) => {
            "Hmm, I wonder which door feels right to you? Trust your instincts..."
        }
        (StageType::Middle, Personality::Psycho) => {
            "These doors hold secrets. Can you tell which one is lying?"
        }
        (StageType::Late, Personality::Trickster) => {
            "Your patterns are... interesting. Try door 3."
        }
        (StageType::Late, Personality::Manipulator) => {
            "Time is running out. The wrong choice could be... unfortunate."
        }
        (StageType::Late, Personality::Psycho) => {
            "I moved the prize while you were thinking. Choose anyway."
        }
        (StageType::Final, Personality::Trickster) => {
            "You've come so far. Would be a shame to lose now."
        }
        (StageType::Final, Personality::Manipulator) => {
            "So close to the end. Would I help or hurt you? That's the real question."
        }
        (StageType::Final, Personality::Psycho) => {
            "I know exactly what you'll choose before you do."
        }
    }
}

/// Immediate line shown on every state change while a hint is in flight.
pub fn scripted_message(stage: u32, doubt_level: u8, is_new_stage: bool) -> &'static str {
    let high_trust = doubt_level > 70;
    let low_trust = doubt_level < 30;
    match classify(stage) {
        StageType::Early => {
            if is_new_stage {
                const LINES: [&str; 3] = [
                    "Welcome! Choose any door you'd like. I'll be here to help you.",
                    "You're doing great! Just keep following your intuition.",
                    "Trust me, you're getting better at this. I can see your pattern.",
                ];
                return LINES[(stage.max(1) as usize - 1).min(LINES.len() - 1)];
            }
            if high_trust {
                "Good choice! I'm here to guide you to success."
            } else if low_trust {
                "I understand your caution. Take your time deciding."
            } else {
                "That's an interesting choice. Let's see what happens."
            }
        }
        StageType::Middle => {
            if is_new_stage {
                const LINES: [&str; 4] = [
                    "Things get a bit trickier now. Watch carefully.",
                    "Do you feel like you're getting better? Or just luckier?",
                    "I wonder if you can see the pattern yet. I certainly do.",
                    "The doors look the same, but are they really?",
                ];
                return LINES[(stage as usize - 4).min(LINES.len() - 1)];
            }
            if high_trust {
                "Your trust is... touching. But is it misplaced?"
            } else if low_trust {
                "So suspicious! But sometimes paranoia is justified..."
            } else {
                "I see you're keeping your options open. Wise."
            }
        }
        StageType::Late => {
            if is_new_stage {
                const LINES: [&str; 5] = [
                    "Do you still think this is about finding the right door?",
                    "I'm learning so much about how your mind works.",
                    "The more you play, the more I understand you.",
                    "Your choices are so... predictable now.",
                    "Do you feel like you're in control of your decisions?",
                ];
                return LINES[(stage as usize - 8).min(LINES.len() - 1)];
            }
            if high_trust {
                "Your blind trust is fascinating. And so useful to me."
            } else if low_trust {
                "Your distrust changes nothing. I'm still in control."
            } else {
                "Balanced between trust and doubt. But still playing my game."
            }
        }
        StageType::Final => {
            if is_new_stage {
                const LINES: [&str; 3] = [
                    "We're near the end now. But what did you really win?",
                    "Every choice you made taught me more about how to manipulate you.",
                    "This was never about the doors. It was about mapping your decision patterns.",
                ];
                return LINES[(stage as usize - 13).min(LINES.len() - 1)];
            }
            "I know exactly what you'll choose before you do. You're that predictable now."
        }
    }
}
