//! Text generation abstraction for the opponent's hints.
//!
//! The [`TextGenerator`] trait decouples the narrator from the actual model
//! backend. Tests use scripted generators that return predetermined replies
//! without spawning processes or touching the network.

use std::process::Command;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::io::config::{GeneratorConfig, GeneratorKind};
use crate::io::http_generator::HttpGenerator;
use crate::io::process::run_with_input;

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Parameters for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Composed instruction for the model.
    pub prompt: String,
    /// Earlier exchanges, oldest first.
    pub history: Vec<ChatTurn>,
    /// The current stage as the player's turn; always sent last.
    pub cue: String,
}

/// Failure modes of a generation backend.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("generator returned status {code}: {message}")]
    Status {
        code: u16,
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("generator timed out after {0:?}")]
    Timeout(Duration),
    #[error("generator unavailable: {0}")]
    Unavailable(String),
}

impl GenerateError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerateError::Transport(_) | GenerateError::RateLimited { .. } => true,
            GenerateError::Timeout(_) => true,
            GenerateError::Status { code, .. } => matches!(code, 500 | 502 | 503 | 504),
            GenerateError::Malformed(_) | GenerateError::Unavailable(_) => false,
        }
    }

    /// Server-requested delay before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GenerateError::RateLimited { retry_after }
            | GenerateError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Abstraction over text generation backends.
pub trait TextGenerator {
    /// Generate a reply for the request.
    fn generate(&self, request: &GenerateRequest) -> Result<String, GenerateError>;
}

impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    fn generate(&self, request: &GenerateRequest) -> Result<String, GenerateError> {
        (**self).generate(request)
    }
}

/// Generator that never produces text; the narrator falls back every time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGenerator;

impl TextGenerator for DisabledGenerator {
    fn generate(&self, _request: &GenerateRequest) -> Result<String, GenerateError> {
        Err(GenerateError::Unavailable(
            "text generation disabled".to_string(),
        ))
    }
}

/// Generator that spawns a local command and feeds it the prompt on stdin.
///
/// Earlier turns are prepended as `role: content` lines so CLI models that only
/// read stdin still see the conversation.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandGenerator {
    pub fn new(command: &[String], timeout: Duration, output_limit_bytes: usize) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
            output_limit_bytes,
        })
    }
}

impl TextGenerator for CommandGenerator {
    #[instrument(skip_all, fields(program = %self.program, timeout_secs = self.timeout.as_secs()))]
    fn generate(&self, request: &GenerateRequest) -> Result<String, GenerateError> {
        info!("starting generator command");
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        let input = render_transcript(request);
        let reply = run_with_input(cmd, input.as_bytes(), self.timeout, self.output_limit_bytes)
            .map_err(|err| GenerateError::Unavailable(format!("{err:#}")))?;

        if reply.timed_out {
            warn!("generator command timed out");
            return Err(GenerateError::Timeout(self.timeout));
        }
        if !reply.status.success() {
            warn!(exit_code = ?reply.status.code(), "generator command failed");
            return Err(GenerateError::Transport(format!(
                "command exited with {:?}: {}",
                reply.status.code(),
                reply.stderr_tail()
            )));
        }

        let text = reply.stdout;
        debug!(bytes = text.len(), "generator command completed");
        Ok(text)
    }
}

fn render_transcript(request: &GenerateRequest) -> String {
    if request.history.is_empty() && request.cue.is_empty() {
        return request.prompt.clone();
    }
    let mut buf = String::new();
    for turn in &request.history {
        buf.push_str(turn.role.as_str());
        buf.push_str(": ");
        buf.push_str(turn.content.trim());
        buf.push('\n');
    }
    if !request.cue.is_empty() {
        buf.push_str(Role::User.as_str());
        buf.push_str(": ");
        buf.push_str(request.cue.trim());
        buf.push('\n');
    }
    buf.push('\n');
    buf.push_str(&request.prompt);
    buf
}

/// Build the generator selected by configuration.
pub fn generator_from_config(cfg: &GeneratorConfig) -> Box<dyn TextGenerator> {
    let timeout = Duration::from_secs(cfg.timeout_secs);
    match cfg.kind {
        GeneratorKind::None => Box::new(DisabledGenerator),
        GeneratorKind::Command => {
            match CommandGenerator::new(&cfg.command, timeout, cfg.output_limit_bytes) {
                Some(generator) => Box::new(generator),
                None => {
                    warn!("generator.command is empty, disabling generation");
                    Box::new(DisabledGenerator)
                }
            }
        }
        GeneratorKind::Http => match HttpGenerator::from_config(cfg) {
            Ok(generator) => Box::new(generator),
            Err(err) => {
                warn!(error = %err, "http generator unavailable, disabling generation");
                Box::new(DisabledGenerator)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            prompt: prompt.to_string(),
            history: Vec::new(),
            cue: String::new(),
        }
    }

    #[test]
    fn retryable_classification() {
        assert!(GenerateError::RateLimited { retry_after: None }.is_retryable());
        assert!(GenerateError::Transport("reset".to_string()).is_retryable());
        assert!(
            GenerateError::Status {
                code: 503,
                message: "busy".to_string(),
                retry_after: None
            }
            .is_retryable()
        );
        assert!(
            !GenerateError::Status {
                code: 401,
                message: "bad key".to_string(),
                retry_after: None
            }
            .is_retryable()
        );
        assert!(!GenerateError::Malformed("no choices".to_string()).is_retryable());
    }

    #[test]
    fn disabled_generator_is_unavailable() {
        let err = DisabledGenerator.generate(&request("hi")).unwrap_err();
        assert!(matches!(err, GenerateError::Unavailable(_)));
    }

    #[test]
    fn transcript_prepends_history() {
        let mut req = request("Provide the hint now.");
        req.history = vec![
            ChatTurn {
                role: Role::User,
                content: "stage 1".to_string(),
            },
            ChatTurn {
                role: Role::Assistant,
                content: "Trust me.".to_string(),
            },
        ];
        assert_eq!(
            render_transcript(&req),
            "user: stage 1\nassistant: Trust me.\n\nProvide the hint now."
        );

        req.cue = "Stage 2. Door 1: 1 times.".to_string();
        assert!(
            render_transcript(&req)
                .starts_with("user: stage 1\nassistant: Trust me.\nuser: Stage 2. Door 1: 1 times.\n\n")
        );
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandGenerator::new(&[], Duration::from_secs(1), 10).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn command_generator_reads_stdout() {
        let generator =
            CommandGenerator::new(&["cat".to_string()], Duration::from_secs(5), 1_000)
                .expect("generator");
        let text = generator.generate(&request("Pick door two.")).expect("generate");
        assert_eq!(text, "Pick door two.");
    }

    #[cfg(unix)]
    #[test]
    fn command_failure_is_transport_error() {
        let generator =
            CommandGenerator::new(&["false".to_string()], Duration::from_secs(5), 1_000)
                .expect("generator");
        let err = generator.generate(&request("x")).unwrap_err();
        assert!(matches!(err, GenerateError::Transport(_)));
    }
}
