//! Interactive question loop.
//!
//! ```text
//!            ┌──────── invalid input / answered ────────┐
//!            ▼                                          │
//!     AwaitingInput ── read line ── question ── answer ─┘
//!            │
//!            └── exit keyword | end of input | interrupt ──▶ Terminated
//! ```
//!
//! The loop is generic over its input, output and answerer so it can be
//! driven from tests with in-memory buffers.

use std::future::Future;
use std::io::{self, Write};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::QueryError;
use crate::logging::Logger;
use crate::service::AiService;
use crate::validate::{is_exit_command, validate_question, MIN_QUESTION_CHARS};

pub const PROMPT: &str = "\nEnter your question (or 'exit' to quit): ";

/// Anything that can answer a question for the loop.
#[async_trait]
pub trait Answer: Send + Sync {
    async fn answer(&self, question: &str) -> Result<String, QueryError>;
}

#[async_trait]
impl Answer for AiService {
    async fn answer(&self, question: &str) -> Result<String, QueryError> {
        AiService::answer(self, question).await
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The user typed an exit keyword.
    Quit,
    EndOfInput,
    /// Ctrl-C, possibly while a question was in flight.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    Terminated(Outcome),
}

/// Run the loop until it reaches [`LoopState::Terminated`].
///
/// `interrupt` resolves when the user asks to cancel; it is polled both
/// while waiting for input and while a question is being answered.
pub async fn run<R, W, A, I>(
    input: R,
    out: &mut W,
    answerer: &A,
    logger: &Logger,
    interrupt: I,
) -> io::Result<Outcome>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    A: Answer + ?Sized,
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let mut lines = input.lines();
    let mut state = LoopState::AwaitingInput;

    let outcome = loop {
        if let LoopState::Terminated(outcome) = state {
            break outcome;
        }

        write!(out, "{}", PROMPT)?;
        out.flush()?;

        let line = tokio::select! {
            _ = &mut interrupt => {
                state = LoopState::Terminated(Outcome::Interrupted);
                continue;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            state = LoopState::Terminated(Outcome::EndOfInput);
            continue;
        };

        if is_exit_command(&line) {
            logger.info("Exit requested by the user");
            writeln!(out, "Thank you for using DocuMentor. Goodbye!")?;
            state = LoopState::Terminated(Outcome::Quit);
            continue;
        }

        if !validate_question(&line) {
            writeln!(
                out,
                "Please enter a valid question (at least {} characters).",
                MIN_QUESTION_CHARS
            )?;
            continue;
        }

        let question = line.trim();
        logger.info(format!("Question received: {}", question));
        writeln!(out, "Processing...")?;

        let result = tokio::select! {
            _ = &mut interrupt => {
                state = LoopState::Terminated(Outcome::Interrupted);
                continue;
            }
            result = answerer.answer(question) => result,
        };

        match result {
            Ok(answer) => writeln!(out, "\nAnswer:\n{}", answer)?,
            Err(e) => writeln!(out, "{}", e.user_message())?,
        }
    };

    if outcome == Outcome::Interrupted {
        report_interrupt(out, logger)?;
    }
    Ok(outcome)
}

/// Acknowledge a Ctrl-C, wherever in the session it arrived.
pub fn report_interrupt<W: Write>(out: &mut W, logger: &Logger) -> io::Result<()> {
    logger.info("Keyboard interrupt detected");
    writeln!(out, "\nOperation interrupted by the user.")?;
    out.flush()
}

/// Final log entry and closing message, printed however the session ended.
pub fn farewell<W: Write>(out: &mut W, logger: &Logger) -> io::Result<()> {
    logger.info("DocuMentor terminated");
    writeln!(out, "\nDocuMentor closed.")?;
    out.flush()
}
