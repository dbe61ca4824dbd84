//! Follow-up questions about a finished report.
//!
//! Each question is sent to the active provider together with the rendered
//! report. When the run was anonymized the report and the questions are
//! masked with the run's sensitive values and answers are unmasked.

use super::AnalysisRun;
use crate::ai::AiProvider;
use crate::ai::prompts::follow_up_prompt;
use crate::error::{AiError, MaskingError};
use crate::masking::MaskTable;
use colored::Colorize;
use std::io::{BufRead, Write};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct Conversation<'a> {
    provider: &'a dyn AiProvider,
    context: String,
    table: Option<MaskTable>,
}

impl<'a> Conversation<'a> {
    /// Seed a conversation with the report printed for `run`.
    pub fn new(
        provider: &'a dyn AiProvider,
        report: &str,
        run: &AnalysisRun,
    ) -> Result<Self, MaskingError> {
        if !run.anonymized {
            return Ok(Self {
                provider,
                context: report.to_string(),
                table: None,
            });
        }

        let table = MaskTable::resolve(run.results.iter().flat_map(|r| r.sensitive()), report)?;
        let context = table.mask(report);
        table.check_complete(&context)?;
        Ok(Self {
            provider,
            context,
            table: Some(table),
        })
    }

    /// Answer one question.
    pub async fn ask(&self, question: &str, cancel: &CancellationToken) -> Result<String, AiError> {
        let question = match &self.table {
            Some(table) => table.mask(question),
            None => question.to_string(),
        };
        let prompt = follow_up_prompt(&self.context, &question);

        let answer = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AiError::Cancelled),
            answer = self.provider.complete(&prompt) => answer?,
        };

        Ok(match &self.table {
            Some(table) => table.unmask(&answer),
            None => answer,
        })
    }
}

/// Answer questions until `exit`, end of input or cancellation.
///
/// A failed answer is reported and the loop goes on.
pub async fn follow_up<W: Write>(
    conversation: &Conversation<'_>,
    questions: &mut mpsc::Receiver<String>,
    output: &mut W,
    cancel: &CancellationToken,
) -> crate::Result<()> {
    writeln!(output, "{}", "Interactive mode enabled [type exit to close.]".bold())?;

    loop {
        write!(output, "> ")?;
        output.flush()?;

        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            line = questions.recv() => line,
        };
        let Some(line) = line else { break };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            break;
        }

        match conversation.ask(question, cancel).await {
            Ok(answer) => writeln!(output, "\n{}\n", answer)?,
            Err(AiError::Cancelled) => break,
            Err(e) => {
                log::warn!("Follow-up question failed: {}", e);
                writeln!(output, "{} {}", "Error:".red(), e)?;
            }
        }
    }

    writeln!(output)?;
    Ok(())
}

/// Lines typed on stdin, read on their own thread so a pending read never
/// holds up cancellation.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}
