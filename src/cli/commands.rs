use anyhow::{Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info};

use etfscout::{
    data::QuoteProvider,
    interactions::{Feedback, FeedbackSummary, InteractionLogEntry, InteractionLogger},
    llm::CompletionProvider,
    orchestrator::{EtfAssistant, LookupOutcome, TickerReport},
};

use super::FeedbackArg;

/// Print the normalized metrics for a ticker
pub async fn lookup<Q, C>(assistant: &EtfAssistant<Q, C>, ticker: &str, json: bool) -> Result<()>
where
    Q: QuoteProvider,
    C: CompletionProvider,
{
    match assistant.lookup(ticker).await {
        LookupOutcome::Found(report) if json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        LookupOutcome::Found(report) => println!("{}", format_report(&report)),
        LookupOutcome::InvalidTicker(message) | LookupOutcome::Failed(message) => {
            eprintln!("❌ {}", message);
        }
    }
    Ok(())
}

/// Answer a question and write exactly one log row for it
pub async fn ask<Q, C>(
    assistant: &EtfAssistant<Q, C>,
    query: &str,
    feedback: Option<FeedbackArg>,
) -> Result<()>
where
    Q: QuoteProvider,
    C: CompletionProvider,
{
    let answer = assistant.ask(query).await;
    println!("Answer: {}", answer);

    let feedback = match feedback {
        Some(arg) => arg.into_feedback(),
        None => {
            let mut prompter = Prompter::stdin();
            prompter.feedback().await?
        }
    };

    assistant
        .record_feedback(query, &answer, feedback)
        .await
        .context("Could not save this interaction")?;

    println!("{}", feedback_message(feedback));
    Ok(())
}

/// Print the most recent interactions
pub async fn history(logger: &InteractionLogger, limit: u32) -> Result<()> {
    let entries = logger.recent(limit).await?;

    if entries.is_empty() {
        println!("No interactions logged yet.");
        return Ok(());
    }

    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

/// Print interaction and feedback counts
pub async fn stats(logger: &InteractionLogger) -> Result<()> {
    let summary = logger.feedback_summary().await?;
    println!("{}", format_summary(&summary));
    Ok(())
}

/// Prompt loop standing in for the search page
pub async fn interactive<Q, C>(assistant: &EtfAssistant<Q, C>) -> Result<()>
where
    Q: QuoteProvider,
    C: CompletionProvider,
{
    let mut prompter = Prompter::stdin();

    println!("ETF Search and Analysis");

    loop {
        let Some(choice) = prompter
            .read_line("\n[t] search ETF  [q] ask a question  [h] history  [x] exit\n> ")
            .await?
        else {
            break;
        };

        match choice.trim().to_ascii_lowercase().as_str() {
            "t" | "ticker" | "search" => {
                let Some(ticker) = prompter
                    .read_line("Enter ETF ticker symbol (e.g., SPY, QQQ): ")
                    .await?
                else {
                    break;
                };
                lookup(assistant, &ticker, false).await?;
            }
            "q" | "ask" | "question" => {
                let Some(query) = prompter
                    .read_line("Enter your question (e.g., 'What is the growth rate of SPY?'): ")
                    .await?
                else {
                    break;
                };
                if query.trim().is_empty() {
                    println!("Please enter a question.");
                    continue;
                }

                let answer = assistant.ask(query.trim()).await;
                println!("Answer: {}", answer);

                let feedback = prompter.feedback().await?;
                // A failed write is reported but does not end the session
                match assistant.record_feedback(query.trim(), &answer, feedback).await {
                    Ok(id) => {
                        info!(id, "Interaction saved");
                        println!("{}", feedback_message(feedback));
                    }
                    Err(e) => {
                        error!("Failed to save interaction: {:#}", e);
                        eprintln!("❌ Could not save this interaction: {:#}", e);
                    }
                }
            }
            "h" | "history" => {
                if let Err(e) = history(assistant.logger(), 10).await {
                    eprintln!("❌ Could not read history: {:#}", e);
                }
            }
            "x" | "exit" | "quit" => break,
            "" => continue,
            other => println!("Unknown choice: {}", other),
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Line-oriented stdin reader
struct Prompter {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompter {
    fn stdin() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `prompt` and read one line; `None` at end of input
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{}", prompt);
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?)
    }

    /// Ask for a thumbs up/down; anything else (or end of input) means no feedback
    async fn feedback(&mut self) -> Result<Option<Feedback>> {
        let line = self
            .read_line("Did you like this response? [y]es / [n]o / Enter to skip: ")
            .await?;
        Ok(parse_feedback_input(line.as_deref().unwrap_or("")))
    }
}

fn parse_feedback_input(input: &str) -> Option<Feedback> {
    input.trim().parse().ok()
}

fn feedback_message(feedback: Option<Feedback>) -> &'static str {
    match feedback {
        Some(Feedback::Positive) => "👍 You liked this response!",
        Some(Feedback::Negative) => "👎 You disliked this response.",
        None => "Interaction saved without feedback.",
    }
}

fn format_report(report: &TickerReport) -> String {
    let mut out = format!("### {} Information", report.ticker);
    for (i, (label, value)) in report.metrics.rows().iter().enumerate() {
        out.push_str(&format!("\n{}. {}: {}", i + 1, label, value));
    }
    out
}

fn format_entry(entry: &InteractionLogEntry) -> String {
    format!(
        "#{} [{}] {}\n    Q: {}\n    A: {}",
        entry.id,
        entry.timestamp,
        entry.feedback.map(|f| f.as_str()).unwrap_or("no feedback"),
        entry.user_query,
        entry.response
    )
}

fn format_summary(summary: &FeedbackSummary) -> String {
    format!(
        "Interactions: {}\n👍 {}  👎 {}  no feedback: {}",
        summary.total(),
        summary.positive,
        summary.negative,
        summary.none
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use etfscout::data::{DisplayMetrics, MetricValue};

    #[test]
    fn test_format_report_shows_sentinel() {
        let report = TickerReport {
            ticker: "SPY".to_string(),
            metrics: DisplayMetrics {
                growth: MetricValue::Available(18.2),
                value: MetricValue::Unavailable,
                dividend_yield: MetricValue::Available(1.25),
            },
        };

        assert_eq!(
            format_report(&report),
            "### SPY Information\n\
             1. Growth (PE Ratio): 18.2\n\
             2. Value (Price to Book): N/A\n\
             3. Dividend Yield (%): 1.25"
        );
    }

    #[test]
    fn test_feedback_input_parsing() {
        assert_eq!(parse_feedback_input("y"), Some(Feedback::Positive));
        assert_eq!(parse_feedback_input(" N "), Some(Feedback::Negative));
        assert_eq!(parse_feedback_input(""), None);
        assert_eq!(parse_feedback_input("maybe"), None);
    }

    #[test]
    fn test_format_entry_without_feedback() {
        let entry = InteractionLogEntry {
            id: 7,
            user_query: "What is VOO?".to_string(),
            response: "An S&P 500 index fund.".to_string(),
            feedback: None,
            timestamp: "2024-05-01 09:30:00".to_string(),
        };

        let text = format_entry(&entry);
        assert!(text.starts_with("#7 [2024-05-01 09:30:00] no feedback"));
        assert!(text.contains("Q: What is VOO?"));
    }
}
