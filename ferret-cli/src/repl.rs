//! Single-query and interactive modes.

use ferret_core::ResearchAgent;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit"];

/// Answer one query and print the answer to stdout.
pub async fn run_single_query(
    agent: &ResearchAgent,
    thread_id: &str,
    query: &str,
) -> anyhow::Result<()> {
    let answer = agent.ask_in_thread(thread_id, query).await?;
    println!("{answer}");
    Ok(())
}

/// Read questions line by line until EOF or an exit command.
///
/// Every question is a turn of the same thread, so follow-ups see earlier
/// answers. A failed turn is reported and the session continues.
pub async fn run_interactive(agent: &ResearchAgent, thread_id: &str) -> anyhow::Result<()> {
    println!("Ferret research agent (thread {thread_id})");
    println!("Ask a question, or type 'exit' to quit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit(input) {
            break;
        }

        match agent.ask_in_thread(thread_id, input).await {
            Ok(answer) => println!("\n{answer}\n"),
            Err(e) => {
                tracing::warn!(error = %e, "Query failed");
                eprintln!("Error: {e}\n");
            }
        }
    }
    Ok(())
}

fn is_exit(input: &str) -> bool {
    EXIT_COMMANDS
        .iter()
        .any(|cmd| input.eq_ignore_ascii_case(cmd))
}
