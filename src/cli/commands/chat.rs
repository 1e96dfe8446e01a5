//! Interactive coaching session.

use super::coach_completer;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::coach::{CoachingSession, STEP_COUNT};
use crate::config::Settings;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Query) {
        Output::error(&format!("{}", e));
        Output::info("Run 'coachloop doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let completer = coach_completer(&settings)?;
    let mut session = CoachingSession::new();

    println!("\n{}", style("Coaching with Joel").bold().cyan());
    println!(
        "{}\n",
        style(
            "Say hello to begin. Ask for a 'summary' at any time, \
             'reset' to start over, or 'exit' to quit."
        )
        .dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!(
            "{} ",
            style(format!("[{}/{}] You:", session.current_step(), STEP_COUNT))
                .green()
                .bold()
        );
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("reset") {
            session.reset();
            Output::info("Session reset. Say hello to begin again.");
            continue;
        }

        let reply = session.respond(&completer, input).await;
        Output::coach(&reply);
    }

    Ok(())
}
