//! Line-oriented driver for one quiz session on stdin/stdout.

use std::time::Duration;

use quiz_core::model::{Selection, SessionKind};
use services::{
    QuizService, QuizSession, QuizSessionError, ScoreResult, StartRequest, SubmissionStatus,
    TimerWatch,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Next,
    Prev,
    Jump(usize),
    Answer(usize),
    Missing,
    Time,
    Submit,
    Help,
    Quit,
}

impl Input {
    /// Parse one line. Question and option numbers are 1-based on screen.
    fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Err("empty command".to_owned());
        };
        let arg = parts.next();
        if parts.next().is_some() {
            return Err(format!("too many arguments: {line}"));
        }

        let number = |what: &str| -> Result<usize, String> {
            let raw = arg.ok_or_else(|| format!("{head} needs a {what} number"))?;
            raw.parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .ok_or_else(|| format!("not a {what} number: {raw}"))
        };

        let input = match head {
            "n" | "next" => Self::Next,
            "p" | "prev" => Self::Prev,
            "j" | "jump" => Self::Jump(number("question")?),
            "a" | "answer" => Self::Answer(number("option")?),
            "m" | "missing" => Self::Missing,
            "t" | "time" => Self::Time,
            "s" | "submit" => Self::Submit,
            "h" | "help" | "?" => Self::Help,
            "q" | "quit" => Self::Quit,
            other => return Err(format!("unknown command: {other}")),
        };
        if arg.is_some() && !matches!(input, Self::Jump(_) | Self::Answer(_)) {
            return Err(format!("{head} takes no argument"));
        }
        Ok(input)
    }
}

pub(crate) fn format_secs(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

fn print_help() {
    println!("Commands:");
    println!("  n / p        next / previous question");
    println!("  j <N>        jump to question N");
    println!("  a <N>        answer the current question with option N");
    println!("  m            list unanswered questions");
    println!("  t            show elapsed and remaining time");
    println!("  s            submit for scoring");
    println!("  q            quit (a comprehensive test can be resumed later)");
}

fn render(session: &QuizSession) {
    let index = session.current_index();
    let question = session.current_question();
    let progress = session.progress();
    println!();
    println!(
        "Question {}/{}  ({} answered)",
        index + 1,
        progress.total,
        progress.answered
    );
    if progress.all_answered() {
        println!("All questions answered. Type s to submit.");
    }
    println!("{}", question.prompt());
    let selected = session.selected_option(index);
    for (i, option) in question.options().iter().enumerate() {
        let marker = if selected == Some(i) { '*' } else { ' ' };
        println!(" {marker} {}. {option}", i + 1);
    }
    if selected.is_some() {
        if let Some(explanation) = question.explanation() {
            println!("   {explanation}");
        }
    }
}

fn print_time(timer: &TimerWatch) {
    let elapsed = format_secs(timer.elapsed_secs());
    match (timer.remaining_secs(), timer.deadline()) {
        (Some(remaining), Some(deadline)) => println!(
            "Elapsed {elapsed}, remaining {} (until {} UTC)",
            format_secs(remaining),
            deadline.format("%H:%M:%S")
        ),
        (Some(remaining), None) => {
            println!("Elapsed {elapsed}, remaining {} (paused)", format_secs(remaining));
        }
        (None, _) if !timer.is_running() => println!("Elapsed {elapsed} (paused)"),
        (None, _) => println!("Elapsed {elapsed}"),
    }
}

fn print_result(result: &ScoreResult) {
    println!();
    println!(
        "Score: {} / {}  (time {})",
        result.score,
        result.total,
        format_secs(result.time_spent)
    );
    for (key, value) in &result.extra {
        println!("  {key}: {value}");
    }
}

/// Report a submission outcome. Returns true once the session is scored.
fn report(outcome: Result<ScoreResult, QuizSessionError>, session: &QuizSession) -> bool {
    match outcome {
        Ok(result) => {
            print_result(&result);
            true
        }
        Err(err) => {
            if let SubmissionStatus::Failed { message, .. } = session.status() {
                println!("Submission failed: {message}. Type s to retry.");
            } else {
                println!("Cannot submit: {err}");
            }
            false
        }
    }
}

async fn open_session(
    service: &QuizService,
    request: &StartRequest,
) -> Result<QuizSession, QuizSessionError> {
    if request.kind == SessionKind::ComprehensiveTest {
        if let Some(session) = service.resume_persisted().await? {
            println!("Resuming saved comprehensive test.");
            return Ok(session);
        }
    }
    service.start_session(request).await
}

async fn sleep_until_expiry(remaining: Option<u64>) {
    match remaining {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => std::future::pending().await,
    }
}

/// Run an interactive session until it is scored or the user quits.
///
/// # Errors
///
/// Returns an error if the session cannot be started or stdin fails.
pub(crate) async fn play(
    service: &QuizService,
    request: &StartRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(service, request).await?;
    let timer = session.timer_watch();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // Cleared after a failed automatic submit; retries are then manual.
    let mut auto_submit = true;

    print_help();
    render(&session);

    loop {
        let remaining = timer.remaining_secs().filter(|_| auto_submit);
        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = sleep_until_expiry(remaining) => {
                if let Some(outcome) = service.submit_if_expired(&mut session).await {
                    println!();
                    println!("Time is up.");
                    if report(outcome, &session) {
                        break;
                    }
                    auto_submit = false;
                }
                continue;
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        if auto_submit {
            if let Some(outcome) = service.submit_if_expired(&mut session).await {
                println!("Time is up.");
                if report(outcome, &session) {
                    break;
                }
                auto_submit = false;
                continue;
            }
        }

        let input = match Input::parse(&line) {
            Ok(input) => input,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        match input {
            Input::Next => {
                if session.next() {
                    render(&session);
                } else {
                    println!("Already at the last question.");
                }
            }
            Input::Prev => {
                if session.prev() {
                    render(&session);
                } else {
                    println!("Already at the first question.");
                }
            }
            Input::Jump(index) => match session.jump_to(index) {
                Ok(()) => render(&session),
                Err(err) => println!("{err}"),
            },
            Input::Answer(option) => match session.select_current(option) {
                Ok(Selection::Recorded(_)) => render(&session),
                Ok(Selection::AlreadyAnswered(answer)) => {
                    println!(
                        "Already answered with option {}.",
                        answer.selected_option_index + 1
                    );
                    render(&session);
                }
                Err(err) => println!("{err}"),
            },
            Input::Missing => {
                let missing = session.state().unanswered_indices();
                if missing.is_empty() {
                    println!("All questions answered.");
                } else {
                    let list: Vec<String> = missing.iter().map(|i| (i + 1).to_string()).collect();
                    println!("Unanswered: {}", list.join(", "));
                }
            }
            Input::Time => print_time(&timer),
            Input::Submit => {
                println!("Submitting...");
                let outcome = service.submit(&mut session).await;
                if report(outcome, &session) {
                    break;
                }
            }
            Input::Help => print_help(),
            Input::Quit => {
                if session.is_persisted() {
                    println!("Progress saved. Run play --kind test to resume.");
                }
                break;
            }
        }
    }

    session.flush().await;
    Ok(())
}
