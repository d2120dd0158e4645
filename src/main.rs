use anyhow::Context;
use chrono::{NaiveDate, Utc};
use client::{Backend, HttpBackend, PersistClient};
use core::num::NonZeroI64;
use std::{env, sync::Arc};
use sync::{
    channel::{LocalBus, Transport},
    clock::{Clock, SystemClock},
    directory::Directory,
    session::{Session, SessionConfig},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    runtime::Runtime,
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Parse environment variables
    let base = env::var("BACKEND_URL").context("BACKEND_URL not set")?;
    let class_id: NonZeroI64 = env::var("CLASS_ID").context("CLASS_ID not set")?.parse()?;
    let teacher_id: NonZeroI64 = env::var("TEACHER_ID").context("TEACHER_ID not set")?.parse()?;
    let date = match env::var("DATE") {
        Ok(date) => date.parse()?,
        _ => Utc::now().date_naive(),
    };

    let runtime = Runtime::new()?;
    runtime.block_on(run(&base, class_id, teacher_id, date))
}

/// Headless class-day view: today's question on stdout, check-ins from
/// stdin as `<studentId> <answer>` lines, the running tally reprinted on
/// every change (local or from another viewer).
async fn run(
    base: &str,
    class_id: NonZeroI64,
    teacher_id: NonZeroI64,
    date: NaiveDate,
) -> anyhow::Result<()> {
    let backend = Arc::new(HttpBackend::new(base)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let directory = Arc::new(Directory::new(
        PersistClient::from(backend as Arc<dyn Backend>),
        Arc::clone(&clock),
    ));
    let transport: Arc<dyn Transport> = Arc::new(LocalBus::new());

    let mut rng = rand::thread_rng();
    let (question, exhausted) = directory.pick_question(teacher_id, &mut rng).await?;
    if exhausted {
        log::warn!("every question was used within the last week; repeats are possible");
    }
    println!("{date}: {}", question.text);

    let session = Session::open(
        SessionConfig {
            class_id,
            date,
            question,
            on_persist_failure: Some(Box::new(|record| {
                log::error!(
                    "check-in for student {} could not be saved; it is visible on this screen only",
                    record.student_id
                );
            })),
        },
        directory,
        transport,
        clock,
    )
    .await?;

    session.subscribe_stats(|stats| {
        let mut line = format!("{} of {} checked in", stats.responded, stats.total_students);
        for (answer, count) in &stats.per_answer {
            line.push_str(&format!(" | {answer}: {count}"));
        }
        if stats.other > 0 {
            line.push_str(&format!(" | other: {}", stats.other));
        }
        println!("{line}");
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => match parse_check_in(&line) {
                    Some((student, answer)) => session.set_answer(student, answer),
                    None => log::warn!("expected `<studentId> <answer>`, got {line:?}"),
                },
                None => break,
            },
        }
    }

    session.close();
    Ok(())
}

fn parse_check_in(line: &str) -> Option<(NonZeroI64, &str)> {
    let (id, answer) = line.trim().split_once(' ')?;
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }
    Some((id.parse().ok()?, answer))
}
