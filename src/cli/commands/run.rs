//! Run command implementation.

use crate::cli::{format_duration, Output, RunArgs};
use crate::config::Settings;
use crate::media::{discover_videos, OutputLayout};
use crate::orchestrator::{Pipeline, RunContext, RunReport};
use crate::transcription::BackendChoice;
use anyhow::Result;
use console::style;
use std::io::{self, IsTerminal, Write};

/// Run the full pipeline over a folder of videos.
pub async fn run_pipeline(args: &RunArgs, mut settings: Settings) -> Result<()> {
    args.apply_to(&mut settings);
    let preferred: BackendChoice = settings.transcription.backend.parse()?;

    let videos = discover_videos(&args.input)?;
    if videos.is_empty() {
        Output::warning(&format!(
            "No video files found in {}",
            args.input.display()
        ));
        return Ok(());
    }

    let layout = args
        .output
        .clone()
        .map(OutputLayout::at)
        .unwrap_or_else(|| OutputLayout::for_input(&args.input));

    Output::header("Referat");
    Output::kv("Input", &args.input.display().to_string());
    Output::kv("Videos", &videos.len().to_string());
    Output::kv("Output", &layout.root.display().to_string());

    let spinner = Output::spinner("Resolving transcription backend and LLM model...");
    let prompt_bar = spinner.clone();
    let ctx = RunContext::build(settings, preferred, move |models| {
        prompt_bar.suspend(|| choose_model(models))
    })
    .await;
    spinner.finish_and_clear();
    let ctx = ctx?;

    if ctx.backend.fell_back {
        Output::warning(&format!(
            "Preferred backend '{}' is unavailable, using {}",
            preferred,
            ctx.backend.backend.name()
        ));
    }
    Output::kv("Transcription", &ctx.backend.backend.name());
    Output::kv("LLM model", &ctx.llm_model);
    println!();

    let bar = Output::progress_bar(videos.len() as u64, "Processing");
    let report = Pipeline::new(&ctx, layout)
        .with_progress(bar)
        .run(&videos)
        .await?;

    print_report(&report);

    if let Some(path) = &args.report {
        report.write_json(path)?;
        Output::info(&format!("Report written to {}", path.display()));
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    for job in &report.jobs {
        Output::job(job);
    }
    println!();

    let seconds = report.elapsed().num_milliseconds() as f64 / 1000.0;
    let tally = format!(
        "{} processed, {} succeeded, {} skipped",
        report.processed(),
        report.succeeded(),
        report.skipped()
    );

    if report.succeeded() == report.processed() {
        Output::success(&format!("{} in {}", tally, format_duration(seconds)));
    } else {
        Output::warning(&format!("{} in {}", tally, format_duration(seconds)));
        let partial = report.summary_failures() + report.incomplete();
        if partial > 0 {
            Output::info(&format!("{} job(s) are missing an output file", partial));
        }
    }
}

/// Ask the user to pick one of several models.
fn choose_model(models: &[String]) -> Option<String> {
    if !io::stdin().is_terminal() {
        return None;
    }

    println!("{}", style("Available LLM models").bold());
    for (i, model) in models.iter().enumerate() {
        println!("  {} {}", style(format!("{}.", i + 1)).cyan(), model);
    }

    loop {
        print!("{} Select a model [1-{}]: ", style("?").cyan(), models.len());
        io::stdout().flush().ok()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input).ok()? == 0 {
            return None;
        }

        match parse_selection(&input, models.len()) {
            Some(i) => return Some(models[i].clone()),
            None => Output::warning("Enter one of the listed numbers."),
        }
    }
}

/// Turn a 1-based menu answer into an index.
fn parse_selection(input: &str, count: usize) -> Option<usize> {
    match input.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}
