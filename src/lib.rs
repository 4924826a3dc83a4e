//! Referat - batch video summarizer
//!
//! Turns a folder of recorded lectures or talks into transcripts and
//! structured summaries, entirely against local services.
//!
//! # Overview
//!
//! For every video in the input folder Referat:
//! - Extracts the audio track with ffmpeg
//! - Transcribes it with a local whisper.cpp model or a hosted ASR pipeline
//! - Splits the transcript into overlapping token windows
//! - Summarizes the windows with a local LLM and merges the section summaries
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `media` - Input discovery and output layout
//! - `audio` - Audio extraction and long-recording windows
//! - `transcription` - Speech-to-text backends and backend selection
//! - `chunking` - Token-based transcript chunking
//! - `llm` - LLM endpoint client
//! - `summarize` - Map-reduce summarization
//! - `orchestrator` - Sequential batch pipeline
//!
//! # Example
//!
//! ```rust,no_run
//! use referat::config::Settings;
//! use referat::media::{discover_videos, OutputLayout};
//! use referat::orchestrator::{Pipeline, RunContext};
//! use referat::transcription::BackendChoice;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let ctx = RunContext::build(settings, BackendChoice::Local, |models| models.first().cloned()).await?;
//!
//!     let input = Path::new("lectures");
//!     let videos = discover_videos(input)?;
//!     let report = Pipeline::new(&ctx, OutputLayout::for_input(input)).run(&videos).await?;
//!     println!("{} of {} summarized", report.succeeded(), report.processed());
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod media;
pub mod orchestrator;
pub mod summarize;
pub mod transcription;

pub use error::{ReferatError, Result};
