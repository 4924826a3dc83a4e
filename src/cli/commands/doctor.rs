//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::Settings;
use crate::llm::{LlmClient, OllamaClient};
use crate::transcription::{
    ComputeDevice, HostedPipelineBackend, LocalModelBackend, TranscriptionBackend,
};
use console::style;
use std::path::Path;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn print_section(title: &str, checks: &[CheckResult]) {
    println!("{}", style(title).bold());
    for check in checks {
        check.print();
    }
    println!();
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Referat Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    let tools = vec![
        check_tool("ffmpeg", &settings.audio.ffmpeg, &["-version"], install_hint_ffmpeg()),
        check_tool("ffprobe", &settings.audio.ffprobe, &["-version"], install_hint_ffmpeg()),
    ];
    print_section("External Tools", &tools);
    checks.extend(tools);

    let transcription = check_transcription(settings).await;
    print_section("Transcription", &transcription);
    checks.extend(transcription);

    let llm = vec![check_llm(settings).await];
    print_section("LLM Endpoint", &llm);
    checks.extend(llm);

    let config = vec![check_config_file()];
    print_section("Configuration", &config);
    checks.extend(config);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before running Referat.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Referat is ready to use.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str, cmd: &str, args: &[&str], hint: &str) -> CheckResult {
    match Command::new(cmd).args(args).output() {
        Ok(output) if output.status.success() => {
            let version = first_line(&String::from_utf8_lossy(&output.stdout), "installed");
            CheckResult::ok(name, &version)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// First non-empty line, truncated for display.
fn first_line(text: &str, fallback: &str) -> String {
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or(fallback);

    if line.chars().count() > 50 {
        format!("{}...", line.chars().take(50).collect::<String>())
    } else {
        line.to_string()
    }
}

/// Both transcription backends are optional on their own; one is required.
async fn check_transcription(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();
    let local_settings = &settings.transcription.local;

    let device = ComputeDevice::detect().await;
    results.push(CheckResult::ok(
        "Compute device",
        &format!("{} ({})", device, device.precision()),
    ));

    let binary_found = Command::new(&local_settings.binary).arg("--help").output().is_ok();
    results.push(if binary_found {
        CheckResult::ok(&local_settings.binary, "found")
    } else {
        CheckResult::warning(
            &local_settings.binary,
            "not found",
            "Build whisper.cpp and put whisper-cli on your PATH, or set transcription.local.binary",
        )
    });

    let model_found = match LocalModelBackend::new(settings, device) {
        Ok(local) => {
            let check = check_model_file(local.model_path(), settings);
            let found = check.status == CheckStatus::Ok;
            results.push(check);
            found
        }
        Err(e) => {
            results.push(CheckResult::warning(
                "Local backend",
                &e.to_string(),
                "Check the [transcription.local] window settings",
            ));
            false
        }
    };

    let hosted_ok = match HostedPipelineBackend::new(settings) {
        Ok(hosted) => match hosted.check_available().await {
            Ok(()) => {
                results.push(CheckResult::ok("Hosted pipeline", &format!("{} available", hosted.model_id())));
                true
            }
            Err(e) => {
                results.push(CheckResult::warning(
                    "Hosted pipeline",
                    &e.to_string(),
                    "Only needed when the local backend is unavailable",
                ));
                false
            }
        },
        Err(e) => {
            results.push(CheckResult::warning(
                "Hosted pipeline",
                &e.to_string(),
                "Check transcription.hosted.base_url",
            ));
            false
        }
    };

    if !(binary_found && model_found) && !hosted_ok {
        results.push(CheckResult::error(
            "Backends",
            "no transcription backend is usable",
            "Install the local model or start the hosted pipeline server",
        ));
    }

    results
}

fn check_model_file(model_path: &Path, settings: &Settings) -> CheckResult {
    match std::fs::metadata(model_path) {
        Ok(meta) if meta.is_file() => CheckResult::ok(
            "Speech model",
            &format!("{} ({})", model_path.display(), format_size(meta.len())),
        ),
        _ => CheckResult::warning(
            "Speech model",
            &format!("{} missing", model_path.display()),
            &format!(
                "Download ggml-{}.bin from huggingface.co/ggerganov/whisper.cpp into {}",
                settings.transcription.model_size,
                settings.models_dir().display()
            ),
        ),
    }
}

async fn check_llm(settings: &Settings) -> CheckResult {
    let client = match OllamaClient::from_settings(settings) {
        Ok(client) => client,
        Err(e) => return CheckResult::error("LLM endpoint", &e.to_string(), "Check [llm] host and port"),
    };

    match client.list_models().await {
        Ok(models) if models.is_empty() => CheckResult::error(
            "LLM endpoint",
            &format!("{} serves no models", client.endpoint()),
            "Pull a model, e.g. `ollama pull llama3`",
        ),
        Ok(models) => match &settings.llm.model {
            Some(model) if !models.contains(model) => CheckResult::error(
                "LLM endpoint",
                &format!("configured model '{}' is not served", model),
                &format!("Available: {}", models.join(", ")),
            ),
            _ => CheckResult::ok(
                "LLM endpoint",
                &format!("{} ({} model(s))", client.endpoint(), models.len()),
            ),
        },
        Err(e) => CheckResult::error(
            "LLM endpoint",
            &format!("{} unreachable: {}", client.endpoint(), e),
            "Start the server with `ollama serve` or pass --llm-host/--llm-port",
        ),
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: referat config edit",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_missing_tool_is_error() {
        let result = check_tool("nope", "referat-missing-tool", &["-version"], "install it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.message, "not found");
    }

    #[test]
    fn test_first_line_truncates() {
        assert_eq!(first_line("\n ffmpeg version 6.1 \nbuilt with gcc", "x"), "ffmpeg version 6.1");
        assert_eq!(first_line("", "installed"), "installed");
        assert_eq!(first_line(&"a".repeat(80), "x").len(), 53);
    }

    #[tokio::test]
    async fn test_misconfigured_backends_are_reported() {
        let mut settings = Settings::default();
        settings.transcription.local.binary = "referat-missing-whisper".to_string();
        settings.transcription.local.safety_margin_seconds = settings.transcription.local.single_pass_ceiling_seconds;
        settings.transcription.hosted.base_url = "not a url".to_string();

        let results = check_transcription(&settings).await;

        let local = results.iter().find(|c| c.name == "Local backend").unwrap();
        assert_eq!(local.status, CheckStatus::Warning);
        let hosted = results.iter().find(|c| c.name == "Hosted pipeline").unwrap();
        assert!(hosted.message.contains("not a url"));
        let verdict = results.iter().find(|c| c.name == "Backends").unwrap();
        assert_eq!(verdict.status, CheckStatus::Error);
    }

    #[test]
    fn test_model_file_check() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("ggml-small.bin");
        let settings = Settings::default();

        assert_eq!(check_model_file(&model, &settings).status, CheckStatus::Warning);
        std::fs::write(&model, vec![0u8; 2048]).unwrap();
        let check = check_model_file(&model, &settings);
        assert_eq!(check.status, CheckStatus::Ok);
        assert!(check.message.ends_with("(2.0 KB)"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}
