//! ns-capture: NeuroShield assessment client
//!
//! Account commands talk to the backend directly. `assess` runs the capture
//! controller against ffmpeg-backed devices, rendering snapshots to the
//! terminal and reading commands from stdin.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use ns_capture::auth::{AuthContext, FileTokenStore};
use ns_capture::config::{ClientSettings, ClientToml, Cli, Command, MODULE_NAME};
use ns_capture::device::LogPreview;
use ns_capture::ffmpeg::{FfmpegDevices, FfmpegRecorderFactory};
use ns_capture::history::{format_entry, trend, TREND_WINDOW};
use ns_capture::upload::ApiClient;
use ns_capture::{AssessmentTool, CaptureError, Collaborators, SessionSnapshot, Stage};
use ns_common::config::{
    load_toml_or_default, report_config_warning, RootFolderInitializer, RootFolderResolver,
};
use ns_common::logging::{default_directives, init_tracing};
use ns_common::risk::AssessmentResult;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

type Auth = AuthContext<FileTokenStore>;
type Input = Lines<BufReader<Stdin>>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(|| RootFolderResolver::new(MODULE_NAME).config_file_path());
    let (toml, config_warning): (ClientToml, _) = load_toml_or_default(config_path.as_deref());
    let settings = ClientSettings::resolve(&cli, toml);

    let directives = default_directives(&["ns_capture", "ns_common"], &settings.logging.level);
    init_tracing(&directives, &settings.logging).context("Failed to initialize logging")?;

    info!(
        "Starting NeuroShield capture client ({}) v{}",
        MODULE_NAME,
        env!("CARGO_PKG_VERSION")
    );
    report_config_warning(config_warning);

    RootFolderInitializer::new(settings.root_folder.clone()).ensure_directory_exists()?;

    let client = ApiClient::new(&settings.api_url, settings.request_timeout)?;
    info!("Backend: {}", client.base_url());
    let auth = Arc::new(AuthContext::new(
        client,
        FileTokenStore::new(settings.credentials_path.clone()),
    ));

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    match cli.command.clone() {
        Command::Register { email, password } => {
            let password = password_or_prompt(password, &mut input).await?;
            let user = auth.register(&email, &password).await?;
            println!("Registered and signed in as {}", user.email);
        }
        Command::Login { email, password } => {
            let password = password_or_prompt(password, &mut input).await?;
            let user = auth.login(&email, &password).await?;
            println!("Signed in as {}", user.email);
        }
        Command::Logout => {
            auth.logout()?;
            println!("Signed out");
        }
        Command::History => show_history(&auth).await?,
        Command::Assess { back_camera } => {
            run_assessment(auth, &settings, back_camera, &mut input).await?
        }
    }

    Ok(())
}

async fn password_or_prompt(password: Option<String>, input: &mut Input) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    let line = prompt("Password: ", input, &CancellationToken::new())
        .await?
        .ok_or_else(|| anyhow!("No password given"))?;
    Ok(line)
}

async fn show_history(auth: &Auth) -> Result<()> {
    let sessions = auth.sessions().await?;
    if sessions.is_empty() {
        println!("No assessments yet.");
        return Ok(());
    }

    for session in &sessions {
        println!("{}", format_entry(session));
    }
    if let Some(trend) = trend(&sessions) {
        println!(
            "\nTrend over the last {} assessments: {}",
            sessions.len().min(TREND_WINDOW),
            trend
        );
    }
    Ok(())
}

async fn run_assessment(
    auth: Arc<Auth>,
    settings: &ClientSettings,
    back_camera: bool,
    input: &mut Input,
) -> Result<()> {
    if !auth.is_authenticated() {
        bail!("Not signed in. Run `ns-capture login <email>` first.");
    }

    let ffmpeg = Arc::new(settings.ffmpeg.clone());
    let deps = Collaborators {
        devices: Arc::new(FfmpegDevices::new(Arc::clone(&ffmpeg))),
        recorders: Arc::new(FfmpegRecorderFactory::new(ffmpeg)),
        api: auth,
        preview: Arc::new(LogPreview),
    };
    let mut tool = AssessmentTool::new(deps, settings.assessment_config());
    let renderer = tokio::spawn(render(tool.subscribe()));

    let cancel = tool.cancel_handle();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, cancelling assessment");
                cancel.cancel();
            }
        })
    };

    let outcome = drive(&mut tool, input, back_camera, &cancel, settings.recording_secs).await;

    interrupt.abort();
    tool.teardown();
    renderer.abort();

    match outcome {
        Ok(Some(result)) => {
            print_result(&result);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(CaptureError::Cancelled) => {
            println!("\nAssessment cancelled.");
            Ok(())
        }
        Err(CaptureError::Input(e)) => {
            Err(anyhow::Error::new(e).context("Failed to read commands from stdin"))
        }
        Err(e) => Err(anyhow!("Assessment failed: {}", e.user_message())),
    }
}

/// Walk the controller from Intro to Results; `None` when the user quits
async fn drive(
    tool: &mut AssessmentTool,
    input: &mut Input,
    back_camera: bool,
    cancel: &CancellationToken,
    recording_secs: u32,
) -> Result<Option<AssessmentResult>, CaptureError> {
    println!("NeuroShield assessment");
    println!(
        "You will be recorded for {} seconds. Face the camera, then read a sentence aloud.",
        recording_secs
    );
    if prompt("Press Enter to begin ", input, cancel).await?.is_none() {
        return Ok(None);
    }

    recoverable(tool.begin().await)?;
    if back_camera {
        recoverable(tool.toggle_camera().await)?;
    }

    loop {
        let Some(line) =
            prompt("[Enter] record  [f] switch camera  [r] retry devices  [q] quit: ", input, cancel)
                .await?
        else {
            return Ok(None);
        };

        match line.trim() {
            "" => match tool.start_recording().await {
                Ok(result) => return Ok(Some(result)),
                Err(CaptureError::Device(_)) => continue,
                Err(e) => return Err(e),
            },
            "f" => recoverable(tool.toggle_camera().await)?,
            "r" => recoverable(tool.prepare().await)?,
            "q" => return Ok(None),
            other => println!("Unknown command: {}", other),
        }
    }
}

/// Device failures are shown by the renderer and leave the session in Prep
fn recoverable(result: Result<(), CaptureError>) -> Result<(), CaptureError> {
    match result {
        Err(CaptureError::Device(e)) => {
            warn!(error = %e, "Device unavailable");
            Ok(())
        }
        other => other,
    }
}

/// Read one line; `None` on end of input
async fn prompt(
    text: &str,
    input: &mut Input,
    cancel: &CancellationToken,
) -> Result<Option<String>, CaptureError> {
    print!("{}", text);
    let _ = std::io::stdout().flush();

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CaptureError::Cancelled),
        line = input.next_line() => line.map_err(CaptureError::Input),
    }
}

async fn render(mut rx: watch::Receiver<SessionSnapshot>) {
    let mut last = rx.borrow_and_update().clone();

    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();

        if snapshot.stage != last.stage {
            if last.stage == Stage::Recording {
                println!();
            }
            println!("[{}]", snapshot.stage);
        }
        if snapshot.countdown != last.countdown {
            if let Some(value) = snapshot.countdown {
                println!("  {}...", value);
            }
        }
        if snapshot.stage == Stage::Recording && snapshot.progress != last.progress {
            print!(
                "\r  Recording {:>3.0}%  ({} video / {} audio chunks)",
                snapshot.progress, snapshot.video_chunks, snapshot.audio_chunks
            );
            let _ = std::io::stdout().flush();
        }
        if snapshot.facing_mode != last.facing_mode {
            println!("  Using {} camera", snapshot.facing_mode);
        }
        if snapshot.error != last.error {
            if let Some(error) = &snapshot.error {
                println!("  {}", error);
            }
        }

        last = snapshot;
    }
}

fn print_result(result: &AssessmentResult) {
    println!();
    println!("Risk score:        {}", result.display_percent());
    println!("Risk class:        {}", result.risk_class);
    println!("Motor control:     {}", result.motor_control);
    println!("Speech pattern:    {}", result.speech_pattern);
    println!("Facial expression: {}", result.facial_expression);
}
