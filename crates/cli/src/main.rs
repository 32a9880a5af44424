use anyhow::Context;
use clap::{Parser, Subcommand};
use lib::dashboard::{model, DashboardClient, DashboardLoader, LoadState};
use lib::session::MessageLog;
use lib::transcription::{Attachment, CommandSource, Recorder, TranscriptionClient, TranscriptionPanel};
use lib::tutor::{PendingImage, SessionContext, TutorClient, TutorPanel};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ipeth")]
#[command(about = "IPETH CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and an empty config file (all settings fall back to defaults).
    Init {
        /// Config file path (default: IPETH_CONFIG_PATH or ~/.ipeth/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Audio/text conversion assistant (interactive). Lines are sent as text; /file, /record, /send, /cancel, /clear, /exit.
    Transcribe {
        /// Config file path (default: IPETH_CONFIG_PATH or ~/.ipeth/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Tutor chat (interactive). Asks for a student id first; /id, /image, /exit.
    Tutor {
        /// Config file path (default: IPETH_CONFIG_PATH or ~/.ipeth/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Fetch the analytics summary and print it as tables.
    Dashboard {
        /// Config file path (default: IPETH_CONFIG_PATH or ~/.ipeth/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Aggregation level (default from config or "universidad")
        #[arg(long, short)]
        level: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("ipeth {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Transcribe { config }) => {
            if let Err(e) = run_transcribe(config).await {
                log::error!("transcribe failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Tutor { config }) => {
            if let Err(e) = run_tutor(config).await {
                log::error!("tutor failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Dashboard { config, level }) => {
            match run_dashboard(config, level).await {
                Ok(true) => {}
                Ok(false) => std::process::exit(1),
                Err(e) => {
                    log::error!("dashboard failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)
        .with_context(|| format!("initializing {}", path.display()))?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

/// Read one trimmed line after printing `prompt`. None on EOF.
fn read_line(prompt: &str) -> anyhow::Result<Option<String>> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn is_exit(input: &str) -> bool {
    input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit")
}

/// Print bot messages appended since the last call. A log that shrank was reset; start over.
fn print_new(log: &MessageLog, printed: &mut usize) {
    if log.len() < *printed {
        *printed = 0;
    }
    for msg in log.as_slice().iter().skip(*printed) {
        if msg.is_user() {
            continue;
        }
        println!("< {}", msg.text);
        if let Some(ref url) = msg.audio_url {
            println!("  🔊 {}", url);
        }
    }
    *printed = log.len();
}

async fn run_transcribe(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    let client = TranscriptionClient::new(lib::config::resolve_transcription_url(&config));
    log::info!("transcription service at {}", client.base_url());
    let recorder = Recorder::new(Box::new(CommandSource::ffmpeg(&config.capture)))
        .with_clip_dir(lib::config::resolve_clip_dir(&path));
    let mut panel = TranscriptionPanel::new(recorder);
    let mut printed = 0;

    println!("{}", lib::transcription::panel::GREETING);
    loop {
        let prompt = if panel.is_recording() { "🎙 > " } else { "> " };
        let Some(input) = read_line(prompt)? else {
            break;
        };
        if input.is_empty() {
            continue;
        }
        if is_exit(&input) {
            break;
        }

        if let Some(arg) = input.strip_prefix("/file ") {
            match Attachment::from_path(std::path::Path::new(arg.trim())) {
                Ok(a) => {
                    let name = a.name.clone();
                    if panel.select_attachment(a) {
                        println!("📎 {}", name);
                    }
                }
                Err(e) => eprintln!("could not read {}: {}", arg.trim(), e),
            }
            continue;
        }
        match input.as_str() {
            "/cancel" => {
                panel.cancel_attachment();
                continue;
            }
            "/clear" => {
                panel.clear_log();
                printed = 0;
                continue;
            }
            "/record" => {
                if panel.toggle_recording().is_ok() {
                    if panel.is_recording() {
                        println!("🎙 grabando (/record para detener)");
                    } else if let Some(a) = panel.attachment() {
                        println!("📎 {} ({} bytes)", a.name, a.bytes.len());
                    }
                }
            }
            "/send" => send_transcription(&mut panel, &client).await,
            _ => {
                panel.input = input.clone();
                send_transcription(&mut panel, &client).await;
            }
        }
        if let Some(notice) = panel.take_notice() {
            eprintln!("! {}", notice);
        }
        print_new(panel.log(), &mut printed);
    }
    Ok(())
}

async fn send_transcription(panel: &mut TranscriptionPanel, client: &TranscriptionClient) {
    match panel.begin_send() {
        Ok(Some(job)) => {
            println!("⏳ Procesando…");
            let outcome = job.run(client).await;
            panel.complete(outcome);
        }
        Ok(None) => {}
        Err(rejection) => log::debug!("send rejected: {:?}", rejection),
    }
}

async fn run_tutor(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    let client = TutorClient::new(lib::config::resolve_tutor_url(&config));
    let store = lib::store::FileStore::new(lib::config::resolve_state_path(&config, &path));
    log::debug!("tutor identity stored in {}", store.path().display());
    let mut panel = TutorPanel::new(
        SessionContext::new(Arc::new(store)),
        config.tutor.forget_rejected_identity,
    );
    let mut printed = 0;

    loop {
        print_new(panel.log(), &mut printed);

        if panel.gate().is_prompt_open() {
            println!("Identifícate. Ingresa tu matrícula para continuar.");
            let Some(input) = read_line("matrícula (Ej. UNIV011)> ")? else {
                break;
            };
            if is_exit(&input) {
                break;
            }
            if input == "/cancel" {
                if !panel.gate_mut().cancel() {
                    eprintln!("! se necesita una matrícula");
                }
                continue;
            }
            panel.gate_mut().draft = input;
            match panel.submit_identity() {
                Ok(()) => {
                    if let Some(id) = panel.gate().identity() {
                        println!("👤 {}", id);
                    }
                }
                Err(e) => eprintln!("! {}", e),
            }
            continue;
        }

        let Some(input) = read_line("> ")? else {
            break;
        };
        if is_exit(&input) {
            break;
        }
        if input == "/id" {
            panel.gate_mut().open_change();
            continue;
        }
        if let Some(arg) = input.strip_prefix("/image ") {
            match PendingImage::from_path(std::path::Path::new(arg.trim())) {
                Ok(img) => {
                    let size = img.bytes.len();
                    if panel.attach_image(img) {
                        println!("📷 imagen lista ({} bytes)", size);
                    }
                }
                Err(e) => eprintln!("! {}", e),
            }
            continue;
        }

        panel.input = input;
        if let Some(job) = panel.begin_send() {
            println!("⏳ Escribiendo respuesta…");
            let result = client.send(&job.request).await;
            panel.complete(job.ticket, result);
        }
    }
    Ok(())
}

/// Returns false when the summary could not be loaded.
async fn run_dashboard(config_path: Option<PathBuf>, level: Option<String>) -> anyhow::Result<bool> {
    let (config, _) = lib::config::load_config(config_path)?;
    let client = DashboardClient::new(lib::config::resolve_dashboard_url(&config));
    let level = level.unwrap_or_else(|| config.dashboard.level.clone());

    let (mut loader, job) = DashboardLoader::mount(level);
    if let Some(job) = job {
        println!("{}", lib::dashboard::loader::LOADING_TEXT);
        let result = job.run(&client).await;
        loader.complete(job.ticket, result);
    }

    match loader.state() {
        LoadState::Loading => Ok(false),
        LoadState::Error(text) => {
            eprintln!("{}", text);
            Ok(false)
        }
        LoadState::Loaded(data) => {
            print_dashboard(data);
            Ok(true)
        }
    }
}

fn print_dashboard(data: &model::DashboardData) {
    let summary = &data.summary;
    let perf = &summary.performance_distribution;
    println!("{}\n", lib::dashboard::loader::TITLE);
    println!("Total estudiantes: {}", model::format_number(summary.total_students));
    println!(
        "🔴 Alto: {} | 🟠 Medio: {} | 🟢 Bajo: {}",
        model::format_number(perf.alto),
        model::format_number(perf.medio),
        model::format_number(perf.bajo)
    );

    println!("\n📚 Distribución por semestre");
    println!("{:<24} {:>12}", "Semestre", "Estudiantes");
    for row in summary.semester_rows() {
        println!("{:<24} {:>12}", row.label, model::format_number(row.count));
    }

    println!("\n🎓 Distribución por programa");
    println!("{:<24} {:>12}", "Programa", "Estudiantes");
    for row in summary.program_rows() {
        println!("{:<24} {:>12}", row.label, model::format_number(row.count));
    }

    println!("\n📈 Tendencias (Semanas 9-12)");
    println!(
        "{:<10} {:>14} {:>12} {:>8} {:>12}",
        "Semana", "Nota Promedio", "Asistencia", "Tareas", "Estudiantes"
    );
    for t in &data.trends {
        println!(
            "{:<10} {:>14} {:>12} {:>8} {:>12}",
            t.week_label(),
            model::format_number(t.avg_grade),
            model::format_percent(t.avg_attendance),
            model::format_number(t.avg_assignments),
            model::format_number(t.student_count)
        );
    }

    let risk = data.risk_rows();
    if !risk.is_empty() {
        println!("\n⚠️ Riesgo");
        for row in risk {
            println!("{}: {}", row.label, row.value);
        }
    }

    println!(
        "\nÚltima actualización: {}",
        model::format_timestamp(&data.metadata.last_updated)
    );
    println!("Período: {}", data.metadata.analysis_period);
}
