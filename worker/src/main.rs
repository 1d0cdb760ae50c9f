use clap::Parser;
use colored::*;
use log::warn;
use tokio::signal;

use gridcrack_worker::{run, WorkerConfig};

#[derive(Parser, Debug)]
#[command(
    name = "gridcrack-worker",
    version,
    author = "GridCrack Developers",
    about = "GridCrack Worker - multi-threaded crypt(3) cracking client",
    long_about = None
)]
struct Cli {
    /// Controller hostname or address
    #[arg(short, long)]
    controller: String,

    /// Controller TCP port
    #[arg(short, long)]
    port: u16,

    /// Number of cracking threads (0 = auto-detect)
    #[arg(short, long)]
    threads: usize,

    /// Debug logging
    #[arg(long)]
    debug: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else if cli.quiet {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Warn)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    print_banner();

    let threads = if cli.threads == 0 {
        num_cpus::get()
    } else {
        cli.threads
    };
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_owned());

    println!("{} {}", " * ".bright_green().bold(), "CONFIG".bright_white().bold());
    println!("{}  {:<12} {}", "   ".bright_black(), "controller".bright_black(), format!("{}:{}", cli.controller, cli.port).bright_white());
    println!("{}  {:<12} {}", "   ".bright_black(), "threads".bright_black(), threads.to_string().bright_magenta().bold());
    println!("{}  {:<12} {}", "   ".bright_black(), "host".bright_black(), host.bright_white());
    println!();

    tokio::spawn(async move {
        signal::ctrl_c().await.ok();
        println!(
            "\n{} {} {}\n",
            format!("[{}]", chrono::Utc::now().format("%H:%M:%S")).bright_black(),
            "signal".bright_yellow(),
            "Ctrl+C, shutting down...".bright_yellow().bold(),
        );
        std::process::exit(1);
    });

    let outcome = run(WorkerConfig {
        controller: cli.controller,
        port: cli.port,
        threads,
    })
    .await?;

    println!();
    println!("{}", "─────────────────────────────────────────────".bright_black());
    println!("{} {}", " * ".bright_green().bold(), "RESULT".bright_white().bold());
    match &outcome.password {
        Some(password) => println!(
            "{}  password {} {}",
            "   ".bright_black(),
            "FOUND".bright_green().bold(),
            format!("\"{password}\"").bright_white().bold()
        ),
        None => println!(
            "{}  password {} on this worker",
            "   ".bright_black(),
            "NOT FOUND".bright_red().bold()
        ),
    }
    println!("{}  {:<16} {}", "   ".bright_black(), "tested".bright_black(), outcome.total_tested.to_string().bright_cyan());
    println!("{}  {:<16} {:.3} ms", "   ".bright_black(), "cracking time".bright_black(), outcome.crack_time_ms);
    println!();

    if !outcome.found {
        warn!("no password found on this worker");
    }
    std::process::exit(if outcome.found { 0 } else { 1 });
}

fn print_banner() {
    println!();
    println!("{}", " ╔══════════════════════════════════════════════════╗".bright_cyan());
    println!("{}{}{}", " ║ ".bright_cyan(), "   GRIDCRACK WORKER  v0.4.1                       ".bright_white().bold(), "║".bright_cyan());
    println!("{}{}{}", " ║ ".bright_cyan(), "   multi-threaded crypt(3) cracking client        ".bright_black(), "║".bright_cyan());
    println!("{}", " ╚══════════════════════════════════════════════════╝".bright_cyan());
    println!();
}
