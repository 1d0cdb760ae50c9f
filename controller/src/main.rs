use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use colored::*;
use log::{info, warn};
use tokio::signal;

use gridcrack_controller::server::{RunSummary, Server, ServerConfig};
use gridcrack_controller::shadow;
use gridcrack_core::candidates::TOTAL_CANDIDATES;

#[derive(Parser, Debug)]
#[command(
    name = "gridcrack-controller",
    version,
    author = "GridCrack Developers",
    about = "GridCrack Controller - distributed crypt(3) hash cracking",
    long_about = None
)]
struct Cli {
    /// Shadow-style file holding the target credential
    #[arg(short = 'f', long)]
    shadow_file: PathBuf,

    /// Username whose entry should be cracked
    #[arg(short, long)]
    user: String,

    /// TCP port to listen on for workers
    #[arg(short, long)]
    port: u16,

    /// Heartbeat interval in seconds
    #[arg(short = 'b', long, value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat: u64,

    /// Candidates per chunk assignment
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: u64,

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
    let total_timer = Instant::now();

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
    println!("{} {}", " * ".bright_green().bold(), "CONFIG".bright_white().bold());
    println!("{}  {:<12} {}", "   ".bright_black(), "shadow".bright_black(), cli.shadow_file.display().to_string().bright_white());
    println!("{}  {:<12} {}", "   ".bright_black(), "user".bright_black(), cli.user.bright_cyan());
    println!("{}  {:<12} {}", "   ".bright_black(), "port".bright_black(), cli.port.to_string().bright_magenta().bold());
    println!("{}  {:<12} {}s", "   ".bright_black(), "heartbeat".bright_black(), cli.heartbeat.to_string().bright_cyan());
    println!("{}  {:<12} {}", "   ".bright_black(), "chunk-size".bright_black(), cli.chunk_size.to_string().bright_cyan());
    println!();

    let parse_timer = Instant::now();
    let job = shadow::parse_shadow(&cli.shadow_file, &cli.user)?;
    let parse_elapsed = parse_timer.elapsed();

    println!("{} {}", " * ".bright_green().bold(), "TARGET".bright_white().bold());
    println!("{}  {:<12} {}", "   ".bright_black(), "algorithm".bright_black(), job.algorithm.name().bright_cyan().bold());
    println!("{}  {:<12} {}", "   ".bright_black(), "salt".bright_black(), job.salt.bright_white());
    println!("{}  {:<12} {}", "   ".bright_black(), "hash".bright_black(), job.target_hash.bright_white());
    println!("{}  {:<12} {}", "   ".bright_black(), "candidates".bright_black(), TOTAL_CANDIDATES.to_string().bright_cyan());
    println!();

    let server = Server::bind(
        ServerConfig {
            port: cli.port,
            heartbeat_interval: Duration::from_secs(cli.heartbeat),
            chunk_size: cli.chunk_size,
        },
        job,
    )
    .await?;
    info!("controller ready on port {}", cli.port);

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

    let summary = server.run().await?;
    let total_elapsed = total_timer.elapsed();

    let found = print_summary(&summary, parse_elapsed, total_elapsed);
    if !found {
        warn!("no password found");
    }
    std::process::exit(if found { 0 } else { 1 });
}

fn print_summary(summary: &RunSummary, parse_elapsed: Duration, total_elapsed: Duration) -> bool {
    println!();
    println!("{}", "─────────────────────────────────────────────".bright_black());
    println!("{} {}", " * ".bright_green().bold(), "RESULT".bright_white().bold());
    let found = match &summary.result {
        Some(result) => {
            println!(
                "{}  password {} {}",
                "   ".bright_black(),
                "FOUND".bright_green().bold(),
                format!("\"{}\"", result.password).bright_white().bold()
            );
            true
        }
        None => {
            if summary.candidates_dispatched == TOTAL_CANDIDATES {
                println!(
                    "{}  password {} (searched all {} candidates)",
                    "   ".bright_black(),
                    "NOT FOUND".bright_red().bold(),
                    TOTAL_CANDIDATES.to_string().bright_cyan()
                );
            } else {
                println!(
                    "{}  password {} (all workers disconnected; no password found)",
                    "   ".bright_black(),
                    "NOT FOUND".bright_red().bold()
                );
            }
            false
        }
    };

    println!();
    println!("{} {}", " * ".bright_green().bold(), "TIMING".bright_white().bold());
    println!("{}  {:<24} {:>12.3} ms", "   ".bright_black(), "shadow parse".bright_black(), parse_elapsed.as_secs_f64() * 1000.0);
    if let Some(d) = summary.dispatch_latency {
        println!("{}  {:<24} {:>12.3} ms", "   ".bright_black(), "job dispatch latency".bright_black(), d.as_secs_f64() * 1000.0);
    }
    if let Some(result) = &summary.result {
        println!("{}  {:<24} {:>12.3} ms", "   ".bright_black(), "worker cracking time".bright_black(), result.crack_time_ms);
    }
    if let Some(d) = summary.stop_broadcast {
        println!("{}  {:<24} {:>12.3} ms", "   ".bright_black(), "stop broadcast".bright_black(), d.as_secs_f64() * 1000.0);
    }
    println!("{}  {:<24} {:>12}", "   ".bright_black(), "workers seen".bright_black(), summary.workers_seen);
    println!("{}  {:<24} {:>12}", "   ".bright_black(), "chunks assigned".bright_black(), summary.chunks_assigned);
    println!("{}  {:<24} {:>12}", "   ".bright_black(), "candidates dispatched".bright_black(), summary.candidates_dispatched);
    println!(
        "{}  {:<24} {:>12}",
        "   ".bright_black(),
        "heartbeats exchanged".bright_black(),
        format!("{}/{}", summary.heartbeats_sent, summary.heartbeats_received)
    );
    println!("{}", "   ─────────────────────────────────────────".bright_black());
    println!("{}  {:<24} {:>12.3} ms", "   ".bright_black(), "total elapsed".bright_black(), total_elapsed.as_secs_f64() * 1000.0);
    println!();

    found
}

fn print_banner() {
    println!();
    println!("{}", " ╔══════════════════════════════════════════════════╗".bright_cyan());
    println!("{}{}{}", " ║ ".bright_cyan(), "   GRIDCRACK CONTROLLER  v0.4.1                   ".bright_white().bold(), "║".bright_cyan());
    println!("{}{}{}", " ║ ".bright_cyan(), "   distributed crypt(3) brute force               ".bright_black(), "║".bright_cyan());
    println!("{}", " ╠══════════════════════════════════════════════════╣".bright_cyan());
    println!("{}{}{}", " ║ ".bright_cyan(), " Schemes   MD5 · bcrypt · SHA-256/512 · yescrypt  ".white(), "║".bright_cyan());
    println!("{}{}{}", " ║ ".bright_cyan(), " Space     1-4 chars, printable ASCII 33..111     ".white(), "║".bright_cyan());
    println!("{}", " ╚══════════════════════════════════════════════════╝".bright_cyan());
    println!();
}
