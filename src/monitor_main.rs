// SPDX-License-Identifier: MPL-2.0

//! Console hardware monitor: prints the same metrics as the overlay.

use std::error::Error;
use std::io::IsTerminal;
use std::time::{Duration, Instant};

use clap::Parser;
use hwoverlay::formatter::render_report;
use hwoverlay::monitor::{HardwareMonitor, Metrics};
use tokio::time::{MissedTickBehavior, interval};

#[derive(Parser, Debug)]
#[command(name = "hwoverlay-monitor")]
#[command(about = "Print hardware metrics to the console", long_about = None)]
#[command(version)]
struct Cli {
    /// Seconds between reports
    #[arg(short, long, default_value_t = 1.0, value_parser = parse_seconds)]
    interval: f64,

    /// Stop after this many seconds
    #[arg(short, long, value_parser = parse_seconds)]
    duration: Option<f64>,

    /// Print a single report and exit
    #[arg(long)]
    once: bool,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

/// A positive, finite number of seconds.
fn parse_seconds(value: &str) -> Result<f64, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number"))?;
    if seconds <= 0.0 || Duration::try_from_secs_f64(seconds).is_err() {
        return Err(format!("`{value}` must be a positive number of seconds"));
    }
    Ok(seconds)
}

/// Collect on the blocking pool; sensor queries can take a while.
async fn collect(monitor: HardwareMonitor) -> Result<(HardwareMonitor, Metrics), Box<dyn Error>> {
    let result = tokio::task::spawn_blocking(move || {
        let mut monitor = monitor;
        let metrics = monitor.get_all_metrics();
        (monitor, metrics)
    })
    .await?;
    Ok(result)
}

fn print_metrics(metrics: &Metrics, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(metrics)?);
    } else {
        if std::io::stdout().is_terminal() {
            // Reset the terminal so each report replaces the last one.
            print!("\x1bc");
        }
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        print!("{}", render_report(metrics, &timestamp));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut monitor = tokio::task::spawn_blocking(HardwareMonitor::new).await?;

    // CPU usage needs two samples.
    tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;

    if cli.once {
        let (_, metrics) = collect(monitor).await?;
        return print_metrics(&metrics, cli.json);
    }

    let period = Duration::from_secs_f64(cli.interval.clamp(0.1, 3600.0));
    let deadline = cli.duration.map(Duration::from_secs_f64);

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = Instant::now();
    let mut iterations: u64 = 0;

    // Created once so a Ctrl-C during a collection is not lost.
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (returned, metrics) = collect(monitor).await?;
                monitor = returned;
                iterations += 1;

                print_metrics(&metrics, cli.json)?;
                if !cli.json {
                    println!(
                        "Iteration {} | elapsed {:.1}s | Ctrl-C to stop",
                        iterations,
                        started.elapsed().as_secs_f64()
                    );
                }

                if deadline.is_some_and(|limit| started.elapsed() >= limit) {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                println!();
                break;
            }
        }
    }

    println!(
        "Stopped after {} iterations in {:.1}s",
        iterations,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
