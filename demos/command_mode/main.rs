//! Fly the drone from the terminal.
//!
//! Type one command per line, e.g. `takeoff`, `forward 100`, `cw 90`, `land`.
//! `exit` lands (if needed) and leaves the program.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tello_link::{Flip, LinkConfig, LinkController, Response};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "command_mode")]
#[command(about = "Send text SDK commands to a Tello drone")]
struct Args {
    /// Path to a yaml link configuration
    #[arg(short, long)]
    config: Option<String>,

    /// Print every telemetry update instead of only battery changes
    #[arg(short, long)]
    verbose: bool,
}

fn arg(words: &[&str], index: usize) -> u32 {
    words.get(index).and_then(|w| w.parse().ok()).unwrap_or(0)
}

fn signed(words: &[&str], index: usize) -> i32 {
    words.get(index).and_then(|w| w.parse().ok()).unwrap_or(0)
}

async fn run_line(drone: &mut LinkController, line: &str) -> Option<Response> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let response = match *words.first()? {
        "takeoff" => drone.take_off().await,
        "land" => drone.land().await,
        "emergency" => drone.emergency().await,
        "streamon" => drone.stream_on().await,
        "streamoff" => drone.stream_off().await,
        "up" => drone.up(arg(&words, 1)).await,
        "down" => drone.down(arg(&words, 1)).await,
        "left" => drone.left(arg(&words, 1)).await,
        "right" => drone.right(arg(&words, 1)).await,
        "forward" => drone.forward(arg(&words, 1)).await,
        "back" => drone.back(arg(&words, 1)).await,
        "cw" => drone.cw(arg(&words, 1)).await,
        "ccw" => drone.ccw(arg(&words, 1)).await,
        "speed" => drone.speed(arg(&words, 1)).await,
        "go" => drone.go_to(arg(&words, 1), arg(&words, 2), arg(&words, 3), arg(&words, 4)).await,
        "curve" => {
            let first = [arg(&words, 1), arg(&words, 2), arg(&words, 3)];
            let second = [arg(&words, 4), arg(&words, 5), arg(&words, 6)];
            drone.curve(first, second, arg(&words, 7)).await
        }
        "rc" => {
            drone
                .rc(signed(&words, 1), signed(&words, 2), signed(&words, 3), signed(&words, 4))
                .await
        }
        "flip" => {
            let direction = match words.get(1).copied() {
                Some("b") => Flip::Back,
                Some("l") => Flip::Left,
                Some("r") => Flip::Right,
                _ => Flip::Forward,
            };
            drone.flip(direction).await
        }
        other => {
            warn!("unknown command {:?}", other);
            return None;
        }
    };
    Some(response)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => {
            LinkConfig::from_yaml_file(path).context("Failed to load link configuration")?
        }
        None => LinkConfig::default(),
    };
    info!("connecting to {}", config.drone_addr);

    let mut drone = LinkController::new(config);
    drone.connect().await.context("Drone did not answer the handshake")?;
    info!("connected, battery {}%", drone.battery());

    let mut telemetry = drone.telemetry_stream();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut battery = drone.battery();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => break,
                };
                if line.trim() == "exit" {
                    break;
                }
                if let Some(response) = run_line(&mut drone, &line).await {
                    let result = response.into_result();
                    println!("{} -> {:?} POS {:?}", line.trim(), result, drone.odometry);
                }
            }
            Some(state) = telemetry.next() => {
                if args.verbose {
                    println!("{:?}", state);
                } else if state.battery_percent != battery {
                    battery = state.battery_percent;
                    println!("battery {}%  height {}cm", state.battery_percent, state.height_cm);
                }
            }
        }
    }

    if drone.telemetry().height_cm > 0 {
        info!("landing before exit: {:?}", drone.land().await.into_result());
    }
    drone.disconnect().await?;
    Ok(())
}
