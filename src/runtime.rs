// 50 Hz control loop with watchdog
// Note: a watchdog is a safety mechanism that triggers a safe action if something goes wrong
// Eg. if the operator stops sending commands the drive gets a zero command and is paused

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

// local imports
use crate::config::{CMD_TIMEOUT, DriveConfig, LOOP_HZ};
use crate::drive::{DriveError, Drivetrain};
use crate::messages::{DriveCommand, DriveTelemetry, Gear, OperatorCommand, RuntimeHealth};
use crate::sim::SimPlatform;

/// Error types for the control loop
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Drive setup failed: {0}")]
    Drive(#[from] DriveError),

    #[error("Failed to serialize telemetry: {0}")]
    Telemetry(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the loop runs with
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: DriveConfig,
    pub gear: Gear,
    /// Stop after this many cycles; run until Ctrl-C when `None`
    pub cycles: Option<u64>,
    /// Print a telemetry line every N cycles (0 disables)
    pub telemetry_every: u64,
}

/// One stdout telemetry line
#[derive(Debug, Serialize)]
struct TelemetryLine {
    cycle: u64,
    health: RuntimeHealth,
    #[serde(flatten)]
    drive: DriveTelemetry,
}

pub struct Runtime {
    latest_cmd: Option<OperatorCommand>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    /// Process incoming command
    pub fn on_command(&mut self, cmd: OperatorCommand, now: Instant) {
        debug!("Received command: {:?}", &cmd);
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = now;
    }

    /// Latest command if it is still fresh, `None` when the watchdog has tripped
    pub fn current_command(&mut self, now: Instant) -> Option<OperatorCommand> {
        let cmd_age = now.saturating_duration_since(self.cmd_received_at);

        if cmd_age > CMD_TIMEOUT {
            // Watchdog triggered - stop the robot
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), pausing drive", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            None
        } else if let Some(cmd) = self.latest_cmd {
            if self.health != RuntimeHealth::Ok {
                info!("Commands fresh, drive enabled");
            }
            self.health = RuntimeHealth::Ok;
            Some(cmd)
        } else {
            // No command ever received
            self.health = RuntimeHealth::CmdStale;
            None
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Read JSON-lines operator commands from stdin until EOF
async fn read_commands(tx: mpsc::UnboundedSender<OperatorCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match serde_json::from_str::<OperatorCommand>(&line) {
                Ok(cmd) => {
                    if tx.send(cmd).is_err() {
                        break; // loop has exited
                    }
                }
                Err(e) => warn!("Failed to parse command: {}", e),
            },
            Ok(None) => {
                info!("Command input closed");
                break;
            }
            Err(e) => {
                warn!("Failed to read command input: {}", e);
                break;
            }
        }
    }
}

pub async fn run(options: RunOptions) -> Result<(), RuntimeError> {
    let config = &options.config;

    info!("Bringing up simulated drive platform ({} gear)", options.gear);
    let mut platform = SimPlatform::new(options.gear, config.track_width, config.vision_landmark);
    let plant = platform.state();
    let mut drivetrain = Drivetrain::new(config, &mut platform)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(read_commands(tx));

    let mut runtime = Runtime::new();
    let period = Duration::from_millis(1000 / LOOP_HZ);
    let dt = period.as_secs_f64();
    let mut tick = interval(period);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );

    let mut cycle: u64 = 0;
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping drive");
                break;
            }
        }

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(cmd) = rx.try_recv() {
            runtime.on_command(cmd, Instant::now());
        }

        // 2. Advance the plant and update the pose
        plant.borrow_mut().step(dt);
        let cmd = runtime.current_command(Instant::now());
        drivetrain.periodic(cmd.is_some_and(|c| c.auto_target_drive));

        // 3. Drive, or hold the interlock while commands are stale
        match cmd {
            Some(cmd) => {
                drivetrain.resume();
                drivetrain.drive(DriveCommand::from(&cmd));
            }
            None => {
                // Zero command first so heading-hold drops out, then latch the interlock
                drivetrain.drive(DriveCommand::stop());
                drivetrain.pause();
            }
        }

        // 4. Publish telemetry
        if options.telemetry_every > 0 && cycle % options.telemetry_every == 0 {
            let line = TelemetryLine {
                cycle,
                health: runtime.health(),
                drive: drivetrain.telemetry(),
            };
            println!("{}", serde_json::to_string(&line)?);
        }

        cycle += 1;
        if options.cycles.is_some_and(|limit| cycle >= limit) {
            info!("Completed {} cycles", cycle);
            break;
        }
    }

    drivetrain.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(speed: f64) -> OperatorCommand {
        OperatorCommand {
            drive: DriveCommand::new(speed, 0.0),
            auto_target_drive: false,
        }
    }

    #[test]
    fn test_starts_stale() {
        let mut runtime = Runtime::new();
        assert!(runtime.current_command(Instant::now()).is_none());
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);
    }

    #[test]
    fn test_fresh_command_passes() {
        let mut runtime = Runtime::new();
        let now = Instant::now();
        runtime.on_command(command(0.4), now);
        let cmd = runtime.current_command(now + Duration::from_millis(20)).unwrap();
        assert_eq!(cmd.drive.speed, 0.4);
        assert_eq!(runtime.health(), RuntimeHealth::Ok);
    }

    #[test]
    fn test_watchdog_trips_after_timeout() {
        let mut runtime = Runtime::new();
        let now = Instant::now();
        runtime.on_command(command(0.4), now);
        assert!(runtime.current_command(now + CMD_TIMEOUT + Duration::from_millis(1)).is_none());
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);

        // a new command clears it
        let later = now + Duration::from_secs(1);
        runtime.on_command(command(0.1), later);
        assert!(runtime.current_command(later).is_some());
        assert_eq!(runtime.health(), RuntimeHealth::Ok);
    }

    #[test]
    fn test_telemetry_line_is_flat_json() {
        let line = TelemetryLine {
            cycle: 3,
            health: RuntimeHealth::Ok,
            drive: DriveTelemetry {
                pose: Default::default(),
                powers: Default::default(),
                gear: Gear::Low,
                heading_hold_enabled: true,
                heading_setpoint: 0.0,
                heading_at_setpoint: true,
                distance_to_target: 1.0,
                angle_to_target: 90.0,
                paused: false,
            },
        };
        let json: serde_json::Value = serde_json::to_value(&line).unwrap();
        assert_eq!(json["cycle"], 3);
        assert_eq!(json["health"], "ok");
        assert_eq!(json["gear"], "low");
        assert_eq!(json["heading_hold_enabled"], true);
    }
}
