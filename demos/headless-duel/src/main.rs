//! A duel between two bots, with no window.
//!
//! ```text
//! headless-duel host [port]
//! headless-duel join <address> [port]
//! ```
//!
//! `DUELNET_ADDRESS`, `DUELNET_PORT` and `DUELNET_ROUNDS` fill in whatever
//! the arguments leave out. Set `RUST_LOG=debug` for connection and tick
//! details.

use clap::{Parser, Subcommand};
use duelnet::prelude::*;
use tracing::info;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "headless-duel", about = "Two bots fight over a duelnet relay")]
struct Cli {
    #[command(subcommand)]
    role: Role,

    /// Matches to play before exiting.
    #[arg(long, global = true, env = "DUELNET_ROUNDS", default_value_t = 3)]
    rounds: u32,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Start the relay and play as participant 1.
    Host {
        /// Port to listen on; the next free one is used if it is taken.
        #[arg(env = "DUELNET_PORT", default_value_t = duelnet::DEFAULT_PORT)]
        port: u16,
    },
    /// Join a host's relay as participant 2.
    Join {
        /// Host address.
        #[arg(env = "DUELNET_ADDRESS")]
        address: String,

        /// Relay port the host reported.
        #[arg(env = "DUELNET_PORT", default_value_t = duelnet::DEFAULT_PORT)]
        port: u16,
    },
}

// ---------------------------------------------------------------------------
// Bot
// ---------------------------------------------------------------------------

/// Walks towards the opponent and swings when close.
struct Bot {
    handle: DuelHandle,
    last: Option<Frame>,
    rounds_left: u32,
    frames: u64,
}

impl Frontend for Bot {
    fn poll_input(&mut self) -> InputIntents {
        let Some(frame) = &self.last else {
            return InputIntents::default();
        };
        let me = &frame.combatants[frame.local.index()];
        let them = &frame.combatants[frame.local.other().index()];
        let gap = them.x - me.x;

        InputIntents {
            move_left: gap < -40.0,
            move_right: gap > 40.0,
            jump: false,
            attack: gap.abs() <= 45.0,
        }
    }

    fn render(&mut self, frame: &Frame) {
        self.frames += 1;
        if self.frames % 60 == 0 {
            let [p1, p2] = &frame.combatants;
            info!(
                p1_x = p1.x,
                p1_health = p1.health,
                p1_hits = p1.hits,
                p2_x = p2.x,
                p2_health = p2.health,
                p2_hits = p2.hits,
                "frame {}",
                self.frames
            );
        }
        self.last = Some(frame.clone());
    }

    fn connection_status(&mut self, status: &str) {
        info!(status, "connection");
    }

    fn on_event(&mut self, event: &MatchEvent) {
        match event {
            MatchEvent::GameOver { name, .. } => {
                info!(winner = %name, rounds_left = self.rounds_left, "round over");
                if self.rounds_left > 0 {
                    self.rounds_left -= 1;
                    self.handle.restart();
                } else {
                    self.handle.shutdown();
                }
            }
            MatchEvent::Scored { hits, .. } => info!(hits, "landed a hit"),
            MatchEvent::DamageTaken { health, .. } => info!(health, "took a hit"),
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    duelnet::init_tracing();
    let cli = Cli::parse();

    let builder = match cli.role {
        Role::Host { port } => DuelBuilder::host().port(port),
        Role::Join { address, port } => DuelBuilder::join(address).port(port),
    };
    let duel = builder.build().await?;

    if let Some(port) = duel.relay_port() {
        info!(port, "hosting; join with `headless-duel join <this-address> {port}`");
    }

    let handle = duel.handle();
    let ctrl_c = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.shutdown();
        }
    });

    let mut bot = Bot {
        handle,
        last: None,
        rounds_left: cli.rounds.saturating_sub(1),
        frames: 0,
    };
    duel.run(&mut bot).await;
    Ok(())
}
