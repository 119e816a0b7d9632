use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use clap::Parser;
use tokio::{
    sync::mpsc::{UnboundedReceiver, unbounded_channel},
    time::{MissedTickBehavior, interval},
};

use crate::{
    cli::ConfigArgs,
    event::{EnergySummary, Event, Scope},
    pipeline::Pipeline,
    prelude::*,
    reading::Tick,
    tables::build_energy_table,
};

#[derive(Parser)]
pub struct ReplayArgs {
    #[clap(flatten)]
    config: ConfigArgs,

    /// JSON-lines file with one recorded tick per line.
    #[clap(env = "SOLARFLOW_INPUT")]
    input: PathBuf,

    /// Process one tick per this interval instead of as fast as possible.
    #[clap(long, env = "SOLARFLOW_PACE")]
    pace: Option<humantime::Duration>,

    /// Print the fleet energy windows when done.
    #[clap(long)]
    summary: bool,
}

impl ReplayArgs {
    pub async fn run(self) -> Result {
        let config = self.config.load()?;
        let input = std::fs::read_to_string(&self.input)
            .with_context(|| format!("failed to read `{}`", self.input.display()))?;

        let should_terminate = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&should_terminate))?;

        let (sender, receiver) = unbounded_channel();
        let consumer = tokio::spawn(write_json_lines(receiver));
        let mut pipeline = Pipeline::builder().config(config).emitter(sender).build();

        let mut pace = self.pace.map(|pace| {
            let mut interval = interval(Duration::from(pace));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        for (index, line) in input.lines().enumerate() {
            if should_terminate.load(Ordering::Relaxed) {
                warn!("terminating…");
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            if let Some(pace) = &mut pace {
                pace.tick().await;
            }
            match serde_json::from_str::<Tick>(line) {
                Ok(tick) => {
                    pipeline.on_tick(&tick)?;
                }
                Err(error) => {
                    warn!(line = index + 1, %error, "failed to parse the tick");
                    pipeline.on_missed_tick();
                }
            }
        }

        // Dropping the pipeline closes the channel and lets the consumer finish.
        pipeline.finish()?;
        let summaries = consumer.await??;

        if self.summary {
            println!("{}", build_energy_table(&summaries));
        }
        Ok(())
    }
}

/// Print every event as a JSON line, and collect the fleet energy summaries.
async fn write_json_lines(mut receiver: UnboundedReceiver<Event>) -> Result<Vec<EnergySummary>> {
    let mut summaries = Vec::new();
    while let Some(event) = receiver.recv().await {
        println!("{}", serde_json::to_string(&event)?);
        if let Event::EnergySummary(summary) = event
            && summary.scope == Scope::Fleet
        {
            summaries.push(*summary);
        }
    }
    Ok(summaries)
}
