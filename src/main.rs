#[cfg(not(target_arch = "wasm32"))]
use anyhow::Result;

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    cli::run().await
}

/// Native runner: the page against a simulated parent and widget
#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    use anyhow::{Context, Result};
    use clap::Parser;
    use env_logger::Env;
    use log::{debug, info, warn};
    use serde_json::{json, Value};

    use dedication::channel::LoopbackChannel;
    use dedication::player::{BootstrapLoader, PlayerEnvironment, PlayerEvent, PlayerEventHandler};
    use dedication::schedule::{Scheduler, VirtualScheduler};
    use dedication::sim::parent::{ParentConfig, SimulatedParent};
    use dedication::sim::{SimSettings, SimulatedRuntime};
    use dedication::utils::config::TrustMode;
    use dedication::utils::{format_time, load_config};
    use dedication::{Config, DataSource, DedicationPage, PagePhase};

    /// Dedication page runner
    #[derive(Parser, Debug)]
    #[command(author, version, about, long_about = None)]
    struct Args {
        /// Config file (defaults to the system and user config locations)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Enable debug logging
        #[arg(short, long)]
        debug: bool,

        /// Origin of the simulated parent page
        #[arg(long, value_name = "ORIGIN", default_value = "https://parent.example")]
        parent_origin: String,

        /// Delay before the parent answers, in milliseconds
        #[arg(long, value_name = "MS", default_value = "1500")]
        reply_after_ms: u64,

        /// The parent never answers
        #[arg(long)]
        silent_parent: bool,

        /// JSON payload the parent sends (a built-in sample otherwise)
        #[arg(long, value_name = "FILE")]
        payload: Option<PathBuf>,

        /// Trust policy override
        #[arg(long, value_name = "MODE")]
        trust: Option<TrustMode>,

        /// How long to run, in seconds
        #[arg(long, value_name = "SECONDS", default_value = "12")]
        run_for: u64,
    }

    pub async fn run() -> Result<()> {
        let args = Args::parse();

        let mut config = match &args.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load config from {:?}", path))?,
            None => load_config()?,
        };
        if let Some(trust) = args.trust {
            config.handshake.trust = trust;
        }

        let log_level = if args.debug {
            "debug".to_string()
        } else {
            config.general.log_level.clone()
        };
        env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
            .format_timestamp_millis()
            .init();

        info!("Starting dedication v{}", env!("CARGO_PKG_VERSION"));

        let reply = json!({
            "type": "DEDICATION_DATA",
            "payload": load_reply_payload(args.payload.as_ref())?,
        });

        let mut parent = SimulatedParent::spawn(ParentConfig {
            origin: args.parent_origin.clone(),
            reply_after: (!args.silent_parent).then(|| Duration::from_millis(args.reply_after_ms)),
            reply,
        })?;

        let clock = Rc::new(VirtualScheduler::new());
        let runtime = SimulatedRuntime::new(clock.clone(), SimSettings::default());
        let referrer = format!("{}/", args.parent_origin.trim_end_matches('/'));
        let channel = Rc::new(LoopbackChannel::new(Some(&referrer)));

        let poster = parent.poster();
        channel.on_post(Box::new(move |posted| {
            if let Err(e) = poster.send(posted.clone()) {
                debug!("Parent thread gone, dropped {:?}: {}", posted.message, e);
            }
        }));

        let env = PlayerEnvironment {
            scheduler: clock.clone(),
            loader: BootstrapLoader::for_page(),
            host: runtime.clone(),
            factory: runtime.clone(),
        };
        let source = DataSource::from_config(&config, channel.clone())?;
        let page = DedicationPage::start(config, source, env);
        page.on_player_event(|| Box::new(LoggingEventHandler) as Box<dyn PlayerEventHandler>);

        let run_for = Duration::from_secs(args.run_for);
        let started = Instant::now();
        let mut ticker = tokio::time::interval(Duration::from_millis(50));
        let mut autoplay_requested = false;
        let mut next_status = Duration::ZERO;
        let mut shown_phase = PagePhase::AwaitingData;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }

            for envelope in parent.drain() {
                channel.deliver(envelope);
            }
            let elapsed = started.elapsed();
            clock.advance_to(elapsed);

            let phase = page.phase();
            if phase != shown_phase {
                shown_phase = phase;
                report_content(&page);
            }

            // The button press that starts the soundtrack
            if !autoplay_requested && page.snapshot().map(|s| s.state.is_ready()).unwrap_or(false) {
                autoplay_requested = true;
                page.toggle_play_pause();
            }

            if elapsed >= next_status {
                next_status += Duration::from_secs(1);
                report_status(&page, clock.now());
            }

            if elapsed >= run_for {
                break;
            }
        }

        page.teardown();
        parent.shutdown();

        let stats = parent.stats();
        info!(
            "Parent saw {} READY_FOR_DATA ({} misaddressed), replied: {}",
            stats.ready_seen, stats.misaddressed, stats.replied
        );
        if clock.pending() > 0 {
            warn!("{} timer(s) still pending after teardown", clock.pending());
        }
        Ok(())
    }

    fn load_reply_payload(path: Option<&PathBuf>) -> Result<Value> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read payload {:?}", path))?;
                serde_json::from_str(&text).context("Payload is not valid JSON")
            }
            None => Ok(json!({
                "customText": {
                    "title": "Dez anos de nós",
                    "phrases": [
                        "Cada dia contigo é o meu preferido.",
                        "Ainda escolho você.",
                    ],
                },
                "basic": {
                    "coupleName": "Ana e Rui",
                    "startTimestamp": "2015-10-16T20:00:00Z",
                },
                "music": {
                    "title": "Nossa Música",
                    "sourceUrl": "https://www.youtube.com/watch?v=L0_nXyTMyqM",
                },
            })),
        }
    }

    fn report_content(page: &DedicationPage) {
        match page.phase() {
            PagePhase::Showing | PagePhase::ShowingFallback => {
                if let Some(resolved) = page.resolved() {
                    info!(
                        "Showing \"{}\" for {} ({} phrase(s), {} photo(s))",
                        resolved.title,
                        resolved.couple_name,
                        resolved.phrases.len(),
                        resolved.photos.len()
                    );
                }
            }
            PagePhase::AwaitingData | PagePhase::Closed => {}
        }
    }

    fn report_status(page: &DedicationPage, now: Duration) {
        let message = page.current_message().unwrap_or_default();
        match page.snapshot() {
            Some(player) => info!(
                "[{:>5.1}s] {:?} {} / {}{} | {}",
                now.as_secs_f64(),
                player.state,
                format_time(player.position),
                format_time(player.duration),
                if player.muted { " (muted)" } else { "" },
                message
            ),
            None => info!(
                "[{:>5.1}s] waiting for parent ({} attempt(s))",
                now.as_secs_f64(),
                page.attempts_sent()
            ),
        }
    }

    /// Event handler that logs events
    struct LoggingEventHandler;

    impl PlayerEventHandler for LoggingEventHandler {
        fn handle_event(&mut self, event: PlayerEvent) {
            match event {
                PlayerEvent::PositionChanged { position } => {
                    // Log position changes at debug level to avoid spam
                    debug!("Position: {}", format_time(position));
                }
                PlayerEvent::Ready { duration } => {
                    info!("Player ready ({})", format_time(duration))
                }
                PlayerEvent::PlaybackStarted => info!("Playback started"),
                PlayerEvent::PlaybackPaused => info!("Playback paused"),
                PlayerEvent::VolumeChanged { volume } => info!("Volume: {:.0}%", volume * 100.0),
                PlayerEvent::MuteChanged { muted } => info!("Muted: {}", muted),
                PlayerEvent::Destroyed => info!("Player destroyed"),
            }
        }
    }
}
