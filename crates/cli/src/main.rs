use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use event_store::{Event, EventStore, NewRegistration, SeedOutcome};
use pipeline::{RecencyMode, ScoreBreakdown, ScoreRequest, Scorer};
use rand::Rng;
use rand::seq::IndexedRandom;
use server::{RecommendationOrchestrator, build_ranker};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Evently - event discovery and registration
#[derive(Parser)]
#[command(name = "evently")]
#[command(about = "Browse events, register attendees and get recommendations", long_about = None)]
struct Cli {
    /// Path to the JSON database file
    #[arg(short, long, default_value = "./db.json")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all events
    Events,

    /// Get event recommendations
    Recommend {
        /// Interest tag (repeatable)
        #[arg(long = "interest")]
        interests: Vec<String>,

        /// Free-text query matched against title, description and venue
        #[arg(long, default_value = "")]
        query: String,

        /// Category to restrict to, or "All"
        #[arg(long, default_value = pipeline::ALL_CATEGORIES)]
        category: String,

        /// Number of recommendations to return
        #[arg(long, default_value_t = pipeline::DEFAULT_LIMIT)]
        limit: usize,

        /// Show the tag/text/recency breakdown for each result
        #[arg(long)]
        explain: bool,

        /// External recommendation service; local scoring is used when unset
        #[arg(long)]
        ml_url: Option<String>,

        /// Timeout for the external service in milliseconds
        #[arg(long, default_value = "2000")]
        ml_timeout_ms: u64,

        /// Let already-started events earn the full recency bonus
        #[arg(long)]
        parity: bool,
    },

    /// Register an attendee for an event
    Register {
        #[arg(long)]
        event_id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// Interest tag (repeatable)
        #[arg(long = "interest")]
        interests: Vec<String>,
    },

    /// List registrations
    Registrations {
        /// Only show registrations for this event
        #[arg(long)]
        event_id: Option<String>,
    },

    /// Show registration counts
    Stats,

    /// Populate an empty database with demo events
    Seed,

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let store = Arc::new(
        EventStore::open(&cli.db)
            .await
            .with_context(|| format!("Failed to open database {}", cli.db.display()))?,
    );

    match cli.command {
        Commands::Events => handle_events(&store).await,
        Commands::Recommend {
            interests,
            query,
            category,
            limit,
            explain,
            ml_url,
            ml_timeout_ms,
            parity,
        } => {
            let request = ScoreRequest {
                interests,
                query,
                category,
                limit,
            };
            let mode = if parity {
                RecencyMode::Parity
            } else {
                RecencyMode::ClampPast
            };
            let timeout = Duration::from_millis(ml_timeout_ms);
            handle_recommend(store, request, Scorer::new(mode), ml_url, timeout, explain).await
        }
        Commands::Register {
            event_id,
            name,
            email,
            interests,
        } => {
            let payload = NewRegistration {
                name,
                email,
                event_id: Some(event_id),
                interests,
            };
            handle_register(&store, payload).await
        }
        Commands::Registrations { event_id } => {
            handle_registrations(&store, event_id.as_deref()).await
        }
        Commands::Stats => handle_stats(&store).await,
        Commands::Seed => handle_seed(&store).await,
        Commands::Benchmark {
            requests,
            concurrent,
        } => handle_benchmark(store, requests, concurrent).await,
    }
}

/// Handle the 'events' command
async fn handle_events(store: &EventStore) -> Result<()> {
    let events = store.list_events().await;
    if events.is_empty() {
        println!("No events yet. Run `evently seed` to add demo events.");
        return Ok(());
    }

    println!("{}", format!("{} events:", events.len()).bold().blue());
    for event in &events {
        print_event(event);
    }
    Ok(())
}

/// Handle the 'recommend' command
async fn handle_recommend(
    store: Arc<EventStore>,
    request: ScoreRequest,
    scorer: Scorer,
    ml_url: Option<String>,
    timeout: Duration,
    explain: bool,
) -> Result<()> {
    let ranker = build_ranker(ml_url.as_deref(), timeout, scorer)?;
    let orchestrator = RecommendationOrchestrator::new(store, ranker);

    let now = Utc::now();
    let recommendations = orchestrator.get_recommendations_at(&request, now).await?;

    if let Some(url) = &ml_url {
        println!("Order from {} (local scorer if it failed)", url);
    }
    print_recommendations(&recommendations, &request, &scorer, now, explain, ml_url.is_some());
    Ok(())
}

/// Handle the 'register' command
async fn handle_register(store: &EventStore, payload: NewRegistration) -> Result<()> {
    let (registration, event) = store.register(payload, Utc::now()).await?;

    println!(
        "{} Registered {} <{}> for {}",
        "✓".green(),
        registration.name,
        registration.email,
        event.title.bold()
    );
    println!("  Registration ID: {}", registration.id);
    Ok(())
}

/// Handle the 'registrations' command
async fn handle_registrations(store: &EventStore, event_id: Option<&str>) -> Result<()> {
    let registrations = store.registrations(event_id).await;
    let header = match event_id {
        Some(id) => format!("Registrations for event {id}:"),
        None => "All registrations:".to_string(),
    };
    println!("{}", header.bold().blue());

    if registrations.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for reg in &registrations {
        println!(
            "  {} {} <{}> event={} interests=[{}] at {}",
            reg.id.dimmed(),
            reg.name,
            reg.email,
            reg.event_id,
            reg.interests.join(", "),
            reg.created_at()
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| reg.created_at_raw.clone())
        );
    }
    Ok(())
}

/// Handle the 'stats' command
async fn handle_stats(store: &EventStore) -> Result<()> {
    let stats = store.stats().await;
    let events = store.list_events().await;

    println!("{}", "Stats:".bold().blue());
    println!("{}Total events: {}", "• ".cyan(), stats.total_events);
    println!("{}Total registrations: {}", "• ".cyan(), stats.total_regs);
    for event in &events {
        let count = stats.by_event.get(&event.id).copied().unwrap_or(0);
        println!("  - {} ({}): {}", event.title, event.id.dimmed(), count);
    }
    Ok(())
}

/// Handle the 'seed' command
async fn handle_seed(store: &EventStore) -> Result<()> {
    match store.seed(Utc::now()).await? {
        SeedOutcome::Seeded(count) => {
            println!("{} Seeded {} events into {}", "✓".green(), count, store.path().display())
        }
        SeedOutcome::Skipped => println!("Events already present, skipping seed"),
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    store: Arc<EventStore>,
    requests: usize,
    concurrent: usize,
) -> Result<()> {
    if requests == 0 || concurrent == 0 {
        bail!("--requests and --concurrent must both be at least 1");
    }

    let events = store.list_events().await;
    if events.is_empty() {
        bail!("No events in {}; run `evently seed` first", store.path().display());
    }

    let scorer = Scorer::default();
    let ranker = build_ranker(None, Duration::from_secs(1), scorer)?;
    let orchestrator = RecommendationOrchestrator::new(Arc::clone(&store), ranker);

    // Random interest/query mixes drawn from the catalogue's own tags
    let tags: Vec<String> = events
        .iter()
        .flat_map(|event| event.tags.iter().cloned())
        .collect();
    let request_set: Vec<ScoreRequest> = {
        let mut rng = rand::rng();
        (0..requests)
            .map(|_| {
                let interests: Vec<String> = tags.choose_multiple(&mut rng, 2).cloned().collect();
                let query = if rng.random_bool(0.5) {
                    tags.choose(&mut rng).cloned().unwrap_or_default()
                } else {
                    String::new()
                };
                ScoreRequest::new().with_interests(interests).with_query(query)
            })
            .collect()
    };

    let semaphore = Arc::new(Semaphore::new(concurrent));
    let wall_clock = Instant::now();

    let mut handles = Vec::with_capacity(requests);
    for request in request_set {
        let orchestrator = orchestrator.clone();
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let start = Instant::now();
            orchestrator.get_recommendations(&request).await?;
            Ok::<_, anyhow::Error>(start.elapsed())
        }));
    }

    let mut timings = Vec::with_capacity(requests);
    for handle in handles {
        timings.push(handle.await??);
    }
    let total_time = wall_clock.elapsed();

    timings.sort();
    let latency_sum: Duration = timings.iter().sum();
    let avg_latency = latency_sum / timings.len() as u32;
    let throughput = requests as f64 / total_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {} ({} concurrent)", requests, concurrent);
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(&timings, 0.50));
    println!("P95 latency: {:?}", percentile(&timings, 0.95));
    println!("P99 latency: {:?}", percentile(&timings, 0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

/// Nearest-rank percentile of an ascending, non-empty slice.
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    let index = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
    sorted[index]
}

fn print_event(event: &Event) {
    let when = event
        .starts_at()
        .map(|dt| dt.format("%a %d %b %Y %H:%M").to_string())
        .unwrap_or_else(|| event.date.clone());
    println!(
        "{} {} [{}] @ {} on {}",
        event.id.dimmed(),
        event.title.bold(),
        event.category,
        event.venue,
        when
    );
    if !event.tags.is_empty() {
        println!("   tags: {}", event.tags.join(", "));
    }
}

/// Helper function to format and print recommendations
fn print_recommendations(
    recommendations: &[Event],
    request: &ScoreRequest,
    scorer: &Scorer,
    now: DateTime<Utc>,
    explain: bool,
    remote: bool,
) {
    println!("{}", "Recommended events:".bold().blue());
    if recommendations.is_empty() {
        println!("  (no matching events)");
        return;
    }

    for (i, event) in recommendations.iter().enumerate() {
        let breakdown = scorer.score(event, request, now);
        println!("{}", recommendation_line(i + 1, event, &breakdown, remote));
        if explain {
            println!(
                "   tag {:.1} + text {:.1} + recency {:.1} (date {})",
                breakdown.tag, breakdown.text, breakdown.recency, event.date
            );
        }
    }
}

/// One ranked line. When a remote service chose the order, the number shown
/// is the local scorer's opinion, not the reason for the rank.
fn recommendation_line(rank: usize, event: &Event, breakdown: &ScoreBreakdown, remote: bool) -> String {
    let label = if remote { "Local score" } else { "Score" };
    format!(
        "{}. {} [{}] @ {} - {}: {:.2}",
        rank.to_string().green(),
        event.title,
        event.category,
        event.venue,
        label,
        breakdown.total()
    )
}
