//! coffee-bar: producer/consumer demo on a bounded buffer.
//!
//! Baristas brew random coffees onto a shared bar top, coffee addicts drink
//! them. After the run time the baristas stop, the bar top is polled until it
//! drains, and every addict is served a closing-time order so it can leave.
//! The run ends by comparing how many coffees were brewed and drunk.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=bbuf=trace cargo run -p coffee-bar
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use bbuf::{BoundedBuffer, BufferError};
use bbuf_coord_mem::MemCoordinator;
use rand::Rng;
use tracing_subscriber::EnvFilter;

const SIZES: [&str; 3] = ["ristretto", "espresso", "lungo"];
const KINDS: [&str; 3] = ["kahve", "espresso", "american"];

/// Shape of a demo run.
#[derive(Debug, Clone)]
struct CoffeeBarConfig {
    baristas: usize,
    addicts: usize,
    bar_top_capacity: usize,
    run_for: Duration,
    drain_poll: Duration,
}

impl Default for CoffeeBarConfig {
    fn default() -> Self {
        Self {
            baristas: 2,
            addicts: 2,
            bar_top_capacity: 100_000,
            run_for: Duration::from_secs(10),
            drain_poll: Duration::from_millis(50),
        }
    }
}

#[derive(Debug)]
#[allow(dead_code)]
struct Coffee {
    size: &'static str,
    sugar: u8,
    kind: &'static str,
}

impl Coffee {
    fn random(rng: &mut impl Rng) -> Self {
        Self {
            size: SIZES[rng.random_range(0..SIZES.len())],
            sugar: rng.random_range(0..3),
            kind: KINDS[rng.random_range(0..KINDS.len())],
        }
    }
}

/// What goes on the bar top.
#[derive(Debug)]
enum Order {
    Coffee(Coffee),
    /// Tells one addict to go home.
    ClosingTime,
}

type BarTop = BoundedBuffer<Order, MemCoordinator>;

#[derive(Default)]
struct Tally {
    brewed: AtomicU64,
    drunk: AtomicU64,
}

fn barista(bar_top: &BarTop, brewing: &AtomicBool, tally: &Tally) -> Result<(), BufferError> {
    tracing::info!("starting barista");
    let mut rng = rand::rng();
    while brewing.load(Ordering::Relaxed) {
        bar_top.put(Order::Coffee(Coffee::random(&mut rng)))?;
        tally.brewed.fetch_add(1, Ordering::Relaxed);
    }
    tracing::info!("stopping barista");
    Ok(())
}

fn coffee_addict(bar_top: &BarTop, tally: &Tally) -> Result<(), BufferError> {
    tracing::info!("starting coffee addict");
    loop {
        match bar_top.take()? {
            Order::Coffee(coffee) => {
                tracing::trace!(?coffee, "drinking");
                tally.drunk.fetch_add(1, Ordering::Relaxed);
            }
            Order::ClosingTime => break,
        }
    }
    tracing::info!("stopping coffee addict");
    Ok(())
}

async fn run(config: CoffeeBarConfig) -> Result<(), BufferError> {
    let coord = MemCoordinator::new();
    let bar_top: Arc<BarTop> = Arc::new(BoundedBuffer::new(&coord, config.bar_top_capacity)?);
    let brewing = Arc::new(AtomicBool::new(true));
    let tally = Arc::new(Tally::default());

    tracing::info!(bar_top = %bar_top.name(), ?config, "opening the coffee bar");

    let baristas: Vec<_> = (0..config.baristas)
        .map(|_| {
            let bar_top = bar_top.clone();
            let brewing = brewing.clone();
            let tally = tally.clone();
            tokio::task::spawn_blocking(move || barista(&bar_top, &brewing, &tally))
        })
        .collect();

    let addicts: Vec<_> = (0..config.addicts)
        .map(|_| {
            let bar_top = bar_top.clone();
            let tally = tally.clone();
            tokio::task::spawn_blocking(move || coffee_addict(&bar_top, &tally))
        })
        .collect();

    tokio::time::sleep(config.run_for).await;
    brewing.store(false, Ordering::Relaxed);
    for barista in baristas {
        join(barista).await?;
    }

    // Let the addicts finish what is left on the bar top.
    while !bar_top.is_empty()? {
        tokio::time::sleep(config.drain_poll).await;
    }

    for _ in 0..config.addicts {
        bar_top.put(Order::ClosingTime)?;
    }
    for addict in addicts {
        join(addict).await?;
    }

    let brewed = tally.brewed.load(Ordering::Relaxed);
    let drunk = tally.drunk.load(Ordering::Relaxed);
    if brewed != drunk {
        tracing::error!(brewed, drunk, "ouch, brewed and drunk coffees differ");
    } else {
        tracing::info!(brewed, "brewed and drank every coffee");
    }
    Ok(())
}

async fn join(
    handle: tokio::task::JoinHandle<Result<(), BufferError>>,
) -> Result<(), BufferError> {
    match handle.await {
        Ok(result) => result,
        Err(err) => std::panic::resume_unwind(err.into_panic()),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = CoffeeBarConfig::default();
    let rt = tokio::runtime::Builder::new_multi_thread()
        .max_blocking_threads(config.baristas + config.addicts)
        .enable_all()
        .build()
        .expect("failed to create runtime");

    if let Err(err) = rt.block_on(run(config)) {
        tracing::error!(%err, "coffee bar closed early");
        std::process::exit(1);
    }
}
