// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use console::Emoji;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use podupgrade::{
    AnalyticsEvent, AnalyticsSink, BillingScript, CatalogLocation, CompletionCallback,
    EntryContext, EntrySource, FixedEligibility, JsonPreferenceStore, LoadedState,
    MemoryPreferenceStore, NoopSink, PollingCatalogSource, PreferenceStore, PurchaseBus,
    PurchaseEvents, PurchaseOutcome, ReqwestClient, ScriptedBilling, SessionDeps,
    SessionOptions, SharedAnalyticsSink, SubscriptionFrequency, SubscriptionTier, UpgradeFlow,
    UpgradeState, start_session,
};

// Emoji with fallback for terminals without Unicode support
static SPARKLES: Emoji<'_, '_> = Emoji("✨ ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static CARD: Emoji<'_, '_> = Emoji("💳 ", "[$] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[>] ");
static POINTER: Emoji<'_, '_> = Emoji("👉 ", "-> ");

/// Pick a subscription offer from a catalog and simulate purchasing it
#[derive(Parser, Debug)]
#[command(name = "podupgrade")]
#[command(about = "Pick a subscription offer from a catalog and simulate purchasing it")]
#[command(version)]
struct Args {
    /// Catalog URL or path to a local catalog JSON file
    catalog: String,

    /// Where the upgrade screen was opened from (login, profile, account-details, ...)
    #[arg(short, long, default_value = "unknown")]
    source: EntrySource,

    /// Only show the Patron tier
    #[arg(long)]
    patron_only: bool,

    /// Switch to this tier after loading
    #[arg(short, long, value_enum)]
    tier: Option<TierArg>,

    /// Switch to this billing frequency after loading
    #[arg(short, long, value_enum)]
    frequency: Option<FrequencyArg>,

    /// Treat the user as eligible for promotional offers
    #[arg(long)]
    eligible: bool,

    /// Purchase the selected offer; the billing backend answers with this outcome
    #[arg(long, value_enum)]
    buy: Option<OutcomeArg>,

    /// Reload the catalog every N seconds while the session runs
    #[arg(long)]
    refresh: Option<u64>,

    /// Seconds to wait for a purchase outcome
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// File that remembers the last selected tier and frequency
    #[arg(short, long)]
    preferences: Option<PathBuf>,

    /// Quiet mode - only print the final selection
    #[arg(short, long)]
    quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TierArg {
    Plus,
    Patron,
}

impl From<TierArg> for SubscriptionTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Plus => SubscriptionTier::Plus,
            TierArg::Patron => SubscriptionTier::Patron,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FrequencyArg {
    Monthly,
    Yearly,
}

impl From<FrequencyArg> for SubscriptionFrequency {
    fn from(frequency: FrequencyArg) -> Self {
        match frequency {
            FrequencyArg::Monthly => SubscriptionFrequency::Monthly,
            FrequencyArg::Yearly => SubscriptionFrequency::Yearly,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutcomeArg {
    Success,
    Cancelled,
    Failure,
    /// Never report an outcome
    Silent,
    /// Refuse to open the billing flow
    Refuse,
}

impl From<OutcomeArg> for BillingScript {
    fn from(outcome: OutcomeArg) -> Self {
        match outcome {
            OutcomeArg::Success => BillingScript::Respond(PurchaseOutcome::Success),
            OutcomeArg::Cancelled => BillingScript::Respond(PurchaseOutcome::Cancelled),
            OutcomeArg::Failure => BillingScript::Respond(PurchaseOutcome::Failure {
                message: "payment declined".to_string(),
            }),
            OutcomeArg::Silent => BillingScript::Silent,
            OutcomeArg::Refuse => BillingScript::RefuseLaunch,
        }
    }
}

/// Analytics sink that prints every event
struct TerminalSink;

impl AnalyticsSink for TerminalSink {
    fn record(&self, event: AnalyticsEvent) {
        let properties = event
            .properties()
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("  {} {}", event.name().dimmed(), properties.dimmed());
    }
}

/// How a purchase attempt ended, as seen by the CLI
enum PurchaseResult {
    Completed,
    Cancelled,
    Failed,
    NoOutcome,
}

fn print_offers(loaded: &LoadedState) {
    for offer in &loaded.offers {
        let marker = if *offer == loaded.selected {
            POINTER.to_string()
        } else {
            "   ".to_string()
        };
        let trial = if offer.has_free_trial() {
            " (free trial)".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "  {}{} {} - {}{}",
            marker,
            offer.tier.to_string().bold(),
            offer.frequency.to_string().cyan(),
            offer.recurring_phase.formatted_price,
            trial
        );
    }
}

fn print_selection(loaded: &LoadedState) {
    println!(
        "\n{CARD}Selected: {} {} ({})",
        loaded.tier.to_string().bold().green(),
        loaded.frequency.to_string().green(),
        loaded.selected.product_id.dimmed()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            SPARKLES,
            "podupgrade".bold().magenta(),
            "- Subscription Upgrade".dimmed()
        );
    }

    let client = Arc::new(ReqwestClient::new());
    let mut catalog = PollingCatalogSource::new(CatalogLocation::parse(&args.catalog), client);
    if let Some(seconds) = args.refresh {
        catalog = catalog.with_refresh_interval(Duration::from_secs(seconds));
    }

    let preferences: Arc<dyn PreferenceStore> = match &args.preferences {
        Some(path) => Arc::new(JsonPreferenceStore::at_path(path.clone())),
        None => Arc::new(MemoryPreferenceStore::default()),
    };

    let bus = PurchaseBus::new();
    let script = args.buy.map(BillingScript::from).unwrap_or(BillingScript::Silent);
    let billing = ScriptedBilling::new(bus.clone(), script).with_delay(Duration::from_millis(300));

    let analytics: SharedAnalyticsSink = if args.quiet {
        NoopSink::shared()
    } else {
        Arc::new(TerminalSink)
    };

    let flow = if args.patron_only || args.source == EntrySource::AccountDetails {
        UpgradeFlow::PatronUpgrade
    } else {
        UpgradeFlow::PlusUpgrade
    };

    let options = SessionOptions {
        entry: EntryContext {
            flow,
            source: args.source,
            patron_only: args.patron_only,
        },
        purchase_timeout: Some(Duration::from_secs(args.timeout)),
    };

    let deps = SessionDeps {
        catalog: Arc::new(catalog),
        eligibility: Arc::new(FixedEligibility(args.eligible)),
        preferences,
        billing: Arc::new(billing),
        purchases: Arc::new(bus.clone()),
        analytics,
    };

    let (completed_tx, completed_rx) = oneshot::channel();
    let on_complete: CompletionCallback = Box::new(move || {
        let _ = completed_tx.send(());
    });

    let session = start_session(options, deps, Some(on_complete));
    let handle = session.handle().clone();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {wide_msg}")
            .context("Invalid spinner template")?,
    );
    if !args.quiet {
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(format!("{SEARCH}Loading catalog: {}", args.catalog.cyan()));
    }

    let state = handle
        .wait_until_ready()
        .await
        .context("Upgrade session stopped before the catalog loaded")?;
    spinner.finish_and_clear();

    handle.shown().await?;

    let loaded = match state {
        UpgradeState::Loaded(loaded) => loaded,
        UpgradeState::NoSubscriptions { show_skip } => {
            println!("{FAILURE}{}", "No subscriptions available".red().bold());
            if show_skip {
                println!("{SKIP}{}", "Skipping upgrade for now".dimmed());
                handle.not_now().await?;
            }
            session.shutdown().await;
            std::process::exit(1);
        }
        UpgradeState::Loading => bail!("Catalog never finished loading"),
    };

    if !args.quiet {
        print_offers(&loaded);
    }

    if let Some(tier) = args.tier {
        handle.change_tier(tier.into()).await?;
    }
    if let Some(frequency) = args.frequency {
        handle.change_frequency(frequency.into()).await?;
    }

    let current = handle.state();
    let Some(loaded) = current.as_loaded() else {
        bail!("Selection was lost while changing tier or frequency");
    };
    print_selection(loaded);

    let mut failed = false;

    if args.buy.is_some() {
        // Cancellation leaves no trace in the published state, so watch the billing feed for it
        let mut outcomes = bus.subscribe();

        handle
            .request_purchase()
            .await
            .context("Failed to start purchase")?;

        let cancelled = async {
            while let Some(outcome) = outcomes.next().await {
                if outcome == PurchaseOutcome::Cancelled {
                    return;
                }
            }
            std::future::pending::<()>().await
        };
        let purchase_failed = handle.wait_for(|state| {
            state
                .as_loaded()
                .is_some_and(|loaded| loaded.purchase_failed)
        });

        let result = tokio::select! {
            done = completed_rx => match done {
                Ok(()) => PurchaseResult::Completed,
                Err(_) => PurchaseResult::NoOutcome,
            },
            _ = cancelled => PurchaseResult::Cancelled,
            state = purchase_failed => match state {
                Ok(_) => PurchaseResult::Failed,
                Err(_) => PurchaseResult::NoOutcome,
            },
            _ = tokio::time::sleep(Duration::from_secs(args.timeout + 5)) => {
                PurchaseResult::NoOutcome
            }
        };

        match result {
            PurchaseResult::Completed => {
                println!("\n{SUCCESS}{}", "Purchase complete".bold().green());
            }
            PurchaseResult::Cancelled => {
                println!("\n{}", "Purchase cancelled".yellow());
            }
            PurchaseResult::Failed => {
                println!("\n{FAILURE}{}", "Purchase failed".red().bold());
                failed = true;
            }
            PurchaseResult::NoOutcome => {
                println!("\n{FAILURE}{}", "No purchase outcome received".red());
                failed = true;
            }
        }
    } else {
        handle.dismissed().await?;
    }

    session.shutdown().await;

    if failed {
        std::process::exit(1);
    }

    Ok(())
}
