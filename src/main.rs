//! `checkout` binary
//!
//! Runs the purchase recorder, lists plans, probes RPC endpoints, or buys a
//! plan from the terminal with a local keypair.

use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use mk_volume_checkout::{
    application::{Application, HealthService, HealthStatus},
    config::{AppConfig, CliArgs, ConfigLoader},
    core::types::lamports_to_sol,
    services::{
        payment::{
            ConnectOutcome, PaymentMachine, PaymentObserver, PaymentOutcome, PaymentSettings,
            PaymentStatus, StatusEvent,
        },
        recorder::HttpPurchaseRecorder,
        solana::EndpointResolver,
        wallet::{Approval, KeypairWallet, WalletProvider},
    },
    utils::{telemetry, Command},
};
use std::path::Path;
use std::process;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() {
    if let Err(e) = color_eyre::install() {
        eprintln!("Failed to install color-eyre: {}", e);
        process::exit(1);
    }

    if let Err(e) = run().await {
        error!("Fatal error: {:?}", e);
        eprintln!("\n❌ {:?}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli_args = CliArgs::parse();
    let command = cli_args.command();

    let config = ConfigLoader::new()
        .with_cli_args(cli_args)
        .load()
        .await
        .wrap_err("Configuration loading failed")?;

    let _guard = init_telemetry(&config)?;
    install_metrics_exporter(&config)?;

    match command {
        Command::Serve => serve(config).await,
        Command::Plans => {
            print_plans(&config);
            Ok(())
        }
        Command::Probe => probe(&config).await,
        Command::Pay { plan, keypair, yes } => pay(&config, plan, &keypair, yes).await,
    }
}

fn init_telemetry(config: &AppConfig) -> Result<Option<WorkerGuard>> {
    let env = &config.environment;
    match &env.log_directory {
        Some(directory) => telemetry::init_with_file_rotation(&env.log_level, &env.log_format, directory, "checkout")
            .map(Some)
            .map_err(|e| eyre!("Failed to initialize telemetry: {:#}", e)),
        None => telemetry::init(&env.log_level, &env.log_format)
            .map(|_| None)
            .map_err(|e| eyre!("Failed to initialize telemetry: {:#}", e)),
    }
}

#[cfg(feature = "prometheus")]
fn install_metrics_exporter(config: &AppConfig) -> Result<()> {
    if config.telemetry.enable_metrics {
        let port = config.telemetry.metrics_port;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .map_err(|e| eyre!("Failed to install Prometheus exporter: {}", e))?;
        info!("📊 Prometheus metrics on port {}", port);
    }
    Ok(())
}

#[cfg(not(feature = "prometheus"))]
fn install_metrics_exporter(config: &AppConfig) -> Result<()> {
    if config.telemetry.enable_metrics {
        warn!("⚠️  Metrics requested but the prometheus feature is disabled");
    }
    Ok(())
}

#[instrument(skip_all)]
async fn serve(config: AppConfig) -> Result<()> {
    if config.is_development() {
        warn!("⚠️  Running in DEVELOPMENT mode");
    }

    let app = Application::build(config)
        .await
        .wrap_err("Application initialization failed")?;

    app.run().await.wrap_err("Recorder runtime error")
}

fn print_plans(config: &AppConfig) {
    println!("Available plans:");
    for (i, plan) in config.payment.plans.iter().enumerate() {
        println!("  {}. {:<28} {:>4} h  {:>6} SOL", i + 1, plan.label, plan.hours, plan.price_sol);
    }
    println!("\nPayments go to {}", config.payment.treasury_address);
}

async fn probe(config: &AppConfig) -> Result<()> {
    let resolver = Arc::new(EndpointResolver::from_config(&config.solana));
    let report = HealthService::new(resolver).check().await;

    println!("{}", report.summary());
    if report.status == HealthStatus::Unhealthy {
        return Err(eyre!("No RPC endpoint is reachable"));
    }
    Ok(())
}

/// Prints the checkout progress the way the dialog shows it
struct TerminalObserver;

impl PaymentObserver for TerminalObserver {
    fn on_transition(&self, event: &StatusEvent) {
        let line = match event.to {
            PaymentStatus::WalletConnecting => "🔌 Connecting wallet...",
            PaymentStatus::WalletConnected => "👛 Wallet connected",
            PaymentStatus::Submitting => "🧾 Preparing transfer...",
            PaymentStatus::AwaitingSignature => "✍️  Waiting for approval...",
            PaymentStatus::Broadcasting => "📡 Sending transaction...",
            PaymentStatus::Confirming => "⏳ Waiting for confirmation...",
            PaymentStatus::Recording => "📨 Recording purchase...",
            PaymentStatus::Idle => match &event.failure {
                Some(failure) => {
                    println!("⚠️  {}", failure.message);
                    return;
                }
                None => "🔌 Wallet disconnected",
            },
            PaymentStatus::Succeeded | PaymentStatus::Failed(_) | PaymentStatus::Cancelled => return,
        };
        println!("{}", line);
    }

    fn on_complete(&self, _outcome: &PaymentOutcome) {}
}

#[instrument(skip(config, keypair))]
async fn pay(config: &AppConfig, plan_number: usize, keypair: &Path, yes: bool) -> Result<()> {
    let plan = config
        .plan(plan_number)
        .cloned()
        .ok_or_else(|| eyre!("No plan #{}; run `checkout plans` to list them", plan_number))?;

    let settings = PaymentSettings::from_config(config)?;
    let resolver = Arc::new(EndpointResolver::from_config(&config.solana));
    let recorder = Arc::new(HttpPurchaseRecorder::from_config(&config.recorder)?);

    let approval = if yes { Approval::Automatic } else { Approval::Prompt };
    let wallet: Option<Arc<dyn WalletProvider>> = match KeypairWallet::from_file(keypair, approval) {
        Ok(wallet) => Some(Arc::new(wallet)),
        Err(e) => {
            warn!("⚠️  {}", e);
            None
        }
    };

    println!("🛒 {}", plan);
    let mut machine = PaymentMachine::new(plan, wallet, resolver, recorder, settings)
        .with_observer(Arc::new(TerminalObserver));

    let handle = machine.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && !handle.cancel() {
            println!("⚠️  Transaction already sent; waiting for the result");
        }
    });

    let outcome = match machine.connect().await? {
        ConnectOutcome::Connected { address, balance_lamports } => {
            println!("   {} ({} SOL)", address, lamports_to_sol(balance_lamports).round_dp(4));
            match machine.pay().await {
                Ok(outcome) => outcome,
                Err(e) => {
                    if let Some(signature) = e.transaction_signature() {
                        println!("   Signature: {}", signature);
                    }
                    return Err(e.into());
                }
            }
        }
        ConnectOutcome::Retryable(failure) => return Err(eyre!(failure.message)),
        ConnectOutcome::Finished(outcome) => outcome,
    };

    match outcome {
        PaymentOutcome::Succeeded { signature, receipt, .. } => {
            println!("🎉 {}", receipt.message);
            println!("   Purchase: {}", receipt.purchase_id);
            println!("   Signature: {}", signature);
            Ok(())
        }
        PaymentOutcome::Failed { failure, .. } => {
            if let Some(signature) = failure.signature {
                println!("   Signature: {}", signature);
            }
            Err(eyre!("{}", failure))
        }
        PaymentOutcome::Cancelled { .. } => {
            println!("🛑 Payment cancelled, nothing was sent");
            Ok(())
        }
    }
}
