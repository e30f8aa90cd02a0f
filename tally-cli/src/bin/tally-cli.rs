use clap::{Parser, Subcommand};
use console::{style, Term};
use dialoguer::Confirm;
use tally_wallet::{
    config::{PollConfig, RouterConfig, WalletConfig},
    ecash::EcashService,
    http::CrossPlatformHttpClient,
    localstore::sqlite::SqliteLocalStore,
    router::{DisabledRail, PaymentRouter, StorePayment},
    wallet::invoice_amount,
};
use tallycli::cli::{self, choose_mint, format_sats, CliService};
use tracing_subscriber::{prelude::*, EnvFilter};
use url::Url;

#[derive(Parser)]
#[command(version, arg_required_else_help(true))]
struct Opts {
    #[clap(flatten)]
    wallet: WalletConfig,

    #[clap(flatten)]
    router: RouterConfig,

    #[clap(flatten)]
    poll: PollConfig,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Add a mint to the wallet. The first mint becomes the selected one
    AddMint { mint_url: Url },

    /// Remove a mint that holds no proofs
    RemoveMint { mint_url: Option<Url> },

    /// Choose the mint used for deposits and payments
    SelectMint { mint_url: Option<Url> },

    /// Show version and configuration
    Info,

    /// Show balances per mint
    Balance,

    /// Create a lightning invoice to deposit sats into the selected mint
    Invoice {
        amount: u64,
        #[clap(short, long, default_value = "")]
        description: String,
    },

    /// Claim deposits that were paid after the wallet stopped waiting
    Claim,

    /// Pay a lightning invoice
    Pay {
        invoice: String,
        #[clap(short, long, default_value = "")]
        description: String,
    },

    /// Remove proofs the mint reports as spent
    Clean,

    /// Show recent transactions
    History {
        #[clap(short, long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Opts::parse();
    let term = Term::stdout();

    let db_path = cli.wallet.db_path()?;
    let localstore = SqliteLocalStore::with_path(db_path.clone()).await?;
    let service: CliService = EcashService::new(CrossPlatformHttpClient::new(), localstore)
        .with_poll_config(cli.poll.clone());
    if service.ensure_seed().await? {
        term.write_line("Created a new wallet seed.")?;
    }

    match cli.command {
        Command::AddMint { mint_url } => {
            let info = service.add_mint(&mint_url).await?;
            let name = info.name.unwrap_or_else(|| mint_url.to_string());
            term.write_line(&format!("Mint {} added successfully", style(name).cyan()))?;
        }
        Command::SelectMint { mint_url } => {
            let mint_url = match mint_url {
                Some(url) => Some(url),
                None => choose_mint(&service).await?,
            };
            match mint_url {
                Some(url) => {
                    service.select_mint(&url).await?;
                    term.write_line(&format!("Selected mint {}", style(url).cyan()))?;
                }
                None => no_mints(&term)?,
            }
        }
        Command::RemoveMint { mint_url } => {
            let mint_url = match mint_url {
                Some(url) => Some(url),
                None => choose_mint(&service).await?,
            };
            match mint_url {
                Some(url) => {
                    service.remove_mint(&url).await?;
                    term.write_line(&format!("Removed mint {}", style(url).cyan()))?;
                }
                None => no_mints(&term)?,
            }
        }
        Command::Info => {
            let version = style(env!("CARGO_PKG_VERSION")).cyan();
            term.write_line(&format!("Version: {version}"))?;
            term.write_line(&format!("DB: {}", style(&db_path).cyan()))?;

            let mints = service.get_mints_with_balance().await?;
            if mints.is_empty() {
                term.write_line("No mints found.")?;
            } else {
                term.write_line("Mints:")?;
                for (mint, _) in mints {
                    let marker = if mint.selected { " (selected)" } else { "" };
                    term.write_line(&format!(" - {}{marker}", mint.mint_url))?;
                }
            }
        }
        Command::Balance => {
            let mints = service.get_mints_with_balance().await?;
            if mints.is_empty() {
                return no_mints(&term);
            }
            term.write_line(&format!(
                "You have balances in {} mints",
                style(mints.iter().filter(|(_, b)| *b > 0).count()).cyan()
            ))?;
            for (mint, balance) in mints {
                term.write_line(&format!(
                    " - {} {}",
                    mint.mint_url,
                    style(format_sats(balance)).cyan()
                ))?;
            }
            cli::show_total_balance(&term, &service).await?;
        }
        Command::Invoice {
            amount,
            description,
        } => {
            let invoice = service
                .get_ecash_invoice(amount, None, &description)
                .await?;
            term.write_line(&format!(
                "Pay lightning invoice to deposit {}:\n\n{}",
                format_sats(amount),
                invoice.quote.payment_request
            ))?;
            term.write_line(&cli::render_qr(&invoice.quote.payment_request)?)?;

            let progress_bar = cli::progress_bar()?;
            progress_bar.set_message("Waiting for payment ...");
            match service.wait_for_mint_quote(&invoice).await? {
                Some(minted) => {
                    progress_bar.finish_with_message(format!(
                        "Received {}",
                        format_sats(minted.proofs.total_amount())
                    ));
                    cli::show_total_balance(&term, &service).await?;
                }
                None => progress_bar.finish_with_message(
                    "Invoice not paid yet. Run 'tally-cli claim' once it is paid.",
                ),
            }
        }
        Command::Claim => {
            let report = service.claim_unclaimed_ecash_quotes().await;
            term.write_line(&format!(
                "Claimed {} deposits, {} still waiting for payment, {} expired",
                style(report.claimed_count()).cyan(),
                report.kept.len(),
                report.dropped.len()
            ))?;
            cli::show_total_balance(&term, &service).await?;
        }
        Command::Pay {
            invoice,
            description,
        } => {
            let amount = invoice_amount(&invoice)?;
            let router = PaymentRouter::new(service, DisabledRail, DisabledRail, cli.router);

            let pay_confirmed = Confirm::new()
                .with_prompt(format!(
                    "Pay lightning invoice: amount {} + estimated fee {}?",
                    format_sats(amount),
                    format_sats(router.lightning_fee(amount))
                ))
                .interact()?;
            if !pay_confirmed {
                return Ok(());
            }

            match router
                .send_store_payment(&invoice, amount, &description)
                .await
            {
                StorePayment::Paid { rail, payment } => {
                    term.write_line(&format!(
                        "Invoice paid via {rail}: {} + fee {}",
                        format_sats(payment.amount),
                        format_sats(payment.fee)
                    ))?;
                    cli::show_total_balance(&term, router.ecash()).await?;
                }
                StorePayment::Failed { reason } => {
                    term.write_line(&format!("Error: {}", style(reason).red()))?;
                }
            }
        }
        Command::Clean => {
            let removed = service.clean_ecash_wallet_state(None).await?;
            term.write_line(&format!(
                "Removed {} spent proofs worth {}",
                removed.len(),
                format_sats(removed.total_amount())
            ))?;
        }
        Command::History { limit } => {
            let transactions = service.get_transactions(limit).await?;
            if transactions.is_empty() {
                term.write_line("No transactions yet.")?;
            }
            for transaction in transactions {
                term.write_line(&cli::format_transaction(&transaction))?;
            }
        }
    }
    Ok(())
}

fn no_mints(term: &Term) -> anyhow::Result<()> {
    term.write_line("No mints found. Add a mint first with 'tally-cli add-mint <mint-url>'")?;
    Ok(())
}
