use std::time::Duration;

use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Select};
use indicatif::{ProgressBar, ProgressStyle};
use num_format::{Locale, ToFormattedString};
use qrcode::{render::unicode, QrCode};
use tally_core::transaction::{EcashTransaction, PaymentType};
use tally_wallet::{
    ecash::EcashService, http::CrossPlatformHttpClient, localstore::sqlite::SqliteLocalStore,
};
use url::Url;

pub type CliService = EcashService<CrossPlatformHttpClient, SqliteLocalStore>;

pub fn progress_bar() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    Ok(pb)
}

pub fn format_sats(amount: u64) -> String {
    format!("{} (sat)", amount.to_formatted_string(&Locale::en))
}

pub fn render_qr(data: &str) -> anyhow::Result<String> {
    Ok(QrCode::new(data)?
        .render::<unicode::Dense1x2>()
        .quiet_zone(true)
        .build())
}

pub fn format_transaction(transaction: &EcashTransaction) -> String {
    let sign = match transaction.payment_type {
        PaymentType::Sent => "-",
        PaymentType::Received => "+",
    };
    let mut line = format!(
        "{} {sign}{}",
        transaction.time.format("%Y-%m-%d %H:%M"),
        format_sats(transaction.amount)
    );
    if transaction.fee > 0 {
        line.push_str(&format!(" fee {}", format_sats(transaction.fee)));
    }
    if !transaction.description.is_empty() {
        line.push_str(&format!(" {}", transaction.description));
    }
    line
}

/// Lets the user pick one of the known mints. Returns `None` if the wallet has no mints.
pub async fn choose_mint(service: &CliService) -> anyhow::Result<Option<Url>> {
    let mints = service.get_mints_with_balance().await?;

    match mints.len() {
        0 => Ok(None),
        1 => Ok(Some(mints[0].0.mint_url.clone())),
        _ => {
            let mints_display = mints
                .iter()
                .map(|(mint, balance)| {
                    let marker = if mint.selected { "*" } else { " " };
                    format!("{marker} {} - {}", mint.mint_url, format_sats(*balance))
                })
                .collect::<Vec<String>>();

            let default = mints.iter().position(|(m, _)| m.selected).unwrap_or(0);
            let selection = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Choose a mint:")
                .default(default)
                .items(&mints_display[..])
                .interact()?;
            Ok(Some(mints[selection].0.mint_url.clone()))
        }
    }
}

pub async fn show_total_balance(term: &Term, service: &CliService) -> anyhow::Result<()> {
    term.write_line(&format!(
        "Total balance {}",
        style(format_sats(service.get_total_balance().await?)).cyan()
    ))?;
    Ok(())
}
