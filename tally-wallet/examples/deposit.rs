use std::env::temp_dir;

use tally_wallet::{
    ecash::EcashService, http::CrossPlatformHttpClient, localstore::sqlite::SqliteLocalStore,
};
use url::Url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let db_path = temp_dir().join("wallet.db").to_string_lossy().to_string();
    let localstore = SqliteLocalStore::with_path(db_path).await?;

    let service = EcashService::new(CrossPlatformHttpClient::new(), localstore);
    service.ensure_seed().await?;
    service
        .add_mint(&Url::parse("https://testnut.cashu.space")?)
        .await?;

    let invoice = service.get_ecash_invoice(21, None, "example").await?;
    println!("Pay {}", invoice.quote.payment_request);

    match service.wait_for_mint_quote(&invoice).await? {
        Some(minted) => println!("Received {} sats", minted.proofs.total_amount()),
        None => println!("Not paid yet, claim it later"),
    }
    println!("New balance: {} sats", service.get_balance(None).await?);
    Ok(())
}
