use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tally_core::{
    proof::{Proof, Proofs},
    transaction::EcashTransaction,
};
use tracing::instrument;
use url::Url;

use crate::{
    error::TallyWalletError,
    localstore::{LocalStore, WalletMint},
    quotes::PendingMintQuote,
};

#[derive(Clone, Debug)]
pub struct SqliteLocalStore {
    pool: sqlx::SqlitePool,
}

impl SqliteLocalStore {
    pub async fn with_path(absolute_path: String) -> Result<Self, TallyWalletError> {
        Self::with_connection_string(&format!("sqlite://{absolute_path}?mode=rwc")).await
    }

    pub async fn with_in_memory() -> Result<Self, TallyWalletError> {
        Self::with_connection_string("sqlite::memory:").await
    }

    async fn with_connection_string(connection_string: &str) -> Result<Self, TallyWalletError> {
        // an in-memory database exists once per connection
        let max_connections = if connection_string.contains(":memory:") {
            1
        } else {
            5
        };
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    async fn insert_mint(
        conn: &mut sqlx::SqliteConnection,
        mint_url: &Url,
    ) -> Result<(), TallyWalletError> {
        sqlx::query(
            r#"INSERT INTO mints (mint_url, selected, counter) VALUES ($1, FALSE, 0)
            ON CONFLICT (mint_url) DO UPDATE SET removed = FALSE;"#,
        )
            .bind(mint_url.as_str())
            .execute(conn)
            .await?;
        Ok(())
    }
}

fn proof_from_row(row: &SqliteRow) -> Result<Proof, TallyWalletError> {
    let amount: i64 = row.try_get("amount")?;
    let c: String = row.try_get("C")?;
    Ok(Proof::new(
        amount as u64,
        row.try_get("secret")?,
        c.parse()?,
        row.try_get("keyset_id")?,
    ))
}

fn transaction_from_row(row: &SqliteRow) -> Result<EcashTransaction, TallyWalletError> {
    let mint_url: String = row.try_get("mint_url")?;
    let amount: i64 = row.try_get("amount")?;
    let fee: i64 = row.try_get("fee")?;
    let payment_type: String = row.try_get("payment_type")?;
    Ok(EcashTransaction {
        id: row.try_get("id")?,
        mint_url: Url::parse(&mint_url)?,
        time: row.try_get::<DateTime<Utc>, _>("time")?,
        description: row.try_get("description")?,
        amount: amount as u64,
        payment_type: payment_type.parse()?,
        fee: fee as u64,
        preimage: row.try_get("preimage")?,
        invoice: row.try_get("invoice")?,
    })
}

fn pending_quote_from_row(row: &SqliteRow) -> Result<PendingMintQuote, TallyWalletError> {
    let mint_url: String = row.try_get("mint_url")?;
    let amount: i64 = row.try_get("amount")?;
    let expiry: Option<i64> = row.try_get("expiry")?;
    Ok(PendingMintQuote {
        quote_id: row.try_get("quote_id")?,
        mint_url: Url::parse(&mint_url)?,
        amount: amount as u64,
        request: row.try_get("request")?,
        description: row.try_get("description")?,
        expiry: expiry.map(|e| e as u64),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait(?Send)]
impl LocalStore for SqliteLocalStore {
    #[instrument(level = "debug", skip(self, proofs), err)]
    async fn add_proofs(&self, mint_url: &Url, proofs: &Proofs) -> Result<(), TallyWalletError> {
        let mut tx = self.pool.begin().await?;
        for proof in proofs.iter() {
            sqlx::query(
                r#"INSERT OR IGNORE INTO proofs (secret, mint_url, keyset_id, amount, C, time_created)
                VALUES ($1, $2, $3, $4, $5, CURRENT_TIMESTAMP);"#,
            )
            .bind(&proof.secret)
            .bind(mint_url.as_str())
            .bind(&proof.keyset_id)
            .bind(proof.amount as i64)
            .bind(proof.c.to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn get_proofs(&self, mint_url: &Url) -> Result<Proofs, TallyWalletError> {
        sqlx::query("SELECT keyset_id, amount, C, secret FROM proofs WHERE mint_url = $1;")
            .bind(mint_url.as_str())
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(proof_from_row)
            .collect()
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn get_all_proofs(&self) -> Result<Vec<(Url, Proofs)>, TallyWalletError> {
        let rows = sqlx::query("SELECT mint_url, keyset_id, amount, C, secret FROM proofs;")
            .fetch_all(&self.pool)
            .await?;

        let mut by_mint: BTreeMap<String, Vec<Proof>> = BTreeMap::new();
        for row in &rows {
            let mint_url: String = row.try_get("mint_url")?;
            by_mint.entry(mint_url).or_default().push(proof_from_row(row)?);
        }

        by_mint
            .into_iter()
            .map(|(mint_url, proofs)| Ok((Url::parse(&mint_url)?, proofs.into())))
            .collect()
    }

    #[instrument(level = "debug", skip(self, proofs), err)]
    async fn delete_proofs(
        &self,
        mint_url: &Url,
        proofs: &Proofs,
    ) -> Result<(), TallyWalletError> {
        let mut tx = self.pool.begin().await?;
        for proof in proofs.iter() {
            sqlx::query("DELETE FROM proofs WHERE secret = $1 AND mint_url = $2;")
                .bind(&proof.secret)
                .bind(mint_url.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn add_mint(&self, mint_url: &Url) -> Result<(), TallyWalletError> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_mint(&mut *conn, mint_url).await
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn get_mints(&self) -> Result<Vec<WalletMint>, TallyWalletError> {
        sqlx::query(
            r#"SELECT mint_url, selected, counter FROM mints
            WHERE removed = FALSE ORDER BY mint_url;"#,
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            let mint_url: String = row.try_get("mint_url")?;
            let counter: i64 = row.try_get("counter")?;
            Ok(WalletMint {
                mint_url: Url::parse(&mint_url)?,
                selected: row.try_get("selected")?,
                counter: counter as u64,
            })
        })
        .collect()
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn select_mint(&self, mint_url: &Url) -> Result<(), TallyWalletError> {
        let mut tx = self.pool.begin().await?;
        Self::insert_mint(&mut *tx, mint_url).await?;
        sqlx::query("UPDATE mints SET selected = (mint_url = $1);")
            .bind(mint_url.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn get_selected_mint(&self) -> Result<Option<Url>, TallyWalletError> {
        let mint_url: Option<String> =
            sqlx::query_scalar("SELECT mint_url FROM mints WHERE selected = TRUE LIMIT 1;")
                .fetch_optional(&self.pool)
                .await?;
        Ok(mint_url.map(|url| Url::parse(&url)).transpose()?)
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn remove_mint(&self, mint_url: &Url) -> Result<(), TallyWalletError> {
        // the row keeps the counter, secrets must not be derived twice if the mint comes back
        sqlx::query("UPDATE mints SET removed = TRUE, selected = FALSE WHERE mint_url = $1;")
            .bind(mint_url.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn reserve_counter(&self, mint_url: &Url, count: u64) -> Result<u64, TallyWalletError> {
        let mut tx = self.pool.begin().await?;
        Self::insert_mint(&mut *tx, mint_url).await?;
        let new_value: i64 = sqlx::query_scalar(
            "UPDATE mints SET counter = counter + $1 WHERE mint_url = $2 RETURNING counter;",
        )
        .bind(count as i64)
        .bind(mint_url.as_str())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(new_value as u64 - count)
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn get_counter(&self, mint_url: &Url) -> Result<u64, TallyWalletError> {
        let counter: Option<i64> =
            sqlx::query_scalar("SELECT counter FROM mints WHERE mint_url = $1;")
                .bind(mint_url.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(counter.unwrap_or_default() as u64)
    }

    #[instrument(level = "debug", skip_all, err)]
    async fn add_seed(&self, seed_words: &str) -> Result<(), TallyWalletError> {
        sqlx::query("INSERT INTO seed (seed_words) VALUES ($1);")
            .bind(seed_words)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_seed(&self) -> Result<Option<String>, TallyWalletError> {
        let rows: Vec<String> = sqlx::query_scalar("SELECT seed_words FROM seed;")
            .fetch_all(&self.pool)
            .await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.into_iter().next()),
            _ => Err(TallyWalletError::MultipleSeeds),
        }
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn add_pending_quote(&self, quote: &PendingMintQuote) -> Result<(), TallyWalletError> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO pending_mint_quotes
            (quote_id, mint_url, amount, request, description, expiry, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7);"#,
        )
        .bind(&quote.quote_id)
        .bind(quote.mint_url.as_str())
        .bind(quote.amount as i64)
        .bind(&quote.request)
        .bind(&quote.description)
        .bind(quote.expiry.map(|e| e as i64))
        .bind(quote.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn get_pending_quotes(&self) -> Result<Vec<PendingMintQuote>, TallyWalletError> {
        sqlx::query("SELECT * FROM pending_mint_quotes ORDER BY created_at;")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(pending_quote_from_row)
            .collect()
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn delete_pending_quote(
        &self,
        mint_url: &Url,
        quote_id: &str,
    ) -> Result<(), TallyWalletError> {
        sqlx::query("DELETE FROM pending_mint_quotes WHERE quote_id = $1 AND mint_url = $2;")
            .bind(quote_id)
            .bind(mint_url.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, transactions), err)]
    async fn add_transactions(
        &self,
        transactions: &[EcashTransaction],
    ) -> Result<(), TallyWalletError> {
        let mut tx = self.pool.begin().await?;
        for transaction in transactions {
            sqlx::query(
                r#"INSERT OR IGNORE INTO transactions
                (id, mint_url, time, description, amount, payment_type, fee, preimage, invoice)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9);"#,
            )
            .bind(&transaction.id)
            .bind(transaction.mint_url.as_str())
            .bind(transaction.time)
            .bind(&transaction.description)
            .bind(transaction.amount as i64)
            .bind(transaction.payment_type.to_string())
            .bind(transaction.fee as i64)
            .bind(&transaction.preimage)
            .bind(&transaction.invoice)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn get_transactions(
        &self,
        limit: u32,
    ) -> Result<Vec<EcashTransaction>, TallyWalletError> {
        sqlx::query("SELECT * FROM transactions ORDER BY time DESC LIMIT $1;")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(transaction_from_row)
            .collect()
    }
}
