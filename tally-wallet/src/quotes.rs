//! Tracking of deposit (mint) quotes until they are claimed.
//!
//! A quote is written to the store as soon as the invoice is handed out, so an invoice that gets
//! paid after the app stopped polling can still be claimed by the next reconciliation pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::primitives::{MintQuoteState, PostMintQuoteBolt11Response};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMintQuote {
    pub quote_id: String,
    pub mint_url: Url,
    pub amount: u64,
    pub request: String,
    pub description: String,
    /// unix timestamp in seconds
    pub expiry: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl PendingMintQuote {
    pub fn new(
        mint_url: Url,
        amount: u64,
        description: impl Into<String>,
        quote: &PostMintQuoteBolt11Response,
    ) -> Self {
        Self {
            quote_id: quote.quote.clone(),
            mint_url,
            amount,
            request: quote.payment_request.clone(),
            description: description.into(),
            expiry: quote.expiry,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_some_and(|expiry| now.timestamp() > expiry as i64)
    }

    /// What the reconciliation pass does with this quote given the state the mint reported.
    pub fn next_action(&self, state: MintQuoteState, now: DateTime<Utc>) -> QuoteAction {
        match state {
            MintQuoteState::Paid => QuoteAction::Claim,
            MintQuoteState::Issued => QuoteAction::Drop,
            MintQuoteState::Unpaid if self.is_expired(now) => QuoteAction::Drop,
            MintQuoteState::Unpaid => QuoteAction::Keep,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteAction {
    Keep,
    Claim,
    Drop,
}

/// Outcome of one `claim_unclaimed_ecash_quotes` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimReport {
    /// quote ids that were minted into proofs
    pub claimed: Vec<String>,
    pub dropped: Vec<String>,
    pub kept: Vec<String>,
}

impl ClaimReport {
    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tally_core::primitives::{MintQuoteState, PostMintQuoteBolt11Response};
    use url::Url;

    use super::{PendingMintQuote, QuoteAction};

    fn quote(expiry: Option<u64>) -> anyhow::Result<PendingMintQuote> {
        let response = PostMintQuoteBolt11Response {
            quote: "quote-1".into(),
            payment_request: "lnbc100n1...".into(),
            state: MintQuoteState::Unpaid,
            expiry,
        };
        Ok(PendingMintQuote::new(
            Url::parse("http://127.0.0.1:3338")?,
            10,
            "deposit",
            &response,
        ))
    }

    #[test]
    fn test_next_action() -> anyhow::Result<()> {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let open = quote(Some(1_700_000_600))?;
        let expired = quote(Some(1_699_999_000))?;
        let no_expiry = quote(None)?;

        assert_eq!(QuoteAction::Keep, open.next_action(MintQuoteState::Unpaid, now));
        assert_eq!(QuoteAction::Drop, expired.next_action(MintQuoteState::Unpaid, now));
        assert_eq!(QuoteAction::Keep, no_expiry.next_action(MintQuoteState::Unpaid, now));
        // a paid quote is claimed even after its invoice expired
        assert_eq!(QuoteAction::Claim, expired.next_action(MintQuoteState::Paid, now));
        assert_eq!(QuoteAction::Drop, open.next_action(MintQuoteState::Issued, now));
        Ok(())
    }
}
