//! Picks one funding rail for a lightning payment: eCash, then Liquid, then the node's channels.
//!
//! A payment never touches more than one rail. eCash failures fall through to the next rail, a
//! failed Liquid or Lightning payment is final.

use std::fmt::Display;

use async_trait::async_trait;
use lightning_invoice::Bolt11Invoice;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[cfg(test)]
use mockall::automock;

use crate::{
    client::CashuClient,
    config::RouterConfig,
    ecash::EcashService,
    error::TallyWalletError,
    localstore::LocalStore,
    wallet::decode_invoice,
};

pub const NO_BALANCE_REASON: &str = "No available balances for your purchase.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rail {
    Ecash,
    Liquid,
    Lightning,
}

impl Display for Rail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ecash => write!(f, "ecash"),
            Self::Liquid => write!(f, "liquid"),
            Self::Lightning => write!(f, "lightning"),
        }
    }
}

/// A payment that went through, whatever rail carried it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledPayment {
    pub amount: u64,
    pub fee: u64,
    pub preimage: Option<String>,
    /// quote id or payment id of the rail
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StorePayment {
    Paid { rail: Rail, payment: SettledPayment },
    Failed { reason: String },
}

impl StorePayment {
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Paid { .. })
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Swap limits and fees of the Liquid rail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapFees {
    pub fee_percent: f64,
    pub miner_fee: u64,
    pub min_swap_amount: u64,
}

#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait EcashRail {
    async fn balance(&self) -> Result<u64, TallyWalletError>;

    async fn pay_invoice(
        &self,
        invoice: &str,
        description: &str,
    ) -> Result<SettledPayment, TallyWalletError>;
}

#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait LiquidRail {
    async fn balance(&self) -> Result<u64, TallyWalletError>;

    async fn swap_fees(&self) -> Result<SwapFees, TallyWalletError>;

    async fn pay_invoice(
        &self,
        invoice: &str,
        amount: u64,
    ) -> Result<SettledPayment, TallyWalletError>;
}

#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait LightningRail {
    async fn channel_balance(&self) -> Result<u64, TallyWalletError>;

    async fn pay_invoice(
        &self,
        invoice: &Bolt11Invoice,
        amount: u64,
    ) -> Result<SettledPayment, TallyWalletError>;
}

#[async_trait(?Send)]
impl<C: CashuClient + Clone, L: LocalStore + Clone> EcashRail for EcashService<C, L> {
    async fn balance(&self) -> Result<u64, TallyWalletError> {
        self.get_balance(None).await
    }

    async fn pay_invoice(
        &self,
        invoice: &str,
        description: &str,
    ) -> Result<SettledPayment, TallyWalletError> {
        let plan = self.get_melt_quote(invoice).await?;
        self.pay_ln_invoice_from_ecash(&plan, invoice, description)
            .await
    }
}

/// A rail without funds, for hosts that have no SDK behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRail;

impl DisabledRail {
    fn unavailable() -> TallyWalletError {
        TallyWalletError::PaymentFailed("rail not available".to_owned())
    }
}

#[async_trait(?Send)]
impl LiquidRail for DisabledRail {
    async fn balance(&self) -> Result<u64, TallyWalletError> {
        Ok(0)
    }

    async fn swap_fees(&self) -> Result<SwapFees, TallyWalletError> {
        Ok(SwapFees {
            fee_percent: 0.0,
            miner_fee: 0,
            min_swap_amount: u64::MAX,
        })
    }

    async fn pay_invoice(&self, _: &str, _: u64) -> Result<SettledPayment, TallyWalletError> {
        Err(Self::unavailable())
    }
}

#[async_trait(?Send)]
impl LightningRail for DisabledRail {
    async fn channel_balance(&self) -> Result<u64, TallyWalletError> {
        Ok(0)
    }

    async fn pay_invoice(
        &self,
        _: &Bolt11Invoice,
        _: u64,
    ) -> Result<SettledPayment, TallyWalletError> {
        Err(Self::unavailable())
    }
}

fn percent_of(amount: u64, percent: f64) -> u64 {
    (amount as f64 * percent / 100.0).round() as u64
}

pub struct PaymentRouter<E: EcashRail, Q: LiquidRail, N: LightningRail> {
    ecash: E,
    liquid: Q,
    lightning: N,
    config: RouterConfig,
}

impl<E: EcashRail, Q: LiquidRail, N: LightningRail> PaymentRouter<E, Q, N> {
    pub fn new(ecash: E, liquid: Q, lightning: N, config: RouterConfig) -> Self {
        Self {
            ecash,
            liquid,
            lightning,
            config,
        }
    }

    pub fn ecash(&self) -> &E {
        &self.ecash
    }

    pub fn lightning_fee(&self, amount: u64) -> u64 {
        percent_of(amount, self.config.lightning_fee_percent) + self.config.lightning_fee_base
    }

    pub fn liquid_fee(&self, amount: u64, fees: &SwapFees) -> u64 {
        percent_of(amount, fees.fee_percent) + fees.miner_fee + self.config.liquid_default_fee
    }

    /// Pays `invoice` for `amount` sats from the first rail that can afford it.
    pub async fn send_store_payment(
        &self,
        invoice: &str,
        amount: u64,
        description: &str,
    ) -> StorePayment {
        let lightning_fee = self.lightning_fee(amount);

        if self.config.ecash_enabled {
            match self.try_ecash(invoice, amount + lightning_fee, description).await {
                Some(payment) => return payment,
                None => info!("ecash did not pay {amount} sats, trying next rail"),
            }
        }

        match self.try_liquid(invoice, amount).await {
            Ok(Some(payment)) => return payment,
            Ok(None) => {}
            Err(err) => return StorePayment::failed(err.to_string()),
        }

        if self.config.lightning_enabled {
            match self.try_lightning(invoice, amount, lightning_fee).await {
                Ok(Some(payment)) => return payment,
                Ok(None) => {}
                Err(err) => return StorePayment::failed(err.to_string()),
            }
        }

        StorePayment::failed(NO_BALANCE_REASON)
    }

    async fn try_ecash(
        &self,
        invoice: &str,
        needed: u64,
        description: &str,
    ) -> Option<StorePayment> {
        let balance = match self.ecash.balance().await {
            Ok(balance) => balance,
            Err(err) => {
                warn!("could not read ecash balance: {err}");
                return None;
            }
        };
        if balance <= needed {
            return None;
        }
        match self.ecash.pay_invoice(invoice, description).await {
            Ok(payment) => Some(StorePayment::Paid {
                rail: Rail::Ecash,
                payment,
            }),
            Err(err) => {
                warn!("ecash payment failed: {err}");
                None
            }
        }
    }

    async fn try_liquid(
        &self,
        invoice: &str,
        amount: u64,
    ) -> Result<Option<StorePayment>, TallyWalletError> {
        let read = tokio::try_join!(self.liquid.swap_fees(), self.liquid.balance());
        let (fees, balance) = match read {
            Ok(read) => read,
            Err(err) => {
                warn!("liquid rail unavailable: {err}");
                return Ok(None);
            }
        };
        if balance <= amount + self.liquid_fee(amount, &fees) || amount <= fees.min_swap_amount {
            return Ok(None);
        }
        let payment = self.liquid.pay_invoice(invoice, amount).await?;
        Ok(Some(StorePayment::Paid {
            rail: Rail::Liquid,
            payment,
        }))
    }

    async fn try_lightning(
        &self,
        invoice: &str,
        amount: u64,
        lightning_fee: u64,
    ) -> Result<Option<StorePayment>, TallyWalletError> {
        let balance = match self.lightning.channel_balance().await {
            Ok(balance) => balance,
            Err(err) => {
                warn!("lightning rail unavailable: {err}");
                return Ok(None);
            }
        };
        if balance <= amount + lightning_fee {
            return Ok(None);
        }
        let invoice = decode_invoice(invoice)?;
        let payment = self.lightning.pay_invoice(&invoice, amount).await?;
        Ok(Some(StorePayment::Paid {
            rail: Rail::Lightning,
            payment,
        }))
    }
}
