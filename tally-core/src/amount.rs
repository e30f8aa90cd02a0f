//! This module defines the `Amount` and `SplitAmount` structs, which are used for representing and splitting amounts in Cashu.
//!
//! A mint only signs powers of two, so every amount the wallet wants to hold is first split into its binary components.
//! `blank_outputs_for_fee` computes how many blank outputs a melt needs so the mint can return overpaid lightning fees ([Nut-08](https://github.com/cashubtc/nuts/blob/main/08.md)).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount(pub u64);

impl Amount {
    pub fn split(&self) -> SplitAmount {
        split_amount(self.0).into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAmount(Vec<u64>);

impl From<Vec<u64>> for SplitAmount {
    fn from(from: Vec<u64>) -> Self {
        Self(from)
    }
}

impl SplitAmount {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn amounts(&self) -> &[u64] {
        &self.0
    }
}

impl From<u64> for Amount {
    fn from(amount: u64) -> Self {
        Self(amount)
    }
}

impl IntoIterator for SplitAmount {
    type Item = u64;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// split a decimal amount into a vector of powers of 2
pub fn split_amount(amount: u64) -> Vec<u64> {
    (0..u64::BITS)
        .filter(|bit| amount & (1 << bit) != 0)
        .map(|bit| 1 << bit)
        .collect()
}

/// Number of blank outputs needed to receive the change of a melt with the given fee reserve.
pub fn blank_outputs_for_fee(fee_reserve: u64) -> usize {
    if fee_reserve == 0 {
        return 0;
    }
    let bits = u64::BITS - (fee_reserve - 1).leading_zeros();
    bits.max(1) as usize
}

#[cfg(test)]
mod tests {
    use crate::amount::{blank_outputs_for_fee, Amount};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_amount() -> anyhow::Result<()> {
        let bits = super::split_amount(13);
        assert_eq!(bits, vec![1, 4, 8]);

        let bits = super::split_amount(63);
        assert_eq!(bits, vec![1, 2, 4, 8, 16, 32]);

        let bits = super::split_amount(64);
        assert_eq!(bits, vec![64]);

        assert!(super::split_amount(0).is_empty());
        Ok(())
    }

    #[test]
    fn test_split_len() {
        assert_eq!(Amount(1050).split().len(), 4);
    }

    #[test]
    fn test_blank_outputs_for_fee() {
        assert_eq!(0, blank_outputs_for_fee(0));
        assert_eq!(1, blank_outputs_for_fee(1));
        assert_eq!(1, blank_outputs_for_fee(2));
        assert_eq!(2, blank_outputs_for_fee(3));
        assert_eq!(10, blank_outputs_for_fee(1000));
        assert_eq!(10, blank_outputs_for_fee(1024));
        assert_eq!(11, blank_outputs_for_fee(1025));
    }
}
