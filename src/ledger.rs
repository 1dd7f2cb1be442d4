//! Asset Ledger (C1): per-(user, asset) available/frozen balances with
//! atomic freeze, unfreeze, and two-leg settlement.
//!
//! Each `(UserId, AssetId)` pair owns its own `tokio::sync::Mutex<Balance>`,
//! looked up through a lock-free `DashMap` handle table. `settle` touches four
//! balance legs across two users; to avoid deadlock, locks are always acquired
//! in ascending `(user_id, asset_id)` order regardless of which leg is buyer
//! or seller.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::balance::Balance;
use crate::config::AssetId;
use crate::errors::LedgerError;

pub type UserId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountKey {
    pub user_id: UserId,
    pub asset_id: AssetId,
}

impl AccountKey {
    pub fn new(user_id: UserId, asset_id: AssetId) -> Self {
        Self { user_id, asset_id }
    }
}

/// The asset ledger: one lock-protected `Balance` per account, addressable
/// without taking a global lock.
#[derive(Debug, Default)]
pub struct AssetLedger {
    accounts: DashMap<AccountKey, Arc<Mutex<Balance>>>,
}

impl AssetLedger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    fn handle(&self, key: AccountKey) -> Arc<Mutex<Balance>> {
        self.accounts
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(Balance::default())))
            .clone()
    }

    /// Credit external funds (deposit). Creates the account on first use.
    pub async fn deposit(&self, user_id: UserId, asset_id: AssetId, amount: u64) -> Result<(), LedgerError> {
        let handle = self.handle(AccountKey::new(user_id, asset_id));
        let mut balance = handle.lock().await;
        balance.deposit(amount).map_err(|_| LedgerError::Overflow)
    }

    /// Freeze `amount` of available balance ahead of order placement.
    pub async fn freeze(&self, user_id: UserId, asset_id: AssetId, amount: u64) -> Result<(), LedgerError> {
        let handle = self.handle(AccountKey::new(user_id, asset_id));
        let mut balance = handle.lock().await;
        balance.lock(amount).map_err(|_| LedgerError::InsufficientFunds {
            need: amount,
            have: balance.avail(),
        })
    }

    /// Release a previously frozen amount back to available (cancel / reject residual).
    pub async fn unfreeze(&self, user_id: UserId, asset_id: AssetId, amount: u64) -> Result<(), LedgerError> {
        let handle = self.handle(AccountKey::new(user_id, asset_id));
        let mut balance = handle.lock().await;
        balance
            .unlock(amount)
            .map_err(|_| LedgerError::InsufficientFrozen {
                need: amount,
                have: balance.frozen(),
            })
    }

    /// Settle a trade: debit the payer's frozen leg, credit the receiver's available leg.
    ///
    /// Call once per settlement leg (buyer pays quote/receives base, seller pays
    /// base/receives quote) with locks acquired in account-key order so that
    /// settling the two legs of one trade concurrently with another trade sharing
    /// a counterparty can never deadlock.
    pub async fn settle(
        &self,
        payer: AccountKey,
        payer_amount: u64,
        receiver: AccountKey,
        receiver_amount: u64,
    ) -> Result<(), LedgerError> {
        let payer_handle = self.handle(payer);
        let receiver_handle = self.handle(receiver);

        if payer == receiver {
            let mut bal = payer_handle.lock().await;
            bal.spend_frozen(payer_amount)
                .map_err(|_| LedgerError::InsufficientFrozen {
                    need: payer_amount,
                    have: bal.frozen(),
                })?;
            bal.deposit(receiver_amount).map_err(|_| LedgerError::Overflow)?;
            return Ok(());
        }

        // Acquire in ascending key order to establish a total lock order across trades.
        let (first_key, first, second_key, second) = if payer < receiver {
            (payer, payer_handle, receiver, receiver_handle)
        } else {
            (receiver, receiver_handle, payer, payer_handle)
        };

        let mut first_guard = first.lock().await;
        let mut second_guard = second.lock().await;

        let (mut payer_guard, mut receiver_guard): (MutexGuard<Balance>, MutexGuard<Balance>) =
            if first_key == payer {
                (first_guard, second_guard)
            } else {
                std::mem::swap(&mut first_guard, &mut second_guard);
                (first_guard, second_guard)
            };

        payer_guard
            .spend_frozen(payer_amount)
            .map_err(|_| LedgerError::InsufficientFrozen {
                need: payer_amount,
                have: payer_guard.frozen(),
            })?;
        receiver_guard
            .deposit(receiver_amount)
            .map_err(|_| LedgerError::Overflow)?;

        let _ = second_key;
        Ok(())
    }

    /// Snapshot available/frozen for an account (0/0 if it has never been touched).
    pub async fn snapshot(&self, user_id: UserId, asset_id: AssetId) -> (u64, u64) {
        let handle = self.handle(AccountKey::new(user_id, asset_id));
        let balance = handle.lock().await;
        (balance.avail(), balance.frozen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deposit_then_freeze_then_unfreeze() {
        let ledger = AssetLedger::new();
        ledger.deposit(1, 2, 1000).await.unwrap();
        ledger.freeze(1, 2, 400).await.unwrap();
        assert_eq!(ledger.snapshot(1, 2).await, (600, 400));
        ledger.unfreeze(1, 2, 400).await.unwrap();
        assert_eq!(ledger.snapshot(1, 2).await, (1000, 0));
    }

    #[tokio::test]
    async fn freeze_rejects_insufficient_funds() {
        let ledger = AssetLedger::new();
        ledger.deposit(1, 2, 100).await.unwrap();
        let err = ledger.freeze(1, 2, 500).await.unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
    }

    #[tokio::test]
    async fn settle_moves_funds_between_two_users() {
        let ledger = AssetLedger::new();
        // buyer locks quote, seller locks base
        ledger.deposit(1, 2 /* quote */, 1_000_000).await.unwrap();
        ledger.deposit(2, 1 /* base */, 500_000).await.unwrap();
        ledger.freeze(1, 2, 300_000).await.unwrap();
        ledger.freeze(2, 1, 200_000).await.unwrap();

        // buyer pays quote, receives base
        ledger
            .settle(
                AccountKey::new(1, 2),
                300_000,
                AccountKey::new(1, 1),
                200_000,
            )
            .await
            .unwrap();
        // seller pays base, receives quote
        ledger
            .settle(
                AccountKey::new(2, 1),
                200_000,
                AccountKey::new(2, 2),
                300_000,
            )
            .await
            .unwrap();

        assert_eq!(ledger.snapshot(1, 2).await, (700_000, 0));
        assert_eq!(ledger.snapshot(1, 1).await, (200_000, 0));
        assert_eq!(ledger.snapshot(2, 1).await, (0, 0));
        assert_eq!(ledger.snapshot(2, 2).await, (300_000, 0));
    }

    #[tokio::test]
    async fn settle_within_same_account_is_a_no_deadlock_fast_path() {
        let ledger = AssetLedger::new();
        ledger.deposit(1, 1, 1000).await.unwrap();
        ledger.freeze(1, 1, 500).await.unwrap();
        ledger
            .settle(AccountKey::new(1, 1), 500, AccountKey::new(1, 1), 500)
            .await
            .unwrap();
        assert_eq!(ledger.snapshot(1, 1).await, (1000, 0));
    }
}
