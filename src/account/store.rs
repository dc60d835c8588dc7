//! Account storage contract and the in-memory reference implementation

use super::types::{Account, MintReservation, ScratchVoucher};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("account not found")]
    AccountNotFound,
    #[error("email already registered")]
    EmailTaken,
    #[error("write conflict")]
    VersionConflict,
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Email equality policy for the uniqueness index and login lookup.
/// The wire format always preserves the email as entered; only the
/// index key is normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailPolicy {
    Exact,
    CaseInsensitive,
}

impl EmailPolicy {
    pub fn key(&self, email: &str) -> String {
        match self {
            Self::Exact => email.to_string(),
            Self::CaseInsensitive => email.to_ascii_lowercase(),
        }
    }
}

/// Storage contract for the ledger. Implementations must make
/// `compare_and_swap` atomic with respect to concurrent writers and
/// `take_voucher` a single atomic remove.
pub trait AccountStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<Account>, StoreError>;
    fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Insert a new account, claiming its email in the uniqueness index.
    fn insert(&self, account: Account) -> Result<(), StoreError>;

    /// Commit `account` only if the stored version still equals
    /// `expected`. Callers pass `account.version == expected + 1`.
    fn compare_and_swap(&self, expected: u64, account: Account) -> Result<(), StoreError>;

    fn put_voucher(&self, voucher: ScratchVoucher) -> Result<(), StoreError>;
    /// Remove and return the voucher in one step. `None` means it never
    /// existed or was already consumed.
    fn take_voucher(&self, id: &str) -> Result<Option<ScratchVoucher>, StoreError>;

    fn put_reservation(&self, reservation: MintReservation) -> Result<(), StoreError>;
    fn delete_reservation(&self, id: &str) -> Result<(), StoreError>;
    fn list_reservations(&self) -> Result<Vec<MintReservation>, StoreError>;
}

/// Read-modify-CAS loop. Serializes per-account mutations: a conflicting
/// writer forces a re-read, so no interleaved read-modify-write is ever
/// committed. The closure sees fresh state on every retry and may veto
/// the update with its own error.
pub fn update<E, F>(store: &dyn AccountStore, id: &str, mut mutate: F) -> Result<Account, E>
where
    E: From<StoreError>,
    F: FnMut(&mut Account) -> Result<(), E>,
{
    loop {
        let mut account = store.get(id)?.ok_or(StoreError::AccountNotFound)?;
        let expected = account.version;
        mutate(&mut account)?;
        account.version = expected + 1;
        match store.compare_and_swap(expected, account.clone()) {
            Ok(()) => return Ok(account),
            Err(StoreError::VersionConflict) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

#[derive(Default)]
struct MemoryInner {
    accounts: HashMap<String, Account>,
    email_idx: HashMap<String, String>,
    vouchers: HashMap<String, ScratchVoucher>,
    reservations: HashMap<String, MintReservation>,
}

/// In-process store. Backs the test suite and small deployments.
pub struct MemoryStore {
    policy: EmailPolicy,
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_policy(EmailPolicy::Exact)
    }

    pub fn with_policy(policy: EmailPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Backend(format!("mutex poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.lock()?.accounts.get(id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let inner = self.lock()?;
        let id = match inner.email_idx.get(&self.policy.key(email)) {
            Some(id) => id,
            None => return Ok(None),
        };
        Ok(inner.accounts.get(id).cloned())
    }

    fn insert(&self, account: Account) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = self.policy.key(&account.email);
        if inner.email_idx.contains_key(&key) {
            return Err(StoreError::EmailTaken);
        }
        inner.email_idx.insert(key, account.id.clone());
        inner.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    fn compare_and_swap(&self, expected: u64, account: Account) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        match inner.accounts.get(&account.id) {
            None => Err(StoreError::AccountNotFound),
            Some(current) if current.version != expected => Err(StoreError::VersionConflict),
            Some(_) => {
                inner.accounts.insert(account.id.clone(), account);
                Ok(())
            }
        }
    }

    fn put_voucher(&self, voucher: ScratchVoucher) -> Result<(), StoreError> {
        self.lock()?.vouchers.insert(voucher.id.clone(), voucher);
        Ok(())
    }

    fn take_voucher(&self, id: &str) -> Result<Option<ScratchVoucher>, StoreError> {
        Ok(self.lock()?.vouchers.remove(id))
    }

    fn put_reservation(&self, reservation: MintReservation) -> Result<(), StoreError> {
        self.lock()?
            .reservations
            .insert(reservation.id.clone(), reservation);
        Ok(())
    }

    fn delete_reservation(&self, id: &str) -> Result<(), StoreError> {
        self.lock()?.reservations.remove(id);
        Ok(())
    }

    fn list_reservations(&self) -> Result<Vec<MintReservation>, StoreError> {
        Ok(self.lock()?.reservations.values().cloned().collect())
    }
}
