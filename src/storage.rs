//! Sled-backed account store

use crate::account::store::{AccountStore, EmailPolicy, StoreError};
use crate::account::types::{Account, MintReservation, ScratchVoucher};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Tree;
use std::fmt::Display;
use std::path::Path;

fn backend<E: Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(value).map_err(backend)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bytes).map_err(backend)
}

pub struct SledStore {
    policy: EmailPolicy,
    accounts: Tree,
    email_idx: Tree,
    vouchers: Tree,
    reservations: Tree,
    _db: sled::Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P, policy: EmailPolicy) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(backend)?;
        Ok(Self {
            policy,
            accounts: db.open_tree("accounts").map_err(backend)?,
            email_idx: db.open_tree("email_idx").map_err(backend)?,
            vouchers: db.open_tree("vouchers").map_err(backend)?,
            reservations: db.open_tree("reservations").map_err(backend)?,
            _db: db,
        })
    }
}

impl AccountStore for SledStore {
    fn get(&self, id: &str) -> Result<Option<Account>, StoreError> {
        match self.accounts.get(id.as_bytes()).map_err(backend)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let key = self.policy.key(email);
        match self.email_idx.get(key.as_bytes()).map_err(backend)? {
            Some(id_bytes) => {
                let id = String::from_utf8(id_bytes.to_vec()).map_err(backend)?;
                self.get(&id)
            }
            None => Ok(None),
        }
    }

    fn insert(&self, account: Account) -> Result<(), StoreError> {
        let email_key = self.policy.key(&account.email);
        // Claim the email atomically before writing the record
        let claim = self
            .email_idx
            .compare_and_swap(
                email_key.as_bytes(),
                None::<&[u8]>,
                Some(account.id.as_bytes()),
            )
            .map_err(backend)?;
        if claim.is_err() {
            return Err(StoreError::EmailTaken);
        }

        self.accounts
            .insert(account.id.as_bytes(), encode(&account)?)
            .map_err(backend)?;
        Ok(())
    }

    fn compare_and_swap(&self, expected: u64, account: Account) -> Result<(), StoreError> {
        let key = account.id.as_bytes().to_vec();
        let current = self
            .accounts
            .get(&key)
            .map_err(backend)?
            .ok_or(StoreError::AccountNotFound)?;

        let stored: Account = decode(&current)?;
        if stored.version != expected {
            return Err(StoreError::VersionConflict);
        }

        let swapped = self
            .accounts
            .compare_and_swap(&key, Some(current), Some(encode(&account)?))
            .map_err(backend)?;
        match swapped {
            Ok(()) => Ok(()),
            Err(_) => Err(StoreError::VersionConflict),
        }
    }

    fn put_voucher(&self, voucher: ScratchVoucher) -> Result<(), StoreError> {
        self.vouchers
            .insert(voucher.id.as_bytes(), encode(&voucher)?)
            .map_err(backend)?;
        Ok(())
    }

    fn take_voucher(&self, id: &str) -> Result<Option<ScratchVoucher>, StoreError> {
        match self.vouchers.remove(id.as_bytes()).map_err(backend)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_reservation(&self, reservation: MintReservation) -> Result<(), StoreError> {
        self.reservations
            .insert(reservation.id.as_bytes(), encode(&reservation)?)
            .map_err(backend)?;
        // Reservations are the crash-recovery record; make them durable now
        self.reservations.flush().map_err(backend)?;
        Ok(())
    }

    fn delete_reservation(&self, id: &str) -> Result<(), StoreError> {
        self.reservations.remove(id.as_bytes()).map_err(backend)?;
        Ok(())
    }

    fn list_reservations(&self) -> Result<Vec<MintReservation>, StoreError> {
        let mut out = Vec::new();
        for entry in self.reservations.iter() {
            let (_, bytes) = entry.map_err(backend)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }
}
