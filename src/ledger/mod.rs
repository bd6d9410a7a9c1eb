//! Token ledger state machine.
//!
//! All state lives in the injected [`StateStore`]: balances under
//! `0x01 ++ address`, allowances under `0x02 ++ owner ++ spender`, and the
//! total supply under one fixed key. Mutations require a witness from the
//! host [`WitnessOracle`] and announce themselves through the [`EventSink`].
//! From initialization on, the sum of all balances equals the total supply;
//! transfers move value but never create or destroy it.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::StateStore;

pub type Amount = u64;

/// Length in bytes of a ledger address.
pub const ADDRESS_LEN: usize = 20;

pub const NAME: &str = "OEP4 Token";
pub const SYMBOL: &str = "OEP4";
pub const DECIMALS: u32 = 8;

pub const TOTAL_AMOUNT: Amount = 100_000_000; // whole tokens
pub const DECIMAL_MULTIPLIER: Amount = 100_000_000; // 10^DECIMALS minimal units per token

/// Address credited with the entire supply by `init`.
pub const OWNER: Address = Address([
    0x61, 0x6f, 0x2a, 0x4a, 0x38, 0x39, 0x6f, 0xf2, 0x03, 0xea, 0x01, 0xe6, 0xc0, 0x70, 0xae,
    0x42, 0x1b, 0xb8, 0xce, 0x2d,
]);

const BALANCE_PREFIX: u8 = 0x01;
const APPROVE_PREFIX: u8 = 0x02;
const SUPPLY_KEY: &[u8] = b"TotalSupply";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("address has invalid length {len}")]
    InvalidAddress { len: usize },
    #[error("address {address} is not a witness")]
    Unauthorized { address: Address },
    #[error("amount {amount} is negative")]
    InvalidAmount { amount: i64 },
    #[error("balance of {address} is {balance}, needed {needed}")]
    InsufficientBalance {
        address: Address,
        balance: Amount,
        needed: Amount,
    },
    #[error("allowance from {owner} to {spender} is {allowance}, needed {needed}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: Amount,
        needed: Amount,
    },
    #[error("supply already initialized to {total_supply}")]
    AlreadyInitialized { total_supply: Amount },
    #[error("malformed arguments for {operation}: {reason}")]
    MalformedArguments { operation: String, reason: String },
}

/// Opaque 20-byte participant identifier.
///
/// Construction validates the length, so a held `Address` is always valid
/// and operations never re-check it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TokenError> {
        let raw: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| TokenError::InvalidAddress { len: bytes.len() })?;
        Ok(Address(raw))
    }

    pub fn from_hex(encoded: &str) -> Result<Self, TokenError> {
        let bytes = hex::decode(encoded).map_err(|_| TokenError::InvalidAddress {
            len: encoded.len(),
        })?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Address::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Host-verified proof that the current call acts on behalf of an address.
pub trait WitnessOracle {
    fn is_witness(&self, address: Address) -> bool;
}

/// The set of addresses the current call carries authorization for.
#[derive(Clone, Debug, Default)]
pub struct WitnessSet {
    addresses: BTreeSet<Address>,
}

impl WitnessSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, address: Address) {
        self.addresses.insert(address);
    }
}

impl WitnessOracle for WitnessSet {
    fn is_witness(&self, address: Address) -> bool {
        self.addresses.contains(&address)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenEvent {
    Transfer {
        // absent only for the genesis mint
        from: Option<Address>,
        to: Address,
        amount: Amount,
    },
    Approval {
        owner: Address,
        spender: Address,
        amount: Amount,
    },
}

/// Delivery side of event emission; the ledger only constructs records.
pub trait EventSink {
    fn emit(&mut self, event: TokenEvent);
}

/// Collects emitted events in order, for tests and the CLI host.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<TokenEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: TokenEvent) {
        self.events.push(event);
    }
}

/// One independent leg of a `transfer_multi` batch.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
}

/// The ledger core, parameterized over its three host-supplied ports.
///
/// Every operation runs to completion inside one host transaction; a
/// returned error means the host must discard all writes made by the call.
pub struct TokenLedger<S, W, E> {
    store: S,
    witness: W,
    events: E,
}

impl<S, W, E> TokenLedger<S, W, E>
where
    S: StateStore,
    W: WitnessOracle,
    E: EventSink,
{
    pub fn new(store: S, witness: W, events: E) -> Self {
        Self {
            store,
            witness,
            events,
        }
    }

    /// Hands the ports back to the host, typically to commit the store and
    /// deliver recorded events after a successful call.
    pub fn into_parts(self) -> (S, W, E) {
        (self.store, self.witness, self.events)
    }

    pub fn name(&self) -> &'static str {
        NAME
    }

    pub fn symbol(&self) -> &'static str {
        SYMBOL
    }

    pub fn decimals(&self) -> u32 {
        DECIMALS
    }

    /// Zero until `init` has run.
    pub fn total_supply(&self) -> Amount {
        self.store.get(SUPPLY_KEY)
    }

    pub fn balance_of(&self, address: Address) -> Amount {
        self.store.get(&balance_key(address))
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.store.get(&approval_key(owner, spender))
    }

    /// Moves `amount` from `from` to `to`. Requires a witness for `from`.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.require_witness(from)?;
        self.debit_balance(from, amount)?;
        // credit re-reads after the debit, so from == to nets to a no-op
        self.credit_balance(to, amount);
        debug!(%from, %to, amount, "transfer applied");
        self.events.emit(TokenEvent::Transfer {
            from: Some(from),
            to,
            amount,
        });
        Ok(())
    }

    /// Applies each leg in order; the first failure aborts the call.
    ///
    /// No rollback happens here. The host must run the whole batch inside
    /// one all-or-nothing transaction and discard writes on error.
    pub fn transfer_multi(&mut self, transfers: &[Transfer]) -> Result<(), TokenError> {
        for transfer in transfers {
            self.transfer(transfer.from, transfer.to, transfer.amount)?;
        }
        Ok(())
    }

    /// Sets (not adds to) the allowance from `owner` to `spender`.
    ///
    /// The amount is capped by the owner's balance at approval time only;
    /// a later balance decrease does not shrink an existing allowance.
    pub fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.require_witness(owner)?;
        let balance = self.balance_of(owner);
        if amount > balance {
            warn!(%owner, amount, balance, "approval above balance rejected");
            return Err(TokenError::InsufficientBalance {
                address: owner,
                balance,
                needed: amount,
            });
        }
        let key = approval_key(owner, spender);
        if amount == 0 {
            self.store.delete(&key);
        } else {
            self.store.put(&key, amount);
        }
        debug!(%owner, %spender, amount, "approval set");
        self.events.emit(TokenEvent::Approval {
            owner,
            spender,
            amount,
        });
        Ok(())
    }

    /// Delegated transfer: `spender` moves `amount` of `from`'s balance to
    /// `to`, consuming that much of the allowance `from` granted.
    ///
    /// Emits only a transfer record; the allowance decrease is silent.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.require_witness(spender)?;
        let balance = self.balance_of(from);
        if amount > balance {
            warn!(%from, amount, balance, "delegated transfer above balance rejected");
            return Err(TokenError::InsufficientBalance {
                address: from,
                balance,
                needed: amount,
            });
        }
        let allowance = self.allowance(from, spender);
        if amount > allowance {
            warn!(%from, %spender, amount, allowance, "delegated transfer above allowance rejected");
            return Err(TokenError::InsufficientAllowance {
                owner: from,
                spender,
                allowance,
                needed: amount,
            });
        }
        let key = approval_key(from, spender);
        if amount == allowance {
            self.store.delete(&key);
        } else {
            self.store.put(&key, allowance - amount);
        }
        self.debit_balance(from, amount)?;
        self.credit_balance(to, amount);
        debug!(%spender, %from, %to, amount, "delegated transfer applied");
        self.events.emit(TokenEvent::Transfer {
            from: Some(from),
            to,
            amount,
        });
        Ok(())
    }

    /// One-shot bootstrap: mints the fixed supply to the owner.
    ///
    /// Rejected once the supply exists, so the ledger moves from
    /// uninitialized to active exactly once.
    pub fn init(&mut self) -> Result<(), TokenError> {
        self.require_witness(OWNER)?;
        let total_supply = self.total_supply();
        if total_supply != 0 {
            warn!(total_supply, "init rejected, supply already exists");
            return Err(TokenError::AlreadyInitialized { total_supply });
        }
        let total = TOTAL_AMOUNT * DECIMAL_MULTIPLIER;
        self.store.put(SUPPLY_KEY, total);
        self.store.put(&balance_key(OWNER), total);
        debug!(owner = %OWNER, total, "ledger initialized");
        self.events.emit(TokenEvent::Transfer {
            from: None,
            to: OWNER,
            amount: total,
        });
        Ok(())
    }

    fn require_witness(&self, address: Address) -> Result<(), TokenError> {
        if self.witness.is_witness(address) {
            Ok(())
        } else {
            warn!(%address, "missing witness");
            Err(TokenError::Unauthorized { address })
        }
    }

    fn debit_balance(&mut self, address: Address, amount: Amount) -> Result<(), TokenError> {
        let key = balance_key(address);
        let balance = self.store.get(&key);
        if balance < amount {
            warn!(%address, balance, amount, "debit above balance rejected");
            return Err(TokenError::InsufficientBalance {
                address,
                balance,
                needed: amount,
            });
        }
        if balance == amount {
            self.store.delete(&key);
        } else {
            self.store.put(&key, balance - amount);
        }
        Ok(())
    }

    fn credit_balance(&mut self, address: Address, amount: Amount) {
        let key = balance_key(address);
        let updated = self.store.get(&key) + amount;
        if updated != 0 {
            self.store.put(&key, updated);
        }
    }
}

fn balance_key(address: Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ADDRESS_LEN);
    key.push(BALANCE_PREFIX);
    key.extend_from_slice(address.as_bytes());
    key
}

fn approval_key(owner: Address, spender: Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 2 * ADDRESS_LEN);
    key.push(APPROVE_PREFIX);
    key.extend_from_slice(owner.as_bytes());
    key.extend_from_slice(spender.as_bytes());
    key
}
