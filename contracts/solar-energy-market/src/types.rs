/*!
 * Type Definitions for the Solar Energy Market Contract
 *
 * Records, storage keys, errors and event symbols shared by the contract
 * entry points. Energy quantities and token amounts are `i128` so that
 * `energy * price` lines up with the payment token's native amount type.
 */

use soroban_sdk::{contracterror, contracttype, symbol_short, Address, Symbol};

// ================================================================================================
// CORE DATA STRUCTURES
// ================================================================================================

/// A registered energy producer and its current listing.
///
/// Producers are never removed from storage. Deactivation only clears
/// `is_active`, so the last listing stays queryable.
///
/// # Business Logic
/// - `energy_available` grows on every listing and shrinks on every sale
/// - `total_energy_produced` only ever grows
/// - `price_per_unit` is overwritten by both listings and price updates
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Producer {
    /// Address that registered the listing and receives sale proceeds
    pub producer: Address,

    /// Energy still available for sale
    pub energy_available: i128,

    /// Price charged per unit of energy, in payment token units
    pub price_per_unit: i128,

    /// Whether this producer may currently sell
    pub is_active: bool,

    /// Cumulative energy ever listed by this producer
    pub total_energy_produced: i128,
}

/// Running totals for an address that has bought energy.
///
/// Created on first purchase, no explicit registration.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Consumer {
    pub consumer: Address,
    pub total_energy_consumed: i128,
    pub total_spent: i128,
}

/// Immutable record of one completed purchase.
///
/// `price_per_unit` and `total_cost` are frozen at purchase time; later
/// price updates by the producer never touch a stored transaction.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnergyTransaction {
    /// Seller of the energy
    pub producer: Address,

    /// Buyer of the energy
    pub consumer: Address,

    /// Units of energy transferred
    pub energy_amount: i128,

    /// Producer's price at the moment of the trade
    pub price_per_unit: i128,

    /// `energy_amount * price_per_unit`, the amount forwarded to the producer
    pub total_cost: i128,

    /// Ledger timestamp of the purchase (seconds since epoch)
    pub timestamp: u64,
}

/// Keys for per-record persistent storage entries.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataKey {
    Producer(Address),
    Consumer(Address),
    /// Transactions are stored densely at `0..transaction_count`
    Transaction(u64),
}

// ================================================================================================
// ERROR DEFINITIONS
// ================================================================================================

/// Every way a contract call can be rejected.
///
/// A returned error aborts the whole invocation and the host discards any
/// state written before it, so no failure leaves partial effects behind.
///
/// # Error Code Ranges
/// - 1-2: Setup errors
/// - 3-4: Input validation errors
/// - 5-9: Producer authorization and state consistency errors
/// - 10-11: Technical errors
///
/// Owner-only calls are guarded by `require_auth` on the stored owner, which
/// traps the invocation instead of returning an error code.
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    // ========== Setup Errors (1-2) ==========

    /// `initialize` was already called for this contract instance
    AlreadyInitialized = 1,

    /// Owner or payment token has not been configured yet
    NotInitialized = 2,

    // ========== Input Validation Errors (3-4) ==========

    /// Energy amount is zero or negative
    InvalidAmount = 3,

    /// Price per unit is zero or negative
    InvalidPrice = 4,

    // ========== Producer Authorization & State Errors (5-9) ==========

    /// Address has never registered as a producer
    ProducerNotFound = 5,

    /// Producer has been deactivated and can no longer list, sell or update
    ProducerInactive = 6,

    /// Requested energy exceeds what the producer has available
    InsufficientEnergy = 7,

    /// Payment does not cover `energy_amount * price_per_unit`
    InsufficientPayment = 8,

    /// Transaction index is at or beyond the transaction count
    TransactionNotFound = 9,

    // ========== Technical Errors (10-11) ==========

    /// Payment token transfer was rejected by the token contract
    TokenTransferFailed = 10,

    /// A quantity or cost calculation overflowed `i128`
    ArithmeticOverflow = 11,
}

// ================================================================================================
// EVENT CONSTANTS
// ================================================================================================
// Topic symbols for the events indexers consume. Topic and data field order
// is part of the external interface and must not change.

/// First listing by a new producer
/// Topics: (PRODUCER_REGISTERED, producer), Data: ()
pub const PRODUCER_REGISTERED: Symbol = symbol_short!("prod_reg");

/// Every listing, new or top-up
/// Topics: (ENERGY_LISTED, producer), Data: (energy_amount, price_per_unit)
pub const ENERGY_LISTED: Symbol = symbol_short!("nrg_list");

/// Completed purchase
/// Topics: (ENERGY_PURCHASED, consumer, producer), Data: (energy_amount, total_cost)
pub const ENERGY_PURCHASED: Symbol = symbol_short!("nrg_buy");

/// Producer changed its price
/// Topics: (PRICE_UPDATED, producer), Data: new_price_per_unit
pub const PRICE_UPDATED: Symbol = symbol_short!("price_upd");

/// Topics: (OWNERSHIP_TRANSFERRED, contract), Data: new_owner
pub const OWNERSHIP_TRANSFERRED: Symbol = symbol_short!("own_xfer");

/// Topics: (EMERGENCY_WITHDRAWAL, owner), Data: amount
pub const EMERGENCY_WITHDRAWAL: Symbol = symbol_short!("emrg_wdr");
