/*!
 * Solar Energy Market Smart Contract
 *
 * Peer-to-peer trading of surplus solar energy. Producers list energy at a
 * price per unit, consumers buy from a chosen producer and pay in a
 * configured token, and every purchase is recorded as an immutable
 * transaction.
 *
 * Key features:
 * - Producer listings with additive top-ups and price overwrite
 * - Direct settlement: payment forwarded to the producer, excess refunded
 * - Dense, append-only transaction log and producer registry
 * - Owner recovery hatch for unexpected residual token balance
 * - Events for off-chain indexers
 *
 * Business Logic:
 * 1. Producers call `register_or_update_listing` to list energy
 * 2. Consumers call `purchase_energy` attaching a token payment
 * 3. The contract forwards the cost to the producer and refunds the rest
 * 4. Producers may change price or permanently deactivate their listing
 */

#![no_std]

mod types;


use soroban_sdk::{
    contract, contractimpl, log, symbol_short, token, Address, Env, IntoVal, Symbol, Val, Vec,
};

pub use types::{
    Consumer, DataKey, EnergyTransaction, Error, Producer, EMERGENCY_WITHDRAWAL, ENERGY_LISTED,
    ENERGY_PURCHASED, OWNERSHIP_TRANSFERRED, PRICE_UPDATED, PRODUCER_REGISTERED,
};

#[contract]
pub struct SolarEnergyMarket;

// Instance storage keys. Per-record entries live in persistent storage under `DataKey`.
const OWNER_KEY: Symbol = symbol_short!("OWNER");                 // Deploying owner address
const PAYMENT_TOKEN_KEY: Symbol = symbol_short!("PAY_TKN");       // Settlement token contract address
const PRODUCERS_KEY: Symbol = symbol_short!("PRODUCERS");         // Vec<Address> registry, registration order
const TX_COUNT_KEY: Symbol = symbol_short!("TX_COUNT");           // Number of recorded transactions
const ENERGY_TRADED_KEY: Symbol = symbol_short!("NRG_TRDED");     // Cumulative energy sold across all producers

// Storage lifetimes, in ledgers (~5s each). Entries are bumped back to the full
// amount whenever a write finds them below the threshold.
const DAY_IN_LEDGERS: u32 = 17_280;
const INSTANCE_BUMP_AMOUNT: u32 = 7 * DAY_IN_LEDGERS;
const INSTANCE_LIFETIME_THRESHOLD: u32 = INSTANCE_BUMP_AMOUNT - DAY_IN_LEDGERS;
const PERSISTENT_BUMP_AMOUNT: u32 = 30 * DAY_IN_LEDGERS;
const PERSISTENT_LIFETIME_THRESHOLD: u32 = PERSISTENT_BUMP_AMOUNT - DAY_IN_LEDGERS;

/// Writes a persistent record and keeps it from being archived.
fn save_record<V: IntoVal<Env, Val>>(env: &Env, key: &DataKey, record: &V) {
    env.storage().persistent().set(key, record);
    env.storage()
        .persistent()
        .extend_ttl(key, PERSISTENT_LIFETIME_THRESHOLD, PERSISTENT_BUMP_AMOUNT);
}

#[contractimpl]
impl SolarEnergyMarket {
    /// Sets the owner and the token used to settle purchases.
    /// Can only be called once per contract instance.
    ///
    /// # Arguments
    /// * `owner` - Address allowed to run `emergency_withdraw` and transfer ownership
    /// * `payment_token` - SEP-41 token contract consumers pay with
    ///
    /// # Errors
    /// - AlreadyInitialized: If the contract already has an owner
    pub fn initialize(env: Env, owner: Address, payment_token: Address) -> Result<(), Error> {
        if env.storage().instance().has(&OWNER_KEY) {
            return Err(Error::AlreadyInitialized);
        }

        owner.require_auth();

        env.storage().instance().set(&OWNER_KEY, &owner);
        env.storage().instance().set(&PAYMENT_TOKEN_KEY, &payment_token);
        env.storage().instance().set(&TX_COUNT_KEY, &0u64);
        env.storage().instance().set(&ENERGY_TRADED_KEY, &0i128);
        env.storage().instance().set(&PRODUCERS_KEY, &Vec::<Address>::new(&env));
        Self::_extend_instance(&env);

        Ok(())
    }

    fn _require_owner(env: &Env) -> Result<Address, Error> {
        let owner: Address = env
            .storage()
            .instance()
            .get(&OWNER_KEY)
            .ok_or(Error::NotInitialized)?;
        owner.require_auth();
        Ok(owner)
    }

    fn _payment_token(env: &Env) -> Result<token::Client<'_>, Error> {
        let token_id: Address = env
            .storage()
            .instance()
            .get(&PAYMENT_TOKEN_KEY)
            .ok_or(Error::NotInitialized)?;
        Ok(token::Client::new(env, &token_id))
    }

    fn _transfer(
        env: &Env,
        token_client: &token::Client,
        from: &Address,
        to: &Address,
        amount: i128,
    ) -> Result<(), Error> {
        match token_client.try_transfer(from, to, &amount) {
            Ok(Ok(())) => Ok(()),
            _ => {
                log!(env, "Token transfer of {} failed", amount);
                Err(Error::TokenTransferFailed)
            }
        }
    }

    fn _load_producer(env: &Env, producer: &Address) -> Option<Producer> {
        env.storage()
            .persistent()
            .get(&DataKey::Producer(producer.clone()))
    }

    fn _save_producer(env: &Env, record: &Producer) {
        save_record(env, &DataKey::Producer(record.producer.clone()), record);
    }

    fn _extend_instance(env: &Env) {
        env.storage()
            .instance()
            .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
    }

    /// Loads the caller's producer record and rejects unknown or deactivated producers.
    fn _require_active_producer(env: &Env, producer: &Address) -> Result<Producer, Error> {
        let record = Self::_load_producer(env, producer).ok_or(Error::ProducerNotFound)?;
        if !record.is_active {
            return Err(Error::ProducerInactive);
        }
        Ok(record)
    }

    // ================================================================================================
    // PRODUCER OPERATIONS
    // ================================================================================================

    /// Lists energy for sale, registering the producer on first call.
    ///
    /// # Business Flow
    /// 1. First call: creates the producer record and appends it to the registry
    /// 2. Later calls: add `energy_amount` to both available and produced totals
    ///    and overwrite the price with `price_per_unit`
    ///
    /// Quantity is additive while price is replaced; the two are deliberately
    /// bundled in one call and a top-up always resets the price.
    ///
    /// # Arguments
    /// * `producer` - The listing address (must sign transaction)
    /// * `energy_amount` - Energy to add to the listing
    /// * `price_per_unit` - New price per unit of energy
    ///
    /// # Errors
    /// - InvalidAmount: If `energy_amount` is not positive
    /// - InvalidPrice: If `price_per_unit` is not positive
    /// - ProducerInactive: If the producer was deactivated
    /// - ArithmeticOverflow: If the new totals do not fit in `i128`
    pub fn register_or_update_listing(
        env: Env,
        producer: Address,
        energy_amount: i128,
        price_per_unit: i128,
    ) -> Result<(), Error> {
        producer.require_auth();

        if energy_amount <= 0 {
            return Err(Error::InvalidAmount);
        }
        if price_per_unit <= 0 {
            return Err(Error::InvalidPrice);
        }

        let record = match Self::_load_producer(&env, &producer) {
            None => {
                let mut producers: Vec<Address> = env
                    .storage()
                    .instance()
                    .get(&PRODUCERS_KEY)
                    .unwrap_or(Vec::new(&env));
                producers.push_back(producer.clone());
                env.storage().instance().set(&PRODUCERS_KEY, &producers);

                env.events()
                    .publish((PRODUCER_REGISTERED, producer.clone()), ());

                Producer {
                    producer: producer.clone(),
                    energy_available: energy_amount,
                    price_per_unit,
                    is_active: true,
                    total_energy_produced: energy_amount,
                }
            }
            Some(existing) if !existing.is_active => {
                log!(&env, "Deactivated producer cannot relist");
                return Err(Error::ProducerInactive);
            }
            Some(mut existing) => {
                existing.energy_available = existing
                    .energy_available
                    .checked_add(energy_amount)
                    .ok_or(Error::ArithmeticOverflow)?;
                existing.total_energy_produced = existing
                    .total_energy_produced
                    .checked_add(energy_amount)
                    .ok_or(Error::ArithmeticOverflow)?;
                existing.price_per_unit = price_per_unit;
                existing
            }
        };

        Self::_save_producer(&env, &record);
        Self::_extend_instance(&env);

        env.events().publish(
            (ENERGY_LISTED, producer),
            (energy_amount, price_per_unit),
        );

        Ok(())
    }

    /// Changes the caller's price per unit. Existing transactions keep the
    /// price they were recorded with.
    ///
    /// # Errors
    /// - InvalidPrice: If `new_price_per_unit` is not positive
    /// - ProducerNotFound / ProducerInactive: If caller is not an active producer
    pub fn update_price(env: Env, producer: Address, new_price_per_unit: i128) -> Result<(), Error> {
        producer.require_auth();

        let mut record = Self::_require_active_producer(&env, &producer)?;
        if new_price_per_unit <= 0 {
            return Err(Error::InvalidPrice);
        }

        record.price_per_unit = new_price_per_unit;
        Self::_save_producer(&env, &record);
        Self::_extend_instance(&env);

        env.events()
            .publish((PRICE_UPDATED, producer), new_price_per_unit);

        Ok(())
    }

    /// Permanently stops the caller from selling. The record and its
    /// remaining energy stay queryable and the registry is left unchanged.
    ///
    /// # Errors
    /// - ProducerNotFound / ProducerInactive: If caller is not an active producer
    pub fn deactivate_producer(env: Env, producer: Address) -> Result<(), Error> {
        producer.require_auth();

        let mut record = Self::_require_active_producer(&env, &producer)?;
        record.is_active = false;
        Self::_save_producer(&env, &record);
        Self::_extend_instance(&env);

        Ok(())
    }

    // ================================================================================================
    // CONSUMER OPERATIONS
    // ================================================================================================

    /// Buys `energy_amount` from `producer` at the producer's current price.
    ///
    /// # Business Flow
    /// 1. Validates the request against the producer's listing
    /// 2. Pulls `payment` from the consumer into the contract
    /// 3. Decrements the listing, updates consumer totals and records the transaction
    /// 4. Bumps the global transaction count and energy traded counters
    /// 5. Forwards `total_cost` to the producer and refunds any excess
    ///
    /// Any error aborts the invocation and the host discards every write
    /// and transfer made before it.
    ///
    /// # Arguments
    /// * `consumer` - The buying address (must sign transaction)
    /// * `producer` - The producer to buy from
    /// * `energy_amount` - Units of energy to buy
    /// * `payment` - Token amount attached; must cover `energy_amount * price`
    ///
    /// # Returns
    /// Index of the recorded transaction
    ///
    /// # Errors
    /// - InvalidAmount: If `energy_amount` is not positive
    /// - ProducerNotFound / ProducerInactive: If the producer cannot sell
    /// - InsufficientEnergy: If the listing holds less than `energy_amount`
    /// - InsufficientPayment: If `payment` is below the total cost
    /// - ArithmeticOverflow: If the total cost does not fit in `i128`
    /// - TokenTransferFailed: If any token movement is rejected
    pub fn purchase_energy(
        env: Env,
        consumer: Address,
        producer: Address,
        energy_amount: i128,
        payment: i128,
    ) -> Result<u64, Error> {
        consumer.require_auth();

        if energy_amount <= 0 {
            return Err(Error::InvalidAmount);
        }

        let mut listing = Self::_require_active_producer(&env, &producer)?;

        if listing.energy_available < energy_amount {
            log!(
                &env,
                "Insufficient energy. Requested: {}, Available: {}",
                energy_amount,
                listing.energy_available
            );
            return Err(Error::InsufficientEnergy);
        }

        let price_per_unit = listing.price_per_unit;
        let total_cost = energy_amount
            .checked_mul(price_per_unit)
            .ok_or(Error::ArithmeticOverflow)?;

        if payment < total_cost {
            log!(&env, "Insufficient payment. Required: {}, Provided: {}", total_cost, payment);
            return Err(Error::InsufficientPayment);
        }

        let token_client = Self::_payment_token(&env)?;
        let contract_address = env.current_contract_address();
        Self::_transfer(&env, &token_client, &consumer, &contract_address, payment)?;

        listing.energy_available -= energy_amount;
        Self::_save_producer(&env, &listing);

        let consumer_key = DataKey::Consumer(consumer.clone());
        let mut buyer: Consumer = env
            .storage()
            .persistent()
            .get(&consumer_key)
            .unwrap_or(Consumer {
                consumer: consumer.clone(),
                total_energy_consumed: 0,
                total_spent: 0,
            });
        buyer.total_energy_consumed = buyer
            .total_energy_consumed
            .checked_add(energy_amount)
            .ok_or(Error::ArithmeticOverflow)?;
        buyer.total_spent = buyer
            .total_spent
            .checked_add(total_cost)
            .ok_or(Error::ArithmeticOverflow)?;
        save_record(&env, &consumer_key, &buyer);

        let tx_index: u64 = env.storage().instance().get(&TX_COUNT_KEY).unwrap_or(0);
        let record = EnergyTransaction {
            producer: producer.clone(),
            consumer: consumer.clone(),
            energy_amount,
            price_per_unit,
            total_cost,
            timestamp: env.ledger().timestamp(),
        };
        save_record(&env, &DataKey::Transaction(tx_index), &record);
        env.storage().instance().set(&TX_COUNT_KEY, &(tx_index + 1));

        let energy_traded: i128 = env.storage().instance().get(&ENERGY_TRADED_KEY).unwrap_or(0);
        let energy_traded = energy_traded
            .checked_add(energy_amount)
            .ok_or(Error::ArithmeticOverflow)?;
        env.storage().instance().set(&ENERGY_TRADED_KEY, &energy_traded);
        Self::_extend_instance(&env);

        Self::_transfer(&env, &token_client, &contract_address, &producer, total_cost)?;

        let refund = payment - total_cost;
        if refund > 0 {
            Self::_transfer(&env, &token_client, &contract_address, &consumer, refund)?;
        }

        env.events().publish(
            (ENERGY_PURCHASED, consumer, producer),
            (energy_amount, total_cost),
        );

        Ok(tx_index)
    }

    // ================================================================================================
    // ADMINISTRATIVE FUNCTIONS
    // ================================================================================================

    /// Sweeps the contract's whole payment token balance to the owner.
    ///
    /// Purchases forward funds within the same call, so the balance is zero
    /// under normal operation. This only recovers tokens sent to the contract
    /// directly or left over by a misbehaving token.
    ///
    /// # Returns
    /// The amount transferred to the owner (zero when there was nothing to sweep)
    pub fn emergency_withdraw(env: Env) -> Result<i128, Error> {
        let owner = Self::_require_owner(&env)?;

        let token_client = Self::_payment_token(&env)?;
        let contract_address = env.current_contract_address();
        let balance = token_client.balance(&contract_address);

        if balance > 0 {
            Self::_transfer(&env, &token_client, &contract_address, &owner, balance)?;
            env.events()
                .publish((EMERGENCY_WITHDRAWAL, owner), balance);
        }

        Ok(balance)
    }

    /// Hands the owner role to `new_owner`. Both the current and the new
    /// owner must sign.
    pub fn transfer_ownership(env: Env, new_owner: Address) -> Result<(), Error> {
        Self::_require_owner(&env)?;
        new_owner.require_auth();

        env.storage().instance().set(&OWNER_KEY, &new_owner);
        Self::_extend_instance(&env);

        env.events()
            .publish((OWNERSHIP_TRANSFERRED, env.current_contract_address()), new_owner);

        Ok(())
    }

    // ================================================================================================
    // QUERY FUNCTIONS (GETTERS)
    // ================================================================================================

    pub fn get_owner(env: Env) -> Result<Address, Error> {
        env.storage()
            .instance()
            .get(&OWNER_KEY)
            .ok_or(Error::NotInitialized)
    }

    pub fn get_payment_token(env: Env) -> Result<Address, Error> {
        env.storage()
            .instance()
            .get(&PAYMENT_TOKEN_KEY)
            .ok_or(Error::NotInitialized)
    }

    /// Number of addresses that ever registered as producers.
    pub fn get_producer_count(env: Env) -> u32 {
        Self::get_all_producers(env).len()
    }

    /// Every registered producer in registration order, including deactivated ones.
    pub fn get_all_producers(env: Env) -> Vec<Address> {
        env.storage()
            .instance()
            .get(&PRODUCERS_KEY)
            .unwrap_or(Vec::new(&env))
    }

    /// Returns `(energy_available, price_per_unit, is_active, total_energy_produced)`.
    ///
    /// An address that never registered yields `(0, 0, false, 0)`.
    pub fn get_producer_details(env: Env, producer: Address) -> (i128, i128, bool, i128) {
        match Self::_load_producer(&env, &producer) {
            Some(record) => (
                record.energy_available,
                record.price_per_unit,
                record.is_active,
                record.total_energy_produced,
            ),
            None => (0, 0, false, 0),
        }
    }

    /// Full producer record, if the address ever registered.
    pub fn get_producer(env: Env, producer: Address) -> Option<Producer> {
        Self::_load_producer(&env, &producer)
    }

    /// Returns `(total_energy_consumed, total_spent)`; zeros for an address
    /// that never bought energy.
    pub fn get_consumer_details(env: Env, consumer: Address) -> (i128, i128) {
        let record: Option<Consumer> = env
            .storage()
            .persistent()
            .get(&DataKey::Consumer(consumer));
        match record {
            Some(record) => (record.total_energy_consumed, record.total_spent),
            None => (0, 0),
        }
    }

    /// # Errors
    /// - TransactionNotFound: If `index` is not below the transaction count
    pub fn get_transaction_details(env: Env, index: u64) -> Result<EnergyTransaction, Error> {
        if index >= Self::get_transaction_count(env.clone()) {
            return Err(Error::TransactionNotFound);
        }
        env.storage()
            .persistent()
            .get(&DataKey::Transaction(index))
            .ok_or(Error::TransactionNotFound)
    }

    pub fn get_transaction_count(env: Env) -> u64 {
        env.storage().instance().get(&TX_COUNT_KEY).unwrap_or(0)
    }

    /// Sum of `energy_amount` over every recorded transaction.
    pub fn get_total_energy_traded(env: Env) -> i128 {
        env.storage().instance().get(&ENERGY_TRADED_KEY).unwrap_or(0)
    }
}
