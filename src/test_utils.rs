//! Test Utilities Module
//!
//! Deterministic stand-ins for the ledger, the quoting service and the
//! liquidity service, plus fixtures for lookup-table accounts and prebuilt
//! swap transactions. No network access anywhere.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    message::{v0::Message as MessageV0, VersionedMessage},
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use std::collections::HashMap;

use crate::services::{
    ActiveBin, AddLiquidityRequest, Confirmation, Ledger, LiquidityPosition, LiquidityService,
    PoolState, Quote, QuoteRequest, QuoteService, RemoveLiquidityRequest, ServiceError,
    StrategyAmountRequest, SwapTransaction,
};

/// Size of the lookup-table metadata header preceding the addresses
const LOOKUP_TABLE_META_SIZE: usize = 56;

/// Compute units reported by a default `MockLedger` simulation
pub const MOCK_COMPUTE_UNITS: u64 = 150_000;

/// In-memory ledger
///
/// Accounts can be added after construction; everything else is fixed by
/// the builder methods. Simulated and sent transactions are recorded.
pub struct MockLedger {
    accounts: RwLock<HashMap<Pubkey, Vec<u8>>>,
    blockhash: Result<Hash, ServiceError>,
    compute_units: Result<Option<u64>, ServiceError>,
    send_error: Option<ServiceError>,
    confirmation: Result<Confirmation, ServiceError>,
    simulated: Mutex<Vec<VersionedTransaction>>,
    sent: Mutex<Vec<VersionedTransaction>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            blockhash: Ok(Hash::new_from_array([7u8; 32])),
            compute_units: Ok(Some(MOCK_COMPUTE_UNITS)),
            send_error: None,
            confirmation: Ok(Confirmation::Confirmed),
            simulated: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl MockLedger {
    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.accounts.write().insert(address, data);
    }

    /// Store every table as a lookup-table account
    pub fn with_lookup_tables(self, tables: &[AddressLookupTableAccount]) -> Self {
        for table in tables {
            self.set_account(table.key, lookup_table_data(&table.addresses));
        }
        self
    }

    pub fn with_blockhash(mut self, blockhash: Hash) -> Self {
        self.blockhash = Ok(blockhash);
        self
    }

    pub fn with_blockhash_error(mut self, error: ServiceError) -> Self {
        self.blockhash = Err(error);
        self
    }

    pub fn with_compute_units(mut self, units: Option<u64>) -> Self {
        self.compute_units = Ok(units);
        self
    }

    pub fn with_simulation_error(mut self, error: ServiceError) -> Self {
        self.compute_units = Err(error);
        self
    }

    pub fn with_send_error(mut self, error: ServiceError) -> Self {
        self.send_error = Some(error);
        self
    }

    pub fn with_confirmation(mut self, confirmation: Confirmation) -> Self {
        self.confirmation = Ok(confirmation);
        self
    }

    pub fn with_confirm_error(mut self, error: ServiceError) -> Self {
        self.confirmation = Err(error);
        self
    }

    /// Blockhash handed out by `latest_blockhash`, if it succeeds
    pub fn blockhash(&self) -> Option<Hash> {
        self.blockhash.as_ref().ok().copied()
    }

    pub fn simulated_transactions(&self) -> Vec<VersionedTransaction> {
        self.simulated.lock().clone()
    }

    pub fn sent_transactions(&self) -> Vec<VersionedTransaction> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn latest_blockhash(&self) -> Result<Hash, ServiceError> {
        self.blockhash.clone()
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ServiceError> {
        Ok(self.accounts.read().get(address).cloned())
    }

    async fn simulate_compute_units(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Option<u64>, ServiceError> {
        self.simulated.lock().push(tx.clone());
        self.compute_units.clone()
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, ServiceError> {
        if let Some(error) = &self.send_error {
            return Err(error.clone());
        }
        self.sent.lock().push(tx.clone());
        Ok(tx.signatures.first().copied().unwrap_or_default())
    }

    async fn confirm_transaction(
        &self,
        _signature: &Signature,
    ) -> Result<Confirmation, ServiceError> {
        self.confirmation.clone()
    }
}

/// Raw account data of an active lookup table holding `addresses`
pub fn lookup_table_data(addresses: &[Pubkey]) -> Vec<u8> {
    let mut data = Vec::with_capacity(LOOKUP_TABLE_META_SIZE + addresses.len() * 32);
    data.extend_from_slice(&1u32.to_le_bytes()); // ProgramState::LookupTable
    data.extend_from_slice(&u64::MAX.to_le_bytes()); // deactivation_slot
    data.extend_from_slice(&0u64.to_le_bytes()); // last_extended_slot
    data.push(0); // last_extended_slot_start_index
    data.push(0); // authority: None
    data.resize(LOOKUP_TABLE_META_SIZE, 0);
    for address in addresses {
        data.extend_from_slice(address.as_ref());
    }
    data
}

/// A service-built swap transaction
pub struct SwapFixture {
    pub transaction: VersionedTransaction,
    pub tables: Vec<AddressLookupTableAccount>,
    /// Instructions after the service's budget pair, uncompressed
    pub body: Vec<Instruction>,
    pub body_instructions: usize,
}

/// V0 swap transaction paying from `payer`: the service's budget pair then
/// one swap-leg instruction per table (at least one), each touching a
/// writable and a readonly table entry
pub fn swap_transaction_fixture(payer: &Pubkey, table_count: usize) -> SwapFixture {
    let tables: Vec<AddressLookupTableAccount> = (0..table_count)
        .map(|_| AddressLookupTableAccount {
            key: Pubkey::new_unique(),
            addresses: vec![Pubkey::new_unique(), Pubkey::new_unique()],
        })
        .collect();
    let program_id = Pubkey::new_unique();

    let body: Vec<Instruction> = if tables.is_empty() {
        vec![Instruction::new_with_bytes(
            program_id,
            &[0],
            vec![
                AccountMeta::new(*payer, true),
                AccountMeta::new(Pubkey::new_unique(), false),
            ],
        )]
    } else {
        tables
            .iter()
            .enumerate()
            .map(|(leg, table)| {
                Instruction::new_with_bytes(
                    program_id,
                    &[leg as u8],
                    vec![
                        AccountMeta::new(*payer, true),
                        AccountMeta::new(table.addresses[0], false),
                        AccountMeta::new_readonly(table.addresses[1], false),
                    ],
                )
            })
            .collect()
    };

    let mut instructions = vec![
        ComputeBudgetInstruction::set_compute_unit_limit(300_000),
        ComputeBudgetInstruction::set_compute_unit_price(5_000),
    ];
    instructions.extend(body.iter().cloned());

    let message = MessageV0::try_compile(payer, &instructions, &tables, Hash::new_unique())
        .expect("fixture message compiles");
    let num_signatures = message.header.num_required_signatures as usize;

    SwapFixture {
        transaction: VersionedTransaction {
            signatures: vec![Signature::default(); num_signatures],
            message: VersionedMessage::V0(message),
        },
        tables,
        body_instructions: body.len(),
        body,
    }
}

enum QuoteBehavior {
    Route(SwapTransaction),
    NoRoute,
    QuoteError(ServiceError),
    BuildError(ServiceError),
}

/// Quoting service that always returns the same route
pub struct MockQuoteService {
    behavior: QuoteBehavior,
    quote_requests: Mutex<Vec<QuoteRequest>>,
    build_payers: Mutex<Vec<Pubkey>>,
}

impl MockQuoteService {
    fn with_behavior(behavior: QuoteBehavior) -> Self {
        Self {
            behavior,
            quote_requests: Mutex::new(Vec::new()),
            build_payers: Mutex::new(Vec::new()),
        }
    }

    /// Quotes succeed and every build returns `tx`
    pub fn with_transaction(tx: &VersionedTransaction) -> Self {
        let swap = SwapTransaction::from_transaction(tx).expect("fixture transaction serializes");
        Self::with_behavior(QuoteBehavior::Route(swap))
    }

    pub fn no_route() -> Self {
        Self::with_behavior(QuoteBehavior::NoRoute)
    }

    pub fn quote_error(error: ServiceError) -> Self {
        Self::with_behavior(QuoteBehavior::QuoteError(error))
    }

    /// Quotes succeed but the build step fails
    pub fn build_error(error: ServiceError) -> Self {
        Self::with_behavior(QuoteBehavior::BuildError(error))
    }

    pub fn quote_requests(&self) -> Vec<QuoteRequest> {
        self.quote_requests.lock().clone()
    }

    pub fn build_payers(&self) -> Vec<Pubkey> {
        self.build_payers.lock().clone()
    }
}

#[async_trait]
impl QuoteService for MockQuoteService {
    async fn quote(&self, request: &QuoteRequest) -> Result<Option<Quote>, ServiceError> {
        self.quote_requests.lock().push(*request);
        match &self.behavior {
            QuoteBehavior::NoRoute => Ok(None),
            QuoteBehavior::QuoteError(error) => Err(error.clone()),
            QuoteBehavior::Route(_) | QuoteBehavior::BuildError(_) => {
                Ok(Some(Quote(serde_json::json!({
                    "inputMint": request.input_mint.to_string(),
                    "outputMint": request.output_mint.to_string(),
                    "inAmount": request.amount.to_string(),
                    "outAmount": (request.amount / 2).to_string(),
                    "slippageBps": request.slippage_bps,
                }))))
            }
        }
    }

    async fn build_swap_transaction(
        &self,
        _quote: &Quote,
        payer: &Pubkey,
    ) -> Result<Option<SwapTransaction>, ServiceError> {
        self.build_payers.lock().push(*payer);
        match &self.behavior {
            QuoteBehavior::Route(swap) => Ok(Some(swap.clone())),
            QuoteBehavior::BuildError(error) | QuoteBehavior::QuoteError(error) => {
                Err(error.clone())
            }
            QuoteBehavior::NoRoute => Ok(None),
        }
    }
}

/// Liquidity service for a single pool
///
/// Add builds `[setup, open position, deposit]`; remove builds
/// `[setup, withdraw, claim and close]`.
pub struct MockLiquidityService {
    program_id: Pubkey,
    pool: Option<PoolState>,
    fill_y: u64,
    positions: Vec<LiquidityPosition>,
    position_queries: Mutex<Vec<Pubkey>>,
    add_requests: Mutex<Vec<AddLiquidityRequest>>,
    remove_requests: Mutex<Vec<RemoveLiquidityRequest>>,
}

impl Default for MockLiquidityService {
    fn default() -> Self {
        Self {
            program_id: Pubkey::new_from_array([9u8; 32]),
            pool: None,
            fill_y: 0,
            positions: Vec::new(),
            position_queries: Mutex::new(Vec::new()),
            add_requests: Mutex::new(Vec::new()),
            remove_requests: Mutex::new(Vec::new()),
        }
    }
}

impl MockLiquidityService {
    pub fn with_active_bin(pool: Pubkey, bin_id: i32) -> Self {
        Self {
            pool: Some(PoolState {
                address: pool,
                active_bin: ActiveBin {
                    bin_id,
                    x_amount: 1_000_000,
                    y_amount: 1_000_000,
                },
                bin_step: 10,
            }),
            ..Self::default()
        }
    }

    pub fn with_fill_y(mut self, amount: u64) -> Self {
        self.fill_y = amount;
        self
    }

    pub fn with_positions(mut self, positions: Vec<LiquidityPosition>) -> Self {
        self.positions = positions;
        self
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// Pools whose positions were queried, in call order
    pub fn position_queries(&self) -> Vec<Pubkey> {
        self.position_queries.lock().clone()
    }

    pub fn add_requests(&self) -> Vec<AddLiquidityRequest> {
        self.add_requests.lock().clone()
    }

    pub fn remove_requests(&self) -> Vec<RemoveLiquidityRequest> {
        self.remove_requests.lock().clone()
    }

    fn pool(&self, pool: &Pubkey) -> Result<PoolState, ServiceError> {
        self.pool
            .filter(|state| state.address == *pool)
            .ok_or_else(|| ServiceError::Status {
                status: 404,
                body: format!("pool {} not found", pool),
            })
    }

    fn setup_instruction(&self, owner: &Pubkey) -> Instruction {
        Instruction::new_with_bytes(
            self.program_id,
            &[0],
            vec![AccountMeta::new(*owner, true)],
        )
    }
}

#[async_trait]
impl LiquidityService for MockLiquidityService {
    async fn pool_state(&self, pool: &Pubkey) -> Result<PoolState, ServiceError> {
        self.pool(pool)
    }

    async fn positions(
        &self,
        pool: &Pubkey,
        _owner: &Pubkey,
    ) -> Result<Vec<LiquidityPosition>, ServiceError> {
        self.position_queries.lock().push(*pool);
        self.pool(pool)?;
        Ok(self.positions.clone())
    }

    async fn fill_y_by_strategy(&self, request: &StrategyAmountRequest) -> Result<u64, ServiceError> {
        self.pool(&request.pool)?;
        Ok(self.fill_y)
    }

    async fn add_liquidity_by_strategy(
        &self,
        request: &AddLiquidityRequest,
    ) -> Result<Vec<Instruction>, ServiceError> {
        self.pool(&request.pool)?;
        self.add_requests.lock().push(*request);

        let mut deposit = vec![2u8, request.strategy.as_u8()];
        deposit.extend_from_slice(&request.x_amount.to_le_bytes());
        deposit.extend_from_slice(&request.y_amount.to_le_bytes());

        Ok(vec![
            self.setup_instruction(&request.owner),
            Instruction::new_with_bytes(
                self.program_id,
                &[1],
                vec![
                    AccountMeta::new(request.owner, true),
                    AccountMeta::new(request.position, true),
                    AccountMeta::new_readonly(request.pool, false),
                ],
            ),
            Instruction::new_with_bytes(
                self.program_id,
                &deposit,
                vec![
                    AccountMeta::new(request.position, false),
                    AccountMeta::new(request.pool, false),
                    AccountMeta::new(request.owner, true),
                ],
            ),
        ])
    }

    async fn remove_liquidity(
        &self,
        request: &RemoveLiquidityRequest,
    ) -> Result<Vec<Instruction>, ServiceError> {
        self.pool(&request.pool)?;
        self.remove_requests.lock().push(*request);

        let mut withdraw = vec![3u8];
        withdraw.extend_from_slice(&request.bps.to_le_bytes());

        let mut instructions = vec![
            self.setup_instruction(&request.owner),
            Instruction::new_with_bytes(
                self.program_id,
                &withdraw,
                vec![
                    AccountMeta::new(request.position, false),
                    AccountMeta::new(request.pool, false),
                    AccountMeta::new(request.owner, true),
                ],
            ),
        ];
        if request.claim_and_close {
            instructions.push(Instruction::new_with_bytes(
                self.program_id,
                &[4],
                vec![
                    AccountMeta::new(request.position, false),
                    AccountMeta::new(request.owner, true),
                ],
            ));
        }
        Ok(instructions)
    }
}
