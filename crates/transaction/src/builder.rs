//! Settlement transaction builder
//!
//! Accumulates the balance effects of all requests of a batch and finalizes
//! them into a single transaction bound to the chain's new state.

use std::collections::BTreeMap;

use tracing::debug;

use sc_common::HashValue;

use crate::error::{TxError, TxResult};
use crate::ids::{Address, Color, RequestId, TransactionId};
use crate::transaction::{Balance, Balances, RequestBlock, StateBlock, Transaction, TransactionEssence};

/// Parameters for constructing a [`TransactionBuilder`]
#[derive(Debug, Clone)]
pub struct TransactionBuilderParams {
    pub balances: Balances,
    pub own_color: Color,
    pub own_address: Address,
    pub request_ids: Vec<RequestId>,
}

/// Builder for the settlement transaction of one batch
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    own_color: Color,
    own_address: Address,
    inputs: Vec<TransactionId>,
    /// Remaining funds per color, chain token included
    available: BTreeMap<Color, i64>,
    transfers: BTreeMap<Address, BTreeMap<Color, i64>>,
    requests: Vec<RequestBlock>,
}

impl TransactionBuilder {
    /// Create a builder over the given input balances.
    ///
    /// Every request must come from a transaction present in `balances`, and
    /// the chain token (one token of `own_color`) must be among the inputs.
    pub fn new(params: TransactionBuilderParams) -> TxResult<Self> {
        for rid in &params.request_ids {
            if !params.balances.contains_key(rid.transaction_id()) {
                return Err(TxError::RequestNotInBalances(*rid));
            }
        }

        let mut available: BTreeMap<Color, i64> = BTreeMap::new();
        for balance in params.balances.values().flatten() {
            if balance.value < 0 {
                return Err(TxError::InvalidAmount(format!(
                    "negative input balance {} of color {}",
                    balance.value, balance.color
                )));
            }
            let total = available.entry(balance.color).or_insert(0);
            *total = total
                .checked_add(balance.value)
                .ok_or_else(|| TxError::InvalidAmount("input balance overflow".to_string()))?;
        }

        if available.get(&params.own_color).copied().unwrap_or(0) < 1 {
            return Err(TxError::NoChainToken(params.own_color));
        }

        Ok(Self {
            own_color: params.own_color,
            own_address: params.own_address,
            inputs: params.balances.keys().copied().collect(),
            available,
            transfers: BTreeMap::new(),
            requests: Vec::new(),
        })
    }

    /// Funds of `color` that may still be transferred. The chain token is
    /// never transferable.
    pub fn available(&self, color: &Color) -> i64 {
        let total = self.available.get(color).copied().unwrap_or(0);
        if *color == self.own_color {
            total - 1
        } else {
            total
        }
    }

    /// Move `amount` tokens of `color` to `target`
    pub fn transfer(&mut self, target: Address, color: Color, amount: i64) -> TxResult<()> {
        if amount <= 0 {
            return Err(TxError::InvalidAmount(format!(
                "transfer amount must be positive, got {}",
                amount
            )));
        }

        let free = self.available(&color);
        if free < amount {
            return Err(TxError::InsufficientFunds {
                color,
                requested: amount,
                available: free,
            });
        }

        *self.available.entry(color).or_insert(0) -= amount;
        *self
            .transfers
            .entry(target)
            .or_default()
            .entry(color)
            .or_insert(0) += amount;

        debug!("transfer {} of color {} to {}", amount, color, target);
        Ok(())
    }

    /// Attach an outbound request block
    pub fn add_request(&mut self, request: RequestBlock) {
        self.requests.push(request);
    }

    pub fn own_address(&self) -> &Address {
        &self.own_address
    }

    pub fn own_color(&self) -> &Color {
        &self.own_color
    }

    /// Produce the settlement transaction for the given resulting state.
    /// Everything not transferred, the chain token included, returns to the
    /// chain's own address.
    pub fn finalize(self, state_index: u32, state_hash: HashValue) -> TxResult<Transaction> {
        let mut outputs = self.transfers;
        for (color, remaining) in self.available {
            if remaining > 0 {
                *outputs
                    .entry(self.own_address)
                    .or_default()
                    .entry(color)
                    .or_insert(0) += remaining;
            }
        }

        let outputs = outputs
            .into_iter()
            .map(|(address, colors)| {
                let balances = colors
                    .into_iter()
                    .map(|(color, value)| Balance::new(color, value))
                    .collect();
                (address, balances)
            })
            .collect();

        Transaction::from_essence(TransactionEssence {
            inputs: self.inputs,
            outputs,
            requests: self.requests,
            state_block: Some(StateBlock {
                color: self.own_color,
                state_index,
                state_hash,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sc_common::hash_data;

    fn addr(seed: &[u8]) -> Address {
        Address::from(hash_data(&[seed]))
    }

    fn setup() -> (TransactionBuilderParams, Color, TransactionId) {
        let chain_color = Color::from(hash_data(&[b"chain-color"]));
        let tx_id = TransactionId::from(hash_data(&[b"request-tx"]));
        let mut balances = Balances::new();
        balances.insert(
            tx_id,
            vec![Balance::new(chain_color, 1), Balance::new(Color::BASE, 100)],
        );
        let params = TransactionBuilderParams {
            balances,
            own_color: chain_color,
            own_address: addr(b"chain"),
            request_ids: vec![RequestId::new(tx_id, 0)],
        };
        (params, chain_color, tx_id)
    }

    #[test]
    fn test_requests_must_be_covered_by_balances() {
        let (mut params, _, _) = setup();
        let stray = RequestId::new(TransactionId::from(hash_data(&[b"other"])), 0);
        params.request_ids.push(stray);
        assert_eq!(
            TransactionBuilder::new(params).unwrap_err(),
            TxError::RequestNotInBalances(stray)
        );
    }

    #[test]
    fn test_chain_token_required() {
        let (mut params, _, _) = setup();
        params.own_color = Color::from(hash_data(&[b"unknown"]));
        assert!(matches!(
            TransactionBuilder::new(params),
            Err(TxError::NoChainToken(_))
        ));
    }

    #[test]
    fn test_transfer_and_finalize() {
        let (params, chain_color, tx_id) = setup();
        let chain = params.own_address;
        let mut builder = TransactionBuilder::new(params).unwrap();

        builder.transfer(addr(b"alice"), Color::BASE, 30).unwrap();
        builder.transfer(addr(b"alice"), Color::BASE, 10).unwrap();
        assert_eq!(builder.available(&Color::BASE), 60);

        // chain token is not transferable
        assert_eq!(builder.available(&chain_color), 0);
        assert!(matches!(
            builder.transfer(addr(b"bob"), chain_color, 1),
            Err(TxError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            builder.transfer(addr(b"bob"), Color::BASE, 0),
            Err(TxError::InvalidAmount(_))
        ));

        let state_hash = hash_data(&[b"state"]);
        let tx = builder.finalize(6, state_hash).unwrap();

        assert_eq!(tx.inputs(), &[tx_id]);
        assert_eq!(
            tx.outputs().get(&addr(b"alice")),
            Some(&vec![Balance::new(Color::BASE, 40)])
        );
        let own = tx.outputs().get(&chain).unwrap();
        assert!(own.contains(&Balance::new(Color::BASE, 60)));
        assert!(own.contains(&Balance::new(chain_color, 1)));
        assert_eq!(
            tx.state_block(),
            Some(&StateBlock {
                color: chain_color,
                state_index: 6,
                state_hash,
            })
        );
    }

    #[test]
    fn test_outbound_requests_in_settlement() {
        let (params, _, _) = setup();
        let mut builder = TransactionBuilder::new(params).unwrap();
        let first = RequestBlock::new(addr(b"other-chain"), 3).with_args(vec![1, 2]);
        let second = RequestBlock::new(addr(b"third-chain"), 9).with_timelock(500);
        builder.add_request(first.clone());
        builder.add_request(second.clone());

        let tx = builder.finalize(2, hash_data(&[b"s2"])).unwrap();
        assert_eq!(tx.requests(), &[first, second]);
        assert_eq!(tx.requests()[1].timelock, 500);
    }

    #[test]
    fn test_finalize_is_deterministic() {
        let run = || {
            let (params, _, _) = setup();
            let mut builder = TransactionBuilder::new(params).unwrap();
            builder.transfer(addr(b"carol"), Color::BASE, 5).unwrap();
            builder.transfer(addr(b"alice"), Color::BASE, 7).unwrap();
            builder.finalize(1, hash_data(&[b"s"])).unwrap()
        };
        assert_eq!(run().id(), run().id());
    }
}
