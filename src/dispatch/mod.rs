//! Operation-name dispatch for the token ledger.
//!
//! Routes an incoming operation name with positional JSON arguments onto
//! the ledger API: addresses travel as hex strings, amounts as integers.
//! An unrecognized operation name yields `false` — a defined result, not
//! an error — while a recognized operation with bad arguments fails the
//! call like any other precondition violation.

use serde_json::{json, Value};

use crate::ledger::{Address, Amount, EventSink, TokenError, TokenLedger, Transfer, WitnessOracle};
use crate::store::StateStore;

pub fn dispatch<S, W, E>(
    ledger: &mut TokenLedger<S, W, E>,
    operation: &str,
    args: &[Value],
) -> Result<Value, TokenError>
where
    S: StateStore,
    W: WitnessOracle,
    E: EventSink,
{
    match operation {
        "name" => {
            require_arity(operation, args, 0)?;
            Ok(json!(ledger.name()))
        }
        "symbol" => {
            require_arity(operation, args, 0)?;
            Ok(json!(ledger.symbol()))
        }
        "decimals" => {
            require_arity(operation, args, 0)?;
            Ok(json!(ledger.decimals()))
        }
        "totalSupply" => {
            require_arity(operation, args, 0)?;
            Ok(json!(ledger.total_supply()))
        }
        "balanceOf" => {
            require_arity(operation, args, 1)?;
            let address = decode_address(operation, &args[0])?;
            Ok(json!(ledger.balance_of(address)))
        }
        "transfer" => {
            require_arity(operation, args, 3)?;
            let from = decode_address(operation, &args[0])?;
            let to = decode_address(operation, &args[1])?;
            let amount = decode_amount(operation, &args[2])?;
            ledger.transfer(from, to, amount)?;
            Ok(Value::Bool(true))
        }
        "transferMulti" => {
            if args.is_empty() {
                return Err(malformed(operation, "expected at least one transfer"));
            }
            let transfers = args
                .iter()
                .map(|entry| decode_transfer(operation, entry))
                .collect::<Result<Vec<_>, _>>()?;
            ledger.transfer_multi(&transfers)?;
            Ok(Value::Bool(true))
        }
        "approve" => {
            require_arity(operation, args, 3)?;
            let owner = decode_address(operation, &args[0])?;
            let spender = decode_address(operation, &args[1])?;
            let amount = decode_amount(operation, &args[2])?;
            ledger.approve(owner, spender, amount)?;
            Ok(Value::Bool(true))
        }
        "transferFrom" => {
            require_arity(operation, args, 4)?;
            let spender = decode_address(operation, &args[0])?;
            let from = decode_address(operation, &args[1])?;
            let to = decode_address(operation, &args[2])?;
            let amount = decode_amount(operation, &args[3])?;
            ledger.transfer_from(spender, from, to, amount)?;
            Ok(Value::Bool(true))
        }
        "allowance" => {
            require_arity(operation, args, 2)?;
            let owner = decode_address(operation, &args[0])?;
            let spender = decode_address(operation, &args[1])?;
            Ok(json!(ledger.allowance(owner, spender)))
        }
        "init" => {
            require_arity(operation, args, 0)?;
            ledger.init()?;
            Ok(Value::Bool(true))
        }
        _ => Ok(Value::Bool(false)),
    }
}

fn malformed(operation: &str, reason: &str) -> TokenError {
    TokenError::MalformedArguments {
        operation: operation.to_string(),
        reason: reason.to_string(),
    }
}

fn require_arity(operation: &str, args: &[Value], expected: usize) -> Result<(), TokenError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(malformed(
            operation,
            &format!("expected {expected} arguments, got {}", args.len()),
        ))
    }
}

fn decode_address(operation: &str, value: &Value) -> Result<Address, TokenError> {
    let encoded = value
        .as_str()
        .ok_or_else(|| malformed(operation, "address must be a hex string"))?;
    Address::from_hex(encoded)
}

fn decode_amount(operation: &str, value: &Value) -> Result<Amount, TokenError> {
    if let Some(amount) = value.as_u64() {
        return Ok(amount);
    }
    match value.as_i64() {
        Some(amount) => Err(TokenError::InvalidAmount { amount }),
        None => Err(malformed(operation, "amount must be an integer")),
    }
}

fn decode_transfer(operation: &str, value: &Value) -> Result<Transfer, TokenError> {
    let fields = value
        .as_array()
        .ok_or_else(|| malformed(operation, "transfer must be a [from, to, amount] triple"))?;
    if fields.len() != 3 {
        return Err(malformed(
            operation,
            &format!("transfer triple has {} fields", fields.len()),
        ));
    }
    Ok(Transfer {
        from: decode_address(operation, &fields[0])?,
        to: decode_address(operation, &fields[1])?,
        amount: decode_amount(operation, &fields[2])?,
    })
}
