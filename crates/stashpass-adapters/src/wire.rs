//! BCS encoding of programmable transactions (`TransactionData::V1`).
//!
//! Enum variant order below is the wire order; do not reorder.

use serde::Serialize;
use stashpass_core::transaction::{Argument, CallInput, Command, PureValue, TransactionUnit};
use stashpass_core::types::{Address, ObjectId, ObjectRef};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("object input {0} was not resolved to an owned or shared reference")]
    UnresolvedObject(ObjectId),

    #[error("invalid digest for {object}: {reason}")]
    BadDigest { object: ObjectId, reason: String },

    #[error("unsupported type argument '{0}'")]
    TypeTag(String),

    #[error("bcs encoding failed: {0}")]
    Bcs(String),
}

/// How an object input is passed to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedObject {
    Owned(ObjectRef),
    Shared {
        id: ObjectId,
        initial_shared_version: u64,
        mutable: bool,
    },
}

/// Gas coins, price and budget of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPlan {
    pub payment: Vec<ObjectRef>,
    pub owner: Address,
    pub price: u64,
    pub budget: u64,
}

type WireObjectRef = ([u8; 32], u64, Vec<u8>);

#[derive(Serialize)]
enum TransactionData {
    V1(TransactionDataV1),
}

#[derive(Serialize)]
struct TransactionDataV1 {
    kind: TransactionKind,
    sender: [u8; 32],
    gas_data: GasData,
    expiration: TransactionExpiration,
}

#[derive(Serialize)]
enum TransactionKind {
    ProgrammableTransaction(ProgrammableTransaction),
}

#[derive(Serialize)]
struct ProgrammableTransaction {
    inputs: Vec<WireCallArg>,
    commands: Vec<WireCommand>,
}

#[derive(Serialize)]
enum WireCallArg {
    Pure(Vec<u8>),
    Object(WireObjectArg),
}

#[derive(Serialize)]
enum WireObjectArg {
    ImmOrOwnedObject(WireObjectRef),
    SharedObject {
        id: [u8; 32],
        initial_shared_version: u64,
        mutable: bool,
    },
}

#[derive(Serialize, Clone, Copy)]
enum WireArgument {
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

#[derive(Serialize)]
enum WireCommand {
    MoveCall(Box<WireMoveCall>),
    TransferObjects(Vec<WireArgument>, WireArgument),
    SplitCoins(WireArgument, Vec<WireArgument>),
}

#[derive(Serialize)]
struct WireMoveCall {
    package: [u8; 32],
    module: String,
    function: String,
    type_arguments: Vec<TypeTag>,
    arguments: Vec<WireArgument>,
}

#[derive(Serialize)]
struct GasData {
    payment: Vec<WireObjectRef>,
    owner: [u8; 32],
    price: u64,
    budget: u64,
}

#[derive(Serialize)]
enum TransactionExpiration {
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TypeTag {
    Bool,
    U8,
    U64,
    U128,
    Address,
    Signer,
    Vector(Box<TypeTag>),
    Struct(Box<StructTag>),
    U16,
    U32,
    U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructTag {
    pub address: [u8; 32],
    pub module: String,
    pub name: String,
    pub type_params: Vec<TypeTag>,
}

/// Parse a Move type such as `u64`, `vector<u8>` or `0x2::coin::Coin<0x2::sui::SUI>`.
pub fn parse_type_tag(input: &str) -> Result<TypeTag, WireError> {
    let input = input.trim();
    let err = || WireError::TypeTag(input.to_string());
    let primitive = match input {
        "bool" => Some(TypeTag::Bool),
        "u8" => Some(TypeTag::U8),
        "u16" => Some(TypeTag::U16),
        "u32" => Some(TypeTag::U32),
        "u64" => Some(TypeTag::U64),
        "u128" => Some(TypeTag::U128),
        "u256" => Some(TypeTag::U256),
        "address" => Some(TypeTag::Address),
        "signer" => Some(TypeTag::Signer),
        _ => None,
    };
    if let Some(tag) = primitive {
        return Ok(tag);
    }
    if let Some(inner) = input
        .strip_prefix("vector<")
        .and_then(|rest| rest.strip_suffix('>'))
    {
        return Ok(TypeTag::Vector(Box::new(parse_type_tag(inner)?)));
    }

    let (path, params) = match input.split_once('<') {
        Some((path, rest)) => (path, rest.strip_suffix('>').ok_or_else(err)?),
        None => (input, ""),
    };
    let mut parts = path.split("::");
    let (Some(address), Some(module), Some(name), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(err());
    };
    let address: ObjectId = address.parse().map_err(|_| err())?;
    let type_params = split_type_params(params)
        .into_iter()
        .map(parse_type_tag)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TypeTag::Struct(Box::new(StructTag {
        address: address.into_bytes(),
        module: module.to_string(),
        name: name.to_string(),
        type_params,
    })))
}

/// Split top-level comma separated type parameters.
fn split_type_params(params: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in params.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(params[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    let last = params[start..].trim();
    if !last.is_empty() {
        out.push(last);
    }
    out
}

fn bcs_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, WireError> {
    bcs::to_bytes(value).map_err(|e| WireError::Bcs(e.to_string()))
}

/// BCS bytes of a pure argument.
pub fn pure_bytes(value: &PureValue) -> Result<Vec<u8>, WireError> {
    match value {
        PureValue::U64(v) => bcs_bytes(v),
        PureValue::Bool(v) => bcs_bytes(v),
        PureValue::String(v) => bcs_bytes(v),
        PureValue::Address(v) => bcs_bytes(v.as_bytes()),
    }
}

fn object_ref(reference: &ObjectRef) -> Result<WireObjectRef, WireError> {
    let digest = bs58::decode(&reference.digest)
        .into_vec()
        .map_err(|e| WireError::BadDigest {
            object: reference.object_id,
            reason: e.to_string(),
        })?;
    if digest.len() != 32 {
        return Err(WireError::BadDigest {
            object: reference.object_id,
            reason: format!("expected 32 bytes, got {}", digest.len()),
        });
    }
    Ok((reference.object_id.into_bytes(), reference.version, digest))
}

fn argument(argument: Argument) -> WireArgument {
    match argument {
        Argument::GasCoin => WireArgument::GasCoin,
        Argument::Input(i) => WireArgument::Input(i),
        Argument::Result(i) => WireArgument::Result(i),
        Argument::NestedResult(i, j) => WireArgument::NestedResult(i, j),
    }
}

fn arguments(arguments: &[Argument]) -> Vec<WireArgument> {
    arguments.iter().copied().map(argument).collect()
}

/// Encode a unit as BCS `TransactionData` ready for signing.
pub fn encode_transaction(
    unit: &TransactionUnit,
    sender: Address,
    gas: &GasPlan,
    objects: &HashMap<ObjectId, ResolvedObject>,
) -> Result<Vec<u8>, WireError> {
    let inputs = unit
        .inputs
        .iter()
        .map(|input| match input {
            CallInput::Pure(value) => Ok(WireCallArg::Pure(pure_bytes(value)?)),
            CallInput::Object(id) => match objects.get(id) {
                Some(ResolvedObject::Owned(reference)) => Ok(WireCallArg::Object(
                    WireObjectArg::ImmOrOwnedObject(object_ref(reference)?),
                )),
                Some(ResolvedObject::Shared {
                    id,
                    initial_shared_version,
                    mutable,
                }) => Ok(WireCallArg::Object(WireObjectArg::SharedObject {
                    id: id.into_bytes(),
                    initial_shared_version: *initial_shared_version,
                    mutable: *mutable,
                })),
                None => Err(WireError::UnresolvedObject(*id)),
            },
        })
        .collect::<Result<Vec<_>, _>>()?;

    let commands = unit
        .commands
        .iter()
        .map(|command| match command {
            Command::MoveCall {
                target,
                type_arguments,
                arguments: args,
            } => Ok(WireCommand::MoveCall(Box::new(WireMoveCall {
                package: target.package.into_bytes(),
                module: target.module.clone(),
                function: target.function.clone(),
                type_arguments: type_arguments
                    .iter()
                    .map(|tag| parse_type_tag(tag))
                    .collect::<Result<Vec<_>, _>>()?,
                arguments: arguments(args),
            }))),
            Command::SplitCoins { coin, amounts } => {
                Ok(WireCommand::SplitCoins(argument(*coin), arguments(amounts)))
            }
            Command::TransferObjects { objects, recipient } => Ok(WireCommand::TransferObjects(
                arguments(objects),
                argument(*recipient),
            )),
        })
        .collect::<Result<Vec<_>, WireError>>()?;

    let data = TransactionData::V1(TransactionDataV1 {
        kind: TransactionKind::ProgrammableTransaction(ProgrammableTransaction {
            inputs,
            commands,
        }),
        sender: sender.into_bytes(),
        gas_data: GasData {
            payment: gas
                .payment
                .iter()
                .map(object_ref)
                .collect::<Result<Vec<_>, _>>()?,
            owner: gas.owner.into_bytes(),
            price: gas.price,
            budget: gas.budget,
        },
        expiration: TransactionExpiration::None,
    });
    bcs_bytes(&data)
}

/// Amount the gas coin must cover beyond the budget: coins split off `GasCoin`.
pub fn gas_coin_spend(unit: &TransactionUnit) -> u64 {
    unit.commands
        .iter()
        .filter_map(|command| match command {
            Command::SplitCoins {
                coin: Argument::GasCoin,
                amounts,
            } => Some(amounts),
            _ => None,
        })
        .flatten()
        .filter_map(|amount| match unit.input(*amount) {
            Some(CallInput::Pure(PureValue::U64(value))) => Some(*value),
            _ => None,
        })
        .fold(0u64, u64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stashpass_core::transaction::{CallArg, ContractCall, TransactionBuilder};

    fn id(raw: &str) -> ObjectId {
        raw.parse().unwrap()
    }

    fn digest() -> String {
        bs58::encode([9u8; 32]).into_string()
    }

    fn buy_unit() -> TransactionUnit {
        let mut tx = TransactionBuilder::new(id("0xd847"), "event_manager");
        let coins = tx.split_coins(Argument::GasCoin, &[100_000_000]).unwrap();
        tx.call(
            ContractCall::BuyTicket,
            vec![CallArg::Object(id("0xa1")), CallArg::Produced(coins[0])],
        )
        .unwrap();
        tx.build().unwrap()
    }

    fn gas(owner: Address) -> GasPlan {
        GasPlan {
            payment: vec![ObjectRef {
                object_id: id("0x99"),
                version: 4,
                digest: digest(),
            }],
            owner,
            price: 1_000,
            budget: 50_000_000,
        }
    }

    #[test]
    fn pure_values_use_bcs_layouts() {
        assert_eq!(pure_bytes(&PureValue::U64(1)).unwrap(), vec![1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(pure_bytes(&PureValue::Bool(true)).unwrap(), vec![1]);
        assert_eq!(
            pure_bytes(&PureValue::String("VIP".into())).unwrap(),
            vec![3, b'V', b'I', b'P']
        );
        assert_eq!(
            pure_bytes(&PureValue::Address(Address::new([5; 32]))).unwrap(),
            vec![5; 32]
        );
    }

    #[test]
    fn encodes_transaction_data_header_and_gas() {
        let sender = Address::new([1; 32]);
        let mut objects = HashMap::new();
        objects.insert(
            id("0xa1"),
            ResolvedObject::Shared {
                id: id("0xa1"),
                initial_shared_version: 7,
                mutable: true,
            },
        );
        let bytes = encode_transaction(&buy_unit(), sender, &gas(sender), &objects).unwrap();

        // V1, ProgrammableTransaction, 2 inputs, Pure, 8-byte payload.
        assert_eq!(&bytes[..5], &[0, 0, 2, 0, 8]);
        assert_eq!(&bytes[5..13], &100_000_000u64.to_le_bytes());
        // Object input, SharedObject.
        assert_eq!(&bytes[13..15], &[1, 1]);
        // Expiration None is the final byte, preceded by the budget.
        assert_eq!(bytes[bytes.len() - 1], 0);
        assert_eq!(
            &bytes[bytes.len() - 9..bytes.len() - 1],
            &50_000_000u64.to_le_bytes()
        );
    }

    #[test]
    fn unresolved_objects_are_rejected() {
        let sender = Address::new([1; 32]);
        let err = encode_transaction(&buy_unit(), sender, &gas(sender), &HashMap::new()).unwrap_err();
        assert_eq!(err, WireError::UnresolvedObject(id("0xa1")));
    }

    #[test]
    fn bad_digests_are_rejected() {
        let sender = Address::new([1; 32]);
        let mut plan = gas(sender);
        plan.payment[0].digest = "0OIl".into();
        let mut objects = HashMap::new();
        objects.insert(
            id("0xa1"),
            ResolvedObject::Shared {
                id: id("0xa1"),
                initial_shared_version: 1,
                mutable: true,
            },
        );
        assert!(matches!(
            encode_transaction(&buy_unit(), sender, &plan, &objects),
            Err(WireError::BadDigest { .. })
        ));
    }

    #[test]
    fn gas_spend_counts_split_amounts() {
        assert_eq!(gas_coin_spend(&buy_unit()), 100_000_000);
    }

    #[test]
    fn parses_nested_type_tags() {
        let tag = parse_type_tag("0x2::coin::Coin<0x2::sui::SUI>").unwrap();
        match tag {
            TypeTag::Struct(coin) => {
                assert_eq!(coin.name, "Coin");
                assert_eq!(coin.type_params.len(), 1);
            }
            other => panic!("unexpected tag {other:?}"),
        }
        assert_eq!(
            parse_type_tag("vector<u8>").unwrap(),
            TypeTag::Vector(Box::new(TypeTag::U8))
        );
        assert!(parse_type_tag("0x2::coin").is_err());
        assert_eq!(split_type_params("u64, vector<u8>, 0x2::a::B<u8, u16>").len(), 3);
    }

    proptest::proptest! {
        #[test]
        fn short_strings_carry_a_single_length_byte(text in "[a-zA-Z0-9 ]{0,127}") {
            let bytes = pure_bytes(&PureValue::String(text.clone())).unwrap();
            proptest::prop_assert_eq!(bytes[0] as usize, text.len());
            proptest::prop_assert_eq!(&bytes[1..], text.as_bytes());
        }

        #[test]
        fn gas_spend_sums_every_split(amounts in proptest::collection::vec(1u64..1_000_000, 1..8)) {
            let mut tx = TransactionBuilder::new(id("0xd847"), "event_manager");
            let coins = tx.split_coins(Argument::GasCoin, &amounts).unwrap();
            tx.transfer_objects(
                coins.into_iter().map(CallArg::Produced).collect(),
                Address::new([3; 32]),
            )
            .unwrap();
            let unit = tx.build().unwrap();
            proptest::prop_assert_eq!(gas_coin_spend(&unit), amounts.iter().sum::<u64>());
        }
    }
}
