use crate::address::Address;
use crate::error::TypesError;
use crate::hash::Hash;
use crate::rlp::{self, RlpItem, RlpList};
use crate::signature::{self, Signature};
use std::fmt;

/// Unsigned legacy transaction.
///
/// With `chain_id` set the signing payload follows EIP-155 and the resulting
/// signature is only valid on that chain.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Transaction {
    /// Sender's nonce
    pub nonce: u64,
    /// Price per gas unit in wei
    pub gas_price: u128,
    /// Maximum gas units this TX can consume
    pub gas_limit: u64,
    /// Recipient address (None = contract creation)
    pub to: Option<Address>,
    /// Wei to transfer
    pub value: u128,
    /// Call data or init code
    pub data: Vec<u8>,
    /// Chain ID for replay protection
    pub chain_id: Option<u64>,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(nonce: u64, gas_price: u128, gas_limit: u64, to: Option<Address>, value: u128) -> Self {
        Self {
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data: Vec::new(),
            chain_id: None,
        }
    }

    /// Add data to the transaction
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Bind the transaction to a chain (EIP-155)
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Check if this is a contract creation transaction
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// Reject field values that cannot be signed.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.nonce == u64::MAX {
            return Err(TypesError::FieldOutOfRange {
                field: "nonce",
                reason: "nonce must be below 2^64 - 1".to_string(),
            });
        }
        if let Some(chain_id) = self.chain_id {
            signature::eip155_v(chain_id, 1)?;
        }
        Ok(())
    }

    fn append_fields(&self, list: &mut RlpList) {
        list.append_u64(self.nonce)
            .append_u128(self.gas_price)
            .append_u64(self.gas_limit);
        match &self.to {
            Some(to) => list.append_bytes(to.as_bytes()),
            None => list.append_bytes(&[]),
        };
        list.append_u128(self.value).append_bytes(&self.data);
    }

    /// Canonical bytes that get hashed and signed.
    pub fn signing_payload(&self) -> Result<Vec<u8>, TypesError> {
        self.validate()?;
        let mut list = RlpList::new();
        self.append_fields(&mut list);
        if let Some(chain_id) = self.chain_id {
            list.append_u64(chain_id).append_u64(0).append_u64(0);
        }
        Ok(list.finish())
    }

    /// Compute the hash that should be signed
    pub fn signing_hash(&self) -> Result<Hash, TypesError> {
        Ok(Hash::compute(&self.signing_payload()?))
    }

    /// Inverse of [`Transaction::signing_payload`].
    pub fn decode_signing_payload(bytes: &[u8]) -> Result<Self, TypesError> {
        let item = rlp::decode(bytes)?;
        let items = item.as_list("transaction")?;
        let mut tx = match items.len() {
            6 | 9 => decode_fields(&items[..6])?,
            n => {
                return Err(TypesError::Rlp(format!(
                    "expected 6 or 9 fields in signing payload, got {n}"
                )))
            }
        };
        if items.len() == 9 {
            tx.chain_id = Some(items[6].as_u64("chain_id")?);
            if items[7].as_u64("eip155_r")? != 0 || items[8].as_u64("eip155_s")? != 0 {
                return Err(TypesError::Rlp("EIP-155 placeholders must be zero".to_string()));
            }
        }
        tx.validate()?;
        Ok(tx)
    }
}

fn decode_fields(items: &[RlpItem<'_>]) -> Result<Transaction, TypesError> {
    let to = match items[3].as_bytes("to")? {
        [] => None,
        bytes => Some(Address::from_slice(bytes)?),
    };
    Ok(Transaction {
        nonce: items[0].as_u64("nonce")?,
        gas_price: items[1].as_u128("gas_price")?,
        gas_limit: items[2].as_u64("gas_limit")?,
        to,
        value: items[4].as_u128("value")?,
        data: items[5].as_bytes("data")?.to_vec(),
        chain_id: None,
    })
}

/// Transaction with signature attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: Transaction,
    signature: Signature,
    v: u64,
}

impl SignedTransaction {
    /// Attach a signature. Fails if the transaction itself is unsignable.
    pub fn new(tx: Transaction, signature: Signature) -> Result<Self, TypesError> {
        tx.validate()?;
        let v = signature.v(tx.chain_id)?;
        Ok(Self { tx, signature, v })
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn v(&self) -> u64 {
        self.v
    }

    /// Wire encoding: `[nonce, gasPrice, gasLimit, to, value, data, v, r, s]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut list = RlpList::new();
        self.tx.append_fields(&mut list);
        list.append_u64(self.v)
            .append_scalar(self.signature.r())
            .append_scalar(self.signature.s());
        list.finish()
    }

    /// `0x`-prefixed hex of [`SignedTransaction::encode`].
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.encode()))
    }

    /// Compute the transaction hash
    pub fn hash(&self) -> Hash {
        Hash::compute(&self.encode())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TypesError> {
        let item = rlp::decode(bytes)?;
        let items = item.as_list("signed transaction")?;
        if items.len() != 9 {
            return Err(TypesError::Rlp(format!(
                "expected 9 fields in signed transaction, got {}",
                items.len()
            )));
        }
        let mut tx = decode_fields(&items[..6])?;
        let v = items[6].as_u64("v")?;
        let (recovery_id, chain_id) = signature::split_v(v)?;
        tx.chain_id = chain_id;
        let signature = Signature::new(
            items[7].as_scalar("r")?,
            items[8].as_scalar("s")?,
            recovery_id,
        )?;
        Self::new(tx, signature)
    }

    /// Check if this is a contract creation
    pub fn is_create(&self) -> bool {
        self.tx.is_create()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let to = self
            .to
            .map(|a| a.to_string())
            .unwrap_or_else(|| "<create>".to_string());
        write!(
            f,
            "Transaction {{ chain_id: {:?}, nonce: {}, to: {}, value: {} }}",
            self.chain_id, self.nonce, to, self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

    fn transfer(nonce: u64, gas_price: u128) -> Transaction {
        Transaction::new(
            nonce,
            gas_price,
            21000,
            Some(Address::from_bytes([0x35; 20])),
            WEI_PER_ETHER,
        )
    }

    #[test]
    fn test_signing_payload_golden() {
        let tx = transfer(0, 2_000_000_000).with_chain_id(1);
        let payload = tx.signing_payload().unwrap();
        assert_eq!(
            hex::encode(&payload),
            "eb808477359400825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(Transaction::decode_signing_payload(&payload).unwrap(), tx);
    }

    #[test]
    fn test_signing_payload_without_chain_id() {
        let tx = transfer(0, 2_000_000_000);
        let payload = tx.signing_payload().unwrap();
        assert_eq!(
            hex::encode(&payload),
            "e8808477359400825208943535353535353535353535353535353535353535880de0b6b3a764000080"
        );
        let decoded = Transaction::decode_signing_payload(&payload).unwrap();
        assert_eq!(decoded.chain_id, None);
    }

    #[test]
    fn test_eip155_example_hash() {
        let tx = transfer(9, 20_000_000_000).with_chain_id(1);
        assert_eq!(
            hex::encode(tx.signing_payload().unwrap()),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(
            tx.signing_hash().unwrap().to_hex(),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_signed_transaction_encode_decode() {
        let tx = transfer(9, 20_000_000_000).with_chain_id(1);
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        hex::decode_to_slice(
            "28ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276",
            &mut r,
        )
        .unwrap();
        hex::decode_to_slice(
            "67cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83",
            &mut s,
        )
        .unwrap();
        let signed = SignedTransaction::new(tx.clone(), Signature::new(r, s, 0).unwrap()).unwrap();
        assert_eq!(signed.v(), 37);

        let expected = "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83";
        assert_eq!(hex::encode(signed.encode()), expected);
        assert_eq!(signed.to_hex(), format!("0x{expected}"));

        let decoded = SignedTransaction::decode(&hex::decode(expected).unwrap()).unwrap();
        assert_eq!(decoded, signed);
        assert_eq!(decoded.tx(), &tx);
    }

    #[test]
    fn test_contract_creation_encodes_empty_recipient() {
        let tx = Transaction::new(1, 1, 100_000, None, 0).with_data(vec![0x60, 0x80]);
        assert!(tx.is_create());
        let payload = tx.signing_payload().unwrap();
        let decoded = Transaction::decode_signing_payload(&payload).unwrap();
        assert_eq!(decoded, tx);
        assert!(decoded.to.is_none());
    }

    #[test]
    fn test_field_out_of_range() {
        let tx = transfer(u64::MAX, 1);
        assert!(matches!(
            tx.signing_payload(),
            Err(TypesError::FieldOutOfRange { field: "nonce", .. })
        ));

        let tx = transfer(0, 1).with_chain_id(u64::MAX);
        assert!(matches!(
            tx.signing_hash(),
            Err(TypesError::FieldOutOfRange { field: "chain_id", .. })
        ));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        // five-field list
        let mut list = RlpList::new();
        list.append_u64(0).append_u64(0).append_u64(0).append_bytes(&[]).append_u64(0);
        assert!(Transaction::decode_signing_payload(&list.finish()).is_err());

        // recipient of the wrong length
        let mut list = RlpList::new();
        list.append_u64(0)
            .append_u64(0)
            .append_u64(0)
            .append_bytes(&[1, 2, 3])
            .append_u64(0)
            .append_bytes(&[]);
        assert_eq!(
            Transaction::decode_signing_payload(&list.finish()),
            Err(TypesError::InvalidAddressLength(3))
        );

        // non-zero EIP-155 placeholder
        let mut list = RlpList::new();
        list.append_u64(0)
            .append_u64(0)
            .append_u64(0)
            .append_bytes(&[])
            .append_u64(0)
            .append_bytes(&[])
            .append_u64(1)
            .append_u64(1)
            .append_u64(0);
        assert!(Transaction::decode_signing_payload(&list.finish()).is_err());
    }

    #[test]
    fn test_decode_deeply_nested_input() {
        let levels = 200_000usize;
        let mut bytes = Vec::with_capacity(levels * 4);
        for i in 0..levels {
            let remaining = (levels - i - 1) * 4;
            bytes.push(0xfa);
            bytes.extend_from_slice(&(remaining as u32).to_be_bytes()[1..]);
        }
        assert!(matches!(SignedTransaction::decode(&bytes), Err(TypesError::Rlp(_))));
        assert!(matches!(
            Transaction::decode_signing_payload(&bytes),
            Err(TypesError::Rlp(_))
        ));
    }

    #[test]
    fn test_transaction_display() {
        let tx = transfer(3, 1).with_chain_id(5);
        let shown = tx.to_string();
        assert!(shown.contains("nonce: 3"));
        assert!(shown.contains("0x3535353535353535353535353535353535353535"));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn signing_payload_decodes_to_same_transaction(
                nonce in 0u64..u64::MAX,
                gas_price in any::<u128>(),
                gas_limit in any::<u64>(),
                to in proptest::option::of(any::<[u8; 20]>()),
                value in any::<u128>(),
                data in proptest::collection::vec(any::<u8>(), 0..200),
                chain_id in proptest::option::of(0u64..1_000_000_000),
            ) {
                let tx = Transaction {
                    nonce,
                    gas_price,
                    gas_limit,
                    to: to.map(Address::from_bytes),
                    value,
                    data,
                    chain_id,
                };
                let payload = tx.signing_payload().unwrap();
                prop_assert_eq!(Transaction::decode_signing_payload(&payload).unwrap(), tx);
            }
        }
    }
}
