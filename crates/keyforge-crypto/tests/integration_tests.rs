//! Integration tests for keyforge
//!
//! End-to-end flows from mnemonic to signed transaction and keystore.

use keyforge_crypto::{
    decrypt, encrypt, recover_sender, CryptoError, DerivationPath, HDNode, Kdf, KeystoreDocument,
    KeystoreOptions, Mnemonic, Wallet,
};
use keyforge_types::{Address, SignedTransaction, Transaction, TransactionRequest};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tempfile::TempDir;

const PHRASE: &str =
    "upset fuel enhance depart portion hope core animal innocent will athlete snack";

const GOLDEN_ADDRESSES: [&str; 5] = [
    "0xfDd85780CB96f4712a869aB4d04f9D80c3CeE283",
    "0xBf5CDc23b1aCF7DE1B9aAcA91Dd686Ba1139D6a1",
    "0xe3a0E3164DD4b2a271a6eAA030798e0020106040",
    "0xF7bD603ad265bFFC0a7Ccbe9c789D3E0A819ee97",
    "0x1813b253ef412f344436E16a89350D169cFC9832",
];

fn root() -> HDNode {
    let mnemonic = Mnemonic::parse(PHRASE).unwrap();
    HDNode::from_seed(&mnemonic.to_seed("")).unwrap()
}

#[test]
fn test_golden_addresses() {
    let root = root();
    for (i, expected) in GOLDEN_ADDRESSES.iter().enumerate() {
        let path: DerivationPath = format!("m/44'/60'/0'/0/{}", i).parse().unwrap();
        let node = root.derive_path(&path).unwrap();
        assert_eq!(node.address().to_string(), *expected);
    }
}

#[test]
fn test_account_xpub_derives_same_addresses() {
    let account = root()
        .derive_path(&"m/44'/60'/0'/0".parse().unwrap())
        .unwrap();
    let watch_only = HDNode::from_extended_key(&account.to_xpub()).unwrap();
    assert!(!watch_only.has_private_key());

    for (i, expected) in GOLDEN_ADDRESSES.iter().enumerate() {
        let child = watch_only.derive_child_index(i as u32, false).unwrap();
        assert_eq!(child.address().to_string(), *expected);
    }
    assert_eq!(
        watch_only.derive_child_index(0, true).unwrap_err(),
        CryptoError::HardenedDerivationRequiresPrivateKey { index: 0 }
    );
}

#[test]
fn test_request_to_signed_transaction() {
    let wallet = Wallet::from_phrase(PHRASE, "", DerivationPath::ethereum(0).unwrap()).unwrap();
    let request: TransactionRequest = serde_json::from_str(
        r#"{
            "nonce": "0x0",
            "gasPrice": "2000000000",
            "gas": 21000,
            "to": "0x3535353535353535353535353535353535353535",
            "value": "0xde0b6b3a7640000",
            "chainId": 1
        }"#,
    )
    .unwrap();
    let tx = Transaction::try_from(request).unwrap();
    assert_eq!(
        hex::encode(tx.signing_payload().unwrap()),
        "eb808477359400825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
    );

    let signed = wallet.sign_transaction(&tx).unwrap();
    let decoded = SignedTransaction::decode(&signed.encode()).unwrap();
    assert_eq!(decoded.tx(), &tx);
    assert_eq!(recover_sender(&decoded).unwrap(), wallet.address());
}

#[test]
fn test_keystore_file_flow() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("account.json");
    let mut rng = ChaCha20Rng::seed_from_u64(11);

    let wallet = Wallet::generate(24, &mut rng).unwrap();
    let options = KeystoreOptions {
        kdf: Kdf::Scrypt {
            log_n: 6,
            r: 8,
            p: 1,
        },
        ..KeystoreOptions::default()
    };
    encrypt(&wallet, "s3cret", &options, &mut rng)
        .unwrap()
        .save(&path)
        .unwrap();

    let doc = KeystoreDocument::load(&path).unwrap();
    assert_eq!(doc.address(), Some(wallet.address()));
    let restored = decrypt(&doc, "s3cret").unwrap();
    assert_eq!(restored, wallet);
    assert_eq!(
        decrypt(&doc, "S3cret").unwrap_err(),
        CryptoError::AuthenticationFailed
    );

    let tx = Transaction::new(0, 1, 21000, Some(Address::ZERO), 0).with_chain_id(5);
    assert_eq!(
        restored.sign_transaction(&tx).unwrap(),
        wallet.sign_transaction(&tx).unwrap()
    );
}
