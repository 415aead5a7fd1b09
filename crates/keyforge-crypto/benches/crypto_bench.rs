use criterion::{black_box, criterion_group, criterion_main, Criterion};
use keyforge_crypto::{DerivationPath, HDNode, Mnemonic};
use keyforge_types::{Address, Transaction};

const PHRASE: &str =
    "upset fuel enhance depart portion hope core animal innocent will athlete snack";

fn bench_derivation(c: &mut Criterion) {
    let mnemonic = Mnemonic::parse(PHRASE).unwrap();
    let seed = mnemonic.to_seed("");
    let root = HDNode::from_seed(&seed).unwrap();
    let path = DerivationPath::ethereum(0).unwrap();

    c.bench_function("mnemonic_to_seed", |b| {
        b.iter(|| black_box(&mnemonic).to_seed(""))
    });
    c.bench_function("derive_bip44_account", |b| {
        b.iter(|| root.derive_path(black_box(&path)).unwrap())
    });
}

fn bench_signing(c: &mut Criterion) {
    let node = HDNode::from_private_key(&[0x46; 32]).unwrap();
    let tx = Transaction::new(
        9,
        20_000_000_000,
        21000,
        Some(Address::from_bytes([0x35; 20])),
        1_000_000_000_000_000_000,
    )
    .with_chain_id(1);

    c.bench_function("sign_transaction", |b| {
        b.iter(|| keyforge_crypto::sign_transaction(&node, black_box(&tx)).unwrap())
    });

    let signed = keyforge_crypto::sign_transaction(&node, &tx).unwrap();
    c.bench_function("recover_sender", |b| {
        b.iter(|| keyforge_crypto::recover_sender(black_box(&signed)).unwrap())
    });
}

criterion_group!(benches, bench_derivation, bench_signing);
criterion_main!(benches);
