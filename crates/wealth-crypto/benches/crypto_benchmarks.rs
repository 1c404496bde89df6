//! Benchmarks for wealth-crypto

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use wealth_crypto::{
    domain_salt, Aead, AeadCipher, DerivedKey, KdfHash, KdfParams, KeyDerivationService,
    KeyDomain, Nonce, SecretString, KEY_SIZE,
};

fn bench_kdf(c: &mut Criterion) {
    let mut group = c.benchmark_group("kdf");
    group.sample_size(10);
    let credential = SecretString::from("session-token");
    let salt = domain_salt("wealth", KeyDomain::File, "default");

    for hash in [KdfHash::Sha256, KdfHash::Sha512] {
        let service = KeyDerivationService::new(KdfParams::default().with_hash(hash));
        group.bench_function(BenchmarkId::new("pbkdf2-100k", hash.name()), |b| {
            b.iter(|| service.derive_key(&credential, &salt).unwrap())
        });
    }

    group.finish();
}

fn bench_symmetric(c: &mut Criterion) {
    let mut group = c.benchmark_group("symmetric");
    let key = DerivedKey::from_bytes(&[7u8; KEY_SIZE]);

    for cipher in [AeadCipher::Aes256Gcm, AeadCipher::ChaCha20Poly1305] {
        let aead = Aead::new(&key, cipher).unwrap();

        for size in [1024, 64 * 1024, 1024 * 1024].iter() {
            let data = vec![0u8; *size];
            group.throughput(Throughput::Bytes(*size as u64));

            group.bench_with_input(
                BenchmarkId::new(format!("{}-encrypt", cipher), size),
                &data,
                |b, data| b.iter(|| aead.encrypt(&Nonce::generate(), data, b"meta").unwrap()),
            );

            let nonce = Nonce::generate();
            let ciphertext = aead.encrypt(&nonce, &data, b"meta").unwrap();
            group.bench_with_input(
                BenchmarkId::new(format!("{}-decrypt", cipher), size),
                &ciphertext,
                |b, ciphertext| b.iter(|| aead.decrypt(&nonce, ciphertext, b"meta").unwrap()),
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_kdf, bench_symmetric);
criterion_main!(benches);
