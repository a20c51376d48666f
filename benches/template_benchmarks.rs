use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use symhsm::{
    hsm::SoftToken,
    key_management::{build_template, KeyLifecycleManager, KeyType, LifecycleConfig, VendorProfile},
};

fn template_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("template");

    for profile in [VendorProfile::Reference, VendorProfile::NCipher].iter() {
        for key_type in KeyType::SUPPORTED.iter() {
            group.bench_with_input(
                BenchmarkId::new(format!("build_{}", profile), key_type.name()),
                key_type,
                |b, key_type| b.iter(|| build_template("bench-key", 32, key_type, *profile, None)),
            );
        }
    }

    group.finish();
}

fn lifecycle_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("soft_token");

    let manager = KeyLifecycleManager::new(SoftToken::default(), LifecycleConfig::default()).unwrap();
    let key = manager.generate_key("bench", 32, &KeyType::Aes).unwrap();
    let mac_key = manager
        .generate_key("bench-mac", 48, &KeyType::GenericSecret)
        .unwrap();

    for size in [64usize, 1024, 16384].iter() {
        let plaintext = vec![0x5a; *size];
        let sealed = manager.cipher().encrypt(key, &plaintext).unwrap();

        group.bench_with_input(BenchmarkId::new("aes_gcm_encrypt", size), size, |b, _| {
            b.iter(|| manager.cipher().encrypt(key, &plaintext))
        });
        group.bench_with_input(BenchmarkId::new("aes_gcm_decrypt", size), size, |b, _| {
            b.iter(|| manager.cipher().decrypt(key, &sealed.combined, &sealed.iv))
        });
        group.bench_with_input(BenchmarkId::new("hmac_sha384", size), size, |b, _| {
            b.iter(|| manager.signer().sign_hmac_sha384(mac_key, &plaintext))
        });
    }

    group.finish();
}

criterion_group!(benches, template_benchmarks, lifecycle_benchmarks);
criterion_main!(benches);
