//! Cookie envelope benchmarks for armature-hybrid-session

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use armature_hybrid_session::codec;
use armature_hybrid_session::crypto::derive_key;
use armature_hybrid_session::{CookieEnvelope, SecretKey, SessionCipher, hash_session_id};

const NOW: i64 = 1_268_654_400;

fn key_derivation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_derivation");

    group.bench_function("pbkdf2_sha256", |b| {
        b.iter(|| derive_key(black_box(b"site-secret"), black_box(b"abc123")));
    });

    group.bench_function("hash_session_id", |b| {
        b.iter(|| hash_session_id(black_box("abc123")));
    });

    group.finish();
}

fn envelope_benchmark(c: &mut Criterion) {
    let cipher = SessionCipher::new(&SecretKey::from("site-secret"), "abc123");
    let envelope = CookieEnvelope::default();

    let mut group = c.benchmark_group("cookie_envelope");

    for size in [16usize, 256, 700] {
        let data = vec![b'x'; size];
        let sealed = envelope.seal(&cipher, NOW + 1440, &data).unwrap();

        group.bench_with_input(BenchmarkId::new("seal", size), &data, |b, data| {
            b.iter(|| envelope.seal(&cipher, black_box(NOW + 1440), black_box(data)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("open", size), &sealed, |b, sealed| {
            b.iter(|| envelope.open(&cipher, black_box(sealed), black_box(NOW)).unwrap());
        });
    }

    group.finish();
}

fn codec_benchmark(c: &mut Criterion) {
    let data = vec![0xA5u8; 4096];
    let encoded = codec::encode(&data);

    let mut group = c.benchmark_group("database_codec");

    group.bench_function("encode_4k", |b| {
        b.iter(|| codec::encode(black_box(&data)));
    });

    group.bench_function("decode_4k", |b| {
        b.iter(|| codec::decode(black_box(&encoded)));
    });

    group.finish();
}

criterion_group!(benches, key_derivation_benchmark, envelope_benchmark, codec_benchmark);
criterion_main!(benches);
