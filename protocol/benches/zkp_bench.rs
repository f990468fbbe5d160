// Zero-knowledge proof benchmarks for PRISM.
//
// Benchmarks the Groth16 circuit setup, proof generation and verification
// for the solvency circuit over BN254, driven through the async backend the
// way the prover drives it.

use criterion::{criterion_group, criterion_main, Criterion};
use primitive_types::U256;
use tokio::runtime::Runtime;

use prism_protocol::identity::Address;
use prism_protocol::zkp::{Groth16Backend, PrivateInputs, ProvingBackend, PublicInputs};

fn claim() -> (PrivateInputs, PublicInputs) {
    let private = PrivateInputs {
        value: U256::from(500_000_000_000u64),
    };
    let public = PublicInputs {
        threshold: U256::from(10_000_000_000u64),
        is_solvent: true,
        context: Some(Address::from_bytes([7; 32])),
    };
    (private, public)
}

fn loaded_backend(rt: &Runtime) -> Groth16Backend {
    let backend = Groth16Backend::with_seed(42);
    rt.block_on(backend.load_circuit()).unwrap();
    backend
}

fn bench_groth16_setup(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("zkp");
    group.sample_size(10);
    group.bench_function("groth16_setup", |b| {
        b.iter(|| {
            let backend = Groth16Backend::with_seed(42);
            rt.block_on(backend.load_circuit()).unwrap();
        });
    });
    group.finish();
}

fn bench_groth16_prove(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let backend = loaded_backend(&rt);
    let (private, public) = claim();

    let mut group = c.benchmark_group("zkp");
    group.sample_size(10);
    group.bench_function("groth16_prove", |b| {
        b.iter(|| rt.block_on(backend.prove(&private, &public)).unwrap());
    });
    group.finish();
}

fn bench_groth16_verify(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let backend = loaded_backend(&rt);
    let (private, public) = claim();
    let proof = rt.block_on(backend.prove(&private, &public)).unwrap();

    c.bench_function("zkp/groth16_verify", |b| {
        b.iter(|| rt.block_on(backend.verify(&proof, &public)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_groth16_setup,
    bench_groth16_prove,
    bench_groth16_verify,
);
criterion_main!(benches);
