//! Benchmarks for forward scoring and EM training.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stochastic_edit::prelude::*;

fn name_corpus(alphabet: &mut CharacterAlphabet) -> Vec<TrainingPair> {
    const NAMES: &[(&str, &str)] = &[
        ("katherine", "kathryn"),
        ("jonathan", "jon"),
        ("smith", "smyth"),
        ("elizabeth", "elisabeth"),
        ("mohammed", "muhammad"),
        ("stephen", "steven"),
        ("alexander", "aleksandr"),
        ("margaret", "margarete"),
    ];
    NAMES
        .iter()
        .map(|(canonical, surface)| {
            let x = AlignedString::new(canonical, alphabet).unwrap();
            let y = AlignedString::new(surface, alphabet).unwrap();
            TrainingPair::new(Some(x), y)
        })
        .collect()
}

fn bench_logp(c: &mut Criterion) {
    let mut alphabet = CharacterAlphabet::new();
    let corpus = name_corpus(&mut alphabet);
    alphabet.freeze();
    let mut model = BackoffEditModel::for_alphabet(&alphabet);
    for _ in 0..5 {
        model.em_step(&corpus);
    }

    c.bench_function("logp/katherine-kathryn", |b| {
        let pair = &corpus[0];
        b.iter(|| black_box(model.logp(pair.input.as_ref(), &pair.output)))
    });

    c.bench_function("logp_batch/8-names", |b| {
        b.iter(|| black_box(model.logp_batch(&corpus)))
    });
}

fn bench_em_step(c: &mut Criterion) {
    let mut alphabet = CharacterAlphabet::new();
    let corpus = name_corpus(&mut alphabet);
    alphabet.freeze();

    c.bench_function("em_step/8-names", |b| {
        b.iter_batched(
            || BackoffEditModel::for_alphabet(&alphabet),
            |mut model| black_box(model.em_step(&corpus)),
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_logp, bench_em_step);
criterion_main!(benches);
