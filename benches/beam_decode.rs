use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use cuedec::config::DecoderConfig;
use cuedec::decoder::CtcDecoder;
use cuedec::dict::{Lexicon, TokenDictionary};
use cuedec::lm::UniformLm;
use cuedec::model::Logits;
use std::sync::Arc;

/// Build a decoder over a small French-like lexicon.
fn build_decoder(beam_size: usize) -> CtcDecoder {
    let tokens = TokenDictionary::from_tokens(
        ["a", "b", "d", "e", "i", "o~", "r", "s", "u", "z^", "_"]
            .iter()
            .map(|s| s.to_string()),
    );
    let lexicon = Lexicon::from_entries(vec![
        ("bonjour", vec!["b", "o~", "z^", "u", "r"]),
        ("bas", vec!["b", "a"]),
        ("bus", vec!["b", "u", "s"]),
        ("dire", vec!["d", "i", "r"]),
        ("assis", vec!["a", "s", "i"]),
        ("rousse", vec!["r", "u", "s"]),
    ]);

    let mut config = DecoderConfig::default();
    config.beam_size = beam_size;

    CtcDecoder::from_parts(
        &config,
        tokens,
        &lexicon,
        Arc::new(UniformLm::new(-2.0)),
    )
    .expect("decoder construction")
}

/// Synthesize peaked logits cycling through "bonjour" with blanks.
fn synth_logits(decoder: &CtcDecoder, steps: usize) -> Logits {
    let vocab = decoder.vocab_size();
    let spelling: Vec<usize> = ["b", "o~", "z^", "u", "r"]
        .iter()
        .map(|t| decoder.token_to_idx(t).unwrap())
        .collect();

    let mut data = vec![0.0f32; steps * vocab];
    for t in 0..steps {
        let phase = t % 60;
        let label = if phase >= 50 {
            0
        } else {
            spelling[phase / 10]
        };
        data[t * vocab + label] = 6.0;
    }
    Logits::new(data, steps, vocab)
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("beam_decode");

    for &beam_size in &[10usize, 40, 160] {
        let decoder = build_decoder(beam_size);
        let logits = synth_logits(&decoder, 250);

        group.bench_with_input(
            BenchmarkId::new("steps_250", beam_size),
            &beam_size,
            |b, _| {
                b.iter(|| {
                    let hyps = decoder.decode(black_box(&logits));
                    black_box(hyps)
                })
            },
        );
    }

    group.finish();
}

fn bench_log_softmax(c: &mut Criterion) {
    let decoder = build_decoder(40);
    let logits = synth_logits(&decoder, 500);

    c.bench_function("log_softmax_500", |b| {
        b.iter(|| black_box(&logits).log_softmax())
    });
}

criterion_group!(benches, bench_decode, bench_log_softmax);
criterion_main!(benches);
