use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use sim_core::SimConfig;
use sim_runtime::{Game, SimContext, TurnManager};

fn bench_turns(c: &mut Criterion) {
    let ctx = SimContext::new(SimConfig::default()).unwrap();
    let mut manager = TurnManager::new();
    c.bench_function("run_turn", |b| {
        b.iter(|| {
            let _ = manager.run_turn(&ctx);
        })
    });
    c.bench_function("advance_12_turns", |b| {
        b.iter_batched(
            || Game::start_game(SimConfig::default()).unwrap(),
            |game| {
                for _ in 0..12 {
                    let _ = game.advance_turn();
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_turns);
criterion_main!(benches);
