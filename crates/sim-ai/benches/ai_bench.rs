use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;

fn bench_decisions(c: &mut Criterion) {
    let cfg = sim_core::SimConfig::default();
    let state = sim_core::EconomicState::initial(&cfg, Decimal::new(60_000, 0));
    let agents = sim_ai::populate(&cfg).expect("default config is valid");
    c.bench_function("decide 7 agents", |b| {
        b.iter(|| {
            for agent in &agents {
                let ctx = sim_ai::DecisionContext {
                    turn: 1,
                    config: &cfg,
                    state: &state,
                    debt: Decimal::ZERO,
                    arrears: Decimal::ZERO,
                    demand_noise: 1.0,
                };
                let _ = black_box(agent.decide(&ctx));
            }
        })
    });
}

criterion_group!(benches, bench_decisions);
criterion_main!(benches);
