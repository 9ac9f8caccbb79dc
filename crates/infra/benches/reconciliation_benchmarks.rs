use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::NaiveDate;
use std::sync::Arc;
use stockflow_core::{ActorId, RequestContext};
use stockflow_infra::{InMemoryInventoryStore, InventoryQueries, ReconciliationEngine};
use stockflow_inventory::{ItemDetails, ItemId, MovementEdit, NewItem, RecordInbound, RecordOutbound};
use tokio::runtime::{Builder, Runtime};

type Engine = ReconciliationEngine<Arc<InMemoryInventoryStore>>;

fn runtime() -> Runtime {
    Builder::new_current_thread()
        .build()
        .expect("tokio runtime")
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date")
}

fn seeded_item(rt: &Runtime, engine: &Engine, ctx: &RequestContext, opening: i64) -> ItemId {
    rt.block_on(engine.create_item(
        ctx,
        NewItem {
            details: ItemDetails::new("bench item", "benchmark stock"),
            opening_quantity: opening,
        },
    ))
    .expect("create item")
    .item
    .id_typed()
}

fn bench_movement_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_latency");
    group.sample_size(500);

    let rt = runtime();
    let ctx = RequestContext::new(ActorId::new());

    group.bench_function("inbound_then_outbound", |b| {
        let engine = Engine::new(Arc::new(InMemoryInventoryStore::new()));
        let item = seeded_item(&rt, &engine, &ctx, 0);
        b.iter(|| {
            rt.block_on(async {
                engine
                    .create_inbound(
                        &ctx,
                        RecordInbound {
                            item_id: item,
                            date: date(),
                            quantity: 5,
                            note: String::new(),
                        },
                    )
                    .await
                    .expect("inbound");
                let receipt = engine
                    .create_outbound(
                        &ctx,
                        RecordOutbound {
                            item_id: item,
                            date: date(),
                            quantity: 5,
                            recipient: "bench".to_string(),
                        },
                    )
                    .await
                    .expect("outbound");
                black_box(receipt)
            })
        });
    });

    group.bench_function("edit_across_items", |b| {
        let engine = Engine::new(Arc::new(InMemoryInventoryStore::new()));
        let x = seeded_item(&rt, &engine, &ctx, 1_000);
        let y = seeded_item(&rt, &engine, &ctx, 1_000);
        let movement = rt
            .block_on(engine.create_outbound(
                &ctx,
                RecordOutbound {
                    item_id: x,
                    date: date(),
                    quantity: 1,
                    recipient: "bench".to_string(),
                },
            ))
            .expect("outbound")
            .movement_id;
        let mut target = y;
        b.iter(|| {
            target = if target == x { y } else { x };
            let edit = MovementEdit {
                item_id: target,
                date: date(),
                quantity: 1,
                note: None,
                recipient: None,
            };
            black_box(rt.block_on(engine.edit_movement(&ctx, movement, edit)).expect("edit"))
        });
    });

    group.finish();
}

fn bench_consistency_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("consistency_report");
    let rt = runtime();
    let ctx = RequestContext::new(ActorId::new());

    for movements in [100usize, 1_000, 10_000].iter() {
        let store = Arc::new(InMemoryInventoryStore::new());
        let engine = Engine::new(Arc::clone(&store));
        let items: Vec<ItemId> = (0..10).map(|_| seeded_item(&rt, &engine, &ctx, 0)).collect();
        for n in 0..*movements {
            rt.block_on(engine.create_inbound(
                &ctx,
                RecordInbound {
                    item_id: items[n % items.len()],
                    date: date(),
                    quantity: 1,
                    note: String::new(),
                },
            ))
            .expect("inbound");
        }
        let queries = InventoryQueries::new(store);

        group.throughput(Throughput::Elements(*movements as u64));
        group.bench_with_input(BenchmarkId::from_parameter(movements), movements, |b, _| {
            b.iter(|| {
                let report = rt.block_on(queries.consistency_report()).expect("report");
                black_box(report.is_consistent())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_movement_latency, bench_consistency_report);
criterion_main!(benches);
