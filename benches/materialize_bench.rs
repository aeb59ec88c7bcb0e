use alloy_primitives::{Address, U256};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use feed_indexer::{Entity, Metadata, SortOrder, ViewOptions, materialize};

fn create_entities(count: u64) -> Vec<Entity> {
    (0..count)
        .map(|id| {
            let owner = Address::repeat_byte((id % 7) as u8);
            let mut entity = Entity::optimistic(U256::from(id), owner, format!("ipfs://Qm/{id}.json"))
                .with_metadata(Metadata {
                    name: format!("Piece {id}"),
                    ..Metadata::default()
                });
            entity.optimistic = false;
            entity.kind = "Minted".to_string();
            entity.block_number = 1_000_000 + id;
            entity.timestamp = 1_700_000_000 + id;
            entity
        })
        .collect()
}

fn materialize_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");

    for count in [100u64, 1_000, 10_000] {
        let confirmed = create_entities(count);
        let optimistic: Vec<Entity> = (count..count + 5)
            .map(|id| Entity::optimistic(U256::from(id), Address::repeat_byte(1), ""))
            .collect();

        group.bench_with_input(BenchmarkId::new("newest", count), &count, |b, _| {
            let options = ViewOptions::default();
            b.iter(|| materialize(black_box(&confirmed), black_box(&optimistic), &options));
        });

        group.bench_with_input(BenchmarkId::new("search_by_id", count), &count, |b, _| {
            let options = ViewOptions::default().search("#42").sort(SortOrder::ById);
            b.iter(|| materialize(black_box(&confirmed), black_box(&optimistic), &options));
        });

        group.bench_with_input(BenchmarkId::new("owned_by", count), &count, |b, _| {
            let options = ViewOptions::default().owned_by(Address::repeat_byte(3));
            b.iter(|| materialize(black_box(&confirmed), black_box(&optimistic), &options));
        });
    }

    group.finish();
}

criterion_group!(benches, materialize_benchmark);
criterion_main!(benches);
