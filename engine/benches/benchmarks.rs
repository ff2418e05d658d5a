//! Performance benchmarks for dompet-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dompet_engine::{
    decode_operation, encode_operation, DrainCursor, EntityType, Outcome, PendingOperation,
    PendingQueue, Schema,
};
use serde_json::json;

fn expense(n: u64, target: u64) -> PendingOperation {
    PendingOperation::create(
        format!("op-{}", n),
        "user-1",
        EntityType::Expense,
        format!("exp-{}", target),
        json!({"description": format!("Expense {}", n), "amount": 1000 + n}),
        1000 + n,
    )
}

fn filled_queue(size: u64) -> PendingQueue {
    let mut queue = PendingQueue::new();
    for i in 0..size {
        queue.enqueue(expense(i, i));
    }
    queue
}

fn bench_queue_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_operations");

    group.bench_function("enqueue", |b| {
        let mut queue = PendingQueue::new();
        let mut id = 0u64;

        b.iter(|| {
            id += 1;
            queue.enqueue(black_box(expense(id, id)))
        })
    });

    group.bench_function("count_1000", |b| {
        let queue = filled_queue(1000);
        b.iter(|| queue.count(black_box("user-1")))
    });

    // A delete has to scan the user's queue for its target
    for size in [10u64, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("enqueue_delete", size),
            size,
            |b, &size| {
                b.iter_batched(
                    || filled_queue(size),
                    |mut queue| {
                        let delete = PendingOperation::delete(
                            "op-delete",
                            "user-1",
                            EntityType::Expense,
                            format!("exp-{}", size / 2),
                            5000,
                        );
                        queue.enqueue(black_box(delete))
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain");

    for size in [10u64, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::new("cursor_walk", size), size, |b, &size| {
            let queue = filled_queue(size);
            let snapshot = queue.list("user-1").to_vec();

            b.iter(|| {
                let mut cursor = DrainCursor::new(&snapshot);
                for (i, op) in snapshot.iter().enumerate() {
                    cursor.admit(op);
                    let outcome = if i % 7 == 0 {
                        Outcome::permanent("rejected")
                    } else {
                        Outcome::Applied
                    };
                    cursor.record(op, outcome);
                }
                cursor.finish()
            })
        });
    }

    group.finish();
}

fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation");
    let schema = Schema::finance();

    group.bench_function("validate_create", |b| {
        let op = expense(1, 1);
        b.iter(|| schema.validate_operation(black_box(&op)))
    });

    group.bench_function("validate_installment", |b| {
        let op = PendingOperation::create(
            "op-1",
            "user-1",
            EntityType::Installment,
            "inst-1",
            json!({
                "description": "Laptop",
                "totalAmount": 12000000,
                "months": 12,
                "paidMonths": 3,
                "startDate": "2026-01-01"
            }),
            1000,
        );
        b.iter(|| schema.validate_operation(black_box(&op)))
    });

    group.finish();
}

fn bench_persist(c: &mut Criterion) {
    let mut group = c.benchmark_group("persist");
    let op = expense(1, 1);

    group.bench_function("encode", |b| b.iter(|| encode_operation(black_box(&op))));

    group.bench_function("decode", |b| {
        let raw = encode_operation(&op).unwrap();
        b.iter(|| decode_operation(black_box(&raw), 1))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_queue_operations,
    bench_drain,
    bench_validation,
    bench_persist
);
criterion_main!(benches);
