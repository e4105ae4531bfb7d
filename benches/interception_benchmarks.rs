use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use stratum_core::error::TransactionResult;
use stratum_core::ordering::{order, Prioritized, Priority};
use stratum_core::test_helpers::RecordingReactiveManager;
use stratum_core::transaction::{
    AttributeSource, MethodId, NameMatchAttributeSource, PlatformTransactionManager, TransactionAttribute,
    TransactionInterceptor, TransactionManager, TransactionStatus,
};

/// Manager that does no bookkeeping, so only interception overhead is measured
struct NoopManager;

impl PlatformTransactionManager for NoopManager {
    fn get_transaction(&self, attribute: &TransactionAttribute) -> TransactionResult<Arc<TransactionStatus>> {
        Ok(Arc::new(TransactionStatus::new(attribute.display_name(), true, attribute.read_only)))
    }

    fn commit(&self, _status: &Arc<TransactionStatus>) -> TransactionResult<()> {
        Ok(())
    }

    fn rollback(&self, _status: &Arc<TransactionStatus>) -> TransactionResult<()> {
        Ok(())
    }
}

fn source() -> Arc<dyn AttributeSource> {
    Arc::new(NameMatchAttributeSource::new().with_method("save*", TransactionAttribute::new()))
}

fn benchmark_ordering_policy(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordering_policy");
    for size in [16_usize, 256, 4096] {
        let items: Vec<(String, Priority)> = (0..size)
            .map(|i| {
                let priority = match i % 3 {
                    0 => Priority::PriorityOrdered((i % 17) as i32),
                    1 => Priority::Ordered((i % 11) as i32),
                    _ => Priority::Unordered,
                };
                (format!("processor-{i}"), priority)
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &items, |b, items| {
            b.iter(|| {
                let entries = items
                    .iter()
                    .map(|(name, priority)| Prioritized::new(name.as_str(), *priority, ()));
                black_box(order(entries))
            })
        });
    }
    group.finish();
}

fn benchmark_blocking_invocation(c: &mut Criterion) {
    let interceptor = TransactionInterceptor::builder()
        .attribute_source(source())
        .manager(TransactionManager::platform(NoopManager))
        .build()
        .expect("valid interceptor configuration");
    let transactional = MethodId::new("bench.Repository", "saveEntity");
    let plain = MethodId::new("bench.Repository", "findEntity");

    c.bench_function("invoke_within_transaction", |b| {
        b.iter(|| interceptor.invoke_within_transaction(black_box(&transactional), None, || Ok(black_box(1_u64))))
    });
    c.bench_function("invoke_without_attribute", |b| {
        b.iter(|| interceptor.invoke_within_transaction(black_box(&plain), None, || Ok(black_box(1_u64))))
    });
}

fn benchmark_async_invocation(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");
    let interceptor = TransactionInterceptor::builder()
        .attribute_source(source())
        .manager(TransactionManager::reactive(RecordingReactiveManager::new()))
        .build()
        .expect("valid interceptor configuration");
    let method = MethodId::new("bench.Repository", "saveEntity");

    c.bench_function("invoke_within_transaction_async", |b| {
        b.iter(|| {
            runtime.block_on(interceptor.invoke_within_transaction_async(&method, None, async {
                Ok(black_box(1_u64))
            }))
        })
    });
}

criterion_group!(
    benches,
    benchmark_ordering_policy,
    benchmark_blocking_invocation,
    benchmark_async_invocation
);
criterion_main!(benches);
