use capstan_controller::{ModelController, ResourceDefinition, ResourceDefinitionRegistry};
use capstan_domain::{AddressPattern, CompositeRequest, Operation, PathAddress};
use capstan_event_bus::EventBus;
use capstan_model::{AttributeDefinition, ResourceSchema};
use capstan_services::ServiceRegistry;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

fn controller() -> ModelController {
    let mut definitions = ResourceDefinitionRegistry::new();
    definitions.register(AddressPattern::subsystem("elytron"), ResourceDefinition::new(ResourceSchema::new()));
    definitions.register(
        AddressPattern::subsystem("elytron").any("properties-realm"),
        ResourceDefinition::new(
            ResourceSchema::new()
                .attribute(AttributeDefinition::string("path").required().length(1, 256))
                .attribute(AttributeDefinition::string("groups-attribute").default_value("groups")),
        ),
    );
    ModelController::new(definitions, ServiceRegistry::new(), EventBus::new())
}

fn realms(count: usize) -> CompositeRequest {
    (0..count)
        .map(|i| {
            Operation::add(
                PathAddress::subsystem("elytron").append("properties-realm", format!("realm-{i}")),
                [("path", format!("realm-{i}.properties"))],
            )
        })
        .collect()
}

// ============================================================================
// Benchmark: Add + Cascading Remove
// ============================================================================

fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite_commit");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let controller = controller();
    rt.block_on(controller.execute(Operation::add(PathAddress::subsystem("elytron"), Vec::<(String, String)>::new()).into()))
        .unwrap();

    for count in [1usize, 16, 128] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("add_then_remove", count), &count, |b, &count| {
            b.to_async(&rt).iter(|| async {
                black_box(controller.execute(realms(count)).await.unwrap());
                let teardown: CompositeRequest = (0..count)
                    .map(|i| {
                        Operation::remove(
                            PathAddress::subsystem("elytron").append("properties-realm", format!("realm-{i}")),
                        )
                    })
                    .collect();
                black_box(controller.execute(teardown).await.unwrap());
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Rollback
// ============================================================================

fn bench_rollback(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite_rollback");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let controller = controller();
    rt.block_on(controller.execute(Operation::add(PathAddress::subsystem("elytron"), Vec::<(String, String)>::new()).into()))
        .unwrap();

    for count in [1usize, 16, 128] {
        let failing = realms(count).step(Operation::add(PathAddress::subsystem("elytron"), Vec::<(String, String)>::new()));
        group.bench_with_input(BenchmarkId::new("fail_last_step", count), &failing, |b, failing| {
            b.to_async(&rt).iter(|| async {
                black_box(controller.execute(failing.clone()).await.unwrap_err());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_commit, bench_rollback);
criterion_main!(benches);
