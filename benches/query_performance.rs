//! Performance benchmarks for session queries and admission decisions

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use parlor_lobby::lobby::{FilterOp, QueryField, QueryFilter, QueryOrder, SessionQuery};
use parlor_lobby::session::{MemberRecord, SessionRecord};
use parlor_lobby::transport::{decide, AdmissionPolicy};
use parlor_lobby::types::{Attributes, DataObject, LocalPlayer};

const MODES: [&str; 3] = ["CaptureTheFlag", "Deathmatch", "KingOfTheHill"];
const MAPS: [&str; 4] = ["Dust", "Canyon", "Harbor", "Summit"];

fn create_records(count: usize) -> Vec<SessionRecord> {
    (0..count)
        .map(|i| {
            let mut data = Attributes::new();
            data.insert("GameMode".to_string(), DataObject::public(MODES[i % MODES.len()]));
            data.insert("Map".to_string(), DataObject::public(MAPS[i % MAPS.len()]));
            data.insert("Skill".to_string(), DataObject::public((i % 50).to_string()));

            let mut builder = SessionRecord::builder(format!("session-{}", i), format!("Lobby {}", i), 8)
                .join_code(format!("CODE{:02}", i % 100))
                .data(data);
            for m in 0..(i % 8) {
                let player = LocalPlayer::new(format!("p{}-{}", i, m), format!("Player {}", m));
                builder = builder.member(MemberRecord::for_player(&player).unwrap());
            }
            builder.build().unwrap()
        })
        .collect()
}

fn bench_query_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_query");

    for size in [100usize, 1_000, 10_000] {
        let records = create_records(size);

        let default_query = SessionQuery::default();
        group.bench_with_input(BenchmarkId::new("default", size), &records, |b, records| {
            b.iter(|| black_box(default_query.apply(records.iter())))
        });

        let filtered = SessionQuery::default()
            .filter(QueryFilter::attribute_eq("GameMode", "CaptureTheFlag"))
            .filter(QueryFilter::new(
                QueryField::Attribute("Skill".to_string()),
                FilterOp::Ge,
                "20",
            ))
            .order_by(QueryOrder {
                field: QueryField::AvailableSlots,
                ascending: false,
            })
            .count(100);
        group.bench_with_input(BenchmarkId::new("filtered", size), &records, |b, records| {
            b.iter(|| black_box(filtered.apply(records.iter())))
        });
    }

    group.finish();
}

fn bench_admission(c: &mut Criterion) {
    c.bench_function("admission_decide", |b| {
        b.iter(|| {
            for current in 0..16 {
                black_box(decide(black_box(current), black_box(8)));
            }
        })
    });

    let policy = AdmissionPolicy::new(8);
    c.bench_function("admission_policy_evaluate", |b| {
        b.iter(|| black_box(policy.evaluate(black_box(7))))
    });
}

criterion_group!(benches, bench_query_apply, bench_admission);
criterion_main!(benches);
