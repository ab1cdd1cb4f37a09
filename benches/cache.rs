use avvai_lookup::{CacheRecord, CacheStore, DictionaryEntry, MAX_ENTRIES, MemoryStorage, normalize};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn entry(i: usize) -> DictionaryEntry {
    DictionaryEntry {
        word: format!("word{i}"),
        definition: format!("definition number {i}"),
        examples: vec![format!("example sentence {i}")],
    }
}

fn full_store() -> CacheStore {
    let store = CacheStore::new(MemoryStorage::new("bench"));
    for i in 0..MAX_ENTRIES {
        store.put(&format!("word{i}"), CacheRecord::new(Some(entry(i)), i as u64));
    }
    store
}

fn bench_put_at_capacity(c: &mut Criterion) {
    let store = full_store();
    let mut next = MAX_ENTRIES;
    c.bench_function("cache::put_evict_persist", |b| {
        b.iter(|| {
            store.put(
                &format!("word{next}"),
                CacheRecord::new(Some(entry(next)), next as u64),
            );
            next += 1;
        });
    });
}

fn bench_get(c: &mut Criterion) {
    let store = full_store();
    for word in ["word0", "Word250!", "missing"] {
        c.bench_with_input(BenchmarkId::new("cache::get", word), &word, |b, &word| {
            b.iter(|| black_box(store.get(word)));
        });
    }
}

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize::tamil_token", |b| {
        b.iter(|| black_box(normalize(black_box("  “குறிஞ்சிப்பூ”, "))));
    });
}

criterion_group!(benches, bench_put_at_capacity, bench_get, bench_normalize);
criterion_main!(benches);
