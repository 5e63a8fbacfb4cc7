use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use relay_xhr::HttpMethod;
use relay_xhr::runtime::fetch::request::Descriptor;
use relay_xhr::runtime::headers::RequestHeaders;
use relay_xhr::runtime::registry::{Registry, Token, random_candidate};
use std::rc::Rc;
use url::Url;

fn bench_descriptor(c: &mut Criterion) {
    let mut group = c.benchmark_group("Descriptor");

    let endpoint = Url::parse("https://relay.test/proxy.js").unwrap();
    let target = Url::parse("https://api.test/search?q=rust&page=2").unwrap();
    let object = Token::new(123_456_789).object_ref();

    let mut headers = RequestHeaders::new();
    headers.append("Accept", "application/json");
    headers.append("X-Requested-With", "relay");
    headers.append("Content-Type", "text/plain; charset=UTF-8");

    // Different body sizes
    let sizes = vec![("empty", 0), ("1KB", 1024), ("10KB", 10 * 1024)];

    for (name, size) in sizes {
        let body = "a&b=c ".repeat(size / 6);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::new("to_url", name), &body, |b, body| {
            b.iter(|| {
                Descriptor {
                    target: &target,
                    object: &object,
                    method: &HttpMethod::Post,
                    headers: &headers,
                    body: (!body.is_empty()).then_some(body.as_str()),
                }
                .to_url(&endpoint)
            });
        });
    }

    group.finish();
}

fn bench_token_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Registry");

    for open in [0usize, 1_000, 100_000] {
        let owner = Rc::new(());
        let mut registry: Registry<()> = Registry::new();
        for i in 0..open {
            registry.insert(Token::new(i as u64), Rc::downgrade(&owner));
        }

        group.bench_with_input(BenchmarkId::new("allocate", open), &registry, |b, registry| {
            b.iter(|| registry.allocate(random_candidate));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_descriptor, bench_token_allocation);
criterion_main!(benches);
