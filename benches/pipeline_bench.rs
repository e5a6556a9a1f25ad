// Copyright (c) 2026 Bountyy Oy. All rights reserved.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kuriiri::model::Variable;
use kuriiri::{CookieJar, HeaderEntry, KeyValue, RequestDefinition, RequestSnapshot, Resolver};
use url::Url;

fn resolver_benchmark(c: &mut Criterion) {
    let variables: Vec<Variable> = (0..50)
        .map(|i| Variable::new(format!("var{}", i), format!("value-{}", i)))
        .chain([
            Variable::new("host", "api.example.com"),
            Variable::new("token", "secret"),
        ])
        .collect();
    let params = vec![KeyValue::new("id", "42"), KeyValue::new("org", "bountyy")];
    let definition = RequestDefinition::new("POST", "https://{{host}}/orgs/{org}/users/{id}")
        .header("Authorization", "Bearer {{token}}")
        .header("X-Trace", "{{var7}}-{{var31}}")
        .query("page", "{{var3}}");
    let snapshot = RequestSnapshot::from_definition(&definition);

    c.bench_function("resolve_string", |b| {
        let resolver = Resolver::new(&params, &variables);
        b.iter(|| black_box(resolver.resolve("https://{{host}}/orgs/{org}/users/{id}")))
    });

    c.bench_function("resolve_request", |b| {
        let resolver = Resolver::new(&params, &variables);
        b.iter(|| black_box(resolver.resolve_request(&snapshot)))
    });
}

fn cookie_jar_benchmark(c: &mut Criterion) {
    let origin = Url::parse("https://www.example.com/account").unwrap();
    let headers: Vec<HeaderEntry> = (0..20)
        .map(|i| {
            HeaderEntry::new(
                "Set-Cookie",
                format!("c{}=v{}; Domain=.example.com; Path=/; Max-Age=3600; HttpOnly", i, i),
            )
        })
        .collect();

    c.bench_function("cookie_merge", |b| {
        b.iter(|| {
            let jar = CookieJar::new();
            black_box(jar.merge(&headers, &origin))
        })
    });

    let jar = CookieJar::new();
    jar.merge(&headers, &origin);
    let target = Url::parse("https://api.example.com/v1/items").unwrap();

    c.bench_function("cookie_serialize", |b| {
        b.iter(|| black_box(jar.serialize(&target)))
    });
}

criterion_group!(benches, resolver_benchmark, cookie_jar_benchmark);
criterion_main!(benches);
