// File: generator.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::mutations::MutationCatalog;
use crate::smuggle_test::SmuggleTest;
use crate::target::Target;
use std::net::IpAddr;
use url::Url;

/// Every unordered pair of distinct mutations, in catalog order: C(n, 2)
/// tests per method for the given address.
pub fn expand(
    url: &Url,
    ip: IpAddr,
    methods: &[String],
    catalog: &MutationCatalog,
) -> Vec<SmuggleTest> {
    let names: Vec<&str> = catalog.iter().map(|m| m.name()).collect();
    let pairs = names.len() * names.len().saturating_sub(1) / 2;
    let mut tests = Vec::with_capacity(pairs * methods.len());

    for method in methods {
        for (i, first) in names.iter().enumerate() {
            for second in &names[i + 1..] {
                tests.push(SmuggleTest::new(
                    url,
                    ip,
                    method,
                    [first.to_string(), second.to_string()],
                ));
            }
        }
    }

    tests
}

/// The plan for every address of a resolved target.
pub fn expand_target(
    target: &Target,
    methods: &[String],
    catalog: &MutationCatalog,
) -> Vec<SmuggleTest> {
    target
        .ips
        .iter()
        .flat_map(|ip| expand(&target.url, *ip, methods, catalog))
        .collect()
}
