// File: mutations.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use std::collections::HashSet;

/// Marker substituted with the Content-Length value when a template is rendered.
pub const PLACEHOLDER: &str = "{v}";

static BUILTIN_MUTATIONS: &[(&str, &str)] = &[
    ("id", "Content-Length: {v}"),
    ("colon-prefix-chars", "Content-Length abcd: {v}"),
    ("colon-prefix-space", "Content-Length : {v}"),
    ("colon-prefix-tab", "Content-Length\t: {v}"),
    ("colon-suffix-none", "Content-Length:{v}"),
    ("colon-suffix-tab", "Content-Length:\t{v}"),
    ("colon-suffix-vtab", "Content-Length:\x0b{v}"),
    ("name-prefix-space", " Content-Length: {v}"),
    ("name-prefix-tab", "\tContent-Length: {v}"),
    ("name-prefix-cr", "\rContent-Length: {v}"),
    ("name-underscore", "Content_Length: {v}"),
    ("value-prefix-nul", "Content-Length: \x00{v}"),
    ("value-suffix-nul", "Content-Length: {v}\x00"),
    ("value-suffix-cr", "Content-Length: {v}\r"),
    ("value-suffix-space", "Content-Length: {v} "),
    ("case-lower", "content-length: {v}"),
    ("case-upper", "CONTENT-LENGTH: {v}"),
    ("case-mixed", "cOnTeNt-LeNgTh: {v}"),
    ("value-hex", "Content-Length: 0x{v}"),
    ("value-plus", "Content-Length: +{v}"),
    ("value-leading-zeros", "Content-Length: 00{v}"),
];

/// A named Content-Length header rendering technique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    name: String,
    template: String,
}

impl Mutation {
    pub fn new(name: &str, template: &str) -> Result<Self, String> {
        if name.is_empty() {
            return Err("Mutation name must not be empty".to_string());
        }

        let placeholders = template.matches(PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(format!(
                "Mutation {} must contain exactly one placeholder, found {}",
                name, placeholders
            ));
        }

        Ok(Self {
            name: name.to_string(),
            template: template.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn render(&self, value: &str) -> String {
        self.template.replacen(PLACEHOLDER, value, 1)
    }
}

/// Immutable, ordered set of mutations shared read-only by the generator and workers.
#[derive(Debug, Clone, Default)]
pub struct MutationCatalog {
    mutations: Vec<Mutation>,
}

impl MutationCatalog {
    /// Builds the built-in catalog.
    pub fn load() -> Self {
        let mutations = BUILTIN_MUTATIONS
            .iter()
            .map(|(name, template)| Mutation {
                name: name.to_string(),
                template: template.to_string(),
            })
            .collect();

        Self { mutations }
    }

    /// Builds a catalog from `(name, template)` pairs, keeping their order.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut seen = HashSet::new();
        let mut mutations = Vec::new();

        for (name, template) in pairs {
            if !seen.insert(name.to_string()) {
                return Err(format!("Duplicate mutation name: {}", name));
            }
            mutations.push(Mutation::new(name, template)?);
        }

        Ok(Self { mutations })
    }

    pub fn get(&self, name: &str) -> Option<&Mutation> {
        self.mutations.iter().find(|m| m.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}
