// Dweve Trellis - Markup Object Graph Compiler
//
// Copyright (c) 2025 Dweve IP B.V. and individual contributors.
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository or at: http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Writer settings and the deferral policy.

use crate::runtime::LookupScope;

/// When the content of a resource dictionary is recorded for on-demand
/// materialization instead of being built right away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeferralPolicy {
    pub enabled: bool,
    /// Recordings shorter than this are replayed eagerly.
    pub min_records: usize,
    /// Minimum share of entries that must be deferrable.
    pub min_keyed_ratio: f32,
}

impl Default for DeferralPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_records: 16,
            min_keyed_ratio: 0.5,
        }
    }
}

impl DeferralPolicy {
    /// Defer every dictionary, however small.
    pub fn always() -> Self {
        Self {
            enabled: true,
            min_records: 0,
            min_keyed_ratio: 0.0,
        }
    }

    pub fn never() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Whether a finished recording should stay deferred.
    pub fn accepts(&self, records: usize, entries: usize, deferrable: usize) -> bool {
        if !self.enabled || records < self.min_records || deferrable == 0 {
            return false;
        }
        let ratio = deferrable as f32 / entries.max(1) as f32;
        ratio >= self.min_keyed_ratio
    }
}

/// Settings shared by a writer and every writer it spawns for deferred
/// entries.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterSettings {
    /// Reject a second assignment to the same member of one object.
    pub check_duplicate_members: bool,
    /// Drop values for unknown members and unknown content instead of
    /// failing.
    pub tolerate_unknown_members: bool,
    /// Scope used by `StaticResource`. `ThemeResource` always uses
    /// [`LookupScope::All`].
    pub resource_scope: LookupScope,
    pub deferral: DeferralPolicy,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            check_duplicate_members: true,
            tolerate_unknown_members: false,
            resource_scope: LookupScope::All,
            deferral: DeferralPolicy::default(),
        }
    }
}

impl WriterSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deferral(mut self, deferral: DeferralPolicy) -> Self {
        self.deferral = deferral;
        self
    }

    pub fn with_duplicate_check(mut self, enabled: bool) -> Self {
        self.check_duplicate_members = enabled;
        self
    }

    pub fn with_unknown_members_tolerated(mut self, tolerate: bool) -> Self {
        self.tolerate_unknown_members = tolerate;
        self
    }

    pub fn with_resource_scope(mut self, scope: LookupScope) -> Self {
        self.resource_scope = scope;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_needs_enough_records() {
        let policy = DeferralPolicy::default();
        assert!(!policy.accepts(4, 1, 1));
        assert!(policy.accepts(40, 4, 4));
    }

    #[test]
    fn test_keyed_ratio() {
        let policy = DeferralPolicy {
            enabled: true,
            min_records: 0,
            min_keyed_ratio: 0.5,
        };
        assert!(policy.accepts(10, 4, 2));
        assert!(!policy.accepts(10, 4, 1));
    }

    #[test]
    fn test_always_and_never() {
        assert!(DeferralPolicy::always().accepts(1, 1, 1));
        assert!(!DeferralPolicy::always().accepts(1, 1, 0));
        assert!(!DeferralPolicy::never().accepts(1000, 10, 10));
    }

    #[test]
    fn test_settings_builders() {
        let settings = WriterSettings::new()
            .with_deferral(DeferralPolicy::never())
            .with_duplicate_check(false)
            .with_resource_scope(LookupScope::Local);
        assert!(!settings.deferral.enabled);
        assert!(!settings.check_duplicate_members);
        assert_eq!(settings.resource_scope, LookupScope::Local);
    }
}
