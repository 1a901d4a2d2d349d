//! Equivalence aggregation across queries.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use articulate_shared::{CourseEquivalenceFact, DedupPolicy, EquivalentCourse};

/// Home course code → equivalent courses, in insertion order per key.
///
/// One map lives for one pipeline run and has a single mutator. Parallel
/// workers build their own maps and the owner folds them in with
/// [`EquivalenceMap::absorb`].
///
/// Serializes as a plain JSON object (keys sorted); the dedup policy is a
/// runtime setting and is not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquivalenceMap {
    entries: BTreeMap<String, Vec<EquivalentCourse>>,
    policy: DedupPolicy,
}

impl EquivalenceMap {
    /// An empty map that accumulates repeats.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: DedupPolicy) -> Self {
        Self {
            entries: BTreeMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Fold `facts` into the map. Returns how many entries were appended.
    pub fn merge<I>(&mut self, facts: I) -> usize
    where
        I: IntoIterator<Item = CourseEquivalenceFact>,
    {
        let mut appended = 0;
        for fact in facts {
            if self.insert(fact.home_course_code, fact.equivalent) {
                appended += 1;
            }
        }
        appended
    }

    /// Append one entry under `home_course_code`, creating the key if needed.
    ///
    /// Returns `false` only when the policy is [`DedupPolicy::Distinct`] and
    /// the entry is already listed.
    pub fn insert(&mut self, home_course_code: String, course: EquivalentCourse) -> bool {
        let list = self.entries.entry(home_course_code).or_default();
        if self.policy == DedupPolicy::Distinct && list.contains(&course) {
            return false;
        }
        list.push(course);
        true
    }

    /// Fold another map into this one, key by key, keeping each key's order.
    pub fn absorb(&mut self, other: EquivalenceMap) -> usize {
        let mut appended = 0;
        for (code, courses) in other.entries {
            for course in courses {
                if self.insert(code.clone(), course) {
                    appended += 1;
                }
            }
        }
        appended
    }

    pub fn get(&self, home_course_code: &str) -> Option<&[EquivalentCourse]> {
        self.entries.get(home_course_code).map(Vec::as_slice)
    }

    /// Number of distinct home courses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of equivalent-course entries across all keys.
    pub fn total_entries(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[EquivalentCourse])> {
        self.entries
            .iter()
            .map(|(code, courses)| (code.as_str(), courses.as_slice()))
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<EquivalentCourse>> {
        self.entries
    }
}

impl Serialize for EquivalenceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EquivalenceMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self {
            entries: BTreeMap::deserialize(deserializer)?,
            policy: DedupPolicy::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(home: &str, number: &str, institution: &str) -> CourseEquivalenceFact {
        CourseEquivalenceFact {
            home_course_code: home.into(),
            equivalent: EquivalentCourse {
                dept_code: "MATH".into(),
                number: number.into(),
                title: format!("Course {number}"),
                institution_name: institution.into(),
            },
        }
    }

    #[test]
    fn merge_creates_keys_and_preserves_order() {
        let mut map = EquivalenceMap::new();
        let appended = map.merge([
            fact("MATH 19A", "1A", "Foothill College"),
            fact("MATH 19B", "1B", "Foothill College"),
            fact("MATH 19A", "3A", "De Anza College"),
        ]);

        assert_eq!(appended, 3);
        assert_eq!(map.len(), 2);
        assert_eq!(map.total_entries(), 3);
        let numbers: Vec<_> = map.get("MATH 19A").expect("key").iter().map(|c| c.number.as_str()).collect();
        assert_eq!(numbers, vec!["1A", "3A"]);
        assert!(map.get("MATH 21").is_none());
    }

    #[test]
    fn merge_is_associative() {
        let (f1, f2, f3) = (
            fact("MATH 19A", "1A", "Foothill College"),
            fact("MATH 19A", "1AH", "Foothill College"),
            fact("MATH 19A", "3A", "De Anza College"),
        );

        let mut split = EquivalenceMap::new();
        split.merge([f1.clone(), f2.clone()]);
        split.merge([f3.clone()]);

        let mut whole = EquivalenceMap::new();
        whole.merge([f1, f2, f3]);

        assert_eq!(split, whole);
    }

    #[test]
    fn accumulate_keeps_repeats() {
        let mut map = EquivalenceMap::new();
        map.merge([fact("MATH 19A", "1A", "Foothill College")]);
        map.merge([fact("MATH 19A", "1A", "Foothill College")]);
        assert_eq!(map.get("MATH 19A").map(<[_]>::len), Some(2));
    }

    #[test]
    fn distinct_drops_repeats() {
        let mut map = EquivalenceMap::with_policy(DedupPolicy::Distinct);
        let appended = map.merge([
            fact("MATH 19A", "1A", "Foothill College"),
            fact("MATH 19A", "1A", "Foothill College"),
            fact("MATH 19A", "1A", "De Anza College"),
        ]);
        assert_eq!(appended, 2);
        assert_eq!(map.get("MATH 19A").map(<[_]>::len), Some(2));
    }

    #[test]
    fn absorb_folds_partial_maps() {
        let mut worker_a = EquivalenceMap::new();
        worker_a.merge([fact("MATH 19A", "1A", "Foothill College")]);
        let mut worker_b = EquivalenceMap::new();
        worker_b.merge([
            fact("MATH 19A", "1A", "De Anza College"),
            fact("FREN 1", "1", "De Anza College"),
        ]);

        let mut run = EquivalenceMap::new();
        assert_eq!(run.absorb(worker_a), 1);
        assert_eq!(run.absorb(worker_b), 2);

        let institutions: Vec<_> = run
            .get("MATH 19A")
            .expect("key")
            .iter()
            .map(|c| c.institution_name.as_str())
            .collect();
        assert_eq!(institutions, vec!["Foothill College", "De Anza College"]);
        assert_eq!(run.len(), 2);
    }

    #[test]
    fn serializes_as_plain_object() {
        let mut map = EquivalenceMap::with_policy(DedupPolicy::Distinct);
        map.merge([fact("MATH 19A", "1A", "Foothill College")]);

        let json = serde_json::to_value(&map).expect("serialize");
        assert_eq!(json["MATH 19A"][0]["number"], "1A");
        assert_eq!(json["MATH 19A"][0]["institution_name"], "Foothill College");
        assert!(json.get("policy").is_none());

        let parsed: EquivalenceMap = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed.into_inner(), map.clone().into_inner());
    }

    #[test]
    fn iter_walks_sorted_keys() {
        let mut map = EquivalenceMap::new();
        map.merge([
            fact("MATH 21", "2", "Foothill College"),
            fact("AM 10", "10", "Foothill College"),
        ]);
        let keys: Vec<_> = map.iter().map(|(code, _)| code).collect();
        assert_eq!(keys, vec!["AM 10", "MATH 21"]);
    }
}
