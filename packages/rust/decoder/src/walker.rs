//! Articulation tree walker.
//!
//! An agreement document looks like this (fields we do not read omitted):
//!
//! ```text
//! result.articulations: [
//!   { type: "Course",
//!     course: { prefix, courseNumber },            // receiving (home) course
//!     sendingArticulation: {
//!       items: [                                   // alternative groups
//!         { items: [ { type: "Course", prefix, courseNumber, courseTitle }, ... ] },
//!       ] } },
//!   { type: "GeneralEducation", ... },             // skipped
//! ]
//! ```
//!
//! Upstream node shapes vary and are not fully documented, so every node and
//! leaf is checked for presence and type. String fields are emitted as
//! stored; a blank one disqualifies its node or leaf. A node that does not
//! have the shape above contributes no facts and the walk moves on. Only a
//! missing articulation list is an error.

use std::iter::FusedIterator;
use std::slice;

use serde_json::Value;
use tracing::{debug, trace};

use articulate_shared::{CourseEquivalenceFact, EquivalentCourse, Result};

use crate::document::ArticulationDocument;

/// Discriminator value marking a real course, on both nodes and leaves.
pub const COURSE_TYPE: &str = "Course";

/// Walk `doc` and yield one fact per sending course.
///
/// The returned iterator is lazy and borrows the document; clone it (or call
/// this again) to restart. Facts come out in document order.
pub fn extract_facts<'a>(
    doc: &'a ArticulationDocument,
    sending_institution_name: &'a str,
) -> Result<Facts<'a>> {
    let nodes = doc.articulations()?;

    Ok(Facts {
        nodes: nodes.iter(),
        current: None,
        institution_name: sending_institution_name,
    })
}

/// Lazy sequence of facts over an articulation list.
#[derive(Debug, Clone)]
pub struct Facts<'a> {
    nodes: slice::Iter<'a, Value>,
    current: Option<CourseNode<'a>>,
    institution_name: &'a str,
}

impl Iterator for Facts<'_> {
    type Item = CourseEquivalenceFact;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.current.as_mut() {
                if let Some(leaf) = node.next_leaf() {
                    return Some(CourseEquivalenceFact {
                        home_course_code: node.home_course_code.clone(),
                        equivalent: EquivalentCourse {
                            dept_code: leaf.prefix.to_string(),
                            number: leaf.number.to_string(),
                            title: leaf.title.to_string(),
                            institution_name: self.institution_name.to_string(),
                        },
                    });
                }
                self.current = None;
            }

            self.current = CourseNode::parse(self.nodes.next()?);
        }
    }
}

impl FusedIterator for Facts<'_> {}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A top-level `"Course"` node with a usable sending section.
#[derive(Debug, Clone)]
struct CourseNode<'a> {
    home_course_code: String,
    groups: slice::Iter<'a, Value>,
    leaves: slice::Iter<'a, Value>,
}

impl<'a> CourseNode<'a> {
    fn parse(node: &'a Value) -> Option<Self> {
        let kind = discriminator(node);
        if kind != Some(COURSE_TYPE) {
            trace!(kind = kind.unwrap_or("<none>"), "skipping non-course articulation");
            return None;
        }

        let Some(home_course_code) = home_course_code(node) else {
            debug!("course articulation without a usable receiving course, skipping");
            return None;
        };

        let Some(groups) = node
            .get("sendingArticulation")
            .and_then(|sending| sending.get("items"))
            .and_then(Value::as_array)
        else {
            debug!(%home_course_code, "course articulation without sending items, skipping");
            return None;
        };

        Some(Self {
            home_course_code,
            groups: groups.iter(),
            leaves: slice::Iter::default(),
        })
    }

    /// Next qualifying leaf across all groups of this node.
    fn next_leaf(&mut self) -> Option<SendingCourse<'a>> {
        loop {
            if let Some(course) = self.leaves.by_ref().find_map(SendingCourse::parse) {
                return Some(course);
            }

            let group = self.groups.next()?;
            self.leaves = match group.get("items").and_then(Value::as_array) {
                Some(items) => items.iter(),
                None => {
                    trace!(home = %self.home_course_code, "sending group without items");
                    slice::Iter::default()
                }
            };
        }
    }
}

/// `"{prefix} {number}"` from the node's receiving course locator.
fn home_course_code(node: &Value) -> Option<String> {
    let course = node.get("course")?;
    let prefix = non_empty_str(course, "prefix")?;
    let number = non_empty_str(course, "courseNumber")?;
    Some(format!("{prefix} {number}"))
}

// ---------------------------------------------------------------------------
// Leaves
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct SendingCourse<'a> {
    prefix: &'a str,
    number: &'a str,
    title: &'a str,
}

impl<'a> SendingCourse<'a> {
    fn parse(leaf: &'a Value) -> Option<Self> {
        if discriminator(leaf) != Some(COURSE_TYPE) {
            return None;
        }

        Some(Self {
            prefix: non_empty_str(leaf, "prefix")?,
            number: non_empty_str(leaf, "courseNumber")?,
            title: leaf
                .get("courseTitle")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        })
    }
}

fn discriminator(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}

/// The string at `field`, as stored, unless it is blank.
fn non_empty_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    let s = value.get(field)?.as_str()?;
    (!s.trim().is_empty()).then_some(s)
}
